use super::{SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Cible "tous les devices", utilisée pour l'inventaire.
pub const SSDP_ALL: &str = "ssdp:all";

const MX_SECONDS: u32 = 2;
const USER_AGENT: &str = "unix/5.1 UPnP/2.0 UPnP/1.0";

/// Construit le datagramme M-SEARCH pour la cible `st`.
///
/// Le message se termine par une ligne vide supplémentaire, que certains
/// routeurs attendent.
pub fn msearch_request(st: &str) -> String {
    format!(
        "M-SEARCH * HTTP/1.1\r\n\
         HOST: {}:{}\r\n\
         MAN: \"ssdp:discover\"\r\n\
         MX: {}\r\n\
         ST: {}\r\n\
         USER-AGENT: {}\r\n\
         \r\n\
         \r\n",
        SSDP_MULTICAST_ADDR, SSDP_PORT, MX_SECONDS, st, USER_AGENT
    )
}
