use tracing::{debug, trace};

use super::{IGD_SEARCH_TARGETS, SsdpDevice};
use crate::url::{url_ipv4, url_path, url_port};

/// Première cible IGD citée dans la réponse, dans l'ordre de priorité.
pub fn matching_target(reply: &str) -> Option<&'static str> {
    IGD_SEARCH_TARGETS
        .iter()
        .copied()
        .find(|target| reply.contains(target))
}

/// Valeur de l'en-tête `LOCATION` (nom insensible à la casse).
///
/// La valeur s'arrête au CRLF suivant ; sans CRLF la réponse est rejetée.
pub fn extract_location(reply: &str) -> Option<&str> {
    let lower = reply.to_ascii_lowercase();
    let start = lower.find("location:")? + "location:".len();
    let value = &reply[start..];
    let end = value.find("\r\n")?;
    Some(value[..end].trim())
}

/// Transforme une réponse à un M-SEARCH en [`SsdpDevice`].
///
/// Avec `igd_only`, la réponse doit citer l'une des cibles IGD.
pub fn parse_search_response(reply: &str, igd_only: bool) -> Option<SsdpDevice> {
    if igd_only {
        match matching_target(reply) {
            Some(target) => debug!("IGD of type [{}] found", target),
            None => {
                trace!("SSDP reply does not mention an IGD target, ignoring");
                return None;
            }
        }
    }

    let Some(location) = extract_location(reply) else {
        debug!("SSDP reply without a usable LOCATION header, ignoring");
        return None;
    };

    let Some(host) = url_ipv4(location) else {
        debug!("LOCATION [{}] is not an IPv4 URL, ignoring", location);
        return None;
    };

    Some(SsdpDevice {
        host,
        port: url_port(location),
        path: url_path(location).to_string(),
    })
}
