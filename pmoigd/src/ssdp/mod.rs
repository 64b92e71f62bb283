//! # Module SSDP - découverte de la passerelle
//!
//! Le client émet des M-SEARCH sur le groupe multicast SSDP puis écoute les
//! réponses unicast pour trouver l'URL de description (`LOCATION`) du routeur.
//!
//! - [`discover_gateway`] : recherche ciblée de l'IGD, filtrée sur l'IP de la
//!   passerelle et sur les types de device/service connus
//! - [`list_devices`] : inventaire best-effort de tous les devices SSDP
//!
//! ## Constantes SSDP
//!
//! - **Multicast Address**: 239.255.255.250:1900
//! - **MX**: 2 secondes
//! - **Tampon de réponse**: 8192 octets

mod discovery;
mod response;
mod search;

use std::fmt;
use std::net::Ipv4Addr;

pub use discovery::{dedup_devices, discover_gateway, list_devices};
pub use response::{extract_location, matching_target, parse_search_response};
pub use search::{SSDP_ALL, msearch_request};

/// Adresse multicast SSDP
pub const SSDP_MULTICAST_ADDR: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// Port SSDP
pub const SSDP_PORT: u16 = 1900;

/// Taille maximale d'une réponse SSDP ; au-delà la réponse est ignorée.
pub const SSDP_RESPONSE_MAX_SIZE: usize = 8192;

/// Cibles de recherche d'un IGD, par ordre de priorité.
///
/// Le même ordre sert à reconnaître le `serviceType` dans la description.
pub const IGD_SEARCH_TARGETS: [&str; 5] = [
    "urn:schemas-upnp-org:device:InternetGatewayDevice:1",
    "urn:schemas-upnp-org:device:InternetGatewayDevice:2",
    "urn:schemas-upnp-org:service:WANIPConnection:1",
    "urn:schemas-upnp-org:service:WANIPConnection:2",
    "urn:schemas-upnp-org:service:WANPPPConnection:1",
];

/// Device ayant répondu à un M-SEARCH, réduit à son URL de description.
///
/// Deux réponses désignent le même device si le triplet (host, port, path)
/// est identique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SsdpDevice {
    pub host: Ipv4Addr,
    pub port: u16,
    pub path: String,
}

/// Emplacement de la description de la passerelle trouvée par SSDP.
pub type GatewayLocation = SsdpDevice;

impl fmt::Display for SsdpDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}:{}{}", self.host, self.port, self.path)
    }
}
