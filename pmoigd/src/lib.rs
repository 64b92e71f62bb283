//! # pmoigd - client de redirection de ports UPnP IGD
//!
//! Ce crate maintient des redirections de ports sur le routeur domestique
//! (Internet Gateway Device) : il découvre le routeur par SSDP, trouve son
//! point de contrôle SOAP dans la description du device, puis ajoute et
//! vérifie les redirections souhaitées. Un cycle périodique (`update`)
//! rattrape les redémarrages du routeur, l'expiration des baux et les
//! changements d'adresse locale.
//!
//! ## Exemple
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use pmoigd::{InternalClient, Protocol, SystemIgdClient};
//!
//! let mut client = SystemIgdClient::new(Duration::from_secs(20));
//! client.register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 36000, "Blah");
//!
//! loop {
//!     match client.update(Duration::from_secs(60), None) {
//!         Ok(status) => println!("{:?}", status),
//!         Err(e) => eprintln!("{}", e),
//!     }
//!     std::thread::sleep(Duration::from_millis(500));
//! }
//! ```
//!
//! Tout le réseau passe par les traits de [`transport`] : les tests pilotent
//! le client avec des transports scriptés et une horloge manuelle
//! (`transport::ManualClock`).

pub mod client;
pub mod config_ext;
pub mod description;
pub mod errors;
pub mod gateway;
pub mod rule;
pub mod scheduler;
pub mod soap;
pub mod ssdp;
pub mod transport;
pub mod url;

pub use crate::client::{IgdClient, MappingStatus, SystemIgdClient};
pub use crate::config_ext::{IgdConfigExt, RuleConfig};
pub use crate::errors::{IgdError, IgdResult, TransportError};
pub use crate::gateway::GatewayInfo;
pub use crate::rule::{InternalClient, PortMappingEntry, PortMappingRule, Protocol};
pub use crate::ssdp::{GatewayLocation, SsdpDevice};
pub use crate::transport::{
    Clock, GatewayStream, HostNetwork, SsdpSocket, SystemClock, SystemHost, TcpGatewayStream,
    UdpSsdpSocket,
};
