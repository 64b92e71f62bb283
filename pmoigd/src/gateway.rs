use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use crate::ssdp::GatewayLocation;

/// Ce que le client sait du point de contrôle SOAP de la passerelle.
///
/// `port`/`path` désignent la description du device (issue de SSDP),
/// `action_port`/`action_path` le point d'entrée SOAP (issu de la
/// description). La valeur par défaut est invalide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInfo {
    pub host: Ipv4Addr,
    pub port: u16,
    pub path: String,
    pub action_port: u16,
    pub action_path: String,
    pub service_type: String,
}

impl Default for GatewayInfo {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::UNSPECIFIED,
            port: 0,
            path: String::new(),
            action_port: 0,
            action_path: String::new(),
            service_type: String::new(),
        }
    }
}

impl GatewayInfo {
    /// Point de départ de la résolution : le port d'action vaut le port de la
    /// description tant qu'aucun `URLBase` ne dit le contraire.
    pub fn from_location(location: &GatewayLocation) -> Self {
        Self {
            host: location.host,
            port: location.port,
            path: location.path.clone(),
            action_port: location.port,
            ..Self::default()
        }
    }

    /// Vrai si la passerelle peut être interrogée sans redécouverte.
    pub fn is_valid(&self) -> bool {
        !self.host.is_unspecified() && self.port != 0 && !self.path.is_empty() && self.action_port != 0
    }

    /// Oublie tout : la prochaine utilisation relancera la découverte.
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }

    pub fn description_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }

    pub fn action_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.action_port)
    }
}

impl fmt::Display for GatewayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host [{}] port [{}] path [{}] actionPort [{}] actionPath [{}] serviceType [{}]",
            self.host, self.port, self.path, self.action_port, self.action_path, self.service_type
        )
    }
}
