//! Ports de transport du client IGD.
//!
//! Le moteur ne manipule jamais directement de sockets : il passe par quatre
//! traits, ce qui permet de le piloter en test avec des transports scriptés et
//! une horloge manuelle.
//!
//! - [`SsdpSocket`] : socket UDP multicast (M-SEARCH et réponses unicast)
//! - [`GatewayStream`] : flux TCP vers le routeur (description et SOAP)
//! - [`HostNetwork`] : IP locale, IP de la passerelle, test de connectivité
//! - [`Clock`] : temps monotone et attente

mod clock;
mod host;
mod tcp;
mod udp;

use std::io::{self, BufRead};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use crate::errors::TransportError;

pub use clock::{Clock, SystemClock};
#[doc(hidden)]
pub use clock::ManualClock;
pub use host::{DEFAULT_CONNECTIVITY_PROBE, SystemHost};
pub use tcp::TcpGatewayStream;
pub use udp::UdpSsdpSocket;

/// Socket UDP capable de rejoindre le groupe SSDP et d'y émettre.
pub trait SsdpSocket {
    /// Rejoint le groupe multicast SSDP (ouvre le socket si besoin).
    fn join_multicast(&mut self) -> Result<(), TransportError>;

    /// Émet un datagramme vers `239.255.255.250:1900`.
    fn send_multicast(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Attend un datagramme pendant au plus `wait`.
    ///
    /// Retourne [`TransportError::Timeout`] si rien n'est arrivé.
    fn recv_from(
        &mut self,
        buf: &mut [u8],
        wait: Duration,
    ) -> Result<(usize, SocketAddr), TransportError>;

    fn close(&mut self);
}

/// Flux TCP vers le routeur, lu ligne par ligne.
pub trait GatewayStream {
    fn connect(&mut self, addr: SocketAddrV4, timeout: Duration) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Adresse du pair si le flux est ouvert.
    fn peer(&self) -> Option<SocketAddrV4>;

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Bloque jusqu'à ce qu'au moins un octet soit lisible.
    fn wait_readable(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Lit jusqu'au prochain `\r` (exclu).
    ///
    /// `Ok(None)` signale la fin du flux. Un silence plus long que `idle`
    /// donne [`TransportError::Timeout`].
    fn read_line(&mut self, idle: Duration) -> Result<Option<String>, TransportError>;

    fn close(&mut self);
}

/// Vue de la machine hôte sur le réseau.
pub trait HostNetwork {
    fn local_ip(&self) -> Ipv4Addr;

    /// IP de la passerelle par défaut, si l'hôte sait la donner.
    fn gateway_ip(&self) -> Option<Ipv4Addr>;

    /// Vérifie que le réseau est utilisable.
    fn check_connectivity(&self, timeout: Duration) -> bool;
}

/// Lit une "ligne" terminée par `\r` dans `reader`.
///
/// `partial` garde les octets d'une ligne interrompue par une erreur (délai
/// de lecture dépassé) : l'appel suivant la complète. Le `\n` qui suit
/// habituellement le `\r` se retrouve en tête de la ligne suivante ; il est
/// retiré ici. Les octets non UTF-8 sont remplacés.
pub fn read_cr_line<R: BufRead>(reader: &mut R, partial: &mut Vec<u8>) -> io::Result<Option<String>> {
    let n = reader.read_until(b'\r', partial)?;
    if n == 0 && partial.is_empty() {
        return Ok(None);
    }
    let mut raw = std::mem::take(partial);
    if raw.last() == Some(&b'\r') {
        raw.pop();
    }
    let start = usize::from(raw.first() == Some(&b'\n'));
    Ok(Some(String::from_utf8_lossy(&raw[start..]).into_owned()))
}
