//! Socket SSDP côté *control point*.
//!
//! Le socket est lié à un port éphémère (`0.0.0.0:0`) et non à 1900 : les
//! réponses aux M-SEARCH arrivent en unicast sur ce port, et un bind sur 1900
//! ferait répartir les datagrammes par le noyau avec un éventuel serveur SSDP
//! local.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info, warn};

use super::SsdpSocket;
use crate::errors::TransportError;
use crate::ssdp::{SSDP_MULTICAST_ADDR, SSDP_PORT};

/// Implémentation de [`SsdpSocket`] sur un socket UDP système.
#[derive(Debug, Default)]
pub struct UdpSsdpSocket {
    socket: Option<UdpSocket>,
}

impl UdpSsdpSocket {
    pub fn new() -> Self {
        Self::default()
    }

    fn open() -> std::io::Result<UdpSocket> {
        let socket2 = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket2.set_reuse_address(true)?;

        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket2.bind(&bind_addr.into())?;

        let socket: UdpSocket = socket2.into();
        socket.set_multicast_loop_v4(true)?;
        Ok(socket)
    }

    fn socket(&self) -> Result<&UdpSocket, TransportError> {
        self.socket.as_ref().ok_or(TransportError::NotConnected)
    }
}

impl SsdpSocket for UdpSsdpSocket {
    fn join_multicast(&mut self) -> Result<(), TransportError> {
        if self.socket.is_none() {
            self.socket = Some(Self::open()?);
        }
        let socket = self.socket()?;

        let mut joined = 0usize;
        for ips in pmoutils::list_all_ips().values() {
            for ip in ips {
                match socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, ip) {
                    Ok(()) => {
                        debug!("SSDP: joined {} on {}", SSDP_MULTICAST_ADDR, ip);
                        joined += 1;
                    }
                    Err(e) => {
                        warn!("SSDP: failed to join {} on {}: {}", SSDP_MULTICAST_ADDR, ip, e);
                    }
                }
            }
        }

        if joined == 0 {
            // Laisser le noyau choisir l'interface
            socket.join_multicast_v4(&SSDP_MULTICAST_ADDR, &Ipv4Addr::UNSPECIFIED)?;
        }

        info!("✅ SSDP socket ready on {}", socket.local_addr()?);
        Ok(())
    }

    fn send_multicast(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let target = SocketAddrV4::new(SSDP_MULTICAST_ADDR, SSDP_PORT);
        self.socket()?.send_to(payload, target)?;
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        wait: Duration,
    ) -> Result<(usize, SocketAddr), TransportError> {
        let socket = self.socket()?;
        // Une durée nulle est refusée par set_read_timeout
        socket.set_read_timeout(Some(wait.max(Duration::from_millis(1))))?;
        Ok(socket.recv_from(buf)?)
    }

    fn close(&mut self) {
        if self.socket.take().is_some() {
            debug!("SSDP socket closed");
        }
    }
}
