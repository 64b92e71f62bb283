use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

use tracing::{debug, warn};

use super::HostNetwork;

/// Hôte public joint pour vérifier que le réseau est utilisable.
pub const DEFAULT_CONNECTIVITY_PROBE: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(64, 233, 187, 99), 80));

/// Vue système de l'hôte, appuyée sur `pmoutils`.
///
/// La passerelle et la sonde de connectivité peuvent être imposées par la
/// configuration (`igd.gateway`, `igd.connectivity_probe`).
#[derive(Debug, Clone, Default)]
pub struct SystemHost {
    gateway: Option<Ipv4Addr>,
    probe: Option<SocketAddr>,
}

impl SystemHost {
    pub fn new(gateway: Option<Ipv4Addr>, probe: Option<SocketAddr>) -> Self {
        Self { gateway, probe }
    }
}

impl HostNetwork for SystemHost {
    fn local_ip(&self) -> Ipv4Addr {
        pmoutils::guess_local_ip()
    }

    fn gateway_ip(&self) -> Option<Ipv4Addr> {
        self.gateway.or_else(pmoutils::default_gateway)
    }

    fn check_connectivity(&self, timeout: Duration) -> bool {
        let Some(probe) = self.probe else {
            return true;
        };
        match TcpStream::connect_timeout(&probe, timeout) {
            Ok(_) => {
                debug!("Connectivity probe {} reachable", probe);
                true
            }
            Err(e) => {
                warn!("Connectivity probe {} failed: {}", probe, e);
                false
            }
        }
    }
}
