use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    GatewayLocation, IGD_SEARCH_TARGETS, SSDP_ALL, SSDP_RESPONSE_MAX_SIZE, SsdpDevice,
    msearch_request, parse_search_response,
};
use crate::errors::{IgdError, IgdResult, TransportError};
use crate::transport::{Clock, SsdpSocket};

const JOIN_RETRY_DELAY: Duration = Duration::from_millis(500);
const RECV_SLICE: Duration = Duration::from_millis(100);
const IDLE_PAUSE: Duration = Duration::from_millis(5);

fn join_group<U: SsdpSocket, C: Clock>(socket: &mut U, clock: &C, timeout: Duration) -> IgdResult<()> {
    let start = clock.now();
    loop {
        match socket.join_multicast() {
            Ok(()) => return Ok(()),
            Err(e) => {
                if clock.elapsed(start) >= timeout {
                    socket.close();
                    return Err(IgdError::from_transport("joining the SSDP multicast group", e));
                }
                debug!("SSDP join failed ({}), retrying", e);
                clock.sleep(JOIN_RETRY_DELAY);
            }
        }
    }
}

fn send_search<U: SsdpSocket>(socket: &mut U, st: &str) {
    match socket.send_multicast(msearch_request(st).as_bytes()) {
        Ok(()) => debug!("📤 M-SEARCH sent (ST={})", st),
        Err(e) => warn!("❌ Failed to send M-SEARCH (ST={}): {}", st, e),
    }
}

/// Attend une réponse pendant au plus `remaining`.
///
/// Retourne `Ok(None)` quand rien d'exploitable n'est arrivé.
fn receive<U: SsdpSocket, C: Clock>(
    socket: &mut U,
    clock: &C,
    buf: &mut [u8],
    remaining: Duration,
) -> IgdResult<Option<(String, IpAddr)>> {
    match socket.recv_from(buf, remaining.min(RECV_SLICE)) {
        Ok((n, from)) if n > SSDP_RESPONSE_MAX_SIZE => {
            debug!(
                "SSDP reply from {} larger than {} bytes, dropped",
                from, SSDP_RESPONSE_MAX_SIZE
            );
            Ok(None)
        }
        Ok((n, from)) => Ok(Some((
            String::from_utf8_lossy(&buf[..n]).into_owned(),
            from.ip(),
        ))),
        Err(TransportError::Timeout) => {
            clock.sleep(IDLE_PAUSE);
            Ok(None)
        }
        Err(TransportError::NotConnected) => Err(IgdError::network("SSDP socket is not open")),
        Err(e) => {
            warn!("❌ SSDP read error: {}", e);
            clock.sleep(IDLE_PAUSE);
            Ok(None)
        }
    }
}

/// Cherche l'IGD du réseau local.
///
/// Un M-SEARCH est émis pour chacune des cibles IGD, puis on attend une
/// réponse venant de `gateway_ip` (quand il est connu) qui cite une de ces
/// cibles et porte un `LOCATION` exploitable.
pub fn discover_gateway<U, C>(
    socket: &mut U,
    clock: &C,
    gateway_ip: Option<Ipv4Addr>,
    timeout: Duration,
) -> IgdResult<GatewayLocation>
where
    U: SsdpSocket,
    C: Clock,
{
    join_group(socket, clock, timeout)?;

    for target in IGD_SEARCH_TARGETS {
        send_search(socket, target);
    }

    match gateway_ip {
        Some(ip) => debug!("Gateway IP [{}]", ip),
        None => debug!("Gateway IP unknown, accepting replies from any sender"),
    }

    let mut buf = vec![0u8; SSDP_RESPONSE_MAX_SIZE + 1];
    let start = clock.now();
    while clock.elapsed(start) < timeout {
        let remaining = timeout.saturating_sub(clock.elapsed(start));
        let Some((reply, from)) = receive(socket, clock, &mut buf, remaining).inspect_err(|_| socket.close())? else {
            continue;
        };

        if let Some(gw) = gateway_ip {
            if from != IpAddr::V4(gw) {
                debug!(
                    "Discarded SSDP reply not originating from the gateway [{}] (from [{}])",
                    gw, from
                );
                continue;
            }
        }

        if let Some(location) = parse_search_response(&reply, true) {
            info!("✅ Gateway description found at {}", location);
            socket.close();
            return Ok(location);
        }
    }

    socket.close();
    Err(IgdError::timeout(
        "waiting for the gateway router to respond to M-SEARCH",
    ))
}

/// Inventaire de tous les devices SSDP qui répondent pendant `timeout`.
///
/// Les doublons sont retirés en gardant l'ordre de découverte.
pub fn list_devices<U, C>(socket: &mut U, clock: &C, timeout: Duration) -> IgdResult<Vec<SsdpDevice>>
where
    U: SsdpSocket,
    C: Clock,
{
    if timeout.is_zero() {
        return Ok(Vec::new());
    }

    join_group(socket, clock, timeout)?;
    send_search(socket, SSDP_ALL);

    let mut devices = Vec::new();
    let mut buf = vec![0u8; SSDP_RESPONSE_MAX_SIZE + 1];
    let start = clock.now();
    while clock.elapsed(start) < timeout {
        let remaining = timeout.saturating_sub(clock.elapsed(start));
        let received = receive(socket, clock, &mut buf, remaining).inspect_err(|_| socket.close())?;
        if let Some((reply, from)) = received {
            match parse_search_response(&reply, false) {
                Some(device) => {
                    debug!("SSDP device {} (from {})", device, from);
                    devices.push(device);
                }
                None => debug!("Unusable SSDP reply from {}", from),
            }
        }
    }
    socket.close();

    let total = devices.len();
    let devices = dedup_devices(devices);
    info!("{} SSDP devices found ({} replies)", devices.len(), total);
    Ok(devices)
}

/// Retire les doublons (même host, port et path), premières occurrences gardées.
pub fn dedup_devices(devices: Vec<SsdpDevice>) -> Vec<SsdpDevice> {
    let mut unique: Vec<SsdpDevice> = Vec::with_capacity(devices.len());
    for device in devices {
        if !unique.contains(&device) {
            unique.push(device);
        }
    }
    unique
}
