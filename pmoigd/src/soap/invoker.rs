use std::net::SocketAddrV4;
use std::time::Duration;

use tracing::{debug, trace};

use super::{ReplyLines, SoapAction};
use crate::errors::{IgdError, IgdResult, TransportError};
use crate::gateway::GatewayInfo;
use crate::transport::{Clock, GatewayStream};

/// Borne des attentes TCP : connexion au routeur et premier octet de réponse.
pub const TCP_CONNECTION_TIMEOUT: Duration = Duration::from_millis(6000);

/// Silence au-delà duquel une réponse est considérée comme terminée.
pub const LINE_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Ouvre une connexion vers `addr`, une tentative toutes les 500 ms, pendant
/// au plus `bound`. Un `bound` nul vaut [`TCP_CONNECTION_TIMEOUT`].
pub(crate) fn connect_with_retry<S, C>(
    stream: &mut S,
    clock: &C,
    addr: SocketAddrV4,
    bound: Duration,
) -> IgdResult<()>
where
    S: GatewayStream,
    C: Clock,
{
    debug!("Connecting to IGD at {}", addr);
    let bound = if bound.is_zero() {
        TCP_CONNECTION_TIMEOUT
    } else {
        bound
    };
    let attempt_timeout = TCP_CONNECTION_TIMEOUT.min(bound);
    let start = clock.now();
    loop {
        match stream.connect(addr, attempt_timeout) {
            Ok(()) => {
                debug!("Connected to IGD");
                return Ok(());
            }
            Err(e) => {
                if clock.elapsed(start) >= bound {
                    stream.close();
                    return Err(IgdError::Timeout(format!(
                        "connecting to the IGD at {}: {}",
                        addr, e
                    )));
                }
                trace!("Connection to {} failed ({}), retrying", addr, e);
                clock.sleep(CONNECT_RETRY_DELAY);
            }
        }
    }
}

/// Attend le premier octet de la réponse ; ferme le flux en cas d'échec.
pub(crate) fn await_reply<S: GatewayStream>(stream: &mut S, context: &str) -> IgdResult<()> {
    match stream.wait_readable(TCP_CONNECTION_TIMEOUT) {
        Ok(()) => Ok(()),
        Err(e) => {
            stream.close();
            Err(IgdError::from_transport(context, e))
        }
    }
}

/// Lit la ligne suivante ; `None` quand la réponse est terminée.
///
/// Le flux est fermé si le pair a fermé ou sur erreur. Un silence ne le
/// conserve que pour une requête `keep_alive` : sinon la fin de la réponse
/// serait lue comme réponse à la requête suivante.
pub(crate) fn next_reply_line<S: GatewayStream>(stream: &mut S, keep_alive: bool) -> Option<String> {
    match stream.read_line(LINE_IDLE_TIMEOUT) {
        Ok(Some(line)) => Some(line),
        Ok(None) => {
            stream.close();
            None
        }
        Err(TransportError::Timeout) if keep_alive => None,
        Err(TransportError::Timeout) => {
            debug!("IGD reply went idle, closing the connection");
            stream.close();
            None
        }
        Err(e) => {
            debug!("Error while reading the IGD reply: {}", e);
            stream.close();
            None
        }
    }
}

/// Envoie `action` au point SOAP de `gateway` et collecte les lignes de la
/// réponse.
///
/// Une connexion laissée ouverte vers le même (hôte, port d'action) est
/// réutilisée ; seules les requêtes keep-alive en laissent. Le succès de l'action n'est pas jugé ici.
pub fn invoke_action<S, C>(
    stream: &mut S,
    clock: &C,
    gateway: &GatewayInfo,
    action: &SoapAction,
) -> IgdResult<ReplyLines>
where
    S: GatewayStream,
    C: Clock,
{
    if !gateway.is_valid() {
        return Err(IgdError::network("gateway info is not valid"));
    }

    let addr = gateway.action_addr();
    if stream.is_connected() && stream.peer() == Some(addr) {
        trace!("Reusing connection to {}", addr);
    } else {
        connect_with_retry(stream, clock, addr, TCP_CONNECTION_TIMEOUT)?;
    }

    debug!("Apply action [{}] on {}", action.name(), addr);
    let request = action.request(gateway);
    trace!("SOAP request:\n{}", request);

    if let Err(e) = stream.write_all(request.as_bytes()) {
        stream.close();
        return Err(IgdError::from_transport("sending the SOAP request", e));
    }

    await_reply(stream, "waiting for the SOAP reply")?;

    let mut lines = ReplyLines::new();
    while let Some(line) = next_reply_line(stream, action.keeps_alive()) {
        trace!("{}", line);
        lines.push(line);
    }
    Ok(lines)
}
