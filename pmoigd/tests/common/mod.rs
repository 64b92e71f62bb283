//! Transports en mémoire pour piloter `IgdClient` sans réseau.
//!
//! - [`MockSsdp`] répond aux M-SEARCH IGD par la réponse configurée
//! - [`MockRouter`] simule la table de redirections d'un routeur et enregistre
//!   chaque requête reçue
//! - [`MockHost`] expose une IP locale modifiable en cours de test

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Cursor};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::rc::Rc;
use std::time::Duration;

use pmoigd::transport::{ManualClock, read_cr_line};
use pmoigd::url::get_tag_content;
use pmoigd::{
    Clock, GatewayStream, HostNetwork, IgdClient, SsdpSocket, TransportError,
};

pub const GATEWAY_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 1);
pub const LOCAL_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);
pub const DESCRIPTION_PORT: u16 = 5000;
pub const SERVICE_TYPE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

pub fn igd_search_reply() -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=120\r\n\
         ST: urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
         USN: uuid:router::urn:schemas-upnp-org:device:InternetGatewayDevice:1\r\n\
         EXT:\r\n\
         SERVER: Linux/3.14 UPnP/1.1 MiniUPnPd/2.1\r\n\
         LOCATION: http://{}:{}/rootDesc.xml\r\n\
         \r\n",
        GATEWAY_IP, DESCRIPTION_PORT
    )
}

pub fn description_xml() -> String {
    [
        "<?xml version=\"1.0\"?>",
        "<root xmlns=\"urn:schemas-upnp-org:device-1-0\">",
        "<device>",
        "<deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1</deviceType>",
        "<serviceList><service>",
        "<serviceType>urn:schemas-upnp-org:service:Layer3Forwarding:1</serviceType>",
        "<controlURL>/ctl/L3F</controlURL>",
        "</service></serviceList>",
        "<deviceList><device>",
        "<deviceType>urn:schemas-upnp-org:device:WANConnectionDevice:1</deviceType>",
        "<serviceList><service>",
        "<serviceType>urn:schemas-upnp-org:service:WANIPConnection:1</serviceType>",
        "<serviceId>urn:upnp-org:serviceId:WANIPConn1</serviceId>",
        "<controlURL>/ctl/IPConn</controlURL>",
        "<eventSubURL>/evt/IPConn</eventSubURL>",
        "</service></serviceList>",
        "</device></deviceList>",
        "</device>",
        "</root>",
    ]
    .join("\r\n")
}

// ---------------------------------------------------------------------------
// SSDP
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct SsdpState {
    pub sent: Vec<String>,
    pub queued: VecDeque<(Vec<u8>, SocketAddr)>,
    /// Réponse émise après chaque M-SEARCH ciblant un IGD
    pub igd_answer: Option<(SocketAddr, String)>,
    pub joins: usize,
}

#[derive(Clone, Default)]
pub struct MockSsdp {
    pub state: Rc<RefCell<SsdpState>>,
}

impl MockSsdp {
    pub fn answering_gateway() -> Self {
        let ssdp = Self::default();
        ssdp.state.borrow_mut().igd_answer = Some((
            SocketAddr::V4(SocketAddrV4::new(GATEWAY_IP, 1900)),
            igd_search_reply(),
        ));
        ssdp
    }

    pub fn queue_reply(&self, from: Ipv4Addr, payload: &str) {
        self.state
            .borrow_mut()
            .queued
            .push_back((payload.as_bytes().to_vec(), SocketAddr::V4(SocketAddrV4::new(from, 1900))));
    }

    /// Nombre de datagrammes M-SEARCH émis.
    pub fn msearch_count(&self) -> usize {
        self.state
            .borrow()
            .sent
            .iter()
            .filter(|m| m.starts_with("M-SEARCH * HTTP/1.1\r\n"))
            .count()
    }
}

impl SsdpSocket for MockSsdp {
    fn join_multicast(&mut self) -> Result<(), TransportError> {
        self.state.borrow_mut().joins += 1;
        Ok(())
    }

    fn send_multicast(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let message = String::from_utf8_lossy(payload).into_owned();
        let mut state = self.state.borrow_mut();
        if message.contains("InternetGatewayDevice") || message.contains("WAN") {
            if let Some((from, answer)) = state.igd_answer.clone() {
                state.queued.push_back((answer.into_bytes(), from));
            }
        }
        state.sent.push(message);
        Ok(())
    }

    fn recv_from(
        &mut self,
        buf: &mut [u8],
        _wait: Duration,
    ) -> Result<(usize, SocketAddr), TransportError> {
        let (payload, from) = self
            .state
            .borrow_mut()
            .queued
            .pop_front()
            .ok_or(TransportError::Timeout)?;
        let n = payload.len().min(buf.len());
        buf[..n].copy_from_slice(&payload[..n]);
        Ok((n, from))
    }

    fn close(&mut self) {
        self.state.borrow_mut().queued.clear();
    }
}

// ---------------------------------------------------------------------------
// Routeur
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    pub port: u16,
    pub protocol: String,
    pub client: String,
    pub description: String,
    pub lease: u32,
}

#[derive(Debug, Clone)]
pub struct Request {
    pub peer: SocketAddrV4,
    /// `GET` pour la description, sinon le nom de l'action SOAP
    pub action: String,
    pub raw: String,
}

pub struct RouterState {
    pub description: String,
    pub mappings: Vec<Mapping>,
    pub requests: Vec<Request>,
    pub connects: usize,
    /// Répond OK aux AddPortMapping sans rien enregistrer
    pub ignore_adds: bool,
    pub refuse_connections: bool,
    /// Nombre de connexions à refuser avant d'accepter
    pub refuse_next: usize,
}

impl Default for RouterState {
    fn default() -> Self {
        Self {
            description: description_xml(),
            mappings: Vec::new(),
            requests: Vec::new(),
            connects: 0,
            ignore_adds: false,
            refuse_connections: false,
            refuse_next: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockRouter {
    pub state: Rc<RefCell<RouterState>>,
}

impl MockRouter {
    pub fn stream(&self) -> MockGatewayStream {
        MockGatewayStream {
            router: self.clone(),
            peer: None,
            pending: Cursor::new(Vec::new()),
            partial: Vec::new(),
            keep_alive: false,
        }
    }

    pub fn add_mapping(&self, port: u16, protocol: &str, client: Ipv4Addr, description: &str) {
        self.state.borrow_mut().mappings.push(Mapping {
            port,
            protocol: protocol.to_string(),
            client: client.to_string(),
            description: description.to_string(),
            lease: 3600,
        });
    }

    pub fn mapping(&self, port: u16, protocol: &str) -> Option<Mapping> {
        self.state
            .borrow()
            .mappings
            .iter()
            .find(|m| m.port == port && m.protocol == protocol)
            .cloned()
    }

    /// Actions SOAP reçues, dans l'ordre (hors description).
    pub fn soap_actions(&self) -> Vec<String> {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| r.action != "GET")
            .map(|r| r.action.clone())
            .collect()
    }

    pub fn description_fetches(&self) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| r.action == "GET")
            .count()
    }

    pub fn requests_of(&self, action: &str) -> Vec<Request> {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|r| r.action == action)
            .cloned()
            .collect()
    }

    pub fn request_count(&self) -> usize {
        self.state.borrow().requests.len()
    }

    fn handle(&self, peer: SocketAddrV4, raw: &str) -> (String, bool) {
        let action = if raw.starts_with("GET ") {
            "GET".to_string()
        } else {
            soap_action_name(raw)
        };

        let mut state = self.state.borrow_mut();
        state.requests.push(Request {
            peer,
            action: action.clone(),
            raw: raw.to_string(),
        });

        let port: u16 = get_tag_content(raw, "NewExternalPort").parse().unwrap_or(0);
        let protocol = get_tag_content(raw, "NewProtocol").to_string();
        let position = state
            .mappings
            .iter()
            .position(|m| m.port == port && m.protocol == protocol);

        match action.as_str() {
            "GET" => (
                format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/xml\r\n\r\n{}",
                    state.description
                ),
                false,
            ),
            "GetSpecificPortMappingEntry" => match position {
                Some(i) => {
                    let m = &state.mappings[i];
                    (
                        soap_ok(&format!(
                            "<u:GetSpecificPortMappingEntryResponse xmlns:u=\"{}\">\r\n\
                             <NewInternalPort>{}</NewInternalPort>\r\n\
                             <NewInternalClient>{}</NewInternalClient>\r\n\
                             <NewEnabled>1</NewEnabled>\r\n\
                             <NewPortMappingDescription>{}</NewPortMappingDescription>\r\n\
                             <NewLeaseDuration>{}</NewLeaseDuration>\r\n\
                             </u:GetSpecificPortMappingEntryResponse>",
                            SERVICE_TYPE, m.port, m.client, m.description, m.lease
                        )),
                        false,
                    )
                }
                None => (soap_fault(714, "NoSuchEntryInArray"), false),
            },
            "AddPortMapping" => {
                if !state.ignore_adds {
                    let mapping = Mapping {
                        port,
                        protocol,
                        client: get_tag_content(raw, "NewInternalClient").to_string(),
                        description: get_tag_content(raw, "NewPortMappingDescription").to_string(),
                        lease: get_tag_content(raw, "NewLeaseDuration").parse().unwrap_or(0),
                    };
                    match position {
                        Some(i) => state.mappings[i] = mapping,
                        None => state.mappings.push(mapping),
                    }
                }
                (
                    soap_ok(&format!("<u:AddPortMappingResponse xmlns:u=\"{}\"/>", SERVICE_TYPE)),
                    false,
                )
            }
            "DeletePortMapping" => match position {
                Some(i) => {
                    state.mappings.remove(i);
                    (
                        soap_ok(&format!(
                            "<u:DeletePortMappingResponse xmlns:u=\"{}\"/>",
                            SERVICE_TYPE
                        )),
                        false,
                    )
                }
                None => (soap_fault(714, "NoSuchEntryInArray"), false),
            },
            "GetGenericPortMappingEntry" => {
                let index: usize = get_tag_content(raw, "NewPortMappingIndex").parse().unwrap_or(usize::MAX);
                match state.mappings.get(index) {
                    Some(m) => (
                        soap_ok(&format!(
                            "<u:GetGenericPortMappingEntryResponse xmlns:u=\"{}\">\r\n\
                             <NewRemoteHost></NewRemoteHost>\r\n\
                             <NewExternalPort>{}</NewExternalPort>\r\n\
                             <NewProtocol>{}</NewProtocol>\r\n\
                             <NewInternalPort>{}</NewInternalPort>\r\n\
                             <NewInternalClient>{}</NewInternalClient>\r\n\
                             <NewEnabled>1</NewEnabled>\r\n\
                             <NewPortMappingDescription>{}</NewPortMappingDescription>\r\n\
                             <NewLeaseDuration>{}</NewLeaseDuration>\r\n\
                             </u:GetGenericPortMappingEntryResponse>",
                            SERVICE_TYPE, m.port, m.protocol, m.port, m.client, m.description, m.lease
                        )),
                        true,
                    ),
                    None => (soap_fault(713, "SpecifiedArrayIndexInvalid"), true),
                }
            }
            _ => (soap_fault(401, "Invalid Action"), false),
        }
    }
}

fn soap_action_name(raw: &str) -> String {
    raw.lines()
        .find_map(|line| line.strip_prefix("SOAPAction: \""))
        .and_then(|value| value.split('#').nth(1))
        .map(|name| name.trim_end_matches('"').to_string())
        .unwrap_or_default()
}

fn soap_ok(inner: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/xml; charset=\"utf-8\"\r\n\r\n\
         <?xml version=\"1.0\"?>\r\n\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\r\n\
         <s:Body>\r\n{}\r\n</s:Body>\r\n</s:Envelope>\r\n",
        inner
    )
}

fn soap_fault(code: u32, description: &str) -> String {
    format!(
        "HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/xml; charset=\"utf-8\"\r\n\r\n\
         <?xml version=\"1.0\"?>\r\n\
         <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">\r\n\
         <s:Body>\r\n<s:Fault>\r\n<faultcode>s:Client</faultcode>\r\n<faultstring>UPnPError</faultstring>\r\n\
         <detail>\r\n<UPnPError xmlns=\"urn:schemas-upnp-org:control-1-0\">\r\n\
         <errorCode>{}</errorCode>\r\n\
         <errorDescription>{}</errorDescription>\r\n\
         </UPnPError>\r\n</detail>\r\n</s:Fault>\r\n</s:Body>\r\n</s:Envelope>\r\n",
        code, description
    )
}

/// Flux TCP simulé vers [`MockRouter`].
pub struct MockGatewayStream {
    router: MockRouter,
    peer: Option<SocketAddrV4>,
    pending: Cursor<Vec<u8>>,
    partial: Vec<u8>,
    keep_alive: bool,
}

impl MockGatewayStream {
    fn remaining(&self) -> usize {
        self.pending.get_ref().len() - self.pending.position() as usize
    }
}

impl GatewayStream for MockGatewayStream {
    fn connect(&mut self, addr: SocketAddrV4, _timeout: Duration) -> Result<(), TransportError> {
        let mut state = self.router.state.borrow_mut();
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        if state.refuse_connections || *addr.ip() != GATEWAY_IP {
            return Err(TransportError::Io(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        state.connects += 1;
        self.peer = Some(addr);
        self.pending = Cursor::new(Vec::new());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    fn peer(&self) -> Option<SocketAddrV4> {
        self.peer
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let peer = self.peer.ok_or(TransportError::NotConnected)?;
        let raw = String::from_utf8_lossy(data).into_owned();
        let (reply, keep_alive) = self.router.handle(peer, &raw);
        self.pending = Cursor::new(reply.into_bytes());
        self.keep_alive = keep_alive;
        Ok(())
    }

    fn wait_readable(&mut self, _timeout: Duration) -> Result<(), TransportError> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        if self.remaining() == 0 {
            return Err(TransportError::Timeout);
        }
        Ok(())
    }

    fn read_line(&mut self, _idle: Duration) -> Result<Option<String>, TransportError> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        match read_cr_line(&mut self.pending, &mut self.partial)? {
            Some(line) => Ok(Some(line)),
            None if self.keep_alive => Err(TransportError::Timeout),
            None => Ok(None),
        }
    }

    fn close(&mut self) {
        self.peer = None;
        self.pending = Cursor::new(Vec::new());
    }
}

// ---------------------------------------------------------------------------
// Hôte
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct MockHost {
    pub local_ip: Rc<Cell<Ipv4Addr>>,
    pub gateway: Option<Ipv4Addr>,
    pub connected: Rc<Cell<bool>>,
}

impl Default for MockHost {
    fn default() -> Self {
        Self {
            local_ip: Rc::new(Cell::new(LOCAL_IP)),
            gateway: Some(GATEWAY_IP),
            connected: Rc::new(Cell::new(true)),
        }
    }
}

impl HostNetwork for MockHost {
    fn local_ip(&self) -> Ipv4Addr {
        self.local_ip.get()
    }

    fn gateway_ip(&self) -> Option<Ipv4Addr> {
        self.gateway
    }

    fn check_connectivity(&self, _timeout: Duration) -> bool {
        self.connected.get()
    }
}

// ---------------------------------------------------------------------------
// Banc de test
// ---------------------------------------------------------------------------

pub type TestClient = IgdClient<MockSsdp, MockGatewayStream, MockHost, ManualClock>;

pub struct Harness {
    pub ssdp: MockSsdp,
    pub router: MockRouter,
    pub host: MockHost,
    pub clock: ManualClock,
    pub client: TestClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_millis(20000))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        init_logging();
        let ssdp = MockSsdp::answering_gateway();
        let router = MockRouter::default();
        let host = MockHost::default();
        let clock = ManualClock::new();
        let client = IgdClient::with_transports(
            ssdp.clone(),
            router.stream(),
            host.clone(),
            clock.clone(),
            timeout,
        );
        Self {
            ssdp,
            router,
            host,
            clock,
            client,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
