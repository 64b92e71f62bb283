//! Règles de redirection souhaitées et entrées lues sur le routeur.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Protocole d'une redirection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[serde(alias = "tcp")]
    Tcp,
    #[serde(alias = "udp")]
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            other => Err(format!("unknown protocol '{}'", other)),
        }
    }
}

/// Destinataire interne d'une redirection.
///
/// `LocalHost` suit l'IP courante de la machine : elle est substituée au
/// moment de chaque requête.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InternalClient {
    LocalHost,
    Fixed(Ipv4Addr),
}

impl InternalClient {
    pub fn resolve(&self, local_ip: Ipv4Addr) -> Ipv4Addr {
        match self {
            InternalClient::LocalHost => local_ip,
            InternalClient::Fixed(ip) => *ip,
        }
    }
}

impl fmt::Display for InternalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalClient::LocalHost => f.write_str("self"),
            InternalClient::Fixed(ip) => write!(f, "{}", ip),
        }
    }
}

impl FromStr for InternalClient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("self") {
            return Ok(InternalClient::LocalHost);
        }
        let ip: Ipv4Addr = s
            .parse()
            .map_err(|_| format!("invalid internal address '{}'", s))?;
        if ip.is_unspecified() {
            Ok(InternalClient::LocalHost)
        } else {
            Ok(InternalClient::Fixed(ip))
        }
    }
}

/// Redirection souhaitée. Le port externe est toujours égal au port interne.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMappingRule {
    pub index: usize,
    pub internal_client: InternalClient,
    pub port: u16,
    pub protocol: Protocol,
    /// Durée du bail en secondes (0 : permanent)
    pub lease: u32,
    pub name: String,
}

impl PortMappingRule {
    pub fn internal_ip(&self, local_ip: Ipv4Addr) -> Ipv4Addr {
        self.internal_client.resolve(local_ip)
    }
}

impl fmt::Display for PortMappingRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4}{:<24}{:<17}{:<7}{:<6}{}",
            self.index, self.name, self.internal_client, self.port, self.protocol, self.lease
        )
    }
}

/// Règles enregistrées, dans l'ordre d'enregistrement.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<PortMappingRule>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ajoute une règle ; une adresse fixe égale à `local_ip` devient
    /// [`InternalClient::LocalHost`].
    pub fn register(
        &mut self,
        internal_client: InternalClient,
        port: u16,
        protocol: Protocol,
        lease: u32,
        name: &str,
        local_ip: Ipv4Addr,
    ) -> &PortMappingRule {
        let internal_client = match internal_client {
            InternalClient::Fixed(ip) if ip == local_ip => InternalClient::LocalHost,
            other => other,
        };
        let index = self.rules.len();
        self.rules.push(PortMappingRule {
            index,
            internal_client,
            port,
            protocol,
            lease,
            name: name.to_string(),
        });
        &self.rules[index]
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn get(&self, index: usize) -> Option<&PortMappingRule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PortMappingRule> {
        self.rules.iter()
    }
}

/// Avancement de la réconciliation d'une règle pendant un cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    NotVerified,
    /// Ajout envoyé, `attempts` re-vérifications déjà faites
    AddInFlight { attempts: u32 },
    Verified { added: bool },
    Failed { attempts: u32 },
}

/// Redirection telle que rapportée par `GetGenericPortMappingEntry`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortMappingEntry {
    pub index: u32,
    pub description: String,
    pub internal_client: Option<Ipv4Addr>,
    pub internal_port: u16,
    pub external_port: u16,
    pub protocol: String,
    pub lease: u32,
}

impl fmt::Display for PortMappingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let client = self
            .internal_client
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        write!(
            f,
            "{:<4}{:<24}{:<17}{:<7}{:<7}{:<6}{}",
            self.index,
            self.description,
            client,
            self.internal_port,
            self.external_port,
            self.protocol,
            self.lease
        )
    }
}
