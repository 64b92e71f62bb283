//! Extension pour intégrer la configuration IGD dans pmoconfig
//!
//! Ce module fournit le trait `IgdConfigExt`, qui ajoute à
//! `pmoconfig::Config` des accesseurs typés pour la section `igd`, et la
//! construction d'un [`SystemIgdClient`] à partir de la configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use pmoconfig::Config;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::info;

use crate::client::{DEFAULT_DISCOVERY_TIMEOUT, DEFAULT_TIMEOUT, SystemIgdClient};
use crate::rule::{InternalClient, Protocol};
use crate::transport::{DEFAULT_CONNECTIVITY_PROBE, SystemClock, SystemHost, TcpGatewayStream, UdpSsdpSocket};

const DEFAULT_UPDATE_INTERVAL_MS: u64 = 60000;

/// Règle de redirection telle qu'écrite dans `igd.rules`.
///
/// ```yaml
/// igd:
///   rules:
///     - address: self
///       port: 8088
///       protocol: TCP
///       lease: 36000
///       name: Blah
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default = "default_address")]
    pub address: String,
    pub port: u16,
    #[serde(default = "default_protocol")]
    pub protocol: Protocol,
    #[serde(default)]
    pub lease: u32,
    pub name: String,
}

fn default_address() -> String {
    "self".to_string()
}

fn default_protocol() -> Protocol {
    Protocol::Tcp
}

impl RuleConfig {
    pub fn internal_client(&self) -> Result<InternalClient> {
        self.address
            .parse::<InternalClient>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Invalid address for rule '{}'", self.name))
    }
}

/// Trait d'extension pour ajouter la configuration IGD à pmoconfig
///
/// # Exemple
///
/// ```rust,ignore
/// use pmoconfig::get_config;
/// use pmoigd::IgdConfigExt;
///
/// let config = get_config();
/// let interval = config.get_igd_update_interval();
/// let rules = config.get_igd_rules()?;
/// ```
pub trait IgdConfigExt {
    /// Délai global d'un cycle de réconciliation (défaut: 20 s)
    fn get_igd_timeout(&self) -> Duration;

    fn set_igd_timeout(&self, timeout: Duration) -> Result<()>;

    /// Période de `update` (défaut: 60 s)
    fn get_igd_update_interval(&self) -> Duration;

    fn set_igd_update_interval(&self, interval: Duration) -> Result<()>;

    /// Attente des réponses SSDP (défaut: 5 s)
    fn get_igd_discovery_timeout(&self) -> Duration;

    /// Adresse sondée pour tester la connectivité ; `None` si désactivée
    fn get_igd_connectivity_probe(&self) -> Result<Option<SocketAddr>>;

    /// Passerelle imposée ; `None` pour la détecter
    fn get_igd_gateway(&self) -> Result<Option<Ipv4Addr>>;

    fn get_igd_rules(&self) -> Result<Vec<RuleConfig>>;

    fn set_igd_rules(&self, rules: &[RuleConfig]) -> Result<()>;
}

fn millis(config: &Config, key: &str, default: u64) -> Duration {
    Duration::from_millis(config.get_u64(&["igd", key], default))
}

impl IgdConfigExt for Config {
    fn get_igd_timeout(&self) -> Duration {
        millis(self, "timeout_ms", DEFAULT_TIMEOUT.as_millis() as u64)
    }

    fn set_igd_timeout(&self, timeout: Duration) -> Result<()> {
        self.set_u64(&["igd", "timeout_ms"], timeout.as_millis() as u64)
    }

    fn get_igd_update_interval(&self) -> Duration {
        millis(self, "update_interval_ms", DEFAULT_UPDATE_INTERVAL_MS)
    }

    fn set_igd_update_interval(&self, interval: Duration) -> Result<()> {
        self.set_u64(&["igd", "update_interval_ms"], interval.as_millis() as u64)
    }

    fn get_igd_discovery_timeout(&self) -> Duration {
        millis(
            self,
            "discovery_timeout_ms",
            DEFAULT_DISCOVERY_TIMEOUT.as_millis() as u64,
        )
    }

    fn get_igd_connectivity_probe(&self) -> Result<Option<SocketAddr>> {
        let probe = self.get_string(
            &["igd", "connectivity_probe"],
            &DEFAULT_CONNECTIVITY_PROBE.to_string(),
        );
        let probe = probe.trim();
        if probe.is_empty() {
            return Ok(None);
        }
        probe
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid igd.connectivity_probe '{}'", probe))
    }

    fn get_igd_gateway(&self) -> Result<Option<Ipv4Addr>> {
        let gateway = self.get_string(&["igd", "gateway"], "");
        let gateway = gateway.trim();
        if gateway.is_empty() {
            return Ok(None);
        }
        gateway
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid igd.gateway '{}'", gateway))
    }

    fn get_igd_rules(&self) -> Result<Vec<RuleConfig>> {
        match self.get_value(&["igd", "rules"]) {
            Ok(Value::Null) | Err(_) => Ok(Vec::new()),
            Ok(_) => self.get_section(&["igd", "rules"]),
        }
    }

    fn set_igd_rules(&self, rules: &[RuleConfig]) -> Result<()> {
        let value = serde_yaml::to_value(rules).context("Cannot serialize igd.rules")?;
        self.set_value(&["igd", "rules"], value)
    }
}

impl SystemIgdClient {
    /// Construit un client système et enregistre les règles configurées.
    pub fn from_config(config: &Config) -> Result<Self> {
        let host = SystemHost::new(config.get_igd_gateway()?, config.get_igd_connectivity_probe()?);
        let mut client = Self::with_transports(
            UdpSsdpSocket::new(),
            TcpGatewayStream::new(),
            host,
            SystemClock::new(),
            config.get_igd_timeout(),
        );
        client.set_discovery_timeout(config.get_igd_discovery_timeout());

        for rule in config.get_igd_rules()? {
            client.register_rule(rule.internal_client()?, rule.port, rule.protocol, rule.lease, &rule.name);
        }
        info!("IGD client configured with {} rule(s)", client.rules().count());
        Ok(client)
    }
}
