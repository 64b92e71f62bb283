//! Client IGD : enregistrement des règles et réconciliation avec le routeur.
//!
//! Un cycle de réconciliation ([`IgdClient::commit`]) :
//!
//! 1. vérifie la connectivité de l'hôte ;
//! 2. découvre la passerelle (SSDP puis description) si elle n'est pas connue ;
//! 3. pour chaque règle, dans l'ordre d'enregistrement : vérifie, ajoute si
//!    besoin, puis re-vérifie jusqu'à trois fois.
//!
//! [`IgdClient::update`] cadence ces cycles et déclenche un repli après une
//! série d'échecs.

use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::description::resolve_control_endpoint;
use crate::errors::{IgdError, IgdResult};
use crate::gateway::GatewayInfo;
use crate::rule::{InternalClient, PortMappingEntry, PortMappingRule, Protocol, RuleRegistry, RuleState};
use crate::scheduler::{MAX_UPDATES_WITH_NO_EFFECT, UpdateScheduler};
use crate::soap::{
    GenericEntryReply, SoapAction, TCP_CONNECTION_TIMEOUT, VerifyOutcome, add_succeeded,
    delete_succeeded, interpret_verify, invoke_action, parse_generic_entry,
};
use crate::ssdp::{SsdpDevice, discover_gateway, list_devices};
use crate::transport::{
    Clock, DEFAULT_CONNECTIVITY_PROBE, GatewayStream, HostNetwork, SsdpSocket, SystemClock,
    SystemHost, TcpGatewayStream, UdpSsdpSocket,
};

/// Délai global par défaut d'un cycle.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(20000);

/// Délai par défaut d'attente des réponses SSDP.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Nombre de re-vérifications après un ajout.
pub const VERIFY_RETRIES: u32 = 3;

const VERIFY_RETRY_DELAY: Duration = Duration::from_millis(2000);
const SETTLE_DELAY: Duration = Duration::from_millis(1000);
const LIST_QUERY_DELAY: Duration = Duration::from_millis(250);

/// Nombre maximal d'entrées lues dans la table du routeur.
pub const MAX_LISTED_ENTRIES: u32 = 128;

/// Issue d'un cycle qui n'a pas échoué.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingStatus {
    /// Au moins une redirection a été ajoutée
    Success,
    /// Toutes les redirections existaient déjà
    AlreadyMapped,
    /// Pas encore l'heure : aucun échange réseau
    Nop,
}

/// Client de redirection de ports UPnP IGD.
///
/// Le client est générique sur ses transports ; [`SystemIgdClient`] utilise
/// les sockets du système.
pub struct IgdClient<U, S, H, C> {
    udp: U,
    tcp: S,
    host: H,
    clock: C,
    rules: RuleRegistry,
    gateway: GatewayInfo,
    scheduler: UpdateScheduler,
    timeout: Duration,
    discovery_timeout: Duration,
    needs_rediscovery: bool,
}

/// Client branché sur le réseau réel.
pub type SystemIgdClient = IgdClient<UdpSsdpSocket, TcpGatewayStream, SystemHost, SystemClock>;

impl SystemIgdClient {
    /// Client système avec la sonde de connectivité par défaut.
    pub fn new(timeout: Duration) -> Self {
        Self::with_transports(
            UdpSsdpSocket::new(),
            TcpGatewayStream::new(),
            SystemHost::new(None, Some(DEFAULT_CONNECTIVITY_PROBE)),
            SystemClock::new(),
            timeout,
        )
    }
}

impl<U, S, H, C> IgdClient<U, S, H, C>
where
    U: SsdpSocket,
    S: GatewayStream,
    H: HostNetwork,
    C: Clock,
{
    /// Un `timeout` nul désactive la limite de durée des cycles.
    pub fn with_transports(udp: U, tcp: S, host: H, clock: C, timeout: Duration) -> Self {
        Self {
            udp,
            tcp,
            host,
            clock,
            rules: RuleRegistry::new(),
            gateway: GatewayInfo::default(),
            scheduler: UpdateScheduler::new(),
            timeout,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            needs_rediscovery: false,
        }
    }

    pub fn set_discovery_timeout(&mut self, timeout: Duration) {
        self.discovery_timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Enregistre une redirection et retourne son index.
    pub fn register_rule(
        &mut self,
        internal_client: InternalClient,
        port: u16,
        protocol: Protocol,
        lease: u32,
        name: &str,
    ) -> usize {
        let local_ip = self.host.local_ip();
        let rule = self
            .rules
            .register(internal_client, port, protocol, lease, name, local_ip);
        info!(
            "Port mapping [{}] registered: {} {} -> {}",
            rule.name, rule.protocol, rule.port, rule.internal_client
        );
        rule.index
    }

    pub fn rules(&self) -> impl Iterator<Item = &PortMappingRule> {
        self.rules.iter()
    }

    /// Règles enregistrées, l'adresse locale substituée à `self`.
    pub fn port_mapping_config(&self) -> Vec<PortMappingRule> {
        let local_ip = self.host.local_ip();
        self.rules
            .iter()
            .map(|rule| PortMappingRule {
                internal_client: InternalClient::Fixed(rule.internal_ip(local_ip)),
                ..rule.clone()
            })
            .collect()
    }

    pub fn gateway_info(&self) -> &GatewayInfo {
        &self.gateway
    }

    pub fn test_connectivity(&self) -> bool {
        let timeout = if self.timeout.is_zero() {
            TCP_CONNECTION_TIMEOUT
        } else {
            TCP_CONNECTION_TIMEOUT.min(self.timeout)
        };
        self.host.check_connectivity(timeout)
    }

    /// Lance un cycle de réconciliation complet.
    pub fn commit(&mut self) -> IgdResult<MappingStatus> {
        let result = self.reconcile_all();
        self.tcp.close();

        if self.needs_rediscovery {
            self.needs_rediscovery = false;
            info!("Local IP changed, the gateway will be rediscovered");
            self.gateway.invalidate();
        }
        result
    }

    /// Lance un cycle si `interval` s'est écoulé depuis la dernière tentative.
    ///
    /// Après [`MAX_UPDATES_WITH_NO_EFFECT`] échecs consécutifs, la passerelle
    /// est oubliée, `fallback` est appelé et le cycle retourne un `Timeout`.
    pub fn update(
        &mut self,
        interval: Duration,
        fallback: Option<&mut dyn FnMut()>,
    ) -> IgdResult<MappingStatus> {
        let now = self.clock.now();
        if !self.scheduler.is_due(now, interval) {
            self.tcp.close();
            return Ok(MappingStatus::Nop);
        }

        debug!("Updating port mappings");
        match self.commit() {
            Ok(status) => {
                self.scheduler.record_success(self.clock.now());
                Ok(status)
            }
            Err(e) => {
                warn!("❌ Port mapping update failed: {}", e);
                if !self.scheduler.record_failure(now, interval) {
                    return Err(e);
                }

                warn!(
                    "Too many updates with no effect ({}), forgetting the gateway",
                    MAX_UPDATES_WITH_NO_EFFECT
                );
                self.gateway.invalidate();
                if let Some(fallback) = fallback {
                    debug!("Executing fallback");
                    fallback();
                }
                Err(IgdError::Timeout(format!(
                    "{} consecutive updates failed, last error: {}",
                    MAX_UPDATES_WITH_NO_EFFECT, e
                )))
            }
        }
    }

    /// Lit la table de redirections du routeur.
    pub fn list_mapped_rules(&mut self) -> IgdResult<Vec<PortMappingEntry>> {
        let result = self.read_port_mappings();
        self.tcp.close();
        result
    }

    /// Inventaire des devices SSDP du réseau local.
    pub fn list_ssdp_devices(&mut self, timeout: Duration) -> IgdResult<Vec<SsdpDevice>> {
        list_devices(&mut self.udp, &self.clock, timeout)
    }

    /// Supprime côté routeur la redirection de la règle `index`.
    ///
    /// Retourne `false` si la règle est inconnue ou si le routeur refuse.
    pub fn delete_port_mapping(&mut self, index: usize) -> IgdResult<bool> {
        let Some(rule) = self.rules.get(index).cloned() else {
            warn!("No port mapping rule with index {}", index);
            return Ok(false);
        };

        let result = self.ensure_gateway().map(|_| self.delete_rule(&rule));
        self.tcp.close();
        result
    }

    fn ensure_gateway(&mut self) -> IgdResult<bool> {
        if self.gateway.is_valid() {
            return Ok(false);
        }

        info!("Looking for the IGD");
        let location = discover_gateway(
            &mut self.udp,
            &self.clock,
            self.host.gateway_ip(),
            self.discovery_timeout,
        )
        .map_err(|e| IgdError::Network(format!("gateway discovery failed: {}", e)))?;

        let gateway = resolve_control_endpoint(&mut self.tcp, &self.clock, &location, self.timeout)
            .map_err(|e| IgdError::Network(format!("invalid router info: {}", e)))?;

        if !gateway.is_valid() {
            return Err(IgdError::Network(format!("invalid router info: {}", gateway)));
        }
        self.gateway = gateway;
        Ok(true)
    }

    fn reconcile_all(&mut self) -> IgdResult<MappingStatus> {
        if self.rules.is_empty() {
            warn!("No UPnP port mapping was registered");
            return Err(IgdError::EmptyConfig);
        }

        if !self.test_connectivity() {
            return Err(IgdError::network("host is not connected, cannot continue"));
        }

        if self.ensure_gateway()? {
            self.clock.sleep(SETTLE_DELAY);
        }

        debug!(
            "port [{}] actionPort [{}]",
            self.gateway.port, self.gateway.action_port
        );
        if self.gateway.port != self.gateway.action_port {
            debug!("Connection port changed, disconnecting from IGD");
            self.tcp.close();
        }

        let local_ip = self.host.local_ip();
        let loop_start = self.clock.now();
        let mut added = 0usize;

        for index in 0..self.rules.len() {
            let Some(rule) = self.rules.get(index).cloned() else {
                continue;
            };
            if self.reconcile_rule(&rule, local_ip, loop_start)? {
                added += 1;
            }
        }

        if added == 0 {
            info!("All port mappings were already found in the IGD, not doing anything");
            Ok(MappingStatus::AlreadyMapped)
        } else {
            info!("✅ {} UPnP port mapping(s) added", added);
            Ok(MappingStatus::Success)
        }
    }

    /// Vérifie, ajoute puis re-vérifie une règle. Retourne `true` si elle a dû
    /// être ajoutée.
    fn reconcile_rule(
        &mut self,
        rule: &PortMappingRule,
        local_ip: Ipv4Addr,
        loop_start: Duration,
    ) -> IgdResult<bool> {
        let mut state = RuleState::NotVerified;
        loop {
            state = match state {
                RuleState::NotVerified => {
                    info!("Verify port mapping for rule [{}]", rule.name);
                    if self.verify_port_mapping(rule, local_ip) {
                        RuleState::Verified { added: false }
                    } else {
                        if !self.timeout.is_zero() && self.clock.elapsed(loop_start) >= self.timeout {
                            return Err(IgdError::Timeout(format!(
                                "timeout expired before adding port mapping [{}]",
                                rule.name
                            )));
                        }
                        if !self.add_port_mapping_entry(rule, local_ip) {
                            warn!("AddPortMapping for [{}] was rejected by the IGD", rule.name);
                        }
                        RuleState::AddInFlight { attempts: 0 }
                    }
                }
                RuleState::AddInFlight { attempts } if attempts >= VERIFY_RETRIES => {
                    RuleState::Failed { attempts }
                }
                RuleState::AddInFlight { attempts } => {
                    self.clock.sleep(VERIFY_RETRY_DELAY);
                    if self.verify_port_mapping(rule, local_ip) {
                        RuleState::Verified { added: true }
                    } else {
                        RuleState::AddInFlight {
                            attempts: attempts + 1,
                        }
                    }
                }
                RuleState::Verified { added } => {
                    if added {
                        info!("Port mapping [{}] was added", rule.name);
                    }
                    return Ok(added);
                }
                RuleState::Failed { attempts } => {
                    return Err(IgdError::VerificationFailed(rule.name.clone(), attempts));
                }
            };
        }
    }

    fn verify_port_mapping(&mut self, rule: &PortMappingRule, local_ip: Ipv4Addr) -> bool {
        let action = SoapAction::GetSpecificPortMappingEntry {
            port: rule.port,
            protocol: rule.protocol,
        };
        let lines = match invoke_action(&mut self.tcp, &self.clock, &self.gateway, &action) {
            Ok(lines) => lines,
            Err(e) => {
                debug!("Verification of [{}] failed: {}", rule.name, e);
                return false;
            }
        };

        let expected = rule.internal_ip(local_ip);
        match interpret_verify(&lines, expected) {
            VerifyOutcome::Found => {
                info!("Port mapping [{}] found in IGD", rule.name);
                true
            }
            VerifyOutcome::IpChanged(mapped) => {
                info!(
                    "Detected a change in IP: IGD maps [{}] to [{}], expected [{}]",
                    rule.name, mapped, expected
                );
                self.remove_all_port_mappings();
                self.needs_rediscovery = true;
                false
            }
            VerifyOutcome::NotFound => {
                info!("Could not find port mapping [{}] in IGD", rule.name);
                false
            }
        }
    }

    fn add_port_mapping_entry(&mut self, rule: &PortMappingRule, local_ip: Ipv4Addr) -> bool {
        let action = SoapAction::AddPortMapping {
            port: rule.port,
            protocol: rule.protocol,
            internal_client: rule.internal_ip(local_ip),
            lease: rule.lease,
            description: rule.name.clone(),
        };
        match invoke_action(&mut self.tcp, &self.clock, &self.gateway, &action) {
            Ok(lines) => add_succeeded(&lines),
            Err(e) => {
                debug!("AddPortMapping for [{}] failed: {}", rule.name, e);
                false
            }
        }
    }

    fn delete_rule(&mut self, rule: &PortMappingRule) -> bool {
        let action = SoapAction::DeletePortMapping {
            port: rule.port,
            protocol: rule.protocol,
        };
        let deleted = match invoke_action(&mut self.tcp, &self.clock, &self.gateway, &action) {
            Ok(lines) => delete_succeeded(&lines),
            Err(e) => {
                debug!("DeletePortMapping for [{}] failed: {}", rule.name, e);
                false
            }
        };
        if deleted {
            info!("Port mapping [{}] deleted from IGD", rule.name);
        } else {
            warn!("Could not delete port mapping [{}] from IGD", rule.name);
        }
        deleted
    }

    fn remove_all_port_mappings(&mut self) {
        let rules: Vec<PortMappingRule> = self.rules.iter().cloned().collect();
        for rule in &rules {
            self.delete_rule(rule);
        }
    }

    fn read_port_mappings(&mut self) -> IgdResult<Vec<PortMappingEntry>> {
        self.ensure_gateway()?;

        let mut entries = Vec::new();
        for index in 0..MAX_LISTED_ENTRIES {
            if index > 0 {
                self.clock.sleep(LIST_QUERY_DELAY);
            }

            let action = SoapAction::GetGenericPortMappingEntry { index };
            let lines = match invoke_action(&mut self.tcp, &self.clock, &self.gateway, &action) {
                Ok(lines) => lines,
                Err(e) if entries.is_empty() => return Err(e),
                Err(e) => {
                    debug!("Stopped reading port mappings at index {}: {}", index, e);
                    break;
                }
            };

            match parse_generic_entry(&lines, index) {
                GenericEntryReply::Entry(entry) => {
                    debug!("IGD port mapping {}", entry);
                    entries.push(entry);
                }
                GenericEntryReply::NoMoreEntries | GenericEntryReply::Empty => break,
            }
        }

        info!("{} port mappings found in IGD", entries.len());
        Ok(entries)
    }
}
