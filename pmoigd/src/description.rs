//! Lecture de la description du device pour trouver le point de contrôle SOAP.

use std::time::Duration;

use tracing::{debug, info};

use crate::errors::{IgdError, IgdResult};
use crate::gateway::GatewayInfo;
use crate::soap::{await_reply, connect_with_retry, next_reply_line};
use crate::ssdp::{GatewayLocation, IGD_SEARCH_TARGETS};
use crate::transport::{Clock, GatewayStream};
use crate::url::{get_tag_content, url_port};

/// Requête HTTP de la description.
///
/// L'en-tête `Host` porte le port d'action, égal au port de la description
/// tant qu'aucun `URLBase` n'a été lu.
pub fn description_request(gateway: &GatewayInfo) -> String {
    format!(
        "GET {} HTTP/1.1\r\n\
         Content-Type: text/xml; charset=\"utf-8\"\r\n\
         Host: {}:{}\r\n\
         Content-Length: 0\r\n\
         \r\n",
        gateway.path, gateway.host, gateway.action_port
    )
}

/// Analyse incrémentale de la description, une ligne à la fois.
#[derive(Debug, Default)]
pub struct DescriptionScanner {
    url_base_port: Option<u16>,
    service_type: Option<String>,
    control_url: Option<String>,
}

impl DescriptionScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, line: &str) {
        if self.url_base_port.is_none() && line.contains("<URLBase>") {
            let base = get_tag_content(line, "URLBase").trim();
            if !base.is_empty() {
                let port = url_port(base);
                debug!("URLBase tag found [{}], action port [{}]", base, port);
                self.url_base_port = Some(port);
            }
        }

        let mut control_search_start = 0;
        if self.service_type.is_none() {
            for target in IGD_SEARCH_TARGETS {
                let tag = format!("<serviceType>{}", target);
                if let Some(idx) = line.find(&tag) {
                    let service_type = get_tag_content(&line[idx..], "serviceType");
                    debug!("[{}] service found", service_type);
                    self.service_type = Some(service_type.to_string());
                    control_search_start = idx;
                    break;
                }
            }
        }

        if self.service_type.is_some() && self.control_url.is_none() {
            let rest = &line[control_search_start..];
            if let Some(idx) = rest.find("<controlURL>") {
                let control_url = get_tag_content(&rest[idx..], "controlURL");
                if !control_url.is_empty() {
                    debug!("controlURL tag found [{}]", control_url);
                    self.control_url = Some(control_url.to_string());
                }
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.service_type.is_some() && self.control_url.is_some()
    }

    /// Reporte le résultat dans `gateway` ; `false` si l'analyse est incomplète.
    pub fn apply(self, gateway: &mut GatewayInfo) -> bool {
        let (Some(service_type), Some(control_url)) = (self.service_type, self.control_url) else {
            return false;
        };
        if let Some(port) = self.url_base_port {
            gateway.action_port = port;
        }
        gateway.service_type = service_type;
        gateway.action_path = control_url;
        true
    }
}

/// Télécharge la description désignée par `location` et en extrait le point
/// de contrôle SOAP.
pub fn resolve_control_endpoint<S, C>(
    stream: &mut S,
    clock: &C,
    location: &GatewayLocation,
    timeout: Duration,
) -> IgdResult<GatewayInfo>
where
    S: GatewayStream,
    C: Clock,
{
    let mut gateway = GatewayInfo::from_location(location);

    connect_with_retry(stream, clock, gateway.description_addr(), timeout)?;

    let request = description_request(&gateway);
    if let Err(e) = stream.write_all(request.as_bytes()) {
        stream.close();
        return Err(IgdError::from_transport("requesting the device description", e));
    }
    await_reply(stream, "waiting for the device description")?;

    let mut scanner = DescriptionScanner::new();
    while let Some(line) = next_reply_line(stream, false) {
        scanner.feed(&line);
        if scanner.is_complete() {
            break;
        }
    }

    let complete = scanner.is_complete();
    if complete {
        debug!("Flushing the rest of the description");
        while next_reply_line(stream, false).is_some() {}
    }
    stream.close();

    if !complete || !scanner.apply(&mut gateway) {
        return Err(IgdError::Network(format!(
            "no IGD service with a controlURL in the description at {}",
            location
        )));
    }

    info!("✅ IGD control endpoint resolved: {}", gateway);
    Ok(gateway)
}
