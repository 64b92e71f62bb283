//! Enveloppes SOAP des actions WANIPConnection utilisées par le client.
//!
//! Les octets envoyés sont figés : certains routeurs ne comprennent que la
//! forme exacte de ces messages (retours à la ligne compris).

use std::net::Ipv4Addr;

use quick_xml::escape::escape;

use crate::gateway::GatewayInfo;
use crate::rule::Protocol;

const ENVELOPE_OPEN: &str = "<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
                             s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\">";

/// Action SOAP et ses arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapAction {
    GetSpecificPortMappingEntry {
        port: u16,
        protocol: Protocol,
    },
    AddPortMapping {
        port: u16,
        protocol: Protocol,
        internal_client: Ipv4Addr,
        lease: u32,
        description: String,
    },
    DeletePortMapping {
        port: u16,
        protocol: Protocol,
    },
    GetGenericPortMappingEntry {
        index: u32,
    },
}

impl SoapAction {
    pub fn name(&self) -> &'static str {
        match self {
            SoapAction::GetSpecificPortMappingEntry { .. } => "GetSpecificPortMappingEntry",
            SoapAction::AddPortMapping { .. } => "AddPortMapping",
            SoapAction::DeletePortMapping { .. } => "DeletePortMapping",
            SoapAction::GetGenericPortMappingEntry { .. } => "GetGenericPortMappingEntry",
        }
    }

    fn connection_header(&self) -> Option<&'static str> {
        match self {
            SoapAction::GetSpecificPortMappingEntry { .. } | SoapAction::DeletePortMapping { .. } => {
                Some("close")
            }
            SoapAction::GetGenericPortMappingEntry { .. } => Some("keep-alive"),
            SoapAction::AddPortMapping { .. } => None,
        }
    }

    /// Vrai si la requête demande au routeur de garder la connexion ouverte.
    pub fn keeps_alive(&self) -> bool {
        self.connection_header() == Some("keep-alive")
    }

    /// Corps XML de la requête pour le service `service_type`.
    pub fn body(&self, service_type: &str) -> String {
        let name = self.name();
        match self {
            SoapAction::GetSpecificPortMappingEntry { port, protocol }
            | SoapAction::DeletePortMapping { port, protocol } => format!(
                "<?xml version=\"1.0\"?>\r\n{ENVELOPE_OPEN}\r\n<s:Body>\r\n\
                 <u:{name} xmlns:u=\"{service_type}\">\r\n\
                 <NewRemoteHost></NewRemoteHost>\r\n\
                 <NewExternalPort>{port}</NewExternalPort>\r\n\
                 <NewProtocol>{protocol}</NewProtocol>\r\n\
                 </u:{name}>\r\n</s:Body>\r\n</s:Envelope>\r\n"
            ),
            SoapAction::AddPortMapping {
                port,
                protocol,
                internal_client,
                lease,
                description,
            } => format!(
                "<?xml version=\"1.0\"?>{ENVELOPE_OPEN}<s:Body>\
                 <u:{name} xmlns:u=\"{service_type}\">\
                 <NewRemoteHost></NewRemoteHost>\
                 <NewExternalPort>{port}</NewExternalPort>\
                 <NewProtocol>{protocol}</NewProtocol>\
                 <NewInternalPort>{port}</NewInternalPort>\
                 <NewInternalClient>{internal_client}</NewInternalClient>\
                 <NewEnabled>1</NewEnabled>\
                 <NewPortMappingDescription>{description}</NewPortMappingDescription>\
                 <NewLeaseDuration>{lease}</NewLeaseDuration>\
                 </u:{name}></s:Body></s:Envelope>\r\n",
                description = escape(description.as_str()),
            ),
            SoapAction::GetGenericPortMappingEntry { index } => format!(
                "<?xml version=\"1.0\"?>{ENVELOPE_OPEN}<s:Body>\
                 <u:{name} xmlns:u=\"{service_type}\">\
                 <NewPortMappingIndex>{index}</NewPortMappingIndex>\
                 </u:{name}></s:Body></s:Envelope>"
            ),
        }
    }

    /// Requête HTTP complète (en-têtes et corps) vers le point SOAP de `gateway`.
    pub fn request(&self, gateway: &GatewayInfo) -> String {
        let body = self.body(&gateway.service_type);
        let connection = self
            .connection_header()
            .map(|value| format!("Connection: {}\r\n", value))
            .unwrap_or_default();

        format!(
            "POST {path} HTTP/1.1\r\n\
             {connection}\
             Content-Type: text/xml; charset=\"utf-8\"\r\n\
             Host: {host}:{port}\r\n\
             SOAPAction: \"{service_type}#{name}\"\r\n\
             Content-Length: {length}\r\n\
             \r\n\
             {body}",
            path = gateway.action_path,
            host = gateway.host,
            port = gateway.action_port,
            service_type = gateway.service_type,
            name = self.name(),
            length = body.len(),
        )
    }
}
