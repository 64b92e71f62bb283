//! Interprétation des réponses SOAP, ligne par ligne.
//!
//! L'invocateur ne juge pas le succès d'une action : il rend les lignes
//! brutes et ces fonctions décident, par simple recherche de sous-chaînes.

use std::net::Ipv4Addr;

use tracing::debug;

use crate::rule::PortMappingEntry;
use crate::url::get_tag_content;

/// Lignes de la réponse HTTP, découpées sur `\r`.
pub type ReplyLines = Vec<String>;

const ERROR_CODE: &str = "errorCode";
const INVALID_INDEX: &str = "<errorDescription>SpecifiedArrayIndexInvalid</errorDescription>";
const INVALID_ACTION: &str = "<errorDescription>Invalid Action</errorDescription>";
const INTERNAL_SERVER_ERROR: &str = "HTTP/1.1 500 ";

/// Résultat d'un `GetSpecificPortMappingEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// La redirection existe et pointe vers l'adresse attendue
    Found,
    /// Pas de redirection (ou erreur SOAP)
    NotFound,
    /// La redirection existe mais vers une autre adresse
    IpChanged(String),
}

pub fn interpret_verify(lines: &[String], expected: Ipv4Addr) -> VerifyOutcome {
    let expected = expected.to_string();
    let mut found = false;
    let mut other: Option<String> = None;

    for line in lines {
        if line.contains(ERROR_CODE) {
            debug!("Verification reply carries an error: {}", line.trim());
            return VerifyOutcome::NotFound;
        }
        if line.contains("NewInternalClient") {
            let content = get_tag_content(line, "NewInternalClient");
            if content == expected {
                found = true;
            } else {
                other = Some(content.to_string());
            }
        }
    }

    match (found, other) {
        (true, _) => VerifyOutcome::Found,
        (false, Some(ip)) => VerifyOutcome::IpChanged(ip),
        (false, None) => VerifyOutcome::NotFound,
    }
}

pub fn add_succeeded(lines: &[String]) -> bool {
    !lines.iter().any(|line| line.contains(ERROR_CODE))
}

pub fn delete_succeeded(lines: &[String]) -> bool {
    for line in lines {
        if line.contains(ERROR_CODE) {
            return false;
        }
        if line.contains("DeletePortMappingResponse") {
            return true;
        }
    }
    false
}

/// Résultat d'un `GetGenericPortMappingEntry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenericEntryReply {
    Entry(PortMappingEntry),
    /// Le routeur signale la fin de sa table
    NoMoreEntries,
    /// Aucune entrée exploitable dans la réponse
    Empty,
}

fn tag_number<T: std::str::FromStr + Default>(line: &str, tag: &str) -> T {
    get_tag_content(line, tag).trim().parse().unwrap_or_default()
}

/// Reconstruit l'entrée `index` de la table du routeur.
///
/// Une même ligne peut porter plusieurs balises : certains routeurs
/// renvoient tout le corps XML sans retour chariot.
pub fn parse_generic_entry(lines: &[String], index: u32) -> GenericEntryReply {
    let mut entry: Option<PortMappingEntry> = None;

    for line in lines {
        if line.contains(INVALID_INDEX) {
            return GenericEntryReply::NoMoreEntries;
        }
        if line.contains(INVALID_ACTION) {
            debug!("Invalid action while reading port mappings");
            return GenericEntryReply::NoMoreEntries;
        }
        if line.contains(INTERNAL_SERVER_ERROR) {
            debug!("Internal server error, likely past the last port mapping");
            return GenericEntryReply::NoMoreEntries;
        }

        if entry.is_none() && line.contains("GetGenericPortMappingEntryResponse") {
            entry = Some(PortMappingEntry {
                index,
                ..PortMappingEntry::default()
            });
        }
        let Some(current) = entry.as_mut() else {
            continue;
        };

        if line.contains("<NewPortMappingDescription>") {
            current.description = get_tag_content(line, "NewPortMappingDescription").to_string();
        }
        if line.contains("<NewInternalClient>") {
            current.internal_client = get_tag_content(line, "NewInternalClient").trim().parse().ok();
        }
        if line.contains("<NewInternalPort>") {
            current.internal_port = tag_number(line, "NewInternalPort");
        }
        if line.contains("<NewExternalPort>") {
            current.external_port = tag_number(line, "NewExternalPort");
        }
        if line.contains("<NewProtocol>") {
            current.protocol = get_tag_content(line, "NewProtocol").to_string();
        }
        if line.contains("<NewLeaseDuration>") {
            current.lease = tag_number(line, "NewLeaseDuration");
            if let Some(complete) = entry.take() {
                return GenericEntryReply::Entry(complete);
            }
        }
    }

    GenericEntryReply::Empty
}
