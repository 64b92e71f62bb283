//! Détection de la passerelle par défaut.
//!
//! Sous Linux la table de routage du noyau est exposée dans `/proc/net/route` :
//!
//! ```text
//! Iface   Destination Gateway  Flags RefCnt Use Metric Mask     MTU Window IRTT
//! wlan0   00000000    0101A8C0 0003  0      0   600    00000000 0   0      0
//! ```
//!
//! Les adresses sont des entiers 32 bits en hexadécimal, dans l'ordre des octets
//! de l'hôte (little-endian sur toutes les cibles courantes).

use std::net::Ipv4Addr;

use tracing::debug;

const ROUTE_TABLE_PATH: &str = "/proc/net/route";

/// Retourne l'adresse IPv4 de la passerelle par défaut, si elle est connue.
///
/// Retourne `None` sur les plateformes sans `/proc/net/route` ou si aucune
/// route par défaut n'est active.
pub fn default_gateway() -> Option<Ipv4Addr> {
    match std::fs::read_to_string(ROUTE_TABLE_PATH) {
        Ok(table) => parse_route_table(&table),
        Err(e) => {
            debug!("Cannot read {}: {}", ROUTE_TABLE_PATH, e);
            None
        }
    }
}

/// Extrait la passerelle de la première route par défaut active d'une table
/// au format `/proc/net/route`.
pub fn parse_route_table(table: &str) -> Option<Ipv4Addr> {
    for line in table.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }

        let (destination, gateway, flags) = (fields[1], fields[2], fields[3]);
        if destination != "00000000" {
            continue;
        }

        // RTF_UP (0x1) et RTF_GATEWAY (0x2)
        let Ok(flags) = u32::from_str_radix(flags, 16) else {
            continue;
        };
        if flags & 0x3 != 0x3 {
            continue;
        }

        let Ok(raw) = u32::from_str_radix(gateway, 16) else {
            continue;
        };
        let ip = Ipv4Addr::from(raw.to_le_bytes());
        if !ip.is_unspecified() {
            return Some(ip);
        }
    }
    None
}
