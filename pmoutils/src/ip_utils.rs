use get_if_addrs::get_if_addrs;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// Devine l'adresse IPv4 locale de la machine.
///
/// Cette fonction crée un socket UDP et le "connecte" vers un serveur DNS public
/// (8.8.8.8). Aucun paquet n'est émis : le système choisit simplement l'interface
/// qui servirait à joindre Internet, et on lit l'adresse locale du socket.
///
/// # Returns
///
/// L'adresse IPv4 locale, ou `127.0.0.1` si elle ne peut pas être déterminée
/// (pas de route, socket impossible à créer, adresse IPv6).
///
/// # Examples
///
/// ```no_run
/// let ip = pmoutils::guess_local_ip();
/// println!("IP locale détectée: {}", ip);
/// ```
pub fn guess_local_ip() -> Ipv4Addr {
    match UdpSocket::bind("0.0.0.0:0") {
        Ok(socket) => {
            if socket.connect("8.8.8.8:80").is_ok() {
                if let Ok(local_addr) = socket.local_addr() {
                    if let IpAddr::V4(ip) = local_addr.ip() {
                        return ip;
                    }
                }
            }
            Ipv4Addr::LOCALHOST
        }
        Err(_) => Ipv4Addr::LOCALHOST,
    }
}

/// Liste toutes les adresses IPv4 non-loopback des interfaces réseau.
///
/// # Returns
///
/// Une `HashMap` associant le nom de l'interface (ex: `"eth0"`, `"wlan0"`)
/// à ses adresses IPv4. En cas d'erreur lors de l'énumération des interfaces,
/// la map retournée est vide.
pub fn list_all_ips() -> HashMap<String, Vec<Ipv4Addr>> {
    let mut result = HashMap::new();

    match get_if_addrs() {
        Ok(interfaces) => {
            for iface in interfaces {
                if let IpAddr::V4(ip) = iface.ip() {
                    if ip.is_loopback() {
                        continue;
                    }
                    result.entry(iface.name).or_insert_with(Vec::new).push(ip);
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to list network interfaces: {}", e);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_local_ip_is_usable() {
        let ip = guess_local_ip();

        // Soit une vraie adresse, soit le repli loopback
        assert!(!ip.is_unspecified(), "Should never return 0.0.0.0");
    }

    #[test]
    fn test_list_all_ips_no_loopback() {
        let ips = list_all_ips();

        for (_, addresses) in ips.iter() {
            for addr in addresses {
                assert!(!addr.is_loopback(), "Loopback addresses should be filtered out");
            }
        }
    }

    #[test]
    fn test_list_all_ips_interface_names_not_empty() {
        let ips = list_all_ips();

        for (iface_name, _) in ips.iter() {
            assert!(!iface_name.is_empty(), "Interface names should not be empty");
        }
    }
}
