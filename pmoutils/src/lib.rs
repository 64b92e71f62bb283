//! Utilitaires réseau pour l'hôte local.
//!
//! Ce crate fournit les quelques informations dont un client UPnP IGD a besoin
//! sur la machine qui l'exécute :
//!
//! - [`guess_local_ip`] : l'adresse IPv4 utilisée pour les connexions sortantes
//! - [`list_all_ips`] : les adresses IPv4 non-loopback par interface
//! - [`default_gateway`] : la passerelle par défaut (le routeur à interroger)
//!
//! # Examples
//!
//! ```no_run
//! use pmoutils::{default_gateway, guess_local_ip};
//!
//! let ip = guess_local_ip();
//! println!("Adresse IP locale: {}", ip);
//! if let Some(gw) = default_gateway() {
//!     println!("Passerelle: {}", gw);
//! }
//! ```
mod gateway;
mod ip_utils;

pub use gateway::{default_gateway, parse_route_table};
pub use ip_utils::{guess_local_ip, list_all_ips};
