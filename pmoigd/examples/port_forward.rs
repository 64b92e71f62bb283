//! Maintient les redirections configurées dans `igd.rules`.
//!
//! ```bash
//! cargo run -p pmoigd --example port_forward
//! ```
//!
//! Sans règle configurée, redirige le port TCP 8088 vers cette machine.

use std::thread;
use std::time::Duration;

use pmoconfig::get_config;
use pmoigd::{IgdConfigExt, InternalClient, MappingStatus, Protocol, SystemIgdClient};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = get_config();
    let level = config.get_log_min_level()?.to_lowercase();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let mut client = SystemIgdClient::from_config(&config)?;
    if client.rules().next().is_none() {
        client.register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 36000, "Blah");
    }

    for rule in client.port_mapping_config() {
        println!("{}", rule);
    }

    let interval = config.get_igd_update_interval();
    loop {
        match client.update(interval, None) {
            Ok(MappingStatus::Nop) => {}
            Ok(status) => {
                println!("Update: {:?}", status);
                match client.list_mapped_rules() {
                    Ok(entries) => entries.iter().for_each(|entry| println!("  {}", entry)),
                    Err(e) => eprintln!("Cannot list port mappings: {}", e),
                }
            }
            Err(e) => eprintln!("Update failed: {}", e),
        }
        thread::sleep(Duration::from_millis(500));
    }
}
