use std::time::Duration;

use pmoigd::SystemIgdClient;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut client = SystemIgdClient::new(Duration::from_secs(20));
    let devices = client.list_ssdp_devices(Duration::from_secs(3))?;

    println!("{} SSDP device(s):", devices.len());
    for device in devices {
        println!("  {}", device);
    }
    Ok(())
}
