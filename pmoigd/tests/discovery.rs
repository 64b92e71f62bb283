mod common;

use std::net::Ipv4Addr;
use std::time::Duration;

use common::{GATEWAY_IP, Harness, igd_search_reply};
use pmoigd::{IgdError, InternalClient, Protocol, SsdpDevice};

fn device_reply(location: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         CACHE-CONTROL: max-age=1800\r\n\
         ST: upnp:rootdevice\r\n\
         USN: uuid:device::upnp:rootdevice\r\n\
         Location: {}\r\n\
         \r\n",
        location
    )
}

#[test]
fn test_list_ssdp_devices_removes_duplicates() {
    let mut h = Harness::new();
    let tv = Ipv4Addr::new(192, 168, 1, 40);
    let nas = Ipv4Addr::new(192, 168, 1, 50);

    h.ssdp.queue_reply(tv, &device_reply("http://192.168.1.40:8080/desc.xml"));
    h.ssdp.queue_reply(nas, &device_reply("http://192.168.1.50:49152/rootDesc.xml"));
    h.ssdp.queue_reply(tv, &device_reply("http://192.168.1.40:8080/desc.xml"));
    h.ssdp.queue_reply(GATEWAY_IP, &igd_search_reply());
    h.ssdp.queue_reply(nas, &device_reply("http://192.168.1.50:49152/rootDesc.xml"));

    let devices = h.client.list_ssdp_devices(Duration::from_secs(2)).unwrap();

    assert_eq!(
        devices,
        vec![
            SsdpDevice { host: tv, port: 8080, path: "/desc.xml".to_string() },
            SsdpDevice { host: nas, port: 49152, path: "/rootDesc.xml".to_string() },
            SsdpDevice { host: GATEWAY_IP, port: 5000, path: "/rootDesc.xml".to_string() },
        ]
    );

    // Un seul M-SEARCH ssdp:all, et l'attente est allée à son terme
    let sent = h.ssdp.state.borrow().sent.clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("ST: ssdp:all\r\n"));
    assert!(h.now() >= Duration::from_secs(2));
}

#[test]
fn test_list_ssdp_devices_skips_unusable_replies() {
    let mut h = Harness::new();
    h.ssdp.queue_reply(Ipv4Addr::new(192, 168, 1, 40), "NOTIFY * HTTP/1.1\r\nNT: upnp:rootdevice\r\n\r\n");
    h.ssdp.queue_reply(
        Ipv4Addr::new(192, 168, 1, 41),
        &device_reply("http://[fe80::1]:8080/desc.xml"),
    );

    let devices = h.client.list_ssdp_devices(Duration::from_secs(1)).unwrap();
    assert!(devices.is_empty());
}

#[test]
fn test_list_ssdp_devices_with_zero_timeout() {
    let mut h = Harness::new();
    let devices = h.client.list_ssdp_devices(Duration::ZERO).unwrap();
    assert!(devices.is_empty());
    assert!(h.ssdp.state.borrow().sent.is_empty());
}

#[test]
fn test_discovery_ignores_other_senders() {
    let mut h = Harness::new();
    h.client
        .register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 0, "Blah");
    // Un autre device se fait passer pour l'IGD
    h.ssdp.state.borrow_mut().igd_answer = None;
    let reply = igd_search_reply().replace("192.168.1.1:5000", "192.168.1.66:5000");
    h.ssdp.queue_reply(Ipv4Addr::new(192, 168, 1, 66), &reply);

    assert!(matches!(h.client.commit(), Err(IgdError::Network(_))));
    assert_eq!(h.router.request_count(), 0);
}

#[test]
fn test_discovery_accepts_any_sender_without_gateway() {
    let mut h = Harness::new();
    h.host.gateway = None;
    let client = pmoigd::IgdClient::with_transports(
        h.ssdp.clone(),
        h.router.stream(),
        h.host.clone(),
        h.clock.clone(),
        Duration::from_secs(20),
    );
    h.client = client;
    h.client
        .register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 0, "Blah");

    h.client.commit().unwrap();

    assert_eq!(h.client.gateway_info().host, GATEWAY_IP);
    assert_eq!(h.client.gateway_info().port, 5000);
}

#[test]
fn test_discovery_skips_non_igd_replies() {
    let mut h = Harness::new();
    h.client
        .register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 0, "Blah");
    // La passerelle répond d'abord comme simple rootdevice
    h.ssdp.queue_reply(GATEWAY_IP, &device_reply("http://192.168.1.1:5001/other.xml"));

    h.client.commit().unwrap();

    assert_eq!(h.client.gateway_info().path, "/rootDesc.xml");
    assert_eq!(h.router.description_fetches(), 1);
}

#[test]
fn test_url_base_overrides_action_port() {
    let mut h = Harness::new();
    h.client
        .register_rule(InternalClient::LocalHost, 8088, Protocol::Tcp, 0, "Blah");
    let description = common::description_xml().replace(
        "<device>\r\n<deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1",
        "<URLBase>http://192.168.1.1:5555/</URLBase>\r\n<device>\r\n<deviceType>urn:schemas-upnp-org:device:InternetGatewayDevice:1",
    );
    h.router.state.borrow_mut().description = description;

    h.client.commit().unwrap();

    let gateway = h.client.gateway_info();
    assert_eq!(gateway.port, 5000);
    assert_eq!(gateway.action_port, 5555);
    let actions = h.router.requests_of("AddPortMapping");
    assert_eq!(actions[0].peer.port(), 5555);
    assert!(actions[0].raw.contains("Host: 192.168.1.1:5555\r\n"));
}
