use shared::protocol::{DEFAULT_PORT_TYPE, WILDCARD_ADDR};
use shared::types::{Container, NetworkSettings, PortBinding, ServicePort};

/// Resolve the host and container side of one exposed port spec
/// (`"8080"` or `"8080/udp"`).
///
/// Only the first published binding is considered.
pub fn map_port(container: &Container, exposed: &str, published: &[PortBinding]) -> ServicePort {
    let (host_port, host_ip) = published
        .first()
        .map(|b| (b.host_port.clone(), b.host_ip.clone()))
        .unwrap_or_default();

    let host_ip = if host_ip.is_empty() {
        WILDCARD_ADDR.to_string()
    } else {
        host_ip
    };

    let (exposed_port, port_type) = match exposed.split_once('/') {
        Some((port, proto)) => (port, proto),
        None => (exposed, DEFAULT_PORT_TYPE),
    };

    ServicePort {
        host_port,
        host_ip,
        exposed_port: exposed_port.to_string(),
        exposed_ip: container_ip(&container.network),
        port_type: port_type.to_string(),
        container_hostname: container.hostname.clone(),
        container_id: container.id.clone(),
        container_name: container.short_name().to_string(),
    }
}

/// The flat bridge address if set, else the address on the first named
/// network (by name) that has one.
fn container_ip(network: &NetworkSettings) -> String {
    if !network.ip_address.is_empty() {
        return network.ip_address.clone();
    }

    network
        .networks
        .values()
        .map(|endpoint| &endpoint.ip_address)
        .find(|ip| !ip.is_empty())
        .cloned()
        .unwrap_or_default()
}
