use shared::protocol::{
    ATTR_CHECK_CMD, ATTR_CHECK_HTTP, ATTR_CHECK_INTERVAL, ATTR_CHECK_SCRIPT, ATTR_CHECK_TTL,
    ATTR_ID, ATTR_IGNORE, ATTR_NAME, ATTR_TAGS, DEFAULT_PORT_TYPE, TEMPLATE_HOST, TEMPLATE_NAME,
    TEMPLATE_PORT, WILDCARD_ADDR,
};
use shared::types::{Container, Service, ServicePort};
use crate::bridge::metadata::{self, combine_tags, expand_template, find_port_index, map_default};
use crate::bridge::port::map_port;
use crate::config::BridgeConfig;

/// Build the services for every exposed port of `container`.
/// Ports are visited in sorted order so ids and names are stable.
pub fn services_for(container: &Container, config: &BridgeConfig, hostname: &str) -> Vec<Service> {
    let mut exposed = container.exposed_ports.clone();
    exposed.sort();
    exposed.dedup();

    let is_group = exposed.len() > 1;

    exposed
        .iter()
        .filter_map(|spec| {
            let published = container
                .published
                .get(spec)
                .or_else(|| container.published.get(&format!("{spec}/{DEFAULT_PORT_TYPE}")))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let port = map_port(container, spec, published);
            new_service(container, port, is_group, config, hostname)
        })
        .collect()
}

/// Assemble one service descriptor, `None` when the port is ignored,
/// unpublished or unusable.
pub fn new_service(
    container: &Container,
    port: ServicePort,
    is_group: bool,
    config: &BridgeConfig,
    hostname: &str,
) -> Option<Service> {
    let port_index = if config.use_marathon_ports {
        find_port_index(&container.env, &port.host_port)
    } else {
        String::new()
    };

    let metadata = metadata::resolve(
        &container.env,
        &container.labels,
        &port.exposed_port,
        &port_index,
    );
    tracing::debug!(
        "{}:{} port-scoped metadata: {:?}",
        container.short_name(),
        port.exposed_port,
        metadata.from_port
    );
    let mut attrs = metadata.attrs;

    if !map_default(&attrs, ATTR_IGNORE, "").is_empty() {
        tracing::debug!("ignoring {}:{}", container.short_name(), port.exposed_port);
        return None;
    }

    if !config.internal && port.host_port.is_empty() {
        tracing::debug!(
            "skipping {}:{}, port not published",
            container.short_name(),
            port.exposed_port
        );
        return None;
    }

    let name = service_name(container, &port, is_group, config, map_default(&attrs, ATTR_NAME, ""));
    if name.is_empty() {
        tracing::warn!("skipping {}: no service name", container.id);
        return None;
    }

    let (port_str, ip) = if config.internal {
        (&port.exposed_port, port.exposed_ip.clone())
    } else if !config.host_ip.is_empty() {
        (&port.host_port, config.host_ip.clone())
    } else if port.host_ip != WILDCARD_ADDR {
        (&port.host_port, port.host_ip.clone())
    } else {
        (&port.host_port, String::new())
    };

    let service_port = match port_str.parse::<u16>() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(
                "skipping {}:{}, invalid port {:?}: {}",
                container.short_name(),
                port.exposed_port,
                port_str,
                e
            );
            return None;
        }
    };

    let is_udp = port.port_type == "udp";

    let mut id = format!("{}:{}:{}", hostname, container.short_name(), port.exposed_port);
    if is_udp {
        id.push_str(":udp");
    }
    let id = map_default(&attrs, ATTR_ID, &id).to_string();

    let tags = combine_tags(&[
        map_default(&attrs, ATTR_TAGS, ""),
        config.force_tags.as_str(),
        if is_udp { "udp" } else { "" },
    ]);

    for key in [ATTR_ID, ATTR_NAME, ATTR_TAGS, ATTR_IGNORE] {
        attrs.remove(key);
    }

    let has_check = [ATTR_CHECK_HTTP, ATTR_CHECK_CMD, ATTR_CHECK_SCRIPT, ATTR_CHECK_TTL]
        .iter()
        .any(|key| !map_default(&attrs, key, "").is_empty());

    if !has_check && !config.default_service_check_script.is_empty() {
        let host = if ip.is_empty() { hostname } else { ip.as_str() };
        let port_text = service_port.to_string();
        let script = expand_template(
            &config.default_service_check_script,
            &[(TEMPLATE_HOST, host), (TEMPLATE_PORT, port_text.as_str())],
        );
        attrs.insert(ATTR_CHECK_SCRIPT.to_string(), script);
        if map_default(&attrs, ATTR_CHECK_INTERVAL, "").is_empty() {
            attrs.insert(
                ATTR_CHECK_INTERVAL.to_string(),
                config.default_service_check_interval.clone(),
            );
        }
    }

    Some(Service {
        id,
        name,
        port: service_port,
        ip,
        tags,
        attrs,
        ttl: (config.refresh_ttl > 0).then_some(config.refresh_ttl),
        origin: port,
    })
}

/// A `name` attribute is used as given; otherwise the image name is fed
/// through the single or group naming template.
fn service_name(
    container: &Container,
    port: &ServicePort,
    is_group: bool,
    config: &BridgeConfig,
    name_attr: &str,
) -> String {
    if !name_attr.is_empty() {
        return name_attr.to_string();
    }

    let base = image_base_name(&container.image);
    let base = if base.is_empty() { container.short_name() } else { base };

    let template = if is_group {
        &config.default_group_service_name
    } else {
        &config.default_single_service_name
    };

    expand_template(template, &[(TEMPLATE_NAME, base), (TEMPLATE_PORT, port.exposed_port.as_str())])
}

/// "registry.local:5000/team/web:1.2" -> "web"
fn image_base_name(image: &str) -> &str {
    let last = image.rsplit('/').next().unwrap_or(image);
    let last = last.split('@').next().unwrap_or(last);
    last.split(':').next().unwrap_or(last)
}
