use std::collections::{BTreeMap, HashMap, HashSet};
use shared::protocol::SERVICE_PREFIX;

/// Where a metadata key was taken from. Higher tiers are never overwritten
/// by lower ones; within a tier the last entry wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Tier {
    Global,
    PortIndex,
    PortNumeric,
}

/// `SERVICE_*` metadata resolved for a single exposed port
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    /// Lower-cased keys with the prefix and any port scope stripped
    pub attrs: HashMap<String, String>,
    /// Keys that came from a port-scoped entry
    pub from_port: HashSet<String>,
}

/// Resolve service metadata for `exposed_port` from the environment and labels.
///
/// Labels are appended after the environment, so a label wins a tie with an
/// environment variable of the same tier. Entries are:
/// - `SERVICE_<port>_<key>` for the numeric exposed port (port-numeric tier)
/// - `SERVICE_PORT<index>_<key>` when `port_index` is non-empty (port-index tier)
/// - `SERVICE_<key>` otherwise (global tier)
///
/// Port-scoped entries addressing another port are skipped.
pub fn resolve(
    env: &[String],
    labels: &BTreeMap<String, String>,
    exposed_port: &str,
    port_index: &str,
) -> Metadata {
    tracing::debug!("environment: {:?}", env);
    tracing::debug!("labels: {:?}", labels);

    let entries = env
        .iter()
        .map(|kv| kv.split_once('='))
        .chain(labels.iter().map(|(k, v)| Some((k.as_str(), v.as_str()))));

    let mut tiers: HashMap<String, Tier> = HashMap::new();
    let mut metadata = Metadata::default();

    for (key, value) in entries.flatten() {
        let Some(rest) = key.strip_prefix(SERVICE_PREFIX) else {
            continue;
        };
        let Some((key, tier)) = classify(rest, exposed_port, port_index) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }

        if let Some(&current) = tiers.get(&key) {
            if current > tier {
                tracing::debug!("{:?} already set by port", key);
                continue;
            }
        }

        if tier != Tier::Global {
            metadata.from_port.insert(key.clone());
        }
        tiers.insert(key.clone(), tier);
        metadata.attrs.insert(key, value.to_string());
    }

    metadata
}

/// Map a prefix-stripped entry name to its key and tier, `None` if it is
/// scoped to another port.
fn classify(rest: &str, exposed_port: &str, port_index: &str) -> Option<(String, Tier)> {
    if let Some((scope, name)) = rest.split_once('_') {
        if is_numeric(scope) {
            return (scope == exposed_port).then(|| (name.to_lowercase(), Tier::PortNumeric));
        }

        if !port_index.is_empty() {
            if let Some(index) = scope.strip_prefix("PORT").filter(|idx| is_numeric(idx)) {
                return (index == port_index).then(|| (name.to_lowercase(), Tier::PortIndex));
            }
        }
    }

    Some((rest.to_lowercase(), Tier::Global))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split comma-separated tag lists and concatenate them, skipping empty parts.
pub fn combine_tags(parts: &[&str]) -> Vec<String> {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .flat_map(|part| part.split(','))
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Value for `key`, or `default` when it is missing or empty.
pub fn map_default<'a>(m: &'a HashMap<String, String>, key: &str, default: &'a str) -> &'a str {
    match m.get(key) {
        Some(v) if !v.is_empty() => v.as_str(),
        _ => default,
    }
}

/// Replace every occurrence of each key with its value, in order.
///
/// Plain substring replacement: a value that contains a later key is
/// replaced again.
pub fn expand_template(s: &str, vals: &[(&str, &str)]) -> String {
    vals.iter()
        .fold(s.to_string(), |acc, &(key, value)| acc.replace(key, value))
}

/// Find a Marathon `PORT<n>=<port>` entry and return `n`, or an empty string.
/// `PORT_<x>` entries are not port indexes and never match.
pub fn find_port_index(env: &[String], port: &str) -> String {
    env.iter()
        .filter_map(|kv| kv.split_once('='))
        .filter(|(_, v)| *v == port)
        .filter_map(|(k, _)| k.strip_prefix("PORT"))
        .find(|idx| is_numeric(idx))
        .map(str::to_string)
        .unwrap_or_default()
}
