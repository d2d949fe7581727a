use serde::Deserialize;

/// The subset of the Mesos master `state.json` the agent reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct State {
    /// e.g. "master@10.0.0.1:5050"
    pub leader: String,
    pub frameworks: Vec<Framework>,
    pub slaves: Vec<Slave>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Framework {
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub slave_id: String,
    /// e.g. "TASK_RUNNING"
    pub state: String,
    pub resources: Resources,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Resources {
    /// Port ranges, e.g. "[31000-31005, 31010-31010]"
    pub ports: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Slave {
    pub id: String,
    pub hostname: String,
}

impl Task {
    pub fn is_running(&self) -> bool {
        self.state == "TASK_RUNNING"
    }

    /// Whether one of the task's port ranges includes `port`
    pub fn holds_port(&self, port: u16) -> bool {
        parse_port_ranges(&self.resources.ports)
            .iter()
            .any(|&(lo, hi)| (lo..=hi).contains(&port))
    }
}

impl State {
    /// The task placed on agent `host` holding `port`, if any
    pub fn task_for_port(&self, host: &str, port: u16) -> Option<&Task> {
        let slave = self.slaves.iter().find(|s| s.hostname == host)?;

        self.frameworks
            .iter()
            .flat_map(|f| f.tasks.iter())
            .find(|t| t.slave_id == slave.id && t.holds_port(port))
    }
}

/// Parse "[31000-31005, 31010-31010]" into inclusive ranges, skipping
/// anything malformed.
pub fn parse_port_ranges(s: &str) -> Vec<(u16, u16)> {
    s.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter_map(|range| {
            let (lo, hi) = range.trim().split_once('-')?;
            Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE_JSON: &str = r#"{
        "leader": "master@10.0.0.1:5050",
        "hostname": "master-1",
        "version": "1.11.0",
        "frameworks": [{
            "id": "fw-1",
            "name": "marathon",
            "tasks": [{
                "id": "web.1",
                "name": "web",
                "framework_id": "fw-1",
                "slave_id": "s-1",
                "state": "TASK_RUNNING",
                "resources": {"cpus": 0.5, "mem": 128, "ports": "[31000-31001, 31010-31010]"}
            }, {
                "id": "db.1",
                "name": "db",
                "framework_id": "fw-1",
                "slave_id": "s-2",
                "state": "TASK_STAGING",
                "resources": {"ports": "[31000-31000]"}
            }]
        }],
        "slaves": [
            {"id": "s-1", "hostname": "node-1", "pid": "slave(1)@10.0.0.2:5051"},
            {"id": "s-2", "hostname": "node-2"}
        ]
    }"#;

    #[test]
    fn test_decode_state() {
        let state: State = serde_json::from_str(STATE_JSON).unwrap();

        assert_eq!(state.leader, "master@10.0.0.1:5050");
        assert_eq!(state.frameworks.len(), 1);
        assert_eq!(state.frameworks[0].tasks.len(), 2);
        assert_eq!(state.slaves.len(), 2);
    }

    #[test]
    fn test_task_for_port() {
        let state: State = serde_json::from_str(STATE_JSON).unwrap();

        let task = state.task_for_port("node-1", 31010).unwrap();
        assert_eq!(task.id, "web.1");
        assert!(task.is_running());

        let task = state.task_for_port("node-2", 31000).unwrap();
        assert_eq!(task.id, "db.1");
        assert!(!task.is_running());

        assert!(state.task_for_port("node-1", 31005).is_none());
        assert!(state.task_for_port("node-3", 31000).is_none());
    }

    #[test]
    fn test_parse_port_ranges() {
        assert_eq!(
            parse_port_ranges("[31000-31005, 31010-31010]"),
            vec![(31000, 31005), (31010, 31010)]
        );
        assert!(parse_port_ranges("").is_empty());
        assert_eq!(parse_port_ranges("[bogus, 80-81]"), vec![(80, 81)]);
    }
}
