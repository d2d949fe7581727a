/// Prefix marking an environment variable or label as service metadata
pub const SERVICE_PREFIX: &str = "SERVICE_";

/// Host address used when a published binding does not name one
pub const WILDCARD_ADDR: &str = "0.0.0.0";

/// Protocol assumed when an exposed port spec has no `/proto` suffix
pub const DEFAULT_PORT_TYPE: &str = "tcp";

/// Check interval applied to HTTP and script checks without `check_interval`
pub const DEFAULT_CHECK_INTERVAL: &str = "10s";

/// Mesos master endpoint serving the cluster state snapshot
pub const MESOS_STATE_PATH: &str = "/master/state.json";

/// URI scheme selecting the Consul adapter backed by Mesos state
pub const MESOS_CONSUL_SCHEME: &str = "mesos-consul";

/// Program invoked by `check_cmd` script checks
pub const CHECK_CMD_PROGRAM: &str = "check-cmd";

/// Attribute keys (lower-cased, prefix stripped)
pub const ATTR_ID: &str = "id";
pub const ATTR_NAME: &str = "name";
pub const ATTR_TAGS: &str = "tags";
pub const ATTR_IGNORE: &str = "ignore";
pub const ATTR_CHECK_HTTP: &str = "check_http";
pub const ATTR_CHECK_CMD: &str = "check_cmd";
pub const ATTR_CHECK_SCRIPT: &str = "check_script";
pub const ATTR_CHECK_TTL: &str = "check_ttl";
pub const ATTR_CHECK_TIMEOUT: &str = "check_timeout";
pub const ATTR_CHECK_INTERVAL: &str = "check_interval";

/// Placeholders understood by `check_script`
pub const SCRIPT_SERVICE_IP: &str = "$SERVICE_IP";
pub const SCRIPT_SERVICE_PORT: &str = "$SERVICE_PORT";

/// Placeholders understood by the naming and default check templates
pub const TEMPLATE_NAME: &str = "{{NAME}}";
pub const TEMPLATE_PORT: &str = "{{PORT}}";
pub const TEMPLATE_HOST: &str = "{{HOST}}";
