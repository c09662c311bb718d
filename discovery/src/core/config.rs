//! Discovery configuration types and validation.
//!
//! The discovery section is validated from raw JSON before it is deserialized so that every
//! problem is reported at once as a list of messages, not just the first serde error.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{DiscoveryError, DiscoveryResult},
    logging::LoggingConfig,
    rules::{Pattern, ToolRule},
};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Active search engine.
    #[serde(default)]
    pub search_mode: SearchMode,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Client configuration files the server registry was assembled from.
    #[serde(default)]
    pub sources: Vec<ConfigSource>,

    /// Ordered tool rules.
    #[serde(default)]
    pub tool_rules: Vec<ToolRule>,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    /// Embedding endpoint used when `search_mode` is semantic.
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    #[default]
    Fuzzy,
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live for server and tool listings (seconds).
    #[serde(default = "default_cache_ttl")]
    pub ttl: f64,
}

/// Largest accepted `cache.ttl`, in seconds.
pub const MAX_CACHE_TTL_SECS: f64 = u32::MAX as f64;

impl CacheConfig {
    /// The TTL as a duration, clamped to `[0, MAX_CACHE_TTL_SECS]`.
    pub fn ttl(&self) -> Duration {
        Duration::try_from_secs_f64(self.ttl.min(MAX_CACHE_TTL_SECS)).unwrap_or(Duration::ZERO)
    }
}

fn check_ttl(ttl: Option<f64>, errors: &mut Vec<String>) {
    match ttl {
        Some(ttl) if ttl > 0.0 && ttl <= MAX_CACHE_TTL_SECS => {}
        Some(ttl) if ttl > MAX_CACHE_TTL_SECS => errors.push(format!(
            "cache.ttl must not exceed {} seconds",
            MAX_CACHE_TTL_SECS
        )),
        _ => errors.push("cache.ttl must be a positive number".to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    DockerMcp,
    ClaudeDesktop,
    Windsurf,
    Custom,
}

impl SourceType {
    const NAMES: [&'static str; 4] = ["docker-mcp", "claude-desktop", "windsurf", "custom"];
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigSource {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub path: String,
}

/// Tool execution settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionConfig {
    /// Per-call timeout (seconds).
    #[serde(default = "default_execution_timeout")]
    pub timeout_secs: u64,
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    /// Bound on connecting and listing tools, per attempt (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Connection attempts per server, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay (milliseconds); doubles on each attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Environment variable holding the bearer token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

/// Launch descriptor for one backend server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Registry key; filled from the map key when loaded from a file.
    #[serde(default)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
    /// Where this entry was discovered (e.g. `claude-desktop`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Prepended to every tool name exposed by this server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            source: None,
            description: None,
            prefix: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Exposed name for a backend tool.
    pub fn exposed_tool_name(&self, backend_name: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) => format!("{}{}", prefix, backend_name),
            None => backend_name.to_string(),
        }
    }

    /// Backend name for an exposed tool, or `None` if the prefix does not match.
    pub fn backend_tool_name<'a>(&self, exposed_name: &'a str) -> Option<&'a str> {
        match self.prefix.as_deref() {
            Some(prefix) => exposed_name.strip_prefix(prefix),
            None => Some(exposed_name),
        }
    }
}

/// Top-level gateway file: discovery settings plus the server registry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GatewayConfig {
    pub discovery: DiscoveryConfig,
    pub servers: Vec<ServerConfig>,
    pub logging: LoggingConfig,
}

#[derive(Deserialize)]
struct RawGatewayConfig {
    #[serde(default)]
    discovery: Option<Value>,
    #[serde(default, alias = "mcpServers")]
    servers: BTreeMap<String, ServerConfig>,
    #[serde(default)]
    logging: LoggingConfig,
}

impl GatewayConfig {
    /// Load from a YAML (or JSON) file.
    pub async fn from_file(path: impl AsRef<Path>) -> DiscoveryResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> DiscoveryResult<Self> {
        let raw: RawGatewayConfig = serde_yaml::from_str(content)?;
        let discovery = match raw.discovery {
            Some(value) => ConfigurationLoader::load(&value)?,
            None => DiscoveryConfig::default(),
        };
        let servers = raw
            .servers
            .into_iter()
            .map(|(name, mut server)| {
                server.name = name;
                server
            })
            .collect();
        Ok(Self {
            discovery,
            servers,
            logging: raw.logging,
        })
    }
}

/// Outcome of configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    pub fn into_result(self) -> DiscoveryResult<()> {
        if self.valid {
            Ok(())
        } else {
            Err(DiscoveryError::Config(self.errors))
        }
    }
}

/// Validates raw discovery configuration and fills defaults.
pub struct ConfigurationLoader;

impl ConfigurationLoader {
    pub fn default_config() -> DiscoveryConfig {
        DiscoveryConfig::default()
    }

    /// Check field types of a raw discovery section, collecting every problem.
    pub fn validate(config: &Value) -> ValidationResult {
        let Some(obj) = config.as_object() else {
            return ValidationResult::from_errors(vec!["config must be an object".to_string()]);
        };
        let mut errors = Vec::new();

        if !obj.get("enabled").is_some_and(Value::is_boolean) {
            errors.push("enabled must be a boolean".to_string());
        }

        if let Some(mode) = obj.get("searchMode") {
            if !matches!(mode.as_str(), Some("fuzzy" | "semantic")) {
                errors.push(r#"searchMode must be "fuzzy" or "semantic""#.to_string());
            }
        }

        if let Some(cache) = obj.get("cache") {
            match cache.as_object() {
                None => errors.push("cache must be an object".to_string()),
                Some(cache) => {
                    if !cache.get("enabled").is_some_and(Value::is_boolean) {
                        errors.push("cache.enabled must be a boolean".to_string());
                    }
                    check_ttl(cache.get("ttl").and_then(Value::as_f64), &mut errors);
                }
            }
        }

        if let Some(sources) = obj.get("sources") {
            match sources.as_array() {
                None => errors.push("sources must be an array".to_string()),
                Some(sources) => {
                    for (i, source) in sources.iter().enumerate() {
                        validate_source(i, source, &mut errors);
                    }
                }
            }
        }

        if let Some(rules) = obj.get("toolRules") {
            match rules.as_array() {
                None => errors.push("toolRules must be an array".to_string()),
                Some(rules) => {
                    for (i, rule) in rules.iter().enumerate() {
                        validate_rule(i, rule, &mut errors);
                    }
                }
            }
        }

        ValidationResult::from_errors(errors)
    }

    /// Fill top-level fields that are absent with their defaults.
    ///
    /// Present fields are kept as given, so a partial `cache` object is not completed.
    pub fn merge_with_defaults(partial: &Value) -> Value {
        let mut merged = match partial.as_object() {
            Some(obj) => obj.clone(),
            None => return partial.clone(),
        };
        let defaults = default_sections();
        for (key, value) in defaults {
            merged.entry(key).or_insert(value);
        }
        Value::Object(merged)
    }

    /// Merge defaults, validate and deserialize a raw discovery section.
    pub fn load(partial: &Value) -> DiscoveryResult<DiscoveryConfig> {
        let merged = Self::merge_with_defaults(partial);
        Self::validate(&merged).into_result()?;
        let config: DiscoveryConfig = serde_json::from_value(merged)?;
        Ok(config)
    }

    /// Re-check an already typed configuration.
    pub fn validate_config(config: &DiscoveryConfig) -> ValidationResult {
        let mut errors = Vec::new();
        check_ttl(Some(config.cache.ttl), &mut errors);
        if config.execution.timeout_secs == 0 {
            errors.push("execution.timeoutSecs must be positive".to_string());
        }
        for (i, rule) in config.tool_rules.iter().enumerate() {
            for (j, pattern) in rule.pattern.iter().enumerate() {
                if let Err(e) = Pattern::parse(pattern) {
                    errors.push(format!("toolRules[{}].pattern[{}] is invalid: {}", i, j, e));
                }
            }
        }
        ValidationResult::from_errors(errors)
    }

    /// Server names must be unique; they key sessions, statuses and cache entries.
    pub fn validate_servers(servers: &[ServerConfig]) -> ValidationResult {
        let mut seen = HashSet::new();
        let errors = servers
            .iter()
            .filter(|server| !seen.insert(server.name.as_str()))
            .map(|server| format!("duplicate server name: {}", server.name))
            .collect();
        ValidationResult::from_errors(errors)
    }
}

fn validate_source(i: usize, source: &Value, errors: &mut Vec<String>) {
    match source.get("type").and_then(Value::as_str) {
        None => errors.push(format!("sources[{}].type must be a string", i)),
        Some(kind) if !SourceType::NAMES.contains(&kind) => errors.push(format!(
            "sources[{}].type must be one of {}",
            i,
            SourceType::NAMES.join(", ")
        )),
        Some(_) => {}
    }
    if !source.get("path").is_some_and(Value::is_string) {
        errors.push(format!("sources[{}].path must be a string", i));
    }
}

fn validate_rule(i: usize, rule: &Value, errors: &mut Vec<String>) {
    let Some(rule) = rule.as_object() else {
        errors.push(format!("toolRules[{}] must be an object", i));
        return;
    };

    match rule.get("pattern").and_then(Value::as_array) {
        Some(patterns) if patterns.iter().all(Value::is_string) => {
            for (j, pattern) in patterns.iter().filter_map(Value::as_str).enumerate() {
                if let Err(e) = Pattern::parse(pattern) {
                    errors.push(format!("toolRules[{}].pattern[{}] is invalid: {}", i, j, e));
                }
            }
        }
        _ => errors.push(format!("toolRules[{}].pattern must be an array of strings", i)),
    }
    if rule.get("server").is_some_and(|s| !s.is_string()) {
        errors.push(format!("toolRules[{}].server must be a string", i));
    }
    if rule.get("enabled").is_some_and(|e| !e.is_boolean()) {
        errors.push(format!("toolRules[{}].enabled must be a boolean", i));
    }
    if let Some(tags) = rule.get("tags") {
        if !tags.as_array().is_some_and(|t| t.iter().all(Value::is_string)) {
            errors.push(format!("toolRules[{}].tags must be an array of strings", i));
        }
    }
}

fn default_sections() -> Map<String, Value> {
    let mut defaults = Map::new();
    defaults.insert("enabled".to_string(), Value::Bool(true));
    defaults.insert(
        "cache".to_string(),
        serde_json::json!({ "enabled": true, "ttl": default_cache_ttl() }),
    );
    defaults.insert("sources".to_string(), Value::Array(Vec::new()));
    defaults.insert("toolRules".to_string(), Value::Array(Vec::new()));
    defaults
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_cache_ttl() -> f64 {
    3600.0 // 1 hour
}

fn default_execution_timeout() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_embedding_endpoint() -> String {
    "https://api.openai.com/v1/embeddings".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_timeout() -> u64 {
    30
}

// Default implementations
impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            search_mode: SearchMode::default(),
            cache: CacheConfig::default(),
            sources: Vec::new(),
            tool_rules: Vec::new(),
            execution: ExecutionConfig::default(),
            connection: ConnectionConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: default_cache_ttl(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_execution_timeout(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            api_key_env: None,
            timeout_secs: default_embedding_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigurationLoader::default_config();
        assert!(config.enabled);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, 3600.0);
        assert!(config.sources.is_empty());
        assert!(config.tool_rules.is_empty());
        assert_eq!(config.search_mode, SearchMode::Fuzzy);
        assert_eq!(config.execution.timeout_secs, 60);
        assert_eq!(config.connection.max_retries, 1);
    }

    #[test]
    fn test_validate_accepts_full_config() {
        let raw = json!({
            "enabled": true,
            "searchMode": "semantic",
            "cache": {"enabled": true, "ttl": 600},
            "sources": [{"type": "claude-desktop", "path": "~/.config/claude.json"}],
            "toolRules": [
                {"pattern": ["*delete*"], "enabled": false},
                {"pattern": ["/^gh_/i"], "server": "github", "tags": ["github"]}
            ]
        });
        let result = ConfigurationLoader::validate(&raw);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_validate_collects_every_error() {
        let raw = json!({
            "enabled": "yes",
            "cache": {"enabled": 1, "ttl": 0},
            "sources": [{"type": "vscode", "path": 3}],
            "toolRules": [{"pattern": "*", "enabled": "no", "tags": [1]}]
        });
        let result = ConfigurationLoader::validate(&raw);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![
                "enabled must be a boolean",
                "cache.enabled must be a boolean",
                "cache.ttl must be a positive number",
                "sources[0].type must be one of docker-mcp, claude-desktop, windsurf, custom",
                "sources[0].path must be a string",
                "toolRules[0].pattern must be an array of strings",
                "toolRules[0].enabled must be a boolean",
                "toolRules[0].tags must be an array of strings",
            ]
        );
    }

    #[test]
    fn test_validate_wrong_container_types() {
        let raw = json!({
            "enabled": true,
            "cache": "fast",
            "sources": {},
            "toolRules": "none",
            "searchMode": "vector"
        });
        let errors = ConfigurationLoader::validate(&raw).errors;
        assert!(errors.contains(&"cache must be an object".to_string()));
        assert!(errors.contains(&"sources must be an array".to_string()));
        assert!(errors.contains(&"toolRules must be an array".to_string()));
        assert!(errors.contains(&r#"searchMode must be "fuzzy" or "semantic""#.to_string()));
    }

    #[test]
    fn test_validate_rejects_bad_pattern() {
        let raw = json!({"enabled": true, "toolRules": [{"pattern": ["ok_*", "/(/"]}]});
        let errors = ConfigurationLoader::validate(&raw).errors;
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("toolRules[0].pattern[1] is invalid"));
    }

    #[test]
    fn test_validate_non_object() {
        let result = ConfigurationLoader::validate(&json!([1, 2]));
        assert_eq!(result.errors, vec!["config must be an object"]);
    }

    #[test]
    fn test_merge_with_defaults() {
        let merged = ConfigurationLoader::merge_with_defaults(&json!({"enabled": false}));
        assert_eq!(merged["enabled"], json!(false));
        assert_eq!(merged["cache"], json!({"enabled": true, "ttl": 3600.0}));
        assert_eq!(merged["sources"], json!([]));
        assert_eq!(merged["toolRules"], json!([]));
    }

    #[test]
    fn test_load_fills_defaults() {
        let config = ConfigurationLoader::load(&json!({})).unwrap();
        assert_eq!(config, DiscoveryConfig::default());

        let config = ConfigurationLoader::load(&json!({
            "enabled": true,
            "cache": {"enabled": false, "ttl": 1.5},
            "toolRules": [{"pattern": ["*"], "enabled": true}]
        }))
        .unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_millis(1500));
        assert_eq!(config.tool_rules[0].enabled, Some(true));
    }

    #[test]
    fn test_load_reports_validation_errors() {
        let err = ConfigurationLoader::load(&json!({"cache": {"enabled": true, "ttl": -5}}))
            .unwrap_err();
        match err {
            DiscoveryError::Config(errors) => {
                assert_eq!(errors, vec!["cache.ttl must be a positive number"])
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_validate_config_typed() {
        let mut config = DiscoveryConfig::default();
        assert!(ConfigurationLoader::validate_config(&config).valid);

        config.cache.ttl = 0.0;
        config.tool_rules.push(ToolRule::new(["/[/"]));
        let result = ConfigurationLoader::validate_config(&config);
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn test_ttl_upper_bound() {
        let err = ConfigurationLoader::load(&json!({"cache": {"enabled": true, "ttl": 1e19}}))
            .unwrap_err();
        match err {
            DiscoveryError::Config(errors) => {
                assert_eq!(errors, vec!["cache.ttl must not exceed 4294967295 seconds"])
            }
            other => panic!("unexpected error: {}", other),
        }

        let config =
            ConfigurationLoader::load(&json!({"cache": {"enabled": true, "ttl": MAX_CACHE_TTL_SECS}}))
                .unwrap();
        assert_eq!(config.cache.ttl(), Duration::from_secs(u64::from(u32::MAX)));

        let mut config = DiscoveryConfig::default();
        config.cache.ttl = f64::INFINITY;
        assert!(!ConfigurationLoader::validate_config(&config).valid);
        assert_eq!(config.cache.ttl(), Duration::from_secs(u64::from(u32::MAX)));
        config.cache.ttl = f64::NAN;
        assert!(!ConfigurationLoader::validate_config(&config).valid);
    }

    #[test]
    fn test_duplicate_server_names() {
        let servers = vec![
            ServerConfig::new("github", "a"),
            ServerConfig::new("jira", "b"),
            ServerConfig::new("github", "c"),
        ];
        let result = ConfigurationLoader::validate_servers(&servers);
        assert_eq!(result.errors, vec!["duplicate server name: github"]);
        assert!(ConfigurationLoader::validate_servers(&servers[..2]).valid);
    }

    #[test]
    fn test_server_prefix_mapping() {
        let server = ServerConfig::new("github", "npx").with_prefix("gh_");
        assert_eq!(server.exposed_tool_name("create_issue"), "gh_create_issue");
        assert_eq!(server.backend_tool_name("gh_create_issue"), Some("create_issue"));
        assert_eq!(server.backend_tool_name("create_issue"), None);

        let plain = ServerConfig::new("jira", "jira-mcp");
        assert_eq!(plain.backend_tool_name("create_ticket"), Some("create_ticket"));
    }

    #[test]
    fn test_yaml_gateway_config() {
        let yaml = r#"
discovery:
  enabled: true
  searchMode: fuzzy
  cache:
    enabled: true
    ttl: 300
  toolRules:
    - pattern: ["*delete*"]
      enabled: false
  execution:
    timeoutSecs: 15
servers:
  jira:
    command: "jira-mcp"
  github:
    command: "npx"
    args: ["-y", "@modelcontextprotocol/server-github"]
    env:
      GITHUB_TOKEN: "secret"
    prefix: "gh_"
    description: "GitHub"
logging:
  level: debug
  format: json
"#;
        let config = GatewayConfig::from_yaml_str(yaml).expect("Failed to parse YAML");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, crate::logging::LogFormat::Json);
        assert_eq!(config.discovery.cache.ttl, 300.0);
        assert_eq!(config.discovery.execution.timeout_secs, 15);
        assert_eq!(config.discovery.connection.connect_timeout_secs, 30);
        assert_eq!(config.servers.len(), 2);
        // BTreeMap ordering
        assert_eq!(config.servers[0].name, "github");
        assert_eq!(config.servers[0].prefix.as_deref(), Some("gh_"));
        assert_eq!(config.servers[0].env.get("GITHUB_TOKEN").unwrap(), "secret");
        assert_eq!(config.servers[1].name, "jira");
        assert!(config.servers[1].args.is_empty());
    }

    #[test]
    fn test_yaml_claude_desktop_shape() {
        let json = r#"{"mcpServers": {"fs": {"command": "mcp-fs", "args": ["/tmp"]}}}"#;
        let config = GatewayConfig::from_yaml_str(json).unwrap();
        assert_eq!(config.discovery, DiscoveryConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
        assert_eq!(config.servers[0].name, "fs");
    }

    #[test]
    fn test_yaml_invalid_discovery_section() {
        let yaml = r#"
discovery:
  enabled: "sometimes"
"#;
        assert!(matches!(
            GatewayConfig::from_yaml_str(yaml),
            Err(DiscoveryError::Config(_))
        ));
    }
}
