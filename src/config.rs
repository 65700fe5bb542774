//! TOML configuration with environment overrides.
//!
//! Every section is optional; a missing file at the default path means
//! built-in defaults. After the file is read, `ELASTICSEARCH_*` and `ES_INDEX`
//! environment variables (a `.env` file is honoured by the binary) override
//! the store settings. Validation runs once here, so the rest of the program
//! never sees a half-configured client.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("missing {field}: {hint}")]
    Missing {
        field: &'static str,
        hint: &'static str,
    },
    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub oai: OaiConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub backfill: BackfillConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_es_url")]
    pub url: String,
    #[serde(default)]
    pub cloud_id: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_es_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_es_url(),
            cloud_id: None,
            api_key: None,
            username: None,
            password: None,
            timeout_secs: default_es_timeout_secs(),
        }
    }
}

fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}
fn default_es_timeout_secs() -> u64 {
    60
}

/// How requests to the store authenticate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Basic { username: String, password: String },
    Anonymous,
}

impl ElasticsearchConfig {
    /// Base URL of the cluster; a cloud ID takes precedence over `url`.
    pub fn endpoint(&self) -> Result<String, ConfigError> {
        match &self.cloud_id {
            Some(id) => decode_cloud_id(id),
            None => Ok(self.url.trim_end_matches('/').to_string()),
        }
    }

    pub fn credentials(&self) -> Credentials {
        if let Some(key) = &self.api_key {
            return Credentials::ApiKey(key.clone());
        }
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Credentials::Basic {
                username: u.clone(),
                password: p.clone(),
            },
            _ => Credentials::Anonymous,
        }
    }
}

/// Which mapping the target index is created with.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexSchema {
    /// `abstract` as plain `text`.
    Basic,
    /// `abstract` as `semantic_text`, embedded by the cluster on ingest.
    Semantic,
}

impl IndexSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexSchema::Basic => "basic",
            IndexSchema::Semantic => "semantic",
        }
    }
}

impl std::str::FromStr for IndexSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(IndexSchema::Basic),
            "semantic" => Ok(IndexSchema::Semantic),
            other => Err(format!(
                "unknown schema '{}': expected basic or semantic",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default)]
    pub schema: Option<IndexSchema>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            name: default_index_name(),
            schema: None,
        }
    }
}

fn default_index_name() -> String {
    "arxiv-papers-2026".to_string()
}

impl IndexConfig {
    /// Explicit schema, else `semantic` for names ending in `-semantic`.
    pub fn effective_schema(&self) -> IndexSchema {
        self.schema.unwrap_or_else(|| schema_for_name(&self.name))
    }
}

pub fn schema_for_name(name: &str) -> IndexSchema {
    if name.ends_with("-semantic") {
        IndexSchema::Semantic
    } else {
        IndexSchema::Basic
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OaiConfig {
    #[serde(default = "default_oai_base_url")]
    pub base_url: String,
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_oai_timeout_secs")]
    pub timeout_secs: u64,
    /// Politeness delay between pages.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

impl Default for OaiConfig {
    fn default() -> Self {
        Self {
            base_url: default_oai_base_url(),
            metadata_prefix: default_metadata_prefix(),
            user_agent: default_user_agent(),
            timeout_secs: default_oai_timeout_secs(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_oai_base_url() -> String {
    "https://export.arxiv.org/oai2".to_string()
}
fn default_metadata_prefix() -> String {
    "arXiv".to_string()
}
fn default_user_agent() -> String {
    format!("arxiv-harvest/{}", env!("CARGO_PKG_VERSION"))
}
fn default_oai_timeout_secs() -> u64 {
    120
}
fn default_delay_ms() -> u64 {
    1000
}

const MAX_DELAY_MS: u64 = 60_000;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FilterConfig {
    #[serde(default)]
    pub category_prefixes: Vec<String>,
}

/// What a backfill does when one month's harvest fails.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonthErrorPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackfillConfig {
    #[serde(default)]
    pub on_month_error: MonthErrorPolicy,
    #[serde(default)]
    pub checkpoint_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Load configuration from `path`, apply environment overrides, validate.
///
/// When `required` is false and `path` does not exist, defaults are used.
pub fn load_config(path: &Path, required: bool) -> Result<Config, ConfigError> {
    let mut config = if path.exists() || required {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        Config::default()
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Overlay `ELASTICSEARCH_*` / `ES_INDEX` values; empty values are ignored.
pub fn apply_env<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("ELASTICSEARCH_URL") {
        config.elasticsearch.url = v;
    }
    if let Some(v) = get("ELASTICSEARCH_CLOUD_ID") {
        config.elasticsearch.cloud_id = Some(v);
    }
    if let Some(v) = get("ELASTICSEARCH_API_KEY") {
        config.elasticsearch.api_key = Some(v);
    }
    if let Some(v) = get("ELASTICSEARCH_USER") {
        config.elasticsearch.username = Some(v);
    }
    if let Some(v) = get("ELASTICSEARCH_PASSWORD") {
        config.elasticsearch.password = Some(v);
    }
    if let Some(v) = get("ES_INDEX") {
        config.index.name = v;
    }
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_index_name(&config.index.name)?;

    let es = &config.elasticsearch;
    if es.username.is_some() != es.password.is_some() {
        return Err(ConfigError::Missing {
            field: "elasticsearch.username/password",
            hint: "set both ELASTICSEARCH_USER and ELASTICSEARCH_PASSWORD, or neither",
        });
    }
    if es.cloud_id.is_some() && es.credentials() == Credentials::Anonymous {
        return Err(ConfigError::Missing {
            field: "elasticsearch.api_key",
            hint: "Elastic Cloud needs ELASTICSEARCH_API_KEY (or ELASTICSEARCH_USER/ELASTICSEARCH_PASSWORD)",
        });
    }
    es.endpoint()?;
    if es.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "elasticsearch.timeout_secs",
            message: "must be > 0".to_string(),
        });
    }

    let oai = &config.oai;
    if !(oai.base_url.starts_with("http://") || oai.base_url.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            field: "oai.base_url",
            message: format!("'{}' is not an http(s) URL", oai.base_url),
        });
    }
    if oai.metadata_prefix.trim().is_empty() {
        return Err(ConfigError::Missing {
            field: "oai.metadata_prefix",
            hint: "the arXiv endpoint expects 'arXiv'",
        });
    }
    if oai.timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "oai.timeout_secs",
            message: "must be > 0".to_string(),
        });
    }
    if oai.delay_ms > MAX_DELAY_MS {
        return Err(ConfigError::Invalid {
            field: "oai.delay_ms",
            message: format!("{} exceeds the {} ms ceiling", oai.delay_ms, MAX_DELAY_MS),
        });
    }

    if config.filter.category_prefixes.iter().any(|p| p.is_empty()) {
        return Err(ConfigError::Invalid {
            field: "filter.category_prefixes",
            message: "empty prefix would match every category".to_string(),
        });
    }

    match config.logging.level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => {
            return Err(ConfigError::Invalid {
                field: "logging.level",
                message: format!("'{}' is not one of trace, debug, info, warn, error", other),
            })
        }
    }

    Ok(())
}

/// Index names follow the store's rules: non-empty, lowercase, no spaces or
/// path separators, not starting with `-`, `_` or `+`.
pub fn validate_index_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::Invalid {
        field: "index.name",
        message: format!("'{}' {}", name, message),
    };
    if name.is_empty() {
        return Err(invalid("is empty"));
    }
    if name.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("must be lowercase"));
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(invalid("must not start with '-', '_' or '+'"));
    }
    if name
        .chars()
        .any(|c| matches!(c, ' ' | '\\' | '/' | '*' | '?' | '"' | '<' | '>' | '|' | ',' | '#' | ':'))
    {
        return Err(invalid("contains a character the store does not allow"));
    }
    Ok(())
}

/// Decode an Elastic Cloud ID (`name:base64(host$es_uuid$kibana_uuid)`)
/// into the cluster's HTTPS endpoint.
pub fn decode_cloud_id(cloud_id: &str) -> Result<String, ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        field: "elasticsearch.cloud_id",
        message,
    };

    let payload = match cloud_id.split_once(':') {
        Some((_, p)) => p,
        None => cloud_id,
    };
    let bytes = STANDARD
        .decode(payload)
        .or_else(|_| STANDARD_NO_PAD.decode(payload.trim_end_matches('=')))
        .map_err(|e| invalid(format!("not valid base64: {}", e)))?;
    let decoded = String::from_utf8(bytes).map_err(|_| invalid("not UTF-8".to_string()))?;

    let mut parts = decoded.trim_end().split('$');
    let host_port = parts.next().unwrap_or_default();
    let es_uuid = parts.next().unwrap_or_default();
    if host_port.is_empty() || es_uuid.is_empty() {
        return Err(invalid("missing host or cluster id".to_string()));
    }

    let (host, port) = match host_port.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => (h, Some(p)),
        _ => (host_port, None),
    };

    Ok(match port {
        Some(p) if p != "443" => format!("https://{}.{}:{}", es_uuid, host, p),
        _ => format!("https://{}.{}", es_uuid, host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    fn cloud_id(host: &str, es: &str) -> String {
        format!("deployment:{}", STANDARD.encode(format!("{}${}$kb123", host, es)))
    }

    #[test]
    fn defaults_are_complete() {
        let cfg = Config::default();
        assert_eq!(cfg.index.name, "arxiv-papers-2026");
        assert_eq!(cfg.oai.base_url, "https://export.arxiv.org/oai2");
        assert_eq!(cfg.oai.metadata_prefix, "arXiv");
        assert_eq!(cfg.oai.delay_ms, 1000);
        assert_eq!(cfg.backfill.on_month_error, MonthErrorPolicy::Abort);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn parses_partial_toml() {
        let cfg: Config = toml::from_str(
            r#"
[index]
name = "papers-semantic"

[oai]
delay_ms = 0

[filter]
category_prefixes = ["cs."]

[backfill]
on_month_error = "skip"
"#,
        )
        .unwrap();
        assert_eq!(cfg.index.effective_schema(), IndexSchema::Semantic);
        assert_eq!(cfg.oai.delay_ms, 0);
        assert_eq!(cfg.oai.timeout_secs, 120);
        assert_eq!(cfg.filter.category_prefixes, vec!["cs."]);
        assert_eq!(cfg.backfill.on_month_error, MonthErrorPolicy::Skip);
    }

    #[test]
    fn explicit_schema_wins_over_name() {
        let idx = IndexConfig {
            name: "x-semantic".into(),
            schema: Some(IndexSchema::Basic),
        };
        assert_eq!(idx.effective_schema(), IndexSchema::Basic);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = Config::default();
        apply_env(
            &mut cfg,
            env(&[
                ("ELASTICSEARCH_URL", "http://es:9200/"),
                ("ELASTICSEARCH_API_KEY", "k"),
                ("ES_INDEX", "custom"),
                ("ELASTICSEARCH_USER", ""),
            ]),
        );
        assert_eq!(cfg.elasticsearch.endpoint().unwrap(), "http://es:9200");
        assert_eq!(cfg.elasticsearch.credentials(), Credentials::ApiKey("k".into()));
        assert_eq!(cfg.elasticsearch.username, None);
        assert_eq!(cfg.index.name, "custom");
    }

    #[test]
    fn cloud_id_without_credentials_is_a_config_error() {
        let mut cfg = Config::default();
        cfg.elasticsearch.cloud_id = Some(cloud_id("us-east-1.aws.found.io", "abc"));
        let err = validate(&cfg).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { field: "elasticsearch.api_key", .. }));
    }

    #[test]
    fn half_basic_auth_is_rejected() {
        let mut cfg = Config::default();
        cfg.elasticsearch.username = Some("elastic".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::Missing { .. })));
    }

    #[test]
    fn basic_auth_credentials() {
        let mut cfg = Config::default();
        cfg.elasticsearch.username = Some("elastic".into());
        cfg.elasticsearch.password = Some("pw".into());
        assert!(validate(&cfg).is_ok());
        assert_eq!(
            cfg.elasticsearch.credentials(),
            Credentials::Basic {
                username: "elastic".into(),
                password: "pw".into()
            }
        );
    }

    #[test]
    fn decodes_cloud_id() {
        let url = decode_cloud_id(&cloud_id("us-east-1.aws.found.io", "abc123")).unwrap();
        assert_eq!(url, "https://abc123.us-east-1.aws.found.io");

        let url = decode_cloud_id(&cloud_id("eu.example.io:9243", "def")).unwrap();
        assert_eq!(url, "https://def.eu.example.io:9243");

        let url = decode_cloud_id(&cloud_id("eu.example.io:443", "def")).unwrap();
        assert_eq!(url, "https://def.eu.example.io");
    }

    #[test]
    fn rejects_garbage_cloud_id() {
        assert!(decode_cloud_id("name:%%%").is_err());
        let only_host = format!("n:{}", STANDARD.encode("host.io"));
        assert!(decode_cloud_id(&only_host).is_err());
    }

    #[test]
    fn index_name_rules() {
        assert!(validate_index_name("arxiv-papers-2026").is_ok());
        assert!(validate_index_name("").is_err());
        assert!(validate_index_name("Papers").is_err());
        assert!(validate_index_name("_hidden").is_err());
        assert!(validate_index_name("a b").is_err());
    }

    #[test]
    fn rejects_bad_log_level_and_empty_prefix() {
        let mut cfg = Config::default();
        cfg.logging.level = "loud".into();
        assert!(validate(&cfg).is_err());

        let mut cfg = Config::default();
        cfg.filter.category_prefixes = vec![String::new()];
        assert!(validate(&cfg).is_err());
    }

    #[test]
    fn missing_file_is_fatal_only_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(&path, true),
            Err(ConfigError::Read { .. })
        ));
        let cfg = load_config(&path, false).unwrap();
        assert_eq!(cfg.oai.metadata_prefix, "arXiv");
    }

    #[test]
    fn rejects_excessive_delay() {
        let mut cfg = Config::default();
        cfg.oai.delay_ms = 600_000;
        assert!(matches!(
            validate(&cfg),
            Err(ConfigError::Invalid { field: "oai.delay_ms", .. })
        ));
    }

    #[test]
    fn unparseable_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[index\nname=").unwrap();
        assert!(matches!(
            load_config(&path, false),
            Err(ConfigError::Parse { .. })
        ));
    }
}
