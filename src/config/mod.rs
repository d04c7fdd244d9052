//! Configuration management.
//!
//! Configuration is built once at process start and passed by reference to every
//! component. Sources, in increasing precedence:
//!
//! 1. Built-in defaults
//! 2. A TOML file (`--config`, `./robodaily.toml`, or `<config dir>/robodaily/config.toml`)
//! 3. Nested environment variables, e.g. `ROBODAILY_PIPELINE__MAX_ITEMS=50`
//! 4. Flat convenience variables, e.g. `ROBODAILY_LLM_API_KEY`, `ROBODAILY_MAX_ITEMS`
//!
//! # Configuration File Format
//!
//! ```toml
//! [llm]
//! enabled = true
//! provider = "deepseek"
//! model = "deepseek-chat"
//! api_key = "sk-..."
//!
//! [pipeline]
//! max_items = 200
//! filter_batch_size = 40
//! filter_concurrency = 5
//! enrich_concurrency = 4
//!
//! [listing]
//! url = "https://example.org/daily-robotics.html"
//!
//! [relay]
//! url = "https://relay.example.org"
//! token = "..."
//! corp_id = "..."
//! corp_secret = "..."
//! agent_id = 1000002
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion service settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline sizing
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Where snapshots live
    #[serde(default)]
    pub paths: PathsConfig,

    /// Daily listing source
    #[serde(default)]
    pub listing: ListingConfig,

    /// arXiv endpoints
    #[serde(default)]
    pub arxiv: ArxivConfig,

    /// Outbound HTTP settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Messaging relay settings
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Whether LLM-dependent behavior should run at all.
    pub fn llm_is_configured(&self) -> bool {
        self.llm.enabled
            && self
                .llm
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }

    /// Apply the flat `ROBODAILY_*` convenience variables.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; tests pass a map instead.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("ROBODAILY_LLM_ENABLED") {
            self.llm.enabled = parse_bool("ROBODAILY_LLM_ENABLED", &value)?;
        }
        if let Some(value) = lookup("ROBODAILY_LLM_PROVIDER") {
            self.llm.provider = Provider::from_name(&value);
        }
        if let Some(value) = lookup("ROBODAILY_LLM_MODEL") {
            self.llm.model = non_empty(value);
        }
        if let Some(value) = lookup("ROBODAILY_LLM_API_KEY") {
            self.llm.api_key = non_empty(value);
        }
        if let Some(value) = lookup("ROBODAILY_LLM_BASE_URL") {
            self.llm.base_url = non_empty(value);
        }
        if let Some(value) = lookup("ROBODAILY_MAX_ITEMS") {
            self.pipeline.max_items = parse_usize("ROBODAILY_MAX_ITEMS", &value)?;
        }
        if let Some(value) = lookup("ROBODAILY_BATCH_SIZE") {
            self.pipeline.batch_size = parse_usize("ROBODAILY_BATCH_SIZE", &value)?;
        }
        if let Some(value) = lookup("ROBODAILY_LISTING_URL") {
            self.listing.url = non_empty(value);
        }
        if let Some(value) = lookup("ROBODAILY_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(value);
        }
        Ok(())
    }
}

/// Known OpenAI-compatible providers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    OpenAi,
    DeepSeek,
    Qwen,
    #[serde(untagged)]
    Other(String),
}

impl Provider {
    /// Parse a provider name, case-insensitively.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "openai" => Provider::OpenAi,
            "deepseek" => Provider::DeepSeek,
            "qwen" | "dashscope" => Provider::Qwen,
            other => Provider::Other(other.to_string()),
        }
    }

    /// Default chat-completions base URL for this provider
    pub fn default_base_url(&self) -> &str {
        match self {
            Provider::OpenAi | Provider::Other(_) => "https://api.openai.com/v1",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Qwen => "https://dashscope.aliyuncs.com/compatible-mode/v1",
        }
    }

    /// Default model for this provider
    pub fn default_model(&self) -> &str {
        match self {
            Provider::OpenAi | Provider::Other(_) => "gpt-4o-mini",
            Provider::DeepSeek => "deepseek-chat",
            Provider::Qwen => "qwen-plus",
        }
    }

    /// Whether the provider understands the `enable_thinking` request flag
    pub fn supports_reasoning_flag(&self) -> bool {
        matches!(self, Provider::Qwen)
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub provider: Provider,

    /// Model name, provider default when unset
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL override, provider default when unset
    #[serde(default)]
    pub base_url: Option<String>,

    /// Language summaries are written in
    #[serde(default = "default_language")]
    pub language: String,

    /// Ask for extended reasoning on long summaries
    #[serde(default = "default_true")]
    pub reasoning: bool,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: Provider::default(),
            model: None,
            api_key: None,
            base_url: None,
            language: default_language(),
            reasoning: true,
        }
    }
}

impl LlmConfig {
    /// Effective model name
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Effective base URL without a trailing slash
    pub fn endpoint_base(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
    }
}

fn default_language() -> String {
    "English".to_string()
}

fn default_true() -> bool {
    true
}

/// Pipeline sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum listing rows considered per run
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Titles per relevance request
    #[serde(default = "default_filter_batch_size")]
    pub filter_batch_size: usize,

    /// Relevance requests in flight
    #[serde(default = "default_filter_concurrency")]
    pub filter_concurrency: usize,

    /// Papers enriched in parallel
    #[serde(default = "default_enrich_concurrency")]
    pub enrich_concurrency: usize,

    /// Records handled per backfill/regen invocation
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            filter_batch_size: default_filter_batch_size(),
            filter_concurrency: default_filter_concurrency(),
            enrich_concurrency: default_enrich_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}

fn default_max_items() -> usize {
    200
}

fn default_filter_batch_size() -> usize {
    40
}

fn default_filter_concurrency() -> usize {
    5
}

fn default_enrich_concurrency() -> usize {
    4
}

fn default_batch_size() -> usize {
    20
}

/// Snapshot file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl PathsConfig {
    pub fn dataset_path(&self) -> PathBuf {
        self.data_dir.join("papers.json")
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }

    pub fn relevance_path(&self) -> PathBuf {
        self.data_dir.join("relevance.json")
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

/// Daily listing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingConfig {
    /// Page holding the daily paper table
    #[serde(default)]
    pub url: Option<String>,
}

/// arXiv endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArxivConfig {
    #[serde(default = "default_arxiv_base")]
    pub base_url: String,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: default_arxiv_base(),
        }
    }
}

fn default_arxiv_base() -> String {
    "https://arxiv.org".to_string()
}

/// Outbound HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Politeness limit towards the source site, unlimited when unset
    #[serde(default = "default_rps")]
    pub requests_per_second: Option<u32>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: None,
            timeout_seconds: default_timeout(),
            requests_per_second: default_rps(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_rps() -> Option<u32> {
    Some(4)
}

/// Messaging relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Relay base URL; direct delivery when unset
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token for the relay
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub corp_id: Option<String>,

    #[serde(default)]
    pub corp_secret: Option<String>,

    #[serde(default)]
    pub agent_id: i64,

    #[serde(default = "default_to_user")]
    pub to_user: String,

    /// Messaging API base used for direct delivery
    #[serde(default = "default_messaging_api")]
    pub api_base: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            corp_id: None,
            corp_secret: None,
            agent_id: 0,
            to_user: default_to_user(),
            api_base: default_messaging_api(),
        }
    }
}

fn default_to_user() -> String {
    "@all".to_string()
}

fn default_messaging_api() -> String {
    "https://qyapi.weixin.qq.com".to_string()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: String, value: String },
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Find a configuration file in the default locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("robodaily.toml");
    if local.is_file() {
        return Some(local);
    }

    let user = dirs::config_dir()?.join("robodaily").join("config.toml");
    user.is_file().then_some(user)
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("ROBODAILY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.filter_batch_size, 40);
        assert_eq!(config.pipeline.filter_concurrency, 5);
        assert!(!config.llm_is_configured());
        assert_eq!(config.paths.dataset_path(), PathBuf::from("./data/papers.json"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup(&[
                ("ROBODAILY_LLM_ENABLED", "true"),
                ("ROBODAILY_LLM_PROVIDER", "DeepSeek"),
                ("ROBODAILY_LLM_API_KEY", "sk-test"),
                ("ROBODAILY_MAX_ITEMS", "25"),
            ]))
            .unwrap();

        assert!(config.llm_is_configured());
        assert_eq!(config.llm.provider, Provider::DeepSeek);
        assert_eq!(config.llm.model_name(), "deepseek-chat");
        assert_eq!(config.llm.endpoint_base(), "https://api.deepseek.com/v1");
        assert_eq!(config.pipeline.max_items, 25);
    }

    #[test]
    fn test_enabled_without_key_is_not_configured() {
        let mut config = Config::default();
        config
            .apply_env_overrides(lookup(&[
                ("ROBODAILY_LLM_ENABLED", "1"),
                ("ROBODAILY_LLM_API_KEY", "  "),
            ]))
            .unwrap();
        assert!(!config.llm_is_configured());
    }

    #[test]
    fn test_invalid_env_value_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env_overrides(lookup(&[("ROBODAILY_MAX_ITEMS", "lots")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("robodaily.toml");
        std::fs::write(
            &path,
            r#"
[llm]
enabled = true
provider = "qwen"
api_key = "file-key"

[pipeline]
max_items = 12

[listing]
url = "https://example.org/list.html"
"#,
        )
        .unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.llm.provider, Provider::Qwen);
        assert!(config.llm.provider.supports_reasoning_flag());
        assert_eq!(config.pipeline.max_items, 12);
        assert_eq!(config.pipeline.filter_batch_size, 40);
        assert_eq!(
            config.listing.url.as_deref(),
            Some("https://example.org/list.html")
        );
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "llm = = nope").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }
}
