use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tracing::warn;
use url::Url;

use super::error::{OntomatchError, ValidationIssue};

pub type ConfigIssue = ValidationIssue;

/// Environment variables are read as `ONTOMATCH__<FIELD>` and
/// `ONTOMATCH__<SECTION>__<FIELD>`.
pub const ENV_PREFIX: &str = "ONTOMATCH";

/// Optional path of a TOML/JSON/YAML config file picked up by [`OntomatchConfig::from_env`].
pub const CONFIG_PATH_ENV: &str = "ONTOMATCH_CONFIG";


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Helix,
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub min_depth: usize,
    pub min_score: f64,
    pub enable_parent_boost: bool,
    pub parent_boost: f64,
    pub top_n: usize,
    pub min_concept_count: usize,
    pub explain_max_chars: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_depth: 3,
            min_score: 1.0,
            enable_parent_boost: true,
            parent_boost: 0.3,
            top_n: 10,
            min_concept_count: 1,
            explain_max_chars: 600,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub default_limit: usize,
    pub name_weight: f64,
    pub semantic_weight: f64,
    pub vector_top_k: usize,
    pub rerank_enabled: bool,
    pub rerank_candidates: usize,
    pub rerank_min_score: f64,
    pub mmr_lambda: f64,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub chunk_size: usize,
    pub llm_query_analysis: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            name_weight: 0.4,
            semantic_weight: 0.6,
            vector_top_k: 50,
            rerank_enabled: true,
            rerank_candidates: 20,
            rerank_min_score: 0.80,
            mmr_lambda: 0.7,
            cache_ttl_secs: crate::DEFAULT_CACHE_TTL,
            cache_max_entries: 500,
            chunk_size: 512,
            llm_query_analysis: true,
        }
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub min_token_length: usize,
    pub max_examples: usize,
    pub job_interval_hours: u64,
    pub default_parent: String,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_token_length: 3,
            max_examples: 20,
            job_interval_hours: 24,
            default_parent: "it".to_string(),
        }
    }
}

impl EvolutionConfig {
    pub fn job_interval(&self) -> Duration {
        Duration::from_secs(self.job_interval_hours * 3600)
    }
}


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OntomatchConfig {
    pub storage_backend: StorageBackend,

    pub host: String,
    pub port: u16,
    pub instance: String,
    pub timeout: u64,
    pub max_retries: u32,

    /// `none` disables every LLM-backed feature; they fall back to their rule-based paths.
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_temperature: f32,

    pub llm_fallback_enabled: bool,
    pub llm_fallback_url: String,
    pub llm_fallback_model: String,

    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_url: String,
    pub embedding_api_key: Option<String>,
    pub embedding_dimensions: usize,
    pub embedding_max_attempts: u32,
    pub embedding_initial_backoff_ms: u64,
    pub embedding_cache_size: usize,

    pub taxonomy_path: Option<PathBuf>,
    pub profiles_path: Option<PathBuf>,

    pub matching: MatchingConfig,
    pub search: SearchConfig,
    pub evolution: EvolutionConfig,
}

impl Default for OntomatchConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::Memory,

            host: "localhost".to_string(),
            port: crate::DEFAULT_HELIX_PORT,
            instance: "dev".to_string(),
            timeout: 30,
            max_retries: 3,

            llm_provider: "ollama".to_string(),
            llm_model: crate::DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_base_url: None,
            llm_temperature: 0.2,

            llm_fallback_enabled: false,
            llm_fallback_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            llm_fallback_model: "llama3.2".to_string(),

            embedding_provider: "ollama".to_string(),
            embedding_model: crate::DEFAULT_EMBEDDING_MODEL.to_string(),
            embedding_url: crate::DEFAULT_OLLAMA_URL.to_string(),
            embedding_api_key: None,
            embedding_dimensions: 768,
            embedding_max_attempts: 3,
            embedding_initial_backoff_ms: 200,
            embedding_cache_size: crate::DEFAULT_CACHE_SIZE,

            taxonomy_path: None,
            profiles_path: None,

            matching: MatchingConfig::default(),
            search: SearchConfig::default(),
            evolution: EvolutionConfig::default(),
        }
    }
}

impl OntomatchConfig {
    /// Defaults, then the optional file at `path`, then `ONTOMATCH__*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, OntomatchError> {
        let defaults = ::config::Config::try_from(&Self::default())
            .map_err(|e| OntomatchError::Config(e.to_string()))?;

        let mut builder = ::config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(true));
        }
        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .map_err(|e| OntomatchError::Config(e.to_string()))
    }

    /// Used by the binaries; a broken configuration falls back to defaults.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        match Self::load(path.as_deref()) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn helix_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn llm_enabled(&self) -> bool {
        !self.llm_provider.eq_ignore_ascii_case("none")
    }

    pub fn validate(&self) -> Result<(), Vec<ConfigIssue>> {
        let mut issues = Vec::new();

        if self.host.trim().is_empty() {
            issues.push(ConfigIssue::new("host", "must not be empty"));
        }
        check_url(&mut issues, "embedding_url", &self.embedding_url);
        if self.llm_fallback_enabled {
            check_url(&mut issues, "llm_fallback_url", &self.llm_fallback_url);
        }
        if let Some(url) = &self.llm_base_url {
            check_url(&mut issues, "llm_base_url", url);
        }
        if self.embedding_dimensions == 0 {
            issues.push(ConfigIssue::new("embedding_dimensions", "must be positive"));
        }
        if self.embedding_max_attempts == 0 {
            issues.push(ConfigIssue::new("embedding_max_attempts", "must be at least 1"));
        }

        if self.matching.min_depth == 0 {
            issues.push(ConfigIssue::new("matching.min_depth", "must be at least 1"));
        }
        if self.matching.min_score < 0.0 {
            issues.push(ConfigIssue::new("matching.min_score", "must not be negative"));
        }

        let search = &self.search;
        for (field, value) in [
            ("search.name_weight", search.name_weight),
            ("search.semantic_weight", search.semantic_weight),
            ("search.rerank_min_score", search.rerank_min_score),
            ("search.mmr_lambda", search.mmr_lambda),
        ] {
            if !(0.0..=1.0).contains(&value) {
                issues.push(ConfigIssue::new(field, "must be within [0, 1]"));
            }
        }
        if (search.name_weight + search.semantic_weight - 1.0).abs() > 1e-6 {
            issues.push(ConfigIssue::new(
                "search.semantic_weight",
                "name_weight + semantic_weight must equal 1",
            ));
        }
        if search.default_limit == 0 {
            issues.push(ConfigIssue::new("search.default_limit", "must be positive"));
        }
        if search.cache_max_entries == 0 {
            issues.push(ConfigIssue::new("search.cache_max_entries", "must be positive"));
        }

        if self.evolution.max_examples == 0 {
            issues.push(ConfigIssue::new("evolution.max_examples", "must be positive"));
        }
        if self.evolution.job_interval_hours == 0 {
            issues.push(ConfigIssue::new("evolution.job_interval_hours", "must be positive"));
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }
}

fn check_url(issues: &mut Vec<ConfigIssue>, field: &str, value: &str) {
    if let Err(e) = Url::parse(value) {
        issues.push(ConfigIssue::new(field, format!("invalid URL: {e}")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = OntomatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.min_depth, 3);
        assert_eq!(config.search.rerank_candidates, 20);
        assert_eq!(config.evolution.job_interval(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_validate_collects_every_issue() {
        let mut config = OntomatchConfig::default();
        config.embedding_url = "not a url".to_string();
        config.search.name_weight = 0.7;
        config.matching.min_depth = 0;

        let issues = config.validate().unwrap_err();
        let fields: Vec<&str> = issues.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"embedding_url"));
        assert!(fields.contains(&"search.semantic_weight"));
        assert!(fields.contains(&"matching.min_depth"));
    }

    #[test]
    fn test_load_from_file_layers_over_defaults() {
        let dir = std::env::temp_dir().join(format!("ontomatch-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ontomatch.json");
        std::fs::write(
            &path,
            r#"{"storage_backend": "helix", "port": 7000, "matching": {"min_score": 1.5}}"#,
        )
        .unwrap();

        let config = OntomatchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage_backend, StorageBackend::Helix);
        assert_eq!(config.port, 7000);
        assert_eq!(config.matching.min_score, 1.5);
        assert_eq!(config.matching.min_depth, 3);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_llm_can_be_disabled() {
        let config = OntomatchConfig {
            llm_provider: "none".to_string(),
            ..Default::default()
        };
        assert!(!config.llm_enabled());
    }
}
