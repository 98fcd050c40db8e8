//! Pipeline configuration.
//!
//! A [`PipelineConfig`] names the model ids to load for each supported
//! language and the resource limits the core enforces. It can be built in
//! code through [`PipelineConfig::builder`] or read from JSON:
//!
//! ```json
//! {
//!   "languages": { "de": { "linguistic": "de-ud", "grammar": "de-DE" } },
//!   "defaultLanguage": "de",
//!   "limits": { "maxInputChars": 10000, "modelCacheCapacity": 4, "loadTimeoutMs": 120000 },
//!   "grammar": { "maxSuggestions": 5 }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatzbauError};
use crate::model::manager::CacheLimits;
use crate::model::{ModelKey, ModelKind};

pub const DEFAULT_LANGUAGE: &str = "de";
pub const DEFAULT_MAX_INPUT_CHARS: usize = 10_000;
pub const DEFAULT_MODEL_CACHE_CAPACITY: usize = 4;
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

/// Model ids for one language. The ids are opaque to the core and only
/// interpreted by the [`ModelLoader`](crate::model::ModelLoader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageModels {
    pub linguistic: String,
    pub grammar: String,
}

impl LanguageModels {
    pub fn new(linguistic: impl Into<String>, grammar: impl Into<String>) -> Self {
        Self {
            linguistic: linguistic.into(),
            grammar: grammar.into(),
        }
    }

    pub fn model_id(&self, kind: ModelKind) -> &str {
        match kind {
            ModelKind::Linguistic => &self.linguistic,
            ModelKind::Grammar => &self.grammar,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourceLimits {
    /// Inputs longer than this many chars are rejected, never truncated.
    pub max_input_chars: usize,
    pub model_cache_capacity: usize,
    pub memory_budget_bytes: Option<u64>,
    /// Per-caller wait for a model load.
    pub load_timeout_ms: u64,
}

impl ResourceLimits {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn cache_limits(&self) -> CacheLimits {
        CacheLimits {
            capacity: self.model_cache_capacity,
            memory_budget: self.memory_budget_bytes,
            load_timeout: self.load_timeout(),
        }
    }
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            model_cache_capacity: DEFAULT_MODEL_CACHE_CAPACITY,
            memory_budget_bytes: None,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrammarSettings {
    /// Suggestions kept per issue.
    pub max_suggestions: usize,
}

impl Default for GrammarSettings {
    fn default() -> Self {
        Self {
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

/// Configuration for the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Supported languages and their model ids.
    pub languages: HashMap<String, LanguageModels>,
    /// Used when a request does not name a language.
    pub default_language: String,
    pub limits: ResourceLimits,
    pub grammar: GrammarSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut languages = HashMap::new();
        languages.insert(
            DEFAULT_LANGUAGE.to_string(),
            LanguageModels::new("de-ud", "de-DE"),
        );
        Self {
            languages,
            default_language: DEFAULT_LANGUAGE.to_string(),
            limits: ResourceLimits::default(),
            grammar: GrammarSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.languages.is_empty() {
            return Err(SatzbauError::invalid_config("no languages configured"));
        }
        for (code, models) in &self.languages {
            if code.trim().is_empty() {
                return Err(SatzbauError::invalid_config("empty language code"));
            }
            if models.linguistic.trim().is_empty() || models.grammar.trim().is_empty() {
                return Err(SatzbauError::invalid_config(format!(
                    "language '{code}' has an empty model id"
                )));
            }
        }
        if self.find_language(&self.default_language).is_none() {
            return Err(SatzbauError::invalid_config(format!(
                "default language '{}' is not configured",
                self.default_language
            )));
        }
        if self.limits.max_input_chars == 0 {
            return Err(SatzbauError::invalid_config("maxInputChars must be > 0"));
        }
        if self.limits.model_cache_capacity == 0 {
            return Err(SatzbauError::invalid_config(
                "modelCacheCapacity must be > 0",
            ));
        }
        if self.limits.load_timeout_ms == 0 {
            return Err(SatzbauError::invalid_config("loadTimeoutMs must be > 0"));
        }
        if self.limits.memory_budget_bytes == Some(0) {
            return Err(SatzbauError::invalid_config(
                "memoryBudgetBytes must be > 0 when set",
            ));
        }
        Ok(())
    }

    /// Map a requested language code onto a configured one.
    ///
    /// An empty code selects the default language. Otherwise an exact
    /// (case-insensitive) match wins, then the primary subtag (`de-AT` finds
    /// `de`), then for a bare primary subtag any `<primary>-*` entry.
    pub fn resolve_language(&self, code: &str) -> Result<String> {
        let code = code.trim();
        let code = if code.is_empty() {
            self.default_language.as_str()
        } else {
            code
        };
        self.find_language(code)
            .map(str::to_string)
            .ok_or_else(|| SatzbauError::unsupported_language(code))
    }

    fn find_language(&self, code: &str) -> Option<&str> {
        let wanted = code.replace('_', "-").to_lowercase();

        if let Some(found) = self.languages.keys().find(|k| k.to_lowercase() == wanted) {
            return Some(found.as_str());
        }

        let (primary, has_region) = match wanted.split_once('-') {
            Some((primary, _)) => (primary, true),
            None => (wanted.as_str(), false),
        };
        if has_region {
            return self
                .languages
                .keys()
                .find(|k| k.to_lowercase() == primary)
                .map(String::as_str);
        }

        let prefix = format!("{primary}-");
        let mut regional: Vec<&String> = self
            .languages
            .keys()
            .filter(|k| k.to_lowercase().starts_with(&prefix))
            .collect();
        regional.sort();
        regional.first().map(|k| k.as_str())
    }

    /// Languages in sorted order.
    pub fn supported_languages(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.languages.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Every `(kind, language)` key with the model id to load for it.
    pub fn model_catalog(&self) -> HashMap<ModelKey, String> {
        let mut catalog = HashMap::new();
        for (code, models) in &self.languages {
            for kind in [ModelKind::Linguistic, ModelKind::Grammar] {
                catalog.insert(
                    ModelKey::new(kind, code.clone()),
                    models.model_id(kind).to_string(),
                );
            }
        }
        catalog
    }
}

/// Builder for [`PipelineConfig`]. Starts with no languages.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    languages: HashMap<String, LanguageModels>,
    default_language: Option<String>,
    limits: ResourceLimits,
    grammar: GrammarSettings,
}

impl PipelineConfigBuilder {
    pub fn add_language(
        mut self,
        code: impl Into<String>,
        linguistic: impl Into<String>,
        grammar: impl Into<String>,
    ) -> Self {
        self.languages
            .insert(code.into(), LanguageModels::new(linguistic, grammar));
        self
    }

    pub fn default_language(mut self, code: impl Into<String>) -> Self {
        self.default_language = Some(code.into());
        self
    }

    pub fn max_input_chars(mut self, max: usize) -> Self {
        self.limits.max_input_chars = max;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.limits.model_cache_capacity = capacity;
        self
    }

    pub fn memory_budget(mut self, bytes: u64) -> Self {
        self.limits.memory_budget_bytes = Some(bytes);
        self
    }

    pub fn load_timeout(mut self, timeout: Duration) -> Self {
        self.limits.load_timeout_ms = timeout.as_millis().min(u128::from(u64::MAX)) as u64;
        self
    }

    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.grammar.max_suggestions = max;
        self
    }

    /// Validate and build. Without an explicit default language, `de` is
    /// used when configured, otherwise the alphabetically first language.
    pub fn build(self) -> Result<PipelineConfig> {
        let default_language = match self.default_language {
            Some(code) => code,
            None if self.languages.contains_key(DEFAULT_LANGUAGE) => DEFAULT_LANGUAGE.to_string(),
            None => self
                .languages
                .keys()
                .min()
                .cloned()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        };
        let config = PipelineConfig {
            languages: self.languages,
            default_language,
            limits: self.limits,
            grammar: self.grammar,
        };
        config.validate()?;
        Ok(config)
    }
}
