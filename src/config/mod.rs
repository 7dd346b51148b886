//! Configuration: defaults, user overrides from `config.json`, validation,
//! a process-wide cached value, and per-project override merging.
//!
//! Every recognized option falls back to its default individually when the
//! user-provided value is malformed or out of range; a broken field never
//! invalidates the rest of the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, LazyLock, RwLock};

/// Filter set applied by keyword extraction.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "has", "have", "this", "that", "with", "from", "they", "them", "then", "than",
    "will", "would", "could", "should", "there", "their", "what", "when", "where", "which",
    "while", "about", "into", "over", "under", "also", "been", "being", "does", "doing", "just",
    "like", "more", "most", "some", "such", "only", "other", "same", "very", "your", "here",
    "each", "because", "after", "before", "between", "these", "those", "were",
];

fn default_category_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("architecture".to_string(), 0.70),
        ("decision".to_string(), 0.65),
        ("error".to_string(), 0.60),
        ("finding".to_string(), 0.55),
        ("file_change".to_string(), 0.45),
        ("note".to_string(), 0.40),
    ])
}

fn default_stopwords() -> BTreeSet<String> {
    DEFAULT_STOPWORDS.iter().map(|w| (*w).to_string()).collect()
}

/// Effective configuration after defaulting and sanitization.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    /// Hard token cap for context assembly on restore.
    pub max_restore_tokens: usize,
    /// Upper bound on memories fetched for restoration.
    pub max_memories_per_restore: usize,
    /// Upper bound on per-prompt recall hits.
    pub max_prompt_recall_results: usize,
    /// Multiplicative score factor per decay interval.
    pub decay_factor: f64,
    /// Inactivity threshold in days before decay applies (>= 1).
    pub decay_interval_days: f64,
    /// Memories with score below this are deleted.
    pub prune_threshold: f64,
    /// Decay never drives a score below this.
    pub score_floor: f64,
    /// Per-project retention cap; lowest-score rows beyond it are pruned.
    pub max_memories_per_project: usize,
    /// Base weight per memory category.
    pub category_weights: BTreeMap<String, f64>,
    /// Keyword filter set.
    pub stopwords: BTreeSet<String>,
    /// Extraction backend selector ("rules" is the only shipped mode).
    pub extraction_mode: String,
    /// Per-project partial overrides keyed by project path.
    pub projects: BTreeMap<String, ProjectOverride>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_restore_tokens: 4000,
            max_memories_per_restore: 20,
            max_prompt_recall_results: 5,
            decay_factor: 0.95,
            decay_interval_days: 1.0,
            prune_threshold: 0.05,
            score_floor: 0.01,
            max_memories_per_project: 5000,
            category_weights: default_category_weights(),
            stopwords: default_stopwords(),
            extraction_mode: "rules".to_string(),
            projects: BTreeMap::new(),
        }
    }
}

/// Per-project partial override. Absent fields inherit the global value;
/// `category_weights` deep-merges instead of replacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectOverride {
    pub max_restore_tokens: Option<f64>,
    pub max_memories_per_restore: Option<f64>,
    pub max_prompt_recall_results: Option<f64>,
    pub decay_factor: Option<f64>,
    pub decay_interval_days: Option<f64>,
    pub prune_threshold: Option<f64>,
    pub score_floor: Option<f64>,
    pub max_memories_per_project: Option<f64>,
    pub category_weights: Option<BTreeMap<String, f64>>,
    pub stopwords: Option<Vec<String>>,
    pub extraction_mode: Option<String>,
}

fn int_or(value: Option<f64>, default: usize) -> usize {
    match value {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(v) if v.is_finite() && v >= 1.0 => v.round() as usize,
        _ => default,
    }
}

fn fraction_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && (0.0..=1.0).contains(&v) => v,
        _ => default,
    }
}

fn interval_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v >= 1.0 => v,
        _ => default,
    }
}

impl ContextConfig {
    /// Parse and sanitize a JSON document. A malformed document yields
    /// defaults; a malformed field falls back alone.
    pub fn from_json(contents: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(contents) {
            Ok(value) if value.is_object() => Self::from_value(&value),
            Ok(_) | Err(_) => {
                tracing::warn!("config.json is not a JSON object, using defaults");
                Self::default()
            }
        }
    }

    fn from_value(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        let defaults = ContextConfig::default();
        let number = |key: &str| value.get(key).and_then(Value::as_f64);

        let mut category_weights = defaults.category_weights.clone();
        if let Some(user_weights) = value.get("categoryWeights").and_then(Value::as_object) {
            for (category, weight) in user_weights {
                if let Some(weight) = weight.as_f64() {
                    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
                        category_weights.insert(category.clone(), weight);
                    }
                }
            }
        }

        let stopwords = value
            .get("stopwords")
            .and_then(Value::as_array)
            .map(|words| {
                words
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_lowercase)
                    .collect()
            })
            .unwrap_or(defaults.stopwords);

        let projects = value
            .get("projects")
            .map(|raw| {
                serde_json::from_value::<BTreeMap<String, ProjectOverride>>(raw.clone())
                    .unwrap_or_else(|err| {
                        tracing::warn!("project overrides unreadable, ignoring them: {err}");
                        BTreeMap::new()
                    })
            })
            .unwrap_or_default();

        ContextConfig {
            max_restore_tokens: int_or(number("maxRestoreTokens"), defaults.max_restore_tokens),
            max_memories_per_restore: int_or(
                number("maxMemoriesPerRestore"),
                defaults.max_memories_per_restore,
            ),
            max_prompt_recall_results: int_or(
                number("maxPromptRecallResults"),
                defaults.max_prompt_recall_results,
            ),
            decay_factor: fraction_or(number("decayFactor"), defaults.decay_factor),
            decay_interval_days: interval_or(
                number("decayIntervalDays"),
                defaults.decay_interval_days,
            ),
            prune_threshold: fraction_or(number("pruneThreshold"), defaults.prune_threshold),
            score_floor: fraction_or(number("scoreFloor"), defaults.score_floor),
            max_memories_per_project: int_or(
                number("maxMemoriesPerProject"),
                defaults.max_memories_per_project,
            ),
            category_weights,
            stopwords,
            extraction_mode: value
                .get("extractionMode")
                .and_then(Value::as_str)
                .map_or(defaults.extraction_mode, str::to_string),
            projects,
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(_) => Self::default(),
        }
    }

    /// Write to `path` via temp-file + rename so a crash mid-write never
    /// leaves a truncated file.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .context("config path has no parent directory")?;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create config dir {}", parent.display()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .context("create temp file for config write")?;
        let json = serde_json::to_string_pretty(self).context("serialize config")?;
        tmp.write_all(json.as_bytes())
            .context("write config contents")?;
        tmp.persist(path)
            .with_context(|| format!("replace config at {}", path.display()))?;
        Ok(())
    }

    /// Global config shallow-merged with the per-project override; category
    /// weights deep-merge.
    pub fn project_config(&self, project: &str) -> ContextConfig {
        let Some(overrides) = self.projects.get(project) else {
            return self.clone();
        };
        let mut merged = self.clone();
        merged.max_restore_tokens = int_or(overrides.max_restore_tokens, self.max_restore_tokens);
        merged.max_memories_per_restore = int_or(
            overrides.max_memories_per_restore,
            self.max_memories_per_restore,
        );
        merged.max_prompt_recall_results = int_or(
            overrides.max_prompt_recall_results,
            self.max_prompt_recall_results,
        );
        merged.decay_factor = fraction_or(overrides.decay_factor, self.decay_factor);
        merged.decay_interval_days =
            interval_or(overrides.decay_interval_days, self.decay_interval_days);
        merged.prune_threshold = fraction_or(overrides.prune_threshold, self.prune_threshold);
        merged.score_floor = fraction_or(overrides.score_floor, self.score_floor);
        merged.max_memories_per_project = int_or(
            overrides.max_memories_per_project,
            self.max_memories_per_project,
        );
        if let Some(weights) = &overrides.category_weights {
            for (category, weight) in weights {
                if weight.is_finite() && (0.0..=1.0).contains(weight) {
                    merged
                        .category_weights
                        .insert(category.clone(), *weight);
                }
            }
        }
        if let Some(stopwords) = &overrides.stopwords {
            merged.stopwords = stopwords.iter().map(|w| w.to_lowercase()).collect();
        }
        if let Some(mode) = &overrides.extraction_mode {
            merged.extraction_mode.clone_from(mode);
        }
        merged
    }

    /// Base weight for a category; unknown categories score 0.4.
    pub fn category_weight(&self, category: &str) -> f64 {
        self.category_weights.get(category).copied().unwrap_or(0.4)
    }
}

static CACHED: LazyLock<RwLock<Option<Arc<ContextConfig>>>> = LazyLock::new(|| RwLock::new(None));

/// Process-wide configuration, loaded lazily from the data root.
pub fn config() -> Arc<ContextConfig> {
    if let Some(cached) = CACHED.read().expect("config lock poisoned").as_ref() {
        return Arc::clone(cached);
    }
    let loaded = Arc::new(match crate::paths::config_path() {
        Ok(path) => ContextConfig::load_from(&path),
        Err(err) => {
            tracing::warn!("could not resolve config path, using defaults: {err}");
            ContextConfig::default()
        }
    });
    let mut slot = CACHED.write().expect("config lock poisoned");
    // Another caller may have raced us; first write wins.
    if let Some(existing) = slot.as_ref() {
        return Arc::clone(existing);
    }
    *slot = Some(Arc::clone(&loaded));
    loaded
}

/// Discard the cached value; the next [`config`] call re-reads disk.
pub fn reset_config() {
    *CACHED.write().expect("config lock poisoned") = None;
}
