//! Advisory per-session recall rate limit, persisted as a small JSON map of
//! session key to epoch seconds. Best-effort state: losing the file merely
//! allows one extra recall.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

const RECALL_INTERVAL_SECS: i64 = 60;

pub(super) struct PromptRateLimiter {
    path: PathBuf,
}

impl PromptRateLimiter {
    pub(super) fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Whether a recall may run for `key` at `now`; records the attempt when
    /// allowed.
    pub(super) fn allow(&self, key: &str, now: i64) -> bool {
        let mut state = self.load();
        if let Some(last) = state.get(key) {
            if now - last < RECALL_INTERVAL_SECS {
                return false;
            }
        }
        state.insert(key.to_string(), now);
        self.save(&state);
        true
    }

    fn load(&self) -> HashMap<String, i64> {
        std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|contents| serde_json::from_str(&contents).ok())
            .unwrap_or_default()
    }

    fn save(&self, state: &HashMap<String, i64>) {
        if let Ok(contents) = serde_json::to_string(state) {
            if let Err(err) = std::fs::write(&self.path, contents) {
                tracing::debug!("rate-limit state write failed: {err}");
            }
        }
    }
}
