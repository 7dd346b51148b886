//! Extraction: turning conversational turns into typed memory records.
//!
//! The trait is the seam for alternative extraction backends; the rule-based
//! implementation in [`rules`] is the one that ships. Selection goes through
//! the per-project `extraction_mode` config value.

mod rules;

pub use rules::RuleExtractor;

use crate::config::ContextConfig;
use crate::transcript::Turn;
use crate::types::NewMemory;
use sha2::{Digest, Sha256};

pub trait Extractor {
    fn extract(&self, turns: &[Turn], project: &str, session_id: &str) -> Vec<NewMemory>;
}

/// Pick the extractor for a project's effective config. Unknown modes fall
/// back to rules with a log line rather than failing the hook.
pub fn extractor_for(config: &ContextConfig) -> Box<dyn Extractor> {
    match config.extraction_mode.as_str() {
        "rules" => Box::new(RuleExtractor::new(config.clone())),
        other => {
            tracing::warn!("unknown extraction mode {other:?}, falling back to rules");
            Box::new(RuleExtractor::new(config.clone()))
        }
    }
}

/// 16-hex-char dedup fingerprint: the SHA-256 prefix of the deriving text.
pub fn source_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}
