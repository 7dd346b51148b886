//! Context assembly: rank archived memories by live importance and emit a
//! token-budgeted markdown block grouped by category.

use crate::config::ContextConfig;
use crate::scoring::{compute_importance, estimate_tokens};
use crate::types::{Memory, MemoryCategory};
use chrono::Utc;
use std::collections::BTreeSet;

const TOP_HEADER: &str = "## Prior Context (restored from archive)\n";
const RECALL_HEADER: &str = "## Relevant prior context\n";

/// Emission order of the category sections.
const SECTION_ORDER: [MemoryCategory; 6] = [
    MemoryCategory::Architecture,
    MemoryCategory::Decision,
    MemoryCategory::Error,
    MemoryCategory::Finding,
    MemoryCategory::FileChange,
    MemoryCategory::Note,
];

fn section_label(category: MemoryCategory) -> &'static str {
    match category {
        MemoryCategory::Architecture => "Architecture & Design",
        MemoryCategory::Decision => "Key Decisions",
        MemoryCategory::Error => "Known Issues",
        MemoryCategory::Finding => "Findings",
        MemoryCategory::FileChange => "Files Modified",
        MemoryCategory::Note => "Notes",
    }
}

/// Categories outside the closed set route into the Notes bucket.
fn bucket_of(memory: &Memory) -> MemoryCategory {
    MemoryCategory::parse(&memory.category).unwrap_or(MemoryCategory::Note)
}

fn section_header(category: MemoryCategory) -> String {
    format!("\n### {}\n", section_label(category))
}

fn memory_line(memory: &Memory) -> String {
    format!("- {}\n", memory.content)
}

#[derive(Debug, Default, Clone)]
pub struct RestoredContext {
    pub text: String,
    /// Admitted memory ids in rank order; the caller touches these.
    pub ids: Vec<i64>,
}

impl RestoredContext {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Assemble the restoration block.
///
/// `budget: None` uses the configured default; an explicit 0 restores
/// nothing. The running token count includes the top header and each section
/// header, so the emitted text never exceeds the budget by more than the
/// last admitted line.
pub fn restore_context(
    memories: &[Memory],
    budget: Option<usize>,
    config: &ContextConfig,
) -> RestoredContext {
    let budget = budget.unwrap_or(config.max_restore_tokens);
    if budget == 0 || memories.is_empty() {
        return RestoredContext::default();
    }

    let now = Utc::now();
    let mut ranked: Vec<(f64, &Memory)> = memories
        .iter()
        .map(|m| (compute_importance(m, now), m))
        .collect();
    ranked.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut used = estimate_tokens(TOP_HEADER);
    let mut seen_sections: BTreeSet<&'static str> = BTreeSet::new();
    let mut admitted: Vec<&Memory> = Vec::new();
    for (_, memory) in ranked {
        let bucket = bucket_of(memory);
        let header_cost = if seen_sections.contains(section_label(bucket)) {
            0
        } else {
            estimate_tokens(&section_header(bucket))
        };
        let line_cost = estimate_tokens(&memory_line(memory));
        if used + header_cost + line_cost > budget {
            break;
        }
        used += header_cost + line_cost;
        seen_sections.insert(section_label(bucket));
        admitted.push(memory);
    }

    if admitted.is_empty() {
        return RestoredContext::default();
    }

    let mut text = String::from(TOP_HEADER);
    for category in SECTION_ORDER {
        let section: Vec<&&Memory> = admitted
            .iter()
            .filter(|m| bucket_of(m) == category)
            .collect();
        if section.is_empty() {
            continue;
        }
        text.push_str(&section_header(category));
        for memory in section {
            text.push_str(&memory_line(memory));
        }
    }

    RestoredContext {
        text,
        ids: admitted.iter().map(|m| m.id).collect(),
    }
}

/// Flat recall block for per-prompt hits.
pub fn recall_for_prompt(results: &[Memory]) -> RestoredContext {
    if results.is_empty() {
        return RestoredContext::default();
    }
    let mut text = String::from(RECALL_HEADER);
    for memory in results {
        text.push_str(&format!("- [{}] {}\n", memory.category, memory.content));
    }
    RestoredContext {
        text,
        ids: results.iter().map(|m| m.id).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory(id: i64, category: &str, content: &str, score: f64) -> Memory {
        let now = Utc::now().to_rfc3339();
        Memory {
            id,
            project: "/proj".into(),
            session_id: None,
            category: category.into(),
            content: content.into(),
            keywords: String::new(),
            score,
            created_at: now.clone(),
            last_accessed: now,
            access_count: 0,
            source_hash: None,
            metadata: None,
        }
    }

    fn config() -> ContextConfig {
        ContextConfig::default()
    }

    #[test]
    fn empty_input_restores_nothing() {
        let restored = restore_context(&[], None, &config());
        assert!(restored.is_empty());
        assert!(restored.ids.is_empty());
    }

    #[test]
    fn zero_budget_restores_nothing() {
        let memories = vec![memory(1, "note", "something", 0.9)];
        let restored = restore_context(&memories, Some(0), &config());
        assert!(restored.is_empty());
    }

    #[test]
    fn missing_budget_uses_configured_default() {
        let memories = vec![memory(1, "note", "something worth keeping", 0.9)];
        let restored = restore_context(&memories, None, &config());
        assert!(!restored.is_empty());
        assert_eq!(restored.ids, vec![1]);
    }

    #[test]
    fn sections_appear_in_fixed_order_without_empty_headers() {
        let memories = vec![
            memory(1, "note", "a note", 0.5),
            memory(2, "decision", "a decision", 0.5),
            memory(3, "architecture", "an architecture fact", 0.5),
        ];
        let restored = restore_context(&memories, Some(4000), &config());

        let text = &restored.text;
        assert!(text.starts_with("## Prior Context (restored from archive)\n"));
        let architecture = text.find("### Architecture & Design").unwrap();
        let decisions = text.find("### Key Decisions").unwrap();
        let notes = text.find("### Notes").unwrap();
        assert!(architecture < decisions && decisions < notes);
        assert!(!text.contains("### Known Issues"));
        assert!(!text.contains("### Findings"));
        assert!(!text.contains("### Files Modified"));
    }

    #[test]
    fn unknown_categories_bucket_into_notes() {
        let memories = vec![memory(1, "mystery", "odd memory", 0.5)];
        let restored = restore_context(&memories, Some(4000), &config());
        assert!(restored.text.contains("### Notes"));
        assert!(restored.text.contains("- odd memory"));
    }

    #[test]
    fn ranking_uses_importance_not_base_score() {
        let now = Utc::now();
        let mut stale_high = memory(1, "decision", "stale but high base", 0.9);
        let old = (now - Duration::days(30)).to_rfc3339();
        stale_high.created_at.clone_from(&old);
        stale_high.last_accessed = old;
        let mut fresh_touched = memory(2, "decision", "fresh and touched", 0.5);
        fresh_touched.access_count = 5;

        let restored = restore_context(&[stale_high, fresh_touched], Some(4000), &config());
        assert_eq!(restored.ids[0], 2);
    }

    #[test]
    fn budget_includes_section_headers() {
        let memories: Vec<Memory> = [
            ("architecture", "architecture line spanning some width"),
            ("decision", "decision line spanning some width too"),
            ("error", "error line spanning roughly equal width"),
            ("finding", "finding line spanning roughly equal size"),
            ("file_change", "file change line of comparable width"),
            ("note", "note line of a comparable width as well"),
        ]
        .iter()
        .enumerate()
        .map(|(i, (category, content))| memory(i64::try_from(i).unwrap() + 1, category, content, 0.5))
        .collect();

        // Generous budget: all six fit, text stays within it.
        let generous = restore_context(&memories, Some(4000), &config());
        assert_eq!(generous.ids.len(), 6);
        assert!(estimate_tokens(&generous.text) <= 4000);

        // Tight budget: fewer admitted, and the emitted text (headers
        // included) never exceeds the budget.
        let tight_budget = 40;
        let tight = restore_context(&memories, Some(tight_budget), &config());
        assert!(tight.ids.len() < 6);
        assert!(!tight.ids.is_empty());
        assert!(estimate_tokens(&tight.text) <= tight_budget);
    }

    #[test]
    fn ids_come_back_in_rank_order() {
        let memories = vec![
            memory(1, "note", "low", 0.1),
            memory(2, "note", "high", 0.9),
            memory(3, "note", "mid", 0.5),
        ];
        let restored = restore_context(&memories, Some(4000), &config());
        assert_eq!(restored.ids, vec![2, 3, 1]);
    }

    #[test]
    fn recall_formats_category_tagged_lines() {
        let results = vec![
            memory(1, "error", "Error encountered: boom", 0.5),
            memory(2, "decision", "Use sqlite", 0.5),
        ];
        let recalled = recall_for_prompt(&results);
        assert!(recalled.text.starts_with("## Relevant prior context\n"));
        assert!(recalled.text.contains("- [error] Error encountered: boom"));
        assert!(recalled.text.contains("- [decision] Use sqlite"));
        assert_eq!(recalled.ids, vec![1, 2]);
    }

    #[test]
    fn recall_of_nothing_is_empty() {
        assert!(recall_for_prompt(&[]).is_empty());
    }
}
