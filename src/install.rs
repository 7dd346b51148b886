//! Hook registration in the host's settings file. The memory engine itself
//! never reads that file; only these two entry points touch it, and
//! uninstall removes exactly the entries install wrote.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;

/// Host event name paired with our CLI argument for it.
const HOOK_EVENTS: [(&str, &str); 6] = [
    ("PreCompact", "pre-compact"),
    ("SessionStart", "session-start"),
    ("UserPromptSubmit", "user-prompt-submit"),
    ("SubagentStart", "subagent-start"),
    ("SubagentStop", "subagent-stop"),
    ("SessionEnd", "session-end"),
];

/// Marker every command we register contains; uninstall matches on it.
const COMMAND_MARKER: &str = "infinite-context";

pub fn install() -> Result<()> {
    let settings_path = crate::paths::host_settings_path()?;
    let exe = std::env::current_exe().context("resolve own executable path")?;
    let mut settings = load_settings(&settings_path)?;
    register_hooks(&mut settings, &quote_if_spaced(&exe.display().to_string()));
    write_settings(&settings_path, &settings)?;
    println!("Registered hooks in {}", settings_path.display());
    Ok(())
}

pub fn uninstall() -> Result<()> {
    let settings_path = crate::paths::host_settings_path()?;
    if !settings_path.exists() {
        println!("Nothing to uninstall.");
        return Ok(());
    }
    let mut settings = load_settings(&settings_path)?;
    remove_our_hooks(&mut settings);
    write_settings(&settings_path, &settings)?;
    println!("Removed hooks from {}", settings_path.display());
    Ok(())
}

fn load_settings(path: &Path) -> Result<Value> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            serde_json::from_str(&contents).context("host settings file is not valid JSON")
        }
        Err(_) => Ok(json!({})),
    }
}

fn write_settings(path: &Path, settings: &Value) -> Result<()> {
    let parent = path.parent().context("settings path has no parent")?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create settings dir {}", parent.display()))?;
    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).context("create temp settings file")?;
    tmp.write_all(serde_json::to_string_pretty(settings)?.as_bytes())
        .context("write settings")?;
    tmp.persist(path)
        .with_context(|| format!("replace settings at {}", path.display()))?;
    Ok(())
}

/// A path containing spaces must be quoted or the host will split it.
fn quote_if_spaced(path: &str) -> String {
    if path.contains(' ') {
        format!("\"{path}\"")
    } else {
        path.to_string()
    }
}

fn register_hooks(settings: &mut Value, command_base: &str) {
    if !settings.is_object() {
        *settings = json!({});
    }
    let root = settings.as_object_mut().expect("settings object");
    let hooks = root
        .entry("hooks")
        .or_insert_with(|| json!({}));
    if !hooks.is_object() {
        *hooks = json!({});
    }
    let hooks = hooks.as_object_mut().expect("hooks object");

    for (event, argument) in HOOK_EVENTS {
        let entry = json!({
            "matcher": "",
            "hooks": [{
                "type": "command",
                "command": format!("{command_base} hook {argument}"),
            }],
        });
        let list = hooks.entry(event).or_insert_with(|| json!([]));
        if !list.is_array() {
            *list = json!([]);
        }
        let list = list.as_array_mut().expect("event array");
        list.retain(|existing| !is_ours(existing));
        list.push(entry);
    }
}

fn remove_our_hooks(settings: &mut Value) {
    let Some(hooks) = settings.get_mut("hooks").and_then(Value::as_object_mut) else {
        return;
    };
    let mut empty_events = Vec::new();
    for (event, list) in hooks.iter_mut() {
        if let Some(entries) = list.as_array_mut() {
            entries.retain(|entry| !is_ours(entry));
            if entries.is_empty() {
                empty_events.push(event.clone());
            }
        }
    }
    for event in empty_events {
        hooks.remove(&event);
    }
}

fn is_ours(entry: &Value) -> bool {
    entry
        .get("hooks")
        .and_then(Value::as_array)
        .is_some_and(|inner| {
            inner.iter().any(|hook| {
                hook.get("command")
                    .and_then(Value::as_str)
                    .is_some_and(|command| {
                        command.contains(COMMAND_MARKER) && command.contains(" hook ")
                    })
            })
        })
}
