use super::{Cli, Commands};
use crate::config;
use crate::store::Store;
use anyhow::{Context, Result};

/// Dispatch one parsed CLI invocation.
pub async fn run_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install => crate::install::install(),
        Commands::Uninstall => crate::install::uninstall(),
        Commands::Status => status(),
        Commands::Search { keywords, project } => search(&keywords, project.as_deref()),
        Commands::Export { project } => export(project.as_deref()),
        Commands::Prune {
            older_than,
            below_score,
            dry_run,
        } => prune(older_than, below_score, dry_run),
        Commands::Dashboard { port } => crate::dashboard::serve(port).await,
        Commands::Config => print_config(),
        Commands::Hook { event } => {
            crate::hooks::run(event).await;
            Ok(())
        }
    }
}

fn open_store() -> Result<Store> {
    Store::open(&crate::paths::db_path()?).context("open memory store")
}

fn status() -> Result<()> {
    let store = open_store()?;
    let stats = store.stats()?;
    println!("Data root: {}", crate::paths::data_root()?.display());
    println!("Memories:  {}", stats.total);
    println!("Avg score: {:.3}", stats.avg_score);
    for (category, count) in &stats.by_category {
        println!("  {category:<14} {count}");
    }
    let sessions = store.all_sessions()?;
    let live = sessions.iter().filter(|s| s.ended_at.is_none()).count();
    println!("Sessions:  {} ({live} live)", sessions.len());
    Ok(())
}

fn search(keywords: &[String], project: Option<&str>) -> Result<()> {
    let query = keywords.join(" ");
    if query.trim().is_empty() {
        println!("Nothing to search for.");
        return Ok(());
    }
    let store = open_store()?;
    let hits = store.search(&query, project, 10)?;
    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for memory in hits {
        println!("[{}] ({:.2}) {}", memory.category, memory.score, memory.content);
    }
    Ok(())
}

fn export(project: Option<&str>) -> Result<()> {
    let store = open_store()?;
    let memories = store.export_memories(project)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&memories).context("serialize export")?
    );
    Ok(())
}

fn prune(older_than: Option<f64>, below_score: Option<f64>, dry_run: bool) -> Result<()> {
    let store = open_store()?;
    let config = config::config();

    if dry_run {
        if let Some(threshold) = below_score {
            println!(
                "Would delete {} memories below score {threshold}",
                store.count_below_score(threshold)?
            );
        } else if older_than.is_some() {
            println!(
                "Would delete {} untouched memories older than {} days",
                store.count_old(older_than)?,
                older_than.unwrap_or(30.0)
            );
        } else {
            println!(
                "Would delete {} memories below score {}",
                store.count_below_score(config.prune_threshold)?,
                config.prune_threshold
            );
        }
        return Ok(());
    }

    let deleted = if let Some(threshold) = below_score {
        store.prune_below_score(threshold)?
    } else if older_than.is_some() {
        store.prune_old(older_than)?
    } else {
        store.decay_and_prune(&config)?
    };
    println!("Deleted {deleted} memories.");
    Ok(())
}

fn print_config() -> Result<()> {
    let config = config::config();
    println!(
        "{}",
        serde_json::to_string_pretty(config.as_ref()).context("serialize config")?
    );
    Ok(())
}
