use clap::Parser;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

mod cli;

use cli::{Cli, Commands};
use dirview::controller::{self, NavigationHandle, ViewEvent, ViewSnapshot};
use dirview::error::{Result, ViewError};
use dirview::local::local_services;
use dirview::model::LocationKind;
use dirview::script::ScriptRunner;
use dirview::EngineConfig;

const SEARCH_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A log file named by DIRVIEW_LOG takes precedence over --verbose
    if let Ok(log_file) = std::env::var("DIRVIEW_LOG") {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)?;
        env_logger::Builder::new()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .filter_level(log::LevelFilter::Debug)
            .init();
    } else if cli.verbose {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Debug)
            .init();
    }
    log::info!("dirview starting up");

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => EngineConfig::load()?,
    };
    let handle = controller::spawn(local_services(&config), config);

    let outcome = match cli.command {
        Commands::List { path, json } => list(&handle, &path, json).await,
        Commands::Watch { path, seconds } => watch(&handle, &path, seconds).await,
        Commands::Search { text, scope } => search(&handle, &text, scope).await,
        Commands::Script {
            script,
            root,
            settle_timeout,
        } => run_script(&handle, &script, root.as_deref(), settle_timeout).await,
    };

    handle.shutdown().await.ok();
    outcome
}

async fn open(handle: &NavigationHandle, path: &str) -> Result<ViewSnapshot> {
    handle.navigate(path).await?;
    handle.settle().await?;
    let snapshot = handle.snapshot().await?;
    if let Some(error) = &snapshot.last_error {
        return Err(ViewError::Generic(error.clone()));
    }
    Ok(snapshot)
}

fn print_listing(snapshot: &ViewSnapshot) {
    println!("📂 {}", snapshot.location.display_text());
    for item in &snapshot.items {
        let marker = if item.is_folder() { "/" } else { "" };
        match item.file_size {
            Some(size) if !item.is_folder() => println!("   {}{}  ({} bytes)", item.name, marker, size),
            _ => println!("   {}{}", item.name, marker),
        }
    }
    println!("   {} items", snapshot.items.len());
}

async fn list(handle: &NavigationHandle, path: &str, json: bool) -> Result<()> {
    let snapshot = open(handle, path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_listing(&snapshot);
    }
    Ok(())
}

async fn watch(handle: &NavigationHandle, path: &str, seconds: Option<u64>) -> Result<()> {
    let mut events = handle.subscribe();
    let snapshot = open(handle, path).await?;
    print_listing(&snapshot);

    let follow = async {
        loop {
            match events.recv().await {
                Ok(ViewEvent::ItemAdded(path)) => println!("+ {}", path),
                Ok(ViewEvent::ItemRemoved(path)) => println!("- {}", path),
                Ok(ViewEvent::ItemRenamed { from, to }) => println!("~ {} -> {}", from, to),
                Ok(ViewEvent::ListingReplaced { location, count, .. }) => {
                    println!("📂 {} ({} items)", location.display_text(), count)
                }
                Ok(ViewEvent::Error(message)) => eprintln!("⚠️ {}", message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => log::warn!("Skipped {} view events", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    };

    match seconds {
        Some(seconds) => {
            let _ = tokio::time::timeout(Duration::from_secs(seconds), follow).await;
        }
        None => {
            tokio::select! {
                _ = follow => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
    }
    Ok(())
}

async fn search(handle: &NavigationHandle, text: &str, scope: Option<String>) -> Result<()> {
    if let Some(scope) = &scope {
        open(handle, scope).await?;
    }
    let mut events = handle.subscribe();
    handle.set_search_text(text).await?;

    // The first replacement clears the view; the second carries the results
    let results = async {
        let mut replacements = 0;
        loop {
            match events.recv().await {
                Ok(ViewEvent::ListingReplaced { location, .. }) if location.kind() == LocationKind::SearchResult => {
                    replacements += 1;
                    if replacements == 2 {
                        break;
                    }
                }
                Ok(ViewEvent::Error(message)) => return Err(ViewError::Generic(message)),
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return Err(ViewError::EngineStopped),
            }
        }
        Ok(())
    };
    tokio::time::timeout(SEARCH_TIMEOUT, results)
        .await
        .map_err(|_| ViewError::Generic(format!("search for '{}' timed out", text)))??;

    handle.settle().await?;
    let snapshot = handle.snapshot().await?;
    for item in &snapshot.items {
        println!("{}", item.full_path);
    }
    log::info!("🔍 {} matches for '{}'", snapshot.items.len(), text);
    Ok(())
}

async fn run_script(handle: &NavigationHandle, path: &str, root: Option<&str>, settle_timeout: u64) -> Result<()> {
    log::info!("🧪 Script: {}", path);
    let mut runner = ScriptRunner::from_file(path, root)?;
    runner.max_settle_time = Duration::from_secs(settle_timeout);

    let result = runner.run(handle).await?;
    result.print_summary();

    if result.success {
        log::info!("🧪 Script completed successfully");
        Ok(())
    } else {
        log::error!("🧪 Script failed");
        Err(ViewError::Generic("Script failed".to_string()))
    }
}
