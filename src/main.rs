use channel_store::channel::Channel;
use channel_store::cli::{Args, Command};
use channel_store::node::Node;
use channel_store::persist::{load_node, save_node};
use channel_store::snapshot::NodeSnapshot;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

fn init_logging(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| PathBuf::from("chanstore.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging, RUST_LOG wins if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn print_channel(channel: &Channel, elements: bool) {
    let store = channel.store();
    println!(
        "  {} [{}] {} {}x{}x{} mode={:?}{} state={} dirty={}",
        channel.name(),
        channel.uuid(),
        channel.element_type(),
        store.count(),
        store.item_length(),
        store.frame_count(),
        store.mode(),
        if store.is_locked() { " locked" } else { "" },
        store.state(),
        store.dirty_count(),
    );
    if !store.reference().is_empty() {
        println!("    reference: {}", store.reference());
    }
    if store.sync_frame() {
        println!("    frame: synced (offset {})", store.frame_offset());
    } else {
        println!("    frame: {}", store.frame());
    }
    println!("    {}", channel.memory_info());

    if elements {
        for element in 0..store.count() {
            let values: Vec<String> = (0..store.item_length())
                .map(|sub| match channel.get_item(element, sub) {
                    Ok(v) => v.to_string(),
                    Err(_) => "?".to_string(),
                })
                .collect();
            println!("    [{}] {}", element, values.join(", "));
        }
    }
}

fn print_node(node: &Node, elements: bool) {
    println!("{} [{}] {} channel(s)", node.name(), node.uuid(), node.len());
    for channel in node.channels() {
        print_channel(channel, elements);
    }
}

fn export(file: &Path, output: Option<PathBuf>) -> Result<()> {
    let node = load_node(file).with_context(|| format!("Failed to load {}", file.display()))?;
    let output = output.unwrap_or_else(|| file.with_extension("json"));
    NodeSnapshot::from_node(&node)
        .to_json(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn import(json: &Path, output: &Path) -> Result<()> {
    let snapshot =
        NodeSnapshot::from_json(json).with_context(|| format!("Failed to read {}", json.display()))?;
    let node = snapshot.to_node();
    for channel in node.channels().iter().filter(|c| c.state().is_error()) {
        warn!("channel '{}' imported in state {}", channel.name(), channel.state());
    }
    save_node(&node, output).with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;
    debug!("Command-line args: {:?}", args);

    match args.command {
        Command::Inspect { file, elements } => {
            let node = load_node(&file).with_context(|| format!("Failed to load {}", file.display()))?;
            print_node(&node, elements);
        }
        Command::Export { file, output } => export(&file, output)?,
        Command::Import { json, output } => import(&json, &output)?,
    }
    Ok(())
}
