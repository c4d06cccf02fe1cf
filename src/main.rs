mod panel;
mod vault;

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{info, warn};

use local_graph::{Direction, LocalGraph, LocalGraphConfig};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Directory of Markdown notes, or a JSON manifest file.
    vault: PathBuf,
    /// Document to center the graph on.
    #[arg(long)]
    focal: Option<String>,
    #[arg(long)]
    max_hops: Option<usize>,
    /// outgoing, incoming or both
    #[arg(long)]
    direction: Option<Direction>,
    /// JSON file with layout and extraction settings.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    seed: Option<u64>,
    /// Settle the layout headlessly and print the snapshot as JSON.
    #[arg(long)]
    dump: bool,
    /// Tick limit for --dump.
    #[arg(long, default_value_t = 5_000)]
    max_ticks: usize,
}

impl Args {
    fn settings(&self) -> Result<LocalGraphConfig> {
        let mut config = match &self.config {
            Some(path) => LocalGraphConfig::load(path)
                .with_context(|| format!("failed to load settings from {}", path.display()))?,
            None => LocalGraphConfig::default(),
        };
        if let Some(max_hops) = self.max_hops {
            config.max_hops = max_hops;
        }
        if let Some(direction) = self.direction {
            config.direction = direction;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        config.validate().context("invalid settings")?;
        Ok(config)
    }
}

fn dump(args: &Args, config: LocalGraphConfig) -> Result<()> {
    let mut vault = vault::load_vault(&args.vault)?;
    vault.set_active(args.focal.clone());

    let mut graph = LocalGraph::new(config);
    graph.load_from(&vault);
    match graph.settle(args.max_ticks) {
        Some(ticks) => info!("layout settled after {ticks} ticks"),
        None => warn!("layout still moving after {} ticks", args.max_ticks),
    }

    let json = graph
        .snapshot()
        .to_json()
        .context("failed to serialize snapshot")?;
    println!("{json}");
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.settings()?;

    if args.dump {
        return dump(&args, config);
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 860.0]),
        ..Default::default()
    };

    eframe::run_native(
        "local-graph",
        options,
        Box::new(move |cc| {
            Ok(Box::new(panel::LocalGraphApp::new(
                cc,
                args.vault.clone(),
                config.clone(),
                args.focal.clone(),
            )))
        }),
    )
    .map_err(|error| anyhow!("failed to start the graph window: {error}"))
}
