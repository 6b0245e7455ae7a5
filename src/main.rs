use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

use mapstead::cli::commands;
use mapstead::cli::commands::RunOptions;
use mapstead::config::map::MapConfig;
use mapstead::persistence;

#[derive(Parser)]
#[command(name = "mapstead")]
#[command(about = "A settlement-building game map engine with deterministic terrain generation")]
#[command(version)]
struct Cli {
    /// Snapshot directory
    #[arg(short, long, default_value = "snapshots")]
    dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new map from procedural parameters
    Generate {
        /// Path to map generation config file
        #[arg(short, long, default_value = "mapgen.toml")]
        config: String,
    },

    /// Run the live map headlessly for a bounded number of ticks
    Run {
        /// Path to a specific map snapshot to load
        #[arg(short, long)]
        map: Option<String>,

        /// Number of ticks to advance
        #[arg(short, long, default_value_t = 10_000)]
        ticks: u64,

        /// Ticks between autosaves
        #[arg(long, default_value_t = 1_000)]
        snapshot_interval: u64,

        /// Snapshots kept after pruning
        #[arg(long, default_value_t = 10)]
        max_snapshots: usize,
    },

    /// Inspect map or tile state from the latest snapshot
    Inspect {
        /// Tile index to inspect
        #[arg(short, long)]
        tile: Option<u32>,

        /// Show map-level summary statistics
        #[arg(long)]
        map: bool,
    },

    /// Manage map snapshots
    Snapshots {
        #[command(subcommand)]
        action: SnapshotAction,
    },
}

#[derive(Subcommand)]
enum SnapshotAction {
    /// List available snapshots
    List,

    /// Restore and display a map from a snapshot file
    Restore {
        /// Path to the snapshot file
        file: String,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let snapshot_dir = Path::new(&cli.dir);

    match cli.command {
        Commands::Generate { config } => {
            let config = match MapConfig::from_file(Path::new(&config)) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error loading generation config: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = commands::generate(&config, snapshot_dir) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Run {
            map,
            ticks,
            snapshot_interval,
            max_snapshots,
        } => {
            let options = RunOptions {
                ticks,
                snapshot_interval,
                max_snapshots,
            };
            if let Err(e) = commands::run(snapshot_dir, map.as_deref(), &options) {
                eprintln!("Run error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Inspect { tile, map } => {
            if let Err(e) = commands::inspect(snapshot_dir, tile, map) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }

        Commands::Snapshots { action } => match action {
            SnapshotAction::List => match persistence::list_snapshots(snapshot_dir) {
                Ok(snapshots) => {
                    if snapshots.is_empty() {
                        println!("No snapshots found in {}", snapshot_dir.display());
                    } else {
                        println!("{:<40} {:>8} {:>12}", "File", "Tick", "Size");
                        println!("{}", "-".repeat(62));
                        for s in &snapshots {
                            let name =
                                s.path.file_name().and_then(|n| n.to_str()).unwrap_or("?");
                            let size_kb = s.file_size / 1024;
                            println!("{:<40} {:>8} {:>9} KB", name, s.tick, size_kb);
                        }
                        println!(
                            "\n{} snapshot(s) in {}",
                            snapshots.len(),
                            snapshot_dir.display()
                        );
                    }
                }
                Err(e) => {
                    eprintln!("Error listing snapshots: {}", e);
                    std::process::exit(1);
                }
            },
            SnapshotAction::Restore { file } => {
                let path = Path::new(&file);
                match persistence::load_snapshot(path) {
                    Ok(snapshot) => {
                        let tick = snapshot.tick;
                        match snapshot.into_map() {
                            Ok(map) => {
                                println!("Restored map from {}", path.display());
                                commands::print_map_summary(&map, tick);
                            }
                            Err(e) => {
                                eprintln!("Error restoring snapshot: {}", e);
                                std::process::exit(1);
                            }
                        }
                    }
                    Err(e) => {
                        eprintln!("Error restoring snapshot: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        },
    }
}
