use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use vantage_common::{ConnectionId, ConnectionSnapshot, EntityId, EntitySnapshot, ViewerRoles};
use vantage_interest::{InterestConfig, ObserverPolicy};
use vantage_sim::{SimConfig, Simulation};

#[derive(Parser)]
#[command(name = "vantage-cli", about = "Interest management simulation and inspection")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML or JSON file with `interest` and `sim` sections
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Print the effective configuration as YAML
    Config,
    /// Run a simulated world through interest management
    Simulate {
        /// Number of ticks to simulate
        #[arg(short, long, default_value = "120")]
        ticks: u64,
        /// RNG seed
        #[arg(short, long)]
        seed: Option<u64>,
        /// Number of ordinary players
        #[arg(long)]
        players: Option<usize>,
        /// Number of unowned world objects
        #[arg(long)]
        objects: Option<usize>,
        /// Visibility range in world units
        #[arg(long)]
        visibility: Option<f32>,
        /// Entities rebuilt per tick
        #[arg(long)]
        budget: Option<usize>,
    },
    /// Decide whether one viewer observes one entity
    Check {
        /// Entity position as x,y
        #[arg(long, value_parser = parse_point)]
        entity: (f32, f32),
        /// Viewer position as x,y
        #[arg(long, value_parser = parse_point)]
        viewer: (f32, f32),
        /// The entity is controlled by another player
        #[arg(long)]
        player: bool,
        #[arg(long)]
        admin: bool,
        #[arg(long)]
        ghost: bool,
        #[arg(long)]
        remote_viewer: bool,
    },
}

/// Contents of the `--config` file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FileConfig {
    interest: InterestConfig,
    sim: SimConfig,
}

fn load_config(path: Option<&Path>) -> anyhow::Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: FileConfig = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&text)
            .with_context(|| format!("parsing YAML config {}", path.display()))?,
        Some("json") => serde_json::from_str(&text)
            .with_context(|| format!("parsing JSON config {}", path.display()))?,
        _ => bail!("unsupported config format: {}", path.display()),
    };
    config
        .interest
        .validate()
        .with_context(|| format!("invalid interest config in {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

fn parse_point(s: &str) -> Result<(f32, f32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got {s:?}"))?;
    let x = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok((x, y))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info => {
            println!("vantage-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("interest: {}", vantage_interest::crate_info());
            println!(
                "defaults: visibility_range={}, resolution={}, entities_per_quantum={}",
                config.interest.visibility_range,
                config.interest.resolution(),
                config.interest.entities_per_quantum
            );
        }
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
        }
        Commands::Simulate {
            ticks,
            seed,
            players,
            objects,
            visibility,
            budget,
        } => {
            if let Some(seed) = seed {
                config.sim.seed = seed;
            }
            if let Some(players) = players {
                config.sim.players = players;
            }
            if let Some(objects) = objects {
                config.sim.objects = objects;
            }
            if let Some(range) = visibility {
                config.interest.visibility_range = range;
            }
            if let Some(budget) = budget {
                config.interest.entities_per_quantum = budget;
            }

            let mut sim = Simulation::generate(&config.sim, config.interest.clone())
                .context("building simulation")?;
            println!(
                "Simulating {ticks} ticks: connections={}, entities={}, range={}, budget={}",
                sim.world.connection_count(),
                sim.world.entity_count(),
                config.interest.visibility_range,
                config.interest.entities_per_quantum
            );

            let report = sim.run(ticks);
            println!("Passes completed: {}", report.passes_completed);
            println!("Max entities per tick: {}", report.max_processed_per_tick);
            println!(
                "Observer sets: {}, spawns: {}, despawns: {}",
                report.replication.sets_received,
                report.replication.spawns,
                report.replication.despawns
            );
            println!(
                "Tick time: avg {:?}, max {:?}",
                report.average_tick_time, report.max_tick_time
            );

            let mut busiest: Vec<(ConnectionId, usize)> = sim
                .world
                .connection_ids()
                .map(|c| (c, sim.tracker.visible_to(c)))
                .collect();
            busiest.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
            for (conn, visible) in busiest.iter().take(5) {
                println!("  {conn}: observes {visible} entities");
            }
        }
        Commands::Check {
            entity,
            viewer,
            player,
            admin,
            ghost,
            remote_viewer,
        } => {
            config.interest.validate()?;
            let policy = ObserverPolicy::new(
                config.interest.projector(),
                config.interest.remote_viewers_see_world,
            );
            let target = EntitySnapshot {
                id: EntityId::new(),
                position: Some(glam::Vec3::new(entity.0, entity.1, 0.0)),
                owner: player.then_some(ConnectionId(0)),
            };
            let observer = ConnectionSnapshot::joined(
                ConnectionId(1),
                glam::Vec3::new(viewer.0, viewer.1, 0.0),
            )
            .with_roles(ViewerRoles {
                ghost,
                admin,
                remote_viewer,
            });

            let projector = policy.projector();
            let (from, to) = (
                projector.project(observer.position.unwrap_or_default()),
                projector.project(target.position.unwrap_or_default()),
            );
            println!(
                "entity cell ({}, {}), viewer cell ({}, {}), distance^2 {}",
                to.x,
                to.y,
                from.x,
                from.y,
                to.distance_sq(from)
            );
            println!("override: {}", policy.override_applies(&target, &observer));
            println!("observes: {}", policy.check_observer(&target, &observer));
        }
    }

    Ok(())
}
