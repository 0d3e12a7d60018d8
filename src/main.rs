use std::fs::OpenOptions;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{debug, info};

use raftsim::config::SimConfig;
use raftsim::raft::NodeId;
use raftsim::repl::{render_events, render_status, Repl};
use raftsim::sim::{Controller, Simulation};

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    // RAFTSIM_LOG_FILE sends logs to disk so they do not mix with REPL output
    if let Ok(path) = std::env::var("RAFTSIM_LOG_FILE") {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {path}: {e}"),
        }
    }

    let _ = builder.try_init();
}

#[derive(Parser)]
#[command(name = "raftsim")]
#[command(about = "A discrete-tick Raft cluster simulator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ClusterArgs {
    /// Number of nodes in the cluster
    #[arg(short, long)]
    nodes: Option<usize>,

    /// Seed for election timeouts, for reproducible runs
    #[arg(short, long)]
    seed: Option<u64>,

    /// JSON file with simulation settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl ClusterArgs {
    fn load(&self) -> anyhow::Result<SimConfig> {
        let mut config = match &self.config {
            Some(path) => SimConfig::from_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => SimConfig::default(),
        };
        if let Some(nodes) = self.nodes {
            config.cluster_size = nodes;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run a fixed number of steps without a scheduler and print the result
    Run {
        #[command(flatten)]
        cluster: ClusterArgs,

        /// Number of steps to run
        #[arg(short, long, default_value_t = 500)]
        ticks: u64,

        /// Client value to submit before the first step (repeatable)
        #[arg(short, long)]
        write: Vec<String>,

        /// Power off a node at a tick, as NODE@TICK (repeatable)
        #[arg(long, value_parser = parse_stop)]
        stop: Vec<(NodeId, u64)>,

        /// Print the final snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start the interactive simulator
    Repl {
        #[command(flatten)]
        cluster: ClusterArgs,
    },
}

fn parse_stop(s: &str) -> Result<(NodeId, u64), String> {
    let (node, tick) = s
        .split_once('@')
        .ok_or_else(|| format!("expected NODE@TICK, got {s:?}"))?;
    let node = node
        .trim()
        .parse::<NodeId>()
        .map_err(|_| format!("invalid node id: {node:?}"))?;
    let tick = tick
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid tick: {tick:?}"))?;
    Ok((node, tick))
}

/// Runs `ticks` steps, submitting `writes` up front and powering nodes off at
/// their scheduled ticks. A stop aimed at a node that is already down is
/// skipped.
fn simulate(
    config: SimConfig,
    ticks: u64,
    writes: &[String],
    mut stops: Vec<(NodeId, u64)>,
) -> anyhow::Result<Simulation> {
    let mut sim = Simulation::new(config)?;
    for &(node, _) in &stops {
        if sim.node(node).is_none() {
            bail!(
                "--stop names node {node}, but the cluster has {} nodes",
                sim.nodes().len()
            );
        }
    }
    stops.sort_by_key(|&(_, tick)| tick);

    for value in writes {
        sim.submit_client_command(value)?;
    }

    let mut pending = stops.into_iter().peekable();
    while sim.tick() < ticks {
        while let Some(&(node, _)) = pending.peek().filter(|&&(_, at)| at <= sim.tick()) {
            pending.next();
            if sim.node(node).is_some_and(|n| !n.is_active()) {
                debug!("Node {node} already stopped at tick {}", sim.tick());
                continue;
            }
            sim.toggle_power(node)?;
        }
        sim.step();
    }
    Ok(sim)
}

fn run_headless(
    config: SimConfig,
    ticks: u64,
    writes: &[String],
    stops: Vec<(NodeId, u64)>,
    json: bool,
) -> anyhow::Result<()> {
    let snap = simulate(config, ticks, writes, stops)?.snapshot(false);
    if json {
        println!("{}", snap.to_json()?);
    } else {
        print!("{}", render_status(&snap));
        println!();
        print!("{}", render_events(&snap));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            cluster,
            ticks,
            write,
            stop,
            json,
        } => {
            let config = cluster.load()?;
            info!(
                "Running {ticks} steps on a {}-node cluster",
                config.cluster_size
            );
            run_headless(config, ticks, &write, stop, json)?;
        }
        Command::Repl { cluster } => {
            let config = cluster.load()?;
            info!("Starting raftsim REPL with {} nodes", config.cluster_size);
            let controller = Controller::new(config)?;
            let mut repl = Repl::new(controller)?;
            repl.run().await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use raftsim::raft::NodeRole;

    #[test]
    fn parses_stop_argument() {
        assert_eq!(parse_stop("0@120"), Ok((0, 120)));
        assert_eq!(parse_stop(" 3 @ 7 "), Ok((3, 7)));
        assert!(parse_stop("3").is_err());
        assert!(parse_stop("S1@10").is_err());
    }

    #[test]
    fn repeated_stop_keeps_node_down() {
        let config = SimConfig {
            seed: Some(4),
            ..SimConfig::default()
        };
        let stops = vec![(1, 10), (1, 20), (1, 20)];
        let sim = simulate(config, 60, &[], stops).expect("simulate");

        assert_eq!(sim.node(1).unwrap().role(), NodeRole::Stopped);
        let power_events = sim
            .events()
            .iter()
            .filter(|e| e.message.starts_with("Node S2 powered"))
            .count();
        assert_eq!(power_events, 1);
    }

    #[test]
    fn headless_run_rejects_unknown_stop_node() {
        let result = run_headless(SimConfig::default(), 10, &[], vec![(9, 5)], true);
        assert!(result.is_err());
    }
}
