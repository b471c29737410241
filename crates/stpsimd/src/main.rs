//! stpsimd - stpsim driver daemon.
//!
//! Builds a ring topology (or loads a saved one), enables STP on every
//! bridge, and advances simulated time on a timer, printing the diagnostic
//! lines the protocol sessions generate. This is the coordinating thread of
//! the model's concurrency contract: all topology edits and ticks happen
//! here.

use std::fs::File;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use stpsim_engine::stub::StubEngineFactory;
use stpsim_model::{load_json, save_json, LogLineEvent, PortRef, Project};
use stpsim_types::{StpVersion, Timestamp};

/// Spanning Tree Protocol simulator driver
#[derive(Parser, Debug)]
#[command(name = "stpsimd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of bridges in the generated ring topology
    #[arg(short = 'b', long, default_value = "3")]
    bridges: usize,

    /// Ports per generated bridge
    #[arg(short = 'p', long, default_value = "4")]
    ports: usize,

    /// Protocol version to enable (stp, rstp, mstp)
    #[arg(long, default_value = "rstp")]
    stp_version: StpVersion,

    /// Spanning-tree instances per bridge (MSTP only allows more than 1)
    #[arg(short = 't', long, default_value = "1")]
    trees: usize,

    /// Wall-clock milliseconds between ticks
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Simulated milliseconds each tick advances
    #[arg(long, default_value = "1000")]
    step_ms: Timestamp,

    /// Stop after this many ticks (0 = run until Ctrl-C)
    #[arg(long, default_value = "0")]
    ticks: u64,

    /// Load the topology from a JSON file instead of generating one
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save the topology to a JSON file on exit
    #[arg(long)]
    save: Option<PathBuf>,
}

/// Builds a ring: port 0 of each bridge wired to port 1 of the next.
fn build_ring(args: &Args) -> anyhow::Result<Project> {
    anyhow::ensure!(args.bridges >= 2, "a ring needs at least 2 bridges");
    anyhow::ensure!(args.ports >= 2, "ring bridges need at least 2 ports");

    let mut project = Project::new();
    let macs: Vec<_> = (0..args.bridges)
        .map(|_| project.add_bridge(args.ports))
        .collect();
    for (i, &mac) in macs.iter().enumerate() {
        let next = macs[(i + 1) % macs.len()];
        project.add_wire_between(PortRef::new(mac, 0), PortRef::new(next, 1), 0);
    }
    for &mac in &macs {
        project
            .bridge(mac)
            .unwrap()
            .enable_stp(&StubEngineFactory, args.stp_version, args.trees, 0)
            .context("enabling stp")?;
    }
    Ok(project)
}

fn subscribe_log_lines(project: &Project) {
    for bridge in project.bridges() {
        bridge.log_line_generated_event().subscribe(|event: &LogLineEvent| {
            match (event.line.port, event.line.tree) {
                (Some(port), Some(tree)) => {
                    info!(bridge = %event.bridge, port, tree, "{}", event.line.text)
                }
                _ => info!(bridge = %event.bridge, "{}", event.line.text),
            }
        });
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("starting stpsimd");

    let project = match &args.load {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("opening topology file {}", path.display()))?;
            let project = load_json(file, &StubEngineFactory, 0).context("loading topology")?;
            info!(
                path = %path.display(),
                bridges = project.bridges().len(),
                wires = project.wires().len(),
                "topology loaded"
            );
            project
        }
        None => {
            let project = build_ring(&args)?;
            info!(
                bridges = args.bridges,
                ports = args.ports,
                version = %args.stp_version,
                "ring topology generated"
            );
            project
        }
    };

    subscribe_log_lines(&project);

    let mut interval = tokio::time::interval(std::time::Duration::from_millis(args.interval_ms));
    let mut now: Timestamp = 0;
    let mut ticks: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                now = now.wrapping_add(args.step_ms);
                project.tick(now);
                debug!(now, "tick");
                ticks += 1;
                if args.ticks != 0 && ticks >= args.ticks {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    if let Some(path) = &args.save {
        let file = File::create(path)
            .with_context(|| format!("creating topology file {}", path.display()))?;
        save_json(&project, file).context("saving topology")?;
        info!(path = %path.display(), "topology saved");
    }

    Ok(())
}
