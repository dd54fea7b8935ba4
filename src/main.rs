use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::{self, Child, Command as Process};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use archipelago::config::ExperimentConfig;
use archipelago::error::{EvoResult, EvolutionError};
use archipelago::experiment::{Backend, Experiment, Summary};
use archipelago::results::IslandOutcome;
use archipelago::topology::generators::TopologyKind;
use archipelago::topology::graph::GraphForm;

#[derive(Parser)]
#[command(name = "archipelago", version, about = "Island-model evolutionary optimizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Debug logging; RUST_LOG takes precedence
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an experiment inside this process
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
        /// Connect islands with channels instead of a shared barrier
        #[arg(long)]
        message_passing: bool,
        /// Write every outcome and the selected one as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Run one rank of a multi-process island model
    Node {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        rank: usize,
        /// Listening address of every rank, in rank order
        #[arg(long, value_delimiter = ',', required = true)]
        peers: Vec<SocketAddr>,
        /// Every rank must use the same seed
        #[arg(long)]
        seed: Option<u64>,
        /// Where to save this rank's outcome as JSON
        #[arg(long)]
        outcome: Option<PathBuf>,
        /// Seconds to wait for neighbors at startup
        #[arg(long, default_value_t = 30)]
        connect_timeout: u64,
    },
    /// Spawn one node process per island on localhost and gather the results
    Launch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 7100)]
        base_port: u16,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        summary: Option<PathBuf>,
    },
    /// Print a generated connectivity graph
    Topology {
        #[arg(long, default_value = "ring")]
        kind: TopologyKind,
        #[arg(long)]
        islands: usize,
        #[arg(long, default_value = "simple")]
        form: GraphForm,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "archipelago=debug" } else { "archipelago=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            seed,
            message_passing,
            summary,
        } => run(&config, seed, message_passing, summary.as_deref()),
        Commands::Node {
            config,
            rank,
            peers,
            seed,
            outcome,
            connect_timeout,
        } => node(&config, rank, &peers, seed, outcome.as_deref(), connect_timeout),
        Commands::Launch {
            config,
            base_port,
            seed,
            summary,
        } => launch(&config, base_port, seed, summary.as_deref()),
        Commands::Topology {
            kind,
            islands,
            form,
        } => kind
            .build(islands)
            .map(|graph| print!("{}", graph.render(form)))
            .map_err(EvolutionError::from),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(path: &Path, seed: Option<u64>, message_passing: bool, summary: Option<&Path>) -> EvoResult<()> {
    let experiment = Experiment::new(ExperimentConfig::load(path)?, seed);
    let result = if message_passing && experiment.config().island_model.enabled {
        let outcomes = experiment.run_island_model(Backend::MessagePassing)?;
        experiment.summarize(outcomes)?
    } else {
        experiment.run()?
    };
    finish(&result, summary)
}

fn node(
    path: &Path,
    rank: usize,
    peers: &[SocketAddr],
    seed: Option<u64>,
    outcome: Option<&Path>,
    connect_timeout: u64,
) -> EvoResult<()> {
    let experiment = Experiment::new(ExperimentConfig::load(path)?, seed);
    let result = experiment.run_node(rank, peers, Duration::from_secs(connect_timeout))?;
    if let Some(path) = outcome {
        result.save(path)?;
    }
    Ok(())
}

fn launch(path: &Path, base_port: u16, seed: Option<u64>, summary: Option<&Path>) -> EvoResult<()> {
    let config = ExperimentConfig::load(path)?;
    let graph = config.load_graph()?;
    let count = graph.reconcile_island_count(config.island_model.islands);
    let experiment = Experiment::new(config, seed);

    let peers: Vec<String> = (0..count)
        .map(|rank| {
            let port = u16::try_from(rank)
                .ok()
                .and_then(|rank| base_port.checked_add(rank))
                .ok_or_else(|| {
                    EvolutionError::Configuration(format!("no port for rank {rank} above {base_port}"))
                })?;
            Ok(SocketAddr::from((Ipv4Addr::LOCALHOST, port)).to_string())
        })
        .collect::<EvoResult<_>>()?;
    let peers = peers.join(",");

    let scratch = scratch_dir()?;
    let exe = std::env::current_exe()?;
    info!(ranks = count, seed = experiment.seed(), "launching node processes");

    let mut children: Vec<(usize, Child)> = Vec::with_capacity(count);
    for rank in 0..count {
        let spawned = Process::new(&exe)
            .arg("node")
            .arg("--config")
            .arg(path)
            .arg("--rank")
            .arg(rank.to_string())
            .arg("--peers")
            .arg(&peers)
            .arg("--seed")
            .arg(experiment.seed().to_string())
            .arg("--outcome")
            .arg(scratch.join(format!("outcome_{rank}.json")))
            .spawn();
        match spawned {
            Ok(child) => children.push((rank, child)),
            Err(e) => {
                for (_, child) in &mut children {
                    let _ = child.kill();
                }
                return Err(e.into());
            }
        }
    }

    let mut failed = Vec::new();
    for (rank, mut child) in children {
        let status = child.wait()?;
        if !status.success() {
            failed.push(rank);
        }
    }
    if !failed.is_empty() {
        return Err(EvolutionError::Configuration(format!(
            "node processes for ranks {failed:?} failed"
        )));
    }

    let outcomes = (0..count)
        .map(|rank| IslandOutcome::load(scratch.join(format!("outcome_{rank}.json"))))
        .collect::<EvoResult<Vec<_>>>()?;
    let _ = std::fs::remove_dir_all(&scratch);
    let result = experiment.summarize(outcomes)?;
    finish(&result, summary)
}

/// Per-launch directory for the nodes' outcome files
fn scratch_dir() -> EvoResult<PathBuf> {
    let dir = std::env::temp_dir().join(format!("archipelago-{}", process::id()));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn finish(summary: &Summary, path: Option<&Path>) -> EvoResult<()> {
    let best = summary.best();
    println!(
        "Selected island {} ({:?}): norm {:.6}, final BSF {}",
        best.island,
        summary.mode,
        best.norm(),
        best.final_bsf()
            .map(|v| format!("{v:.7}"))
            .unwrap_or_else(|| "n/a".to_string())
    );
    if let Some(path) = path {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), summary)?;
        info!(path = %path.display(), "wrote summary");
    }
    Ok(())
}
