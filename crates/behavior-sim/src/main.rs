//! Runs the guard scenario on a leader tree and mirrors it into a replica.
//!
//! The leader is driven by a [`TreeManager`] and a scripted blackboard. After
//! every frame its active leaves are flattened to the wire format and applied
//! to a replica tree with a silent synchronization, the way a networked peer
//! would follow an authoritative simulation.
mod scenario;

use anyhow::{Context, Result, bail};
use behavior_tree::{BehaviorTree, Blackboard, TreeConfig, TreeManager};
use clap::Parser;

/// Behavior tree simulator
#[derive(Parser)]
#[command(name = "behavior-sim")]
#[command(about = "Tick a demo behavior tree and mirror it into a replica", long_about = None)]
#[command(version)]
struct Cli {
    /// Number of frames to simulate
    #[arg(long, default_value_t = 30)]
    ticks: u64,

    /// Seconds per frame
    #[arg(long, default_value_t = 0.25)]
    dt: f32,

    /// RNG seed (overrides BT_SEED)
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the replica tree
    #[arg(long)]
    no_replica: bool,
}

fn main() -> Result<()> {
    // Load .env file if it exists (for BT_SEED, RUST_LOG and friends)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = TreeConfig::from_env();
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let mut manager = TreeManager::new(config.clone());
    let leader = BehaviorTree::from_blueprint("Leader", scenario::guard(), config.clone())
        .context("building leader tree")?;
    manager.insert_tree(leader);
    let board = manager.add_blackboard();
    if !manager.start_tree()? {
        bail!("leader tree has nothing to run");
    }

    let mut replica = if cli.no_replica {
        None
    } else {
        let tree = BehaviorTree::from_blueprint("Replica", scenario::guard(), config.clone())
            .context("building replica tree")?;
        Some((tree, Blackboard::new()))
    };

    for frame in 0..cli.ticks {
        let blackboard = manager
            .blackboard_mut(board)
            .context("leader blackboard vanished")?;
        scenario::apply_script(frame, blackboard);
        manager.update(cli.dt)?;

        let leader = manager.current_tree().context("leader tree vanished")?;
        let leaves = leader.active_leaf_set();
        tracing::info!("frame {frame}: {leaves}");

        if let Some((tree, blackboard)) = replica.as_mut() {
            let wire = leaves.to_wire(config.sync_separator);
            if !tree.sync_active_leaves_wire(&wire, config.sync_separator, blackboard, true)? {
                bail!("replica could not follow frame {frame}");
            }
            if tree.active_leaf_set() != leaves {
                bail!(
                    "replica diverged at frame {frame}: {} != {leaves}",
                    tree.active_leaf_set()
                );
            }
        }
    }

    if let Some((tree, _)) = &replica {
        tracing::info!(
            "replica followed {} frames, last sync {:?}",
            cli.ticks,
            tree.last_sync_ids().unwrap_or_default()
        );
    }
    Ok(())
}
