//! nodepoold — resource group administration for a nodepool cluster.
//!
//! Opens the local state store, rebuilds resource groups from it, replays
//! node liveness, then runs a single administrative command.
//!
//! # Usage
//!
//! ```text
//! nodepoold --data-dir /var/lib/nodepool node join 7
//! nodepoold group add rg1
//! nodepoold group assign rg1 7
//! nodepoold group list --json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::NodepoolConfig;

#[derive(Parser)]
#[command(
    name = "nodepoold",
    about = "nodepool — resource group membership for compute clusters",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to nodepool.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent state (overrides the config file).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Emit JSON output and JSON logs.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Node registry and liveness events.
    Node {
        #[command(subcommand)]
        action: NodeAction,
    },
    /// Resource group administration.
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },
}

#[derive(Subcommand)]
enum NodeAction {
    /// Register a node (or refresh it).
    Join {
        id: i64,
        #[arg(long, default_value = "127.0.0.1:21123")]
        address: String,
    },
    /// Record a heartbeat.
    Heartbeat { id: i64 },
    /// Mark a node as shutting down.
    Drain { id: i64 },
    /// Remove a node from the registry.
    Leave { id: i64 },
    /// Place a live node into a resource group.
    Up { id: i64 },
    /// Drop a node from its resource group.
    Down { id: i64 },
    /// List registered nodes.
    List,
    /// Remove nodes that missed heartbeats.
    Reap,
}

#[derive(Subcommand)]
enum GroupAction {
    /// Create an empty resource group.
    Add { name: String },
    /// Delete a resource group with zero capacity.
    Remove { name: String },
    /// Assign a node to a resource group.
    Assign { name: String, node: i64 },
    /// Unassign a node from a resource group.
    Unassign { name: String, node: i64 },
    /// Move one node between resource groups.
    Transfer { from: String, to: String },
    /// Fill missing capacity from the default resource group.
    Recover { name: String },
    /// List resource groups.
    List,
    /// Show one resource group.
    Show { name: String },
    /// Print how many nodes a resource group lacks.
    Lack { name: String },
    /// Find the resource group holding a node.
    Find { node: i64 },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = NodepoolConfig::load(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    init_tracing(&config, cli.json)?;

    let ctx = commands::Context::open(&config, cli.json)?;
    match cli.command {
        Command::Node { action } => match action {
            NodeAction::Join { id, address } => commands::node::join(&ctx, id, &address),
            NodeAction::Heartbeat { id } => commands::node::heartbeat(&ctx, id),
            NodeAction::Drain { id } => commands::node::drain(&ctx, id),
            NodeAction::Leave { id } => commands::node::leave(&ctx, id),
            NodeAction::Up { id } => commands::node::up(&ctx, id),
            NodeAction::Down { id } => commands::node::down(&ctx, id),
            NodeAction::List => commands::node::list(&ctx),
            NodeAction::Reap => commands::node::reap(&ctx),
        },
        Command::Group { action } => match action {
            GroupAction::Add { name } => commands::group::add(&ctx, &name),
            GroupAction::Remove { name } => commands::group::remove(&ctx, &name),
            GroupAction::Assign { name, node } => commands::group::assign(&ctx, &name, node),
            GroupAction::Unassign { name, node } => commands::group::unassign(&ctx, &name, node),
            GroupAction::Transfer { from, to } => commands::group::transfer(&ctx, &from, &to),
            GroupAction::Recover { name } => commands::group::recover(&ctx, &name),
            GroupAction::List => commands::group::list(&ctx),
            GroupAction::Show { name } => commands::group::show(&ctx, &name),
            GroupAction::Lack { name } => commands::group::lack(&ctx, &name),
            GroupAction::Find { node } => commands::group::find(&ctx, node),
        },
    }
}

fn init_tracing(config: &NodepoolConfig, json: bool) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&config.log_filter))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}
