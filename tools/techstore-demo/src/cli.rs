use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Scripted TechStore sessions over a simulated network.
#[derive(Parser, Debug)]
#[command(name = "techstore-demo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Worker configuration file (TOML). Built-in defaults when omitted.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for all subcommands.
    #[arg(long, value_enum, default_value = "human", global = true)]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the effective worker configuration.
    Config,

    /// Browse, fill the cart and check out, optionally losing the network
    /// half way through.
    Session(SessionArgs),

    /// Deploy a new cache version over a running worker.
    Update(UpdateArgs),

    /// Deliver a push message and click the notification.
    Push(PushArgs),
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Product IDs to add to the cart, in order.
    #[arg(long = "add", value_delimiter = ',', default_values_t = [1, 3])]
    pub add: Vec<u32>,

    /// Add the products while offline, then reconnect and sync.
    #[arg(long)]
    pub offline: bool,

    /// Search query applied before listing products.
    #[arg(long)]
    pub search: Option<String>,

    /// Category filter (`all`, `smartphones`, `laptops`, ...).
    #[arg(long, default_value = "all")]
    pub category: String,

    /// Seconds to wait for the background sync to report back.
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Version to deploy.
    pub version: String,

    /// Leave the new worker waiting instead of applying the update.
    #[arg(long)]
    pub no_apply: bool,
}

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Payload text. Omit for an empty push.
    pub message: Option<String>,

    /// Notification action to click (`explore`, `close`), or the body
    /// when omitted.
    #[arg(long)]
    pub action: Option<String>,
}
