mod cmd;
mod output;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use rolebook_lib::config::Settings;
use rolebook_lib::consts::ENV_LOG;
use rolebook_lib::sequencer::TagFilter;

use cmd::{cmd_check, cmd_graph, cmd_hosts, cmd_plan, cmd_roles, cmd_vars};
use output::{Mark, OutputFormat};

/// rolebook - compose roles into per-host execution plans
#[derive(Parser)]
#[command(name = "rolebook")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Increase log verbosity (-v info, -vv debug)
  #[arg(short, long, global = true, action = ArgAction::Count)]
  verbose: u8,

  /// Settings file (default: <config dir>/rolebook/config.yml)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Args)]
struct InventoryArgs {
  /// Inventory file (overrides settings and ROLEBOOK_INVENTORY)
  #[arg(short, long)]
  inventory: Option<PathBuf>,
}

#[derive(Args)]
struct FilterArgs {
  /// Only run invocations carrying one of these tags
  #[arg(short, long, value_delimiter = ',')]
  tags: Vec<String>,

  /// Never run invocations carrying one of these tags
  #[arg(long, value_delimiter = ',')]
  skip_tags: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve the playbook for every targeted host
  Plan {
    /// Path to the playbook manifest
    manifest: PathBuf,

    #[command(flatten)]
    inventory: InventoryArgs,

    #[command(flatten)]
    filter: FilterArgs,

    /// Restrict the run to hosts matching this pattern
    #[arg(short, long)]
    limit: Option<String>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List role invocations in execution order
  Roles {
    /// Path to the playbook manifest
    manifest: PathBuf,

    #[command(flatten)]
    filter: FilterArgs,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the dependency graph between role invocations
  Graph {
    /// Path to the playbook manifest
    manifest: PathBuf,

    /// Emit Graphviz DOT instead of an edge list
    #[arg(long)]
    dot: bool,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// List the hosts a playbook targets
  Hosts {
    /// Path to the playbook manifest
    manifest: PathBuf,

    #[command(flatten)]
    inventory: InventoryArgs,

    /// Restrict to hosts matching this pattern
    #[arg(short, long)]
    limit: Option<String>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Show the layered environment of one host
  Vars {
    /// Host name
    host: String,

    #[command(flatten)]
    inventory: InventoryArgs,

    /// Include this manifest's play vars as the top layer
    #[arg(short, long)]
    manifest: Option<PathBuf>,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },

  /// Validate a playbook against an inventory
  Check {
    /// Path to the playbook manifest
    manifest: PathBuf,

    #[command(flatten)]
    inventory: InventoryArgs,

    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

impl InventoryArgs {
  fn resolve(self, settings: &Settings) -> PathBuf {
    self.inventory.unwrap_or_else(|| settings.inventory.clone())
  }
}

impl FilterArgs {
  /// Flags replace the configured lists; an absent flag keeps the setting.
  fn resolve(self, settings: &Settings) -> TagFilter {
    let mut filter = settings.tag_filter();
    if !self.tags.is_empty() {
      filter.include = TagFilter::parse_list(&self.tags.join(","));
    }
    if !self.skip_tags.is_empty() {
      filter.skip = TagFilter::parse_list(&self.skip_tags.join(","));
    }
    filter
  }
}

fn init_tracing(verbose: u8) {
  let filter = match verbose {
    0 => std::env::var(ENV_LOG)
      .or_else(|_| std::env::var("RUST_LOG"))
      .ok()
      .and_then(|directives| EnvFilter::try_new(directives).ok())
      .unwrap_or_else(|| EnvFilter::new("warn")),
    1 => EnvFilter::new("info"),
    _ => EnvFilter::new("debug"),
  };

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .with_target(false)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_tracing(cli.verbose);

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      output::line(Mark::Error, format!("{:#}", err));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
  debug!(
    inventory = %settings.inventory.display(),
    tags = ?settings.tags,
    skip_tags = ?settings.skip_tags,
    "resolved settings"
  );

  match cli.command {
    Commands::Plan {
      manifest,
      inventory,
      filter,
      limit,
      output,
    } => cmd_plan(
      &manifest,
      &inventory.resolve(&settings),
      filter.resolve(&settings),
      limit,
      output,
    ),
    Commands::Roles {
      manifest,
      filter,
      output,
    } => cmd_roles(&manifest, &filter.resolve(&settings), output),
    Commands::Graph { manifest, dot, output } => cmd_graph(&manifest, dot, output),
    Commands::Hosts {
      manifest,
      inventory,
      limit,
      output,
    } => cmd_hosts(&manifest, &inventory.resolve(&settings), limit.as_deref(), output),
    Commands::Vars {
      host,
      inventory,
      manifest,
      output,
    } => cmd_vars(&host, &inventory.resolve(&settings), manifest.as_deref(), output),
    Commands::Check {
      manifest,
      inventory,
      output,
    } => cmd_check(&manifest, &inventory.resolve(&settings), output),
  }
}
