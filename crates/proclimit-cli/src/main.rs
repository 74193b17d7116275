use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use proclimit_cli::{logging, Config, DokkuPlatform};
use proclimit_core::{
    LimitCommands, ProcessReport, ResourceKind, RestartStatus, UnsetOutcome, VERSION,
};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// proclimit - per-process resource limits for Dokku apps
#[derive(Parser)]
#[command(name = "proclimit")]
#[command(version = VERSION)]
#[command(about = "Manage per-process memory and CPU limits for apps", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "/etc/proclimit/config.toml")]
    config: PathBuf,

    /// Apps root directory
    #[arg(long, global = true, env = "DOKKU_ROOT")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set limits for a process, e.g. `set blog web memory=512m cpu=50`
    Set {
        app: String,
        process: String,
        /// One or more kind=value pairs (kinds: memory, cpu)
        #[arg(required = true, value_name = "KIND=VALUE")]
        limits: Vec<String>,
        /// Do not restart the app after the change
        #[arg(long)]
        no_restart: bool,
    },

    /// Remove limits from a process, e.g. `unset blog web cpu`
    Unset {
        app: String,
        process: String,
        #[arg(required = true, value_name = "KIND")]
        kinds: Vec<String>,
        /// Do not restart the app after the change
        #[arg(long)]
        no_restart: bool,
    },

    /// Show limits for one app or all apps
    Report {
        app: Option<String>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print container runtime flags for a process
    DockerOptions { app: String, process: String },

    /// Generate default configuration file
    GenerateConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,
    },

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Neither needs config or logging
    match &cli.command {
        Commands::GenerateConfig { output } => return generate_config(output),
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "proclimit", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = load_config(&cli.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

    let _guard = logging::init_logging(&config.logging)?;
    debug!("proclimit v{} starting", VERSION);
    if !cli.config.exists() {
        warn!("Configuration file not found: {:?}, using defaults", cli.config);
    }

    let root = cli.root.clone().or_else(|| config.platform.root.clone());
    let platform = DokkuPlatform::new(root, config.platform.restart_command.clone());
    let defaults = config.seed_defaults()?;
    let commands = LimitCommands::new(&platform, defaults)?;

    match cli.command {
        Commands::Set {
            app,
            process,
            limits,
            no_restart,
        } => {
            let outcome = commands
                .set(&app, &process, &limits, !no_restart)
                .map_err(|e| {
                    command_error(e, format!("Failed to set limits for {}/{}", app, process))
                })?;
            println!("{}", format!("=====> Limits for {}", app).green().bold());
            println!("{}", ProcessReport::new(&process, &outcome.resources).line());
            print_restart(&app, &outcome.restart);
        }
        Commands::Unset {
            app,
            process,
            kinds,
            no_restart,
        } => {
            let outcome = commands
                .unset(&app, &process, &kinds, !no_restart)
                .map_err(|e| {
                    command_error(e, format!("Failed to unset limits for {}/{}", app, process))
                })?;
            match outcome {
                UnsetOutcome::NoLimitsForApp => println!("No limits set for \"{}\"", app),
                UnsetOutcome::NoLimitsForProcess => println!("No limits set for \"{}\"", process),
                UnsetOutcome::Unset { removed, restart } => {
                    if removed.is_empty() {
                        println!("No limits set for \"{}\"", process);
                    }
                    for kind in removed {
                        println!("Unset \"{}\"", kind);
                    }
                    print_restart(&app, &restart);
                }
            }
        }
        Commands::Report { app, json } => {
            let reports = commands.report(app.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else if reports.is_empty() {
                println!("No limits set");
            } else {
                for report in reports {
                    println!("{}", report.header().cyan().bold());
                    for line in report.lines() {
                        println!("{}", line);
                    }
                }
            }
        }
        Commands::DockerOptions { app, process } => {
            let flags = commands.docker_options(&app, &process)?;
            if !flags.is_empty() {
                println!("{}", flags.join(" "));
            }
        }
        // Handled before config loading
        Commands::GenerateConfig { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wrap a command failure, pointing at the accepted syntax for bad input
fn command_error(err: proclimit_core::Error, action: String) -> anyhow::Error {
    if err.is_input_error() {
        let kinds: Vec<&str> = ResourceKind::ALL.iter().map(|k| k.as_str()).collect();
        anyhow::Error::new(err).context(format!(
            "{}: invalid input (expected KIND=VALUE, kinds: {})",
            action,
            kinds.join(", ")
        ))
    } else {
        anyhow::Error::new(err).context(action)
    }
}

fn print_restart(app: &str, status: &RestartStatus) {
    match status {
        RestartStatus::Skipped => {}
        RestartStatus::Triggered => println!("{}", format!("Restarted {}", app).green()),
        RestartStatus::NotDeployed => {
            println!("{}", format!("{} has not been deployed, not restarting", app).yellow())
        }
        RestartStatus::Failed(e) => {
            println!("{}", format!("Failed to restart {}: {}", app, e).red())
        }
    }
}

/// Generate default configuration file
fn generate_config(output: &Path) -> Result<()> {
    let config = Config::default();
    config.save_to_file(output)?;
    println!("Configuration written to {:?}", output);
    Ok(())
}

/// Load configuration from file or use defaults
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::load_from_file(path)
    } else {
        Ok(Config::default())
    }
}
