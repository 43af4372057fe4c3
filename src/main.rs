use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::runtime::Runtime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wikisync::cli::commands;

#[derive(Parser)]
#[command(name = "wikisync")]
#[command(
    version,
    about = "Keeps a wiki in sync with the code it documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory (holds .wikisync/)
    #[arg(long, short = 'C', global = true, default_value = ".")]
    project: PathBuf,

    #[arg(long, global = true)]
    verbose: bool,

    #[arg(long, short, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize wikisync in the project directory
    Init {
        #[arg(long, short, help = "Overwrite existing initialization")]
        force: bool,
    },

    /// Show what a sync would change, without publishing
    Plan {
        #[arg(long, help = "Documentation root (overrides platform.root_key)")]
        root: Option<String>,
        #[arg(long, help = "Print the plan as JSON")]
        json: bool,
    },

    /// Analyze, generate and publish documentation
    Sync {
        #[arg(long, help = "Documentation root (overrides platform.root_key)")]
        root: Option<String>,
        #[arg(long = "plan-only", help = "Stop after reconciliation")]
        plan_only: bool,
        #[arg(long, help = "Print the run report as JSON")]
        json: bool,
    },

    /// Show committed state and the last run
    Status {
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },

    /// Queue a reader correction for a page, or list queued corrections
    Feedback {
        #[arg(help = "Page key, e.g. API/shop", required_unless_present = "list")]
        page_key: Option<String>,
        #[arg(help = "Correction text", required_unless_present = "list")]
        correction: Option<String>,
        #[arg(long, help = "List queued corrections instead")]
        list: bool,
        #[arg(long, requires = "list", help = "Only items not yet forwarded")]
        pending: bool,
    },

    /// Clean up wikisync data
    Clean {
        #[arg(long, help = "Remove all local wikisync data")]
        all: bool,
        #[arg(long, help = "Only clear the content block cache")]
        cache: bool,
        #[arg(long, help = "Discard journaled operations of an interrupted sync")]
        journal: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (merged from all sources)
    Show {
        #[arg(short = 'g', long, help = "Show global config file only")]
        global: bool,
        #[arg(
            short = 'f',
            long,
            default_value = "text",
            help = "Output format: text, json"
        )]
        format: String,
    },
    /// Show configuration file paths
    Path,
    /// Initialize configuration
    Init {
        #[arg(long, short, help = "Initialize global config")]
        global: bool,
        #[arg(long, help = "Overwrite existing config")]
        force: bool,
    },
}

/// Set up panic handler for graceful error reporting
fn setup_panic_handler() {
    let default_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        eprintln!("\n\x1b[1;31m━━━ PANIC ━━━\x1b[0m");
        eprintln!("\x1b[31mwikisync encountered an unexpected error:\x1b[0m");
        eprintln!("  {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "\x1b[90mLocation: {}:{}:{}\x1b[0m",
                location.file(),
                location.line(),
                location.column()
            );
        }
        eprintln!();

        // Call default hook for backtrace (if RUST_BACKTRACE=1)
        default_hook(panic_info);
    }));
}

fn main() -> ExitCode {
    setup_panic_handler();

    match run_cli() {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns the exit code: 0 clean, 2 when pages failed or conflicted
fn run_cli() -> anyhow::Result<u8> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let project = cli.project;

    let code = match cli.command {
        Commands::Init { force } => {
            commands::init::run(&project, force)?;
            0
        }
        Commands::Plan { root, json } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::plan::run(&project, root.as_deref(), json))?
        }
        Commands::Sync {
            root,
            plan_only,
            json,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::sync::run(
                &project,
                root.as_deref(),
                plan_only,
                json,
            ))?
        }
        Commands::Status { format } => {
            commands::status::run(&project, format == "json")?;
            0
        }
        Commands::Feedback {
            page_key,
            correction,
            list,
            pending,
        } => {
            match (list, page_key, correction) {
                (false, Some(page_key), Some(correction)) => {
                    commands::feedback::submit(&project, &page_key, &correction)?
                }
                _ => commands::feedback::list(&project, pending)?,
            }
            0
        }
        Commands::Clean {
            all,
            cache,
            journal,
        } => {
            let rt = Runtime::new()?;
            rt.block_on(commands::clean::run(&project, all, cache, journal))?;
            0
        }
        Commands::Config { action } => {
            match action {
                ConfigAction::Show { global, format } => {
                    commands::config::show(&project, global, &format)?;
                }
                ConfigAction::Path => {
                    commands::config::path(&project)?;
                }
                ConfigAction::Init { global, force } => {
                    if global {
                        commands::config::init_global(force)?;
                    } else {
                        commands::config::init_project(&project)?;
                    }
                }
            }
            0
        }
    };

    Ok(u8::try_from(code).unwrap_or(1))
}
