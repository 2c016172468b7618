//! Inspect the stance table and run sandboxed tool calls from the shell.
//!
//! # Examples
//!
//! ```sh
//! # Print the stance table
//! tiller stances
//!
//! # Which stance does this model output ask for?
//! tiller shift --current do "Looks good. [stance: craft]"
//!
//! # Run one tool call under a stance and print the result as JSON
//! tiller --workdir ./project tool read_file '{"path": "Cargo.toml"}' --stance evidence
//!
//! # Tool declarations offered under a stance
//! tiller tools --stance evidence
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` (e.g. `RUST_LOG=tiller=debug`) for more.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tiller::prelude::*;
use tiller::stance::detect_shift;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Stance governance and sandboxed tool execution for coding agents.
#[derive(Parser)]
#[command(name = "tiller", version)]
struct Cli {
    /// Working directory the sandbox is confined to (overrides the config file)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true, default_value = "tiller.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the stance table
    Stances,

    /// Detect a stance directive in a piece of model output
    Shift {
        /// The stance currently active
        #[arg(long, default_value = "do")]
        current: String,

        /// Model output to scan
        text: String,
    },

    /// Run one tool call through a governed session and print the result
    Tool {
        /// Tool name (e.g. read_file)
        name: String,

        /// Tool arguments as a JSON object
        #[arg(default_value = "{}")]
        arguments: String,

        /// Stance to run under (defaults to the config's default stance)
        #[arg(long)]
        stance: Option<String>,
    },

    /// Print the tool declarations offered under a stance
    Tools {
        /// Stance to filter by (defaults to the config's default stance)
        #[arg(long)]
        stance: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let mut config = SandboxConfig::load_or_default(&cli.config)?;
    if let Some(workdir) = cli.workdir {
        config = config.with_workdir(workdir);
    }

    match cli.command {
        Command::Stances => {
            print_stances();
            Ok(())
        }
        Command::Shift { current, text } => {
            let current = get_stance(&current).stance;
            match detect_shift(&text, current) {
                Some(to) => println!("{current} -> {to}"),
                None => println!("no shift (stays {current})"),
            }
            Ok(())
        }
        Command::Tool {
            name,
            arguments,
            stance,
        } => {
            let tools = ToolSet::sandbox(&config).map_err(|e| e.to_string())?;
            let stance = resolve_stance(stance.as_deref(), &config);
            let mut session = Session::with_stance("cli", stance);
            let result = session.run_tool(&tools, &name, &arguments, None).await;
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| format!("failed to serialize result: {e}"))?;
            println!("{json}");
            if result.is_error {
                process::exit(2);
            }
            Ok(())
        }
        Command::Tools { stance } => {
            let tools = ToolSet::sandbox(&config).map_err(|e| e.to_string())?;
            let stance = resolve_stance(stance.as_deref(), &config);
            let offered = tools.definitions();
            let selection = Session::with_stance("cli", stance).offered_tools(&offered);
            let unrestricted = selection.is_unrestricted();
            let defs = selection.resolve(&offered);

            println!(
                "stance '{stance}': {}",
                if unrestricted {
                    "all tools".to_string()
                } else {
                    format!("{} tool(s)", defs.len())
                }
            );
            let json = serde_json::to_string_pretty(&defs)
                .map_err(|e| format!("failed to serialize tools: {e}"))?;
            println!("{json}");
            Ok(())
        }
    }
}

fn resolve_stance(name: Option<&str>, config: &SandboxConfig) -> Stance {
    match name {
        Some(name) => get_stance(name).stance,
        None => config.initial_stance().stance,
    }
}

fn print_stances() {
    println!("{:<10} {:<10} TOOLS", "STANCE", "MAX_TURNS");
    for stance in Stance::ALL {
        let config = stance.config();
        let tools = match config.allowed_tools {
            AllowedTools::All => "all".to_string(),
            AllowedTools::None => "none".to_string(),
            AllowedTools::Only(names) => names.join(", "),
        };
        let turns = if config.is_unbounded() {
            "unbounded".to_string()
        } else {
            config.max_turns.to_string()
        };
        println!("{:<10} {turns:<10} {tools}", stance.as_str());
    }
}
