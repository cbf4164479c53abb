use clap::{Parser, Subcommand};
use colored::Colorize;
use promptscan::commands;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptscan")]
#[command(about = "Static analysis for prompt templates: parameters, references and content hashes", long_about = None)]
#[command(version)]
struct Cli {
    /// Show debug logs (overrides PROMPTSCAN_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a single prompt and print its metadata
    Scan {
        /// Path to the prompt file
        file: String,
        /// Print the metadata as JSON
        #[arg(long)]
        json: bool,
        /// Directory referenced prompts are resolved against
        /// (defaults to the project's prompt root, or the file's directory)
        #[arg(long)]
        root: Option<String>,
        /// Name supplied at run time; never reported as a parameter (repeatable)
        #[arg(long = "param", value_name = "NAME")]
        params: Vec<String>,
    },
    /// Check every prompt of a project (or a single prompt) for errors
    Check {
        /// Path to project directory, promptscan.toml or prompt file (defaults to current directory)
        #[arg(default_value = ".")]
        target: String,
    },
    /// Watch for changes and re-check automatically
    Watch {
        /// Path to project directory, promptscan.toml or prompt file (defaults to current directory)
        #[arg(default_value = ".")]
        target: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("PROMPTSCAN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            file,
            json,
            root,
            params,
        } => commands::scan::execute(&file, json, root.as_deref(), &params),
        Commands::Check { target } => {
            commands::check::execute(&target)
        }
        Commands::Watch { target } => {
            commands::watch::execute(&target)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
