use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use skillrun::{runner, Config, ProcessInput};

/// skillrun - answer a prompt with an LLM that calls skills through a mediator
#[derive(Parser, Debug)]
#[command(name = "skillrun")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Run input as JSON: sessionID, invocationID, serviceEndpoint,
    /// inputArgs {model, prompt}
    input: String,

    /// Config file (defaults to ~/.config/skillrun/config.toml)
    #[arg(long, env = "SKILLRUN_CONFIG")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env("SKILLRUN_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));

    match log_file {
        Some(path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(file).with_ansi(false))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
                .init();
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    init_logging(args.log_file.as_ref())?;

    let input = ProcessInput::parse(&args.input)?;
    let config = Config::load(args.config.as_deref())?;

    let mut stdout = std::io::stdout();
    runner::run(&input, &config, &mut stdout).await
}

#[tokio::main]
async fn main() -> ExitCode {
    // Optional .env files: working directory, then home
    let _ = dotenvy::from_filename(".env");
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".env"));
    }

    // Usage errors exit 1 like every other failure
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
