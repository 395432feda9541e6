use anyhow::{Context, Result};
use clap::Parser;

mod cli;

use analyst_chat::config::Config;
use analyst_chat::shell::Shell;
use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Logs go to stderr so stdout stays the chat surface
    tracing_subscriber::fmt()
        .with_env_filter(args.log_filter())
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    if args.no_color {
        colored::control::set_override(false);
    }

    let mut config = Config::load(args.config.as_deref());
    args.apply(&mut config);
    config
        .require_credentials()
        .context("Cannot reach the analyst service")?;
    if let Err(problems) = config.validate() {
        tracing::warn!("Config validation warnings: {}", problems);
    }

    let (session, renderer) =
        analyst_chat::build(&config).context("Failed to set up the analyst client")?;
    let mut shell = Shell::new(session, renderer, config.ui.clone(), std::io::stdout());
    shell
        .run(tokio::io::BufReader::new(tokio::io::stdin()))
        .await?;

    eprintln!("Goodbye");
    Ok(())
}
