use std::io::Write;

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::select;

use fsrelay::config::Settings;
use fsrelay::{Watcher, logging};

#[derive(Parser)]
#[command(name = "fsrelay")]
#[command(about = "Relay filesystem changes under the working directory to subscribers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the working directory and print each change message as NDJSON
    Watch,

    /// Print the effective configuration as TOML
    Config,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load()
        .map_err(|e| anyhow::anyhow!(e))
        .context("failed to load configuration")?;
    logging::init_with_config(&settings.logging);

    match cli.command {
        Commands::Watch => run_watch(&settings),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&settings)?);
            Ok(())
        }
    }
}

/// Run a watcher on the working directory with stdout as the only
/// subscriber, one JSON message per line.
fn run_watch(settings: &Settings) -> anyhow::Result<()> {
    let mut watcher = Watcher::new(settings)?;

    let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(settings.watch.queue_capacity);
    watcher.listen(tx);

    let done = watcher.done().clone();
    loop {
        select! {
            recv(rx) -> msg => match msg {
                Ok(msg) => print_message(&msg)?,
                Err(_) => break,
            },
            recv(done) -> _ => {
                // Dispatch is gone; drain anything already delivered.
                while let Ok(msg) = rx.try_recv() {
                    print_message(&msg)?;
                }
                break;
            }
        }
    }

    watcher.close().context("watch terminated")?;
    Ok(())
}

fn print_message(msg: &[u8]) -> anyhow::Result<()> {
    let mut out = std::io::stdout().lock();
    out.write_all(msg)?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}
