//! dwell - per-application focus time daemon
//!
//! Tracks how long each application holds focus, pausing while the user is
//! idle or the screen is locked. Type `s` to show usage, `c` to clear it and
//! `q` to quit.

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use dwell::config::Config;
use dwell::logging::{self, Journal};
use dwell::menu::{Presenter, TextPresenter};
use dwell::tracker::{Command, Tracker};
use dwell::{focus, idle};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn main() -> Result<()> {
    // Optional config file path as the only argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let config = Config::load(config_path.as_deref())?;
    config.validate()?;

    logging::init_tracing(&config.logging)?;

    info!("Starting dwell v{}", VERSION);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    runtime.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    info!(
        "Configuration loaded: focus poll={}ms, idle detection={}, idle threshold={}s",
        config.focus.poll_interval_ms, config.idle.enabled, config.idle.threshold_seconds
    );

    let focus = focus::native_source(config.focus.poll_interval())
        .context("Focus tracking is not available")?;
    let idle = idle::open_source(&config.idle);

    let mut tracker = Tracker::new(Box::new(focus), idle, config.display.min_minutes);
    if config.logging.journal {
        let mut journal = Journal::new(config.logging.logs_dir())?;
        journal.log_session_start(VERSION)?;
        tracker = tracker.with_journal(journal);
    }

    let subscription = tracker.enable().context("Failed to start focus tracking")?;

    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(16);
    spawn_stdin_reader(cmd_tx.clone())?;

    let ctrl_c_tx = cmd_tx;
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                let _ = ctrl_c_tx.send(Command::Quit).await;
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    println!("Tracking focus time. Commands: [s]how, [c]lear, [q]uit");

    let mut presenter = TextPresenter::new(std::io::stdout());
    tracker.run(subscription, cmd_rx, &mut presenter).await;

    // Show what the session amounted to before exiting
    let menu = tracker.present();
    presenter.render(&menu)?;
    tracker.shutdown();

    info!("Goodbye!");
    Ok(())
}

/// Forward commands typed on stdin to the event loop.
///
/// End of input only stops reading; the daemon keeps tracking until Ctrl-C.
fn spawn_stdin_reader(cmd_tx: mpsc::Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                };
                match line.parse::<Command>() {
                    Ok(command) => {
                        if cmd_tx.blocking_send(command).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
            }
            debug!("Stdin reader exiting");
        })
        .context("Failed to spawn stdin reader")?;
    Ok(())
}
