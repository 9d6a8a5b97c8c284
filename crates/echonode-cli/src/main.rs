//! echonode: a peer node with an echo protocol and an HTTP control endpoint.
//!
//! `echonode start` (or no subcommand) runs the node in the foreground.
//! The other commands are one-shot helpers.

mod cli;
mod cmd;
mod config;
mod ui;

use crate::cli::*;
use crate::config::{apply_overrides, load_config, Overrides};
use clap::Parser;

fn init_tracing_stderr(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let (mut node_config, load_error) = load_config(cli.config.as_deref());
    init_tracing_stderr(&node_config.log_level);
    if let Some(e) = load_error {
        tracing::warn!("{e}, using defaults");
    }

    match cli.command {
        None => cmd::start::cmd_start(node_config),
        Some(Commands::Start {
            http_port,
            p2p_port,
            insecure,
            seed,
        }) => {
            apply_overrides(
                &mut node_config,
                &Overrides {
                    http_port,
                    p2p_port,
                    insecure,
                    seed,
                },
            );
            cmd::start::cmd_start(node_config);
        }
        Some(Commands::Echo {
            addr,
            message,
            insecure,
            seed,
        }) => cmd::echo::cmd_echo(&addr, &message, insecure, seed),
        Some(Commands::Identity { seed }) => cmd::identity::cmd_identity(seed),
    }
}
