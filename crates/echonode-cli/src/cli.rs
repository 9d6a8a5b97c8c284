//! Clap CLI definitions for echonode.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub const AFTER_HELP: &str = "\
\x1b[1;36mExamples:\x1b[0m
  echonode start                          Run a node on :8080 (HTTP) and :8081 (peer)
  echonode start --p2p-port 9001 --seed 1 Reproducible identity on a custom port
  curl localhost:8080/connection-info     Ask a running node for its address
  echonode echo <ADDR> \"hello\"            Send one line to a peer and print the reply
  echonode identity --seed 1              Show the peer ID a seed produces";

/// echonode: a peer node with an echo protocol and an HTTP control endpoint.
#[derive(Parser)]
#[command(
    name = "echonode",
    version,
    about = "Peer node with an echo protocol and an HTTP control endpoint",
    after_help = AFTER_HELP,
)]
pub struct Cli {
    /// Path to config file (default: ~/.echonode/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the node: peer host plus HTTP endpoint (default).
    Start {
        /// HTTP control port.
        #[arg(long)]
        http_port: Option<u16>,
        /// Peer listen port.
        #[arg(long)]
        p2p_port: Option<u16>,
        /// Skip the signed identity handshake. Local testing only.
        #[arg(long)]
        insecure: bool,
        /// Deterministic key seed; 0 means random.
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,
    },
    /// Send one line to a peer's echo protocol and print the reply.
    Echo {
        /// Full peer address, e.g. /ip4/127.0.0.1/tcp/8081/p2p/<peer id>.
        addr: String,
        /// Line to send.
        message: String,
        /// Dial a node running with --insecure.
        #[arg(long)]
        insecure: bool,
        /// Key seed for the dialing identity.
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,
    },
    /// Print the peer ID and public key a seed produces.
    Identity {
        /// Key seed; omit for a random key.
        #[arg(long, allow_negative_numbers = true)]
        seed: Option<i64>,
    },
}
