//! `echonode identity`: show the identity a seed produces.

use crate::ui;
use echonode_wire::Identity;

pub fn cmd_identity(seed: Option<i64>) {
    let identity = match Identity::generate(seed) {
        Ok(identity) => identity,
        Err(e) => {
            ui::error(&e.to_string());
            std::process::exit(1);
        }
    };

    ui::kv("Peer ID", &identity.peer_id().to_string());
    ui::kv("Public key", &identity.public_key_hex());
    match seed {
        None | Some(0) => ui::hint("Random key: pass --seed N for a reproducible identity"),
        Some(seed) => ui::kv("Seed", &seed.to_string()),
    }
}
