//! Command implementations.

pub mod echo;
pub mod identity;
pub mod start;

/// Build a tokio runtime or exit.
pub(crate) fn runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            crate::ui::error(&format!("Failed to start async runtime: {e}"));
            std::process::exit(1);
        }
    }
}
