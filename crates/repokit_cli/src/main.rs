//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `repokit_core` linkage and store bootstrap from a plain binary.
//! - Keep output deterministic for quick local sanity checks.

use repokit_core::db::migrations::latest_version;
use repokit_core::{Session, SqliteSession, StoreConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("repokit_core ping={}", repokit_core::ping());
    println!("repokit_core version={}", repokit_core::core_version());
    println!("repokit_core schema_version={}", latest_version());

    match SqliteSession::open_in_memory(StoreConfig::default()) {
        Ok(session) => {
            println!(
                "repokit_core store=ok default_tracking={}",
                session.default_tracking()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("repokit_core store=error error={err}");
            ExitCode::FAILURE
        }
    }
}
