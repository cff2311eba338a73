//! # Notedeck CLI
//!
//! The binary is intentionally thin: the CLI lives in `src/cli/`, this file
//! only invokes `cli::run()` and handles process termination.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/notedeck/src/cli/)                       │
//! │  - clap argument parsing (setup.rs)                         │
//! │  - Context wiring + dispatch (commands.rs)                  │
//! │  - Terminal output (print.rs)                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (crates/notedeckapp/src/api.rs)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The library never prints; everything user-facing (arguments, logging
//! setup, colours, exit codes) is decided here.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
