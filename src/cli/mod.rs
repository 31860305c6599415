//! CLI module for the PMP User API
//!
//! - `serve`: run the HTTP API
//! - `migrate`: apply PostgreSQL schema migrations and exit

pub mod migrate;
pub mod serve;

use clap::{Parser, Subcommand};

/// PMP User API - registration, login and bearer-token identity
#[derive(Parser)]
#[command(name = "pmp-user-api")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the API server
    Serve(serve::ServeArgs),

    /// Apply database migrations
    Migrate,
}
