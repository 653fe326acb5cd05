use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Read by `create-super-admin`; the password is never a CLI argument.
pub const BOOTSTRAP_PASSWORD_ENV: &str = "FIELDSCOUT_BOOTSTRAP_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "fieldscout-server", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Serve,
    Migrate,
    CreateRealm {
        #[arg(long)]
        name: String,
        #[arg(long)]
        share_reports: bool,
    },
    CreateSuperAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        realm_id: i64,
    },
}
