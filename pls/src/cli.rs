use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keep pip requirement .lock and .unlock files in sync
#[derive(Parser, Debug, Clone)]
#[command(name = "pip-lock-sync")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to project directory (defaults to current directory)
    #[arg(short, long, value_name = "PATH", global = true)]
    pub path: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Resolve .in requirement graphs and write .unlock files
    Unlock {
        /// Venv relative path; every declared venv when omitted
        #[arg(long)]
        venv: Option<String>,
    },

    /// Reconcile version discrepancies across a venv's .lock outputs
    Fix {
        /// Venv relative path; every declared venv when omitted
        #[arg(long)]
        venv: Option<String>,

        /// Report what would change without touching any file
        #[arg(long)]
        dry_run: bool,
    },
}

impl Args {
    /// Get the project path, defaulting to current directory
    pub fn project_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
