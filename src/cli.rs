use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Stevedore - declarative Dockerfile compiler
#[derive(Parser, Debug)]
#[command(name = "stevedore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format for CI
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a Dockerfile.yml into a Dockerfile
    Build {
        /// Path to the declarative document
        #[arg(short, long, default_value = "Dockerfile.yml")]
        source: PathBuf,

        /// Path the generated Dockerfile is written to
        #[arg(short, long, default_value = "Dockerfile")]
        output: PathBuf,

        /// Print the artifact to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,

        /// Uid for the generated user (defaults to 1000)
        #[arg(long)]
        uid: Option<u32>,

        /// Host address deb packages are served from during the build
        #[arg(long)]
        host_ip: Option<String>,
    },

    /// Parse and dry-run a document without writing anything
    Check {
        /// Path to the declarative document
        #[arg(short, long, default_value = "Dockerfile.yml")]
        source: PathBuf,
    },
}
