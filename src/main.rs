//! Stevedore CLI - declarative Dockerfile compiler
//!
//! Usage: stevedore <COMMAND>
//!
//! Commands:
//!   build   Compile a Dockerfile.yml into a Dockerfile
//!   check   Parse and dry-run a document without writing anything

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use is_terminal::IsTerminal;

use serde::Serialize;

use stevedore::cli::{Cli, Commands};
use stevedore::{apply_all, load_document, Dockerfile};

/// Machine-readable result of `check --json`
#[derive(Debug, Serialize)]
struct CheckReport {
    ok: bool,
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    directives: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            source,
            output,
            stdout,
            uid,
            host_ip,
        } => build(&source, &output, stdout, uid, host_ip, cli.verbose),
        Commands::Check { source } => check(&source, cli.json),
    }
}

fn build(
    source: &Path,
    output: &Path,
    to_stdout: bool,
    uid: Option<u32>,
    host_ip: Option<String>,
    verbose: u8,
) -> Result<()> {
    let directives = load_document(source)
        .with_context(|| format!("failed to load {}", source.display()))?;

    let mut dockerfile = Dockerfile::new();
    if let Some(uid) = uid {
        dockerfile = dockerfile.with_uid(uid);
    }
    if let Some(host_ip) = host_ip {
        dockerfile = dockerfile.with_host_ip(host_ip);
    }
    if let Some(name) = working_directory_name() {
        dockerfile.set_name(&name);
    }

    apply_all(&directives, &mut dockerfile)?;

    if verbose > 0 {
        eprintln!("applied {} directives from {}", directives.len(), source.display());
    }

    let artifact = dockerfile.render(Local::now().fixed_offset())?;

    if to_stdout {
        print!("{}", artifact);
        return Ok(());
    }

    stevedore::fs::write_atomic(output, &artifact)
        .with_context(|| format!("failed to write {}", output.display()))?;

    if std::io::stderr().is_terminal() || verbose > 0 {
        eprintln!("wrote {} ({} bytes)", output.display(), artifact.len());
    }

    Ok(())
}

fn check(source: &Path, json: bool) -> Result<()> {
    match dry_run(source) {
        Ok(count) => {
            if json {
                let report = CheckReport {
                    ok: true,
                    source: source.display().to_string(),
                    directives: Some(count),
                    error: None,
                };
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!("{}: ok ({} directives)", source.display(), count);
            }
            Ok(())
        }
        Err(err) if json => {
            let report = CheckReport {
                ok: false,
                source: source.display().to_string(),
                directives: None,
                error: Some(err.to_string()),
            };
            println!("{}", serde_json::to_string(&report)?);
            std::process::exit(1);
        }
        Err(err) => Err(err).with_context(|| format!("check failed for {}", source.display())),
    }
}

/// Parse, apply and synthesize without writing anything
fn dry_run(source: &Path) -> Result<usize> {
    let directives = load_document(source)?;
    let mut dockerfile = Dockerfile::new();
    apply_all(&directives, &mut dockerfile)?;
    dockerfile.synthesize()?;
    Ok(directives.len())
}

/// Default image name: the directory the tool runs in
fn working_directory_name() -> Option<String> {
    std::env::current_dir()
        .ok()
        .as_deref()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .map(str::to_string)
}
