//! Closed enumeration of build directives
//!
//! Every declarative instruction the document language can express is one
//! variant here, with a typed payload. Application happens through a single
//! exhaustive match, so a directive the engine cannot handle is impossible
//! to construct; `UnsupportedDirective` survives only at the data-driven
//! YAML boundary (see `config`).

use crate::dockerfile::Dockerfile;
use crate::error::StevedoreResult;

/// One declarative build directive with its argument payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    SetUser(String),
    SetName(String),
    SetFrom(String),
    SetMaintainer(String),
    Startup(String),
    Env { key: String, value: String },
    Daemon { name: String, command: String },
    Add { source: String, dest: String },
    Repository {
        name: String,
        source_line: String,
        key: Option<String>,
    },
    Ppa { name: String, ppa: String },
    Install(String),
    InstallDeb(String),
    Depend(String),
    Run(String),
    Configure { source: String, dest: String },
    Embed { source: String, dest: String },
    Create { path: String, contents: String },
    Expose(u16),
    Volume(String),
    Cron { name: String, command: String },
}

impl Directive {
    /// Apply this directive to the aggregator
    ///
    /// Only `Embed` can fail (its source file is resolved eagerly); the
    /// failure aborts the whole synthesis run.
    pub fn apply(&self, dockerfile: &mut Dockerfile) -> StevedoreResult<()> {
        match self {
            Directive::SetUser(user) => dockerfile.set_user(user),
            Directive::SetName(name) => dockerfile.set_name(name),
            Directive::SetFrom(image) => dockerfile.set_from(image),
            Directive::SetMaintainer(maintainer) => dockerfile.set_maintainer(maintainer),
            Directive::Startup(text) => dockerfile.startup(text),
            Directive::Env { key, value } => dockerfile.env(key, value),
            Directive::Daemon { name, command } => dockerfile.daemon(name, command),
            Directive::Add { source, dest } => dockerfile.add(source, dest),
            Directive::Repository {
                name,
                source_line,
                key,
            } => dockerfile.add_repository(name, source_line, key.as_deref()),
            Directive::Ppa { name, ppa } => dockerfile.add_ppa(name, ppa),
            Directive::Install(package) => dockerfile.install(package),
            Directive::InstallDeb(deb) => dockerfile.install_deb(deb),
            Directive::Depend(package) => dockerfile.depend(package),
            Directive::Run(text) => dockerfile.run(text),
            Directive::Configure { source, dest } => dockerfile.configure(source, dest),
            Directive::Embed { source, dest } => dockerfile.embed(source, dest)?,
            Directive::Create { path, contents } => dockerfile.create(path, contents),
            Directive::Expose(port) => dockerfile.expose(*port),
            Directive::Volume(path) => dockerfile.volume(path),
            Directive::Cron { name, command } => dockerfile.cron(name, command),
        }
        Ok(())
    }
}

/// Apply a directive list in order to a fresh state
pub fn apply_all(directives: &[Directive], dockerfile: &mut Dockerfile) -> StevedoreResult<()> {
    for directive in directives {
        directive.apply(dockerfile)?;
    }
    Ok(())
}
