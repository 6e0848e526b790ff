//! Directive aggregator and Dockerfile renderer
//!
//! [`Dockerfile`] is the stateful accumulator behind the whole tool: each
//! directive operation appends to a deduplicated set or an ordered phase
//! buffer, and `render` consumes the value to produce the generated artifact.
//! Because `render` takes `self`, no directive can be invoked after
//! finalization; every synthesis run owns an independent instance.

use std::collections::BTreeSet;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, FixedOffset};

use crate::error::{StevedoreError, StevedoreResult};
use crate::format;
use crate::line::{echo_to, escape, flatten, Line};
use crate::sequence;

/// Base image used when the document does not name one
pub const DEFAULT_FROM: &str = "phusion/baseimage:0.9.18";

/// Width of the wrapped base64 lines emitted by `embed`
const EMBED_WRAP: usize = 60;

/// Accumulator for one Dockerfile synthesis run
#[derive(Debug, Clone)]
pub struct Dockerfile {
    pub(crate) name: String,
    pub(crate) from: String,
    pub(crate) maintainer: String,
    pub(crate) user: String,
    pub(crate) uid: u32,
    pub(crate) host_ip: String,

    // Deduplicated sets; lexicographic iteration keeps output deterministic.
    pub(crate) requirements: BTreeSet<String>,
    pub(crate) packages: BTreeSet<String>,
    pub(crate) depends: BTreeSet<String>,
    pub(crate) envs: BTreeSet<(String, String)>,
    pub(crate) ports: BTreeSet<u16>,
    pub(crate) volumes: BTreeSet<String>,

    // ADD lines emitted before and after the RUN block.
    pub(crate) adds: Vec<String>,
    pub(crate) configures: Vec<String>,

    // Ordered phase buffers in directive invocation order.
    pub(crate) begin: Vec<Line>,
    pub(crate) pre_install: Vec<Line>,
    pub(crate) install: Vec<Line>,
    pub(crate) post_install: Vec<Line>,
    pub(crate) run: Vec<Line>,
    pub(crate) end: Vec<Line>,

    // Set when deb packages need a dependency-resolution pass.
    pub(crate) deb_flag: bool,
}

impl Dockerfile {
    pub fn new() -> Self {
        Self {
            name: "image".to_string(),
            from: DEFAULT_FROM.to_string(),
            maintainer: "Stevedore Contributors".to_string(),
            user: "root".to_string(),
            uid: 1000,
            host_ip: "127.0.0.1".to_string(),
            requirements: BTreeSet::new(),
            packages: BTreeSet::new(),
            depends: BTreeSet::new(),
            envs: BTreeSet::new(),
            ports: BTreeSet::new(),
            volumes: BTreeSet::new(),
            adds: Vec::new(),
            configures: Vec::new(),
            begin: Vec::new(),
            pre_install: Vec::new(),
            install: Vec::new(),
            post_install: Vec::new(),
            run: Vec::new(),
            end: Vec::new(),
            deb_flag: false,
        }
    }

    /// Numeric uid used for the generated user; mirrors the invoking user
    /// on the host so bind-mounted volumes stay writable.
    pub fn with_uid(mut self, uid: u32) -> Self {
        self.uid = uid;
        self
    }

    /// Address deb packages are fetched from during the install phase
    pub fn with_host_ip(mut self, host_ip: impl Into<String>) -> Self {
        self.host_ip = host_ip.into();
        self
    }

    // === Identity directives ===

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn set_from(&mut self, image: &str) {
        self.from = image.to_string();
    }

    pub fn set_maintainer(&mut self, maintainer: &str) {
        self.maintainer = maintainer.to_string();
    }

    /// Create or adjust the unprivileged user the image runs as
    ///
    /// The generated sequence is idempotent at the shell level: creation
    /// falls back to adjusting an existing user's uid/gid.
    pub fn set_user(&mut self, user: &str) {
        self.user = user.to_string();
        let uid = self.uid;
        self.begin
            .push(Line::comment("Creating user / Adjusting user permissions"));
        self.begin
            .push(Line::command(format!("(groupadd -g {} {} || true)", uid, user)));
        self.begin.push(Line::command(format!(
            "((useradd -u {} -g {} -p {} -m {}) || \\",
            uid, uid, user, user
        )));
        self.begin.push(Line::command(format!(
            " (usermod -u {} {} && groupmod -g {} {}))",
            uid, user, uid, user
        )));
        self.begin.push(Line::command(format!(
            "chown -R {}:{} /home/{}",
            user, user, user
        )));
        self.begin.push(Line::Break);
    }

    // === Package directives ===

    /// Request a package in the main install block
    pub fn install(&mut self, package: &str) {
        self.packages.insert(package.to_string());
    }

    /// Request a build-only package, purged after the run phase
    pub fn depend(&mut self, package: &str) {
        self.depends.insert(package.to_string());
    }

    /// Install a deb file served from the host during the build
    pub fn install_deb(&mut self, deb: &str) {
        self.install.push(Line::comment("Installing deb package"));
        self.install.push(Line::command(format!(
            "wget http://{}:8888/{}",
            self.host_ip, deb
        )));
        self.install
            .push(Line::command(format!("(dpkg -i {} || true)", deb)));
        self.install.push(Line::Break);

        self.post_install.push(Line::command(format!("rm -f {}", deb)));

        self.packages.insert("wget".to_string());
        self.deb_flag = true;
    }

    /// Add an apt repository, importing its signing key first
    ///
    /// A key that is entirely hexadecimal is fetched from the keyserver;
    /// any other key value is treated as a URL to download.
    pub fn add_repository(&mut self, name: &str, source_line: &str, key: Option<&str>) {
        self.pre_install
            .push(Line::comment(format!("Adding {} repository", name)));

        match key {
            Some(key) if is_hex(key) => {
                self.pre_install.push(Line::command(format!(
                    "gpg --keyserver keys.gnupg.net --recv {}",
                    key
                )));
                self.pre_install
                    .push(Line::command(format!("gpg --export {} | apt-key add -", key)));
                self.requirements.insert("gnupg".to_string());
            }
            Some(key) => {
                self.pre_install
                    .push(Line::command(format!("wget -O - {} | apt-key add -", key)));
                self.requirements.insert("wget".to_string());
                self.requirements.insert("ssl-cert".to_string());
            }
            None => {}
        }

        self.pre_install.push(Line::command(format!(
            "echo '{}' >> /etc/apt/sources.list.d/{}.list",
            source_line,
            name.to_lowercase()
        )));
        self.pre_install.push(Line::Break);
    }

    /// Add a PPA; requires the PPA management tooling
    pub fn add_ppa(&mut self, name: &str, ppa: &str) {
        self.pre_install
            .push(Line::comment(format!("Adding {} PPA", name)));
        self.pre_install
            .push(Line::command(format!("add-apt-repository -y {}", ppa)));
        self.pre_install.push(Line::Break);

        self.requirements.insert("software-properties-common".to_string());
        self.requirements
            .insert("python-software-properties".to_string());
    }

    // === Set directives ===

    pub fn env(&mut self, key: &str, value: &str) {
        self.envs.insert((key.to_string(), value.to_string()));
    }

    pub fn expose(&mut self, port: u16) {
        self.ports.insert(port);
    }

    /// Declare a volume and fix its ownership at the end of the RUN block
    pub fn volume(&mut self, path: &str) {
        self.end
            .push(Line::comment("Fixing permission errors for volume"));
        self.end.push(Line::command(format!("mkdir -p {}", path)));
        self.end.push(Line::command(format!(
            "chown -R {}:{} {}",
            self.user, self.user, path
        )));
        self.end
            .push(Line::command(format!("chmod -R 700 {}", path)));
        self.end.push(Line::Break);

        self.volumes.insert(path.to_string());
    }

    // === File directives ===

    /// Append an ADD line before the RUN block
    pub fn add(&mut self, source: &str, dest: &str) {
        self.adds.push(format!("ADD {} {}", source, dest));
    }

    /// Append an ADD line after the RUN block
    pub fn configure(&mut self, source: &str, dest: &str) {
        self.configures.push(format!("ADD {} {}", source, dest));
    }

    /// Materialize a file inside the image, line by line
    pub fn create(&mut self, path: &str, contents: &str) {
        self.run.push(Line::comment(format!("Creating {}", path)));
        self.run
            .push(Line::command(format!("mkdir -p {}", parent_dir(path))));
        self.run.extend(crate::line::append_lines(contents, path));
        self.run.push(Line::command(format!(
            "chown {}:{} {}",
            self.user, self.user, path
        )));
        self.run.push(Line::Break);
    }

    /// Embed a host file into the image through a binary-safe encoded write
    ///
    /// The source is read eagerly; an unreadable source fails the whole
    /// synthesis before any artifact is written.
    pub fn embed(&mut self, source: &str, dest: &str) -> StevedoreResult<()> {
        let bytes =
            std::fs::read(source).map_err(|e| StevedoreError::UnresolvedReference {
                path: source.into(),
                source: e,
            })?;

        self.run.push(Line::comment(format!("Embedding {}", source)));
        self.run.push(Line::command("echo \\"));

        let encoded = STANDARD.encode(&bytes);
        for chunk in encoded.as_bytes().chunks(EMBED_WRAP) {
            // Base64 output is ASCII, chunk boundaries cannot split a char.
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            self.run.push(Line::command(format!("{} \\", chunk)));
        }

        self.run.push(Line::command(format!(
            "| tr -d ' ' | base64 -d > {}",
            dest
        )));
        self.run.push(Line::command(format!(
            "chown {}:{} {}",
            self.user, self.user, dest
        )));
        self.run.push(Line::Break);
        Ok(())
    }

    // === Script directives ===

    /// Define the boot script, preserving comments and blank lines
    pub fn startup(&mut self, text: &str) {
        self.run.push(Line::comment("Defining startup script"));
        self.run
            .push(Line::command("echo '#!/bin/sh -e' > /etc/rc.local"));

        let trimmed = text.trim();
        if trimmed.starts_with('#') {
            self.run.push(Line::Break);
        }

        for line in trimmed.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix('#') {
                self.run.push(Line::comment(rest.trim()));
            } else if line.is_empty() {
                self.run.push(Line::Break);
            } else {
                self.run.push(Line::command(echo_to(line, "/etc/rc.local")));
            }
        }

        self.run.push(Line::Break);
    }

    /// Schedule an hourly cron job wrapping its output through logger
    pub fn cron(&mut self, name: &str, command: &str) {
        let file = format!("/etc/cron.hourly/{}", name);

        self.run
            .push(Line::comment(format!("Adding {} cronjob", name)));
        self.run
            .push(Line::command(format!("echo '#!/bin/sh -e' > {}", file)));
        self.run.push(Line::command(format!(
            "echo 'logger {}: $(' >> {}",
            name, file
        )));

        for line in command.trim().lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix('#') {
                self.run.push(Line::comment(rest.trim()));
            } else if line.is_empty() {
                self.run.push(Line::Break);
            } else {
                self.run.push(Line::command(format!(
                    "echo \"{};\" >> {}",
                    escape(line),
                    file
                )));
            }
        }

        self.run.push(Line::command(format!("echo ')' >> {}", file)));
        self.run.push(Line::command(format!("chmod 755 {}", file)));
        self.run.push(Line::Break);
    }

    /// Register a supervised background daemon
    pub fn daemon(&mut self, name: &str, command: &str) {
        let file = format!("/etc/service/{}/run", name);

        self.run
            .push(Line::comment(format!("Installing {} daemon", name)));
        self.run
            .push(Line::command(format!("mkdir -p /etc/service/{}", name)));
        self.run.push(Line::command(echo_to("#!/bin/sh", &file)));
        self.run.push(Line::command(echo_to(
            &format!("exec /sbin/setuser {} {}", self.user, flatten(command)),
            &file,
        )));
        self.run.push(Line::command(format!("chmod 755 {}", file)));
        self.run.push(Line::Break);
    }

    /// Append arbitrary literal lines to the run phase
    ///
    /// Lines beginning with `#` become comments, blank lines become explicit
    /// breaks.
    pub fn run(&mut self, text: &str) {
        for line in text.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix('#') {
                self.run.push(Line::comment(rest.trim()));
            } else if line.is_empty() {
                self.run.push(Line::Break);
            } else {
                self.run.push(Line::command(line));
            }
        }
        self.run.push(Line::Break);
    }

    // === Finalization ===

    /// Synthesize the formatted RUN block from the accumulated state
    ///
    /// Pure read: calling this twice on the same state produces identical
    /// text. Fails with `EmptyFinalization` when no directive contributed a
    /// command line.
    pub fn synthesize(&self) -> StevedoreResult<String> {
        format::render_block(&sequence::sequence(self))
    }

    /// Render the complete Dockerfile artifact, consuming the aggregator
    ///
    /// The timestamp is injected so rendering stays a pure function of its
    /// inputs.
    pub fn render(self, generated_at: DateTime<FixedOffset>) -> StevedoreResult<String> {
        let run_block = self.synthesize()?;
        let mut lines: Vec<String> = Vec::new();

        lines.push(format!(
            "# {} {}",
            self.name,
            generated_at.format("%Y-%m-%d %H:%M:%S %z")
        ));
        lines.push(format!("FROM {}", self.from));
        lines.push(format!("MAINTAINER {}", self.maintainer));
        lines.push(String::new());

        for (key, value) in &self.envs {
            lines.push(format!("ENV {} {}", key, value));
        }
        if !self.envs.is_empty() {
            lines.push(String::new());
        }

        for port in &self.ports {
            lines.push(format!("EXPOSE {}", port));
        }
        if !self.ports.is_empty() {
            lines.push(String::new());
        }

        lines.extend(self.adds.iter().cloned());
        if !self.adds.is_empty() {
            lines.push(String::new());
        }

        lines.push(run_block);
        lines.push(String::new());

        lines.extend(self.configures.iter().cloned());
        if !self.configures.is_empty() {
            lines.push(String::new());
        }

        for volume in &self.volumes {
            lines.push(format!("VOLUME {}", volume));
        }
        if !self.volumes.is_empty() {
            lines.push(String::new());
        }

        lines.push("ENTRYPOINT [\"/sbin/my_init\"]".to_string());

        Ok(format!("{}\n", lines.join("\n")))
    }
}

impl Default for Dockerfile {
    fn default() -> Self {
        Self::new()
    }
}

fn is_hex(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_hexdigit())
}

fn parent_dir(path: &str) -> String {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.display().to_string(),
        _ => ".".to_string(),
    }
}
