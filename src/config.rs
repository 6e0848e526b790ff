//! Document loader and directive dispatch
//!
//! Reads a `Dockerfile.yml` document and maps each recognized top-level tag
//! to [`Directive`] values. This is the only data-driven boundary: an
//! unknown tag fails with `UnsupportedDirective`, a recognized tag with a
//! payload shape the dispatcher cannot interpret fails with
//! `MalformedDirective`. Tags are applied in a fixed order regardless of
//! their order in the document, so output is deterministic.

use std::path::Path;

use serde_yaml_ng::Value;

use crate::directive::Directive;
use crate::error::{StevedoreError, StevedoreResult};

/// Fixed application order for document tags
const TAG_ORDER: [&str; 18] = [
    "User",
    "Name",
    "From",
    "Maintainer",
    "Startup",
    "Env",
    "Daemon",
    "Add",
    "Repositories",
    "Install",
    "Depend",
    "Run",
    "Configure",
    "Embed",
    "Create",
    "Expose",
    "Volume",
    "Cron",
];

/// Load and dispatch a document from disk
pub fn load_document(path: &Path) -> StevedoreResult<Vec<Directive>> {
    let text = std::fs::read_to_string(path)?;
    parse_document(&text, path)
}

/// Dispatch a document already held in memory
///
/// `origin` is used for error reporting only.
pub fn parse_document(text: &str, origin: &Path) -> StevedoreResult<Vec<Directive>> {
    let root: Value = serde_yaml_ng::from_str(text)?;

    let mapping = match root {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(StevedoreError::NotAMapping {
                path: origin.to_path_buf(),
            })
        }
    };

    let mut entries: Vec<(String, Value)> = Vec::new();
    for (key, value) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| StevedoreError::NotAMapping {
                path: origin.to_path_buf(),
            })?
            .to_string();
        if !TAG_ORDER.contains(&name.as_str()) {
            return Err(StevedoreError::UnsupportedDirective { name });
        }
        entries.push((name, value));
    }

    let mut directives = Vec::new();
    for tag in TAG_ORDER {
        if let Some((_, value)) = entries.iter().find(|(name, _)| name == tag) {
            dispatch(tag, value, &mut directives)?;
        }
    }

    Ok(directives)
}

fn dispatch(tag: &str, value: &Value, out: &mut Vec<Directive>) -> StevedoreResult<()> {
    match tag {
        "User" => out.push(Directive::SetUser(string(tag, value)?)),
        "Name" => out.push(Directive::SetName(string(tag, value)?)),
        "From" => out.push(Directive::SetFrom(string(tag, value)?)),
        "Maintainer" => out.push(Directive::SetMaintainer(string(tag, value)?)),
        "Startup" => out.push(Directive::Startup(string(tag, value)?)),
        "Run" => out.push(Directive::Run(string(tag, value)?)),
        "Env" => dispatch_env(tag, value, out)?,
        "Daemon" => {
            for (name, command) in named_commands(tag, value)? {
                out.push(Directive::Daemon { name, command });
            }
        }
        "Cron" => {
            for (name, command) in named_commands(tag, value)? {
                out.push(Directive::Cron { name, command });
            }
        }
        "Add" => {
            for (source, dest) in source_dest_list(tag, value)? {
                out.push(Directive::Add { source, dest });
            }
        }
        "Configure" => {
            for (source, dest) in source_dest_list(tag, value)? {
                out.push(Directive::Configure { source, dest });
            }
        }
        "Embed" => {
            for (source, dest) in source_dest_list(tag, value)? {
                out.push(Directive::Embed { source, dest });
            }
        }
        "Repositories" => dispatch_repositories(tag, value, out)?,
        "Install" => {
            for package in string_list(tag, value)? {
                if package.ends_with(".deb") {
                    out.push(Directive::InstallDeb(package));
                } else {
                    out.push(Directive::Install(package));
                }
            }
        }
        "Depend" => {
            for package in string_or_list(tag, value)? {
                out.push(Directive::Depend(package));
            }
        }
        "Create" => dispatch_create(tag, value, out)?,
        "Expose" => {
            for port in port_or_list(tag, value)? {
                out.push(Directive::Expose(port));
            }
        }
        "Volume" => {
            for path in string_or_list(tag, value)? {
                out.push(Directive::Volume(path));
            }
        }
        // TAG_ORDER and this match are kept in sync by the exhaustive test
        // below; a recognized tag always has a dispatch arm.
        _ => {
            return Err(StevedoreError::UnsupportedDirective {
                name: tag.to_string(),
            })
        }
    }
    Ok(())
}

fn dispatch_env(tag: &str, value: &Value, out: &mut Vec<Directive>) -> StevedoreResult<()> {
    match value {
        Value::Mapping(mapping) => {
            for (key, val) in mapping {
                out.push(Directive::Env {
                    key: string(tag, key)?,
                    value: scalar(tag, val)?,
                });
            }
        }
        Value::Sequence(items) => {
            for item in items {
                let Value::Mapping(mapping) = item else {
                    return Err(StevedoreError::malformed(
                        tag,
                        "expected a list of key/value mappings",
                    ));
                };
                for (key, val) in mapping {
                    out.push(Directive::Env {
                        key: string(tag, key)?,
                        value: scalar(tag, val)?,
                    });
                }
            }
        }
        _ => {
            return Err(StevedoreError::malformed(
                tag,
                "expected a mapping or a list of mappings",
            ))
        }
    }
    Ok(())
}

fn dispatch_repositories(
    tag: &str,
    value: &Value,
    out: &mut Vec<Directive>,
) -> StevedoreResult<()> {
    for item in sequence(tag, value)? {
        let name = field(tag, item, "Name")?;
        let url = field(tag, item, "Url")?;
        let key = optional_field(tag, item, "Key")?;

        if url.starts_with("deb ") {
            out.push(Directive::Repository {
                name,
                source_line: url,
                key,
            });
        } else if url.starts_with("ppa:") {
            out.push(Directive::Ppa { name, ppa: url });
        } else {
            return Err(StevedoreError::malformed(
                tag,
                format!("url '{}' is neither a deb line nor a ppa", url),
            ));
        }
    }
    Ok(())
}

fn dispatch_create(tag: &str, value: &Value, out: &mut Vec<Directive>) -> StevedoreResult<()> {
    for item in sequence(tag, value)? {
        out.push(Directive::Create {
            path: field(tag, item, "File")?,
            contents: field(tag, item, "Contents")?,
        });
    }
    Ok(())
}

// === Shape helpers ===

fn string(tag: &str, value: &Value) -> StevedoreResult<String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| StevedoreError::malformed(tag, "expected a string"))
}

/// Accept any YAML scalar and render it as a string
fn scalar(tag: &str, value: &Value) -> StevedoreResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(StevedoreError::malformed(tag, "expected a scalar value")),
    }
}

fn sequence<'v>(tag: &str, value: &'v Value) -> StevedoreResult<&'v Vec<Value>> {
    value
        .as_sequence()
        .ok_or_else(|| StevedoreError::malformed(tag, "expected a list"))
}

fn string_list(tag: &str, value: &Value) -> StevedoreResult<Vec<String>> {
    sequence(tag, value)?
        .iter()
        .map(|item| string(tag, item))
        .collect()
}

fn string_or_list(tag: &str, value: &Value) -> StevedoreResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Sequence(_) => string_list(tag, value),
        _ => Err(StevedoreError::malformed(
            tag,
            "expected a string or a list of strings",
        )),
    }
}

fn port(tag: &str, value: &Value) -> StevedoreResult<u16> {
    value
        .as_u64()
        .and_then(|p| u16::try_from(p).ok())
        .filter(|p| *p > 0)
        .ok_or_else(|| StevedoreError::malformed(tag, "expected a port number between 1 and 65535"))
}

fn port_or_list(tag: &str, value: &Value) -> StevedoreResult<Vec<u16>> {
    match value {
        Value::Number(_) => Ok(vec![port(tag, value)?]),
        Value::Sequence(items) => items.iter().map(|item| port(tag, item)).collect(),
        _ => Err(StevedoreError::malformed(
            tag,
            "expected a port number or a list of port numbers",
        )),
    }
}

/// A list item that is either a bare source string or a `source: dest` pair
fn source_dest_list(tag: &str, value: &Value) -> StevedoreResult<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for item in sequence(tag, value)? {
        match item {
            Value::String(source) => pairs.push((source.clone(), "/".to_string())),
            Value::Mapping(mapping) => {
                for (source, dest) in mapping {
                    pairs.push((string(tag, source)?, string(tag, dest)?));
                }
            }
            _ => {
                return Err(StevedoreError::malformed(
                    tag,
                    "expected a source string or a source/destination mapping",
                ))
            }
        }
    }
    Ok(pairs)
}

fn named_commands(tag: &str, value: &Value) -> StevedoreResult<Vec<(String, String)>> {
    sequence(tag, value)?
        .iter()
        .map(|item| Ok((field(tag, item, "Name")?, field(tag, item, "Command")?)))
        .collect()
}

fn field(tag: &str, item: &Value, key: &str) -> StevedoreResult<String> {
    optional_field(tag, item, key)?.ok_or_else(|| {
        StevedoreError::malformed(tag, format!("missing required field '{}'", key))
    })
}

fn optional_field(tag: &str, item: &Value, key: &str) -> StevedoreResult<Option<String>> {
    let Value::Mapping(mapping) = item else {
        return Err(StevedoreError::malformed(tag, "expected a mapping entry"));
    };
    for (entry_key, entry_value) in mapping {
        if entry_key.as_str() == Some(key) {
            return scalar(tag, entry_value).map(Some);
        }
    }
    Ok(None)
}
