//! Line primitives for RUN block synthesis
//!
//! A [`Line`] is the atomic unit handed to the phase sequencer and the
//! formatter: a literal shell fragment, a comment, or a break sentinel that
//! forces a visual line break without content. Directive operations pre-split
//! multi-line text into individual `Line` entries; a `Line` never contains an
//! embedded newline.

use unicode_width::UnicodeWidthStr;

/// One raw, unindented line of the RUN block before formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A plain shell fragment. May carry an explicit trailing `\` when the
    /// fragment is one leg of a multi-line shell statement.
    Command(String),
    /// A comment, rendered as a backtick-quoted shell comment and outdented
    /// one column relative to command lines.
    Comment(String),
    /// Continuation-only sentinel: renders as an empty line that still
    /// carries an aligned continuation marker.
    Break,
}

impl Line {
    pub fn command(text: impl Into<String>) -> Self {
        Line::Command(text.into())
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Line::Comment(text.into())
    }
}

/// Escape shell-special characters for use inside a double-quoted `echo`
///
/// Escapes double quotes and the `${`/`$(` expansion openers so the text
/// survives the shell that executes the generated command verbatim.
pub fn escape(text: &str) -> String {
    text.replace('"', "\\\"")
        .replace("${", "\\${")
        .replace("$(", "\\$(")
}

/// Render a command that appends one escaped line of text to a file
pub fn echo_to(text: &str, file: &str) -> String {
    format!("echo \"{}\" >> {}", escape(text), file)
}

/// Render multi-line contents as a group of file-append commands
///
/// Each non-empty input line becomes one `echo ... >> file` command; the
/// ` >> file` tails are column-aligned within the group so the generated
/// block reads as a table.
pub fn append_lines(contents: &str, file: &str) -> Vec<Line> {
    let echoes: Vec<String> = contents
        .trim()
        .lines()
        .map(|line| format!("echo \"{}\"", escape(line.trim())))
        .collect();

    let widest = echoes.iter().map(|e| e.width()).max().unwrap_or(0);

    echoes
        .into_iter()
        .map(|echo| {
            let pad = " ".repeat(widest - echo.width());
            Line::Command(format!("{}{} >> {}", echo, pad, file))
        })
        .collect()
}

/// Rewrite a continuation-joined multi-line block into one logical line
///
/// Collapses every backslash continuation together with its surrounding
/// whitespace into a single space, then trims the result. Used for command
/// text that must land on a single generated line (e.g. a daemon exec line).
pub fn flatten(text: &str) -> String {
    let pieces: Vec<&str> = text.split('\\').map(str::trim).collect();
    pieces.join(" ").trim().to_string()
}
