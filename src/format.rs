//! Line formatter and continuation aligner
//!
//! Takes the ordered, unindented line sequence produced by the phase
//! sequencer and renders the final RUN block: uniform indentation, comment
//! outdent, continuation markers inserted and column-aligned block-wide, the
//! first line rewritten to carry the `RUN` keyword, and the trailing
//! continuation stripped from the last non-blank line.
//!
//! Every stage is a pure transformation over immutable line records, so each
//! can be tested in isolation.

use unicode_width::UnicodeWidthStr;

use crate::error::{StevedoreError, StevedoreResult};
use crate::line::Line;

/// Column count commands are indented by; comments sit one column left
const INDENT: usize = 5;

/// The statement keyword written over the first line's leading indent
const KEYWORD: &str = "RUN";

/// A line classified by the kind of continuation marker it needs
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    /// Plain content: receives an ` && \` and-then marker
    AndThen(String),
    /// Content that already ends in an explicit `\`: only the final
    /// backslash is re-aligned (stem excludes the backslash)
    Bare(String),
}

/// Render the raw line sequence into the final RUN block text
pub fn render_block(lines: &[Line]) -> StevedoreResult<String> {
    if lines.is_empty() {
        return Err(StevedoreError::EmptyFinalization);
    }

    let slots: Vec<Slot> = lines.iter().map(classify).collect();
    let mut rows = align(&slots);

    // Stripping runs first so a sequence of breaks alone cannot survive as a
    // bare keyword line; it leaves at least one row or errors.
    strip_trailing_continuation(&mut rows)?;

    // First line carries the statement keyword in place of its indent.
    rows[0].replace_range(..KEYWORD.len(), KEYWORD);

    Ok(rows.join("\n"))
}

/// Indent a line and classify which continuation marker it needs
fn classify(line: &Line) -> Slot {
    match line {
        Line::Command(text) => {
            let indented = format!("{}{}", " ".repeat(INDENT), text);
            match indented.strip_suffix('\\') {
                Some(stem) => Slot::Bare(stem.to_string()),
                None => Slot::AndThen(indented),
            }
        }
        // One column left of commands, so comment markers visually outdent.
        Line::Comment(text) => Slot::AndThen(format!("{}`# {}`", " ".repeat(INDENT - 1), text)),
        Line::Break => Slot::Bare(" ".repeat(INDENT)),
    }
}

/// Pad every line so all continuation backslashes land in one column
///
/// Two scans: the and-then markers define a common start column, then any
/// longer explicit-continuation stem pushes the shared backslash column
/// further right. ` && \` contributes four columns between content and
/// backslash.
fn align(slots: &[Slot]) -> Vec<String> {
    let and_then_col = slots
        .iter()
        .filter_map(|s| match s {
            Slot::AndThen(content) => Some(content.width()),
            Slot::Bare(_) => None,
        })
        .max()
        .map(|w| w + 4)
        .unwrap_or(0);

    let bare_col = slots
        .iter()
        .filter_map(|s| match s {
            Slot::Bare(stem) => Some(stem.width()),
            Slot::AndThen(_) => None,
        })
        .max()
        .unwrap_or(0);

    let backslash_col = and_then_col.max(bare_col);

    slots
        .iter()
        .map(|slot| match slot {
            Slot::AndThen(content) => {
                let pad = " ".repeat(backslash_col - 4 - content.width());
                format!("{}{} && \\", content, pad)
            }
            Slot::Bare(stem) => {
                let pad = " ".repeat(backslash_col - stem.width());
                format!("{}{}\\", stem, pad)
            }
        })
        .collect()
}

/// Strip the continuation marker from the final non-blank line
///
/// If stripping leaves the final line blank, the line is deleted and the
/// stripping repeats on the new final line; a command block must not end
/// with a dangling continuation.
fn strip_trailing_continuation(rows: &mut Vec<String>) -> StevedoreResult<()> {
    loop {
        let Some(last) = rows.last() else {
            return Err(StevedoreError::EmptyFinalization);
        };

        let mut stem = last.strip_suffix('\\').unwrap_or(last.as_str()).trim_end();
        stem = stem.strip_suffix("&&").unwrap_or(stem).trim_end();

        if stem.is_empty() {
            rows.pop();
            continue;
        }

        let stripped = stem.to_string();
        let index = rows.len() - 1;
        rows[index] = stripped;
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backslash_column(row: &str) -> Option<usize> {
        row.ends_with('\\').then(|| row.width() - 1)
    }

    // === Continuation Insertion Tests ===

    #[test]
    fn test_plain_lines_receive_and_then_markers() {
        let block = render_block(&[
            Line::command("apt-get update"),
            Line::command("apt-get clean"),
        ])
        .unwrap();

        let rows: Vec<&str> = block.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with(" && \\"));
        assert!(!rows[1].ends_with('\\'), "last line must not continue");
    }

    #[test]
    fn test_explicit_continuation_preserved() {
        let block = render_block(&[
            Line::command("(useradd bob || \\"),
            Line::command(" (usermod bob))"),
        ])
        .unwrap();

        let rows: Vec<&str> = block.lines().collect();
        assert!(rows[0].ends_with('\\'));
        assert!(
            !rows[0].ends_with("&& \\"),
            "explicit continuations must not gain an and-then marker: {}",
            rows[0]
        );
    }

    // === Alignment Tests ===

    #[test]
    fn test_markers_share_one_column() {
        let block = render_block(&[
            Line::command("short"),
            Line::command("a considerably longer command line"),
            Line::Break,
            Line::comment("note"),
            Line::command("tail"),
        ])
        .unwrap();

        let columns: Vec<usize> = block.lines().filter_map(backslash_column).collect();
        assert!(!columns.is_empty());
        assert!(
            columns.windows(2).all(|w| w[0] == w[1]),
            "all continuation markers should align: {:?}\n{}",
            columns,
            block
        );
    }

    #[test]
    fn test_long_bare_stem_pushes_column() {
        let long = format!("{} \\", "x".repeat(90));
        let block = render_block(&[
            Line::command("short"),
            Line::command(long),
            Line::command("tail"),
        ])
        .unwrap();

        let columns: Vec<usize> = block.lines().filter_map(backslash_column).collect();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0], columns[1]);
        assert!(columns[0] >= 90 + INDENT);
    }

    // === Comment Outdent Tests ===

    #[test]
    fn test_comments_outdent_one_column() {
        let block = render_block(&[
            Line::command("apt-get update"),
            Line::comment("Cleaning up"),
            Line::command("apt-get clean"),
        ])
        .unwrap();

        let rows: Vec<&str> = block.lines().collect();
        assert!(rows[1].starts_with("    `# Cleaning up`"));
        assert!(rows[2].starts_with("     apt-get clean"));
    }

    // === Keyword Rewrite Tests ===

    #[test]
    fn test_first_line_carries_keyword() {
        let block = render_block(&[Line::command("apt-get update"), Line::command("true")]).unwrap();
        assert!(block.starts_with("RUN  apt-get update"));
    }

    #[test]
    fn test_first_line_comment_carries_keyword() {
        let block = render_block(&[Line::comment("Start"), Line::command("true")]).unwrap();
        assert!(block.starts_with("RUN `# Start`"));
    }

    // === Trailing Continuation Tests ===

    #[test]
    fn test_trailing_break_removed() {
        let block = render_block(&[Line::command("echo hi"), Line::Break]).unwrap();
        let rows: Vec<&str> = block.lines().collect();
        assert_eq!(rows, vec!["RUN  echo hi"]);
    }

    #[test]
    fn test_trailing_breaks_removed_repeatedly() {
        let block = render_block(&[
            Line::command("echo hi"),
            Line::Break,
            Line::Break,
        ])
        .unwrap();
        assert_eq!(block, "RUN  echo hi");
    }

    #[test]
    fn test_trailing_and_then_of_last_package_line_stripped() {
        // The install block ends its last package line with an explicit
        // `&& \`; once it becomes the final line the whole marker must go.
        let block = render_block(&[
            Line::command("apt-get install -y curl && \\"),
            Line::Break,
        ])
        .unwrap();
        assert_eq!(block, "RUN  apt-get install -y curl");
    }

    #[test]
    fn test_empty_sequence_is_an_error() {
        let err = render_block(&[]).unwrap_err();
        assert!(matches!(err, StevedoreError::EmptyFinalization));
    }

    #[test]
    fn test_only_breaks_is_an_error() {
        let err = render_block(&[Line::Break, Line::Break]).unwrap_err();
        assert!(matches!(err, StevedoreError::EmptyFinalization));
    }

    // === Shape Test ===

    #[test]
    fn test_small_block_renders_exactly() {
        let block = render_block(&[
            Line::command("echo hi"),
            Line::comment("done"),
            Line::command("ls"),
            Line::Break,
        ])
        .unwrap();

        assert_eq!(block, "RUN  echo hi && \\\n    `# done` && \\\n     ls");
    }
}
