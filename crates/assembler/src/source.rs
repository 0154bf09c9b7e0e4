//! Source ingestion.
//!
//! Each line loses its trailing comment and is split on whitespace. Blank and
//! comment-only lines produce no tokens and are skipped by the passes, but
//! line numbers always refer to the unfiltered text.

/// A non-blank line of source with its location in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    /// The source text, comment stripped, without trailing newline.
    pub text: String,
    /// 1-indexed line number in the file.
    pub number: usize,
    /// Whitespace-separated fields of `text`.
    pub tokens: Vec<String>,
}

/// Removes everything from the first `marker` on.
///
/// An empty marker disables comments.
#[must_use]
pub fn strip_comment<'s>(line: &'s str, marker: &str) -> &'s str {
    if marker.is_empty() {
        return line;
    }
    line.split_once(marker).map_or(line, |(code, _)| code)
}

/// Splits `source` into its non-blank lines.
#[must_use]
pub fn split_source(source: &str, comment: &str) -> Vec<SourceLine> {
    source
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            let text = strip_comment(line, comment).trim_end();
            let tokens: Vec<String> = text.split_whitespace().map(str::to_string).collect();
            (!tokens.is_empty()).then(|| SourceLine {
                text: text.to_string(),
                number: idx + 1,
                tokens,
            })
        })
        .collect()
}
