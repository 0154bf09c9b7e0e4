//! Operand syntax matching.
//!
//! A pattern is a list of alternatives. Each alternative is a sequence of
//! pieces: literal text, or a capture (number, label, or one of a fixed set of
//! words). Matching is anchored at both ends, each capture scans greedily
//! without backtracking, and the first alternative that consumes the whole
//! text wins.

/// Character class used by number and label syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharClass {
    /// ASCII letters.
    Alphabetic,
    /// ASCII letters and digits.
    Alphanumeric,
    /// ASCII letters, digits and `_`.
    Word,
    /// `0`-`9`.
    Digit,
    /// `0`-`9`, `a`-`f`, `A`-`F`.
    HexDigit,
}

impl CharClass {
    /// Returns `true` when `c` belongs to the class.
    #[must_use]
    pub const fn accepts(self, c: char) -> bool {
        match self {
            Self::Alphabetic => c.is_ascii_alphabetic(),
            Self::Alphanumeric => c.is_ascii_alphanumeric(),
            Self::Word => c.is_ascii_alphanumeric() || c == '_',
            Self::Digit => c.is_ascii_digit(),
            Self::HexDigit => c.is_ascii_hexdigit(),
        }
    }
}

/// Shape of label names: one character from `first`, then any number from `rest`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LabelSyntax {
    first: CharClass,
    rest: CharClass,
}

impl LabelSyntax {
    /// Creates a label syntax.
    #[must_use]
    pub const fn new(first: CharClass, rest: CharClass) -> Self {
        Self { first, rest }
    }

    /// Returns `true` when all of `text` is a label name.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        !text.is_empty() && self.scan(text) == text.len()
    }

    /// Byte length of the longest label-shaped prefix of `text`.
    fn scan(&self, text: &str) -> usize {
        let mut chars = text.char_indices();
        match chars.next() {
            Some((_, c)) if self.first.accepts(c) => {}
            _ => return 0,
        }
        chars
            .find(|&(_, c)| !self.rest.accepts(c))
            .map_or(text.len(), |(index, _)| index)
    }
}

impl Default for LabelSyntax {
    fn default() -> Self {
        Self::new(CharClass::Alphabetic, CharClass::Alphanumeric)
    }
}

/// Shape of a numeric literal: optional `-`, a fixed prefix, then digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NumberSyntax {
    signed: bool,
    prefix: String,
    digits: CharClass,
    min_digits: usize,
    max_digits: usize,
}

impl NumberSyntax {
    /// One or more decimal digits.
    #[must_use]
    pub fn decimal() -> Self {
        Self::digits(CharClass::Digit, 1, usize::MAX)
    }

    /// Between `min` and `max` hexadecimal digits after `prefix`.
    #[must_use]
    pub fn hex(prefix: impl Into<String>, min: usize, max: usize) -> Self {
        Self::digits(CharClass::HexDigit, min, max).prefixed(prefix)
    }

    /// Between `min` and `max` characters of `class`.
    #[must_use]
    pub fn digits(class: CharClass, min: usize, max: usize) -> Self {
        Self {
            signed: false,
            prefix: String::new(),
            digits: class,
            min_digits: min,
            max_digits: max,
        }
    }

    /// Requires `prefix` before the digits.
    #[must_use]
    pub fn prefixed(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Accepts an optional leading `-`.
    #[must_use]
    pub const fn signed(mut self) -> Self {
        self.signed = true;
        self
    }

    fn scan(&self, text: &str) -> Option<usize> {
        let mut used = 0;
        if self.signed && text.starts_with('-') {
            used += 1;
        }
        if !text[used..].starts_with(&self.prefix) {
            return None;
        }
        used += self.prefix.len();
        let count = text[used..]
            .chars()
            .take(self.max_digits)
            .take_while(|&c| self.digits.accepts(c))
            .count();
        (count >= self.min_digits).then_some(used + count)
    }
}

/// Captured part of an alternative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Capture {
    /// A numeric literal.
    Number(NumberSyntax),
    /// A label name, in the architecture's label syntax.
    Label,
    /// Exactly one of the listed words; the longest fitting word is taken.
    Choice(Vec<String>),
}

impl Capture {
    fn scan(&self, text: &str, labels: &LabelSyntax) -> Option<usize> {
        match self {
            Self::Number(syntax) => syntax.scan(text),
            Self::Label => Some(labels.scan(text)).filter(|&len| len > 0),
            Self::Choice(words) => words
                .iter()
                .filter(|word| !word.is_empty() && text.starts_with(word.as_str()))
                .map(String::len)
                .max(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Piece {
    Literal(String),
    Capture(Capture),
}

/// One way of writing an operand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Alternative {
    pieces: Vec<Piece>,
}

impl Alternative {
    /// Creates an empty alternative, which only matches empty text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends literal text.
    #[must_use]
    pub fn literal(mut self, text: impl Into<String>) -> Self {
        self.pieces.push(Piece::Literal(text.into()));
        self
    }

    /// Appends a numeric capture.
    #[must_use]
    pub fn number(mut self, syntax: NumberSyntax) -> Self {
        self.pieces.push(Piece::Capture(Capture::Number(syntax)));
        self
    }

    /// Appends a label capture.
    #[must_use]
    pub fn label(mut self) -> Self {
        self.pieces.push(Piece::Capture(Capture::Label));
        self
    }

    /// Appends a capture of one of `words`.
    #[must_use]
    pub fn choice<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let words = words.into_iter().map(Into::into).collect();
        self.pieces.push(Piece::Capture(Capture::Choice(words)));
        self
    }

    fn captures(&self) -> bool {
        self.pieces
            .iter()
            .any(|piece| matches!(piece, Piece::Capture(_)))
    }

    fn matches<'t>(&self, text: &'t str, labels: &LabelSyntax) -> Option<&'t str> {
        let mut pos = 0;
        let mut captured = "";
        for piece in &self.pieces {
            let rest = &text[pos..];
            let used = match piece {
                Piece::Literal(literal) => rest.starts_with(literal.as_str()).then_some(literal.len())?,
                Piece::Capture(capture) => {
                    let used = capture.scan(rest, labels)?;
                    captured = &rest[..used];
                    used
                }
            };
            pos += used;
        }
        (pos == text.len()).then_some(captured)
    }
}

/// Result of a successful pattern match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch<'t> {
    /// Text of the last capture, empty if the alternative has none.
    pub captured: &'t str,
    /// Index of the alternative that matched.
    pub alternative: usize,
}

/// Ordered list of alternatives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct OperandPattern {
    alternatives: Vec<Alternative>,
}

impl OperandPattern {
    /// Creates a pattern that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pattern with a single alternative.
    #[must_use]
    pub fn single(alternative: Alternative) -> Self {
        Self::new().or(alternative)
    }

    /// Pattern matching exactly `word`.
    #[must_use]
    pub fn keyword(word: impl Into<String>) -> Self {
        Self::single(Alternative::new().literal(word))
    }

    /// Appends an alternative, tried after the existing ones.
    #[must_use]
    pub fn or(mut self, alternative: Alternative) -> Self {
        self.alternatives.push(alternative);
        self
    }

    /// Matches the whole of `text`.
    #[must_use]
    pub fn matches<'t>(&self, text: &'t str, labels: &LabelSyntax) -> Option<PatternMatch<'t>> {
        self.alternatives
            .iter()
            .enumerate()
            .find_map(|(alternative, candidate)| {
                candidate.matches(text, labels).map(|captured| PatternMatch {
                    captured,
                    alternative,
                })
            })
    }

    /// Number of alternatives that capture something.
    ///
    /// When more than one captures, the captured text may be a value or a
    /// label and must be re-tested against the label syntax.
    #[must_use]
    pub fn capturing_alternatives(&self) -> usize {
        self.alternatives
            .iter()
            .filter(|alternative| alternative.captures())
            .count()
    }
}
