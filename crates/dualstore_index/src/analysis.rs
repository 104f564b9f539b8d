//! Text analysis for full-text fields.
//!
//! Text fields are split on whitespace and punctuation, lower-cased and
//! filtered by length. Phrase queries match when the analyzed query tokens
//! occur consecutively in the analyzed field value.

/// Configuration of the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Minimum token length kept.
    pub min_token_length: usize,
    /// Maximum token length kept.
    pub max_token_length: usize,
    /// Whether tokens are lower-cased.
    pub case_insensitive: bool,
    /// Additional characters treated as separators.
    pub extra_separators: Vec<char>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_token_length: 1,
            max_token_length: 256,
            case_insensitive: true,
            extra_separators: vec![],
        }
    }
}

impl AnalyzerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets minimum token length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        self.min_token_length = len;
        self
    }

    /// Sets case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self) -> Self {
        self.case_insensitive = false;
        self
    }

    /// Adds extra separator characters.
    #[must_use]
    pub fn with_separators(mut self, chars: &[char]) -> Self {
        self.extra_separators.extend_from_slice(chars);
        self
    }
}

/// Tokenizer applied to text fields at index and query time.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    /// Creates an analyzer.
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    fn is_separator(&self, c: char) -> bool {
        !c.is_alphanumeric() || self.config.extra_separators.contains(&c)
    }

    fn keep(&self, token: &str, out: &mut Vec<String>) {
        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return;
        }
        if self.config.case_insensitive {
            out.push(token.to_lowercase());
        } else {
            out.push(token.to_string());
        }
    }

    /// Splits text into normalized tokens, preserving order.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut current = String::new();
        for c in text.chars() {
            if self.is_separator(c) {
                if !current.is_empty() {
                    self.keep(&current, &mut tokens);
                    current.clear();
                }
            } else {
                current.push(c);
            }
        }
        if !current.is_empty() {
            self.keep(&current, &mut tokens);
        }
        tokens
    }

    /// Returns true if the analyzed `phrase` occurs as a consecutive run of
    /// tokens in the analyzed `text`. An empty phrase never matches.
    pub fn phrase_matches(&self, text: &str, phrase: &str) -> bool {
        let needle = self.tokenize(phrase);
        if needle.is_empty() {
            return false;
        }
        let haystack = self.tokenize(text);
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_slice())
    }
}
