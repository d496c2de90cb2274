use std::fmt;

use rust_stemmers::{Algorithm, Stemmer};

use crate::transform::{Transform, TransformError};

/// Reduces every word of a line to its English Snowball stem.
///
/// Words are split on whitespace and lowercased before stemming, and the stems are joined
/// with single spaces, so `"  Beautifully  Running"` becomes `"beauti run"`.
pub struct EnglishStemmer {
    stemmer: Stemmer,
}

impl EnglishStemmer {
    /// Creates a new stemmer.
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }

    /// Stems every word of `line`.
    pub fn stem_line(&self, line: &str) -> String {
        let mut stemmed = String::with_capacity(line.len());

        for word in line.split_whitespace() {
            if !stemmed.is_empty() {
                stemmed.push(' ');
            }

            let lowercase = word.to_lowercase();
            stemmed.push_str(&self.stemmer.stem(&lowercase));
        }

        stemmed
    }
}

impl Default for EnglishStemmer {
    fn default() -> Self {
        Self::new()
    }
}

// Every worker gets its own stemmer instance.
impl Clone for EnglishStemmer {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnglishStemmer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnglishStemmer").finish_non_exhaustive()
    }
}

impl Transform for EnglishStemmer {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        Ok(self.stem_line(line))
    }
}
