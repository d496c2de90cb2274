//! Line transformations applied by pipeline workers.
//!
//! A [`Transform`] turns one trimmed, non-empty line into its transformed form. Each worker
//! owns a private clone of the configured transform, so implementations may keep mutable
//! scratch state without any synchronization.

mod stemmer;

use std::fmt;

use thiserror::Error;

pub use stemmer::EnglishStemmer;

/// Error returned by a [`Transform`] that cannot handle a line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformError {
    message: String,
}

impl TransformError {
    /// Creates a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A function from a line to its transformed form.
///
/// Implementations should be deterministic and free of side effects visible to other
/// workers. A failing line is passed through unchanged by the worker that hit the failure.
pub trait Transform: Send + 'static {
    /// Transforms a single non-empty, trimmed line.
    fn apply(&mut self, line: &str) -> Result<String, TransformError>;
}

/// Returns every line unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        Ok(line.to_owned())
    }
}

/// Lowercases every line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Lowercase;

impl Transform for Lowercase {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        Ok(line.to_lowercase())
    }
}

/// A [`Transform`] backed by a function, created with [`transform_fn`].
#[derive(Clone)]
pub struct FnTransform<F> {
    f: F,
}

impl<F> fmt::Debug for FnTransform<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTransform").finish_non_exhaustive()
    }
}

impl<F> Transform for FnTransform<F>
where
    F: Fn(&str) -> Result<String, TransformError> + Send + 'static,
{
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        (self.f)(line)
    }
}

/// Wraps a function into a [`Transform`].
pub fn transform_fn<F>(f: F) -> FnTransform<F>
where
    F: Fn(&str) -> Result<String, TransformError> + Clone + Send + 'static,
{
    FnTransform { f }
}

/// The transformations selectable without writing code.
#[derive(Debug, Clone)]
pub enum BuiltinTransform {
    /// English Snowball stemming of every word.
    Stem(EnglishStemmer),
    /// Lines are copied unchanged.
    Identity,
    /// Lines are lowercased.
    Lowercase,
}

impl BuiltinTransform {
    /// Creates the English stemming transform.
    pub fn stem() -> Self {
        Self::Stem(EnglishStemmer::new())
    }
}

impl Transform for BuiltinTransform {
    fn apply(&mut self, line: &str) -> Result<String, TransformError> {
        match self {
            BuiltinTransform::Stem(stemmer) => stemmer.apply(line),
            BuiltinTransform::Identity => Identity.apply(line),
            BuiltinTransform::Lowercase => Lowercase.apply(line),
        }
    }
}
