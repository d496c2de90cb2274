//! Error types and result definitions for pipeline operations.
//!
//! A [`StemError`] is either a single classified failure, carrying a static description,
//! optional dynamic detail, an optional source error and the callsite where it was raised,
//! or an aggregate of many errors collected from several units of the pipeline.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use crate::transform::TransformError;

/// Convenient result type for pipeline operations using [`StemError`] as the error type.
pub type StemResult<T> = Result<T, StemError>;

/// Detailed payload stored for single [`StemError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

/// Main error type for pipeline operations.
#[derive(Debug, Clone)]
pub struct StemError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload.
    Single(ErrorPayload),
    /// Multiple aggregated errors, typically one per failed unit of the pipeline.
    Many {
        errors: Vec<StemError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors that can occur while running a pipeline.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Input & Output Errors
    InputOpenFailed,
    InputReadFailed,
    OutputOpenFailed,
    OutputWriteFailed,
    IoError,

    // Transformation Errors
    TransformFailed,

    // Coordination Errors
    Interrupted,
    ChannelClosed,
    WorkerJoinTimeout,
    ThreadSpawnFailed,
    InvalidState,

    // Panics
    SourcePanic,
    WorkerPanic,
    SinkPanic,

    // Configuration Errors
    ConfigError,

    // Unknown / Uncategorized
    Unknown,

    // Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    FailPoint,
}

impl StemError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => {
                errors.iter().flat_map(|err| err.kinds()).collect()
            }
        }
    }

    /// Returns `true` if this error, or any aggregated error, has the given kind.
    pub fn contains_kind(&self, kind: ErrorKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// Returns the detailed error information if available.
    ///
    /// For multiple errors, returns the detail of the first error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as the source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        StemError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
            }),
        }
    }
}

impl PartialEq for StemError {
    fn eq(&self, other: &StemError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => errors_a == errors_b,
            _ => false,
        }
    }
}

impl fmt::Display for StemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                write!(f, "[{:?}] {}", payload.kind, payload.description)?;

                if let Some(detail) = payload.detail.as_deref() {
                    for (index, line) in detail.lines().enumerate() {
                        if index == 0 {
                            write!(f, ": {line}")?;
                        } else {
                            write!(f, "\n  {line}")?;
                        }
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, .. } => {
                let count = errors.len();
                write!(
                    f,
                    "{} error{} occurred",
                    count,
                    if count == 1 { "" } else { "s" }
                )?;

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    if let Some(first_line) = lines.next() {
                        write!(f, "\n  {}. {}", index + 1, first_line)?;
                    }
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for StemError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`StemError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for StemError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> StemError {
        StemError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`StemError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for StemError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> StemError {
        StemError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates a vector of errors.
///
/// A vector holding exactly one error yields that error unchanged.
impl<E> From<Vec<E>> for StemError
where
    E: Into<StemError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> StemError {
        let location = Location::caller();
        let mut errors: Vec<StemError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        StemError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`std::io::Error`] to [`StemError`] with [`ErrorKind::IoError`].
impl From<std::io::Error> for StemError {
    #[track_caller]
    fn from(err: std::io::Error) -> StemError {
        let detail = err.to_string();
        StemError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`TransformError`] to [`StemError`] with [`ErrorKind::TransformFailed`].
impl From<TransformError> for StemError {
    #[track_caller]
    fn from(err: TransformError) -> StemError {
        let detail = err.to_string();
        StemError::from_components(
            ErrorKind::TransformFailed,
            Cow::Borrowed("Line transformation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
