use std::borrow::Cow;
use std::error;
use std::fmt;

/// Result type used throughout the split diff worker.
pub type SplitDiffResult<T> = Result<T, SplitDiffError>;

/// Main error type of the split diff worker.
///
/// A [`SplitDiffError`] is either a single error carrying an [`ErrorKind`] and a
/// description (optionally with a dynamic detail), an aggregate of many errors,
/// or an error wrapped with the name of the phase that produced it.
#[derive(Debug, Clone)]
pub struct SplitDiffError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
    Many(Vec<SplitDiffError>),
    WithContext(Cow<'static, str>, Box<SplitDiffError>),
}

/// Categories of failures, grouped by the part of the run that produces them.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Topology & Precondition Errors
    TopologyReadFailed,
    MissingServedFrom,
    InvalidSourceShardCount,
    MissingSourceShardTables,
    MissingShardMaster,

    // Target Selection Errors
    NoWorkerTablet,

    // Remote Call Errors
    RemoteCallFailed,
    RemoteCallTimeout,

    // Replication Barrier Errors
    MissingBlpPosition,
    DuplicateBlpPosition,

    // Schema Errors
    InvalidTableFilter,

    // Diff Errors
    TableScanFailed,
    RowReadFailed,
    IncompatibleRowStreams,
    TableHasDifferences,
    DiffPermitAcquireFailed,
    DiffTaskPanic,

    // Cleanup Errors
    CleanupActionNotFound,
    CleanupFailed,

    // Workflow Errors
    WorkerCancelled,
    InvalidState,

    // Configuration Errors
    ConfigError,

    // Unknown / Uncategorized
    Unknown,
}

impl SplitDiffError {
    /// Creates a [`SplitDiffError`] aggregating multiple errors.
    pub fn many(errors: Vec<SplitDiffError>) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::Many(errors),
        }
    }

    /// Wraps this error with the name of the phase or step that produced it.
    pub fn context(self, context: impl Into<Cow<'static, str>>) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithContext(context.into(), Box::new(self)),
        }
    }

    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For aggregates, returns the kind of the first error or [`ErrorKind::Unknown`] if the
    /// aggregate is empty. Context wrappers are transparent.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
            ErrorRepr::Many(ref errors) => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
            ErrorRepr::WithContext(_, ref inner) => inner.kind(),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error, flattened.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => vec![kind],
            ErrorRepr::Many(ref errors) => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
            ErrorRepr::WithContext(_, ref inner) => inner.kinds(),
        }
    }

    /// Returns the dynamic detail of this error, or of the first aggregated error that has one.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::Many(ref errors) => errors.iter().find_map(|e| e.detail()),
            ErrorRepr::WithContext(_, ref inner) => inner.detail(),
            ErrorRepr::WithDescription(..) => None,
        }
    }

    /// Returns the number of leaf errors contained in this error.
    pub fn len(&self) -> usize {
        match self.repr {
            ErrorRepr::WithDescription(..) | ErrorRepr::WithDescriptionAndDetail(..) => 1,
            ErrorRepr::Many(ref errors) => errors.iter().map(|err| err.len()).sum(),
            ErrorRepr::WithContext(_, ref inner) => inner.len(),
        }
    }

    /// Returns `true` for an aggregate that holds no error at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PartialEq for SplitDiffError {
    fn eq(&self, other: &SplitDiffError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::WithDescription(kind_a, _), ErrorRepr::WithDescription(kind_b, _)) => {
                kind_a == kind_b
            }
            (
                ErrorRepr::WithDescriptionAndDetail(kind_a, _, _),
                ErrorRepr::WithDescriptionAndDetail(kind_b, _, _),
            ) => kind_a == kind_b,
            (ErrorRepr::Many(errors_a), ErrorRepr::Many(errors_b)) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            (ErrorRepr::WithContext(ctx_a, inner_a), ErrorRepr::WithContext(ctx_b, inner_b)) => {
                ctx_a == ctx_b && inner_a == inner_b
            }
            _ => false,
        }
    }
}

impl fmt::Display for SplitDiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
            ErrorRepr::Many(ref errors) => {
                if errors.is_empty() {
                    write!(f, "Multiple errors occurred (empty)")
                } else if errors.len() == 1 {
                    errors[0].fmt(f)
                } else {
                    write!(f, "Multiple errors occurred ({} total):", errors.len())?;
                    for (i, error) in errors.iter().enumerate() {
                        write!(f, "\n  {}: {}", i + 1, error)?;
                    }

                    Ok(())
                }
            }
            ErrorRepr::WithContext(ref context, ref inner) => {
                write!(f, "{context} failed: {inner}")
            }
        }
    }
}

impl error::Error for SplitDiffError {}

impl From<(ErrorKind, &'static str)> for SplitDiffError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for SplitDiffError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl<E> From<Vec<E>> for SplitDiffError
where
    E: Into<SplitDiffError>,
{
    fn from(errors: Vec<E>) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::Many(errors.into_iter().map(Into::into).collect()),
        }
    }
}

impl From<regex::Error> for SplitDiffError {
    fn from(err: regex::Error) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::InvalidTableFilter,
                "Table filter is not a valid regular expression",
                err.to_string(),
            ),
        }
    }
}

impl From<splitdiff_config::shared::ValidationError> for SplitDiffError {
    fn from(err: splitdiff_config::shared::ValidationError) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::ConfigError,
                "Invalid worker configuration",
                err.to_string(),
            ),
        }
    }
}

impl From<tokio::sync::AcquireError> for SplitDiffError {
    fn from(err: tokio::sync::AcquireError) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::DiffPermitAcquireFailed,
                "Failed to acquire a permit to diff a table",
                err.to_string(),
            ),
        }
    }
}

impl From<tokio::task::JoinError> for SplitDiffError {
    fn from(err: tokio::task::JoinError) -> SplitDiffError {
        SplitDiffError {
            repr: ErrorRepr::WithDescriptionAndDetail(
                ErrorKind::DiffTaskPanic,
                "A table diff task did not complete",
                err.to_string(),
            ),
        }
    }
}
