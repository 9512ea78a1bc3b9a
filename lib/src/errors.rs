//! Error handling.

use std::borrow::Borrow;
use std::path::PathBuf;

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, anyhow::Error>;

/// Errors used in this crate.
///
/// Functions return [`anyhow::Error`]s.  To find out why an
/// operation failed, use `err.downcast_ref::<Error>()`.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input document could not be read.
    #[error("cannot read {}", path.display())]
    Input {
        /// The document.
        path: PathBuf,
        /// Why it could not be read.
        #[source]
        source: std::io::Error,
    },

    /// A call into the OpenPGP engine failed, or returned something
    /// unexpected.
    #[error("{operation} failed: {diagnostic}")]
    EngineFailure {
        /// The engine operation.
        operation: &'static str,
        /// The engine's diagnostic.
        diagnostic: String,
    },

    /// The cleartext framing or an armor block is malformed.
    #[error("malformed armor: {0}")]
    MalformedArmor(String),

    /// The composed document does not verify.
    ///
    /// The composed document is discarded.
    #[error("new file did not verify, keeping the original \
             (expected {expected} good signatures, \
             got {good} good and {bad} bad)")]
    VerificationFailure {
        /// The number of signatures that should have verified.
        expected: usize,
        /// The number of signatures that verified.
        good: usize,
        /// The number of signatures that did not verify.
        bad: usize,
    },

    /// The document could not be replaced.
    ///
    /// The original document is untouched.
    #[error("failed to replace {}", path.display())]
    Replace {
        /// The document.
        path: PathBuf,
        /// Why it could not be replaced.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Returns an `Error::EngineFailure` for `operation`.
    ///
    /// The diagnostic is the engine's error chain on one line.
    pub(crate) fn engine<E>(operation: &'static str, err: E) -> Self
    where E: Borrow<anyhow::Error>
    {
        Error::EngineFailure {
            operation,
            diagnostic: one_line_error_chain(err),
        }
    }

    /// Returns an `Error::MalformedArmor`.
    pub(crate) fn malformed<S: Into<String>>(msg: S) -> Self {
        Error::MalformedArmor(msg.into())
    }
}

/// Returns the error and its causes.
///
/// The same message often cascades through several layers.  These
/// are collapsed.
pub fn error_chain(err: &anyhow::Error) -> Vec<String> {
    let mut errs = std::iter::once(err.to_string())
        .chain(err.chain().map(|source| source.to_string()))
        .collect::<Vec<String>>();
    errs.dedup();
    errs
}

/// Returns the error chain as a single line.
pub fn one_line_error_chain<E>(err: E) -> String
where E: Borrow<anyhow::Error>,
{
    let chain = error_chain(err.borrow());
    match chain.split_first() {
        None => unreachable!("the chain includes the error itself"),
        Some((first, [])) => first.clone(),
        Some((first, causes)) =>
            format!("{}: {}", first, causes.join(", because ")),
    }
}
