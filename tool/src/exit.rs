//! Exit status.
//!
//! The status follows sysexits(3).

use pgp_amend::Error as AmendError;

/// Successful termination.
pub const EX_OK: i32 = 0;
/// The command was used incorrectly.
pub const EX_USAGE: i32 = 64;
/// An input file did not exist or was not readable.
pub const EX_NOINPUT: i32 = 66;
/// An internal software error has been detected.
pub const EX_SOFTWARE: i32 = 70;
/// A (user specified) output file cannot be created.
pub const EX_CANTCREAT: i32 = 73;
/// An error occurred while doing I/O on some file.
pub const EX_IOERR: i32 = 74;
/// Something was found in an unconfigured or misconfigured state.
pub const EX_CONFIG: i32 = 78;

/// Errors raised by the tool.
#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The configuration file could not be read or is invalid.
    #[error("Loading the configuration failed")]
    Config,

    /// The document could not be written to stdout.
    #[error("Writing the document to stdout failed")]
    Stdout,
}

/// Returns the exit status for `err`.
pub fn status(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<Error>() {
        return match e {
            Error::Config => EX_CONFIG,
            Error::Stdout => EX_IOERR,
        };
    }

    match err.downcast_ref::<AmendError>() {
        Some(AmendError::Input { .. }) => EX_NOINPUT,
        Some(AmendError::Replace { .. }) => EX_CANTCREAT,
        _ => EX_SOFTWARE,
    }
}

/// Prints the error and its causes to stderr.
pub fn print_error_chain(err: &anyhow::Error) {
    for (i, e) in pgp_amend::error_chain(err).into_iter().enumerate() {
        if i == 0 {
            weprintln!(initial_indent = "Error: ", "{}", e);
        } else {
            weprintln!(initial_indent = "  because: ", "{}", e);
        }
    }
}
