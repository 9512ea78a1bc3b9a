//! Common file handling support.

use std::io::{self, Write};

use anyhow::Context;

use crate::Result;
use crate::exit;

/// Writes the document to stdout.
///
/// The input file is not touched.
pub fn write_stdout(document: &[u8]) -> Result<()> {
    let stdout = io::stdout();
    let mut sink = stdout.lock();
    sink.write_all(document)
        .and_then(|()| sink.flush())
        .context(exit::Error::Stdout)
}
