//! Amends a document.

use pgp_amend::amend::Amender;

use crate::Result;
use crate::app::PgpAmend;
use crate::cli::Cli;
use crate::common::file;

pub fn dispatch(app: &PgpAmend, cli: &Cli) -> Result<()> {
    make_qprintln!(app.quiet());

    let engine = app.engine()?;
    let stream = crate::output::amend::Stream::new(app, &cli.file);

    let mut amender = Amender::new(&*engine);
    amender
        .tool_name(env!("CARGO_BIN_NAME"))
        .tool_version(env!("CARGO_PKG_VERSION"))
        .default_hash(app.hash().clone());

    let amended = amender.amend_file(&cli.file, cli.replace, stream)?;

    if cli.replace {
        qprintln!("Replaced {}.", cli.file.display());
    } else {
        file::write_stdout(amended.as_bytes())?;
    }

    Ok(())
}
