//! `pgp-amend` adds signatures to cleartext signed documents.

use clap::CommandFactory;
use clap::FromArgMatches;
use clap::error::ErrorKind;

#[macro_use] mod macros;

mod app;
mod cli;
mod commands;
mod common;
mod exit;
mod output;

pub use pgp_amend::Result;

use crate::app::PgpAmend;

fn main() {
    let matches = match cli::Cli::command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => {
            let status = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion =>
                    exit::EX_OK,
                _ => exit::EX_USAGE,
            };
            let _ = e.print();
            std::process::exit(status);
        }
    };

    let cli = match cli::Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(exit::EX_USAGE);
        }
    };

    let result = PgpAmend::new(&cli, &matches)
        .and_then(|app| commands::amend::dispatch(&app, &cli));

    if let Err(err) = result {
        exit::print_error_chain(&err);
        std::process::exit(exit::status(&err));
    }
}
