//! The runtime state.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use clap::ArgMatches;

use pgp_amend::config::Config;
use pgp_amend::config::ConfigFile;
use pgp_amend::engine::Engine;
use pgp_amend::engine::EngineBuilder;
use pgp_amend::hash::HashAlgorithm;

use crate::Result;
use crate::cli::Cli;
use crate::exit;

/// The configuration, with the command line applied.
pub struct PgpAmend {
    config: Config,
    signer_files: Vec<PathBuf>,
    keyrings: Vec<PathBuf>,
    hash: HashAlgorithm,
    timeout: Option<Duration>,
}

impl PgpAmend {
    /// Loads the configuration file, and merges in the command line.
    ///
    /// `matches` must be the matches `cli` was created from.
    pub fn new(cli: &Cli, matches: &ArgMatches) -> Result<Self> {
        let config_file = match &cli.config {
            Some(path) => ConfigFile::parse_file(path),
            None => ConfigFile::parse_default(),
        }.context(exit::Error::Config)?;

        let mut config = config_file.into_config();
        config.init_verbose(cli.verbose, matches.value_source("verbose"));
        config.init_quiet(cli.quiet, matches.value_source("quiet"));

        let signer_files = config.resolve_sign_signer_files(
            &cli.signer_files, matches.value_source("signer_files"))
            .to_vec();
        let keyrings = config.resolve_verify_keyrings(
            &cli.keyrings, matches.value_source("keyrings"))
            .to_vec();
        let hash = config.resolve_sign_hash(
            &cli.hash, matches.value_source("hash"));
        let timeout = config.resolve_engine_timeout(
            cli.timeout, matches.value_source("timeout"));

        Ok(PgpAmend {
            config,
            signer_files,
            keyrings,
            hash,
            timeout,
        })
    }

    /// Be verbose.
    pub fn verbose(&self) -> bool {
        self.config.verbose()
    }

    /// Be quiet.
    pub fn quiet(&self) -> bool {
        self.config.quiet()
    }

    /// Returns the digest algorithm for unsigned documents.
    pub fn hash(&self) -> &HashAlgorithm {
        &self.hash
    }

    /// Returns the configured engine.
    pub fn engine(&self) -> Result<Box<dyn Engine>> {
        if self.signer_files.is_empty() {
            return Err(anyhow::anyhow!(
                "No signing keys given, use --signer-file or set {} \
                 in the configuration file",
                Config::sign_signer_files_config_key()));
        }

        EngineBuilder::new()
            .signer_files(&self.signer_files)
            .keyring_files(&self.keyrings)
            .timeout(self.timeout)
            .build()
    }
}
