//! Command-line parser.

use std::path::PathBuf;

use clap::Parser;

use pgp_amend::config::CONFIG_ENV;
use pgp_amend::config::DEFAULT_ENGINE_TIMEOUT;
use pgp_amend::hash::HashAlgorithm;

/// Adds a signature to a cleartext signed document.
///
/// If FILE is not yet signed, it is clearsigned.  If it already
/// carries signatures, the new signature is merged into the existing
/// signature block, so that the document stays a single cleartext
/// signed message that every signer's signature covers.
///
/// The result is verified before it is released.  All existing
/// signatures must verify, so their certificates must be given using
/// `--keyring` (or `verify.keyrings` in the configuration file).
#[derive(Parser, Debug)]
#[command(
    name = "pgp-amend",
    version,
    about = "Adds a signature to a cleartext signed document",
    after_help = "\
EXIT STATUS:
    0   success
    64  usage error
    66  the input file cannot be read
    70  signing, merging, or verification failed
    73  the input file cannot be replaced
    74  writing to stdout failed
    78  the configuration file is invalid",
)]
pub struct Cli {
    #[arg(
        value_name = "FILE",
        help = "The document to sign",
    )]
    pub file: PathBuf,

    #[arg(
        long,
        help = "Replace FILE instead of writing to stdout",
        long_help = "Replace FILE instead of writing to stdout.  \
                     The file is replaced atomically, and only if \
                     the amended document verifies.",
    )]
    pub replace: bool,

    #[arg(
        long = "signer-file",
        value_name = "KEY_FILE",
        help = "Sign using the secret keys in KEY_FILE",
        long_help = "Sign using the secret keys in KEY_FILE.  \
                     May be given multiple times.  Replaces \
                     `sign.signer-files` from the configuration file.",
    )]
    pub signer_files: Vec<PathBuf>,

    #[arg(
        long = "keyring",
        value_name = "CERT_FILE",
        help = "Verify signatures using the certificates in CERT_FILE",
        long_help = "Verify signatures using the certificates in \
                     CERT_FILE.  May be given multiple times.  Replaces \
                     `verify.keyrings` from the configuration file.",
    )]
    pub keyrings: Vec<PathBuf>,

    #[arg(
        long,
        value_name = "ALGO",
        default_value_t = HashAlgorithm::default(),
        help = "Use ALGO when signing a document that is not yet signed",
        long_help = "Use ALGO when signing a document that is not yet \
                     signed.  Signed documents keep the digest algorithm \
                     they declare.",
    )]
    pub hash: HashAlgorithm,

    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = DEFAULT_ENGINE_TIMEOUT,
        help = "Fail an OpenPGP operation after SECONDS, 0 disables",
    )]
    pub timeout: u64,

    #[arg(
        long,
        value_name = "CONFIG_FILE",
        env = CONFIG_ENV,
        help = "Read the configuration from CONFIG_FILE",
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        conflicts_with = "quiet",
        help = "Be more verbose",
    )]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        help = "Be more quiet",
    )]
    pub quiet: bool,
}
