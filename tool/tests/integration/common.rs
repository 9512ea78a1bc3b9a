use std::fs;
use std::path::Path;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

use pgp_amend::engine::EngineBuilder;
use pgp_amend::engine::Engine;
use pgp_amend::engine::Verification;
use pgp_amend::openpgp;
use openpgp::Cert;
use openpgp::cert::CertBuilder;
use openpgp::serialize::Serialize;

/// A key and where it is stored.
pub struct Key {
    pub cert: Cert,
    /// The transferable secret key.
    pub key_file: PathBuf,
    /// The certificate.
    pub cert_file: PathBuf,
}

/// A scratch directory and the binary to test.
pub struct PgpAmend {
    base: TempDir,
}

impl PgpAmend {
    /// Returns a new test environment in a temporary directory.
    pub fn new() -> Self {
        PgpAmend {
            base: TempDir::new().expect("can create a temporary directory"),
        }
    }

    /// Returns the base directory.
    pub fn base(&self) -> &Path {
        self.base.path()
    }

    /// Generates a key, and stores it under `name`.
    pub fn key_generate(&self, name: &str) -> Key {
        let (cert, _) =
            CertBuilder::general_purpose(Some(format!("<{}@example.org>", name)))
            .generate()
            .expect("can generate a key");

        let key_file = self.base().join(format!("{}.key.pgp", name));
        let mut sink = fs::File::create(&key_file).expect("can create file");
        cert.as_tsk().serialize(&mut sink).expect("can write key");

        let cert_file = self.base().join(format!("{}.cert.pgp", name));
        let mut sink = fs::File::create(&cert_file).expect("can create file");
        cert.serialize(&mut sink).expect("can write certificate");

        Key {
            cert,
            key_file,
            cert_file,
        }
    }

    /// Writes `content` to `name` in the base directory.
    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.base().join(name);
        fs::write(&path, content).expect("can write file");
        path
    }

    /// Returns the names of the files in the base directory.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = fs::read_dir(self.base())
            .expect("can read the base directory")
            .map(|e| e.expect("valid entry").file_name()
                 .to_string_lossy().into_owned())
            .collect();
        files.sort();
        files
    }

    /// Returns a command that runs the binary in isolation.
    ///
    /// The default configuration file lives in the base directory,
    /// and does not exist unless a test creates it.
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("pgp-amend")
            .expect("can find the binary");
        cmd.current_dir(self.base())
            .env_remove("PGP_AMEND_CONFIG")
            .env("XDG_CONFIG_HOME", self.base().join("config"))
            .env("HOME", self.base());
        cmd
    }

    /// Runs the command, and checks the exit status.
    ///
    /// Returns stdout and stderr.
    pub fn run(&self, mut cmd: Command, status: i32) -> (Vec<u8>, String) {
        let output = cmd.output().expect("can run the binary");
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        assert_eq!(output.status.code(), Some(status),
                   "unexpected exit status, stderr:\n{}", stderr);
        (output.stdout, stderr)
    }
}

/// Verifies `document`, and returns the fingerprints of the good
/// signers.
///
/// Panics if a signature does not verify.
pub fn verify(document: &[u8], certs: &[&Cert]) -> Vec<String> {
    let mut builder = EngineBuilder::new();
    for cert in certs {
        builder.add_cert((*cert).clone());
    }
    let engine = builder.build().expect("can build an engine");

    match engine.verify(document).expect("can verify") {
        Verification::Valid(tally) => tally.signers,
        v => panic!("document does not verify: {:?}", v),
    }
}
