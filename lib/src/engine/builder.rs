use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;

use anyhow::Context;

use crate::openpgp;
use openpgp::Cert;
use openpgp::cert::CertParser;
use openpgp::parse::Parse;

use crate::Error;
use crate::Result;
use crate::engine::Deadline;
use crate::engine::Engine;
use crate::engine::SequoiaEngine;

const TRACE: bool = false;

/// A builder to configure a [`SequoiaEngine`].
///
/// # Examples
///
/// ```rust,no_run
/// use std::time::Duration;
/// use pgp_amend::engine::EngineBuilder;
///
/// # fn main() -> anyhow::Result<()> {
/// let engine = EngineBuilder::new()
///     .signer_file("alice.pgp")
///     .keyring_file("friends.pgp")
///     .timeout(Some(Duration::from_secs(60)))
///     .build()?;
/// # Ok(()) }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineBuilder {
    signer_files: Vec<PathBuf>,
    keyring_files: Vec<PathBuf>,
    signers: Vec<Cert>,
    certs: Vec<Cert>,
    time: Option<SystemTime>,
    timeout: Option<Duration>,
}

/// Reads all certificates from a file.
fn read_certs(path: &Path) -> Result<Vec<Cert>> {
    let bytes = fs::read(path).map_err(|source| Error::Input {
        path: path.to_path_buf(),
        source,
    })?;

    let certs = CertParser::from_bytes(&bytes)?
        .collect::<Result<Vec<Cert>>>()
        .with_context(|| format!("Reading certificates from {}",
                                 path.display()))?;
    Ok(certs)
}

impl EngineBuilder {
    /// Returns a new `EngineBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file with secret keys to sign with.
    pub fn signer_file<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.signer_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds files with secret keys to sign with.
    pub fn signer_files<I, P>(&mut self, paths: I) -> &mut Self
    where I: IntoIterator<Item = P>,
          P: AsRef<Path>,
    {
        for p in paths {
            self.signer_file(p);
        }
        self
    }

    /// Adds a file with certificates to verify signatures with.
    pub fn keyring_file<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
        self.keyring_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Adds files with certificates to verify signatures with.
    pub fn keyring_files<I, P>(&mut self, paths: I) -> &mut Self
    where I: IntoIterator<Item = P>,
          P: AsRef<Path>,
    {
        for p in paths {
            self.keyring_file(p);
        }
        self
    }

    /// Adds a certificate with secret key material to sign with.
    pub fn add_signer(&mut self, cert: Cert) -> &mut Self {
        self.signers.push(cert);
        self
    }

    /// Adds a certificate to verify signatures with.
    pub fn add_cert(&mut self, cert: Cert) -> &mut Self {
        self.certs.push(cert);
        self
    }

    /// Sets the reference time.
    ///
    /// Defaults to the time [`EngineBuilder::build`] is called.
    pub fn time(&mut self, time: SystemTime) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Sets how long each engine call may take.
    ///
    /// `None` means calls are not bounded.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Instantiates a [`SequoiaEngine`] based on the builder's
    /// configuration.
    ///
    /// This reads the key files.  The timeout is ignored.
    pub fn build_sequoia(&self) -> Result<SequoiaEngine> {
        tracer!(TRACE, "EngineBuilder::build_sequoia");

        let mut signers = self.signers.clone();
        for path in self.signer_files.iter() {
            let certs = read_certs(path)?;
            t!("{}: {} certificates", path.display(), certs.len());
            if let Some(cert) = certs.iter().find(|c| ! c.is_tsk()) {
                return Err(anyhow::anyhow!(
                    "{} contains {}, which has no secret key material",
                    path.display(), cert.fingerprint()));
            }
            signers.extend(certs);
        }

        let mut certs = self.certs.clone();
        for path in self.keyring_files.iter() {
            let keyring = read_certs(path)?;
            t!("{}: {} certificates", path.display(), keyring.len());
            certs.extend(keyring);
        }

        Ok(SequoiaEngine::new(
            self.time.unwrap_or_else(SystemTime::now), signers, certs))
    }

    /// Instantiates an engine based on the builder's configuration.
    ///
    /// If a timeout is set, the [`SequoiaEngine`] is wrapped in a
    /// [`Deadline`].
    pub fn build(&self) -> Result<Box<dyn Engine>> {
        let engine = self.build_sequoia()?;
        Ok(match self.timeout {
            Some(timeout) => Box::new(Deadline::new(engine, timeout)),
            None => Box::new(engine),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use openpgp::cert::CertBuilder;
    use openpgp::serialize::Serialize;

    #[test]
    fn loads_key_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (alice, _) =
            CertBuilder::general_purpose(Some("<alice@example.org>"))
            .generate()?;
        let (bob, _) =
            CertBuilder::general_purpose(Some("<bob@example.org>"))
            .generate()?;

        let key = dir.path().join("alice.pgp");
        alice.as_tsk().serialize(&mut fs::File::create(&key)?)?;
        let keyring = dir.path().join("bob.pgp");
        bob.serialize(&mut fs::File::create(&keyring)?)?;

        let engine = EngineBuilder::new()
            .signer_file(&key)
            .keyring_file(&keyring)
            .build_sequoia()?;

        let fprs: Vec<_> = engine.certs().iter().map(|c| c.fingerprint())
            .collect();
        assert!(fprs.contains(&alice.fingerprint()));
        assert!(fprs.contains(&bob.fingerprint()));
        assert!(engine.certs().iter().all(|c| ! c.is_tsk()));

        // A certificate is not a key.
        let err = EngineBuilder::new()
            .signer_file(&keyring)
            .build_sequoia()
            .err()
            .expect("bob.pgp has no secret keys");
        assert!(err.to_string().contains("no secret key material"));

        Ok(())
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = EngineBuilder::new()
            .signer_file("/nonexistent/key.pgp")
            .build()
            .err()
            .expect("file does not exist");
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::Input { .. })));
    }

    #[test]
    fn garbage_is_not_a_key() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let garbage = dir.path().join("garbage.pgp");
        fs::write(&garbage, b"this is not a key")?;

        let err = EngineBuilder::new()
            .signer_file(&garbage)
            .build()
            .err()
            .expect("garbage is not a key");
        assert!(err.downcast_ref::<Error>().is_none());
        Ok(())
    }
}
