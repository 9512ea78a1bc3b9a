//! Amends a signature to a cleartext signed message.
//!
//! Signing a cleartext signed message again normally wraps it in a
//! second cleartext frame.  Instead, [`Amender::amend`] creates a
//! new signature over the same text, and merges it with the existing
//! signatures into a single signature block:
//!
//!   1. Probe whether the document is signed.  If not, it is simply
//!      clearsigned.
//!   2. Recover the signed text and the declared digest algorithm.
//!   3. Clearsign the text using the same digest algorithm.
//!   4. Extract the signature packets from both documents.
//!   5. Concatenate them, existing signatures first, and armor them.
//!   6. Reassemble the document around the original body.
//!   7. Verify the result.  It must carry exactly the existing and
//!      the new signatures, and all must verify.
//!
//! The original body is reused byte for byte.  Nothing is written to
//! disk unless all steps succeed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use pgp_amend::amend::Amender;
//! use pgp_amend::engine::EngineBuilder;
//!
//! # fn main() -> anyhow::Result<()> {
//! let engine = EngineBuilder::new()
//!     .signer_file("bob.pgp")
//!     .keyring_file("alice.pgp")
//!     .build()?;
//!
//! let amended = Amender::new(&*engine)
//!     .amend_file("release-notes.txt".as_ref(), true, ())?;
//! assert_eq!(amended.tally().good, 2);
//! # Ok(()) }
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;

use crate::Error;
use crate::Result;
use crate::armor;
use crate::cleartext::ClearsignDocument;
use crate::cleartext::SIGNATURE;
use crate::cleartext::SIGNED_MESSAGE;
use crate::engine::Engine;
use crate::engine::Tally;
use crate::engine::Verification;
use crate::hash::HashAlgorithm;
use crate::packet;
use crate::packet::SignaturePacket;
use crate::packet::SignatureSet;
use crate::types::PartFileWriter;

const TRACE: bool = false;

/// The trait for collecting output.
pub trait Stream {
    /// Output from [`Amender::amend`] and [`Amender::amend_file`].
    ///
    /// Returning an error aborts the amendment.
    fn output(&mut self, params: &Params, output: Output) -> Result<()>;
}

impl<T> Stream for Box<T>
where
    T: Stream + ?Sized
{
    fn output(&mut self, params: &Params, output: Output) -> Result<()> {
        self.as_mut().output(params, output)
    }
}

/// Collects the output in the specified vector.
impl Stream for &mut Vec<Output> {
    fn output(&mut self, _params: &Params, output: Output) -> Result<()> {
        self.push(output);
        Ok(())
    }
}

/// Discards the output.
impl Stream for () {
    fn output(&mut self, _params: &Params, _output: Output) -> Result<()> {
        Ok(())
    }
}

/// Data structures related to [`Output`].
pub mod output {
    /// Whether the document was already signed.
    #[non_exhaustive]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Probe {
        /// The document is not signed, and will be clearsigned.
        NoSignature,

        /// The document is signed, and a signature will be added.
        HasSignature {
            /// The number of existing signatures.
            signatures: usize,
        },
    }

    /// Something odd that doesn't prevent the amendment.
    #[non_exhaustive]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Warning {
        /// The declared digest algorithm is not one of MD5, SHA1,
        /// SHA256, or SHA512.
        UnsupportedHashAlgorithm(String),

        /// The document does not declare a digest algorithm.  MD5 is
        /// assumed.
        DefaultHashAlgorithm,

        /// The document declares several digest algorithms.  The
        /// first one is used.
        MultipleHashAlgorithms(Vec<String>),

        /// The new signature was made over a differently encoded body.
        ///
        /// The original body is kept; verification decides whether
        /// the new signature covers it.
        BodyDiffers,
    }
}

/// The variants of this enum are the different types of output that
/// [`Amender::amend`] emits.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// The result of probing the document.
    Probed(output::Probe),

    /// A non-fatal problem.
    Warning(output::Warning),

    /// The number of signature packets being merged.
    Merged {
        /// Packets from the document.
        existing: usize,
        /// Packets from the new signature.
        added: usize,
    },

    /// The amended document verified.
    Verified(Tally),
}

/// The amendment parameters.
#[derive(Debug, Clone)]
pub struct Params {
    tool_name: String,
    tool_version: String,
    default_hash: HashAlgorithm,
}

impl Params {
    /// Returns the tool name used in the `Version:` header.
    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    /// Returns the tool version used in the `Version:` header.
    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    /// Returns the digest algorithm used for unsigned documents.
    pub fn default_hash(&self) -> &HashAlgorithm {
        &self.default_hash
    }
}

/// Amends signatures.
pub struct Amender<'e> {
    engine: &'e dyn Engine,
    params: Params,
}

/// A verified, amended document.
#[derive(Debug, Clone)]
pub struct Amended {
    bytes: Vec<u8>,
    tally: Tally,
}

impl Amended {
    /// Returns the document.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the document.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the verification result.
    pub fn tally(&self) -> &Tally {
        &self.tally
    }

    /// Atomically replaces `path` with the document.
    ///
    /// The document is written to a temporary file in the same
    /// directory, which is then renamed.  If anything fails, `path`
    /// is left untouched.
    pub fn replace(&self, path: &Path) -> Result<()> {
        let write = || {
            let mut sink = PartFileWriter::create(path)?;
            sink.write_all(&self.bytes)?;
            sink.commit()
        };

        write().map_err(|source| Error::Replace {
            path: path.to_path_buf(),
            source,
        }.into())
    }
}

impl<'e> Amender<'e> {
    /// Returns an `Amender` using `engine`.
    pub fn new(engine: &'e dyn Engine) -> Self {
        Amender {
            engine,
            params: Params {
                tool_name: env!("CARGO_PKG_NAME").to_string(),
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                default_hash: HashAlgorithm::default(),
            },
        }
    }

    /// Sets the tool name used in the `Version:` header.
    pub fn tool_name<S: Into<String>>(&mut self, name: S) -> &mut Self {
        self.params.tool_name = name.into();
        self
    }

    /// Sets the tool version used in the `Version:` header.
    pub fn tool_version<S: Into<String>>(&mut self, version: S) -> &mut Self {
        self.params.tool_version = version.into();
        self
    }

    /// Sets the digest algorithm used when a document is not yet
    /// signed.
    ///
    /// Signed documents keep their digest algorithm.
    pub fn default_hash(&mut self, hash: HashAlgorithm) -> &mut Self {
        self.params.default_hash = hash;
        self
    }

    /// Returns the parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Reads `path`, and amends it.
    ///
    /// If `replace` is set, the file is atomically replaced by the
    /// amended document.
    pub fn amend_file<S>(&self, path: &Path, replace: bool, stream: S)
                         -> Result<Amended>
    where S: Stream,
    {
        let document = fs::read(path).map_err(|source| Error::Input {
            path: PathBuf::from(path),
            source,
        })?;

        let amended = self.amend(&document, stream)?;
        if replace {
            amended.replace(path)?;
        }
        Ok(amended)
    }

    /// Amends a signature to `document`.
    ///
    /// If the document is not signed, it is clearsigned.
    pub fn amend<S>(&self, document: &[u8], mut stream: S) -> Result<Amended>
    where S: Stream,
    {
        tracer!(TRACE, "Amender::amend");

        let probe = self.engine.verify(document)
            .map_err(|e| Error::engine("verify", e))?;
        t!("probe: {:?}", probe);

        match probe {
            Verification::NoSignature => {
                stream.output(&self.params,
                              Output::Probed(output::Probe::NoSignature))?;
                self.sign(document, &mut stream)
            }
            Verification::Invalid(tally) => {
                Err(Error::EngineFailure {
                    operation: "verify",
                    diagnostic: format!(
                        "the existing signatures do not verify \
                         ({} good, {} bad, {} without a certificate)",
                        tally.good, tally.bad, tally.missing_key),
                }.into())
            }
            Verification::Valid(tally) => {
                stream.output(&self.params,
                              Output::Probed(output::Probe::HasSignature {
                                  signatures: tally.total(),
                              }))?;
                self.merge(document, &mut stream)
            }
        }
    }

    /// Clearsigns an unsigned document.
    fn sign<S: Stream>(&self, document: &[u8], stream: &mut S)
                       -> Result<Amended>
    {
        let signed = self.engine.clearsign(document, &self.params.default_hash)
            .map_err(|e| Error::engine("clearsign", e))?;
        let signed = ClearsignDocument::parse(signed)
            .map_err(|e| Error::engine("clearsign", e))?;

        let added = self.extract_packets(&signed)?.len();
        let tally = self.verify_gate(signed.as_bytes(), added, stream)?;

        Ok(Amended {
            bytes: signed.into_bytes(),
            tally,
        })
    }

    /// Merges a new signature into a signed document.
    fn merge<S: Stream>(&self, document: &[u8], stream: &mut S)
                        -> Result<Amended>
    {
        tracer!(TRACE, "Amender::merge");

        let original = ClearsignDocument::parse(document.to_vec())?;

        let header = original.hash_header();
        let mut warnings = Vec::new();
        if header.defaulted() {
            warnings.push(output::Warning::DefaultHashAlgorithm);
        }
        if header.ambiguous() {
            warnings.push(output::Warning::MultipleHashAlgorithms(
                header.declared.clone()));
        }
        if ! header.algorithm.is_known() {
            warnings.push(output::Warning::UnsupportedHashAlgorithm(
                header.algorithm.to_string()));
        }
        for w in warnings {
            stream.output(&self.params, Output::Warning(w))?;
        }
        let hash = original.hash_algorithm().clone();
        t!("digest algorithm: {}", hash);

        let message = self.engine.extract_message(document)
            .map_err(|e| Error::engine("extract message", e))?;

        let fresh = self.engine.clearsign(&message, &hash)
            .map_err(|e| Error::engine("clearsign", e))?;
        let fresh = ClearsignDocument::parse(fresh)
            .map_err(|e| Error::engine("clearsign", e))?;
        if fresh.message_body() != original.message_body() {
            stream.output(&self.params,
                          Output::Warning(output::Warning::BodyDiffers))?;
        }

        let existing = self.extract_packets(&original)?;
        let added = self.extract_packets(&fresh)?;
        stream.output(&self.params, Output::Merged {
            existing: existing.len(),
            added: added.len(),
        })?;

        let mut signatures = SignatureSet::new();
        signatures.extend(existing);
        signatures.extend(added);
        let expected = signatures.len();

        let armored = self.engine.enarmor(&signatures.to_vec())
            .map_err(|e| Error::engine("enarmor", e))?;
        let parts = armor::split(&armored)
            .map_err(|e| Error::engine("enarmor", e))?;
        if parts.label != SIGNATURE {
            return Err(Error::EngineFailure {
                operation: "enarmor",
                diagnostic: format!("expected a {} block, got {}",
                                    SIGNATURE, parts.label),
            }.into());
        }

        let composed = self.compose(&hash, original.message_body(),
                                    &armored[parts.payload]);
        let tally = self.verify_gate(&composed, expected, stream)?;

        Ok(Amended {
            bytes: composed,
            tally,
        })
    }

    /// Returns the signature packets of a document.
    fn extract_packets(&self, doc: &ClearsignDocument)
                       -> Result<Vec<SignaturePacket>>
    {
        let raw = self.engine.dearmor(doc.signature_armor())
            .map_err(|e| Error::engine("dearmor", e))?;

        // Check the framing first, so that truncation is reported
        // before the engine parses the packets.
        let packets = packet::split(&raw)
            .map_err(|e| Error::engine("normalize", e))?;

        let normalized = self.engine.normalize(&raw)
            .map_err(|e| Error::engine("normalize", e))?;
        if normalized != raw {
            return Err(Error::EngineFailure {
                operation: "normalize",
                diagnostic: "the signature packets changed when \
                             normalized, they are likely corrupt".into(),
            }.into());
        }

        Ok(packets)
    }

    /// Assembles a cleartext signed message.
    fn compose(&self, hash: &HashAlgorithm, body: &[u8], payload: &[u8])
               -> Vec<u8>
    {
        let mut doc = Vec::with_capacity(body.len() + payload.len() + 256);
        doc.extend_from_slice(
            format!("-----BEGIN {}-----\nHash: {}\n\n", SIGNED_MESSAGE, hash)
                .as_bytes());
        doc.extend_from_slice(body);
        doc.extend_from_slice(
            format!("-----BEGIN {}-----\nVersion: {} {}\n\n",
                    SIGNATURE, self.params.tool_name, self.params.tool_version)
                .as_bytes());
        doc.extend_from_slice(payload);
        doc.extend_from_slice(format!("-----END {}-----\n", SIGNATURE).as_bytes());
        doc
    }

    /// Verifies the final document.
    ///
    /// Exactly `expected` signatures must be present, and all of them
    /// must verify.
    fn verify_gate<S: Stream>(&self, document: &[u8], expected: usize,
                              stream: &mut S)
        -> Result<Tally>
    {
        tracer!(TRACE, "Amender::verify_gate");

        let verification = self.engine.verify(document)
            .context(Error::VerificationFailure {
                expected,
                good: 0,
                bad: 0,
            })?;
        t!("{:?}, expected {}", verification, expected);

        match verification {
            Verification::Valid(tally) if tally.good == expected => {
                stream.output(&self.params, Output::Verified(tally.clone()))?;
                Ok(tally)
            }
            v => {
                let tally = v.tally().cloned().unwrap_or_default();
                Err(Error::VerificationFailure {
                    expected,
                    good: tally.good,
                    bad: tally.unverified(),
                }.into())
            }
        }
    }
}
