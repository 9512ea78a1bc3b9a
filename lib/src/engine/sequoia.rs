//! An engine backed by Sequoia.

use std::io::{self, Read, Write};
use std::time::SystemTime;

use anyhow::Context;

use crate::openpgp;
use openpgp::Cert;
use openpgp::KeyHandle;
use openpgp::Packet;
use openpgp::PacketPile;
use openpgp::armor;
use openpgp::crypto;
use openpgp::packet::prelude::*;
use openpgp::parse::Parse;
use openpgp::parse::buffered_reader;
use openpgp::parse::stream::VerificationError;
use openpgp::parse::stream::VerifierBuilder;
use openpgp::parse::stream;
use openpgp::policy::StandardPolicy;
use openpgp::serialize::Serialize;
use openpgp::serialize::stream::Message;
use openpgp::serialize::stream::Signer;
use openpgp::types::SignatureType;

use crate::Result;
use crate::cleartext;
use crate::engine::Engine;
use crate::engine::Tally;
use crate::engine::Verification;
use crate::hash::HashAlgorithm;
use crate::packet;

const TRACE: bool = false;

/// An [`Engine`] using Sequoia.
///
/// Signing keys are used as long as they are alive, not revoked,
/// signing capable, and not password protected.  Signatures are
/// checked against the configured certificates and the signers'
/// certificates under the standard policy.
///
/// Use [`EngineBuilder`](super::EngineBuilder) to create one.
pub struct SequoiaEngine {
    policy: StandardPolicy<'static>,
    time: SystemTime,
    signers: Vec<Cert>,
    certs: Vec<Cert>,
}

impl SequoiaEngine {
    /// Returns a new engine.
    ///
    /// `signers` must contain secret key material.
    pub(crate) fn new(time: SystemTime, signers: Vec<Cert>, certs: Vec<Cert>)
                      -> Self
    {
        let mut all_certs = certs;
        all_certs.extend(signers.iter()
                         .map(|c| c.clone().strip_secret_key_material()));

        SequoiaEngine {
            policy: StandardPolicy::new(),
            time,
            signers,
            certs: all_certs,
        }
    }

    /// Returns the reference time.
    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// Returns the certificates used for verification.
    pub fn certs(&self) -> &[Cert] {
        &self.certs
    }

    /// Returns a signer for every signing certificate.
    fn keypairs(&self) -> Result<Vec<Box<dyn crypto::Signer + Send + Sync>>> {
        tracer!(TRACE, "SequoiaEngine::keypairs");

        if self.signers.is_empty() {
            return Err(anyhow::anyhow!("no signing keys configured"));
        }

        let mut keypairs = Vec::with_capacity(self.signers.len());
        for cert in self.signers.iter() {
            let ka = cert.keys()
                .with_policy(&self.policy, Some(self.time))
                .supported()
                .alive()
                .revoked(false)
                .for_signing()
                .secret()
                .next()
                .ok_or_else(|| anyhow::anyhow!(
                    "{} has no usable signing key with secret key material",
                    cert.fingerprint()))?;
            t!("signing with {}", ka.key().fingerprint());

            let keypair = ka.key().clone().into_keypair()
                .with_context(|| format!(
                    "The secret key {} is password protected",
                    ka.key().fingerprint()))?;
            keypairs.push(
                Box::new(keypair) as Box<dyn crypto::Signer + Send + Sync>);
        }

        Ok(keypairs)
    }

    /// Verifies a cleartext signed message, and returns the helper.
    fn run_verifier<'a>(&self, document: &[u8], certs: &'a [Cert],
                        sink: &mut dyn Write)
        -> Result<Helper<'a>>
    {
        let helper = Helper::new(certs);
        let mut v = VerifierBuilder::from_bytes(document)?
            .with_policy(&self.policy, Some(self.time), helper)?;
        io::copy(&mut v, sink)?;
        Ok(v.into_helper())
    }
}

/// Maps a digest algorithm to Sequoia's representation.
fn openpgp_hash(hash: &HashAlgorithm) -> Result<openpgp::types::HashAlgorithm> {
    use openpgp::types::HashAlgorithm as H;

    let algo = match hash {
        HashAlgorithm::Md5 => H::MD5,
        HashAlgorithm::Sha1 => H::SHA1,
        HashAlgorithm::Sha256 => H::SHA256,
        HashAlgorithm::Sha512 => H::SHA512,
        HashAlgorithm::Other(name) => match name.to_ascii_uppercase().as_str() {
            "SHA224" => H::SHA224,
            "SHA384" => H::SHA384,
            "RIPEMD160" => H::RipeMD,
            _ => return Err(anyhow::anyhow!(
                "unsupported digest algorithm {}", name)),
        },
    };

    if algo.is_supported() {
        Ok(algo)
    } else {
        Err(anyhow::anyhow!("digest algorithm {} is not supported", hash))
    }
}

impl Engine for SequoiaEngine {
    fn verify(&self, document: &[u8]) -> Result<Verification> {
        tracer!(TRACE, "SequoiaEngine::verify");

        if ! cleartext::has_signature_framework(document) {
            t!("no cleartext signature framework");
            return Ok(Verification::NoSignature);
        }

        let helper = self.run_verifier(document, &self.certs, &mut io::sink())
            .context("Verifying the signed message")?;
        t!("{:?}", helper.tally);

        Ok(Verification::from_tally(helper.tally))
    }

    fn extract_message(&self, document: &[u8]) -> Result<Vec<u8>> {
        let mut message = Vec::new();
        // The signatures don't matter, so don't look up any
        // certificates.
        self.run_verifier(document, &[], &mut message)
            .context("Extracting the signed message")?;
        Ok(message)
    }

    fn clearsign(&self, message: &[u8], hash: &HashAlgorithm)
                 -> Result<Vec<u8>>
    {
        let algo = openpgp_hash(hash)?;
        let mut keypairs = self.keypairs()?;
        let first = keypairs.remove(0);

        let mut output = Vec::new();
        let sink = Message::new(&mut output);
        let mut signer = Signer::with_template(
            sink, first, SignatureBuilder::new(SignatureType::Text))?
            .cleartext()
            .hash_algo(algo)?
            .creation_time(self.time);
        for keypair in keypairs {
            signer = signer.add_signer(keypair)?;
        }
        let mut signer = signer.build().context("Failed to create signer")?;

        signer.write_all(message).context("Failed to sign")?;
        signer.finalize().context("Failed to sign")?;

        Ok(output)
    }

    fn dearmor(&self, armor: &[u8]) -> Result<Vec<u8>> {
        let mut reader = armor::Reader::from_buffered_reader(
            buffered_reader::Memory::with_cookie(armor, Default::default()),
            armor::ReaderMode::Tolerant(Some(armor::Kind::Signature)))?;

        let mut packets = Vec::new();
        reader.read_to_end(&mut packets)?;
        Ok(packets)
    }

    fn enarmor(&self, packets: &[u8]) -> Result<Vec<u8>> {
        let mut writer = armor::Writer::new(Vec::new(), armor::Kind::Signature)?;
        writer.write_all(packets)?;
        Ok(writer.finalize()?)
    }

    fn normalize(&self, packets: &[u8]) -> Result<Vec<u8>> {
        tracer!(TRACE, "SequoiaEngine::normalize");

        let framed = packet::split(packets)?;
        let pile = PacketPile::from_bytes(packets)?;

        let parsed: Vec<&Packet> = pile.children().collect();
        if parsed.len() != framed.len() {
            return Err(anyhow::anyhow!(
                "found {} packets, but {} are framed", parsed.len(), framed.len()));
        }

        // Reserialize each signature.  The header encoding may differ
        // (e.g. old format vs. new format), but the bodies must match.
        for (i, (p, f)) in parsed.into_iter().zip(framed.iter()).enumerate() {
            let sig = match p {
                Packet::Signature(sig) => sig,
                p => return Err(anyhow::anyhow!(
                    "packet {} is not a valid signature: {}", i, p.tag())),
            };
            t!("packet {}: {} signature by {:?}",
               i, sig.typ(), sig.get_issuers().first());

            let mut buf = Vec::new();
            Packet::Signature(sig.clone()).serialize(&mut buf)?;
            let header = packet::header(&buf)?;
            if &buf[header.header_len..] != f.body() {
                return Err(anyhow::anyhow!(
                    "signature packet {} does not survive reserialization", i));
            }
        }

        Ok(packets.to_vec())
    }
}

/// Collects verification results.
struct Helper<'a> {
    certs: &'a [Cert],
    tally: Tally,
}

impl<'a> Helper<'a> {
    fn new(certs: &'a [Cert]) -> Self {
        Helper {
            certs,
            tally: Tally::default(),
        }
    }
}

impl stream::VerificationHelper for Helper<'_> {
    fn get_certs(&mut self, _ids: &[KeyHandle]) -> Result<Vec<Cert>> {
        Ok(self.certs.to_vec())
    }

    fn check(&mut self, structure: stream::MessageStructure) -> Result<()> {
        tracer!(TRACE, "Helper::check");

        for layer in structure.into_iter() {
            let stream::MessageLayer::SignatureGroup { results } = layer else {
                continue;
            };

            t!("Signature layer: {} signatures", results.len());
            for result in results {
                match result {
                    Ok(stream::GoodChecksum { ka, .. }) => {
                        self.tally.good += 1;
                        self.tally.signers.push(ka.cert().fingerprint().to_hex());
                    }
                    Err(VerificationError::MissingKey { .. }) => {
                        t!("missing key");
                        self.tally.missing_key += 1;
                    }
                    Err(err) => {
                        t!("bad signature: {}", err);
                        self.tally.bad += 1;
                    }
                }
            }
        }

        // The verdict is up to the caller.
        Ok(())
    }
}
