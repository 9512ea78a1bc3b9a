//! A deterministic engine for testing the pipeline without
//! cryptography.
//!
//! A "signature" packet is a new-format signature packet whose body
//! is `signer:hash:digest`, where digest is the FNV-1a hash of the
//! signed text.  Armor is hex.  Verification recomputes the digest,
//! and trusts the signers named in `trusted`.

use std::sync::Mutex;
use std::time::Duration;

use crate::Result;
use crate::armor;
use crate::cleartext;
use crate::engine::Engine;
use crate::engine::Tally;
use crate::engine::Verification;
use crate::hash::HashAlgorithm;
use crate::packet;

pub(crate) struct Fake {
    /// Who signs.
    pub signer: String,
    /// Whose signatures verify.
    pub trusted: Vec<String>,
    /// Drop the last byte when dearmoring.
    pub truncate_dearmor: bool,
    /// Corrupt the last signature when enarmoring.
    pub tamper_enarmor: bool,
    /// Make `normalize` alter its input.
    pub corrupt_normalize: bool,
    /// Make this operation fail.
    pub fail: Option<&'static str>,
    /// Sleep this long in every call.
    pub delay: Option<Duration>,
    /// The operations called, in order.
    pub calls: Mutex<Vec<&'static str>>,
}

impl Fake {
    /// Returns an engine signing as `signer`, and trusting only
    /// `signer`.
    pub fn new(signer: &str) -> Self {
        Fake {
            signer: signer.into(),
            trusted: vec![ signer.into() ],
            truncate_dearmor: false,
            tamper_enarmor: false,
            corrupt_normalize: false,
            fail: None,
            delay: None,
            calls: Default::default(),
        }
    }

    /// Also trusts `signer`.
    pub fn trusting(mut self, signer: &str) -> Self {
        self.trusted.push(signer.into());
        self
    }

    /// Returns the operations called so far.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().expect("not poisoned").clone()
    }

    fn enter(&self, operation: &'static str) -> Result<()> {
        self.calls.lock().expect("not poisoned").push(operation);
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.fail == Some(operation) {
            return Err(anyhow::anyhow!("injected {} failure", operation));
        }
        Ok(())
    }
}

fn fnv1a(data: &[u8]) -> u64 {
    data.iter().fold(0xcbf29ce484222325, |h, &b| {
        (h ^ b as u64).wrapping_mul(0x100000001b3)
    })
}

/// Returns the text covered by a signature: line endings normalized,
/// and without the final line break.
fn signed_text(text: &[u8]) -> Vec<u8> {
    let mut t = String::from_utf8_lossy(text).replace("\r\n", "\n");
    if t.ends_with('\n') {
        t.pop();
    }
    t.into_bytes()
}

fn dash_escape(message: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    for line in message.split_inclusive(|&b| b == b'\n') {
        if line.starts_with(b"-") {
            body.extend_from_slice(b"- ");
        }
        body.extend_from_slice(line);
    }
    if ! body.ends_with(b"\n") {
        body.push(b'\n');
    }
    body
}

fn dash_unescape(body: &[u8]) -> Vec<u8> {
    let mut message = Vec::new();
    for line in body.split_inclusive(|&b| b == b'\n') {
        message.extend_from_slice(line.strip_prefix(b"- ").unwrap_or(line));
    }
    message
}

fn sign_packet(signer: &str, hash: &HashAlgorithm, text: &[u8]) -> Vec<u8> {
    let body = format!("{}:{}:{:016x}", signer, hash, fnv1a(&signed_text(text)));
    let mut p = vec![0xc2, body.len() as u8];
    p.extend_from_slice(body.as_bytes());
    p
}

fn hex_decode(armor: &[u8]) -> Result<Vec<u8>> {
    let parts = armor::split(armor)?;
    let hex: Vec<u8> = armor[parts.payload].iter()
        .filter(|b| b.is_ascii_hexdigit())
        .cloned()
        .collect();
    hex.chunks(2)
        .map(|pair| {
            u8::from_str_radix(&String::from_utf8_lossy(pair), 16)
                .map_err(Into::into)
        })
        .collect()
}

fn hex_armor(packets: &[u8]) -> Vec<u8> {
    let hex: String = packets.iter().map(|b| format!("{:02x}", b)).collect();
    let mut armor = String::from("-----BEGIN PGP SIGNATURE-----\n\n");
    for chunk in hex.as_bytes().chunks(64) {
        armor.push_str(&String::from_utf8_lossy(chunk));
        armor.push('\n');
    }
    armor.push_str("-----END PGP SIGNATURE-----\n");
    armor.into_bytes()
}

impl Engine for Fake {
    fn verify(&self, document: &[u8]) -> Result<Verification> {
        self.enter("verify")?;
        if ! cleartext::has_signature_framework(document) {
            return Ok(Verification::NoSignature);
        }

        let doc = cleartext::ClearsignDocument::parse(document.to_vec())?;
        let text = dash_unescape(doc.message_body());
        let digest = format!("{:016x}", fnv1a(&signed_text(&text)));

        let mut tally = Tally::default();
        for p in packet::split(&hex_decode(doc.signature_armor())?)? {
            let body = String::from_utf8_lossy(p.body()).into_owned();
            let fields: Vec<&str> = body.split(':').collect();
            match fields[..] {
                [signer, _hash, d] if d == digest => {
                    if self.trusted.iter().any(|t| t == signer) {
                        tally.good += 1;
                        tally.signers.push(signer.into());
                    } else {
                        tally.missing_key += 1;
                    }
                }
                _ => tally.bad += 1,
            }
        }

        Ok(Verification::from_tally(tally))
    }

    fn extract_message(&self, document: &[u8]) -> Result<Vec<u8>> {
        self.enter("extract message")?;
        let layout = cleartext::split(document)?;
        Ok(dash_unescape(&document[layout.body]))
    }

    fn clearsign(&self, message: &[u8], hash: &HashAlgorithm)
                 -> Result<Vec<u8>>
    {
        self.enter("clearsign")?;
        let mut doc = format!("-----BEGIN PGP SIGNED MESSAGE-----\n\
                               Hash: {}\n\n", hash).into_bytes();
        doc.extend(dash_escape(message));
        doc.extend(hex_armor(&sign_packet(&self.signer, hash, message)));
        Ok(doc)
    }

    fn dearmor(&self, armor: &[u8]) -> Result<Vec<u8>> {
        self.enter("dearmor")?;
        let mut packets = hex_decode(armor)?;
        if self.truncate_dearmor {
            packets.pop();
        }
        Ok(packets)
    }

    fn enarmor(&self, packets: &[u8]) -> Result<Vec<u8>> {
        self.enter("enarmor")?;
        let mut packets = packets.to_vec();
        if self.tamper_enarmor {
            if let Some(last) = packets.last_mut() {
                *last = if *last == b'0' { b'1' } else { b'0' };
            }
        }
        Ok(hex_armor(&packets))
    }

    fn normalize(&self, packets: &[u8]) -> Result<Vec<u8>> {
        self.enter("normalize")?;
        packet::split(packets)?;
        let mut packets = packets.to_vec();
        if self.corrupt_normalize {
            packets.push(0);
        }
        Ok(packets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let fake = Fake::new("alice");
        let doc = fake.clearsign(b"-dash\nhello", &HashAlgorithm::Sha1).unwrap();
        let parsed = cleartext::ClearsignDocument::parse(doc.clone()).unwrap();
        assert_eq!(parsed.message_body(), b"- -dash\nhello\n");
        assert_eq!(parsed.hash_algorithm(), &HashAlgorithm::Sha1);
        assert_eq!(fake.extract_message(&doc).unwrap(), b"-dash\nhello\n");

        match fake.verify(&doc).unwrap() {
            Verification::Valid(t) => assert_eq!(t.signers, vec!["alice"]),
            v => panic!("{:?}", v),
        }
        assert!(matches!(Fake::new("bob").verify(&doc).unwrap(),
                         Verification::Invalid(Tally { missing_key: 1, .. })));
    }
}
