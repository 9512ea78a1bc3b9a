//! Digest algorithms named in cleartext signature headers.
//!
//! A cleartext signed message announces the digest algorithm in a
//! `Hash:` armor header.  The header may be missing, in which case
//! MD5 is assumed, and it may name an algorithm we don't know about.
//! Neither is fatal: the amendment reuses whatever the document
//! declares.

use std::fmt;
use std::str::FromStr;

use crate::armor::lines;
use crate::armor::trim_end;

/// A digest algorithm as named in a `Hash:` header.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub enum HashAlgorithm {
    /// MD5.
    ///
    /// This is the algorithm assumed when a document doesn't declare
    /// one.
    Md5,
    /// SHA-1.
    Sha1,
    /// SHA-256.
    #[default]
    Sha256,
    /// SHA-512.
    Sha512,
    /// Some other algorithm, as written in the header.
    Other(String),
}

const HASH_MAP: &[(&str, HashAlgorithm)] = &[
    // This must be sorted so that it can be used with
    // [`slice::binary_search`].
    ("MD5", HashAlgorithm::Md5),
    ("SHA1", HashAlgorithm::Sha1),
    ("SHA256", HashAlgorithm::Sha256),
    ("SHA512", HashAlgorithm::Sha512),
];

impl HashAlgorithm {
    /// Returns an iterator over the well-known algorithms.
    pub fn variants() -> impl Iterator<Item = Self> {
        HASH_MAP.iter().map(|(_, v)| v.clone())
    }

    /// Returns whether this is one of MD5, SHA1, SHA256, or SHA512.
    pub fn is_known(&self) -> bool {
        ! matches!(self, HashAlgorithm::Other(_))
    }

    /// Maps a name as written in a `Hash:` header.
    ///
    /// Unlike [`FromStr`], this never fails: any name that is not
    /// well-known is kept as [`HashAlgorithm::Other`].
    pub fn from_declared(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        match HASH_MAP.binary_search_by(|&(probe, _)| probe.cmp(&upper)) {
            Ok(i) => HASH_MAP[i].1.clone(),
            Err(_) => HashAlgorithm::Other(name.to_string()),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let HashAlgorithm::Other(name) = self {
            return f.write_str(name);
        }

        for (as_str, variant) in HASH_MAP.iter() {
            if variant == self {
                return f.write_str(as_str);
            }
        }
        unreachable!("HASH_MAP is inconsistent");
    }
}

impl fmt::Debug for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl FromStr for HashAlgorithm {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug_assert!(
            HASH_MAP.windows(2).all(|window| window[0].0 < window[1].0),
            "HASH_MAP not sorted");

        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow::anyhow!("empty digest algorithm name"));
        }
        if ! s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(anyhow::anyhow!(
                "{:?} is not a valid digest algorithm name", s));
        }

        Ok(HashAlgorithm::from_declared(s))
    }
}

/// The digest algorithm declared by a cleartext signed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashHeader {
    /// The algorithm to use.
    ///
    /// If several algorithms are declared, this is the first one.
    /// If none is declared, this is MD5.
    pub algorithm: HashAlgorithm,

    /// The algorithms named in `Hash:` headers, in order.
    pub declared: Vec<String>,
}

impl HashHeader {
    /// Returns whether the algorithm was assumed rather than read
    /// from the document.
    pub fn defaulted(&self) -> bool {
        self.declared.is_empty()
    }

    /// Returns whether more than one algorithm was declared.
    pub fn ambiguous(&self) -> bool {
        self.declared.len() > 1
    }
}

/// Extracts the digest algorithm from a block of armor headers.
///
/// `headers` are the lines between the signed-message marker and the
/// blank line.  A `Hash:` header may list several algorithms
/// separated by commas, and may be repeated.
pub fn from_headers(headers: &[u8]) -> HashHeader {
    let mut declared = Vec::new();

    for line in lines(headers) {
        let line = trim_end(&headers[line.start..line.end]);
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            continue;
        };
        let (key, value) = (&line[..colon], &line[colon + 1..]);
        if ! key.eq_ignore_ascii_case(b"Hash") {
            continue;
        }

        let value = String::from_utf8_lossy(value);
        for name in value.split(',') {
            let name = name.trim();
            if ! name.is_empty() {
                declared.push(name.to_string());
            }
        }
    }

    let algorithm = declared.first()
        .map(|name| HashAlgorithm::from_declared(name))
        .unwrap_or(HashAlgorithm::Md5);

    HashHeader {
        algorithm,
        declared,
    }
}
