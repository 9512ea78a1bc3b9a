//! The OpenPGP engine.
//!
//! The amendment pipeline never creates or checks signatures itself.
//! It calls into an [`Engine`], which provides the handful of
//! OpenPGP primitives it needs.  [`SequoiaEngine`] is the production
//! implementation; [`Deadline`] bounds the time any call may take.

use std::sync::Arc;

use crate::Result;
use crate::hash::HashAlgorithm;

mod builder;
pub use builder::EngineBuilder;
mod deadline;
pub use deadline::Deadline;
mod sequoia;
pub use self::sequoia::SequoiaEngine;

#[cfg(test)]
pub(crate) mod fake;

/// Signature counts from a verification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    /// Signatures that verified.
    pub good: usize,

    /// Signatures that did not verify.
    pub bad: usize,

    /// Signatures for which no certificate was available.
    pub missing_key: usize,

    /// The fingerprints of the certificates that made good
    /// signatures, in signature order.
    pub signers: Vec<String>,
}

impl Tally {
    /// Returns the number of signatures.
    pub fn total(&self) -> usize {
        self.good + self.bad + self.missing_key
    }

    /// Returns the number of signatures that did not verify, for
    /// whatever reason.
    pub fn unverified(&self) -> usize {
        self.bad + self.missing_key
    }
}

/// The result of verifying a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    /// The document is signed, and all signatures verify.
    Valid(Tally),

    /// The document is signed, but some signatures don't verify.
    Invalid(Tally),

    /// The document is not signed.
    NoSignature,
}

impl Verification {
    /// Classifies a tally.
    ///
    /// At least one good signature is required for `Valid`.
    pub fn from_tally(tally: Tally) -> Self {
        if tally.good > 0 && tally.unverified() == 0 {
            Verification::Valid(tally)
        } else {
            Verification::Invalid(tally)
        }
    }

    /// Returns the tally, if the document is signed.
    pub fn tally(&self) -> Option<&Tally> {
        match self {
            Verification::Valid(t) | Verification::Invalid(t) => Some(t),
            Verification::NoSignature => None,
        }
    }
}

/// The OpenPGP primitives the amendment pipeline relies on.
///
/// All operations work on in-memory buffers.
pub trait Engine: Send + Sync {
    /// Verifies a cleartext signed message.
    ///
    /// Returns [`Verification::NoSignature`] if `document` is not a
    /// signed message.
    fn verify(&self, document: &[u8]) -> Result<Verification>;

    /// Returns the signed text of a cleartext signed message.
    ///
    /// Whether the signatures verify is irrelevant here.
    fn extract_message(&self, document: &[u8]) -> Result<Vec<u8>>;

    /// Creates a cleartext signed message using the given digest
    /// algorithm.
    fn clearsign(&self, message: &[u8], hash: &HashAlgorithm)
                 -> Result<Vec<u8>>;

    /// Decodes an armor block.
    fn dearmor(&self, armor: &[u8]) -> Result<Vec<u8>>;

    /// Encodes signature packets as a `PGP SIGNATURE` armor block.
    fn enarmor(&self, packets: &[u8]) -> Result<Vec<u8>>;

    /// Parses and reserializes a signature packet stream.
    ///
    /// On well-formed input, this returns the input.
    fn normalize(&self, packets: &[u8]) -> Result<Vec<u8>>;
}

macro_rules! forward {
    ($t:ty) => {
        impl<E: Engine + ?Sized> Engine for $t {
            fn verify(&self, document: &[u8]) -> Result<Verification> {
                (**self).verify(document)
            }

            fn extract_message(&self, document: &[u8]) -> Result<Vec<u8>> {
                (**self).extract_message(document)
            }

            fn clearsign(&self, message: &[u8], hash: &HashAlgorithm)
                         -> Result<Vec<u8>>
            {
                (**self).clearsign(message, hash)
            }

            fn dearmor(&self, armor: &[u8]) -> Result<Vec<u8>> {
                (**self).dearmor(armor)
            }

            fn enarmor(&self, packets: &[u8]) -> Result<Vec<u8>> {
                (**self).enarmor(packets)
            }

            fn normalize(&self, packets: &[u8]) -> Result<Vec<u8>> {
                (**self).normalize(packets)
            }
        }
    };
}

forward!(&E);
forward!(Box<E>);
forward!(Arc<E>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let t = |good, bad, missing_key| Tally {
            good, bad, missing_key, signers: Vec::new(),
        };

        assert!(matches!(Verification::from_tally(t(1, 0, 0)),
                         Verification::Valid(_)));
        assert!(matches!(Verification::from_tally(t(3, 0, 0)),
                         Verification::Valid(_)));
        assert!(matches!(Verification::from_tally(t(0, 0, 0)),
                         Verification::Invalid(_)));
        assert!(matches!(Verification::from_tally(t(1, 1, 0)),
                         Verification::Invalid(_)));
        assert!(matches!(Verification::from_tally(t(1, 0, 1)),
                         Verification::Invalid(_)));

        assert_eq!(t(2, 1, 1).total(), 4);
        assert_eq!(t(2, 1, 1).unverified(), 2);
        assert_eq!(Verification::NoSignature.tally(), None);
    }
}
