//! Cleartext signed messages.
//!
//! A cleartext signed message looks like this:
//!
//! ```text
//! -----BEGIN PGP SIGNED MESSAGE-----
//! Hash: SHA256
//!
//! The message, dash-escaped.
//! -----BEGIN PGP SIGNATURE-----
//!
//! wnUEARYKAB0WIQ...
//! -----END PGP SIGNATURE-----
//! ```
//!
//! [`split`] locates the parts.  The body is returned exactly as it
//! appears in the document, dash escapes and line endings included:
//! it is never re-encoded, because the signatures cover it.

use std::ops::Range;

use crate::Error;
use crate::Result;
use crate::armor;
use crate::armor::is_blank;
use crate::armor::lines;
use crate::armor::marker;
use crate::hash;
use crate::hash::HashAlgorithm;
use crate::hash::HashHeader;

const TRACE: bool = false;

/// The label of the signed-message marker.
pub const SIGNED_MESSAGE: &str = "PGP SIGNED MESSAGE";

/// The label of the signature armor.
pub const SIGNATURE: &str = "PGP SIGNATURE";

/// The layout of a cleartext signed message.
///
/// All ranges are byte offsets into the scanned buffer.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleartext {
    /// The signed-message marker line, including its terminator.
    pub begin: Range<usize>,

    /// The armor headers, i.e. the lines between the signed-message
    /// marker and the blank line.
    pub headers: Range<usize>,

    /// The message body.
    ///
    /// This starts after the blank line that ends the headers, and
    /// includes the line break preceding the signature marker.
    pub body: Range<usize>,

    /// The signature armor, from the signature marker through the
    /// armor tail line and its terminator.
    pub signature: Range<usize>,

    /// The part of the signature armor between the marker lines.
    pub signature_region: Range<usize>,
}

/// Returns whether `line` is the marker line for `label`.
fn is_marker(line: &[u8], kind: &str, label: &str) -> bool {
    marker(line, kind) == Some(label.as_bytes())
}

/// Returns whether the document contains the cleartext signature
/// framework.
///
/// That is a signed-message marker, followed by a signature marker
/// and a signature tail line, each at the start of a line.  A text
/// that merely mentions the signed-message marker is not signed.
pub fn has_signature_framework(doc: &[u8]) -> bool {
    const FRAMEWORK: &[(&str, &str)] = &[
        ("BEGIN", SIGNED_MESSAGE),
        ("BEGIN", SIGNATURE),
        ("END", SIGNATURE),
    ];

    let mut next = 0;
    for l in lines(doc) {
        let Some((kind, label)) = FRAMEWORK.get(next) else {
            break;
        };
        if is_marker(&doc[l.start..l.end], kind, label) {
            next += 1;
        }
    }
    next == FRAMEWORK.len()
}

/// Locates the parts of a cleartext signed message.
///
/// Blank lines before the signed-message marker and after the
/// signature are tolerated.  Anything else around the message, a
/// missing blank line after the headers, an undashed signed-message
/// marker in the body, and missing markers are errors.
pub fn split(doc: &[u8]) -> Result<Cleartext> {
    tracer!(TRACE, "cleartext::split");

    #[derive(Debug)]
    enum State {
        Before,
        Headers,
        Body,
        Signature,
        After,
    }

    let mut state = State::Before;
    let mut begin = 0..0;
    let mut headers = 0..0;
    let mut body = 0..0;
    let mut signature = 0..0;
    let mut signature_region = 0..0;

    for line in lines(doc) {
        let content = &doc[line.start..line.end];

        match state {
            State::Before => {
                if is_blank(content) {
                    continue;
                }
                if ! is_marker(content, "BEGIN", SIGNED_MESSAGE) {
                    return Err(Error::malformed(
                        "unexpected content before the signed-message \
                         marker").into());
                }
                begin = line.start..line.next;
                headers = line.next..line.next;
                state = State::Headers;
            }

            State::Headers => {
                if is_blank(content) {
                    headers.end = line.start;
                    body = line.next..line.next;
                    state = State::Body;
                } else if content.starts_with(b"-----") {
                    return Err(Error::malformed(
                        "missing blank line after the signed-message \
                         headers").into());
                }
            }

            State::Body => {
                if is_marker(content, "BEGIN", SIGNATURE) {
                    t!("signature marker at {}", line.start);
                    body.end = line.start;
                    signature = line.start..line.next;
                    signature_region = line.next..line.next;
                    state = State::Signature;
                } else if is_marker(content, "BEGIN", SIGNED_MESSAGE) {
                    return Err(Error::malformed(
                        "nested signed-message marker in the message body")
                               .into());
                }
            }

            State::Signature => {
                if is_marker(content, "END", SIGNATURE) {
                    signature_region.end = line.start;
                    signature.end = line.next;
                    state = State::After;
                }
            }

            State::After => {
                if ! is_blank(content) {
                    return Err(Error::malformed(
                        "unexpected content after the signature").into());
                }
            }
        }
    }

    match state {
        State::Before =>
            Err(Error::malformed("missing signed-message marker").into()),
        State::Headers =>
            Err(Error::malformed("missing blank line after the signed-message \
                                  headers").into()),
        State::Body =>
            Err(Error::malformed("missing signature marker").into()),
        State::Signature =>
            Err(Error::malformed("missing signature tail line").into()),
        State::After => Ok(Cleartext {
            begin,
            headers,
            body,
            signature,
            signature_region,
        }),
    }
}

/// A parsed cleartext signed message.
///
/// Owns the document's bytes; the accessors return slices of them.
#[derive(Debug, Clone)]
pub struct ClearsignDocument {
    bytes: Vec<u8>,
    layout: Cleartext,
    hash: HashHeader,
}

impl ClearsignDocument {
    /// Parses a cleartext signed message.
    ///
    /// Besides the framing, this checks that the signature is a
    /// well-formed armor block.
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        let layout = split(&bytes)?;
        armor::split(&bytes[layout.signature.clone()])?;
        let hash = hash::from_headers(&bytes[layout.headers.clone()]);

        Ok(ClearsignDocument {
            bytes,
            layout,
            hash,
        })
    }

    /// Returns the layout.
    pub fn layout(&self) -> &Cleartext {
        &self.layout
    }

    /// Returns the digest algorithm.
    pub fn hash_algorithm(&self) -> &HashAlgorithm {
        &self.hash.algorithm
    }

    /// Returns the `Hash:` header information.
    pub fn hash_header(&self) -> &HashHeader {
        &self.hash
    }

    /// Returns the message body, verbatim.
    pub fn message_body(&self) -> &[u8] {
        &self.bytes[self.layout.body.clone()]
    }

    /// Returns the signature armor block.
    pub fn signature_armor(&self) -> &[u8] {
        &self.bytes[self.layout.signature.clone()]
    }

    /// Returns the document.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the document.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
-----BEGIN PGP SIGNED MESSAGE-----
Hash: SHA512

hello
- -----BEGIN PGP SIGNATURE-----
world
-----BEGIN PGP SIGNATURE-----
Comment: a

wnUE
=fFkq
-----END PGP SIGNATURE-----
";

    fn malformed(doc: &str) -> String {
        let err = split(doc.as_bytes()).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::MalformedArmor(msg)) => msg.clone(),
            _ => panic!("expected MalformedArmor, got {}", err),
        }
    }

    #[test]
    fn layout() {
        let c = split(DOC.as_bytes()).unwrap();
        assert_eq!(&DOC[c.begin.clone()],
                   "-----BEGIN PGP SIGNED MESSAGE-----\n");
        assert_eq!(&DOC[c.headers.clone()], "Hash: SHA512\n");
        assert_eq!(&DOC[c.body.clone()],
                   "hello\n- -----BEGIN PGP SIGNATURE-----\nworld\n");
        assert_eq!(&DOC[c.signature.clone()],
                   "-----BEGIN PGP SIGNATURE-----\nComment: a\n\nwnUE\n\
                    =fFkq\n-----END PGP SIGNATURE-----\n");
        assert_eq!(&DOC[c.signature_region.clone()],
                   "Comment: a\n\nwnUE\n=fFkq\n");
    }

    #[test]
    fn empty_body() {
        let doc = "-----BEGIN PGP SIGNED MESSAGE-----\n\n\
                   -----BEGIN PGP SIGNATURE-----\n\nwnUE\n\
                   -----END PGP SIGNATURE-----\n";
        let c = split(doc.as_bytes()).unwrap();
        assert!(c.headers.is_empty());
        assert!(c.body.is_empty());
    }

    #[test]
    fn crlf_body_is_verbatim() {
        let doc = DOC.replace('\n', "\r\n");
        let c = split(doc.as_bytes()).unwrap();
        assert_eq!(&doc[c.body.clone()],
                   "hello\r\n- -----BEGIN PGP SIGNATURE-----\r\nworld\r\n");
    }

    #[test]
    fn framework_detection() {
        assert!(has_signature_framework(DOC.as_bytes()));
        assert!(has_signature_framework(format!("{}junk\n", DOC).as_bytes()));
        assert!(! has_signature_framework(b"hello\n"));
        assert!(! has_signature_framework(
            b"The output starts with\n\
              -----BEGIN PGP SIGNED MESSAGE-----\n\
              and ends with a signature.\n"));
        // The markers must come in order.
        assert!(! has_signature_framework(
            b"-----BEGIN PGP SIGNATURE-----\n\
              -----END PGP SIGNATURE-----\n\
              -----BEGIN PGP SIGNED MESSAGE-----\n"));
        assert!(! has_signature_framework(
            b"- -----BEGIN PGP SIGNED MESSAGE-----\n"));
    }

    #[test]
    fn malformed_framing() {
        assert_eq!(malformed("hello\n"),
                   "unexpected content before the signed-message marker");
        assert_eq!(malformed(""), "missing signed-message marker");
        assert_eq!(malformed(&DOC.replace("-----BEGIN PGP SIGNATURE-----\nC",
                                          "C")),
                   "missing signature marker");
        assert_eq!(malformed(&DOC.replace("-----END PGP SIGNATURE-----\n", "")),
                   "missing signature tail line");
        assert_eq!(malformed(&format!("{}more\n", DOC)),
                   "unexpected content after the signature");
        assert_eq!(malformed(&DOC.replace("world",
                                          "-----BEGIN PGP SIGNED MESSAGE-----")),
                   "nested signed-message marker in the message body");
        assert_eq!(malformed("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA1\n\
                              -----BEGIN PGP SIGNATURE-----\n"),
                   "missing blank line after the signed-message headers");
    }

    #[test]
    fn document() {
        let doc = ClearsignDocument::parse(DOC.as_bytes().to_vec()).unwrap();
        assert_eq!(doc.hash_algorithm(), &HashAlgorithm::Sha512);
        assert_eq!(doc.message_body(),
                   b"hello\n- -----BEGIN PGP SIGNATURE-----\nworld\n");
        assert!(doc.signature_armor().starts_with(b"-----BEGIN PGP SIGNATURE"));
        assert_eq!(doc.into_bytes(), DOC.as_bytes());
    }

    #[test]
    fn document_checks_the_signature_armor() {
        let bad = DOC.replace("wnUE", "not base64!");
        let err = ClearsignDocument::parse(bad.into_bytes()).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(),
                         Some(Error::MalformedArmor(_))));
    }
}
