//! Signature packets and their framing.
//!
//! OpenPGP packets are self-delimiting: each starts with a header
//! encoding the packet's tag and the length of its body.  Signatures
//! are merged by concatenating their packets, so all we have to get
//! right is where one packet ends and the next begins.

use std::fmt;

use crate::Result;

const TRACE: bool = false;

/// The tag of a signature packet.
pub const SIGNATURE_TAG: u8 = 2;

/// A serialized signature packet, header included.
///
/// The bytes are never edited, only concatenated with other packets.
#[derive(Clone, PartialEq, Eq)]
pub struct SignaturePacket {
    bytes: Vec<u8>,
    header_len: usize,
}

impl fmt::Debug for SignaturePacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignaturePacket")
            .field("len", &self.bytes.len())
            .field("body_len", &self.body().len())
            .finish()
    }
}

impl SignaturePacket {
    /// Returns the packet's tag.
    ///
    /// [`split`] only accepts signature packets, so this is always
    /// [`SIGNATURE_TAG`].
    pub fn tag(&self) -> u8 {
        SIGNATURE_TAG
    }

    /// Returns the serialized packet.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the packet's body.
    pub fn body(&self) -> &[u8] {
        &self.bytes[self.header_len..]
    }

    /// Returns the serialized packet.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// An ordered set of signature packets.
///
/// Packets keep the order in which they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureSet {
    packets: Vec<SignaturePacket>,
}

impl SignatureSet {
    /// Returns an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends packets.
    pub fn extend<I>(&mut self, packets: I)
    where I: IntoIterator<Item = SignaturePacket>
    {
        self.packets.extend(packets)
    }

    /// Returns the number of packets.
    pub fn len(&self) -> usize {
        self.packets.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Iterates over the packets in order.
    pub fn iter(&self) -> impl Iterator<Item = &SignaturePacket> {
        self.packets.iter()
    }

    /// Returns the concatenated packets.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut v = Vec::with_capacity(
            self.packets.iter().map(|p| p.bytes.len()).sum());
        for p in self.packets.iter() {
            v.extend_from_slice(&p.bytes);
        }
        v
    }
}

impl FromIterator<SignaturePacket> for SignatureSet {
    fn from_iter<I>(iter: I) -> Self
    where I: IntoIterator<Item = SignaturePacket>
    {
        SignatureSet {
            packets: iter.into_iter().collect(),
        }
    }
}

/// A packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub tag: u8,
    pub header_len: usize,
    pub body_len: usize,
}

/// Reads a big-endian length of `n` octets at `at`.
fn be_len(raw: &[u8], at: usize, n: usize) -> Result<usize> {
    let bytes = raw.get(at..at + n)
        .ok_or_else(|| anyhow::anyhow!("truncated packet header"))?;
    Ok(bytes.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize))
}

/// Parses the packet header at the start of `raw`.
pub(crate) fn header(raw: &[u8]) -> Result<Header> {
    let ctb = *raw.first()
        .ok_or_else(|| anyhow::anyhow!("truncated packet header"))?;
    if ctb & 0x80 == 0 {
        return Err(anyhow::anyhow!(
            "invalid packet header: {:#04x} is not a cipher type byte", ctb));
    }

    if ctb & 0x40 != 0 {
        // New format.
        let tag = ctb & 0x3f;
        let first = *raw.get(1)
            .ok_or_else(|| anyhow::anyhow!("truncated packet header"))?
            as usize;
        let (header_len, body_len) = match first {
            0..=191 => (2, first),
            192..=223 => (3, ((first - 192) << 8) + be_len(raw, 2, 1)? + 192),
            255 => (6, be_len(raw, 2, 4)?),
            _ => return Err(anyhow::anyhow!(
                "partial body lengths are not allowed in signature packets")),
        };
        Ok(Header { tag, header_len, body_len })
    } else {
        // Old format.
        let tag = (ctb >> 2) & 0x0f;
        let (header_len, body_len) = match ctb & 0x03 {
            0 => (2, be_len(raw, 1, 1)?),
            1 => (3, be_len(raw, 1, 2)?),
            2 => (5, be_len(raw, 1, 4)?),
            _ => return Err(anyhow::anyhow!(
                "indeterminate lengths are not allowed in signature packets")),
        };
        Ok(Header { tag, header_len, body_len })
    }
}

/// Splits a packet stream into signature packets.
///
/// Fails if the stream is empty, if a packet is truncated, or if it
/// contains anything but signature packets.
pub fn split(raw: &[u8]) -> Result<Vec<SignaturePacket>> {
    tracer!(TRACE, "packet::split");

    if raw.is_empty() {
        return Err(anyhow::anyhow!("no signature packets"));
    }

    let mut packets = Vec::new();
    let mut offset = 0;
    while offset < raw.len() {
        let h = header(&raw[offset..])?;
        t!("packet at {}: tag {}, {} + {} bytes",
           offset, h.tag, h.header_len, h.body_len);

        if h.tag != SIGNATURE_TAG {
            return Err(anyhow::anyhow!(
                "unexpected packet with tag {} at offset {}", h.tag, offset));
        }

        let end = offset.checked_add(h.header_len)
            .and_then(|o| o.checked_add(h.body_len))
            .filter(|&end| end <= raw.len())
            .ok_or_else(|| anyhow::anyhow!(
                "truncated signature packet at offset {}: \
                 need {} + {} bytes, have {}",
                offset, h.header_len, h.body_len, raw.len() - offset))?;

        packets.push(SignaturePacket {
            bytes: raw[offset..end].to_vec(),
            header_len: h.header_len,
        });
        offset = end;
    }

    Ok(packets)
}
