//! A scanner for ASCII-armored blocks.
//!
//! [`split`] takes a standalone armor block apart into its envelope
//! and its payload, returning byte ranges into the input.  It does
//! not decode anything; that is the engine's job.  It does, however,
//! insist on a well-formed envelope, because the payload is later
//! spliced into a new envelope verbatim.

use std::ops::Range;

use crate::Error;
use crate::Result;

const TRACE: bool = false;

/// A line in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Line {
    /// Offset of the first byte.
    pub start: usize,
    /// Offset just past the content, excluding the line terminator.
    pub end: usize,
    /// Offset of the next line, i.e. just past the line terminator.
    pub next: usize,
}

/// Iterates over the lines of `text`.
///
/// Both `\n` and `\r\n` terminate lines.  A final line without a
/// terminator is returned as well; an empty buffer has no lines.
pub(crate) fn lines(text: &[u8]) -> impl Iterator<Item = Line> + '_ {
    let mut start = 0;
    std::iter::from_fn(move || {
        if start >= text.len() {
            return None;
        }

        let line = match text[start..].iter().position(|&b| b == b'\n') {
            Some(nl) => {
                let nl = start + nl;
                let end = if nl > start && text[nl - 1] == b'\r' {
                    nl - 1
                } else {
                    nl
                };
                Line { start, end, next: nl + 1 }
            }
            None => Line { start, end: text.len(), next: text.len() },
        };
        start = line.next;
        Some(line)
    })
}

/// Strips trailing spaces and tabs.
pub(crate) fn trim_end(line: &[u8]) -> &[u8] {
    let n = line.iter().rev()
        .take_while(|&&b| b == b' ' || b == b'\t' || b == b'\r')
        .count();
    &line[..line.len() - n]
}

/// Returns whether the line consists of whitespace only.
pub(crate) fn is_blank(line: &[u8]) -> bool {
    trim_end(line).is_empty()
}

/// If `line` is `-----<KIND> <label>-----`, returns the label.
pub(crate) fn marker<'a>(line: &'a [u8], kind: &str) -> Option<&'a [u8]> {
    let line = trim_end(line);
    let line = line.strip_prefix(b"-----")?;
    let line = line.strip_prefix(kind.as_bytes())?;
    let line = line.strip_prefix(b" ")?;
    let label = line.strip_suffix(b"-----")?;
    if label.is_empty() || label.starts_with(b"-") || label.ends_with(b"-") {
        None
    } else {
        Some(label)
    }
}

/// The parts of an armor block.
///
/// All ranges are byte offsets into the scanned buffer.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmorParts {
    /// The label, e.g. `PGP SIGNATURE`.
    pub label: String,

    /// The envelope's head: the armor header line, any armor headers,
    /// and the blank line that ends them.
    pub header: Range<usize>,

    /// The armor headers proper, i.e. the `Key: Value` lines.
    pub headers: Range<usize>,

    /// The radix-64 lines and the optional checksum line, including
    /// their line terminators.
    pub payload: Range<usize>,

    /// The armor tail line, including its terminator, if any.
    pub footer: Range<usize>,
}

/// Returns whether `line` is a radix-64 data line.
fn is_data_line(line: &[u8]) -> bool {
    let padding = line.iter().rev().take_while(|&&b| b == b'=').count();
    padding <= 2
        && line.len() > padding
        && line[..line.len() - padding].iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Returns whether `line` is an armor checksum line.
fn is_checksum_line(line: &[u8]) -> bool {
    line.len() == 5
        && line[0] == b'='
        && line[1..].iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Splits an armor block into its envelope and payload.
///
/// Leading and trailing blank lines are tolerated.  Anything else
/// before the armor header line or after the armor tail line, a
/// missing blank line after the armor headers, payload lines that are
/// not radix-64, an empty payload, and a tail line whose label
/// doesn't match the header line's are errors.
pub fn split(text: &[u8]) -> Result<ArmorParts> {
    tracer!(TRACE, "armor::split");

    #[derive(Debug)]
    enum State {
        Before,
        Headers,
        Payload,
        After,
    }

    let mut state = State::Before;
    let mut label: &[u8] = b"";
    let mut header_start = 0;
    let mut headers = 0..0;
    let mut payload = 0..0;
    let mut footer = 0..0;
    let mut checksum_seen = false;

    for line in lines(text) {
        let content = &text[line.start..line.end];

        match state {
            State::Before => {
                if is_blank(content) {
                    continue;
                }
                label = marker(content, "BEGIN").ok_or_else(|| {
                    Error::malformed("unexpected content before the armor \
                                      header line")
                })?;
                t!("armor header line at {}: {}",
                   line.start, String::from_utf8_lossy(label));
                header_start = line.start;
                headers = line.next..line.next;
                state = State::Headers;
            }

            State::Headers => {
                if is_blank(content) {
                    headers.end = line.start;
                    payload = line.next..line.next;
                    state = State::Payload;
                } else if content.windows(2).any(|w| w == b": ") {
                    // An armor header.
                } else {
                    return Err(Error::malformed(
                        "missing blank line after the armor headers").into());
                }
            }

            State::Payload => {
                if content.starts_with(b"-----") {
                    let tail = marker(content, "END").ok_or_else(|| {
                        Error::malformed("malformed armor tail line")
                    })?;
                    if tail != label {
                        return Err(Error::malformed(format!(
                            "armor tail line {:?} does not match \
                             armor header line {:?}",
                            String::from_utf8_lossy(tail),
                            String::from_utf8_lossy(label))).into());
                    }
                    payload.end = line.start;
                    footer = line.start..line.next;
                    state = State::After;
                    continue;
                }

                let content = trim_end(content);
                if checksum_seen {
                    return Err(Error::malformed(
                        "content after the armor checksum").into());
                } else if is_checksum_line(content) {
                    checksum_seen = true;
                } else if ! is_data_line(content) {
                    return Err(Error::malformed(format!(
                        "stray content in the armor payload at offset {}",
                        line.start)).into());
                }
            }

            State::After => {
                if ! is_blank(content) {
                    return Err(Error::malformed(
                        "unexpected content after the armor tail line")
                               .into());
                }
            }
        }
    }

    match state {
        State::Before =>
            Err(Error::malformed("missing armor header line").into()),
        State::Headers =>
            Err(Error::malformed("missing blank line after the armor headers")
                .into()),
        State::Payload =>
            Err(Error::malformed("missing armor tail line").into()),
        State::After if payload.is_empty() =>
            Err(Error::malformed("empty armor payload").into()),
        State::After => Ok(ArmorParts {
            label: String::from_utf8_lossy(label).into_owned(),
            header: header_start..payload.start,
            headers,
            payload,
            footer,
        }),
    }
}
