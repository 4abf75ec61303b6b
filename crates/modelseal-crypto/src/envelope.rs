//! # Signature and MAC Envelopes
//!
//! A signed or authenticated document is the document bytes followed by a
//! fixed armour block carrying the tag in hex:
//!
//! ```text
//! <document bytes>
//! -----BEGIN MODELSEAL SIGNATURE-----
//! <hex tag>
//! -----END MODELSEAL SIGNATURE-----
//! ```
//!
//! The data section is everything before the newline that opens the
//! armour, byte for byte. Content hashes and tags are computed over
//! exactly that slice.

use std::io::Write;

use modelseal_core::{BoundedBuffer, ProtectError};

/// Upper bound on the hex tag carried in an envelope.
pub const MAX_SIGNATURE_SIZE: usize = 128;

/// Upper bound on the armour text surrounding the tag.
pub const SIGNATURE_BLOB_TEXT_SIZE: usize = 96;

const BEGIN_PREFIX: &str = "-----BEGIN MODELSEAL ";
const END_PREFIX: &str = "-----END MODELSEAL ";
const DASHES: &str = "-----";

/// Which tag an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Asymmetric signature by the identity key.
    Signature,
    /// Keyed MAC from a key-wrap derived slot.
    Hmac,
}

impl EnvelopeKind {
    /// Armour label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Signature => "SIGNATURE",
            Self::Hmac => "HMAC",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "SIGNATURE" => Some(Self::Signature),
            "HMAC" => Some(Self::Hmac),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Buffer size needed to seal `data_len` bytes of document.
pub fn sealed_capacity(data_len: usize) -> usize {
    data_len + MAX_SIGNATURE_SIZE + SIGNATURE_BLOB_TEXT_SIZE
}

/// Append the armour block for `tag_hex` to `data`.
///
/// # Errors
///
/// [`ProtectError::Parameter`] if the tag is longer than
/// [`MAX_SIGNATURE_SIZE`]; [`ProtectError::Allocation`] if the output
/// buffer cannot be reserved.
pub fn seal(data: &[u8], kind: EnvelopeKind, tag_hex: &str) -> Result<Vec<u8>, ProtectError> {
    if tag_hex.len() > MAX_SIGNATURE_SIZE {
        return Err(ProtectError::parameter(format!(
            "{kind} tag of {} chars exceeds {MAX_SIGNATURE_SIZE}",
            tag_hex.len()
        )));
    }
    let label = kind.label();
    let mut out = BoundedBuffer::with_capacity(sealed_capacity(data.len()))?;
    out.write_all(data)
        .and_then(|()| {
            write!(
                out,
                "\n{BEGIN_PREFIX}{label}{DASHES}\n{tag_hex}\n{END_PREFIX}{label}{DASHES}\n"
            )
        })
        .map_err(|e| ProtectError::Serialization(format!("sealing {kind} envelope: {e}")))?;
    Ok(out.into_inner())
}

/// A parsed envelope borrowing from the sealed bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// The document bytes the tag covers.
    pub data: &'a [u8],
    /// Which tag this is.
    pub kind: EnvelopeKind,
    /// The hex tag.
    pub tag: &'a str,
}

/// Split sealed bytes into data section and tag.
pub fn open(sealed: &[u8]) -> Result<Envelope<'_>, ProtectError> {
    let marker = format!("\n{BEGIN_PREFIX}");
    let marker = marker.as_bytes();
    let pos = sealed
        .windows(marker.len())
        .rposition(|w| w == marker)
        .ok_or_else(|| ProtectError::parameter("envelope armour not found"))?;

    let armour = std::str::from_utf8(&sealed[pos + 1..])
        .map_err(|e| ProtectError::parameter(format!("envelope armour is not UTF-8: {e}")))?;
    let mut lines = armour.split('\n');
    let begin = lines.next().unwrap_or_default();
    let tag = lines.next().unwrap_or_default();
    let end = lines.next().unwrap_or_default();
    let trailer: Vec<&str> = lines.collect();

    let label = begin
        .strip_prefix(BEGIN_PREFIX)
        .and_then(|rest| rest.strip_suffix(DASHES))
        .ok_or_else(|| ProtectError::parameter("malformed envelope header"))?;
    let kind = EnvelopeKind::from_label(label)
        .ok_or_else(|| ProtectError::parameter(format!("unknown envelope kind {label:?}")))?;
    if end != format!("{END_PREFIX}{label}{DASHES}") {
        return Err(ProtectError::parameter("malformed envelope footer"));
    }
    if trailer != [""] {
        return Err(ProtectError::parameter("trailing bytes after envelope"));
    }
    if tag.is_empty() || tag.len() > MAX_SIGNATURE_SIZE || !tag.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return Err(ProtectError::parameter("malformed envelope tag"));
    }

    Ok(Envelope {
        data: &sealed[..pos],
        kind,
        tag,
    })
}
