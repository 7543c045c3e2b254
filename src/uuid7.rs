//! UUIDv7 identifiers for the mandatory `uuid` field.
//!
//! A version-7 identifier carries a 48-bit big-endian Unix-milliseconds
//! timestamp in its leading bits, the version nibble 7, and the RFC 4122
//! variant bits, so freshly generated keys sort by creation time. The
//! canonical textual form (the URN) is the hyphenated 8-4-4-4-12 hex
//! rendering.

use uuid::Uuid;

use crate::error::Error;
use crate::Result;

/// Generate a fresh version-7 identifier.
pub fn new() -> Uuid {
    Uuid::now_v7()
}

/// The canonical hyphenated rendering, lowercase.
pub fn to_urn(id: &Uuid) -> String {
    id.hyphenated().to_string()
}

/// Parse a canonical hyphenated rendering, case-insensitively.
///
/// The shape is checked strictly: exactly 36 characters with hyphens at
/// offsets 8, 13, 18 and 23. A wrong shape is
/// [`Error::MalformedUrnString`]; a non-hex digit in a hex position is
/// [`Error::InvalidHexCharacter`].
pub fn from_urn(urn: &str) -> Result<Uuid> {
    let bytes = urn.as_bytes();
    if bytes.len() != 36 {
        return Err(Error::MalformedUrnString(urn.to_owned()));
    }
    for (i, &b) in bytes.iter().enumerate() {
        match i {
            8 | 13 | 18 | 23 => {
                if b != b'-' {
                    return Err(Error::MalformedUrnString(urn.to_owned()));
                }
            }
            _ => {
                if !b.is_ascii_hexdigit() {
                    return Err(Error::InvalidHexCharacter(b as char));
                }
            }
        }
    }
    Uuid::try_parse(urn).map_err(|_| Error::MalformedUrnString(urn.to_owned()))
}
