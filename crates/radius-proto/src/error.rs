// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Codec error types.

use std::fmt;

/// Errors raised while decoding or validating a RADIUS packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Header shorter than 20 bytes, or the Length field does not match
    /// the number of bytes actually received.
    MalformedPacket(String),
    /// A TLV's declared length runs past the end of the packet, or is
    /// too short to hold its own header.
    AttributeOverrun(String),
    /// The Request or Response Authenticator did not verify against the
    /// shared secret.
    BadAuthenticator,
    /// An attribute carried a value of the wrong shape for its type
    /// (e.g. a non-4-byte integer attribute).
    InvalidAttributeValue(String),
    /// A required attribute was absent.
    MissingAttribute(&'static str),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPacket(s) => write!(f, "malformed packet: {s}"),
            Self::AttributeOverrun(s) => write!(f, "attribute overrun: {s}"),
            Self::BadAuthenticator => write!(f, "bad authenticator"),
            Self::InvalidAttributeValue(s) => write!(f, "invalid attribute value: {s}"),
            Self::MissingAttribute(name) => write!(f, "missing attribute: {name}"),
        }
    }
}

impl std::error::Error for CodecError {}
