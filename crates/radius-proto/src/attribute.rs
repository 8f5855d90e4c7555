// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A single decoded RADIUS attribute (RFC 2865 §5): one byte of type, one
//! byte of length (including this header), and the raw value bytes.

use crate::error::CodecError;
use std::net::Ipv4Addr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub typ: u8,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(typ: u8, value: Vec<u8>) -> Self {
        Self { typ, value }
    }

    pub fn text(typ: u8, s: &str) -> Self {
        Self::new(typ, s.as_bytes().to_vec())
    }

    pub fn integer(typ: u8, v: u32) -> Self {
        Self::new(typ, v.to_be_bytes().to_vec())
    }

    pub fn ipv4(typ: u8, ip: Ipv4Addr) -> Self {
        Self::new(typ, ip.octets().to_vec())
    }

    pub fn as_text(&self) -> Result<&str, CodecError> {
        std::str::from_utf8(&self.value)
            .map_err(|e| CodecError::InvalidAttributeValue(format!("non-UTF8 text: {e}")))
    }

    pub fn as_u32(&self) -> Result<u32, CodecError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            CodecError::InvalidAttributeValue(format!(
                "expected 4-byte integer, got {} bytes",
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn as_ipv4(&self) -> Result<Ipv4Addr, CodecError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            CodecError::InvalidAttributeValue(format!(
                "expected 4-byte address, got {} bytes",
                self.value.len()
            ))
        })?;
        Ok(Ipv4Addr::from(bytes))
    }

    /// Encode as wire bytes: type, length (2 + value.len()), value.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let len = 2 + self.value.len();
        if len > 255 {
            return Err(CodecError::InvalidAttributeValue(format!(
                "attribute {} value too long ({} bytes)",
                self.typ,
                self.value.len()
            )));
        }
        out.push(self.typ);
        out.push(len as u8);
        out.extend_from_slice(&self.value);
        Ok(())
    }

    /// Decode one TLV starting at `buf[0]`. Returns the attribute and the
    /// number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        if buf.len() < 2 {
            return Err(CodecError::AttributeOverrun(
                "fewer than 2 bytes left for attribute header".into(),
            ));
        }
        let typ = buf[0];
        let len = buf[1] as usize;
        if len < 2 {
            return Err(CodecError::AttributeOverrun(format!(
                "attribute {typ} declares length {len} < 2"
            )));
        }
        if len > buf.len() {
            return Err(CodecError::AttributeOverrun(format!(
                "attribute {typ} declares length {len} but only {} bytes remain",
                buf.len()
            )));
        }
        let value = buf[2..len].to_vec();
        Ok((Attribute { typ, value }, len))
    }
}
