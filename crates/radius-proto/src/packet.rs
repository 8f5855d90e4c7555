// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RFC 2865 wire format: 1-byte Code, 1-byte Identifier, 2-byte Length,
//! 16-byte Authenticator, then a sequence of TLV attributes.

use crate::attribute::Attribute;
use crate::auth;
use crate::error::CodecError;

const HEADER_LEN: usize = 20;
const MAX_PACKET_LEN: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    AccessRequest,
    AccessAccept,
    AccessReject,
    AccountingRequest,
    AccountingResponse,
    Other(u8),
}

impl Code {
    pub fn as_u8(self) -> u8 {
        match self {
            Code::AccessRequest => 1,
            Code::AccessAccept => 2,
            Code::AccessReject => 3,
            Code::AccountingRequest => 4,
            Code::AccountingResponse => 5,
            Code::Other(c) => c,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Code::AccessRequest,
            2 => Code::AccessAccept,
            3 => Code::AccessReject,
            4 => Code::AccountingRequest,
            5 => Code::AccountingResponse,
            other => Code::Other(other),
        }
    }
}

/// A fully decoded RADIUS packet, or one under construction for a reply.
#[derive(Debug, Clone)]
pub struct Packet {
    pub code: Code,
    pub identifier: u8,
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl Packet {
    pub fn new(code: Code, identifier: u8) -> Self {
        Self {
            code,
            identifier,
            authenticator: [0u8; 16],
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn find(&self, typ: u8) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.typ == typ)
    }

    pub fn find_all(&self, typ: u8) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter().filter(move |a| a.typ == typ)
    }

    /// Decode a full packet: header plus every attribute. Attributes of
    /// an unrecognized type are still kept (dictionary lookups happen at
    /// the call site); only structural malformation is an error.
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::MalformedPacket(format!(
                "packet is {} bytes, shorter than the {HEADER_LEN}-byte header",
                buf.len()
            )));
        }
        let code = Code::from_u8(buf[0]);
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if length < HEADER_LEN || length > buf.len() || length > MAX_PACKET_LEN {
            return Err(CodecError::MalformedPacket(format!(
                "declared length {length} inconsistent with {} received bytes",
                buf.len()
            )));
        }
        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&buf[4..20]);

        let mut attributes = Vec::new();
        let mut offset = HEADER_LEN;
        while offset < length {
            let (attr, consumed) = Attribute::decode(&buf[offset..length])?;
            offset += consumed;
            attributes.push(attr);
        }

        Ok(Self {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    /// Only the Code/Identifier/Length/Authenticator header, for use
    /// before the shared secret (and thus full attribute semantics) is
    /// known. Still validates the declared length.
    pub fn decode_header(buf: &[u8]) -> Result<(Code, u8, [u8; 16], usize), CodecError> {
        if buf.len() < HEADER_LEN {
            return Err(CodecError::MalformedPacket(format!(
                "packet is {} bytes, shorter than the {HEADER_LEN}-byte header",
                buf.len()
            )));
        }
        let code = Code::from_u8(buf[0]);
        let identifier = buf[1];
        let length = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if length < HEADER_LEN || length > buf.len() || length > MAX_PACKET_LEN {
            return Err(CodecError::MalformedPacket(format!(
                "declared length {length} inconsistent with {} received bytes",
                buf.len()
            )));
        }
        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&buf[4..20]);
        Ok((code, identifier, authenticator, length))
    }

    fn encode_attributes(&self) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        for attr in &self.attributes {
            attr.encode(&mut out)?;
        }
        Ok(out)
    }

    /// Encode with the authenticator field already set verbatim (used
    /// when re-deriving the bytes that went into a signature).
    fn encode_raw(&self, attrs: &[u8]) -> Vec<u8> {
        let length = (HEADER_LEN + attrs.len()) as u16;
        let mut out = Vec::with_capacity(length as usize);
        out.push(self.code.as_u8());
        out.push(self.identifier);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&self.authenticator);
        out.extend_from_slice(attrs);
        out
    }

    /// Verify an Accounting-Request's Request Authenticator against the
    /// bytes as received (RFC 2866 §4.1: MD5 with 16 zero bytes standing
    /// in for the authenticator field).
    pub fn verify_request_authenticator(&self, secret: &[u8]) -> Result<(), CodecError> {
        let attrs = self.encode_attributes()?;
        let length = (HEADER_LEN + attrs.len()) as u16;
        let ok = auth::verify_request_authenticator(
            self.code.as_u8(),
            self.identifier,
            length,
            &self.authenticator,
            &attrs,
            secret,
        );
        if ok {
            Ok(())
        } else {
            Err(CodecError::BadAuthenticator)
        }
    }

    /// Encode this packet as a signed reply to `request`: the Response
    /// Authenticator is computed over the request's authenticator, this
    /// packet's attributes, and `secret`, then written into the
    /// Authenticator field.
    pub fn encode_signed_reply(
        &self,
        request_authenticator: &[u8; 16],
        secret: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        let attrs = self.encode_attributes()?;
        let length = (HEADER_LEN + attrs.len()) as u16;
        let response_authenticator = auth::compute_response_authenticator(
            self.code.as_u8(),
            self.identifier,
            length,
            request_authenticator,
            &attrs,
            secret,
        );
        let mut signed = self.clone();
        signed.authenticator = response_authenticator;
        Ok(signed.encode_raw(&attrs))
    }

    /// Decrypt this request's User-Password attribute, if present.
    pub fn decrypt_user_password(&self, secret: &[u8]) -> Option<Vec<u8>> {
        let attr = self.find(crate::dictionary::USER_PASSWORD)?;
        Some(auth::decrypt_user_password(
            &attr.value,
            secret,
            &self.authenticator,
        ))
    }
}
