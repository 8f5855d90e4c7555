// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Outgoing replies, typed by what the engines actually produce rather
//! than by raw `Code`. Each variant knows how to turn itself into the
//! [`Packet`] the wire format needs.

use crate::attribute::Attribute;
use crate::dictionary;
use crate::error::CodecError;
use crate::packet::{Code, Packet};

/// A reply to an Access-Request or Accounting-Request.
#[derive(Debug, Clone)]
pub enum Reply {
    Accept {
        reply_message: Option<String>,
        extra_attributes: Vec<Attribute>,
    },
    Reject {
        reply_message: Option<String>,
    },
    AcctResponse,
}

impl Reply {
    /// An Access-Accept with no attributes beyond an optional Reply-Message.
    pub fn accept(reply_message: Option<String>) -> Self {
        Reply::Accept {
            reply_message,
            extra_attributes: Vec::new(),
        }
    }

    fn code(&self) -> Code {
        match self {
            Reply::Accept { .. } => Code::AccessAccept,
            Reply::Reject { .. } => Code::AccessReject,
            Reply::AcctResponse => Code::AccountingResponse,
        }
    }

    fn to_packet(&self, identifier: u8) -> Packet {
        let mut packet = Packet::new(self.code(), identifier);
        let message = match self {
            Reply::Accept { reply_message, .. } => reply_message.as_deref(),
            Reply::Reject { reply_message } => reply_message.as_deref(),
            Reply::AcctResponse => None,
        };
        if let Some(msg) = message {
            packet = packet.with_attribute(Attribute::text(dictionary::REPLY_MESSAGE, msg));
        }
        if let Reply::Accept { extra_attributes, .. } = self {
            for attr in extra_attributes {
                packet = packet.with_attribute(attr.clone());
            }
        }
        packet
    }

    /// Build and sign the wire bytes for this reply to `request_identifier`,
    /// keyed on the originating request's authenticator and shared secret.
    pub fn encode(
        &self,
        request_identifier: u8,
        request_authenticator: &[u8; 16],
        secret: &[u8],
    ) -> Result<Vec<u8>, CodecError> {
        self.to_packet(request_identifier)
            .encode_signed_reply(request_authenticator, secret)
    }
}
