// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RFC 2865/2866 RADIUS packet codec.
//!
//! This crate has no knowledge of sockets, stores, or scheduling; it only
//! turns bytes into [`Packet`]s and back, and implements the MD5-based
//! authenticator and User-Password crypto those RFCs specify.

pub mod attribute;
pub mod auth;
pub mod dictionary;
pub mod error;
pub mod packet;
pub mod reply;

pub use attribute::Attribute;
pub use error::CodecError;
pub use packet::{Code, Packet};
pub use reply::Reply;
