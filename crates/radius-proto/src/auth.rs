// SPDX-License-Identifier: Apache-2.0 OR MIT

//! MD5-based RADIUS authenticators and User-Password obfuscation
//! (RFC 2865 §3, §5.2).

use md5::{Digest, Md5};

/// Compute MD5(`code` ‖ `id` ‖ `length` ‖ `authenticator_field` ‖ `attrs` ‖ `secret`).
///
/// Used both to sign a reply (where `authenticator_field` is the
/// *request's* authenticator) and to verify an Accounting-Request's
/// Request Authenticator (where `authenticator_field` is 16 zero bytes).
pub fn compute_authenticator(
    code: u8,
    id: u8,
    length: u16,
    authenticator_field: &[u8; 16],
    attrs: &[u8],
    secret: &[u8],
) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update([code, id]);
    hasher.update(length.to_be_bytes());
    hasher.update(authenticator_field);
    hasher.update(attrs);
    hasher.update(secret);
    hasher.finalize().into()
}

/// Verify an Accounting-Request's Request Authenticator: recompute with
/// 16 zero bytes in place of the transmitted authenticator and compare.
pub fn verify_request_authenticator(
    code: u8,
    id: u8,
    length: u16,
    received_authenticator: &[u8; 16],
    attrs: &[u8],
    secret: &[u8],
) -> bool {
    let zeros = [0u8; 16];
    let expected = compute_authenticator(code, id, length, &zeros, attrs, secret);
    expected == *received_authenticator
}

/// Compute the Response Authenticator for a reply, keyed on the
/// request's authenticator (RFC 2865 §3).
pub fn compute_response_authenticator(
    code: u8,
    id: u8,
    length: u16,
    request_authenticator: &[u8; 16],
    reply_attrs: &[u8],
    secret: &[u8],
) -> [u8; 16] {
    compute_authenticator(code, id, length, request_authenticator, reply_attrs, secret)
}

/// Decrypt a User-Password attribute value and strip NUL padding.
pub fn decrypt_user_password(
    encrypted: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Vec<u8> {
    let mut prev: [u8; 16] = *request_authenticator;
    let mut plain = Vec::with_capacity(encrypted.len());

    for chunk in encrypted.chunks(16) {
        let mut hasher = Md5::new();
        hasher.update(secret);
        hasher.update(prev);
        let hash: [u8; 16] = hasher.finalize().into();

        let mut block = [0u8; 16];
        for i in 0..chunk.len() {
            block[i] = chunk[i] ^ hash[i];
        }
        plain.extend_from_slice(&block[..chunk.len()]);

        if chunk.len() == 16 {
            prev.copy_from_slice(chunk); // chaining variable = ciphertext
        }
    }

    while plain.last() == Some(&0) {
        plain.pop();
    }
    plain
}

/// Encrypt a plaintext password into a User-Password attribute value,
/// padding to a 16-byte boundary with NULs. Used by test fixtures and by
/// any client-side code sharing this codec.
pub fn encrypt_user_password(
    plaintext: &[u8],
    secret: &[u8],
    request_authenticator: &[u8; 16],
) -> Vec<u8> {
    let mut padded = plaintext.to_vec();
    if padded.is_empty() {
        padded.resize(16, 0);
    } else {
        let pad = (16 - (padded.len() % 16)) % 16;
        padded.resize(padded.len() + pad, 0);
    }

    let mut prev: [u8; 16] = *request_authenticator;
    let mut out = Vec::with_capacity(padded.len());

    for chunk in padded.chunks(16) {
        let mut hasher = Md5::new();
        hasher.update(secret);
        hasher.update(prev);
        let hash: [u8; 16] = hasher.finalize().into();

        let mut block = [0u8; 16];
        for i in 0..16 {
            block[i] = chunk[i] ^ hash[i];
        }
        out.extend_from_slice(&block);
        prev = block; // chaining variable = ciphertext we just produced
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_round_trips() {
        let secret = b"s3cr3t";
        let ra = [7u8; 16];
        let encrypted = encrypt_user_password(b"pw", secret, &ra);
        let decrypted = decrypt_user_password(&encrypted, secret, &ra);
        assert_eq!(decrypted, b"pw");
    }

    #[test]
    fn password_round_trips_multi_block() {
        let secret = b"another-secret";
        let ra = [42u8; 16];
        let plain = b"a password longer than sixteen bytes";
        let encrypted = encrypt_user_password(plain, secret, &ra);
        assert_eq!(encrypted.len() % 16, 0);
        let decrypted = decrypt_user_password(&encrypted, secret, &ra);
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn authenticator_verifies_with_correct_secret() {
        let attrs = vec![1, 2, 3];
        let ra = [0u8; 16];
        let len = (20 + attrs.len()) as u16;
        let sig = compute_authenticator(4, 1, len, &ra, &attrs, b"secret");
        assert!(verify_request_authenticator(
            4,
            1,
            len,
            &sig,
            &attrs,
            b"secret"
        ));
        assert!(!verify_request_authenticator(
            4,
            1,
            len,
            &sig,
            &attrs,
            b"wrong-secret"
        ));
    }
}
