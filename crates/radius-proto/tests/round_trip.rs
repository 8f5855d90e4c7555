// SPDX-License-Identifier: Apache-2.0 OR MIT

use radius_proto::{attribute::Attribute, auth, dictionary, packet::Code, Packet, Reply};

#[test]
fn access_request_decodes_and_authenticator_verifies() {
    let secret = b"sh4red-secret";
    let authenticator = [11u8; 16];
    let encrypted_pw = auth::encrypt_user_password(b"hunter2", secret, &authenticator);

    let request = Packet {
        code: Code::AccessRequest,
        identifier: 1,
        authenticator,
        attributes: vec![
            Attribute::text(dictionary::USER_NAME, "bob"),
            Attribute::new(dictionary::USER_PASSWORD, encrypted_pw),
            Attribute::ipv4(dictionary::NAS_IP_ADDRESS, "192.168.1.1".parse().unwrap()),
            Attribute::text(dictionary::NAS_IDENTIFIER, "nas-1"),
        ],
    };

    let mut wire = vec![request.code.as_u8(), request.identifier, 0, 0];
    wire.extend_from_slice(&request.authenticator);
    for attr in &request.attributes {
        attr.encode(&mut wire).unwrap();
    }
    let len = wire.len() as u16;
    wire[2..4].copy_from_slice(&len.to_be_bytes());

    let decoded = Packet::decode(&wire).expect("valid packet decodes");
    assert_eq!(decoded.identifier, 1);
    assert_eq!(
        decoded.find(dictionary::USER_NAME).unwrap().as_text().unwrap(),
        "bob"
    );
    let pw = decoded.decrypt_user_password(secret).unwrap();
    assert_eq!(pw, b"hunter2");
}

#[test]
fn accounting_request_round_trips_with_terminate_cause() {
    let secret = b"acct-secret";
    let attrs = vec![
        Attribute::integer(dictionary::ACCT_STATUS_TYPE, dictionary::acct_status::STOP),
        Attribute::text(dictionary::ACCT_SESSION_ID, "sess-42"),
        Attribute::integer(dictionary::ACCT_TERMINATE_CAUSE, 1),
    ];
    let mut wire = vec![Code::AccountingRequest.as_u8(), 3, 0, 0];
    wire.extend_from_slice(&[0u8; 16]);
    for attr in &attrs {
        attr.encode(&mut wire).unwrap();
    }
    let len = wire.len() as u16;
    wire[2..4].copy_from_slice(&len.to_be_bytes());

    let attrs_bytes = &wire[20..];
    let authenticator =
        auth::compute_authenticator(Code::AccountingRequest.as_u8(), 3, len, &[0u8; 16], attrs_bytes, secret);
    wire[4..20].copy_from_slice(&authenticator);

    let decoded = Packet::decode(&wire).unwrap();
    assert!(decoded.verify_request_authenticator(secret).is_ok());

    let cause = decoded
        .find(dictionary::ACCT_TERMINATE_CAUSE)
        .unwrap()
        .as_u32()
        .unwrap();
    assert_eq!(
        dictionary::TerminateCause::from_u32(cause),
        Some(dictionary::TerminateCause::UserRequest)
    );
}

#[test]
fn reply_encodes_with_response_authenticator_tied_to_request() {
    let secret = b"reply-secret";
    let request_authenticator = [5u8; 16];
    let accept = Reply::accept(Some("Authentication successful".into()));
    let bytes = accept
        .encode(9, &request_authenticator, secret)
        .expect("reply encodes");

    let decoded = Packet::decode(&bytes).unwrap();
    assert_eq!(decoded.code, Code::AccessAccept);
    assert_eq!(decoded.identifier, 9);
    assert_ne!(decoded.authenticator, request_authenticator);
}
