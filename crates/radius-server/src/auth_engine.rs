// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Authentication decision engine (C5): turns a decoded Access-Request
//! into an Accept or Reject, applying every predicate in order and
//! stopping at the first failure.

use crate::app_state::AppState;
use radius_proto::attribute::Attribute;
use radius_proto::{dictionary, Packet, Reply};
use radius_store::{NasClient, SessionRepository, UserRepository};
use tracing::info;

pub fn handle_access_request(state: &AppState, request: &Packet, nas: &NasClient) -> Reply {
    let nas_ip = &nas.ip_address;
    let client_id = &nas.identifier;

    let username = match request.find(dictionary::USER_NAME).and_then(|a| a.as_text().ok()) {
        Some(u) if !u.is_empty() => u.to_string(),
        _ => return reject(state, nas_ip, client_id, None, "Missing username"),
    };

    let password = match request.decrypt_user_password(&nas.shared_secret) {
        Some(bytes) if !bytes.is_empty() => bytes,
        _ => return reject(state, nas_ip, client_id, Some(&username), "Missing password"),
    };
    let password = String::from_utf8_lossy(&password).into_owned();

    let users = UserRepository::new(&state.db);
    let user = match users.find_by_username(&username) {
        Ok(Some(u)) => u,
        Ok(None) => return reject(state, nas_ip, client_id, Some(&username), "Invalid credentials"),
        Err(e) => {
            tracing::error!(%username, error = %e, "user lookup failed");
            return reject(state, nas_ip, client_id, Some(&username), "Invalid credentials");
        }
    };

    if !user.verify_password(&password) {
        return reject(state, nas_ip, client_id, Some(&username), "Invalid credentials");
    }

    let (ok, reason) = user.can_authenticate();
    if !ok {
        let reason = reason.unwrap_or("Invalid credentials");
        return reject(state, nas_ip, client_id, Some(&username), reason);
    }

    let sessions = SessionRepository::new(&state.db);
    let active = sessions.count_active_for_username(&username).unwrap_or(0);
    let pending = state.buffer.pending_active_count_for(&username);
    if active + pending >= user.max_concurrent_sessions {
        let reason = format!(
            "Maximum concurrent sessions ({}) reached",
            user.max_concurrent_sessions
        );
        return reject(state, nas_ip, client_id, Some(&username), &reason);
    }

    info!(
        user = %username,
        nas = %client_id,
        nas_ip = %nas_ip,
        outcome = "accept",
        "access request accepted"
    );

    Reply::Accept {
        reply_message: Some("Authentication successful".to_string()),
        extra_attributes: vec![
            Attribute::integer(dictionary::SERVICE_TYPE, dictionary::SERVICE_TYPE_FRAMED),
            Attribute::integer(dictionary::FRAMED_PROTOCOL, dictionary::FRAMED_PROTOCOL_PPP),
            Attribute::integer(
                dictionary::ACCT_INTERIM_INTERVAL,
                state.config.acct_interim_interval as u32,
            ),
        ],
    }
}

fn reject(state: &AppState, nas_ip: &str, client_id: &str, username: Option<&str>, reason: &str) -> Reply {
    info!(
        user = username.unwrap_or("<unknown>"),
        nas = %client_id,
        nas_ip = %nas_ip,
        outcome = "reject",
        reason,
        "access request rejected"
    );
    let _ = state;
    Reply::Reject {
        reply_message: Some(reason.to_string()),
    }
}
