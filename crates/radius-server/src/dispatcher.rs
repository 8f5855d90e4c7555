// SPDX-License-Identifier: Apache-2.0 OR MIT

//! UDP Dispatcher (C9): two sockets, one for Access-Requests and one for
//! Accounting-Requests, each datagram handled on its own spawned task.

use crate::acct_engine::handle_accounting_request;
use crate::app_state::AppState;
use crate::auth_engine::handle_access_request;
use radius_proto::packet::Code;
use radius_proto::Packet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

const MAX_DATAGRAM: usize = 4096;

pub struct Dispatcher {
    state: Arc<AppState>,
    shutdown: Arc<tokio::sync::Notify>,
}

impl Dispatcher {
    pub fn new(state: Arc<AppState>, shutdown: Arc<tokio::sync::Notify>) -> Self {
        Self { state, shutdown }
    }

    pub async fn run(&self) -> Result<(), DispatcherError> {
        let auth_addr = SocketAddr::new(self.state.config.bind_address, self.state.config.auth_port);
        let acct_addr = SocketAddr::new(self.state.config.bind_address, self.state.config.acct_port);

        let auth_socket = Arc::new(UdpSocket::bind(auth_addr).await.map_err(DispatcherError::Bind)?);
        let acct_socket = Arc::new(UdpSocket::bind(acct_addr).await.map_err(DispatcherError::Bind)?);

        tracing::info!(%auth_addr, %acct_addr, "dispatcher listening");

        let auth_loop = Self::accept_loop(
            auth_socket,
            self.state.clone(),
            self.shutdown.clone(),
            PacketKind::Auth,
        );
        let acct_loop = Self::accept_loop(
            acct_socket,
            self.state.clone(),
            self.shutdown.clone(),
            PacketKind::Acct,
        );

        tokio::join!(auth_loop, acct_loop);
        Ok(())
    }

    async fn accept_loop(
        socket: Arc<UdpSocket>,
        state: Arc<AppState>,
        shutdown: Arc<tokio::sync::Notify>,
        kind: PacketKind,
    ) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    match result {
                        Ok((len, src)) => {
                            let datagram = buf[..len].to_vec();
                            let socket = socket.clone();
                            let state = state.clone();
                            tokio::spawn(async move {
                                handle_datagram(kind, &state, &datagram, src, &socket).await;
                            });
                        }
                        Err(e) => error!(error = %e, "udp recv error"),
                    }
                }
                _ = shutdown.notified() => {
                    debug!(?kind, "dispatcher accept loop shutting down");
                    break;
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PacketKind {
    Auth,
    Acct,
}

async fn handle_datagram(kind: PacketKind, state: &AppState, datagram: &[u8], src: SocketAddr, socket: &UdpSocket) {
    let (code, identifier, authenticator, _) = match Packet::decode_header(datagram) {
        Ok(header) => header,
        Err(e) => {
            warn!(%src, error = %e, "dropping malformed packet");
            return;
        }
    };

    // Attribute values parse the same regardless of secret; only
    // User-Password decryption and authenticator verification need it.
    let request = match Packet::decode(datagram) {
        Ok(p) => p,
        Err(e) => {
            warn!(%src, error = %e, "dropping malformed packet");
            return;
        }
    };

    let nas_identifier = request
        .find(radius_proto::dictionary::NAS_IDENTIFIER)
        .and_then(|a| a.as_text().ok())
        .map(String::from);
    let nas = match state
        .registry
        .find(&state.db, &src.ip().to_string(), nas_identifier.as_deref())
    {
        Ok(Some(nas)) => nas,
        Ok(None) => {
            warn!(%src, "unknown NAS, dropping");
            return;
        }
        Err(e) => {
            error!(%src, error = %e, "nas lookup failed");
            return;
        }
    };

    let reply = match (kind, code) {
        (PacketKind::Auth, Code::AccessRequest) => handle_access_request(state, &request, &nas),
        (PacketKind::Acct, Code::AccountingRequest) => {
            if request.verify_request_authenticator(&nas.shared_secret).is_err() {
                warn!(%src, "bad accounting request authenticator, dropping");
                return;
            }
            handle_accounting_request(state, &request, &nas.ip_address)
        }
        _ => {
            warn!(%src, ?code, "unexpected code for this socket, dropping");
            return;
        }
    };

    match reply.encode(identifier, &authenticator, &nas.shared_secret) {
        Ok(bytes) => {
            if let Err(e) = socket.send_to(&bytes, src).await {
                error!(%src, error = %e, "failed to send reply");
            }
        }
        Err(e) => error!(%src, error = %e, "failed to encode reply"),
    }
}

#[derive(Debug)]
pub enum DispatcherError {
    Bind(std::io::Error),
}

impl std::fmt::Display for DispatcherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "failed to bind UDP socket: {e}"),
        }
    }
}

impl std::error::Error for DispatcherError {}
