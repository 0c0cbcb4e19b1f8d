use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, header::COOKIE, request::Parts},
};

use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_id";
pub const FORWARDED_FOR: &str = "x-forwarded-for";
pub const REAL_IP: &str = "x-real-ip";
pub const UNKNOWN_IP: &str = "unknown";

/// Longest header value accepted as a bucket key.
pub const MAX_KEY_LEN: usize = 64;

/// Who is asking, as far as rate limiting cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub ip: String,
    pub session: Option<String>,
}

impl ClientIdentity {
    /// Proxy headers are only read when `trust_proxy` is set, otherwise the socket address is the
    /// client.
    pub fn from_parts(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> Self {
        Self {
            ip: client_ip(headers, peer, trust_proxy),
            session: session_token(headers),
        }
    }
}

impl FromRequestParts<Arc<AppState>> for ClientIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| *address);

        Ok(Self::from_parts(
            &parts.headers,
            peer,
            state.config.trust_proxy_headers,
        ))
    }
}

fn normalized(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.len() > MAX_KEY_LEN {
        return None;
    }

    value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'.' || b == b':' || b == b'-' || b == b'_')
        .then(|| value.to_string())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Behind our proxy the last `X-Forwarded-For` hop is the one it appended, earlier hops are
/// whatever the client sent.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = header(headers, FORWARDED_FOR)
            .and_then(|value| value.rsplit(',').map(str::trim).find(|hop| !hop.is_empty()))
            .and_then(normalized);

        if let Some(ip) = forwarded.or_else(|| header(headers, REAL_IP).and_then(normalized)) {
            return ip;
        }
    }

    peer.map(|address| address.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| normalized(value))
}
