//! Caller identity forwarded by the authenticating front proxy.
//!
//! # Purpose
//! Reads `X-Remote-User` and `X-Remote-Group` into a `CallerIdentity`.
//!
//! # Security considerations
//! - The control plane trusts these headers as-is; it must only be reachable
//!   through a proxy that strips client-supplied copies.
//! - A missing or empty user header yields no identity, which the visibility
//!   checks admit with a warning.
use axum::http::HeaderMap;
use tenantry_authz::CallerIdentity;

pub const REMOTE_USER_HEADER: &str = "x-remote-user";
pub const REMOTE_GROUP_HEADER: &str = "x-remote-group";

pub fn caller_identity(headers: &HeaderMap) -> Option<CallerIdentity> {
    let username = headers
        .get(REMOTE_USER_HEADER)?
        .to_str()
        .ok()?
        .trim();
    if username.is_empty() {
        return None;
    }
    let groups = headers
        .get_all(REMOTE_GROUP_HEADER)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|group| !group.is_empty())
        .map(str::to_string)
        .collect();
    Some(CallerIdentity::new(username, groups))
}
