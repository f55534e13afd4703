//! HTTP API request/response types.
//!
//! # Purpose
//! Shared payload shapes for the control-plane REST API. Objects themselves
//! are returned in their stored shape (`metadata`, `spec`, `status`).
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthStatus {
    pub status: String,
    pub store: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub api_group: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    /// Store version the list reflects; pass it to a watch to resume from here.
    pub resource_version: u64,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct WatchParams {
    pub resource_version: Option<u64>,
}
