//! Tenantry control-plane library crate.
//!
//! # Purpose
//! Exposes the tenant data model, the resource store, the reconcilers and
//! their manager, and the HTTP API for use by the binary and tests.
//!
//! # Notes
//! Admission (who may see or change a tenant) lives in the API layer; the
//! reconcilers converge stored objects and never consult caller identity.
pub mod api;
pub mod app;
pub mod config;
pub mod controllers;
pub mod membership;
pub mod model;
pub mod namespaces;
pub mod observability;
pub mod store;
