//! Tenantry authorization primitives shared by the control plane.
//!
//! # Purpose
//! Centralizes the permission model used by tenant objects: RBAC policy rules and
//! the clamp that bounds owner-requested rules by an administrator ceiling, the
//! subject references that make up owner and member lists, and the visibility
//! checks applied to every read, write and watch of a tenant.
//!
//! # How it fits
//! The control-plane reconcilers call [`clamp`] when accepting an
//! `OrganizationRole`, and the HTTP layer calls the visibility checks with the
//! [`CallerIdentity`] forwarded by the authenticating proxy.
//!
//! # Key invariants
//! - Clamped rules are field-wise subsets of both the ceiling and the request.
//! - `*` absorbs on either side of an intersection.
//! - An absent caller identity is admitted (fail-open) and logged.
//!
//! # Examples
//! ```rust
//! use tenantry_authz::{PolicyRule, clamp};
//!
//! let ceiling = vec![PolicyRule::resource(&["*"], &["*"], &["get", "list"])];
//! let requested = vec![PolicyRule::resource(&["apps.io"], &["deployments"], &["get", "delete"])];
//! let accepted = clamp(&ceiling, &requested);
//! assert_eq!(accepted[0].verbs, vec!["get".to_string()]);
//! ```
//!
//! # Common pitfalls
//! - Treating an empty `resourceNames` as "none": it means unrestricted.
//! - Comparing subjects without normalizing; use [`normalize_subjects`].

mod clamp;
mod errors;
mod identity;
mod rule;
mod subject;
mod visibility;

pub use clamp::{clamp, intersect_rule};
pub use errors::{AccessError, AccessResult};
pub use identity::{CallerIdentity, ServiceAccountRef};
pub use rule::{PolicyRule, WILDCARD};
pub use subject::{RBAC_API_GROUP, Subject, SubjectKind, normalize_subjects};
pub use visibility::{
    Ownable, check_creator_is_owner, check_membership, check_ownership, is_member, is_owner,
};
