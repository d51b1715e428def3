//! # rbac-lens
//!
//! This crate reconstructs a subject's effective Kubernetes RBAC
//! permissions against a multi-tenant management cluster and evaluates
//! named permission "use cases" against them.
//!
//! ## Features
//!
//! - Per-namespace permission maps built from rules reviews, with
//!   wildcard compaction for O(1) lookups
//! - Role/binding resolution for subjects other than the caller
//! - Cluster-scope resolution with a low-privilege probing fallback
//! - Declarative, JSON-configured use cases with per-organization
//!   statuses and three-valued category roll-ups
//! - Explicit request memoization with tag-based invalidation
//! - A trait-based client seam with a `kube`-backed production
//!   implementation and an in-memory fixture implementation
//!
//! ## Quick Start
//!
//! ```rust
//! use rbac_lens::{ResourceRule, RulesReview, compute_permissions};
//!
//! let permissions = compute_permissions([(
//!     "org-giantswarm",
//!     RulesReview::complete(vec![ResourceRule::new(
//!         ["get", "list", "watch"],
//!         [""],
//!         ["pods"],
//!     )]),
//! )]);
//!
//! assert!(permissions.allows("org-giantswarm", "get", "", "pods", None));
//! // Unknown namespaces are denied, never guessed.
//! assert!(!permissions.allows("org-unknown", "get", "", "pods", None));
//! ```
//!
//! ## Audit Logging
//!
//! When the `audit` feature is enabled, permission computations are
//! logged through the standard log facade. Initialize logging early:
//!
//! ```rust,ignore
//! rbac_lens::init_audit_logger();
//! // Configure via RUST_LOG, e.g. RUST_LOG=info,rbac_lens=debug
//! ```

#[cfg(feature = "audit")]
pub fn init_audit_logger() {
    env_logger::init();
}

pub mod cache;
pub mod client;
mod cluster_scope;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod key;
pub mod kube_client;
pub mod map;
pub mod metrics;
pub mod normalize;
pub mod org;
pub mod provider;
pub mod roles;
pub mod rule;
pub mod subject;
pub mod use_case;

// Re-export main types for convenience
pub use crate::{
    client::{MemoryClient, PlatformClient},
    engine::{EngineConfig, PermissionEngine},
    error::Error,
    key::PermissionKey,
    kube_client::KubeClient,
    map::{NamespacePermissions, PermissionMap, VerbSet},
    metrics::{EngineMetrics, MetricsSnapshot},
    normalize::{compute_permissions, normalize_rules},
    org::Organization,
    provider::Provider,
    roles::{BindingEntry, RoleEntry, RoleRefKind, RoleRuleMap, rules_review_from_bindings},
    rule::{AccessAttributes, ResourceRule, RulesReview},
    subject::{BindingSubject, RbacSubject, SubjectKind, parse_subjects},
    use_case::{
        CategoryStatus, UseCase, UseCaseStatuses, category_statuses, parse_use_cases,
        statuses_for_use_cases,
    },
};
