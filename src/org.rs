//! Organizations: the platform's tenancy unit.
//!
//! Every organization owns one namespace. When the API object does not
//! carry the namespace explicitly, it follows the `org-{name}`
//! convention.

use serde::{Deserialize, Serialize};

/// The API group of the organization CRD.
pub const ORGANIZATION_API_GROUP: &str = "security.giantswarm.io";

/// A platform organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// The organization name (its id).
    pub name: String,
    /// The organization's namespace, when reported by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Organization {
    /// An organization relying on the namespace naming convention.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// An organization with an explicitly reported namespace.
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// The namespace holding the organization's resources.
    pub fn effective_namespace(&self) -> String {
        self.namespace
            .clone()
            .unwrap_or_else(|| namespace_from_org_name(&self.name))
    }
}

/// The conventional namespace name for an organization.
pub fn namespace_from_org_name(name: &str) -> String {
    format!("org-{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_convention_fallback() {
        assert_eq!(Organization::new("acme").effective_namespace(), "org-acme");
    }

    #[test]
    fn test_reported_namespace_wins() {
        let org = Organization::with_namespace("acme", "tenant-acme");
        assert_eq!(org.effective_namespace(), "tenant-acme");
    }
}
