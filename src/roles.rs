//! Role and binding resolution for subjects other than "self".
//!
//! Only self-review is a first-class API operation; reconstructing the
//! permissions of an arbitrary user or group means fetching Roles,
//! ClusterRoles and bindings, matching the subject against binding
//! subject lists, and resolving each binding's role reference back to
//! its rule list.

use crate::rule::{ResourceRule, RulesReview};
use crate::subject::{BindingSubject, RbacSubject};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of role a binding references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleRefKind {
    /// A namespaced `Role`.
    Role,
    /// A cluster-scoped `ClusterRole`.
    ClusterRole,
}

/// A `Role` or `ClusterRole`, reduced to its name, namespace and rules.
///
/// `namespace` is `None` for cluster roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// The role name.
    pub name: String,
    /// The namespace; `None` for a `ClusterRole`.
    pub namespace: Option<String>,
    /// The role's resource rules.
    pub rules: Vec<ResourceRule>,
}

impl RoleEntry {
    /// A namespaced role.
    pub fn namespaced(
        namespace: impl Into<String>,
        name: impl Into<String>,
        rules: Vec<ResourceRule>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            rules,
        }
    }

    /// A cluster role.
    pub fn cluster(name: impl Into<String>, rules: Vec<ResourceRule>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            rules,
        }
    }
}

/// A `RoleBinding` or `ClusterRoleBinding`, reduced to its role
/// reference and subjects. `namespace` is `None` for cluster bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingEntry {
    /// The binding name.
    pub name: String,
    /// The namespace; `None` for a `ClusterRoleBinding`.
    pub namespace: Option<String>,
    /// The kind of the referenced role.
    pub role_kind: RoleRefKind,
    /// The name of the referenced role.
    pub role_name: String,
    /// The subjects the binding grants the role to.
    pub subjects: Vec<BindingSubject>,
}

impl BindingEntry {
    /// A namespaced role binding.
    pub fn namespaced(
        namespace: impl Into<String>,
        name: impl Into<String>,
        role_kind: RoleRefKind,
        role_name: impl Into<String>,
        subjects: Vec<BindingSubject>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
            role_kind,
            role_name: role_name.into(),
            subjects,
        }
    }

    /// A cluster role binding.
    pub fn cluster(
        name: impl Into<String>,
        role_name: impl Into<String>,
        subjects: Vec<BindingSubject>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            role_kind: RoleRefKind::ClusterRole,
            role_name: role_name.into(),
            subjects,
        }
    }

    /// Whether the binding grants its role to the given subject.
    pub fn grants_to(&self, subject: &RbacSubject) -> bool {
        self.subjects.iter().any(|s| subject.matches(s))
    }
}

/// Rules per role, per namespace. The `""` pseudo-namespace holds cluster
/// roles. Built once per Role/ClusterRole listing and reused across
/// binding resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRuleMap(BTreeMap<String, BTreeMap<String, Vec<ResourceRule>>>);

impl RoleRuleMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from a role listing. Roles with no resource rules
    /// still get an (empty) entry.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a RoleEntry>) -> Self {
        let mut map = Self::new();

        for role in roles {
            let namespace = role.namespace.clone().unwrap_or_default();
            map.0
                .entry(namespace)
                .or_default()
                .insert(role.name.clone(), role.rules.clone());
        }

        map
    }

    /// The rules of a role in a namespace (`""` for cluster roles).
    pub fn rules_for(&self, namespace: &str, role_name: &str) -> Option<&[ResourceRule]> {
        self.0
            .get(namespace)
            .and_then(|roles| roles.get(role_name))
            .map(Vec::as_slice)
    }

    /// The roles recorded for a namespace.
    pub fn namespace(&self, namespace: &str) -> Option<&BTreeMap<String, Vec<ResourceRule>>> {
        self.0.get(namespace)
    }

    /// Number of namespaces with recorded roles.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no role was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Synthesize a rules review for a subject from the bindings that grant
/// to it.
///
/// Each matching binding's role reference is resolved through the rule
/// map (`ClusterRole` references resolve through the `""`
/// pseudo-namespace, `Role` references through the binding's own
/// namespace). Rule lists are unioned and deduplicated by structural
/// equality. An empty subject yields an empty review.
pub fn rules_review_from_bindings(
    bindings: &[BindingEntry],
    rules: &RoleRuleMap,
    subject: &RbacSubject,
) -> RulesReview {
    let mut collected: Vec<ResourceRule> = Vec::new();

    if subject.is_empty() {
        return RulesReview::complete(collected);
    }

    for binding in bindings {
        if !binding.grants_to(subject) {
            continue;
        }

        let namespace = match binding.role_kind {
            RoleRefKind::ClusterRole => "",
            RoleRefKind::Role => binding.namespace.as_deref().unwrap_or_default(),
        };

        let Some(role_rules) = rules.rules_for(namespace, &binding.role_name) else {
            continue;
        };

        for rule in role_rules {
            if !collected.contains(rule) {
                collected.push(rule.clone());
            }
        }
    }

    RulesReview::complete(collected)
}
