//! Use cases: named bundles of required permissions, and their
//! evaluation against a permission map.
//!
//! The use-case list is supplied externally as a JSON document; the
//! engine never hardcodes it. Evaluation is a pure reduction over an
//! already-computed [`PermissionMap`].

use crate::error::Result;
use crate::map::PermissionMap;
use crate::org::Organization;
use crate::provider::Provider;
use crate::rule::ResourceRule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The scope a use case is evaluated against.
///
/// Either `cluster: true`, or a list of namespaces where `"*"` means
/// "once per organization" and `"default"` marks a global/shared
/// namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCaseScope {
    /// Evaluate against the cluster scope (the `""` pseudo-namespace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<bool>,
    /// Evaluate against these namespaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
}

/// A named, categorized bundle of required permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCase {
    /// Display name; also the key of the computed statuses.
    pub name: String,
    /// Category used by the aggregate roll-up.
    pub category: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// The scope to evaluate in.
    pub scope: UseCaseScope,
    /// The required permissions; all of them must be granted.
    pub permissions: Vec<ResourceRule>,
}

/// A single required `(verb, resource, apiGroup)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionTuple {
    /// The required verb.
    pub verb: String,
    /// The required resource (plural name).
    pub resource: String,
    /// The resource's API group.
    pub api_group: String,
}

impl UseCase {
    /// Whether the use case is evaluated against the cluster scope.
    pub fn is_cluster_scoped(&self) -> bool {
        self.scope.cluster == Some(true)
    }

    /// Whether the use case is evaluated once per organization.
    pub fn is_per_organization(&self) -> bool {
        self.scope
            .namespaces
            .as_ref()
            .is_some_and(|namespaces| namespaces.first().map(String::as_str) == Some("*"))
    }

    /// Whether the use case concerns a global/shared scope rather than
    /// organization resources.
    pub fn is_global(&self) -> bool {
        self.is_cluster_scoped()
            || self
                .scope
                .namespaces
                .as_ref()
                .is_some_and(|namespaces| namespaces.first().map(String::as_str) == Some("default"))
    }

    /// The cartesian expansion of the use case's permission
    /// requirements into `(verb, resource, apiGroup)` triples.
    pub fn tuples(&self) -> Vec<PermissionTuple> {
        permission_tuples(&self.permissions)
    }
}

/// Expand permission requirements into their cartesian
/// `{verbs} × {resources} × {apiGroups}` triples.
pub fn permission_tuples(permissions: &[ResourceRule]) -> Vec<PermissionTuple> {
    let mut tuples = Vec::new();

    for permission in permissions {
        for verb in &permission.verbs {
            for resource in &permission.resources {
                for api_group in &permission.api_groups {
                    tuples.push(PermissionTuple {
                        verb: verb.clone(),
                        resource: resource.clone(),
                        api_group: api_group.clone(),
                    });
                }
            }
        }
    }

    tuples
}

/// Parse the externally supplied use-case JSON document.
pub fn parse_use_cases(json: &str) -> Result<Vec<UseCase>> {
    Ok(serde_json::from_str(json)?)
}

/// Pass/fail per use case name, per organization name (`""` for
/// non-organization scopes).
pub type UseCaseStatuses = BTreeMap<String, BTreeMap<String, bool>>;

/// Evaluate use cases against a permission map.
///
/// A use case passes in a namespace iff every applicable required triple
/// is granted there. Triples for resources that do not exist on the
/// active provider's infrastructure are excluded from the AND.
/// Per-organization use cases produce one status per given organization;
/// without a given organization list their status map stays empty.
pub fn statuses_for_use_cases(
    permissions: &PermissionMap,
    use_cases: &[UseCase],
    provider: Provider,
    organizations: Option<&[Organization]>,
) -> UseCaseStatuses {
    let mut statuses = UseCaseStatuses::new();

    for use_case in use_cases {
        let tuples: Vec<PermissionTuple> = use_case
            .tuples()
            .into_iter()
            .filter(|tuple| provider.is_resource_applicable(&tuple.api_group, &tuple.resource))
            .collect();

        let entry = statuses.entry(use_case.name.clone()).or_default();

        if use_case.is_cluster_scoped() {
            entry.insert(String::new(), allows_all(permissions, "", &tuples));
            continue;
        }

        if use_case.is_per_organization() {
            for org in organizations.unwrap_or_default() {
                let namespace = org.effective_namespace();
                entry.insert(org.name.clone(), allows_all(permissions, &namespace, &tuples));
            }
            continue;
        }

        if let Some(namespaces) = &use_case.scope.namespaces {
            let granted = namespaces
                .iter()
                .all(|namespace| allows_all(permissions, namespace, &tuples));
            entry.insert(String::new(), granted);
        }
    }

    statuses
}

fn allows_all(permissions: &PermissionMap, namespace: &str, tuples: &[PermissionTuple]) -> bool {
    tuples.iter().all(|tuple| {
        permissions.allows(namespace, &tuple.verb, &tuple.api_group, &tuple.resource, None)
    })
}

/// The aggregate status of a category of use cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryStatus {
    /// Every use case of the category passes.
    Granted,
    /// Every use case of the category fails.
    Denied,
    /// Some pass, some fail.
    Partial,
}

/// Roll use-case statuses up per category and organization.
///
/// A category is `Granted` where all of its use cases pass, `Denied`
/// where all fail, and `Partial` for any mix.
pub fn category_statuses(
    use_cases: &[UseCase],
    statuses: &UseCaseStatuses,
) -> BTreeMap<String, BTreeMap<String, CategoryStatus>> {
    let mut rollup: BTreeMap<String, BTreeMap<String, Vec<bool>>> = BTreeMap::new();

    for use_case in use_cases {
        let Some(use_case_statuses) = statuses.get(&use_case.name) else {
            continue;
        };

        let category = rollup.entry(use_case.category.clone()).or_default();
        for (org, granted) in use_case_statuses {
            category.entry(org.clone()).or_default().push(*granted);
        }
    }

    rollup
        .into_iter()
        .map(|(category, orgs)| {
            let orgs = orgs
                .into_iter()
                .map(|(org, outcomes)| {
                    let status = if outcomes.iter().all(|granted| *granted) {
                        CategoryStatus::Granted
                    } else if outcomes.iter().all(|granted| !granted) {
                        CategoryStatus::Denied
                    } else {
                        CategoryStatus::Partial
                    };

                    (org, status)
                })
                .collect();

            (category, orgs)
        })
        .collect()
}
