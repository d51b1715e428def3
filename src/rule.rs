//! Resource rules, mirroring `authorization.k8s.io/v1` rule objects.

use serde::{Deserialize, Serialize};

/// One authorization rule: the cartesian product of its API groups and
/// resources is granted the listed verbs, optionally narrowed to specific
/// resource names.
///
/// Rules compare structurally; resolving a subject's bindings unions rule
/// lists deduplicated by this equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRule {
    /// Granted verbs. `"*"` grants all verbs.
    pub verbs: Vec<String>,
    /// API groups the rule applies to. `""` is the core group, `"*"` all
    /// groups.
    #[serde(default)]
    pub api_groups: Vec<String>,
    /// Resources (plural names) the rule applies to. `"*"` means all
    /// resources of the group.
    #[serde(default)]
    pub resources: Vec<String>,
    /// Optional narrowing to specific object names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_names: Option<Vec<String>>,
}

impl ResourceRule {
    /// Create a rule without resource-name narrowing.
    pub fn new<S: Into<String>>(
        verbs: impl IntoIterator<Item = S>,
        api_groups: impl IntoIterator<Item = S>,
        resources: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            verbs: verbs.into_iter().map(Into::into).collect(),
            api_groups: api_groups.into_iter().map(Into::into).collect(),
            resources: resources.into_iter().map(Into::into).collect(),
            resource_names: None,
        }
    }

    /// Narrow the rule to specific resource names.
    pub fn with_resource_names<S: Into<String>>(
        mut self,
        names: impl IntoIterator<Item = S>,
    ) -> Self {
        self.resource_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// The `cluster-admin` style rule: every verb on everything.
    pub fn all_access() -> Self {
        Self::new(["*"], ["*"], ["*"])
    }
}

/// The outcome of a rules review for one namespace.
///
/// `incomplete` means the authorization backend could not fully evaluate
/// the rules; such a review contributes no permissions at all for its
/// namespace, which keeps "denied" distinguishable from "evaluation
/// failed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesReview {
    /// Whether the backend could not fully evaluate the rules.
    pub incomplete: bool,
    /// The rules that apply to the reviewed subject in the namespace.
    pub resource_rules: Vec<ResourceRule>,
}

impl RulesReview {
    /// A complete review carrying the given rules.
    pub fn complete(resource_rules: Vec<ResourceRule>) -> Self {
        Self {
            incomplete: false,
            resource_rules,
        }
    }

    /// An incomplete review; contributes nothing to a permission map.
    pub fn incomplete() -> Self {
        Self {
            incomplete: true,
            resource_rules: Vec::new(),
        }
    }
}

/// The attributes of a single authorization question: can `verb` be
/// performed on `resource` in `api_group`, optionally in a namespace and
/// for a specific object name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessAttributes {
    /// The verb to check (e.g. `get`, `list`, `create`).
    pub verb: String,
    /// The API group of the resource. `""` is the core group.
    pub api_group: String,
    /// The resource (plural name).
    pub resource: String,
    /// Namespace of the question; empty for cluster-scoped questions.
    pub namespace: String,
    /// Optional specific object name.
    pub name: String,
}

impl AccessAttributes {
    /// A cluster-scoped question.
    pub fn cluster(
        verb: impl Into<String>,
        api_group: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            verb: verb.into(),
            api_group: api_group.into(),
            resource: resource.into(),
            namespace: String::new(),
            name: String::new(),
        }
    }

    /// A namespaced question.
    pub fn namespaced(
        namespace: impl Into<String>,
        verb: impl Into<String>,
        api_group: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            verb: verb.into(),
            api_group: api_group.into(),
            resource: resource.into(),
            namespace: namespace.into(),
            name: String::new(),
        }
    }

    /// Narrow the question to a specific object.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = ResourceRule::new(["get", "list"], [""], ["pods"]);
        let b = ResourceRule::new(["get", "list"], [""], ["pods"]);
        let c = ResourceRule::new(["get", "list"], [""], ["pods"]).with_resource_names(["web"]);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_deserializes_kubernetes_shape() {
        let rule: ResourceRule = serde_json::from_str(
            r#"{"verbs":["get"],"apiGroups":["apps"],"resources":["deployments"],"resourceNames":["web"]}"#,
        )
        .unwrap();

        assert_eq!(rule.verbs, ["get"]);
        assert_eq!(rule.api_groups, ["apps"]);
        assert_eq!(rule.resources, ["deployments"]);
        assert_eq!(rule.resource_names.as_deref(), Some(&["web".to_string()][..]));
    }

    #[test]
    fn test_missing_groups_default_to_empty() {
        let rule: ResourceRule = serde_json::from_str(r#"{"verbs":["get"]}"#).unwrap();
        assert!(rule.api_groups.is_empty());
        assert!(rule.resources.is_empty());
        assert!(rule.resource_names.is_none());
    }

    #[test]
    fn test_incomplete_review_is_empty() {
        let review = RulesReview::incomplete();
        assert!(review.incomplete);
        assert!(review.resource_rules.is_empty());
    }
}
