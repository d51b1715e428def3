//! The platform client seam.
//!
//! The engine never talks HTTP itself; it consumes a [`PlatformClient`],
//! which issues the Kubernetes-style authorization and RBAC API calls.
//! The production implementation lives in [`crate::kube_client`];
//! [`MemoryClient`] serves tests and fixtures.

use crate::error::{Error, Result};
use crate::org::Organization;
use crate::roles::{BindingEntry, RoleEntry};
use crate::rule::{AccessAttributes, RulesReview};
use crate::subject::RbacSubject;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// The API operations the engine needs.
///
/// Review operations map to `authorization.k8s.io/v1`: the rules review
/// is namespace-scoped "what can I do here"; the access review is a
/// single verb/resource/group question, answered for the caller itself
/// or for an arbitrary subject. Listing operations map to
/// `rbac.authorization.k8s.io/v1` plus the platform's organization API.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Run a rules review for the caller in the given namespace.
    async fn review_rules_for_self(&self, namespace: &str) -> Result<RulesReview>;

    /// Answer a single authorization question.
    ///
    /// With `subject: None` the question concerns the caller itself;
    /// otherwise it concerns the given subject (which requires the
    /// corresponding review permission on the API server).
    async fn review_access(
        &self,
        subject: Option<&RbacSubject>,
        attributes: &AccessAttributes,
    ) -> Result<bool>;

    /// List namespaced roles across all namespaces.
    async fn list_roles(&self) -> Result<Vec<RoleEntry>>;

    /// List cluster roles.
    async fn list_cluster_roles(&self) -> Result<Vec<RoleEntry>>;

    /// List namespaced role bindings across all namespaces.
    async fn list_role_bindings(&self) -> Result<Vec<BindingEntry>>;

    /// List cluster role bindings.
    async fn list_cluster_role_bindings(&self) -> Result<Vec<BindingEntry>>;

    /// List the platform's organizations.
    async fn list_organizations(&self) -> Result<Vec<Organization>>;

    /// Get one organization by name.
    async fn get_organization(&self, name: &str) -> Result<Organization>;
}

/// Issue an access review with probe semantics: a forbidden or
/// not-found answer means "false" for the probed item, anything else is
/// propagated.
pub(crate) async fn probe_access<C>(
    client: &C,
    metrics: &crate::metrics::EngineMetrics,
    subject: Option<&RbacSubject>,
    attributes: &AccessAttributes,
) -> Result<bool>
where
    C: PlatformClient + ?Sized,
{
    match client.review_access(subject, attributes).await {
        Ok(allowed) => Ok(allowed),
        Err(err) if err.is_forbidden() => {
            metrics.record_forbidden();
            Ok(false)
        }
        Err(err) if err.is_not_found() => Ok(false),
        Err(err) => Err(err),
    }
}

/// The stable string form of a review subject, used as a cache-key
/// component.
pub(crate) fn subject_key(subject: Option<&RbacSubject>) -> String {
    match subject {
        None => "self".to_string(),
        Some(subject) => format!(
            "user={};groups={}",
            subject.user.as_deref().unwrap_or_default(),
            subject.groups.join(",")
        ),
    }
}

/// In-memory fixture implementation of [`PlatformClient`].
///
/// Built once from fixtures, then read-only. Unconfigured rules reviews
/// fail with `NotFound`; unconfigured access questions answer `false`;
/// listings named in `forbidden` fail with `Forbidden`.
#[derive(Debug, Default)]
pub struct MemoryClient {
    rules_reviews: HashMap<String, RulesReview>,
    access: HashMap<(String, AccessAttributes), bool>,
    roles: Vec<RoleEntry>,
    cluster_roles: Vec<RoleEntry>,
    role_bindings: Vec<BindingEntry>,
    cluster_role_bindings: Vec<BindingEntry>,
    organizations: Vec<Organization>,
    forbidden: HashSet<String>,
    unreachable: HashSet<String>,
}

impl MemoryClient {
    /// Create an empty fixture client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the rules review returned for a namespace.
    pub fn with_rules_review(mut self, namespace: impl Into<String>, review: RulesReview) -> Self {
        self.rules_reviews.insert(namespace.into(), review);
        self
    }

    /// Record a positive access decision for the caller itself.
    pub fn allow_self(self, attributes: AccessAttributes) -> Self {
        self.with_access(None, attributes, true)
    }

    /// Record an access decision.
    pub fn with_access(
        mut self,
        subject: Option<&RbacSubject>,
        attributes: AccessAttributes,
        allowed: bool,
    ) -> Self {
        self.access
            .insert((subject_key(subject), attributes), allowed);
        self
    }

    /// Set the namespaced roles returned by listings.
    pub fn with_roles(mut self, roles: Vec<RoleEntry>) -> Self {
        self.roles = roles;
        self
    }

    /// Set the cluster roles returned by listings.
    pub fn with_cluster_roles(mut self, roles: Vec<RoleEntry>) -> Self {
        self.cluster_roles = roles;
        self
    }

    /// Set the role bindings returned by listings.
    pub fn with_role_bindings(mut self, bindings: Vec<BindingEntry>) -> Self {
        self.role_bindings = bindings;
        self
    }

    /// Set the cluster role bindings returned by listings.
    pub fn with_cluster_role_bindings(mut self, bindings: Vec<BindingEntry>) -> Self {
        self.cluster_role_bindings = bindings;
        self
    }

    /// Set the organizations returned by listings.
    pub fn with_organizations(mut self, organizations: Vec<Organization>) -> Self {
        self.organizations = organizations;
        self
    }

    /// Make a listing fail with `Forbidden`. Recognized names: `roles`,
    /// `clusterroles`, `rolebindings`, `clusterrolebindings`,
    /// `organizations`.
    pub fn with_forbidden(mut self, resource: impl Into<String>) -> Self {
        self.forbidden.insert(resource.into());
        self
    }

    /// Make an operation fail with a transport error. Recognized names
    /// are the same as for [`MemoryClient::with_forbidden`], plus
    /// `accessreviews`.
    pub fn with_unreachable(mut self, resource: impl Into<String>) -> Self {
        self.unreachable.insert(resource.into());
        self
    }

    fn guard(&self, resource: &str) -> Result<()> {
        if self.unreachable.contains(resource) {
            return Err(Error::api(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("{resource}: connection reset"),
            )));
        }

        if self.forbidden.contains(resource) {
            return Err(Error::Forbidden(resource.to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl PlatformClient for MemoryClient {
    async fn review_rules_for_self(&self, namespace: &str) -> Result<RulesReview> {
        self.rules_reviews
            .get(namespace)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "SelfSubjectRulesReview".to_string(),
                name: namespace.to_string(),
            })
    }

    async fn review_access(
        &self,
        subject: Option<&RbacSubject>,
        attributes: &AccessAttributes,
    ) -> Result<bool> {
        self.guard("accessreviews")?;

        Ok(self
            .access
            .get(&(subject_key(subject), attributes.clone()))
            .copied()
            .unwrap_or(false))
    }

    async fn list_roles(&self) -> Result<Vec<RoleEntry>> {
        self.guard("roles")?;
        Ok(self.roles.clone())
    }

    async fn list_cluster_roles(&self) -> Result<Vec<RoleEntry>> {
        self.guard("clusterroles")?;
        Ok(self.cluster_roles.clone())
    }

    async fn list_role_bindings(&self) -> Result<Vec<BindingEntry>> {
        self.guard("rolebindings")?;
        Ok(self.role_bindings.clone())
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<BindingEntry>> {
        self.guard("clusterrolebindings")?;
        Ok(self.cluster_role_bindings.clone())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        self.guard("organizations")?;
        Ok(self.organizations.clone())
    }

    async fn get_organization(&self, name: &str) -> Result<Organization> {
        self.guard("organizations:get")?;

        self.organizations
            .iter()
            .find(|org| org.name == name)
            .cloned()
            .ok_or_else(|| Error::NotFound {
                kind: "Organization".to_string(),
                name: name.to_string(),
            })
    }
}
