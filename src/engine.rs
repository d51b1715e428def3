//! Core permission engine implementation.
//!
//! This module contains the central `PermissionEngine`, which
//! orchestrates the fetch-and-aggregate cycles over an injected
//! [`PlatformClient`]: the self rules-review fan-out, role/binding
//! resolution for arbitrary subjects, cluster-scope escalation and
//! use-case evaluation.
//!
//! # Concurrency
//!
//! Every invocation builds its own maps from scratch and returns a
//! fresh result; no previously published map is ever mutated in place.
//! Fan-out batches use the combinators from [`crate::fanout`], which
//! make the two failure semantics (all-or-fail for authoritative
//! listings, best-effort for probes) visible at each call site.

#[cfg(feature = "audit")]
use log::info;

use crate::cache::{CacheTag, RequestCache, access_review_key};
use crate::client::{PlatformClient, probe_access, subject_key};
use crate::cluster_scope;
use crate::error::Result;
use crate::fanout::{all_or_fail, settle_ok};
use crate::map::PermissionMap;
use crate::metrics::EngineMetrics;
use crate::normalize::compute_permissions;
use crate::org::{ORGANIZATION_API_GROUP, Organization};
use crate::provider::Provider;
use crate::roles::{BindingEntry, RoleRuleMap, rules_review_from_bindings};
use crate::rule::AccessAttributes;
use crate::subject::RbacSubject;
use crate::use_case::{UseCase, UseCaseStatuses, statuses_for_use_cases};
use std::collections::{BTreeMap, HashSet};

/// Configuration for the permission engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The platform namespace that, next to `default`, always holds
    /// shared resources.
    pub platform_namespace: String,
    /// The infrastructure provider the platform runs on.
    pub provider: Provider,
    /// Whether to memoize fetch results.
    pub enable_caching: bool,
    /// Request-cache TTL in seconds.
    pub cache_ttl_seconds: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform_namespace: "giantswarm".to_string(),
            provider: Provider::Aws,
            enable_caching: true,
            cache_ttl_seconds: 300,
        }
    }
}

impl EngineConfig {
    /// Default configuration for the given provider.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            ..Self::default()
        }
    }
}

/// The permission aggregation and evaluation engine.
pub struct PermissionEngine<C>
where
    C: PlatformClient,
{
    client: C,
    config: EngineConfig,
    metrics: EngineMetrics,
    permission_cache: RequestCache<PermissionMap>,
    access_cache: RequestCache<BTreeMap<String, bool>>,
}

impl<C> PermissionEngine<C>
where
    C: PlatformClient,
{
    /// Create an engine over the given client.
    pub fn new(client: C, config: EngineConfig) -> Self {
        let metrics = EngineMetrics::new();

        Self {
            client,
            metrics: metrics.clone(),
            permission_cache: RequestCache::new(config.cache_ttl_seconds, metrics.clone()),
            access_cache: RequestCache::new(config.cache_ttl_seconds, metrics),
            config,
        }
    }

    /// The engine's metrics collector.
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// The injected client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the caller's namespaced permissions.
    ///
    /// One rules review per namespace: every given organization's
    /// namespace, plus `default` and the platform namespace. The
    /// fan-out is best-effort; namespaces whose review fails are left
    /// out of the map ("unknown", not "denied").
    pub async fn fetch_permissions(
        &self,
        organizations: &[Organization],
    ) -> Result<PermissionMap> {
        let namespaces = self.review_namespaces(organizations);
        let cache_key = format!("permissions/self/{}", namespaces.join(","));

        if self.config.enable_caching {
            if let Some(cached) = self.permission_cache.get(&cache_key) {
                return Ok(cached);
            }
        }

        let reviews = settle_ok(
            namespaces.iter().map(|namespace| {
                let client = &self.client;
                let metrics = &self.metrics;

                async move {
                    metrics.record_rules_review();
                    let review = client.review_rules_for_self(namespace).await?;
                    Ok((namespace.clone(), review))
                }
            }),
            "self rules review",
        )
        .await;

        let permissions = compute_permissions(reviews);

        #[cfg(feature = "audit")]
        info!(
            "computed self permissions for {} of {} namespaces",
            permissions.len(),
            namespaces.len()
        );

        if self.config.enable_caching {
            self.permission_cache.insert(
                cache_key,
                permissions.clone(),
                Self::tags(subject_key(None), &namespaces),
            );
        }

        Ok(permissions)
    }

    /// Reconstruct the namespaced permissions of an arbitrary subject.
    ///
    /// There is no rules-review API for other subjects, so this path
    /// lists Roles, ClusterRoles and RoleBindings, matches the subject
    /// against binding subject lists, and resolves matched bindings back
    /// to rules. The listings are authoritative: a forbidden response is
    /// a hard failure, no partial silent result.
    pub async fn fetch_permissions_for_subject(
        &self,
        subject: &RbacSubject,
        organizations: &[Organization],
    ) -> Result<PermissionMap> {
        let namespaces = self.accessible_namespaces(organizations).await?;
        let cache_key = format!(
            "permissions/{}/{}",
            subject_key(Some(subject)),
            namespaces.join(",")
        );

        if self.config.enable_caching {
            if let Some(cached) = self.permission_cache.get(&cache_key) {
                return Ok(cached);
            }
        }

        self.metrics.record_listing();
        self.metrics.record_listing();
        self.metrics.record_listing();
        let (roles, cluster_roles, bindings) = futures::try_join!(
            self.client.list_roles(),
            self.client.list_cluster_roles(),
            self.client.list_role_bindings(),
        )?;

        let rules = RoleRuleMap::from_roles(roles.iter().chain(cluster_roles.iter()));
        let bindings_by_namespace = group_bindings(bindings);
        let empty = Vec::new();

        let reviews = namespaces.iter().map(|namespace| {
            let bindings = bindings_by_namespace.get(namespace).unwrap_or(&empty);
            let review = rules_review_from_bindings(bindings, &rules, subject);

            (namespace.clone(), review)
        });

        let permissions = compute_permissions(reviews);

        #[cfg(feature = "audit")]
        info!(
            "resolved permissions for subject '{}' across {} namespaces",
            subject_key(Some(subject)),
            permissions.len()
        );

        if self.config.enable_caching {
            self.permission_cache.insert(
                cache_key,
                permissions.clone(),
                Self::tags(subject_key(Some(subject)), &namespaces),
            );
        }

        Ok(permissions)
    }

    /// Compute the caller's cluster-scope permissions.
    ///
    /// `identity` is the caller's own user/groups (from its token
    /// claims), used to match ClusterRoleBinding subjects on the
    /// authoritative path. `namespaced` is the caller's namespaced map,
    /// used by the fallback's short-circuit filter.
    pub async fn fetch_cluster_permissions(
        &self,
        identity: &RbacSubject,
        use_cases: &[UseCase],
        namespaced: &PermissionMap,
    ) -> Result<PermissionMap> {
        cluster_scope::resolve(
            &self.client,
            &self.metrics,
            identity,
            None,
            use_cases,
            namespaced,
        )
        .await
    }

    /// Compute the cluster-scope permissions of an arbitrary subject.
    pub async fn fetch_cluster_permissions_for_subject(
        &self,
        subject: &RbacSubject,
        use_cases: &[UseCase],
        namespaced: &PermissionMap,
    ) -> Result<PermissionMap> {
        cluster_scope::resolve(
            &self.client,
            &self.metrics,
            subject,
            Some(subject),
            use_cases,
            namespaced,
        )
        .await
    }

    /// Check which of the given verbs the caller may use on a resource
    /// in a namespace: one access review per verb, per-verb denials
    /// reported as `false`.
    pub async fn fetch_access_for_resource(
        &self,
        namespace: &str,
        verbs: &[&str],
        api_group: &str,
        resource: &str,
    ) -> Result<BTreeMap<String, bool>> {
        let cache_key = access_review_key(namespace, verbs, api_group, resource);

        if self.config.enable_caching {
            if let Some(cached) = self.access_cache.get(&cache_key) {
                return Ok(cached);
            }
        }

        let decisions = all_or_fail(verbs.iter().map(|verb| {
            let client = &self.client;
            let metrics = &self.metrics;
            let attributes = AccessAttributes::namespaced(namespace, *verb, api_group, resource);

            async move {
                metrics.record_access_review();
                let allowed = probe_access(client, metrics, None, &attributes).await?;
                Ok((verb.to_string(), allowed))
            }
        }))
        .await?;

        let access: BTreeMap<String, bool> = decisions.into_iter().collect();

        if self.config.enable_caching {
            self.access_cache.insert(
                cache_key,
                access.clone(),
                HashSet::from([
                    CacheTag::AccessReview,
                    CacheTag::Namespace(namespace.to_string()),
                ]),
            );
        }

        Ok(access)
    }

    /// Evaluate use cases against a permission map, with the engine's
    /// configured provider.
    pub fn evaluate_use_cases(
        &self,
        permissions: &PermissionMap,
        use_cases: &[UseCase],
        organizations: Option<&[Organization]>,
    ) -> UseCaseStatuses {
        statuses_for_use_cases(permissions, use_cases, self.config.provider, organizations)
    }

    /// Drop cached results computed for a subject (`None` = the caller).
    pub fn invalidate_subject(&self, subject: Option<&RbacSubject>) {
        self.permission_cache.invalidate_subject(&subject_key(subject));
    }

    /// Drop every cached result.
    pub fn clear_cache(&self) {
        self.permission_cache.clear();
        self.access_cache.clear();
    }

    /// The namespaces the self rules-review fan-out covers.
    fn review_namespaces(&self, organizations: &[Organization]) -> Vec<String> {
        let mut namespaces: Vec<String> = organizations
            .iter()
            .map(Organization::effective_namespace)
            .collect();

        // Not organization namespaces, but shared resources live there.
        namespaces.push("default".to_string());
        namespaces.push(self.config.platform_namespace.clone());

        dedup_preserving_order(namespaces)
    }

    /// The namespaces to inspect when resolving another subject:
    /// `default`, the platform namespace, and every organization
    /// namespace the caller may see.
    async fn accessible_namespaces(&self, organizations: &[Organization]) -> Result<Vec<String>> {
        let mut namespaces = vec![
            "default".to_string(),
            self.config.platform_namespace.clone(),
        ];

        self.metrics.record_access_review();
        let can_list = probe_access(
            &self.client,
            &self.metrics,
            None,
            &AccessAttributes::cluster("list", ORGANIZATION_API_GROUP, "organizations"),
        )
        .await?;

        if can_list {
            namespaces.extend(organizations.iter().map(Organization::effective_namespace));
            return Ok(dedup_preserving_order(namespaces));
        }

        // Not allowed to list organizations: probe each one and keep
        // the allowed ones.
        let allowed = all_or_fail(organizations.iter().map(|org| {
            let client = &self.client;
            let metrics = &self.metrics;
            let attributes = AccessAttributes::cluster("get", ORGANIZATION_API_GROUP, "organizations")
                .with_name(&org.name);

            async move {
                metrics.record_access_review();
                let allowed = probe_access(client, metrics, None, &attributes).await?;
                Ok(allowed.then(|| org.effective_namespace()))
            }
        }))
        .await?;

        namespaces.extend(allowed.into_iter().flatten());
        Ok(dedup_preserving_order(namespaces))
    }

    fn tags(subject: String, namespaces: &[String]) -> HashSet<CacheTag> {
        let mut tags: HashSet<CacheTag> = namespaces
            .iter()
            .map(|namespace| CacheTag::Namespace(namespace.clone()))
            .collect();

        tags.insert(CacheTag::Subject(subject));
        tags
    }
}

fn group_bindings(bindings: Vec<BindingEntry>) -> BTreeMap<String, Vec<BindingEntry>> {
    let mut grouped: BTreeMap<String, Vec<BindingEntry>> = BTreeMap::new();

    for binding in bindings {
        let namespace = binding.namespace.clone().unwrap_or_default();
        grouped.entry(namespace).or_default().push(binding);
    }

    grouped
}

fn dedup_preserving_order(namespaces: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    namespaces
        .into_iter()
        .filter(|namespace| seen.insert(namespace.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MemoryClient;
    use crate::roles::RoleEntry;
    use crate::rule::{ResourceRule, RulesReview};

    fn engine(client: MemoryClient) -> PermissionEngine<MemoryClient> {
        PermissionEngine::new(client, EngineConfig::default())
    }

    #[tokio::test]
    async fn test_fetch_permissions_covers_default_and_platform() {
        let client = MemoryClient::new()
            .with_rules_review(
                "default",
                RulesReview::complete(vec![ResourceRule::new(["get"], [""], ["pods"])]),
            )
            .with_rules_review(
                "giantswarm",
                RulesReview::complete(vec![ResourceRule::new(["list"], [""], ["configmaps"])]),
            );

        let permissions = engine(client).fetch_permissions(&[]).await.unwrap();

        assert!(permissions.allows("default", "get", "", "pods", None));
        assert!(permissions.allows("giantswarm", "list", "", "configmaps", None));
    }

    #[tokio::test]
    async fn test_fetch_permissions_tolerates_failed_reviews() {
        // Only `default` has a configured review; the other namespaces
        // fail and are simply absent.
        let client = MemoryClient::new().with_rules_review(
            "default",
            RulesReview::complete(vec![ResourceRule::new(["get"], [""], ["pods"])]),
        );

        let permissions = engine(client)
            .fetch_permissions(&[Organization::new("acme")])
            .await
            .unwrap();

        assert_eq!(permissions.len(), 1);
        assert!(permissions.namespace("org-acme").is_none());
    }

    #[tokio::test]
    async fn test_fetch_permissions_memoizes() {
        let client = MemoryClient::new().with_rules_review(
            "default",
            RulesReview::complete(vec![ResourceRule::new(["get"], [""], ["pods"])]),
        );

        let engine = engine(client);
        let first = engine.fetch_permissions(&[]).await.unwrap();
        let reviews_after_first = engine.metrics().snapshot().rules_reviews;

        let second = engine.fetch_permissions(&[]).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(engine.metrics().snapshot().rules_reviews, reviews_after_first);
        assert_eq!(engine.metrics().snapshot().cache_hits, 1);
    }

    #[tokio::test]
    async fn test_invalidate_subject_forces_refetch() {
        let client = MemoryClient::new().with_rules_review(
            "default",
            RulesReview::complete(vec![ResourceRule::new(["get"], [""], ["pods"])]),
        );

        let engine = engine(client);
        engine.fetch_permissions(&[]).await.unwrap();
        engine.invalidate_subject(None);
        engine.fetch_permissions(&[]).await.unwrap();

        assert_eq!(engine.metrics().snapshot().cache_hits, 0);
    }

    #[tokio::test]
    async fn test_subject_resolution_hard_fails_on_forbidden_listing() {
        let client = MemoryClient::new()
            .allow_self(AccessAttributes::cluster(
                "list",
                ORGANIZATION_API_GROUP,
                "organizations",
            ))
            .with_forbidden("rolebindings");

        let err = engine(client)
            .fetch_permissions_for_subject(&RbacSubject::user("someone"), &[])
            .await
            .unwrap_err();

        assert!(err.is_forbidden());
    }

    #[tokio::test]
    async fn test_org_probing_keeps_only_allowed_orgs() {
        // Listing organizations is denied; only `acme` may be fetched
        // individually.
        let client = MemoryClient::new()
            .allow_self(
                AccessAttributes::cluster("get", ORGANIZATION_API_GROUP, "organizations")
                    .with_name("acme"),
            )
            .with_roles(vec![
                RoleEntry::namespaced(
                    "org-acme",
                    "reader",
                    vec![ResourceRule::new(["get"], [""], ["pods"])],
                ),
                RoleEntry::namespaced(
                    "org-other",
                    "reader",
                    vec![ResourceRule::new(["get"], [""], ["pods"])],
                ),
            ])
            .with_role_bindings(vec![
                crate::roles::BindingEntry::namespaced(
                    "org-acme",
                    "readers",
                    crate::roles::RoleRefKind::Role,
                    "reader",
                    vec![crate::subject::BindingSubject::user("someone")],
                ),
                crate::roles::BindingEntry::namespaced(
                    "org-other",
                    "readers",
                    crate::roles::RoleRefKind::Role,
                    "reader",
                    vec![crate::subject::BindingSubject::user("someone")],
                ),
            ]);

        let permissions = engine(client)
            .fetch_permissions_for_subject(
                &RbacSubject::user("someone"),
                &[Organization::new("acme"), Organization::new("other")],
            )
            .await
            .unwrap();

        assert!(permissions.allows("org-acme", "get", "", "pods", None));
        // `org-other` was never inspected.
        assert!(permissions.namespace("org-other").is_none());
    }

    #[tokio::test]
    async fn test_fetch_access_for_resource() {
        let client = MemoryClient::new().allow_self(AccessAttributes::namespaced(
            "org-acme", "get", "apps.gs.io", "apps",
        ));

        let access = engine(client)
            .fetch_access_for_resource("org-acme", &["get", "delete"], "apps.gs.io", "apps")
            .await
            .unwrap();

        assert_eq!(access["get"], true);
        assert_eq!(access["delete"], false);
    }

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        let deduped = dedup_preserving_order(vec![
            "default".to_string(),
            "giantswarm".to_string(),
            "default".to_string(),
        ]);

        assert_eq!(deduped, vec!["default", "giantswarm"]);
    }
}
