//! Cluster-scope permission resolution.
//!
//! Enumerating ClusterRoleBindings is the authoritative way to find out
//! what a subject may do cluster-wide, but listing them requires rights
//! many users lack. When listing is not possible, the resolver falls
//! back to probing exactly the permission tuples the declared use cases
//! need, trading completeness for availability.

use crate::client::{PlatformClient, probe_access};
use crate::fanout::all_or_fail;
use crate::map::PermissionMap;
use crate::metrics::EngineMetrics;
use crate::normalize::compute_permissions;
use crate::roles::{RoleRuleMap, rules_review_from_bindings};
use crate::rule::{AccessAttributes, ResourceRule, RulesReview};
use crate::subject::RbacSubject;
use crate::use_case::{PermissionTuple, UseCase};
use crate::error::Result;
use log::debug;
use std::collections::BTreeSet;

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

/// Compute the permissions at cluster scope (the `""` pseudo-namespace).
///
/// `identity` is matched against binding subjects on the authoritative
/// path; `review_as` is the subject access reviews are issued for
/// (`None` = the caller itself). `namespaced` is the already-computed
/// namespaced map, used by the fallback's short-circuit filter.
pub(crate) async fn resolve<C>(
    client: &C,
    metrics: &EngineMetrics,
    identity: &RbacSubject,
    review_as: Option<&RbacSubject>,
    use_cases: &[UseCase],
    namespaced: &PermissionMap,
) -> Result<PermissionMap>
where
    C: PlatformClient + ?Sized,
{
    metrics.record_access_review();
    let can_list_bindings = probe_access(
        client,
        metrics,
        review_as,
        &AccessAttributes::cluster("list", RBAC_GROUP, "clusterrolebindings"),
    )
    .await?;

    metrics.record_access_review();
    let can_list_roles = probe_access(
        client,
        metrics,
        review_as,
        &AccessAttributes::cluster("list", RBAC_GROUP, "clusterroles"),
    )
    .await?;

    if can_list_bindings && can_list_roles {
        return resolve_from_bindings(client, metrics, identity).await;
    }

    debug!("cluster-scope listing not allowed, probing declared use cases");
    resolve_from_probes(client, metrics, review_as, use_cases, namespaced).await
}

/// Authoritative path: enumerate ClusterRoleBindings and resolve the
/// ones granting to the subject.
async fn resolve_from_bindings<C>(
    client: &C,
    metrics: &EngineMetrics,
    identity: &RbacSubject,
) -> Result<PermissionMap>
where
    C: PlatformClient + ?Sized,
{
    metrics.record_listing();
    metrics.record_listing();
    let (bindings, cluster_roles) = futures::try_join!(
        client.list_cluster_role_bindings(),
        client.list_cluster_roles(),
    )?;

    let rules = RoleRuleMap::from_roles(&cluster_roles);
    let review = rules_review_from_bindings(&bindings, &rules, identity);

    Ok(compute_permissions([(String::new(), review)]))
}

/// Fallback path: probe each `(verb, resource, apiGroup)` tuple the
/// cluster-scoped use cases need.
///
/// Tuples the subject already lacks in the `default` namespace are
/// skipped up front: cluster-scope grants are a superset pattern on this
/// platform, so a tuple denied there cannot be granted cluster-wide.
async fn resolve_from_probes<C>(
    client: &C,
    metrics: &EngineMetrics,
    review_as: Option<&RbacSubject>,
    use_cases: &[UseCase],
    namespaced: &PermissionMap,
) -> Result<PermissionMap>
where
    C: PlatformClient + ?Sized,
{
    let tuples: BTreeSet<PermissionTuple> = use_cases
        .iter()
        .filter(|use_case| use_case.is_cluster_scoped())
        .flat_map(UseCase::tuples)
        .filter(|tuple| {
            namespaced.allows("default", &tuple.verb, &tuple.api_group, &tuple.resource, None)
        })
        .collect();

    let probes = tuples.iter().map(|tuple| {
        let attributes =
            AccessAttributes::cluster(&tuple.verb, &tuple.api_group, &tuple.resource);

        async move {
            metrics.record_access_review();
            let allowed = probe_access(client, metrics, review_as, &attributes).await?;
            Ok((tuple, allowed))
        }
    });

    let decisions = all_or_fail(probes).await?;

    let rules: Vec<ResourceRule> = decisions
        .into_iter()
        .filter(|(_, allowed)| *allowed)
        .map(|(tuple, _)| {
            ResourceRule::new(
                [tuple.verb.clone()],
                [tuple.api_group.clone()],
                [tuple.resource.clone()],
            )
        })
        .collect();

    Ok(compute_permissions([(
        String::new(),
        RulesReview::complete(rules),
    )]))
}
