//! Rule normalization and wildcard compaction.
//!
//! Raw resource rules are the cartesian form the authorization API speaks
//! (`apiGroups × resources × resourceNames → verbs`). Normalization
//! flattens them into a per-namespace permission map; compaction then
//! folds wildcard grants into their more specific sibling keys so that
//! lookups are single-key reads instead of wildcard fallback chains.

use crate::key::{PermissionKey, WILDCARD};
use crate::map::{NamespacePermissions, PermissionMap, VerbSet};
use crate::rule::{ResourceRule, RulesReview};

/// Build a permission map from per-namespace rule reviews.
///
/// Reviews marked incomplete are skipped entirely: their namespace does
/// not appear in the result, distinguishing "evaluation failed" from
/// "denied".
pub fn compute_permissions<N, I>(reviews: I) -> PermissionMap
where
    N: Into<String>,
    I: IntoIterator<Item = (N, RulesReview)>,
{
    let mut map = PermissionMap::new();

    for (namespace, review) in reviews {
        if review.incomplete {
            continue;
        }

        map.insert(namespace, normalize_rules(&review.resource_rules));
    }

    map
}

/// Normalize a list of resource rules into a compacted namespace
/// permission map.
pub fn normalize_rules(rules: &[ResourceRule]) -> NamespacePermissions {
    let mut permissions = NamespacePermissions::new();

    for rule in rules {
        for group in &rule.api_groups {
            for resource in &rule.resources {
                // A grant on all resources of the group makes resource
                // names moot.
                if resource == WILDCARD {
                    permissions.append(PermissionKey::group(group.clone()), &rule.verbs);
                    break;
                }

                if let Some(names) = &rule.resource_names {
                    for name in names {
                        permissions.append(
                            PermissionKey::new(group.clone(), resource.clone(), name.clone()),
                            &rule.verbs,
                        );
                    }
                    continue;
                }

                permissions.append(
                    PermissionKey::resource(group.clone(), resource.clone()),
                    &rule.verbs,
                );
            }
        }
    }

    compact_wildcards(permissions)
}

/// Fold wildcard grants into every applicable specific key.
///
/// After compaction a lookup never has to walk the wildcard chain: each
/// specific key already carries the verbs of its wildcard ancestors. The
/// `*:*:*` catch-all is still kept for keys that are absent entirely.
///
/// Short-circuit: if `*:*:*` maps to exactly `{"*"}`, the whole namespace
/// collapses to that single entry; no other detail is retained.
pub fn compact_wildcards(permissions: NamespacePermissions) -> NamespacePermissions {
    let total = PermissionKey::total_wildcard();

    if permissions
        .get(&total)
        .is_some_and(VerbSet::is_wildcard)
    {
        let mut collapsed = NamespacePermissions::new();
        collapsed.append(total, [WILDCARD]);
        return collapsed;
    }

    let mut compacted = permissions.clone();

    for key in permissions.keys() {
        for ancestor in key.wildcard_ancestors() {
            if let Some(verbs) = permissions.get(&ancestor) {
                let verbs: Vec<String> = verbs.iter().map(str::to_string).collect();
                compacted.append(key.clone(), verbs);
            }
        }
    }

    compacted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions<const N: usize>(entries: [(&str, &[&str]); N]) -> NamespacePermissions {
        entries
            .into_iter()
            .map(|(key, verbs)| (PermissionKey::parse(key).unwrap(), verbs.to_vec()))
            .collect()
    }

    #[test]
    fn test_incomplete_review_omits_namespace() {
        let map = compute_permissions([("org-giantswarm", RulesReview::incomplete())]);

        assert!(map.is_empty());
        assert!(map.namespace("org-giantswarm").is_none());
    }

    #[test]
    fn test_verbs_accumulate_per_key() {
        let map = compute_permissions([(
            "org-giantswarm",
            RulesReview::complete(vec![
                ResourceRule::new(["get", "list", "watch"], [""], ["pods"]),
                ResourceRule::new(["create"], [""], ["pods"]),
                ResourceRule::new(["patch"], ["events.k8s.io"], ["events"]),
                ResourceRule::new(
                    ["delete"],
                    ["something.giantswarm.io", "events.k8s.io"],
                    ["events"],
                ),
            ]),
        )]);

        let expected: PermissionMap = [(
            "org-giantswarm",
            permissions([
                (":pods:*", &["create", "get", "list", "watch"][..]),
                ("events.k8s.io:events:*", &["delete", "patch"]),
                ("something.giantswarm.io:events:*", &["delete"]),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_mixed_complete_and_incomplete_reviews() {
        let rules = vec![
            ResourceRule::new(["get", "list", "watch"], ["*"], ["apps"]),
            ResourceRule::new(["create"], [""], ["pods"]),
        ];

        let map = compute_permissions([
            ("org-giantswarm", RulesReview::complete(rules.clone())),
            ("org-test", RulesReview::incomplete()),
        ]);

        let expected: PermissionMap = [(
            "org-giantswarm",
            permissions([
                ("*:apps:*", &["get", "list", "watch"][..]),
                (":pods:*", &["create"]),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_resource_names_expand_to_specific_keys() {
        let map = compute_permissions([(
            "org-test2",
            RulesReview::complete(vec![
                ResourceRule::new(["delete"], ["something.giantswarm.io"], ["apps"]),
                ResourceRule::new(["get"], ["something.giantswarm.io"], ["apps"]),
                ResourceRule::new(["get"], ["something.giantswarm.io"], ["apps"]),
                ResourceRule::new(["patch"], ["something.giantswarm.io"], ["apps"])
                    .with_resource_names(["test1", "test2"]),
            ]),
        )]);

        let expected: PermissionMap = [(
            "org-test2",
            permissions([
                ("something.giantswarm.io:apps:*", &["delete", "get"][..]),
                ("something.giantswarm.io:apps:test1", &["delete", "get", "patch"]),
                ("something.giantswarm.io:apps:test2", &["delete", "get", "patch"]),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_all_resources_grant_ignores_resource_names() {
        // `resources: ["*"]` collapses to `{group}:*:*`; the rule's
        // resource names never produce keys.
        let map = compute_permissions([(
            "org-test2",
            RulesReview::complete(vec![
                ResourceRule::new(["get", "list"], ["apps.gs.io"], ["*"])
                    .with_resource_names(["ignored"]),
                ResourceRule::new(["delete", "patch"], ["apps.gs.io"], ["apps", "tests"]),
            ]),
        )]);

        let expected: PermissionMap = [(
            "org-test2",
            permissions([
                ("apps.gs.io:*:*", &["get", "list"][..]),
                ("apps.gs.io:apps:*", &["delete", "get", "list", "patch"]),
                ("apps.gs.io:tests:*", &["delete", "get", "list", "patch"]),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_wildcard_verbs_merge_into_specific_keys() {
        let map = compute_permissions([(
            "org-giantswarm",
            RulesReview::complete(vec![
                ResourceRule::new(["get", "list", "watch"], ["*"], ["*"]),
                ResourceRule::new(["delete"], ["apps.gs.io"], ["apps"]),
                ResourceRule::new(["patch"], ["something.gs.io"], ["aresource"])
                    .with_resource_names(["lala"]),
            ]),
        )]);

        let expected: PermissionMap = [(
            "org-giantswarm",
            permissions([
                ("*:*:*", &["get", "list", "watch"][..]),
                ("apps.gs.io:apps:*", &["delete", "get", "list", "watch"]),
                ("something.gs.io:aresource:lala", &["get", "list", "patch", "watch"]),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_total_access_absorption() {
        let map = compute_permissions([(
            "org-test",
            RulesReview::complete(vec![
                ResourceRule::all_access(),
                ResourceRule::new(["get", "list", "watch"], ["*"], ["*"]),
                ResourceRule::new(["delete"], ["dogs.gs.io"], ["cats"]),
            ]),
        )]);

        let expected: PermissionMap = [("org-test", permissions([("*:*:*", &["*"][..])]))]
            .into_iter()
            .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_resource_level_wildcard_merges_into_named_keys() {
        let map = compute_permissions([(
            "org-test3",
            RulesReview::complete(vec![
                ResourceRule::new(["get", "list"], ["apps.gs.io"], ["apps"]),
                ResourceRule::new(["delete", "patch"], ["apps.gs.io"], ["apps"])
                    .with_resource_names(["some-resource", "some-other-resource"]),
            ]),
        )]);

        let expected: PermissionMap = [(
            "org-test3",
            permissions([
                ("apps.gs.io:apps:*", &["get", "list"][..]),
                ("apps.gs.io:apps:some-resource", &["delete", "get", "list", "patch"]),
                (
                    "apps.gs.io:apps:some-other-resource",
                    &["delete", "get", "list", "patch"],
                ),
            ]),
        )]
        .into_iter()
        .collect();

        assert_eq!(map, expected);
    }

    #[test]
    fn test_compaction_does_not_collapse_partial_catch_all() {
        // `*:*:*` with specific verbs is merged, not absorbed.
        let compacted = compact_wildcards(permissions([
            ("*:*:*", &["get", "list"][..]),
            ("apps.gs.io:apps:*", &["delete"]),
        ]));

        assert_eq!(
            compacted,
            permissions([
                ("*:*:*", &["get", "list"][..]),
                ("apps.gs.io:apps:*", &["delete", "get", "list"]),
            ])
        );
    }
}
