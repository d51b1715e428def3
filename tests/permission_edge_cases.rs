//! Edge-case tests for normalization, compaction and lookups.

use rbac_lens::{
    PermissionKey, PermissionMap, ResourceRule, RulesReview, compute_permissions, normalize_rules,
};

#[test]
fn test_incomplete_review_yields_no_namespace_key() {
    let map = compute_permissions([
        (
            "org-x",
            RulesReview {
                incomplete: true,
                resource_rules: vec![ResourceRule::all_access()],
            },
        ),
        ("org-y", RulesReview::complete(vec![])),
    ]);

    // Not an empty entry: no entry at all.
    assert!(map.namespace("org-x").is_none());
    // A complete review with no rules still records the namespace.
    assert!(map.namespace("org-y").is_some());
}

#[test]
fn test_empty_rule_components_produce_nothing() {
    let normalized = normalize_rules(&[
        ResourceRule::new(Vec::<&str>::new(), vec![], vec![]),
        ResourceRule::new(vec!["get"], vec![""], vec![]),
    ]);

    assert!(normalized.is_empty());
}

#[test]
fn test_all_empty_key_is_skipped() {
    // An empty group, an empty resource and an empty resource name
    // resolve to the all-empty key, which carries no information and
    // must not pollute the map.
    let normalized =
        normalize_rules(&[ResourceRule::new(["get"], [""], [""]).with_resource_names([""])]);

    assert!(normalized.is_empty());
    assert!(normalized.get(&PermissionKey::new("", "", "")).is_none());
}

#[test]
fn test_wildcard_resource_suppresses_resource_names() {
    let normalized = normalize_rules(&[
        ResourceRule::new(["get"], ["apps.gs.io"], ["*", "apps"]).with_resource_names(["one"]),
    ]);

    // The `*` resource collapses the whole group; the named key and the
    // `apps` key are never created from this rule.
    assert!(normalized.get(&PermissionKey::group("apps.gs.io")).is_some());
    assert!(normalized.get(&PermissionKey::new("apps.gs.io", "apps", "one")).is_none());
    assert!(normalized.get(&PermissionKey::resource("apps.gs.io", "apps")).is_none());
}

#[test]
fn test_total_access_absorption_discards_detail() {
    let normalized = normalize_rules(&[
        ResourceRule::new(["delete"], ["apps.gs.io"], ["apps"]),
        ResourceRule::all_access(),
    ]);

    assert_eq!(normalized.len(), 1);
    let catch_all = normalized.get(&PermissionKey::total_wildcard()).unwrap();
    assert!(catch_all.is_wildcard());
}

#[test]
fn test_partial_catch_all_is_not_absorbed() {
    // `*:*:*` with a finite verb set merges into siblings but keeps
    // the map's detail.
    let normalized = normalize_rules(&[
        ResourceRule::new(["get", "list"], ["*"], ["*"]),
        ResourceRule::new(["delete"], ["apps.gs.io"], ["apps"]),
    ]);

    assert_eq!(normalized.len(), 2);
    assert!(normalized.allows("delete", "apps.gs.io", "apps", "*"));
    assert!(normalized.allows("get", "apps.gs.io", "apps", "*"));
    assert!(normalized.allows("list", "anything.io", "anything", "*"));
    assert!(!normalized.allows("delete", "anything.io", "anything", "*"));
}

#[test]
fn test_wildcard_verb_collapses_verb_set() {
    let normalized = normalize_rules(&[
        ResourceRule::new(["get"], [""], ["pods"]),
        ResourceRule::new(["*"], [""], ["pods"]),
    ]);

    let verbs = normalized.get(&PermissionKey::resource("", "pods")).unwrap();
    assert!(verbs.is_wildcard());
    assert!(verbs.allows("anything"));
}

#[test]
fn test_lookup_with_resource_name() {
    let normalized = normalize_rules(&[
        ResourceRule::new(["patch"], ["apps.gs.io"], ["apps"]).with_resource_names(["one"]),
    ]);

    assert!(normalized.allows("patch", "apps.gs.io", "apps", "one"));
    // A named grant does not extend to the unnamed key, nor to other
    // names.
    assert!(!normalized.allows("patch", "apps.gs.io", "apps", "*"));
    assert!(!normalized.allows("patch", "apps.gs.io", "apps", "two"));
}

#[test]
fn test_named_keys_inherit_from_resource_wildcard() {
    let normalized = normalize_rules(&[
        ResourceRule::new(["get"], ["apps.gs.io"], ["apps"]),
        ResourceRule::new(["patch"], ["apps.gs.io"], ["apps"]).with_resource_names(["one"]),
    ]);

    assert!(normalized.allows("get", "apps.gs.io", "apps", "one"));
    assert!(normalized.allows("patch", "apps.gs.io", "apps", "one"));
    assert!(!normalized.allows("patch", "apps.gs.io", "apps", "*"));
}

#[test]
fn test_unknown_namespace_defaults_to_deny() {
    let mut map = PermissionMap::new();
    map.insert("org-known", normalize_rules(&[ResourceRule::all_access()]));

    assert!(map.allows("org-known", "delete", "", "pods", None));
    assert!(!map.allows("org-unknown", "delete", "", "pods", None));
    assert!(!map.allows("", "delete", "", "pods", None));
}

#[test]
fn test_core_group_key_does_not_inherit_catch_all() {
    // Keys in the core API group (empty group component) have no
    // `*:*:*` ancestor; an exact hit on them never widens through the
    // catch-all.
    let normalized = normalize_rules(&[
        ResourceRule::new(["get", "list"], ["*"], ["*"]),
        ResourceRule::new(["create"], [""], ["pods"]),
    ]);

    assert!(normalized.allows("create", "", "pods", "*"));
    assert!(!normalized.allows("get", "", "pods", "*"));
    // Absent core-group keys still fall back to the catch-all.
    assert!(normalized.allows("get", "", "configmaps", "*"));
}

#[test]
fn test_duplicate_rules_are_harmless() {
    let rule = ResourceRule::new(["get"], [""], ["pods"]);
    let once = normalize_rules(&[rule.clone()]);
    let twice = normalize_rules(&[rule.clone(), rule]);

    assert_eq!(once, twice);
}
