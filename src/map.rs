//! Permission maps and lookup queries.
//!
//! A [`PermissionMap`] maps namespace names (`""` for the cluster scope)
//! to [`NamespacePermissions`], which map typed permission keys to verb
//! sets. A namespace key being present means an authoritative, complete
//! rule review was obtained for it; absence means "unknown", not
//! "denied". The boolean queries still default to deny for unknown
//! namespaces.
//!
//! Maps are rebuilt from scratch on every fetch cycle and never patched
//! in place.

use crate::key::{PermissionKey, WILDCARD};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// An order-irrelevant set of verb strings.
///
/// Invariant: once the set contains `"*"`, it is exactly `{"*"}`; the
/// wildcard verb absorbs everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerbSet(BTreeSet<String>);

impl VerbSet {
    /// Create an empty verb set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Union the given verbs into the set, collapsing to `{"*"}` if the
    /// union contains the wildcard verb.
    pub fn insert_all<S: AsRef<str>>(&mut self, verbs: impl IntoIterator<Item = S>) {
        if self.is_wildcard() {
            return;
        }

        for verb in verbs {
            self.0.insert(verb.as_ref().to_string());
        }

        if self.0.contains(WILDCARD) {
            self.0.clear();
            self.0.insert(WILDCARD.to_string());
        }
    }

    /// Whether the set grants the given verb.
    pub fn allows(&self, verb: &str) -> bool {
        self.is_wildcard() || self.0.contains(verb)
    }

    /// Whether the set is exactly `{"*"}`.
    pub fn is_wildcard(&self) -> bool {
        self.0.len() == 1 && self.0.contains(WILDCARD)
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the verbs in the set.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for VerbSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.insert_all(iter);
        set
    }
}

/// Permissions within a single namespace: permission key → verb set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespacePermissions(BTreeMap<PermissionKey, VerbSet>);

impl NamespacePermissions {
    /// Create an empty namespace permission map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Union verbs into the entry for `key`.
    ///
    /// Keys carrying no information (all components empty) are skipped.
    pub fn append<S: AsRef<str>>(
        &mut self,
        key: PermissionKey,
        verbs: impl IntoIterator<Item = S>,
    ) {
        if key.is_empty() {
            return;
        }

        self.0.entry(key).or_default().insert_all(verbs);
    }

    /// Get the verb set recorded for a key, if any.
    pub fn get(&self, key: &PermissionKey) -> Option<&VerbSet> {
        self.0.get(key)
    }

    /// Check whether the given verb is granted for the resource
    /// configuration.
    ///
    /// The lookup hits the exact key first; when the exact key is absent
    /// entirely, the `*:*:*` catch-all is consulted. Wildcard compaction
    /// (see [`crate::normalize`]) makes this a single-key lookup in the
    /// common case.
    pub fn allows(&self, verb: &str, api_group: &str, resource: &str, resource_name: &str) -> bool {
        let key = PermissionKey::new(api_group, resource, resource_name);

        let verbs = match self.0.get(&key) {
            Some(verbs) => verbs,
            None => match self.0.get(&PermissionKey::total_wildcard()) {
                Some(verbs) => verbs,
                None => return false,
            },
        };

        verbs.allows(verb)
    }

    /// Iterate over the entries of the map.
    pub fn iter(&self) -> impl Iterator<Item = (&PermissionKey, &VerbSet)> {
        self.0.iter()
    }

    /// The keys of the map.
    pub fn keys(&self) -> impl Iterator<Item = &PermissionKey> {
        self.0.keys()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for NamespacePermissions
where
    K: Into<PermissionKey>,
    V: IntoIterator,
    V::Item: AsRef<str>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut permissions = Self::new();
        for (key, verbs) in iter {
            permissions.append(key.into(), verbs);
        }
        permissions
    }
}

/// Effective permissions per namespace. The `""` key holds cluster-scoped
/// permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMap(BTreeMap<String, NamespacePermissions>);

impl PermissionMap {
    /// Create an empty permission map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the permissions computed for a namespace.
    pub fn insert(&mut self, namespace: impl Into<String>, permissions: NamespacePermissions) {
        self.0.insert(namespace.into(), permissions);
    }

    /// The permissions recorded for a namespace, if a complete review was
    /// obtained for it.
    pub fn namespace(&self, namespace: &str) -> Option<&NamespacePermissions> {
        self.0.get(namespace)
    }

    /// Check whether the verb is granted on the resource configuration in
    /// the namespace. Unknown namespaces are always denied.
    pub fn allows(
        &self,
        namespace: &str,
        verb: &str,
        api_group: &str,
        resource: &str,
        resource_name: Option<&str>,
    ) -> bool {
        match self.0.get(namespace) {
            Some(permissions) => permissions.allows(
                verb,
                api_group,
                resource,
                resource_name.unwrap_or(WILDCARD),
            ),
            None => false,
        }
    }

    /// Merge another map into this one, replacing namespaces present in
    /// both. Used to combine the cluster-scope result with the namespaced
    /// result; maps are still rebuilt per fetch cycle, never patched.
    pub fn merge(&mut self, other: PermissionMap) {
        self.0.extend(other.0);
    }

    /// Iterate over the recorded namespaces and their permissions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NamespacePermissions)> {
        self.0.iter().map(|(ns, p)| (ns.as_str(), p))
    }

    /// The namespaces with recorded permissions.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of recorded namespaces.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no namespace has recorded permissions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<N, P> FromIterator<(N, P)> for PermissionMap
where
    N: Into<String>,
    P: Into<NamespacePermissions>,
{
    fn from_iter<I: IntoIterator<Item = (N, P)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (namespace, permissions) in iter {
            map.insert(namespace, permissions.into());
        }
        map
    }
}
