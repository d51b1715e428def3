//! Typed permission keys.
//!
//! A permission key identifies one slot in a namespace permission map: the
//! API group, the resource (plural name), and an optional resource name.
//! Each component may be the `*` wildcard; the API group may also be the
//! empty string, which denotes the core API group. The colon-joined string
//! form (`"{group}:{resource}:{name}"`) only appears at serialization
//! boundaries; everything inside the crate works with the typed key.

use crate::error::{Error, Result};

/// The wildcard component, matching every group, resource or name.
pub const WILDCARD: &str = "*";

/// A composite key for one entry of a namespace permission map.
///
/// Serializes as its colon-joined string form, so permission maps stay
/// plain JSON objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PermissionKey {
    api_group: String,
    resource: String,
    resource_name: String,
}

impl PermissionKey {
    /// Create a key from its three components.
    pub fn new(
        api_group: impl Into<String>,
        resource: impl Into<String>,
        resource_name: impl Into<String>,
    ) -> Self {
        Self {
            api_group: api_group.into(),
            resource: resource.into(),
            resource_name: resource_name.into(),
        }
    }

    /// The key that grants access to everything: `*:*:*`.
    pub fn total_wildcard() -> Self {
        Self::new(WILDCARD, WILDCARD, WILDCARD)
    }

    /// Key for a whole resource within a group: `{group}:{resource}:*`.
    pub fn resource(api_group: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(api_group, resource, WILDCARD)
    }

    /// Key for every resource of a group: `{group}:*:*`.
    pub fn group(api_group: impl Into<String>) -> Self {
        Self::new(api_group, WILDCARD, WILDCARD)
    }

    /// The API group component (`""` is the core group).
    pub fn api_group(&self) -> &str {
        &self.api_group
    }

    /// The resource component.
    pub fn resource_kind(&self) -> &str {
        &self.resource
    }

    /// The resource name component.
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }

    /// Whether this is the `*:*:*` key.
    pub fn is_total_wildcard(&self) -> bool {
        self.api_group == WILDCARD && self.resource == WILDCARD && self.resource_name == WILDCARD
    }

    /// Whether the key carries no information at all.
    ///
    /// A rule that resolves to an all-empty key must not pollute the map.
    pub fn is_empty(&self) -> bool {
        self.api_group.is_empty() && self.resource.is_empty() && self.resource_name.is_empty()
    }

    /// The wildcard ancestors whose verbs apply to this key.
    ///
    /// For `"{g}:{r}:{n}"` these are `*:*:*` (if `g` is non-empty),
    /// `{g}:*:*` (if `r` is non-empty) and `{g}:{r}:*` (if `n` is
    /// non-empty), excluding the key itself.
    pub fn wildcard_ancestors(&self) -> Vec<PermissionKey> {
        let mut ancestors = Vec::with_capacity(3);

        if !self.api_group.is_empty() {
            ancestors.push(Self::total_wildcard());
        }
        if !self.resource.is_empty() {
            ancestors.push(Self::group(self.api_group.clone()));
        }
        if !self.resource_name.is_empty() {
            ancestors.push(Self::resource(
                self.api_group.clone(),
                self.resource.clone(),
            ));
        }

        ancestors.retain(|ancestor| ancestor != self);
        ancestors
    }

    /// Parse a key from its colon-joined string form.
    pub fn parse(key: &str) -> Result<Self> {
        let parts: Vec<&str> = key.split(':').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidKey(key.to_string()));
        }

        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl std::fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.api_group, self.resource, self.resource_name
        )
    }
}

impl std::str::FromStr for PermissionKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for PermissionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PermissionKey {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Self::parse(&key).map_err(serde::de::Error::custom)
    }
}
