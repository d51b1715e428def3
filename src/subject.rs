//! Subjects: the identities permissions are computed for, and the
//! identities role bindings point at.

use serde::{Deserialize, Serialize};

/// Kinds of subjects a role binding can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubjectKind {
    /// A human user.
    User,
    /// A group of users.
    Group,
    /// A service account.
    ServiceAccount,
}

/// One subject entry of a role binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingSubject {
    /// The kind of subject referenced.
    pub kind: SubjectKind,
    /// The subject name.
    pub name: String,
    /// Namespace, for service-account subjects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl BindingSubject {
    /// A user subject.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            name: name.into(),
            namespace: None,
        }
    }

    /// A group subject.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            name: name.into(),
            namespace: None,
        }
    }

    /// A service-account subject.
    pub fn service_account(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::ServiceAccount,
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}

/// The identity permissions are aggregated for: a user name, a list of
/// group names, or both.
///
/// The engine never derives this from a token itself; callers pass the
/// identity in (for "self" views, from their own token claims).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RbacSubject {
    /// The user name, if any.
    pub user: Option<String>,
    /// Group names the subject belongs to.
    pub groups: Vec<String>,
}

impl RbacSubject {
    /// A subject identified by user name only.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
            groups: Vec::new(),
        }
    }

    /// A subject identified by group membership only.
    pub fn groups<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            user: None,
            groups: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Add a user name to the subject.
    pub fn with_user(mut self, name: impl Into<String>) -> Self {
        self.user = Some(name.into());
        self
    }

    /// Whether neither a user nor any group is set.
    pub fn is_empty(&self) -> bool {
        self.user.is_none() && self.groups.is_empty()
    }

    /// Whether a binding subject refers to this identity.
    ///
    /// Users and service accounts match by exact name; groups match by
    /// membership.
    pub fn matches(&self, subject: &BindingSubject) -> bool {
        match subject.kind {
            SubjectKind::User | SubjectKind::ServiceAccount => {
                self.user.as_deref() == Some(subject.name.as_str())
            }
            SubjectKind::Group => self.groups.iter().any(|group| group == &subject.name),
        }
    }
}

/// Parse subject names from a serialized value (e.g. operator input).
///
/// Names are separated by commas, semicolons or whitespace, in any
/// combination.
pub fn parse_subjects(from: &str) -> Vec<String> {
    from.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
