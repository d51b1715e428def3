//! Production [`PlatformClient`] backed by the Kubernetes API.
//!
//! Reviews go through the typed `authorization.k8s.io/v1` API, RBAC
//! listings through `rbac.authorization.k8s.io/v1`, and organizations
//! through the platform's CRD via a dynamic API. HTTP transport,
//! authentication and timeouts are the `kube` client's responsibility.

use crate::client::PlatformClient;
use crate::error::{Error, Result};
use crate::org::Organization;
use crate::roles::{BindingEntry, RoleEntry, RoleRefKind};
use crate::rule::{AccessAttributes, ResourceRule, RulesReview};
use crate::subject::{BindingSubject, RbacSubject, SubjectKind};
use async_trait::async_trait;
use k8s_openapi::api::authorization::v1 as authv1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::api::{Api, ApiResource, DynamicObject, GroupVersionKind, ListParams, PostParams};
use kube::Client;

/// The GVK of the platform's organization CRD.
fn organization_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(
        crate::org::ORGANIZATION_API_GROUP,
        "v1alpha1",
        "Organization",
    )
}

/// [`PlatformClient`] implementation over a [`kube::Client`].
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    organizations: ApiResource,
}

impl KubeClient {
    /// Wrap an already-configured client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            organizations: ApiResource::from_gvk(&organization_gvk()),
        }
    }

    fn organization_api(&self) -> Api<DynamicObject> {
        Api::all_with(self.client.clone(), &self.organizations)
    }
}

#[async_trait]
impl PlatformClient for KubeClient {
    async fn review_rules_for_self(&self, namespace: &str) -> Result<RulesReview> {
        let api: Api<authv1::SelfSubjectRulesReview> = Api::all(self.client.clone());

        let review = authv1::SelfSubjectRulesReview {
            spec: authv1::SelfSubjectRulesReviewSpec {
                namespace: Some(namespace.to_string()),
            },
            ..Default::default()
        };

        let created = api
            .create(&PostParams::default(), &review)
            .await
            .map_err(|err| classify("selfsubjectrulesreviews", namespace, err))?;

        Ok(rules_review_from_status(created.status))
    }

    async fn review_access(
        &self,
        subject: Option<&RbacSubject>,
        attributes: &AccessAttributes,
    ) -> Result<bool> {
        let resource_attributes = resource_attributes(attributes);

        let status = match subject {
            None => {
                let api: Api<authv1::SelfSubjectAccessReview> = Api::all(self.client.clone());
                let review = authv1::SelfSubjectAccessReview {
                    spec: authv1::SelfSubjectAccessReviewSpec {
                        resource_attributes: Some(resource_attributes),
                        ..Default::default()
                    },
                    ..Default::default()
                };

                api.create(&PostParams::default(), &review)
                    .await
                    .map_err(|err| classify("selfsubjectaccessreviews", &attributes.resource, err))?
                    .status
            }
            Some(subject) if !attributes.namespace.is_empty() => {
                let api: Api<authv1::LocalSubjectAccessReview> =
                    Api::namespaced(self.client.clone(), &attributes.namespace);
                let mut review = authv1::LocalSubjectAccessReview {
                    spec: subject_access_spec(subject, resource_attributes),
                    ..Default::default()
                };
                review.metadata.namespace = Some(attributes.namespace.clone());

                api.create(&PostParams::default(), &review)
                    .await
                    .map_err(|err| classify("localsubjectaccessreviews", &attributes.resource, err))?
                    .status
            }
            Some(subject) => {
                let api: Api<authv1::SubjectAccessReview> = Api::all(self.client.clone());
                let review = authv1::SubjectAccessReview {
                    spec: subject_access_spec(subject, resource_attributes),
                    ..Default::default()
                };

                api.create(&PostParams::default(), &review)
                    .await
                    .map_err(|err| classify("subjectaccessreviews", &attributes.resource, err))?
                    .status
            }
        };

        Ok(status.map(|status| status.allowed).unwrap_or(false))
    }

    async fn list_roles(&self) -> Result<Vec<RoleEntry>> {
        let api: Api<rbacv1::Role> = Api::all(self.client.clone());
        let roles = api
            .list(&ListParams::default())
            .await
            .map_err(|err| classify("roles", "", err))?;

        Ok(roles
            .items
            .into_iter()
            .map(|role| RoleEntry {
                name: role.metadata.name.unwrap_or_default(),
                namespace: role.metadata.namespace,
                rules: resource_rules(role.rules),
            })
            .collect())
    }

    async fn list_cluster_roles(&self) -> Result<Vec<RoleEntry>> {
        let api: Api<rbacv1::ClusterRole> = Api::all(self.client.clone());
        let roles = api
            .list(&ListParams::default())
            .await
            .map_err(|err| classify("clusterroles", "", err))?;

        Ok(roles
            .items
            .into_iter()
            .map(|role| RoleEntry {
                name: role.metadata.name.unwrap_or_default(),
                namespace: None,
                rules: resource_rules(role.rules),
            })
            .collect())
    }

    async fn list_role_bindings(&self) -> Result<Vec<BindingEntry>> {
        let api: Api<rbacv1::RoleBinding> = Api::all(self.client.clone());
        let bindings = api
            .list(&ListParams::default())
            .await
            .map_err(|err| classify("rolebindings", "", err))?;

        Ok(bindings
            .items
            .into_iter()
            .map(|binding| BindingEntry {
                name: binding.metadata.name.unwrap_or_default(),
                namespace: binding.metadata.namespace,
                role_kind: role_ref_kind(&binding.role_ref),
                role_name: binding.role_ref.name,
                subjects: binding_subjects(binding.subjects),
            })
            .collect())
    }

    async fn list_cluster_role_bindings(&self) -> Result<Vec<BindingEntry>> {
        let api: Api<rbacv1::ClusterRoleBinding> = Api::all(self.client.clone());
        let bindings = api
            .list(&ListParams::default())
            .await
            .map_err(|err| classify("clusterrolebindings", "", err))?;

        Ok(bindings
            .items
            .into_iter()
            .map(|binding| BindingEntry {
                name: binding.metadata.name.unwrap_or_default(),
                namespace: None,
                role_kind: role_ref_kind(&binding.role_ref),
                role_name: binding.role_ref.name,
                subjects: binding_subjects(binding.subjects),
            })
            .collect())
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>> {
        let organizations = self
            .organization_api()
            .list(&ListParams::default())
            .await
            .map_err(|err| classify("organizations", "", err))?;

        Ok(organizations
            .items
            .into_iter()
            .map(organization_from_object)
            .collect())
    }

    async fn get_organization(&self, name: &str) -> Result<Organization> {
        let organization = self
            .organization_api()
            .get(name)
            .await
            .map_err(|err| classify("organizations", name, err))?;

        Ok(organization_from_object(organization))
    }
}

/// Sort a kube failure into the engine's error taxonomy.
fn classify(what: &str, name: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(ref response) if response.code == 403 => Error::Forbidden(what.to_string()),
        kube::Error::Api(ref response) if response.code == 404 => Error::NotFound {
            kind: what.to_string(),
            name: name.to_string(),
        },
        other => Error::api(other),
    }
}

fn rules_review_from_status(status: Option<authv1::SubjectRulesReviewStatus>) -> RulesReview {
    let Some(status) = status else {
        return RulesReview::incomplete();
    };

    RulesReview {
        incomplete: status.incomplete,
        resource_rules: status
            .resource_rules
            .into_iter()
            .map(|rule| ResourceRule {
                verbs: rule.verbs,
                api_groups: rule.api_groups.unwrap_or_default(),
                resources: rule.resources.unwrap_or_default(),
                resource_names: rule.resource_names,
            })
            .collect(),
    }
}

fn resource_attributes(attributes: &AccessAttributes) -> authv1::ResourceAttributes {
    authv1::ResourceAttributes {
        verb: Some(attributes.verb.clone()),
        group: Some(attributes.api_group.clone()),
        resource: Some(attributes.resource.clone()),
        namespace: (!attributes.namespace.is_empty()).then(|| attributes.namespace.clone()),
        name: (!attributes.name.is_empty()).then(|| attributes.name.clone()),
        ..Default::default()
    }
}

fn subject_access_spec(
    subject: &RbacSubject,
    resource_attributes: authv1::ResourceAttributes,
) -> authv1::SubjectAccessReviewSpec {
    authv1::SubjectAccessReviewSpec {
        user: subject.user.clone(),
        groups: (!subject.groups.is_empty()).then(|| subject.groups.clone()),
        resource_attributes: Some(resource_attributes),
        ..Default::default()
    }
}

/// Convert RBAC policy rules, skipping non-resource rules the way the
/// permission map cannot represent.
fn resource_rules(rules: Option<Vec<rbacv1::PolicyRule>>) -> Vec<ResourceRule> {
    rules
        .unwrap_or_default()
        .into_iter()
        .filter_map(|rule| {
            if rule.api_groups.is_none() && rule.resources.is_none() && rule.resource_names.is_none()
            {
                return None;
            }

            Some(ResourceRule {
                verbs: rule.verbs,
                api_groups: rule.api_groups.unwrap_or_default(),
                resources: rule.resources.unwrap_or_default(),
                resource_names: rule.resource_names,
            })
        })
        .collect()
}

fn role_ref_kind(role_ref: &rbacv1::RoleRef) -> RoleRefKind {
    if role_ref.kind == "ClusterRole" {
        RoleRefKind::ClusterRole
    } else {
        RoleRefKind::Role
    }
}

fn binding_subjects(subjects: Option<Vec<rbacv1::Subject>>) -> Vec<BindingSubject> {
    subjects
        .unwrap_or_default()
        .into_iter()
        .filter_map(|subject| {
            let kind = match subject.kind.as_str() {
                "User" => SubjectKind::User,
                "Group" => SubjectKind::Group,
                "ServiceAccount" => SubjectKind::ServiceAccount,
                _ => return None,
            };

            Some(BindingSubject {
                kind,
                name: subject.name,
                namespace: subject.namespace,
            })
        })
        .collect()
}

fn organization_from_object(object: DynamicObject) -> Organization {
    let name = object.metadata.name.unwrap_or_default();
    let namespace = object
        .data
        .pointer("/status/namespace")
        .and_then(|value| value.as_str())
        .map(str::to_string);

    Organization { name, namespace }
}
