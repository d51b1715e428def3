//! Infrastructure providers and provider-specific resource filtering.
//!
//! Use cases list the resources of every supported provider; a cluster
//! only ever runs on one of them. Resources belonging to a different
//! provider's infrastructure do not exist on the current one, so a use
//! case must never be reported as failed merely because such a resource
//! is not granted, so those tuples are excluded from evaluation.

use serde::{Deserialize, Serialize};

/// The infrastructure provider the platform runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Vintage AWS.
    Aws,
    /// Azure.
    Azure,
    /// GCP.
    Gcp,
    /// Cluster API on AWS.
    Capa,
    /// Cluster API on Azure.
    Capz,
    /// Cluster API on vSphere.
    Capv,
    /// On-premises KVM.
    Kvm,
}

/// API groups whose resources are provider infrastructure.
const INFRASTRUCTURE_GROUPS: [&str; 2] = [
    "infrastructure.cluster.x-k8s.io",
    "infrastructure.giantswarm.io",
];

impl Provider {
    /// Whether a resource of the given API group exists on this
    /// provider's infrastructure.
    ///
    /// Resources outside the infrastructure API groups apply everywhere.
    /// Within them, the resource-name family prefix decides: `aws*` is
    /// AWS/CAPA, `g8s*` is vintage AWS, `azure*` is Azure/CAPZ, and so
    /// on. Unrecognized families apply everywhere rather than silently
    /// failing use cases.
    pub fn is_resource_applicable(&self, api_group: &str, resource: &str) -> bool {
        if !INFRASTRUCTURE_GROUPS.contains(&api_group) {
            return true;
        }

        if resource.starts_with("aws") {
            return matches!(self, Provider::Aws | Provider::Capa);
        }
        if resource.starts_with("g8s") {
            return matches!(self, Provider::Aws);
        }
        if resource.starts_with("azure") {
            return matches!(self, Provider::Azure | Provider::Capz);
        }
        if resource.starts_with("gcp") {
            return matches!(self, Provider::Gcp);
        }
        if resource.starts_with("vsphere") {
            return matches!(self, Provider::Capv);
        }
        if resource.starts_with("kvm") {
            return matches!(self, Provider::Kvm);
        }

        true
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Provider::Aws => "aws",
            Provider::Azure => "azure",
            Provider::Gcp => "gcp",
            Provider::Capa => "capa",
            Provider::Capz => "capz",
            Provider::Capv => "capv",
            Provider::Kvm => "kvm",
        };

        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_infrastructure_groups_apply_everywhere() {
        for provider in [Provider::Aws, Provider::Azure, Provider::Gcp] {
            assert!(provider.is_resource_applicable("cluster.x-k8s.io", "clusters"));
            assert!(provider.is_resource_applicable("", "pods"));
        }
    }

    #[test]
    fn test_azure_skips_aws_families() {
        let provider = Provider::Azure;

        assert!(provider.is_resource_applicable("infrastructure.cluster.x-k8s.io", "azureclusters"));
        assert!(provider.is_resource_applicable("infrastructure.cluster.x-k8s.io", "azuremachines"));
        assert!(!provider.is_resource_applicable("infrastructure.giantswarm.io", "awsclusters"));
        assert!(!provider.is_resource_applicable("infrastructure.giantswarm.io", "g8scontrolplanes"));
    }

    #[test]
    fn test_vintage_aws_owns_g8s_family() {
        assert!(Provider::Aws.is_resource_applicable("infrastructure.giantswarm.io", "awsclusters"));
        assert!(
            Provider::Aws.is_resource_applicable("infrastructure.giantswarm.io", "g8scontrolplanes")
        );
        assert!(!Provider::Capa.is_resource_applicable("infrastructure.giantswarm.io", "g8scontrolplanes"));
        assert!(Provider::Capa.is_resource_applicable("infrastructure.cluster.x-k8s.io", "awsclusters"));
    }

    #[test]
    fn test_gcp_family() {
        assert!(Provider::Gcp.is_resource_applicable("infrastructure.cluster.x-k8s.io", "gcpclusters"));
        assert!(!Provider::Gcp.is_resource_applicable("infrastructure.cluster.x-k8s.io", "azureclusters"));
        assert!(!Provider::Azure.is_resource_applicable("infrastructure.cluster.x-k8s.io", "gcpclusters"));
    }

    #[test]
    fn test_unrecognized_family_applies_everywhere() {
        assert!(Provider::Azure.is_resource_applicable("infrastructure.cluster.x-k8s.io", "machinepools"));
    }

    #[test]
    fn test_provider_serde_names() {
        let provider: Provider = serde_json::from_str("\"capz\"").unwrap();
        assert_eq!(provider, Provider::Capz);
        assert_eq!(provider.to_string(), "capz");
    }
}
