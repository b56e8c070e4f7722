use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Object kinds known to the dashboard control plane.
///
/// The set is closed: every kind the controllers read or write is listed here,
/// so dispatch over kinds is a plain `match` rather than a type lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Namespace,
    CustomResourceDefinition,
    ResourceQuota,
    LimitRange,
    Prometheus,
    Deployment,
    Service,
    Ingress,
    PersistentVolumeClaim,
    Secret,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::Namespace,
        ResourceKind::CustomResourceDefinition,
        ResourceKind::ResourceQuota,
        ResourceKind::LimitRange,
        ResourceKind::Prometheus,
        ResourceKind::Deployment,
        ResourceKind::Service,
        ResourceKind::Ingress,
        ResourceKind::PersistentVolumeClaim,
        ResourceKind::Secret,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Namespace => "Namespace",
            ResourceKind::CustomResourceDefinition => "CustomResourceDefinition",
            ResourceKind::ResourceQuota => "ResourceQuota",
            ResourceKind::LimitRange => "LimitRange",
            ResourceKind::Prometheus => "Prometheus",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::Service => "Service",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Secret => "Secret",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::CustomResourceDefinition => "apiextensions.k8s.io/v1beta1",
            ResourceKind::Prometheus => "monitoring.coreos.com/v1",
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::Ingress => "extensions/v1beta1",
            _ => "v1",
        }
    }

    /// Whether objects of this kind live inside a namespace.
    pub fn is_namespaced(&self) -> bool {
        !matches!(
            self,
            ResourceKind::Namespace | ResourceKind::CustomResourceDefinition
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| CoreError::invalid_kind(s))
    }
}
