//! The fixed catalog of objects materialized in every project namespace.

use dashboard_core::ResourceKind;
use dashboard_core::labels::{COMPONENT_LABEL, NAME_LABEL, VERSION_LABEL};
use serde_json::{Value, json};

const GITEA_IMAGE: &str = "gitea/gitea";
const GITEA_VERSION: &str = "1.5.2";
const GITEA_COMPONENT: &str = "web";
const PROMETHEUS_VERSION: &str = "v2.3.2";
const DEFAULT_NAME: &str = "presslabs-dashboard";

/// One entry of the derived resource catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    ResourceQuota,
    LimitRange,
    Prometheus,
    GiteaDeployment,
    GiteaService,
    GiteaIngress,
    GiteaVolume,
    GiteaSecret,
}

impl Component {
    pub const ALL: [Component; 8] = [
        Component::ResourceQuota,
        Component::LimitRange,
        Component::Prometheus,
        Component::GiteaDeployment,
        Component::GiteaService,
        Component::GiteaIngress,
        Component::GiteaVolume,
        Component::GiteaSecret,
    ];

    pub fn kind(&self) -> ResourceKind {
        match self {
            Component::ResourceQuota => ResourceKind::ResourceQuota,
            Component::LimitRange => ResourceKind::LimitRange,
            Component::Prometheus => ResourceKind::Prometheus,
            Component::GiteaDeployment => ResourceKind::Deployment,
            Component::GiteaService => ResourceKind::Service,
            Component::GiteaIngress => ResourceKind::Ingress,
            Component::GiteaVolume => ResourceKind::PersistentVolumeClaim,
            Component::GiteaSecret => ResourceKind::Secret,
        }
    }

    /// Object name inside the project namespace.
    pub fn object_name(&self) -> &'static str {
        match self {
            Component::ResourceQuota | Component::LimitRange => DEFAULT_NAME,
            Component::Prometheus => "prometheus",
            Component::GiteaSecret => "gitea-conf",
            Component::GiteaDeployment
            | Component::GiteaService
            | Component::GiteaIngress
            | Component::GiteaVolume => "gitea",
        }
    }

    /// Labels identifying the application this entry belongs to, if any.
    pub fn component_labels(&self) -> Vec<(&'static str, &'static str)> {
        match self {
            Component::ResourceQuota | Component::LimitRange => Vec::new(),
            Component::Prometheus => vec![
                (NAME_LABEL, "prometheus"),
                (VERSION_LABEL, PROMETHEUS_VERSION),
            ],
            Component::GiteaDeployment => vec![
                (NAME_LABEL, "gitea"),
                (COMPONENT_LABEL, GITEA_COMPONENT),
                (VERSION_LABEL, GITEA_VERSION),
            ],
            Component::GiteaService
            | Component::GiteaIngress
            | Component::GiteaVolume
            | Component::GiteaSecret => {
                vec![(NAME_LABEL, "gitea"), (COMPONENT_LABEL, GITEA_COMPONENT)]
            }
        }
    }

    /// Static body template, rendered from the project and organization slugs.
    pub fn body(&self, project: &str, organization: &str) -> Value {
        match self {
            Component::ResourceQuota => json!({
                "hard": {
                    "requests.cpu": "4",
                    "requests.memory": "15Gi",
                    "limits.cpu": "8",
                    "limits.memory": "30Gi",
                    "persistentvolumeclaims": "10",
                    "requests.storage": "100Gi",
                }
            }),
            Component::LimitRange => json!({
                "limits": [{
                    "type": "Container",
                    "default": { "cpu": "500m", "memory": "512Mi" },
                    "defaultRequest": { "cpu": "100m", "memory": "128Mi" },
                }]
            }),
            Component::Prometheus => json!({
                "version": PROMETHEUS_VERSION,
                "replicas": 1,
                "retention": "7d",
                "serviceMonitorSelector": {
                    "matchLabels": { "presslabs.com/project": project }
                },
            }),
            Component::GiteaDeployment => json!({
                "replicas": 1,
                "selector": {
                    "matchLabels": {
                        "app.kubernetes.io/name": "gitea",
                        "presslabs.com/project": project,
                    }
                },
                "template": {
                    "containers": [{
                        "name": "gitea",
                        "image": format!("{GITEA_IMAGE}:{GITEA_VERSION}"),
                        "ports": [
                            { "name": "http", "containerPort": 3000 },
                            { "name": "ssh", "containerPort": 22 },
                        ],
                        "volumeMounts": [
                            { "name": "data", "mountPath": "/data" },
                            { "name": "config", "mountPath": "/data/gitea/conf" },
                        ],
                    }],
                    "volumes": [
                        { "name": "data", "persistentVolumeClaim": { "claimName": "gitea" } },
                        { "name": "config", "secret": { "secretName": "gitea-conf" } },
                    ],
                },
            }),
            Component::GiteaService => json!({
                "type": "ClusterIP",
                "selector": {
                    "app.kubernetes.io/name": "gitea",
                    "presslabs.com/project": project,
                },
                "ports": [
                    { "name": "http", "port": 80, "targetPort": 3000 },
                    { "name": "ssh", "port": 22, "targetPort": 22 },
                ],
            }),
            Component::GiteaIngress => json!({
                "rules": [{
                    "host": format!("{project}.{organization}.git.presslabs.net"),
                    "http": {
                        "paths": [{
                            "path": "/",
                            "backend": { "serviceName": "gitea", "servicePort": 80 },
                        }]
                    }
                }]
            }),
            Component::GiteaVolume => json!({
                "accessModes": ["ReadWriteOnce"],
                "resources": { "requests": { "storage": "10Gi" } },
            }),
            Component::GiteaSecret => json!({
                "type": "Opaque",
                "stringData": {
                    "app.ini": format!(
                        "APP_NAME = {organization}/{project}\nRUN_MODE = prod\n\n[server]\nHTTP_PORT = 3000\nROOT_URL = https://{project}.{organization}.git.presslabs.net/\n"
                    ),
                },
            }),
        }
    }
}
