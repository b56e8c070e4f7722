//! Label and field selectors accepted by list and watch.
//!
//! Label selectors use the familiar comma separated syntax:
//! `k=v`, `k==v`, `k!=v`, `k` (key exists) and `!k` (key absent).

use std::fmt;
use std::str::FromStr;

use dashboard_core::{Labels, Object};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    DoesNotExist(String),
}

impl Requirement {
    fn matches(&self, labels: &Labels) -> bool {
        match self {
            Requirement::Equals(k, v) => labels.get(k) == Some(v),
            Requirement::NotEquals(k, v) => labels.get(k) != Some(v),
            Requirement::Exists(k) => labels.contains_key(k),
            Requirement::DoesNotExist(k) => !labels.contains_key(k),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::Equals(k, v) => write!(f, "{k}={v}"),
            Requirement::NotEquals(k, v) => write!(f, "{k}!={v}"),
            Requirement::Exists(k) => write!(f, "{k}"),
            Requirement::DoesNotExist(k) => write!(f, "!{k}"),
        }
    }
}

/// A conjunction of label requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `key=value` requirement.
    pub fn equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::Equals(key.into(), value.into()));
        self
    }

    /// Adds a `key!=value` requirement.
    pub fn not_equals(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements
            .push(Requirement::NotEquals(key.into(), value.into()));
        self
    }

    pub fn exists(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(Requirement::Exists(key.into()));
        self
    }

    pub fn absent(mut self, key: impl Into<String>) -> Self {
        self.requirements.push(Requirement::DoesNotExist(key.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl FromStr for LabelSelector {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selector = LabelSelector::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let requirement = if let Some((k, v)) = term.split_once("!=") {
                Requirement::NotEquals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once("==") {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some((k, v)) = term.split_once('=') {
                Requirement::Equals(k.trim().to_string(), v.trim().to_string())
            } else if let Some(k) = term.strip_prefix('!') {
                Requirement::DoesNotExist(k.trim().to_string())
            } else {
                Requirement::Exists(term.to_string())
            };

            let key = match &requirement {
                Requirement::Equals(k, _)
                | Requirement::NotEquals(k, _)
                | Requirement::Exists(k)
                | Requirement::DoesNotExist(k) => k,
            };
            if key.is_empty() {
                return Err(StoreError::invalid(format!(
                    "invalid label selector term \"{term}\": empty key"
                )));
            }
            selector.requirements.push(requirement);
        }
        Ok(selector)
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&terms.join(","))
    }
}

/// Equality constraints on object metadata fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    name: Option<String>,
    namespace: Option<String>,
}

impl FieldSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn matches(&self, obj: &Object) -> bool {
        self.name.as_deref().is_none_or(|n| obj.name() == n)
            && self
                .namespace
                .as_deref()
                .is_none_or(|ns| obj.namespace() == Some(ns))
    }
}

impl FromStr for FieldSelector {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut selector = FieldSelector::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let (field, value) = term
                .split_once("==")
                .or_else(|| term.split_once('='))
                .ok_or_else(|| StoreError::invalid(format!("invalid field selector \"{term}\"")))?;
            match field.trim() {
                "metadata.name" => selector.name = Some(value.trim().to_string()),
                "metadata.namespace" => selector.namespace = Some(value.trim().to_string()),
                other => {
                    return Err(StoreError::invalid(format!(
                        "unsupported field selector \"{other}\""
                    )));
                }
            }
        }
        Ok(selector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashboard_core::ResourceKind;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_label_selector() {
        let sel: LabelSelector = "kind=project, org==acme,tier!=db,owner,!legacy".parse().unwrap();
        assert_eq!(
            sel.requirements(),
            &[
                Requirement::Equals("kind".into(), "project".into()),
                Requirement::Equals("org".into(), "acme".into()),
                Requirement::NotEquals("tier".into(), "db".into()),
                Requirement::Exists("owner".into()),
                Requirement::DoesNotExist("legacy".into()),
            ]
        );
        assert_eq!(sel.to_string(), "kind=project,org=acme,tier!=db,owner,!legacy");
    }

    #[test]
    fn test_label_selector_matches() {
        let sel = LabelSelector::new().equals("kind", "project").absent("legacy");
        assert!(sel.matches(&labels(&[("kind", "project")])));
        assert!(!sel.matches(&labels(&[("kind", "organization")])));
        assert!(!sel.matches(&labels(&[("kind", "project"), ("legacy", "")])));

        assert!(LabelSelector::new().matches(&Labels::new()));
        assert!("".parse::<LabelSelector>().unwrap().is_empty());
        assert!("=x".parse::<LabelSelector>().is_err());
    }

    #[test]
    fn test_field_selector() {
        let obj = dashboard_core::Object::namespaced(ResourceKind::Secret, "proj-web", "gitea-conf");
        let sel: FieldSelector = "metadata.name=gitea-conf,metadata.namespace==proj-web"
            .parse()
            .unwrap();
        assert!(sel.matches(&obj));
        assert!(!FieldSelector::new().name("gitea").matches(&obj));
        assert!("spec.replicas=1".parse::<FieldSelector>().is_err());
    }
}
