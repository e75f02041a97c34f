//! Resource identity projected from a node.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::TypeMeta;
use serde::{Deserialize, Serialize};

use crate::{Error, Mapping, Node, Result};

/// Read-only view of a resource's apiVersion, kind and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceMeta {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
}

static EMPTY: BTreeMap<String, String> = BTreeMap::new();

impl ResourceMeta {
    pub fn api_version(&self) -> &str {
        &self.types.api_version
    }

    pub fn kind(&self) -> &str {
        &self.types.kind
    }

    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        self.metadata.labels.as_ref().unwrap_or(&EMPTY)
    }

    pub fn annotations(&self) -> &BTreeMap<String, String> {
        self.metadata.annotations.as_ref().unwrap_or(&EMPTY)
    }

    /// `apiVersion/kind/[namespace/]name`, for logs and result summaries.
    pub fn key(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}/{}", self.api_version(), self.kind(), ns, self.name()),
            None => format!("{}/{}/{}", self.api_version(), self.kind(), self.name()),
        }
    }
}

/// Reference to a resource inside a diagnostic: apiVersion, kind, name and namespace only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(flatten)]
    pub types: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,
}

impl From<&ResourceMeta> for ResourceRef {
    fn from(meta: &ResourceMeta) -> Self {
        ResourceRef {
            types: meta.types.clone(),
            metadata: ObjectMeta {
                name: meta.metadata.name.clone(),
                namespace: meta.metadata.namespace.clone(),
                ..ObjectMeta::default()
            },
        }
    }
}

impl Node {
    /// Identity fields of this resource. `apiVersion` and `kind` must be
    /// present strings; metadata fields must have their documented types.
    pub fn get_meta(&self) -> Result<ResourceMeta> {
        let root = self
            .as_mapping()
            .ok_or_else(|| Error::Meta(format!("resource must be a mapping, found {}", self.kind_name())))?;
        for field in ["apiVersion", "kind"] {
            match root.get(field) {
                None => return Err(Error::Meta(format!("missing {field}"))),
                Some(n) if n.as_scalar().map(|s| s.kind) != Some(crate::ScalarKind::Str) => {
                    return Err(Error::Meta(format!("{field} must be a string, found {}", n.kind_name())));
                }
                Some(_) => {}
            }
        }
        // Project only the identity fields so unrelated content cannot fail decoding.
        let mut ident = Mapping::new();
        for field in ["apiVersion", "kind"] {
            if let Some(n) = root.get(field) {
                ident.insert(field, n.clone());
            }
        }
        if let Some(meta) = root.get("metadata").filter(|n| !n.is_null()) {
            ident.insert("metadata", project_metadata(meta)?);
        }
        Node::Mapping(ident).decode::<ResourceMeta>().map_err(|e| Error::Meta(e.to_string()))
    }
}

/// name, namespace, labels and annotations, with scalar values as strings.
fn project_metadata(meta: &Node) -> Result<Node> {
    let map = meta
        .as_mapping()
        .ok_or_else(|| Error::Meta(format!("metadata must be a mapping, found {}", meta.kind_name())))?;
    let mut out = Mapping::new();
    for field in ["name", "namespace"] {
        if let Some(n) = map.get(field).filter(|n| !n.is_null()) {
            out.insert(field, as_text(&format!("metadata.{field}"), n)?);
        }
    }
    for field in ["labels", "annotations"] {
        let Some(n) = map.get(field).filter(|n| !n.is_null()) else { continue };
        let entries = n
            .as_mapping()
            .ok_or_else(|| Error::Meta(format!("metadata.{field} must be a mapping, found {}", n.kind_name())))?;
        let mut strings = Mapping::new();
        for (k, v) in entries.iter() {
            strings.insert(k, as_text(&format!("metadata.{field}.{k}"), v)?);
        }
        out.insert(field, Node::Mapping(strings));
    }
    Ok(Node::Mapping(out))
}

fn as_text(path: &str, n: &Node) -> Result<Node> {
    match n.as_scalar() {
        Some(s) if s.is_null() => Ok(Node::string("")),
        Some(s) => Ok(Node::string(s.value.clone())),
        None => Err(Error::Meta(format!("{path} must be a string, found {}", n.kind_name()))),
    }
}
