//! Diagnostics: Result Sets and their aggregation with upstream results.

use std::fmt;

use krmkit_yaml::{Node, ResourceMeta, ResourceRef};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        })
    }
}

/// Field a diagnostic points at, with an optional replacement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub message: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_ref: Option<ResourceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<Field>,
}

impl ResultItem {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self { message: message.into(), severity, resource_ref: None, field: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn with_resource(mut self, meta: &ResourceMeta) -> Self {
        self.resource_ref = Some(ResourceRef::from(meta));
        self
    }

    pub fn with_field(mut self, path: impl Into<String>, suggested_value: Option<&str>) -> Self {
        self.field = Some(Field { path: path.into(), suggested_value: suggested_value.map(str::to_string) });
        self
    }

    fn resource_key(&self) -> String {
        match &self.resource_ref {
            Some(r) => {
                let name = r.metadata.name.as_deref().unwrap_or("");
                match r.metadata.namespace.as_deref() {
                    Some(ns) => format!("{}/{}/{}/{}", r.types.api_version, r.types.kind, ns, name),
                    None => format!("{}/{}/{}", r.types.api_version, r.types.kind, name),
                }
            }
            None => String::new(),
        }
    }
}

impl fmt::Display for ResultItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.severity)?;
        if self.resource_ref.is_some() {
            write!(f, " {}", self.resource_key())?;
        }
        if let Some(field) = &self.field {
            write!(f, " {}", field.path)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Named, ordered diagnostics produced by one invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub name: String,
    #[serde(default)]
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), items: Vec::new() }
    }

    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.items.iter().filter(|i| i.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    /// Rank items: errors first, then by resource and field path. Stable.
    pub fn sort(&mut self) {
        self.items.sort_by_cached_key(|i| {
            (i.severity, i.resource_key(), i.field.as_ref().map(|f| f.path.clone()).unwrap_or_default())
        });
    }

    /// Read back a Result Set node (e.g. one produced upstream).
    pub fn from_node(node: &Node) -> Result<Self> {
        Ok(node.decode()?)
    }

    pub fn to_node(&self) -> Result<Node> {
        Ok(Node::encode(self)?)
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} error(s), {} warning(s), {} info",
            self.name,
            self.count(Severity::Error),
            self.count(Severity::Warning),
            self.count(Severity::Info)
        )?;
        for item in &self.items {
            write!(f, "\n  {item}")?;
        }
        Ok(())
    }
}

/// Outcome of an invocation that produced output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// At least one Error item was produced by this invocation.
    ValidationFailed,
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Append this invocation's Result Set to the upstream ones and decide
/// the invocation status. Upstream Error items never fail this invocation.
pub fn aggregate(prior: Vec<Node>, produced: Option<&ResultSet>) -> Result<(Vec<Node>, Status)> {
    let mut merged = prior;
    let mut status = Status::Success;
    if let Some(set) = produced.filter(|s| !s.is_empty()) {
        if set.has_errors() {
            status = Status::ValidationFailed;
        }
        merged.push(set.to_node()?);
    }
    Ok((merged, status))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment_meta() -> ResourceMeta {
        Node::parse("apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: foo\n")
            .unwrap()
            .get_meta()
            .unwrap()
    }

    #[test]
    fn result_set_shape() {
        let mut set = ResultSet::new("replicas-validator");
        set.push(
            ResultItem::error("missing replicas")
                .with_resource(&deployment_meta())
                .with_field("spec.replicas", Some("1")),
        );
        assert_eq!(
            set.to_node().unwrap().to_yaml_string(),
            "name: replicas-validator\nitems:\n- message: missing replicas\n  severity: error\n  resourceRef:\n    apiVersion: apps/v1\n    kind: Deployment\n    metadata:\n      name: foo\n  field:\n    path: spec.replicas\n    suggestedValue: \"1\"\n"
        );
    }

    #[test]
    fn only_error_items_fail() {
        let mut set = ResultSet::new("v");
        set.push(ResultItem::warning("w"));
        set.push(ResultItem::info("i"));
        let (_, status) = aggregate(vec![], Some(&set)).unwrap();
        assert_eq!(status, Status::Success);

        set.push(ResultItem::error("e"));
        let (_, status) = aggregate(vec![], Some(&set)).unwrap();
        assert_eq!(status, Status::ValidationFailed);
    }

    #[test]
    fn upstream_errors_are_kept_but_do_not_fail() {
        let upstream = ResultSet { name: "up".into(), items: vec![ResultItem::error("old")] }.to_node().unwrap();
        let mut mine = ResultSet::new("mine");
        mine.push(ResultItem::info("fine"));
        let (merged, status) = aggregate(vec![upstream.clone()], Some(&mine)).unwrap();
        assert_eq!(status, Status::Success);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], upstream);
        assert_eq!(ResultSet::from_node(&merged[1]).unwrap(), mine);
    }

    #[test]
    fn empty_sets_are_dropped() {
        let (merged, status) = aggregate(vec![], Some(&ResultSet::new("empty"))).unwrap();
        assert!(merged.is_empty());
        assert_eq!(status, Status::Success);
        let (merged, _) = aggregate(vec![], None).unwrap();
        assert!(merged.is_empty());
    }

    #[test]
    fn sort_ranks_by_severity() {
        let mut set = ResultSet::new("s");
        set.push(ResultItem::info("a"));
        set.push(ResultItem::error("b").with_field("spec.z", None));
        set.push(ResultItem::warning("c"));
        set.push(ResultItem::error("d").with_field("spec.a", None));
        set.sort();
        let order: Vec<_> = set.items.iter().map(|i| i.message.as_str()).collect();
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn display_summarizes() {
        let mut set = ResultSet::new("replicas-validator");
        set.push(ResultItem::error("missing replicas").with_resource(&deployment_meta()).with_field("spec.replicas", None));
        assert_eq!(
            set.to_string(),
            "replicas-validator: 1 error(s), 0 warning(s), 0 info\n  [error] apps/v1/Deployment/foo spec.replicas: missing replicas"
        );
    }

    #[test]
    fn upstream_nodes_decode() {
        let node = Node::parse("name: up\nitems:\n- message: hi\n  severity: warning\n  extra: kept\n").unwrap();
        let set = ResultSet::from_node(&node).unwrap();
        assert_eq!(set.items[0].severity, Severity::Warning);
    }
}
