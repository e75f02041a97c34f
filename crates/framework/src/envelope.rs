//! ResourceList envelope: decode and encode.

use std::io::{Read, Write};

use krmkit_yaml::{Mapping, Node};
use tracing::{debug, warn};

use crate::{Error, Limits, Result};

pub const API_VERSION: &str = "config.kubernetes.io/v1alpha1";
pub const KIND: &str = "ResourceList";
const API_GROUP: &str = "config.kubernetes.io/";

const RESERVED: [&str; 5] = ["apiVersion", "kind", "items", "functionConfig", "results"];

/// One decoded ResourceList.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceList {
    pub items: Vec<Node>,
    pub function_config: Option<Node>,
    /// Result Sets already present in the input, kept opaque.
    pub results: Vec<Node>,
    /// Unrecognized top-level fields, re-emitted as read.
    pub extra: Mapping,
}

impl ResourceList {
    pub fn new(items: Vec<Node>) -> Self {
        Self { items, ..Self::default() }
    }

    /// Read the whole stream and decode it.
    pub fn read_from<R: Read>(input: R, limits: &Limits) -> Result<Self> {
        let mut buf = Vec::new();
        let cap = limits.max_input_bytes as u64;
        input.take(cap.saturating_add(1)).read_to_end(&mut buf)?;
        if buf.len() as u64 > cap {
            return Err(Error::Format(format!("input too large (>{} bytes)", limits.max_input_bytes)));
        }
        let text = String::from_utf8(buf).map_err(|_| Error::Format("input is not valid UTF-8".into()))?;
        Self::decode(&text, limits)
    }

    pub fn decode(s: &str, limits: &Limits) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(Error::Format("empty input".into()));
        }
        let root = Node::parse(s)?;
        let nodes = root.count();
        if nodes > limits.max_nodes {
            return Err(Error::Format(format!("document too complex (>{} nodes)", limits.max_nodes)));
        }
        let found = root.kind_name();
        let Node::Mapping(mut map) = root else {
            return Err(Error::Format(format!("root must be a mapping, found {found}")));
        };

        match map.get("kind").and_then(Node::as_str) {
            Some(KIND) => {}
            Some(other) => return Err(Error::Format(format!("kind must be {KIND}, found {other}"))),
            None => return Err(Error::Format("missing kind".into())),
        }
        if let Some(av) = map.get("apiVersion").and_then(Node::as_str) {
            if !av.starts_with(API_GROUP) {
                warn!(api_version = %av, "unexpected ResourceList apiVersion");
            }
        }

        let items = match map.remove("items") {
            None => Vec::new(),
            Some(n) if n.is_null() => Vec::new(),
            Some(Node::Sequence(seq)) => seq.into_vec(),
            Some(other) => {
                return Err(Error::Format(format!("items must be a sequence, found {}", other.kind_name())))
            }
        };
        // an explicit null is echoed back as read
        let function_config = map.remove("functionConfig");
        let results = match map.remove("results") {
            None => Vec::new(),
            Some(n) if n.is_null() => Vec::new(),
            Some(Node::Sequence(seq)) => seq.into_vec(),
            // single Result Set written by older producers
            Some(n @ Node::Mapping(_)) => vec![n],
            Some(other) => {
                return Err(Error::Format(format!("results must be a sequence, found {}", other.kind_name())))
            }
        };
        let mut extra = map;
        for key in RESERVED {
            extra.remove(key);
        }
        extra.set_flow(false);

        debug!(
            items = items.len(),
            function_config = function_config.is_some(),
            prior_results = results.len(),
            nodes,
            "decoded ResourceList"
        );
        Ok(Self { items, function_config, results, extra })
    }

    /// Envelope as a node: identity, items, functionConfig, results, then
    /// unrecognized fields. Empty results are omitted.
    pub fn to_node(&self) -> Node {
        let mut map = Mapping::new();
        map.insert("apiVersion", Node::string(API_VERSION));
        map.insert("kind", Node::string(KIND));
        map.insert("items", Node::sequence(self.items.clone()));
        if let Some(fc) = &self.function_config {
            map.insert("functionConfig", fc.clone());
        }
        if !self.results.is_empty() {
            map.insert("results", Node::sequence(self.results.clone()));
        }
        map.append(self.extra.clone());
        Node::Mapping(map)
    }

    pub fn encode(&self) -> String {
        self.to_node().to_yaml_string()
    }

    /// Render fully in memory, then write once.
    pub fn write_to<W: Write>(&self, mut out: W) -> Result<()> {
        let rendered = self.encode();
        out.write_all(rendered.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}
