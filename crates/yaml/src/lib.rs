//! krmkit yaml: document nodes for KRM resources.
//!
//! A [`Node`] is an ordered, mutable tree (mapping / sequence / scalar).
//! Scalars keep the text and quoting they were read with, containers keep
//! flow or block layout, so unmodified content re-emits the way it was
//! read. Equality is structural and ignores all formatting.

#![forbid(unsafe_code)]

use std::ops::{Deref, DerefMut};

use serde::{de::DeserializeOwned, Serialize};
use serde_yaml::Value;

mod emit;
pub mod meta;
mod parse;
pub mod path;

pub use meta::{ResourceMeta, ResourceRef};
pub use path::Segment;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parsing yaml: {0}")]
    Parse(#[from] yaml_rust2::ScanError),
    /// Structural access used on the wrong node shape.
    #[error("wrong node type at `{path}`: expected a mapping or sequence, found {found}")]
    Type { path: String, found: &'static str },
    #[error("resource identity: {0}")]
    Meta(String),
    #[error("decoding node: {0}")]
    Decode(serde_yaml::Error),
    #[error("encoding value: {0}")]
    Encode(serde_yaml::Error),
    #[error("unsupported mapping key: {0}")]
    UnsupportedKey(&'static str),
    #[error("unknown alias in document")]
    Alias,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How a scalar (or mapping key) is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Style {
    /// No preference: the emitter picks the simplest unambiguous form.
    #[default]
    Any,
    /// Read bare; written back bare with its original spelling.
    Plain,
    SingleQuoted,
    DoubleQuoted,
    /// Block literal (`|`).
    Literal,
    /// Block folded (`>`).
    Folded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Null,
    Bool,
    Int,
    Float,
    Str,
}

/// A scalar's resolved kind, its text as written (or its string value for
/// quoted and block scalars) and its style.
#[derive(Debug, Clone)]
pub struct Scalar {
    pub kind: ScalarKind,
    pub value: String,
    pub style: Style,
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match self.kind {
            ScalarKind::Null => true,
            ScalarKind::Str => self.value == other.value,
            _ => scalar_value(self) == scalar_value(other),
        }
    }
}

impl Scalar {
    pub fn null() -> Self {
        Self { kind: ScalarKind::Null, value: "null".to_string(), style: Style::Any }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self { kind: ScalarKind::Str, value: value.into(), style: Style::Any }
    }

    /// String scalar that is always written quoted, regardless of content.
    pub fn quoted(value: impl Into<String>) -> Self {
        Self { kind: ScalarKind::Str, value: value.into(), style: Style::SingleQuoted }
    }

    pub fn is_null(&self) -> bool {
        self.kind == ScalarKind::Null
    }
}

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    key_style: Style,
    value: Node,
}

/// Mapping with insertion-ordered string keys.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    entries: Vec<Entry>,
    flow: bool,
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self.entries.iter().zip(&other.entries).all(|(a, b)| a.key == b.key && a.value == b.value)
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Written as `{k: v, ...}` rather than in block layout.
    pub fn is_flow(&self) -> bool {
        self.flow
    }

    pub fn set_flow(&mut self, flow: bool) {
        self.flow = flow;
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries.iter_mut().find(|e| e.key == key).map(|e| &mut e.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace in place when the key exists, append otherwise.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        self.insert_styled(key.into(), Style::Any, value)
    }

    pub(crate) fn insert_styled(&mut self, key: String, key_style: Style, value: Node) -> Option<Node> {
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push(Entry { key, key_style, value });
                None
            }
        }
    }

    /// Insert every entry of `other`, keeping how its keys were written.
    pub fn append(&mut self, other: Mapping) {
        for e in other.entries {
            self.insert_styled(e.key, e.key_style, e.value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let idx = self.entries.iter().position(|e| e.key == key)?;
        Some(self.entries.remove(idx).value)
    }

    /// Value for `key`, inserting the result of `f` at the end when absent.
    pub fn get_or_insert_with(&mut self, key: &str, f: impl FnOnce() -> Node) -> &mut Node {
        let idx = match self.entries.iter().position(|e| e.key == key) {
            Some(i) => i,
            None => {
                self.entries.push(Entry { key: key.to_string(), key_style: Style::Any, value: f() });
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].value
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|e| (e.key.as_str(), &e.value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Node)> {
        self.entries.iter_mut().map(|e| (e.key.as_str(), &mut e.value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub(crate) fn styled_iter(&self) -> impl Iterator<Item = (&str, Style, &Node)> {
        self.entries.iter().map(|e| (e.key.as_str(), e.key_style, &e.value))
    }
}

impl FromIterator<(String, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut m = Mapping::new();
        for (k, v) in iter {
            m.insert(k, v);
        }
        m
    }
}

/// Ordered list of nodes plus its layout. Derefs to the element vector.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    items: Vec<Node>,
    flow: bool,
    indented: bool,
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Written as `[a, b]` rather than in block layout.
    pub fn is_flow(&self) -> bool {
        self.flow
    }

    pub fn set_flow(&mut self, flow: bool) {
        self.flow = flow;
    }

    /// Block entries indented under their mapping key (`key:\n  - a`).
    pub fn is_indented(&self) -> bool {
        self.indented
    }

    pub fn set_indented(&mut self, indented: bool) {
        self.indented = indented;
    }

    pub fn into_vec(self) -> Vec<Node> {
        self.items
    }
}

impl Deref for Sequence {
    type Target = Vec<Node>;

    fn deref(&self) -> &Vec<Node> {
        &self.items
    }
}

impl DerefMut for Sequence {
    fn deref_mut(&mut self) -> &mut Vec<Node> {
        &mut self.items
    }
}

impl From<Vec<Node>> for Sequence {
    fn from(items: Vec<Node>) -> Self {
        Self { items, ..Self::default() }
    }
}

impl FromIterator<Node> for Sequence {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Vec::from_iter(iter).into()
    }
}

impl IntoIterator for Sequence {
    type Item = Node;
    type IntoIter = std::vec::IntoIter<Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tagged {
    /// Tag as written, e.g. `!custom` or `!!str`.
    pub tag: String,
    pub node: Node,
}

/// One addressable unit of structured data.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Sequence),
    Mapping(Mapping),
    Tagged(Box<Tagged>),
}

impl Default for Node {
    fn default() -> Self {
        Node::Scalar(Scalar::null())
    }
}

impl Node {
    /// Parse the first YAML document in `s`. An empty stream is null.
    pub fn parse(s: &str) -> Result<Node> {
        parse::document(s)
    }

    pub fn null() -> Node {
        Node::default()
    }

    pub fn string(s: impl Into<String>) -> Node {
        Node::Scalar(Scalar::string(s))
    }

    pub fn quoted(s: impl Into<String>) -> Node {
        Node::Scalar(Scalar::quoted(s))
    }

    pub fn int(i: i64) -> Node {
        Node::Scalar(Scalar { kind: ScalarKind::Int, value: i.to_string(), style: Style::Any })
    }

    pub fn bool(b: bool) -> Node {
        Node::Scalar(Scalar { kind: ScalarKind::Bool, value: b.to_string(), style: Style::Any })
    }

    pub fn mapping() -> Node {
        Node::Mapping(Mapping::new())
    }

    pub fn sequence(items: Vec<Node>) -> Node {
        Node::Sequence(items.into())
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Scalar(s) if s.is_null() => "null",
            Node::Scalar(_) => "scalar",
            Node::Sequence(_) => "sequence",
            Node::Mapping(_) => "mapping",
            Node::Tagged(t) => t.node.kind_name(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.untagged(), Node::Scalar(s) if s.is_null())
    }

    /// Node with any tag peeled off.
    pub fn untagged(&self) -> &Node {
        match self {
            Node::Tagged(t) => t.node.untagged(),
            n => n,
        }
    }

    pub fn untagged_mut(&mut self) -> &mut Node {
        match self {
            Node::Tagged(t) => t.node.untagged_mut(),
            n => n,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self.untagged() {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self.untagged_mut() {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self.untagged() {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Sequence> {
        match self.untagged_mut() {
            Node::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self.untagged() {
            Node::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Text of a non-null scalar.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().filter(|s| !s.is_null()).map(|s| s.value.as_str())
    }

    pub fn from_value(value: Value) -> Result<Node> {
        Ok(match value {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::bool(b),
            Value::Number(n) => {
                let kind = if n.is_f64() { ScalarKind::Float } else { ScalarKind::Int };
                Node::Scalar(Scalar { kind, value: n.to_string(), style: Style::Any })
            }
            Value::String(s) => Node::string(s),
            Value::Sequence(seq) => {
                Node::Sequence(seq.into_iter().map(Node::from_value).collect::<Result<Sequence>>()?)
            }
            Value::Mapping(map) => {
                let mut out = Mapping::new();
                for (k, v) in map {
                    out.insert(key_text(k)?, Node::from_value(v)?);
                }
                Node::Mapping(out)
            }
            Value::Tagged(t) => {
                let tag = t.tag.to_string();
                Node::Tagged(Box::new(Tagged { tag, node: Node::from_value(t.value)? }))
            }
        })
    }

    /// Plain-data projection, dropping all formatting.
    pub fn to_value(&self) -> Value {
        match self {
            Node::Scalar(s) => scalar_value(s),
            Node::Sequence(seq) => Value::Sequence(seq.iter().map(Node::to_value).collect()),
            Node::Mapping(m) => {
                let mut out = serde_yaml::Mapping::new();
                for (k, v) in m.iter() {
                    out.insert(Value::String(k.to_string()), v.to_value());
                }
                Value::Mapping(out)
            }
            Node::Tagged(t) => {
                // core tags (`!!str`, `!!int`, ...) only steer resolution
                if t.tag.starts_with("!!") {
                    return t.node.to_value();
                }
                let tag = t.tag.trim_start_matches('!');
                if tag.is_empty() {
                    return t.node.to_value();
                }
                Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                    tag: serde_yaml::value::Tag::new(tag),
                    value: t.node.to_value(),
                }))
            }
        }
    }

    /// Deserialize this node into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_yaml::from_value(self.to_value()).map_err(Error::Decode)
    }

    /// Serialize a typed value into a fresh node.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Node> {
        Node::from_value(serde_yaml::to_value(value).map_err(Error::Encode)?)
    }

    /// Render this node as a YAML document.
    pub fn to_yaml_string(&self) -> String {
        emit::to_string(self)
    }

    /// Total number of nodes in this tree, including itself.
    pub fn count(&self) -> usize {
        match self {
            Node::Scalar(_) => 1,
            Node::Sequence(seq) => 1 + seq.iter().map(Node::count).sum::<usize>(),
            Node::Mapping(m) => 1 + m.iter().map(|(_, v)| v.count()).sum::<usize>(),
            Node::Tagged(t) => 1 + t.node.count(),
        }
    }
}

fn key_text(key: Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Sequence(_) => Err(Error::UnsupportedKey("sequence")),
        Value::Mapping(_) => Err(Error::UnsupportedKey("mapping")),
        Value::Tagged(t) => key_text(t.value),
    }
}

fn parse_int(text: &str) -> Option<Value> {
    let (neg, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = digits.replace('_', "");
    let (radix, body) = if let Some(h) = digits.strip_prefix("0x") {
        (16, h)
    } else if let Some(o) = digits.strip_prefix("0o") {
        (8, o)
    } else if let Some(b) = digits.strip_prefix("0b") {
        (2, b)
    } else {
        (10, digits.as_str())
    };
    let magnitude = u64::from_str_radix(body, radix).ok()?;
    if neg {
        let i = i64::try_from(magnitude).ok()?;
        Some(Value::Number((-i).into()))
    } else {
        Some(Value::Number(magnitude.into()))
    }
}

fn parse_float(s: &str) -> Option<f64> {
    match s {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => Some(f64::NAN),
        _ => s.replace('_', "").parse().ok(),
    }
}

fn scalar_value(s: &Scalar) -> Value {
    match s.kind {
        ScalarKind::Null => Value::Null,
        ScalarKind::Bool => Value::Bool(s.value.eq_ignore_ascii_case("true")),
        ScalarKind::Int => parse_int(&s.value).unwrap_or_else(|| Value::String(s.value.clone())),
        ScalarKind::Float => match parse_float(&s.value) {
            Some(f) => Value::Number(f.into()),
            None => Value::String(s.value.clone()),
        },
        ScalarKind::Str => Value::String(s.value.clone()),
    }
}

impl From<Mapping> for Node {
    fn from(m: Mapping) -> Self {
        Node::Mapping(m)
    }
}

impl From<Vec<Node>> for Node {
    fn from(seq: Vec<Node>) -> Self {
        Node::Sequence(seq.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_key_order() {
        let n = Node::parse("b: 1\na: 2\nc: 3\n").unwrap();
        let keys: Vec<_> = n.as_mapping().unwrap().keys().collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn insert_replaces_in_place() {
        let mut m = Mapping::new();
        m.insert("a", Node::int(1));
        m.insert("b", Node::int(2));
        let prev = m.insert("a", Node::int(3));
        assert_eq!(prev, Some(Node::int(1)));
        let keys: Vec<_> = m.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(m.get("a"), Some(&Node::int(3)));
    }

    #[test]
    fn equality_ignores_formatting() {
        assert_eq!(Node::string("baz"), Node::quoted("baz"));
        assert_ne!(Node::string("1"), Node::int(1));
        assert_eq!(Node::parse("a: 0x10\n").unwrap(), Node::parse("a: 16\n").unwrap());
        assert_eq!(Node::parse("a: {b: c}\n").unwrap(), Node::parse("a:\n  b: c\n").unwrap());
        assert_eq!(Node::parse("a: [1]\n").unwrap(), Node::parse("a:\n  - 1\n").unwrap());
        assert_eq!(Node::parse("a:\n").unwrap(), Node::parse("a: ~\n").unwrap());
    }

    #[test]
    fn value_projection_keeps_types() {
        let n = Node::parse(
            "replicas: 3\nratio: 0.5\nname: '3'\nok: true\nnothing: ~\nhex: 0x50\nbig: 1e3\nneg: -7\nloud: TRUE\nempty:\n",
        )
        .unwrap();
        let v = n.to_value();
        assert_eq!(v["replicas"], Value::Number(3.into()));
        assert_eq!(v["ratio"], Value::Number(0.5.into()));
        assert_eq!(v["name"], Value::String("3".into()));
        assert_eq!(v["ok"], Value::Bool(true));
        assert_eq!(v["nothing"], Value::Null);
        assert_eq!(v["hex"], Value::Number(80.into()));
        assert_eq!(v["big"], Value::Number(1000.0.into()));
        assert_eq!(v["neg"], Value::Number((-7).into()));
        assert_eq!(v["loud"], Value::Bool(true));
        assert_eq!(v["empty"], Value::Null);
    }

    #[test]
    fn yaml11_words_are_strings() {
        let n = Node::parse("yes: on\nx: y\n").unwrap();
        assert_eq!(n.get_string(&["yes"]).unwrap(), Some("on"));
        assert_eq!(n.to_value()["x"], Value::String("y".into()));
    }

    #[test]
    fn decode_into_typed_struct() {
        #[derive(serde::Deserialize)]
        struct Spec {
            name: String,
            #[serde(default)]
            replicas: i64,
        }
        let n = Node::parse("name: web\nreplicas: 2\nextra: ignored\n").unwrap();
        let spec: Spec = n.decode().unwrap();
        assert_eq!(spec.name, "web");
        assert_eq!(spec.replicas, 2);
    }

    #[test]
    fn complex_keys_are_rejected() {
        let err = Node::parse("? [a, b]\n: c\n").unwrap_err();
        assert!(matches!(err, Error::UnsupportedKey("sequence")), "{err}");
    }

    #[test]
    fn tags_survive_projection() {
        let n = Node::parse("v: !custom thing\n").unwrap();
        let inner = n.as_mapping().unwrap().get("v").unwrap();
        match inner {
            Node::Tagged(t) => {
                assert_eq!(t.tag, "!custom");
                assert_eq!(t.node.as_str(), Some("thing"));
            }
            other => panic!("expected tagged node, got {other:?}"),
        }
        assert_eq!(Node::from_value(n.to_value()).unwrap(), n);
    }

    #[test]
    fn core_tags_steer_resolution() {
        let n = Node::parse("a: !!str 1\n").unwrap();
        assert_eq!(n.to_value()["a"], Value::String("1".into()));
    }

    #[test]
    fn aliases_expand() {
        let n = Node::parse("base: &b\n  x: 1\ncopy: *b\n").unwrap();
        assert_eq!(n.lookup(&["copy", "x"]).unwrap(), n.lookup(&["base", "x"]).unwrap());
    }

    #[test]
    fn count_walks_tree() {
        let n = Node::parse("a: [1, 2]\nb: {c: d}\n").unwrap();
        // root + a + 2 items + b + c
        assert_eq!(n.count(), 6);
    }

    #[test]
    fn empty_stream_is_null() {
        assert!(Node::parse("").unwrap().is_null());
        assert!(Node::parse("# only a comment\n").unwrap().is_null());
    }
}
