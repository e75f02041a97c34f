//! Path addressing and field mutation.
//!
//! A path is a list of segments. Each segment is a mapping key, a numeric
//! index into a sequence, or a `[key=value]` selector that picks the first
//! sequence element whose `key` field equals `value`.

use smallvec::SmallVec;

use crate::{Error, Mapping, Node, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Key(&'a str),
    Index(usize),
    Match { key: &'a str, value: &'a str },
}

impl<'a> Segment<'a> {
    pub fn parse(raw: &'a str) -> Segment<'a> {
        if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            if let Some((key, value)) = inner.split_once('=') {
                return Segment::Match { key, value };
            }
            if let Ok(i) = inner.parse::<usize>() {
                return Segment::Index(i);
            }
        }
        Segment::Key(raw)
    }
}

/// Split a dotted path (`spec.template.spec`) into segments.
pub fn split_path(path: &str) -> SmallVec<[&str; 8]> {
    path.split('.').filter(|s| !s.is_empty()).collect()
}

// `consumed` is how many segments led to `node`.
fn type_error(path: &[&str], consumed: usize, node: &Node) -> Error {
    Error::Type { path: path[..consumed].join("."), found: node.kind_name() }
}

fn select(seq: &[Node], seg: &Segment<'_>) -> Option<usize> {
    match seg {
        Segment::Index(i) => (*i < seq.len()).then_some(*i),
        Segment::Key(k) => k.parse::<usize>().ok().filter(|i| *i < seq.len()),
        Segment::Match { key, value } => seq.iter().position(|item| {
            item.as_mapping().and_then(|m| m.get(key)).and_then(Node::as_str) == Some(*value)
        }),
    }
}

impl Node {
    /// Descend `path`. Missing segments yield `Ok(None)`; stepping through a
    /// scalar fails with [`Error::Type`].
    pub fn lookup(&self, path: &[&str]) -> Result<Option<&Node>> {
        let mut cur = self;
        for (depth, raw) in path.iter().enumerate() {
            let seg = Segment::parse(raw);
            let next = match cur.untagged() {
                Node::Mapping(m) => match seg {
                    Segment::Key(k) => m.get(k),
                    _ => None,
                },
                Node::Sequence(seq) => select(seq, &seg).map(|i| &seq[i]),
                n if n.is_null() => None,
                n => return Err(type_error(path, depth, n)),
            };
            match next {
                Some(n) => cur = n,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Mutable variant of [`Node::lookup`].
    pub fn lookup_mut(&mut self, path: &[&str]) -> Result<Option<&mut Node>> {
        let mut cur = self;
        for (depth, raw) in path.iter().enumerate() {
            let seg = Segment::parse(raw);
            let node = cur.untagged_mut();
            if node.is_null() {
                return Ok(None);
            }
            let next = match node {
                Node::Mapping(m) => match seg {
                    Segment::Key(k) => m.get_mut(k),
                    _ => None,
                },
                Node::Sequence(seq) => match select(seq, &seg) {
                    Some(i) => Some(&mut seq[i]),
                    None => None,
                },
                n => return Err(type_error(path, depth, n)),
            };
            match next {
                Some(n) => cur = n,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Dotted-path form of [`Node::lookup`].
    pub fn lookup_path(&self, path: &str) -> Result<Option<&Node>> {
        self.lookup(&split_path(path))
    }

    /// Text of the scalar at `path`, if present.
    pub fn get_string(&self, path: &[&str]) -> Result<Option<&str>> {
        Ok(self.lookup(path)?.and_then(Node::as_str))
    }

    /// Set `value` at `path`, creating intermediate mappings as needed.
    /// Null intermediates are replaced by mappings. Sequence elements are
    /// only traversed, never created.
    pub fn set_field(&mut self, path: &[&str], value: Node) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            *self = value;
            return Ok(());
        };
        let mut cur = self;
        for (depth, raw) in parents.iter().enumerate() {
            cur = descend_or_create(cur, path, depth, raw)?;
        }
        let target = cur.untagged_mut();
        if target.is_null() {
            *target = Node::Mapping(Mapping::new());
        }
        match target {
            Node::Mapping(m) => {
                m.insert(*last, value);
                Ok(())
            }
            Node::Sequence(seq) => match select(seq, &Segment::parse(last)) {
                Some(i) => {
                    seq[i] = value;
                    Ok(())
                }
                None => Err(Error::Type { path: path.join("."), found: "missing sequence element" }),
            },
            n => Err(type_error(path, parents.len(), n)),
        }
    }

    /// Set a string at `path`. The value is always written quoted so it
    /// reads back as a string.
    pub fn set_string(&mut self, path: &[&str], value: &str) -> Result<()> {
        self.set_field(path, Node::quoted(value))
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_string(&["metadata", "annotations", key], value)
    }

    pub fn set_label(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_string(&["metadata", "labels", key], value)
    }

    /// Remove the field at `path`, returning it. Absent paths are a no-op.
    pub fn clear_field(&mut self, path: &[&str]) -> Result<Option<Node>> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(None);
        };
        match self.lookup_mut(parents)? {
            Some(parent) => match parent.untagged_mut() {
                Node::Mapping(m) => Ok(m.remove(last)),
                Node::Sequence(seq) => Ok(select(seq, &Segment::parse(last)).map(|i| seq.remove(i))),
                n if n.is_null() => Ok(None),
                n => Err(type_error(path, parents.len(), n)),
            },
            None => Ok(None),
        }
    }
}

fn descend_or_create<'n>(cur: &'n mut Node, path: &[&str], depth: usize, raw: &str) -> Result<&'n mut Node> {
    let node = cur.untagged_mut();
    if node.is_null() {
        *node = Node::Mapping(Mapping::new());
    }
    match node {
        Node::Mapping(m) => Ok(m.get_or_insert_with(raw, || Node::Mapping(Mapping::new()))),
        Node::Sequence(seq) => match select(seq, &Segment::parse(raw)) {
            Some(i) => Ok(&mut seq[i]),
            None => Err(Error::Type { path: path[..=depth].join("."), found: "missing sequence element" }),
        },
        n => Err(type_error(path, depth, n)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment() -> Node {
        Node::parse(
            "apiVersion: apps/v1\nkind: Deployment\nmetadata:\n  name: foo\nspec:\n  replicas: 2\n  template:\n    spec:\n      containers:\n      - name: web\n        image: nginx\n      - name: sidecar\n        image: envoy\n",
        )
        .unwrap()
    }

    #[test]
    fn lookup_finds_nested_scalar() {
        let d = deployment();
        let r = d.lookup(&["spec", "replicas"]).unwrap().unwrap();
        assert_eq!(r, &Node::int(2));
    }

    #[test]
    fn lookup_absent_is_none() {
        let d = deployment();
        assert!(d.lookup(&["spec", "paused"]).unwrap().is_none());
        assert!(d.lookup(&["status", "conditions", "ready"]).unwrap().is_none());
    }

    #[test]
    fn lookup_through_scalar_is_type_error() {
        let d = deployment();
        let err = d.lookup(&["spec", "replicas", "x"]).unwrap_err();
        match err {
            Error::Type { path, found } => {
                assert_eq!(path, "spec.replicas");
                assert_eq!(found, "scalar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn lookup_into_sequences() {
        let d = deployment();
        let by_index = d.lookup_path("spec.template.spec.containers.[1].image").unwrap().unwrap();
        assert_eq!(by_index.as_str(), Some("envoy"));
        let by_num = d.lookup_path("spec.template.spec.containers.0.image").unwrap().unwrap();
        assert_eq!(by_num.as_str(), Some("nginx"));
        let by_match = d.lookup(&["spec", "template", "spec", "containers", "[name=sidecar]", "image"]).unwrap();
        assert_eq!(by_match.and_then(Node::as_str), Some("envoy"));
        assert!(d.lookup_path("spec.template.spec.containers.[name=nope]").unwrap().is_none());
    }

    #[test]
    fn null_intermediate_is_absent() {
        let n = Node::parse("metadata:\n").unwrap();
        assert!(n.lookup(&["metadata", "annotations", "a"]).unwrap().is_none());
    }

    #[test]
    fn set_annotation_creates_containers() {
        let mut n = Node::parse("apiVersion: v1\nkind: Service\nmetadata:\n  name: foo\n").unwrap();
        n.set_annotation("value", "baz").unwrap();
        assert_eq!(
            n.to_yaml_string(),
            "apiVersion: v1\nkind: Service\nmetadata:\n  name: foo\n  annotations:\n    value: 'baz'\n"
        );
    }

    #[test]
    fn set_annotation_is_idempotent() {
        let mut once = Node::parse("kind: Service\nmetadata:\n  name: foo\n").unwrap();
        once.set_annotation("a", "b").unwrap();
        let mut twice = once.clone();
        twice.set_annotation("a", "b").unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.to_yaml_string(), twice.to_yaml_string());
    }

    #[test]
    fn set_replaces_null_metadata() {
        let mut n = Node::parse("kind: Service\nmetadata:\n").unwrap();
        n.set_label("app", "web").unwrap();
        assert_eq!(n.get_string(&["metadata", "labels", "app"]).unwrap(), Some("web"));
    }

    #[test]
    fn set_through_scalar_fails() {
        let mut n = Node::parse("metadata: oops\n").unwrap();
        let err = n.set_annotation("a", "b").unwrap_err();
        assert!(matches!(err, Error::Type { .. }), "{err}");
    }

    #[test]
    fn set_keeps_sibling_order() {
        let mut n = Node::parse("spec:\n  b: 1\n  a: 2\n").unwrap();
        n.set_field(&["spec", "b"], Node::int(5)).unwrap();
        n.set_field(&["spec", "c"], Node::int(6)).unwrap();
        assert_eq!(n.to_yaml_string(), "spec:\n  b: 5\n  a: 2\n  c: 6\n");
    }

    #[test]
    fn set_into_sequence_element() {
        let mut d = deployment();
        d.set_string(&["spec", "template", "spec", "containers", "[name=web]", "image"], "nginx:2").unwrap();
        assert_eq!(
            d.get_string(&["spec", "template", "spec", "containers", "0", "image"]).unwrap(),
            Some("nginx:2")
        );
    }

    #[test]
    fn clear_field_removes() {
        let mut d = deployment();
        let removed = d.clear_field(&["spec", "replicas"]).unwrap();
        assert_eq!(removed, Some(Node::int(2)));
        assert!(d.lookup(&["spec", "replicas"]).unwrap().is_none());
        assert!(d.clear_field(&["spec", "missing", "x"]).unwrap().is_none());
    }

    #[test]
    fn segments_parse() {
        assert_eq!(Segment::parse("name"), Segment::Key("name"));
        assert_eq!(Segment::parse("[3]"), Segment::Index(3));
        assert_eq!(Segment::parse("[a=b]"), Segment::Match { key: "a", value: "b" });
        assert_eq!(split_path(".spec.replicas").as_slice(), &["spec", "replicas"]);
    }
}
