//! Event-driven document builder. Records quoting, flow layout and the
//! spelling of plain scalars as they appear in the source.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::{Error, Mapping, Node, Result, Scalar, ScalarKind, Sequence, Style, Tagged};

static INT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-+]?[0-9]+|0o[0-7]+|0x[0-9a-fA-F]+)$").expect("static regex"));

static FLOAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[-+]?(?:\.[0-9]+|[0-9]+(?:\.[0-9]*)?)(?:[eE][-+]?[0-9]+)?|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$")
        .expect("static regex")
});

/// Kind of an untagged plain scalar under the YAML 1.2 core schema.
pub(crate) fn resolve(text: &str) -> ScalarKind {
    match text {
        "" | "~" | "null" | "Null" | "NULL" => ScalarKind::Null,
        "true" | "True" | "TRUE" | "false" | "False" | "FALSE" => ScalarKind::Bool,
        _ if INT.is_match(text) => ScalarKind::Int,
        _ if FLOAT.is_match(text) => ScalarKind::Float,
        _ => ScalarKind::Str,
    }
}

fn core_kind(tag: &str) -> Option<ScalarKind> {
    Some(match tag {
        "!!str" => ScalarKind::Str,
        "!!int" => ScalarKind::Int,
        "!!float" => ScalarKind::Float,
        "!!bool" => ScalarKind::Bool,
        "!!null" => ScalarKind::Null,
        _ => return None,
    })
}

fn tag_text(tag: &Tag) -> String {
    match tag.handle.as_str() {
        "!!" | "tag:yaml.org,2002:" => format!("!!{}", tag.suffix),
        _ => format!("{}{}", tag.handle, tag.suffix),
    }
}

fn style_of(style: TScalarStyle) -> Style {
    match style {
        TScalarStyle::Plain => Style::Plain,
        TScalarStyle::SingleQuoted => Style::SingleQuoted,
        TScalarStyle::DoubleQuoted => Style::DoubleQuoted,
        TScalarStyle::Literal => Style::Literal,
        _ => Style::Folded,
    }
}

enum Open {
    Seq(Sequence),
    Map(Mapping, Option<(String, Style)>),
}

struct Frame {
    open: Open,
    anchor: usize,
    tag: Option<String>,
    col: usize,
}

struct Builder<'a> {
    src: &'a [char],
    stack: Vec<Frame>,
    anchors: HashMap<usize, Node>,
    root: Option<Node>,
    error: Option<Error>,
}

impl Builder<'_> {
    fn at(&self, mark: &Marker) -> Option<char> {
        self.src.get(mark.index()).copied()
    }

    fn scalar(&self, text: String, style: TScalarStyle, tag: Option<&str>, mark: &Marker) -> Scalar {
        let style = style_of(style);
        let kind = match tag.and_then(core_kind) {
            Some(kind) => kind,
            None if style == Style::Plain => resolve(&text),
            None => ScalarKind::Str,
        };
        // an omitted value is reported as `~` positioned on the next token
        let value = if style == Style::Plain && text == "~" && self.at(mark) != Some('~') {
            String::new()
        } else {
            text
        };
        Scalar { kind, value, style }
    }

    fn finish(&mut self, node: Node, anchor: usize, tag: Option<String>) {
        let node = match tag {
            Some(tag) => Node::Tagged(Box::new(Tagged { tag, node })),
            None => node,
        };
        if anchor > 0 {
            self.anchors.insert(anchor, node.clone());
        }
        self.attach(node);
    }

    fn attach(&mut self, node: Node) {
        let Some(top) = self.stack.last_mut() else {
            if self.root.is_none() {
                self.root = Some(node);
            }
            return;
        };
        match &mut top.open {
            Open::Seq(seq) => seq.push(node),
            Open::Map(map, pending) => match pending.take() {
                Some((key, style)) => {
                    map.insert_styled(key, style, node);
                }
                None => match node.untagged() {
                    Node::Scalar(s) => {
                        let key = if s.is_null() && s.value.is_empty() { "null".to_string() } else { s.value.clone() };
                        *pending = Some((key, s.style));
                    }
                    Node::Sequence(_) => {
                        self.error.get_or_insert(Error::UnsupportedKey("sequence"));
                    }
                    _ => {
                        self.error.get_or_insert(Error::UnsupportedKey("mapping"));
                    }
                },
            },
        }
    }
}

impl MarkedEventReceiver for Builder<'_> {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        match ev {
            Event::Scalar(text, style, anchor, tag) => {
                let tag = tag.as_ref().map(tag_text);
                let scalar = self.scalar(text, style, tag.as_deref(), &mark);
                self.finish(Node::Scalar(scalar), anchor, tag);
            }
            Event::SequenceStart(anchor, tag) => {
                let mut seq = Sequence::new();
                seq.set_flow(self.at(&mark) == Some('['));
                if let Some(Frame { open: Open::Map(_, Some(_)), col, .. }) = self.stack.last() {
                    seq.set_indented(!seq.is_flow() && mark.col() > *col);
                }
                self.stack.push(Frame { open: Open::Seq(seq), anchor, tag: tag.as_ref().map(tag_text), col: mark.col() });
            }
            Event::MappingStart(anchor, tag) => {
                let mut map = Mapping::new();
                map.set_flow(self.at(&mark) == Some('{'));
                self.stack.push(Frame { open: Open::Map(map, None), anchor, tag: tag.as_ref().map(tag_text), col: mark.col() });
            }
            Event::SequenceEnd | Event::MappingEnd => {
                if let Some(frame) = self.stack.pop() {
                    let node = match frame.open {
                        Open::Seq(seq) => Node::Sequence(seq),
                        Open::Map(map, _) => Node::Mapping(map),
                    };
                    self.finish(node, frame.anchor, frame.tag);
                }
            }
            Event::Alias(id) => match self.anchors.get(&id).cloned() {
                Some(node) => self.attach(node),
                None => {
                    self.error.get_or_insert(Error::Alias);
                }
            },
            _ => {}
        }
    }
}

/// First document of `src`; an empty stream yields null.
pub(crate) fn document(src: &str) -> Result<Node> {
    let chars: Vec<char> = src.chars().collect();
    let mut builder =
        Builder { src: &chars, stack: Vec::new(), anchors: HashMap::new(), root: None, error: None };
    let mut parser = Parser::new(src.chars());
    parser.load(&mut builder, false)?;
    match builder.error {
        Some(err) => Err(err),
        None => Ok(builder.root.unwrap_or_default()),
    }
}
