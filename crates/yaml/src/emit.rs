//! Document emitter.
//!
//! Scalars are written with the spelling and quoting they were read with
//! whenever that still reads back as the same value; flow collections stay
//! inline. New content uses two-space indentation, sequences flush with
//! their parent key, and the plainest unambiguous scalar form.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::parse::resolve;
use crate::{Mapping, Node, Scalar, ScalarKind, Sequence, Style};

// Plain text that a YAML 1.1 or 1.2 reader would resolve to something other than a string.
static NON_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?:",
        r"~|null|Null|NULL",
        r"|y|Y|yes|Yes|YES|n|N|no|No|NO|true|True|TRUE|false|False|FALSE|on|On|ON|off|Off|OFF",
        r"|[-+]?[0-9][0-9_]*",
        r"|0x[0-9a-fA-F_]+|0o[0-7_]+|0b[01_]+",
        r"|[-+]?(?:[0-9][0-9_]*)?\.[0-9_]*(?:[eE][-+]?[0-9]+)?",
        r"|[-+]?[0-9][0-9_]*(?:\.[0-9_]*)?[eE][-+]?[0-9]+",
        r"|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN)",
        r"|[0-9]+(?::[0-5]?[0-9])+(?:\.[0-9_]*)?",
        r")$"
    ))
    .expect("static regex")
});

pub(crate) fn to_string(node: &Node) -> String {
    let mut e = Emitter { out: String::new() };
    e.document(node);
    e.out
}

enum Shape<'a> {
    Inline(String),
    /// Null written as an omitted value.
    Empty,
    Map(&'a Mapping),
    Seq(&'a Sequence),
    Block { text: &'a str, folded: bool },
}

struct Emitter {
    out: String,
}

impl Emitter {
    fn document(&mut self, node: &Node) {
        let (tag, shape) = shape(node);
        if let Some(tag) = tag {
            self.out.push_str(tag);
            match &shape {
                Shape::Inline(_) | Shape::Block { .. } => self.out.push(' '),
                _ => self.out.push('\n'),
            }
        }
        match shape {
            Shape::Inline(s) => {
                self.out.push_str(&s);
                self.out.push('\n');
            }
            Shape::Empty if tag.is_none() => self.out.push_str("null\n"),
            Shape::Empty => {}
            Shape::Map(m) => self.mapping(m, 0, false),
            Shape::Seq(s) => self.sequence(s, 0, false),
            Shape::Block { text, folded } => self.block(text, folded, 0),
        }
    }

    fn pad(&mut self, indent: usize) {
        for _ in 0..indent {
            self.out.push(' ');
        }
    }

    fn mapping(&mut self, map: &Mapping, indent: usize, mut inline_first: bool) {
        for (key, key_style, value) in map.styled_iter() {
            if !inline_first {
                self.pad(indent);
            }
            inline_first = false;
            self.out.push_str(&key_text(key, key_style, false));
            self.out.push(':');
            let (tag, shape) = shape(value);
            if let Some(tag) = tag {
                self.out.push(' ');
                self.out.push_str(tag);
            }
            match shape {
                Shape::Inline(s) => {
                    self.out.push(' ');
                    self.out.push_str(&s);
                    self.out.push('\n');
                }
                Shape::Empty => self.out.push('\n'),
                Shape::Map(m) => {
                    self.out.push('\n');
                    self.mapping(m, indent + 2, false);
                }
                Shape::Seq(s) => {
                    self.out.push('\n');
                    let at = if s.is_indented() { indent + 2 } else { indent };
                    self.sequence(s, at, false);
                }
                Shape::Block { text, folded } => {
                    self.out.push(' ');
                    self.block(text, folded, indent + 2);
                }
            }
        }
    }

    fn sequence(&mut self, seq: &Sequence, indent: usize, mut inline_first: bool) {
        for item in seq.iter() {
            if !inline_first {
                self.pad(indent);
            }
            inline_first = false;
            self.out.push('-');
            let (tag, shape) = shape(item);
            // a tag pushes containers onto the following line
            let nested_inline = tag.is_none();
            if let Some(tag) = tag {
                self.out.push(' ');
                self.out.push_str(tag);
            }
            match shape {
                Shape::Inline(s) => {
                    self.out.push(' ');
                    self.out.push_str(&s);
                    self.out.push('\n');
                }
                Shape::Empty => self.out.push('\n'),
                Shape::Map(m) => {
                    self.out.push(if nested_inline { ' ' } else { '\n' });
                    self.mapping(m, indent + 2, nested_inline);
                }
                Shape::Seq(s) => {
                    self.out.push(if nested_inline { ' ' } else { '\n' });
                    self.sequence(s, indent + 2, nested_inline);
                }
                Shape::Block { text, folded } => {
                    self.out.push(' ');
                    self.block(text, folded, indent + 2);
                }
            }
        }
    }

    fn block(&mut self, text: &str, folded: bool, indent: usize) {
        let body = text.trim_end_matches('\n');
        let trailing = text.len() - body.len();
        self.out.push(if folded { '>' } else { '|' });
        match trailing {
            0 => self.out.push('-'),
            1 => {}
            _ => self.out.push('+'),
        }
        self.out.push('\n');
        if folded {
            // each kept line break reads back from one empty line
            let mut pending = 0;
            for (i, line) in body.split('\n').enumerate() {
                if line.is_empty() {
                    pending += 1;
                    continue;
                }
                if i > 0 {
                    for _ in 0..pending + 2 {
                        self.out.push('\n');
                    }
                }
                pending = 0;
                self.pad(indent);
                self.out.push_str(line);
            }
            self.out.push('\n');
        } else {
            for line in body.split('\n') {
                if !line.is_empty() {
                    self.pad(indent);
                    self.out.push_str(line);
                }
                self.out.push('\n');
            }
        }
        for _ in 1..trailing {
            self.out.push('\n');
        }
    }
}

fn shape(node: &Node) -> (Option<&str>, Shape<'_>) {
    match node {
        Node::Tagged(t) => {
            let inner = match &t.node {
                Node::Scalar(s) => scalar_shape(s, true, false),
                other => shape(other).1,
            };
            (Some(t.tag.as_str()), inner)
        }
        Node::Mapping(m) if m.is_empty() => (None, Shape::Inline("{}".to_string())),
        Node::Mapping(m) if m.is_flow() => (None, Shape::Inline(flow(node, false))),
        Node::Mapping(m) => (None, Shape::Map(m)),
        Node::Sequence(s) if s.is_empty() => (None, Shape::Inline("[]".to_string())),
        Node::Sequence(s) if s.is_flow() => (None, Shape::Inline(flow(node, false))),
        Node::Sequence(s) => (None, Shape::Seq(s)),
        Node::Scalar(s) => (None, scalar_shape(s, false, false)),
    }
}

/// Inline rendering used inside `[...]` and `{...}`.
fn flow(node: &Node, tagged: bool) -> String {
    match node {
        Node::Tagged(t) => format!("{} {}", t.tag, flow(&t.node, true)),
        Node::Mapping(m) => {
            let entries: Vec<String> = m
                .styled_iter()
                .map(|(k, style, v)| format!("{}: {}", key_text(k, style, true), flow(v, false)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
        Node::Sequence(s) => {
            let items: Vec<String> = s.iter().map(|n| flow(n, false)).collect();
            format!("[{}]", items.join(", "))
        }
        Node::Scalar(s) => match scalar_shape(s, tagged, true) {
            Shape::Inline(text) => text,
            _ => "null".to_string(),
        },
    }
}

fn scalar_shape(s: &Scalar, tagged: bool, in_flow: bool) -> Shape<'_> {
    let v = s.value.as_str();
    let text = match (s.kind, s.style) {
        (ScalarKind::Null, _) if v.is_empty() => {
            return if in_flow { Shape::Inline("null".to_string()) } else { Shape::Empty };
        }
        (ScalarKind::Null, Style::Plain) => v.to_string(),
        (ScalarKind::Null, _) => "null".to_string(),
        (_, Style::SingleQuoted) if s.kind != ScalarKind::Str && single_allowed(v) => single_quoted(v),
        (_, Style::DoubleQuoted) if s.kind != ScalarKind::Str => double_quoted(v),
        (ScalarKind::Bool | ScalarKind::Int | ScalarKind::Float, _) => v.to_string(),
        (ScalarKind::Str, style) => {
            let block = match style {
                Style::Literal | Style::Folded => !v.is_empty(),
                Style::Any | Style::Plain => v.contains('\n'),
                _ => false,
            };
            if block && !in_flow {
                if style == Style::Folded && folded_allowed(v) {
                    return Shape::Block { text: v, folded: true };
                }
                if literal_allowed(v) {
                    return Shape::Block { text: v, folded: false };
                }
            }
            match style {
                Style::Plain if plain_syntax_ok(v, in_flow) && (tagged || resolve(v) == ScalarKind::Str) => {
                    v.to_string()
                }
                Style::SingleQuoted if single_allowed(v) => single_quoted(v),
                Style::DoubleQuoted => double_quoted(v),
                _ if plain_syntax_ok(v, in_flow) && !NON_STRING.is_match(v) => v.to_string(),
                _ if NON_STRING.is_match(v) => double_quoted(v),
                _ if single_allowed(v) => single_quoted(v),
                _ => double_quoted(v),
            }
        }
    };
    Shape::Inline(text)
}

fn key_text(key: &str, style: Style, in_flow: bool) -> String {
    match style {
        Style::Plain if plain_syntax_ok(key, in_flow) => key.to_string(),
        Style::SingleQuoted if single_allowed(key) => single_quoted(key),
        Style::DoubleQuoted => double_quoted(key),
        _ if plain_syntax_ok(key, in_flow) && !NON_STRING.is_match(key) => key.to_string(),
        _ if single_allowed(key) && !NON_STRING.is_match(key) => single_quoted(key),
        _ => double_quoted(key),
    }
}

fn printable(c: char) -> bool {
    !c.is_control() && c != '\u{feff}'
}

/// Whether `s` can be written bare and read back as the same string.
pub(crate) fn plain_allowed(s: &str) -> bool {
    plain_syntax_ok(s, false) && !NON_STRING.is_match(s)
}

/// Whether `s` can be written bare at all, whatever it resolves to.
fn plain_syntax_ok(s: &str, in_flow: bool) -> bool {
    let Some(first) = s.chars().next() else { return false };
    if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
        return false;
    }
    if s == "---" || s == "..." {
        return false;
    }
    if matches!(first, '[' | ']' | '{' | '}' | ',' | '#' | '&' | '*' | '!' | '|' | '>' | '\'' | '"' | '%' | '@' | '`') {
        return false;
    }
    if matches!(first, '-' | '?' | ':') {
        let second = s[1..].chars().next();
        if second.map_or(true, |c| c == ' ') {
            return false;
        }
    }
    if s.contains(": ") || s.contains(" #") || s.ends_with(':') {
        return false;
    }
    if in_flow && s.contains(|c| matches!(c, ',' | '[' | ']' | '{' | '}')) {
        return false;
    }
    s.chars().all(|c| printable(c) && c != '\t')
}

fn single_allowed(s: &str) -> bool {
    !s.contains('\n') && s.chars().all(printable)
}

fn literal_allowed(s: &str) -> bool {
    !s.starts_with(' ')
        && !s.starts_with('\n')
        && s.lines().all(|l| !l.ends_with(' '))
        && s.chars().all(|c| c == '\n' || c == '\t' || printable(c))
}

fn folded_allowed(s: &str) -> bool {
    literal_allowed(s) && s.lines().all(|l| !l.starts_with(' ') && !l.starts_with('\t'))
}

fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if !printable(c) => {
                let n = c as u32;
                if n <= 0xff {
                    out.push_str(&format!("\\x{n:02x}"));
                } else {
                    out.push_str(&format!("\\u{n:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
