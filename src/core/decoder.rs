//! SP-004: Tag-normalizing decoder.
//!
//! Turns template markup into a canonical [`Value`] tree:
//! - shorthand tags (`!Ref`, `!Sub`, `!If`, ...) become single-key intrinsic mappings
//! - typed scalars that fail to parse keep their raw text
//! - unknown tags never error; tagged scalars fall back to plain strings
//! - the document root must be a mapping

use super::intrinsics::{lookup_tag, TagRule, SHORTHAND_TAGS};
use super::markup::{self, Node, NodeKind, NodeTag, ScalarStyle};
use super::value::{Mapping, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a template could not be decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("template is empty")]
    Empty,

    #[error("YAML parse error: {message}")]
    Syntax { message: String },

    #[error("template root must be a mapping, got {found}")]
    NonMappingRoot { found: &'static str },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Decoder bound to a shorthand tag table.
#[derive(Debug, Clone, Copy)]
pub struct Decoder<'a> {
    rules: &'a [TagRule],
}

impl Default for Decoder<'static> {
    fn default() -> Self {
        Self {
            rules: SHORTHAND_TAGS,
        }
    }
}

impl<'a> Decoder<'a> {
    /// Decoder using a caller-supplied tag table instead of [`SHORTHAND_TAGS`].
    pub fn with_rules(rules: &'a [TagRule]) -> Self {
        Self { rules }
    }

    /// Decode markup text into a mapping-rooted tree.
    pub fn decode(&self, markup: &str) -> Result<Value, ParseError> {
        if markup.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        let document = markup::load(markup)
            .map_err(|e| ParseError::Syntax {
                message: e.to_string(),
            })?
            .ok_or(ParseError::Empty)?;

        match self.decode_node(&document) {
            root @ Value::Mapping(_) => Ok(root),
            other => Err(ParseError::NonMappingRoot {
                found: other.type_name(),
            }),
        }
    }

    /// Decode a single markup node. Never fails.
    pub fn decode_node(&self, node: &Node) -> Value {
        if let Some(NodeTag::Local(tag)) = &node.tag {
            if let Some(intrinsic) = lookup_tag(self.rules, tag) {
                let argument = match &node.kind {
                    NodeKind::Scalar { text, .. } => Value::String(text.clone()),
                    _ => self.decode_structure(node),
                };
                tracing::debug!(tag = %tag, key = intrinsic.key(), "normalized shorthand tag");
                return Value::intrinsic(intrinsic, argument);
            }
        }
        self.decode_structure(node)
    }

    fn decode_structure(&self, node: &Node) -> Value {
        match &node.kind {
            NodeKind::Document(children) => children
                .first()
                .map_or(Value::Null, |root| self.decode_node(root)),
            NodeKind::Scalar { .. } => decode_scalar(node),
            NodeKind::Sequence(items) => {
                Value::List(items.iter().map(|item| self.decode_node(item)).collect())
            }
            NodeKind::Mapping(entries) => {
                let mut map = Mapping::with_capacity(entries.len());
                for (key, value) in entries {
                    // later duplicates overwrite earlier ones
                    map.insert(self.decode_node(key).render_key(), self.decode_node(value));
                }
                Value::Mapping(map)
            }
        }
    }
}

/// Decode template markup with the default shorthand table.
pub fn decode(markup: &str) -> Result<Value, ParseError> {
    Decoder::default().decode(markup)
}

/// Read and decode a template file from disk.
pub fn decode_file(path: &Path) -> Result<Value, ParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&content)
}

/// Decode a markup node with the default shorthand table.
pub fn decode_node(node: &Node) -> Value {
    Decoder::default().decode_node(node)
}

/// Decode a scalar node by its tag. Typed scalars that fail to parse, and
/// scalars with tags outside the core schema, keep their raw text.
/// Non-scalar nodes are decoded structurally.
pub fn decode_scalar(node: &Node) -> Value {
    let NodeKind::Scalar { text, style } = &node.kind else {
        return Decoder::default().decode_structure(node);
    };

    match &node.tag {
        Some(NodeTag::Core(tag)) => match tag.as_str() {
            "int" => parse_int(text).map_or_else(|| fallback(tag, text), Value::Int),
            "float" => parse_float(text).map_or_else(|| fallback(tag, text), Value::Float),
            "bool" => parse_bool_lenient(text).map_or_else(|| fallback(tag, text), Value::Bool),
            "null" => Value::Null,
            _ => Value::String(text.clone()),
        },
        Some(tag) => {
            tracing::trace!(?tag, "unrecognized tag; keeping scalar as text");
            Value::String(text.clone())
        }
        None if *style != ScalarStyle::Plain => Value::String(text.clone()),
        None => resolve_plain(text),
    }
}

fn fallback(tag: &str, text: &str) -> Value {
    tracing::debug!(tag, text, "typed scalar did not parse; keeping raw text");
    Value::String(text.to_string())
}

/// Core-schema resolution of an untagged, unquoted scalar.
fn resolve_plain(text: &str) -> Value {
    if matches!(text, "" | "~" | "null" | "Null" | "NULL") {
        return Value::Null;
    }
    if let Some(b) = parse_bool(text) {
        return Value::Bool(b);
    }
    if let Some(i) = parse_int(text) {
        return Value::Int(i);
    }
    if let Some(x) = parse_float(text) {
        return Value::Float(x);
    }
    Value::String(text.to_string())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

/// Explicit `!!bool` also accepts the YAML 1.1 literals.
fn parse_bool_lenient(text: &str) -> Option<bool> {
    parse_bool(text).or(match text {
        "yes" | "Yes" | "YES" | "on" | "On" | "ON" | "y" | "Y" => Some(true),
        "no" | "No" | "NO" | "off" | "Off" | "OFF" | "n" | "N" => Some(false),
        _ => None,
    })
}

/// Decimal, `0x`, `0o`, and `0b` integers with optional sign; underscores ignored.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let cleaned = text.replace('_', "");
    let (sign, unsigned) = match cleaned.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };
    let (radix, digits) = if let Some(hex) = unsigned.strip_prefix("0x") {
        (16, hex)
    } else if let Some(oct) = unsigned.strip_prefix("0o") {
        (8, oct)
    } else if let Some(bin) = unsigned.strip_prefix("0b") {
        (2, bin)
    } else {
        (10, unsigned)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    i64::from_str_radix(&format!("{}{}", sign, digits), radix).ok()
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => return Some(f64::INFINITY),
        "-.inf" | "-.Inf" | "-.INF" => return Some(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return Some(f64::NAN),
        _ => {}
    }
    if !is_decimal_float(text) {
        return None;
    }
    text.parse().ok()
}

/// `[-+]?(\.[0-9]+|[0-9]+(\.[0-9]*)?)([eE][-+]?[0-9]+)?`
fn is_decimal_float(text: &str) -> bool {
    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some((whole, frac)) => {
            all_digits(whole) && all_digits(frac) && !(whole.is_empty() && frac.is_empty())
        }
        None => !mantissa.is_empty() && all_digits(mantissa),
    };
    let exponent_ok = exponent.is_none_or(|e| {
        let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
        !digits.is_empty() && all_digits(digits)
    });
    mantissa_ok && exponent_ok
}
