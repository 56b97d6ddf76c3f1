//! SP-002: The generic value tree shared by the decoder, resolver, and binder.
//!
//! A closed sum type: every consumer matches exhaustively over its variants.
//! Mappings preserve insertion order for stable output, but equality ignores it.

use super::intrinsics::Intrinsic;
use indexmap::IndexMap;
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// String-keyed mapping; later inserts overwrite earlier ones.
pub type Mapping = IndexMap<String, Value>;

/// A node in a decoded template tree.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Mapping(Mapping),
}

impl Value {
    /// Build the canonical single-key form `{key: argument}` for an intrinsic.
    pub fn intrinsic(intrinsic: Intrinsic, argument: Value) -> Value {
        let mut map = Mapping::with_capacity(1);
        map.insert(intrinsic.key().to_string(), argument);
        Value::Mapping(map)
    }

    /// Recognize the canonical intrinsic form: a mapping with exactly one
    /// entry whose key is a reserved canonical name.
    pub fn as_intrinsic(&self) -> Option<(Intrinsic, &Value)> {
        let map = self.as_mapping()?;
        if map.len() != 1 {
            return None;
        }
        let (key, argument) = map.iter().next()?;
        Intrinsic::from_key(key).map(|i| (i, argument))
    }

    /// Short variant name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Mapping(_) => "mapping",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Look up a key when this value is a mapping.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_mapping().and_then(|m| m.get(key))
    }

    /// Render this value as a mapping key. Scalars render to their text,
    /// null renders empty, composites render in flow form.
    pub fn render_key(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Emit the tree as YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml_ng::Error> {
        serde_yaml_ng::to_string(self)
    }

    /// Emit the tree as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write_float(f, *x),
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Mapping(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Shortest round-trip float text; exponent form outside `1e-4 <= |x| < 1e21`
/// (`1e+21`, `1.5e-07`), `+Inf`/`-Inf`/`NaN` for non-finite values.
fn write_float(f: &mut fmt::Formatter<'_>, x: f64) -> fmt::Result {
    if x.is_nan() {
        return f.write_str("NaN");
    }
    if x.is_infinite() {
        return f.write_str(if x > 0.0 { "+Inf" } else { "-Inf" });
    }
    let sci = format!("{:e}", x);
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return write!(f, "{}", x);
    };
    match exp.parse::<i32>() {
        Ok(e) if x != 0.0 && !(-4..21).contains(&e) => {
            let sign = if e < 0 { '-' } else { '+' };
            write!(f, "{}e{}{:02}", mantissa, sign, e.unsigned_abs())
        }
        _ => write!(f, "{}", x),
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Mapping> for Value {
    fn from(map: Mapping) -> Self {
        Value::Mapping(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Mapping(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// ============================================================================
// Serde
// ============================================================================

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(x) => serializer.serialize_f64(*x),
            Value::String(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Mapping(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any template value")
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
        Ok(Value::Int(i))
    }

    fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
        Ok(i64::try_from(u).map_or(Value::Float(u as f64), Value::Int))
    }

    fn visit_f64<E: de::Error>(self, x: f64) -> Result<Value, E> {
        Ok(Value::Float(x))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::String(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::String(s))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::List(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut map = Mapping::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((k, v)) = access.next_entry::<String, Value>()? {
            map.insert(k, v);
        }
        Ok(Value::Mapping(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: Vec<(&str, Value)>) -> Value {
        entries.into_iter().collect()
    }

    #[test]
    fn test_sp002_as_intrinsic_single_reserved_key() {
        let v = Value::intrinsic(Intrinsic::GetAtt, "Res.Attr".into());
        let (i, arg) = v.as_intrinsic().unwrap();
        assert_eq!(i, Intrinsic::GetAtt);
        assert_eq!(arg, &Value::from("Res.Attr"));
    }

    #[test]
    fn test_sp002_as_intrinsic_rejects_ordinary_maps() {
        let two_keys = map(vec![("Ref", "A".into()), ("Other", "B".into())]);
        assert!(two_keys.as_intrinsic().is_none());
        let unknown = map(vec![("Fn::Base64", "x".into())]);
        assert!(unknown.as_intrinsic().is_none());
        assert!(Value::from("Ref").as_intrinsic().is_none());
    }

    #[test]
    fn test_sp002_mapping_equality_ignores_order() {
        let a = map(vec![("x", 1.into()), ("y", 2.into())]);
        let b = map(vec![("y", 2.into()), ("x", 1.into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sp002_render_key() {
        assert_eq!(Value::Null.render_key(), "");
        assert_eq!(Value::Int(123).render_key(), "123");
        assert_eq!(Value::Float(1.0).render_key(), "1");
        assert_eq!(Value::Float(1.5).render_key(), "1.5");
        assert_eq!(Value::Float(1e21).render_key(), "1e+21");
        assert_eq!(Value::Float(1e20).render_key(), "100000000000000000000");
        assert_eq!(Value::Float(-1.5e-7).render_key(), "-1.5e-07");
        assert_eq!(Value::Float(0.0001).render_key(), "0.0001");
        assert_eq!(Value::Float(0.0).render_key(), "0");
        assert_eq!(Value::Float(f64::INFINITY).render_key(), "+Inf");
        assert_eq!(Value::Bool(true).render_key(), "true");
        assert_eq!(Value::from("k").render_key(), "k");
        let composite = Value::List(vec!["a".into(), 1.into()]);
        assert_eq!(composite.render_key(), "[a, 1]");
    }

    #[test]
    fn test_sp002_display_flow_form() {
        let v = map(vec![("Ref", "Env".into())]);
        assert_eq!(v.to_string(), "{Ref: Env}");
    }

    #[test]
    fn test_sp002_json_roundtrip_preserves_order() {
        let v = map(vec![
            ("b", Value::List(vec![1.into(), 2.5.into(), Value::Null])),
            ("a", true.into()),
        ]);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"b":[1,2.5,null],"a":true}"#);
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn test_sp002_to_yaml() {
        let v = map(vec![("Name", "dev".into())]);
        assert_eq!(v.to_yaml().unwrap().trim(), "Name: dev");
    }

    #[test]
    fn test_sp002_large_unsigned_becomes_float() {
        let v: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert!(matches!(v, Value::Float(_)));
    }
}
