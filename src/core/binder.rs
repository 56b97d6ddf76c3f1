//! SP-006: Binding resolved trees into typed models.
//!
//! A serde `Deserializer` over [`Value`]. Field matching is whatever the
//! target's `Deserialize` impl does; this module only decides which scalar
//! conversions are allowed:
//! - numeric to numeric is always allowed (float to integer truncates)
//! - null binds as the zero value of the target
//! - weak typing adds bool/number/string coercions, empty string as zero,
//!   and a single value where a list is expected
//! - anything else is a [`BindError`] naming the path of the offending node

use super::decoder::parse_int;
use super::value::{Mapping, Value};
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, EnumAccess, IntoDeserializer, MapAccess,
    SeqAccess, VariantAccess, Visitor,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Binding options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindOptions {
    /// Allow coercions between strings, booleans, and numbers.
    pub weakly_typed: bool,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self { weakly_typed: true }
    }
}

impl BindOptions {
    pub fn strict() -> Self {
        Self {
            weakly_typed: false,
        }
    }
}

/// A value could not be bound to its target type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe(.path, .message))]
pub struct BindError {
    /// Location in the tree, e.g. `Resources.Hello.Properties.Timeout` or `Items[2]`.
    pub path: String,
    pub message: String,
}

fn describe(path: &str, message: &str) -> String {
    if path.is_empty() {
        message.to_string()
    } else {
        format!("{}: {}", path, message)
    }
}

impl BindError {
    /// Attach a location unless a deeper one is already recorded.
    fn at(mut self, path: &str) -> Self {
        if self.path.is_empty() {
            self.path = path.to_string();
        }
        self
    }
}

impl de::Error for BindError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BindError {
            path: String::new(),
            message: msg.to_string(),
        }
    }
}

/// Bind a resolved tree to `T`.
pub fn bind<T: DeserializeOwned>(value: Value, options: &BindOptions) -> Result<T, BindError> {
    T::deserialize(Binder::new(value, options.weakly_typed, String::new()))
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Deserializer over one owned node.
struct Binder {
    value: Value,
    weak: bool,
    path: String,
}

impl Binder {
    fn new(value: Value, weak: bool, path: String) -> Self {
        Self { value, weak, path }
    }

    fn mismatch(&self, expected: &str) -> BindError {
        BindError {
            path: self.path.clone(),
            message: format!(
                "expected {}, found {} `{}`",
                expected,
                self.value.type_name(),
                self.value
            ),
        }
    }

    fn integer(&self) -> Result<i64, BindError> {
        match &self.value {
            Value::Int(i) => Ok(*i),
            Value::Float(x) => Ok(*x as i64),
            Value::Bool(b) if self.weak => Ok(i64::from(*b)),
            Value::Null => Ok(0),
            Value::String(s) if self.weak && s.trim().is_empty() => Ok(0),
            Value::String(s) if self.weak => {
                parse_int(s.trim()).ok_or_else(|| self.mismatch("an integer"))
            }
            _ => Err(self.mismatch("an integer")),
        }
    }

    fn float(&self) -> Result<f64, BindError> {
        match &self.value {
            Value::Float(x) => Ok(*x),
            Value::Int(i) => Ok(*i as f64),
            Value::Bool(b) if self.weak => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Null => Ok(0.0),
            Value::String(s) if self.weak && s.trim().is_empty() => Ok(0.0),
            Value::String(s) if self.weak => {
                s.trim().parse().map_err(|_| self.mismatch("a float"))
            }
            _ => Err(self.mismatch("a float")),
        }
    }

    fn boolean(&self) -> Result<bool, BindError> {
        match &self.value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) if self.weak => Ok(*i != 0),
            Value::Float(x) if self.weak => Ok(*x != 0.0),
            Value::Null => Ok(false),
            Value::String(s) if self.weak => match s.trim() {
                "" | "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
                "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
                _ => Err(self.mismatch("a boolean")),
            },
            _ => Err(self.mismatch("a boolean")),
        }
    }

    fn string(self) -> Result<String, BindError> {
        match self.value {
            Value::String(s) => Ok(s),
            Value::Bool(b) if self.weak => Ok(if b { "1" } else { "0" }.to_string()),
            Value::Int(i) if self.weak => Ok(i.to_string()),
            Value::Float(x) if self.weak => Ok(x.to_string()),
            Value::Null => Ok(String::new()),
            _ => Err(self.mismatch("a string")),
        }
    }
}

impl<'de> Deserializer<'de> for Binder {
    type Error = BindError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let Binder { value, weak, path } = self;
        match value {
            Value::Null => visitor.visit_unit(),
            Value::Bool(b) => visitor.visit_bool(b),
            Value::Int(i) => visitor.visit_i64(i),
            Value::Float(x) => visitor.visit_f64(x),
            Value::String(s) => visitor.visit_string(s),
            Value::List(items) => visitor.visit_seq(SeqBinder::new(items, weak, path)),
            Value::Mapping(map) => visitor.visit_map(MapBinder::new(map, weak, path)),
        }
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_bool(self.boolean()?)
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_i64(self.integer()?)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_f64(self.float()?)
    }

    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.string()?)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.string()?)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_string(self.string()?)
    }

    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::String(s) => visitor.visit_byte_buf(s.into_bytes()),
            Value::List(_) => self.deserialize_any(visitor),
            _ => Err(self.mismatch("bytes")),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        match self.value {
            Value::Null => visitor.visit_unit(),
            _ if self.weak => visitor.visit_unit(),
            _ => Err(self.mismatch("null")),
        }
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let Binder { value, weak, path } = self;
        let items = match value {
            Value::List(items) => items,
            Value::Null => Vec::new(),
            Value::Mapping(map) if weak && map.is_empty() => Vec::new(),
            other if weak => vec![other],
            other => {
                return Err(Binder::new(other, weak, path).mismatch("a list"));
            }
        };
        visitor.visit_seq(SeqBinder::new(items, weak, path))
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        let Binder { value, weak, path } = self;
        let map = match value {
            Value::Mapping(map) => map,
            Value::Null => Mapping::new(),
            Value::List(items) if weak && items.is_empty() => Mapping::new(),
            other => {
                return Err(Binder::new(other, weak, path).mismatch("a mapping"));
            }
        };
        visitor.visit_map(MapBinder::new(map, weak, path))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        let Binder { value, weak, path } = self;
        match value {
            Value::String(s) => {
                let unit: de::value::StringDeserializer<BindError> = s.into_deserializer();
                visitor.visit_enum(unit)
            }
            Value::Mapping(map) if map.len() == 1 => {
                let Some((variant, value)) = map.into_iter().next() else {
                    return Err(de::Error::custom("empty enum mapping"));
                };
                visitor.visit_enum(EnumBinder {
                    variant,
                    value,
                    weak,
                    path,
                })
            }
            other => Err(Binder::new(other, weak, path).mismatch("a string or single-key mapping")),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_string(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BindError> {
        visitor.visit_unit()
    }
}

struct SeqBinder {
    items: std::vec::IntoIter<Value>,
    index: usize,
    weak: bool,
    path: String,
}

impl SeqBinder {
    fn new(items: Vec<Value>, weak: bool, path: String) -> Self {
        Self {
            items: items.into_iter(),
            index: 0,
            weak,
            path,
        }
    }
}

impl<'de> SeqAccess<'de> for SeqBinder {
    type Error = BindError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, BindError> {
        let Some(value) = self.items.next() else {
            return Ok(None);
        };
        let path = format!("{}[{}]", self.path, self.index);
        self.index += 1;
        seed.deserialize(Binder::new(value, self.weak, path.clone()))
            .map(Some)
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct MapBinder {
    entries: indexmap::map::IntoIter<String, Value>,
    pending: Option<(String, Value)>,
    weak: bool,
    path: String,
}

impl MapBinder {
    fn new(map: Mapping, weak: bool, path: String) -> Self {
        Self {
            entries: map.into_iter(),
            pending: None,
            weak,
            path,
        }
    }
}

impl<'de> MapAccess<'de> for MapBinder {
    type Error = BindError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, BindError> {
        let Some((key, value)) = self.entries.next() else {
            return Ok(None);
        };
        let path = child_path(&self.path, &key);
        // keys are always strings after decoding, so they bind weakly
        let bound = seed
            .deserialize(Binder::new(Value::String(key), true, path.clone()))
            .map_err(|e| e.at(&path))?;
        self.pending = Some((path, value));
        Ok(Some(bound))
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value, BindError> {
        let (path, value) = self
            .pending
            .take()
            .ok_or_else(|| <BindError as de::Error>::custom("value requested before key"))?;
        seed.deserialize(Binder::new(value, self.weak, path.clone()))
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

struct EnumBinder {
    variant: String,
    value: Value,
    weak: bool,
    path: String,
}

impl<'de> EnumAccess<'de> for EnumBinder {
    type Error = BindError;
    type Variant = Binder;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Binder), BindError> {
        let path = child_path(&self.path, &self.variant);
        let name: de::value::StringDeserializer<BindError> = self.variant.into_deserializer();
        let variant = seed.deserialize(name).map_err(|e| e.at(&path))?;
        Ok((variant, Binder::new(self.value, self.weak, path)))
    }
}

impl<'de> VariantAccess<'de> for Binder {
    type Error = BindError;

    fn unit_variant(self) -> Result<(), BindError> {
        match self.value {
            Value::Null => Ok(()),
            _ => Err(self.mismatch("a unit variant")),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value, BindError> {
        let path = self.path.clone();
        seed.deserialize(self).map_err(|e| e.at(&path))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value, BindError> {
        self.deserialize_seq(visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BindError> {
        self.deserialize_map(visitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use serde_json::json;
    use std::collections::HashMap;

    fn tree(json: serde_json::Value) -> Value {
        serde_json::from_value(json).unwrap()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Named {
        #[serde(rename = "Name")]
        name: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Counted {
        #[serde(rename = "Count")]
        count: i64,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "PascalCase")]
    struct Function {
        handler: String,
        timeout: Option<u32>,
        memory_size: Option<f64>,
        #[serde(default)]
        layers: Vec<String>,
        #[serde(default)]
        environment: HashMap<String, String>,
        tracing: Option<bool>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Runtime {
        Python,
        Node { version: u32 },
        Custom(String),
    }

    #[test]
    fn test_sp006_bind_plain_struct() {
        let got: Named = bind(tree(json!({"Name": "dev"})), &BindOptions::default()).unwrap();
        assert_eq!(got, Named { name: "dev".into() });
    }

    #[test]
    fn test_sp006_weak_string_to_int() {
        let got: Counted = bind(tree(json!({"Count": "123"})), &BindOptions::default()).unwrap();
        assert_eq!(got.count, 123);
    }

    #[test]
    fn test_sp006_strict_rejects_string_to_int() {
        let err = bind::<Counted>(tree(json!({"Count": "123"})), &BindOptions::strict()).unwrap_err();
        assert_eq!(err.path, "Count");
        assert!(err.message.contains("expected an integer"), "{}", err);
        assert!(err.to_string().starts_with("Count: "));
    }

    #[test]
    fn test_sp006_missing_required_field() {
        let err = bind::<Named>(tree(json!({"Other": 1})), &BindOptions::default()).unwrap_err();
        assert!(err.message.contains("missing field `Name`"), "{}", err);
    }

    #[test]
    fn test_sp006_numeric_conversion_always_allowed() {
        let got: Counted = bind(tree(json!({"Count": 7.9})), &BindOptions::strict()).unwrap();
        assert_eq!(got.count, 7);
        let got: f64 = bind(Value::Int(3), &BindOptions::strict()).unwrap();
        assert_eq!(got, 3.0);
    }

    #[test]
    fn test_sp006_weak_coercions() {
        let opts = BindOptions::default();
        let f: Function = bind(
            tree(json!({
                "Handler": 42,
                "Timeout": "30",
                "MemorySize": "",
                "Layers": "arn:layer:1",
                "Environment": {"DEBUG": true, "LEVEL": 3},
                "Tracing": "1",
            })),
            &opts,
        )
        .unwrap();
        assert_eq!(
            f,
            Function {
                handler: "42".into(),
                timeout: Some(30),
                memory_size: Some(0.0),
                layers: vec!["arn:layer:1".into()],
                environment: HashMap::from([
                    ("DEBUG".to_string(), "1".to_string()),
                    ("LEVEL".to_string(), "3".to_string()),
                ]),
                tracing: Some(true),
            }
        );
    }

    #[test]
    fn test_sp006_strict_list_mismatch_path() {
        let err = bind::<Function>(
            tree(json!({"Handler": "app.handler", "Layers": ["a", 5]})),
            &BindOptions::strict(),
        )
        .unwrap_err();
        assert_eq!(err.path, "Layers[1]");
    }

    #[test]
    fn test_sp006_nested_path_reported() {
        #[derive(Debug, Deserialize)]
        struct Outer {
            #[serde(rename = "Functions")]
            _functions: IndexMap<String, Function>,
        }
        let err = bind::<Outer>(
            tree(json!({"Functions": {"Hello": {"Handler": "h", "Timeout": "soon"}}})),
            &BindOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.path, "Functions.Hello.Timeout");
    }

    #[test]
    fn test_sp006_negative_into_unsigned_fails() {
        let err = bind::<u32>(Value::Int(-1), &BindOptions::default()).unwrap_err();
        assert!(err.message.contains("-1"), "{}", err);
    }

    #[test]
    fn test_sp006_options_and_null() {
        let got: Option<String> = bind(Value::Null, &BindOptions::strict()).unwrap();
        assert_eq!(got, None);
        let got: String = bind(Value::Null, &BindOptions::default()).unwrap();
        assert_eq!(got, "");
    }

    #[test]
    fn test_sp006_null_binds_zero_value_in_strict_mode() {
        let strict = BindOptions::strict();
        assert_eq!(bind::<String>(Value::Null, &strict).unwrap(), "");
        assert_eq!(bind::<i64>(Value::Null, &strict).unwrap(), 0);
        assert_eq!(bind::<f64>(Value::Null, &strict).unwrap(), 0.0);
        assert!(!bind::<bool>(Value::Null, &strict).unwrap());
        assert!(bind::<Vec<String>>(Value::Null, &strict).unwrap().is_empty());
        let got: IndexMap<String, i64> = bind(Value::Null, &strict).unwrap();
        assert!(got.is_empty());
        // other mismatches still fail
        assert!(bind::<String>(Value::Int(1), &strict).is_err());
    }

    #[test]
    fn test_sp006_weak_integer_rejects_fractional_text() {
        let weak = BindOptions::default();
        assert!(bind::<i64>(Value::from("1.5"), &weak).is_err());
        assert_eq!(bind::<i64>(Value::from(" 0x10 "), &weak).unwrap(), 16);
        assert_eq!(bind::<f64>(Value::from("1.5"), &weak).unwrap(), 1.5);
    }

    #[test]
    fn test_sp006_bool_parsing() {
        let weak = BindOptions::default();
        assert!(bind::<bool>(Value::from("t"), &weak).unwrap());
        assert!(!bind::<bool>(Value::from("0"), &weak).unwrap());
        assert!(bind::<bool>(Value::from("maybe"), &weak).is_err());
        assert!(bind::<bool>(Value::from("true"), &BindOptions::strict()).is_err());
    }

    #[test]
    fn test_sp006_enums() {
        let opts = BindOptions::default();
        assert_eq!(bind::<Runtime>(Value::from("Python"), &opts).unwrap(), Runtime::Python);
        assert_eq!(
            bind::<Runtime>(tree(json!({"Node": {"version": "20"}})), &opts).unwrap(),
            Runtime::Node { version: 20 }
        );
        assert_eq!(
            bind::<Runtime>(tree(json!({"Custom": "provided.al2"})), &opts).unwrap(),
            Runtime::Custom("provided.al2".into())
        );
        assert!(bind::<Runtime>(Value::from("Ruby"), &opts).is_err());
    }

    #[test]
    fn test_sp006_value_passthrough() {
        let input = tree(json!({"Fn::If": ["Cond", 1, 2.5]}));
        let got: Value = bind(input.clone(), &BindOptions::strict()).unwrap();
        assert_eq!(got, input);
    }

    #[test]
    fn test_sp006_integer_keys_bind_weakly() {
        let got: HashMap<u16, String> =
            bind(tree(json!({"80": "http", "443": "https"})), &BindOptions::strict()).unwrap();
        assert_eq!(got.get(&443).map(String::as_str), Some("https"));
    }

    #[test]
    fn test_sp006_options_from_yaml() {
        let opts: BindOptions = serde_yaml_ng::from_str("weakly_typed: false").unwrap();
        assert_eq!(opts, BindOptions::strict());
        let opts: BindOptions = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(opts, BindOptions::default());
    }
}
