// serde bridge: any `Serialize` shape -> Value tree
//
// This is how arbitrary caller types reach the flattener without building
// `Value` by hand: serde's data model already classifies every shape into
// scalars, options, sequences, maps and structs, so a Serializer that
// collects into `Value` is the introspection step. Shapes outside the
// flattener's kind set (bytes, unit, non-string map keys) collapse to the
// absent value and disappear from output instead of failing; the operation
// stays total over arbitrary inputs.
use std::collections::HashMap;
use std::fmt;

use serde::ser::{self, Impossible, Serialize};
use thiserror::Error;

use crate::core::value::Value;

/// Error surfaced while driving a foreign `Serialize` impl. The bridge
/// itself never fails; the only source is `serde::ser::Error::custom`
/// raised inside the input's own serialization code.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{0}")]
    Custom(String),
}

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError::Custom(msg.to_string())
    }
}

/// Flatten any serializable value into a dotted-path -> text map.
///
/// Equivalent to [`to_value`] followed by [`Value::flatten`].
///
/// Precondition: the input must be tree-shaped. A `Serialize` impl that
/// recurses through shared ownership (e.g. an `Rc` cycle) will not
/// terminate; there is no cycle detection.
pub fn flatten<T>(value: &T) -> Result<HashMap<String, String>, EncodeError>
where
    T: Serialize + ?Sized,
{
    Ok(to_value(value)?.flatten())
}

/// Convert any serializable value into a [`Value`] tree.
///
/// Time types serialize through serde as text (chrono renders RFC 3339
/// strings), so they arrive here as `Value::Text`. Instant-kind handling
/// (zero-instant omission, the `time` root key) applies when the caller
/// builds `Value::Instant` directly instead.
pub fn to_value<T>(value: &T) -> Result<Value, EncodeError>
where
    T: Serialize + ?Sized,
{
    value.serialize(ValueSerializer)
}

struct ValueSerializer;

// Shapes with no counterpart in the kind set become the absent value, which
// the flattener then omits.
const SKIPPED: Value = Value::Optional(None);

impl ser::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = EncodeError;

    type SerializeSeq = SeqCollector;
    type SerializeTuple = SeqCollector;
    type SerializeTupleStruct = SeqCollector;
    type SerializeTupleVariant = TaggedSeqCollector;
    type SerializeMap = MapCollector;
    type SerializeStruct = RecordCollector;
    type SerializeStructVariant = TaggedRecordCollector;

    fn serialize_bool(self, v: bool) -> Result<Value, EncodeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, EncodeError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, EncodeError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, EncodeError> {
        Ok(Value::Int(i64::from(v)))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, EncodeError> {
        Ok(Value::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, EncodeError> {
        Ok(i64::try_from(v).map_or(SKIPPED, Value::Int))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, EncodeError> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, EncodeError> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, EncodeError> {
        Ok(Value::Uint(u64::from(v)))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, EncodeError> {
        Ok(Value::Uint(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, EncodeError> {
        Ok(u64::try_from(v).map_or(SKIPPED, Value::Uint))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, EncodeError> {
        Ok(Value::Float(f64::from(v)))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, EncodeError> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> Result<Value, EncodeError> {
        Ok(Value::Text(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, EncodeError> {
        Ok(Value::Text(v.to_owned()))
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<Value, EncodeError> {
        // opaque blobs have no textual leaf form
        Ok(SKIPPED)
    }

    fn serialize_none(self) -> Result<Value, EncodeError> {
        Ok(Value::Optional(None))
    }

    fn serialize_some<T>(self, value: &T) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Ok(Value::Optional(Some(Box::new(value.serialize(ValueSerializer)?))))
    }

    fn serialize_unit(self) -> Result<Value, EncodeError> {
        Ok(SKIPPED)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, EncodeError> {
        Ok(SKIPPED)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, EncodeError> {
        Ok(Value::Text(variant.to_owned()))
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        // transparent, same as serde_json
        value.serialize(ValueSerializer)
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        // externally tagged: one-field record keyed by the variant name
        Ok(Value::Record(vec![(
            variant.to_owned(),
            value.serialize(ValueSerializer)?,
        )]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector, EncodeError> {
        Ok(SeqCollector { items: Vec::with_capacity(len.unwrap_or(0)) })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCollector, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCollector, EncodeError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TaggedSeqCollector, EncodeError> {
        Ok(TaggedSeqCollector { variant, items: Vec::with_capacity(len) })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapCollector, EncodeError> {
        Ok(MapCollector {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<RecordCollector, EncodeError> {
        Ok(RecordCollector { fields: Vec::with_capacity(len) })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<TaggedRecordCollector, EncodeError> {
        Ok(TaggedRecordCollector { variant, fields: Vec::with_capacity(len) })
    }
}

struct SeqCollector {
    items: Vec<Value>,
}

impl ser::SerializeSeq for SeqCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_element<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Value, EncodeError> {
        ser::SerializeSeq::end(self)
    }
}

struct TaggedSeqCollector {
    variant: &'static str,
    items: Vec<Value>,
}

impl ser::SerializeTupleVariant for TaggedSeqCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(vec![(
            self.variant.to_owned(),
            Value::Seq(self.items),
        )]))
    }
}

struct MapCollector {
    entries: Vec<(String, Value)>,
    // None between entries; Some(None) while the current key is non-textual
    pending_key: Option<Option<String>>,
}

impl ser::SerializeMap for MapCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_key<T>(&mut self, key: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.pending_key = Some(key.serialize(KeySerializer).ok());
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        // an entry under a non-string key is dropped whole
        if let Some(Some(key)) = self.pending_key.take() {
            self.entries.push((key, value.serialize(ValueSerializer)?));
        }
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(self.entries))
    }
}

struct RecordCollector {
    fields: Vec<(String, Value)>,
}

impl ser::SerializeStruct for RecordCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.fields.push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(self.fields))
    }
}

struct TaggedRecordCollector {
    variant: &'static str,
    fields: Vec<(String, Value)>,
}

impl ser::SerializeStructVariant for TaggedRecordCollector {
    type Ok = Value;
    type Error = EncodeError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> Result<(), EncodeError>
    where
        T: Serialize + ?Sized,
    {
        self.fields.push((key.to_owned(), value.serialize(ValueSerializer)?));
        Ok(())
    }

    fn end(self) -> Result<Value, EncodeError> {
        Ok(Value::Record(vec![(
            self.variant.to_owned(),
            Value::Record(self.fields),
        )]))
    }
}

// map keys must already be text; anything else makes the entry skippable
struct KeySerializer;

macro_rules! key_not_text {
    ($($method:ident: $t:ty),*) => {
        $(fn $method(self, _v: $t) -> Result<String, EncodeError> {
            Err(ser::Error::custom("map key is not a string"))
        })*
    };
}

impl ser::Serializer for KeySerializer {
    type Ok = String;
    type Error = EncodeError;

    type SerializeSeq = Impossible<String, EncodeError>;
    type SerializeTuple = Impossible<String, EncodeError>;
    type SerializeTupleStruct = Impossible<String, EncodeError>;
    type SerializeTupleVariant = Impossible<String, EncodeError>;
    type SerializeMap = Impossible<String, EncodeError>;
    type SerializeStruct = Impossible<String, EncodeError>;
    type SerializeStructVariant = Impossible<String, EncodeError>;

    fn serialize_str(self, v: &str) -> Result<String, EncodeError> {
        Ok(v.to_owned())
    }

    fn serialize_char(self, v: char) -> Result<String, EncodeError> {
        Ok(v.to_string())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, EncodeError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(KeySerializer)
    }

    key_not_text! {
        serialize_bool: bool,
        serialize_i8: i8,
        serialize_i16: i16,
        serialize_i32: i32,
        serialize_i64: i64,
        serialize_i128: i128,
        serialize_u8: u8,
        serialize_u16: u16,
        serialize_u32: u32,
        serialize_u64: u64,
        serialize_u128: u128,
        serialize_f32: f32,
        serialize_f64: f64,
        serialize_bytes: &[u8]
    }

    fn serialize_none(self) -> Result<String, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_some<T>(self, _value: &T) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_unit(self) -> Result<String, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<String, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, EncodeError>
    where
        T: Serialize + ?Sized,
    {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        Err(ser::Error::custom("map key is not a string"))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use chrono::{DateTime, Utc};
    use serde::Serialize;
    use serde_json::json;

    use super::{flatten, to_value};
    use crate::core::value::Value;

    fn entries(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect()
    }

    // chrono's serde form, without the JSON quotes
    fn serde_text(t: &DateTime<Utc>) -> String {
        match serde_json::to_value(t).expect("chrono serializes to a string") {
            serde_json::Value::String(s) => s,
            other => panic!("unexpected serde form for DateTime: {}", other),
        }
    }

    #[derive(Serialize)]
    struct Simple {
        a: i64,
        b: String,
        c: DateTime<Utc>,
        d: Vec<i64>,
    }

    #[derive(Serialize)]
    struct Nested {
        a: i64,
        b: String,
        s: Simple,
    }

    #[derive(Serialize)]
    struct Pointered {
        a: Option<i64>,
        b: Option<String>,
        d: Option<Vec<i64>>,
        s: Box<Simple>,
    }

    #[test]
    fn derived_struct_flattens_in_declaration_order_paths() {
        let now = Utc::now();
        let got = flatten(&Simple {
            a: 0,
            b: "hello".to_owned(),
            c: now,
            d: vec![4, 5, 6],
        })
        .unwrap();
        assert_eq!(
            got,
            entries(&[
                ("a", "0"),
                ("b", "hello"),
                ("c", &serde_text(&now)),
                ("d.0", "4"),
                ("d.1", "5"),
                ("d.2", "6"),
            ])
        );
    }

    #[test]
    fn nested_struct_prefixes_with_field_name() {
        let now = Utc::now();
        let got = flatten(&Nested {
            a: 0,
            b: "hello".to_owned(),
            s: Simple {
                a: 1,
                b: "goodbye".to_owned(),
                c: now,
                d: vec![4, 5, 6],
            },
        })
        .unwrap();
        assert_eq!(
            got,
            entries(&[
                ("a", "0"),
                ("b", "hello"),
                ("s.a", "1"),
                ("s.b", "goodbye"),
                ("s.c", &serde_text(&now)),
                ("s.d.0", "4"),
                ("s.d.1", "5"),
                ("s.d.2", "6"),
            ])
        );
    }

    #[test]
    fn option_and_box_fields_match_their_direct_counterparts() {
        let now = Utc::now();
        let direct = flatten(&Simple {
            a: 1,
            b: "goodbye".to_owned(),
            c: now,
            d: vec![7, 8, 9],
        })
        .unwrap();
        let direct_prefixed: HashMap<String, String> = direct
            .iter()
            .map(|(k, v)| (format!("s.{k}"), v.clone()))
            .collect();

        let got = flatten(&Pointered {
            a: Some(0),
            b: Some("hello".to_owned()),
            d: Some(vec![4, 5, 6]),
            s: Box::new(Simple {
                a: 1,
                b: "goodbye".to_owned(),
                c: now,
                d: vec![7, 8, 9],
            }),
        })
        .unwrap();

        let mut expected = entries(&[
            ("a", "0"),
            ("b", "hello"),
            ("d.0", "4"),
            ("d.1", "5"),
            ("d.2", "6"),
        ]);
        expected.extend(direct_prefixed);
        assert_eq!(got, expected);
    }

    #[test]
    fn absent_and_empty_fields_vanish_but_zero_and_false_stay() {
        #[derive(Serialize)]
        struct Sparse {
            a: i64,
            b: String,
            d: Option<Vec<i64>>,
            e: Option<String>,
            f: bool,
        }

        let got = flatten(&Sparse {
            a: 0,
            b: String::new(),
            d: None,
            e: None,
            f: false,
        })
        .unwrap();
        assert_eq!(got, entries(&[("a", "0"), ("f", "false")]));
    }

    #[test]
    fn root_scalars_through_the_bridge_use_kind_names() {
        assert_eq!(flatten(&1i64).unwrap(), entries(&[("int", "1")]));
        assert_eq!(flatten("hello").unwrap(), entries(&[("string", "hello")]));
        assert_eq!(
            flatten(&vec!["A", "B", "C"]).unwrap(),
            entries(&[("seq.0", "A"), ("seq.1", "B"), ("seq.2", "C")])
        );
    }

    #[test]
    fn string_keyed_map_flattens_as_a_record() {
        let mut m = BTreeMap::new();
        m.insert("x".to_owned(), 1i64);
        m.insert("y".to_owned(), 2i64);
        assert_eq!(flatten(&m).unwrap(), entries(&[("x", "1"), ("y", "2")]));
    }

    #[test]
    fn non_string_keyed_map_is_skipped_silently() {
        let mut m = BTreeMap::new();
        m.insert(1i64, "a");
        m.insert(2i64, "b");
        assert_eq!(flatten(&m).unwrap(), HashMap::new());
    }

    #[test]
    fn enum_variants() {
        #[derive(Serialize)]
        enum Mode {
            On,
            Level(i64),
            Range { lo: i64, hi: i64 },
        }

        #[derive(Serialize)]
        struct Holder {
            m: Mode,
        }

        assert_eq!(
            flatten(&Holder { m: Mode::On }).unwrap(),
            entries(&[("m", "On")])
        );
        assert_eq!(
            flatten(&Holder { m: Mode::Level(3) }).unwrap(),
            entries(&[("m.Level", "3")])
        );
        assert_eq!(
            flatten(&Holder { m: Mode::Range { lo: 1, hi: 9 } }).unwrap(),
            entries(&[("m.Range.lo", "1"), ("m.Range.hi", "9")])
        );
    }

    #[test]
    fn unsupported_shapes_collapse_to_nothing() {
        assert_eq!(to_value(&()).unwrap(), Value::Optional(None));
        assert_eq!(flatten(&()).unwrap(), HashMap::new());

        #[derive(Serialize)]
        struct Unit;
        assert_eq!(flatten(&Unit).unwrap(), HashMap::new());

        // 128-bit values that fit still flatten; overflow is dropped
        assert_eq!(flatten(&42i128).unwrap(), entries(&[("int", "42")]));
        assert_eq!(flatten(&u128::MAX).unwrap(), HashMap::new());
    }

    #[test]
    fn newtype_struct_is_transparent() {
        #[derive(Serialize)]
        struct Meters(f64);

        #[derive(Serialize)]
        struct Span {
            len: Meters,
        }

        assert_eq!(
            flatten(&Span { len: Meters(2.5) }).unwrap(),
            entries(&[("len", "2.5")])
        );
    }

    #[test]
    fn json_values_flatten_too() {
        let v = json!({
            "a": {"b": [1, 2]},
            "c": "x",
            "gone": null,
        });
        assert_eq!(
            flatten(&v).unwrap(),
            entries(&[("a.b.0", "1"), ("a.b.1", "2"), ("c", "x")])
        );
    }

    #[test]
    fn to_value_preserves_declaration_order() {
        #[derive(Serialize)]
        struct Ordered {
            z: i64,
            a: i64,
        }

        let v = to_value(&Ordered { z: 1, a: 2 }).unwrap();
        assert_eq!(
            v,
            Value::Record(vec![
                ("z".to_owned(), Value::Int(1)),
                ("a".to_owned(), Value::Int(2)),
            ])
        );
    }
}
