//! Attribute codec: typed record ↔ [`AttributeMap`].
//!
//! Records are plain serde structs. The default mapping walks the record's
//! top-level fields and stores every non-zero value under the field's own
//! name. Individual fields can be bound to a custom [`FieldEncoder`] (and an
//! alternative attribute name), which then owns that field in both
//! directions. Composite key fields are owned by the declared
//! [`CompositeKey`](crate::key::CompositeKey), which folds them into the two
//! physical key attributes.
//!
//! A `Codec` is built once per record type and is read-only afterwards.

use std::any::type_name;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::attribute::{self, AttributeMap, AttributeValue};
use crate::error::{Error, Result};
use crate::key::{CompositeKey, Key};

/// Custom encoding for a single record field.
///
/// `encode` may return `None` to leave the field out of the attribute map.
pub trait FieldEncoder: Send + Sync {
    fn encode(&self, field: &str, value: &Value) -> Result<Option<AttributeValue>>;
    fn decode(&self, field: &str, attr: &AttributeValue) -> Result<Value>;
}

/// Stores a byte sequence (`Vec<u8>`, `[u8; N]`) as a [`AttributeValue::Blob`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BlobField;

impl FieldEncoder for BlobField {
    fn encode(&self, field: &str, value: &Value) -> Result<Option<AttributeValue>> {
        let items = match value {
            Value::Null => return Ok(None),
            Value::Array(items) => items,
            other => return Err(Error::schema(field, format!("expected bytes, found {other}"))),
        };
        if items.is_empty() {
            return Ok(None);
        }
        let bytes = items
            .iter()
            .map(|v| {
                v.as_u64()
                    .and_then(|b| u8::try_from(b).ok())
                    .ok_or_else(|| Error::schema(field, format!("`{v}` is not a byte")))
            })
            .collect::<Result<Vec<u8>>>()?;
        Ok(Some(AttributeValue::Blob(bytes)))
    }

    fn decode(&self, field: &str, attr: &AttributeValue) -> Result<Value> {
        match attr {
            AttributeValue::Blob(_) => attribute::to_json(field, attr),
            other => Err(Error::schema(
                field,
                format!("expected blob, found {}", other.shape()),
            )),
        }
    }
}

struct Binding {
    field: String,
    attribute: String,
    encoder: Arc<dyn FieldEncoder>,
}

/// Builder for [`Codec`]. Obtain one with [`Codec::builder`].
pub struct CodecBuilder<T> {
    bindings: Vec<Binding>,
    key: Option<CompositeKey>,
    _record: PhantomData<fn() -> T>,
}

impl<T> CodecBuilder<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Bind `field` to a custom encoder, stored under `attribute`.
    pub fn field(
        mut self,
        field: &str,
        attribute: &str,
        encoder: impl FieldEncoder + 'static,
    ) -> Self {
        self.bindings.push(Binding {
            field: field.to_string(),
            attribute: attribute.to_string(),
            encoder: Arc::new(encoder),
        });
        self
    }

    /// Declare the record's composite key fields.
    pub fn key(mut self, key: CompositeKey) -> Self {
        self.key = Some(key);
        self
    }

    /// Validate the bindings against `T` and freeze the codec.
    pub fn build(self) -> Result<Codec<T>> {
        let template = fields_of(&T::default())?;

        let mut by_field = BTreeMap::new();
        let mut by_attribute = BTreeMap::new();
        for binding in self.bindings {
            let binding = Arc::new(binding);
            if by_field.contains_key(&binding.field) {
                return Err(Error::schema(&binding.field, "field bound twice"));
            }
            if by_attribute.contains_key(&binding.attribute) {
                return Err(Error::schema(
                    &binding.field,
                    format!("attribute `{}` already in use", binding.attribute),
                ));
            }
            by_field.insert(binding.field.clone(), Arc::clone(&binding));
            by_attribute.insert(binding.attribute.clone(), binding);
        }

        let key_fields: Vec<&str> = self.key.iter().flat_map(|k| k.fields()).collect();

        // A renamed binding must not shadow a plain field of the same name.
        for (attribute, binding) in &by_attribute {
            if key_fields.contains(&binding.field.as_str()) {
                return Err(Error::schema(&binding.field, "key fields cannot be rebound"));
            }
            if attribute != &binding.field
                && template.contains_key(attribute)
                && !by_field.contains_key(attribute)
                && !key_fields.contains(&attribute.as_str())
            {
                return Err(Error::schema(
                    &binding.field,
                    format!("attribute `{attribute}` collides with a field"),
                ));
            }
        }

        if let Some(key) = &self.key {
            key.validate(&template)?;
            let names = key.attributes();
            for attribute in [&names.partition, &names.sort] {
                let plain = template.contains_key(attribute)
                    && !key_fields.contains(&attribute.as_str());
                if plain || by_attribute.contains_key(attribute) {
                    return Err(Error::schema(
                        "key",
                        format!("key attribute `{attribute}` collides with a field"),
                    ));
                }
            }
        }

        Ok(Codec {
            template,
            key: self.key,
            by_field,
            by_attribute,
            _record: PhantomData,
        })
    }
}

/// Encodes and decodes records of type `T`.
pub struct Codec<T> {
    /// `T::default()` as JSON; decoding starts from here so absent
    /// attributes keep their zero value.
    template: Map<String, Value>,
    key: Option<CompositeKey>,
    by_field: BTreeMap<String, Arc<Binding>>,
    by_attribute: BTreeMap<String, Arc<Binding>>,
    _record: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("record", &type_name::<T>())
            .field("bindings", &self.by_attribute.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T> Codec<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn builder() -> CodecBuilder<T> {
        CodecBuilder {
            bindings: Vec::new(),
            key: None,
            _record: PhantomData,
        }
    }

    pub fn composite_key(&self) -> Option<&CompositeKey> {
        self.key.as_ref()
    }

    fn is_key_field(&self, name: &str) -> bool {
        self.key.as_ref().is_some_and(|k| k.fields().any(|f| f == name))
    }

    fn is_key_attribute(&self, name: &str) -> bool {
        self.key
            .as_ref()
            .is_some_and(|k| k.attributes().partition == name || k.attributes().sort == name)
    }

    /// The physical key held by `attrs`, if this codec declares one.
    pub fn key_of(&self, attrs: &AttributeMap) -> Option<Key> {
        let names = self.key.as_ref()?.attributes();
        let partition = attrs.get(&names.partition)?.as_str()?;
        let sort = attrs.get(&names.sort)?.as_str()?;
        Some(Key::new(partition, sort))
    }

    /// Encode every non-zero field of `record`. Bound fields follow their
    /// encoder's rules instead, and key fields are always written.
    pub fn encode(&self, record: &T) -> Result<AttributeMap> {
        let fields = fields_of(record)?;
        let mut attrs = AttributeMap::new();
        for (name, value) in &fields {
            if self.is_key_field(name) {
                continue;
            }
            match self.by_field.get(name) {
                Some(binding) => {
                    if let Some(attr) = binding.encoder.encode(name, value)? {
                        attrs.insert(binding.attribute.clone(), attr);
                    }
                }
                None => {
                    if let Some(attr) = attribute::from_json(value) {
                        attrs.insert(name.clone(), attr);
                    }
                }
            }
        }
        if let Some(key) = &self.key {
            key.encode(&fields, &mut attrs)?;
        }
        Ok(attrs)
    }

    /// Sort-key prefix selected by a partially filled `record`, when this
    /// codec declares a composite key.
    pub fn sort_prefix(&self, record: &T) -> Result<Option<String>> {
        match &self.key {
            Some(key) => key.sort_prefix(&fields_of(record)?).map(Some),
            None => Ok(None),
        }
    }

    pub fn decode(&self, attrs: &AttributeMap) -> Result<T> {
        let mut record = T::default();
        self.decode_into(attrs, &mut record)?;
        Ok(record)
    }

    /// Decode `attrs` over `record`. Fields without an attribute are reset
    /// to their zero value.
    pub fn decode_into(&self, attrs: &AttributeMap, record: &mut T) -> Result<()> {
        let mut object = self.template.clone();
        for (name, attr) in attrs {
            if self.is_key_attribute(name) {
                continue;
            }
            match self.by_attribute.get(name) {
                Some(binding) => {
                    let value = binding.encoder.decode(&binding.field, attr)?;
                    object.insert(binding.field.clone(), value);
                }
                // Stored under a field's own name although the field is bound
                // elsewhere; the bound attribute wins.
                None if self.by_field.contains_key(name) || self.is_key_field(name) => {}
                None => {
                    object.insert(name.clone(), attribute::to_json(name, attr)?);
                }
            }
        }
        if let Some(key) = &self.key {
            key.decode(attrs, &mut object)?;
        }
        *record = serde_json::from_value(Value::Object(object))
            .map_err(|e| Error::schema(type_name::<T>(), e))?;
        Ok(())
    }
}

fn fields_of<T: Serialize>(record: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(Error::schema(
            type_name::<T>(),
            format!("records must encode as a map, found {other}"),
        )),
        Err(e) => Err(Error::schema(type_name::<T>(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        age: u32,
        score: f64,
        active: bool,
        tags: Vec<String>,
        avatar: Vec<u8>,
        nickname: Option<String>,
    }

    fn codec() -> Codec<Sample> {
        Codec::builder()
            .field("avatar", "avatar", BlobField)
            .build()
            .unwrap()
    }

    fn full() -> Sample {
        Sample {
            name: "Verner Pleishner".into(),
            age: 64,
            score: 0.75,
            active: true,
            tags: vec!["agent".into(), "".into()],
            avatar: vec![0, 1, 2, 254],
            nickname: Some("Professor".into()),
        }
    }

    #[test]
    fn round_trip_full_record() {
        let codec = codec();
        let attrs = codec.encode(&full()).unwrap();
        assert_eq!(attrs.len(), 7);
        assert_eq!(attrs["avatar"], AttributeValue::Blob(vec![0, 1, 2, 254]));
        assert_eq!(codec.decode(&attrs).unwrap(), full());
    }

    #[test]
    fn zero_fields_are_sparse() {
        let codec = codec();
        let record = Sample {
            name: "x".into(),
            ..Default::default()
        };
        let attrs = codec.encode(&record).unwrap();
        assert_eq!(attrs.keys().collect::<Vec<_>>(), vec!["name"]);

        let decoded = codec.decode(&attrs).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(codec.encode(&decoded).unwrap(), attrs);
    }

    #[test]
    fn decode_into_overwrites_in_place() {
        let codec = codec();
        let mut record = full();
        let mut attrs = AttributeMap::new();
        attrs.insert("age".into(), AttributeValue::Number("7".into()));
        codec.decode_into(&attrs, &mut record).unwrap();
        assert_eq!(record.age, 7);
        assert_eq!(record.name, "");
    }

    #[test]
    fn blob_for_string_field_is_schema_mismatch() {
        let mut attrs = AttributeMap::new();
        attrs.insert("name".into(), AttributeValue::Blob(vec![1, 2]));
        let err = codec().decode(&attrs).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }), "{err}");
    }

    #[test]
    fn scalar_for_blob_field_is_schema_mismatch() {
        let mut attrs = AttributeMap::new();
        attrs.insert("avatar".into(), AttributeValue::String("nope".into()));
        let err = codec().decode(&attrs).unwrap_err();
        assert!(
            matches!(err, Error::SchemaMismatch { ref field, .. } if field == "avatar"),
            "{err}"
        );
    }

    #[test]
    fn unknown_attributes_are_ignored() {
        let mut attrs = AttributeMap::new();
        attrs.insert("legacy".into(), AttributeValue::Bool(true));
        assert_eq!(codec().decode(&attrs).unwrap(), Sample::default());
    }

    #[test]
    fn duplicate_attribute_is_rejected() {
        let err = Codec::<Sample>::builder()
            .field("avatar", "bytes", BlobField)
            .field("tags", "bytes", BlobField)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("already in use"), "{err}");
    }

    #[test]
    fn attribute_shadowing_a_field_is_rejected() {
        let err = Codec::<Sample>::builder()
            .field("avatar", "name", BlobField)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("collides"), "{err}");
    }

    #[test]
    fn non_map_records_are_rejected() {
        let err = Codec::<u32>::builder().build().unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
    }
}
