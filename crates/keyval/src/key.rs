//! Record identity and the composite-key codec.

use std::fmt;

use serde_json::{Map, Value};

use crate::attribute::{AttributeMap, AttributeValue};
use crate::config::KeyAttributes;
use crate::error::{Error, Result};

/// Separator between the fields of a grouped key part.
pub const DEFAULT_SEPARATOR: &str = "#";

/// Every storable record names its own `(partition, sort)` key.
///
/// Must be stable (same field values, same key) and total for a fully
/// populated record. When a key part is made of several fields, the
/// identity joins them with the [`CompositeKey`] separator.
pub trait Identity {
    fn identity(&self) -> (String, String);
}

/// Physical composite key as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    pub partition: String,
    pub sort: String,
}

impl Key {
    pub fn new(partition: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            sort: sort.into(),
        }
    }

    /// Extract the key of `record` through its [`Identity`].
    pub fn of<T: Identity + ?Sized>(record: &T) -> Self {
        let (partition, sort) = record.identity();
        Self { partition, sort }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.partition, self.sort)
    }
}

/// Declares which fields of a record make up its composite key and the
/// attribute names the two key parts are stored under.
///
/// Each part is a group of one or more string fields. A group is folded
/// into a single physical attribute by joining its fields with the
/// separator, and split back on decode. Key parts are never omitted, even
/// when every field in them is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    partition: Vec<String>,
    sort: Vec<String>,
    separator: String,
    attributes: KeyAttributes,
}

impl CompositeKey {
    /// One field per key part, stored under the default `prefix` / `suffix`
    /// attributes.
    pub fn new(partition_field: &str, sort_field: &str) -> Self {
        Self::grouped(&[partition_field], &[sort_field])
    }

    /// Several fields per key part, in folding order.
    pub fn grouped(partition: &[&str], sort: &[&str]) -> Self {
        Self {
            partition: partition.iter().map(|f| f.to_string()).collect(),
            sort: sort.iter().map(|f| f.to_string()).collect(),
            separator: DEFAULT_SEPARATOR.to_string(),
            attributes: KeyAttributes::default(),
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// Override the physical attribute names, e.g. from
    /// [`StoreConfig::keys`](crate::config::StoreConfig::keys).
    pub fn with_attributes(mut self, attributes: &KeyAttributes) -> Self {
        self.attributes = attributes.clone();
        self
    }

    pub fn partition_fields(&self) -> &[String] {
        &self.partition
    }

    pub fn sort_fields(&self) -> &[String] {
        &self.sort
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn attributes(&self) -> &KeyAttributes {
        &self.attributes
    }

    /// Every field taking part in the key.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.partition.iter().chain(&self.sort).map(String::as_str)
    }

    /// Check the declaration against `template`, the record's default value.
    pub(crate) fn validate(&self, template: &Map<String, Value>) -> Result<()> {
        if self.partition.is_empty() || self.sort.is_empty() {
            return Err(Error::schema("key", "both key parts need at least one field"));
        }
        if self.attributes.partition == self.attributes.sort {
            return Err(Error::schema(
                "key",
                "partition and sort attributes must differ",
            ));
        }
        let grouped = self.partition.len() > 1 || self.sort.len() > 1;
        if grouped && self.separator.is_empty() {
            return Err(Error::schema("key", "grouped key parts need a separator"));
        }
        let mut seen = Vec::new();
        for field in self.fields() {
            if seen.contains(&field) {
                return Err(Error::schema(field, "field used twice in the key"));
            }
            seen.push(field);
            // Only `String`-like fields round-trip through a string key;
            // `Option<String>` would come back as `Some("")`.
            match template.get(field) {
                Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(Error::schema(
                        field,
                        format!("key fields must be string-like, found {other}"),
                    ));
                }
                None => return Err(Error::schema(field, "not a field of the record")),
            }
        }
        Ok(())
    }

    /// The partition part, then the sort part.
    fn parts(&self) -> [KeyPart<'_>; 2] {
        [
            KeyPart {
                fields: &self.partition,
                attribute: &self.attributes.partition,
                separator: &self.separator,
            },
            KeyPart {
                fields: &self.sort,
                attribute: &self.attributes.sort,
                separator: &self.separator,
            },
        ]
    }

    /// Fold the key fields of `fields` into the two physical attributes.
    pub(crate) fn encode(
        &self,
        fields: &Map<String, Value>,
        attrs: &mut AttributeMap,
    ) -> Result<()> {
        for part in self.parts() {
            attrs.insert(part.attribute.to_string(), part.encode(fields)?);
        }
        Ok(())
    }

    /// Sort-key prefix for matching on a partially filled record.
    ///
    /// Trailing empty fields of the sort group are dropped, and the folded
    /// prefix keeps its separator so `photo` does not match `photos#1`.
    pub(crate) fn sort_prefix(&self, fields: &Map<String, Value>) -> Result<String> {
        let [_, sort] = self.parts();
        let folded = sort.fold(fields)?;
        if self.sort.len() == 1 {
            return Ok(folded);
        }
        let filled = self
            .sort
            .iter()
            .rposition(|f| fields.get(f).and_then(Value::as_str).is_some_and(|v| !v.is_empty()));
        let Some(last) = filled else {
            return Ok(String::new());
        };
        let mut prefix = self.sort[..=last]
            .iter()
            .filter_map(|f| fields.get(f).and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(self.separator.as_str());
        if last + 1 < self.sort.len() {
            prefix.push_str(&self.separator);
        }
        Ok(prefix)
    }

    /// Split the physical key attributes present in `attrs` back into fields.
    pub(crate) fn decode(
        &self,
        attrs: &AttributeMap,
        object: &mut Map<String, Value>,
    ) -> Result<()> {
        for part in self.parts() {
            if let Some(attr) = attrs.get(part.attribute) {
                part.decode(attr, object)?;
            }
        }
        Ok(())
    }
}

/// One physical key attribute and the fields folded into it.
struct KeyPart<'a> {
    fields: &'a [String],
    attribute: &'a str,
    separator: &'a str,
}

impl KeyPart<'_> {
    fn name(&self) -> String {
        self.fields.join(", ")
    }

    fn encode(&self, fields: &Map<String, Value>) -> Result<AttributeValue> {
        self.fold(fields).map(AttributeValue::String)
    }

    fn fold(&self, fields: &Map<String, Value>) -> Result<String> {
        let mut folded = String::new();
        for (i, field) in self.fields.iter().enumerate() {
            let value = match fields.get(field) {
                Some(Value::String(s)) => s,
                Some(other) => {
                    return Err(Error::schema(
                        field,
                        format!("key fields must be string-like, found {other}"),
                    ));
                }
                None => return Err(Error::schema(field, "key field missing from record")),
            };
            let last = i + 1 == self.fields.len();
            // The last field takes the remainder on decode, so only the
            // fields before it must be free of the separator.
            if !last && value.contains(self.separator) {
                return Err(Error::schema(
                    field,
                    format!("`{value}` contains the key separator `{}`", self.separator),
                ));
            }
            if i > 0 {
                folded.push_str(self.separator);
            }
            folded.push_str(value);
        }
        Ok(folded)
    }

    fn decode(&self, attr: &AttributeValue, object: &mut Map<String, Value>) -> Result<()> {
        let AttributeValue::String(folded) = attr else {
            return Err(Error::schema(
                self.name(),
                format!("expected string key, found {}", attr.shape()),
            ));
        };
        let components: Vec<&str> = folded.splitn(self.fields.len(), self.separator).collect();
        if components.len() != self.fields.len() {
            return Err(Error::schema(
                self.name(),
                format!(
                    "`{folded}` has {} key components, expected {}",
                    components.len(),
                    self.fields.len()
                ),
            ));
        }
        for (field, component) in self.fields.iter().zip(components) {
            object.insert(field.clone(), Value::String(component.to_string()));
        }
        Ok(())
    }
}
