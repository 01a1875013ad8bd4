//! Generic decoding of document nodes into schema entities.
//!
//! The decoder is purely structural: for every field an entity declares it
//! looks up the raw value by field name, coerces it according to the
//! declared kind and recurses into nested entities and lists. Fields absent
//! from the raw node are skipped (required-field presence is a validation
//! concern), and raw keys with no matching schema field are silently
//! dropped so evolving metadata schemas keep decoding.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::document::{Node, NodeMap};
use crate::error::{EspaError, Result};
use crate::schema::{FieldSpec, Schema};

/// Converts loosely-typed document nodes into schema entities.
///
/// With `include_optional` disabled only required fields are decoded,
/// which supports partial reconstruction of an entity's core identity
/// without touching the rest of its metadata.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    include_optional: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Decoder that fills every declared field present in the document.
    pub fn new() -> Self {
        Self {
            include_optional: true,
        }
    }

    /// Decoder that only fills required fields.
    pub fn required_only() -> Self {
        Self {
            include_optional: false,
        }
    }

    /// Decode `node` as entity `T`. The node must be map-like.
    pub fn decode<T: Schema>(&self, node: &Node) -> Result<T> {
        let map = node
            .as_map()
            .ok_or_else(|| EspaError::schema_mismatch(T::NAME, "expected a map-like node"))?;
        T::decode_fields(&FieldReader {
            entity: T::NAME,
            map,
            dec: *self,
        })
    }
}

/// Per-entity view handed to [`Schema::decode_fields`].
///
/// Each helper takes the entity's own [`FieldSpec`] so the optional-field
/// gate and error attribution stay uniform across entities.
pub struct FieldReader<'a> {
    entity: &'static str,
    map: &'a NodeMap,
    dec: Decoder,
}

impl FieldReader<'_> {
    /// Raw lookup honoring the optional-field gate.
    fn lookup(&self, field: &FieldSpec) -> Option<&Node> {
        if !self.dec.include_optional && !field.required {
            return None;
        }
        self.map.get(field.name)
    }

    fn mismatch(&self, field: &FieldSpec, message: impl std::fmt::Display) -> EspaError {
        EspaError::schema_mismatch(self.entity, format!("field `{}`: {message}", field.name))
    }

    /// Scalar text field.
    pub fn text(&self, field: &FieldSpec) -> Result<Option<String>> {
        match self.lookup(field) {
            None => Ok(None),
            Some(Node::Text(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.mismatch(field, "expected scalar text")),
        }
    }

    /// Signed integer field.
    pub fn integer(&self, field: &FieldSpec) -> Result<Option<i64>> {
        self.parse_scalar(field)
    }

    /// Non-negative integer field used for dimensions and counts.
    pub fn index(&self, field: &FieldSpec) -> Result<Option<usize>> {
        self.parse_scalar(field)
    }

    /// Floating-point field, checked against the declared range.
    pub fn real(&self, field: &FieldSpec) -> Result<Option<f64>> {
        let value: Option<f64> = self.parse_scalar(field)?;
        if let (Some(v), Some((min, max))) = (value, field.range) {
            if v < min || v > max {
                return Err(self.mismatch(field, format!("value {v} outside [{min}, {max}]")));
            }
        }
        Ok(value)
    }

    /// Nested entity field, decoded recursively.
    pub fn entity<T: Schema>(&self, field: &FieldSpec) -> Result<Option<T>> {
        match self.lookup(field) {
            None => Ok(None),
            Some(node) => self.dec.decode(node).map(Some),
        }
    }

    /// List-of-entities field. The raw value must be a list.
    pub fn entity_list<T: Schema>(&self, field: &FieldSpec) -> Result<Option<Vec<T>>> {
        match self.lookup(field) {
            None => Ok(None),
            Some(Node::List(items)) => items
                .iter()
                .map(|node| self.dec.decode(node))
                .collect::<Result<Vec<T>>>()
                .map(Some),
            Some(_) => Err(self.mismatch(field, "expected a list")),
        }
    }

    /// Flat map of scalar text values, passed through unparsed.
    pub fn text_map(&self, field: &FieldSpec) -> Result<Option<BTreeMap<String, String>>> {
        match self.lookup(field) {
            None => Ok(None),
            Some(Node::Map(map)) => {
                let mut out = BTreeMap::new();
                for (key, value) in map.iter() {
                    match value {
                        Node::Text(s) => {
                            out.insert(key.to_string(), s.clone());
                        }
                        _ => return Err(self.mismatch(field, format!("entry `{key}` is not scalar"))),
                    }
                }
                Ok(Some(out))
            }
            Some(_) => Err(self.mismatch(field, "expected a map of scalars")),
        }
    }

    fn parse_scalar<T: FromStr>(&self, field: &FieldSpec) -> Result<Option<T>> {
        match self.lookup(field) {
            None => Ok(None),
            Some(Node::Text(s)) => {
                let trimmed = s.trim();
                trimmed.parse::<T>().map(Some).map_err(|_| {
                    self.mismatch(field, format!("cannot parse `{trimmed}` as {}", field.kind))
                })
            }
            Some(_) => Err(self.mismatch(field, "expected scalar text")),
        }
    }
}
