//! Declarative schema model driving the generic decoder.
//!
//! Every strongly-typed entity declares its fields once in a static table.
//! The decoder consults the table for the field kind, the required flag and
//! optional numeric bounds, so decode logic stays uniform without any
//! runtime reflection. Required-field presence is checked at validation
//! time, not at decode time, which keeps partial (metadata-only) decoding
//! representable.

use std::fmt;

use crate::decode::FieldReader;
use crate::error::{EspaError, Result};

/// The declared kind of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form text.
    Text,
    /// Integer scalar.
    Integer,
    /// Floating-point scalar.
    Real,
    /// Nested entity, decoded recursively.
    Entity,
    /// Ordered list of nested entities.
    EntityList,
    /// Flat map of scalar text values.
    TextMap,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "integer",
            FieldKind::Real => "real",
            FieldKind::Entity => "entity",
            FieldKind::EntityList => "entity list",
            FieldKind::TextMap => "text map",
        };
        f.write_str(label)
    }
}

/// One declared field of a schema entity.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    /// Field name, equal to the raw document key.
    pub name: &'static str,
    /// Declared kind, used for coercion and error messages.
    pub kind: FieldKind,
    /// Whether validation demands the field be set.
    pub required: bool,
    /// Inclusive bounds for range-constrained numeric fields.
    pub range: Option<(f64, f64)>,
}

impl FieldSpec {
    /// A field that must be present after a full decode.
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            range: None,
        }
    }

    /// A field that may stay unset.
    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            range: None,
        }
    }

    /// Constrain a numeric field to an inclusive range.
    pub const fn in_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some((min, max));
        self
    }
}

/// A strongly-typed entity decodable from a document node.
///
/// Implementations pair a static field table with a constructor that pulls
/// each declared field through the [`FieldReader`] coercion helpers. Extra
/// keys in the raw node are ignored by construction, since only declared
/// fields are ever looked up.
pub trait Schema: Sized {
    /// Entity name used in error messages.
    const NAME: &'static str;

    /// Field table consulted by the decoder and by validation.
    const FIELDS: &'static [FieldSpec];

    /// Build an instance from the fields of a raw map node.
    fn decode_fields(r: &FieldReader<'_>) -> Result<Self>;

    /// Whether the named field currently holds a value.
    fn has_field(&self, name: &str) -> bool;

    /// Check that every required field is set.
    ///
    /// Entities with nested required entities extend this to recurse.
    fn validate(&self) -> Result<()> {
        check_required(self)
    }
}

/// Required-field presence check driven by the field table.
pub fn check_required<T: Schema>(entity: &T) -> Result<()> {
    for field in T::FIELDS.iter().filter(|f| f.required) {
        if !entity.has_field(field.name) {
            return Err(EspaError::MissingField {
                entity: T::NAME,
                field: field.name,
            });
        }
    }
    Ok(())
}
