//! Shape declaration and the field layout compiler.
//!
//! A [`ComponentShape`] is the registration-time schema for one component:
//! an ordered list of field declarations, each with a default value and an
//! optional explicit [`FieldKind`]. [`compile_layout`] turns a shape into the
//! offset-assigned [`FieldDescriptor`] sequence the foreign engine's packed
//! struct convention expects.
//!
//! Layout compilation is pure and deterministic: the same shape always
//! yields the same kinds and offsets, so re-registering a shape can be
//! checked for divergence. Foreign name buffers are attached later, by the
//! registration protocol.

use serde::{Deserialize, Serialize};
use strata_abi::{BufferHandle, FieldKind};

use crate::marshal;
use crate::value::Value;
use crate::BindError;

// ---------------------------------------------------------------------------
// ComponentShape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FieldDecl {
    name: String,
    default: Value,
    /// Explicit kind; `None` means infer from the default.
    kind: Option<FieldKind>,
}

/// A declared component shape: name plus ordered field declarations.
///
/// Field order is declaration order and determines the packed layout.
///
/// ```
/// use strata_abi::FieldKind;
/// use strata_bind::ComponentShape;
///
/// let position = ComponentShape::new("Position")
///     .field("x", FieldKind::F32, 0.0f32)
///     .field("y", FieldKind::F32, 0.0f32);
/// assert_eq!(position.name(), "Position");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentShape {
    name: String,
    fields: Vec<FieldDecl>,
}

impl ComponentShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declare a field with an explicit kind.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind, default: impl Into<Value>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            default: default.into(),
            kind: Some(kind),
        });
        self
    }

    /// Declare a field whose kind is inferred from the default value
    /// (string -> `Str`, bool -> `Bool`, any numeric -> `F64`).
    pub fn field_value(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            default: default.into(),
            kind: None,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// The declared default for one field, if present.
    pub(crate) fn default_of(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == field)
            .map(|f| &f.default)
    }

    /// Defaults for a compiled field sequence, coerced to each field's kind.
    /// Fields the shape does not declare (or whose default no longer
    /// coerces) fall back to the kind's zero value.
    pub(crate) fn defaults_for(&self, fields: &[FieldDescriptor]) -> Vec<Value> {
        fields
            .iter()
            .map(|fd| {
                self.default_of(&fd.name)
                    .and_then(|v| marshal::coerce(v, fd.kind))
                    .unwrap_or_else(|| Value::zero_of(fd.kind))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// FieldDescriptor
// ---------------------------------------------------------------------------

/// One compiled field of a component layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Declared field name.
    pub name: String,
    /// Marshalable kind.
    pub kind: FieldKind,
    /// The foreign buffer holding this field's name at registration time.
    /// Recorded for diagnostics only -- the buffer is released once the
    /// foreign create call returns, and the handle is never dereferenced
    /// afterwards.
    pub foreign_name: BufferHandle,
    /// Declaration index among compiled fields.
    pub index: u32,
    /// Byte offset in the packed struct: the sum of the sizes of every
    /// preceding field, no padding.
    pub offset: u32,
}

/// Whether two compiled layouts disagree on names, kinds, or offsets.
/// Foreign name handles are registration-time artifacts and do not count.
pub(crate) fn layout_diverges(a: &[FieldDescriptor], b: &[FieldDescriptor]) -> bool {
    a.len() != b.len()
        || a.iter()
            .zip(b)
            .any(|(x, y)| x.name != y.name || x.kind != y.kind || x.offset != y.offset)
}

// ---------------------------------------------------------------------------
// Layout compiler
// ---------------------------------------------------------------------------

/// Compile a shape into its offset-assigned field sequence.
///
/// Fields named in `exclude` are bookkeeping entries and are skipped without
/// consuming an index or offset. Explicit kinds win; otherwise the kind is
/// inferred from the default value.
///
/// # Errors
///
/// [`BindError::UnsupportedFieldType`] when a field has neither an explicit
/// kind nor an inferrable one (an array default without a declared kind), or
/// when its default cannot be represented as its declared kind.
pub fn compile_layout(
    shape: &ComponentShape,
    exclude: &[&str],
) -> Result<Vec<FieldDescriptor>, BindError> {
    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(shape.fields.len());
    let mut offset = 0u32;

    for decl in &shape.fields {
        if exclude.contains(&decl.name.as_str()) {
            continue;
        }
        if fields.iter().any(|f| f.name == decl.name) {
            tracing::warn!(
                component = %shape.name,
                field = %decl.name,
                "duplicate field declaration ignored"
            );
            continue;
        }

        let kind = match decl.kind.or_else(|| decl.default.inferred_kind()) {
            Some(kind) => kind,
            None => {
                return Err(BindError::UnsupportedFieldType {
                    component: shape.name.clone(),
                    field: decl.name.clone(),
                })
            }
        };
        if marshal::coerce(&decl.default, kind).is_none() {
            return Err(BindError::UnsupportedFieldType {
                component: shape.name.clone(),
                field: decl.name.clone(),
            });
        }

        fields.push(FieldDescriptor {
            name: decl.name.clone(),
            kind,
            foreign_name: BufferHandle::NULL,
            index: fields.len() as u32,
            offset,
        });
        offset += kind.size_bytes();
    }

    Ok(fields)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
