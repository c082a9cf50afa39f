//! Field projection tables.
//!
//! A resource describes each user-visible field once: how to read it from
//! the remote object, how to read it from the desired spec, and how to
//! write an observed value back into a spec. The same table drives both
//! projection (remote → observed) and diffing (remote vs desired).

use std::collections::BTreeSet;

use crate::tags::Tag;

/// Value of a single projected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Not set in the desired spec; the remote computes it.
    Unset,
    Text(String),
    TextSet(BTreeSet<String>),
    Tags(Vec<Tag>),
    Flag(bool),
}

/// Accessors for one field of object type `O` and spec type `S`.
pub struct Field<O, S> {
    pub name: &'static str,
    /// Read the field from the remote object.
    pub remote: fn(&O) -> FieldValue,
    /// Read the field from the desired spec.
    pub desired: fn(&S) -> FieldValue,
    /// Store an observed value in a spec.
    pub set: fn(&mut S, FieldValue),
}

/// Copy every field of `object` into `target`.
pub fn project<O, S>(fields: &[Field<O, S>], object: &O, target: &mut S) {
    for field in fields {
        (field.set)(target, (field.remote)(object));
    }
}

/// Names of fields whose desired value differs from the remote one.
///
/// Fields the spec leaves [`FieldValue::Unset`] are never reported.
pub fn diff<O, S>(fields: &[Field<O, S>], object: &O, desired: &S) -> Vec<&'static str> {
    fields
        .iter()
        .filter_map(|field| {
            let want = (field.desired)(desired);
            if want == FieldValue::Unset || want == (field.remote)(object) {
                None
            } else {
                Some(field.name)
            }
        })
        .collect()
}

/// Optional text, `Unset` when absent.
pub fn optional_text(value: &Option<String>) -> FieldValue {
    match value {
        Some(v) => FieldValue::Text(v.clone()),
        None => FieldValue::Unset,
    }
}

/// Optional text where absence means the empty string remotely.
pub fn text_or_empty(value: &Option<String>) -> FieldValue {
    FieldValue::Text(value.clone().unwrap_or_default())
}

/// Write a text value into an optional spec field.
pub fn set_text(target: &mut Option<String>, value: FieldValue) {
    if let FieldValue::Text(v) = value {
        *target = Some(v);
    }
}

pub fn set_tags(target: &mut Vec<Tag>, value: FieldValue) {
    if let FieldValue::Tags(v) = value {
        *target = v;
    }
}

pub fn set_text_set(target: &mut BTreeSet<String>, value: FieldValue) {
    if let FieldValue::TextSet(v) = value {
        *target = v;
    }
}

pub fn set_flag(target: &mut bool, value: FieldValue) {
    if let FieldValue::Flag(v) = value {
        *target = v;
    }
}
