//! NS group data source. Looked up by id or display name, never mutated.

use serde::{Deserialize, Serialize};

use super::{RemoteObject, Resource};
use crate::projection::{Field, FieldValue, optional_text, set_text};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NsGroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NsGroupObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

impl RemoteObject for NsGroupObject {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn revision(&self) -> Option<i64> {
        self.revision
    }
}

const FIELDS: &[Field<NsGroupObject, NsGroupSpec>] = &[
    Field {
        name: "display_name",
        remote: |o| FieldValue::Text(o.display_name.clone()),
        desired: |s| optional_text(&s.display_name),
        set: |s, v| set_text(&mut s.display_name, v),
    },
    Field {
        name: "description",
        remote: |o| FieldValue::Text(o.description.clone()),
        desired: |s| optional_text(&s.description),
        set: |s, v| set_text(&mut s.description, v),
    },
];

pub struct NsGroup;

impl Resource for NsGroup {
    const KIND: &'static str = "NsGroup";
    type Spec = NsGroupSpec;
    type Object = NsGroupObject;

    fn fields() -> &'static [Field<Self::Object, Self::Spec>] {
        FIELDS
    }

    fn display_name(spec: &Self::Spec) -> Option<&str> {
        spec.display_name.as_deref()
    }
}
