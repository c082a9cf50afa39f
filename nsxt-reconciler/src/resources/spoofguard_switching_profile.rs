//! SpoofGuard switching profile.
//!
//! The only setting is whether port address bindings are whitelisted. The
//! manager stores it as the `white_list_providers` list, so the flag goes
//! through the sentinel codec in both directions.

use serde::{Deserialize, Serialize};

use super::{ManagedResource, RemoteObject, Resource};
use crate::flags::{LPORT_BINDINGS, decode_sentinel_flag, encode_sentinel_flag};
use crate::projection::{
    Field, FieldValue, optional_text, set_flag, set_tags, set_text, text_or_empty,
};
use crate::tags::{Tag, validate_tags};

pub const RESOURCE_TYPE: &str = "SpoofGuardSwitchingProfile";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoofGuardSwitchingProfileSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// When true, the profile overrides the system-wide SpoofGuard settings
    /// for ports it is assigned to.
    #[serde(default)]
    pub address_binding_whitelist_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpoofGuardSwitchingProfileObject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "_revision", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub white_list_providers: Vec<String>,
}

impl RemoteObject for SpoofGuardSwitchingProfileObject {
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

const FIELDS: &[Field<SpoofGuardSwitchingProfileObject, SpoofGuardSwitchingProfileSpec>] = &[
    Field {
        name: "display_name",
        remote: |o| FieldValue::Text(o.display_name.clone()),
        desired: |s| optional_text(&s.display_name),
        set: |s, v| set_text(&mut s.display_name, v),
    },
    Field {
        name: "description",
        remote: |o| FieldValue::Text(o.description.clone()),
        desired: |s| text_or_empty(&s.description),
        set: |s, v| set_text(&mut s.description, v),
    },
    Field {
        name: "tags",
        remote: |o| FieldValue::Tags(o.tags.clone()),
        desired: |s| FieldValue::Tags(s.tags.clone()),
        set: |s, v| set_tags(&mut s.tags, v),
    },
    Field {
        name: "address_binding_whitelist_enabled",
        remote: |o| FieldValue::Flag(decode_sentinel_flag(&o.white_list_providers, LPORT_BINDINGS)),
        desired: |s| FieldValue::Flag(s.address_binding_whitelist_enabled),
        set: |s, v| set_flag(&mut s.address_binding_whitelist_enabled, v),
    },
];

pub struct SpoofGuardSwitchingProfile;

impl Resource for SpoofGuardSwitchingProfile {
    const KIND: &'static str = "SpoofGuardSwitchingProfile";
    type Spec = SpoofGuardSwitchingProfileSpec;
    type Object = SpoofGuardSwitchingProfileObject;

    fn fields() -> &'static [Field<Self::Object, Self::Spec>] {
        FIELDS
    }

    fn display_name(spec: &Self::Spec) -> Option<&str> {
        spec.display_name.as_deref()
    }

    // All switching profile types live under one collection.
    fn check(object: &Self::Object) -> Result<(), String> {
        if object.resource_type.is_empty() || object.resource_type == RESOURCE_TYPE {
            return Ok(());
        }
        Err(format!(
            "{} is a {}, not a {}",
            object.id, object.resource_type, RESOURCE_TYPE
        ))
    }
}

impl ManagedResource for SpoofGuardSwitchingProfile {
    fn validate(spec: &Self::Spec) -> Result<(), String> {
        validate_tags(&spec.tags)
    }

    fn payload(spec: &Self::Spec, revision: Option<i64>) -> Self::Object {
        SpoofGuardSwitchingProfileObject {
            id: String::new(),
            revision,
            resource_type: RESOURCE_TYPE.to_string(),
            display_name: spec.display_name.clone().unwrap_or_default(),
            description: spec.description.clone().unwrap_or_default(),
            tags: spec.tags.clone(),
            white_list_providers: encode_sentinel_flag(
                spec.address_binding_whitelist_enabled,
                LPORT_BINDINGS,
            ),
        }
    }
}
