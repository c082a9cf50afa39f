//! DHCP relay profile - the set of DHCP servers a logical router relays to.

use std::collections::BTreeSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use super::{ManagedResource, RemoteObject, Resource};
use crate::projection::{
    Field, FieldValue, optional_text, set_tags, set_text, set_text_set, text_or_empty,
};
use crate::tags::{Tag, validate_tags};

/// Desired state of a DHCP relay profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpRelayProfileSpec {
    /// Defaults to the id if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    /// DHCP relay server addresses.
    #[serde(default)]
    pub server_addresses: BTreeSet<String>,
}

/// DHCP relay profile as returned by `/dhcp/relay-profiles`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DhcpRelayProfileObject {
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
    pub server_addresses: Vec<String>,
}

impl RemoteObject for DhcpRelayProfileObject {
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

const FIELDS: &[Field<DhcpRelayProfileObject, DhcpRelayProfileSpec>] = &[
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
        name: "server_addresses",
        remote: |o| FieldValue::TextSet(o.server_addresses.iter().cloned().collect()),
        desired: |s| FieldValue::TextSet(s.server_addresses.clone()),
        set: |s, v| set_text_set(&mut s.server_addresses, v),
    },
];

/// DHCP relay profile adapter.
pub struct DhcpRelayProfile;

impl Resource for DhcpRelayProfile {
    const KIND: &'static str = "DhcpRelayProfile";
    type Spec = DhcpRelayProfileSpec;
    type Object = DhcpRelayProfileObject;

    fn fields() -> &'static [Field<Self::Object, Self::Spec>] {
        FIELDS
    }

    fn display_name(spec: &Self::Spec) -> Option<&str> {
        spec.display_name.as_deref()
    }
}

impl ManagedResource for DhcpRelayProfile {
    fn validate(spec: &Self::Spec) -> Result<(), String> {
        if spec.server_addresses.is_empty() {
            return Err("server_addresses is required".to_string());
        }
        for addr in &spec.server_addresses {
            if addr.parse::<IpAddr>().is_err() {
                return Err(format!("'{}' is not a valid IP address", addr));
            }
        }
        validate_tags(&spec.tags)
    }

    fn payload(spec: &Self::Spec, revision: Option<i64>) -> Self::Object {
        DhcpRelayProfileObject {
            id: String::new(),
            revision,
            resource_type: "DhcpRelayProfile".to_string(),
            display_name: spec.display_name.clone().unwrap_or_default(),
            description: spec.description.clone().unwrap_or_default(),
            tags: spec.tags.clone(),
            server_addresses: spec.server_addresses.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(addrs: &[&str]) -> DhcpRelayProfileSpec {
        DhcpRelayProfileSpec {
            server_addresses: addrs.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_requires_addresses() {
        assert!(DhcpRelayProfile::validate(&spec(&[])).is_err());
        assert!(DhcpRelayProfile::validate(&spec(&["10.0.0.1", "fd00::1"])).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_address() {
        let err = DhcpRelayProfile::validate(&spec(&["10.0.0.300"])).unwrap_err();
        assert!(err.contains("10.0.0.300"));
    }

    #[test]
    fn test_payload_omits_revision_on_create() {
        let body = serde_json::to_value(DhcpRelayProfile::payload(&spec(&["10.0.0.1"]), None))
            .unwrap();
        assert!(body.get("_revision").is_none());
        assert!(body.get("id").is_none());
        assert_eq!(body["server_addresses"][0], "10.0.0.1");
    }

    #[test]
    fn test_payload_carries_revision_on_update() {
        let body =
            serde_json::to_value(DhcpRelayProfile::payload(&spec(&["10.0.0.1"]), Some(4)))
                .unwrap();
        assert_eq!(body["_revision"], 4);
    }
}
