//! Desired-state manifest.
//!
//! ```json
//! {
//!   "resources": [
//!     {"name": "relay", "kind": "dhcp_relay_profile", "server_addresses": ["10.0.0.1"]}
//!   ],
//!   "data": [
//!     {"name": "web", "kind": "ns_group", "display_name": "web-servers"}
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use nsxt_reconciler::resources::{
    DhcpRelayProfile, DhcpRelayProfileSpec, NsGroup, SpoofGuardSwitchingProfile,
    SpoofGuardSwitchingProfileSpec,
};
use nsxt_reconciler::Resource;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
    #[serde(default)]
    pub data: Vec<DataEntry>,
}

/// Managed object, keyed by a name local to the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(flatten)]
    pub spec: ResourceSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResourceSpec {
    DhcpRelayProfile(DhcpRelayProfileSpec),
    SpoofguardSwitchingProfile(SpoofGuardSwitchingProfileSpec),
}

impl ResourceSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            ResourceSpec::DhcpRelayProfile(_) => DhcpRelayProfile::KIND,
            ResourceSpec::SpoofguardSwitchingProfile(_) => SpoofGuardSwitchingProfile::KIND,
        }
    }
}

/// Existing object looked up by id or display name, never modified.
#[derive(Debug, Clone, Deserialize)]
pub struct DataEntry {
    pub name: String,
    #[serde(flatten)]
    pub source: DataSource,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSource {
    NsGroup {
        #[serde(default)]
        id: Option<String>,
        #[serde(default)]
        display_name: Option<String>,
    },
}

impl DataSource {
    pub fn kind(&self) -> &'static str {
        match self {
            DataSource::NsGroup { .. } => NsGroup::KIND,
        }
    }
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse manifest {}", path.display()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Entry names must be unique across resources and data.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let names = self
            .resources
            .iter()
            .map(|r| r.name.as_str())
            .chain(self.data.iter().map(|d| d.name.as_str()));
        for name in names {
            if name.is_empty() {
                bail!("Manifest entry with empty name");
            }
            if !seen.insert(name) {
                bail!("Duplicate manifest entry '{}'", name);
            }
        }
        for entry in &self.data {
            let DataSource::NsGroup { id, display_name } = &entry.source;
            if id.is_none() && display_name.is_none() {
                bail!("Data entry '{}' needs an id or a display_name", entry.name);
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.iter().any(|r| r.name == name) || self.data.iter().any(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "resources": [
            {
                "name": "relay",
                "kind": "dhcp_relay_profile",
                "display_name": "relay",
                "server_addresses": ["10.0.0.1", "10.0.0.2"],
                "tags": [{"scope": "env", "tag": "lab"}]
            },
            {
                "name": "strict",
                "kind": "spoofguard_switching_profile",
                "address_binding_whitelist_enabled": true
            }
        ],
        "data": [
            {"name": "web", "kind": "ns_group", "display_name": "web-servers"}
        ]
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest: Manifest = serde_json::from_str(MANIFEST).unwrap();
        manifest.validate().unwrap();

        assert_eq!(manifest.resources.len(), 2);
        match &manifest.resources[0].spec {
            ResourceSpec::DhcpRelayProfile(spec) => {
                assert_eq!(spec.server_addresses.len(), 2);
                assert_eq!(spec.tags[0].scope, "env");
            }
            other => panic!("unexpected spec {:?}", other),
        }
        match &manifest.resources[1].spec {
            ResourceSpec::SpoofguardSwitchingProfile(spec) => {
                assert!(spec.address_binding_whitelist_enabled);
                assert_eq!(spec.display_name, None);
            }
            other => panic!("unexpected spec {:?}", other),
        }
        assert_eq!(manifest.resources[1].spec.kind(), "SpoofGuardSwitchingProfile");
        assert_eq!(
            manifest.data[0].source,
            DataSource::NsGroup {
                id: None,
                display_name: Some("web-servers".to_string())
            }
        );
        assert!(manifest.contains("web"));
        assert!(!manifest.contains("db"));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = serde_json::from_str::<Manifest>(
            r#"{"resources": [{"name": "x", "kind": "logical_switch"}]}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let manifest: Manifest = serde_json::from_str(
            r#"{
                "resources": [{"name": "x", "kind": "dhcp_relay_profile", "server_addresses": ["10.0.0.1"]}],
                "data": [{"name": "x", "kind": "ns_group", "id": "g1"}]
            }"#,
        )
        .unwrap();
        let err = manifest.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate manifest entry 'x'"));
    }

    #[test]
    fn test_data_entry_needs_identity() {
        let manifest: Manifest =
            serde_json::from_str(r#"{"data": [{"name": "web", "kind": "ns_group"}]}"#).unwrap();
        assert!(manifest.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nsxt.json");
        std::fs::write(&path, MANIFEST).unwrap();
        let manifest = Manifest::load(&path).unwrap();
        assert_eq!(manifest.data.len(), 1);

        let err = Manifest::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read manifest"));
    }
}
