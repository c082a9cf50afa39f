//! Local record of what has been applied.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use nsxt_reconciler::resources::{
    DhcpRelayProfile, DhcpRelayProfileSpec, NsGroup, NsGroupSpec, SpoofGuardSwitchingProfile,
    SpoofGuardSwitchingProfileSpec,
};
use nsxt_reconciler::{Resource, ResourceState};
use serde::{Deserialize, Serialize};

/// Recorded state of one manifest entry, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryState {
    DhcpRelayProfile(ResourceState<DhcpRelayProfileSpec>),
    SpoofguardSwitchingProfile(ResourceState<SpoofGuardSwitchingProfileSpec>),
    NsGroup(ResourceState<NsGroupSpec>),
}

impl EntryState {
    pub fn kind(&self) -> &'static str {
        match self {
            EntryState::DhcpRelayProfile(_) => DhcpRelayProfile::KIND,
            EntryState::SpoofguardSwitchingProfile(_) => SpoofGuardSwitchingProfile::KIND,
            EntryState::NsGroup(_) => NsGroup::KIND,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            EntryState::DhcpRelayProfile(s) => s.id(),
            EntryState::SpoofguardSwitchingProfile(s) => s.id(),
            EntryState::NsGroup(s) => s.id(),
        }
    }

    /// Data sources are read, never created or deleted.
    pub fn is_data(&self) -> bool {
        matches!(self, EntryState::NsGroup(_))
    }
}

/// Moves a kind's [`ResourceState`] in and out of [`EntryState`].
pub trait StateKind: Resource {
    fn into_entry(state: ResourceState<Self::Spec>) -> EntryState;

    /// Hands the entry back unchanged if it records another kind.
    fn from_entry(entry: EntryState) -> std::result::Result<ResourceState<Self::Spec>, EntryState>;
}

impl StateKind for DhcpRelayProfile {
    fn into_entry(state: ResourceState<Self::Spec>) -> EntryState {
        EntryState::DhcpRelayProfile(state)
    }

    fn from_entry(entry: EntryState) -> std::result::Result<ResourceState<Self::Spec>, EntryState> {
        match entry {
            EntryState::DhcpRelayProfile(state) => Ok(state),
            other => Err(other),
        }
    }
}

impl StateKind for SpoofGuardSwitchingProfile {
    fn into_entry(state: ResourceState<Self::Spec>) -> EntryState {
        EntryState::SpoofguardSwitchingProfile(state)
    }

    fn from_entry(entry: EntryState) -> std::result::Result<ResourceState<Self::Spec>, EntryState> {
        match entry {
            EntryState::SpoofguardSwitchingProfile(state) => Ok(state),
            other => Err(other),
        }
    }
}

impl StateKind for NsGroup {
    fn into_entry(state: ResourceState<Self::Spec>) -> EntryState {
        EntryState::NsGroup(state)
    }

    fn from_entry(entry: EntryState) -> std::result::Result<ResourceState<Self::Spec>, EntryState> {
        match entry {
            EntryState::NsGroup(state) => Ok(state),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    #[serde(flatten)]
    pub state: EntryState,
    pub updated_at: DateTime<Utc>,
}

impl StateEntry {
    pub fn new(state: EntryState) -> Self {
        Self {
            state,
            updated_at: Utc::now(),
        }
    }
}

/// State file contents: entry name to recorded state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateFile {
    pub entries: BTreeMap<String, StateEntry>,
}

impl StateFile {
    /// Load the state file. A missing file is an empty state.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read state {}", path.display()));
            }
        };
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse state {}", path.display()))
    }

    /// Write the state next to its final path, then rename over it.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write state {}", Path::new(&tmp).display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&EntryState> {
        self.entries.get(name).map(|e| &e.state)
    }

    pub fn insert(&mut self, name: impl Into<String>, state: EntryState) {
        self.entries.insert(name.into(), StateEntry::new(state));
    }

    pub fn remove(&mut self, name: &str) -> Option<EntryState> {
        self.entries.remove(name).map(|e| e.state)
    }
}
