//! Shared helpers for nsxt-reconciler integration tests.

#![allow(dead_code)]

pub mod mock_nsx;

use std::sync::Arc;

use nsxt_reconciler::Reconciler;
use nsxt_reconciler::resources::{
    DhcpRelayProfile, DhcpRelayProfileObject, DhcpRelayProfileSpec, NsGroup, NsGroupObject,
};
use nsxt_reconciler::test_util::MemoryRemote;

pub type DhcpRemote = Arc<MemoryRemote<DhcpRelayProfileObject>>;

/// DHCP relay profile reconciler over an in-memory remote that assigns
/// ids `p1`, `p2`, ...
pub fn dhcp_reconciler() -> (Reconciler<DhcpRelayProfile, DhcpRemote>, DhcpRemote) {
    let remote = Arc::new(MemoryRemote::with_id_prefix("p"));
    (Reconciler::new(Arc::clone(&remote)), remote)
}

pub fn ns_group_reconciler() -> (
    Reconciler<NsGroup, Arc<MemoryRemote<NsGroupObject>>>,
    Arc<MemoryRemote<NsGroupObject>>,
) {
    let remote = Arc::new(MemoryRemote::with_id_prefix("g"));
    (Reconciler::new(Arc::clone(&remote)), remote)
}

pub fn relay_spec(addresses: &[&str]) -> DhcpRelayProfileSpec {
    DhcpRelayProfileSpec {
        display_name: Some("relay".to_string()),
        server_addresses: addresses.iter().map(|a| a.to_string()).collect(),
        ..Default::default()
    }
}

pub fn ns_group(name: &str) -> NsGroupObject {
    NsGroupObject {
        display_name: name.to_string(),
        description: format!("{} group", name),
        ..Default::default()
    }
}
