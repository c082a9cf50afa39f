//! Resource adapters.
//!
//! Each adapter describes one NSX object type: the typed spec a user
//! declares, the remote object, and the projection table between them.
//! Lookup-only kinds implement [`Resource`]; kinds the provider creates and
//! mutates also implement [`ManagedResource`].

pub mod dhcp_relay_profile;
pub mod ns_group;
pub mod spoofguard_switching_profile;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::projection::Field;

pub use dhcp_relay_profile::{DhcpRelayProfile, DhcpRelayProfileObject, DhcpRelayProfileSpec};
pub use ns_group::{NsGroup, NsGroupObject, NsGroupSpec};
pub use spoofguard_switching_profile::{
    SpoofGuardSwitchingProfile, SpoofGuardSwitchingProfileObject, SpoofGuardSwitchingProfileSpec,
};

/// Identity accessors every remote object exposes.
pub trait RemoteObject {
    /// Remote-assigned identifier; empty before creation.
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    /// Optimistic concurrency token; absent on create payloads.
    fn revision(&self) -> Option<i64>;
}

/// A kind of object that can be looked up and projected.
pub trait Resource: Send + Sync + 'static {
    /// Name used in log lines and errors.
    const KIND: &'static str;

    /// Desired (and observed) fields as declared by the user.
    type Spec: Clone + Default + PartialEq + Send + Sync + 'static;

    /// Remote representation.
    type Object: RemoteObject + Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Projection table between object and spec.
    fn fields() -> &'static [Field<Self::Object, Self::Spec>];

    /// Display name used for lookups when no id is known.
    fn display_name(spec: &Self::Spec) -> Option<&str>;

    /// Reject a returned object that belongs to another kind sharing the
    /// same collection.
    fn check(_object: &Self::Object) -> Result<(), String> {
        Ok(())
    }
}

/// A kind the provider creates, updates and deletes.
pub trait ManagedResource: Resource {
    /// Reject specs the remote would refuse, before any call is made.
    fn validate(_spec: &Self::Spec) -> Result<(), String> {
        Ok(())
    }

    /// Build the request body. `revision` is `None` on create.
    fn payload(spec: &Self::Spec, revision: Option<i64>) -> Self::Object;
}
