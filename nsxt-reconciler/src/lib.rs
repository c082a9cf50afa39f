//! Reconciliation of declared NSX-T objects against an NSX manager.
//!
//! Each resource adapter is a thin [`Resource`] description (typed spec,
//! remote object, projection table). The generic [`Reconciler`] drives the
//! create/read/update/delete lifecycle through a [`RemoteApi`] capability
//! handed in by the caller.

pub mod clients;
pub mod error;
pub mod flags;
pub mod locks;
pub mod projection;
pub mod reconciler;
pub mod remote;
pub mod resources;
pub mod state;
pub mod tags;
pub mod test_util;

pub use clients::{NsxClient, NsxConfig};
pub use error::{Operation, ReconcileError, Result, TransportError};
pub use locks::IdLocks;
pub use reconciler::{Lookup, Outcome, Plan, Reconciler, Refresh};
pub use remote::{ApiResponse, RemoteApi};
pub use reqwest::StatusCode;
pub use resources::{ManagedResource, RemoteObject, Resource};
pub use state::ResourceState;
pub use tags::Tag;
