//! Clients for remote controllers.
//!
//! - nsx: NSX-T manager REST API (`/api/v1`)

pub mod nsx;

pub use nsx::{Endpoint, NsxClient, NsxConfig};
