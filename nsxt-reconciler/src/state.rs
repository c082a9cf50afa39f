//! Caller-owned record of one managed object.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::projection::project;
use crate::resources::{RemoteObject, Resource};

/// Desired fields plus what was last observed remotely.
///
/// The reconciler reads `id`, `revision` and `desired` from it and writes the
/// observed half back after every successful remote read or write. The
/// record itself is never cached by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState<S> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<i64>,
    pub desired: S,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed: Option<S>,
}

impl<S> ResourceState<S> {
    pub fn new(desired: S) -> Self {
        Self {
            id: None,
            revision: None,
            desired,
            observed: None,
        }
    }

    /// Attach a known remote identity, e.g. when importing an existing object.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Remote identifier, treating the empty string as absent.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Copy a remote object into the observed half.
    ///
    /// `id` is only set when empty; an existing id is never overwritten.
    pub fn observe<R>(&mut self, object: &R::Object)
    where
        R: Resource<Spec = S>,
        S: Default + 'static,
    {
        match self.id().map(str::to_string) {
            None if !object.id().is_empty() => self.id = Some(object.id().to_string()),
            Some(current) if current != object.id() => {
                warn!(
                    "{} {} returned object with id {}, keeping {}",
                    R::KIND,
                    current,
                    object.id(),
                    current
                );
            }
            _ => {}
        }
        self.revision = object.revision();

        let mut observed = S::default();
        project(R::fields(), object, &mut observed);
        self.observed = Some(observed);
    }

    /// Drop remote identity after the object is gone.
    pub fn forget(&mut self) {
        self.id = None;
        self.revision = None;
        self.observed = None;
    }
}
