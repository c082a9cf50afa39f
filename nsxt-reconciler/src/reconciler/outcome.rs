//! Tagged results of reconciler operations.

use std::fmt;

use crate::error::{ReconcileError, Result};

/// Result of resolving an object by id or display name.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    /// More than one object carries the requested display name.
    AmbiguousName { name: String, count: usize },
}

impl<T> Lookup<T> {
    /// Treat anything but a single match as an error, as data sources do.
    pub fn into_result(self, kind: &'static str, target: &str) -> Result<T> {
        match self {
            Lookup::Found(object) => Ok(object),
            Lookup::NotFound => Err(ReconcileError::NotFound {
                kind,
                id: target.to_string(),
            }),
            Lookup::AmbiguousName { name, count } => {
                Err(ReconcileError::AmbiguousName { kind, name, count })
            }
        }
    }
}

/// Result of re-reading a known object.
#[derive(Debug, Clone, PartialEq)]
pub enum Refresh<T> {
    Present(T),
    /// The object no longer exists; local identity is void.
    Deleted,
}

/// What a reconcile pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Created,
    /// The recorded object was gone and a new one was created.
    Recreated,
    Updated { changed: Vec<&'static str> },
    Unchanged,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Created => f.write_str("created"),
            Outcome::Recreated => f.write_str("recreated"),
            Outcome::Updated { changed } => write!(f, "updated ({})", changed.join(", ")),
            Outcome::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// What a reconcile pass would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Create,
    Recreate,
    Update { changed: Vec<&'static str> },
    NoOp,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Create => f.write_str("create"),
            Plan::Recreate => f.write_str("recreate (remote object is gone)"),
            Plan::Update { changed } => write!(f, "update ({})", changed.join(", ")),
            Plan::NoOp => f.write_str("no changes"),
        }
    }
}
