//! Generic CRUD reconciler.
//!
//! One `Reconciler<R, C>` drives the lifecycle of objects of kind `R`
//! through the remote accessor `C`. Every operation issues its remote calls
//! in sequence and returns the raw outcome: nothing is retried, nothing is
//! cached between calls, and at most one mutating call is made per
//! invocation. Callers reconciling the same id concurrently must serialize
//! themselves (see [`crate::IdLocks`]).

mod outcome;

use std::marker::PhantomData;

use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::error::{Operation, ReconcileError, Result, TransportError};
use crate::projection::diff;
use crate::remote::{ApiResponse, RemoteApi};
use crate::resources::{ManagedResource, RemoteObject, Resource};
use crate::state::ResourceState;

pub use outcome::{Lookup, Outcome, Plan, Refresh};

/// Reconciler for objects of kind `R`.
pub struct Reconciler<R, C> {
    remote: C,
    _resource: PhantomData<fn() -> R>,
}

impl<R, C> Reconciler<R, C>
where
    R: Resource,
    C: RemoteApi<R::Object>,
{
    pub fn new(remote: C) -> Self {
        Self {
            remote,
            _resource: PhantomData,
        }
    }

    pub fn remote(&self) -> &C {
        &self.remote
    }

    /// Find an object by id, or by exact display name when no id is given.
    pub async fn resolve(
        &self,
        id: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<Lookup<R::Object>> {
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            debug!("Resolving {} {} by id", R::KIND, id);
            let resp = self
                .remote
                .read(id)
                .await
                .map_err(|e| transport::<R>(Operation::Read, id, e))?;
            if resp.is_not_found() {
                debug!("{} {} not found", R::KIND, id);
                return Ok(Lookup::NotFound);
            }
            let object = expect_body::<R, _>(Operation::Read, id, StatusCode::OK, resp)?;
            return Ok(Lookup::Found(checked::<R>(object)?));
        }

        if let Some(name) = display_name.filter(|name| !name.is_empty()) {
            debug!("Resolving {} '{}' by display name", R::KIND, name);
            let resp = self
                .remote
                .list()
                .await
                .map_err(|e| transport::<R>(Operation::List, name, e))?;
            let objects = expect_body::<R, _>(Operation::List, name, StatusCode::OK, resp)?;
            let total = objects.len();

            let mut matches = objects
                .into_iter()
                .filter(|o| o.display_name() == name && R::check(o).is_ok());
            let first = matches.next();
            let others = matches.count();
            return Ok(match first {
                None => {
                    debug!("{} '{}' not found out of {} objects", R::KIND, name, total);
                    Lookup::NotFound
                }
                Some(object) if others == 0 => Lookup::Found(object),
                Some(_) => Lookup::AmbiguousName {
                    name: name.to_string(),
                    count: others + 1,
                },
            });
        }

        Err(ReconcileError::MissingIdentity { kind: R::KIND })
    }

    /// Re-read a known object.
    pub async fn refresh(&self, id: &str) -> Result<Refresh<R::Object>> {
        let resp = self
            .remote
            .read(id)
            .await
            .map_err(|e| transport::<R>(Operation::Read, id, e))?;
        if resp.is_not_found() {
            debug!("{} {} not found", R::KIND, id);
            return Ok(Refresh::Deleted);
        }
        let object = expect_body::<R, _>(Operation::Read, id, StatusCode::OK, resp)?;
        Ok(Refresh::Present(checked::<R>(object)?))
    }

    /// Delete an object. An object that is already gone counts as deleted.
    pub async fn destroy(&self, id: &str) -> Result<()> {
        info!("Deleting {} {}", R::KIND, id);
        let resp = self
            .remote
            .delete(id)
            .await
            .map_err(|e| transport::<R>(Operation::Delete, id, e))?;
        if resp.is_not_found() {
            debug!("{} {} not found, nothing to delete", R::KIND, id);
            return Ok(());
        }
        expect_status::<R, _>(Operation::Delete, id, StatusCode::OK, resp).map(|_| ())
    }

    /// Resolve the state's id or display name and record the match.
    ///
    /// Used by data sources: not found and ambiguous names are errors.
    pub async fn lookup(&self, state: &mut ResourceState<R::Spec>) -> Result<R::Object> {
        let target = state
            .id()
            .or_else(|| R::display_name(&state.desired))
            .unwrap_or_default()
            .to_string();
        let object = self
            .resolve(state.id(), R::display_name(&state.desired))
            .await?
            .into_result(R::KIND, &target)?;
        state.observe::<R>(&object);
        Ok(object)
    }

    /// Re-read the state's object and record it, forgetting identity if it
    /// is gone.
    pub async fn refresh_state(
        &self,
        state: &mut ResourceState<R::Spec>,
    ) -> Result<Refresh<R::Object>> {
        let Some(id) = state.id().map(str::to_string) else {
            return Err(ReconcileError::MissingIdentity { kind: R::KIND });
        };
        let refreshed = self.refresh(&id).await?;
        match &refreshed {
            Refresh::Present(object) => state.observe::<R>(object),
            Refresh::Deleted => state.forget(),
        }
        Ok(refreshed)
    }
}

impl<R, C> Reconciler<R, C>
where
    R: ManagedResource,
    C: RemoteApi<R::Object>,
{
    /// Create the object when the state has no id, update it otherwise.
    ///
    /// Updates require the revision from the last refresh and send it back
    /// unmodified.
    pub async fn apply(&self, state: &ResourceState<R::Spec>) -> Result<R::Object> {
        validate::<R>(&state.desired)?;
        match state.id() {
            None => self.create(&state.desired).await,
            Some(id) => {
                let revision = state.revision.ok_or_else(|| ReconcileError::MissingRevision {
                    kind: R::KIND,
                    id: id.to_string(),
                })?;
                self.update(id, revision, &state.desired).await
            }
        }
    }

    /// Converge the remote object to the state's desired fields and record
    /// the result.
    pub async fn reconcile(&self, state: &mut ResourceState<R::Spec>) -> Result<Outcome> {
        validate::<R>(&state.desired)?;

        let Some(id) = state.id().map(str::to_string) else {
            let object = self.create(&state.desired).await?;
            state.observe::<R>(&object);
            return Ok(Outcome::Created);
        };

        match self.refresh(&id).await? {
            Refresh::Deleted => {
                warn!("{} {} no longer exists, creating it again", R::KIND, id);
                state.forget();
                let object = self.create(&state.desired).await?;
                state.observe::<R>(&object);
                Ok(Outcome::Recreated)
            }
            Refresh::Present(current) => {
                state.observe::<R>(&current);
                let changed = diff(R::fields(), &current, &state.desired);
                if changed.is_empty() {
                    debug!("{} {} is up to date", R::KIND, id);
                    return Ok(Outcome::Unchanged);
                }
                let object = self.apply(state).await?;
                state.observe::<R>(&object);
                Ok(Outcome::Updated { changed })
            }
        }
    }

    /// Report what [`Reconciler::reconcile`] would do, without mutating.
    pub async fn plan(&self, state: &ResourceState<R::Spec>) -> Result<Plan> {
        validate::<R>(&state.desired)?;
        let Some(id) = state.id() else {
            return Ok(Plan::Create);
        };
        Ok(match self.refresh(id).await? {
            Refresh::Deleted => Plan::Recreate,
            Refresh::Present(current) => {
                let changed = diff(R::fields(), &current, &state.desired);
                if changed.is_empty() {
                    Plan::NoOp
                } else {
                    Plan::Update { changed }
                }
            }
        })
    }

    /// Delete the state's object, if any, and forget its identity.
    pub async fn finalize(&self, state: &mut ResourceState<R::Spec>) -> Result<()> {
        if let Some(id) = state.id() {
            self.destroy(id).await?;
        }
        state.forget();
        Ok(())
    }

    async fn create(&self, spec: &R::Spec) -> Result<R::Object> {
        let target = R::display_name(spec).unwrap_or("<unnamed>");
        info!("Creating {} {}", R::KIND, target);

        let payload = R::payload(spec, None);
        let resp = self
            .remote
            .create(&payload)
            .await
            .map_err(|e| transport::<R>(Operation::Create, target, e))?;
        let object = expect_body::<R, _>(Operation::Create, target, StatusCode::CREATED, resp)?;
        let object = checked::<R>(object)?;
        if object.id().is_empty() {
            return Err(ReconcileError::ContractViolation {
                kind: R::KIND,
                op: Operation::Create,
                target: target.to_string(),
                status: StatusCode::CREATED,
            });
        }

        info!("Created {} {} ({})", R::KIND, target, object.id());
        Ok(object)
    }

    async fn update(&self, id: &str, revision: i64, spec: &R::Spec) -> Result<R::Object> {
        info!("Updating {} {} at revision {}", R::KIND, id, revision);

        let payload = R::payload(spec, Some(revision));
        let resp = self
            .remote
            .update(id, &payload)
            .await
            .map_err(|e| transport::<R>(Operation::Update, id, e))?;
        match resp.status {
            StatusCode::NOT_FOUND => {
                warn!("{} {} disappeared before update", R::KIND, id);
                Err(ReconcileError::Vanished {
                    kind: R::KIND,
                    id: id.to_string(),
                })
            }
            StatusCode::PRECONDITION_FAILED => Err(ReconcileError::StaleRevision {
                kind: R::KIND,
                id: id.to_string(),
                revision,
            }),
            _ => {
                let object = expect_body::<R, _>(Operation::Update, id, StatusCode::OK, resp)?;
                checked::<R>(object)
            }
        }
    }
}

fn validate<R: ManagedResource>(spec: &R::Spec) -> Result<()> {
    R::validate(spec).map_err(|reason| ReconcileError::Invalid {
        kind: R::KIND,
        reason,
    })
}

fn checked<R: Resource>(object: R::Object) -> Result<R::Object> {
    R::check(&object).map_err(|reason| ReconcileError::Invalid {
        kind: R::KIND,
        reason,
    })?;
    Ok(object)
}

fn transport<R: Resource>(op: Operation, target: &str, source: TransportError) -> ReconcileError {
    ReconcileError::Transport {
        kind: R::KIND,
        op,
        target: target.to_string(),
        source,
    }
}

/// Accept only the exact status the operation is documented to return.
fn expect_status<R: Resource, T>(
    op: Operation,
    target: &str,
    expected: StatusCode,
    resp: ApiResponse<T>,
) -> Result<Option<T>> {
    if resp.status == expected {
        return Ok(resp.body);
    }
    if resp.status.is_success() {
        return Err(ReconcileError::ContractViolation {
            kind: R::KIND,
            op,
            target: target.to_string(),
            status: resp.status,
        });
    }
    Err(ReconcileError::Rejected {
        kind: R::KIND,
        op,
        target: target.to_string(),
        status: resp.status,
        message: resp.message,
    })
}

fn expect_body<R: Resource, T>(
    op: Operation,
    target: &str,
    expected: StatusCode,
    resp: ApiResponse<T>,
) -> Result<T> {
    expect_status::<R, T>(op, target, expected, resp)?.ok_or_else(|| {
        ReconcileError::ContractViolation {
            kind: R::KIND,
            op,
            target: target.to_string(),
            status: expected,
        }
    })
}
