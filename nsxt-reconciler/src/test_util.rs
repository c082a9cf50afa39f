//! In-memory stand-in for the NSX manager.
//!
//! Behaves like the manager for one object type: assigns ids and revision 0
//! on create, bumps the revision on update, answers 412 for stale revisions
//! and 404 for unknown ids. Faults can be queued per operation to simulate
//! unexpected statuses and transport failures.

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{Operation, TransportError};
use crate::remote::{ApiResponse, RemoteApi};
use crate::resources::RemoteObject;

/// Injected behaviour for the next call of an operation.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Answer with this status. A success status still performs the
    /// operation, only the reported status changes.
    Status(StatusCode),
    /// Fail without a response.
    Transport(String),
}

struct Inner<O> {
    objects: BTreeMap<String, O>,
    next_id: u64,
    faults: HashMap<Operation, VecDeque<Fault>>,
    calls: HashMap<Operation, usize>,
}

pub struct MemoryRemote<O> {
    id_prefix: Option<String>,
    inner: Mutex<Inner<O>>,
}

impl<O> Default for MemoryRemote<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> MemoryRemote<O> {
    /// Remote assigning random UUIDs as ids.
    pub fn new() -> Self {
        Self {
            id_prefix: None,
            inner: Mutex::new(Inner {
                objects: BTreeMap::new(),
                next_id: 1,
                faults: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// Remote assigning sequential ids `<prefix>1`, `<prefix>2`, ...
    pub fn with_id_prefix(prefix: impl Into<String>) -> Self {
        Self {
            id_prefix: Some(prefix.into()),
            ..Self::new()
        }
    }

    /// Queue a fault for the next call of `op`.
    pub async fn fail_next(&self, op: Operation, fault: Fault) {
        let mut inner = self.inner.lock().await;
        inner.faults.entry(op).or_default().push_back(fault);
    }

    /// Number of calls made for `op`.
    pub async fn calls(&self, op: Operation) -> usize {
        let inner = self.inner.lock().await;
        inner.calls.get(&op).copied().unwrap_or(0)
    }

    /// Number of create, update and delete calls made.
    pub async fn mutating_calls(&self) -> usize {
        let inner = self.inner.lock().await;
        [Operation::Create, Operation::Update, Operation::Delete]
            .iter()
            .map(|op| inner.calls.get(op).copied().unwrap_or(0))
            .sum()
    }

    /// Delete an object behind the reconciler's back.
    pub async fn remove(&self, id: &str) -> Option<O> {
        self.inner.lock().await.objects.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<O> MemoryRemote<O>
where
    O: RemoteObject + Clone + Serialize + DeserializeOwned,
{
    /// Store an object directly, as if created out of band. Returns its id.
    pub async fn insert(&self, object: O) -> String {
        let mut inner = self.inner.lock().await;
        let id = if object.id().is_empty() {
            self.allocate_id(&mut inner)
        } else {
            object.id().to_string()
        };
        let revision = object.revision().unwrap_or(0);
        let object = stamp(&object, &id, revision).unwrap_or(object);
        inner.objects.insert(id.clone(), object);
        id
    }

    pub async fn get(&self, id: &str) -> Option<O> {
        self.inner.lock().await.objects.get(id).cloned()
    }

    fn allocate_id(&self, inner: &mut Inner<O>) -> String {
        let id = match &self.id_prefix {
            Some(prefix) => format!("{}{}", prefix, inner.next_id),
            None => uuid::Uuid::new_v4().to_string(),
        };
        inner.next_id += 1;
        id
    }

    /// Count the call and pop its fault, if any.
    fn begin(inner: &mut Inner<O>, op: Operation) -> Option<Fault> {
        *inner.calls.entry(op).or_default() += 1;
        inner.faults.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

/// Response for faults that answer without touching stored objects.
fn preempt<T>(fault: &Option<Fault>) -> Option<Result<ApiResponse<T>, TransportError>> {
    match fault {
        Some(Fault::Transport(msg)) => Some(Err(TransportError::Unavailable(msg.clone()))),
        Some(Fault::Status(status)) if !status.is_success() => {
            Some(Ok(ApiResponse::status(*status).with_message("injected failure")))
        }
        _ => None,
    }
}

/// Report an injected success status instead of the real one.
fn override_status<T>(fault: Option<Fault>, mut resp: ApiResponse<T>) -> ApiResponse<T> {
    if let Some(Fault::Status(status)) = fault {
        resp.status = status;
    }
    resp
}

/// Copy of `object` carrying the given id and revision.
fn stamp<O: Serialize + DeserializeOwned>(
    object: &O,
    id: &str,
    revision: i64,
) -> Result<O, TransportError> {
    let mut value = serde_json::to_value(object)
        .map_err(|e| TransportError::Unavailable(e.to_string()))?;
    if let Value::Object(map) = &mut value {
        map.insert("id".to_string(), Value::from(id));
        map.insert("_revision".to_string(), Value::from(revision));
    }
    serde_json::from_value(value).map_err(|e| TransportError::Unavailable(e.to_string()))
}

#[async_trait]
impl<O> RemoteApi<O> for MemoryRemote<O>
where
    O: RemoteObject + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn create(&self, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        let mut inner = self.inner.lock().await;
        let fault = Self::begin(&mut inner, Operation::Create);
        if let Some(resp) = preempt(&fault) {
            return resp;
        }

        let id = self.allocate_id(&mut inner);
        let object = stamp(payload, &id, 0)?;
        inner.objects.insert(id, object.clone());
        Ok(override_status(fault, ApiResponse::created(object)))
    }

    async fn read(&self, id: &str) -> Result<ApiResponse<O>, TransportError> {
        let mut inner = self.inner.lock().await;
        let fault = Self::begin(&mut inner, Operation::Read);
        if let Some(resp) = preempt(&fault) {
            return resp;
        }

        let resp = match inner.objects.get(id) {
            Some(object) => ApiResponse::ok(object.clone()),
            None => ApiResponse::status(StatusCode::NOT_FOUND),
        };
        Ok(override_status(fault, resp))
    }

    async fn list(&self) -> Result<ApiResponse<Vec<O>>, TransportError> {
        let mut inner = self.inner.lock().await;
        let fault = Self::begin(&mut inner, Operation::List);
        if let Some(resp) = preempt(&fault) {
            return resp;
        }

        let objects = inner.objects.values().cloned().collect();
        Ok(override_status(fault, ApiResponse::ok(objects)))
    }

    async fn update(&self, id: &str, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        let mut inner = self.inner.lock().await;
        let fault = Self::begin(&mut inner, Operation::Update);
        if let Some(resp) = preempt(&fault) {
            return resp;
        }

        let Some(current) = inner.objects.get(id) else {
            return Ok(ApiResponse::status(StatusCode::NOT_FOUND));
        };
        let current_revision = current.revision().unwrap_or(0);
        if payload.revision() != Some(current_revision) {
            return Ok(
                ApiResponse::status(StatusCode::PRECONDITION_FAILED).with_message(format!(
                    "Object was modified by somebody else, current revision is {}",
                    current_revision
                )),
            );
        }

        let object = stamp(payload, id, current_revision + 1)?;
        inner.objects.insert(id.to_string(), object.clone());
        Ok(override_status(fault, ApiResponse::ok(object)))
    }

    async fn delete(&self, id: &str) -> Result<ApiResponse<()>, TransportError> {
        let mut inner = self.inner.lock().await;
        let fault = Self::begin(&mut inner, Operation::Delete);
        if let Some(resp) = preempt(&fault) {
            return resp;
        }

        let status = match inner.objects.remove(id) {
            Some(_) => StatusCode::OK,
            None => StatusCode::NOT_FOUND,
        };
        Ok(override_status(fault, ApiResponse::status(status)))
    }
}
