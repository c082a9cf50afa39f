//! Capability interface to the remote controller.
//!
//! The reconciler never talks HTTP itself. It is handed something that
//! implements [`RemoteApi`] for the object type it manages: the NSX REST
//! client in production, [`crate::test_util::MemoryRemote`] in tests.

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::TransportError;

/// Status code plus optional body of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub body: Option<T>,
    /// Error message reported by the remote on failure statuses.
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: StatusCode, body: T) -> Self {
        Self {
            status,
            body: Some(body),
            message: None,
        }
    }

    pub fn ok(body: T) -> Self {
        Self::new(StatusCode::OK, body)
    }

    pub fn created(body: T) -> Self {
        Self::new(StatusCode::CREATED, body)
    }

    /// Response without a body, as returned for errors and deletes.
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }
}

/// Remote object accessor for one object type.
///
/// Every method returns the status the remote answered with; interpreting
/// it is the reconciler's job. `Err` is reserved for calls that produced no
/// response at all.
#[async_trait]
pub trait RemoteApi<O>: Send + Sync
where
    O: Send + Sync + 'static,
{
    /// Create an object. The remote assigns `id` and the initial revision.
    async fn create(&self, payload: &O) -> Result<ApiResponse<O>, TransportError>;

    /// Read one object. 404 means it does not exist.
    async fn read(&self, id: &str) -> Result<ApiResponse<O>, TransportError>;

    /// List every object of this type.
    async fn list(&self) -> Result<ApiResponse<Vec<O>>, TransportError>;

    /// Replace an object. The payload must carry the current revision.
    async fn update(&self, id: &str, payload: &O) -> Result<ApiResponse<O>, TransportError>;

    /// Delete an object. 404 means it was already gone.
    async fn delete(&self, id: &str) -> Result<ApiResponse<()>, TransportError>;
}

#[async_trait]
impl<O, T> RemoteApi<O> for std::sync::Arc<T>
where
    O: Send + Sync + 'static,
    T: RemoteApi<O> + ?Sized,
{
    async fn create(&self, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        (**self).create(payload).await
    }

    async fn read(&self, id: &str) -> Result<ApiResponse<O>, TransportError> {
        (**self).read(id).await
    }

    async fn list(&self) -> Result<ApiResponse<Vec<O>>, TransportError> {
        (**self).list().await
    }

    async fn update(&self, id: &str, payload: &O) -> Result<ApiResponse<O>, TransportError> {
        (**self).update(id, payload).await
    }

    async fn delete(&self, id: &str) -> Result<ApiResponse<()>, TransportError> {
        (**self).delete(id).await
    }
}
