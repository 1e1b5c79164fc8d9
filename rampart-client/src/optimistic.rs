//! Optimistic updates with rollback.
//!
//! An [`OptimisticUpdate`] applies a local change the moment [`run`] is
//! called, then awaits the remote call. A failed remote call rolls the local
//! change back before the error callback runs. Nothing here panics or
//! returns early with an error; every outcome is reported through
//! [`OptimisticOutcome`].
//!
//! # Example
//!
//! ```ignore
//! let draft = PurchaseOrder::optimistic(input)?;
//! let id = draft.id.clone();
//!
//! let outcome = OptimisticUpdate::new(
//!     || orders.lock().unwrap().push(draft.clone()),
//!     || client.mutate(ApiRequest::post("/purchase-orders", body)),
//! )
//! .rollback(|| orders.lock().unwrap().retain(|o| o.id != id))
//! .on_error(|err| notify(err))
//! .run()
//! .await;
//! ```
//!
//! [`run`]: OptimisticUpdate::run

use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rampart_core::ProvisionalId;

/// Lifecycle of an optimistic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimisticStatus {
    /// Built but not run.
    Pending,
    /// Local change applied, remote call outstanding.
    Applied,
    /// Remote call succeeded; the local change stands.
    Confirmed,
    /// Remote call failed; the local change was undone.
    RolledBack,
}

type Callback<'a> = Box<dyn FnOnce() + Send + 'a>;
type RemoteCall<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

/// A local mutation paired with the remote call that confirms it.
pub struct OptimisticUpdate<'a, T, E> {
    id: ProvisionalId,
    status: OptimisticStatus,
    apply: Callback<'a>,
    remote: RemoteCall<'a, T, E>,
    rollback: Option<Callback<'a>>,
    on_success: Option<Box<dyn FnOnce(&T) + Send + 'a>>,
    on_error: Option<Box<dyn FnOnce(&E) + Send + 'a>>,
}

impl<'a, T, E> OptimisticUpdate<'a, T, E>
where
    T: Send + 'a,
    E: Display + Send + 'a,
{
    pub fn new<A, R, Fut>(apply: A, remote: R) -> Self
    where
        A: FnOnce() + Send + 'a,
        R: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        Self {
            id: ProvisionalId::generate(),
            status: OptimisticStatus::Pending,
            apply: Box::new(apply),
            remote: Box::new(move || remote().boxed()),
            rollback: None,
            on_success: None,
            on_error: None,
        }
    }

    /// Track the update under an existing provisional id, typically the id
    /// of the record being created.
    pub fn with_id(mut self, id: ProvisionalId) -> Self {
        self.id = id;
        self
    }

    /// Undo the local change if the remote call fails.
    pub fn rollback(mut self, rollback: impl FnOnce() + Send + 'a) -> Self {
        self.rollback = Some(Box::new(rollback));
        self
    }

    pub fn on_success(mut self, callback: impl FnOnce(&T) + Send + 'a) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    /// Called after rollback when the remote call fails.
    pub fn on_error(mut self, callback: impl FnOnce(&E) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn id(&self) -> &ProvisionalId {
        &self.id
    }

    pub fn status(&self) -> OptimisticStatus {
        self.status
    }

    /// Apply the local change now and return a [`PendingUpdate`] that
    /// resolves to the remote outcome.
    ///
    /// The apply callback has run by the time this method returns, before
    /// the returned future is first polled.
    pub fn run(self) -> PendingUpdate<'a, T, E> {
        let Self {
            id,
            apply,
            remote,
            rollback,
            on_success,
            on_error,
            ..
        } = self;

        apply();
        tracing::debug!(id = %id, "Optimistic change applied");
        let call = remote();
        let pending_id = id.clone();

        let settle = async move {
            match call.await {
                Ok(data) => {
                    tracing::info!(id = %id, "Optimistic change confirmed");
                    if let Some(on_success) = on_success {
                        on_success(&data);
                    }
                    OptimisticOutcome {
                        id,
                        status: OptimisticStatus::Confirmed,
                        result: Ok(data),
                    }
                }
                Err(err) => {
                    tracing::info!(id = %id, error = %err, "Optimistic change rolled back");
                    if let Some(rollback) = rollback {
                        rollback();
                    }
                    if let Some(on_error) = on_error {
                        on_error(&err);
                    }
                    OptimisticOutcome {
                        id,
                        status: OptimisticStatus::RolledBack,
                        result: Err(err),
                    }
                }
            }
        };

        PendingUpdate {
            id: pending_id,
            status: OptimisticStatus::Applied,
            settle: settle.boxed(),
        }
    }
}

/// An applied optimistic update awaiting its remote call.
///
/// Reports [`OptimisticStatus::Applied`] until the remote call settles, then
/// the final status. Poll it through `&mut` to keep inspecting it.
#[must_use = "the remote call does not run unless the update is awaited"]
pub struct PendingUpdate<'a, T, E> {
    id: ProvisionalId,
    status: OptimisticStatus,
    settle: BoxFuture<'a, OptimisticOutcome<T, E>>,
}

impl<T, E> PendingUpdate<'_, T, E> {
    pub fn id(&self) -> &ProvisionalId {
        &self.id
    }

    pub fn status(&self) -> OptimisticStatus {
        self.status
    }
}

impl<T, E> Future for PendingUpdate<'_, T, E> {
    type Output = OptimisticOutcome<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = std::task::ready!(this.settle.as_mut().poll(cx));
        this.status = outcome.status;
        Poll::Ready(outcome)
    }
}

/// Result envelope of an optimistic update.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticOutcome<T, E> {
    pub id: ProvisionalId,
    pub status: OptimisticStatus,
    pub result: Result<T, E>,
}

impl<T, E> OptimisticOutcome<T, E> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn data(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    pub fn error(&self) -> Option<&E> {
        self.result.as_ref().err()
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}
