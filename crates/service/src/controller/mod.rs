//! View-state controllers.
//!
//! Each controller owns one [`StateStore`] holding a [`ViewState`]: the
//! screen's data plus `loading`, `error` and `message`. State is published
//! through a `tokio::sync::watch` channel and changes only through
//! [`StateStore::dispatch`].
//!
//! Every public controller operation runs inside one loading window:
//! `Begin` (rejected with [`ControllerError::Busy`] while another operation
//! is loading), the operation itself, then `Succeed` or `Fail`. A call whose
//! future is dropped before it finishes ends with `Fail("Operation cancelled")`.

mod donations;
mod donors;
mod requests;
mod session;

pub use donations::{DonationsController, DonationsData};
pub use donors::{DonorsController, DonorsData};
pub use requests::{RequestsController, RequestsData};
pub use session::{SessionController, SessionData};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::watch;

use blood_for_nepal_core::UserId;

use crate::error::ServiceError;
use crate::store::newest_first;

/// Errors returned by controller operations.
///
/// The same failure is also recorded in the controller's state as a
/// user-facing message.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Another operation on this controller is still loading.
    #[error("another operation is in progress")]
    Busy,

    /// The operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Observable state of one screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// State transitions.
#[derive(Debug, Clone)]
pub enum Action<T> {
    /// Start an operation: set `loading`, clear `error`.
    Begin,
    /// Finish an operation: replace `data`, clear `loading`, set `message`.
    Succeed { data: T, message: Option<String> },
    /// Finish an operation with a user-facing error.
    Fail(String),
    ClearError,
    ClearMessage,
    /// Back to the initial state.
    Reset,
}

/// Holds a controller's [`ViewState`] and publishes every change.
#[derive(Debug)]
pub struct StateStore<T> {
    tx: watch::Sender<ViewState<T>>,
}

impl<T: Clone + Default> Default for StateStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Default> StateStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(ViewState::default()),
        }
    }

    /// Receive every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState<T>> {
        self.tx.subscribe()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> ViewState<T> {
        self.tx.borrow().clone()
    }

    /// A copy of the current data.
    #[must_use]
    pub fn data(&self) -> T {
        self.tx.borrow().data.clone()
    }

    /// Apply `action`. Observers are notified only if the state changed.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` for `Begin` while already loading; the
    /// state is left untouched.
    pub fn dispatch(&self, action: Action<T>) -> Result<(), ControllerError> {
        let mut busy = false;
        self.tx.send_if_modified(|state| match action {
            Action::Begin => {
                if state.loading {
                    busy = true;
                    return false;
                }
                state.loading = true;
                state.error = None;
                true
            }
            Action::Succeed { data, message } => {
                state.data = data;
                state.loading = false;
                state.message = message;
                true
            }
            Action::Fail(error) => {
                state.loading = false;
                state.error = Some(error);
                true
            }
            Action::ClearError => state.error.take().is_some(),
            Action::ClearMessage => state.message.take().is_some(),
            Action::Reset => {
                *state = ViewState::default();
                true
            }
        });

        if busy {
            return Err(ControllerError::Busy);
        }
        Ok(())
    }

    /// Run `operation` in a loading window.
    ///
    /// On success `apply` patches a copy of the current data with the result
    /// and returns the message to show; on failure the error's user message
    /// is recorded and the error reported.
    pub(crate) async fn run<R>(
        &self,
        operation: impl Future<Output = Result<R, ServiceError>>,
        apply: impl FnOnce(&mut T, &R) -> Option<String>,
    ) -> Result<R, ControllerError> {
        self.dispatch(Action::Begin)?;
        let window = LoadingWindow::open(self);
        let result = operation.await;
        window.close();

        match result {
            Ok(value) => {
                let mut data = self.data();
                let message = apply(&mut data, &value);
                self.dispatch(Action::Succeed { data, message })?;
                Ok(value)
            }
            Err(err) => {
                err.report();
                self.dispatch(Action::Fail(err.user_message()))?;
                Err(ControllerError::Service(err))
            }
        }
    }
}

/// Ends a loading window with `Fail` if the operation is dropped before it
/// completes, so the controller does not stay busy.
struct LoadingWindow<'a, T: Clone + Default> {
    store: &'a StateStore<T>,
    open: bool,
}

impl<'a, T: Clone + Default> LoadingWindow<'a, T> {
    const fn open(store: &'a StateStore<T>) -> Self {
        Self { store, open: true }
    }

    fn close(mut self) {
        self.open = false;
    }
}

impl<T: Clone + Default> Drop for LoadingWindow<'_, T> {
    fn drop(&mut self) {
        if self.open {
            tracing::debug!("Controller operation dropped while loading");
            let _ = self
                .store
                .dispatch(Action::Fail(ServiceError::Cancelled.user_message()));
        }
    }
}

/// Reject a change to a document owned by someone other than `actor`.
fn ensure_owner(
    owner: UserId,
    actor: UserId,
    collection: &'static str,
) -> Result<(), ServiceError> {
    if owner == actor {
        Ok(())
    } else {
        Err(ServiceError::NotOwner(collection))
    }
}

/// Put `item` into a loaded list in place of the entry it replaces.
///
/// The item is dropped from the list when `keep` is false (it no longer
/// matches the list's query). The list stays newest first and at most
/// `limit` long.
fn patch_list<T>(
    items: &mut Vec<T>,
    item: T,
    same: impl Fn(&T, &T) -> bool,
    keep: bool,
    created_at: impl Fn(&T) -> DateTime<Utc>,
    limit: u32,
) {
    items.retain(|existing| !same(existing, &item));
    if keep {
        items.push(item);
    }
    newest_first(items, created_at, limit);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_twice_is_busy() {
        let store: StateStore<u32> = StateStore::new();
        store.dispatch(Action::Begin).unwrap();
        let before = store.snapshot();
        assert!(matches!(
            store.dispatch(Action::Begin),
            Err(ControllerError::Busy)
        ));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn test_begin_clears_error() {
        let store: StateStore<u32> = StateStore::new();
        store.dispatch(Action::Begin).unwrap();
        store.dispatch(Action::Fail("boom".to_owned())).unwrap();
        assert_eq!(store.snapshot().error.as_deref(), Some("boom"));
        assert!(!store.snapshot().loading);

        store.dispatch(Action::Begin).unwrap();
        let state = store.snapshot();
        assert!(state.loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_succeed_replaces_data() {
        let store: StateStore<u32> = StateStore::new();
        store.dispatch(Action::Begin).unwrap();
        store
            .dispatch(Action::Succeed {
                data: 7,
                message: Some("done".to_owned()),
            })
            .unwrap();
        assert_eq!(
            store.snapshot(),
            ViewState {
                data: 7,
                loading: false,
                error: None,
                message: Some("done".to_owned()),
            }
        );
    }

    #[test]
    fn test_clear_error_without_error_does_not_notify() {
        let store: StateStore<u32> = StateStore::new();
        let mut rx = store.subscribe();
        rx.mark_unchanged();
        store.dispatch(Action::ClearError).unwrap();
        assert!(!rx.has_changed().unwrap());

        store.dispatch(Action::Begin).unwrap();
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_run_records_failure_message() {
        let store: StateStore<u32> = StateStore::new();
        let result = store
            .run(async { Err::<(), _>(ServiceError::NotSignedIn) }, |_, ()| None)
            .await;
        assert!(matches!(
            result,
            Err(ControllerError::Service(ServiceError::NotSignedIn))
        ));
        let state = store.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Please sign in to continue"));
    }

    #[test]
    fn test_patch_list_replaces_and_drops() {
        let now = Utc::now();
        let stamp = |n: i64| now + chrono::TimeDelta::seconds(n);
        let mut items = vec![(1, stamp(3)), (2, stamp(2)), (3, stamp(1))];

        patch_list(&mut items, (2, stamp(2)), |a, b| a.0 == b.0, false, |i| i.1, 10);
        assert_eq!(items.iter().map(|i| i.0).collect::<Vec<_>>(), vec![1, 3]);

        patch_list(&mut items, (4, stamp(5)), |a, b| a.0 == b.0, true, |i| i.1, 2);
        assert_eq!(items.iter().map(|i| i.0).collect::<Vec<_>>(), vec![4, 1]);
    }

    #[tokio::test]
    async fn test_dropped_operation_clears_loading() {
        let store: StateStore<u32> = StateStore::new();
        let never = std::future::pending::<Result<u32, ServiceError>>();
        let timed_out = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            store.run(never, |_, _| None),
        )
        .await;
        assert!(timed_out.is_err());

        let state = store.snapshot();
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("Operation cancelled"));

        let value = store
            .run(async { Ok::<_, ServiceError>(4) }, |data, value| {
                *data = *value;
                None
            })
            .await
            .unwrap();
        assert_eq!(value, 4);
        assert_eq!(store.data(), 4);
    }

    #[test]
    fn test_ensure_owner() {
        let owner = UserId::generate();
        assert!(ensure_owner(owner, owner, "donors").is_ok());
        assert!(matches!(
            ensure_owner(owner, UserId::generate(), "donors"),
            Err(ServiceError::NotOwner("donors"))
        ));
    }
}
