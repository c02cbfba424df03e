//! Blood request list and detail.

use std::sync::Arc;

use tokio::sync::watch;

use blood_for_nepal_core::validation::BloodRequestDraft;
use blood_for_nepal_core::{BloodRequest, BloodRequestId, RequestStatus, UserId};

use super::{Action, ControllerError, StateStore, ViewState, ensure_owner, patch_list};
use crate::store::{RequestQuery, RequestStore};

const OWNED: &str = "blood requests";

/// Data behind the request screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestsData {
    /// Query the list was last loaded with.
    pub query: RequestQuery,
    pub requests: Vec<BloodRequest>,
    /// Request opened on the detail screen.
    pub selected: Option<BloodRequest>,
}

impl RequestsData {
    /// Fold a stored request into the list and the detail view.
    fn patch(&mut self, request: &BloodRequest) {
        if self.selected.as_ref().is_some_and(|s| s.id == request.id) {
            self.selected = Some(request.clone());
        }
        patch_list(
            &mut self.requests,
            request.clone(),
            |a, b| a.id == b.id,
            self.query.matches(request),
            |r| r.created_at,
            self.query.limit,
        );
    }
}

/// Posts, edits and lists blood requests.
pub struct RequestsController {
    requests: Arc<dyn RequestStore>,
    state: StateStore<RequestsData>,
}

impl RequestsController {
    #[must_use]
    pub fn new(requests: Arc<dyn RequestStore>) -> Self {
        Self {
            requests,
            state: StateStore::new(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState<RequestsData>> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewState<RequestsData> {
        self.state.snapshot()
    }

    /// Load the list for `query`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error.
    pub async fn load(&self, query: RequestQuery) -> Result<Vec<BloodRequest>, ControllerError> {
        self.state
            .run(async { Ok(self.requests.list(&query).await?) }, |data, requests| {
                data.query.clone_from(&query);
                data.requests.clone_from(requests);
                None
            })
            .await
    }

    /// Reload the list with the last query.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn refresh(&self) -> Result<Vec<BloodRequest>, ControllerError> {
        self.load(self.state.data().query).await
    }

    /// Open one request.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error (not found when the request was removed).
    pub async fn select(&self, id: BloodRequestId) -> Result<BloodRequest, ControllerError> {
        self.state
            .run(async { Ok(self.requests.get(id).await?) }, |data, request| {
                data.selected = Some(request.clone());
                None
            })
            .await
    }

    /// Validate and post a new request on behalf of `requested_by`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// draft's validation error, or the store's error.
    pub async fn create(
        &self,
        draft: BloodRequestDraft,
        requested_by: UserId,
    ) -> Result<BloodRequest, ControllerError> {
        self.state
            .run(
                async {
                    let request = draft.validate(requested_by)?;
                    Ok(self.requests.create(request).await?)
                },
                |data, request| {
                    data.patch(request);
                    Some("Blood request posted successfully".to_owned())
                },
            )
            .await
    }

    /// Save an edited request. Only the user who posted it may edit it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// missing required fields, `ServiceError::NotOwner` when `actor` did not
    /// post the request, or the store's error (a conflict when `request` is
    /// stale).
    pub async fn update(
        &self,
        request: BloodRequest,
        actor: UserId,
    ) -> Result<BloodRequest, ControllerError> {
        self.state
            .run(
                async {
                    request.validate()?;
                    let stored = self.requests.get(request.id).await?;
                    ensure_owner(stored.requested_by, actor, OWNED)?;
                    Ok(self.requests.update(&request).await?)
                },
                |data, saved| {
                    data.patch(saved);
                    Some("Blood request updated".to_owned())
                },
            )
            .await
    }

    /// Mark a request fulfilled, cancelled or active again on behalf of the
    /// user who posted it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading,
    /// `ServiceError::NotOwner` when `actor` did not post the request, or the
    /// store's error.
    pub async fn set_status(
        &self,
        id: BloodRequestId,
        status: RequestStatus,
        actor: UserId,
    ) -> Result<BloodRequest, ControllerError> {
        self.state
            .run(
                async {
                    let stored = self.requests.get(id).await?;
                    ensure_owner(stored.requested_by, actor, OWNED)?;
                    Ok(self.requests.set_status(id, status).await?)
                },
                |data, saved| {
                    data.patch(saved);
                    Some(match status {
                        RequestStatus::Active => "Request reopened".to_owned(),
                        RequestStatus::Fulfilled => "Request marked as fulfilled".to_owned(),
                        RequestStatus::Cancelled => "Request cancelled".to_owned(),
                    })
                },
            )
            .await
    }

    pub fn clear_error(&self) {
        let _ = self.state.dispatch(Action::ClearError);
    }

    pub fn clear_message(&self) {
        let _ = self.state.dispatch(Action::ClearMessage);
    }
}
