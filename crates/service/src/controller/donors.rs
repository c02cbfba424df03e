//! Donor directory and the user's own donor registration.

use std::sync::Arc;

use tokio::sync::watch;

use blood_for_nepal_core::validation::DonorDraft;
use blood_for_nepal_core::{Donor, DonorId, UserId};

use super::{Action, ControllerError, StateStore, ViewState, ensure_owner, patch_list};
use crate::store::{ActiveChange, DonorQuery, DonorStore};

const OWNED: &str = "donor registration";

/// Data behind the donor screens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonorsData {
    /// Query the list was last loaded with.
    pub query: DonorQuery,
    pub donors: Vec<Donor>,
    /// The signed-in user's own registration, once looked up.
    pub mine: Option<Donor>,
}

impl DonorsData {
    fn patch(&mut self, donor: &Donor) {
        if self.mine.as_ref().is_some_and(|m| m.id == donor.id) {
            self.mine = Some(donor.clone());
        }
        patch_list(
            &mut self.donors,
            donor.clone(),
            |a, b| a.id == b.id,
            self.query.matches(donor),
            |d| d.created_at,
            self.query.limit,
        );
    }
}

/// Registers donors and lists them.
pub struct DonorsController {
    donors: Arc<dyn DonorStore>,
    state: StateStore<DonorsData>,
}

impl DonorsController {
    #[must_use]
    pub fn new(donors: Arc<dyn DonorStore>) -> Self {
        Self {
            donors,
            state: StateStore::new(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState<DonorsData>> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewState<DonorsData> {
        self.state.snapshot()
    }

    /// Load the list for `query`.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error.
    pub async fn load(&self, query: DonorQuery) -> Result<Vec<Donor>, ControllerError> {
        self.state
            .run(async { Ok(self.donors.list(&query).await?) }, |data, donors| {
                data.query.clone_from(&query);
                data.donors.clone_from(donors);
                None
            })
            .await
    }

    /// Reload the list with the last query.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub async fn refresh(&self) -> Result<Vec<Donor>, ControllerError> {
        self.load(self.state.data().query).await
    }

    /// Look up `user_id`'s registration.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error.
    pub async fn load_mine(&self, user_id: UserId) -> Result<Option<Donor>, ControllerError> {
        self.state
            .run(async { Ok(self.donors.find_by_user(user_id).await?) }, |data, mine| {
                data.mine.clone_from(mine);
                None
            })
            .await
    }

    /// Validate and register `user_id` as a donor.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// draft's validation error, or a conflict when the user is already
    /// registered.
    pub async fn register(
        &self,
        draft: DonorDraft,
        user_id: UserId,
    ) -> Result<Donor, ControllerError> {
        self.state
            .run(
                async {
                    let donor = draft.validate(user_id)?;
                    Ok(self.donors.create(donor).await?)
                },
                |data, donor| {
                    data.mine = Some(donor.clone());
                    data.patch(donor);
                    Some("Registered as donor successfully".to_owned())
                },
            )
            .await
    }

    /// Save an edited registration. Only the registered user may edit it.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// missing required fields, `ServiceError::NotOwner` when the
    /// registration is not `actor`'s, or the store's error (a conflict when
    /// `donor` is stale).
    pub async fn update(&self, donor: Donor, actor: UserId) -> Result<Donor, ControllerError> {
        self.state
            .run(
                async {
                    donor.validate()?;
                    let stored = self.donors.get(donor.id).await?;
                    ensure_owner(stored.user_id, actor, OWNED)?;
                    Ok(self.donors.update(&donor).await?)
                },
                |data, saved| {
                    data.patch(saved);
                    Some("Donor details updated".to_owned())
                },
            )
            .await
    }

    /// Mark `actor`'s registration available or unavailable.
    ///
    /// Setting the value the donor already has succeeds without a message.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading,
    /// `ServiceError::NotOwner` when the registration is not `actor`'s, or
    /// the store's error.
    pub async fn set_active(
        &self,
        id: DonorId,
        active: bool,
        actor: UserId,
    ) -> Result<ActiveChange, ControllerError> {
        self.state
            .run(
                async {
                    let stored = self.donors.get(id).await?;
                    ensure_owner(stored.user_id, actor, OWNED)?;
                    Ok(self.donors.set_active(id, active).await?)
                },
                |data, change| {
                    data.patch(&change.donor);
                    match (change.changed, active) {
                        (false, _) => None,
                        (true, true) => Some("You are now available to donate".to_owned()),
                        (true, false) => Some("You are now unavailable to donate".to_owned()),
                    }
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
