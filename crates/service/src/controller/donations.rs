//! A donor's donation history and totals.

use std::sync::Arc;

use tokio::sync::watch;

use blood_for_nepal_core::{DonationRecord, DonationStatus, DonorStats, NewDonationRecord, UserId};

use super::{Action, ControllerError, StateStore, ViewState};
use crate::store::DonationStore;

/// Data behind the donation history screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DonationsData {
    /// Donor whose history is loaded.
    pub donor_id: Option<UserId>,
    /// Newest first.
    pub history: Vec<DonationRecord>,
    pub stats: DonorStats,
}

impl DonationsData {
    fn add(&mut self, record: &DonationRecord) {
        if self.donor_id != Some(record.donor_id) {
            return;
        }
        self.history.insert(0, record.clone());
        if record.status == DonationStatus::Completed {
            self.stats.total_donations += 1;
            self.stats.total_units += i64::from(record.units);
        }
    }
}

/// Records donations and shows a donor's history.
pub struct DonationsController {
    donations: Arc<dyn DonationStore>,
    state: StateStore<DonationsData>,
}

impl DonationsController {
    #[must_use]
    pub fn new(donations: Arc<dyn DonationStore>) -> Self {
        Self {
            donations,
            state: StateStore::new(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ViewState<DonationsData>> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> ViewState<DonationsData> {
        self.state.snapshot()
    }

    /// Load `donor_id`'s donations, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error.
    pub async fn load_history(
        &self,
        donor_id: UserId,
    ) -> Result<Vec<DonationRecord>, ControllerError> {
        self.state
            .run(
                async { Ok(self.donations.history(donor_id).await?) },
                |data, history| {
                    if data.donor_id != Some(donor_id) {
                        data.stats = DonorStats::default();
                    }
                    data.donor_id = Some(donor_id);
                    data.history.clone_from(history);
                    None
                },
            )
            .await
    }

    /// Load `donor_id`'s totals over completed donations.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, or the
    /// store's error.
    pub async fn load_stats(&self, donor_id: UserId) -> Result<DonorStats, ControllerError> {
        self.state
            .run(async { Ok(self.donations.stats(donor_id).await?) }, |data, stats| {
                if data.donor_id != Some(donor_id) {
                    data.history.clear();
                }
                data.donor_id = Some(donor_id);
                data.stats = *stats;
                None
            })
            .await
    }

    /// Validate and store a donation.
    ///
    /// # Errors
    ///
    /// Returns `ControllerError::Busy` while another call is loading, the
    /// record's validation error, or the store's error.
    pub async fn record(
        &self,
        record: NewDonationRecord,
    ) -> Result<DonationRecord, ControllerError> {
        self.state
            .run(
                async {
                    record.validate()?;
                    Ok(self.donations.create(record).await?)
                },
                |data, stored| {
                    data.add(stored);
                    Some("Donation recorded".to_owned())
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

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use blood_for_nepal_core::BloodType;

    use super::*;
    use crate::store::memory::MemoryBackend;

    fn donation(donor_id: UserId, units: i32, status: DonationStatus) -> NewDonationRecord {
        NewDonationRecord {
            donor_id,
            recipient_id: UserId::generate(),
            blood_type: BloodType::BPositive,
            units,
            donation_date: "2026-01-15".to_owned(),
            hospital: "Teaching Hospital".to_owned(),
            notes: String::new(),
            status,
        }
    }

    #[tokio::test]
    async fn test_record_updates_loaded_history_and_stats() {
        let donations = DonationsController::new(Arc::new(MemoryBackend::new()));
        let donor = UserId::generate();
        donations.load_history(donor).await.unwrap();
        donations.load_stats(donor).await.unwrap();

        donations
            .record(donation(donor, 1, DonationStatus::Completed))
            .await
            .unwrap();
        donations
            .record(donation(donor, 2, DonationStatus::Cancelled))
            .await
            .unwrap();

        let state = donations.snapshot();
        assert_eq!(state.data.history.len(), 2);
        assert_eq!(
            state.data.stats,
            DonorStats {
                total_donations: 1,
                total_units: 1,
            }
        );
        assert_eq!(donations.load_stats(donor).await.unwrap(), state.data.stats);
    }

    #[tokio::test]
    async fn test_other_donor_record_not_shown() {
        let donations = DonationsController::new(Arc::new(MemoryBackend::new()));
        let donor = UserId::generate();
        donations.load_history(donor).await.unwrap();

        donations
            .record(donation(UserId::generate(), 1, DonationStatus::Completed))
            .await
            .unwrap();
        assert!(donations.snapshot().data.history.is_empty());
    }

    #[tokio::test]
    async fn test_zero_units_rejected() {
        let donations = DonationsController::new(Arc::new(MemoryBackend::new()));
        let donor = UserId::generate();
        assert!(
            donations
                .record(donation(donor, 0, DonationStatus::Completed))
                .await
                .is_err()
        );
        assert_eq!(
            donations.snapshot().error.as_deref(),
            Some("Units must be a positive number")
        );
        assert!(donations.load_history(donor).await.unwrap().is_empty());
    }
}
