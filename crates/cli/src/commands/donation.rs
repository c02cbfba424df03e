//! Donation history commands.
//!
//! # Usage
//!
//! ```bash
//! bfn donation record --recipient <USER_ID> --units 1 --date 2026-03-02 --hospital "Bir Hospital"
//! bfn donation history
//! bfn donation stats
//! ```

use blood_for_nepal_core::{BloodType, DonationStatus, NewDonationRecord, UserId};
use blood_for_nepal_service::ServiceConfig;
use clap::Subcommand;

use super::{CliError, Credentials, print_json, sign_in};

#[derive(Subcommand)]
pub enum DonationAction {
    /// Record a donation by the signed-in user
    Record {
        #[command(flatten)]
        credentials: Credentials,

        /// User id of the recipient
        #[arg(long)]
        recipient: UserId,

        /// Defaults to the profile's blood type
        #[arg(long)]
        blood_type: Option<BloodType>,

        #[arg(long, default_value_t = 1)]
        units: i32,

        /// Donation date, as shown in the history
        #[arg(long)]
        date: String,

        #[arg(long)]
        hospital: String,

        #[arg(long, default_value = "")]
        notes: String,

        #[arg(long, default_value_t = DonationStatus::Completed)]
        status: DonationStatus,
    },
    /// List the signed-in user's donations, newest first
    History {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Totals over the signed-in user's completed donations
    Stats {
        #[command(flatten)]
        credentials: Credentials,
    },
}

pub async fn run(config: &ServiceConfig, action: DonationAction) -> Result<(), CliError> {
    match action {
        DonationAction::Record {
            credentials,
            recipient,
            blood_type,
            units,
            date,
            hospital,
            notes,
            status,
        } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let blood_type = blood_type.or(profile.blood_type).ok_or_else(|| {
                CliError::Rejected("Set --blood-type or add one to your profile".to_owned())
            })?;

            let record = NewDonationRecord {
                donor_id: profile.id,
                recipient_id: recipient,
                blood_type,
                units,
                donation_date: date,
                hospital,
                notes,
                status,
            };
            let stored = state.donations().record(record).await?;
            print_json(&stored)?;
        }
        DonationAction::History { credentials } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let history = state.donations().load_history(profile.id).await?;
            print_json(&history)?;
        }
        DonationAction::Stats { credentials } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let stats = state.donations().load_stats(profile.id).await?;
            print_json(&stats)?;
        }
    }
    Ok(())
}
