//! Donor commands.
//!
//! # Usage
//!
//! ```bash
//! bfn donor register --name "Sita Rai" --blood-type A- --city Pokhara --phone 9811111111
//! bfn donor list --blood-type A- --city Pokhara --active
//! bfn donor deactivate
//! ```

use blood_for_nepal_core::validation::DonorDraft;
use blood_for_nepal_core::{BloodType, UserId};
use blood_for_nepal_service::ServiceConfig;
use blood_for_nepal_service::controller::DonorsController;
use blood_for_nepal_service::store::DonorQuery;
use clap::Subcommand;

use super::{CliError, Credentials, print_json, sign_in};

#[derive(Subcommand)]
pub enum DonorAction {
    /// Register the signed-in user as a donor
    Register {
        #[command(flatten)]
        credentials: Credentials,

        /// Name shown to requesters (defaults to the profile name)
        #[arg(long)]
        name: Option<String>,

        /// Defaults to the profile's blood type
        #[arg(long)]
        blood_type: Option<BloodType>,

        /// Defaults to the profile's city
        #[arg(long)]
        city: Option<String>,

        /// Defaults to the profile's phone number
        #[arg(long)]
        phone: Option<String>,

        #[arg(long, default_value = "")]
        last_donation_date: String,
    },
    /// List donors, newest first
    List {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long)]
        blood_type: Option<BloodType>,

        #[arg(long)]
        city: Option<String>,

        /// Only donors currently available
        #[arg(long)]
        active: bool,

        #[arg(long, default_value_t = DonorQuery::DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Mark the signed-in donor available
    Activate {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Mark the signed-in donor unavailable
    Deactivate {
        #[command(flatten)]
        credentials: Credentials,
    },
}

pub async fn run(config: &ServiceConfig, action: DonorAction) -> Result<(), CliError> {
    match action {
        DonorAction::Register {
            credentials,
            name,
            blood_type,
            city,
            phone,
            last_donation_date,
        } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let draft = DonorDraft {
                name: name.unwrap_or_else(|| profile.full_name()),
                blood_type: blood_type.or(profile.blood_type),
                city: city.unwrap_or(profile.city),
                phone_number: phone.unwrap_or(profile.phone_number),
                last_donation_date,
            };
            let donor = state.donors().register(draft, profile.id).await?;
            print_json(&donor)?;
        }
        DonorAction::List {
            credentials,
            blood_type,
            city,
            active,
            limit,
        } => {
            let (state, _, _) = sign_in(config, &credentials).await?;
            let query = DonorQuery {
                blood_type,
                city,
                active: active.then_some(true),
                limit,
            };
            let donors = state.donors().load(query).await?;
            print_json(&donors)?;
        }
        DonorAction::Activate { credentials } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            set_active(&state.donors(), profile.id, true).await?;
        }
        DonorAction::Deactivate { credentials } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            set_active(&state.donors(), profile.id, false).await?;
        }
    }
    Ok(())
}

async fn set_active(
    donors: &DonorsController,
    user_id: UserId,
    active: bool,
) -> Result<(), CliError> {
    let mine = donors
        .load_mine(user_id)
        .await?
        .ok_or_else(|| CliError::Rejected("You are not registered as a donor".to_owned()))?;

    let change = donors.set_active(mine.id, active, user_id).await?;
    if !change.changed {
        tracing::info!(active, "Donor availability already set");
    }
    print_json(&change.donor)
}
