//! Profile commands.
//!
//! # Usage
//!
//! ```bash
//! bfn profile show
//! bfn profile edit --blood-type O+ --city Kathmandu
//! bfn profile photo ./me.jpg
//! bfn profile search-donors --blood-type O+ --city Pokhara
//! ```

use std::path::PathBuf;

use blood_for_nepal_core::{BloodType, UserProfile};
use blood_for_nepal_service::ServiceConfig;
use blood_for_nepal_service::media::ImageSource;
use clap::{Args, Subcommand};
use tokio_util::sync::CancellationToken;

use super::{CliError, Credentials, print_json, sign_in};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the signed-in profile
    Show {
        #[command(flatten)]
        credentials: Credentials,
    },
    /// Change profile fields
    Edit {
        #[command(flatten)]
        credentials: Credentials,

        #[command(flatten)]
        changes: ProfileChanges,
    },
    /// Upload a new profile photo
    Photo {
        #[command(flatten)]
        credentials: Credentials,

        /// Image file (JPEG, PNG, WebP)
        path: PathBuf,
    },
    /// List ids of active users with a blood type
    SearchDonors {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long)]
        blood_type: BloodType,

        #[arg(long)]
        city: Option<String>,
    },
}

/// Profile fields to change. Omitted fields keep their value.
#[derive(Debug, Args)]
pub struct ProfileChanges {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    blood_type: Option<BloodType>,
    /// Date of birth, as shown to other users
    #[arg(long)]
    date_of_birth: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    district: Option<String>,
    #[arg(long)]
    province: Option<String>,
    #[arg(long)]
    emergency_contact: Option<String>,
    #[arg(long)]
    medical_conditions: Option<String>,
    /// Preferred language code, e.g. `en` or `ne`
    #[arg(long)]
    language: Option<String>,
}

impl ProfileChanges {
    fn apply(self, profile: &mut UserProfile) {
        let text = [
            (self.first_name, &mut profile.first_name),
            (self.last_name, &mut profile.last_name),
            (self.phone, &mut profile.phone_number),
            (self.date_of_birth, &mut profile.date_of_birth),
            (self.address, &mut profile.address),
            (self.city, &mut profile.city),
            (self.district, &mut profile.district),
            (self.province, &mut profile.province),
            (self.emergency_contact, &mut profile.emergency_contact),
            (self.medical_conditions, &mut profile.medical_conditions),
            (self.language, &mut profile.preferred_language),
        ];
        for (value, field) in text {
            if let Some(value) = value {
                *field = value;
            }
        }
        if self.blood_type.is_some() {
            profile.blood_type = self.blood_type;
        }
    }
}

pub async fn run(config: &ServiceConfig, action: ProfileAction) -> Result<(), CliError> {
    match action {
        ProfileAction::Show { credentials } => {
            let (_, _, profile) = sign_in(config, &credentials).await?;
            print_json(&profile)?;
        }
        ProfileAction::Edit {
            credentials,
            changes,
        } => {
            let (_, session, mut profile) = sign_in(config, &credentials).await?;
            changes.apply(&mut profile);
            let saved = session.update_profile(profile).await?;
            print_json(&saved)?;
        }
        ProfileAction::Photo { credentials, path } => {
            let image = ImageSource::from_path(&path).await?;
            let (_, session, _) = sign_in(config, &credentials).await?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, cancelling upload");
                    on_interrupt.cancel();
                }
            });

            let saved = session.upload_profile_photo(&image, &cancel).await?;
            print_json(&saved)?;
        }
        ProfileAction::SearchDonors {
            credentials,
            blood_type,
            city,
        } => {
            let (state, _, _) = sign_in(config, &credentials).await?;
            let ids = state.search_donor_ids(blood_type, city.as_deref()).await?;
            print_json(&ids)?;
        }
    }
    Ok(())
}
