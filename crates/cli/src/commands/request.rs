//! Blood request commands.
//!
//! # Usage
//!
//! ```bash
//! bfn request create --patient "Hari" --blood-type O+ --units 2 \
//!     --urgency high --hospital "Bir Hospital" --phone 9800000000 --city Kathmandu
//! bfn request list --blood-type O+ --city Kathmandu
//! bfn request list --mine --status fulfilled
//! bfn request edit <ID> --units 3
//! bfn request status <ID> fulfilled
//! ```

use blood_for_nepal_core::validation::BloodRequestDraft;
use blood_for_nepal_core::{BloodRequestId, BloodType, RequestStatus, Urgency};
use blood_for_nepal_service::ServiceConfig;
use blood_for_nepal_service::store::RequestQuery;
use clap::{Args, Subcommand};

use super::{CliError, Credentials, print_json, sign_in};

#[derive(Subcommand)]
pub enum RequestAction {
    /// Post a blood request
    Create {
        #[command(flatten)]
        credentials: Credentials,

        #[command(flatten)]
        form: RequestForm,
    },
    /// List requests, newest first
    List {
        #[command(flatten)]
        credentials: Credentials,

        #[arg(long)]
        blood_type: Option<BloodType>,

        #[arg(long)]
        city: Option<String>,

        /// Only requests posted by the signed-in user
        #[arg(long)]
        mine: bool,

        #[arg(long, default_value_t = RequestStatus::Active)]
        status: RequestStatus,

        #[arg(long, default_value_t = RequestQuery::DEFAULT_LIMIT)]
        limit: u32,
    },
    /// Show one request
    Show {
        #[command(flatten)]
        credentials: Credentials,

        id: BloodRequestId,
    },
    /// Change details of a request
    Edit {
        #[command(flatten)]
        credentials: Credentials,

        id: BloodRequestId,

        #[arg(long)]
        units: Option<i32>,

        #[arg(long)]
        urgency: Option<Urgency>,

        #[arg(long)]
        required_by: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },
    /// Mark a request active, fulfilled or cancelled
    Status {
        #[command(flatten)]
        credentials: Credentials,

        id: BloodRequestId,

        status: RequestStatus,
    },
}

/// Fields of the "Request Blood" form.
#[derive(Debug, Args)]
pub struct RequestForm {
    #[arg(long)]
    patient: String,
    #[arg(long, default_value = "")]
    gender: String,
    #[arg(long, default_value = "")]
    case_description: String,
    #[arg(long)]
    blood_type: Option<BloodType>,
    #[arg(long, default_value_t = 0)]
    units: i32,
    #[arg(long)]
    urgency: Option<Urgency>,
    #[arg(long)]
    hospital: String,
    #[arg(long, default_value = "")]
    contact_person: String,
    #[arg(long)]
    phone: String,
    #[arg(long, default_value = "")]
    required_by: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long, default_value = "")]
    city: String,
    #[arg(long, default_value = "")]
    district: String,
    #[arg(long, default_value = "")]
    province: String,
}

impl From<RequestForm> for BloodRequestDraft {
    fn from(form: RequestForm) -> Self {
        Self {
            patient_name: form.patient,
            gender: form.gender,
            case_description: form.case_description,
            blood_type: form.blood_type,
            units_needed: form.units,
            urgency: form.urgency,
            hospital: form.hospital,
            contact_person: form.contact_person,
            contact_phone: form.phone,
            required_by: form.required_by,
            description: form.description,
            location: form.location,
            city: form.city,
            district: form.district,
            province: form.province,
        }
    }
}

pub async fn run(config: &ServiceConfig, action: RequestAction) -> Result<(), CliError> {
    match action {
        RequestAction::Create { credentials, form } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let created = state.requests().create(form.into(), profile.id).await?;
            print_json(&created)?;
        }
        RequestAction::List {
            credentials,
            blood_type,
            city,
            mine,
            status,
            limit,
        } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let query = RequestQuery {
                blood_type,
                city,
                requested_by: mine.then_some(profile.id),
                status,
                limit,
            };
            let requests = state.requests().load(query).await?;
            print_json(&requests)?;
        }
        RequestAction::Show { credentials, id } => {
            let (state, _, _) = sign_in(config, &credentials).await?;
            let request = state.requests().select(id).await?;
            print_json(&request)?;
        }
        RequestAction::Edit {
            credentials,
            id,
            units,
            urgency,
            required_by,
            description,
        } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let requests = state.requests();
            let mut request = requests.select(id).await?;

            if let Some(units) = units {
                request.units_needed = units;
            }
            if let Some(urgency) = urgency {
                request.urgency = urgency;
            }
            if let Some(required_by) = required_by {
                request.required_by = required_by;
            }
            if let Some(description) = description {
                request.description = description;
            }

            let saved = requests.update(request, profile.id).await?;
            print_json(&saved)?;
        }
        RequestAction::Status {
            credentials,
            id,
            status,
        } => {
            let (state, _, profile) = sign_in(config, &credentials).await?;
            let saved = state
                .requests()
                .set_status(id, status, profile.id)
                .await?;
            print_json(&saved)?;
        }
    }
    Ok(())
}
