//! Account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create an account with its profile
//! bfn account sign-up -e ram@example.com -f Ram -l Thapa -p 9800000000
//!
//! # Email a password-reset link
//! bfn account forgot-password -e ram@example.com
//!
//! # Set a new password with the token from the link
//! bfn account reset-password --token <TOKEN>
//! ```

use blood_for_nepal_core::validation::SignUpDraft;
use blood_for_nepal_service::{AppState, ServiceConfig};
use clap::Subcommand;

use super::{CliError, print_json};

#[derive(Subcommand)]
pub enum AccountAction {
    /// Create an account and its profile
    SignUp {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(short, long)]
        first_name: String,

        /// Last name
        #[arg(short, long)]
        last_name: String,

        /// Phone number
        #[arg(short, long)]
        phone: String,

        /// Password (or `BFN_NEW_PASSWORD`)
        #[arg(long, env = "BFN_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Email a password-reset link
    ForgotPassword {
        /// Account email
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password with a reset token
    ResetPassword {
        /// Token from the reset link
        #[arg(long)]
        token: String,

        /// New password
        #[arg(long, env = "BFN_NEW_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn run(config: &ServiceConfig, action: AccountAction) -> Result<(), CliError> {
    let state = AppState::connect(config).await?;
    let session = state.session();

    match action {
        AccountAction::SignUp {
            email,
            first_name,
            last_name,
            phone,
            password,
        } => {
            let profile = session
                .sign_up(SignUpDraft {
                    email,
                    confirm_password: password.clone(),
                    password,
                    first_name,
                    last_name,
                    phone_number: phone,
                })
                .await?;
            print_json(&profile)?;
        }
        AccountAction::ForgotPassword { email } => {
            session.send_password_reset(&email).await?;
            tracing::info!("If the account exists, a reset link is on its way");
        }
        AccountAction::ResetPassword { token, password } => {
            session.reset_password(&token, &password).await?;
            tracing::info!("Password updated");
        }
    }
    Ok(())
}
