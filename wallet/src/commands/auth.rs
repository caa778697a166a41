use anyhow::Result;
use aura_wallet_lib::{SignInResponse, WalletContext};
use clap::Subcommand;

use super::{prompt_new_password, prompt_password, ENV_ACCOUNT_PASSWORD};
use crate::output;

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Register an account; a confirmation code is sent to the email
    SignUp {
        username: String,
        #[arg(long)]
        email: String,
    },
    /// Confirm an account with the emailed code
    Confirm { username: String, code: String },
    SignIn { username: String },
    SignOut,
    Status,
}

pub async fn run(ctx: &WalletContext, command: AuthCommands, json: bool) -> Result<()> {
    match command {
        AuthCommands::SignUp { username, email } => {
            let password = prompt_new_password("Account password", ENV_ACCOUNT_PASSWORD)?;
            let response = ctx.sign_up(&username, &password, &email).await?;
            if json {
                return output::json(&response);
            }
            if response.user_confirmed {
                output::success(&format!("Account {} created", response.username));
            } else {
                output::success(&format!("Account {} registered", response.username));
                let destination = response
                    .code_destination
                    .unwrap_or_else(|| "your email".to_string());
                output::info(&format!(
                    "Enter the code sent to {} with `aura auth confirm {} <code>`",
                    destination, response.username
                ));
            }
        }
        AuthCommands::Confirm { username, code } => {
            ctx.confirm_sign_up(&username, &code).await?;
            if json {
                return output::json(&serde_json::json!({ "confirmed": true, "username": username }));
            }
            output::success("Account confirmed");
        }
        AuthCommands::SignIn { username } => {
            let password = prompt_password("Account password", ENV_ACCOUNT_PASSWORD)?;
            let response = ctx.sign_in(&username, &password).await?;
            if json {
                return output::json(&response);
            }
            match response {
                SignInResponse::SignedIn { username, expires_at } => {
                    output::success(&format!("Signed in as {}", username));
                    output::field("Session expires", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                SignInResponse::ChallengeRequired { challenge_name, .. } => {
                    output::warning(&format!(
                        "Sign-in needs an additional step ({}) that this wallet does not handle",
                        challenge_name
                    ));
                }
            }
        }
        AuthCommands::SignOut => {
            let signed_out = ctx.sign_out()?;
            if json {
                return output::json(&serde_json::json!({ "signedOut": signed_out }));
            }
            if signed_out {
                output::success("Signed out");
            } else {
                output::info("Not signed in");
            }
        }
        AuthCommands::Status => {
            let status = ctx.auth_status()?;
            if json {
                return output::json(&status);
            }
            match (&status.username, status.expires_at) {
                (Some(username), Some(expires_at)) if !status.expired => {
                    output::field("Signed in as", username);
                    output::field("Expires", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                (Some(username), _) => {
                    output::warning(&format!("Session for {} has expired; sign in again", username))
                }
                _ => output::info("Not signed in"),
            }
        }
    }
    Ok(())
}
