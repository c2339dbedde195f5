//! Sign-up, sign-in and sign-out.

use secrecy::SecretString;

use vitrine_core::Email;
use vitrine_storefront::Storefront;
use vitrine_storefront::backend::Backend;
use vitrine_storefront::models::Credentials;

use super::{CommandResult, fail};

fn credentials(email: &str, password: String) -> Result<Credentials, Box<dyn std::error::Error>> {
    Ok(Credentials {
        email: Email::parse(email)?,
        password: SecretString::from(password),
    })
}

/// Create an account and sign in with it.
///
/// # Errors
///
/// Returns an error if the email is invalid or the account cannot be created.
pub async fn signup<B: Backend>(
    storefront: &mut Storefront<B>,
    email: &str,
    password: String,
    name: &str,
) -> CommandResult {
    let credentials = credentials(email, password)?;
    let session = storefront
        .sign_up(&credentials, name)
        .await
        .map_err(fail)?;
    println!("Welcome, {}!", session.display_name);
    Ok(())
}

/// Sign in.
///
/// # Errors
///
/// Returns an error for rejected credentials.
pub async fn login<B: Backend>(
    storefront: &mut Storefront<B>,
    email: &str,
    password: String,
) -> CommandResult {
    let credentials = credentials(email, password)?;
    let session = storefront.sign_in(&credentials).await.map_err(fail)?;
    println!("Signed in as {} ({})", session.display_name, session.role);
    Ok(())
}

/// Sign out.
///
/// # Errors
///
/// Never fails; the signature matches the other commands.
pub async fn logout<B: Backend>(storefront: &mut Storefront<B>) -> CommandResult {
    if storefront.session().is_none() {
        println!("Not signed in");
        return Ok(());
    }
    storefront.sign_out().await;
    println!("Signed out");
    Ok(())
}
