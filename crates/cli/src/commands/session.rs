//! Sign-in and account commands.

use secrecy::SecretString;
use tracing::{info, warn};

use giftshop_storefront::Storefront;
use giftshop_storefront::models::Credentials;

/// Sign in with the given credentials, if any, then load badge counts.
///
/// # Errors
///
/// Returns an error if credentials were given and the backend refused them.
pub async fn sign_in(
    storefront: &Storefront,
    email: Option<&str>,
    password: Option<SecretString>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(credentials) = credentials(email, password) {
        storefront.session().login(&credentials).await?;
    }

    storefront.bootstrap().await;
    Ok(())
}

fn credentials(email: Option<&str>, password: Option<SecretString>) -> Option<Credentials> {
    match (email, password) {
        (Some(email), Some(password)) => Some(Credentials::Password {
            email: email.to_string(),
            password,
        }),
        (Some(_), None) => {
            warn!("GIFTSHOP_PASSWORD not set, continuing signed out");
            None
        }
        _ => None,
    }
}

/// Print the signed-in user.
pub fn whoami(storefront: &Storefront) {
    match storefront.session().identity() {
        Some(user) => info!(
            id = %user.id,
            name = %user.display_name,
            email = user.email.as_deref().unwrap_or("-"),
            verified = user.is_verified(),
            "Signed in"
        ),
        None => info!("Not signed in"),
    }
}

/// Sign out.
pub async fn logout(storefront: &Storefront) {
    storefront.session().logout().await;
    info!("Signed out");
}

/// Delete the account after the typed confirmation.
///
/// # Errors
///
/// Returns an error if the confirmation does not match or the request fails.
pub async fn delete_account(
    storefront: &Storefront,
    confirmation: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    storefront.account().delete_account(confirmation).await?;
    info!("Account deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_keep_password_secret() {
        let password = Some(SecretString::from("giftwrap42".to_string()));
        let credentials = credentials(Some("mona@example.com"), password);
        let debug = format!("{credentials:?}");
        assert!(debug.contains("mona@example.com"));
        assert!(!debug.contains("giftwrap42"));
    }

    #[test]
    fn test_credentials_need_both_parts() {
        assert!(credentials(Some("mona@example.com"), None).is_none());
        assert!(credentials(None, Some(SecretString::from("x".to_string()))).is_none());
    }
}
