use crate::storage::BoxFuture;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("This email is not authorized for admin access.")]
    NotAllowed(String),
    #[error("Sign-in failed: {0}")]
    InvalidCredentials(String),
    #[error("Identity provider error: {0}")]
    Provider(String),
    #[error("Session expired. Please sign in again.")]
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Tokens issued by the user pool.
#[derive(Debug, Clone, PartialEq)]
pub struct SignIn {
    pub id_token: String,
    pub refresh_token: Option<String>,
}

/// Email/password sign-in, then identity token for temporary cloud credentials.
pub trait IdentityProvider {
    fn sign_in<'a>(&'a self, email: &'a str, password: &'a str)
        -> BoxFuture<'a, Result<SignIn, AuthError>>;

    /// New tokens for a stored refresh token.
    fn refresh<'a>(&'a self, email: &'a str, refresh_token: &'a str)
        -> BoxFuture<'a, Result<SignIn, AuthError>>;

    fn exchange<'a>(&'a self, id_token: &'a str)
        -> BoxFuture<'a, Result<TemporaryCredentials, AuthError>>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdminSession {
    pub email: String,
    pub credentials: TemporaryCredentials,
    pub refresh_token: Option<String>,
}

impl AdminSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.credentials
            .expires_at
            .map(|expiry| expiry <= now)
            .unwrap_or(false)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

pub fn is_admin_email(allow_list: &[String], email: &str) -> bool {
    let email = normalize_email(email);
    allow_list.iter().any(|allowed| normalize_email(allowed) == email)
}

/// True when the page query string turns admin affordances on, e.g. `?admin=true`.
pub fn admin_requested(query: &str, param: &str) -> bool {
    query
        .trim_start_matches('?')
        .split('&')
        .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
        .any(|(key, value)| key == param && value.eq_ignore_ascii_case("true"))
}

/// Checks the allow-list before any network call, then runs the credential exchange.
pub async fn login<P: IdentityProvider>(
    provider: &P,
    allow_list: &[String],
    email: &str,
    password: &str,
) -> Result<AdminSession, AuthError> {
    if !is_admin_email(allow_list, email) {
        log::warn!("rejected admin login for {}", normalize_email(email));
        return Err(AuthError::NotAllowed(normalize_email(email)));
    }

    let tokens = provider.sign_in(email.trim(), password).await?;
    let credentials = provider.exchange(&tokens.id_token).await?;
    log::info!("admin session opened for {}", normalize_email(email));

    Ok(AdminSession {
        email: normalize_email(email),
        credentials,
        refresh_token: tokens.refresh_token,
    })
}

/// Re-validates a stored session: the email must still be on the allow-list,
/// and expired credentials are refreshed when a refresh token is held.
pub async fn restore<P: IdentityProvider>(
    provider: &P,
    allow_list: &[String],
    session: AdminSession,
    now: DateTime<Utc>,
) -> Result<AdminSession, AuthError> {
    if !is_admin_email(allow_list, &session.email) {
        return Err(AuthError::NotAllowed(session.email));
    }
    if !session.is_expired(now) {
        return Ok(session);
    }

    let refresh_token = session.refresh_token.ok_or(AuthError::Expired)?;
    let tokens = provider.refresh(&session.email, &refresh_token).await?;
    let credentials = provider.exchange(&tokens.id_token).await?;
    log::info!("admin credentials refreshed for {}", session.email);

    Ok(AdminSession {
        email: session.email,
        credentials,
        refresh_token: tokens.refresh_token.or(Some(refresh_token)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::cell::Cell;

    struct StubProvider {
        calls: Cell<usize>,
    }

    impl StubProvider {
        fn new() -> Self {
            StubProvider { calls: Cell::new(0) }
        }
    }

    impl IdentityProvider for StubProvider {
        fn sign_in<'a>(
            &'a self,
            _email: &'a str,
            password: &'a str,
        ) -> BoxFuture<'a, Result<SignIn, AuthError>> {
            self.calls.set(self.calls.get() + 1);
            let result = if password == "secret" {
                Ok(SignIn {
                    id_token: "id-token".to_string(),
                    refresh_token: Some("refresh-1".to_string()),
                })
            } else {
                Err(AuthError::InvalidCredentials("Incorrect username or password.".to_string()))
            };
            Box::pin(std::future::ready(result))
        }

        fn refresh<'a>(
            &'a self,
            _email: &'a str,
            refresh_token: &'a str,
        ) -> BoxFuture<'a, Result<SignIn, AuthError>> {
            self.calls.set(self.calls.get() + 1);
            let result = if refresh_token == "refresh-1" {
                Ok(SignIn {
                    id_token: "refreshed".to_string(),
                    refresh_token: None,
                })
            } else {
                Err(AuthError::InvalidCredentials("Refresh Token has expired".to_string()))
            };
            Box::pin(std::future::ready(result))
        }

        fn exchange<'a>(
            &'a self,
            id_token: &'a str,
        ) -> BoxFuture<'a, Result<TemporaryCredentials, AuthError>> {
            self.calls.set(self.calls.get() + 1);
            Box::pin(std::future::ready(Ok(TemporaryCredentials {
                access_key_id: format!("AKIA-{id_token}"),
                secret_access_key: "s".to_string(),
                session_token: "t".to_string(),
                expires_at: Some(Utc::now() + Duration::hours(1)),
            })))
        }
    }

    fn admins() -> Vec<String> {
        vec!["owner@example.com".to_string()]
    }

    fn stale_session(refresh_token: Option<&str>) -> AdminSession {
        AdminSession {
            email: "owner@example.com".to_string(),
            credentials: TemporaryCredentials {
                access_key_id: "AKIA-old".to_string(),
                secret_access_key: "s".to_string(),
                session_token: "t".to_string(),
                expires_at: Some(Utc::now() - Duration::minutes(5)),
            },
            refresh_token: refresh_token.map(str::to_string),
        }
    }

    #[test]
    fn query_switch() {
        assert!(admin_requested("?admin=true", "admin"));
        assert!(admin_requested("lang=en&admin=TRUE", "admin"));
        assert!(!admin_requested("?admin=false", "admin"));
        assert!(!admin_requested("?administrator=true", "admin"));
        assert!(!admin_requested("", "admin"));
    }

    #[tokio::test]
    async fn unknown_email_never_reaches_the_provider() {
        let provider = StubProvider::new();
        let err = login(&provider, &admins(), "intruder@example.com", "secret")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAllowed(_)));
        assert_eq!(provider.calls.get(), 0);
    }

    #[tokio::test]
    async fn allowed_email_gets_a_session() {
        let provider = StubProvider::new();
        let session = login(&provider, &admins(), "  Owner@Example.com ", "secret")
            .await
            .expect("login");
        assert_eq!(session.email, "owner@example.com");
        assert_eq!(session.credentials.access_key_id, "AKIA-id-token");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!session.is_expired(Utc::now()));

        let err = login(&provider, &admins(), "owner@example.com", "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn live_session_is_kept_without_a_round_trip() {
        let provider = StubProvider::new();
        let session = login(&provider, &admins(), "owner@example.com", "secret")
            .await
            .expect("login");
        provider.calls.set(0);

        let restored = restore(&provider, &admins(), session.clone(), Utc::now())
            .await
            .expect("restore");
        assert_eq!(restored, session);
        assert_eq!(provider.calls.get(), 0);
    }

    #[tokio::test]
    async fn expired_credentials_are_refreshed() {
        let provider = StubProvider::new();
        let restored = restore(&provider, &admins(), stale_session(Some("refresh-1")), Utc::now())
            .await
            .expect("refresh");
        assert_eq!(restored.credentials.access_key_id, "AKIA-refreshed");
        assert_eq!(restored.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!restored.is_expired(Utc::now()));
    }

    #[tokio::test]
    async fn expired_session_without_refresh_or_rejected_refresh_fails() {
        let provider = StubProvider::new();
        let err = restore(&provider, &admins(), stale_session(None), Utc::now())
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Expired);
        assert_eq!(provider.calls.get(), 0);

        let err = restore(&provider, &admins(), stale_session(Some("revoked")), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn restored_session_rechecks_the_allow_list() {
        let provider = StubProvider::new();
        let session = login(&provider, &admins(), "owner@example.com", "secret")
            .await
            .expect("login");
        provider.calls.set(0);

        let err = restore(&provider, &["someone@example.com".to_string()], session, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotAllowed(_)));
        assert_eq!(provider.calls.get(), 0);
    }
}
