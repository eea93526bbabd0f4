use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::{
    AuthResponse, ChangePasswordRequest, LoginRequest, PublicUser, RegisterRequest,
    VerifyEmailResponse,
};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{
    decoy_hash, generate_verification_token, hash_password, verify_password, MIN_PASSWORD_LEN,
};
use crate::auth::repo::{EMAIL_TAKEN, HANDLE_TAKEN, USERNAME_TAKEN};
use crate::auth::repo_types::{NewUser, User};
use crate::error::AppError;
use crate::mailer::verification_email;
use crate::state::AppState;

pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Hash a login attempt is checked against. Unknown accounts get the decoy so
/// both outcomes run one argon2 verification.
fn credential_hash(user: Option<&User>) -> &str {
    match user {
        Some(u) => &u.password_hash,
        None => decoy_hash(),
    }
}

fn issue_token(st: &AppState, user_id: Uuid) -> Result<String, AppError> {
    let token = JwtKeys::from(&st.config.jwt).sign(user_id)?;
    Ok(token)
}

#[instrument(skip(st, req), fields(username = %req.username))]
pub async fn register(st: &AppState, mut req: RegisterRequest) -> Result<AuthResponse, AppError> {
    req.username = req.username.trim().to_string();
    req.email = req.email.trim().to_lowercase();
    req.handle = req.handle.trim().to_string();

    if req.username.is_empty() {
        return Err(AppError::validation("Username is required"));
    }
    if !is_valid_email(&req.email) {
        warn!(email = %req.email, "invalid email");
        return Err(AppError::validation("Valid email is required"));
    }
    if req.handle.is_empty() {
        return Err(AppError::validation("Handle is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(AppError::validation(
            "Password must be at least 6 characters long",
        ));
    }

    if st.users.find_by_email(&req.email).await?.is_some() {
        warn!(email = %req.email, "email already registered");
        return Err(AppError::Conflict(EMAIL_TAKEN.into()));
    }
    if st.users.find_by_username(&req.username).await?.is_some() {
        warn!(username = %req.username, "username already taken");
        return Err(AppError::Conflict(USERNAME_TAKEN.into()));
    }
    if st.users.find_by_handle(&req.handle).await?.is_some() {
        warn!(handle = %req.handle, "handle already taken");
        return Err(AppError::Conflict(HANDLE_TAKEN.into()));
    }

    let verification_token = generate_verification_token();
    let password_hash = hash_password(&req.password)?;
    let user = st
        .users
        .create(NewUser {
            username: req.username,
            email: req.email,
            handle: req.handle,
            password_hash,
            verification_token: verification_token.clone(),
        })
        .await?;
    info!(user_id = %user.id, email = %user.email, "user registered");

    let link = format!(
        "{}/verify-email?token={}",
        st.config.frontend_url, verification_token
    );
    let email = verification_email(&st.config.email.from, &user.email, &user.username, &link);
    if let Err(e) = st.mailer.send(email).await {
        // The account stays; the client sees a server error.
        error!(error = %e, user_id = %user.id, "verification email failed");
        return Err(e.context("send verification email").into());
    }

    let token = issue_token(st, user.id)?;
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

#[instrument(skip(st, req))]
pub async fn login(st: &AppState, mut req: LoginRequest) -> Result<AuthResponse, AppError> {
    req.email = req.email.trim().to_lowercase();

    if !is_valid_email(&req.email) {
        return Err(AppError::validation("Valid email is required"));
    }
    if req.password.is_empty() {
        return Err(AppError::validation("Password is required"));
    }

    let user = st.users.find_by_email(&req.email).await?;
    let matches = verify_password(&req.password, credential_hash(user.as_ref()))?;
    let user = match user {
        Some(user) if matches => user,
        Some(user) => {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        }
        None => {
            warn!(email = %req.email, "login unknown email");
            return Err(AppError::auth(INVALID_CREDENTIALS));
        }
    };

    let token = issue_token(st, user.id)?;
    info!(user_id = %user.id, "user logged in");
    Ok(AuthResponse {
        user: user.into(),
        token,
    })
}

/// An unknown token is an ordinary outcome, not an error.
#[instrument(skip_all)]
pub async fn verify_email(st: &AppState, token: &str) -> anyhow::Result<VerifyEmailResponse> {
    let Some(user) = st.users.find_by_verification_token(token).await? else {
        warn!("unknown verification token");
        return Ok(VerifyEmailResponse {
            success: false,
            message: "Invalid verification token".into(),
        });
    };

    st.users.mark_verified(user.id).await?;
    info!(user_id = %user.id, "email verified");
    Ok(VerifyEmailResponse {
        success: true,
        message: "Email verified successfully".into(),
    })
}

#[instrument(skip(st))]
pub async fn me(st: &AppState, user_id: Uuid) -> Result<PublicUser, AppError> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::auth("User not found"))?;
    Ok(user.into())
}

#[instrument(skip(st, req))]
pub async fn change_password(
    st: &AppState,
    user_id: Uuid,
    req: ChangePasswordRequest,
) -> Result<(), AppError> {
    if req.new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(
            "Password must be at least 6 characters long",
        ));
    }

    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::auth("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash)? {
        warn!(user_id = %user.id, "password change with wrong current password");
        return Err(AppError::auth("Current password is incorrect"));
    }

    let hash = hash_password(&req.new_password)?;
    st.users.update_password(user.id, &hash).await?;
    info!(user_id = %user.id, "password changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mailer::testing::{FailingMailer, RecordingMailer};

    fn register_req(username: &str, email: &str, handle: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            handle: handle.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_shape() {
        assert!(is_valid_email("ann@example.com"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("ann example.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn short_password_is_rejected_and_nothing_persisted() {
        let st = AppState::fake();
        let err = register(&st, register_req("ann", "ann@example.com", "ann", "12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(err.to_string(), "Password must be at least 6 characters long");
        assert!(st.users.find_by_email("ann@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validation_reports_first_missing_field() {
        let st = AppState::fake();
        let err = register(&st, register_req("", "bad", "", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username is required");
        let err = register(&st, register_req("ann", "bad", "", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Valid email is required");
        let err = register(&st, register_req("ann", "a@b.co", " ", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Handle is required");
    }

    #[tokio::test]
    async fn register_sends_verification_link_and_issues_token() {
        let mailer = Arc::new(RecordingMailer::default());
        let st = AppState::fake_with_mailer(mailer.clone());
        let res = register(&st, register_req("ann", " Ann@Example.com ", "annie", "secret1"))
            .await
            .expect("register");

        assert_eq!(res.user.email, "ann@example.com");
        assert!(!res.user.verified);
        let claims = JwtKeys::from(&st.config.jwt).verify(&res.token).unwrap();
        assert_eq!(claims.sub, res.user.id);

        let stored = st.users.find_by_id(res.user.id).await.unwrap().unwrap();
        assert_ne!(stored.password_hash, "secret1");
        let token = stored.verification_token.expect("token stored");

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ann@example.com");
        assert!(sent[0]
            .html
            .contains(&format!("http://app.test/verify-email?token={token}")));
    }

    #[tokio::test]
    async fn duplicate_email_conflicts_first() {
        let st = AppState::fake();
        register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();

        let err = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), EMAIL_TAKEN);

        let err = register(&st, register_req("bob", "ann@example.com", "bob", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), EMAIL_TAKEN);
        assert!(st.users.find_by_username("bob").await.unwrap().is_none());

        let err = register(&st, register_req("ann", "other@example.com", "x", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USERNAME_TAKEN);

        let err = register(&st, register_req("cat", "cat@example.com", "ann", "secret1"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), HANDLE_TAKEN);
    }

    #[tokio::test]
    async fn failed_email_is_a_server_error_but_user_remains() {
        let st = AppState::fake_with_mailer(Arc::new(FailingMailer));
        let err = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(st.users.find_by_email("ann@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let st = AppState::fake();
        register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();

        let wrong = login(
            &st,
            LoginRequest {
                email: "ann@example.com".into(),
                password: "nope-nope".into(),
            },
        )
        .await
        .unwrap_err();
        let unknown = login(
            &st,
            LoginRequest {
                email: "ghost@example.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(wrong, AppError::Auth(_)));
        assert!(matches!(unknown, AppError::Auth(_)));
        assert_eq!(wrong.to_string(), INVALID_CREDENTIALS);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn unknown_email_is_checked_against_the_decoy_hash() {
        let st = AppState::fake();
        assert_eq!(credential_hash(None), decoy_hash());

        let reg = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();
        let stored = st.users.find_by_id(reg.user.id).await.unwrap().unwrap();
        assert_eq!(credential_hash(Some(&stored)), stored.password_hash);
        assert_ne!(credential_hash(Some(&stored)), decoy_hash());

        // Even the decoy's own password does not log anyone in.
        let err = login(
            &st,
            LoginRequest {
                email: "ghost@example.com".into(),
                password: "decoy-password-never-issued".into(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn login_succeeds_with_case_insensitive_email() {
        let st = AppState::fake();
        let reg = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();
        let res = login(
            &st,
            LoginRequest {
                email: "ANN@example.com".into(),
                password: "secret1".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(res.user.id, reg.user.id);
    }

    #[tokio::test]
    async fn verify_email_flow() {
        let st = AppState::fake();
        let reg = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();

        let unknown = verify_email(&st, "not-a-token").await.unwrap();
        assert!(!unknown.success);
        assert!(!st.users.find_by_id(reg.user.id).await.unwrap().unwrap().verified);

        let token = st
            .users
            .find_by_id(reg.user.id)
            .await
            .unwrap()
            .unwrap()
            .verification_token
            .unwrap();
        let ok = verify_email(&st, &token).await.unwrap();
        assert!(ok.success);
        assert!(me(&st, reg.user.id).await.unwrap().verified);

        // Single use.
        assert!(!verify_email(&st, &token).await.unwrap().success);
    }

    #[tokio::test]
    async fn change_password_requires_current_password() {
        let st = AppState::fake();
        let reg = register(&st, register_req("ann", "ann@example.com", "ann", "secret1"))
            .await
            .unwrap();

        let err = change_password(
            &st,
            reg.user.id,
            ChangePasswordRequest {
                current_password: "wrong".into(),
                new_password: "secret2".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));

        change_password(
            &st,
            reg.user.id,
            ChangePasswordRequest {
                current_password: "secret1".into(),
                new_password: "secret2".into(),
            },
        )
        .await
        .unwrap();

        let res = login(
            &st,
            LoginRequest {
                email: "ann@example.com".into(),
                password: "secret2".into(),
            },
        )
        .await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn me_for_missing_user_is_auth_error() {
        let st = AppState::fake();
        let err = me(&st, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
