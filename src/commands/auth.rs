//! Auth Commands
//!
//! Password login and token refresh against the `users` collection.

use std::sync::PoisonError;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;

use super::{check_status, AuthProvider, PocketBaseClient};
use crate::error::{AuthError, RemoteError, RemoteResult};
use crate::models::AuthSession;

#[derive(Serialize)]
struct PasswordArgs<'a> {
    identity: &'a str,
    password: &'a str,
}

/// Credential problems come back as 400; everything else is a transport issue
fn classify_login_error(err: RemoteError) -> AuthError {
    match err {
        RemoteError::Status { status: 400 | 401 | 403, message } => AuthError::Rejected(message),
        other => AuthError::Remote(other),
    }
}

impl PocketBaseClient {
    async fn auth_with_password(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        let response = self
            .request(Method::POST, "collections/users/auth-with-password")
            .json(&PasswordArgs {
                identity: email,
                password,
            })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn auth_refresh(&self, token: &str) -> RemoteResult<AuthSession> {
        let response = self
            .http
            .request(Method::POST, self.url("collections/users/auth-refresh"))
            .header(reqwest::header::AUTHORIZATION, token)
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl AuthProvider for PocketBaseClient {
    async fn authenticate(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let session = self
            .auth_with_password(email, password)
            .await
            .map_err(classify_login_error)?;
        self.use_session(Some(&session));
        Ok(session)
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let refreshed = self
            .auth_refresh(&session.token)
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        self.use_session(Some(&refreshed));
        Ok(refreshed)
    }

    fn use_session(&self, session: Option<&AuthSession>) {
        let mut token = self.token.write().unwrap_or_else(PoisonError::into_inner);
        *token = session.map(|s| s.token.clone());
    }
}
