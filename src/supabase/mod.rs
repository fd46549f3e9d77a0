//! Supabase admin API client backing the user directory.
//!
//! User lookup goes through the auth admin listing endpoint, allow-list
//! inserts go through the REST endpoint for the `allowed_users` table.
//! Both calls authenticate with the secret key; the publishable key is
//! rejected by the admin endpoint, which is the most common setup
//! mistake this tool runs into.

use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoint::DatabaseEndpoint;
use crate::provider::{DirectoryFuture, GrantOutcome, UserDirectory, UserRecord};

mod error;

pub use error::SupabaseError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DUPLICATE_KEY_CODE: &str = "23505";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Client for the Supabase auth admin and REST APIs.
#[derive(Clone, Debug)]
pub struct SupabaseDirectory {
    base_url: String,
    secret_key: String,
}

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    users: Vec<ApiUser>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    id: String,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
struct InsertAllowedUserRequest<'a> {
    user_id: &'a str,
}

impl SupabaseDirectory {
    /// Builds a client from a resolved endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SupabaseError::Config`] when the URL or secret key is
    /// empty.
    pub fn new(endpoint: &DatabaseEndpoint) -> Result<Self, SupabaseError> {
        let base_url = endpoint.url().trim().trim_end_matches('/').to_owned();
        let secret_key = endpoint.secret_key().trim().to_owned();
        if base_url.is_empty() {
            return Err(SupabaseError::Config(String::from(
                "database URL is not configured",
            )));
        }
        if secret_key.is_empty() {
            return Err(SupabaseError::Config(String::from(
                "secret key is not configured",
            )));
        }
        Ok(Self {
            base_url,
            secret_key,
        })
    }

    async fn fetch_users(&self) -> Result<Vec<UserRecord>, SupabaseError> {
        let url = format!("{}/auth/v1/admin/users", self.base_url);
        let response = HTTP_CLIENT
            .get(&url)
            .header("apikey", &self.secret_key)
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .send()
            .await
            .map_err(|err| SupabaseError::Http {
                url: url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SupabaseError::Api {
                url,
                status: status.as_u16(),
                message,
            });
        }

        let listing: UserListResponse =
            response.json().await.map_err(|err| SupabaseError::Decode {
                url: url.clone(),
                message: err.to_string(),
            })?;
        Ok(listing
            .users
            .into_iter()
            .map(|user| UserRecord {
                id: user.id,
                email: user.email,
            })
            .collect())
    }

    async fn insert_user(&self, user_id: &str) -> Result<GrantOutcome, SupabaseError> {
        let url = format!("{}/rest/v1/allowed_users", self.base_url);
        let response = HTTP_CLIENT
            .post(&url)
            .header("apikey", &self.secret_key)
            .header("Authorization", format!("Bearer {}", self.secret_key))
            .json(&InsertAllowedUserRequest { user_id })
            .send()
            .await
            .map_err(|err| SupabaseError::Http {
                url: url.clone(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(GrantOutcome::Granted);
        }

        let body = response.text().await.unwrap_or_default();
        if is_duplicate_key(&body) {
            return Ok(GrantOutcome::AlreadyAllowed);
        }
        Err(SupabaseError::Api {
            url,
            status: status.as_u16(),
            message: body,
        })
    }
}

impl UserDirectory for SupabaseDirectory {
    type Error = SupabaseError;

    fn list_users(&self) -> DirectoryFuture<'_, Vec<UserRecord>, Self::Error> {
        Box::pin(self.fetch_users())
    }

    fn insert_allowed_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> DirectoryFuture<'a, GrantOutcome, Self::Error> {
        Box::pin(self.insert_user(user_id))
    }
}

fn is_duplicate_key(body: &str) -> bool {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body)
        && value.get("code").and_then(serde_json::Value::as_str) == Some(DUPLICATE_KEY_CODE)
    {
        return true;
    }
    body.contains("duplicate key")
}
