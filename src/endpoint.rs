//! Database endpoint derivation from configured credentials.
//!
//! Supabase projects expose a direct Postgres host at
//! `db.{project_ref}.supabase.co`, where the project ref is the subdomain
//! of the project URL. The ref is derived lazily: building an endpoint
//! never fails, and a missing ref only surfaces once a host is actually
//! required.

use thiserror::Error;

/// Port for direct database connections.
pub const DB_PORT: u16 = 5432;
/// Database name used for direct connections.
pub const DB_NAME: &str = "postgres";
/// Database user used for direct connections.
pub const DB_USER: &str = "postgres";

/// Errors raised while resolving connection details.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum EndpointError {
    /// Raised when no project ref is configured and none can be derived
    /// from the URL.
    #[error(
        "could not determine the project ref from the database URL; \
         set db.project_ref in the local configuration file"
    )]
    ProjectRefMissing,
}

/// Resolved connection details for one Supabase project.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DatabaseEndpoint {
    url: String,
    secret_key: String,
    password: Option<String>,
    project_ref: Option<String>,
}

impl DatabaseEndpoint {
    /// Builds an endpoint, deriving the project ref from the URL when it
    /// is not supplied explicitly.
    ///
    /// Construction always succeeds; operations needing a host report
    /// the missing ref when they run.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        secret_key: impl Into<String>,
        password: Option<String>,
        project_ref: Option<String>,
    ) -> Self {
        let url = url.into();
        let project_ref = project_ref
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .or_else(|| derive_project_ref(&url));
        Self {
            url,
            secret_key: secret_key.into(),
            password,
            project_ref,
        }
    }

    /// Returns the project URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the secret API key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Returns the database password, if configured.
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Returns the project ref, if configured or derivable.
    #[must_use]
    pub fn project_ref(&self) -> Option<&str> {
        self.project_ref.as_deref()
    }

    /// Resolves the direct database host for this project.
    ///
    /// # Errors
    ///
    /// Returns [`EndpointError::ProjectRefMissing`] when no project ref
    /// is available.
    pub fn resolve_host(&self) -> Result<String, EndpointError> {
        let project_ref = self
            .project_ref
            .as_deref()
            .ok_or(EndpointError::ProjectRefMissing)?;
        Ok(format!("db.{project_ref}.supabase.co"))
    }
}

/// Extracts the project ref from a URL shaped like
/// `https://{ref}.supabase.co`.
///
/// Returns `None` when the URL does not match the expected shape.
#[must_use]
pub fn derive_project_ref(url: &str) -> Option<String> {
    let rest = url.strip_prefix("https://")?;
    let (candidate, remainder) = rest.split_once('.')?;
    if candidate.is_empty() || !remainder.starts_with("supabase.co") {
        return None;
    }
    Some(candidate.to_owned())
}
