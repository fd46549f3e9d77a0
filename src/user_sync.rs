//! Idempotent reconciliation of an e-mail allow-list against the user
//! directory.
//!
//! Every line is processed independently: a failed lookup or grant is
//! counted and reported, never raised, so one bad address cannot block
//! the rest of the batch.

use tracing::warn;

use crate::provider::{GrantOutcome, UserDirectory, UserRecord};
use crate::report::Reporter;

/// Counters accumulated over one sync run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SyncStats {
    /// Users granted access, including idempotent re-grants.
    pub added: usize,
    /// Users found whose grant failed.
    pub skipped: usize,
    /// Addresses with no matching user.
    pub not_found: usize,
    /// Addresses whose directory lookup failed outright.
    pub lookup_errors: usize,
}

/// Reconciles e-mail lists against the user directory.
#[derive(Clone, Debug)]
pub struct UserSyncEngine<D, R> {
    directory: D,
    reporter: R,
}

impl<D, R> UserSyncEngine<D, R>
where
    D: UserDirectory,
    R: Reporter,
{
    /// Builds an engine from a directory and a reporter.
    pub const fn new(directory: D, reporter: R) -> Self {
        Self {
            directory,
            reporter,
        }
    }

    /// Looks up a user by exact, case-sensitive e-mail match.
    ///
    /// Returns `Ok(None)` when no user carries the address, so callers
    /// can tell a genuinely absent user from a failed directory call.
    ///
    /// # Errors
    ///
    /// Returns the directory error when the listing call fails.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, D::Error> {
        let users = self.directory.list_users().await?;
        Ok(users
            .into_iter()
            .find(|user| user.email.as_deref() == Some(email)))
    }

    /// Grants allow-list access to a user.
    ///
    /// A duplicate row is reported as [`GrantOutcome::AlreadyAllowed`],
    /// not as an error, so re-runs are safe.
    ///
    /// # Errors
    ///
    /// Returns the directory error when the insert fails for any reason
    /// other than a duplicate key.
    pub async fn grant_access(&self, user_id: &str) -> Result<GrantOutcome, D::Error> {
        self.directory.insert_allowed_user(user_id).await
    }

    /// Processes e-mail lines best-effort and returns accumulated stats.
    ///
    /// Lines are trimmed; blank lines and lines starting with `#` are
    /// skipped. Remaining addresses are processed in input order.
    pub async fn sync_emails<'a, I>(&self, lines: I) -> SyncStats
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stats = SyncStats::default();
        for line in lines {
            let email = line.trim();
            if email.is_empty() || email.starts_with('#') {
                continue;
            }
            self.sync_one(email, &mut stats).await;
        }
        stats
    }

    async fn sync_one(&self, email: &str, stats: &mut SyncStats) {
        let user = match self.find_user_by_email(email).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                stats.not_found += 1;
                self.reporter.warning(&format!("no user found for {email}"));
                return;
            }
            Err(err) => {
                stats.lookup_errors += 1;
                warn!(email, error = %err, "user lookup failed");
                self.reporter
                    .warning(&format!("lookup failed for {email}: {err}"));
                return;
            }
        };

        match self.grant_access(&user.id).await {
            Ok(GrantOutcome::Granted) => {
                stats.added += 1;
                self.reporter.success(&format!("granted access to {email}"));
            }
            Ok(GrantOutcome::AlreadyAllowed) => {
                stats.added += 1;
                self.reporter.info(&format!("{email} already has access"));
            }
            Err(err) => {
                stats.skipped += 1;
                self.reporter
                    .warning(&format!("could not grant access to {email}: {err}"));
            }
        }
    }
}
