//! Connectivity checks against the configured backend.

use tracing::debug;

use crate::provider::UserDirectory;
use crate::report::Reporter;

const KEY_HINT: &str = "make sure you're using the secret key (sb_secret_* or a \
service_role JWT), not the publishable key";

/// Verifies that the backend accepts the configured credentials.
#[derive(Clone, Debug)]
pub struct ConnectivityProbe<D, R> {
    directory: D,
    reporter: R,
}

impl<D, R> ConnectivityProbe<D, R>
where
    D: UserDirectory,
    R: Reporter,
{
    /// Builds a probe from a directory and a reporter.
    pub const fn new(directory: D, reporter: R) -> Self {
        Self {
            directory,
            reporter,
        }
    }

    /// Issues one lightweight admin call and reports whether it
    /// succeeded.
    ///
    /// Failures never raise; they are reported together with a hint at
    /// the most likely cause.
    pub async fn test_connection(&self) -> bool {
        match self.directory.list_users().await {
            Ok(_) => {
                self.reporter.success("database connection ok");
                true
            }
            Err(err) => {
                debug!(error = %err, "connectivity probe failed");
                self.reporter
                    .error(&format!("database connection failed: {err}"));
                self.reporter.info(KEY_HINT);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::{RecordingReporter, ReportLevel, ScriptedDirectory};

    use super::*;

    #[tokio::test]
    async fn successful_admin_call_reports_true() {
        let directory = ScriptedDirectory::new();
        directory.push_listing(vec![]);
        let reporter = RecordingReporter::new();
        let probe = ConnectivityProbe::new(directory, reporter.clone());

        assert!(probe.test_connection().await);
        assert!(reporter.contains(ReportLevel::Success, "connection ok"));
    }

    #[tokio::test]
    async fn failure_reports_false_with_key_hint() {
        let directory = ScriptedDirectory::new();
        directory.push_listing_error("401 Unauthorized");
        let reporter = RecordingReporter::new();
        let probe = ConnectivityProbe::new(directory, reporter.clone());

        assert!(!probe.test_connection().await);
        assert!(reporter.contains(ReportLevel::Error, "401"));
        assert!(reporter.contains(ReportLevel::Info, "secret key"));
    }
}
