//! Identity provider abstraction for user lookup and allow-list inserts.

use std::future::Future;
use std::pin::Pin;

/// One user record from the provider's admin listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserRecord {
    /// Provider specific identifier for the user.
    pub id: String,
    /// E-mail address, absent for users registered without one.
    pub email: Option<String>,
}

/// Outcome of inserting a user into the allow-list table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrantOutcome {
    /// A new allow-list row was inserted.
    Granted,
    /// The row already existed; the insert was a no-op.
    AlreadyAllowed,
}

/// Future returned by directory operations.
pub type DirectoryFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Minimal interface implemented by identity providers.
pub trait UserDirectory {
    /// Provider specific error type returned by the directory.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Lists every user known to the provider.
    fn list_users(&self) -> DirectoryFuture<'_, Vec<UserRecord>, Self::Error>;

    /// Inserts the user identifier into the allow-list table.
    ///
    /// Implementations must report a duplicate-key condition as
    /// [`GrantOutcome::AlreadyAllowed`] rather than an error.
    fn insert_allowed_user<'a>(
        &'a self,
        user_id: &'a str,
    ) -> DirectoryFuture<'a, GrantOutcome, Self::Error>;
}
