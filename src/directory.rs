use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Formatter;

/// Identifier of a single relay connection. Unique for the lifetime of a [crate::Relay].
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        ConnectionId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// What happens when an email joins while another connection still holds it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The newer connection takes over the email, the older one loses its mapping.
    #[default]
    Evict,
    /// The newer join is refused and the existing mapping stays in place.
    Reject,
}

/// Result of a successful [SessionDirectory::record_join].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new mapping was stored.
    Recorded,
    /// The same connection joined again under the same email.
    Unchanged,
    /// The email was taken over from the given connection.
    Evicted(ConnectionId),
}

/// Bidirectional email <-> connection lookup.
#[derive(Debug, Default)]
pub struct SessionDirectory {
    by_email: HashMap<String, ConnectionId>,
    by_connection: HashMap<ConnectionId, String>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `connection` joined as `email`.
    ///
    /// A connection holds at most one email: joining under a new one releases the previous
    /// mapping. When `email` is held by a different connection the `policy` decides between
    /// evicting that connection and refusing this join with [Error::DuplicateEmail].
    pub fn record_join(
        &mut self,
        email: &str,
        connection: ConnectionId,
        policy: DuplicatePolicy,
    ) -> Result<JoinOutcome, Error> {
        let mut outcome = JoinOutcome::Recorded;
        match self.by_email.get(email) {
            Some(&holder) if holder == connection => return Ok(JoinOutcome::Unchanged),
            Some(&holder) => match policy {
                DuplicatePolicy::Reject => return Err(Error::DuplicateEmail(email.to_owned())),
                DuplicatePolicy::Evict => {
                    self.by_connection.remove(&holder);
                    outcome = JoinOutcome::Evicted(holder);
                }
            },
            None => {}
        }

        if let Some(previous) = self.by_connection.insert(connection, email.to_owned()) {
            if self.by_email.get(&previous) == Some(&connection) {
                self.by_email.remove(&previous);
            }
        }
        self.by_email.insert(email.to_owned(), connection);
        Ok(outcome)
    }

    pub fn resolve(&self, email: &str) -> Option<ConnectionId> {
        self.by_email.get(email).copied()
    }

    pub fn email_of(&self, connection: ConnectionId) -> Option<&str> {
        self.by_connection.get(&connection).map(String::as_str)
    }

    /// Removes everything known about `connection`, returning the email it was joined under.
    pub fn forget(&mut self, connection: ConnectionId) -> Option<String> {
        let email = self.by_connection.remove(&connection)?;
        if self.by_email.get(&email) == Some(&connection) {
            self.by_email.remove(&email);
        }
        Some(email)
    }

    pub fn len(&self) -> usize {
        self.by_email.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_email.is_empty()
    }
}

#[cfg(test)]
mod test {
    use crate::directory::{ConnectionId, DuplicatePolicy, JoinOutcome, SessionDirectory};
    use crate::error::Error;

    const A: ConnectionId = ConnectionId(1);
    const B: ConnectionId = ConnectionId(2);

    #[test]
    fn resolve_until_forgotten() -> Result<(), Error> {
        let mut dir = SessionDirectory::new();
        assert_eq!(
            dir.record_join("a@x.com", A, DuplicatePolicy::Evict)?,
            JoinOutcome::Recorded
        );
        assert_eq!(dir.resolve("a@x.com"), Some(A));
        assert_eq!(dir.email_of(A), Some("a@x.com"));

        assert_eq!(dir.forget(A).as_deref(), Some("a@x.com"));
        assert_eq!(dir.resolve("a@x.com"), None);
        assert_eq!(dir.email_of(A), None);
        assert!(dir.is_empty());
        Ok(())
    }

    #[test]
    fn forget_unknown_connection() {
        let mut dir = SessionDirectory::new();
        assert_eq!(dir.forget(A), None);
    }

    #[test]
    fn rejoin_same_email_is_unchanged() -> Result<(), Error> {
        let mut dir = SessionDirectory::new();
        dir.record_join("a@x.com", A, DuplicatePolicy::Reject)?;
        assert_eq!(
            dir.record_join("a@x.com", A, DuplicatePolicy::Reject)?,
            JoinOutcome::Unchanged
        );
        assert_eq!(dir.len(), 1);
        Ok(())
    }

    #[test]
    fn duplicate_email_evicts_older_connection() -> Result<(), Error> {
        let mut dir = SessionDirectory::new();
        dir.record_join("a@x.com", A, DuplicatePolicy::Evict)?;
        assert_eq!(
            dir.record_join("a@x.com", B, DuplicatePolicy::Evict)?,
            JoinOutcome::Evicted(A)
        );
        assert_eq!(dir.resolve("a@x.com"), Some(B));
        assert_eq!(dir.email_of(A), None);

        // the evicted connection going away must not drop the new owner
        assert_eq!(dir.forget(A), None);
        assert_eq!(dir.resolve("a@x.com"), Some(B));
        Ok(())
    }

    #[test]
    fn duplicate_email_rejected() -> Result<(), Error> {
        let mut dir = SessionDirectory::new();
        dir.record_join("a@x.com", A, DuplicatePolicy::Reject)?;
        let err = dir
            .record_join("a@x.com", B, DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEmail(email) if email == "a@x.com"));
        assert_eq!(dir.resolve("a@x.com"), Some(A));
        assert_eq!(dir.email_of(B), None);
        Ok(())
    }

    #[test]
    fn joining_under_new_email_releases_old_one() -> Result<(), Error> {
        let mut dir = SessionDirectory::new();
        dir.record_join("a@x.com", A, DuplicatePolicy::Evict)?;
        dir.record_join("alias@x.com", A, DuplicatePolicy::Evict)?;
        assert_eq!(dir.resolve("a@x.com"), None);
        assert_eq!(dir.resolve("alias@x.com"), Some(A));
        assert_eq!(dir.len(), 1);
        Ok(())
    }
}
