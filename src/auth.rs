use crate::error::ServerError;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Username → password table, read-only after construction.
///
/// Lookup is by exact username; the password comparison is byte-exact, no
/// trimming or case folding.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    users: HashMap<String, String>,
}

impl CredentialStore {
    /// Build a store from username → password entries.
    #[must_use]
    pub fn new(users: HashMap<String, String>) -> Self {
        Self { users }
    }

    /// Returns `true` iff `username` exists and `password` matches exactly.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> bool {
        self.users.get(username).is_some_and(|p| p == password)
    }

    /// Number of registered users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if no users are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Split a login frame into `(username, password)`.
///
/// The frame must contain exactly one `:`. Empty parts are accepted here and
/// rejected by the credential lookup.
fn parse_login(frame: &str) -> Result<(&str, &str), ServerError> {
    let parts: Vec<&str> = frame.split(':').collect();
    let [username, password] = parts[..] else {
        return Err(ServerError::MalformedLogin);
    };
    Ok((username, password))
}

/// Read the single login frame from `reader` and verify it against `store`,
/// returning the authenticated username.
///
/// Consumes exactly one read. No retries: the caller terminates the
/// connection on any error.
///
/// # Errors
///
/// [`ServerError::ConnectionClosed`] if the peer closed before logging in,
/// [`ServerError::MalformedLogin`] / [`ServerError::InvalidCredentials`] on a
/// bad frame, or [`ServerError::Io`] on a transport fault.
pub async fn authenticate<R>(
    reader: &mut R,
    store: &CredentialStore,
    max_frame: usize,
) -> Result<String, ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; max_frame];
    let n = reader.read(&mut buf).await?;
    if n == 0 {
        return Err(ServerError::ConnectionClosed);
    }

    let frame = String::from_utf8_lossy(&buf[..n]);
    let (username, password) = parse_login(&frame)?;

    if !store.verify(username, password) {
        return Err(ServerError::InvalidCredentials);
    }
    Ok(username.to_string())
}
