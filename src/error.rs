use thiserror::Error;

/// Errors that can occur during a client session.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The login frame could not be split into exactly `user:password`.
    #[error("malformed login frame")]
    MalformedLogin,
    /// The username is unknown or the password does not match.
    #[error("invalid username or password")]
    InvalidCredentials,
    /// The connection was closed by the remote peer.
    #[error("connection closed")]
    ConnectionClosed,
    /// The client did not complete the login phase in time.
    #[error("login timed out")]
    LoginTimeout,
    /// Underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
