use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("Authentication failed: {0}")]
    AuthFailed(ErrPayload),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unsupported authentication plugin: {0}")]
    UnsupportedAuthPlugin(String),

    #[error(
        "caching_sha2_password full authentication requires TLS, a server public key, or allow_public_key_retrieval"
    )]
    InsecureAuth,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    #[error("Packet out of order: expected sequence id {expected}, got {actual}")]
    PacketOutOfOrder { expected: u8, actual: u8 },

    #[error("Packet too large: {length} bytes exceeds max_allowed_packet ({max})")]
    PacketTooLarge { length: usize, max: usize },

    #[error("Connection is broken: {0}")]
    ConnectionBroken(&'static str),

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl Error {
    /// Whether the connection that produced this error must be discarded.
    ///
    /// Server errors are reported after the whole response was consumed, and usage/config
    /// errors are raised before anything is written, so neither affects the session.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::ServerError(_) | Error::BadUsageError(_) | Error::BadConfigError(_)
        )
    }

    /// The server-reported error, if any (including authentication rejections)
    pub fn server_error(&self) -> Option<&ErrPayload> {
        match self {
            Error::ServerError(err) | Error::AuthFailed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Error::AuthFailed(_)
                | Error::AuthError(_)
                | Error::UnsupportedAuthPlugin(_)
                | Error::InsecureAuth
        )
    }
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
