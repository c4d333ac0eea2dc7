mod auth;
mod handshake;

pub use auth::AuthPlugin;
pub use auth::{scramble_caching_sha2, scramble_native_password};

pub use handshake::AuthSwitchRequest;
pub use handshake::Handshake;
pub use handshake::HandshakeConfig;
pub use handshake::HandshakeResponse41;
pub use handshake::HandshakeResult;
pub use handshake::InitialHandshake;
pub use handshake::{read_initial_handshake, write_handshake_response, write_ssl_request};
