use tracing::debug;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::constant::{
    CAPABILITIES_ALWAYS_ENABLED, CAPABILITIES_CONFIGURABLE, CapabilityFlags, ServerStatusFlags,
    UTF8MB4_GENERAL_CI,
};
use crate::error::{Error, Result};
use crate::protocol::connection::auth::{
    AuthPlugin, FAST_AUTH_SUCCESS, PERFORM_FULL_AUTHENTICATION, REQUEST_PUBLIC_KEY,
    encrypt_password_rsa,
};
use crate::protocol::primitive::*;
use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
#[repr(C, packed)]
struct HandshakeFixedFields {
    connection_id: U32LE,
    auth_data_part1: [u8; 8],
    filler: u8,
    capability_flags_lower: U16LE,
    charset: u8,
    status_flags: U16LE,
    capability_flags_upper: U16LE,
    auth_data_len: u8,
    reserved: [u8; 10],
}

/// HandshakeV10 sent by the server when the connection is opened
#[derive(Debug, Clone)]
pub struct InitialHandshake {
    pub protocol_version: u8,
    pub server_version: String,
    pub connection_id: u32,
    pub auth_plugin_data: Vec<u8>,
    pub capability_flags: CapabilityFlags,
    pub charset: u8,
    pub status_flags: ServerStatusFlags,
    pub auth_plugin_name: Vec<u8>,
}

/// Read initial handshake packet from server
pub fn read_initial_handshake(payload: &[u8]) -> Result<InitialHandshake> {
    let (protocol_version, data) = read_int_1(payload)?;

    if protocol_version == 0xFF {
        return Err(Error::AuthFailed(ErrPayload::try_from(ErrPayloadBytes(payload))?));
    }
    if protocol_version != 10 {
        return Err(Error::AuthError(format!(
            "unsupported protocol version {protocol_version}"
        )));
    }

    let (server_version, data) = read_string_null(data)?;
    let (fixed, data) =
        HandshakeFixedFields::ref_from_prefix(data).ok().ok_or(Error::UnexpectedEof)?;

    let cap_bits = (u32::from(fixed.capability_flags_upper.get()) << 16)
        | u32::from(fixed.capability_flags_lower.get());
    let capability_flags = CapabilityFlags::from_bits_truncate(cap_bits);
    if !capability_flags.contains(CapabilityFlags::CLIENT_PROTOCOL_41) {
        return Err(Error::AuthError(
            "server does not support the 4.1 protocol".to_string(),
        ));
    }

    let mut auth_plugin_data = fixed.auth_data_part1.to_vec();
    let mut data = data;
    if capability_flags.contains(CapabilityFlags::CLIENT_SECURE_CONNECTION) {
        // part 2 is at least 13 bytes and ends with NUL
        let part2_len = usize::from(fixed.auth_data_len).saturating_sub(8).max(13);
        let (part2, rest) = read_string_fix(data, part2_len)?;
        let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
        auth_plugin_data.extend_from_slice(part2);
        data = rest;
    }

    let auth_plugin_name = if capability_flags.contains(CapabilityFlags::CLIENT_PLUGIN_AUTH) {
        // some servers omit the NUL terminator
        read_string_null_or_eof(data).0.to_vec()
    } else {
        AuthPlugin::MysqlNativePassword.name().as_bytes().to_vec()
    };

    Ok(InitialHandshake {
        protocol_version,
        server_version: String::from_utf8_lossy(server_version).into_owned(),
        connection_id: fixed.connection_id.get(),
        auth_plugin_data,
        capability_flags,
        charset: fixed.charset,
        status_flags: ServerStatusFlags::from_bits_truncate(fixed.status_flags.get()),
        auth_plugin_name,
    })
}

/// Handshake response packet sent by client (HandshakeResponse41)
#[derive(Debug, Clone)]
pub struct HandshakeResponse41<'a> {
    pub capability_flags: CapabilityFlags,
    pub max_packet_size: u32,
    pub charset: u8,
    pub username: &'a str,
    pub auth_response: &'a [u8],
    pub database: Option<&'a str>,
    pub auth_plugin_name: &'a str,
}

/// Write handshake response packet (HandshakeResponse41)
pub fn write_handshake_response(out: &mut Vec<u8>, response: &HandshakeResponse41) {
    write_int_4(out, response.capability_flags.bits());
    write_int_4(out, response.max_packet_size);
    write_int_1(out, response.charset);
    // reserved (23 bytes of 0x00)
    out.extend_from_slice(&[0u8; 23]);

    write_string_null(out, response.username);

    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA)
    {
        write_bytes_lenenc(out, response.auth_response);
    } else {
        // scrambles are at most 32 bytes
        write_int_1(out, response.auth_response.len() as u8);
        out.extend_from_slice(response.auth_response);
    }

    if let Some(db) = response.database
        && response
            .capability_flags
            .contains(CapabilityFlags::CLIENT_CONNECT_WITH_DB)
    {
        write_string_null(out, db);
    }

    if response
        .capability_flags
        .contains(CapabilityFlags::CLIENT_PLUGIN_AUTH)
    {
        write_string_null(out, response.auth_plugin_name);
    }
}

/// SSLRequest: the first 32 bytes of HandshakeResponse41
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
struct SslRequest {
    client_flag: U32LE,
    max_packet_size: U32LE,
    character_set: u8,
    filler: [u8; 23],
}

/// Write SSL request packet (sent before HandshakeResponse when TLS is enabled)
pub fn write_ssl_request(
    out: &mut Vec<u8>,
    capability_flags: CapabilityFlags,
    max_packet_size: u32,
    charset: u8,
) {
    let request = SslRequest {
        client_flag: U32LE::new(capability_flags.bits()),
        max_packet_size: U32LE::new(max_packet_size),
        character_set: charset,
        filler: [0; 23],
    };
    out.extend_from_slice(request.as_bytes());
}

/// Auth switch request from server
#[derive(Debug, Clone)]
pub struct AuthSwitchRequest<'a> {
    pub plugin_name: &'a [u8],
    pub plugin_data: &'a [u8],
}

/// Read auth switch request (0xFE, plugin name NUL, plugin data with optional trailing NUL)
pub fn read_auth_switch_request(payload: &[u8]) -> Result<AuthSwitchRequest<'_>> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }
    let (plugin_name, data) = read_string_null(data)?;
    Ok(AuthSwitchRequest {
        plugin_name,
        plugin_data: data.strip_suffix(&[0]).unwrap_or(data),
    })
}

// ============================================================================
// State Machine API for Handshake
// ============================================================================

/// Configuration for handshake
#[derive(Debug, Clone, Default)]
pub struct HandshakeConfig {
    pub username: String,
    pub password: String,
    pub database: Option<String>,
    /// Requested configurable capabilities
    pub capabilities: CapabilityFlags,
    pub tls: bool,
    /// The transport is already private (Unix socket)
    pub secure_transport: bool,
    pub allow_public_key_retrieval: bool,
    /// Server RSA public key (PEM) for caching_sha2_password full authentication
    pub server_public_key: Option<Vec<u8>>,
    pub max_packet_size: u32,
}

/// Plugin and salt in use plus the negotiated capabilities
#[derive(Debug, Clone)]
pub struct AuthContext {
    plugin: AuthPlugin,
    salt: Vec<u8>,
    capability_flags: CapabilityFlags,
    plugin_name: String,
}

/// Result of driving the handshake state machine
#[derive(Debug)]
pub enum HandshakeResult {
    /// Initial handshake received - write the response, then read the next packet
    InitialHandshake {
        response: Vec<u8>,
        info: InitialHandshake,
    },
    /// Write the SSL request, upgrade the connection to TLS, then call `drive_after_tls()`
    SslRequest {
        request: Vec<u8>,
        info: InitialHandshake,
    },
    /// Write this packet to the server, then read the next packet
    Write(Vec<u8>),
    /// Read the next packet without writing anything
    Read,
    /// Handshake complete, connection established
    Connected { capability_flags: CapabilityFlags },
}

/// State machine for the MySQL handshake and authentication exchange
///
/// Pure parsing and packet generation without I/O. Any error leaves the machine in
/// `Failed`.
#[derive(Debug)]
pub enum Handshake {
    /// Waiting for the initial handshake from server
    AwaitingHandshake { config: HandshakeConfig },
    /// Sent SSLRequest; the response is sent once the stream is upgraded
    AwaitingTlsUpgrade {
        config: HandshakeConfig,
        auth: AuthContext,
    },
    /// Sent an auth response, waiting for OK/ERR/AuthSwitch/AuthMoreData
    AwaitingAuthResult {
        config: HandshakeConfig,
        auth: AuthContext,
    },
    /// Requested the server's RSA public key
    AwaitingPublicKey {
        config: HandshakeConfig,
        auth: AuthContext,
    },
    Authenticated,
    Failed,
}

impl Handshake {
    pub fn new(config: HandshakeConfig) -> Self {
        Self::AwaitingHandshake { config }
    }

    /// Drive the state machine with the next payload received from the server
    pub fn drive(&mut self, payload: &[u8]) -> Result<HandshakeResult> {
        match std::mem::replace(self, Self::Failed) {
            Self::AwaitingHandshake { config } => self.on_initial_handshake(config, payload),
            Self::AwaitingAuthResult { config, auth } => self.on_auth_result(config, auth, payload),
            Self::AwaitingPublicKey { config, auth } => self.on_public_key(config, auth, payload),
            Self::AwaitingTlsUpgrade { .. } | Self::Authenticated | Self::Failed => {
                Err(Error::InvalidPacket)
            }
        }
    }

    /// Continue the handshake after the stream has been upgraded to TLS
    pub fn drive_after_tls(&mut self) -> Result<HandshakeResult> {
        match std::mem::replace(self, Self::Failed) {
            Self::AwaitingTlsUpgrade { config, auth } => {
                let response = handshake_response(&config, &auth);
                *self = Self::AwaitingAuthResult { config, auth };
                Ok(HandshakeResult::Write(response))
            }
            _ => Err(Error::InvalidPacket),
        }
    }

    fn on_initial_handshake(
        &mut self,
        config: HandshakeConfig,
        payload: &[u8],
    ) -> Result<HandshakeResult> {
        let info = read_initial_handshake(payload)?;

        let mut client_caps =
            CAPABILITIES_ALWAYS_ENABLED | (config.capabilities & CAPABILITIES_CONFIGURABLE);
        if config.database.is_some() {
            client_caps |= CapabilityFlags::CLIENT_CONNECT_WITH_DB;
        }
        if config.tls {
            if !info.capability_flags.contains(CapabilityFlags::CLIENT_SSL) {
                return Err(Error::BadConfigError(
                    "TLS was requested but the server does not support it".to_string(),
                ));
            }
            client_caps |= CapabilityFlags::CLIENT_SSL;
        }
        let capability_flags = client_caps & info.capability_flags;

        let plugin = AuthPlugin::from_name(&info.auth_plugin_name)?;
        debug!(
            server_version = %info.server_version,
            connection_id = info.connection_id,
            plugin = plugin.name(),
            "received initial handshake"
        );
        let auth = AuthContext {
            plugin,
            salt: info.auth_plugin_data.clone(),
            capability_flags,
            plugin_name: plugin.name().to_string(),
        };

        if config.tls {
            let mut request = Vec::new();
            write_ssl_request(
                &mut request,
                capability_flags,
                config.max_packet_size,
                UTF8MB4_GENERAL_CI,
            );
            *self = Self::AwaitingTlsUpgrade { config, auth };
            return Ok(HandshakeResult::SslRequest { request, info });
        }

        let response = handshake_response(&config, &auth);
        *self = Self::AwaitingAuthResult { config, auth };
        Ok(HandshakeResult::InitialHandshake { response, info })
    }

    fn on_auth_result(
        &mut self,
        config: HandshakeConfig,
        mut auth: AuthContext,
        payload: &[u8],
    ) -> Result<HandshakeResult> {
        match payload.first() {
            Some(0x00) => {
                *self = Self::Authenticated;
                Ok(HandshakeResult::Connected {
                    capability_flags: auth.capability_flags,
                })
            }
            Some(0xFF) => Err(Error::AuthFailed(ErrPayload::try_from(ErrPayloadBytes(
                payload,
            ))?)),
            Some(0xFE) => {
                let switch = read_auth_switch_request(payload)?;
                let plugin = AuthPlugin::from_name(switch.plugin_name)?;
                debug!(from = auth.plugin.name(), to = plugin.name(), "auth plugin switch");
                auth.plugin = plugin;
                auth.plugin_name = plugin.name().to_string();
                auth.salt = switch.plugin_data.to_vec();
                let response = plugin.scramble(&config.password, &auth.salt);
                *self = Self::AwaitingAuthResult { config, auth };
                Ok(HandshakeResult::Write(response))
            }
            Some(0x01) if auth.plugin == AuthPlugin::CachingSha2Password => {
                match payload.get(1).copied() {
                    Some(FAST_AUTH_SUCCESS) => {
                        debug!("caching_sha2_password fast auth succeeded");
                        *self = Self::AwaitingAuthResult { config, auth };
                        Ok(HandshakeResult::Read)
                    }
                    Some(PERFORM_FULL_AUTHENTICATION) => self.full_authentication(config, auth),
                    _ => Err(Error::InvalidPacket),
                }
            }
            _ => Err(Error::InvalidPacket),
        }
    }

    fn full_authentication(
        &mut self,
        config: HandshakeConfig,
        auth: AuthContext,
    ) -> Result<HandshakeResult> {
        let secure = config.secure_transport
            || auth.capability_flags.contains(CapabilityFlags::CLIENT_SSL);
        let response = if secure {
            debug!("caching_sha2_password full auth over a secure channel");
            let mut response = config.password.as_bytes().to_vec();
            response.push(0);
            response
        } else if let Some(pem) = &config.server_public_key {
            debug!("caching_sha2_password full auth with configured server key");
            encrypt_password_rsa(&config.password, &auth.salt, pem)?
        } else if config.allow_public_key_retrieval {
            debug!("requesting server public key");
            *self = Self::AwaitingPublicKey { config, auth };
            return Ok(HandshakeResult::Write(vec![REQUEST_PUBLIC_KEY]));
        } else {
            return Err(Error::InsecureAuth);
        };
        *self = Self::AwaitingAuthResult { config, auth };
        Ok(HandshakeResult::Write(response))
    }

    fn on_public_key(
        &mut self,
        config: HandshakeConfig,
        auth: AuthContext,
        payload: &[u8],
    ) -> Result<HandshakeResult> {
        match payload.split_first() {
            Some((0x01, pem)) => {
                let response = encrypt_password_rsa(&config.password, &auth.salt, pem)?;
                *self = Self::AwaitingAuthResult { config, auth };
                Ok(HandshakeResult::Write(response))
            }
            Some((0xFF, _)) => Err(Error::AuthFailed(ErrPayload::try_from(ErrPayloadBytes(
                payload,
            ))?)),
            _ => Err(Error::InvalidPacket),
        }
    }
}

fn handshake_response(config: &HandshakeConfig, auth: &AuthContext) -> Vec<u8> {
    let auth_response = auth.plugin.scramble(&config.password, &auth.salt);
    let response = HandshakeResponse41 {
        capability_flags: auth.capability_flags,
        max_packet_size: config.max_packet_size,
        charset: UTF8MB4_GENERAL_CI,
        username: &config.username,
        auth_response: &auth_response,
        database: config.database.as_deref(),
        auth_plugin_name: &auth.plugin_name,
    };
    let mut out = Vec::new();
    write_handshake_response(&mut out, &response);
    out
}
