use rand::rngs::OsRng;
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// caching_sha2_password: request the server's RSA public key
pub const REQUEST_PUBLIC_KEY: u8 = 0x02;
/// caching_sha2_password: the scramble matched the server's cache
pub const FAST_AUTH_SUCCESS: u8 = 0x03;
/// caching_sha2_password: the server needs the password itself
pub const PERFORM_FULL_AUTHENTICATION: u8 = 0x04;

/// Authentication plugins understood by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    MysqlNativePassword,
    CachingSha2Password,
}

impl AuthPlugin {
    pub fn from_name(name: &[u8]) -> Result<Self> {
        match name {
            b"mysql_native_password" => Ok(Self::MysqlNativePassword),
            b"caching_sha2_password" => Ok(Self::CachingSha2Password),
            other => Err(Error::UnsupportedAuthPlugin(
                String::from_utf8_lossy(other).into_owned(),
            )),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MysqlNativePassword => "mysql_native_password",
            Self::CachingSha2Password => "caching_sha2_password",
        }
    }

    /// Compute the auth response for `password` and the server's salt.
    ///
    /// An empty password yields an empty response.
    pub fn scramble(self, password: &str, salt: &[u8]) -> Vec<u8> {
        if password.is_empty() {
            return Vec::new();
        }
        match self {
            Self::MysqlNativePassword => scramble_native_password(password, salt).to_vec(),
            Self::CachingSha2Password => scramble_caching_sha2(password, salt).to_vec(),
        }
    }
}

/// mysql_native_password: SHA1(password) XOR SHA1(salt + SHA1(SHA1(password)))
pub fn scramble_native_password(password: &str, salt: &[u8]) -> [u8; 20] {
    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);
    let token = Sha1::new().chain_update(salt).chain_update(stage2).finalize();

    let mut result = [0u8; 20];
    for (out, (a, b)) in result.iter_mut().zip(stage1.iter().zip(token.iter())) {
        *out = a ^ b;
    }
    result
}

/// caching_sha2_password: SHA256(password) XOR SHA256(SHA256(SHA256(password)) + salt)
pub fn scramble_caching_sha2(password: &str, salt: &[u8]) -> [u8; 32] {
    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);
    let scramble = Sha256::new().chain_update(stage2).chain_update(salt).finalize();

    let mut result = [0u8; 32];
    for (out, (a, b)) in result.iter_mut().zip(stage1.iter().zip(scramble.iter())) {
        *out = a ^ b;
    }
    result
}

/// Encrypt `password` for caching_sha2_password full authentication on an insecure channel.
///
/// The NUL-terminated password is XORed with the salt (repeated) and encrypted with the
/// server's RSA public key using OAEP padding.
pub fn encrypt_password_rsa(password: &str, salt: &[u8], public_key_pem: &[u8]) -> Result<Vec<u8>> {
    if salt.is_empty() {
        return Err(Error::AuthError("empty salt".to_string()));
    }
    let mut plain = Vec::with_capacity(password.len() + 1);
    plain.extend_from_slice(password.as_bytes());
    plain.push(0);
    for (byte, salt_byte) in plain.iter_mut().zip(salt.iter().cycle()) {
        *byte ^= salt_byte;
    }

    let pem = simdutf8::basic::from_utf8(public_key_pem)
        .map_err(|e| Error::AuthError(format!("server public key is not valid PEM: {e}")))?;
    let public_key = RsaPublicKey::from_public_key_pem(pem)
        .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::AuthError(format!("failed to parse server public key: {e}")))?;

    public_key
        .encrypt(&mut OsRng, rsa::Oaep::new::<Sha1>(), &plain)
        .map_err(|e| Error::AuthError(format!("RSA encryption failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};

    const SALT: [u8; 20] = [
        0x3d, 0x4c, 0x5e, 0x2f, 0x1a, 0x0b, 0x7c, 0x8d, 0x9e, 0xaf, 0x10, 0x21, 0x32, 0x43, 0x54,
        0x65, 0x76, 0x87, 0x98, 0xa9,
    ];

    #[test]
    fn sha256_of_password() {
        assert_eq!(
            Sha256::digest(b"vapor").as_slice(),
            &[
                0xFB, 0x7A, 0xE6, 0x94, 0xBA, 0x3F, 0xD9, 0x0A, 0xE3, 0x90, 0x9C, 0xCC, 0xCD, 0x0B,
                0xE0, 0xDA, 0xE9, 0x88, 0xE7, 0x02, 0x96, 0xD7, 0x09, 0x9B, 0xC5, 0x70, 0x8A, 0x87,
                0x2F, 0x4C, 0xC1, 0x72,
            ]
        );
    }

    #[test]
    fn caching_sha2_scramble_unmasks_to_password_hash() {
        let response = scramble_caching_sha2("vapor", &SALT);
        // what the server does with its cached SHA256(SHA256(password))
        let stage2 = Sha256::digest(Sha256::digest(b"vapor"));
        let mask = Sha256::new().chain_update(stage2).chain_update(SALT).finalize();
        let unmasked: Vec<u8> = response.iter().zip(mask.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(unmasked.as_slice(), Sha256::digest(b"vapor").as_slice());
    }

    #[test]
    fn native_scramble_unmasks_to_password_hash() {
        let response = scramble_native_password("secret", &SALT);
        let stage2 = Sha1::digest(Sha1::digest(b"secret"));
        let mask = Sha1::new().chain_update(SALT).chain_update(stage2).finalize();
        let unmasked: Vec<u8> = response.iter().zip(mask.iter()).map(|(a, b)| a ^ b).collect();
        assert_eq!(unmasked.as_slice(), Sha1::digest(b"secret").as_slice());
    }

    #[test]
    fn empty_password_gives_empty_response() {
        assert!(AuthPlugin::MysqlNativePassword.scramble("", &SALT).is_empty());
        assert!(AuthPlugin::CachingSha2Password.scramble("", &SALT).is_empty());
        assert_eq!(AuthPlugin::CachingSha2Password.scramble("x", &SALT).len(), 32);
        assert_eq!(AuthPlugin::MysqlNativePassword.scramble("x", &SALT).len(), 20);
    }

    #[test]
    fn plugin_names() {
        for plugin in [AuthPlugin::MysqlNativePassword, AuthPlugin::CachingSha2Password] {
            assert_eq!(AuthPlugin::from_name(plugin.name().as_bytes()).unwrap(), plugin);
        }
        assert!(matches!(
            AuthPlugin::from_name(b"sha256_password"),
            Err(Error::UnsupportedAuthPlugin(name)) if name == "sha256_password"
        ));
    }

    #[test]
    fn rsa_encrypted_password_decrypts_to_salted_password() {
        let private_key = RsaPrivateKey::new(&mut OsRng, 1024).unwrap();
        let pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();

        let encrypted = encrypt_password_rsa("vapor", &SALT, pem.as_bytes()).unwrap();
        let decrypted = private_key
            .decrypt(rsa::Oaep::new::<Sha1>(), &encrypted)
            .unwrap();
        let password: Vec<u8> = decrypted
            .iter()
            .zip(SALT.iter().cycle())
            .map(|(a, b)| a ^ b)
            .collect();
        assert_eq!(password, b"vapor\0");
    }

    #[test]
    fn rsa_rejects_garbage_key() {
        assert!(matches!(
            encrypt_password_rsa("vapor", &SALT, b"not a key"),
            Err(Error::AuthError(_))
        ));
    }
}
