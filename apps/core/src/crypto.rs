use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

pub const KEY_FILE_NAME: &str = "key.bin";
const KEY_ROUNDS: usize = 10_000;
const IV_LEN: usize = 16;
const TAG_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("failed to read key file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write key file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unusable key material")]
    InvalidKey,
}

/// Iterated SHA-256 over `password || salt`.
pub fn derive_key(password: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(password.len() + salt.len());
    key.extend_from_slice(password);
    key.extend_from_slice(salt);
    for _ in 0..KEY_ROUNDS {
        key = Sha256::digest(&key).to_vec();
    }
    key
}

/// Returns the key stored in `dir`, creating one on first use. A fresh key is
/// stretched from a random seed mixed with host-specific material.
pub fn load_or_create_key(dir: &Path) -> Result<Vec<u8>, CryptoError> {
    let path = dir.join(KEY_FILE_NAME);
    match std::fs::read(&path) {
        Ok(key) if !key.is_empty() => return Ok(key),
        Ok(_) => debug!(path = %path.display(), "key file empty; regenerating"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => return Err(CryptoError::Read { path, source }),
    }

    let key = derive_key(&host_material(), &random_salt());
    write_private(&path, &key)?;
    info!(path = %path.display(), "created clipboard history key");
    Ok(key)
}

fn random_salt() -> Vec<u8> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let seed = format!("{millis}{}", rand::random::<u64>());
    Sha256::digest(seed.as_bytes()).to_vec()
}

fn host_material() -> Vec<u8> {
    let mut material = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        material.extend_from_slice(exe_dir.to_string_lossy().as_bytes());
    }
    if let Some(home) = dirs::home_dir() {
        material.extend_from_slice(home.to_string_lossy().as_bytes());
    }
    material.extend_from_slice(gethostname::gethostname().to_string_lossy().as_bytes());
    material.extend_from_slice(rand::random::<u64>().to_string().as_bytes());
    material
}

fn write_private(path: &Path, bytes: &[u8]) -> Result<(), CryptoError> {
    let write_err = |source| CryptoError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(write_err)?;
        file.write_all(bytes).map_err(write_err)?;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .map_err(write_err)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, bytes).map_err(write_err)?;
    }

    Ok(())
}

/// Keystream cipher for stored clipboard fields. Output layout is
/// `tag(32) || iv(16) || ciphertext`, the tag being HMAC-SHA256 over `iv || ciphertext`.
#[derive(Clone)]
pub struct HistoryCipher {
    key: Vec<u8>,
    mac: HmacSha256,
}

impl HistoryCipher {
    pub fn new(key: Vec<u8>) -> Result<Self, CryptoError> {
        let mac = HmacSha256::new_from_slice(&key).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { key, mac })
    }

    pub fn encrypt(&self, plain: &str) -> Vec<u8> {
        let data = plain.as_bytes();
        if data.is_empty() {
            return Vec::new();
        }

        let mut iv = [0u8; IV_LEN];
        rand::rng().fill_bytes(&mut iv);

        let stream = self.keystream(data.len());
        let mut sealed = Vec::with_capacity(IV_LEN + data.len());
        sealed.extend_from_slice(&iv);
        sealed.extend(
            data.iter()
                .enumerate()
                .map(|(i, byte)| byte ^ (stream[i] ^ iv[i % IV_LEN])),
        );

        let mut mac = self.mac.clone();
        mac.update(&sealed);
        let tag = mac.finalize().into_bytes();

        let mut out = Vec::with_capacity(TAG_LEN + sealed.len());
        out.extend_from_slice(&tag);
        out.extend_from_slice(&sealed);
        out
    }

    /// Never fails: short input or a tag mismatch yields the raw bytes read as text.
    pub fn decrypt(&self, data: &[u8]) -> String {
        if data.len() < TAG_LEN + IV_LEN {
            return String::from_utf8_lossy(data).into_owned();
        }

        let (tag, sealed) = data.split_at(TAG_LEN);
        let mut mac = self.mac.clone();
        mac.update(sealed);
        if mac.verify_slice(tag).is_err() {
            debug!(len = data.len(), "clipboard record failed integrity check");
            return String::from_utf8_lossy(data).into_owned();
        }

        let (iv, cipher) = sealed.split_at(IV_LEN);
        let stream = self.keystream(cipher.len());
        let plain: Vec<u8> = cipher
            .iter()
            .enumerate()
            .map(|(i, byte)| byte ^ (stream[i] ^ iv[i % IV_LEN]))
            .collect();
        String::from_utf8_lossy(&plain).into_owned()
    }

    /// `key || H(key) || H(H(key)) || ...`, each block hashed from the one before.
    fn keystream(&self, len: usize) -> Vec<u8> {
        let mut stream = Vec::with_capacity(len.max(self.key.len()) + TAG_LEN);
        stream.extend_from_slice(&self.key);
        let mut block = Sha256::digest(&self.key);
        while stream.len() < len {
            stream.extend_from_slice(&block);
            block = Sha256::digest(block);
        }
        stream
    }
}

#[cfg(test)]
mod tests {
    use super::{derive_key, load_or_create_key, HistoryCipher, KEY_FILE_NAME};

    fn cipher() -> HistoryCipher {
        HistoryCipher::new(derive_key(b"host", b"salt")).unwrap()
    }

    #[test]
    fn derived_key_is_256_bits_and_stable() {
        let a = derive_key(b"host", b"salt");
        assert_eq!(a.len(), 32);
        assert_eq!(a, derive_key(b"host", b"salt"));
        assert_ne!(a, derive_key(b"host", b"pepper"));
    }

    #[test]
    fn round_trips_long_text() {
        let cipher = cipher();
        let text = "clipboard ✓ line\n".repeat(700);
        assert!(text.len() > 10 * 1024);
        let sealed = cipher.encrypt(&text);
        assert_eq!(cipher.decrypt(&sealed), text);
    }

    #[test]
    fn keystream_blocks_chain_from_the_previous_block() {
        use sha2::{Digest, Sha256};

        let cipher = cipher();
        let stream = cipher.keystream(100);
        let first = Sha256::digest(&cipher.key);
        let second = Sha256::digest(first);
        let third = Sha256::digest(second);
        assert_eq!(&stream[..32], cipher.key.as_slice());
        assert_eq!(&stream[32..64], first.as_slice());
        assert_eq!(&stream[64..96], second.as_slice());
        assert_eq!(&stream[96..128], third.as_slice());
    }

    #[test]
    fn large_records_encrypt_in_linear_time() {
        let cipher = cipher();
        let text = "0123456789abcdef".repeat(64 * 1024);
        assert_eq!(text.len(), 1024 * 1024);

        let started = std::time::Instant::now();
        let sealed = cipher.encrypt(&text);
        assert_eq!(cipher.decrypt(&sealed), text);
        assert!(
            started.elapsed() < std::time::Duration::from_secs(3),
            "1 MiB round trip took {:?}",
            started.elapsed()
        );
    }

    #[test]
    fn each_encryption_uses_a_fresh_iv() {
        let cipher = cipher();
        assert_ne!(cipher.encrypt("same"), cipher.encrypt("same"));
    }

    #[test]
    fn tampered_record_falls_back_to_raw_bytes() {
        let cipher = cipher();
        let mut sealed = cipher.encrypt("secret value");
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        let recovered = cipher.decrypt(&sealed);
        assert_ne!(recovered, "secret value");
        assert_eq!(recovered, String::from_utf8_lossy(&sealed));
    }

    #[test]
    fn short_input_is_read_as_plain_text() {
        assert_eq!(cipher().decrypt(b"legacy entry"), "legacy entry");
        assert_eq!(cipher().decrypt(b""), "");
    }

    #[test]
    fn key_file_is_created_once_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let first = load_or_create_key(dir.path()).unwrap();
        let second = load_or_create_key(dir.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 32);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(dir.path().join(KEY_FILE_NAME))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }
}
