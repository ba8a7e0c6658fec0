//! Stored-image handling: JPEG encoding, digests, optional sealing.
//!
//! When a key file is configured the store seals each JPEG with
//! AES-256-GCM (random 96-bit nonce prepended to the ciphertext);
//! otherwise it writes plain JPEG.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use image::RgbImage;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum ImageStoreError {
    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("key file {0} must be exactly 32 bytes")]
    BadKey(PathBuf),
    #[error("image sealing failed")]
    Seal,
    #[error("sealed file is truncated: {0}")]
    Truncated(PathBuf),
}

/// Where and how uploaded images are kept.
#[derive(Debug)]
pub struct ImageStore {
    dir: PathBuf,
    key: Option<[u8; KEY_LEN]>,
}

/// Outcome of storing one image.
pub struct StoredImage {
    pub path: PathBuf,
    pub sha256: String,
    pub encrypted: bool,
}

impl ImageStore {
    /// Open the store. When `key_path` is set the sealing key is read
    /// from it, generated on first use (0600).
    pub fn open(dir: PathBuf, key_path: Option<&Path>) -> Result<Self, ImageStoreError> {
        std::fs::create_dir_all(&dir)?;
        let key = key_path.map(load_or_create_key).transpose()?;
        if key.is_some() {
            tracing::info!(dir = %dir.display(), "image store sealing enabled");
        }
        Ok(Self { dir, key })
    }

    pub fn is_sealing(&self) -> bool {
        self.key.is_some()
    }

    /// Encode the upload as JPEG, digest it, optionally seal, and write.
    pub fn save(&self, session_id: &str, image: &RgbImage) -> Result<StoredImage, ImageStoreError> {
        let mut jpeg = Vec::new();
        image.write_to(&mut Cursor::new(&mut jpeg), image::ImageFormat::Jpeg)?;
        let sha256 = hex_digest(&jpeg);

        match &self.key {
            Some(key) => {
                let path = self.dir.join(format!("{session_id}.jpg.enc"));
                std::fs::write(&path, seal(key, &jpeg)?)?;
                Ok(StoredImage { path, sha256, encrypted: true })
            }
            None => {
                let path = self.dir.join(format!("{session_id}.jpg"));
                std::fs::write(&path, &jpeg)?;
                Ok(StoredImage { path, sha256, encrypted: false })
            }
        }
    }

    /// Read a stored image back as JPEG bytes, unsealing when needed.
    pub fn load(&self, path: &Path) -> Result<Vec<u8>, ImageStoreError> {
        let bytes = std::fs::read(path)?;
        match &self.key {
            Some(key) if path.extension().is_some_and(|e| e == "enc") => unseal(key, &bytes, path),
            _ => Ok(bytes),
        }
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn seal(key: &[u8; KEY_LEN], plain: &[u8]) -> Result<Vec<u8>, ImageStoreError> {
    let cipher = Aes256Gcm::new(key.into());
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plain)
        .map_err(|_| ImageStoreError::Seal)?;

    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(out)
}

fn unseal(key: &[u8; KEY_LEN], bytes: &[u8], path: &Path) -> Result<Vec<u8>, ImageStoreError> {
    if bytes.len() < NONCE_LEN {
        return Err(ImageStoreError::Truncated(path.to_path_buf()));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_LEN);
    Aes256Gcm::new(key.into())
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| ImageStoreError::Seal)
}

fn load_or_create_key(path: &Path) -> Result<[u8; KEY_LEN], ImageStoreError> {
    if path.exists() {
        let bytes = std::fs::read(path)?;
        return bytes
            .try_into()
            .map_err(|_| ImageStoreError::BadKey(path.to_path_buf()));
    }

    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, key)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    tracing::info!(path = %path.display(), "generated image sealing key");
    Ok(key)
}
