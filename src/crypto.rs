//! Tuya protocol encryption and decryption logic.
//! AES-128-ECB with PKCS#7 padding, as used by protocol versions 3.1 to 3.3.

use crate::error::{Result, TuyaError};
use aes::Aes128;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit};
use ecb::{Decryptor, Encryptor};
use serde::{Deserialize, Serialize};

const BLOCK_SIZE: usize = 16;

/// How PKCS#7 padding is checked when decrypting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaddingMode {
    /// Every padding byte must be present and correct, otherwise
    /// decryption fails with `TuyaError::Protocol`.
    Strict,
    /// A padding count of 0, above 16 or above the buffer length leaves the
    /// buffer untouched. Real devices sometimes answer with truncated or
    /// return-coded frames; this keeps status reporting best-effort.
    #[default]
    Lenient,
}

/// TuyaCipher provides AES-128-ECB encryption and decryption under a device's local key.
pub struct TuyaCipher {
    /// 16-byte encryption key
    key: [u8; 16],
}

impl TuyaCipher {
    /// Create a new TuyaCipher. The key bytes are used as-is, without derivation.
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() != BLOCK_SIZE {
            return Err(TuyaError::Crypto(format!(
                "key must be 16 bytes, got {}",
                key.len()
            )));
        }
        let mut k = [0u8; 16];
        k.copy_from_slice(key);
        Ok(Self { key: k })
    }

    /// Pads `data` with PKCS#7 and encrypts every block independently.
    pub fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut encryptor = Encryptor::<Aes128>::new(&self.key.into());
        let mut ciphertext = pad(data);

        for chunk in ciphertext.chunks_mut(BLOCK_SIZE) {
            let block = cipher::generic_array::GenericArray::from_mut_slice(chunk);
            encryptor.encrypt_block_mut(block);
        }

        Ok(ciphertext)
    }

    /// Decrypts `data` and strips its padding according to `mode`.
    pub fn decrypt(&self, data: &[u8], mode: PaddingMode) -> Result<Vec<u8>> {
        if !data.len().is_multiple_of(BLOCK_SIZE) {
            return Err(TuyaError::Crypto(format!(
                "ciphertext length {} is not a multiple of {}",
                data.len(),
                BLOCK_SIZE
            )));
        }

        let mut decryptor = Decryptor::<Aes128>::new(&self.key.into());
        let mut plaintext = data.to_vec();

        for chunk in plaintext.chunks_mut(BLOCK_SIZE) {
            let block = cipher::generic_array::GenericArray::from_mut_slice(chunk);
            decryptor.decrypt_block_mut(block);
        }

        unpad(plaintext, mode)
    }
}

/// Encrypts `plaintext` under a 16-byte ASCII key.
pub fn encrypt(plaintext: &[u8], key: &[u8]) -> Result<Vec<u8>> {
    TuyaCipher::new(key)?.encrypt(plaintext)
}

/// Decrypts `ciphertext` under a 16-byte ASCII key.
pub fn decrypt(ciphertext: &[u8], key: &[u8], mode: PaddingMode) -> Result<Vec<u8>> {
    TuyaCipher::new(key)?.decrypt(ciphertext, mode)
}

/// PKCS#7 pad to a multiple of 16. An aligned buffer gains a full block of 0x10.
pub fn pad(data: &[u8]) -> Vec<u8> {
    let padding_len = BLOCK_SIZE - data.len() % BLOCK_SIZE;
    let mut padded = Vec::with_capacity(data.len() + padding_len);
    padded.extend_from_slice(data);
    padded.resize(data.len() + padding_len, padding_len as u8);
    padded
}

/// Removes PKCS#7 padding.
pub fn unpad(mut data: Vec<u8>, mode: PaddingMode) -> Result<Vec<u8>> {
    let Some(&last) = data.last() else {
        return match mode {
            PaddingMode::Lenient => Ok(data),
            PaddingMode::Strict => Err(TuyaError::Protocol("invalid padding".into())),
        };
    };

    let pad_len = last as usize;
    let in_range = pad_len != 0 && pad_len <= BLOCK_SIZE && pad_len <= data.len();

    match mode {
        PaddingMode::Lenient => {
            if in_range {
                data.truncate(data.len() - pad_len);
            }
            Ok(data)
        }
        PaddingMode::Strict => {
            if !in_range || data[data.len() - pad_len..].iter().any(|&b| b != last) {
                return Err(TuyaError::Protocol("invalid padding".into()));
            }
            data.truncate(data.len() - pad_len);
            Ok(data)
        }
    }
}
