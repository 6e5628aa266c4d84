//! AES-256-CBC with zero padding.
//!
//! The wire format prepends a random 16-byte IV to the ciphertext. Plaintext
//! is right-padded with zero bytes to a block multiple before encryption, and
//! the padding is NOT stripped on decryption: the text MAC covers the padded
//! plaintext, so both peers must see identical bytes.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::ChatError;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Generate a 32-byte AES-256 key from the system random source.
pub fn generate_key() -> Result<[u8; 32], ChatError> {
    let mut key = [0u8; 32];
    OsRng.try_fill_bytes(&mut key).map_err(|_| ChatError::Rng)?;
    Ok(key)
}

/// Encrypt `plaintext`, returning `iv || ciphertext`.
///
/// The plaintext is padded with `(16 - len mod 16) mod 16` zero bytes. Fails
/// only when the random source cannot produce an IV.
pub fn encrypt(plaintext: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, ChatError> {
    let padding = (BLOCK_SIZE - plaintext.len() % BLOCK_SIZE) % BLOCK_SIZE;
    let mut buf = Vec::with_capacity(plaintext.len() + padding);
    buf.extend_from_slice(plaintext);
    buf.resize(plaintext.len() + padding, 0);

    let mut iv = [0u8; BLOCK_SIZE];
    OsRng.try_fill_bytes(&mut iv).map_err(|_| ChatError::Rng)?;

    let len = buf.len();
    let ciphertext = Aes256CbcEnc::new(key.into(), GenericArray::from_slice(&iv))
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .map_err(|_| ChatError::BadCiphertext)?;

    let mut out = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(ciphertext);
    Ok(out)
}

/// Decrypt `iv || ciphertext`. The returned plaintext keeps its zero padding;
/// callers must not strip it before MAC verification.
pub fn decrypt(data: &[u8], key: &[u8; 32]) -> Result<Vec<u8>, ChatError> {
    if data.len() < BLOCK_SIZE || (data.len() - BLOCK_SIZE) % BLOCK_SIZE != 0 {
        return Err(ChatError::BadCiphertext);
    }
    let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
    let mut buf = ciphertext.to_vec();
    let plaintext = Aes256CbcDec::new(key.into(), GenericArray::from_slice(iv))
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| ChatError::BadCiphertext)?;
    Ok(plaintext.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_keeps_padding() {
        let key = generate_key().unwrap();
        let plaintext = b"seven bytes pad";

        let ciphertext = encrypt(plaintext, &key).unwrap();
        assert_eq!(ciphertext.len() % BLOCK_SIZE, 0);
        assert!(ciphertext.len() >= BLOCK_SIZE + plaintext.len());

        let decrypted = decrypt(&ciphertext, &key).unwrap();
        assert_eq!(decrypted.len() % BLOCK_SIZE, 0);
        assert_eq!(&decrypted[..plaintext.len()], plaintext);
        assert!(decrypted[plaintext.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn roundtrip_exact_block_multiple() {
        let key = generate_key().unwrap();
        let plaintext = [7u8; 32];

        let decrypted = decrypt(&encrypt(&plaintext, &key).unwrap(), &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_short_ciphertext() {
        let key = generate_key().unwrap();
        assert!(matches!(
            decrypt(&[0u8; 15], &key),
            Err(ChatError::BadCiphertext)
        ));
    }

    #[test]
    fn rejects_ragged_ciphertext() {
        let key = generate_key().unwrap();
        assert!(matches!(
            decrypt(&[0u8; 33], &key),
            Err(ChatError::BadCiphertext)
        ));
    }

    #[test]
    fn wrong_key_yields_garbage_not_plaintext() {
        let key = generate_key().unwrap();
        let other = generate_key().unwrap();
        let plaintext = b"attack at dawn..";

        let ciphertext = encrypt(plaintext, &key).unwrap();
        let decrypted = decrypt(&ciphertext, &other).unwrap();
        assert_ne!(&decrypted[..plaintext.len()], plaintext);
    }
}
