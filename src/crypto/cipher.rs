//! Module encipherment.
//!
//! A locked module names a `CipherKey` in its descriptor. Stored bytes are wrapped
//! by the cipher before any compression is undone, and every stored buffer is
//! enciphered independently from the start of the key stream.
//!
//! # Examples
//!
//! ```
//! use sword_module::crypto::{get_cipher, ModuleCipher};
//!
//! let cipher = get_cipher("4EFG2Ax9");
//! let mut data = b"hello world".to_vec();
//! cipher.encipher(&mut data);
//! cipher.decipher(&mut data);
//! assert_eq!(&data, b"hello world");
//! ```

use super::sapphire::Sapphire;

/// In-place stream cipher applied to stored module bytes.
///
/// `encipher` defaults to `decipher`, which is correct for self-inverse ciphers.
/// Ciphers with feedback that depends on the direction override it.
pub trait ModuleCipher: Send + Sync {
    fn decipher(&self, data: &mut [u8]);

    fn encipher(&self, data: &mut [u8]) {
        self.decipher(data);
    }
}

/// Sapphire II keyed with a module's `CipherKey`.
pub struct SapphireCipher {
    key: Vec<u8>,
}

impl SapphireCipher {
    pub fn new(key: &str) -> Self {
        Self { key: key.as_bytes().to_vec() }
    }
}

impl ModuleCipher for SapphireCipher {
    fn decipher(&self, data: &mut [u8]) {
        let mut state = Sapphire::new(&self.key);
        for b in data.iter_mut() {
            *b = state.decrypt_byte(*b);
        }
    }

    fn encipher(&self, data: &mut [u8]) {
        let mut state = Sapphire::new(&self.key);
        for b in data.iter_mut() {
            *b = state.encrypt_byte(*b);
        }
    }
}

/// Builds the cipher SWORD modules use for `CipherKey`.
pub fn get_cipher(cipher_key: &str) -> Box<dyn ModuleCipher> {
    Box::new(SapphireCipher::new(cipher_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sapphire_cipher_restores_buffer() {
        let cipher = SapphireCipher::new("secret");
        let mut data = b"And God said, Let there be light".to_vec();
        cipher.encipher(&mut data);
        assert_ne!(&data[..], b"And God said, Let there be light");
        cipher.decipher(&mut data);
        assert_eq!(&data[..], b"And God said, Let there be light");
    }

    struct Invert;

    impl ModuleCipher for Invert {
        fn decipher(&self, data: &mut [u8]) {
            data.iter_mut().for_each(|b| *b = !*b);
        }
    }

    #[test]
    fn test_default_encipher_is_decipher() {
        let cipher = Invert;
        let mut data = b"abcdef".to_vec();
        cipher.encipher(&mut data);
        cipher.decipher(&mut data);
        assert_eq!(&data[..], b"abcdef");
    }
}
