//! State every backend carries regardless of layout.

use crate::config::ModuleConfig;
use crate::crypto::{get_cipher, ModuleCipher};
use crate::storage::ReadStats;
use crate::utils::{decode_text, encode_text};

/// Configuration, cipher and read counters of one module instance.
pub struct ModuleContext {
    pub config: ModuleConfig,
    cipher: Option<Box<dyn ModuleCipher>>,
    pub stats: ReadStats,
}

impl ModuleContext {
    pub fn new(config: ModuleConfig) -> Self {
        let cipher = config.cipher_key().map(get_cipher);
        Self { config, cipher, stats: ReadStats::default() }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn is_enciphered(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn decipher(&self, data: &mut [u8]) {
        if let Some(cipher) = &self.cipher {
            cipher.decipher(data);
        }
    }

    pub fn encipher(&self, data: &mut [u8]) {
        if let Some(cipher) = &self.cipher {
            cipher.encipher(data);
        }
    }

    pub fn decode(&self, key: &str, bytes: &[u8]) -> String {
        decode_text(key, bytes, self.config.encoding)
    }

    pub fn encode(&self, text: &str) -> Vec<u8> {
        encode_text(text, self.config.encoding)
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("config", &self.config)
            .field("enciphered", &self.is_enciphered())
            .finish()
    }
}
