// Cipher support for locked SWORD modules
//
// This module provides the in-place stream ciphers applied to stored module bytes.

pub mod cipher;
pub mod sapphire;

pub use cipher::{get_cipher, ModuleCipher, SapphireCipher};
pub use sapphire::Sapphire;
