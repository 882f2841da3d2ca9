//! Packet protection key material.
//!
//! [`ConnectionSecrets`] holds one set of keys per direction, installed by
//! the handshake layer before any protected packet is produced and borrowed
//! read-only by the codec. Each direction exposes exactly the three
//! operations the codec needs: AEAD seal, AEAD open, and the packet-number
//! protection mask. Key derivation and key update are the handshake layer's
//! concern.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, Nonce};

use crate::error::{Error, Result};

/// AEAD key length (AES-128-GCM).
pub const AEAD_KEY_LENGTH: usize = 16;

/// AEAD IV length.
pub const AEAD_IV_LENGTH: usize = 12;

/// AEAD authentication tag length appended to every sealed payload.
pub const AEAD_TAG_LENGTH: usize = 16;

/// Packet-number protection key length (AES-128).
pub const HP_KEY_LENGTH: usize = 16;

/// Ciphertext sample length fed to the protection mask.
pub const SAMPLE_LENGTH: usize = 16;

/// Keys for one direction of the connection.
#[derive(Clone)]
pub struct DirectionalSecrets {
    key: [u8; AEAD_KEY_LENGTH],
    iv: [u8; AEAD_IV_LENGTH],
    hp: [u8; HP_KEY_LENGTH],
}

impl DirectionalSecrets {
    pub fn new(
        key: [u8; AEAD_KEY_LENGTH],
        iv: [u8; AEAD_IV_LENGTH],
        hp: [u8; HP_KEY_LENGTH],
    ) -> Self {
        Self { key, iv, hp }
    }

    /// Nonce for a packet: the IV XORed with the left-padded packet number.
    fn nonce(&self, packet_number: u64) -> [u8; AEAD_IV_LENGTH] {
        let mut nonce = self.iv;
        for (nonce_byte, pn_byte) in nonce[AEAD_IV_LENGTH - 8..]
            .iter_mut()
            .zip(packet_number.to_be_bytes())
        {
            *nonce_byte ^= pn_byte;
        }
        nonce
    }

    /// Seal `plaintext`, binding `aad` without encrypting it.
    ///
    /// The result is `plaintext.len() + 16` bytes: ciphertext plus tag.
    pub fn seal(&self, plaintext: &[u8], aad: &[u8], packet_number: u64) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = self.nonce(packet_number);
        cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| Error::Internal("AEAD seal failed"))
    }

    /// Open a sealed payload. Fails with [`Error::Authentication`] when the
    /// tag does not verify, which the caller must treat as a silent drop.
    pub fn open(&self, ciphertext: &[u8], aad: &[u8], packet_number: u64) -> Result<Vec<u8>> {
        let cipher = Aes128Gcm::new(GenericArray::from_slice(&self.key));
        let nonce = self.nonce(packet_number);
        cipher
            .decrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| Error::Authentication)
    }

    /// Packet-number protection mask: AES-ECB of a ciphertext sample under
    /// the protection key.
    pub fn header_protection_mask(&self, sample: &[u8; SAMPLE_LENGTH]) -> [u8; SAMPLE_LENGTH] {
        let cipher = Aes128::new(GenericArray::from_slice(&self.hp));
        let mut block = GenericArray::clone_from_slice(sample);
        cipher.encrypt_block(&mut block);
        block.into()
    }
}

// Key material must not end up in logs.
impl core::fmt::Debug for DirectionalSecrets {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("DirectionalSecrets(..)")
    }
}

/// The connection's key material, one direction each way.
#[derive(Debug, Clone)]
pub struct ConnectionSecrets {
    client: DirectionalSecrets,
    server: DirectionalSecrets,
}

impl ConnectionSecrets {
    pub fn new(client: DirectionalSecrets, server: DirectionalSecrets) -> Self {
        Self { client, server }
    }

    /// Keys protecting client-to-server packets.
    pub fn client(&self) -> &DirectionalSecrets {
        &self.client
    }

    /// Keys protecting server-to-client packets.
    pub fn server(&self) -> &DirectionalSecrets {
        &self.server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> DirectionalSecrets {
        DirectionalSecrets::new([0x11; 16], [0x22; 12], [0x33; 16])
    }

    #[test]
    fn seal_open_roundtrip() {
        let keys = keys();
        let sealed = keys.seal(b"frame bytes", b"header", 7).unwrap();
        assert_eq!(sealed.len(), b"frame bytes".len() + AEAD_TAG_LENGTH);
        let opened = keys.open(&sealed, b"header", 7).unwrap();
        assert_eq!(opened, b"frame bytes");
    }

    #[test]
    fn open_rejects_tampered_ciphertext() {
        let keys = keys();
        let mut sealed = keys.seal(b"frame bytes", b"header", 7).unwrap();
        sealed[0] ^= 0x01;
        assert_eq!(
            keys.open(&sealed, b"header", 7),
            Err(Error::Authentication)
        );
    }

    #[test]
    fn open_rejects_wrong_aad_and_wrong_packet_number() {
        let keys = keys();
        let sealed = keys.seal(b"frame bytes", b"header", 7).unwrap();
        assert_eq!(
            keys.open(&sealed, b"other header", 7),
            Err(Error::Authentication)
        );
        // A different packet number shifts the nonce.
        assert_eq!(keys.open(&sealed, b"header", 8), Err(Error::Authentication));
    }

    #[test]
    fn mask_is_deterministic_per_sample() {
        let keys = keys();
        let sample_a = [0x44; SAMPLE_LENGTH];
        let sample_b = [0x45; SAMPLE_LENGTH];
        assert_eq!(
            keys.header_protection_mask(&sample_a),
            keys.header_protection_mask(&sample_a)
        );
        assert_ne!(
            keys.header_protection_mask(&sample_a),
            keys.header_protection_mask(&sample_b)
        );
    }

    #[test]
    fn debug_does_not_leak_keys() {
        assert_eq!(format!("{:?}", keys()), "DirectionalSecrets(..)");
    }
}
