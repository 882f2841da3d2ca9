//! Packet-number protection.
//!
//! A 16-byte sample of the ciphertext drives an AES-ECB mask that is XORed
//! over the packet-number bytes in place. For sampling, the packet number
//! is assumed to be four bytes long, so the sample always starts at
//! `pn_offset + 4` regardless of the real length; that keeps the build and
//! parse sides aligned before the parser knows how long the number is.

use crate::crypto::{DirectionalSecrets, SAMPLE_LENGTH};
use crate::error::{Error, Result};
use crate::packet::number;

/// Offset of the mask sample relative to the packet-number position.
const SAMPLE_SKEW: usize = 4;

/// An unprotected packet number, as recovered from the wire.
pub(crate) struct UnprotectedPacketNumber {
    /// Unmasked bytes; only `bytes[..len]` are meaningful.
    pub bytes: [u8; 4],
    pub len: usize,
    /// Truncated value carried by the bytes.
    pub truncated: u64,
    /// Usable bits in the truncated value.
    pub bits: u32,
}

fn sample_at(buf: &[u8], pn_offset: usize) -> Result<[u8; SAMPLE_LENGTH]> {
    let start = pn_offset + SAMPLE_SKEW;
    let slice = buf
        .get(start..start + SAMPLE_LENGTH)
        .ok_or(Error::Protocol("packet too short to sample for protection"))?;
    let mut sample = [0u8; SAMPLE_LENGTH];
    sample.copy_from_slice(slice);
    Ok(sample)
}

/// Mask the packet-number bytes of a fully serialized packet in place.
pub(crate) fn protect(
    buf: &mut [u8],
    pn_offset: usize,
    pn_len: usize,
    keys: &DirectionalSecrets,
) -> Result<()> {
    let sample = sample_at(buf, pn_offset)?;
    let mask = keys.header_protection_mask(&sample);
    for (byte, mask_byte) in buf[pn_offset..pn_offset + pn_len].iter_mut().zip(mask) {
        *byte ^= mask_byte;
    }
    Ok(())
}

/// Unmask the packet number of a received packet.
///
/// The first byte is unmasked on its own to learn the true length; the
/// remaining bytes follow. The input buffer is left untouched.
pub(crate) fn unprotect(
    buf: &[u8],
    pn_offset: usize,
    keys: &DirectionalSecrets,
) -> Result<UnprotectedPacketNumber> {
    let sample = sample_at(buf, pn_offset)?;
    let mask = keys.header_protection_mask(&sample);

    let first = buf[pn_offset] ^ mask[0];
    let len = number::len_from_first_byte(first);
    if pn_offset + len > buf.len() {
        return Err(Error::Protocol("packet number truncated"));
    }

    let mut bytes = [0u8; 4];
    bytes[0] = first;
    for i in 1..len {
        bytes[i] = buf[pn_offset + i] ^ mask[i];
    }
    let (truncated, bits) = number::truncated_value(&bytes, len);
    Ok(UnprotectedPacketNumber {
        bytes,
        len,
        truncated,
        bits,
    })
}
