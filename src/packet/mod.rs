//! Long-header packet codec.
//!
//! One build/parse skeleton serves all long-header packet types; each type
//! contributes its first-byte marker, any extra header fields (the Initial
//! token), and the predicate that vets the first byte on parse. Build
//! produces a single sealed datagram; parse mirrors it field for field,
//! removes packet-number protection, opens the AEAD and dispatches the
//! decrypted frames.

pub mod number;
pub(crate) mod protection;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::cid::ConnectionId;
use crate::crypto::{ConnectionSecrets, AEAD_TAG_LENGTH};
use crate::error::{Error, Result};
use crate::frames::{self, CryptoStream};
use crate::varint::VarIntCodec;
use crate::version::Version;

/// Hard ceiling on a built datagram.
pub const MAX_PACKET_SIZE: usize = 1500;

/// Client Initial datagrams are padded up to this size.
pub const MIN_INITIAL_SIZE: usize = 1200;

/// Long-header packet types and their type-specific header fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketType {
    /// Carries the address-validation token (empty unless the server
    /// issued one).
    Initial { token: Bytes },
    Handshake,
    ZeroRtt,
}

impl PacketType {
    /// An Initial packet with no token.
    pub fn initial() -> Self {
        PacketType::Initial {
            token: Bytes::new(),
        }
    }

    /// The marker this type writes as the packet's first byte: the
    /// long-header bit plus the seven-bit type.
    pub fn first_byte(&self) -> u8 {
        match self {
            PacketType::Initial { .. } => 0xff,
            PacketType::Handshake => 0xfd,
            PacketType::ZeroRtt => 0xfc,
        }
    }

    /// Whether a received first byte carries this type's marker.
    pub fn accepts(&self, first: u8) -> bool {
        first == self.first_byte()
    }

    fn from_first_byte(first: u8) -> Result<Self> {
        match first {
            0xff => Ok(PacketType::initial()),
            0xfd => Ok(PacketType::Handshake),
            0xfc => Ok(PacketType::ZeroRtt),
            other => Err(Error::InvalidPacketType(other)),
        }
    }

    fn write_type_fields<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        if let PacketType::Initial { token } = self {
            VarIntCodec::encode(token.len() as u64, buf)?;
            buf.put_slice(token);
        }
        Ok(())
    }

    fn parse_type_fields<B: Buf>(&mut self, buf: &mut B) -> Result<()> {
        if let PacketType::Initial { token } = self {
            let token_length = VarIntCodec::decode(buf)? as usize;
            if buf.remaining() < token_length {
                return Err(Error::Protocol("initial token truncated"));
            }
            *token = buf.copy_to_bytes(token_length);
        }
        Ok(())
    }
}

/// A long-header packet, immutable once serialized.
///
/// `payload` holds plaintext frame bytes: on the build side the frames to
/// seal, on the parse side the decrypted frame stream (including any
/// padding the sender added).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongHeaderPacket {
    pub version: Version,
    pub packet_type: PacketType,
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
    pub packet_number: u64,
    pub payload: Bytes,
}

impl LongHeaderPacket {
    /// Serialize and seal this packet into one datagram.
    ///
    /// Outbound packets travel client-to-server, so the client-direction
    /// keys seal the payload. Initial packets are padded so the datagram
    /// is at least [`MIN_INITIAL_SIZE`] bytes; every packet gets at least
    /// enough padding for the protection mask to have a full ciphertext
    /// sample.
    pub fn encode(&self, secrets: &ConnectionSecrets) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(MAX_PACKET_SIZE);

        buf.put_u8(self.packet_type.first_byte());
        buf.put_u32(self.version.to_wire());
        buf.put_u8(self.dcid.encoded_nibble() << 4 | self.scid.encoded_nibble());
        buf.put_slice(self.dcid.as_bytes());
        buf.put_slice(self.scid.as_bytes());
        self.packet_type.write_type_fields(&mut buf)?;

        let pn_len = number::encoded_len(self.packet_number);

        let mut padding = 0usize;
        if matches!(self.packet_type, PacketType::Initial { .. }) {
            let estimated = buf.len() + pn_len + self.payload.len() + AEAD_TAG_LENGTH;
            if estimated < MIN_INITIAL_SIZE {
                padding = MIN_INITIAL_SIZE - estimated;
            }
        }
        // The mask sample assumes a 4-byte packet number; keep enough
        // ciphertext behind the real one to sample from.
        let min_plaintext = 4 - pn_len;
        if self.payload.len() + padding < min_plaintext {
            padding = min_plaintext - self.payload.len();
        }

        let length = pn_len + self.payload.len() + padding + AEAD_TAG_LENGTH;
        VarIntCodec::encode(length as u64, &mut buf)?;

        let pn_offset = buf.len();
        number::encode(self.packet_number, &mut buf);

        let total = buf.len() + self.payload.len() + padding + AEAD_TAG_LENGTH;
        if total > MAX_PACKET_SIZE {
            return Err(Error::PacketTooLarge(total));
        }

        // Everything serialized so far, packet number included, is the
        // associated data.
        let aad = buf[..].to_vec();

        let mut plaintext = Vec::with_capacity(self.payload.len() + padding);
        plaintext.extend_from_slice(&self.payload);
        plaintext.resize(self.payload.len() + padding, 0);

        let ciphertext = secrets.client().seal(&plaintext, &aad, self.packet_number)?;
        buf.put_slice(&ciphertext);

        protection::protect(&mut buf, pn_offset, pn_len, secrets.client())?;
        Ok(buf.freeze())
    }

    /// Parse one received datagram.
    ///
    /// Inbound packets were protected by the server, so the
    /// server-direction keys open them. `largest_pn` is the largest packet
    /// number processed so far on this connection (0 before any), used to
    /// reconstruct the truncated packet number. Decrypted CRYPTO data is
    /// handed to `crypto`; the full decrypted frame stream ends up in the
    /// returned packet's `payload` for the caller to re-iterate.
    pub fn decode(
        datagram: &[u8],
        secrets: &ConnectionSecrets,
        largest_pn: u64,
        crypto: &mut dyn CryptoStream,
    ) -> Result<Self> {
        let mut buf = datagram;
        if buf.remaining() < 6 {
            return Err(Error::Protocol("datagram too short for a long header"));
        }

        let first = buf.get_u8();
        let mut packet_type = PacketType::from_first_byte(first)?;
        let version = Version::from_wire(buf.get_u32())?;

        let nibble = buf.get_u8();
        let dcid_len = ConnectionId::length_from_nibble(nibble >> 4);
        let scid_len = ConnectionId::length_from_nibble(nibble & 0x0f);
        if buf.remaining() < dcid_len + scid_len {
            return Err(Error::Protocol("connection ids truncated"));
        }
        let dcid = ConnectionId::new(buf.copy_to_bytes(dcid_len))?;
        let scid = ConnectionId::new(buf.copy_to_bytes(scid_len))?;
        debug!("parsing {packet_type:?} dcid {dcid} scid {scid}");

        packet_type.parse_type_fields(&mut buf)?;

        let length = VarIntCodec::decode(&mut buf)? as usize;
        if length > buf.remaining() {
            return Err(Error::Protocol("length field exceeds datagram"));
        }

        let pn_offset = datagram.len() - buf.remaining();
        let pn = protection::unprotect(datagram, pn_offset, secrets.server())?;
        if length < pn.len + AEAD_TAG_LENGTH {
            return Err(Error::Protocol("length field too small for packet number and tag"));
        }
        let packet_number = number::decode(largest_pn, pn.truncated, pn.bits);
        debug!("length {length}, packet number {packet_number}");

        // The associated data is the header as received, with the
        // unprotected packet number patched over the masked bytes.
        let mut aad = Vec::with_capacity(pn_offset + pn.len);
        aad.extend_from_slice(&datagram[..pn_offset]);
        aad.extend_from_slice(&pn.bytes[..pn.len]);

        let ciphertext = &datagram[pn_offset + pn.len..pn_offset + length];
        let plaintext = secrets.server().open(ciphertext, &aad, packet_number)?;

        let payload = Bytes::from(plaintext);
        frames::dispatch(&payload, version, crypto)?;

        Ok(LongHeaderPacket {
            version,
            packet_type,
            dcid,
            scid,
            packet_number,
            payload,
        })
    }
}
