//! Frame dispatch.
//!
//! The decrypted payload of a packet is a sequence of frames, each opening
//! with a single type byte. This module walks that sequence: PADDING runs
//! are skipped, CRYPTO data is routed to the TLS state holder, the ACK
//! family is parsed far enough to consume it and surface its ranges, and
//! anything else is reported as not implemented. Which ACK codepoint is
//! live depends on the draft version in use.

use bytes::Buf;

use crate::error::{Error, Result};
use crate::varint::VarIntCodec;
use crate::version::Version;

pub const FRAME_TYPE_PADDING: u8 = 0x00;
pub const FRAME_TYPE_ACK_DRAFT14: u8 = 0x0d;
pub const FRAME_TYPE_CRYPTO: u8 = 0x18;
pub const FRAME_TYPE_ACK: u8 = 0x1a;
pub const FRAME_TYPE_ACK_ECN: u8 = 0x1b;

/// Recipient of CRYPTO frame bytes; the TLS machinery behind it is opaque
/// to the transport core.
pub trait CryptoStream {
    fn on_crypto_data(&mut self, offset: u64, data: &[u8]);
}

/// A contiguous range of acknowledged packet numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRange {
    pub smallest: u64,
    pub largest: u64,
}

/// An ACK frame, parsed just far enough to consume it from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    pub largest_acked: u64,
    pub ack_delay: u64,
    pub ranges: Vec<AckRange>,
}

/// A frame recognized by the dispatcher. CRYPTO data borrows the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    /// A run of padding bytes (the run length).
    Padding(usize),
    Crypto { offset: u64, data: &'a [u8] },
    Ack(AckFrame),
}

/// Iterator over the frames of a decrypted payload.
///
/// Stops after the first error; the payload is consumed until empty
/// otherwise.
pub struct FrameIterator<'a> {
    buf: &'a [u8],
    version: Version,
    failed: bool,
}

impl<'a> FrameIterator<'a> {
    pub fn new(payload: &'a [u8], version: Version) -> Self {
        Self {
            buf: payload,
            version,
            failed: false,
        }
    }
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buf.is_empty() {
            return None;
        }
        match parse_frame(&mut self.buf, self.version) {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Walk every frame in `payload`, handing CRYPTO data to `crypto`.
///
/// ACK frames are surfaced to the loss-detection layer by the caller
/// re-iterating the payload; this pass only validates and routes.
pub fn dispatch(payload: &[u8], version: Version, crypto: &mut dyn CryptoStream) -> Result<()> {
    for frame in FrameIterator::new(payload, version) {
        if let Frame::Crypto { offset, data } = frame? {
            crypto.on_crypto_data(offset, data);
        }
    }
    Ok(())
}

fn parse_frame<'a>(buf: &mut &'a [u8], version: Version) -> Result<Frame<'a>> {
    let frame_type = buf[0];
    match frame_type {
        FRAME_TYPE_PADDING => {
            let run = buf.iter().take_while(|&&b| b == 0).count();
            *buf = &buf[run..];
            Ok(Frame::Padding(run))
        }
        FRAME_TYPE_CRYPTO => {
            let mut cursor = &buf[1..];
            let offset = VarIntCodec::decode(&mut cursor)?;
            let length = VarIntCodec::decode(&mut cursor)? as usize;
            if cursor.remaining() < length {
                return Err(Error::Protocol("crypto frame data truncated"));
            }
            let data = &cursor[..length];
            *buf = &cursor[length..];
            Ok(Frame::Crypto { offset, data })
        }
        FRAME_TYPE_ACK_DRAFT14 => {
            // This codepoint was reassigned after draft 14.
            if version != Version::Draft14 {
                return Err(Error::NotYetImplemented(frame_type));
            }
            let mut cursor = &buf[1..];
            let ack = parse_ack(&mut cursor, false)?;
            *buf = cursor;
            Ok(Frame::Ack(ack))
        }
        FRAME_TYPE_ACK | FRAME_TYPE_ACK_ECN => {
            if !version.at_least(Version::Draft15) {
                return Err(Error::NotYetImplemented(frame_type));
            }
            let mut cursor = &buf[1..];
            let ack = parse_ack(&mut cursor, frame_type == FRAME_TYPE_ACK_ECN)?;
            *buf = cursor;
            Ok(Frame::Ack(ack))
        }
        other => Err(Error::NotYetImplemented(other)),
    }
}

fn parse_ack(buf: &mut &[u8], ecn: bool) -> Result<AckFrame> {
    let largest_acked = VarIntCodec::decode(buf)?;
    let ack_delay = VarIntCodec::decode(buf)?;
    let range_count = VarIntCodec::decode(buf)?;
    let first_range = VarIntCodec::decode(buf)?;

    let mut smallest = largest_acked
        .checked_sub(first_range)
        .ok_or(Error::Protocol("ack range underflows packet number space"))?;
    let mut ranges = vec![AckRange {
        smallest,
        largest: largest_acked,
    }];

    for _ in 0..range_count {
        let gap = VarIntCodec::decode(buf)?;
        let range = VarIntCodec::decode(buf)?;
        let largest = smallest
            .checked_sub(gap + 2)
            .ok_or(Error::Protocol("ack gap underflows packet number space"))?;
        smallest = largest
            .checked_sub(range)
            .ok_or(Error::Protocol("ack range underflows packet number space"))?;
        ranges.push(AckRange { smallest, largest });
    }

    if ecn {
        // ECT(0), ECT(1) and CE counts; consumed, not yet surfaced.
        for _ in 0..3 {
            VarIntCodec::decode(buf)?;
        }
    }

    Ok(AckFrame {
        largest_acked,
        ack_delay,
        ranges,
    })
}
