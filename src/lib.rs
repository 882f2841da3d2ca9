//! # quicl: QUIC client transport core
//!
//! The two load-bearing pieces of a QUIC client, free of any I/O:
//!
//! - **Packet codec** ([`packet`]): builds and parses long-header packets:
//!   wire layout, variable-length integers, AEAD sealing with the header as
//!   associated data, and packet-number protection.
//! - **Congestion controller** ([`recovery`]): NewReno over bytes in
//!   flight, fed by the ack and loss events the loss-detection layer
//!   produces, gating the sender through its window.
//!
//! ```text
//! quicl/
//! ├── error      - unified error type
//! ├── version    - draft version identifiers and ordering
//! ├── varint     - variable-length integer codec
//! ├── cid        - connection identifiers
//! ├── crypto     - packet protection key material (AEAD + mask)
//! ├── packet     - long-header build/parse, PN encoding, PN protection
//! ├── frames     - frame dispatch (PADDING / CRYPTO / ACK family)
//! └── recovery   - NewReno congestion control
//! ```
//!
//! Everything here is a pure state machine: the codec turns frame bytes
//! into datagrams and back, the controller turns send/ack/loss events into
//! a window. Sockets, timers and the TLS handshake live with the caller,
//! reached through narrow seams ([`frames::CryptoStream`],
//! [`crypto::ConnectionSecrets`]).

#![forbid(unsafe_code)]

pub mod cid;
pub mod crypto;
pub mod error;
pub mod frames;
pub mod packet;
pub mod recovery;
pub mod varint;
pub mod version;

pub use cid::ConnectionId;
pub use crypto::{ConnectionSecrets, DirectionalSecrets};
pub use error::{Error, Result};
pub use frames::{AckFrame, AckRange, CryptoStream, Frame, FrameIterator};
pub use packet::{LongHeaderPacket, PacketType, MAX_PACKET_SIZE, MIN_INITIAL_SIZE};
pub use recovery::{
    CongestionController, Mode, NewRenoCongestionController, PacketInfo,
    SharedCongestionController,
};
pub use varint::VarIntCodec;
pub use version::Version;
