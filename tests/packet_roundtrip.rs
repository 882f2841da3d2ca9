//! Build/parse properties of the long-header codec.

use bytes::{BufMut, Bytes, BytesMut};
use proptest::prelude::*;
use quicl::{
    ConnectionId, ConnectionSecrets, CryptoStream, DirectionalSecrets, Error, LongHeaderPacket,
    PacketType, VarIntCodec, Version, MIN_INITIAL_SIZE,
};

struct Discard;

impl CryptoStream for Discard {
    fn on_crypto_data(&mut self, _offset: u64, _data: &[u8]) {}
}

/// Loopback fixture: both directions share key material so the codec's
/// client-seal / server-open split still roundtrips.
fn symmetric_secrets() -> ConnectionSecrets {
    let keys = DirectionalSecrets::new([0xa1; 16], [0xb2; 12], [0xc3; 16]);
    ConnectionSecrets::new(keys.clone(), keys)
}

/// A payload that parses as frames: one CRYPTO frame followed by padding.
fn frame_payload(data: &[u8], padding: usize) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u8(0x18);
    VarIntCodec::encode(0, &mut buf).unwrap();
    VarIntCodec::encode(data.len() as u64, &mut buf).unwrap();
    buf.put_slice(data);
    buf.put_bytes(0, padding);
    buf.freeze()
}

fn cid() -> impl Strategy<Value = ConnectionId> {
    proptest::collection::vec(any::<u8>(), 3..=18)
        .prop_map(|bytes| ConnectionId::from_slice(&bytes).unwrap())
}

fn packet_type() -> impl Strategy<Value = PacketType> {
    prop_oneof![
        Just(PacketType::initial()),
        proptest::collection::vec(any::<u8>(), 0..64).prop_map(|token| PacketType::Initial {
            token: Bytes::from(token),
        }),
        Just(PacketType::Handshake),
        Just(PacketType::ZeroRtt),
    ]
}

fn version() -> impl Strategy<Value = Version> {
    prop_oneof![
        Just(Version::Draft14),
        Just(Version::Draft15),
        Just(Version::Draft16),
        Just(Version::Draft17),
    ]
}

fn packet() -> impl Strategy<Value = LongHeaderPacket> {
    (
        version(),
        packet_type(),
        cid(),
        cid(),
        0u64..1_000_000,
        proptest::collection::vec(any::<u8>(), 0..600),
        0usize..32,
    )
        .prop_map(
            |(version, packet_type, dcid, scid, packet_number, data, padding)| LongHeaderPacket {
                version,
                packet_type,
                dcid,
                scid,
                packet_number,
                payload: frame_payload(&data, padding),
            },
        )
}

proptest! {
    /// Parse restores everything build wrote, modulo trailing padding.
    #[test]
    fn parse_inverts_build(packet in packet()) {
        let secrets = symmetric_secrets();
        let datagram = packet.encode(&secrets).unwrap();

        let parsed = LongHeaderPacket::decode(
            &datagram,
            &secrets,
            packet.packet_number.saturating_sub(1),
            &mut Discard,
        )
        .unwrap();

        prop_assert_eq!(parsed.version, packet.version);
        prop_assert_eq!(&parsed.packet_type, &packet.packet_type);
        prop_assert_eq!(&parsed.dcid, &packet.dcid);
        prop_assert_eq!(&parsed.scid, &packet.scid);
        prop_assert_eq!(parsed.packet_number, packet.packet_number);
        prop_assert_eq!(
            &parsed.payload[..packet.payload.len()],
            &packet.payload[..]
        );
        prop_assert!(parsed.payload[packet.payload.len()..].iter().all(|&b| b == 0));
    }

    /// Every Initial datagram reaches the anti-amplification floor.
    #[test]
    fn initial_datagrams_reach_1200_bytes(
        dcid in cid(),
        scid in cid(),
        packet_number in 0u64..1_000_000,
        data in proptest::collection::vec(any::<u8>(), 0..600),
    ) {
        let packet = LongHeaderPacket {
            version: Version::Draft16,
            packet_type: PacketType::initial(),
            dcid,
            scid,
            packet_number,
            payload: frame_payload(&data, 0),
        };
        let datagram = packet.encode(&symmetric_secrets()).unwrap();
        prop_assert!(datagram.len() >= MIN_INITIAL_SIZE);
    }

    /// Flipping any single bit of a sealed datagram makes parse fail: in the
    /// header it breaks the associated data (or the parse itself, earlier),
    /// in the body it breaks the AEAD tag.
    #[test]
    fn any_bit_flip_is_rejected(
        data in proptest::collection::vec(any::<u8>(), 0..128),
        bit in any::<prop::sample::Index>(),
    ) {
        let secrets = symmetric_secrets();
        let packet = LongHeaderPacket {
            version: Version::Draft16,
            packet_type: PacketType::Handshake,
            dcid: ConnectionId::from_slice(&[1, 2, 3, 4, 5]).unwrap(),
            scid: ConnectionId::from_slice(&[6, 7, 8, 9]).unwrap(),
            packet_number: 77,
            payload: frame_payload(&data, 0),
        };
        let datagram = packet.encode(&secrets).unwrap();

        let bit = bit.index(datagram.len() * 8);
        let mut tampered = datagram.to_vec();
        tampered[bit / 8] ^= 1 << (bit % 8);

        prop_assert!(LongHeaderPacket::decode(&tampered, &secrets, 76, &mut Discard).is_err());
    }
}

#[test]
fn authentication_failure_is_the_recoverable_error() {
    let secrets = symmetric_secrets();
    let packet = LongHeaderPacket {
        version: Version::Draft16,
        packet_type: PacketType::Handshake,
        dcid: ConnectionId::from_slice(&[1, 2, 3]).unwrap(),
        scid: ConnectionId::from_slice(&[4, 5, 6]).unwrap(),
        packet_number: 5,
        payload: frame_payload(b"hello", 0),
    };
    let datagram = packet.encode(&secrets).unwrap();

    // Corrupt a ciphertext byte near the end: parse succeeds structurally
    // and fails at the AEAD, the one error a receiver absorbs silently.
    let mut tampered = datagram.to_vec();
    let last = tampered.len() - 1;
    tampered[last] ^= 0x01;
    let err = LongHeaderPacket::decode(&tampered, &secrets, 4, &mut Discard).unwrap_err();
    assert_eq!(err, Error::Authentication);
    assert!(!err.is_fatal());
}
