//! Congestion control.
//!
//! The sender and the ack/loss-processing side both feed this subsystem:
//! sends add to the bytes in flight, acknowledgments and losses remove from
//! it and move the congestion window. The controller only reacts to the
//! events it is handed; loss-detection timers live with the collaborator
//! that produces those events.

pub mod congestion;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub use congestion::{
    Mode, NewRenoCongestionController, INITIAL_WINDOW, LOSS_REDUCTION_FACTOR, MAX_DATAGRAM_SIZE,
    MINIMUM_WINDOW,
};

/// What the sender records about a packet as it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    pub packet_number: u64,
    pub time_sent: Instant,
    /// Size of the packet on the wire, in bytes.
    pub size: usize,
    /// Whether the packet counts toward bytes in flight.
    pub in_flight: bool,
}

/// A congestion control algorithm.
///
/// Implementations own their counters; sharing across the sender and the
/// ack-processing threads goes through [`SharedCongestionController`].
/// Times are supplied by the caller so tests can inject a clock.
pub trait CongestionController {
    fn congestion_window(&self) -> u64;

    fn bytes_in_flight(&self) -> u64;

    /// Whether a packet of `next_packet_size` bytes may be transmitted now.
    fn can_send(&self, next_packet_size: usize) -> bool {
        self.bytes_in_flight() + next_packet_size as u64 <= self.congestion_window()
    }

    /// A packet left the socket.
    fn on_packet_sent(&mut self, sent: &PacketInfo);

    /// A batch of packets was acknowledged, in the order the loss-detection
    /// layer produced them.
    fn on_packets_acked(&mut self, acked: &[PacketInfo]);

    /// A batch of packets was declared lost. `now` stamps the start of any
    /// recovery period this triggers.
    fn on_packets_lost(&mut self, lost: &[PacketInfo], now: Instant);
}

/// Thread-safe handle to a congestion controller.
///
/// All state mutations happen under one exclusive lock, and `can_send`
/// reads under the same lock, so any interleaving of the sender and the
/// ack-processing threads observes a consistent serial history. The
/// critical sections are short and never block on I/O.
#[derive(Debug)]
pub struct SharedCongestionController<C = NewRenoCongestionController> {
    inner: Arc<Mutex<C>>,
}

impl<C> Clone for SharedCongestionController<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: CongestionController> SharedCongestionController<C> {
    pub fn new(controller: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(controller)),
        }
    }

    // State behind a poisoned lock is still coherent: every mutation is a
    // single saturating update.
    fn lock(&self) -> MutexGuard<'_, C> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn can_send(&self, next_packet_size: usize) -> bool {
        self.lock().can_send(next_packet_size)
    }

    pub fn on_packet_sent(&self, sent: &PacketInfo) {
        self.lock().on_packet_sent(sent);
    }

    pub fn on_packets_acked(&self, acked: &[PacketInfo]) {
        self.lock().on_packets_acked(acked);
    }

    pub fn on_packets_lost(&self, lost: &[PacketInfo], now: Instant) {
        self.lock().on_packets_lost(lost, now);
    }

    pub fn congestion_window(&self) -> u64 {
        self.lock().congestion_window()
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.lock().bytes_in_flight()
    }
}

impl Default for SharedCongestionController {
    fn default() -> Self {
        Self::new(NewRenoCongestionController::new())
    }
}
