//! NewReno congestion controller.
//!
//! The window grows by the acknowledged bytes during slow start and by
//! `MAX_DATAGRAM_SIZE * acked / cwnd` during congestion avoidance. A loss
//! halves it, floored at the minimum window, and opens a recovery period:
//! packets sent before the period started neither grow the window when
//! acked nor shrink it again when lost. Recovery ends implicitly, once the
//! acknowledged packets postdate its start.

use std::time::Instant;

use tracing::debug;

use super::{CongestionController, PacketInfo};

/// Largest datagram the sender produces.
pub const MAX_DATAGRAM_SIZE: u64 = 1200;

/// The congestion window never drops below two datagrams.
pub const MINIMUM_WINDOW: u64 = 2 * MAX_DATAGRAM_SIZE;

/// Starting congestion window: ten datagrams.
pub const INITIAL_WINDOW: u64 = 10 * MAX_DATAGRAM_SIZE;

/// The window is divided by this on a congestion event.
pub const LOSS_REDUCTION_FACTOR: u64 = 2;

/// Growth regime, derived from the window and threshold rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    SlowStart,
    CongestionAvoidance,
}

/// NewReno in bytes mode.
#[derive(Debug, Clone)]
pub struct NewRenoCongestionController {
    congestion_window: u64,
    /// Unbounded until the first congestion event.
    slow_start_threshold: u64,
    bytes_in_flight: u64,
    /// Start of the current recovery period; `None` means no loss has ever
    /// been taken, so every packet postdates it.
    recovery_start_time: Option<Instant>,
}

impl NewRenoCongestionController {
    pub fn new() -> Self {
        Self::with_initial_window(INITIAL_WINDOW)
    }

    /// Start from a window chosen by the integrating connection.
    pub fn with_initial_window(window: u64) -> Self {
        Self {
            congestion_window: window,
            slow_start_threshold: u64::MAX,
            bytes_in_flight: 0,
            recovery_start_time: None,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.congestion_window < self.slow_start_threshold {
            Mode::SlowStart
        } else {
            Mode::CongestionAvoidance
        }
    }

    pub fn slow_start_threshold(&self) -> u64 {
        self.slow_start_threshold
    }

    fn sent_after_recovery(&self, time_sent: Instant) -> bool {
        self.recovery_start_time
            .map_or(true, |start| time_sent > start)
    }

    /// React to a loss whose newest packet was sent at `time_sent`. A
    /// second event inside the same recovery period is ignored, so one
    /// round of losses halves the window at most once.
    fn on_congestion_event(&mut self, time_sent: Instant, now: Instant) {
        if !self.sent_after_recovery(time_sent) {
            return;
        }
        self.recovery_start_time = Some(now);
        self.congestion_window =
            (self.congestion_window / LOSS_REDUCTION_FACTOR).max(MINIMUM_WINDOW);
        self.slow_start_threshold = self.congestion_window;
        debug!(
            target: "cc",
            "cwnd(-): {}; in flight: {}",
            self.congestion_window, self.bytes_in_flight
        );
    }

    #[cfg(test)]
    fn from_parts(
        congestion_window: u64,
        slow_start_threshold: u64,
        bytes_in_flight: u64,
        recovery_start_time: Option<Instant>,
    ) -> Self {
        Self {
            congestion_window,
            slow_start_threshold,
            bytes_in_flight,
            recovery_start_time,
        }
    }
}

impl Default for NewRenoCongestionController {
    fn default() -> Self {
        Self::new()
    }
}

impl CongestionController for NewRenoCongestionController {
    fn congestion_window(&self) -> u64 {
        self.congestion_window
    }

    fn bytes_in_flight(&self) -> u64 {
        self.bytes_in_flight
    }

    fn on_packet_sent(&mut self, sent: &PacketInfo) {
        if sent.in_flight {
            self.bytes_in_flight += sent.size as u64;
        }
    }

    fn on_packets_acked(&mut self, acked: &[PacketInfo]) {
        let previous_window = self.congestion_window;

        for packet in acked {
            if packet.in_flight {
                self.bytes_in_flight = self.bytes_in_flight.saturating_sub(packet.size as u64);
            }
        }

        // Only packets sent after recovery began grow the window; acks of
        // pre-recovery packets merely settle the in-flight count.
        for packet in acked {
            if !self.sent_after_recovery(packet.time_sent) {
                continue;
            }
            let size = packet.size as u64;
            if self.congestion_window < self.slow_start_threshold {
                self.congestion_window += size;
            } else {
                // 64-bit multiplication first; truncation toward zero is
                // part of the contract.
                self.congestion_window += MAX_DATAGRAM_SIZE * size / self.congestion_window;
            }
        }

        if self.congestion_window != previous_window {
            debug!(
                target: "cc",
                "cwnd(+): {} ({:?}); in flight: {}",
                self.congestion_window,
                self.mode(),
                self.bytes_in_flight
            );
        }
    }

    fn on_packets_lost(&mut self, lost: &[PacketInfo], now: Instant) {
        for packet in lost {
            if packet.in_flight {
                self.bytes_in_flight = self.bytes_in_flight.saturating_sub(packet.size as u64);
            }
        }

        if let Some(largest) = lost.iter().max_by_key(|packet| packet.packet_number) {
            self.on_congestion_event(largest.time_sent, now);
        }
    }
}
