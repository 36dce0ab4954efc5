//! Snowflake-style trace id generator.
//!
//! Layout of a [`TraceId`], most significant bit first:
//!
//! | bits  | width | field                                   |
//! |-------|-------|-----------------------------------------|
//! | 63    | 1     | unused, always zero                     |
//! | 62-22 | 41    | milliseconds since [`DEFAULT_EPOCH_MS`] |
//! | 21-12 | 10    | worker id                               |
//! | 11-0  | 12    | per-millisecond sequence                |
//!
//! One [`Snowflake`] is built at startup and shared by reference. Its
//! `{last_timestamp, sequence}` pair is the only cross-request mutable state in
//! the service and is only touched under its mutex.

use std::fmt;

use parking_lot::Mutex;
use thiserror::Error;

/// Width of the timestamp field.
pub const TIMESTAMP_BITS: u32 = 41;
/// Width of the worker id field.
pub const WORKER_ID_BITS: u32 = 10;
/// Width of the sequence field.
pub const SEQUENCE_BITS: u32 = 12;

const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;

/// Largest worker id that fits the layout.
pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;
/// Largest sequence value within one millisecond.
pub const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;
/// Largest timestamp offset that fits the layout.
pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;

/// 2020-01-01T00:00:00Z in Unix milliseconds.
pub const DEFAULT_EPOCH_MS: u64 = 1_577_836_800_000;

/// Trace id generation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnowflakeError {
    /// The clock reads earlier than the last issued timestamp
    #[error("Clock moved backwards: last issued {last_ms}ms, now {now_ms}ms")]
    ClockRegression {
        /// Last timestamp used, relative to the epoch
        last_ms: u64,
        /// Current reading, relative to the epoch
        now_ms: u64,
    },

    /// The clock reads before the generator epoch
    #[error("Clock reads {now_unix_ms}ms, before the generator epoch")]
    BeforeEpoch {
        /// Current Unix time in milliseconds
        now_unix_ms: u64,
    },

    /// The timestamp no longer fits in 41 bits
    #[error("Timestamp {elapsed_ms}ms exceeds the 41-bit range")]
    TimestampOverflow {
        /// Milliseconds since the epoch
        elapsed_ms: u64,
    },

    /// Worker id does not fit in 10 bits
    #[error("Worker id {0} exceeds 1023")]
    InvalidWorkerId(u16),
}

/// Source of wall-clock milliseconds.
pub trait Clock: Send + Sync {
    /// Current Unix time in milliseconds.
    fn now_millis(&self) -> u64;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// A generated 64-bit trace id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TraceId(u64);

/// Fields recovered from a [`TraceId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceIdParts {
    /// Milliseconds since the generator epoch
    pub timestamp: u64,
    /// Worker id
    pub worker_id: u16,
    /// Sequence within the millisecond
    pub sequence: u16,
}

impl TraceId {
    /// Compose an id from its fields. Fields wider than their slot are truncated.
    #[must_use]
    pub const fn compose(timestamp: u64, worker_id: u16, sequence: u16) -> Self {
        Self(
            ((timestamp & MAX_TIMESTAMP) << TIMESTAMP_SHIFT)
                | (((worker_id & MAX_WORKER_ID) as u64) << WORKER_ID_SHIFT)
                | (sequence & MAX_SEQUENCE) as u64,
        )
    }

    /// Wrap a raw value, e.g. one read back from an `X-Trace-Id` header.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Reverse the bit layout.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn parts(self) -> TraceIdParts {
        TraceIdParts {
            timestamp: (self.0 >> TIMESTAMP_SHIFT) & MAX_TIMESTAMP,
            worker_id: ((self.0 >> WORKER_ID_SHIFT) & MAX_WORKER_ID as u64) as u16,
            sequence: (self.0 & MAX_SEQUENCE as u64) as u16,
        }
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u16,
}

/// Process-wide monotonic trace id generator.
pub struct Snowflake {
    worker_id: u16,
    epoch_ms: u64,
    clock: Box<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl fmt::Debug for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snowflake")
            .field("worker_id", &self.worker_id)
            .field("epoch_ms", &self.epoch_ms)
            .finish_non_exhaustive()
    }
}

impl Snowflake {
    /// Creates a generator on the system clock and the default epoch.
    pub fn new(worker_id: u16) -> Result<Self, SnowflakeError> {
        Self::with_clock(worker_id, DEFAULT_EPOCH_MS, SystemClock)
    }

    /// Creates a generator with an explicit epoch and clock.
    pub fn with_clock(
        worker_id: u16,
        epoch_ms: u64,
        clock: impl Clock + 'static,
    ) -> Result<Self, SnowflakeError> {
        if worker_id > MAX_WORKER_ID {
            return Err(SnowflakeError::InvalidWorkerId(worker_id));
        }
        Ok(Self {
            worker_id,
            epoch_ms,
            clock: Box::new(clock),
            state: Mutex::new(GeneratorState::default()),
        })
    }

    /// Worker id embedded in every id from this generator.
    #[must_use]
    pub const fn worker_id(&self) -> u16 {
        self.worker_id
    }

    /// Generates the next id.
    ///
    /// Spins into the next millisecond when the sequence is exhausted. Fails
    /// rather than emit a possibly duplicate id when the clock moves backwards.
    pub fn generate(&self) -> Result<TraceId, SnowflakeError> {
        let mut state = self.state.lock();
        let now = self.elapsed_millis()?;

        if now == state.last_timestamp {
            if state.sequence == MAX_SEQUENCE {
                state.last_timestamp = self.wait_next_millis(state.last_timestamp)?;
                state.sequence = 0;
            } else {
                state.sequence += 1;
            }
        } else if now > state.last_timestamp {
            state.last_timestamp = now;
            state.sequence = 0;
        } else {
            return Err(SnowflakeError::ClockRegression {
                last_ms: state.last_timestamp,
                now_ms: now,
            });
        }

        Ok(TraceId::compose(
            state.last_timestamp,
            self.worker_id,
            state.sequence,
        ))
    }

    /// Recovers `(timestamp, worker id, sequence)` from an id.
    #[must_use]
    pub const fn decompose(id: TraceId) -> TraceIdParts {
        id.parts()
    }

    /// Unix milliseconds of the timestamp embedded in `id`.
    #[must_use]
    pub const fn unix_millis(&self, id: TraceId) -> u64 {
        id.parts().timestamp + self.epoch_ms
    }

    fn elapsed_millis(&self) -> Result<u64, SnowflakeError> {
        let now_unix_ms = self.clock.now_millis();
        let elapsed_ms = now_unix_ms
            .checked_sub(self.epoch_ms)
            .ok_or(SnowflakeError::BeforeEpoch { now_unix_ms })?;
        if elapsed_ms > MAX_TIMESTAMP {
            return Err(SnowflakeError::TimestampOverflow { elapsed_ms });
        }
        Ok(elapsed_ms)
    }

    fn wait_next_millis(&self, last: u64) -> Result<u64, SnowflakeError> {
        loop {
            let now = self.elapsed_millis()?;
            if now > last {
                return Ok(now);
            }
            std::hint::spin_loop();
        }
    }
}
