//! Snowflake-layout id worker.
//!
//! Bit layout, high to low: 1 sign bit (always 0), 41 bits of milliseconds
//! since `epoch_ms`, 5 bits datacenter id, 5 bits worker id, 12 bits sequence.

use super::{IdError, IdGenerator};
use crate::clock::{Clock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Default custom epoch (2010-11-04T01:42:54.657Z).
pub const DEFAULT_EPOCH_MS: i64 = 1_288_834_974_657;

const WORKER_ID_BITS: u32 = 5;
const DATACENTER_ID_BITS: u32 = 5;
const SEQUENCE_BITS: u32 = 12;

/// Largest accepted worker or datacenter id.
pub const MAX_NODE_ID: u64 = (1 << WORKER_ID_BITS) - 1;

const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
const DATACENTER_ID_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;
const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;
const TIMESTAMP_BITS: u32 = 41;
const MAX_ELAPSED_MS: i64 = (1 << TIMESTAMP_BITS) - 1;

/// Node identity and epoch for one id worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdWorkerConfig {
    pub worker_id: u64,
    pub datacenter_id: u64,
    pub epoch_ms: i64,
}

impl Default for IdWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: 0,
            datacenter_id: 0,
            epoch_ms: DEFAULT_EPOCH_MS,
        }
    }
}

impl IdWorkerConfig {
    pub fn validate(&self) -> Result<(), IdError> {
        if self.worker_id > MAX_NODE_ID {
            return Err(IdError::InvalidWorkerId(self.worker_id));
        }
        if self.datacenter_id > MAX_NODE_ID {
            return Err(IdError::InvalidDatacenterId(self.datacenter_id));
        }
        if self.epoch_ms < 0 {
            return Err(IdError::InvalidEpoch(self.epoch_ms));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct WorkerState {
    last_timestamp: i64,
    sequence: i64,
}

/// Thread-safe Snowflake id worker.
#[derive(Debug)]
pub struct SnowflakeIdWorker<C: Clock = SystemClock> {
    worker_id: i64,
    datacenter_id: i64,
    epoch_ms: i64,
    clock: C,
    state: Mutex<WorkerState>,
}

impl SnowflakeIdWorker {
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self, IdError> {
        Self::from_config(&IdWorkerConfig {
            worker_id,
            datacenter_id,
            ..IdWorkerConfig::default()
        })
    }

    pub fn from_config(config: &IdWorkerConfig) -> Result<Self, IdError> {
        Self::with_clock(config, SystemClock)
    }
}

impl Default for SnowflakeIdWorker {
    fn default() -> Self {
        Self::build(&IdWorkerConfig::default(), SystemClock)
    }
}

impl<C: Clock> SnowflakeIdWorker<C> {
    /// Creates a worker reading time from `clock`.
    pub fn with_clock(config: &IdWorkerConfig, clock: C) -> Result<Self, IdError> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: &IdWorkerConfig, clock: C) -> Self {
        Self {
            worker_id: (config.worker_id & MAX_NODE_ID) as i64,
            datacenter_id: (config.datacenter_id & MAX_NODE_ID) as i64,
            epoch_ms: config.epoch_ms,
            clock,
            state: Mutex::new(WorkerState {
                last_timestamp: -1,
                sequence: 0,
            }),
        }
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id as u64
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id as u64
    }

    fn wait_next_millis(&self, last_timestamp: i64) -> i64 {
        loop {
            let now = self.clock.now_millis();
            if now > last_timestamp {
                return now;
            }
            std::hint::spin_loop();
        }
    }

    /// Milliseconds since the epoch, bounded to the timestamp field.
    fn elapsed_since_epoch(&self, now: i64) -> Result<i64, IdError> {
        if now < self.epoch_ms {
            return Err(IdError::ClockBeforeEpoch {
                now_ms: now,
                epoch_ms: self.epoch_ms,
            });
        }
        match now.checked_sub(self.epoch_ms) {
            Some(elapsed) if elapsed <= MAX_ELAPSED_MS => Ok(elapsed),
            Some(elapsed) => Err(IdError::TimestampOverflow {
                elapsed_ms: elapsed,
            }),
            None => Err(IdError::TimestampOverflow {
                elapsed_ms: i64::MAX,
            }),
        }
    }
}

impl<C: Clock> IdGenerator for SnowflakeIdWorker<C> {
    fn next_id(&self) -> Result<i64, IdError> {
        let mut state = self.state.lock().map_err(|_| IdError::LockPoisoned)?;

        let mut now = self.clock.now_millis();
        if now < state.last_timestamp {
            return Err(IdError::ClockMovedBackwards {
                last_ms: state.last_timestamp,
                now_ms: now,
            });
        }
        let mut elapsed = self.elapsed_since_epoch(now)?;

        if now == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                now = self.wait_next_millis(state.last_timestamp);
                elapsed = self.elapsed_since_epoch(now)?;
            }
        } else {
            state.sequence = 0;
        }
        state.last_timestamp = now;

        Ok((elapsed << TIMESTAMP_SHIFT)
            | (self.datacenter_id << DATACENTER_ID_SHIFT)
            | (self.worker_id << WORKER_ID_SHIFT)
            | state.sequence)
    }
}

#[cfg(test)]
mod tests {
    use super::{IdWorkerConfig, SnowflakeIdWorker, DEFAULT_EPOCH_MS};
    use crate::clock::Clock;
    use crate::id::{IdError, IdGenerator};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock pinned to a settable instant.
    #[derive(Debug)]
    struct ManualClock(AtomicI64);

    impl ManualClock {
        fn at(millis: i64) -> Self {
            Self(AtomicI64::new(millis))
        }

        fn set(&self, millis: i64) {
            self.0.store(millis, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now_millis(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Clock advancing by 1ms every `reads_per_tick` reads.
    struct TickingClock {
        reads: AtomicI64,
        reads_per_tick: i64,
        base: i64,
    }

    impl Clock for TickingClock {
        fn now_millis(&self) -> i64 {
            let read = self.reads.fetch_add(1, Ordering::SeqCst);
            self.base + read / self.reads_per_tick
        }
    }

    fn config(worker_id: u64, datacenter_id: u64) -> IdWorkerConfig {
        IdWorkerConfig {
            worker_id,
            datacenter_id,
            ..IdWorkerConfig::default()
        }
    }

    #[test]
    fn id_fields_follow_snowflake_layout() {
        let clock = ManualClock::at(DEFAULT_EPOCH_MS + 5);
        let worker = SnowflakeIdWorker::with_clock(&config(3, 7), &clock).unwrap();

        let first = worker.next_id().unwrap();
        let second = worker.next_id().unwrap();

        assert_eq!(first, (5 << 22) | (7 << 17) | (3 << 12));
        assert_eq!(second, first + 1);
        assert_eq!(worker.worker_id(), 3);
        assert_eq!(worker.datacenter_id(), 7);
    }

    #[test]
    fn sequence_resets_when_millisecond_advances() {
        let clock = ManualClock::at(DEFAULT_EPOCH_MS + 10);
        let worker = SnowflakeIdWorker::with_clock(&IdWorkerConfig::default(), &clock).unwrap();

        worker.next_id().unwrap();
        worker.next_id().unwrap();
        clock.set(DEFAULT_EPOCH_MS + 11);
        let id = worker.next_id().unwrap();

        assert_eq!(id & 0xFFF, 0);
        assert_eq!(id >> 22, 11);
    }

    #[test]
    fn clock_moving_backwards_is_reported() {
        let clock = ManualClock::at(DEFAULT_EPOCH_MS + 100);
        let worker = SnowflakeIdWorker::with_clock(&IdWorkerConfig::default(), &clock).unwrap();
        worker.next_id().unwrap();

        clock.set(DEFAULT_EPOCH_MS + 50);
        let err = worker.next_id().unwrap_err();
        assert_eq!(
            err,
            IdError::ClockMovedBackwards {
                last_ms: DEFAULT_EPOCH_MS + 100,
                now_ms: DEFAULT_EPOCH_MS + 50,
            }
        );
    }

    #[test]
    fn clock_before_epoch_is_reported() {
        let clock = ManualClock::at(DEFAULT_EPOCH_MS - 1);
        let worker = SnowflakeIdWorker::with_clock(&IdWorkerConfig::default(), &clock).unwrap();

        assert!(matches!(
            worker.next_id(),
            Err(IdError::ClockBeforeEpoch { .. })
        ));
    }

    #[test]
    fn negative_epoch_is_rejected() {
        let config = IdWorkerConfig {
            epoch_ms: -10_000_000_000_000,
            ..IdWorkerConfig::default()
        };
        assert_eq!(config.validate(), Err(IdError::InvalidEpoch(-10_000_000_000_000)));

        let config = IdWorkerConfig {
            epoch_ms: i64::MIN,
            ..IdWorkerConfig::default()
        };
        let clock = ManualClock::at(1_760_000_000_000);
        assert_eq!(
            SnowflakeIdWorker::with_clock(&config, &clock).unwrap_err(),
            IdError::InvalidEpoch(i64::MIN)
        );
    }

    #[test]
    fn timestamp_beyond_41_bits_is_reported() {
        let config = IdWorkerConfig {
            epoch_ms: 0,
            ..IdWorkerConfig::default()
        };
        let clock = ManualClock::at((1 << 41) - 1);
        let worker = SnowflakeIdWorker::with_clock(&config, &clock).unwrap();

        let last = worker.next_id().unwrap();
        assert!(last > 0);
        assert_eq!(last >> 22, (1 << 41) - 1);

        clock.set(1 << 41);
        assert_eq!(
            worker.next_id().unwrap_err(),
            IdError::TimestampOverflow {
                elapsed_ms: 1 << 41
            }
        );
    }

    #[test]
    fn sequence_exhaustion_waits_for_next_millisecond() {
        let clock = TickingClock {
            reads: AtomicI64::new(0),
            reads_per_tick: 5_000,
            base: DEFAULT_EPOCH_MS,
        };
        let worker = SnowflakeIdWorker::with_clock(&IdWorkerConfig::default(), &clock).unwrap();

        let mut previous = -1;
        let mut seen = HashSet::new();
        for _ in 0..6_000 {
            let id = worker.next_id().unwrap();
            assert!(id > previous);
            assert!(seen.insert(id));
            previous = id;
        }
    }

    #[test]
    fn node_ids_above_five_bits_are_rejected() {
        assert_eq!(
            SnowflakeIdWorker::new(32, 0).unwrap_err(),
            IdError::InvalidWorkerId(32)
        );
        assert_eq!(
            SnowflakeIdWorker::new(0, 40).unwrap_err(),
            IdError::InvalidDatacenterId(40)
        );
        assert!(SnowflakeIdWorker::new(31, 31).is_ok());
    }

    #[test]
    fn system_clock_ids_are_positive_and_increasing() {
        let worker: SnowflakeIdWorker = SnowflakeIdWorker::default();
        let mut previous = 0;
        for _ in 0..1_000 {
            let id = worker.next_id().unwrap();
            assert!(id > previous);
            previous = id;
        }
    }
}
