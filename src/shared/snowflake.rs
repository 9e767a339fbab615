//! Snowflake ID Generator
//!
//! Twitter-style distributed unique ID generation with a configurable layout.
//!
//! One generator is built at process start and handed to every component
//! that mints ids. Its last timestamp and sequence live behind a single
//! mutex; the clock is read while holding it, so two callers can never
//! observe the same (timestamp, sequence) pair.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, instrument};

use crate::domain::value_objects::{Snowflake, SnowflakeLayout};
use crate::infrastructure::metrics;
use crate::shared::clock::{SystemClock, TimeSource};
use crate::shared::error::AppError;

/// Immutable generator configuration.
#[derive(Debug, Clone, Copy)]
pub struct SnowflakeConfig {
    pub layout: SnowflakeLayout,
    pub worker_id: u64,
    pub datacenter_id: u64,
    /// Custom epoch in Unix milliseconds
    pub epoch: u64,
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u64,
}

enum Attempt {
    Ready(Snowflake),
    Exhausted { last_timestamp: u64 },
}

/// Snowflake ID generator
pub struct SnowflakeGenerator {
    config: SnowflakeConfig,
    state: Mutex<GeneratorState>,
    clock: Arc<dyn TimeSource>,
}

impl SnowflakeGenerator {
    /// Create a generator on the system clock.
    pub fn new(config: SnowflakeConfig) -> Result<Self, AppError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a generator on an explicit clock.
    ///
    /// # Errors
    ///
    /// `AppError::Configuration` if the worker or datacenter id does not fit
    /// its bit width, or the epoch lies in the future.
    pub fn with_clock(config: SnowflakeConfig, clock: Arc<dyn TimeSource>) -> Result<Self, AppError> {
        config
            .layout
            .validate_ids(config.worker_id, config.datacenter_id)?;

        let now = clock.current_millis();
        if config.epoch > now {
            return Err(AppError::Configuration(format!(
                "epoch {} is in the future (now {})",
                config.epoch, now
            )));
        }

        Ok(Self {
            config,
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
            clock,
        })
    }

    pub fn config(&self) -> &SnowflakeConfig {
        &self.config
    }

    pub fn layout(&self) -> &SnowflakeLayout {
        &self.config.layout
    }

    /// Generate a new snowflake ID.
    ///
    /// # Errors
    ///
    /// - `AppError::ClockSkew` if the clock reads earlier than the last
    ///   minted timestamp. Not retried here.
    /// - `AppError::Configuration` if the timestamp no longer fits the layout.
    #[instrument(skip(self), level = "trace")]
    pub fn next_id(&self) -> Result<Snowflake, AppError> {
        loop {
            match self.try_next()? {
                Attempt::Ready(id) => {
                    metrics::record_id_generated();
                    return Ok(id);
                }
                Attempt::Exhausted { last_timestamp } => {
                    self.wait_next_millis(last_timestamp)?;
                }
            }
        }
    }

    fn try_next(&self) -> Result<Attempt, AppError> {
        let mut state = self.state.lock();
        let now = self.clock.current_millis();

        if now < state.last_timestamp {
            metrics::record_clock_skew();
            error!(
                last_ms = state.last_timestamp,
                current_ms = now,
                "Clock moved backwards, refusing to mint id"
            );
            return Err(AppError::ClockSkew {
                last_ms: state.last_timestamp,
                current_ms: now,
            });
        }

        if now == state.last_timestamp {
            if state.sequence >= self.config.layout.sequence_mask() {
                return Ok(Attempt::Exhausted {
                    last_timestamp: state.last_timestamp,
                });
            }
            state.sequence += 1;
        } else {
            state.last_timestamp = now;
            state.sequence = 0;
        }

        let id = self.make_id(now, state.sequence)?;
        Ok(Attempt::Ready(id))
    }

    fn make_id(&self, timestamp: u64, sequence: u64) -> Result<Snowflake, AppError> {
        let layout = &self.config.layout;
        let delta = timestamp
            .checked_sub(self.config.epoch)
            .ok_or(AppError::ClockSkew {
                last_ms: self.config.epoch,
                current_ms: timestamp,
            })?;
        if delta > layout.max_timestamp_delta() {
            return Err(AppError::Configuration(format!(
                "timestamp delta {} exceeds {} bits; id space exhausted",
                delta,
                layout.timestamp_bits()
            )));
        }
        Ok(layout.compose(
            delta,
            self.config.datacenter_id,
            self.config.worker_id,
            sequence,
        ))
    }

    /// Spin without holding the lock until the clock passes `last_timestamp`.
    fn wait_next_millis(&self, last_timestamp: u64) -> Result<(), AppError> {
        loop {
            let now = self.clock.current_millis();
            if now > last_timestamp {
                return Ok(());
            }
            if now < last_timestamp {
                metrics::record_clock_skew();
                return Err(AppError::ClockSkew {
                    last_ms: last_timestamp,
                    current_ms: now,
                });
            }
            std::hint::spin_loop();
        }
    }
}

impl std::fmt::Debug for SnowflakeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
