//! Snowflake ID value object and bit layout.
//!
//! Snowflake IDs are 64-bit integers with embedded timestamp information,
//! allowing for time-sortable, globally unique identifiers without coordination.
//!
//! ## Structure (default layout)
//!
//! ```text
//! 63  62                         22          17          12          0
//! +---+---------------------------+-----------+-----------+-----------+
//! | 0 |     timestamp delta       | datacenter|  worker   |  sequence |
//! |   |        (41 bits)          |  (5 bits) |  (5 bits) |  (12 bits)|
//! +---+---------------------------+-----------+-----------+-----------+
//! ```
//!
//! Worker, datacenter and sequence widths are configurable; the sign bit is
//! always reserved and the timestamp takes whatever remains.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::shared::error::AppError;

/// Platform epoch: 2020-01-01T00:00:00Z in milliseconds
pub const PLATFORM_EPOCH: u64 = 1577836800000;

/// Bits available to the four fields (sign bit reserved).
pub const USABLE_BITS: u32 = 63;

/// A Snowflake ID. Stored as `i64` to match BIGINT columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snowflake(pub i64);

impl Snowflake {
    /// Create a new Snowflake from raw value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Get the raw i64 value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Get the raw value as unsigned.
    pub fn as_u64(&self) -> u64 {
        self.0 as u64
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Snowflake> for i64 {
    fn from(snowflake: Snowflake) -> Self {
        snowflake.0
    }
}

/// Decoded fields of a Snowflake under a given layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeParts {
    /// Milliseconds since the generator's start epoch
    pub timestamp_delta: u64,
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

/// Validated bit layout of a Snowflake ID.
///
/// Field order, most significant first: timestamp delta, datacenter id,
/// worker id, sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnowflakeLayout {
    worker_id_bits: u32,
    datacenter_id_bits: u32,
    sequence_bits: u32,
}

impl SnowflakeLayout {
    /// Build a layout, rejecting widths that leave no room for a timestamp.
    pub fn new(
        worker_id_bits: u32,
        datacenter_id_bits: u32,
        sequence_bits: u32,
    ) -> Result<Self, AppError> {
        let used = worker_id_bits
            .checked_add(datacenter_id_bits)
            .and_then(|sum| sum.checked_add(sequence_bits))
            .ok_or_else(|| AppError::Configuration("bit widths overflow".into()))?;

        if used >= USABLE_BITS {
            return Err(AppError::Configuration(format!(
                "worker ({}) + datacenter ({}) + sequence ({}) bits must leave at least one timestamp bit out of {}",
                worker_id_bits, datacenter_id_bits, sequence_bits, USABLE_BITS
            )));
        }

        Ok(Self {
            worker_id_bits,
            datacenter_id_bits,
            sequence_bits,
        })
    }

    /// 5 worker bits, 5 datacenter bits, 12 sequence bits.
    pub fn standard() -> Self {
        Self {
            worker_id_bits: 5,
            datacenter_id_bits: 5,
            sequence_bits: 12,
        }
    }

    pub fn worker_id_bits(&self) -> u32 {
        self.worker_id_bits
    }

    pub fn datacenter_id_bits(&self) -> u32 {
        self.datacenter_id_bits
    }

    pub fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    pub fn timestamp_bits(&self) -> u32 {
        USABLE_BITS - self.worker_id_bits - self.datacenter_id_bits - self.sequence_bits
    }

    pub fn max_worker_id(&self) -> u64 {
        mask(self.worker_id_bits)
    }

    pub fn max_datacenter_id(&self) -> u64 {
        mask(self.datacenter_id_bits)
    }

    pub fn sequence_mask(&self) -> u64 {
        mask(self.sequence_bits)
    }

    pub fn max_timestamp_delta(&self) -> u64 {
        mask(self.timestamp_bits())
    }

    fn worker_id_shift(&self) -> u32 {
        self.sequence_bits
    }

    fn datacenter_id_shift(&self) -> u32 {
        self.sequence_bits + self.worker_id_bits
    }

    fn timestamp_shift(&self) -> u32 {
        self.sequence_bits + self.worker_id_bits + self.datacenter_id_bits
    }

    /// Check that worker and datacenter ids fit their configured widths.
    pub fn validate_ids(&self, worker_id: u64, datacenter_id: u64) -> Result<(), AppError> {
        if worker_id > self.max_worker_id() {
            return Err(AppError::Configuration(format!(
                "worker_id {} out of range (0-{})",
                worker_id,
                self.max_worker_id()
            )));
        }
        if datacenter_id > self.max_datacenter_id() {
            return Err(AppError::Configuration(format!(
                "datacenter_id {} out of range (0-{})",
                datacenter_id,
                self.max_datacenter_id()
            )));
        }
        Ok(())
    }

    /// Pack the four fields into an id. Callers guarantee each field fits.
    pub fn compose(
        &self,
        timestamp_delta: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Snowflake {
        let raw = (timestamp_delta << self.timestamp_shift())
            | (datacenter_id << self.datacenter_id_shift())
            | (worker_id << self.worker_id_shift())
            | sequence;
        Snowflake(raw as i64)
    }

    /// Split an id back into its fields.
    pub fn decompose(&self, id: Snowflake) -> SnowflakeParts {
        let raw = id.as_u64();
        SnowflakeParts {
            timestamp_delta: raw >> self.timestamp_shift(),
            datacenter_id: (raw >> self.datacenter_id_shift()) & self.max_datacenter_id(),
            worker_id: (raw >> self.worker_id_shift()) & self.max_worker_id(),
            sequence: raw & self.sequence_mask(),
        }
    }

    /// Wall-clock milliseconds at which `id` was minted.
    pub fn timestamp_of(&self, id: Snowflake, epoch: u64) -> u64 {
        self.decompose(id).timestamp_delta + epoch
    }

    /// Creation time of `id` as a DateTime.
    pub fn created_at(&self, id: Snowflake, epoch: u64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp_of(id, epoch) as i64)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl Default for SnowflakeLayout {
    fn default() -> Self {
        Self::standard()
    }
}

#[inline]
fn mask(bits: u32) -> u64 {
    if bits == 0 {
        0
    } else {
        (1u64 << bits) - 1
    }
}
