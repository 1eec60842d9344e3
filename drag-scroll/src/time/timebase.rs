//! Monotonic Timebase
//!
//! Every timestamp in the gesture core is nanoseconds on one monotonic clock.
//! On macOS that clock is `mach_absolute_time` (the same clock CGEvent
//! timestamps are taken from), elsewhere it is `std::time::Instant` measured
//! from a process-wide origin.

use std::sync::OnceLock;

#[cfg(target_os = "macos")]
static TIMEBASE_INFO: OnceLock<TimebaseInfo> = OnceLock::new();

#[cfg(not(target_os = "macos"))]
static ORIGIN: OnceLock<std::time::Instant> = OnceLock::new();

/// Cached mach timebase conversion factors
#[cfg(target_os = "macos")]
#[derive(Debug, Clone, Copy)]
struct TimebaseInfo {
    numer: u32,
    denom: u32,
}

/// Process-wide monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct Timebase;

impl Timebase {
    /// Initialize the timebase. Cheap and idempotent; call once at startup.
    #[cfg(target_os = "macos")]
    pub fn init() {
        Self::info();
    }

    /// Initialize the timebase. Cheap and idempotent; call once at startup.
    #[cfg(not(target_os = "macos"))]
    pub fn init() {
        ORIGIN.get_or_init(std::time::Instant::now);
    }

    #[cfg(target_os = "macos")]
    fn info() -> TimebaseInfo {
        *TIMEBASE_INFO.get_or_init(|| {
            let mut info = mach2::mach_time::mach_timebase_info_data_t { numer: 0, denom: 0 };
            // Safety: mach_timebase_info only writes into the provided struct
            unsafe {
                mach2::mach_time::mach_timebase_info(&mut info);
            }
            if info.denom == 0 {
                // Never observed in practice; fall back to 1:1 (Apple Silicon)
                TimebaseInfo { numer: 1, denom: 1 }
            } else {
                TimebaseInfo {
                    numer: info.numer,
                    denom: info.denom,
                }
            }
        })
    }

    /// Convert raw mach ticks (e.g. `CGEventGetTimestamp`) to nanoseconds.
    #[cfg(target_os = "macos")]
    #[inline]
    pub fn mach_ticks_to_nanos(ticks: u64) -> u64 {
        let info = Self::info();
        ((ticks as u128 * info.numer as u128) / info.denom as u128) as u64
    }

    /// Nanoseconds on the monotonic clock.
    #[cfg(target_os = "macos")]
    #[inline]
    pub fn now_nanos() -> u64 {
        // Safety: mach_absolute_time has no preconditions
        let ticks = unsafe { mach2::mach_time::mach_absolute_time() };
        Self::mach_ticks_to_nanos(ticks)
    }

    /// Nanoseconds on the monotonic clock.
    #[cfg(not(target_os = "macos"))]
    #[inline]
    pub fn now_nanos() -> u64 {
        let origin = ORIGIN.get_or_init(std::time::Instant::now);
        origin.elapsed().as_nanos() as u64
    }
}

/// A point on the monotonic clock, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Negative and non-finite inputs clamp to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_finite() && secs > 0.0 {
            Self((secs * 1_000_000_000.0).round() as u64)
        } else {
            Self(0)
        }
    }

    /// Convert a CGEvent timestamp.
    #[cfg(target_os = "macos")]
    #[inline]
    pub fn from_mach_ticks(ticks: u64) -> Self {
        Self(Timebase::mach_ticks_to_nanos(ticks))
    }

    /// Capture the current time.
    #[inline]
    pub fn now() -> Self {
        Self(Timebase::now_nanos())
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1_000_000_000.0
    }

    /// Duration since an earlier timestamp, saturating to zero when `earlier`
    /// is actually later.
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> std::time::Duration {
        std::time::Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Seconds elapsed since `earlier`, never negative.
    #[inline]
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        self.duration_since(earlier).as_secs_f64()
    }

    #[inline]
    pub fn is_after(&self, other: Timestamp) -> bool {
        self.0 > other.0
    }
}

impl std::ops::Add<std::time::Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: std::time::Duration) -> Self::Output {
        let nanos = u64::try_from(rhs.as_nanos()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(nanos))
    }
}

impl serde::Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let nanos = u64::deserialize(deserializer)?;
        Ok(Timestamp(nanos))
    }
}
