//! Speed cadence tables for rate-limited servo motion.
//!
//! A hobby servo has no speed input, so speed is emulated by how often the
//! commanded angle is nudged by one degree. A cadence table maps a speed
//! percentage to the minimum dwell time between two such steps.
//!
//! Bands are half-open: `[min_percent, max_percent)`. A speed equal to a
//! band's `max_percent` belongs to the next band.

/// One entry of a [`CadenceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedBand {
    /// Inclusive lower bound (%).
    pub min_percent: u8,
    /// Exclusive upper bound (%). `u16` so the top band can include 100.
    pub max_percent: u16,
    /// Minimum time between one-degree steps (ms).
    pub min_time_ms: u16,
}

impl SpeedBand {
    pub const fn new(
        min_percent: u8,
        max_percent: u16,
        min_time_ms: u16,
    ) -> Self {
        Self {
            min_percent,
            max_percent,
            min_time_ms,
        }
    }

    #[inline]
    pub fn contains(
        &self,
        speed_percent: u8,
    ) -> bool {
        speed_percent >= self.min_percent && (speed_percent as u16) < self.max_percent
    }
}

/// Reference cadence: 10 % steps every 100 ms, each further 10 % is 10 ms
/// faster, 100 % steps every tick.
pub const DEFAULT_BANDS: [SpeedBand; 10] = [
    SpeedBand::new(10, 20, 100),
    SpeedBand::new(20, 30, 90),
    SpeedBand::new(30, 40, 80),
    SpeedBand::new(40, 50, 70),
    SpeedBand::new(50, 60, 60),
    SpeedBand::new(60, 70, 50),
    SpeedBand::new(70, 80, 40),
    SpeedBand::new(80, 90, 30),
    SpeedBand::new(90, 100, 20),
    SpeedBand::new(100, 101, 10),
];

/// Reasons a band list cannot be used as a cadence table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceError {
    Empty,
    /// Band at this index has `min_percent >= max_percent`.
    EmptyBand(usize),
    /// Band at this index starts before the previous one ends.
    Overlap(usize),
}

/// Ordered, validated list of speed bands.
#[derive(Debug, Clone, Copy)]
pub struct CadenceTable {
    bands: &'static [SpeedBand],
}

impl Default for CadenceTable {
    fn default() -> Self {
        Self::REFERENCE
    }
}

impl CadenceTable {
    /// Table built from [`DEFAULT_BANDS`].
    pub const REFERENCE: Self = Self {
        bands: &DEFAULT_BANDS,
    };

    /// Validate `bands` and wrap them.
    ///
    /// Bands must be non-empty, strictly increasing and non-overlapping. Gaps
    /// between bands are allowed; speeds in a gap never step.
    pub fn new(bands: &'static [SpeedBand]) -> Result<Self, CadenceError> {
        if bands.is_empty() {
            return Err(CadenceError::Empty);
        }
        for (i, band) in bands.iter().enumerate() {
            if band.min_percent as u16 >= band.max_percent {
                return Err(CadenceError::EmptyBand(i));
            }
            if i > 0 && (band.min_percent as u16) < bands[i - 1].max_percent {
                return Err(CadenceError::Overlap(i));
            }
        }
        Ok(Self { bands })
    }

    pub fn bands(&self) -> &'static [SpeedBand] {
        self.bands
    }

    /// Band containing `speed_percent`, if any.
    pub fn band_for(
        &self,
        speed_percent: u8,
    ) -> Option<&'static SpeedBand> {
        self.bands.iter().find(|band| band.contains(speed_percent))
    }

    /// Whether a joint at `speed_percent` that has waited `elapsed_ms` since
    /// its last step is due for the next one.
    pub fn is_due(
        &self,
        speed_percent: u8,
        elapsed_ms: u16,
    ) -> bool {
        self.band_for(speed_percent)
            .is_some_and(|band| elapsed_ms >= band.min_time_ms)
    }
}
