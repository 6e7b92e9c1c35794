//! Quality search schedule for the JPEG re-encode loop

/// Tolerance used when comparing a computed quality against the floor
pub const QUALITY_EPSILON: f32 = 1e-6;

/// Hard ceiling on encode attempts regardless of how small the step is
pub const MAX_ATTEMPTS: u32 = 100;

/// Bounded, strictly decreasing sequence of encoding qualities
///
/// Yields `start, start - step, start - 2*step, ...` and stops before a value
/// would fall below `floor`. Each value is computed from `start` directly rather
/// than by repeated subtraction, so `0.8 / 0.1 / 0.4` yields exactly five values
/// and never a sixth one caused by rounding drift.
#[derive(Debug, Clone)]
pub struct QualitySchedule {
    start: f32,
    step: f32,
    floor: f32,
    next_index: u32,
}

impl QualitySchedule {
    pub fn new(start: f32, step: f32, floor: f32) -> Self {
        Self {
            start,
            step,
            floor,
            next_index: 0,
        }
    }

    /// Quality the schedule would yield at `index`, if that index is reachable
    fn quality_at(&self, index: u32) -> Option<f32> {
        if index >= MAX_ATTEMPTS {
            return None;
        }
        if index > 0 && !(self.step.is_finite() && self.step > 0.0) {
            return None;
        }

        let quality = self.start - self.step * index as f32;
        if quality < self.floor - QUALITY_EPSILON {
            None
        } else {
            Some(quality)
        }
    }

    /// Total number of qualities this schedule will yield from the beginning
    pub fn max_attempts(&self) -> u32 {
        let mut count = 0;
        while self.quality_at(count).is_some() {
            count += 1;
        }
        count
    }
}

impl Iterator for QualitySchedule {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let quality = self.quality_at(self.next_index)?;
        self.next_index += 1;
        Some(quality)
    }
}
