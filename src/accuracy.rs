//! Incremental accuracy averaging across chunks and across sessions.

/// One step of an incremental arithmetic mean.
pub fn update(previous_average: f64, previous_count: u32, new_value: f64) -> f64 {
    (previous_average * previous_count as f64 + new_value) / (previous_count as f64 + 1.0)
}

/// Running average with its sample count, so a persisted lifetime accuracy
/// can seed a fresh session and keep blending correctly.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningAccuracy {
    average: f64,
    samples: u32,
}

impl RunningAccuracy {
    pub fn seeded(average: f64, samples: u32) -> Self {
        Self { average, samples }
    }

    pub fn push(&mut self, value: f64) {
        self.average = update(self.average, self.samples, value);
        self.samples += 1;
    }

    pub fn average(&self) -> f64 {
        self.average
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}
