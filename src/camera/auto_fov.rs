//! Auto-zoom table
//!
//! Maps the absolute pitch of a camera to a field of view, so looking towards
//! the poles (where the equirectangular source is most stretched) can zoom out
//! automatically. The table is piecewise linear between steps.

use serde::{Deserialize, Serialize};

/// One table step: from `pitch` upwards (absolute degrees) use `fov`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoFovStep {
    pub pitch: f64,
    pub fov: f64,
}

impl AutoFovStep {
    pub fn new(pitch: f64, fov: f64) -> Self {
        Self { pitch, fov }
    }
}

/// Steps ordered by ascending pitch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoFovTable {
    steps: Vec<AutoFovStep>,
}

impl AutoFovTable {
    /// Build a table, sorting the steps by pitch
    pub fn new(mut steps: Vec<AutoFovStep>) -> Self {
        steps.sort_by(|a, b| a.pitch.total_cmp(&b.pitch));
        Self { steps }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn steps(&self) -> &[AutoFovStep] {
        &self.steps
    }

    /// Fov for the given pitch, `None` when the table is empty
    ///
    /// Uses the highest step whose pitch is at or below `|pitch|` and
    /// interpolates towards the next one. Below the first step the first
    /// step's fov applies; from the last step on its fov applies exactly.
    pub fn resolve(&self, pitch: f64) -> Option<f64> {
        let first = self.steps.first()?;
        let pitch = pitch.abs();

        let index = match self.steps.iter().rposition(|step| step.pitch <= pitch) {
            Some(index) => index,
            None => return Some(first.fov),
        };

        let step = self.steps[index];
        let Some(next) = self.steps.get(index + 1) else {
            return Some(step.fov);
        };

        let span = next.pitch - step.pitch;
        if span <= 0.0 {
            return Some(step.fov);
        }

        let progress = (pitch - step.pitch) / span;
        Some(step.fov + (next.fov - step.fov) * progress)
    }
}
