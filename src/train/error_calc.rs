use crate::config::ErrorMode;

/// Accumulates squared output errors over a pass.
#[derive(Debug, Clone)]
pub struct ErrorCalculation {
    mode: ErrorMode,
    global_error: f64,
    set_size: usize,
}

impl ErrorCalculation {
    pub fn new(mode: ErrorMode) -> Self {
        Self {
            mode,
            global_error: 0.0,
            set_size: 0,
        }
    }

    /// Adds the squared differences of one sample.
    pub fn update_error(&mut self, actual: &[f64], ideal: &[f64]) {
        for (a, i) in actual.iter().zip(ideal.iter()) {
            let delta = i - a;
            self.global_error += delta * delta;
        }
        self.set_size += ideal.len();
    }

    /// Adds one already computed difference.
    pub fn update_delta(&mut self, delta: f64) {
        self.global_error += delta * delta;
        self.set_size += 1;
    }

    /// Error of everything seen since the last reset, `0` if nothing was seen.
    pub fn calculate(&self) -> f64 {
        if self.set_size == 0 {
            return 0.0;
        }
        let mse = self.global_error / self.set_size as f64;
        match self.mode {
            ErrorMode::Mse => mse,
            ErrorMode::Rms => mse.sqrt(),
        }
    }

    pub fn reset(&mut self) {
        self.global_error = 0.0;
        self.set_size = 0;
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }
}
