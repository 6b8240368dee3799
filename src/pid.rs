//! A single-axis PID with integrator anti-windup, reusable for both
//! controller axes (az/el or RA/Dec).

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidGains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

#[derive(Debug, Clone)]
pub struct Pid {
    gains: PidGains,
    output_limit: f64,
    integral: f64,
    prev_error: Option<f64>,
}

impl Pid {
    pub fn new(gains: PidGains, output_limit: f64) -> Self {
        Pid {
            gains,
            output_limit,
            integral: 0.0,
            prev_error: None,
        }
    }

    /// Zeroes the integrator and derivative memory. Called on target change
    /// or gain change so stale history never leaks into the next tick.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = None;
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
        self.reset();
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    /// Advances the controller by `dt` given the current error, returning
    /// the clamped output.
    pub fn step(&mut self, error: f64, dt: Duration) -> f64 {
        let dt_s = dt.as_secs_f64();
        if dt_s <= 0.0 {
            return self.last_output(error);
        }

        let derivative = match self.prev_error {
            Some(prev) => (error - prev) / dt_s,
            None => 0.0,
        };
        self.prev_error = Some(error);

        let proposed_integral = self.integral + error * dt_s;
        let unclamped = self.gains.kp * error
            + self.gains.ki * proposed_integral
            + self.gains.kd * derivative;

        if unclamped.abs() <= self.output_limit || unclamped.signum() != self.integral.signum() {
            // Only accumulate the integrator when doing so doesn't push the
            // output further past the limit (anti-windup).
            self.integral = proposed_integral;
        }

        let output = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;
        output.clamp(-self.output_limit, self.output_limit)
    }

    fn last_output(&self, error: f64) -> f64 {
        (self.gains.kp * error + self.gains.ki * self.integral)
            .clamp(-self.output_limit, self.output_limit)
    }

    pub fn integral_term(&self) -> f64 {
        self.gains.ki * self.integral
    }
}
