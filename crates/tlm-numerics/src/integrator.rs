//! Trapezoidal integrator with output limits.

use tlm_core::{SimClock, limit};

use crate::error::{NumericsError, NumericsResult};

/// `y[n] = y[n-1] + Ts/2 (u[n] + u[n-1])`, limited to `[min, max]`.
///
/// While the output sits on a limit the stored input is zeroed so the
/// integrator leaves the limit on the first sample that points inwards.
#[derive(Clone, Debug)]
pub struct Integrator {
    ts: f64,
    u_prev: f64,
    y: f64,
    min: f64,
    max: f64,
    clock: Option<SimClock>,
    last_tick: Option<f64>,
}

impl Default for Integrator {
    fn default() -> Self {
        Self {
            ts: 0.0,
            u_prev: 0.0,
            y: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            clock: None,
            last_tick: None,
        }
    }
}

impl Integrator {
    pub fn initialize(
        &mut self,
        clock: &SimClock,
        ts: f64,
        u0: f64,
        y0: f64,
        min: f64,
        max: f64,
    ) -> NumericsResult<()> {
        if !(ts > 0.0) {
            return Err(NumericsError::InvalidArg {
                what: "integrator timestep must be positive",
            });
        }
        self.ts = ts;
        self.u_prev = u0;
        self.min = min;
        self.max = max;
        self.y = limit(y0, min, max);
        self.clock = Some(clock.clone());
        self.last_tick = None;
        Ok(())
    }

    pub fn update(&mut self, u: f64) -> NumericsResult<f64> {
        let now = self
            .clock
            .as_ref()
            .ok_or(NumericsError::NotInitialized { what: "Integrator" })?
            .time();
        if self.last_tick == Some(now) {
            return Ok(self.y);
        }
        self.last_tick = Some(now);

        let raw = self.y + 0.5 * self.ts * (u + self.u_prev);
        self.y = limit(raw, self.min, self.max);
        self.u_prev = if self.y != raw { 0.0 } else { u };
        Ok(self.y)
    }

    pub fn value(&self) -> f64 {
        self.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_constant_exactly() {
        let clock = SimClock::new(0.0);
        let mut i = Integrator::default();
        i.initialize(&clock, 0.01, 2.0, 0.0, f64::NEG_INFINITY, f64::INFINITY)
            .unwrap();
        for n in 1..=100 {
            clock.set(n as f64 * 0.01);
            i.update(2.0).unwrap();
        }
        assert!((i.value() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn stops_at_limit_and_leaves_it() {
        let clock = SimClock::new(0.0);
        let mut i = Integrator::default();
        i.initialize(&clock, 0.1, 0.0, 0.0, 0.0, 0.5).unwrap();
        for n in 1..=20 {
            clock.set(n as f64 * 0.1);
            i.update(1.0).unwrap();
        }
        assert_eq!(i.value(), 0.5);
        clock.set(2.1);
        let y = i.update(-1.0).unwrap();
        assert!((y - 0.45).abs() < 1e-12, "got {y}");
    }
}
