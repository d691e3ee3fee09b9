//! Bilinear (Tustin) discretized transfer functions.
//!
//! Coefficient arrays are ordered by ascending power of `s`:
//! `num = [n0, n1, n2]` means `n2 s^2 + n1 s + n0`.
//!
//! Both filters evaluate at most once per simulation tick; repeated calls in
//! the same tick return the already computed output. When the output hits a
//! limit the history is reset to the saturated state so the filter leaves the
//! limit as soon as the input turns.

use tlm_core::{SimClock, limit};

use crate::delay::Delay;
use crate::error::{NumericsError, NumericsResult};

/// Shared once-per-tick guard.
#[derive(Clone, Debug, Default)]
struct TickGuard {
    clock: Option<SimClock>,
    last_tick: Option<f64>,
}

impl TickGuard {
    fn attach(&mut self, clock: &SimClock) {
        self.clock = Some(clock.clone());
        self.last_tick = None;
    }

    /// `Ok(true)` when this is the first call in the current tick.
    fn enter(&mut self, what: &'static str) -> NumericsResult<bool> {
        let now = self
            .clock
            .as_ref()
            .ok_or(NumericsError::NotInitialized { what })?
            .time();
        if self.last_tick == Some(now) {
            Ok(false)
        } else {
            self.last_tick = Some(now);
            Ok(true)
        }
    }
}

/// `(n1 s + n0) / (d1 s + d0)` discretized with the bilinear transform.
#[derive(Clone, Debug)]
pub struct FirstOrderTransferFunction {
    cu: [f64; 2],
    cy: [f64; 2],
    ts: f64,
    u_prev: f64,
    y_prev: f64,
    y: f64,
    min: f64,
    max: f64,
    saturated: bool,
    guard: TickGuard,
}

impl Default for FirstOrderTransferFunction {
    fn default() -> Self {
        Self {
            cu: [0.0, 1.0],
            cy: [0.0, 1.0],
            ts: 0.0,
            u_prev: 0.0,
            y_prev: 0.0,
            y: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            saturated: false,
            guard: TickGuard::default(),
        }
    }
}

impl FirstOrderTransferFunction {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        clock: &SimClock,
        ts: f64,
        num: [f64; 2],
        den: [f64; 2],
        u0: f64,
        y0: f64,
        min: f64,
        max: f64,
    ) -> NumericsResult<()> {
        if !(ts > 0.0) {
            return Err(NumericsError::InvalidArg {
                what: "filter timestep must be positive",
            });
        }
        self.ts = ts;
        self.min = min;
        self.max = max;
        self.set_num_den(num, den)?;
        let y0 = limit(y0, min, max);
        self.u_prev = u0;
        self.y_prev = y0;
        self.y = y0;
        self.saturated = false;
        self.guard.attach(clock);
        Ok(())
    }

    /// Replace the dynamics while keeping the history.
    pub fn set_num_den(&mut self, num: [f64; 2], den: [f64; 2]) -> NumericsResult<()> {
        let t = self.ts;
        let cu = [num[0] * t - 2.0 * num[1], num[0] * t + 2.0 * num[1]];
        let cy = [den[0] * t - 2.0 * den[1], den[0] * t + 2.0 * den[1]];
        if cy[1] == 0.0 || !cy[1].is_finite() {
            return Err(NumericsError::SingularDenominator {
                what: "first order transfer function",
            });
        }
        self.cu = cu;
        self.cy = cy;
        Ok(())
    }

    pub fn set_min_max(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    pub fn update(&mut self, u: f64) -> NumericsResult<f64> {
        if !self.guard.enter("FirstOrderTransferFunction")? {
            return Ok(self.y);
        }
        let raw = (self.cu[1] * u + self.cu[0] * self.u_prev - self.cy[0] * self.y_prev) / self.cy[1];
        let y = limit(raw, self.min, self.max);
        self.saturated = y != raw;
        self.u_prev = if self.saturated { y } else { u };
        self.y_prev = y;
        self.y = y;
        Ok(y)
    }

    pub fn value(&self) -> f64 {
        self.y
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

/// `(n2 s^2 + n1 s + n0) / (d2 s^2 + d1 s + d0)` discretized with the
/// bilinear transform, output limited to `[min, max]`.
#[derive(Clone, Debug)]
pub struct SecondOrderTransferFunction {
    cu: [f64; 3],
    cy: [f64; 3],
    ts: f64,
    u_hist: Delay,
    y_hist: Delay,
    last_u: f64,
    y: f64,
    min: f64,
    max: f64,
    saturated: bool,
    guard: TickGuard,
}

/// The spool/position filter name used by valve components.
pub type SecondOrderFilter = SecondOrderTransferFunction;

impl Default for SecondOrderTransferFunction {
    fn default() -> Self {
        Self {
            cu: [1.0, 0.0, 0.0],
            cy: [1.0, 0.0, 0.0],
            ts: 0.0,
            u_hist: Delay::with_steps(1, 0.0),
            y_hist: Delay::with_steps(1, 0.0),
            last_u: 0.0,
            y: 0.0,
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
            saturated: false,
            guard: TickGuard::default(),
        }
    }
}

impl SecondOrderTransferFunction {
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        &mut self,
        clock: &SimClock,
        ts: f64,
        num: [f64; 3],
        den: [f64; 3],
        u0: f64,
        y0: f64,
        min: f64,
        max: f64,
    ) -> NumericsResult<()> {
        if !(ts > 0.0) {
            return Err(NumericsError::InvalidArg {
                what: "filter timestep must be positive",
            });
        }
        self.ts = ts;
        self.min = min;
        self.max = max;
        self.set_num_den(num, den)?;

        let y0 = limit(y0, min, max);
        // Two samples of history each: u[-1], u[-2] and y[-1], y[-2].
        self.u_hist = Delay::with_steps(1, u0);
        self.y_hist = Delay::with_steps(1, y0);
        self.u_hist.initialize(clock, u0);
        self.y_hist.initialize(clock, y0);
        self.last_u = u0;
        self.y = y0;
        self.saturated = false;
        self.guard.attach(clock);
        Ok(())
    }

    /// Replace the dynamics while keeping the history.
    pub fn set_num_den(&mut self, num: [f64; 3], den: [f64; 3]) -> NumericsResult<()> {
        let cu = tustin(num, self.ts);
        let cy = tustin(den, self.ts);
        if cy[0] == 0.0 || !cy[0].is_finite() {
            return Err(NumericsError::SingularDenominator {
                what: "second order transfer function",
            });
        }
        self.cu = cu;
        self.cy = cy;
        Ok(())
    }

    pub fn set_min_max(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    pub fn update(&mut self, u: f64) -> NumericsResult<f64> {
        if !self.guard.enter("SecondOrderTransferFunction")? {
            return Ok(self.y);
        }
        let u1 = self.u_hist.value_idx(1)?;
        let u2 = self.u_hist.value_idx(2)?;
        let y1 = self.y_hist.value_idx(1)?;
        let y2 = self.y_hist.value_idx(2)?;

        let raw = (self.cu[0] * u + self.cu[1] * u1 + self.cu[2] * u2
            - self.cy[1] * y1
            - self.cy[2] * y2)
            / self.cy[0];
        let y = limit(raw, self.min, self.max);
        self.saturated = y != raw;

        if self.saturated {
            self.u_hist.fill(y);
            self.y_hist.fill(y);
        } else {
            self.u_hist.update(u)?;
            self.y_hist.update(y)?;
        }
        self.last_u = u;
        self.y = y;
        Ok(y)
    }

    /// Update with `u` and return the new output.
    pub fn value_with(&mut self, u: f64) -> NumericsResult<f64> {
        self.update(u)
    }

    /// Re-feed the most recent input.
    pub fn value_again(&mut self) -> NumericsResult<f64> {
        self.update(self.last_u)
    }

    pub fn value(&self) -> f64 {
        self.y
    }

    pub fn is_saturated(&self) -> bool {
        self.saturated
    }
}

/// `[c0, c1, c2]` multiplying `x[n], x[n-1], x[n-2]`.
fn tustin(p: [f64; 3], t: f64) -> [f64; 3] {
    let t2 = t * t;
    [
        p[0] * t2 + 2.0 * p[1] * t + 4.0 * p[2],
        2.0 * p[0] * t2 - 8.0 * p[2],
        p[0] * t2 - 2.0 * p[1] * t + 4.0 * p[2],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: f64 = 1e-3;

    fn run<F: FnMut(f64) -> f64>(clock: &SimClock, n: usize, mut f: F) -> Vec<f64> {
        (1..=n)
            .map(|i| {
                clock.set(i as f64 * TS);
                f(i as f64)
            })
            .collect()
    }

    #[test]
    fn identity_second_order_reproduces_input() {
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            0.0,
            0.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .unwrap();

        let out = run(&clock, 50, |i| tf.update((i * 0.37).sin()).unwrap());
        for (i, y) in out.iter().enumerate().skip(3) {
            let u = ((i + 1) as f64 * 0.37).sin();
            assert!((y - u).abs() < 1e-9, "step {i}: {y} != {u}");
        }
        assert!(!tf.is_saturated());
    }

    #[test]
    fn pure_second_order_ratio_tracks_input() {
        // s^2 / s^2
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 1.0],
            0.0,
            0.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .unwrap();

        let input = |i: f64| 3.0 * (i * 0.05).sin() + 0.5 * (i * 0.31).cos() - 0.5;
        let out = run(&clock, 200, |i| tf.update(input(i)).unwrap());
        for (i, y) in out.iter().enumerate() {
            let u = input((i + 1) as f64);
            assert!((y - u).abs() < 1e-8, "step {i}: {y} != {u}");
        }
    }

    #[test]
    fn low_pass_converges_to_dc_gain() {
        // w^2 / (s^2 + 2 d w s + w^2)
        let w: f64 = 100.0;
        let d = 0.7;
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderFilter::default();
        tf.initialize(
            &clock,
            TS,
            [w * w, 0.0, 0.0],
            [w * w, 2.0 * d * w, 1.0],
            0.0,
            0.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .unwrap();
        let out = run(&clock, 2000, |_| tf.update(2.0).unwrap());
        let last = *out.last().unwrap();
        assert!((last - 2.0).abs() < 1e-6, "expected DC gain 1, got {last}");
    }

    #[test]
    fn repeated_update_in_tick_is_noop() {
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            0.0,
            0.0,
            -10.0,
            10.0,
        )
        .unwrap();
        clock.set(TS);
        let a = tf.update(1.0).unwrap();
        let b = tf.update(5.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(tf.value_again().unwrap(), 1.0);
    }

    #[test]
    fn output_is_clamped_and_flagged() {
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            1.0,
            5.0,
            -1.0,
            1.0,
        )
        .unwrap();
        // initial output already clamped
        assert_eq!(tf.value(), 1.0);
        clock.set(TS);
        assert_eq!(tf.update(3.0).unwrap(), 1.0);
        assert!(tf.is_saturated());
        clock.set(2.0 * TS);
        assert_eq!(tf.update(0.5).unwrap(), 0.5);
        assert!(!tf.is_saturated());
    }

    #[test]
    fn set_num_den_keeps_history() {
        let w: f64 = 100.0;
        let den = [w * w, 1.4 * w, 1.0];
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [w * w, 0.0, 0.0],
            den,
            0.0,
            0.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .unwrap();
        run(&clock, 2000, |_| tf.update(1.0).unwrap());
        assert!((tf.value() - 1.0).abs() < 1e-6);

        tf.set_num_den([2.0 * w * w, 0.0, 0.0], den).unwrap();
        assert!((tf.value() - 1.0).abs() < 1e-6, "output kept across set_num_den");
        let out = run(&clock, 3, |_| tf.update(1.0).unwrap());
        assert!(out[0] < 1.5, "history carried over, no jump to the new gain");
        run(&clock, 2000, |_| tf.update(1.0).unwrap());
        assert!((tf.value() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn singular_denominator_is_rejected() {
        let clock = SimClock::new(0.0);
        let mut tf = SecondOrderTransferFunction::default();
        let err = tf
            .initialize(&clock, TS, [1.0, 0.0, 0.0], [0.0; 3], 0.0, 0.0, -1.0, 1.0)
            .unwrap_err();
        assert!(matches!(err, NumericsError::SingularDenominator { .. }));
    }

    #[test]
    fn update_before_initialize_fails() {
        let mut tf = FirstOrderTransferFunction::default();
        assert!(matches!(
            tf.update(1.0),
            Err(NumericsError::NotInitialized { .. })
        ));
    }

    #[test]
    fn first_order_low_pass_step_response() {
        // 1 / (tau s + 1)
        let tau = 0.01;
        let clock = SimClock::new(0.0);
        let mut tf = FirstOrderTransferFunction::default();
        tf.initialize(
            &clock,
            TS,
            [1.0, 0.0],
            [1.0, tau],
            0.0,
            0.0,
            f64::NEG_INFINITY,
            f64::INFINITY,
        )
        .unwrap();
        let out = run(&clock, 10, |_| tf.update(1.0).unwrap());
        // after one time constant roughly 63 %
        assert!((out[9] - (1.0 - (-1.0f64).exp())).abs() < 0.03, "got {}", out[9]);
        let out = run(&clock, 500, |_| tf.update(1.0).unwrap());
        assert!((out[499] - 1.0).abs() < 1e-6);
    }
}
