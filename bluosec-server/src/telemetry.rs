//! Simulated telemetry for the link service.
//!
//! The service has no motor attached. It reports a configured set of values
//! and advances the uptime counter on a fixed tick.

use bluosec_core::{Telemetry, TelemetrySource};
use parking_lot::RwLock;
use std::time::{Duration, Instant};

/// Telemetry source backed by static values and a ticking uptime.
pub struct SimulatedTelemetry {
    base: RwLock<Telemetry>,
    started: Instant,
    tick: Duration,
}

impl SimulatedTelemetry {
    pub fn new(initial: Telemetry, tick: Duration) -> Self {
        Self {
            base: RwLock::new(initial),
            started: Instant::now(),
            tick,
        }
    }

    /// Replaces the reported values. Uptime keeps counting from the new base.
    pub fn update(&self, f: impl FnOnce(&mut Telemetry)) {
        f(&mut self.base.write());
    }

    fn ticks(&self) -> u8 {
        if self.tick.is_zero() {
            return 0;
        }
        // Uptime wraps at 256 ticks.
        (self.started.elapsed().as_nanos() / self.tick.as_nanos()) as u8
    }
}

impl TelemetrySource for SimulatedTelemetry {
    fn snapshot(&self) -> Telemetry {
        let mut telemetry = self.base.read().clone();
        telemetry.uptime = telemetry.uptime.wrapping_add(self.ticks());
        telemetry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_values_reported() {
        let source = SimulatedTelemetry::new(
            Telemetry {
                battery_voltage: 40,
                speed: 18,
                ..Default::default()
            },
            Duration::from_secs(3600),
        );
        let snapshot = source.snapshot();
        assert_eq!(snapshot.battery_voltage, 40);
        assert_eq!(snapshot.speed, 18);
        assert_eq!(snapshot.uptime, 0);
    }

    #[test]
    fn test_uptime_ticks() {
        let source = SimulatedTelemetry::new(Telemetry::default(), Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(30));
        assert!(source.snapshot().uptime >= 5);
    }

    #[test]
    fn test_update() {
        let source = SimulatedTelemetry::new(Telemetry::default(), Duration::ZERO);
        source.update(|t| {
            t.brake = true;
            t.uptime = 250;
        });
        let snapshot = source.snapshot();
        assert!(snapshot.brake);
        assert_eq!(snapshot.uptime, 250);
    }
}
