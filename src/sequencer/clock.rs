// Clock - Tempo driven pulse divider
// Converts a free running microsecond time base into a stream of pulses

use super::PPQ;

/// Pulse clock
///
/// Time is passed in explicitly as microseconds since an arbitrary epoch, so
/// the clock itself never reads the system time.
#[derive(Debug, Clone)]
pub struct Clock {
    bpm: u32,
    ppq: u32,
    period_us: u64,
    pulse: i64,
    start_us: u64,
    last_us: u64,
    accumulated_us: u64,
    total_us: u64,
}

impl Clock {
    pub fn new(bpm: u32) -> Self {
        let mut clock = Self {
            bpm,
            ppq: PPQ,
            period_us: 0,
            pulse: -1,
            start_us: 0,
            last_us: 0,
            accumulated_us: 0,
            total_us: 0,
        };
        clock.set_tempo(bpm, PPQ);
        clock
    }

    /// Set tempo; applies from the next `update`
    pub fn set_tempo(&mut self, bpm: u32, ppq: u32) {
        self.bpm = bpm.max(1);
        self.ppq = ppq.max(1);
        self.period_us = (60_000_000 / (u64::from(self.bpm) * u64::from(self.ppq))).max(1);
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Pulse period in microseconds
    pub fn period_us(&self) -> u64 {
        self.period_us
    }

    /// Restart counting from `now_us`
    pub fn start(&mut self, now_us: u64) {
        self.pulse = -1;
        self.start_us = now_us;
        self.last_us = now_us;
        self.accumulated_us = 0;
        self.total_us = 0;
    }

    /// Advance to `now_us`, calling `on_pulse(pulse, total_elapsed_ms)` for
    /// every whole period that elapsed
    ///
    /// Late updates catch up by emitting all owed pulses in one call.
    pub fn update<F>(&mut self, now_us: u64, mut on_pulse: F)
    where
        F: FnMut(i64, u64),
    {
        self.accumulated_us += now_us.saturating_sub(self.last_us);
        self.last_us = self.last_us.max(now_us);

        while self.accumulated_us >= self.period_us {
            self.accumulated_us -= self.period_us;
            self.total_us += self.period_us;
            self.pulse += 1;
            on_pulse(self.pulse, self.total_us / 1000);
        }
    }

    /// Index of the last emitted pulse, -1 before the first
    pub fn current_pulse(&self) -> i64 {
        self.pulse
    }

    /// Wall time since `start`, in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        (self.last_us - self.start_us) / 1000
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(130)
    }
}
