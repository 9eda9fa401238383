//! Timing for measured runs.
//!
//! `Profiler` accumulates wall-clock time per named section of a tick
//! (`update`, `draw`). `PerformanceReport` is the end-of-run summary: total
//! elapsed time and the speedup against a reference duration.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// A simple profiler for measuring named sections of code.
#[derive(Debug, Default)]
pub struct Profiler {
    sections: HashMap<String, SectionStats>,
    tick_count: u64,
}

/// Statistics for a profiled section.
#[derive(Debug, Default, Clone)]
pub struct SectionStats {
    pub total_time: Duration,
    pub call_count: u64,
    pub min_time: Option<Duration>,
    pub max_time: Option<Duration>,
}

impl SectionStats {
    pub fn avg_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.call_count as u32
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.total_time += elapsed;
        self.call_count += 1;
        self.min_time = Some(self.min_time.map_or(elapsed, |m| m.min(elapsed)));
        self.max_time = Some(self.max_time.map_or(elapsed, |m| m.max(elapsed)));
    }
}

impl Profiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time a section using a closure.
    pub fn time_section<F, R>(&mut self, name: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.record(name, start.elapsed());
        result
    }

    /// Add a measured duration to a section.
    pub fn record(&mut self, name: &str, elapsed: Duration) {
        match self.sections.get_mut(name) {
            Some(stats) => stats.record(elapsed),
            None => {
                let mut stats = SectionStats::default();
                stats.record(elapsed);
                self.sections.insert(name.to_string(), stats);
            }
        }
    }

    pub fn tick(&mut self) {
        self.tick_count += 1;
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn get_section(&self, name: &str) -> Option<&SectionStats> {
        self.sections.get(name)
    }
}

impl fmt::Display for Profiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Profiler Summary ({} ticks) ===", self.tick_count)?;

        // Slowest first.
        let mut sections: Vec<_> = self.sections.iter().collect();
        sections.sort_by(|a, b| b.1.total_time.cmp(&a.1.total_time));
        let total: Duration = sections.iter().map(|(_, s)| s.total_time).sum();

        writeln!(
            f,
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>8}",
            "Section", "Total", "Avg", "Min", "Max", "% Time"
        )?;
        writeln!(f, "{}", "-".repeat(65))?;
        for (name, stats) in &sections {
            let pct = if total.as_nanos() > 0 {
                stats.total_time.as_nanos() as f64 / total.as_nanos() as f64 * 100.0
            } else {
                0.0
            };
            writeln!(
                f,
                "{:<12} {:>10.2?} {:>10.2?} {:>10.2?} {:>10.2?} {:>7.1}%",
                name,
                stats.total_time,
                stats.avg_time(),
                stats.min_time.unwrap_or(Duration::ZERO),
                stats.max_time.unwrap_or(Duration::ZERO),
                pct
            )?;
        }
        writeln!(f, "{}", "-".repeat(65))?;
        write!(f, "{:<12} {:>10.2?}", "TOTAL", total)
    }
}

/// Result of a measured run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceReport {
    pub elapsed: Duration,
    pub frames: u64,
    /// Reference run duration in milliseconds.
    pub reference_ms: f64,
}

impl PerformanceReport {
    pub fn new(elapsed: Duration, frames: u64, reference_ms: f64) -> Self {
        Self {
            elapsed,
            frames,
            reference_ms,
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Reference duration divided by the measured one. Infinite for a run
    /// that took no measurable time.
    pub fn speedup(&self) -> f64 {
        let ms = self.elapsed_ms();
        if ms <= 0.0 {
            f64::INFINITY
        } else {
            self.reference_ms / ms
        }
    }

    /// Elapsed time as `MM:SS:mmm`.
    pub fn clock_text(&self) -> String {
        let total_ms = self.elapsed.as_millis();
        let ms = total_ms % 1000;
        let sec = (total_ms / 1000) % 60;
        let min = total_ms / 60_000;
        format!("{min:02}:{sec:02}:{ms:03}")
    }

    pub fn speedup_text(&self) -> String {
        format!("SPEEDUP: {:4.1}", self.speedup())
    }
}

impl fmt::Display for PerformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} frames in {} ({:.0} ms), {}",
            self.frames,
            self.clock_text(),
            self.elapsed_ms(),
            self.speedup_text()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_profiler_basic() {
        let mut profiler = Profiler::new();

        profiler.time_section("update", || {
            sleep(Duration::from_millis(10));
        });
        profiler.tick();

        let stats = profiler.get_section("update").unwrap();
        assert!(stats.total_time >= Duration::from_millis(10));
        assert_eq!(stats.call_count, 1);
        assert_eq!(profiler.tick_count(), 1);
    }

    #[test]
    fn test_profiler_multiple_sections() {
        let mut profiler = Profiler::new();

        for _ in 0..5 {
            profiler.time_section("draw", || {
                sleep(Duration::from_millis(1));
            });
            profiler.time_section("update", || {
                sleep(Duration::from_millis(5));
            });
            profiler.tick();
        }

        let draw = profiler.get_section("draw").unwrap();
        let update = profiler.get_section("update").unwrap();
        assert_eq!(draw.call_count, 5);
        assert_eq!(update.call_count, 5);
        assert!(update.total_time > draw.total_time);

        let summary = profiler.to_string();
        assert!(summary.contains("update"));
        assert!(summary.contains("5 ticks"));
    }

    #[test]
    fn test_report_text() {
        let report = PerformanceReport::new(Duration::from_millis(83_456), 2000, 40_000.0);
        assert_eq!(report.clock_text(), "01:23:456");
        assert!((report.speedup() - 40_000.0 / 83_456.0).abs() < 1e-9);
        assert_eq!(report.speedup_text(), "SPEEDUP:  0.5");

        let fast = PerformanceReport::new(Duration::from_millis(8_000), 2000, 40_000.0);
        assert_eq!(fast.speedup_text(), "SPEEDUP:  5.0");
        assert!(fast.to_string().contains("2000 frames"));
    }
}
