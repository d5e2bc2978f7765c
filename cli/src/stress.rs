// Stress subcommand -- concurrent write/read-back cycles on several zones
// at once. Every task shares the one serial line, so a reply landing with
// the wrong caller shows up as a mismatch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};

use ampctl::{Amplifier, ZoneId};

// ---------------------------------------------------------------------------
// Latency statistics
// ---------------------------------------------------------------------------

struct LatencyStats {
    samples: Vec<Duration>,
}

struct ComputedStats {
    n: usize,
    min: Duration,
    avg: Duration,
    p50: Duration,
    p95: Duration,
    max: Duration,
}

impl LatencyStats {
    fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    fn record(&mut self, d: Duration) {
        self.samples.push(d);
    }

    fn merge(&mut self, other: LatencyStats) {
        self.samples.extend(other.samples);
    }

    fn compute(&mut self) -> Option<ComputedStats> {
        let n = self.samples.len();
        if n == 0 {
            return None;
        }
        self.samples.sort();
        let sum: Duration = self.samples.iter().sum();
        Some(ComputedStats {
            n,
            min: self.samples[0],
            avg: sum / n as u32,
            p50: self.samples[n * 50 / 100],
            p95: self.samples[(n * 95 / 100).min(n - 1)],
            max: self.samples[n - 1],
        })
    }
}

impl ComputedStats {
    fn fmt_line(&self) -> String {
        format!(
            "n={}  min={:.1}ms  avg={:.1}ms  p50={:.1}ms  p95={:.1}ms  max={:.1}ms",
            self.n,
            self.min.as_secs_f64() * 1000.0,
            self.avg.as_secs_f64() * 1000.0,
            self.p50.as_secs_f64() * 1000.0,
            self.p95.as_secs_f64() * 1000.0,
            self.max.as_secs_f64() * 1000.0,
        )
    }
}

// ---------------------------------------------------------------------------
// Per-zone worker
// ---------------------------------------------------------------------------

struct ZoneResult {
    zone: ZoneId,
    cycles: u32,
    mismatches: u32,
    unreadable: u32,
    errors: u32,
    stats: LatencyStats,
}

/// Logical volume for cycle `i`; distinct per zone so crossed replies show.
fn target_volume(zone: ZoneId, i: u32) -> u8 {
    (10 + (u32::from(zone.index()) * 13 + i * 7) % 80) as u8
}

fn expected_read_back(volume: u8) -> i32 {
    (i32::from(volume) * 87 / 100) * 100 / 87
}

async fn zone_worker(amp: Arc<dyn Amplifier>, zone: ZoneId, count: u32) -> ZoneResult {
    let mut result = ZoneResult {
        zone,
        cycles: 0,
        mismatches: 0,
        unreadable: 0,
        errors: 0,
        stats: LatencyStats::new(),
    };

    for i in 0..count {
        let volume = target_volume(zone, i);
        result.cycles += 1;

        if let Err(e) = amp.set_volume(zone, volume).await {
            eprintln!("[{zone} {i}] set_volume failed: {e}");
            result.errors += 1;
            continue;
        }

        let t = Instant::now();
        match amp.get_volume(zone).await {
            Ok(v) if v < 0 => result.unreadable += 1,
            Ok(v) => {
                result.stats.record(t.elapsed());
                if v != expected_read_back(volume) {
                    eprintln!("[{zone} {i}] wrote {volume}, read back {v}");
                    result.mismatches += 1;
                }
            }
            Err(e) => {
                eprintln!("[{zone} {i}] get_volume failed: {e}");
                result.errors += 1;
            }
        }
    }

    result
}

pub async fn cmd_stress(amp: Arc<dyn Amplifier>, zones: u8, count: u32) -> Result<()> {
    let zones = zones.min(amp.output_amount());
    if zones == 0 {
        bail!("need at least one zone");
    }

    // Remember where the zones were so they can be put back.
    let mut saved = Vec::new();
    for z in 0..zones {
        let zone = ZoneId::new(z);
        saved.push((zone, amp.get_volume(zone).await.unwrap_or(-1)));
    }

    println!("Stress test: {count} cycles on each of {zones} zones");
    let start = Instant::now();

    let tasks: Vec<_> = (0..zones)
        .map(|z| tokio::spawn(zone_worker(Arc::clone(&amp), ZoneId::new(z), count)))
        .collect();

    let mut all = LatencyStats::new();
    let mut failures = 0u32;
    println!();
    for task in tasks {
        let mut r = task.await?;
        failures += r.mismatches + r.errors;
        let line = r
            .stats
            .compute()
            .map(|s| s.fmt_line())
            .unwrap_or_else(|| "no samples".to_string());
        println!(
            "  {}: cycles={} mismatches={} unreadable={} errors={}  {}",
            r.zone, r.cycles, r.mismatches, r.unreadable, r.errors, line
        );
        all.merge(r.stats);
    }

    let elapsed = start.elapsed();
    println!();
    println!("  Elapsed:        {:.3} s", elapsed.as_secs_f64());
    if let Some(s) = all.compute() {
        println!("  Read-back:      {}", s.fmt_line());
    }

    for (zone, volume) in saved {
        if let Ok(volume) = u8::try_from(volume) {
            if let Err(e) = amp.set_volume(zone, volume).await {
                eprintln!("Warning: failed to restore {zone}: {e}");
            }
        }
    }

    if failures > 0 {
        bail!("{failures} stress cycles failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_stay_in_range_and_differ_between_zones() {
        for z in 0..6 {
            for i in 0..50 {
                let v = target_volume(ZoneId::new(z), i);
                assert!((10..90).contains(&v));
            }
        }
        assert_ne!(
            target_volume(ZoneId::new(0), 0),
            target_volume(ZoneId::new(1), 0)
        );
    }

    #[test]
    fn stats_percentiles() {
        let mut stats = LatencyStats::new();
        for ms in (1..=100).rev() {
            stats.record(Duration::from_millis(ms));
        }
        let s = stats.compute().unwrap();
        assert_eq!(s.n, 100);
        assert_eq!(s.min, Duration::from_millis(1));
        assert_eq!(s.p50, Duration::from_millis(51));
        assert_eq!(s.max, Duration::from_millis(100));
    }
}
