// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::Serialize;
use std::time::{Duration, Instant};

/// Capture performance collected over one session
#[derive(Debug, Clone, Serialize)]
pub struct CaptureMetrics {
    /// Frames delivered by the session
    pub frames_captured: u64,
    /// Bytes delivered, frames times buffer size
    pub bytes_captured: u64,
    /// Output buffer size in bytes
    pub frame_size: usize,
    /// Total duration in milliseconds
    pub duration_ms: u64,
    /// Average throughput in frames per second
    pub throughput_fps: f64,
    /// Average bandwidth in megabits per second
    pub bandwidth_mbps: f64,
    /// Read latency statistics, in microseconds
    pub read_min_us: u64,
    pub read_max_us: u64,
    pub read_avg_us: u64,
    pub read_p50_us: u64,
    pub read_p95_us: u64,
    pub read_p99_us: u64,
    /// Why capture stopped: "complete", "interrupted", "end of stream" or the error
    pub stop_reason: String,
}

/// Collects per-read latency and volume while capturing
pub struct MetricsCollector {
    start_time: Instant,
    read_latencies_us: Vec<u64>,
    bytes: u64,
    frame_size: usize,
}

impl MetricsCollector {
    pub fn new(frame_size: usize) -> Self {
        Self {
            start_time: Instant::now(),
            read_latencies_us: Vec::new(),
            bytes: 0,
            frame_size,
        }
    }

    /// Record one delivered frame and how long `read_frame` took for it
    pub fn record_frame(&mut self, read_time: Duration, bytes: usize) {
        let latency_us = u64::try_from(read_time.as_micros()).unwrap_or(u64::MAX);
        self.read_latencies_us.push(latency_us);
        self.bytes += bytes as u64;
    }

    pub fn frames(&self) -> u64 {
        self.read_latencies_us.len() as u64
    }

    /// Finalize and calculate all metrics
    pub fn finalize(&mut self, stop_reason: &str) -> CaptureMetrics {
        let duration = self.start_time.elapsed();
        let duration_secs = duration.as_secs_f64();
        let frames_captured = self.frames();

        let throughput_fps = if duration_secs > 0.0 {
            frames_captured as f64 / duration_secs
        } else {
            0.0
        };

        let bandwidth_mbps = if duration_secs > 0.0 {
            (self.bytes as f64 * 8.0) / (duration_secs * 1_000_000.0)
        } else {
            0.0
        };

        self.read_latencies_us.sort_unstable();
        let (min, max, avg) = match (
            self.read_latencies_us.first(),
            self.read_latencies_us.last(),
        ) {
            (Some(&min), Some(&max)) => {
                let sum: u64 = self.read_latencies_us.iter().sum();
                (min, max, sum / frames_captured)
            }
            _ => (0, 0, 0),
        };

        CaptureMetrics {
            frames_captured,
            bytes_captured: self.bytes,
            frame_size: self.frame_size,
            duration_ms: duration.as_millis() as u64,
            throughput_fps,
            bandwidth_mbps,
            read_min_us: min,
            read_max_us: max,
            read_avg_us: avg,
            read_p50_us: self.percentile(50.0),
            read_p95_us: self.percentile(95.0),
            read_p99_us: self.percentile(99.0),
            stop_reason: stop_reason.to_owned(),
        }
    }

    /// Percentile of the sorted latency data
    fn percentile(&self, p: f64) -> u64 {
        if self.read_latencies_us.is_empty() {
            return 0;
        }

        let len = self.read_latencies_us.len();
        let idx = ((p / 100.0) * (len - 1) as f64).round() as usize;
        self.read_latencies_us[idx.min(len - 1)]
    }
}

/// Print metrics in human-readable format
pub fn print_text(metrics: &CaptureMetrics) {
    println!("\n=== Capture Metrics ===");
    println!("Frames captured:   {}", metrics.frames_captured);
    println!("Frame size:        {} bytes", metrics.frame_size);
    println!(
        "Bytes captured:    {} ({:.2} MB)",
        metrics.bytes_captured,
        metrics.bytes_captured as f64 / 1_048_576.0
    );
    println!(
        "Duration:          {:.2} s",
        metrics.duration_ms as f64 / 1000.0
    );
    println!("Throughput:        {:.2} fps", metrics.throughput_fps);
    println!("Bandwidth:         {:.2} Mbps", metrics.bandwidth_mbps);
    println!("Stopped:           {}", metrics.stop_reason);

    if metrics.frames_captured > 0 {
        println!("\nRead Latency (µs):");
        println!("  Min:    {}", metrics.read_min_us);
        println!("  Max:    {}", metrics.read_max_us);
        println!("  Avg:    {}", metrics.read_avg_us);
        println!("  P50:    {}", metrics.read_p50_us);
        println!("  P95:    {}", metrics.read_p95_us);
        println!("  P99:    {}", metrics.read_p99_us);
    }
}

/// Print metrics in JSON format
pub fn print_json(metrics: &CaptureMetrics) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(metrics)?;
    println!("{}", json);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_calculation() {
        let mut collector = MetricsCollector::new(16);

        // 0, 10, 20, ..., 100
        for i in 0..=10 {
            collector.record_frame(Duration::from_micros(i * 10), 16);
        }

        let metrics = collector.finalize("complete");

        assert_eq!(metrics.read_p50_us, 50);
        assert_eq!(metrics.read_p95_us, 100);
        assert_eq!(metrics.read_min_us, 0);
        assert_eq!(metrics.read_max_us, 100);
        assert_eq!(metrics.read_avg_us, 50);
        assert_eq!(metrics.bytes_captured, 11 * 16);
    }

    #[test]
    fn test_throughput_calculation() {
        let mut collector = MetricsCollector::new(100_000);

        for _ in 0..30 {
            collector.record_frame(Duration::from_millis(1), 100_000);
        }

        std::thread::sleep(Duration::from_millis(100));

        let metrics = collector.finalize("complete");

        assert_eq!(metrics.frames_captured, 30);
        assert_eq!(metrics.bytes_captured, 3_000_000);

        // roughly 300 fps (30 frames / 0.1 sec)
        assert!(metrics.throughput_fps > 100.0 && metrics.throughput_fps < 400.0);
    }

    #[test]
    fn test_empty_metrics() {
        let mut collector = MetricsCollector::new(0);
        let metrics = collector.finalize("end of stream");

        assert_eq!(metrics.frames_captured, 0);
        assert_eq!(metrics.bytes_captured, 0);
        assert_eq!(metrics.read_min_us, 0);
        assert_eq!(metrics.read_p99_us, 0);
        assert_eq!(metrics.stop_reason, "end of stream");
    }

    #[test]
    fn test_json_fields() {
        let mut collector = MetricsCollector::new(8);
        collector.record_frame(Duration::from_micros(5), 8);
        let value = serde_json::to_value(collector.finalize("complete")).unwrap();

        assert_eq!(value["frames_captured"], 1);
        assert_eq!(value["frame_size"], 8);
        assert_eq!(value["stop_reason"], "complete");
    }
}
