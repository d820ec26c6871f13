//! Forward-pass latency benchmark
//!
//! Times repeated forward passes of a freshly built model on random input.
//!
//! ## Key Metrics
//!
//! - **Latency**: time per forward pass (ms)
//! - **Throughput**: images processed per second

use std::path::Path;
use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Distribution, Tensor};
use serde::{Deserialize, Serialize};

use super::{BENCHMARK_ITERATIONS, WARMUP_ITERATIONS};
use crate::model::{FeatureShape, ZooModel};
use crate::utils::{Result, ZooError};

/// Configuration for benchmarking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Number of warmup iterations (excluded from measurements)
    pub warmup_iterations: usize,

    /// Number of benchmark iterations
    pub iterations: usize,

    /// Batch size for each forward pass
    pub batch_size: usize,

    /// Whether to keep individual iteration times
    pub verbose: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            warmup_iterations: WARMUP_ITERATIONS,
            iterations: BENCHMARK_ITERATIONS,
            batch_size: 1,
            verbose: false,
        }
    }
}

impl BenchmarkConfig {
    /// Create a quick benchmark config for testing
    pub fn quick() -> Self {
        Self {
            warmup_iterations: 2,
            iterations: 10,
            batch_size: 1,
            verbose: false,
        }
    }

    /// Reject settings that would time nothing
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ZooError::InvalidConfig(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.iterations == 0 {
            return Err(ZooError::InvalidConfig(
                "iterations must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Results from a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    /// Model that was benchmarked
    pub model: String,

    /// Latency statistics
    pub latency: LatencyStats,

    /// Throughput (images per second)
    pub throughput: f64,

    /// Shape of the output tensor
    pub output_dims: [usize; 2],

    /// Individual iteration times (if verbose)
    pub iteration_times_ms: Vec<f64>,

    /// Configuration used for this benchmark
    pub config: BenchmarkConfig,

    /// Timestamp of when benchmark was run
    pub timestamp: String,
}

impl BenchmarkResult {
    /// Create a new benchmark result from timing data
    pub fn from_timings(
        model: &str,
        timings: &[Duration],
        output_dims: [usize; 2],
        config: BenchmarkConfig,
    ) -> Self {
        let latency = LatencyStats::from_durations(timings);
        let throughput = if latency.mean_ms > 0.0 {
            config.batch_size as f64 / (latency.mean_ms / 1000.0)
        } else {
            0.0
        };

        let iteration_times_ms = if config.verbose {
            timings.iter().map(|d| d.as_secs_f64() * 1000.0).collect()
        } else {
            Vec::new()
        };

        Self {
            model: model.to_string(),
            latency,
            throughput,
            output_dims,
            iteration_times_ms,
            config,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Save results to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, json)?;
        Ok(())
    }

    /// Get a summary string
    pub fn summary(&self) -> String {
        format!(
            "Latency: {:.2}ms (mean), {:.2}ms (p95), {:.2}ms (p99) | Throughput: {:.1} img/s",
            self.latency.mean_ms, self.latency.p95_ms, self.latency.p99_ms, self.throughput
        )
    }
}

impl std::fmt::Display for BenchmarkResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let timestamp = self.timestamp.get(..19).unwrap_or(&self.timestamp);
        let output = format!("[{}, {}]", self.output_dims[0], self.output_dims[1]);

        writeln!(f, "╔══════════════════════════════════════════════════════════════╗")?;
        writeln!(f, "║              Benchmark Results                               ║")?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Model: {:55} ║", self.model)?;
        writeln!(f, "║ Output: {:54} ║", output)?;
        writeln!(f, "║ Timestamp: {:51} ║", timestamp)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Latency Statistics                                           ║")?;
        writeln!(f, "║   Mean:     {:8.2} ms                                      ║", self.latency.mean_ms)?;
        writeln!(f, "║   Std Dev:  {:8.2} ms                                      ║", self.latency.std_ms)?;
        writeln!(f, "║   Min:      {:8.2} ms                                      ║", self.latency.min_ms)?;
        writeln!(f, "║   Max:      {:8.2} ms                                      ║", self.latency.max_ms)?;
        writeln!(f, "║   P50:      {:8.2} ms                                      ║", self.latency.p50_ms)?;
        writeln!(f, "║   P95:      {:8.2} ms                                      ║", self.latency.p95_ms)?;
        writeln!(f, "║   P99:      {:8.2} ms                                      ║", self.latency.p99_ms)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Throughput: {:8.1} images/second                          ║", self.throughput)?;
        writeln!(f, "╠══════════════════════════════════════════════════════════════╣")?;
        writeln!(f, "║ Configuration                                                ║")?;
        writeln!(f, "║   Batch Size:   {:5}                                        ║", self.config.batch_size)?;
        writeln!(f, "║   Iterations:   {:5}                                        ║", self.config.iterations)?;
        writeln!(f, "║   Warmup:       {:5}                                        ║", self.config.warmup_iterations)?;
        writeln!(f, "╚══════════════════════════════════════════════════════════════╝")?;
        Ok(())
    }
}

/// Latency statistics from benchmark
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Mean latency in milliseconds
    pub mean_ms: f64,
    /// Standard deviation in milliseconds
    pub std_ms: f64,
    /// Minimum latency
    pub min_ms: f64,
    /// Maximum latency
    pub max_ms: f64,
    /// Median (50th percentile)
    pub p50_ms: f64,
    /// 95th percentile
    pub p95_ms: f64,
    /// 99th percentile
    pub p99_ms: f64,
}

impl LatencyStats {
    /// Calculate statistics from a list of durations
    pub fn from_durations(durations: &[Duration]) -> Self {
        if durations.is_empty() {
            return Self::default();
        }

        let mut times_ms: Vec<f64> = durations.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        times_ms.sort_by(|a, b| a.total_cmp(b));

        let n = times_ms.len();
        let mean = times_ms.iter().sum::<f64>() / n as f64;
        let variance = times_ms.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n as f64;

        Self {
            mean_ms: mean,
            std_ms: variance.sqrt(),
            min_ms: times_ms[0],
            max_ms: times_ms[n - 1],
            p50_ms: percentile(&times_ms, 50.0),
            p95_ms: percentile(&times_ms, 95.0),
            p99_ms: percentile(&times_ms, 99.0),
        }
    }
}

/// Calculate percentile from sorted data
fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let idx = (p / 100.0 * (sorted_data.len() - 1) as f64).round() as usize;
    sorted_data[idx.min(sorted_data.len() - 1)]
}

/// Timer utility for benchmarking
pub struct Timer {
    start: Instant,
    times: Vec<Duration>,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            times: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        self.start = Instant::now();
    }

    /// Stop timing and record the duration
    pub fn stop(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        self.times.push(elapsed);
        elapsed
    }

    pub fn times(&self) -> &[Duration] {
        &self.times
    }

    pub fn stats(&self) -> LatencyStats {
        LatencyStats::from_durations(&self.times)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Benchmark forward passes of `model` on random input of `input` shape
///
/// Each pass is forced to completion by reading the output back, so
/// asynchronous backends are timed end to end.
pub fn run_benchmark<B: Backend>(
    model: &ZooModel<B>,
    input: FeatureShape,
    config: BenchmarkConfig,
    device: &B::Device,
) -> Result<BenchmarkResult> {
    config.validate()?;

    tracing::info!(
        "Benchmarking {} on {:?}: batch {}, {} warmup, {} iterations",
        model.architecture(),
        device,
        config.batch_size,
        config.warmup_iterations,
        config.iterations
    );

    let batch = Tensor::<B, 4>::random(
        [config.batch_size, input.channels, input.height, input.width],
        Distribution::Uniform(-1.0, 1.0),
        device,
    );

    // Warmup phase
    let mut output_dims = [config.batch_size, model.num_classes()];
    for i in 0..config.warmup_iterations {
        let output = model.forward(batch.clone());
        output_dims = output.dims();
        let _ = output.into_data();
        if config.verbose {
            tracing::debug!("Warmup iteration {}/{}", i + 1, config.warmup_iterations);
        }
    }

    // Benchmark phase
    let mut timer = Timer::new();
    for i in 0..config.iterations {
        timer.start();
        let output = model.forward(batch.clone());
        output_dims = output.dims();
        let _ = output.into_data();
        let elapsed = timer.stop();

        if config.verbose {
            tracing::debug!(
                "Iteration {}/{}: {:.2}ms",
                i + 1,
                config.iterations,
                elapsed.as_secs_f64() * 1000.0
            );
        }
    }

    let result = BenchmarkResult::from_timings(
        &model.architecture().to_string(),
        timer.times(),
        output_dims,
        config,
    );
    tracing::info!("{}", result.summary());
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelConfig;
    use burn_ndarray::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    #[test]
    fn test_latency_stats() {
        let durations: Vec<Duration> = vec![
            Duration::from_millis(10),
            Duration::from_millis(12),
            Duration::from_millis(11),
            Duration::from_millis(15),
            Duration::from_millis(9),
        ];

        let stats = LatencyStats::from_durations(&durations);

        assert!((stats.mean_ms - 11.4).abs() < 0.1);
        assert_eq!(stats.min_ms, 9.0);
        assert_eq!(stats.max_ms, 15.0);
        assert_eq!(stats.p50_ms, 11.0);
        assert_eq!(stats.p99_ms, 15.0);
    }

    #[test]
    fn test_empty_latency_stats() {
        assert_eq!(LatencyStats::from_durations(&[]), LatencyStats::default());
    }

    #[test]
    fn test_benchmark_config_defaults() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.warmup_iterations, 10);
        assert_eq!(config.iterations, 100);
        assert_eq!(config.batch_size, 1);
    }

    #[test]
    fn test_benchmark_config_validation() {
        assert!(BenchmarkConfig::default().validate().is_ok());
        assert!(BenchmarkConfig::quick().validate().is_ok());

        let empty_batch = BenchmarkConfig {
            batch_size: 0,
            ..BenchmarkConfig::quick()
        };
        assert!(matches!(
            empty_batch.validate(),
            Err(ZooError::InvalidConfig(_))
        ));

        let no_iterations = BenchmarkConfig {
            iterations: 0,
            ..BenchmarkConfig::quick()
        };
        assert!(no_iterations.validate().is_err());

        // Warmup is optional
        let no_warmup = BenchmarkConfig {
            warmup_iterations: 0,
            ..BenchmarkConfig::quick()
        };
        assert!(no_warmup.validate().is_ok());
    }

    #[test]
    fn test_run_benchmark_rejects_empty_batch() {
        let device = Default::default();
        let config = ModelConfig::vgg(16).with_input_shape([32, 32, 3]);
        let model = config.init::<TestBackend>(&device).unwrap();
        let input = FeatureShape::from_hwc(config.input_shape()).unwrap();

        let bench = BenchmarkConfig {
            batch_size: 0,
            ..BenchmarkConfig::quick()
        };
        assert!(run_benchmark(&model, input, bench, &device).is_err());
    }

    #[test]
    fn test_timer() {
        let mut timer = Timer::new();

        for _ in 0..5 {
            timer.start();
            std::thread::sleep(Duration::from_millis(1));
            timer.stop();
        }

        assert_eq!(timer.times().len(), 5);
        assert!(timer.stats().mean_ms >= 1.0);
    }

    #[test]
    fn test_throughput_scales_with_batch() {
        let timings = vec![Duration::from_millis(100); 4];
        let config = BenchmarkConfig {
            batch_size: 8,
            verbose: true,
            ..BenchmarkConfig::quick()
        };

        let result = BenchmarkResult::from_timings("vgg", &timings, [8, 10], config);
        assert!((result.throughput - 80.0).abs() < 1e-6);
        assert_eq!(result.iteration_times_ms.len(), 4);
        assert!(result.to_string().contains("Benchmark Results"));
    }

    #[test]
    fn test_save_result() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results").join("bench.json");
        let result = BenchmarkResult::from_timings(
            "xception",
            &[Duration::from_millis(5)],
            [1, 10],
            BenchmarkConfig::quick(),
        );

        result.save(&path).unwrap();
        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"output_dims\""));
        assert!(json.contains("\"xception\""));
    }

    #[test]
    fn test_run_benchmark() {
        let device = Default::default();
        let config = ModelConfig::xception()
            .with_input_shape([32, 32, 3])
            .with_num_classes(3);
        let model = config.init::<TestBackend>(&device).unwrap();
        let input = FeatureShape::from_hwc(config.input_shape()).unwrap();

        let bench = BenchmarkConfig {
            warmup_iterations: 1,
            iterations: 2,
            batch_size: 2,
            verbose: false,
        };
        let result = run_benchmark(&model, input, bench, &device).unwrap();

        assert_eq!(result.output_dims, [2, 3]);
        assert_eq!(result.config.iterations, 2);
        assert!(result.latency.max_ms >= result.latency.min_ms);
    }
}
