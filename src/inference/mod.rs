//! Inference utilities
//!
//! Forward-pass latency benchmarking for randomly initialized models.

pub mod benchmark;

// Re-export main types for convenience
pub use benchmark::{run_benchmark, BenchmarkConfig, BenchmarkResult, LatencyStats, Timer};

/// Default number of warmup iterations for benchmarking
pub const WARMUP_ITERATIONS: usize = 10;

/// Default number of benchmark iterations
pub const BENCHMARK_ITERATIONS: usize = 100;
