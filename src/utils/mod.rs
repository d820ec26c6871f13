//! Utilities module for logging, error handling, and formatting helpers

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{Result, ZooError};
pub use logging::{init_logging, BuildLogger, LogConfig};

/// Format a number with thousands separator
pub fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }

    result
}

/// Format a parameter count as megabytes of f32 weights
pub fn format_param_size(params: usize) -> String {
    let mb = params as f64 * 4.0 / (1024.0 * 1024.0);
    format!("{:.2} MB", mb)
}
