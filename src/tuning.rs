//! Auto-tuning module
//!
//! Detects hardware capabilities and sizes the async runtime so the
//! configured worker limit is never exceeded.

use sysinfo::System;

/// Tuned runtime values based on hardware detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunedRuntime {
    /// Number of async worker threads
    pub worker_threads: usize,
    /// Cap on the blocking pool used for file I/O
    pub max_blocking_threads: usize,
    /// Detected CPU cores
    pub detected_cores: usize,
}

/// Detect the number of available CPU cores
pub fn detect_cpu_cores() -> usize {
    let mut sys = System::new();
    sys.refresh_cpu();
    sys.cpus().len().max(1)
}

/// Size the runtime for `worker_limit` with the detected core count
pub fn auto_tune(worker_limit: usize) -> TunedRuntime {
    tune_for(worker_limit, detect_cpu_cores())
}

/// Size the runtime for a known core count
///
/// Async workers get one thread per core, file I/O gets the rest of the
/// budget; neither exceeds `worker_limit`.
pub fn tune_for(worker_limit: usize, cores: usize) -> TunedRuntime {
    let worker_limit = worker_limit.max(1);
    let cores = cores.max(1);

    let tuned = TunedRuntime {
        worker_threads: cores.min(worker_limit),
        max_blocking_threads: worker_limit,
        detected_cores: cores,
    };

    tracing::debug!(
        cores = tuned.detected_cores,
        worker_threads = tuned.worker_threads,
        max_blocking_threads = tuned.max_blocking_threads,
        "Auto-tuned runtime based on hardware"
    );

    tuned
}

/// Get a human-readable summary of the tuned runtime
pub fn tuning_summary(tuned: &TunedRuntime) -> String {
    format!(
        "Detected: {} cores\n\
         WolfSync: {} worker threads, up to {} I/O threads",
        tuned.detected_cores, tuned.worker_threads, tuned.max_blocking_threads,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_limit_caps_threads() {
        let tuned = tune_for(2, 16);
        assert_eq!(tuned.worker_threads, 2);
        assert_eq!(tuned.max_blocking_threads, 2);

        let tuned = tune_for(1000, 4);
        assert_eq!(tuned.worker_threads, 4);
        assert_eq!(tuned.max_blocking_threads, 1000);
    }

    #[test]
    fn test_detection_returns_positive_values() {
        assert!(detect_cpu_cores() >= 1);
        let tuned = auto_tune(1);
        assert_eq!(tuned.worker_threads, 1);
        assert!(tuning_summary(&tuned).contains("1 worker threads"));
    }
}
