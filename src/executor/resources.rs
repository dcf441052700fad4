//! Host resource detection for picking a default worker count

/// Snapshot of the host's capacity for concurrent probes
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Number of logical CPU cores
    pub cpu_cores: usize,
    /// Worker count used when none is configured
    pub optimal_concurrency: usize,
    /// Soft limit on open file descriptors, when it can be read
    pub open_file_limit: Option<u64>,
}

impl SystemResources {
    /// Detect system resources and derive the default concurrency.
    ///
    /// Probes are I/O bound, so the default is twice the core count, kept
    /// within 4..=50 and below a quarter of the descriptor limit.
    pub fn detect() -> Self {
        let cpu_cores = num_cpus::get();
        let open_file_limit = Self::read_open_file_limit();
        Self::from_parts(cpu_cores, open_file_limit)
    }

    pub(crate) fn from_parts(cpu_cores: usize, open_file_limit: Option<u64>) -> Self {
        let mut optimal_concurrency = (cpu_cores * 2).clamp(4, 50);
        if let Some(limit) = open_file_limit {
            let budget = (limit / 4).max(1) as usize;
            optimal_concurrency = optimal_concurrency.min(budget);
        }

        Self {
            cpu_cores,
            optimal_concurrency,
            open_file_limit,
        }
    }

    #[cfg(target_os = "linux")]
    fn read_open_file_limit() -> Option<u64> {
        let limits = std::fs::read_to_string("/proc/self/limits").ok()?;
        limits
            .lines()
            .find(|line| line.starts_with("Max open files"))
            .and_then(|line| line.split_whitespace().nth(3))
            .and_then(|soft| soft.parse().ok())
    }

    #[cfg(not(target_os = "linux"))]
    fn read_open_file_limit() -> Option<u64> {
        None
    }
}
