use super::errors::ConfigError;
use tokio::time::Duration;


/// Конфигурация пула
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_workers: usize,
    pub max_workers: usize,
    pub queue_capacity: usize,
    pub scale_interval: Duration,
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            min_workers: 1,
            max_workers: num_cpus,
            queue_capacity: num_cpus * 20,
            scale_interval: Duration::from_millis(100),
            idle_timeout: Duration::from_secs(5),
        }
    }
}

impl PoolConfig {
    pub fn cpu_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            min_workers: num_cpus,
            max_workers: num_cpus,
            queue_capacity: num_cpus * 10,
            ..Default::default()
        }
    }

    pub fn io_bound() -> Self {
        let num_cpus = num_cpus::get();
        Self {
            min_workers: num_cpus,
            max_workers: num_cpus * 4, // воркеры в основном ждут I/O
            queue_capacity: num_cpus * 50,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, min: usize, max: usize) -> Self {
        self.min_workers = min;
        self.max_workers = max;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_scale_interval(mut self, interval: Duration) -> Self {
        self.scale_interval = interval;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_workers == 0 {
            return Err(ConfigError::ZeroMinWorkers);
        }
        if self.min_workers > self.max_workers {
            return Err(ConfigError::InvalidBounds {
                min: self.min_workers,
                max: self.max_workers,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.scale_interval.is_zero() {
            return Err(ConfigError::ZeroScaleInterval);
        }
        Ok(())
    }
}
