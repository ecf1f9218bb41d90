/*!
 * Kernel Configuration
 *
 * Runtime configuration for the IPC core, defaulted from `core::limits`
 * and overridable through environment variables.
 */

use super::limits::{
    DEFAULT_PIPE_BUFFER_SIZE, DEFAULT_USER_MEMORY_SIZE, DEFERRED_CALL_POOL_SIZE,
    MAX_PIPE_BUFFER_SIZE, PIPE_BUFFER_MARGIN, USER_MEMORY_BASE,
};
use log::warn;
use serde::{Deserialize, Serialize};

pub const ENV_PIPE_BUFFER_SIZE: &str = "KERNEL_PIPE_BUFFER_SIZE";
pub const ENV_MAX_PIPE_BUFFER_SIZE: &str = "KERNEL_MAX_PIPE_BUFFER_SIZE";
pub const ENV_DEFERRED_POOL_SIZE: &str = "KERNEL_DEFERRED_POOL_SIZE";
pub const ENV_USER_MEMORY_SIZE: &str = "KERNEL_USER_MEMORY_SIZE";

/// IPC core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct KernelConfig {
    /// Buffer size used when a connection request asks for 0 bytes
    pub default_buffer_size: usize,
    /// Largest buffer a connection request may ask for
    pub max_buffer_size: usize,
    /// Number of threads that may be deferred at the same time
    pub deferred_pool_size: usize,
    /// Size of each process's simulated address space
    pub user_memory_size: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_buffer_size: DEFAULT_PIPE_BUFFER_SIZE,
            max_buffer_size: MAX_PIPE_BUFFER_SIZE,
            deferred_pool_size: DEFERRED_CALL_POOL_SIZE,
            user_memory_size: DEFAULT_USER_MEMORY_SIZE,
        }
    }
}

impl KernelConfig {
    /// Build a configuration from defaults plus `KERNEL_*` environment overrides
    ///
    /// Unparseable or out-of-range values are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, fallback: usize| -> usize {
            match lookup(key) {
                None => fallback,
                Some(raw) => match raw.trim().parse::<usize>() {
                    Ok(value) if value > 0 => value,
                    _ => {
                        warn!("Ignoring invalid {}={:?}, using {}", key, raw, fallback);
                        fallback
                    }
                },
            }
        };

        let config = Self {
            default_buffer_size: read(ENV_PIPE_BUFFER_SIZE, defaults.default_buffer_size),
            max_buffer_size: read(ENV_MAX_PIPE_BUFFER_SIZE, defaults.max_buffer_size),
            deferred_pool_size: read(ENV_DEFERRED_POOL_SIZE, defaults.deferred_pool_size),
            user_memory_size: read(ENV_USER_MEMORY_SIZE, defaults.user_memory_size),
        };

        if config.is_consistent() {
            config
        } else {
            warn!(
                "Inconsistent kernel configuration from environment ({:?}), using defaults",
                config
            );
            defaults
        }
    }

    /// Whether the limits can coexist (default buffer fits under the maximum, etc.)
    pub fn is_consistent(&self) -> bool {
        self.default_buffer_size > PIPE_BUFFER_MARGIN
            && self.default_buffer_size <= self.max_buffer_size
            && self.deferred_pool_size > 0
            && self.user_memory_size > USER_MEMORY_BASE
    }

    pub fn with_default_buffer_size(mut self, size: usize) -> Self {
        self.default_buffer_size = size;
        self
    }

    pub fn with_deferred_pool_size(mut self, size: usize) -> Self {
        self.deferred_pool_size = size;
        self
    }

    pub fn with_user_memory_size(mut self, size: usize) -> Self {
        self.user_memory_size = size;
        self
    }
}
