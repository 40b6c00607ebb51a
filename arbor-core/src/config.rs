//! Store Configuration
//!
//! Settings that influence how stores are bound, plus the bookkeeping for the
//! one-time array compatibility warning. The warning state lives on a
//! `StoreConfig` value instead of a hidden module-level set, so tests can
//! create their own configuration or reset the global one.
//!
//! # Array Compatibility Warning
//!
//! A watch without an explicit `.deep` flag on an array value keeps the older
//! semantics (it fires on in-place mutation as well as replacement). Each
//! `Class%property` pair that hits this path is reported once. The first report
//! carries the full explanation; later ones only carry a running count.

use std::sync::{Arc, OnceLock};

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when the global configuration is created.
pub const WARN_ARRAY_COMPAT_ENV: &str = "ARBOR_WARN_ARRAY_COMPAT";

const COMPAT_WARN_PREFIX: &str = "(deprecation WATCH_ARRAY @ arbor)";

const COMPAT_WARN_MSG: &str = "watches on an array value will no longer trigger on array mutation \
unless the \".deep\" flag is specified. Specify the intended behavior to suppress this warning:

  \"on.deep=0:yourArray\" // only triggers when the array is replaced
  \"on.deep=1:yourArray\" // also triggers on mutation";

/// Plain, serializable configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOptions {
    /// Emit a warning when the array compatibility shim is used.
    pub warn_array_compat: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            warn_array_compat: true,
        }
    }
}

/// Configuration shared by the store binders.
#[derive(Debug, Default)]
pub struct StoreConfig {
    options: ConfigOptions,
    warned: Mutex<IndexSet<String>>,
}

static GLOBAL: OnceLock<Arc<StoreConfig>> = OnceLock::new();

impl StoreConfig {
    pub fn new(options: ConfigOptions) -> Self {
        Self {
            options,
            warned: Mutex::new(IndexSet::new()),
        }
    }

    /// Build a configuration from the process environment.
    pub fn from_env() -> Self {
        let mut options = ConfigOptions::default();
        if let Ok(raw) = std::env::var(WARN_ARRAY_COMPAT_ENV) {
            options.warn_array_compat = !matches!(raw.trim(), "0" | "false" | "off" | "no");
        }
        Self::new(options)
    }

    /// The process-wide configuration used by `create_store` and `decorate`.
    pub fn global() -> Arc<StoreConfig> {
        GLOBAL
            .get_or_init(|| Arc::new(StoreConfig::from_env()))
            .clone()
    }

    pub fn options(&self) -> ConfigOptions {
        self.options
    }

    /// Report use of the array compatibility shim for `class[property]`.
    ///
    /// Returns `true` if a warning was emitted by this call.
    pub fn warn_array_compat(&self, class: &str, property: &str) -> bool {
        if !self.options.warn_array_compat {
            return false;
        }

        let count = {
            let mut warned = self.warned.lock();
            if !warned.insert(format!("{class}%{property}")) {
                return false;
            }
            warned.len()
        };

        if count == 1 {
            tracing::warn!(
                target: "arbor::compat",
                "{COMPAT_WARN_PREFIX} {COMPAT_WARN_MSG}\n  at {class}[\"{property}\"]"
            );
        } else {
            tracing::warn!(
                target: "arbor::compat",
                "{COMPAT_WARN_PREFIX} ({count})\n  at {class}[\"{property}\"]"
            );
        }
        true
    }

    /// Number of distinct `Class%property` pairs warned about so far.
    pub fn warned_count(&self) -> usize {
        self.warned.lock().len()
    }

    /// Forget all previously reported warnings.
    pub fn reset_warnings(&self) {
        self.warned.lock().clear();
    }
}
