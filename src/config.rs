//! Connection configuration.
//!
//! A [`Config`] is consumed when a [`Connection`](crate::Connection) opens its
//! environment. Loading it from a file is left to the host application; the
//! struct derives serde traits so it can be embedded in any config format.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::{ContainerError, ContainerResult};

/// Default growth and shrink step (16 MiB).
pub const DEFAULT_STEP: i64 = 16 * 1024 * 1024;

/// Default number of named tables per environment.
pub const DEFAULT_MAX_DBS: u32 = 10;

/// Settings for one storage environment.
///
/// Size fields use `-1` for "engine default". redb manages file growth on its
/// own, so the geometry fields are validated and kept but act as hints.
///
/// # Examples
///
/// ```
/// use redb_containers::Config;
///
/// let config = Config::builder()
///     .pathname("./data/app.redb")
///     .max_dbs(32)
///     .build();
/// assert!(config.validate().is_ok());
///
/// let config = Config::new("cache.redb");
/// assert!(config.no_subdir);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder, Serialize, Deserialize)]
#[builder(doc)]
#[serde(default)]
pub struct Config {
    /// Database file, or directory when `no_subdir` is false.
    #[builder(setter(into))]
    pub pathname: String,

    #[builder(default = -1)]
    pub size_lower: i64,

    #[builder(default = -1)]
    pub size_now: i64,

    #[builder(default = -1)]
    pub size_upper: i64,

    #[builder(default = DEFAULT_STEP)]
    pub growth_step: i64,

    #[builder(default = DEFAULT_STEP)]
    pub shrink_threshold: i64,

    /// Page size in bytes; 0 lets the engine choose.
    #[builder(default = 0)]
    pub page_size: u32,

    /// Concurrent read transactions; 0 means twice the available parallelism,
    /// with a floor of 16.
    #[builder(default = 0)]
    pub max_readers: u32,

    /// Distinct named tables that may be opened in this environment.
    #[builder(default = DEFAULT_MAX_DBS)]
    pub max_dbs: u32,

    #[builder(default = false)]
    pub read_only: bool,

    #[builder(default = true)]
    pub readahead: bool,

    /// Treat `pathname` as the database file itself rather than a directory.
    #[builder(default = true)]
    pub no_subdir: bool,

    /// Flush every write commit to stable storage before returning.
    #[builder(default = true)]
    pub sync_durable: bool,

    #[builder(default = false)]
    pub writemap_mode: bool,

    /// Resolve plain relative paths against the executable's directory.
    #[builder(default = false)]
    pub relative_to_exe: bool,

    /// Page cache size in bytes for redb; `None` keeps redb's default.
    #[builder(default = None, setter(strip_option))]
    pub cache_size: Option<usize>,
}

impl Config {
    /// Configuration with every option at its default.
    pub fn new<S: Into<String>>(pathname: S) -> Self {
        Self::builder().pathname(pathname).build()
    }

    /// Checks the structural constraints the engine relies on.
    pub fn validate(&self) -> ContainerResult<()> {
        if self.pathname.is_empty() {
            return Err(invalid("pathname must not be empty"));
        }
        if self.page_size != 0 && !self.page_size.is_power_of_two() {
            return Err(invalid(format!(
                "page_size {} is not a power of two",
                self.page_size
            )));
        }
        if self.size_lower != -1 && self.size_now != -1 && self.size_lower > self.size_now {
            return Err(invalid("size_lower must not exceed size_now"));
        }
        if self.size_now != -1 && self.size_upper != -1 && self.size_now > self.size_upper {
            return Err(invalid("size_now must not exceed size_upper"));
        }
        if self.size_lower != -1 && self.size_upper != -1 && self.size_lower > self.size_upper {
            return Err(invalid("size_lower must not exceed size_upper"));
        }
        if self.growth_step < -1 || self.shrink_threshold < -1 {
            return Err(invalid("growth_step and shrink_threshold must be -1 or positive"));
        }
        if self.max_dbs == 0 {
            return Err(invalid("max_dbs must be at least 1"));
        }
        Ok(())
    }

    /// Reader slot limit after applying the `0 = automatic` rule.
    pub fn effective_max_readers(&self) -> usize {
        match self.max_readers {
            0 => {
                let parallelism = std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1);
                (parallelism * 2).max(16)
            }
            n => n as usize,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(String::new())
    }
}

fn invalid(message: impl Into<String>) -> ContainerError {
    ContainerError::InvalidConfig(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_engine_conventions() {
        let config = Config::new("db.redb");
        assert_eq!(config.size_lower, -1);
        assert_eq!(config.growth_step, DEFAULT_STEP);
        assert_eq!(config.shrink_threshold, DEFAULT_STEP);
        assert_eq!(config.max_dbs, DEFAULT_MAX_DBS);
        assert!(config.readahead);
        assert!(config.no_subdir);
        assert!(config.sync_durable);
        assert!(!config.read_only);
        assert!(!config.writemap_mode);
        assert!(!config.relative_to_exe);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(Config::default().validate().is_err());

        let config = Config::builder().pathname("x").page_size(3000).build();
        assert!(matches!(
            config.validate(),
            Err(ContainerError::InvalidConfig(_))
        ));

        let config = Config::builder()
            .pathname("x")
            .size_lower(10)
            .size_now(5)
            .build();
        assert!(config.validate().is_err());

        let config = Config::builder()
            .pathname("x")
            .size_now(100)
            .size_upper(50)
            .build();
        assert!(config.validate().is_err());

        let config = Config::builder().pathname("x").page_size(4096).build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_effective_max_readers() {
        let config = Config::builder().pathname("x").max_readers(3).build();
        assert_eq!(config.effective_max_readers(), 3);

        let config = Config::new("x");
        assert!(config.effective_max_readers() >= 16);
    }
}
