//! Storage configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use super::error::StorageError;
use super::page::DEFAULT_PAGE_SIZE;

/// Environment variable overriding [`StorageConfig::page_size`].
pub const PAGE_SIZE_ENV: &str = "HEAPSTORE_PAGE_SIZE";
/// Environment variable overriding [`StorageConfig::pool_pages`].
pub const POOL_PAGES_ENV: &str = "HEAPSTORE_POOL_PAGES";
/// Environment variable overriding [`StorageConfig::lock_timeout`], in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "HEAPSTORE_LOCK_TIMEOUT_MS";

/// Settings shared by heap files and the buffer pool.
///
/// All heap files served by one buffer pool must use the same page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Size of every page in bytes.
    pub page_size: usize,
    /// Number of pages the buffer pool caches.
    pub pool_pages: usize,
    /// How long a page lock request waits before the requesting transaction
    /// is aborted.
    pub lock_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: 50,
            lock_timeout: Duration::from_millis(500),
        }
    }
}

impl StorageConfig {
    /// Sets the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the buffer pool capacity in pages.
    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    /// Sets the lock wait timeout.
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// Builds a configuration from the defaults overridden by
    /// `HEAPSTORE_PAGE_SIZE`, `HEAPSTORE_POOL_PAGES` and
    /// `HEAPSTORE_LOCK_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidConfig` if a variable is not a number or
    /// the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, StorageError> {
        let mut config = Self::default();
        if let Some(page_size) = read_env(PAGE_SIZE_ENV)? {
            config.page_size = page_size;
        }
        if let Some(pool_pages) = read_env(POOL_PAGES_ENV)? {
            config.pool_pages = pool_pages;
        }
        if let Some(ms) = read_env(LOCK_TIMEOUT_ENV)? {
            config.lock_timeout = Duration::from_millis(ms);
        }
        config.validate()?;
        Ok(config)
    }

    /// Checks that every setting is usable.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.page_size == 0 {
            return Err(StorageError::InvalidConfig(
                "page_size must be > 0".to_string(),
            ));
        }
        if self.pool_pages == 0 {
            return Err(StorageError::InvalidConfig(
                "pool_pages must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env<T: FromStr>(name: &str) -> Result<Option<T>, StorageError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StorageError::InvalidConfig(format!("{}={:?} is not a number", name, raw))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(StorageError::InvalidConfig(format!(
            "{} is not valid unicode",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.pool_pages, 50);
        assert_eq!(config.lock_timeout, Duration::from_millis(500));
        config.validate().unwrap();
    }

    #[test]
    fn test_builders() {
        let config = StorageConfig::default()
            .with_page_size(512)
            .with_pool_pages(4)
            .with_lock_timeout(Duration::from_millis(10));
        assert_eq!(config.page_size, 512);
        assert_eq!(config.pool_pages, 4);
        assert_eq!(config.lock_timeout, Duration::from_millis(10));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(matches!(
            StorageConfig::default().with_page_size(0).validate(),
            Err(StorageError::InvalidConfig(_))
        ));
        assert!(matches!(
            StorageConfig::default().with_pool_pages(0).validate(),
            Err(StorageError::InvalidConfig(_))
        ));
    }

    /// Sets the given variables, clearing the other overrides.
    fn set_env(vars: &[(&str, &str)]) {
        for name in [PAGE_SIZE_ENV, POOL_PAGES_ENV, LOCK_TIMEOUT_ENV] {
            // SAFETY: only `test_from_env` touches these variables.
            unsafe { env::remove_var(name) };
        }
        for (name, value) in vars {
            // SAFETY: as above.
            unsafe { env::set_var(name, value) };
        }
    }

    // The environment is process-wide, so every case runs in this one test.
    #[test]
    fn test_from_env() {
        set_env(&[]);
        assert_eq!(StorageConfig::from_env().unwrap(), StorageConfig::default());

        set_env(&[
            (PAGE_SIZE_ENV, "1024"),
            (POOL_PAGES_ENV, " 8 "),
            (LOCK_TIMEOUT_ENV, "25"),
        ]);
        let config = StorageConfig::from_env().unwrap();
        assert_eq!(config.page_size, 1024);
        assert_eq!(config.pool_pages, 8);
        assert_eq!(config.lock_timeout, Duration::from_millis(25));

        set_env(&[(PAGE_SIZE_ENV, "4k")]);
        match StorageConfig::from_env() {
            Err(StorageError::InvalidConfig(msg)) => assert!(msg.contains(PAGE_SIZE_ENV)),
            other => panic!("unexpected result {:?}", other),
        }

        set_env(&[(LOCK_TIMEOUT_ENV, "-1")]);
        assert!(matches!(
            StorageConfig::from_env(),
            Err(StorageError::InvalidConfig(_))
        ));

        set_env(&[(POOL_PAGES_ENV, "0")]);
        assert!(matches!(
            StorageConfig::from_env(),
            Err(StorageError::InvalidConfig(_))
        ));

        set_env(&[]);
    }

    #[test]
    fn test_read_env_missing() {
        let value: Option<usize> = read_env("HEAPSTORE_TEST_SURELY_UNSET_VARIABLE").unwrap();
        assert_eq!(value, None);
    }
}
