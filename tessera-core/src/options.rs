use std::time::Duration;

use tessera_config::{Config, DEFAULT_CACHE_LINE_SIZE};
use tessera_logger::LogLevel;
use tracing::Dispatch;

/// Construction-time settings of a [`crate::Container`].
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Size of one cache line in bytes, must be a power of two.
    pub cache_line_size: u64,
    /// Lets the parser prime several lines with a single backend request.
    pub enable_prefetch: bool,
    /// Asks the parser to run its strict consistency checks.
    pub error_checking: bool,
    /// Logs every byte-range request at trace level.
    pub verbose: bool,
    /// Upper bound of the line cache in bytes, `None` keeps every line.
    pub cache_capacity: Option<u64>,
    /// Per read timeout applied by the driver.
    pub read_timeout: Option<Duration>,
    /// Sink for every diagnostic the container and its tasks emit. Falls back
    /// to the dispatcher that is current when the container is built.
    pub diagnostics: Option<Dispatch>,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            cache_line_size: DEFAULT_CACHE_LINE_SIZE,
            enable_prefetch: false,
            error_checking: true,
            verbose: false,
            cache_capacity: None,
            read_timeout: None,
            diagnostics: None,
        }
    }
}

impl ContainerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            cache_line_size: config.cache_line_size,
            enable_prefetch: config.enable_prefetch,
            error_checking: config.error_checking,
            verbose: config.verbose,
            cache_capacity: config.cache_capacity(),
            read_timeout: config.read_timeout(),
            diagnostics: None,
        }
    }

    pub fn with_cache_line_size(mut self, cache_line_size: u64) -> Self {
        self.cache_line_size = cache_line_size;
        self
    }

    pub fn with_prefetch(mut self, enable_prefetch: bool) -> Self {
        self.enable_prefetch = enable_prefetch;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Dispatch) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Routes diagnostics to stdout, at trace level when `verbose` is set.
    pub fn with_stdout_diagnostics(self) -> Self {
        let level = LogLevel::verbose(self.verbose);
        self.with_diagnostics(tessera_logger::dispatch(level))
    }

    pub(crate) fn resolve_diagnostics(&self) -> Dispatch {
        match &self.diagnostics {
            Some(dispatch) => dispatch.clone(),
            None => tracing::dispatcher::get_default(|current| current.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use envconfig::Envconfig;

    use super::*;

    #[test]
    fn defaults_match_the_config_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        let from_config = ContainerOptions::from_config(&config);
        let defaults = ContainerOptions::default();

        assert_eq!(from_config.cache_line_size, defaults.cache_line_size);
        assert_eq!(from_config.enable_prefetch, defaults.enable_prefetch);
        assert_eq!(from_config.error_checking, defaults.error_checking);
        assert_eq!(from_config.verbose, defaults.verbose);
        assert_eq!(from_config.cache_capacity, defaults.cache_capacity);
        assert_eq!(from_config.read_timeout, defaults.read_timeout);
    }

    #[test]
    fn stdout_diagnostics_follow_the_verbose_flag() {
        let quiet = ContainerOptions::default().with_stdout_diagnostics();
        let verbose = ContainerOptions {
            verbose: true,
            ..ContainerOptions::default()
        }
        .with_stdout_diagnostics();

        let hint = |options: &ContainerOptions| {
            options
                .diagnostics
                .as_ref()
                .and_then(|dispatch| dispatch.max_level_hint())
        };
        assert_eq!(hint(&quiet), Some(tracing::level_filters::LevelFilter::INFO));
        assert_eq!(hint(&verbose), Some(tracing::level_filters::LevelFilter::TRACE));
    }
}
