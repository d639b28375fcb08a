use tracing::{level_filters::LevelFilter, Dispatch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn parse(level: &str) -> Self {
        match level.to_ascii_uppercase().as_str() {
            "ERROR" => LogLevel::Error,
            "WARN" => LogLevel::Warn,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    }

    /// Level used when a container runs in verbose mode.
    pub fn verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Trace
        } else {
            LogLevel::Info
        }
    }

    fn filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Installs the process wide subscriber.
///
/// `RUST_LOG` takes precedence, otherwise the level comes from `TESSERA_LOG_LEVEL`.
pub fn init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let level = LogLevel::parse(&tessera_config::CONFIG.log_level);
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::default().add_directive(level.filter().into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
}

/// Builds a standalone diagnostic sink writing to stdout.
///
/// The returned dispatch is not installed globally; it is handed to a container
/// at construction so every task spawned for that container logs through it.
pub fn dispatch(level: LogLevel) -> Dispatch {
    dispatch_with_writer(level, std::io::stdout)
}

/// Same as [`dispatch`] with a caller supplied writer.
pub fn dispatch_with_writer<W>(level: LogLevel, writer: W) -> Dispatch
where
    W: for<'a> tracing_subscriber::fmt::MakeWriter<'a> + Send + Sync + 'static,
{
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.filter())
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(writer)
        .finish();
    Dispatch::new(subscriber)
}
