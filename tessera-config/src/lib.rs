use envconfig::Envconfig;
use lazy_static::lazy_static;

/// Default cache line size: 4 MiB.
pub const DEFAULT_CACHE_LINE_SIZE: u64 = 0x40_0000;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "TESSERA_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Size of a single cache line in bytes. Must be a power of two.
    #[envconfig(from = "TESSERA_CACHE_LINE_SIZE", default = "4194304")]
    pub cache_line_size: u64,
    #[envconfig(from = "TESSERA_ENABLE_PREFETCH", default = "false")]
    pub enable_prefetch: bool,
    #[envconfig(from = "TESSERA_ERROR_CHECKING", default = "true")]
    pub error_checking: bool,
    #[envconfig(from = "TESSERA_VERBOSE", default = "false")]
    pub verbose: bool,
    //Upper bound of the line cache in bytes, 0 means unbounded
    #[envconfig(from = "TESSERA_CACHE_CAPACITY_BYTES", default = "0")]
    pub cache_capacity_bytes: u64,
    //Per backend read timeout in seconds, 0 disables the timeout
    #[envconfig(from = "TESSERA_READ_TIMEOUT_SECS", default = "0")]
    pub read_timeout_secs: u64,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }

    pub fn cache_capacity(&self) -> Option<u64> {
        (self.cache_capacity_bytes > 0).then_some(self.cache_capacity_bytes)
    }

    pub fn read_timeout(&self) -> Option<std::time::Duration> {
        (self.read_timeout_secs > 0).then(|| std::time::Duration::from_secs(self.read_timeout_secs))
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}
