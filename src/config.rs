pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_LOG_FILTER: &str = "filmorate=debug,actix_web=info";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub addr: String,
}

impl Config {
    /// Reads `FILMORATE_ADDR`. The log filter is read from `RUST_LOG` by env_logger.
    pub fn from_env() -> Self {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        Config {
            addr: lookup("FILMORATE_ADDR")
                .filter(|addr| !addr.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ADDR.to_owned()),
        }
    }
}
