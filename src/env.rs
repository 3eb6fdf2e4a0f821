use once_cell::sync::Lazy;
pub use std::env::*;
use std::path::PathBuf;

pub static PORTKEEPER_BIN: Lazy<PathBuf> = Lazy::new(|| {
    current_exe()
        .and_then(|p| p.canonicalize())
        .unwrap_or_else(|e| {
            eprintln!("Warning: Could not determine portkeeper binary path: {e}");
            args()
                .next()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("portkeeper"))
        })
});
pub static CWD: Lazy<PathBuf> = Lazy::new(|| current_dir().unwrap_or_else(|_| PathBuf::from(".")));

pub static HOME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir().unwrap_or_else(|| {
        eprintln!("Warning: Could not determine home directory");
        PathBuf::from("/tmp")
    })
});
pub static PORTKEEPER_CONFIG: Lazy<PathBuf> =
    Lazy::new(|| var_path("PORTKEEPER_CONFIG").unwrap_or(CWD.join("portkeeper.toml")));
pub static PORTKEEPER_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    var_path("PORTKEEPER_STATE_DIR").unwrap_or(
        dirs::state_dir()
            .unwrap_or(HOME_DIR.join(".local").join("state"))
            .join("portkeeper"),
    )
});
pub static PORTKEEPER_LOG: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("PORTKEEPER_LOG").unwrap_or(log::LevelFilter::Info));
pub static PORTKEEPER_LOG_FILE_LEVEL: Lazy<log::LevelFilter> =
    Lazy::new(|| var_log_level("PORTKEEPER_LOG_FILE_LEVEL").unwrap_or(*PORTKEEPER_LOG));
pub static PORTKEEPER_LOGS_DIR: Lazy<PathBuf> =
    Lazy::new(|| var_path("PORTKEEPER_LOGS_DIR").unwrap_or(PORTKEEPER_STATE_DIR.join("logs")));
pub static WATCHDOG_LOG_FILE: Lazy<PathBuf> =
    Lazy::new(|| PORTKEEPER_LOGS_DIR.join("watchdog").join("watchdog.log"));
pub static SERVE_LOG_FILE: Lazy<PathBuf> =
    Lazy::new(|| PORTKEEPER_LOGS_DIR.join("serve").join("serve.log"));

// Capture the PATH at startup so launched servers can find npm, node, etc.
pub static ORIGINAL_PATH: Lazy<Option<String>> = Lazy::new(|| var("PATH").ok());

// Overrides the configured watchdog interval. Lower values are useful for testing.
pub static PORTKEEPER_INTERVAL_SECS: Lazy<Option<u64>> =
    Lazy::new(|| var_u64("PORTKEEPER_INTERVAL_SECS"));

fn var_path(name: &str) -> Option<PathBuf> {
    var(name).map(PathBuf::from).ok()
}

fn var_u64(name: &str) -> Option<u64> {
    var(name).ok().and_then(|val| val.parse().ok())
}

fn var_log_level(name: &str) -> Option<log::LevelFilter> {
    var(name).ok().and_then(|level| level.parse().ok())
}
