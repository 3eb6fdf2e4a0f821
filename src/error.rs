//! Diagnostic error types for portkeeper.
//!
//! Only actionable failures are errors: bad input, spawn failures, broken
//! configuration and file problems. Port lookups and liveness probes absorb
//! their own failures and never produce these.

// False positive: fields are used in #[error] format strings and miette derive macros
#![allow(unused_assignments)]

use miette::{Diagnostic, NamedSource, SourceSpan};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the supervisor procedures (start/kill/status).
#[derive(Debug, Error, Diagnostic)]
pub enum SupervisorError {
    #[error("unknown script '{script}'")]
    #[diagnostic(code(portkeeper::supervisor::unknown_script))]
    UnknownScript {
        script: String,
        #[help]
        suggestion: Option<String>,
    },

    #[error("invalid port '{raw}'")]
    #[diagnostic(
        code(portkeeper::supervisor::invalid_port),
        help("ports must be integers between 1 and 65535")
    )]
    InvalidPort { raw: String },

    #[error("'{script}' exited immediately after launch on port {port}{}", exit_code.map(|c| format!(" (exit code {c})")).unwrap_or_default())]
    #[diagnostic(
        code(portkeeper::supervisor::spawn_failure),
        help("check the server log for details; the port may already be bound or a dependency is missing")
    )]
    SpawnFailure {
        script: String,
        port: u16,
        exit_code: Option<i32>,
        /// Tail of the server's log, if anything was written
        detail: Option<String>,
    },

    #[error("failed to spawn '{script}': {source}")]
    #[diagnostic(
        code(portkeeper::supervisor::spawn_error),
        help("make sure the command exists on PATH and the project root is correct")
    )]
    SpawnError {
        script: String,
        #[source]
        source: io::Error,
    },

    #[error("port {port} still owned by {} after forceful termination", pids.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", "))]
    #[diagnostic(
        code(portkeeper::supervisor::partial_kill),
        help("the process may belong to another user; try stopping it manually")
    )]
    PartialKillFailure { port: u16, pids: Vec<u32> },
}

impl SupervisorError {
    /// Human-readable summary including the log tail for spawn failures.
    pub fn message(&self) -> String {
        match self {
            SupervisorError::SpawnFailure {
                detail: Some(detail),
                ..
            } => format!("{self}\n{detail}"),
            SupervisorError::UnknownScript {
                suggestion: Some(suggestion),
                ..
            } => format!("{self}, {suggestion}"),
            _ => self.to_string(),
        }
    }
}

/// Errors related to the watchdog process.
#[derive(Debug, Error, Diagnostic)]
pub enum WatchdogError {
    #[error("watchdog is already running with pid {pid}")]
    #[diagnostic(
        code(portkeeper::watchdog::already_running),
        help("stop it first with: portkeeper watchdog stop\nor restart it with: portkeeper watchdog start --force")
    )]
    AlreadyRunning { pid: u32 },

    #[error("watchdog with pid {pid} did not exit after {seconds}s")]
    #[diagnostic(
        code(portkeeper::watchdog::stop_timeout),
        help("managed servers may be left running; reclaim them with: portkeeper kill <port>")
    )]
    StopTimeout { pid: u32, seconds: u64 },

    #[error("watchdog has no servers to keep alive")]
    #[diagnostic(
        code(portkeeper::watchdog::empty_roster),
        help("add [servers.<key>] entries to portkeeper.toml")
    )]
    EmptyRoster,
}

/// Error for TOML configuration parse failures with source code highlighting.
#[derive(Debug, Error, Diagnostic)]
#[error("failed to parse configuration")]
#[diagnostic(code(portkeeper::config::parse_error))]
pub struct ConfigParseError {
    /// The source file contents for display
    #[source_code]
    pub src: NamedSource<String>,

    /// The location of the error in the source
    #[label("{message}")]
    pub span: SourceSpan,

    /// The error message from the TOML parser
    pub message: String,

    /// Additional help text
    #[help]
    pub help: Option<String>,
}

impl ConfigParseError {
    /// Create a new ConfigParseError from a toml parse error
    pub fn from_toml_error(path: &std::path::Path, contents: String, err: toml::de::Error) -> Self {
        let message = err.message().to_string();

        let span = err
            .span()
            .map(|r| SourceSpan::from(r.start..r.end))
            .unwrap_or_else(|| SourceSpan::from(0..0));

        Self {
            src: NamedSource::new(path.display().to_string(), contents),
            span,
            message,
            help: Some("check TOML syntax at https://toml.io".to_string()),
        }
    }
}

/// Semantic problems in an otherwise well-formed configuration file.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("server '{key}' has an empty run command")]
    #[diagnostic(code(portkeeper::config::empty_command))]
    EmptyCommand { key: String },

    #[error("server '{key}' has invalid port 0")]
    #[diagnostic(code(portkeeper::config::invalid_port))]
    InvalidPort { key: String },

    #[error("invalid duration '{value}' for {field}")]
    #[diagnostic(
        code(portkeeper::config::invalid_duration),
        help("use a humantime duration such as \"500ms\", \"1s\" or \"2m\"")
    )]
    InvalidDuration { field: String, value: String },

    #[error("watchdog port {port} is not bound by any registered server")]
    #[diagnostic(
        code(portkeeper::config::unmanaged_port),
        help("add a [servers.<key>] entry with port = {port}, or remove it from watchdog.ports")
    )]
    UnmanagedPort { port: u16 },

    #[error("watchdog.ports lists no ports")]
    #[diagnostic(
        code(portkeeper::config::empty_roster),
        help("remove watchdog.ports to keep every registered server alive")
    )]
    EmptyRoster,
}

/// Errors related to file operations (config, pid and log files).
#[derive(Debug, Error, Diagnostic)]
pub enum FileError {
    #[error("failed to read file: {}", path.display())]
    #[diagnostic(code(portkeeper::file::read_error))]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write file: {}", path.display())]
    #[diagnostic(code(portkeeper::file::write_error))]
    WriteError {
        path: PathBuf,
        #[help]
        details: Option<String>,
    },
}

/// Find the most similar script key for suggestions.
pub fn find_similar_script<'a>(
    name: &str,
    available: impl Iterator<Item = &'a str>,
) -> Option<String> {
    use fuzzy_matcher::FuzzyMatcher;
    use fuzzy_matcher::skim::SkimMatcherV2;

    let matcher = SkimMatcherV2::default();
    available
        .filter_map(|candidate| {
            matcher
                .fuzzy_match(candidate, name)
                .map(|score| (candidate, score))
        })
        .max_by_key(|(_, score)| *score)
        .filter(|(_, score)| *score > 0)
        .map(|(candidate, _)| format!("did you mean '{candidate}'?"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_error_display() {
        let err = SupervisorError::UnknownScript {
            script: "dev:1234".to_string(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "unknown script 'dev:1234'");

        let err = SupervisorError::InvalidPort {
            raw: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "invalid port 'abc'");

        let err = SupervisorError::PartialKillFailure {
            port: 6666,
            pids: vec![10, 11],
        };
        assert_eq!(
            err.to_string(),
            "port 6666 still owned by 10, 11 after forceful termination"
        );
    }

    #[test]
    fn test_spawn_failure_message() {
        let err = SupervisorError::SpawnFailure {
            script: "dev:6666".to_string(),
            port: 6666,
            exit_code: Some(1),
            detail: Some("Error: Cannot find module 'vite'".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "'dev:6666' exited immediately after launch on port 6666 (exit code 1)"
        );
        assert!(err.message().contains("Cannot find module"));

        let err = SupervisorError::SpawnFailure {
            script: "dev:6666".to_string(),
            port: 6666,
            exit_code: None,
            detail: None,
        };
        assert_eq!(
            err.message(),
            "'dev:6666' exited immediately after launch on port 6666"
        );
    }

    #[test]
    fn test_find_similar_script() {
        let scripts = ["dev:1111", "dev:5555", "dev:6666", "preview"];

        let suggestion = find_similar_script("dev:666", scripts.iter().copied());
        assert_eq!(suggestion, Some("did you mean 'dev:6666'?".to_string()));

        let suggestion = find_similar_script("xyz123", scripts.iter().copied());
        assert!(suggestion.is_none());
    }

    #[test]
    fn test_unknown_script_message_includes_suggestion() {
        let err = SupervisorError::UnknownScript {
            script: "dev:666".to_string(),
            suggestion: Some("did you mean 'dev:6666'?".to_string()),
        };
        assert_eq!(
            err.message(),
            "unknown script 'dev:666', did you mean 'dev:6666'?"
        );
    }

    #[test]
    fn test_file_error_display() {
        let err = FileError::ReadError {
            path: PathBuf::from("/tmp/watchdog.pid"),
            source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
        };
        assert!(err.to_string().contains("failed to read file"));
        assert!(err.to_string().contains("watchdog.pid"));
    }

    #[test]
    fn test_config_parse_error() {
        let contents = "[servers.web]\nrun = ".to_string();
        let err = toml::from_str::<toml::Value>(&contents).unwrap_err();
        let parse_err =
            ConfigParseError::from_toml_error(std::path::Path::new("test.toml"), contents, err);

        assert!(parse_err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_watchdog_error_display() {
        let err = WatchdogError::AlreadyRunning { pid: 42 };
        assert_eq!(err.to_string(), "watchdog is already running with pid 42");
    }
}
