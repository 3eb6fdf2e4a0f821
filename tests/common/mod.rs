#![allow(dead_code)]

use portkeeper::config::Config;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// Short waits so a full clear-then-launch takes well under a second.
pub const FAST_TIMINGS: &str = r#"
[timings]
grace = "300ms"
socket_release = "200ms"
spawn_check = "500ms"
probe_timeout = "500ms"
"#;

/// Isolated project, state and log directories.
pub struct TestEnv {
    temp_dir: TempDir,
    bin: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("project")).unwrap();
        Self {
            temp_dir,
            bin: PathBuf::from(env!("CARGO_BIN_EXE_portkeeper")),
        }
    }

    pub fn project_dir(&self) -> PathBuf {
        self.temp_dir.path().join("project")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.temp_dir.path().join("state")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.temp_dir.path().join("logs")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.state_dir().join("watchdog.pid")
    }

    pub fn config_path(&self) -> PathBuf {
        self.project_dir().join("portkeeper.toml")
    }

    /// Writes portkeeper.toml with `content` plus [`FAST_TIMINGS`].
    pub fn create_toml(&self, content: &str) -> PathBuf {
        let path = self.config_path();
        fs::write(&path, format!("{content}\n{FAST_TIMINGS}")).unwrap();
        path
    }

    /// Loads the written config into the library type, pointing state and
    /// logs at this environment.
    pub fn config(&self) -> Config {
        let mut config = Config::read(&self.config_path()).unwrap();
        config.state_dir = self.state_dir();
        config.logs_dir = self.logs_dir();
        config
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args)
            .current_dir(self.project_dir())
            .env("PORTKEEPER_CONFIG", self.config_path())
            .env("PORTKEEPER_STATE_DIR", self.state_dir())
            .env("PORTKEEPER_LOGS_DIR", self.logs_dir())
            .env("PORTKEEPER_LOG", "debug")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    pub fn run_command(&self, args: &[&str]) -> std::process::Output {
        self.run_command_with_env(args, &[])
    }

    pub fn run_command_with_env(
        &self,
        args: &[&str],
        extra_env: &[(&str, &str)],
    ) -> std::process::Output {
        let mut cmd = self.command(args);
        for (key, val) in extra_env {
            cmd.env(key, val);
        }
        let output = cmd.output().expect("Failed to execute portkeeper");
        println!("$ portkeeper {}", args.join(" "));
        println!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        println!("stderr: {}", String::from_utf8_lossy(&output.stderr));
        output
    }

    pub fn read_log(&self, port: u16) -> String {
        fs::read_to_string(self.logs_dir().join(port.to_string()).join(format!("{port}.log")))
            .unwrap_or_default()
    }

    pub fn read_watchdog_log(&self) -> String {
        fs::read_to_string(self.logs_dir().join("watchdog").join("watchdog.log"))
            .unwrap_or_default()
    }
}

/// A port nothing listens on right now.
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Several distinct free ports.
pub fn free_ports(n: usize) -> Vec<u16> {
    let listeners = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect::<Vec<_>>();
    listeners
        .iter()
        .map(|l| l.local_addr().unwrap().port())
        .collect()
}

/// Process-spawning tests need a real HTTP server to manage.
pub fn has_python() -> bool {
    Command::new("python3")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Command line for a throwaway HTTP server on `port`.
pub fn http_server(port: u16) -> String {
    format!("python3 -m http.server {port} --bind 127.0.0.1")
}

/// A `[servers]` entry running [`http_server`] under key `web:<port>`.
pub fn server_toml(port: u16) -> String {
    format!(
        "[servers.\"web:{port}\"]\nrun = \"{}\"\nport = {port}\n",
        http_server(port)
    )
}

pub fn wait_for(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    cond()
}

pub async fn wait_for_async<F, Fut>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    cond().await
}

/// Whether something accepts TCP connections on 127.0.0.1:`port`.
pub fn is_listening(port: u16) -> bool {
    std::net::TcpStream::connect_timeout(
        &([127, 0, 0, 1], port).into(),
        Duration::from_millis(200),
    )
    .is_ok()
}
