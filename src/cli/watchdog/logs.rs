use crate::Result;
use crate::config::Config;
use crate::watch_files::WatchFiles;
use itertools::Itertools;
use miette::IntoDiagnostic;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::time::Duration;

/// Prints the watchdog log or a server's log
#[derive(Debug, clap::Args)]
#[clap(
    verbatim_doc_comment,
    long_about = "\
Prints the watchdog log or a server's log

Without --port this is the aggregate watchdog log: its own messages plus
one JSON line per restart cycle. With --port it is the output of the
server launched on that port.

Example:
  portkeeper watchdog logs -n 50
  portkeeper watchdog logs --port 6666 --follow"
)]
pub struct Logs {
    /// Show only the last N lines
    #[clap(short)]
    n: Option<usize>,
    /// Keep printing new lines as they are written
    #[clap(short, long)]
    follow: bool,
    /// Show the log of the server on this port instead
    #[clap(short, long, value_parser = crate::cli::port_parser())]
    port: Option<u16>,
}

impl Logs {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load()?;
        let path = match self.port {
            Some(port) => config.port_log_file(port),
            None => config.watchdog_log_file(),
        };

        if path.exists() {
            for line in read_lines(&path, self.n)? {
                println!("{line}");
            }
        } else if !self.follow {
            warn!("no log at {}", path.display());
            return Ok(());
        }

        if self.follow {
            follow(&path).await?;
        }
        Ok(())
    }
}

/// The whole file, or its last `n` lines.
fn read_lines(path: &Path, n: Option<usize>) -> Result<Vec<String>> {
    let file = xx::file::open(path)?;
    let lines = match n {
        Some(n) => rev_lines::RevLines::new(file)
            .map_while(|l| l.ok())
            .take(n)
            .collect_vec()
            .into_iter()
            .rev()
            .collect_vec(),
        None => BufReader::new(file).lines().map_while(|l| l.ok()).collect_vec(),
    };
    Ok(lines)
}

async fn follow(path: &Path) -> Result<()> {
    let mut cur = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let mut wf = WatchFiles::new(Duration::from_millis(10))?;
    wf.watch_file(path)?;

    while let Some(paths) = wf.rx.recv().await {
        if !paths.iter().any(|p| p.file_name() == path.file_name()) {
            continue;
        }
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                debug!("could not open {}: {e}", path.display());
                continue;
            }
        };
        let len = file.metadata().into_diagnostic()?.len();
        if len < cur {
            // truncated or recreated
            cur = 0;
        }
        file.seek(SeekFrom::Start(cur)).into_diagnostic()?;
        let mut reader = BufReader::new(file);
        let mut line = String::new();
        while reader.read_line(&mut line).into_diagnostic()? > 0 {
            print!("{line}");
            line.clear();
        }
        cur = reader.stream_position().into_diagnostic()?;
    }
    Ok(())
}
