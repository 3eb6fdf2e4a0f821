use crate::Result;
use itertools::Itertools;
use miette::IntoDiagnostic;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, FileIdMap, new_debouncer_opt};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Debounced change notifications for a set of log files.
pub struct WatchFiles {
    pub rx: tokio::sync::mpsc::Receiver<Vec<PathBuf>>,
    debouncer: Debouncer<RecommendedWatcher, FileIdMap>,
}

impl WatchFiles {
    pub fn new(duration: Duration) -> Result<Self> {
        let h = tokio::runtime::Handle::current();
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let debouncer = new_debouncer_opt(
            duration,
            None,
            move |res: DebounceEventResult| {
                let tx = tx.clone();
                h.spawn(async move {
                    if let Ok(ev) = res {
                        let paths = ev
                            .into_iter()
                            .filter(|e| matches!(e.kind, EventKind::Modify(_) | EventKind::Create(_)))
                            .flat_map(|e| e.paths.clone())
                            .unique()
                            .collect_vec();
                        if !paths.is_empty() {
                            // receiver is gone once the follower exits
                            let _ = tx.send(paths).await;
                        }
                    }
                });
            },
            FileIdMap::new(),
            Config::default(),
        )
        .into_diagnostic()?;

        Ok(Self { debouncer, rx })
    }

    /// Watches the directory holding `file` so that a log created or
    /// recreated after we start is still picked up.
    pub fn watch_file(&mut self, file: &Path) -> Result<()> {
        let dir = file.parent().unwrap_or(Path::new("."));
        xx::file::mkdirp(dir)?;
        self.debouncer
            .watch(dir, RecursiveMode::NonRecursive)
            .into_diagnostic()
    }
}
