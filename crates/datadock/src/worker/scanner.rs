//! Directory intake: a one-shot scan of the input directory and a polling
//! watcher for files dropped in while the service runs.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use notify::{Config as NotifyConfig, PollWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer_opt, Config as DebouncerConfig, DebouncedEventKind};
use walkdir::WalkDir;

use crate::config::TableFormat;
use crate::error::WorkerError;

pub struct DirectoryScanner {
    input_directory: PathBuf,
}

impl DirectoryScanner {
    pub fn new<P: AsRef<Path>>(input_directory: P) -> Self {
        Self {
            input_directory: input_directory.as_ref().to_path_buf(),
        }
    }

    pub fn input_directory(&self) -> &Path {
        &self.input_directory
    }

    /// Top-level tabular files in the input directory, in directory order.
    /// Subdirectories are not descended into.
    pub fn scan(&self) -> Result<Vec<PathBuf>, WorkerError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.input_directory)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
        {
            let entry = entry.map_err(|source| WorkerError::ScanFailed {
                path: self.input_directory.clone(),
                source,
            })?;
            let path = entry.path();
            if path.is_dir() {
                continue;
            }
            if is_tabular(path) {
                debug!("Found tabular file: {}", path.display());
                files.push(path.to_path_buf());
            }
        }

        info!(
            "Scanned {} tabular files in {}",
            files.len(),
            self.input_directory.display()
        );
        Ok(files)
    }

    /// Watches the input directory and invokes `callback` for each tabular
    /// file that appears. Blocks until `shutdown` is set. A poll watcher is
    /// used so bind mounts and network shares behave.
    pub fn watch<F>(&self, callback: F, shutdown: Arc<AtomicBool>) -> Result<(), WorkerError>
    where
        F: Fn(PathBuf) + Send + 'static,
    {
        let input_dir = self.input_directory.clone();

        let poll_config = NotifyConfig::default().with_poll_interval(Duration::from_secs(2));
        let debouncer_config = DebouncerConfig::default()
            .with_timeout(Duration::from_millis(500))
            .with_notify_config(poll_config);

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer = new_debouncer_opt::<_, PollWatcher>(debouncer_config, tx)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&input_dir, RecursiveMode::NonRecursive)
            .map_err(|e| WorkerError::WatchError(e.to_string()))?;

        info!("Watching directory: {}", input_dir.display());

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("Watch mode shutting down...");
                break;
            }

            match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(Ok(events)) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any) {
                            continue;
                        }
                        let path = &event.path;
                        if path.is_dir() || !path.exists() {
                            continue;
                        }
                        if is_tabular(path) {
                            info!("New tabular file detected: {}", path.display());
                            callback(path.to_path_buf());
                        }
                    }
                }
                Ok(Err(e)) => {
                    return Err(WorkerError::WatchError(e.to_string()));
                }
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(WorkerError::WatchError(
                        "watch event channel disconnected".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

fn is_tabular(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(TableFormat::from_extension)
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"a,b\n1,2\n").unwrap();
    }

    #[test]
    fn test_scan_picks_tabular_files_only() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "sales.csv");
        touch(tmp.path(), "inventory.tsv");
        touch(tmp.path(), "notes.txt");
        touch(tmp.path(), "report.pdf");
        fs::create_dir(tmp.path().join("nested")).unwrap();
        touch(&tmp.path().join("nested"), "deep.csv");

        let scanner = DirectoryScanner::new(tmp.path());
        let mut names: Vec<String> = scanner
            .scan()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["inventory.tsv", "sales.csv"]);
    }

    #[test]
    fn test_scan_missing_directory_errors() {
        let scanner = DirectoryScanner::new("/nonexistent/input");
        let err = scanner.scan().unwrap_err();
        assert!(matches!(err, WorkerError::ScanFailed { .. }));
    }

    #[test]
    fn test_scan_empty_directory() {
        let tmp = TempDir::new().unwrap();
        let scanner = DirectoryScanner::new(tmp.path());
        assert!(scanner.scan().unwrap().is_empty());
    }
}
