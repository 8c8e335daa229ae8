/// Player progress: completed levels and best records per level and mode.
///
/// Persistence sits behind [`ProgressStore`] so the core never depends on
/// where (or whether) progress is kept. Store failures are reported upward
/// and never block play; a world with no store at all is fully playable.
///
/// ## File format (`progress.json`):
///   ```json
///   { "completed": [0, 1],
///     "best": { "0:normal": { "moves": 33, "pushes": 10, "time_ms": 41200 } } }
///   ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::mode::{BestRecord, ModeKind};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    #[serde(default)]
    pub completed: BTreeSet<usize>,
    #[serde(default)]
    pub best: BTreeMap<String, BestRecord>,
}

impl Progress {
    fn key(level: usize, mode: ModeKind) -> String {
        format!("{}:{}", level, mode.key())
    }

    pub fn best_for(&self, level: usize, mode: ModeKind) -> Option<BestRecord> {
        self.best.get(&Self::key(level, mode)).copied()
    }

    /// Fold a finished run in. Returns true if any best improved.
    pub fn record_win(&mut self, level: usize, mode: ModeKind, run: BestRecord) -> bool {
        self.completed.insert(level);
        let key = Self::key(level, mode);
        let (merged, improved) = BestRecord::merge(self.best.get(&key).copied(), run);
        self.best.insert(key, merged);
        improved
    }

    pub fn is_completed(&self, level: usize) -> bool {
        self.completed.contains(&level)
    }
}

/// Opaque persistence collaborator.
pub trait ProgressStore {
    fn load_progress(&mut self) -> Result<Progress, ProgressError>;
    fn save_progress(&mut self, progress: &Progress) -> Result<(), ProgressError>;
}

/// JSON file store.
pub struct FileProgressStore {
    path: PathBuf,
}

impl FileProgressStore {
    pub fn new(path: PathBuf) -> Self {
        FileProgressStore { path }
    }
}

impl ProgressStore for FileProgressStore {
    /// A missing file is an empty progress, not an error.
    fn load_progress(&mut self) -> Result<Progress, ProgressError> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Progress::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_progress(&mut self, progress: &Progress) -> Result<(), ProgressError> {
        let text = serde_json::to_string_pretty(progress)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, text)?;
        Ok(())
    }
}

/// Writable directory for progress data.
pub fn data_dir() -> PathBuf {
    // 1. Exe directory (portable installs), if writable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            let test_path = parent.join(".write_test_pushbox");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/pushbox");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory store that can be told to fail.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub saved: Option<Progress>,
        pub saves: usize,
        pub fail: bool,
    }

    impl ProgressStore for MemoryStore {
        fn load_progress(&mut self) -> Result<Progress, ProgressError> {
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "offline").into());
            }
            Ok(self.saved.clone().unwrap_or_default())
        }

        fn save_progress(&mut self, progress: &Progress) -> Result<(), ProgressError> {
            self.saves += 1;
            if self.fail {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "offline").into());
            }
            self.saved = Some(progress.clone());
            Ok(())
        }
    }

    #[test]
    fn record_win_marks_completed_and_minimizes() {
        let mut p = Progress::default();
        assert!(p.record_win(2, ModeKind::Normal, BestRecord { moves: 10, pushes: 3, time_ms: 5_000 }));
        assert!(p.is_completed(2));
        assert!(!p.record_win(2, ModeKind::Normal, BestRecord { moves: 12, pushes: 4, time_ms: 6_000 }));
        assert!(p.record_win(2, ModeKind::Normal, BestRecord { moves: 11, pushes: 2, time_ms: 7_000 }));
        assert_eq!(
            p.best_for(2, ModeKind::Normal),
            Some(BestRecord { moves: 10, pushes: 2, time_ms: 5_000 })
        );
        assert_eq!(p.best_for(2, ModeKind::Challenge), None);
    }

    #[test]
    fn file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("pushbox-progress-{}", std::process::id()));
        let path = dir.join("progress.json");
        let mut store = FileProgressStore::new(path.clone());
        assert_eq!(store.load_progress().unwrap(), Progress::default());

        let mut p = Progress::default();
        p.record_win(0, ModeKind::TimeAttack, BestRecord { moves: 7, pushes: 1, time_ms: 900 });
        store.save_progress(&p).unwrap();
        assert_eq!(store.load_progress().unwrap(), p);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(store.load_progress(), Err(ProgressError::Json(_))));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_fields_default() {
        let p: Progress = serde_json::from_str("{}").unwrap();
        assert!(p.completed.is_empty());
        assert!(p.best.is_empty());
    }
}
