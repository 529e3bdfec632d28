//! Whole-list persistence of the current itinerary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::debug;

use crate::types::Stop;

/// Stores one itinerary as a unit. There is no per-stop update.
pub trait StopRepository: Send + Sync {
    fn save(&self, stops: &[Stop]) -> Result<()>;

    /// Empty list when nothing was saved yet
    fn load(&self) -> Result<Vec<Stop>>;

    fn clear(&self) -> Result<()>;
}

/// JSON document on disk
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StopRepository for JsonFileRepository {
    fn save(&self, stops: &[Stop]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_string_pretty(stops)?;
        // Atomic replace
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Saved {} stops to {}", stops.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Stop>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };

        serde_json::from_str(&raw)
            .with_context(|| format!("Stored itinerary {} is corrupt", self.path.display()))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}

#[derive(Default)]
pub struct InMemoryRepository {
    stops: Mutex<Vec<Stop>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StopRepository for InMemoryRepository {
    fn save(&self, stops: &[Stop]) -> Result<()> {
        *self.stops.lock() = stops.to_vec();
        Ok(())
    }

    fn load(&self) -> Result<Vec<Stop>> {
        Ok(self.stops.lock().clone())
    }

    fn clear(&self) -> Result<()> {
        self.stops.lock().clear();
        Ok(())
    }
}

/// Flip the completion flag of one stored stop. Returns the new state.
pub fn set_completed(repo: &dyn StopRepository, id: uuid::Uuid, completed: bool) -> Result<Stop> {
    let mut stops = repo.load()?;
    let stop = stops
        .iter_mut()
        .find(|s| s.id == id)
        .with_context(|| format!("No stop with id {} in the stored itinerary", id))?;
    stop.completed = completed;
    let updated = stop.clone();

    repo.save(&stops)?;
    Ok(updated)
}
