//! Hot-reload of the room library asset
//!
//! Watches the library file (RON or JSON) with `notify`:
//! - a modified file is re-parsed and validated before it replaces anything
//! - an invalid file keeps the previous library and records the error
//! - a swap waits until no floor is mid-generation

use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

use bevy::prelude::*;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};

use crate::generation::FloorGeneratorResource;
use crate::library::{LibraryError, TemplateLibrary};

/// Parse and validate a library file without touching the live one
pub fn reload_library(path: &Path) -> Result<TemplateLibrary, LibraryError> {
    let library = TemplateLibrary::load_from_path(path)?;
    library.validate()?;
    Ok(library)
}

/// True for create/modify events naming `watched`
pub fn is_library_event(event: &Event, watched: &Path) -> bool {
    let relevant_kind = event.kind.is_modify() || matches!(event.kind, EventKind::Create(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p == watched || p.file_name() == watched.file_name())
}

/// File watcher for one library asset
pub struct LibraryWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    receiver: Receiver<notify::Result<Event>>,
}

impl LibraryWatcher {
    pub fn new(path: impl Into<PathBuf>) -> notify::Result<Self> {
        let path = path.into();
        let (tx, rx) = channel();
        let mut watcher = notify::recommended_watcher(tx)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(Self {
            path,
            _watcher: watcher,
            receiver: rx,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending events; reload once if any of them touched the library file
    pub fn poll(&self) -> Option<Result<TemplateLibrary, LibraryError>> {
        let mut touched = false;
        while let Ok(result) = self.receiver.try_recv() {
            match result {
                Ok(event) => touched |= is_library_event(&event, &self.path),
                Err(e) => warn!("library watcher error: {}", e),
            }
        }
        touched.then(|| reload_library(&self.path))
    }
}

/// Reload bookkeeping
#[derive(Resource, Debug, Default, Clone, Serialize, Deserialize)]
pub struct HotReloadState {
    pub enabled: bool,
    pub watched_file: Option<PathBuf>,
    pub reload_count: u32,
    pub last_reload_success: bool,
    pub last_error: Option<String>,
}

/// Library reload event
#[derive(Event, Debug, Clone)]
pub struct LibraryReloadEvent {
    pub path: PathBuf,
    pub success: bool,
    pub error: Option<String>,
}

/// Validated library waiting for the current floor to finish
#[derive(Resource, Default)]
struct PendingLibrary(Option<Arc<TemplateLibrary>>);

#[derive(Resource)]
struct WatcherResource(Mutex<LibraryWatcher>);

/// Watches `path` and swaps the generator's library when it changes.
/// Requires [`FloorGenerationPlugin`](crate::generation::FloorGenerationPlugin).
pub struct LibraryHotReloadPlugin {
    pub path: PathBuf,
}

impl Plugin for LibraryHotReloadPlugin {
    fn build(&self, app: &mut App) {
        let mut state = HotReloadState::default();
        match LibraryWatcher::new(&self.path) {
            Ok(watcher) => {
                state.enabled = true;
                state.watched_file = Some(self.path.clone());
                app.insert_resource(WatcherResource(Mutex::new(watcher)));
                info!("hot-reload enabled for {:?}", self.path);
            }
            Err(e) => error!("failed to watch {:?}: {}", self.path, e),
        }
        app.insert_resource(state)
            .init_resource::<PendingLibrary>()
            .add_event::<LibraryReloadEvent>()
            .add_systems(Update, (poll_library_changes, apply_pending_library).chain());
    }
}

fn poll_library_changes(
    watcher: Option<Res<WatcherResource>>,
    mut state: ResMut<HotReloadState>,
    mut pending: ResMut<PendingLibrary>,
    mut events: EventWriter<LibraryReloadEvent>,
) {
    let Some(watcher) = watcher else {
        return;
    };
    let Ok(watcher) = watcher.0.lock() else {
        return;
    };
    let Some(result) = watcher.poll() else {
        return;
    };
    let path = watcher.path().to_path_buf();
    match result {
        Ok(library) => {
            state.reload_count += 1;
            state.last_reload_success = true;
            state.last_error = None;
            info!(
                templates = library.templates.len(),
                "room library reloaded (count: {})", state.reload_count
            );
            pending.0 = Some(Arc::new(library));
            events.send(LibraryReloadEvent {
                path,
                success: true,
                error: None,
            });
        }
        Err(e) => {
            warn!("library reload failed, keeping previous library: {}", e);
            state.last_reload_success = false;
            state.last_error = Some(e.to_string());
            events.send(LibraryReloadEvent {
                path,
                success: false,
                error: Some(e.to_string()),
            });
        }
    }
}

fn apply_pending_library(
    mut pending: ResMut<PendingLibrary>,
    generator: Option<ResMut<FloorGeneratorResource>>,
) {
    let Some(mut generator) = generator else {
        return;
    };
    if generator.0.is_generating() {
        return;
    }
    if let Some(library) = pending.0.take() {
        generator.0.set_library(library);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::starter_library;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn modify(path: &str) -> Event {
        Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Any))).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_reload_valid_library() {
        let mut temp = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
        write!(temp, "{}", starter_library().to_ron_string().unwrap()).unwrap();
        let library = reload_library(temp.path()).unwrap();
        assert!(library.is_valid());
    }

    #[test]
    fn test_reload_valid_json_library() {
        let mut temp = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        let json = serde_json::to_string(&starter_library()).unwrap();
        write!(temp, "{}", json).unwrap();
        assert!(reload_library(temp.path()).is_ok());
    }

    #[test]
    fn test_reload_rejects_garbage() {
        let mut temp = NamedTempFile::new().unwrap();
        writeln!(temp, "(templates: [ not ron").unwrap();
        assert!(matches!(reload_library(temp.path()), Err(LibraryError::Ron(_))));
    }

    #[test]
    fn test_reload_rejects_library_without_roles() {
        let mut temp = tempfile::Builder::new().suffix(".ron").tempfile().unwrap();
        writeln!(temp, "(templates: [])").unwrap();
        assert!(matches!(
            reload_library(temp.path()),
            Err(LibraryError::NoEnabledRooms)
        ));
    }

    #[test]
    fn test_is_library_event() {
        let watched = Path::new("assets/rooms.ron");
        assert!(is_library_event(&modify("assets/rooms.ron"), watched));
        assert!(!is_library_event(&modify("assets/other.ron"), watched));

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("assets/rooms.ron"));
        assert!(is_library_event(&created, watched));

        let removed = Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("assets/rooms.ron"));
        assert!(!is_library_event(&removed, watched));
    }

    #[test]
    fn test_hotreload_state_default() {
        let state = HotReloadState::default();
        assert!(!state.enabled);
        assert_eq!(state.reload_count, 0);
        assert!(state.watched_file.is_none());
    }
}
