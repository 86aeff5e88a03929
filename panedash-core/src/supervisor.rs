// panedash-core/src/supervisor.rs

//! Owns the live generation and replaces it when the configuration changes.

use crossbeam::channel::Receiver;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crate::config::ConfigFile;
use crate::generation::{BuildError, Generation, GenerationBuilder, LifecycleError};
use crate::scheduler::StopReport;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("supervisor is shutting down")]
    ShuttingDown,
}

struct RebuildState {
    next_id: u64,
    shutting_down: bool,
}

pub struct Supervisor {
    path: PathBuf,
    builder: GenerationBuilder,
    live: RwLock<Arc<Generation>>,
    rebuild: Mutex<RebuildState>,
    last_error: Mutex<Option<String>>,
}

impl Supervisor {
    /// Load `path`, build generation 1 and bring it live.
    /// Unlike later rebuilds, any failure here is returned to the caller.
    pub fn start(path: impl Into<PathBuf>, builder: GenerationBuilder) -> Result<Self, SupervisorError> {
        let path = path.into();
        let config = ConfigFile::load_from(&path).map_err(BuildError::from)?;
        let first = Arc::new(builder.build(1, &config)?);
        first.activate()?;

        Ok(Self {
            path,
            builder,
            live: RwLock::new(first),
            rebuild: Mutex::new(RebuildState {
                next_id: 2,
                shutting_down: false,
            }),
            last_error: Mutex::new(None),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current generation
    pub fn live(&self) -> Arc<Generation> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Message of the most recent failed reload, cleared by the next success
    pub fn last_error(&self) -> Option<String> {
        self.lock_last_error().clone()
    }

    /// Re-read the config and replace the live generation.
    ///
    /// The new generation is built and prepared before the old one is
    /// touched, so a rejected config leaves the dashboard exactly as it was.
    pub fn rebuild(&self) -> Result<u64, SupervisorError> {
        let mut state = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        if state.shutting_down {
            return Err(SupervisorError::ShuttingDown);
        }

        let id = state.next_id;
        let next = match self.prepare(id) {
            Ok(generation) => generation,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "config reload rejected, keeping current generation"
                );
                *self.lock_last_error() = Some(err.to_string());
                // Repaint so the status line shows the error
                self.live().redraw().request();
                return Err(err);
            }
        };
        state.next_id += 1;

        let (previous, activated) = {
            let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
            live.begin_retire()?;
            let previous = std::mem::replace(&mut *live, next.clone());
            (previous, next.activate())
        };

        // The old generation is torn down whatever happened to the new one
        let retired = previous.finish_retire();

        if let Err(err) = activated {
            tracing::error!(generation = id, error = %err, "generation failed to go live");
            *self.lock_last_error() = Some(err.to_string());
            return Err(err.into());
        }
        retired?;

        *self.lock_last_error() = None;
        tracing::info!(
            path = %self.path.display(),
            generation = id,
            replaced = previous.id(),
            "config reloaded"
        );
        Ok(id)
    }

    /// Load, build and prepare generation `id`. A generation that fails to
    /// prepare is retired before the error is returned.
    fn prepare(&self, id: u64) -> Result<Arc<Generation>, SupervisorError> {
        let config = ConfigFile::load_from(&self.path).map_err(BuildError::from)?;
        let generation = self.builder.build(id, &config)?;

        if let Err(err) = generation.prepare() {
            let _ = generation.retire();
            return Err(err.into());
        }
        Ok(Arc::new(generation))
    }

    /// Run rebuilds on a worker thread, one per trigger received on `triggers`.
    ///
    /// Triggers should come from a `bounded(1)` channel: everything sent while
    /// a rebuild is running collapses into a single follow-up. The worker
    /// exits when every sender is gone or the supervisor shuts down.
    pub fn spawn_reloader(self: &Arc<Self>, triggers: Receiver<()>) -> io::Result<JoinHandle<()>> {
        let supervisor = Arc::clone(self);
        thread::Builder::new()
            .name("config-reloader".to_string())
            .spawn(move || {
                for () in triggers.iter() {
                    // Failures are logged and recorded by `rebuild` itself
                    if let Err(SupervisorError::ShuttingDown) = supervisor.rebuild() {
                        break;
                    }
                }
                tracing::debug!("config reloader exited");
            })
    }

    /// Stop accepting rebuilds and retire the live generation
    pub fn shutdown(&self) -> Result<StopReport, SupervisorError> {
        let mut state = self.rebuild.lock().unwrap_or_else(PoisonError::into_inner);
        if state.shutting_down {
            return Err(SupervisorError::ShuttingDown);
        }
        state.shutting_down = true;

        let live = self.live();
        tracing::info!(generation = live.id(), "shutting down");
        Ok(live.retire()?)
    }

    fn lock_last_error(&self) -> MutexGuard<'_, Option<String>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationState;
    use crate::testing::stub_registry;
    use crossbeam::channel::bounded;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn stubs(names: &[&str], build_delay_ms: u64) -> String {
        let mut content = String::from("[dashboard]\nstop_grace = \"500ms\"\n");
        for name in names {
            content.push_str(&format!(
                "\n[[widget]]\nname = \"{name}\"\ntype = \"stub\"\nrefresh_interval = \"1h\"\nbuild_delay_ms = {build_delay_ms}\n"
            ));
        }
        content
    }

    fn start_with(content: &str) -> (TempDir, PathBuf, Result<Supervisor, SupervisorError>) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("panedash.toml");
        fs::write(&path, content).unwrap();
        let supervisor = Supervisor::start(&path, GenerationBuilder::new(stub_registry()));
        (dir, path, supervisor)
    }

    #[test]
    fn test_start_brings_first_generation_live() {
        let (_dir, _path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = supervisor.unwrap();

        let live = supervisor.live();
        assert_eq!(live.id(), 1);
        assert!(live.is_live());
        assert!(supervisor.last_error().is_none());

        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_start_fails_without_widgets() {
        let (_dir, _path, supervisor) = start_with("[dashboard]\ntitle = \"empty\"\n");
        assert!(matches!(
            supervisor,
            Err(SupervisorError::Build(BuildError::Config(_)))
        ));
    }

    #[test]
    fn test_invalid_reload_keeps_last_good_generation() {
        let (_dir, path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = supervisor.unwrap();
        let first = supervisor.live();

        fs::write(&path, stubs(&["a", "b"], 0)).unwrap();
        assert_eq!(supervisor.rebuild().unwrap(), 2);

        let second = supervisor.live();
        assert_eq!(second.widgets().len(), 2);
        assert_eq!(first.state(), GenerationState::Retired);

        fs::write(&path, "[[widget]\nname = ").unwrap();
        assert!(supervisor.rebuild().is_err());

        let current = supervisor.live();
        assert_eq!(current.id(), 2);
        assert!(current.is_live());
        assert!(supervisor.last_error().is_some());

        fs::write(&path, stubs(&["c"], 0)).unwrap();
        assert_eq!(supervisor.rebuild().unwrap(), 3);
        assert!(supervisor.last_error().is_none());
        assert_eq!(second.state(), GenerationState::Retired);

        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_unknown_type_reload_is_rejected() {
        let (_dir, path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = supervisor.unwrap();

        fs::write(&path, "[[widget]]\nname = \"x\"\ntype = \"nope\"\n").unwrap();
        assert!(matches!(
            supervisor.rebuild(),
            Err(SupervisorError::Build(BuildError::UnknownWidgetType { .. }))
        ));
        assert_eq!(supervisor.live().id(), 1);

        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_triggers_during_build_coalesce() {
        let (_dir, _path, supervisor) = start_with(&stubs(&["slow"], 300));
        let supervisor = Arc::new(supervisor.unwrap());

        let (tx, rx) = bounded(1);
        let reloader = supervisor.spawn_reloader(rx).unwrap();

        tx.send(()).unwrap();
        std::thread::sleep(Duration::from_millis(100));
        // The first rebuild is in progress; these collapse into one follow-up
        for _ in 0..5 {
            let _ = tx.try_send(());
        }

        std::thread::sleep(Duration::from_millis(1200));
        assert_eq!(supervisor.live().id(), 3);

        drop(tx);
        reloader.join().unwrap();
        assert_eq!(supervisor.live().id(), 3);

        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_retires_and_blocks_rebuilds() {
        let (_dir, _path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = supervisor.unwrap();

        let report = supervisor.shutdown().unwrap();
        assert!(report.is_clean());
        assert_eq!(supervisor.live().state(), GenerationState::Retired);

        assert!(matches!(
            supervisor.rebuild(),
            Err(SupervisorError::ShuttingDown)
        ));
        assert!(matches!(
            supervisor.shutdown(),
            Err(SupervisorError::ShuttingDown)
        ));
    }

    #[test]
    fn test_failed_prepare_keeps_old_generation_live() {
        let (_dir, path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = supervisor.unwrap();

        fs::write(
            &path,
            "[[widget]]\nname = \"b\"\ntype = \"stub\"\nfail_prepare = true\n",
        )
        .unwrap();
        assert!(matches!(
            supervisor.rebuild(),
            Err(SupervisorError::Lifecycle(LifecycleError::Widget { .. }))
        ));

        let live = supervisor.live();
        assert_eq!(live.id(), 1);
        assert!(live.is_live());
        assert!(supervisor.last_error().is_some());

        // The rejected attempt does not use up an id
        fs::write(&path, stubs(&["c"], 0)).unwrap();
        assert_eq!(supervisor.rebuild().unwrap(), 2);
        assert_eq!(live.state(), GenerationState::Retired);

        supervisor.shutdown().unwrap();
    }

    #[test]
    fn test_invalid_edit_during_valid_build_keeps_valid_result() {
        let (_dir, path, supervisor) = start_with(&stubs(&["a"], 0));
        let supervisor = Arc::new(supervisor.unwrap());

        let (tx, rx) = bounded(1);
        let reloader = supervisor.spawn_reloader(rx).unwrap();

        fs::write(&path, stubs(&["b"], 300)).unwrap();
        tx.send(()).unwrap();

        // The valid build is under way when the broken edit lands
        std::thread::sleep(Duration::from_millis(100));
        fs::write(&path, "[[widget]\nname = ").unwrap();
        tx.send(()).unwrap();

        std::thread::sleep(Duration::from_millis(900));
        let live = supervisor.live();
        assert_eq!(live.id(), 2);
        assert!(live.is_live());
        assert!(live.widget("b").is_some());
        assert!(supervisor.last_error().is_some());

        drop(tx);
        reloader.join().unwrap();
        supervisor.shutdown().unwrap();
    }
}
