//! Store del proyecto actual: snapshot, ediciones optimistas, tareas en
//! segundo plano y marcadores por página.
//!
//! Todo el estado vive en un único `StoreState` detrás de un mutex que nunca
//! se mantiene tomado a través de un `.await`; las mutaciones pasan siempre
//! por los métodos de `ProjectStore`.

mod export;
mod generation;
mod pages;
mod projects;
mod tasks;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use common::{PageId, Project, ProjectId, TaskId, TaskProgress};

use crate::api::ProjectApi;
use crate::config::{ClientConfig, StoreConfig};
use crate::debounce::Debouncer;
use crate::error::Result;
use crate::http::HttpApi;
use crate::markers::GenerationMarkers;
use crate::opener::{DownloadOpener, LogOpener};
use crate::storage::{FileStore, KeyValueStore, CURRENT_PROJECT_KEY};

pub use pages::PagePatch;

/// Foto del estado del store, para mostrar.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub current_project: Option<Project>,
    pub is_global_loading: bool,
    pub active_task_id: Option<TaskId>,
    pub task_progress: Option<TaskProgress>,
    pub error: Option<String>,
    pub markers: GenerationMarkers,
}

#[derive(Clone)]
pub struct ProjectStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn ProjectApi>,
    storage: Arc<dyn KeyValueStore>,
    opener: Arc<dyn DownloadOpener>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    writes: Debouncer<PageId>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ProjectStore {
    pub fn new(
        api: Arc<dyn ProjectApi>,
        storage: Arc<dyn KeyValueStore>,
        opener: Arc<dyn DownloadOpener>,
        config: StoreConfig,
    ) -> Self {
        let writes = Debouncer::new(config.debounce);
        ProjectStore {
            inner: Arc::new(Inner {
                api,
                storage,
                opener,
                config,
                state: Mutex::new(StoreState::default()),
                writes,
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    /// HTTP + archivo de estado en disco + links al log.
    pub fn from_config(cfg: &ClientConfig) -> Result<Self> {
        let api = HttpApi::new(cfg.api_url.clone(), cfg.request_timeout)?;
        Ok(Self::new(
            Arc::new(api),
            Arc::new(FileStore::new(&cfg.state_dir)),
            Arc::new(LogOpener),
            cfg.store.clone(),
        ))
    }

    pub fn api(&self) -> &Arc<dyn ProjectApi> {
        &self.inner.api
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /* --------- lectura del estado --------- */

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Única puerta de escritura sobre el estado.
    fn update<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut state = self.lock_state();
        f(&mut state)
    }

    pub fn state(&self) -> StoreState {
        self.lock_state().clone()
    }

    pub fn current_project(&self) -> Option<Project> {
        self.lock_state().current_project.clone()
    }

    pub fn current_project_id(&self) -> Option<ProjectId> {
        self.lock_state()
            .current_project
            .as_ref()
            .map(|p| p.id.clone())
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock_state().is_global_loading
    }

    pub fn task_progress(&self) -> Option<TaskProgress> {
        self.lock_state().task_progress.clone()
    }

    pub fn markers(&self) -> GenerationMarkers {
        self.lock_state().markers.clone()
    }

    pub fn persisted_project_id(&self) -> Option<ProjectId> {
        self.inner
            .storage
            .get(CURRENT_PROJECT_KEY)
            .filter(|id| !id.is_empty())
    }

    /* --------- setters directos --------- */

    /// Instala un snapshot (proyecto recién creado o elegido de la lista).
    pub fn set_current_project(&self, project: Option<Project>) {
        if let Some(p) = &project {
            self.remember_project(&p.id);
        }
        self.update(|s| s.current_project = project);
    }

    pub fn set_error(&self, error: Option<String>) {
        self.update(|s| s.error = error);
    }

    pub fn set_global_loading(&self, loading: bool) {
        self.update(|s| s.is_global_loading = loading);
    }

    fn remember_project(&self, project_id: &str) {
        if let Err(e) = self.inner.storage.set(CURRENT_PROJECT_KEY, project_id) {
            warn!("no se pudo guardar el proyecto actual: {}", e);
        }
    }

    fn forget_project(&self) {
        if let Err(e) = self.inner.storage.remove(CURRENT_PROJECT_KEY) {
            warn!("no se pudo borrar el proyecto actual: {}", e);
        }
    }

    /* --------- sincronización con el servidor --------- */

    /// Trae el proyecto completo y reemplaza el snapshot.
    ///
    /// Sin id usa el del snapshot y si no el último guardado; si no hay
    /// ninguno no hace nada. Un 404 borra el snapshot y el id guardado.
    /// Cualquier otro error deja el snapshot como estaba. En ambos casos el
    /// mensaje queda en `error` y además se devuelve.
    pub async fn sync_project(&self, project_id: Option<&str>) -> Result<()> {
        let target = project_id
            .map(str::to_string)
            .or_else(|| self.current_project_id())
            .or_else(|| self.persisted_project_id());

        let Some(target) = target else {
            warn!("sync_project: no hay proyecto para sincronizar");
            return Ok(());
        };

        match self.inner.api.get_project(&target).await {
            Ok(Some(project)) => {
                debug!(
                    "proyecto {} sincronizado ({} páginas, estado {:?})",
                    project.id,
                    project.pages.len(),
                    project.status
                );
                self.remember_project(&project.id);
                self.update(|s| s.current_project = Some(project));
                Ok(())
            }
            Ok(None) => {
                debug!("proyecto {} sin datos en la respuesta", target);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                warn!("el proyecto {} ya no existe, limpio el estado local", target);
                self.forget_project();
                let message = err.friendly();
                self.update(|s| {
                    s.current_project = None;
                    s.error = Some(message);
                });
                Err(err)
            }
            Err(err) => {
                let message = err.friendly();
                self.update(|s| s.error = Some(message));
                Err(err)
            }
        }
    }

    /// Resync de fondo: el error ya quedó registrado en el estado.
    async fn resync(&self) {
        let _ = self.sync_project(None).await;
    }

    async fn resync_project(&self, project_id: &str) {
        let _ = self.sync_project(Some(project_id)).await;
    }

    /* --------- trabajo en segundo plano --------- */

    fn spawn_background<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Cantidad de cadenas de polling vivas.
    pub fn background_tasks(&self) -> usize {
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|h| !h.is_finished());
        background.len()
    }

    /// Espera a que terminen todas las cadenas de polling.
    pub async fn wait_for_background(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut background = self
                    .inner
                    .background
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                background.drain(..).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("tarea de fondo terminó con error: {}", e);
                }
            }
        }
    }

    /// Ediciones que todavía no salieron al servidor.
    pub fn pending_writes(&self) -> usize {
        self.inner.writes.pending()
    }
}
