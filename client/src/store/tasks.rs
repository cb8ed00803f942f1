//! Cadenas de polling. Las tres comparten `run_poll_loop`; cada observer
//! decide cómo se refleja la tarea en el estado del store.

use std::future::Future;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::{normalize_error_message, PageId, ProjectId, TaskId, TaskInfo, TaskLaunch, TaskType};

use super::ProjectStore;
use crate::error::Result;
use crate::poller::{run_poll_loop, Abandon, PollPolicy, TaskObserver};

fn unknown_status(info: &TaskInfo) -> String {
    format!("Unknown task status: {}", info.status)
}

fn failure(info: &TaskInfo, fallback: &str) -> String {
    normalize_error_message(Some(
        info.failure_message().as_deref().unwrap_or(fallback),
    ))
}

impl ProjectStore {
    /// Lanza una operación que puede devolver una tarea y la sigue con el
    /// poller genérico. Marca el store como ocupado hasta que termina.
    pub async fn start_async_task<F, Fut>(&self, call: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TaskLaunch>>,
    {
        self.update(|s| {
            s.is_global_loading = true;
            s.error = None;
        });

        match call().await {
            Ok(TaskLaunch {
                task_id: Some(task_id),
            }) => {
                let Some(project_id) = self.current_project_id() else {
                    warn!("tarea {} lanzada sin proyecto actual, no la sigo", task_id);
                    self.set_global_loading(false);
                    return Ok(());
                };
                info!("tarea {} lanzada en el proyecto {}", task_id, project_id);
                self.update(|s| s.active_task_id = Some(task_id.clone()));
                self.spawn_generic_poll(project_id, task_id);
                Ok(())
            }
            Ok(TaskLaunch { task_id: None }) => {
                debug!("la operación terminó sin tarea");
                self.resync().await;
                self.set_global_loading(false);
                Ok(())
            }
            Err(e) => {
                let message = e.friendly();
                self.update(|s| {
                    s.error = Some(message);
                    s.is_global_loading = false;
                });
                Err(e)
            }
        }
    }

    pub(super) fn spawn_generic_poll(&self, project_id: ProjectId, task_id: TaskId) {
        let observer = GenericTask {
            store: self.clone(),
            task_id: task_id.clone(),
        };
        let policy = PollPolicy::immediate(self.config());
        let api = self.api().clone();
        self.spawn_background(async move {
            run_poll_loop(api.as_ref(), &project_id, &task_id, &policy, &observer).await;
        });
    }

    pub(super) fn spawn_image_poll(&self, project_id: ProjectId, task_id: TaskId, pages: Vec<PageId>) {
        let observer = ImageTask {
            store: self.clone(),
            task_id: task_id.clone(),
            pages,
        };
        let policy = PollPolicy::immediate(self.config());
        let api = self.api().clone();
        self.spawn_background(async move {
            run_poll_loop(api.as_ref(), &project_id, &task_id, &policy, &observer).await;
        });
    }

    pub(super) fn spawn_description_poll(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        pages: Vec<PageId>,
        policy: PollPolicy,
    ) {
        let observer = DescriptionTask {
            store: self.clone(),
            task_id: task_id.clone(),
            pages,
        };
        let api = self.api().clone();
        self.spawn_background(async move {
            run_poll_loop(api.as_ref(), &project_id, &task_id, &policy, &observer).await;
        });
    }

    /// Limpia la tarea activa solo si sigue siendo esta.
    fn finish_generic(&self, task_id: &TaskId, error: Option<String>) {
        self.update(|s| {
            if s.active_task_id.as_ref() == Some(task_id) {
                s.active_task_id = None;
            }
            s.task_progress = None;
            s.is_global_loading = false;
            if error.is_some() {
                s.error = error;
            }
        });
    }
}

/* --------- genérica (exportación editable, etc.) --------- */

struct GenericTask {
    store: ProjectStore,
    task_id: TaskId,
}

#[async_trait]
impl TaskObserver for GenericTask {
    async fn on_update(&self, info: &TaskInfo) {
        if let Some(progress) = &info.progress {
            let progress = progress.clone();
            self.store.update(|s| s.task_progress = Some(progress));
        }
    }

    async fn on_completed(&self, info: &TaskInfo) {
        if info.task_type == Some(TaskType::ExportEditablePptx) {
            match info.download_url() {
                Some(url) => self.store.inner.opener.open(url),
                None => warn!("exportación {} completada sin link de descarga", self.task_id),
            }
        }
        self.store.finish_generic(&self.task_id, None);
        self.store.resync().await;
    }

    async fn on_failed(&self, info: &TaskInfo) {
        self.store
            .finish_generic(&self.task_id, Some(failure(info, "Task failed")));
    }

    async fn on_unknown(&self, info: &TaskInfo) {
        self.store
            .finish_generic(&self.task_id, Some(unknown_status(info)));
    }

    async fn on_abandoned(&self, reason: Abandon) {
        // sin payload no hay error que mostrar, pero la UI no puede quedar
        // bloqueada esperando una tarea que ya no existe
        let error = match reason {
            Abandon::MissingTask => None,
            Abandon::Error(e) => Some(e.friendly()),
        };
        self.store.finish_generic(&self.task_id, error);
    }
}

/* --------- imágenes --------- */

struct ImageTask {
    store: ProjectStore,
    task_id: TaskId,
    pages: Vec<PageId>,
}

impl ImageTask {
    fn release(&self, error: Option<String>) {
        self.store.update(|s| {
            s.markers.release_images(&self.pages, Some(&self.task_id));
            if error.is_some() {
                s.error = error;
            }
        });
    }
}

#[async_trait]
impl TaskObserver for ImageTask {
    async fn on_active(&self, _info: &TaskInfo) {
        // trae las imágenes que ya fueron saliendo
        self.store.resync().await;
    }

    async fn on_completed(&self, _info: &TaskInfo) {
        self.release(None);
        self.store.resync().await;
    }

    async fn on_failed(&self, info: &TaskInfo) {
        self.release(Some(failure(info, "Batch generation failed")));
        self.store.resync().await;
    }

    async fn on_unknown(&self, info: &TaskInfo) {
        self.release(Some(unknown_status(info)));
    }

    async fn on_abandoned(&self, _reason: Abandon) {
        self.release(None);
    }
}

/* --------- descripciones --------- */

struct DescriptionTask {
    store: ProjectStore,
    task_id: TaskId,
    pages: Vec<PageId>,
}

impl DescriptionTask {
    fn release(&self, error: Option<String>) {
        self.store.update(|s| {
            s.markers.release_descriptions(&self.pages);
            s.task_progress = None;
            if s.active_task_id.as_ref() == Some(&self.task_id) {
                s.active_task_id = None;
            }
            if error.is_some() {
                s.error = error;
            }
        });
    }
}

#[async_trait]
impl TaskObserver for DescriptionTask {
    async fn on_update(&self, info: &TaskInfo) {
        if let Some(progress) = &info.progress {
            let progress = progress.clone();
            self.store.update(|s| s.task_progress = Some(progress));
        }

        self.store.resync().await;

        // la tarea no informa por página: se infiere del snapshot nuevo
        self.store.update(|s| {
            if let Some(project) = &s.current_project {
                s.markers.reconcile_descriptions(&self.pages, project);
            }
        });
    }

    async fn on_completed(&self, _info: &TaskInfo) {
        self.release(None);
        self.store.resync().await;
    }

    async fn on_failed(&self, info: &TaskInfo) {
        self.release(Some(failure(info, "Failed to generate descriptions")));
    }

    async fn on_unknown(&self, info: &TaskInfo) {
        self.release(Some(unknown_status(info)));
    }

    async fn on_abandoned(&self, reason: Abandon) {
        let error = match reason {
            Abandon::MissingTask => None,
            Abandon::Error(e) => Some(e.friendly()),
        };
        self.release(error);
    }
}
