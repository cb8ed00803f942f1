//! Historial de exportaciones, persistido aparte del proyecto actual para
//! poder retomar el seguimiento de las que seguían en curso.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{normalize_error_message, PageId, ProjectId, TaskId, TaskInfo, TaskProgress, TaskStatus};

use crate::api::ProjectApi;
use crate::config::StoreConfig;
use crate::error::{ClientError, Result, EXPORT_LINK_MISSING_MESSAGE};
use crate::opener::DownloadOpener;
use crate::poller::{run_poll_loop, Abandon, PollPolicy, TaskObserver};
use crate::storage::{KeyValueStore, EXPORT_TASKS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportKind {
    Pptx,
    Pdf,
    EditablePptx,
}

impl ExportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportKind::Pptx => "pptx",
            ExportKind::Pdf => "pdf",
            ExportKind::EditablePptx => "editable-pptx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportTask {
    /// Id local de la entrada.
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub project_id: ProjectId,
    pub kind: ExportKind,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_ids: Option<Vec<PageId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
    pub created_at: DateTime<Utc>,
}

impl ExportTask {
    pub fn new(kind: ExportKind, project_id: impl Into<ProjectId>, status: TaskStatus) -> Self {
        ExportTask {
            id: Uuid::new_v4().to_string(),
            task_id: None,
            project_id: project_id.into(),
            kind,
            status,
            download_url: None,
            error_message: None,
            page_ids: None,
            progress: None,
            created_at: Utc::now(),
        }
    }

    /// Sigue en curso y tiene una tarea del servidor que consultar.
    pub fn is_resumable(&self) -> bool {
        self.status.is_active() && self.task_id.is_some()
    }
}

#[derive(Clone)]
pub struct ExportTaskStore {
    inner: Arc<Inner>,
}

struct Inner {
    api: Arc<dyn ProjectApi>,
    storage: Arc<dyn KeyValueStore>,
    opener: Arc<dyn DownloadOpener>,
    config: StoreConfig,
    tasks: Mutex<Vec<ExportTask>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl ExportTaskStore {
    /// Carga el historial guardado; si está corrupto se arranca vacío.
    pub fn new(
        api: Arc<dyn ProjectApi>,
        storage: Arc<dyn KeyValueStore>,
        opener: Arc<dyn DownloadOpener>,
        config: StoreConfig,
    ) -> Self {
        let tasks = match storage.get(EXPORT_TASKS_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("historial de exportaciones ilegible, lo descarto: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        ExportTaskStore {
            inner: Arc::new(Inner {
                api,
                storage,
                opener,
                config,
                tasks: Mutex::new(tasks),
                background: Mutex::new(Vec::new()),
            }),
        }
    }

    fn lock_tasks(&self) -> MutexGuard<'_, Vec<ExportTask>> {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, tasks: &[ExportTask]) {
        let raw = match serde_json::to_string(tasks) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("no se pudo serializar el historial de exportaciones: {}", e);
                return;
            }
        };
        if let Err(e) = self.inner.storage.set(EXPORT_TASKS_KEY, &raw) {
            warn!("no se pudo guardar el historial de exportaciones: {}", e);
        }
    }

    /// Más nuevas primero.
    pub fn tasks(&self) -> Vec<ExportTask> {
        let mut tasks = self.lock_tasks().clone();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub fn task(&self, id: &str) -> Option<ExportTask> {
        self.lock_tasks().iter().find(|t| t.id == id).cloned()
    }

    /// Inserta o reemplaza (mismo `id`).
    pub fn add_task(&self, task: ExportTask) {
        let mut tasks = self.lock_tasks();
        match tasks.iter_mut().find(|t| t.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
        self.persist(&tasks);
    }

    fn update_task(&self, id: &str, f: impl FnOnce(&mut ExportTask)) -> Option<ExportTask> {
        let mut tasks = self.lock_tasks();
        let task = tasks.iter_mut().find(|t| t.id == id)?;
        f(task);
        let updated = task.clone();
        self.persist(&tasks);
        Some(updated)
    }

    /// Saca las terminadas (completadas o fallidas).
    pub fn clear_finished(&self) -> usize {
        let mut tasks = self.lock_tasks();
        let before = tasks.len();
        tasks.retain(|t| !t.status.is_terminal());
        let removed = before - tasks.len();
        if removed > 0 {
            self.persist(&tasks);
        }
        removed
    }

    /// Exporta y registra la entrada. PPTX y PDF son síncronos y quedan
    /// completos; el PPTX editable queda en curso y se sigue en segundo
    /// plano. Un fallo queda registrado como entrada fallida.
    pub async fn export(
        &self,
        kind: ExportKind,
        project_id: &str,
        page_ids: Option<Vec<PageId>>,
    ) -> Result<ExportTask> {
        let mut task = ExportTask::new(kind, project_id, TaskStatus::Processing);
        task.page_ids = page_ids;

        match self.launch(&mut task).await {
            Ok(()) => {
                let resumable = task.is_resumable();
                self.add_task(task.clone());
                if resumable {
                    self.poll_task(&task.id);
                }
                Ok(task)
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                task.error_message = Some(e.friendly());
                self.add_task(task);
                Err(e)
            }
        }
    }

    async fn launch(&self, task: &mut ExportTask) -> Result<()> {
        let api = &self.inner.api;
        let page_ids = task.page_ids.as_deref();

        let link = match task.kind {
            ExportKind::Pptx => api.export_pptx(&task.project_id, page_ids).await?,
            ExportKind::Pdf => api.export_pdf(&task.project_id, page_ids).await?,
            ExportKind::EditablePptx => {
                let launch = api
                    .export_editable_pptx(&task.project_id, None, page_ids)
                    .await?;
                match launch.task_id {
                    Some(task_id) => {
                        info!("exportación editable en curso (tarea {})", task_id);
                        task.task_id = Some(task_id);
                    }
                    None => task.status = TaskStatus::Completed,
                }
                return Ok(());
            }
        };

        let url = link
            .url()
            .ok_or_else(|| ClientError::MissingData(EXPORT_LINK_MISSING_MESSAGE.into()))?
            .to_string();
        self.inner.opener.open(&url);
        task.status = TaskStatus::Completed;
        task.download_url = Some(url);
        Ok(())
    }

    /// Sigue en segundo plano la tarea de la entrada `id`.
    pub fn poll_task(&self, id: &str) {
        let Some(task) = self.task(id) else {
            warn!("no existe la exportación {}", id);
            return;
        };
        let Some(task_id) = task.task_id.clone() else {
            debug!("la exportación {} no tiene tarea que seguir", id);
            return;
        };

        let observer = ExportObserver {
            store: self.clone(),
            entry: task.id.clone(),
        };
        let policy = PollPolicy::immediate(&self.inner.config);
        let api = Arc::clone(&self.inner.api);
        let project_id = task.project_id;

        let handle = tokio::spawn(async move {
            run_poll_loop(api.as_ref(), &project_id, &task_id, &policy, &observer).await;
        });
        let mut background = self
            .inner
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        background.retain(|h| !h.is_finished());
        background.push(handle);
    }

    /// Retoma el polling de todas las entradas que seguían en curso.
    pub fn restore_active_tasks(&self) -> usize {
        let resumable: Vec<String> = self
            .lock_tasks()
            .iter()
            .filter(|t| t.is_resumable())
            .map(|t| t.id.clone())
            .collect();

        for id in &resumable {
            self.poll_task(id);
        }
        if !resumable.is_empty() {
            info!("retomando {} exportaciones en curso", resumable.len());
        }
        resumable.len()
    }

    pub async fn wait_for_background(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = self
                .inner
                .background
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .drain(..)
                .collect();
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!("polling de exportación terminó con error: {}", e);
                }
            }
        }
    }
}

struct ExportObserver {
    store: ExportTaskStore,
    entry: String,
}

#[async_trait]
impl TaskObserver for ExportObserver {
    async fn on_update(&self, info: &TaskInfo) {
        let status = info.status.clone();
        let progress = info.progress.clone();
        self.store.update_task(&self.entry, |t| {
            if status.is_active() {
                t.status = status;
            }
            if progress.is_some() {
                t.progress = progress;
            }
        });
    }

    async fn on_completed(&self, info: &TaskInfo) {
        let url = info.download_url().map(str::to_string);
        if let Some(url) = &url {
            self.store.inner.opener.open(url);
        }
        self.store.update_task(&self.entry, |t| {
            t.status = TaskStatus::Completed;
            t.download_url = url;
        });
    }

    async fn on_failed(&self, info: &TaskInfo) {
        let message = normalize_error_message(info.failure_message().as_deref());
        self.store.update_task(&self.entry, |t| {
            t.status = TaskStatus::Failed;
            t.error_message = Some(message);
        });
    }

    async fn on_unknown(&self, info: &TaskInfo) {
        let message = format!("Unknown task status: {}", info.status);
        self.store.update_task(&self.entry, |t| {
            t.status = TaskStatus::Failed;
            t.error_message = Some(message);
        });
    }

    async fn on_abandoned(&self, reason: Abandon) {
        match reason {
            // el servidor ya no conoce la tarea: no hay nada que retomar
            Abandon::MissingTask => {
                self.store.update_task(&self.entry, |t| {
                    t.status = TaskStatus::Failed;
                    t.error_message = Some("Export task not found".to_string());
                });
            }
            // queda en curso para que `restore_active_tasks` la retome
            Abandon::Error(e) => {
                warn!("dejo de seguir la exportación {}: {}", self.entry, e);
            }
        }
    }
}
