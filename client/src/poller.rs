use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use common::{TaskInfo, TaskStatus};

use crate::api::ProjectApi;
use crate::config::StoreConfig;
use crate::error::ClientError;

#[derive(Debug, Clone)]
pub struct PollPolicy {
    pub interval: Duration,
    pub initial_delay: Duration,
    /// Errores seguidos que se toleran antes de abandonar la tarea.
    pub retries: u32,
}

impl PollPolicy {
    pub fn immediate(cfg: &StoreConfig) -> Self {
        PollPolicy {
            interval: cfg.poll_interval,
            initial_delay: Duration::ZERO,
            retries: cfg.poll_transport_retries,
        }
    }

    pub fn delayed(cfg: &StoreConfig) -> Self {
        PollPolicy {
            initial_delay: cfg.description_initial_delay,
            ..Self::immediate(cfg)
        }
    }
}

/// Por qué se dejó de seguir una tarea sin que llegara a un estado terminal.
#[derive(Debug, Clone)]
pub enum Abandon {
    /// La respuesta no traía la tarea.
    MissingTask,
    /// Falló la consulta misma.
    Error(ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEnd {
    Completed,
    Failed,
    UnknownStatus(String),
    Abandoned,
}

/// Lo que hace cada cadena de polling con las respuestas. El loop es el
/// mismo para todas; cambian las proyecciones sobre el estado.
#[async_trait]
pub trait TaskObserver: Send + Sync {
    /// Cada respuesta con tarea, antes de mirar el status.
    async fn on_update(&self, _info: &TaskInfo) {}
    /// PENDING o PROCESSING; después se vuelve a consultar.
    async fn on_active(&self, _info: &TaskInfo) {}
    async fn on_completed(&self, info: &TaskInfo);
    async fn on_failed(&self, info: &TaskInfo);
    async fn on_unknown(&self, info: &TaskInfo);
    async fn on_abandoned(&self, reason: Abandon);
}

/// Consulta la tarea cada `interval` hasta que llegue a un estado terminal.
/// No tiene timeout propio.
pub async fn run_poll_loop(
    api: &dyn ProjectApi,
    project_id: &str,
    task_id: &str,
    policy: &PollPolicy,
    observer: &dyn TaskObserver,
) -> PollEnd {
    if !policy.initial_delay.is_zero() {
        sleep(policy.initial_delay).await;
    }

    let mut failures: u32 = 0;

    loop {
        debug!("consultando tarea {} del proyecto {}", task_id, project_id);

        let info = match api.get_task_status(project_id, task_id).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                warn!("respuesta sin datos para la tarea {}, dejo de pollear", task_id);
                observer.on_abandoned(Abandon::MissingTask).await;
                return PollEnd::Abandoned;
            }
            Err(err) if failures < policy.retries => {
                failures += 1;
                warn!(
                    "error consultando tarea {} ({}/{}): {}",
                    task_id, failures, policy.retries, err
                );
                sleep(policy.interval).await;
                continue;
            }
            Err(err) => {
                warn!("error consultando tarea {}: {}, dejo de pollear", task_id, err);
                observer.on_abandoned(Abandon::Error(err)).await;
                return PollEnd::Abandoned;
            }
        };

        failures = 0;
        observer.on_update(&info).await;

        match &info.status {
            TaskStatus::Completed => {
                info!("tarea {} completada", task_id);
                observer.on_completed(&info).await;
                return PollEnd::Completed;
            }
            TaskStatus::Failed => {
                warn!(
                    "tarea {} falló: {}",
                    task_id,
                    info.failure_message().unwrap_or_default()
                );
                observer.on_failed(&info).await;
                return PollEnd::Failed;
            }
            TaskStatus::Pending | TaskStatus::Processing => {
                debug!("tarea {} en {}, reintento en {:?}", task_id, info.status, policy.interval);
                observer.on_active(&info).await;
                sleep(policy.interval).await;
            }
            TaskStatus::Other(raw) => {
                warn!("tarea {} con estado desconocido {}, dejo de pollear", task_id, raw);
                observer.on_unknown(&info).await;
                return PollEnd::UnknownStatus(raw.clone());
            }
        }
    }
}
