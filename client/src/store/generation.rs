use tracing::{debug, info};

use common::{ContextImages, EditImageRequest, PageId, TaskLaunch};

use super::ProjectStore;
use crate::error::Result;
use crate::poller::PollPolicy;

impl ProjectStore {
    /* --------- síncronas --------- */

    /// Genera el esquema (outline). La respuesta ya trae el resultado.
    pub async fn generate_outline(&self) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };
        self.blocking_generation(|| async move {
            self.api().generate_outline(&project_id).await
        })
        .await
    }

    /// Divide la descripción libre del proyecto en páginas.
    pub async fn generate_from_description(&self) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };
        self.blocking_generation(|| async move {
            self.api().generate_from_description(&project_id, None).await
        })
        .await
    }

    async fn blocking_generation<F, Fut>(&self, call: F) -> Result<()>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        self.update(|s| {
            s.is_global_loading = true;
            s.error = None;
        });

        let res = match call().await {
            Ok(()) => {
                self.resync().await;
                Ok(())
            }
            Err(e) => {
                self.set_error(Some(e.friendly()));
                Err(e)
            }
        };

        self.set_global_loading(false);
        res
    }

    /* --------- descripciones --------- */

    /// Descripción de todas las páginas. Las que ya se están generando no se
    /// vuelven a marcar; si no queda ninguna libre no se pide nada.
    pub async fn generate_descriptions(&self) -> Result<()> {
        let Some(project) = self.current_project() else {
            return Ok(());
        };

        let targets = project.page_ids();
        let claimed = self.update(|s| s.markers.claim_descriptions(&targets));
        if claimed.is_empty() {
            debug!("todas las páginas ya están generando descripción");
            return Ok(());
        }
        self.set_error(None);

        let launch = self.api().generate_descriptions(&project.id).await;
        self.follow_descriptions(&project.id, launch, claimed, PollPolicy::delayed(self.config()))
            .await
    }

    /// Regenera la descripción de una página.
    pub async fn generate_page_description(&self, page_id: &str) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };

        let claimed = self.update(|s| s.markers.claim_descriptions(&[page_id.to_string()]));
        if claimed.is_empty() {
            debug!("la página {} ya está generando descripción", page_id);
            return Ok(());
        }
        self.set_error(None);
        self.resync().await;

        let launch = self
            .api()
            .generate_page_description(&project_id, page_id, true)
            .await;
        self.follow_descriptions(&project_id, launch, claimed, PollPolicy::immediate(self.config()))
            .await
    }

    async fn follow_descriptions(
        &self,
        project_id: &str,
        launch: Result<TaskLaunch>,
        claimed: Vec<PageId>,
        policy: PollPolicy,
    ) -> Result<()> {
        match launch {
            Ok(TaskLaunch {
                task_id: Some(task_id),
            }) => {
                info!(
                    "generando descripciones de {} páginas (tarea {})",
                    claimed.len(),
                    task_id
                );
                self.spawn_description_poll(project_id.to_string(), task_id, claimed, policy);
                Ok(())
            }
            Ok(TaskLaunch { task_id: None }) => {
                self.resync_project(project_id).await;
                self.update(|s| s.markers.release_descriptions(&claimed));
                Ok(())
            }
            Err(e) => {
                let message = e.friendly();
                self.update(|s| {
                    s.markers.release_descriptions(&claimed);
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }

    /* --------- imágenes --------- */

    /// Genera imágenes para `page_ids` (o todas). Las páginas que ya tienen
    /// una generación en curso se descartan; si no queda ninguna no sale
    /// ninguna petición.
    pub async fn generate_images(&self, page_ids: Option<&[PageId]>) -> Result<()> {
        let Some(project) = self.current_project() else {
            return Ok(());
        };

        let requested: Vec<PageId> = match page_ids {
            Some(ids) => ids.to_vec(),
            None => project.page_ids(),
        };
        let claimed = self.update(|s| s.markers.claim_images(&requested));
        if claimed.is_empty() {
            debug!("todas las páginas pedidas ya están generando imagen");
            return Ok(());
        }

        // "todas" solo si se pidió todo y no se filtró nada
        let filtered = claimed.len() != requested.len();
        let send = match (page_ids, filtered) {
            (None, false) => None,
            _ => Some(claimed.as_slice()),
        };

        self.set_error(None);
        let launch = self.api().generate_images(&project.id, send).await;
        self.follow_images(&project.id, launch, claimed).await
    }

    /// Edita la imagen de una página con una instrucción. Si la página ya
    /// tiene una generación en curso no se hace nada.
    pub async fn edit_page_image(
        &self,
        page_id: &str,
        instruction: &str,
        context_images: Option<ContextImages>,
    ) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };

        let claimed = self.update(|s| s.markers.claim_images(&[page_id.to_string()]));
        if claimed.is_empty() {
            debug!("la página {} ya está generando imagen", page_id);
            return Ok(());
        }

        self.set_error(None);
        let req = EditImageRequest {
            edit_instruction: instruction.to_string(),
            context_images,
        };
        let launch = self.api().edit_page_image(&project_id, page_id, &req).await;
        self.follow_images(&project_id, launch, claimed).await
    }

    async fn follow_images(
        &self,
        project_id: &str,
        launch: Result<TaskLaunch>,
        claimed: Vec<PageId>,
    ) -> Result<()> {
        match launch {
            Ok(TaskLaunch {
                task_id: Some(task_id),
            }) => {
                info!("generando imágenes de {} páginas (tarea {})", claimed.len(), task_id);
                self.update(|s| s.markers.bind_images(&claimed, &task_id));
                self.resync_project(project_id).await;
                self.spawn_image_poll(project_id.to_string(), task_id, claimed);
                Ok(())
            }
            Ok(TaskLaunch { task_id: None }) => {
                self.update(|s| s.markers.release_images(&claimed, None));
                self.resync_project(project_id).await;
                Ok(())
            }
            Err(e) => {
                let message = e.friendly();
                self.update(|s| {
                    s.markers.release_images(&claimed, None);
                    s.error = Some(message);
                });
                Err(e)
            }
        }
    }
}
