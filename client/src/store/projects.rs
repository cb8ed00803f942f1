use tracing::{info, warn};

use common::{CreateKind, CreateProjectRequest, Project, ProjectId, ProjectList, ProjectUpdate};

use super::ProjectStore;
use crate::api::TemplateUpload;
use crate::error::{ClientError, Result};

impl ProjectStore {
    /// Crea un proyecto, sube la plantilla, y lo deja como proyecto actual.
    ///
    /// La plantilla y la generación desde descripción son opcionales: si
    /// fallan se loguea y se sigue. Lo que sí corta es no recibir id o no
    /// poder leer el proyecto creado.
    pub async fn initialize_project(
        &self,
        kind: CreateKind,
        content: &str,
        template: Option<TemplateUpload>,
        style: Option<&str>,
    ) -> Result<Project> {
        self.update(|s| {
            s.is_global_loading = true;
            s.error = None;
        });

        let res = self.create_and_load(kind, content, template, style).await;

        self.set_global_loading(false);
        if let Err(e) = &res {
            self.set_error(Some(e.friendly()));
        }
        res
    }

    async fn create_and_load(
        &self,
        kind: CreateKind,
        content: &str,
        template: Option<TemplateUpload>,
        style: Option<&str>,
    ) -> Result<Project> {
        let api = self.api();
        let req = CreateProjectRequest::new(kind, content, style);

        let project_id = api.create_project(&req).await?.project_id.ok_or_else(|| {
            ClientError::MissingData("Project creation failed: No project ID returned".into())
        })?;
        info!("proyecto {} creado", project_id);

        if let Some(template) = template {
            if let Err(e) = api.upload_template(&project_id, &template).await {
                warn!("no se pudo subir la plantilla de {}: {}", project_id, e);
            }
        }

        if kind == CreateKind::Description {
            if let Err(e) = api.generate_from_description(&project_id, Some(content)).await {
                warn!("falló la generación desde descripción de {}: {}", project_id, e);
            }
        }

        let project = api.get_project(&project_id).await?.ok_or_else(|| {
            ClientError::MissingData(format!("Project {project_id} not found after creation"))
        })?;

        self.set_current_project(Some(project.clone()));
        Ok(project)
    }

    pub async fn list_projects(&self, limit: u32, offset: u32) -> Result<ProjectList> {
        self.api().list_projects(limit, offset).await
    }

    /// Borra varios proyectos. Sigue aunque alguno falle y devuelve el
    /// primer error. Si se borró el actual, se olvida.
    pub async fn delete_projects(&self, project_ids: &[ProjectId]) -> Result<()> {
        let mut first_error = None;

        for id in project_ids {
            match self.api().delete_project(id).await {
                Ok(()) => info!("proyecto {} borrado", id),
                Err(e) => {
                    warn!("no se pudo borrar el proyecto {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        let current = self
            .current_project_id()
            .or_else(|| self.persisted_project_id());
        if current.is_some_and(|c| project_ids.contains(&c)) {
            self.forget_project();
            self.update(|s| s.current_project = None);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Actualiza campos del proyecto actual y resincroniza.
    pub async fn update_project(&self, update: &ProjectUpdate) -> Result<()> {
        let Some(project_id) = self.current_project_id() else {
            return Ok(());
        };

        match self.api().update_project(&project_id, update).await {
            Ok(()) => {
                self.resync_project(&project_id).await;
                Ok(())
            }
            Err(e) => {
                self.set_error(Some(e.friendly()));
                Err(e)
            }
        }
    }
}
