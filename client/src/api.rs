use async_trait::async_trait;

use common::{
    CreateProjectRequest, DescriptionContent, EditImageRequest, ExportLink, NewPage,
    OutlineContent, Page, PageFields, Project, ProjectCreated, ProjectList, ProjectUpdate,
    TaskInfo, TaskLaunch,
};

use crate::error::Result;

/// Imagen de plantilla a subir junto con un proyecto nuevo.
#[derive(Debug, Clone)]
pub struct TemplateUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Operaciones REST que usa el store. Las rutas concretas son cosa de la
/// implementación (`HttpApi`); el store solo conoce estas formas.
///
/// Las operaciones que pueden ser asíncronas devuelven `TaskLaunch`: si trae
/// `task_id` hay que pollear, si no la operación ya terminó.
#[async_trait]
pub trait ProjectApi: Send + Sync {
    async fn create_project(&self, req: &CreateProjectRequest) -> Result<ProjectCreated>;
    /// `None` cuando la respuesta no trae `data`.
    async fn get_project(&self, project_id: &str) -> Result<Option<Project>>;
    async fn list_projects(&self, limit: u32, offset: u32) -> Result<ProjectList>;
    async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<()>;
    async fn delete_project(&self, project_id: &str) -> Result<()>;
    async fn upload_template(&self, project_id: &str, template: &TemplateUpload) -> Result<()>;

    async fn add_page(&self, project_id: &str, page: &NewPage) -> Result<Option<Page>>;
    async fn delete_page(&self, project_id: &str, page_id: &str) -> Result<()>;
    async fn update_page(&self, project_id: &str, page_id: &str, fields: &PageFields) -> Result<()>;
    async fn update_page_outline(
        &self,
        project_id: &str,
        page_id: &str,
        outline: &OutlineContent,
    ) -> Result<()>;
    async fn update_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        description: &DescriptionContent,
    ) -> Result<()>;
    async fn update_pages_order(&self, project_id: &str, page_ids: &[String]) -> Result<()>;

    async fn generate_outline(&self, project_id: &str) -> Result<()>;
    async fn generate_from_description(
        &self,
        project_id: &str,
        description_text: Option<&str>,
    ) -> Result<()>;
    async fn generate_descriptions(&self, project_id: &str) -> Result<TaskLaunch>;
    async fn generate_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        force_regenerate: bool,
    ) -> Result<TaskLaunch>;
    async fn generate_images(&self, project_id: &str, page_ids: Option<&[String]>)
        -> Result<TaskLaunch>;
    async fn edit_page_image(
        &self,
        project_id: &str,
        page_id: &str,
        req: &EditImageRequest,
    ) -> Result<TaskLaunch>;

    /// `None` cuando la respuesta no trae la tarea.
    async fn get_task_status(&self, project_id: &str, task_id: &str) -> Result<Option<TaskInfo>>;

    async fn export_pptx(&self, project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink>;
    async fn export_pdf(&self, project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink>;
    async fn export_editable_pptx(
        &self,
        project_id: &str,
        filename: Option<&str>,
        page_ids: Option<&[String]>,
    ) -> Result<TaskLaunch>;
}
