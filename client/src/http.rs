use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use common::{
    ApiResponse, CreateProjectRequest, DescriptionContent, DescriptionUpdate, EditImageRequest,
    ExportLink, ExportRequest, FromDescriptionRequest, GenerateImagesRequest, NewPage,
    OutlineContent, OutlineUpdate, Page, PageDescriptionRequest, PageFields, Project,
    ProjectCreated, ProjectList, ProjectUpdate, ReorderRequest, TaskInfo, TaskLaunch,
};

use crate::api::{ProjectApi, TemplateUpload};
use crate::error::{ClientError, Result};

/// Implementación de `ProjectApi` sobre HTTP/JSON con reqwest.
#[derive(Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
}

impl HttpApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::from_reqwest)?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        HttpApi { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn project_url(&self, project_id: &str, rest: &str) -> String {
        self.url(&format!("/api/projects/{project_id}{rest}"))
    }

    fn page_url(&self, project_id: &str, page_id: &str, rest: &str) -> String {
        self.project_url(project_id, &format!("/pages/{page_id}{rest}"))
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response> {
        let resp = builder.send().await.map_err(ClientError::from_reqwest)?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        debug!("respuesta {} con cuerpo {}", status, body);
        Err(ClientError::from_response_body(status.as_u16(), &body))
    }

    async fn envelope<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<ApiResponse<T>> {
        let resp = self.send(builder).await?;
        resp.json::<ApiResponse<T>>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn data<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        self.envelope(builder)
            .await?
            .data
            .ok_or_else(|| ClientError::MissingData("response without data".to_string()))
    }

    /// Para operaciones que no devuelven nada útil: se ignora el cuerpo.
    async fn unit(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await.map(|_| ())
    }

    /// Operaciones que pueden lanzar tarea: un cuerpo sin `data` es síncrono.
    async fn launch(&self, builder: RequestBuilder) -> Result<TaskLaunch> {
        Ok(self
            .envelope::<TaskLaunch>(builder)
            .await?
            .data
            .unwrap_or_default())
    }
}

fn page_ids_query(builder: RequestBuilder, page_ids: Option<&[String]>) -> RequestBuilder {
    match page_ids {
        Some(ids) if !ids.is_empty() => builder.query(&[("page_ids", ids.join(","))]),
        _ => builder,
    }
}

#[async_trait]
impl ProjectApi for HttpApi {
    async fn create_project(&self, req: &CreateProjectRequest) -> Result<ProjectCreated> {
        let url = self.url("/api/projects");
        self.data(self.client.post(&url).json(req)).await
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let url = self.project_url(project_id, "");
        Ok(self.envelope(self.client.get(&url)).await?.data)
    }

    async fn list_projects(&self, limit: u32, offset: u32) -> Result<ProjectList> {
        let url = self.url("/api/projects");
        let builder = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)]);
        Ok(self.envelope(builder).await?.data.unwrap_or_default())
    }

    async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<()> {
        let url = self.project_url(project_id, "");
        self.unit(self.client.put(&url).json(update)).await
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        let url = self.project_url(project_id, "");
        self.unit(self.client.delete(&url)).await
    }

    async fn upload_template(&self, project_id: &str, template: &TemplateUpload) -> Result<()> {
        let url = self.project_url(project_id, "/template");
        let part = multipart::Part::bytes(template.bytes.clone()).file_name(template.file_name.clone());
        let form = multipart::Form::new().part("template_image", part);
        self.unit(self.client.post(&url).multipart(form)).await
    }

    async fn add_page(&self, project_id: &str, page: &NewPage) -> Result<Option<Page>> {
        let url = self.project_url(project_id, "/pages");
        Ok(self.envelope(self.client.post(&url).json(page)).await?.data)
    }

    async fn delete_page(&self, project_id: &str, page_id: &str) -> Result<()> {
        let url = self.page_url(project_id, page_id, "");
        self.unit(self.client.delete(&url)).await
    }

    async fn update_page(&self, project_id: &str, page_id: &str, fields: &PageFields) -> Result<()> {
        let url = self.page_url(project_id, page_id, "");
        self.unit(self.client.put(&url).json(fields)).await
    }

    async fn update_page_outline(
        &self,
        project_id: &str,
        page_id: &str,
        outline: &OutlineContent,
    ) -> Result<()> {
        let url = self.page_url(project_id, page_id, "/outline");
        let body = OutlineUpdate {
            outline_content: outline.clone(),
        };
        self.unit(self.client.put(&url).json(&body)).await
    }

    async fn update_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        description: &DescriptionContent,
    ) -> Result<()> {
        let url = self.page_url(project_id, page_id, "/description");
        let body = DescriptionUpdate {
            description_content: description.clone(),
        };
        self.unit(self.client.put(&url).json(&body)).await
    }

    async fn update_pages_order(&self, project_id: &str, page_ids: &[String]) -> Result<()> {
        let url = self.project_url(project_id, "/reorder");
        let body = ReorderRequest {
            page_ids: page_ids.to_vec(),
        };
        self.unit(self.client.post(&url).json(&body)).await
    }

    async fn generate_outline(&self, project_id: &str) -> Result<()> {
        let url = self.project_url(project_id, "/generate/outline");
        self.unit(self.client.post(&url).json(&Value::Object(Default::default())))
            .await
    }

    async fn generate_from_description(
        &self,
        project_id: &str,
        description_text: Option<&str>,
    ) -> Result<()> {
        let url = self.project_url(project_id, "/generate/from-description");
        let body = FromDescriptionRequest {
            description_text: description_text.map(str::to_string),
        };
        self.unit(self.client.post(&url).json(&body)).await
    }

    async fn generate_descriptions(&self, project_id: &str) -> Result<TaskLaunch> {
        let url = self.project_url(project_id, "/generate/descriptions");
        self.launch(self.client.post(&url).json(&Value::Object(Default::default())))
            .await
    }

    async fn generate_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        force_regenerate: bool,
    ) -> Result<TaskLaunch> {
        let url = self.page_url(project_id, page_id, "/generate/description");
        let body = PageDescriptionRequest { force_regenerate };
        self.launch(self.client.post(&url).json(&body)).await
    }

    async fn generate_images(
        &self,
        project_id: &str,
        page_ids: Option<&[String]>,
    ) -> Result<TaskLaunch> {
        let url = self.project_url(project_id, "/generate/images");
        let body = GenerateImagesRequest {
            page_ids: page_ids.map(<[String]>::to_vec),
        };
        self.launch(self.client.post(&url).json(&body)).await
    }

    async fn edit_page_image(
        &self,
        project_id: &str,
        page_id: &str,
        req: &EditImageRequest,
    ) -> Result<TaskLaunch> {
        let url = self.page_url(project_id, page_id, "/edit/image");
        self.launch(self.client.post(&url).json(req)).await
    }

    async fn get_task_status(&self, project_id: &str, task_id: &str) -> Result<Option<TaskInfo>> {
        let url = self.project_url(project_id, &format!("/tasks/{task_id}"));
        Ok(self.envelope(self.client.get(&url)).await?.data)
    }

    async fn export_pptx(&self, project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink> {
        let url = self.project_url(project_id, "/export/pptx");
        let builder = page_ids_query(self.client.get(&url), page_ids);
        Ok(self.envelope(builder).await?.data.unwrap_or_default())
    }

    async fn export_pdf(&self, project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink> {
        let url = self.project_url(project_id, "/export/pdf");
        let builder = page_ids_query(self.client.get(&url), page_ids);
        Ok(self.envelope(builder).await?.data.unwrap_or_default())
    }

    async fn export_editable_pptx(
        &self,
        project_id: &str,
        filename: Option<&str>,
        page_ids: Option<&[String]>,
    ) -> Result<TaskLaunch> {
        let url = self.project_url(project_id, "/export/editable-pptx");
        let body = ExportRequest {
            filename: filename.map(str::to_string),
            page_ids: page_ids.map(<[String]>::to_vec),
        };
        self.launch(self.client.post(&url).json(&body)).await
    }
}
