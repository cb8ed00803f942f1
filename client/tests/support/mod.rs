//! `ProjectApi` en memoria con respuestas guionadas, para probar el store
//! sin red. Registra cada llamada en orden.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use client::{
    ClientError, CollectingOpener, MemoryStore, ProjectApi, ProjectStore, Result, StoreConfig,
    TemplateUpload,
};
use common::{
    CreateProjectRequest, DescriptionContent, EditImageRequest, ExportLink, NewPage,
    OutlineContent, Page, PageFields, Project, ProjectCreated, ProjectList, ProjectUpdate,
    TaskInfo, TaskLaunch, TaskStatus,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateProject(CreateProjectRequest),
    GetProject(String),
    ListProjects,
    UpdateProject(ProjectUpdate),
    DeleteProject(String),
    UploadTemplate(String),
    AddPage(NewPage),
    DeletePage(String),
    UpdatePage(String, PageFields),
    UpdateOutline(String, OutlineContent),
    UpdateDescription(String, DescriptionContent),
    Reorder(Vec<String>),
    GenerateOutline,
    GenerateFromDescription(Option<String>),
    GenerateDescriptions,
    GeneratePageDescription(String, bool),
    GenerateImages(Option<Vec<String>>),
    EditImage(String, String),
    TaskStatus(String),
    ExportPptx(Option<Vec<String>>),
    ExportPdf(Option<Vec<String>>),
    ExportEditable(Option<Vec<String>>),
}

type Effect = Box<dyn FnOnce(&mut Project) + Send>;

/// Una respuesta guionada de "task status", con un cambio opcional sobre el
/// proyecto que se aplica al servirla (lo que "hizo" el servidor).
pub struct Step {
    reply: Result<Option<TaskInfo>>,
    effect: Option<Effect>,
}

impl Step {
    pub fn status(status: TaskStatus) -> Self {
        Step {
            reply: Ok(Some(TaskInfo::new(status))),
            effect: None,
        }
    }

    pub fn info(info: TaskInfo) -> Self {
        Step {
            reply: Ok(Some(info)),
            effect: None,
        }
    }

    pub fn missing() -> Self {
        Step {
            reply: Ok(None),
            effect: None,
        }
    }

    pub fn error(err: ClientError) -> Self {
        Step {
            reply: Err(err),
            effect: None,
        }
    }

    pub fn then(mut self, effect: impl FnOnce(&mut Project) + Send + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

#[derive(Default)]
pub struct FakeApi {
    projects: Mutex<HashMap<String, Project>>,
    calls: Mutex<Vec<Call>>,
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    task_projects: Mutex<HashMap<String, String>>,
    launches: Mutex<VecDeque<Result<TaskLaunch>>>,
    failures: Mutex<HashMap<&'static str, ClientError>>,
    sticky_get_error: Mutex<Option<ClientError>>,
    export_link: Mutex<ExportLink>,
    next_id: Mutex<u32>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(FakeApi::default())
    }

    pub fn with_project(project: Project) -> Arc<Self> {
        let api = FakeApi::new();
        api.put_project(project);
        api
    }

    pub fn put_project(&self, project: Project) {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id.clone(), project);
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.projects.lock().unwrap().get(id).cloned()
    }

    pub fn edit_project(&self, id: &str, f: impl FnOnce(&mut Project)) {
        if let Some(p) = self.projects.lock().unwrap().get_mut(id) {
            f(p);
        }
    }

    /// Guion de estados para `task_id`; sin guion la tarea responde COMPLETED.
    pub fn script(&self, task_id: &str, steps: Vec<Step>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), steps.into());
    }

    /// Próxima respuesta de una operación que lanza tarea.
    pub fn next_launch(&self, launch: Result<TaskLaunch>) {
        self.launches.lock().unwrap().push_back(launch);
    }

    /// La próxima llamada a `op` falla con `err`.
    pub fn fail_once(&self, op: &'static str, err: ClientError) {
        self.failures.lock().unwrap().insert(op, err);
    }

    /// Todos los `get_project` fallan con `err` hasta limpiarlo.
    pub fn fail_gets(&self, err: Option<ClientError>) {
        *self.sticky_get_error.lock().unwrap() = err;
    }

    pub fn set_export_link(&self, link: ExportLink) {
        *self.export_link.lock().unwrap() = link;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, op: &'static str, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn launch(&self, project_id: &str) -> Result<TaskLaunch> {
        let launch = self.launches.lock().unwrap().pop_front().unwrap_or_else(|| {
            let mut n = self.next_id.lock().unwrap();
            *n += 1;
            Ok(TaskLaunch::task(format!("t{}", *n)))
        })?;
        if let Some(task_id) = &launch.task_id {
            self.task_projects
                .lock()
                .unwrap()
                .insert(task_id.clone(), project_id.to_string());
        }
        Ok(launch)
    }

    fn existing(&self, project_id: &str) -> Result<()> {
        if self.projects.lock().unwrap().contains_key(project_id) {
            Ok(())
        } else {
            Err(ClientError::Api {
                status: 404,
                message: Some("Project not found".into()),
            })
        }
    }

    fn edit_page(&self, project_id: &str, page_id: &str, f: impl FnOnce(&mut Page)) {
        self.edit_project(project_id, |p| {
            if let Some(page) = p.pages.iter_mut().find(|pg| pg.id == page_id) {
                f(page);
            }
        });
    }
}

#[async_trait]
impl ProjectApi for FakeApi {
    async fn create_project(&self, req: &CreateProjectRequest) -> Result<ProjectCreated> {
        self.record("create_project", Call::CreateProject(req.clone()))?;
        let id = {
            let mut n = self.next_id.lock().unwrap();
            *n += 1;
            format!("proj-{}", *n)
        };
        let mut project = Project::new(id.clone());
        project.idea_prompt = req.idea_prompt.clone();
        project.outline_text = req.outline_text.clone();
        project.description_text = req.description_text.clone();
        project.template_style = req.template_style.clone();
        self.put_project(project);
        Ok(ProjectCreated {
            project_id: Some(id),
            status: None,
        })
    }

    async fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.record("get_project", Call::GetProject(project_id.to_string()))?;
        if let Some(err) = self.sticky_get_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.existing(project_id)?;
        Ok(self.project(project_id))
    }

    async fn list_projects(&self, limit: u32, offset: u32) -> Result<ProjectList> {
        self.record("list_projects", Call::ListProjects)?;
        let projects: Vec<Project> = self
            .projects
            .lock()
            .unwrap()
            .values()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(ProjectList {
            total: Some(projects.len() as u32),
            projects,
        })
    }

    async fn update_project(&self, project_id: &str, update: &ProjectUpdate) -> Result<()> {
        self.record("update_project", Call::UpdateProject(update.clone()))?;
        self.existing(project_id)?;
        let update = update.clone();
        self.edit_project(project_id, move |p| {
            if update.idea_prompt.is_some() {
                p.idea_prompt = update.idea_prompt;
            }
            if update.extra_requirements.is_some() {
                p.extra_requirements = update.extra_requirements;
            }
            if update.template_style.is_some() {
                p.template_style = update.template_style;
            }
        });
        Ok(())
    }

    async fn delete_project(&self, project_id: &str) -> Result<()> {
        self.record("delete_project", Call::DeleteProject(project_id.to_string()))?;
        self.existing(project_id)?;
        self.projects.lock().unwrap().remove(project_id);
        Ok(())
    }

    async fn upload_template(&self, project_id: &str, template: &TemplateUpload) -> Result<()> {
        self.record("upload_template", Call::UploadTemplate(template.file_name.clone()))?;
        let path = format!("/files/{project_id}/template/{}", template.file_name);
        self.edit_project(project_id, |p| p.template_image_path = Some(path));
        Ok(())
    }

    async fn add_page(&self, project_id: &str, page: &NewPage) -> Result<Option<Page>> {
        self.record("add_page", Call::AddPage(page.clone()))?;
        self.existing(project_id)?;
        let mut new = Page::new(format!("page-{}", page.order_index), page.order_index);
        new.outline_content = Some(page.outline_content.clone());
        let created = new.clone();
        self.edit_project(project_id, |p| p.pages.push(new));
        Ok(Some(created))
    }

    async fn delete_page(&self, project_id: &str, page_id: &str) -> Result<()> {
        self.record("delete_page", Call::DeletePage(page_id.to_string()))?;
        self.edit_project(project_id, |p| p.pages.retain(|pg| pg.id != page_id));
        Ok(())
    }

    async fn update_page(&self, project_id: &str, page_id: &str, fields: &PageFields) -> Result<()> {
        self.record("update_page", Call::UpdatePage(page_id.to_string(), fields.clone()))?;
        let part = fields.part.clone();
        self.edit_page(project_id, page_id, |pg| pg.part = part);
        Ok(())
    }

    async fn update_page_outline(
        &self,
        project_id: &str,
        page_id: &str,
        outline: &OutlineContent,
    ) -> Result<()> {
        self.record(
            "update_page_outline",
            Call::UpdateOutline(page_id.to_string(), outline.clone()),
        )?;
        let outline = outline.clone();
        self.edit_page(project_id, page_id, |pg| pg.outline_content = Some(outline));
        Ok(())
    }

    async fn update_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        description: &DescriptionContent,
    ) -> Result<()> {
        self.record(
            "update_page_description",
            Call::UpdateDescription(page_id.to_string(), description.clone()),
        )?;
        let description = description.clone();
        self.edit_page(project_id, page_id, |pg| {
            pg.description_content = Some(description);
        });
        Ok(())
    }

    async fn update_pages_order(&self, project_id: &str, page_ids: &[String]) -> Result<()> {
        self.record("update_pages_order", Call::Reorder(page_ids.to_vec()))?;
        let order = page_ids.to_vec();
        self.edit_project(project_id, |p| {
            p.pages.sort_by_key(|pg| order.iter().position(|id| id == &pg.id).unwrap_or(usize::MAX));
        });
        Ok(())
    }

    async fn generate_outline(&self, project_id: &str) -> Result<()> {
        self.record("generate_outline", Call::GenerateOutline)?;
        self.existing(project_id)?;
        self.edit_project(project_id, |p| {
            let idea = p.idea_prompt.clone().unwrap_or_default();
            p.pages = (0..3)
                .map(|i| {
                    let mut page = Page::new(format!("{}-p{}", p.id, i + 1), i);
                    page.outline_content = Some(OutlineContent {
                        title: format!("{idea} #{}", i + 1),
                        points: vec!["punto".into()],
                    });
                    page
                })
                .collect();
        });
        Ok(())
    }

    async fn generate_from_description(
        &self,
        project_id: &str,
        description_text: Option<&str>,
    ) -> Result<()> {
        self.record(
            "generate_from_description",
            Call::GenerateFromDescription(description_text.map(str::to_string)),
        )?;
        self.existing(project_id)
    }

    async fn generate_descriptions(&self, project_id: &str) -> Result<TaskLaunch> {
        self.record("generate_descriptions", Call::GenerateDescriptions)?;
        self.launch(project_id)
    }

    async fn generate_page_description(
        &self,
        project_id: &str,
        page_id: &str,
        force_regenerate: bool,
    ) -> Result<TaskLaunch> {
        self.record(
            "generate_page_description",
            Call::GeneratePageDescription(page_id.to_string(), force_regenerate),
        )?;
        self.launch(project_id)
    }

    async fn generate_images(&self, project_id: &str, page_ids: Option<&[String]>) -> Result<TaskLaunch> {
        self.record(
            "generate_images",
            Call::GenerateImages(page_ids.map(<[String]>::to_vec)),
        )?;
        self.launch(project_id)
    }

    async fn edit_page_image(
        &self,
        project_id: &str,
        page_id: &str,
        req: &EditImageRequest,
    ) -> Result<TaskLaunch> {
        self.record(
            "edit_page_image",
            Call::EditImage(page_id.to_string(), req.edit_instruction.clone()),
        )?;
        self.launch(project_id)
    }

    async fn get_task_status(&self, project_id: &str, task_id: &str) -> Result<Option<TaskInfo>> {
        self.record("get_task_status", Call::TaskStatus(task_id.to_string()))?;
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(VecDeque::pop_front);
        let Some(step) = step else {
            return Ok(Some(TaskInfo::new(TaskStatus::Completed)));
        };
        if let Some(effect) = step.effect {
            self.edit_project(project_id, effect);
        }
        step.reply
    }

    async fn export_pptx(&self, _project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink> {
        self.record("export_pptx", Call::ExportPptx(page_ids.map(<[String]>::to_vec)))?;
        Ok(self.export_link.lock().unwrap().clone())
    }

    async fn export_pdf(&self, _project_id: &str, page_ids: Option<&[String]>) -> Result<ExportLink> {
        self.record("export_pdf", Call::ExportPdf(page_ids.map(<[String]>::to_vec)))?;
        Ok(self.export_link.lock().unwrap().clone())
    }

    async fn export_editable_pptx(
        &self,
        project_id: &str,
        _filename: Option<&str>,
        page_ids: Option<&[String]>,
    ) -> Result<TaskLaunch> {
        self.record(
            "export_editable_pptx",
            Call::ExportEditable(page_ids.map(<[String]>::to_vec)),
        )?;
        self.launch(project_id)
    }
}

/* --------- armado --------- */

pub fn fast_config() -> StoreConfig {
    StoreConfig {
        poll_interval: Duration::from_secs(2),
        description_initial_delay: Duration::from_secs(2),
        debounce: Duration::from_millis(1000),
        flush_slack: Duration::from_millis(500),
        poll_transport_retries: 0,
    }
}

pub struct Harness {
    pub api: Arc<FakeApi>,
    pub storage: Arc<MemoryStore>,
    pub opener: Arc<CollectingOpener>,
    pub store: ProjectStore,
}

impl Harness {
    pub fn new(api: Arc<FakeApi>) -> Self {
        Self::with_config(api, fast_config())
    }

    pub fn with_config(api: Arc<FakeApi>, config: StoreConfig) -> Self {
        let storage = Arc::new(MemoryStore::new());
        let opener = Arc::new(CollectingOpener::new());
        let store = ProjectStore::new(api.clone(), storage.clone(), opener.clone(), config);
        Harness {
            api,
            storage,
            opener,
            store,
        }
    }

    /// Harness con el proyecto ya cargado como actual.
    pub async fn loaded(project: Project) -> Self {
        let id = project.id.clone();
        let h = Harness::new(FakeApi::with_project(project));
        h.store.sync_project(Some(&id)).await.unwrap();
        h.api.clear_calls();
        h
    }
}

pub fn page(id: &str, idx: u32, title: &str) -> Page {
    let mut page = Page::new(id, idx);
    page.outline_content = Some(OutlineContent {
        title: title.to_string(),
        points: vec![],
    });
    page
}

pub fn described(mut page: Page, text: &str) -> Page {
    page.description_content = Some(DescriptionContent::text(text));
    page
}

/// Proyecto con páginas p1..pn sin descripción.
pub fn project_with_pages(id: &str, n: u32) -> Project {
    let mut project = Project::new(id);
    project.pages = (1..=n).map(|i| page(&format!("p{i}"), i - 1, &format!("Página {i}"))).collect();
    project
}

pub fn ids(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}
