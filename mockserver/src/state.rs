// mockserver/src/state.rs

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use common::{
    DescriptionContent, PageId, PageStatus, Project, ProjectId, TaskId, TaskInfo, TaskProgress,
    TaskStatus, TaskType,
};

/// Qué hace una tarea en cada paso.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Descriptions,
    Images,
    EditImage,
    ExportEditable,
}

impl Job {
    pub fn task_type(self) -> TaskType {
        match self {
            Job::Descriptions => TaskType::GenerateDescriptions,
            Job::Images => TaskType::GenerateImages,
            Job::EditImage => TaskType::EditPageImage,
            Job::ExportEditable => TaskType::ExportEditablePptx,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockTask {
    pub project_id: ProjectId,
    pub job: Job,
    pub info: TaskInfo,
    /// Páginas que faltan procesar, en orden.
    pub remaining: Vec<PageId>,
    pub total: u32,
    pub filename: Option<String>,
}

impl MockTask {
    pub fn new(project_id: &str, job: Job, pages: Vec<PageId>) -> Self {
        let mut info = TaskInfo::new(TaskStatus::Pending);
        info.task_id = Some(uuid::Uuid::new_v4().to_string());
        info.task_type = Some(job.task_type());
        info.created_at = Some(Utc::now());

        MockTask {
            project_id: project_id.to_string(),
            job,
            info,
            total: pages.len() as u32,
            remaining: pages,
            filename: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.info.task_id.clone().unwrap_or_default()
    }

    /// Un paso por consulta: PENDING pasa a PROCESSING, cada consulta en
    /// PROCESSING procesa una página, y sin páginas pendientes se completa.
    pub fn advance(&mut self, project: Option<&mut Project>) {
        if self.info.status.is_terminal() {
            return;
        }

        let Some(project) = project else {
            self.info.status = TaskStatus::Failed;
            self.info.error_message = Some("Project not found".to_string());
            return;
        };

        let was_pending = self.info.status == TaskStatus::Pending;
        self.info.status = TaskStatus::Processing;

        if self.remaining.is_empty() {
            if !was_pending {
                self.complete(project);
            }
            return;
        }

        let page_id = self.remaining.remove(0);
        apply(self.job, project, &page_id);
        project.updated_at = Some(Utc::now());

        let done = self.total - self.remaining.len() as u32;
        self.info.progress = Some(TaskProgress {
            current_step: Some(format!("page {page_id}")),
            ..TaskProgress::counts(self.total, done)
        });
    }

    fn complete(&mut self, project: &Project) {
        self.info.status = TaskStatus::Completed;
        self.info.completed_at = Some(Utc::now());

        let mut progress = self
            .info
            .progress
            .take()
            .unwrap_or_else(|| TaskProgress::counts(self.total, self.total));
        if self.job == Job::ExportEditable {
            let name = self.filename.as_deref().unwrap_or("presentation");
            progress.download_url = Some(format!("/files/{}/exports/{}.pptx", project.id, name));
        }
        self.info.progress = Some(progress);
    }
}

fn apply(job: Job, project: &mut Project, page_id: &str) {
    let project_id = project.id.clone();
    let Some(page) = project.pages.iter_mut().find(|p| p.id == page_id) else {
        // la página se borró mientras tanto
        return;
    };

    match job {
        Job::Descriptions => {
            let title = page.title().unwrap_or("Untitled").to_string();
            page.description_content = Some(DescriptionContent::text(format!("Contenido de {title}")));
            page.status = PageStatus::DescriptionGenerated;
        }
        Job::Images | Job::EditImage => {
            let version = Utc::now().timestamp_millis();
            page.generated_image_path = Some(format!(
                "/files/{}/pages/{}.png?v={}",
                project_id, page.id, version
            ));
            page.status = PageStatus::Completed;
        }
        Job::ExportEditable => {}
    }
    page.updated_at = Some(Utc::now());
}

#[derive(Clone, Default)]
pub struct MockState {
    pub projects: Arc<Mutex<HashMap<ProjectId, Project>>>,
    pub tasks: Arc<Mutex<HashMap<TaskId, MockTask>>>,
}

impl MockState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Siempre tomar `projects` antes que `tasks`.
    pub fn projects(&self) -> MutexGuard<'_, HashMap<ProjectId, Project>> {
        self.projects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tasks(&self) -> MutexGuard<'_, HashMap<TaskId, MockTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_project(&self, project: Project) {
        self.projects().insert(project.id.clone(), project);
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.projects().get(id).cloned()
    }

    pub fn task(&self, id: &str) -> Option<MockTask> {
        self.tasks().get(id).cloned()
    }
}
