pub mod messages;
pub mod page_status;
pub mod project;
pub mod requests;
pub mod task;

pub use messages::normalize_error_message;
pub use page_status::{derive_page_status, DerivedPageStatus, StatusContext};
pub use project::{
    parse_timestamp, DescriptionContent, OutlineContent, Page, PageId, PageStatus, Project,
    ProjectId, ProjectStage,
};
pub use requests::{
    ApiResponse, ContextImages, CreateKind, CreateProjectRequest, DescriptionUpdate,
    EditImageRequest, ErrorBody, ErrorDetail, ExportLink, ExportRequest, FromDescriptionRequest,
    GenerateImagesRequest, NewPage, OutlineUpdate, PageDescriptionRequest, PageFields,
    ProjectCreated, ProjectList, ProjectUpdate, ReorderRequest, TaskLaunch,
};
pub use task::{TaskId, TaskInfo, TaskProgress, TaskStatus, TaskType};
