use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use client::{
    ClientConfig, CollectingOpener, ExportKind, ExportTaskStore, FileStore, GenerationMarkers,
    HttpApi, PagePatch, ProjectStore, TemplateUpload,
};
use common::{derive_page_status, CreateKind, DescriptionContent, OutlineContent, Project, StatusContext};

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para armar presentaciones contra el servicio")]
struct Cli {
    /// URL base del servicio (pisa PPT_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Directorio del estado local (pisa PPT_STATE_DIR)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crea un proyecto nuevo y lo deja como actual
    Create {
        #[arg(long, group = "source")]
        idea: Option<String>,
        #[arg(long, group = "source")]
        outline: Option<String>,
        #[arg(long, group = "source")]
        description: Option<String>,
        /// Descripción libre del estilo visual
        #[arg(long)]
        style: Option<String>,
        /// Imagen de plantilla
        #[arg(long, value_name = "ARCHIVO")]
        template: Option<PathBuf>,
    },
    /// Lista los proyectos del servidor
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Muestra un proyecto (por defecto el actual) y lo deja como actual
    Show {
        #[arg(value_name = "PROJECT_ID")]
        id: Option<String>,
    },
    /// Borra uno o más proyectos
    Delete {
        #[arg(value_name = "PROJECT_ID", required = true)]
        ids: Vec<String>,
    },
    /// Genera el esquema del proyecto actual
    Outline,
    /// Divide la descripción del proyecto en páginas
    FromDescription,
    /// Genera las descripciones de todas las páginas
    Descriptions,
    /// Regenera la descripción de una página
    Describe {
        #[arg(value_name = "PAGE_ID")]
        page: String,
    },
    /// Genera imágenes (todas las páginas si no se indica ninguna)
    Images {
        #[arg(value_name = "PAGE_ID")]
        pages: Vec<String>,
    },
    /// Edita la imagen de una página con una instrucción
    EditImage {
        #[arg(value_name = "PAGE_ID")]
        page: String,
        #[arg(value_name = "INSTRUCCION")]
        prompt: String,
    },
    /// Cambia el título de una página
    EditTitle {
        #[arg(value_name = "PAGE_ID")]
        page: String,
        title: String,
    },
    /// Reemplaza la descripción de una página
    EditDescription {
        #[arg(value_name = "PAGE_ID")]
        page: String,
        text: String,
    },
    /// Agrega una página vacía al final
    AddPage,
    /// Borra una página
    RemovePage {
        #[arg(value_name = "PAGE_ID")]
        page: String,
    },
    /// Reordena las páginas con el orden dado
    Reorder {
        #[arg(value_name = "PAGE_ID", required = true)]
        pages: Vec<String>,
    },
    /// Exporta el proyecto actual
    Export {
        #[arg(value_enum)]
        format: Format,
        /// Solo estas páginas (separadas por coma)
        #[arg(long, value_delimiter = ',')]
        pages: Option<Vec<String>>,
    },
    /// Historial de exportaciones
    Exports {
        /// Retoma las exportaciones que quedaron en curso
        #[arg(long)]
        restore: bool,
        /// Borra las terminadas
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pptx,
    Pdf,
    Editable,
}

impl From<Format> for ExportKind {
    fn from(f: Format) -> Self {
        match f {
            Format::Pptx => ExportKind::Pptx,
            Format::Pdf => ExportKind::Pdf,
            Format::Editable => ExportKind::EditablePptx,
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut cfg = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        cfg.api_url = url;
    }
    if let Some(dir) = cli.state_dir {
        cfg.state_dir = dir;
    }

    let api = Arc::new(HttpApi::new(cfg.api_url.clone(), cfg.request_timeout)?);
    let storage = Arc::new(FileStore::new(&cfg.state_dir));
    let opener = Arc::new(CollectingOpener::new());
    let store = ProjectStore::new(api.clone(), storage.clone(), opener.clone(), cfg.store.clone());
    let exports = ExportTaskStore::new(api, storage, opener.clone(), cfg.store.clone());

    match cli.command {
        Commands::Create {
            idea,
            outline,
            description,
            style,
            template,
        } => {
            let (kind, content) = match (idea, outline, description) {
                (Some(text), _, _) => (CreateKind::Idea, text),
                (_, Some(text), _) => (CreateKind::Outline, text),
                (_, _, Some(text)) => (CreateKind::Description, text),
                _ => bail!("falta --idea, --outline o --description"),
            };
            let template = match template {
                Some(path) => Some(read_template(&path).await?),
                None => None,
            };
            // el error ya queda en el store; se muestra abajo
            let _ = store
                .initialize_project(kind, &content, template, style.as_deref())
                .await;
        }

        Commands::List { limit, offset } => {
            let list = store.list_projects(limit, offset).await?;
            if list.projects.is_empty() {
                println!("No hay proyectos.");
            }
            for p in &list.projects {
                println!(
                    "{}  {:<40}  {:<14}  {} páginas",
                    p.id,
                    p.title(),
                    p.stage().label(),
                    p.pages.len()
                );
            }
            if let Some(total) = list.total {
                println!("total: {}", total);
            }
            return Ok(());
        }

        Commands::Show { id } => {
            let _ = store.sync_project(id.as_deref()).await;
        }

        Commands::Delete { ids } => {
            store.delete_projects(&ids).await?;
            println!("Borrados: {}", ids.join(", "));
            return Ok(());
        }

        command => {
            if store.persisted_project_id().is_none() {
                bail!("no hay proyecto actual: usá `create` o `show ID` primero");
            }
            let _ = store.sync_project(None).await;
            if store.current_project().is_none() {
                report(&store, &opener);
                bail!("no se pudo cargar el proyecto actual");
            }
            run_on_current(&store, &exports, command).await?;
        }
    }

    store.wait_for_background().await;
    exports.wait_for_background().await;
    report(&store, &opener);
    Ok(())
}

/// Comandos que trabajan sobre el proyecto actual, ya sincronizado.
async fn run_on_current(store: &ProjectStore, exports: &ExportTaskStore, command: Commands) -> Result<()> {
    // los errores de las acciones quedan en el store y se muestran al final
    match command {
        Commands::Outline => {
            let _ = store.generate_outline().await;
        }
        Commands::FromDescription => {
            let _ = store.generate_from_description().await;
        }
        Commands::Descriptions => {
            let _ = store.generate_descriptions().await;
        }
        Commands::Describe { page } => {
            let _ = store.generate_page_description(&page).await;
        }
        Commands::Images { pages } => {
            let pages = (!pages.is_empty()).then_some(pages);
            let _ = store.generate_images(pages.as_deref()).await;
        }
        Commands::EditImage { page, prompt } => {
            let _ = store.edit_page_image(&page, &prompt, None).await;
        }
        Commands::EditTitle { page, title } => {
            let points = store
                .current_project()
                .and_then(|p| p.page(&page).and_then(|pg| pg.outline_content.clone()))
                .map(|o| o.points)
                .unwrap_or_default();
            store.update_page_local(&page, PagePatch::Outline(OutlineContent { title, points }));
            let _ = store.save_all_pages().await;
        }
        Commands::EditDescription { page, text } => {
            store.update_page_local(&page, PagePatch::Description(DescriptionContent::text(text)));
            let _ = store.save_all_pages().await;
        }
        Commands::AddPage => store.add_new_page().await,
        Commands::RemovePage { page } => store.delete_page(&page).await,
        Commands::Reorder { pages } => {
            let _ = store.reorder_pages(&pages).await;
        }
        Commands::Export { format, pages } => {
            let project_id = store
                .current_project_id()
                .context("no hay proyecto actual")?;
            match exports.export(format.into(), &project_id, pages).await {
                Ok(task) => println!("Exportación {} ({}): {}", task.id, task.kind.as_str(), task.status),
                Err(e) => store.set_error(Some(e.friendly())),
            }
        }
        Commands::Exports { restore, clear } => {
            if restore {
                let n = exports.restore_active_tasks();
                println!("Retomadas: {}", n);
                exports.wait_for_background().await;
            }
            if clear {
                println!("Borradas: {}", exports.clear_finished());
            }
            for t in exports.tasks() {
                println!(
                    "{}  {:<13}  {:<10}  {}  {}",
                    t.id,
                    t.kind.as_str(),
                    t.status,
                    t.created_at.format("%Y-%m-%d %H:%M"),
                    t.download_url
                        .as_deref()
                        .or(t.error_message.as_deref())
                        .unwrap_or("-")
                );
            }
        }
        Commands::Create { .. } | Commands::List { .. } | Commands::Show { .. } | Commands::Delete { .. } => {}
    }
    Ok(())
}

async fn read_template(path: &PathBuf) -> Result<TemplateUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("no se pudo leer la plantilla {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template.png".to_string());
    Ok(TemplateUpload { file_name, bytes })
}

fn report(store: &ProjectStore, opener: &CollectingOpener) {
    let state = store.state();

    match &state.current_project {
        Some(project) => print_project(project, &state.markers),
        None => println!("(sin proyecto actual)"),
    }

    for url in opener.urls() {
        println!("Descarga: {}", url);
    }
    if let Some(err) = &state.error {
        eprintln!("Error: {}", err);
    }
}

fn print_project(project: &Project, markers: &GenerationMarkers) {
    println!("Proyecto:");
    println!("  id     : {}", project.id);
    println!("  título : {}", project.title());
    println!("  etapa  : {}", project.stage().label());
    if let Some(status) = &project.status {
        println!("  estado : {}", status);
    }
    if let Some(updated) = project.updated_at {
        println!("  editado: {}", updated.format("%Y-%m-%d %H:%M:%S"));
    }
    println!("  páginas: {}", project.pages.len());

    for (i, page) in project.pages.iter().enumerate() {
        let status = derive_page_status(page, StatusContext::Full);
        let mut flags = String::new();
        if markers.is_description_generating(&page.id) {
            flags.push_str(" [describiendo]");
        }
        if markers.is_image_generating(&page.id) {
            flags.push_str(" [imagen]");
        }
        println!(
            "  {:>2}. {}  {:<30}  {}{}",
            i + 1,
            page.id,
            page.title().unwrap_or("(sin título)"),
            status.label,
            flags
        );
    }
}
