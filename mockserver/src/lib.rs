//! Implementación en memoria de la API REST de proyectos. Sirve para probar
//! el cliente de punta a punta: no genera imágenes ni archivos, las tareas
//! avanzan un paso cada vez que se consulta su estado.

pub mod handlers;
pub mod state;

pub use handlers::build_router;
pub use state::{Job, MockState, MockTask};
