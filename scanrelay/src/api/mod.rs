mod extractors;
mod handlers;
mod routes;
mod state;

pub use extractors::{ImageUpload, IMAGE_FIELD};
pub use handlers::HealthData;
pub use routes::create_router;
pub use state::AppState;
