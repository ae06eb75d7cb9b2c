mod health;
mod scan;

pub use health::{health_check, HealthData};
pub use scan::scan_image;
