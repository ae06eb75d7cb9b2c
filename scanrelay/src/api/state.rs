use std::sync::Arc;

use crate::config::Config;
use crate::scan::Scanner;
use crate::vertex::InferenceHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scanner: Scanner,
}

impl AppState {
    pub fn new(config: Config, handle: Arc<InferenceHandle>) -> Self {
        let scanner = Scanner::new(handle, &config);
        Self {
            config: Arc::new(config),
            scanner,
        }
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }
}
