use std::sync::Arc;

use crate::config::Config;
use crate::extractor::Extractor;
use crate::jobs::JobRegistry;
use crate::observability::Metrics;
use crate::storage::FileStore;
use crate::worker::JobRunner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub runner: Arc<JobRunner>,
}

impl AppState {
    pub fn new(config: Config, runner: JobRunner) -> Self {
        Self {
            config: Arc::new(config),
            runner: Arc::new(runner),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.runner.context().registry
    }

    pub fn files(&self) -> &Arc<FileStore> {
        &self.runner.context().files
    }

    pub fn extractor(&self) -> &Arc<dyn Extractor> {
        &self.runner.context().extractor
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.runner.context().metrics
    }
}
