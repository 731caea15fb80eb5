use std::sync::Arc;

use crate::config::HubConfig;
use crate::policy::OriginPolicy;
use crate::state::Circles;

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<HubConfig>,
    circles: Arc<Circles>,
    origins: Arc<OriginPolicy>,
}

impl AppState {
    pub fn new(cfg: HubConfig) -> Self {
        let origins = OriginPolicy::compile(&cfg.hub.allowed_origins);
        Self {
            cfg: Arc::new(cfg),
            circles: Arc::new(Circles::new()),
            origins: Arc::new(origins),
        }
    }

    pub fn cfg(&self) -> &HubConfig {
        &self.cfg
    }

    pub fn circles(&self) -> &Circles {
        &self.circles
    }

    pub fn origins(&self) -> &OriginPolicy {
        &self.origins
    }
}
