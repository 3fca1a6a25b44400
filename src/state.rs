use std::sync::Arc;

use crate::{
    config::Config, identity::IdentityBridge, services::grading::Quiz, services::session::Clock,
    store::ContentStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub identity: Arc<dyn IdentityBridge>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    /// The placement quiz served to every learner.
    pub quiz: Arc<Quiz>,
}
