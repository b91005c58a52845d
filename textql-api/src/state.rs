use std::sync::Arc;
use textql_agents::Text2SqlAgent;
use textql_core::QueryPipeline;

/// Shared by every worker through `web::Data`.
pub struct AppState {
    pub agent: Arc<Text2SqlAgent>,
    pub pipeline: QueryPipeline,
}

impl AppState {
    pub fn new(agent: Arc<Text2SqlAgent>, pipeline: QueryPipeline) -> Self {
        Self { agent, pipeline }
    }
}
