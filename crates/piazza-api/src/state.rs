use std::sync::Arc;

use piazza_db::Database;
use piazza_gateway::Broadcaster;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    /// Injected realtime fan-out capability. Handlers never reach for a
    /// transport through ambient state.
    pub broadcaster: Arc<dyn Broadcaster>,
}
