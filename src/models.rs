use std::sync::Arc;

use crate::schedule::service::RecordLifecycleService;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub records: Arc<RecordLifecycleService>,
}

/* -------------------------
   API envelopes
--------------------------*/

#[derive(Debug, serde::Serialize)]
pub struct ApiOk<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiOk<T> {
    pub fn new(data: T) -> Self {
        ApiOk {
            success: true,
            data,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct ApiMessage {
    pub success: bool,
    pub message: String,
}
