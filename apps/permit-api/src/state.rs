//! Application state shared by every handler

use std::sync::Arc;

use permit_core::{IdentityVerifier, PermitPipeline};

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PermitPipeline>,
    pub identity: Arc<dyn IdentityVerifier>,
}

impl AppState {
    pub fn new(pipeline: PermitPipeline, identity: Arc<dyn IdentityVerifier>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            identity,
        }
    }

    /// Resolve a bearer token to the user it was issued to.
    pub async fn authenticate(&self, token: &str) -> Result<String, ApiError> {
        match self.identity.verify(token).await {
            Ok(Some(user_id)) => Ok(user_id),
            Ok(None) => Err(ApiError::Unauthorized("Invalid token".to_string())),
            Err(e) => {
                tracing::error!("Token verification failed: {}", e);
                Err(ApiError::Upstream(e.to_string()))
            }
        }
    }
}
