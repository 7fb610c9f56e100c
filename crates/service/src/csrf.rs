//! CSRF tokens for HTML forms.

use crate::error::{ServiceError, ServiceResult};
use coffer_metadata::CsrfRepo;
use std::sync::Arc;

#[derive(Clone)]
pub struct CsrfService {
    csrf: Arc<dyn CsrfRepo>,
}

impl CsrfService {
    pub fn new(csrf: Arc<dyn CsrfRepo>) -> Self {
        Self { csrf }
    }

    /// Issue a token bound to the client address.
    pub async fn issue(&self, ip: &str) -> ServiceResult<String> {
        Ok(self.csrf.issue(ip).await?.token)
    }

    /// Accept a form submission only with a live token issued to `ip`.
    ///
    /// Tokens are not consumed, so a form can be resubmitted until expiry.
    pub async fn verify(&self, ip: &str, token: &str) -> ServiceResult<()> {
        if token.is_empty() || !self.csrf.exists(ip, token).await? {
            tracing::debug!(ip, "rejected csrf token");
            return Err(ServiceError::AccessDenied("invalid csrf token".to_string()));
        }
        Ok(())
    }
}
