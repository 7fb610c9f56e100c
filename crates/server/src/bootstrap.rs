//! Administrator initialization.

use anyhow::{Context, Result};
use coffer_core::config::AdminConfig;
use coffer_service::{AdminBootstrap, UserService};

/// Ensure the configured administrator exists and holds admin rights.
///
/// An existing account keeps its password: the configured hash is only used
/// when the account is created.
pub async fn ensure_admin(users: &UserService, config: Option<&AdminConfig>) -> Result<()> {
    let Some(admin) = config else {
        tracing::debug!("No administrator configured");
        return Ok(());
    };

    let outcome = users
        .ensure_admin(admin)
        .await
        .with_context(|| format!("failed to bootstrap administrator {}", admin.name))?;

    match outcome {
        AdminBootstrap::Created => tracing::info!(user = %admin.name, "Administrator created"),
        AdminBootstrap::Promoted => {
            tracing::info!(user = %admin.name, "Existing user promoted to administrator")
        }
        AdminBootstrap::Unchanged => {
            tracing::debug!(user = %admin.name, "Administrator already present")
        }
    }
    Ok(())
}
