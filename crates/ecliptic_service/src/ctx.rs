//! Request context.

use ecliptic_catalog::Catalog;
use ecliptic_fault::Result;

/// Caller context: every catalog access inside a controller is scoped to
/// `organization_id`. Built from a session (UI surface) or from an MCP key.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub organization_id: String,
    /// Language for external error messages, `en` by default.
    pub locale: String,
}

impl Ctx {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            locale: ecliptic_fault::DEFAULT_LOCALE.to_string(),
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = locale.into();
        self
    }

    /// Resolve a session id to its pinned active organization.
    pub async fn from_session(catalog: &Catalog, session_id: &str) -> Result<Self> {
        let session = catalog.session(session_id).await?;
        Ok(Self::new(session.active_organization_id))
    }
}
