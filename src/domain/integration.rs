use {super::id::IntegrationId, serde::Serialize};

/// A configured SoftPro 360 connection. Managed by an admin workflow
/// elsewhere; read-only here.
#[derive(Debug, Clone, Serialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub organization_id: String,
    pub active: bool,
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
}

impl Integration {
    /// Blank secrets count as unset.
    pub fn webhook_secret(&self) -> Option<&str> {
        self.webhook_secret
            .as_deref()
            .filter(|s| !s.trim().is_empty())
    }
}
