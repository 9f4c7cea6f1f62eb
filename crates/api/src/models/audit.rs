//! Audit log model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use andes_core::{AuditLogId, UserId};

/// One recorded admin action.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: AuditLogId,
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub changes: serde_json::Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filters for listing the audit log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditFilter {
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub actor: Option<i32>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
