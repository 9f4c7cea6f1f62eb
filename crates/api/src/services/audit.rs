//! Audit trail for admin writes.

use std::fmt::Display;
use std::net::IpAddr;

use sqlx::PgPool;
use tracing::warn;

use andes_core::UserId;

use crate::db::audit::NewAuditEntry;
use crate::db::AuditRepository;

/// Who did something, and from where.
#[derive(Debug, Clone, Default)]
pub struct AuditActor {
    pub user_id: Option<UserId>,
    pub ip_address: Option<String>,
}

impl AuditActor {
    #[must_use]
    pub fn new(user_id: UserId, ip: Option<IpAddr>) -> Self {
        Self {
            user_id: Some(user_id),
            ip_address: ip.map(|ip| ip.to_string()),
        }
    }
}

/// Writes audit entries without ever failing the caller.
pub struct AuditService<'a> {
    repo: AuditRepository<'a>,
}

impl<'a> AuditService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            repo: AuditRepository::new(pool),
        }
    }

    /// Record an action. Failures are logged and dropped.
    pub async fn record(
        &self,
        actor: &AuditActor,
        action: &str,
        entity_type: &str,
        entity_id: impl Display,
        changes: serde_json::Value,
    ) {
        let entry = NewAuditEntry {
            actor_id: actor.user_id,
            action,
            entity_type,
            entity_id: entity_id.to_string(),
            changes,
            ip_address: actor.ip_address.clone(),
        };

        if let Err(e) = self.repo.insert(&entry).await {
            warn!(
                error = %e,
                action,
                entity_type,
                entity_id = %entry.entity_id,
                "Failed to write audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_formats_ip() {
        let actor = AuditActor::new(UserId::new(7), Some(IpAddr::from([203, 0, 113, 5])));
        assert_eq!(actor.user_id, Some(UserId::new(7)));
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.5"));
        assert_eq!(AuditActor::new(UserId::new(7), None).ip_address, None);
    }
}
