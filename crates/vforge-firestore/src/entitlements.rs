//! Plan entitlement lookup.

use async_trait::async_trait;
use tracing::debug;

use vforge_models::PlanTier;

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;

/// Users collection.
pub const USERS_COLLECTION: &str = "users";

/// Resolves a caller identity to its subscription tier.
#[async_trait]
pub trait EntitlementSource: Send + Sync {
    async fn plan_for(&self, uid: &str) -> FirestoreResult<PlanTier>;
}

#[async_trait]
impl EntitlementSource for FirestoreClient {
    /// `users/{uid}.plan`; missing user or field means free.
    async fn plan_for(&self, uid: &str) -> FirestoreResult<PlanTier> {
        let plan = self
            .get_document(USERS_COLLECTION, uid)
            .await?
            .and_then(|doc| doc.string_field("plan").map(PlanTier::parse))
            .unwrap_or_default();

        debug!(uid = %uid, plan = %plan, "Resolved user plan");
        Ok(plan)
    }
}
