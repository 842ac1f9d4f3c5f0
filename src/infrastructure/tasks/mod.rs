use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::domain::models::{DraftStatus, DraftTransaction};
use crate::infrastructure::persistence;

/// One sweep over pending drafts whose expiry has passed. Each one is
/// expired through the save pipeline so its reservations get released by
/// the draft's own lifecycle hook. Returns how many drafts were expired.
pub async fn cleanup_draft_transactions(engine: &Engine) -> Result<usize, WalletError> {
    let expired = engine
        .repositories()
        .draft_transaction
        .list_expired(engine.pool().connection(), Utc::now())
        .await?;

    let mut count = 0;
    for model in expired {
        let mut draft = DraftTransaction::from_entity(model);
        draft.status = DraftStatus::Expired;
        match persistence::save(engine, &mut draft).await {
            Ok(()) => count += 1,
            Err(err) => {
                // Leave it for the next sweep
                warn!(draft_id = %draft.id, error = %err, "failed to expire draft");
            }
        }
    }

    if count > 0 {
        debug!(count, "expired stale draft transactions");
    }
    Ok(count)
}

/// Run the cleanup sweep on a fixed interval until the handle is aborted.
pub fn spawn_draft_cleanup(engine: Engine, interval: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "starting draft cleanup task");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Err(err) = cleanup_draft_transactions(&engine).await {
                warn!(error = %err, "draft cleanup sweep failed");
            }
        }
    })
}
