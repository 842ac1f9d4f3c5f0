//! Single write path shared by every model.
//!
//! [`save`] wraps a model and any children it stages inside one database
//! transaction, running the pre-persist hooks before the commit and the
//! post-commit hooks after it. Pre-persist hook failures roll the whole
//! write back; post-commit hook failures are reported but can no longer
//! undo the committed rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{DatabaseTransaction, TransactionTrait};
use tracing::{debug, warn};

use crate::application::engine::Engine;
use crate::domain::errors::WalletError;
use crate::infrastructure::persistence::error::DbError;

/// A model that can travel through the save pipeline.
///
/// `before_*` hooks run inside the open transaction (every query they
/// issue goes through it) and may stage child models (picked up through
/// [`Persistable::take_children`]) to be written atomically with the
/// root. `after_*` hooks run once the transaction has committed; they
/// must tolerate being the last thing that happens.
#[async_trait]
pub trait Persistable: Send {
    fn model_name(&self) -> &'static str;

    fn record_id(&self) -> String;

    /// Whether this struct represents a row that does not exist yet.
    fn is_new(&self) -> bool;

    fn mark_not_new(&mut self);

    /// Set created/updated timestamps just before the row is written.
    fn stamp(&mut self, created: bool, at: DateTime<Utc>);

    async fn before_creating(
        &mut self,
        _engine: &Engine,
        _txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        Ok(())
    }

    async fn before_updating(
        &mut self,
        _engine: &Engine,
        _txn: &DatabaseTransaction,
    ) -> Result<(), WalletError> {
        Ok(())
    }

    async fn after_created(&mut self, _engine: &Engine) -> Result<(), WalletError> {
        Ok(())
    }

    async fn after_updated(&mut self, _engine: &Engine) -> Result<(), WalletError> {
        Ok(())
    }

    /// Child models staged by the before hooks, drained so they are only
    /// persisted once.
    fn take_children(&mut self) -> Vec<Box<dyn Persistable>> {
        Vec::new()
    }

    /// Write the row inside the given transaction (INSERT when new,
    /// UPDATE otherwise).
    async fn persist(&self, txn: &DatabaseTransaction) -> Result<(), DbError>;
}

/// Persist a model and everything it stages in one atomic write.
pub async fn save<M>(engine: &Engine, model: &mut M) -> Result<(), WalletError>
where
    M: Persistable + ?Sized,
{
    let root_created = model.is_new();
    debug!(
        model = model.model_name(),
        id = %model.record_id(),
        created = root_created,
        "saving model"
    );

    // Dropping the transaction without committing rolls it back, so every
    // early return below leaves the database untouched.
    let txn = engine
        .pool()
        .connection()
        .begin()
        .await
        .map_err(DbError::from)?;

    if root_created {
        model.before_creating(engine, &txn).await?;
    } else {
        model.before_updating(engine, &txn).await?;
    }

    // Children are collected after the root hook since that is where they
    // get staged.
    let mut children = model.take_children();
    let mut child_created = Vec::with_capacity(children.len());
    for child in children.iter_mut() {
        let created = child.is_new();
        child_created.push(created);
        if created {
            child.before_creating(engine, &txn).await?;
        } else {
            child.before_updating(engine, &txn).await?;
        }
    }

    let now = Utc::now();
    model.stamp(root_created, now);
    model.persist(&txn).await?;
    for (child, &created) in children.iter_mut().zip(child_created.iter()) {
        child.stamp(created, now);
        child.persist(&txn).await?;
    }

    txn.commit().await.map_err(DbError::from)?;

    if root_created {
        model.mark_not_new();
    }
    for (child, &created) in children.iter_mut().zip(child_created.iter()) {
        if created {
            child.mark_not_new();
        }
    }

    // The rows are committed at this point; collect every post-commit
    // failure into one error instead of aborting at the first.
    let mut after_err: Option<WalletError> = None;

    let root_result = if root_created {
        model.after_created(engine).await
    } else {
        model.after_updated(engine).await
    };
    record_after_error(&mut after_err, model.model_name(), root_result);

    for (child, &created) in children.iter_mut().zip(child_created.iter()) {
        let result = if created {
            child.after_created(engine).await
        } else {
            child.after_updated(engine).await
        };
        record_after_error(&mut after_err, child.model_name(), result);
    }

    match after_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn record_after_error(
    acc: &mut Option<WalletError>,
    model_name: &str,
    result: Result<(), WalletError>,
) {
    if let Err(err) = result {
        warn!(model = model_name, error = %err, "post-commit hook failed");
        *acc = Some(match acc.take() {
            None => err,
            Some(prev) => WalletError::PostCommit(format!("{}; {}", prev, err)),
        });
    }
}
