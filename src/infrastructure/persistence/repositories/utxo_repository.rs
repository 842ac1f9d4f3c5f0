use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use tracing::debug;

use crate::domain::errors::WalletError;
use crate::domain::models::UtxoPointer;
use crate::infrastructure::persistence::entities::utxos;
use crate::infrastructure::persistence::error::DbError;
use crate::utils;
use crate::utils::scripts::ScriptType;

/// Estimated size in bytes of one signed p2pkh input; reserving an extra
/// input raises the fee the draft will eventually pay by this much.
const P2PKH_INPUT_SIZE: u64 = 148;

/// Repository for unspent output operations, including the contended
/// reservation path used by the draft builder. Methods run against the
/// connection the caller passes (pool or open transaction).
#[derive(Clone)]
pub struct UtxoRepository {
    page_size: u64,
}

impl UtxoRepository {
    pub fn new(page_size: u64) -> Self {
        Self { page_size }
    }

    pub async fn get<C: ConnectionTrait>(
        &self,
        db: &C,
        id: &str,
    ) -> Result<Option<utxos::Model>, DbError> {
        let result = utxos::Entity::find_by_id(id).one(db).await?;
        Ok(result)
    }

    pub async fn get_by_outpoint<C: ConnectionTrait>(
        &self,
        db: &C,
        transaction_id: &str,
        output_index: u32,
    ) -> Result<Option<utxos::Model>, DbError> {
        self.get(db, &utils::utxo_id(transaction_id, output_index)).await
    }

    /// All outputs currently reserved for a draft, in deterministic order.
    pub async fn get_by_draft_id<C: ConnectionTrait>(
        &self,
        db: &C,
        draft_id: &str,
    ) -> Result<Vec<utxos::Model>, DbError> {
        let result = utxos::Entity::find()
            .filter(utxos::Column::DraftId.eq(draft_id))
            .filter(utxos::Column::SpendingTxId.is_null())
            .order_by_asc(utxos::Column::CreatedAt)
            .order_by_asc(utxos::Column::TransactionId)
            .order_by_asc(utxos::Column::OutputIndex)
            .all(db)
            .await?;
        Ok(result)
    }

    /// Outputs of an account with the given script type that are neither
    /// reserved nor spent, minus any outpoints the caller wants excluded.
    pub async fn get_spendable<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
        script_type: ScriptType,
        exclude: &[UtxoPointer],
    ) -> Result<Vec<utxos::Model>, DbError> {
        let mut query = utxos::Entity::find()
            .filter(utxos::Column::XpubId.eq(xpub_id))
            .filter(utxos::Column::ScriptType.eq(script_type.as_str()))
            .filter(utxos::Column::DraftId.is_null())
            .filter(utxos::Column::SpendingTxId.is_null());

        if !exclude.is_empty() {
            let ids: Vec<String> = exclude
                .iter()
                .map(|p| utils::utxo_id(&p.transaction_id, p.output_index))
                .collect();
            query = query.filter(utxos::Column::Id.is_not_in(ids));
        }

        let result = query
            .order_by_asc(utxos::Column::CreatedAt)
            .order_by_asc(utxos::Column::TransactionId)
            .order_by_asc(utxos::Column::OutputIndex)
            .all(db)
            .await?;
        Ok(result)
    }

    /// Reserve enough spendable outputs of `xpub_id` to cover `satoshis`
    /// plus the marginal fee of each claimed input.
    ///
    /// Each candidate is claimed with a conditional UPDATE that only
    /// matches while the row is still free, so two drafts racing for the
    /// same output can never both win it. If the account cannot cover the
    /// target, every output claimed by this call is released again and
    /// [`WalletError::NotEnoughUtxos`] is returned.
    pub async fn reserve_utxos<C: ConnectionTrait>(
        &self,
        db: &C,
        draft_id: &str,
        xpub_id: &str,
        satoshis: u64,
        fee_per_byte: f64,
        from_utxos: Option<&[UtxoPointer]>,
    ) -> Result<Vec<utxos::Model>, WalletError> {
        let restrict_ids: Option<Vec<String>> = from_utxos.map(|pointers| {
            pointers
                .iter()
                .map(|p| utils::utxo_id(&p.transaction_id, p.output_index))
                .collect()
        });

        let mut reserved: Vec<utxos::Model> = Vec::new();
        let mut reserved_satoshis: u64 = 0;
        let mut fee_needed: f64 = 0.0;
        let mut page: u64 = 0;

        'outer: loop {
            let mut query = utxos::Entity::find()
                .filter(utxos::Column::XpubId.eq(xpub_id))
                .filter(utxos::Column::DraftId.is_null())
                .filter(utxos::Column::SpendingTxId.is_null());

            if let Some(ids) = &restrict_ids {
                query = query.filter(utxos::Column::Id.is_in(ids.clone()));
            }

            let candidates = query
                .order_by_asc(utxos::Column::CreatedAt)
                .order_by_asc(utxos::Column::TransactionId)
                .order_by_asc(utxos::Column::OutputIndex)
                .offset(page * self.page_size)
                .limit(self.page_size)
                .all(db)
                .await
                .map_err(DbError::from)?;

            if candidates.is_empty() {
                break;
            }

            let mut claimed_any = false;
            for candidate in candidates {
                if !self.try_claim(db, &candidate.id, draft_id).await? {
                    // Lost the race for this output, move on
                    continue;
                }
                claimed_any = true;

                reserved_satoshis += candidate.satoshis.max(0) as u64;
                fee_needed += fee_per_byte * P2PKH_INPUT_SIZE as f64;
                reserved.push(candidate);

                if reserved_satoshis as f64 >= satoshis as f64 + fee_needed {
                    break 'outer;
                }
            }

            // Claimed rows (ours and rivals') leave the free set, so the
            // next free page starts at offset zero again. Only advance the
            // offset when a whole page yielded nothing.
            if claimed_any {
                page = 0;
            } else {
                page += 1;
            }
        }

        if (reserved_satoshis as f64) < satoshis as f64 + fee_needed {
            debug!(
                draft_id,
                reserved_satoshis, satoshis, "insufficient spendable outputs, releasing claims"
            );
            self.unreserve_utxos(db, draft_id, xpub_id).await?;
            return Err(WalletError::NotEnoughUtxos);
        }

        // Re-read so reservation fields reflect the claim
        let mut claimed = Vec::with_capacity(reserved.len());
        for model in reserved {
            let refreshed = self
                .get(db, &model.id)
                .await?
                .ok_or_else(|| DbError::QueryError(format!("utxo {} disappeared", model.id)))?;
            claimed.push(refreshed);
        }

        Ok(claimed)
    }

    /// Release every unspent reservation a draft holds on an account.
    /// Safe to call any number of times; already-released rows no longer
    /// match the filter.
    pub async fn unreserve_utxos<C: ConnectionTrait>(
        &self,
        db: &C,
        draft_id: &str,
        xpub_id: &str,
    ) -> Result<u64, DbError> {
        let result = utxos::Entity::update_many()
            .col_expr(utxos::Column::DraftId, Expr::value(Option::<String>::None))
            .col_expr(
                utxos::Column::ReservedAt,
                Expr::value(Option::<chrono::DateTime<Utc>>::None),
            )
            .col_expr(utxos::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(utxos::Column::DraftId.eq(draft_id))
            .filter(utxos::Column::XpubId.eq(xpub_id))
            .filter(utxos::Column::SpendingTxId.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    /// Count of unspent rows, used by tests and stats.
    pub async fn count_unspent<C: ConnectionTrait>(
        &self,
        db: &C,
        xpub_id: &str,
    ) -> Result<u64, DbError> {
        let count = utxos::Entity::find()
            .filter(utxos::Column::XpubId.eq(xpub_id))
            .filter(utxos::Column::SpendingTxId.is_null())
            .count(db)
            .await?;
        Ok(count)
    }

    // Conditional claim: the UPDATE only matches while the row is free, so
    // rows_affected tells us whether we won.
    async fn try_claim<C: ConnectionTrait>(
        &self,
        db: &C,
        utxo_id: &str,
        draft_id: &str,
    ) -> Result<bool, DbError> {
        let result = utxos::Entity::update_many()
            .col_expr(utxos::Column::DraftId, Expr::value(Some(draft_id.to_string())))
            .col_expr(utxos::Column::ReservedAt, Expr::value(Some(Utc::now())))
            .col_expr(utxos::Column::UpdatedAt, Expr::value(Some(Utc::now())))
            .filter(utxos::Column::Id.eq(utxo_id))
            .filter(utxos::Column::DraftId.is_null())
            .filter(utxos::Column::SpendingTxId.is_null())
            .exec(db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
