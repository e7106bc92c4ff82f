//! Record provisioning: identifier allocation plus adaptive insert.
//!
//! Each provisioned record runs in one transaction: discover the target
//! table's live columns, mint the next role identifier from the configured
//! sequence sources, then write the record through the adaptive writer.
//! The minted identifier rides along in the initial insert when the target
//! table has a column for it; otherwise callers can backfill it later with
//! [`crate::adaptive_writer::update_where`].

use std::time::Instant;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};

use registra_core::{
    identifier, BatchProvisionOutcome, Error, FieldCandidate, ProvisionOutcome, ProvisionRequest,
    ProvisioningRepository, Result, SkippedRecord,
};

use crate::adaptive_writer;
use crate::identifiers::PgIdentifierAllocator;
use crate::schema_catalog::PgSchemaCatalog;

/// Transactional provisioning against PostgreSQL.
pub struct PgProvisioningRepository {
    pool: PgPool,
}

impl PgProvisioningRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Provision one record inside an already-open transaction.
    ///
    /// A missing target table is fatal here: unlike probe sites, the insert
    /// target has to exist for provisioning to mean anything.
    pub async fn provision_tx(
        tx: &mut Transaction<'_, Postgres>,
        request: &ProvisionRequest,
    ) -> Result<ProvisionOutcome> {
        let columns = PgSchemaCatalog::columns_of_tx(tx, &request.table).await?;

        let epoch = request.epoch.unwrap_or_else(identifier::current_epoch);
        let minted =
            PgIdentifierAllocator::next_id_tx(tx, &request.prefix, epoch, &request.sources).await?;

        let mut fields = request.fields.clone();
        if columns.contains(&request.identifier_column) {
            fields.push(FieldCandidate::new(
                &request.identifier_column,
                minted.clone(),
            ));
        }

        let key = adaptive_writer::insert(
            &mut **tx,
            &request.table,
            &columns,
            &fields,
            Some(&request.key_column),
        )
        .await?
        .ok_or_else(|| Error::Internal("insert returned no generated key".to_string()))?;

        Ok(ProvisionOutcome {
            key,
            identifier: minted,
        })
    }
}

#[async_trait]
impl ProvisioningRepository for PgProvisioningRepository {
    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome> {
        let start = Instant::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let outcome = Self::provision_tx(&mut tx, &request).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "provisioning",
            op = "provision",
            table = %request.table,
            identifier = %outcome.identifier,
            user_id = outcome.key,
            duration_ms = start.elapsed().as_millis() as u64,
            "Record provisioned"
        );

        Ok(outcome)
    }

    async fn provision_batch(
        &self,
        requests: Vec<ProvisionRequest>,
    ) -> Result<BatchProvisionOutcome> {
        let mut outcome = BatchProvisionOutcome::default();

        // Records are independent, one transaction each. Rejected writes
        // become skips; anything else aborts the rest of the batch.
        for (index, request) in requests.into_iter().enumerate() {
            match self.provision(request).await {
                Ok(provisioned) => outcome.provisioned.push(provisioned),
                Err(Error::WriteRejected(reason)) => {
                    warn!(
                        subsystem = "db",
                        component = "provisioning",
                        op = "provision_batch",
                        index,
                        reason = %reason,
                        "Record skipped"
                    );
                    outcome.skipped.push(SkippedRecord { index, reason });
                }
                Err(e) => return Err(e),
            }
        }
        crate::pool::log_pool_metrics(&self.pool);

        Ok(outcome)
    }
}
