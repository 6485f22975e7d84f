//! Sequential code allocator
//!
//! Codes look like `GRN-42`: a prefix plus a counter scoped to
//! (company, shop, prefix). The counter is an atomic increment inside the
//! caller's unit of work, so a rolled-back receipt does not consume a code.

use std::sync::Arc;

use chrono::Utc;

use super::AuditLog;
use crate::error::{AppError, AppResult};
use crate::models::{code_prefix, format_code, IssuedCode};
use crate::store::{InventoryStore, UnitOfWork};

#[derive(Clone)]
pub struct CodeAllocator {
    store: Arc<dyn InventoryStore>,
    audit: AuditLog,
}

impl CodeAllocator {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self {
            audit: AuditLog::new(store.clone()),
            store,
        }
    }

    /// Allocate the next code inside an existing unit of work
    pub async fn allocate_in(
        &self,
        uow: &mut dyn UnitOfWork,
        company_id: &str,
        shop_id: &str,
        created_by: &str,
        description: &str,
    ) -> AppResult<IssuedCode> {
        shared::validate_code_prefix(description).map_err(|message| AppError::Validation {
            field: "description".to_string(),
            message: message.to_string(),
        })?;
        let prefix = code_prefix(description);

        let value = uow.next_code_value(company_id, shop_id, prefix).await?;
        let issued = IssuedCode {
            company_id: company_id.to_string(),
            shop_id: shop_id.to_string(),
            prefix: prefix.to_string(),
            value,
            code: format_code(prefix, value),
            description: description.to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        };
        uow.record_code(&issued).await?;

        Ok(issued)
    }

    /// Allocate a code in its own unit of work
    pub async fn allocate(
        &self,
        company_id: &str,
        shop_id: &str,
        created_by: &str,
        description: &str,
    ) -> AppResult<String> {
        let mut uow = self.store.begin().await?;
        let issued = self
            .allocate_in(uow.as_mut(), company_id, shop_id, created_by, description)
            .await?;
        uow.commit().await?;

        self.record_issued(&issued).await;
        Ok(issued.code)
    }

    /// Audit a committed code
    pub async fn record_issued(&self, issued: &IssuedCode) {
        self.audit
            .record(
                &issued.company_id,
                &issued.shop_id,
                &issued.created_by,
                &format!("New code number generated: {}", issued.code),
            )
            .await;
    }

    /// Codes issued so far for a prefix, oldest first
    pub async fn history(
        &self,
        company_id: &str,
        shop_id: &str,
        prefix: &str,
    ) -> AppResult<Vec<IssuedCode>> {
        let mut codes = self
            .store
            .list_issued_codes(company_id, shop_id, prefix)
            .await?;
        codes.sort_by_key(|c| c.value);
        Ok(codes)
    }
}
