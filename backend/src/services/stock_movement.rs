//! Stock movements posted by the selling and stock engines
//!
//! Movements that count toward stock are applied to the ledger in the same
//! unit of work that stores them. Outgoing stock leaves at the entry's
//! current average cost.

use rust_decimal::Decimal;

use super::{enqueue, LedgerService};
use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::models::{
    ConsumedProduct, DomainEventKind, LedgerKey, NewStockMovement, StockDirection, StockIn,
    StockLedgerEntry, StockMovement, StockOut, ZeroStockCostPolicy,
};
use crate::store::{InventoryStore, UnitOfWork};
use std::sync::Arc;

#[derive(Clone)]
pub struct StockMovementService {
    store: Arc<dyn InventoryStore>,
    ledger: LedgerService,
}

impl StockMovementService {
    pub fn new(store: Arc<dyn InventoryStore>, default_minimum_quantity: Decimal) -> Self {
        Self {
            ledger: LedgerService::new(store.clone(), default_minimum_quantity),
            store,
        }
    }

    /// Store a movement and apply its stock effect
    #[tracing::instrument(skip_all, fields(code = %input.transaction_code))]
    pub async fn post_movement(
        &self,
        actor: &AuthUser,
        input: NewStockMovement,
    ) -> AppResult<StockMovement> {
        actor.ensure_company(&input.company_id)?;
        validate(&input)?;

        let scope = (input.company_id.as_str(), input.shop_id.as_str());
        let counts = input.status.counts_toward_stock();
        let mut uow = self.store.begin().await?;

        if counts {
            if let (Some(product_id), Some(category_id)) =
                (input.product_id.as_deref(), input.category_id.as_deref())
            {
                let key = LedgerKey::new(scope.0, scope.1, category_id, product_id);
                let (event, entry) = self.apply_direct(uow.as_mut(), &key, &input).await?;
                enqueue(uow.as_mut(), event, scope, &entry).await?;
            }
        }

        let mut consumed = Vec::with_capacity(input.consumed.len());
        for line in &input.consumed {
            let key = LedgerKey::new(scope.0, scope.1, &line.category_id, &line.product_id);
            let current_wac = if counts {
                let entry = self.take_component(uow.as_mut(), &key, line.quantity, &input).await?;
                enqueue(uow.as_mut(), DomainEventKind::UpdateInventory, scope, &entry).await?;
                entry.weighted_average_cost
            } else {
                Decimal::ZERO
            };

            consumed.push(ConsumedProduct {
                product_id: line.product_id.clone(),
                quantity: line.quantity,
                current_wac,
            });
        }

        let movement = uow
            .insert_movement(StockMovement {
                id: 0,
                company_id: input.company_id.clone(),
                shop_id: input.shop_id.clone(),
                transaction_code: input.transaction_code.clone(),
                movement_type: input.movement_type,
                direction: input.direction,
                status: input.status,
                product_id: input.product_id.clone(),
                product_quantity: input.product_quantity,
                consumed,
                transaction_date_time: input.transaction_date_time,
                created_by: input.created_by.clone(),
            })
            .await?;
        enqueue(uow.as_mut(), DomainEventKind::NewStockMovement, scope, &movement).await?;
        uow.commit().await?;

        tracing::info!(
            "{} movement {} posted ({})",
            movement.movement_type.as_str(),
            movement.transaction_code,
            movement.status.as_str()
        );

        Ok(movement)
    }

    /// Move the directly named product: out at its current cost, in at the
    /// posted unit cost
    async fn apply_direct(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &LedgerKey,
        input: &NewStockMovement,
    ) -> AppResult<(DomainEventKind, StockLedgerEntry)> {
        match input.direction {
            StockDirection::Out => {
                let current = uow.lock_ledger_entry(key).await?.ok_or_else(|| {
                    AppError::InsufficientStock {
                        product_id: key.product_id.clone(),
                        available: Decimal::ZERO,
                        requested: input.product_quantity,
                    }
                })?;
                let entry = self
                    .issue(uow, key, input.product_quantity, current.weighted_average_cost)
                    .await?;
                Ok((DomainEventKind::UpdateInventory, entry))
            }
            StockDirection::In => {
                let change = self
                    .ledger
                    .receive(
                        uow,
                        key,
                        StockIn {
                            quantity: input.product_quantity,
                            unit_cost: input.unit_cost,
                            supplier_id: None,
                        },
                        &input.created_by,
                    )
                    .await?;
                Ok((change.event(), change.entry))
            }
        }
    }

    /// Consumed components must already be stocked; they move at their
    /// current cost in either direction
    async fn take_component(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &LedgerKey,
        quantity: Decimal,
        input: &NewStockMovement,
    ) -> AppResult<StockLedgerEntry> {
        let current = uow
            .lock_ledger_entry(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory for {}", key)))?;
        let cost = current.weighted_average_cost;

        match input.direction {
            StockDirection::Out => self.issue(uow, key, quantity, cost).await,
            StockDirection::In => {
                let change = self
                    .ledger
                    .receive(
                        uow,
                        key,
                        StockIn {
                            quantity,
                            unit_cost: cost,
                            supplier_id: None,
                        },
                        &input.created_by,
                    )
                    .await?;
                Ok(change.entry)
            }
        }
    }

    async fn issue(
        &self,
        uow: &mut dyn UnitOfWork,
        key: &LedgerKey,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> AppResult<StockLedgerEntry> {
        self.ledger
            .issue(
                uow,
                key,
                StockOut {
                    quantity,
                    unit_cost,
                },
                ZeroStockCostPolicy::HoldPrevious,
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Inventory for {}", key)))
    }
}

fn invalid(field: &str, message: &str) -> AppError {
    AppError::Validation {
        field: field.to_string(),
        message: message.to_string(),
    }
}

fn validate(input: &NewStockMovement) -> AppResult<()> {
    shared::validate_identifier(&input.company_id).map_err(|m| invalid("company_id", m))?;
    shared::validate_identifier(&input.shop_id).map_err(|m| invalid("shop_id", m))?;
    shared::validate_identifier(&input.transaction_code)
        .map_err(|m| invalid("transaction_code", m))?;

    if input.product_id.is_none() && input.consumed.is_empty() {
        return Err(invalid(
            "product_id",
            "A movement needs a product or consumed products",
        ));
    }

    if let Some(product_id) = input.product_id.as_deref() {
        shared::validate_identifier(product_id).map_err(|m| invalid("product_id", m))?;
        let category_id = input.category_id.as_deref().unwrap_or_default();
        shared::validate_identifier(category_id).map_err(|m| invalid("category_id", m))?;
        shared::validate_quantity(input.product_quantity)
            .map_err(|m| invalid("product_quantity", m))?;
        shared::validate_unit_cost(input.unit_cost).map_err(|m| invalid("unit_cost", m))?;
    }

    for line in &input.consumed {
        shared::validate_identifier(&line.category_id)
            .map_err(|m| invalid("consumed.category_id", m))?;
        shared::validate_identifier(&line.product_id)
            .map_err(|m| invalid("consumed.product_id", m))?;
        shared::validate_quantity(line.quantity).map_err(|m| invalid("consumed.quantity", m))?;
    }

    Ok(())
}
