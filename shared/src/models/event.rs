//! Names of the domain events emitted by stock-changing operations

use serde::{Deserialize, Serialize};

/// Domain event names, serialized exactly as clients subscribe to them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainEventKind {
    #[serde(rename = "newGRN")]
    NewGrn,
    #[serde(rename = "newGRNTransaction")]
    NewGrnTransaction,
    #[serde(rename = "cancelGRN")]
    CancelGrn,
    #[serde(rename = "cancelGRNTransaction")]
    CancelGrnTransaction,
    #[serde(rename = "settleGRN")]
    SettleGrn,
    #[serde(rename = "settleGRNTransaction")]
    SettleGrnTransaction,
    #[serde(rename = "updateGRN")]
    UpdateGrn,
    #[serde(rename = "updateGRNTransaction")]
    UpdateGrnTransaction,
    #[serde(rename = "newInventory")]
    NewInventory,
    #[serde(rename = "updateInventory")]
    UpdateInventory,
    #[serde(rename = "reverseInventoryUpdate")]
    ReverseInventoryUpdate,
    #[serde(rename = "newStockMovement")]
    NewStockMovement,
}

impl DomainEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainEventKind::NewGrn => "newGRN",
            DomainEventKind::NewGrnTransaction => "newGRNTransaction",
            DomainEventKind::CancelGrn => "cancelGRN",
            DomainEventKind::CancelGrnTransaction => "cancelGRNTransaction",
            DomainEventKind::SettleGrn => "settleGRN",
            DomainEventKind::SettleGrnTransaction => "settleGRNTransaction",
            DomainEventKind::UpdateGrn => "updateGRN",
            DomainEventKind::UpdateGrnTransaction => "updateGRNTransaction",
            DomainEventKind::NewInventory => "newInventory",
            DomainEventKind::UpdateInventory => "updateInventory",
            DomainEventKind::ReverseInventoryUpdate => "reverseInventoryUpdate",
            DomainEventKind::NewStockMovement => "newStockMovement",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        const ALL: [DomainEventKind; 12] = [
            DomainEventKind::NewGrn,
            DomainEventKind::NewGrnTransaction,
            DomainEventKind::CancelGrn,
            DomainEventKind::CancelGrnTransaction,
            DomainEventKind::SettleGrn,
            DomainEventKind::SettleGrnTransaction,
            DomainEventKind::UpdateGrn,
            DomainEventKind::UpdateGrnTransaction,
            DomainEventKind::NewInventory,
            DomainEventKind::UpdateInventory,
            DomainEventKind::ReverseInventoryUpdate,
            DomainEventKind::NewStockMovement,
        ];
        ALL.into_iter().find(|kind| kind.as_str() == value)
    }
}

impl std::fmt::Display for DomainEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
