//! Stock movement reports: report windows, per-product rows and low-stock rows

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{MovementType, ProductInfo, StockLedgerEntry, StockMovement};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportWindowError {
    #[error("start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

/// Years a report may cover; keeps window arithmetic clear of the calendar's limits
pub const REPORT_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn supported(date: NaiveDate) -> Result<NaiveDate, ReportWindowError> {
    if REPORT_YEARS.contains(&date.year()) {
        Ok(date)
    } else {
        Err(ReportWindowError::InvalidDate(date.to_string()))
    }
}

/// Inclusive range of calendar days, interpreted in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ReportWindowError> {
        let (start, end) = (supported(start)?, supported(end)?);
        if start > end {
            return Err(ReportWindowError::StartAfterEnd { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn daily(date: NaiveDate) -> Result<Self, ReportWindowError> {
        Self::new(date, date)
    }

    /// Sunday to Saturday week containing `date`
    pub fn weekly(date: NaiveDate) -> Result<Self, ReportWindowError> {
        let offset = Duration::days(i64::from(date.weekday().num_days_from_sunday()));
        let start = date
            .checked_sub_signed(offset)
            .ok_or_else(|| ReportWindowError::InvalidDate(date.to_string()))?;
        let end = start
            .checked_add_signed(Duration::days(6))
            .ok_or_else(|| ReportWindowError::InvalidDate(date.to_string()))?;
        Self::new(start, end)
    }

    pub fn monthly(year: i32, month: u32) -> Result<Self, ReportWindowError> {
        if !(1..=12).contains(&month) {
            return Err(ReportWindowError::InvalidMonth(month));
        }
        if !REPORT_YEARS.contains(&year) {
            return Err(ReportWindowError::InvalidDate(format!("{}-{:02}", year, month)));
        }
        let start = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| ReportWindowError::InvalidDate(format!("{}-{:02}", year, month)))?;
        let (next_year, next_month) = if month == 12 {
            (year + 1, 1)
        } else {
            (year, month + 1)
        };
        let next = NaiveDate::from_ymd_opt(next_year, next_month, 1).ok_or_else(|| {
            ReportWindowError::InvalidDate(format!("{}-{:02}", next_year, next_month))
        })?;

        Self::new(start, next - Duration::days(1))
    }

    /// First instant of the window
    pub fn starts_at(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::MIN))
    }

    /// First instant after the window
    pub fn ends_before(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.end.and_time(NaiveTime::MIN)) + Duration::days(1)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.starts_at() && at < self.ends_before()
    }
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp
pub fn parse_report_date(value: &str) -> Result<NaiveDate, ReportWindowError> {
    let trimmed = value.trim();
    let date = match NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        Ok(date) => date,
        Err(_) => DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.with_timezone(&Utc).date_naive())
            .map_err(|_| ReportWindowError::InvalidDate(value.to_string()))?,
    };
    supported(date).map_err(|_| ReportWindowError::InvalidDate(value.to_string()))
}

/// In-window movement quantities for one product
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementTotals {
    pub incoming: Decimal,
    pub outgoing: Decimal,
    /// Signed: positive adjustments add stock
    pub adjustments: Decimal,
    pub wastage: Decimal,
    pub returns: Decimal,
}

impl MovementTotals {
    pub fn record(&mut self, movement_type: MovementType, impact: Decimal) {
        match movement_type {
            MovementType::Grn | MovementType::Purchase => self.incoming += impact.abs(),
            MovementType::Sales => self.outgoing += impact.abs(),
            MovementType::Adjustment => self.adjustments += impact,
            MovementType::Wastage => self.wastage += impact.abs(),
            MovementType::Return => self.returns += impact.abs(),
        }
    }

    /// Net change these totals represent
    pub fn net(&self) -> Decimal {
        self.incoming - self.outgoing + self.adjustments - self.wastage + self.returns
    }
}

/// One product's stock movement over a report window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReportRow {
    pub product_id: String,
    pub product_name: String,
    pub category_id: String,
    pub uom: String,
    pub minimum_quantity: Decimal,
    pub beginning_stock: Decimal,
    pub incoming: Decimal,
    pub outgoing: Decimal,
    pub adjustments: Decimal,
    pub wastage: Decimal,
    pub returns: Decimal,
    pub ending_stock: Decimal,
    /// Live ledger quantity at generation time
    pub current_stock: Decimal,
}

impl StockReportRow {
    pub fn totals(&self) -> MovementTotals {
        MovementTotals {
            incoming: self.incoming,
            outgoing: self.outgoing,
            adjustments: self.adjustments,
            wastage: self.wastage,
            returns: self.returns,
        }
    }

    pub fn is_reconciled(&self) -> bool {
        self.ending_stock == self.beginning_stock + self.totals().net()
    }
}

/// Replay `movements` for the entry's product over `window`.
///
/// Opening stock is the live quantity less every movement recorded before
/// the window starts.
pub fn build_report_row(
    entry: &StockLedgerEntry,
    product: &ProductInfo,
    movements: &[StockMovement],
    window: &ReportWindow,
) -> StockReportRow {
    let starts_at = window.starts_at();
    let mut before_start = Decimal::ZERO;
    let mut totals = MovementTotals::default();

    for movement in movements {
        let impact = movement.quantity_impact(&entry.product_id);
        if impact.is_zero() {
            continue;
        }
        if movement.transaction_date_time < starts_at {
            before_start += impact;
        } else if window.contains(movement.transaction_date_time) {
            totals.record(movement.movement_type, impact);
        }
    }

    let beginning_stock = entry.total_quantity - before_start;

    StockReportRow {
        product_id: entry.product_id.clone(),
        product_name: product.name.clone(),
        category_id: entry.category_id.clone(),
        uom: product.uom_label(),
        minimum_quantity: entry.minimum_quantity,
        beginning_stock,
        incoming: totals.incoming,
        outgoing: totals.outgoing,
        adjustments: totals.adjustments,
        wastage: totals.wastage,
        returns: totals.returns,
        ending_stock: beginning_stock + totals.net(),
        current_stock: entry.total_quantity,
    }
}

/// Period report for one shop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReport {
    pub company_id: String,
    pub shop_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub category_id: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<StockReportRow>,
}

/// A product at or below its minimum quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowStockRow {
    pub product_id: String,
    pub product_name: String,
    pub category_id: String,
    pub uom: String,
    pub current_quantity: Decimal,
    pub minimum_quantity: Decimal,
    pub deficit: Decimal,
}

pub fn low_stock_row(entry: &StockLedgerEntry, product: &ProductInfo) -> Option<LowStockRow> {
    if !entry.is_low_stock() {
        return None;
    }

    Some(LowStockRow {
        product_id: entry.product_id.clone(),
        product_name: product.name.clone(),
        category_id: entry.category_id.clone(),
        uom: product.uom_label(),
        current_quantity: entry.total_quantity,
        minimum_quantity: entry.minimum_quantity,
        deficit: entry.minimum_quantity - entry.total_quantity,
    })
}

/// Largest deficit first
pub fn sort_low_stock(rows: &mut [LowStockRow]) {
    rows.sort_by(|a, b| b.deficit.cmp(&a.deficit));
}
