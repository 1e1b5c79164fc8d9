//! Purchase order records and their optimistic factories.
//!
//! Factories validate their input, then stamp records with a
//! [`ProvisionalId`] and mark them as provisional so later code can tell
//! local-only records from confirmed ones. Amounts are computed without
//! rounding.

use crate::error::ValidationError;
use crate::identity::{ProvisionalId, RecordId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Caller-supplied fields for a new line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Percentage, e.g. `18.0` for 18%.
    pub tax_rate: f64,
}

impl LineItemInput {
    pub fn new(
        description: impl Into<String>,
        quantity: f64,
        unit_price: f64,
        tax_rate: f64,
    ) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            tax_rate,
        }
    }

    /// `quantity * unit_price * tax_rate / 100`
    pub fn tax_amount(&self) -> f64 {
        self.quantity * self.unit_price * self.tax_rate / 100.0
    }

    /// `quantity * unit_price + tax_amount`
    pub fn total_amount(&self) -> f64 {
        self.quantity * self.unit_price + self.tax_amount()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_non_negative("quantity", self.quantity)?;
        check_non_negative("unit_price", self.unit_price)?;
        check_non_negative("tax_rate", self.tax_rate)?;
        Ok(())
    }
}

/// A purchase order line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: RecordId,
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub tax_rate: f64,
    pub tax_amount: f64,
    pub total_amount: f64,
    pub is_optimistic: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LineItem {
    /// Build a provisional line item with derived tax and total amounts.
    ///
    /// Fails if any amount is negative or not finite.
    pub fn optimistic(input: LineItemInput) -> Result<Self, ValidationError> {
        input.validate()?;
        let now = Utc::now();
        let tax_amount = input.tax_amount();
        let total_amount = input.total_amount();
        Ok(Self {
            id: ProvisionalId::generate().into(),
            description: input.description,
            quantity: input.quantity,
            unit_price: input.unit_price,
            tax_rate: input.tax_rate,
            tax_amount,
            total_amount,
            is_optimistic: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Caller-supplied fields for a new purchase order.
///
/// Items carry their own pre-computed totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderInput {
    pub supplier: String,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
}

impl PurchaseOrderInput {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.supplier.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "supplier".to_string(),
            });
        }
        Ok(())
    }
}

/// A purchase order with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: RecordId,
    pub supplier: String,
    pub notes: Option<String>,
    pub items: Vec<LineItem>,
    pub grand_total: f64,
    pub item_count: usize,
    pub is_optimistic: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PurchaseOrder {
    /// Build a provisional purchase order, summing the items' line totals.
    ///
    /// Fails if the supplier is blank.
    pub fn optimistic(input: PurchaseOrderInput) -> Result<Self, ValidationError> {
        input.validate()?;
        let now = Utc::now();
        let grand_total = input.items.iter().map(|item| item.total_amount).sum();
        let item_count = input.items.len();
        Ok(Self {
            id: ProvisionalId::generate().into(),
            supplier: input.supplier,
            notes: input.notes,
            items: input.items,
            grand_total,
            item_count,
            is_optimistic: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// True if the order or any of its items has not been confirmed yet.
    pub fn has_provisional_records(&self) -> bool {
        self.id.is_provisional() || self.items.iter().any(|item| item.id.is_provisional())
    }
}

fn check_non_negative(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: "must be a non-negative number".to_string(),
        });
    }
    Ok(())
}
