// 🧱 Material - one line item of the budget
//
// The serialized shape is shared by the stored record and the export file:
// {id, name, price, quantity, isSelected}

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier of a material within one budget
pub type MaterialId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    pub id: MaterialId,
    pub name: String,
    /// Unit price, written as an exact JSON number
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub price: Decimal,
    pub quantity: u32,
    pub is_selected: bool,
}

impl Material {
    /// New line item as the add operation creates it: one unit, selected
    pub fn new(id: MaterialId, name: &str, price: Decimal) -> Self {
        Material {
            id,
            name: name.trim().to_string(),
            price,
            quantity: 1,
            is_selected: true,
        }
    }

    /// price * quantity, regardless of selection. Saturates at `Decimal::MAX`.
    pub fn line_total(&self) -> Decimal {
        self.price.saturating_mul(Decimal::from(self.quantity))
    }

    /// What this line contributes to the budget total
    pub fn selected_total(&self) -> Decimal {
        if self.is_selected {
            self.line_total()
        } else {
            Decimal::ZERO
        }
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

/// Accepts a name/price pair for add and edit.
///
/// Returns the trimmed name when the pair is valid. Rejected input is not an
/// error for the caller, the operation simply does nothing.
pub fn validate_input(name: &str, price: Decimal) -> Option<&str> {
    let name = name.trim();
    if name.is_empty() || price <= Decimal::ZERO {
        return None;
    }
    Some(name)
}

/// Next id for a list: max existing id + 1, or 1 for an empty list.
/// `None` once the largest id is `MaterialId::MAX`.
pub fn next_id(materials: &[Material]) -> Option<MaterialId> {
    materials.iter().map(|m| m.id).max().unwrap_or(0).checked_add(1)
}

/// Checks the list-level invariants: distinct ids and quantity >= 1
pub fn check_invariants(materials: &[Material]) -> Result<(), String> {
    let mut seen = HashSet::with_capacity(materials.len());
    for material in materials {
        if !seen.insert(material.id) {
            return Err(format!("duplicate material id {}", material.id));
        }
        if material.quantity < 1 {
            return Err(format!("material {} has quantity 0", material.id));
        }
    }
    Ok(())
}
