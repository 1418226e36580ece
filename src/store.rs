// 📋 Budget Store - owner of the material list and the save timestamp
//
// Every mutation goes through here so the invariants are enforced in one
// place: distinct ids, quantity >= 1, price > 0 at add/edit time, and a
// line total (price * quantity) that fits in a Decimal.
// Successful mutations are persisted immediately; rejected ones are no-ops.

use crate::display::format_last_saved;
use crate::export::ExportSnapshot;
use crate::material::{next_id, validate_input, Material, MaterialId};
use crate::storage::{KeyValueStore, Persistence};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Answer to the "are you sure?" prompt in front of destructive operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Declined,
}

impl Confirmation {
    pub fn from_answer(answer: &str) -> Self {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" | "s" | "si" | "sí" => Confirmation::Confirmed,
            _ => Confirmation::Declined,
        }
    }
}

/// Read-only state handed to a view for rendering
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetView<'a> {
    pub materials: &'a [Material],
    pub last_saved_display: String,
    pub total: Decimal,
}

pub struct BudgetStore<S: KeyValueStore> {
    materials: Vec<Material>,
    last_saved: Option<DateTime<Utc>>,
    persistence: Persistence<S>,
}

impl<S: KeyValueStore> BudgetStore<S> {
    /// Load persisted state from `store`. Missing or corrupt data gives an
    /// empty budget.
    pub fn load(store: S) -> Self {
        let persistence = Persistence::new(store);
        let materials = persistence.load_materials();
        let last_saved = persistence.load_timestamp();

        tracing::info!(
            count = materials.len(),
            last_saved = ?last_saved,
            "budget loaded"
        );

        Self {
            materials,
            last_saved,
            persistence,
        }
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn get(&self, id: MaterialId) -> Option<&Material> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    #[cfg(test)]
    pub(crate) fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    /// Sum of price * quantity over selected materials. Saturates at
    /// `Decimal::MAX` instead of overflowing.
    pub fn calculate_total(&self) -> Decimal {
        self.materials
            .iter()
            .fold(Decimal::ZERO, |total, m| total.saturating_add(m.selected_total()))
    }

    pub fn selected_count(&self) -> usize {
        self.materials.iter().filter(|m| m.is_selected).count()
    }

    pub fn view(&self, now: DateTime<Utc>) -> BudgetView<'_> {
        BudgetView {
            materials: &self.materials,
            last_saved_display: format_last_saved(self.last_saved, now),
            total: self.calculate_total(),
        }
    }

    pub fn export_snapshot(&self) -> ExportSnapshot {
        self.export_snapshot_at(Utc::now())
    }

    pub fn export_snapshot_at(&self, now: DateTime<Utc>) -> ExportSnapshot {
        ExportSnapshot {
            materials: self.materials.clone(),
            export_date: now,
            total_budget: self.calculate_total(),
            selected_materials: self.selected_count(),
        }
    }

    // ========================================================================
    // MUTATIONS
    // ========================================================================

    /// Append a new material. Returns its id, or `None` when the name is
    /// blank, the price is not positive or no id is left.
    pub fn add_material(&mut self, name: &str, price: Decimal) -> Option<MaterialId> {
        let name = validate_input(name, price)?;
        let Some(id) = next_id(&self.materials) else {
            tracing::warn!("material ids exhausted, add ignored");
            return None;
        };

        self.materials.push(Material::new(id, name, price));
        tracing::debug!(id, name, %price, "material added");
        self.persist();

        Some(id)
    }

    /// Replace name and price in place; quantity and selection are kept
    pub fn edit_material(&mut self, id: MaterialId, name: &str, price: Decimal) -> bool {
        let Some(name) = validate_input(name, price) else {
            return false;
        };
        let Some(material) = self.materials.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if price.checked_mul(Decimal::from(material.quantity)).is_none() {
            tracing::debug!(id, %price, "line total out of range, edit ignored");
            return false;
        }

        material.name = name.to_string();
        material.price = price;
        self.persist();
        true
    }

    pub fn remove_material(&mut self, id: MaterialId) -> bool {
        let before = self.materials.len();
        self.materials.retain(|m| m.id != id);
        if self.materials.len() == before {
            return false;
        }

        self.persist();
        true
    }

    pub fn toggle_selected(&mut self, id: MaterialId) -> bool {
        let Some(material) = self.materials.iter_mut().find(|m| m.id == id) else {
            return false;
        };

        material.is_selected = !material.is_selected;
        self.persist();
        true
    }

    /// Set the quantity exactly. Values below 1 are ignored.
    pub fn set_quantity(&mut self, id: MaterialId, quantity: i64) -> bool {
        if quantity < 1 {
            return false;
        }
        let Ok(quantity) = u32::try_from(quantity) else {
            tracing::debug!(id, quantity, "quantity out of range, ignored");
            return false;
        };
        let Some(material) = self.materials.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if material.price.checked_mul(Decimal::from(quantity)).is_none() {
            tracing::debug!(id, quantity, "line total out of range, ignored");
            return false;
        }

        material.quantity = quantity;
        self.persist();
        true
    }

    pub fn increment_quantity(&mut self, id: MaterialId) -> bool {
        let Some(current) = self.get(id).map(|m| m.quantity) else {
            return false;
        };
        self.set_quantity(id, i64::from(current) + 1)
    }

    /// Same rule as [`BudgetStore::set_quantity`], so it stops at 1
    pub fn decrement_quantity(&mut self, id: MaterialId) -> bool {
        let Some(current) = self.get(id).map(|m| m.quantity) else {
            return false;
        };
        self.set_quantity(id, i64::from(current) - 1)
    }

    /// Empty the budget and erase both persisted records. Irreversible, so
    /// nothing happens unless the user confirmed.
    pub fn clear_all(&mut self, confirmation: Confirmation) -> bool {
        if confirmation != Confirmation::Confirmed {
            return false;
        }

        self.materials.clear();
        self.last_saved = None;
        self.persistence.clear();
        tracing::info!("budget cleared");
        true
    }

    fn persist(&mut self) {
        let written = if self.materials.is_empty() {
            // No stale list may survive a restart once the last item is gone
            self.persistence.remove_materials()
        } else {
            self.persistence.save_materials(&self.materials)
        };

        if written {
            let now = Utc::now();
            self.last_saved = Some(now);
            self.persistence.save_timestamp(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::FailingStore;
    use crate::storage::{MemoryStore, LAST_SAVED_KEY, MATERIALS_KEY};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn empty_store() -> BudgetStore<MemoryStore> {
        BudgetStore::load(MemoryStore::new())
    }

    #[test]
    fn test_walkthrough() {
        let mut store = empty_store();

        assert_eq!(store.add_material("Bricks", dec("10.00")), Some(1));
        let bricks = store.get(1).unwrap();
        assert_eq!(bricks.quantity, 1);
        assert!(bricks.is_selected);
        assert_eq!(store.calculate_total(), dec("10.00"));

        assert_eq!(store.add_material("Cement", dec("25.50")), Some(2));
        assert_eq!(store.calculate_total(), dec("35.50"));

        assert!(store.toggle_selected(1));
        assert_eq!(store.calculate_total(), dec("25.50"));

        assert!(store.set_quantity(2, 3));
        assert_eq!(store.calculate_total(), dec("76.50"));

        assert!(store.remove_material(1));
        assert_eq!(store.len(), 1);
        assert_eq!(store.materials()[0].id, 2);
        assert_eq!(store.materials()[0].quantity, 3);
        assert_eq!(store.calculate_total(), dec("76.50"));
    }

    #[test]
    fn test_add_assigns_max_plus_one() {
        let mut store = empty_store();
        store.add_material("A", dec("1"));
        store.add_material("B", dec("1"));
        store.add_material("C", dec("1"));
        store.remove_material(2);

        assert_eq!(store.add_material("D", dec("1")), Some(4));

        store.remove_material(4);
        assert_eq!(store.add_material("E", dec("1")), Some(4));
    }

    #[test]
    fn test_add_refused_once_ids_run_out() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                MATERIALS_KEY,
                &format!(
                    r#"[{{"id":{},"name":"Last","price":1,"quantity":1,"isSelected":true}}]"#,
                    MaterialId::MAX
                ),
            )
            .unwrap();
        let mut store = BudgetStore::load(backend);
        assert_eq!(store.len(), 1);

        assert_eq!(store.add_material("Next", dec("1")), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_add_trims_name_and_appends() {
        let mut store = empty_store();
        store.add_material("First", dec("1"));
        store.add_material("  Gravel  ", dec("2"));

        assert_eq!(store.materials()[1].name, "Gravel");
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        let before = store.materials().to_vec();

        assert_eq!(store.add_material("", dec("5")), None);
        assert_eq!(store.add_material("   ", dec("5")), None);
        assert_eq!(store.add_material("Sand", Decimal::ZERO), None);
        assert_eq!(store.add_material("Sand", dec("-1")), None);

        assert!(!store.edit_material(1, " ", dec("5")));
        assert!(!store.edit_material(1, "Sand", Decimal::ZERO));
        assert!(!store.edit_material(1, "Sand", dec("-0.01")));

        assert_eq!(store.materials(), before.as_slice());
    }

    #[test]
    fn test_edit_keeps_quantity_and_selection() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        store.set_quantity(1, 4);
        store.toggle_selected(1);

        assert!(store.edit_material(1, " Red bricks ", dec("12.5")));

        let m = store.get(1).unwrap();
        assert_eq!(m.name, "Red bricks");
        assert_eq!(m.price, dec("12.5"));
        assert_eq!(m.quantity, 4);
        assert!(!m.is_selected);
    }

    #[test]
    fn test_unknown_ids_are_noops() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        let before = store.materials().to_vec();

        assert!(!store.edit_material(9, "X", dec("1")));
        assert!(!store.remove_material(9));
        assert!(!store.toggle_selected(9));
        assert!(!store.set_quantity(9, 2));
        assert!(!store.increment_quantity(9));
        assert!(!store.decrement_quantity(9));

        assert_eq!(store.materials(), before.as_slice());
    }

    #[test]
    fn test_remove_twice_is_idempotent() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        store.add_material("Cement", dec("20"));

        assert!(store.remove_material(1));
        let after_first = store.materials().to_vec();
        assert!(!store.remove_material(1));
        assert_eq!(store.materials(), after_first.as_slice());
    }

    #[test]
    fn test_set_quantity_below_one_is_ignored() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        store.set_quantity(1, 5);

        for q in [0, -1, -100] {
            assert!(!store.set_quantity(1, q));
            assert_eq!(store.get(1).unwrap().quantity, 5);
        }

        assert!(store.set_quantity(1, 1));
        assert_eq!(store.get(1).unwrap().quantity, 1);
        assert!(!store.set_quantity(1, i64::from(u32::MAX) + 1));
        assert_eq!(store.get(1).unwrap().quantity, 1);
    }

    #[test]
    fn test_increment_and_decrement() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));

        assert!(store.increment_quantity(1));
        assert!(store.increment_quantity(1));
        assert_eq!(store.get(1).unwrap().quantity, 3);

        assert!(store.decrement_quantity(1));
        assert!(store.decrement_quantity(1));
        assert!(!store.decrement_quantity(1));
        assert_eq!(store.get(1).unwrap().quantity, 1);
    }

    #[test]
    fn test_toggle_changes_total_by_line_total() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10.00"));
        store.add_material("Cement", dec("25.50"));
        store.set_quantity(2, 3);

        let with_cement = store.calculate_total();
        store.toggle_selected(2);
        let without_cement = store.calculate_total();

        assert_eq!(with_cement - without_cement, dec("76.50"));
        assert_eq!(store.selected_count(), 1);
    }

    #[test]
    fn test_oversized_line_totals_are_refused() {
        let mut store = empty_store();
        store.add_material("Steel", dec("100000000000000000000"));
        store.add_material("Sand", dec("1"));
        store.set_quantity(2, 4_000_000_000);

        assert!(!store.set_quantity(1, 4_000_000_000));
        assert_eq!(store.get(1).unwrap().quantity, 1);

        assert!(!store.edit_material(2, "Gold", dec("100000000000000000000")));
        assert_eq!(store.get(2).unwrap().name, "Sand");
    }

    #[test]
    fn test_overflowing_saved_state_still_loads_and_totals() {
        let mut backend = MemoryStore::new();
        backend
            .set(
                MATERIALS_KEY,
                r#"[{"id":1,"name":"Acero","price":100000000000000000000,"quantity":4000000000,"isSelected":true},
                    {"id":2,"name":"Arena","price":70000000000000000000,"quantity":1000000000,"isSelected":true}]"#,
            )
            .unwrap();

        let store = BudgetStore::load(backend);
        assert_eq!(store.len(), 2);
        assert_eq!(store.calculate_total(), Decimal::MAX);
        assert_eq!(store.view(Utc::now()).total, Decimal::MAX);
        assert_eq!(store.export_snapshot().total_budget, Decimal::MAX);
    }

    #[test]
    fn test_total_with_nothing_selected() {
        let mut store = empty_store();
        assert_eq!(store.calculate_total(), Decimal::ZERO);

        store.add_material("Bricks", dec("10"));
        store.toggle_selected(1);
        assert_eq!(store.calculate_total(), Decimal::ZERO);
    }

    #[test]
    fn test_mutations_are_persisted_and_reloaded() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10.00"));
        store.add_material("Cement", dec("25.50"));
        store.set_quantity(2, 3);
        store.toggle_selected(1);
        assert!(store.last_saved().is_some());

        let saved = store.materials().to_vec();
        let backend = store.persistence.into_inner();
        let reloaded = BudgetStore::load(backend);

        assert_eq!(reloaded.materials(), saved.as_slice());
        assert!(reloaded.last_saved().is_some());
        assert_eq!(reloaded.calculate_total(), dec("76.50"));
    }

    #[test]
    fn test_high_precision_price_survives_reload() {
        let mut store = empty_store();
        store.add_material("Arena", dec("0.1234567890123456789"));
        store.add_material("Cal", dec("12345678901234567.891"));
        let saved = store.materials().to_vec();

        let reloaded = BudgetStore::load(store.persistence.into_inner());
        assert_eq!(reloaded.materials(), saved.as_slice());
        assert_eq!(reloaded.get(1).unwrap().price.to_string(), "0.1234567890123456789");
    }

    #[test]
    fn test_rejected_operations_do_not_write() {
        let mut store = empty_store();
        assert!(store.add_material("", dec("1")).is_none());

        assert!(store.last_saved().is_none());
        assert!(store.persistence().store().get(MATERIALS_KEY).unwrap().is_none());
        assert!(store.persistence().store().get(LAST_SAVED_KEY).unwrap().is_none());
    }

    #[test]
    fn test_removing_last_material_erases_list_record() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));
        assert!(store.remove_material(1));

        assert!(store.is_empty());
        assert!(store.persistence().store().get(MATERIALS_KEY).unwrap().is_none());
        assert!(store.last_saved().is_some());

        let reloaded = BudgetStore::load(store.persistence.into_inner());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_clear_all_requires_confirmation() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10"));

        assert!(!store.clear_all(Confirmation::Declined));
        assert_eq!(store.len(), 1);
        assert!(store.persistence().store().get(MATERIALS_KEY).unwrap().is_some());

        assert!(store.clear_all(Confirmation::Confirmed));
        assert!(store.is_empty());
        assert!(store.last_saved().is_none());
        assert!(store.persistence().store().get(MATERIALS_KEY).unwrap().is_none());
        assert!(store.persistence().store().get(LAST_SAVED_KEY).unwrap().is_none());
        assert!(store.persistence().load_materials().is_empty());
    }

    #[test]
    fn test_ids_restart_after_clear_all() {
        let mut store = empty_store();
        store.add_material("A", dec("1"));
        store.add_material("B", dec("1"));
        store.clear_all(Confirmation::Confirmed);

        assert_eq!(store.add_material("C", dec("1")), Some(1));
    }

    #[test]
    fn test_failing_storage_never_breaks_the_store() {
        let mut store = BudgetStore::load(FailingStore);
        assert!(store.is_empty());

        assert_eq!(store.add_material("Bricks", dec("10")), Some(1));
        assert!(store.toggle_selected(1));
        assert!(store.clear_all(Confirmation::Confirmed));
        assert!(store.last_saved().is_none());
    }

    #[test]
    fn test_export_snapshot() {
        let mut store = empty_store();
        store.add_material("Bricks", dec("10.00"));
        store.add_material("Cement", dec("25.50"));
        store.toggle_selected(1);
        let now = Utc::now();

        let snapshot = store.export_snapshot_at(now);

        assert_eq!(snapshot.materials, store.materials());
        assert_eq!(snapshot.export_date, now);
        assert_eq!(snapshot.total_budget, dec("25.50"));
        assert_eq!(snapshot.selected_materials, 1);
        assert_eq!(store.len(), 2, "Export must not mutate the budget");
    }

    #[test]
    fn test_view() {
        let mut store = empty_store();
        let now = Utc::now();
        assert_eq!(store.view(now).last_saved_display, "Sin guardar");

        store.add_material("Bricks", dec("10"));
        let view = store.view(Utc::now());
        assert_eq!(view.materials.len(), 1);
        assert_eq!(view.total, dec("10"));
        assert_eq!(view.last_saved_display, "Guardado hace unos segundos");
    }

    #[test]
    fn test_confirmation_from_answer() {
        assert_eq!(Confirmation::from_answer("y"), Confirmation::Confirmed);
        assert_eq!(Confirmation::from_answer(" YES\n"), Confirmation::Confirmed);
        assert_eq!(Confirmation::from_answer("sí"), Confirmation::Confirmed);
        assert_eq!(Confirmation::from_answer(""), Confirmation::Declined);
        assert_eq!(Confirmation::from_answer("no"), Confirmation::Declined);
    }
}
