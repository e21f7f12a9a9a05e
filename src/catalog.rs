use indexmap::IndexMap;
use indexmap::map;
use serde::{Deserialize, Serialize};

use crate::error::{RecetarioError, Result};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Ingredient {
    #[serde(rename = "unidad_base")]
    pub unit: String,
    #[serde(rename = "costo_por_unidad")]
    pub cost_per_unit: f64,
}

impl Ingredient {
    pub fn new(unit: impl Into<String>, cost_per_unit: f64) -> Self {
        Ingredient {
            unit: unit.into(),
            cost_per_unit,
        }
    }
}

/// Global price list shared by every recipe, keyed by ingredient name.
///
/// Names are compared literally: "Harina" and "harina" are two entries.
/// Entries keep insertion order, which is the order the price editor, the
/// exports and the stored document use.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(transparent)]
pub struct Catalog {
    entries: IndexMap<String, Ingredient>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    pub fn get(&self, name: &str) -> Option<&Ingredient> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> map::Iter<'_, String, Ingredient> {
        self.entries.iter()
    }

    pub fn create_ingredient(&mut self, name: &str, ingredient: Ingredient) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(RecetarioError::DuplicateName(name.to_string()));
        }
        check_cost(name, ingredient.cost_per_unit)?;

        self.entries.insert(name.to_string(), ingredient);
        Ok(())
    }

    pub fn update_ingredient(&mut self, name: &str, ingredient: Ingredient) -> Result<()> {
        check_cost(name, ingredient.cost_per_unit)?;
        match self.entries.get_mut(name) {
            Some(existing) => {
                *existing = ingredient;
                Ok(())
            }
            None => Err(RecetarioError::IngredientNotFound(name.to_string())),
        }
    }

    /// Removes an ingredient even if recipes still reference it; those lines
    /// surface as missing the next time the recipe is scaled.
    pub fn delete_ingredient(&mut self, name: &str) -> Option<Ingredient> {
        self.entries.shift_remove(name)
    }

    /// Swaps in a whole new price list (price editor, spreadsheet import).
    pub fn replace_all(&mut self, other: Catalog) -> Catalog {
        std::mem::replace(self, other)
    }
}

impl FromIterator<(String, Ingredient)> for Catalog {
    fn from_iter<T: IntoIterator<Item = (String, Ingredient)>>(iter: T) -> Self {
        Catalog {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = (&'a String, &'a Ingredient);
    type IntoIter = map::Iter<'a, String, Ingredient>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

pub(crate) fn check_cost(name: &str, cost: f64) -> Result<()> {
    if !(cost.is_finite() && cost >= 0.0) {
        return Err(RecetarioError::InvalidCost {
            name: name.to_string(),
            cost,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flour_and_sugar() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .create_ingredient("harina", Ingredient::new("g", 0.002))
            .unwrap();
        catalog
            .create_ingredient("azucar", Ingredient::new("g", 0.003))
            .unwrap();
        catalog
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let mut catalog = flour_and_sugar();
        let err = catalog
            .create_ingredient("harina", Ingredient::new("kg", 2.0))
            .unwrap_err();
        assert!(matches!(err, RecetarioError::DuplicateName(ref n) if n == "harina"));
        assert_eq!(catalog.get("harina").unwrap().unit, "g");
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut catalog = flour_and_sugar();
        catalog
            .create_ingredient("Harina", Ingredient::new("kg", 2.0))
            .unwrap();
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn negative_cost_is_rejected() {
        let mut catalog = Catalog::new();
        let err = catalog
            .create_ingredient("leche", Ingredient::new("ml", -1.0))
            .unwrap_err();
        assert!(matches!(err, RecetarioError::InvalidCost { .. }));
        assert!(catalog.is_empty());
    }

    #[test]
    fn non_finite_cost_is_rejected() {
        let mut catalog = flour_and_sugar();
        for cost in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(
                catalog.create_ingredient("leche", Ingredient::new("ml", cost)),
                Err(RecetarioError::InvalidCost { .. })
            ));
            assert!(matches!(
                catalog.update_ingredient("harina", Ingredient::new("g", cost)),
                Err(RecetarioError::InvalidCost { .. })
            ));
        }
        assert!(!catalog.contains("leche"));
        assert_eq!(catalog.get("harina").unwrap().cost_per_unit, 0.002);
    }

    #[test]
    fn insertion_order_is_kept() {
        let mut catalog = Catalog::new();
        for name in ["zanahoria", "azucar", "mantequilla", "harina"] {
            catalog
                .create_ingredient(name, Ingredient::new("g", 0.01))
                .unwrap();
        }
        catalog.delete_ingredient("azucar");

        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names, ["zanahoria", "mantequilla", "harina"]);

        let json = serde_json::to_string(&catalog).unwrap();
        let back: Catalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.names().collect::<Vec<_>>(), names);
    }

    #[test]
    fn update_requires_existing_entry() {
        let mut catalog = flour_and_sugar();
        catalog
            .update_ingredient("azucar", Ingredient::new("g", 0.004))
            .unwrap();
        assert_eq!(catalog.get("azucar").unwrap().cost_per_unit, 0.004);

        let err = catalog
            .update_ingredient("cacao", Ingredient::new("g", 0.01))
            .unwrap_err();
        assert!(matches!(err, RecetarioError::IngredientNotFound(_)));
    }

    #[test]
    fn delete_is_unconditional() {
        let mut catalog = flour_and_sugar();
        assert!(catalog.delete_ingredient("harina").is_some());
        assert!(catalog.delete_ingredient("harina").is_none());
        assert!(!catalog.contains("harina"));
    }

    #[test]
    fn serializes_with_stored_field_names() {
        let catalog = flour_and_sugar();
        let json = serde_json::to_value(&catalog).unwrap();
        assert_eq!(json["harina"]["unidad_base"], "g");
        assert_eq!(json["harina"]["costo_por_unidad"], 0.002);
    }
}
