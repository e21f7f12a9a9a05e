use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{RecetarioError, Result};
use crate::recipe::Recipe;

/// One computed line of a scaled recipe.
///
/// All numbers keep full precision; rounding only happens in the `display_*`
/// helpers so the table total is never a sum of rounded values.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CostRow {
    /// Ingredient name as written in the recipe
    pub ingredient_name: String,

    /// Base quantity multiplied by the scaling factor
    pub scaled_quantity: f64,

    /// Catalog unit the quantity is expressed in
    pub unit: String,

    /// Catalog cost per unit
    pub unit_cost: f64,

    /// `scaled_quantity * unit_cost`
    pub line_cost: f64,
}

impl CostRow {
    pub fn display_quantity(&self) -> String {
        format!("{} {}", round2(self.scaled_quantity), self.unit)
    }

    pub fn display_unit_cost(&self) -> String {
        format!("${:.4}/{}", self.unit_cost, self.unit)
    }

    pub fn display_line_cost(&self) -> String {
        format!("${:.2}", round2(self.line_cost))
    }
}

/// Result of scaling a recipe to a desired yield.
#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct CostTable {
    /// `desired_yield / base_yield`
    pub factor: f64,

    /// One row per priced ingredient line, in recipe order
    pub rows: Vec<CostRow>,

    /// Sum of the full-precision line costs of `rows`
    pub total_cost: f64,

    /// Names of lines skipped because the catalog has no entry for them, in recipe order
    pub missing: Vec<String>,
}

impl CostTable {
    pub fn display_total(&self) -> String {
        format!("${:.2}", round2(self.total_cost))
    }

    /// One `MissingIngredient` warning per skipped line.
    pub fn warnings(&self) -> Vec<RecetarioError> {
        self.missing
            .iter()
            .map(|name| RecetarioError::MissingIngredient { name: name.clone() })
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Scale a recipe to a desired yield and price every ingredient line
///
/// Every line is scaled by `desired_yield / recipe.base_yield` and priced from
/// the catalog. Lines whose ingredient is absent from the catalog are skipped
/// and reported in [`CostTable::missing`]; the remaining lines and the partial
/// total are still computed. Repeated ingredient names are priced independently.
///
/// # Arguments
/// * `recipe` - Recipe to scale
/// * `catalog` - Price list the ingredient names are resolved against
/// * `desired_yield` - Target batch size, in the recipe's base unit
///
/// # Returns
/// * `Result<CostTable>` - The scaled table, or `InvalidYield` when either
///   yield is not strictly positive
///
/// # Examples
/// ```
/// use recetario::catalog::{Catalog, Ingredient};
/// use recetario::recipe::{IngredientLine, Recipe};
/// use recetario::calculator::scale_recipe;
///
/// let mut catalog = Catalog::new();
/// catalog.create_ingredient("harina", Ingredient::new("g", 0.002)).unwrap();
///
/// let recipe = Recipe {
///     id: "pan".to_string(),
///     name: "Pan".to_string(),
///     image_ref: String::new(),
///     base_yield: 10.0,
///     base_unit: "porciones".to_string(),
///     ingredients: vec![IngredientLine::new("harina", 200.0)],
///     steps: Vec::new(),
/// };
///
/// let table = scale_recipe(&recipe, &catalog, 20.0).unwrap();
/// assert_eq!(table.rows[0].display_quantity(), "400 g");
/// assert_eq!(table.display_total(), "$0.80");
/// ```
pub fn scale_recipe(recipe: &Recipe, catalog: &Catalog, desired_yield: f64) -> Result<CostTable> {
    if !(desired_yield > 0.0) || !(recipe.base_yield > 0.0) {
        return Err(RecetarioError::InvalidYield {
            desired: desired_yield,
            base: recipe.base_yield,
        });
    }

    let factor = desired_yield / recipe.base_yield;
    let mut rows = Vec::with_capacity(recipe.ingredients.len());
    let mut missing = Vec::new();
    let mut total_cost = 0.0;

    for line in &recipe.ingredients {
        let Some(info) = catalog.get(&line.ingredient_name) else {
            log::warn!(
                "recipe '{}': no catalog entry for '{}', line skipped",
                recipe.id,
                line.ingredient_name
            );
            missing.push(line.ingredient_name.clone());
            continue;
        };

        let scaled_quantity = line.quantity_at_base * factor;
        let line_cost = scaled_quantity * info.cost_per_unit;
        total_cost += line_cost;

        rows.push(CostRow {
            ingredient_name: line.ingredient_name.clone(),
            scaled_quantity,
            unit: info.unit.clone(),
            unit_cost: info.cost_per_unit,
            line_cost,
        });
    }

    log::debug!(
        "scaled '{}' by {} -> {} rows, total {}",
        recipe.id,
        factor,
        rows.len(),
        total_cost
    );

    Ok(CostTable {
        factor,
        rows,
        total_cost,
        missing,
    })
}

/// Round half away from zero to two decimals, for display only.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
