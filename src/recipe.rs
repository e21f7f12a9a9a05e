use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use crate::error::{RecetarioError, Result};

lazy_static! {
    static ref NON_SLUG_REGEX: Regex = Regex::new(r"[^a-z0-9]+").unwrap();
}

/// One ingredient line of a recipe. Carries no price data; cost and unit are
/// looked up in the [`Catalog`] by name when the recipe is scaled.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct IngredientLine {
    #[serde(rename = "nombre")]
    pub ingredient_name: String,
    #[serde(rename = "cantidad")]
    pub quantity_at_base: f64,
}

impl IngredientLine {
    pub fn new(ingredient_name: impl Into<String>, quantity_at_base: f64) -> Self {
        IngredientLine {
            ingredient_name: ingredient_name.into(),
            quantity_at_base,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Recipe {
    pub id: String,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "imagen", default)]
    pub image_ref: String,
    #[serde(rename = "cantidad_base")]
    pub base_yield: f64,
    #[serde(rename = "unidad_base")]
    pub base_unit: String,
    #[serde(rename = "ingredientes", default)]
    pub ingredients: Vec<IngredientLine>,
    #[serde(rename = "pasos", default)]
    pub steps: Vec<String>,
}

impl Recipe {
    /// Checks the fields a recipe must satisfy before it enters the dataset.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(RecetarioError::EmptyId);
        }
        if !(self.base_yield.is_finite() && self.base_yield > 0.0) {
            return Err(RecetarioError::InvalidBaseYield(self.base_yield));
        }
        for line in &self.ingredients {
            if !(line.quantity_at_base.is_finite() && line.quantity_at_base >= 0.0) {
                return Err(RecetarioError::InvalidQuantity {
                    ingredient: line.ingredient_name.clone(),
                    quantity: line.quantity_at_base,
                });
            }
        }
        Ok(())
    }
}

/// The unit of persistence: the price catalog plus every recipe, in order.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Dataset {
    #[serde(rename = "ingredientes_globales", default)]
    pub catalog: Catalog,
    #[serde(rename = "recetas", default)]
    pub recipes: Vec<Recipe>,
}

impl Dataset {
    pub fn recipe(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    fn position(&self, id: &str) -> Result<usize> {
        self.recipes
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| RecetarioError::RecipeNotFound(id.to_string()))
    }

    pub fn create_recipe(&mut self, recipe: Recipe) -> Result<()> {
        recipe.validate()?;
        if self.recipe(&recipe.id).is_some() {
            return Err(RecetarioError::DuplicateId(recipe.id));
        }

        log::debug!("creating recipe '{}'", recipe.id);
        self.recipes.push(recipe);
        Ok(())
    }

    /// Replaces the contents of the recipe stored under `id`. The id itself
    /// never changes; the one carried by `recipe` is ignored.
    pub fn update_recipe(&mut self, id: &str, mut recipe: Recipe) -> Result<()> {
        let index = self.position(id)?;
        recipe.id = id.to_string();
        recipe.validate()?;

        self.recipes[index] = recipe;
        Ok(())
    }

    pub fn delete_recipe(&mut self, id: &str) -> Result<Recipe> {
        let index = self.position(id)?;
        Ok(self.recipes.remove(index))
    }

    /// `(recipe id, ingredient name)` for every line whose ingredient is not
    /// in the catalog.
    pub fn dangling_references(&self) -> Vec<(String, String)> {
        self.recipes
            .iter()
            .flat_map(|recipe| {
                recipe
                    .ingredients
                    .iter()
                    .filter(|line| !self.catalog.contains(&line.ingredient_name))
                    .map(|line| (recipe.id.clone(), line.ingredient_name.clone()))
            })
            .collect()
    }

    /// A slug for `name` that no recipe in the dataset uses yet.
    pub fn next_free_id(&self, name: &str) -> String {
        let base = suggest_id(name);
        let base = if base.is_empty() {
            "receta".to_string()
        } else {
            base
        };

        if self.recipe(&base).is_none() {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}_{}", base, n);
            if self.recipe(&candidate).is_none() {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Lowercase ASCII slug of a recipe name, e.g. "Pastel de Limón" -> "pastel_de_limon".
pub fn suggest_id(name: &str) -> String {
    let folded: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' => 'a',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'ó' | 'ò' | 'ö' | 'ô' => 'o',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect();

    NON_SLUG_REGEX
        .replace_all(&folded, "_")
        .trim_matches('_')
        .to_string()
}
