use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Ingredient, check_cost};
use crate::error::{RecetarioError, Result};
use crate::recipe::{Dataset, IngredientLine, Recipe};

/// The page a viewer is on, with all the state that page needs.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum View {
    #[default]
    Menu,
    Detail {
        recipe_id: String,
        /// `None` shows the recipe at its base yield
        desired_yield: Option<f64>,
    },
    EditRecipe {
        /// Recipe the form was opened on; submit updates this id
        recipe_id: String,
        form: RecipeForm,
    },
    NewRecipe(RecipeForm),
    EditPrices(PriceForm),
}

impl View {
    /// Tag name of the page, as it appears in the serialized view.
    pub fn page(&self) -> &'static str {
        match self {
            View::Menu => "menu",
            View::Detail { .. } => "detail",
            View::EditRecipe { .. } => "edit_recipe",
            View::NewRecipe(_) => "new_recipe",
            View::EditPrices(_) => "edit_prices",
        }
    }
}

/// Editable copy of a recipe. Ingredient and step lists grow and shrink
/// through the explicit insert/remove methods.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RecipeForm {
    /// Empty on a new recipe until the viewer picks one
    pub id: String,
    pub name: String,
    pub image_ref: String,
    pub base_yield: f64,
    pub base_unit: String,
    pub ingredients: Vec<IngredientLine>,
    pub steps: Vec<String>,
}

impl RecipeForm {
    pub fn blank() -> Self {
        RecipeForm {
            id: String::new(),
            name: String::new(),
            image_ref: String::new(),
            base_yield: 1.0,
            base_unit: "porciones".to_string(),
            ingredients: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn from_recipe(recipe: &Recipe) -> Self {
        RecipeForm {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            image_ref: recipe.image_ref.clone(),
            base_yield: recipe.base_yield,
            base_unit: recipe.base_unit.clone(),
            ingredients: recipe.ingredients.clone(),
            steps: recipe.steps.clone(),
        }
    }

    pub fn add_ingredient(&mut self, line: IngredientLine) {
        self.ingredients.push(line);
    }

    /// Inserts before `index`; an index past the end appends.
    pub fn insert_ingredient(&mut self, index: usize, line: IngredientLine) {
        let index = index.min(self.ingredients.len());
        self.ingredients.insert(index, line);
    }

    pub fn set_ingredient(&mut self, index: usize, line: IngredientLine) -> bool {
        match self.ingredients.get_mut(index) {
            Some(slot) => {
                *slot = line;
                true
            }
            None => false,
        }
    }

    pub fn remove_ingredient(&mut self, index: usize) -> Option<IngredientLine> {
        (index < self.ingredients.len()).then(|| self.ingredients.remove(index))
    }

    pub fn add_step(&mut self, step: impl Into<String>) {
        self.steps.push(step.into());
    }

    /// Inserts before `index`; an index past the end appends.
    pub fn insert_step(&mut self, index: usize, step: impl Into<String>) {
        let index = index.min(self.steps.len());
        self.steps.insert(index, step.into());
    }

    pub fn set_step(&mut self, index: usize, step: impl Into<String>) -> bool {
        match self.steps.get_mut(index) {
            Some(slot) => {
                *slot = step.into();
                true
            }
            None => false,
        }
    }

    pub fn remove_step(&mut self, index: usize) -> Option<String> {
        (index < self.steps.len()).then(|| self.steps.remove(index))
    }

    /// Builds the recipe to store. A blank id becomes a free slug of the name;
    /// blank steps and ingredient lines without a name are dropped.
    pub fn into_recipe(self, dataset: &Dataset) -> Recipe {
        let id = match self.id.trim() {
            "" => dataset.next_free_id(&self.name),
            id => id.to_string(),
        };

        Recipe {
            id,
            name: self.name.trim().to_string(),
            image_ref: self.image_ref.trim().to_string(),
            base_yield: self.base_yield,
            base_unit: self.base_unit.trim().to_string(),
            ingredients: self
                .ingredients
                .into_iter()
                .filter(|line| !line.ingredient_name.trim().is_empty())
                .collect(),
            steps: self
                .steps
                .into_iter()
                .map(|step| step.trim().to_string())
                .filter(|step| !step.is_empty())
                .collect(),
        }
    }
}

impl Default for RecipeForm {
    fn default() -> Self {
        RecipeForm::blank()
    }
}

/// Pending cost edits for the whole catalog, in catalog order. Units are not
/// editable here.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PriceForm {
    pub costs: IndexMap<String, f64>,
}

impl PriceForm {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        PriceForm {
            costs: catalog
                .iter()
                .map(|(name, ingredient)| (name.clone(), ingredient.cost_per_unit))
                .collect(),
        }
    }

    pub fn set_cost(&mut self, name: &str, cost: f64) -> Result<()> {
        check_cost(name, cost)?;
        match self.costs.get_mut(name) {
            Some(slot) => {
                *slot = cost;
                Ok(())
            }
            None => Err(RecetarioError::IngredientNotFound(name.to_string())),
        }
    }

    /// The catalog with this form's costs applied. Units come from `catalog`;
    /// ingredients the form does not mention keep their current cost.
    pub fn apply(&self, catalog: &Catalog) -> Result<Catalog> {
        catalog
            .iter()
            .map(|(name, ingredient)| {
                let cost = self
                    .costs
                    .get(name)
                    .copied()
                    .unwrap_or(ingredient.cost_per_unit);
                check_cost(name, cost)?;
                Ok((name.clone(), Ingredient::new(ingredient.unit.clone(), cost)))
            })
            .collect()
    }
}
