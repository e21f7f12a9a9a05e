use serde::{Deserialize, Serialize};

use crate::calculator::{CostTable, scale_recipe};
use crate::error::{RecetarioError, Result};
use crate::login::AdminToken;
use crate::recipe::{IngredientLine, Recipe};
use crate::saving::DatasetStore;
use crate::view::{PriceForm, RecipeForm, View};

/// Something the viewer did on the current page.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ShowMenu,
    OpenRecipe { recipe_id: String },
    SetYield { desired_yield: f64 },
    StartNewRecipe,
    StartEditRecipe,
    Edit { edit: FormEdit },
    SubmitRecipe,
    DeleteRecipe { recipe_id: String },
    StartEditPrices,
    SetPrice { name: String, cost: f64 },
    SubmitPrices,
}

impl Action {
    /// Tag name of the action, as it appears in the serialized action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::ShowMenu => "show_menu",
            Action::OpenRecipe { .. } => "open_recipe",
            Action::SetYield { .. } => "set_yield",
            Action::StartNewRecipe => "start_new_recipe",
            Action::StartEditRecipe => "start_edit_recipe",
            Action::Edit { .. } => "edit",
            Action::SubmitRecipe => "submit_recipe",
            Action::DeleteRecipe { .. } => "delete_recipe",
            Action::StartEditPrices => "start_edit_prices",
            Action::SetPrice { .. } => "set_price",
            Action::SubmitPrices => "submit_prices",
        }
    }

    fn needs_admin(&self) -> bool {
        !matches!(
            self,
            Action::ShowMenu | Action::OpenRecipe { .. } | Action::SetYield { .. }
        )
    }
}

/// A single change to the recipe form on screen.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FormEdit {
    SetId { id: String },
    SetName { name: String },
    SetImage { image_ref: String },
    SetBaseYield { base_yield: f64 },
    SetBaseUnit { base_unit: String },
    AddIngredient { line: IngredientLine },
    InsertIngredient { index: usize, line: IngredientLine },
    SetIngredient { index: usize, line: IngredientLine },
    RemoveIngredient { index: usize },
    AddStep { step: String },
    InsertStep { index: usize, step: String },
    SetStep { index: usize, step: String },
    RemoveStep { index: usize },
}

impl FormEdit {
    fn apply(self, form: &mut RecipeForm) {
        match self {
            FormEdit::SetId { id } => form.id = id,
            FormEdit::SetName { name } => form.name = name,
            FormEdit::SetImage { image_ref } => form.image_ref = image_ref,
            FormEdit::SetBaseYield { base_yield } => form.base_yield = base_yield,
            FormEdit::SetBaseUnit { base_unit } => form.base_unit = base_unit,
            FormEdit::AddIngredient { line } => form.add_ingredient(line),
            FormEdit::InsertIngredient { index, line } => form.insert_ingredient(index, line),
            FormEdit::SetIngredient { index, line } => {
                form.set_ingredient(index, line);
            }
            FormEdit::RemoveIngredient { index } => {
                form.remove_ingredient(index);
            }
            FormEdit::AddStep { step } => form.add_step(step),
            FormEdit::InsertStep { index, step } => form.insert_step(index, step),
            FormEdit::SetStep { index, step } => {
                form.set_step(index, step);
            }
            FormEdit::RemoveStep { index } => {
                form.remove_step(index);
            }
        }
    }
}

/// Whether handling an action wrote the dataset.
#[derive(Clone, Copy, Serialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Render,
    Saved,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Transition {
    pub view: View,
    pub outcome: Outcome,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct RecipeSummary {
    pub id: String,
    pub name: String,
    pub image_ref: String,
}

/// What a page shows, computed from a [`View`] and the current dataset.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum Screen {
    Menu {
        recipes: Vec<RecipeSummary>,
    },
    Detail {
        recipe: Recipe,
        desired_yield: f64,
        table: CostTable,
    },
    RecipeForm {
        form: RecipeForm,
        is_new: bool,
        /// Catalog names the ingredient pickers offer
        ingredient_choices: Vec<String>,
    },
    Prices {
        form: PriceForm,
        units: Vec<(String, String)>,
    },
}

#[derive(Clone, Serialize, Debug, PartialEq)]
pub struct Rendered {
    pub screen: Screen,
    /// Human-readable recoverable problems (missing data file, unpriced ingredients)
    pub warnings: Vec<String>,
}

/// Turns `(view, action)` into the next view, loading the dataset fresh for
/// every interaction and committing each submitted form with one save.
pub struct Controller<'a> {
    store: &'a DatasetStore,
}

impl<'a> Controller<'a> {
    pub fn new(store: &'a DatasetStore) -> Self {
        Controller { store }
    }

    pub fn handle(
        &self,
        view: View,
        action: Action,
        admin: Option<&AdminToken>,
    ) -> Result<Transition> {
        if action.needs_admin() && admin.is_none() {
            return Err(RecetarioError::Unauthorized);
        }

        let render = |view: View| -> Result<Transition> {
            Ok(Transition {
                view,
                outcome: Outcome::Render,
            })
        };

        match (view, action) {
            (_, Action::ShowMenu) => render(View::Menu),

            (_, Action::OpenRecipe { recipe_id }) => {
                let dataset = self.store.load()?.dataset;
                if dataset.recipe(&recipe_id).is_none() {
                    return Err(RecetarioError::RecipeNotFound(recipe_id));
                }
                render(View::Detail {
                    recipe_id,
                    desired_yield: None,
                })
            }

            (View::Detail { recipe_id, .. }, Action::SetYield { desired_yield }) => {
                if !(desired_yield > 0.0) {
                    let dataset = self.store.load()?.dataset;
                    let recipe = dataset
                        .recipe(&recipe_id)
                        .ok_or(RecetarioError::RecipeNotFound(recipe_id))?;
                    return Err(RecetarioError::InvalidYield {
                        desired: desired_yield,
                        base: recipe.base_yield,
                    });
                }
                render(View::Detail {
                    recipe_id,
                    desired_yield: Some(desired_yield),
                })
            }

            (_, Action::StartNewRecipe) => render(View::NewRecipe(RecipeForm::blank())),

            (View::Detail { recipe_id, .. }, Action::StartEditRecipe) => {
                let dataset = self.store.load()?.dataset;
                let recipe = dataset
                    .recipe(&recipe_id)
                    .ok_or_else(|| RecetarioError::RecipeNotFound(recipe_id.clone()))?;
                render(View::EditRecipe {
                    form: RecipeForm::from_recipe(recipe),
                    recipe_id,
                })
            }

            (View::EditRecipe { .. }, Action::Edit { edit: FormEdit::SetId { .. } }) => {
                Err(RecetarioError::IdChange)
            }

            (View::EditRecipe { recipe_id, mut form }, Action::Edit { edit }) => {
                edit.apply(&mut form);
                render(View::EditRecipe { recipe_id, form })
            }

            (View::NewRecipe(mut form), Action::Edit { edit }) => {
                edit.apply(&mut form);
                render(View::NewRecipe(form))
            }

            (View::EditRecipe { recipe_id, mut form }, Action::SubmitRecipe) => {
                let mut dataset = self.store.load()?.dataset;
                form.id = recipe_id.clone();
                let recipe = form.into_recipe(&dataset);
                dataset.update_recipe(&recipe_id, recipe)?;
                self.store.save(&dataset)?;
                Ok(Transition {
                    view: View::Detail {
                        recipe_id,
                        desired_yield: None,
                    },
                    outcome: Outcome::Saved,
                })
            }

            (View::NewRecipe(form), Action::SubmitRecipe) => {
                let mut dataset = self.store.load()?.dataset;
                let recipe = form.into_recipe(&dataset);
                let id = recipe.id.clone();
                dataset.create_recipe(recipe)?;
                self.store.save(&dataset)?;
                Ok(Transition {
                    view: View::Detail {
                        recipe_id: id,
                        desired_yield: None,
                    },
                    outcome: Outcome::Saved,
                })
            }

            (_, Action::DeleteRecipe { recipe_id }) => {
                let mut dataset = self.store.load()?.dataset;
                dataset.delete_recipe(&recipe_id)?;
                self.store.save(&dataset)?;
                Ok(Transition {
                    view: View::Menu,
                    outcome: Outcome::Saved,
                })
            }

            (_, Action::StartEditPrices) => {
                let dataset = self.store.load()?.dataset;
                render(View::EditPrices(PriceForm::from_catalog(&dataset.catalog)))
            }

            (View::EditPrices(mut form), Action::SetPrice { name, cost }) => {
                form.set_cost(&name, cost)?;
                render(View::EditPrices(form))
            }

            (View::EditPrices(form), Action::SubmitPrices) => {
                let mut dataset = self.store.load()?.dataset;
                let updated = form.apply(&dataset.catalog)?;
                dataset.catalog.replace_all(updated);
                self.store.save(&dataset)?;
                Ok(Transition {
                    view: View::EditPrices(PriceForm::from_catalog(&dataset.catalog)),
                    outcome: Outcome::Saved,
                })
            }

            (view, action) => {
                log::debug!("rejecting {:?} on {:?}", action, view);
                Err(RecetarioError::InvalidAction {
                    action: action.name().to_string(),
                    page: view.page().to_string(),
                })
            }
        }
    }

    /// Computes what `view` shows. Scaling errors such as `InvalidYield`
    /// propagate; missing ingredients and a missing data file become warnings.
    pub fn render(&self, view: &View) -> Result<Rendered> {
        let loaded = self.store.load()?;
        let dataset = loaded.dataset;
        let mut warnings: Vec<String> = loaded.warning.iter().map(|w| w.to_string()).collect();

        let screen = match view {
            View::Menu => Screen::Menu {
                recipes: dataset
                    .recipes
                    .iter()
                    .map(|r| RecipeSummary {
                        id: r.id.clone(),
                        name: r.name.clone(),
                        image_ref: r.image_ref.clone(),
                    })
                    .collect(),
            },
            View::Detail {
                recipe_id,
                desired_yield,
            } => {
                let recipe = dataset
                    .recipe(recipe_id)
                    .cloned()
                    .ok_or_else(|| RecetarioError::RecipeNotFound(recipe_id.clone()))?;
                let desired_yield = desired_yield.unwrap_or(recipe.base_yield);
                let table = scale_recipe(&recipe, &dataset.catalog, desired_yield)?;
                warnings.extend(table.warnings().iter().map(|w| w.to_string()));
                Screen::Detail {
                    recipe,
                    desired_yield,
                    table,
                }
            }
            View::EditRecipe { form, .. } | View::NewRecipe(form) => Screen::RecipeForm {
                form: form.clone(),
                is_new: matches!(view, View::NewRecipe(_)),
                ingredient_choices: dataset.catalog.names().map(String::from).collect(),
            },
            View::EditPrices(form) => Screen::Prices {
                form: form.clone(),
                units: dataset
                    .catalog
                    .iter()
                    .map(|(name, ingredient)| (name.clone(), ingredient.unit.clone()))
                    .collect(),
            },
        };

        Ok(Rendered { screen, warnings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Ingredient;
    use crate::login::{SessionStore, SharedSecret};
    use crate::recipe::Dataset;
    use std::time::Duration;
    use tempfile::TempDir;

    fn seeded_store(dir: &TempDir) -> DatasetStore {
        let store = DatasetStore::new(dir.path().join("recetas.json"), Duration::from_secs(60));
        let mut data = Dataset::default();
        data.catalog
            .create_ingredient("harina", Ingredient::new("g", 0.002))
            .unwrap();
        data.create_recipe(Recipe {
            id: "pan".to_string(),
            name: "Pan".to_string(),
            image_ref: "images/pan.jpg".to_string(),
            base_yield: 10.0,
            base_unit: "porciones".to_string(),
            ingredients: vec![
                IngredientLine::new("harina", 200.0),
                IngredientLine::new("azucar", 50.0),
            ],
            steps: vec!["Amasar".to_string()],
        })
        .unwrap();
        store.save(&data).unwrap();
        store
    }

    fn admin() -> AdminToken {
        SessionStore::default()
            .login(&SharedSecret::new("admin123"), "admin123")
            .unwrap()
    }

    #[test]
    fn viewer_scales_a_recipe() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);

        let step = controller
            .handle(
                View::Menu,
                Action::OpenRecipe {
                    recipe_id: "pan".to_string(),
                },
                None,
            )
            .unwrap();
        let step = controller
            .handle(step.view, Action::SetYield { desired_yield: 20.0 }, None)
            .unwrap();
        assert_eq!(step.outcome, Outcome::Render);

        let rendered = controller.render(&step.view).unwrap();
        match rendered.screen {
            Screen::Detail { table, .. } => {
                assert_eq!(table.display_total(), "$0.80");
                assert_eq!(table.missing, vec!["azucar".to_string()]);
            }
            other => panic!("unexpected screen {:?}", other),
        }
        assert_eq!(rendered.warnings.len(), 1);
        assert!(rendered.warnings[0].contains("azucar"));
    }

    #[test]
    fn zero_yield_produces_no_table() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let view = View::Detail {
            recipe_id: "pan".to_string(),
            desired_yield: None,
        };

        assert!(matches!(
            controller.handle(view.clone(), Action::SetYield { desired_yield: 0.0 }, None),
            Err(RecetarioError::InvalidYield { desired, base }) if desired == 0.0 && base == 10.0
        ));
        assert!(matches!(
            controller.render(&View::Detail {
                recipe_id: "pan".to_string(),
                desired_yield: Some(0.0),
            }),
            Err(RecetarioError::InvalidYield { .. })
        ));
    }

    #[test]
    fn mutations_require_admin() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);

        let err = controller
            .handle(
                View::Menu,
                Action::DeleteRecipe {
                    recipe_id: "pan".to_string(),
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, RecetarioError::Unauthorized));
        assert_eq!(store.load().unwrap().dataset.recipes.len(), 1);
    }

    #[test]
    fn new_recipe_form_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let token = admin();

        let mut view = controller
            .handle(View::Menu, Action::StartNewRecipe, Some(&token))
            .unwrap()
            .view;
        for edit in [
            FormEdit::SetName {
                name: "Pan dulce".to_string(),
            },
            FormEdit::SetBaseYield { base_yield: 4.0 },
            FormEdit::AddIngredient {
                line: IngredientLine::new("harina", 100.0),
            },
            FormEdit::AddStep {
                step: "Hornear".to_string(),
            },
        ] {
            view = controller
                .handle(view, Action::Edit { edit }, Some(&token))
                .unwrap()
                .view;
        }

        let step = controller
            .handle(view, Action::SubmitRecipe, Some(&token))
            .unwrap();
        assert_eq!(step.outcome, Outcome::Saved);
        assert_eq!(
            step.view,
            View::Detail {
                recipe_id: "pan_dulce".to_string(),
                desired_yield: None,
            }
        );
        assert_eq!(store.load().unwrap().dataset.recipes.len(), 2);
    }

    #[test]
    fn duplicate_id_on_submit_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let token = admin();

        let mut form = RecipeForm::blank();
        form.id = "pan".to_string();
        form.name = "Otro pan".to_string();

        let err = controller
            .handle(View::NewRecipe(form), Action::SubmitRecipe, Some(&token))
            .unwrap_err();
        assert!(matches!(err, RecetarioError::DuplicateId(_)));

        let dataset = store.load().unwrap().dataset;
        assert_eq!(dataset.recipes.len(), 1);
        assert_eq!(dataset.recipes[0].name, "Pan");
    }

    #[test]
    fn edit_recipe_and_prices() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let token = admin();

        let detail = View::Detail {
            recipe_id: "pan".to_string(),
            desired_yield: None,
        };
        let view = controller
            .handle(detail, Action::StartEditRecipe, Some(&token))
            .unwrap()
            .view;
        let view = controller
            .handle(
                view,
                Action::Edit {
                    edit: FormEdit::RemoveIngredient { index: 1 },
                },
                Some(&token),
            )
            .unwrap()
            .view;
        controller
            .handle(view, Action::SubmitRecipe, Some(&token))
            .unwrap();

        let view = controller
            .handle(View::Menu, Action::StartEditPrices, Some(&token))
            .unwrap()
            .view;
        let view = controller
            .handle(
                view,
                Action::SetPrice {
                    name: "harina".to_string(),
                    cost: 0.004,
                },
                Some(&token),
            )
            .unwrap()
            .view;
        let step = controller
            .handle(view, Action::SubmitPrices, Some(&token))
            .unwrap();
        assert_eq!(step.outcome, Outcome::Saved);

        let rendered = controller
            .render(&View::Detail {
                recipe_id: "pan".to_string(),
                desired_yield: Some(10.0),
            })
            .unwrap();
        assert!(rendered.warnings.is_empty());
        match rendered.screen {
            Screen::Detail { table, .. } => assert_eq!(table.display_total(), "$0.80"),
            other => panic!("unexpected screen {:?}", other),
        }
    }

    #[test]
    fn edit_form_cannot_retarget_another_recipe() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let mut data = store.load().unwrap().dataset;
        data.create_recipe(Recipe {
            id: "flan".to_string(),
            name: "Flan".to_string(),
            image_ref: String::new(),
            base_yield: 6.0,
            base_unit: "porciones".to_string(),
            ingredients: Vec::new(),
            steps: Vec::new(),
        })
        .unwrap();
        store.save(&data).unwrap();

        let controller = Controller::new(&store);
        let token = admin();
        let detail = View::Detail {
            recipe_id: "pan".to_string(),
            desired_yield: None,
        };
        let view = controller
            .handle(detail, Action::StartEditRecipe, Some(&token))
            .unwrap()
            .view;

        let err = controller
            .handle(
                view.clone(),
                Action::Edit {
                    edit: FormEdit::SetId {
                        id: "flan".to_string(),
                    },
                },
                Some(&token),
            )
            .unwrap_err();
        assert!(matches!(err, RecetarioError::IdChange));

        // a client that rewrites the form id itself still updates "pan"
        let tampered = match view {
            View::EditRecipe { recipe_id, mut form } => {
                form.id = "flan".to_string();
                form.name = "Pan integral".to_string();
                View::EditRecipe { recipe_id, form }
            }
            other => panic!("unexpected view {:?}", other),
        };
        let step = controller
            .handle(tampered, Action::SubmitRecipe, Some(&token))
            .unwrap();
        assert_eq!(
            step.view,
            View::Detail {
                recipe_id: "pan".to_string(),
                desired_yield: None,
            }
        );

        let dataset = store.load().unwrap().dataset;
        assert_eq!(dataset.recipe("pan").unwrap().name, "Pan integral");
        assert_eq!(dataset.recipe("flan").unwrap().name, "Flan");
    }

    #[test]
    fn actions_from_the_wrong_page_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let token = admin();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let cases = [
            (View::Menu, Action::SubmitRecipe),
            (
                View::EditPrices(PriceForm::default()),
                Action::SetYield { desired_yield: 2.0 },
            ),
            (
                View::Detail {
                    recipe_id: "pan".to_string(),
                    desired_yield: None,
                },
                Action::SetPrice {
                    name: "harina".to_string(),
                    cost: 1.0,
                },
            ),
            (View::Menu, Action::SubmitPrices),
        ];
        for (view, action) in cases {
            let err = controller.handle(view, action, Some(&token)).unwrap_err();
            assert!(matches!(err, RecetarioError::InvalidAction { .. }), "{}", err);
        }

        let err = controller
            .handle(View::Menu, Action::SubmitRecipe, Some(&token))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "action 'submit_recipe' does not apply to the menu page"
        );
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn failed_edit_submit_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let store = seeded_store(&dir);
        let controller = Controller::new(&store);
        let token = admin();
        let before = std::fs::read_to_string(store.path()).unwrap();

        let mut form = RecipeForm::from_recipe(store.load().unwrap().dataset.recipe("pan").unwrap());
        form.ingredients[0].quantity_at_base = -3.0;
        let view = View::EditRecipe {
            recipe_id: "pan".to_string(),
            form,
        };

        let err = controller
            .handle(view, Action::SubmitRecipe, Some(&token))
            .unwrap_err();
        assert!(matches!(err, RecetarioError::InvalidQuantity { .. }));
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn missing_data_file_renders_empty_menu_with_warning() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path().join("nada.json"), Duration::from_secs(60));
        let rendered = Controller::new(&store).render(&View::Menu).unwrap();

        assert_eq!(rendered.screen, Screen::Menu { recipes: Vec::new() });
        assert_eq!(rendered.warnings.len(), 1);
    }
}
