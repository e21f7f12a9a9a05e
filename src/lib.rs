/*!
# Recetario

Recipe catalog and cost calculator for a small bakery, built in Rust.

## Overview

Viewers browse recipes and scale any of them to a desired batch size, getting
per-ingredient quantities and costs. An administrator, admitted through a
pluggable password gate, creates, edits and deletes recipes and maintains the
global ingredient price list, which can also be exchanged as a spreadsheet.

## Architecture

### Core
- **Catalog** - Ingredient name to base unit and cost per unit; the single
  source of truth for prices
- **Recipes** - Base yield, ordered ingredient lines (by catalog name) and
  ordered preparation steps
- **Calculator** - Scales a recipe to a desired yield and prices each line;
  lines whose ingredient is not in the catalog are skipped with a warning

### Data Persistence Layer
- One JSON document holding the catalog (`ingredientes_globales`) and the
  recipes (`recetas`), overwritten whole on every save
- Short-lived read cache, invalidated by each save
- CSV and XLSX import/export of the catalog (`Nombre`, `Unidad_Base`,
  `Costo_Por_Unidad`)

### Interaction
- Explicit `View` values and per-page form state, advanced by a `Controller`
- Web driver (feature `web`): axum JSON API, cookie sessions, image serving

## Modules

- **catalog**: Ingredient price list
- **recipe**: Recipes, the persisted dataset and its validation rules
- **calculator**: Recipe cost scaling
- **saving**: Dataset store with cached reads
- **loader** / **downloader**: Spreadsheet import and export of the catalog
- **login**: Administrator gate and sessions
- **view** / **controller**: Page state and transitions
- **app** / **config**: Web server and its configuration (feature `web`)
*/

pub mod calculator;
pub mod catalog;
pub mod controller;
pub mod downloader;
pub mod error;
pub mod loader;
pub mod login;
pub mod recipe;
pub mod saving;
pub mod view;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod config;

/// Re-export the everyday types to make them easier to use
pub use calculator::{CostRow, CostTable, scale_recipe};
pub use catalog::{Catalog, Ingredient};
pub use controller::{Action, Controller, FormEdit, Outcome, Screen};
pub use error::{RecetarioError, Result};
pub use login::{AdminGate, AdminToken, HashedSecret, SessionStore, SharedSecret};
pub use recipe::{Dataset, IngredientLine, Recipe};
pub use saving::{DatasetStore, Loaded};
pub use view::{PriceForm, RecipeForm, View};
