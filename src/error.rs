use std::path::PathBuf;
use thiserror::Error;

/// Every failure the recipe catalog can report.
///
/// `MissingIngredient` and `StorageNotFound` are recoverable: the calculator and
/// the store hand them back as warnings next to a usable result. Everything
/// else aborts the operation that raised it without mutating anything.
#[derive(Debug, Error)]
pub enum RecetarioError {
    #[error("invalid yield: desired {desired}, base {base} (both must be greater than zero)")]
    InvalidYield { desired: f64, base: f64 },

    #[error("base yield must be a finite number greater than zero (got {0})")]
    InvalidBaseYield(f64),

    #[error("ingredient '{name}' is not in the catalog")]
    MissingIngredient { name: String },

    #[error("a recipe with id '{0}' already exists")]
    DuplicateId(String),

    #[error("an ingredient named '{0}' already exists")]
    DuplicateName(String),

    #[error("data file '{}' was not found", .0.display())]
    StorageNotFound(PathBuf),

    #[error("recipe '{0}' not found")]
    RecipeNotFound(String),

    #[error("ingredient '{0}' not found")]
    IngredientNotFound(String),

    #[error("recipe id cannot be empty")]
    EmptyId,

    #[error("quantity for '{ingredient}' must be a finite number >= 0 (got {quantity})")]
    InvalidQuantity { ingredient: String, quantity: f64 },

    #[error("cost for '{name}' must be a finite number >= 0 (got {cost})")]
    InvalidCost { name: String, cost: f64 },

    #[error("action '{action}' does not apply to the {page} page")]
    InvalidAction { action: String, page: String },

    #[error("the id of an existing recipe cannot be changed")]
    IdChange,

    #[error("administrator access required")]
    Unauthorized,

    #[error("spreadsheet error: {0}")]
    Sheet(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt data file: {0}")]
    Json(#[from] serde_json::Error),
}

impl RecetarioError {
    /// True for the conditions callers surface as a warning and keep going.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            RecetarioError::MissingIngredient { .. } | RecetarioError::StorageNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecetarioError>;
