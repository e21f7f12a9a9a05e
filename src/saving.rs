use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use crate::error::{RecetarioError, Result};
use crate::recipe::Dataset;

pub const DEFAULT_DATA_FILE: &str = "data/recetas.json";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// What a [`DatasetStore::load`] produced.
///
/// `warning` is `Some(StorageNotFound)` when the data file does not exist and
/// `dataset` is the empty default.
#[derive(Debug)]
pub struct Loaded {
    pub dataset: Dataset,
    pub warning: Option<RecetarioError>,
}

#[derive(Clone)]
struct CachedRead {
    read_at: Instant,
    dataset: Dataset,
    found: bool,
}

/// Whole-document JSON persistence for the [`Dataset`], with a short-lived
/// read cache that every successful save invalidates.
pub struct DatasetStore {
    path: PathBuf,
    ttl: Duration,
    cache: Mutex<Option<CachedRead>>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        DatasetStore {
            path: path.into(),
            ttl,
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Loaded> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(cached) = cache.as_ref() {
            if cached.read_at.elapsed() < self.ttl {
                return Ok(self.loaded(cached.dataset.clone(), cached.found));
            }
        }

        let (dataset, found) = match read_dataset(&self.path) {
            Ok(dataset) => (dataset, true),
            Err(RecetarioError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                log::warn!("data file {} not found, starting empty", self.path.display());
                (Dataset::default(), false)
            }
            Err(e) => {
                log::error!("failed to load {}: {}", self.path.display(), e);
                return Err(e);
            }
        };

        *cache = Some(CachedRead {
            read_at: Instant::now(),
            dataset: dataset.clone(),
            found,
        });
        Ok(self.loaded(dataset, found))
    }

    /// Overwrites the data file with `dataset` in one step. The document is
    /// written to a temporary file next to the target and then renamed over it.
    pub fn save(&self, dataset: &Dataset) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            write_pretty(&mut writer, dataset)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| RecetarioError::Io(e.error))?;

        self.invalidate();
        log::info!(
            "saved {} recipes and {} ingredients to {}",
            dataset.recipes.len(),
            dataset.catalog.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn invalidate(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        *cache = None;
    }

    fn loaded(&self, dataset: Dataset, found: bool) -> Loaded {
        Loaded {
            dataset,
            warning: (!found).then(|| RecetarioError::StorageNotFound(self.path.clone())),
        }
    }
}

impl Default for DatasetStore {
    fn default() -> Self {
        DatasetStore::new(DEFAULT_DATA_FILE, DEFAULT_CACHE_TTL)
    }
}

fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let dataset = serde_json::from_reader(reader)?;
    Ok(dataset)
}

// 4-space indent, UTF-8 written as-is
fn write_pretty<W: Write>(writer: W, dataset: &Dataset) -> Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    dataset.serialize(&mut serializer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Ingredient;
    use crate::recipe::{IngredientLine, Recipe};
    use tempfile::TempDir;

    fn sample() -> Dataset {
        let mut data = Dataset::default();
        data.catalog
            .create_ingredient("azúcar", Ingredient::new("g", 0.003))
            .unwrap();
        data.create_recipe(Recipe {
            id: "flan".to_string(),
            name: "Flan de café".to_string(),
            image_ref: "images/flan.jpg".to_string(),
            base_yield: 8.0,
            base_unit: "porciones".to_string(),
            ingredients: vec![IngredientLine::new("azúcar", 150.0)],
            steps: vec!["Caramelizar".to_string()],
        })
        .unwrap();
        data
    }

    #[test]
    fn missing_file_yields_empty_dataset_with_warning() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path().join("recetas.json"), DEFAULT_CACHE_TTL);

        let loaded = store.load().unwrap();
        assert_eq!(loaded.dataset, Dataset::default());
        assert!(matches!(loaded.warning, Some(RecetarioError::StorageNotFound(_))));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recetas.json");
        fs::write(&path, "{ \"recetas\": [ ").unwrap();

        let store = DatasetStore::new(&path, DEFAULT_CACHE_TTL);
        assert!(matches!(store.load(), Err(RecetarioError::Json(_))));
    }

    #[test]
    fn save_creates_parent_dir_and_keeps_unicode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data").join("recetas.json");
        let store = DatasetStore::new(&path, DEFAULT_CACHE_TTL);

        store.save(&sample()).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("Flan de café"));
        assert!(text.contains("\n    \"ingredientes_globales\""));
        assert_eq!(store.load().unwrap().dataset, sample());
    }

    #[test]
    fn save_invalidates_cache() {
        let dir = TempDir::new().unwrap();
        let store = DatasetStore::new(dir.path().join("recetas.json"), Duration::from_secs(3600));

        // prime the cache with the not-found result
        assert!(store.load().unwrap().warning.is_some());

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap();
        assert!(loaded.warning.is_none());
        assert_eq!(loaded.dataset.recipes.len(), 1);
    }

    #[test]
    fn cache_hides_outside_writes_until_expiry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recetas.json");
        let store = DatasetStore::new(&path, Duration::from_secs(3600));
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap().dataset.recipes.len(), 1);

        fs::write(&path, r#"{"ingredientes_globales": {}, "recetas": []}"#).unwrap();
        assert_eq!(store.load().unwrap().dataset.recipes.len(), 1);

        store.invalidate();
        assert!(store.load().unwrap().dataset.recipes.is_empty());
    }

    #[test]
    fn zero_ttl_always_rereads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("recetas.json");
        let store = DatasetStore::new(&path, Duration::ZERO);
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap().dataset.recipes.len(), 1);

        fs::write(&path, r#"{"ingredientes_globales": {}, "recetas": []}"#).unwrap();
        assert!(store.load().unwrap().dataset.recipes.is_empty());
    }
}
