//! Item catalog extraction
//!
//! Reads item data either from a directory of per-item JSON documents (one
//! file per item, game data nested under `games.nh`) or from a single JSON
//! file holding the flat catalog array, and populates the database.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db;
use crate::error::CatalogError;
use crate::models::{CatalogItem, RecipeComponent};

/// A single read of the whole item catalog
pub trait CatalogSource {
    fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError>;
}

/// Catalog source reading a flat JSON array of items
pub struct JsonCatalogFile {
    path: PathBuf,
}

impl JsonCatalogFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonCatalogFile {
    fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        read_catalog_file(&self.path)
    }
}

/// Read a flat catalog array: `[{id, name, buyPrice?, sellPrice?, recipe?}]`
pub fn read_catalog_file(path: &Path) -> Result<Vec<CatalogItem>, CatalogError> {
    let file = File::open(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CatalogError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ItemDocument {
    id: String,
    name: String,
    #[serde(default)]
    games: GamesNode,
}

#[derive(Debug, Default, Deserialize)]
struct GamesNode {
    nh: Option<NewHorizonsNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewHorizonsNode {
    #[serde(default)]
    buy_prices: Option<Vec<PriceNode>>,
    sell_price: Option<PriceNode>,
    recipe: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PriceNode {
    #[serde(default)]
    value: Value,
}

/// Find all item documents in a directory (not recursive)
pub fn find_item_files(items_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(items_dir)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse a single item document
///
/// Returns `None` for items that do not appear in New Horizons.
fn parse_item_document(path: &Path) -> Result<Option<CatalogItem>, CatalogError> {
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: ItemDocument =
        serde_json::from_str(&content).map_err(|source| CatalogError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    let Some(nh) = document.games.nh else {
        return Ok(None);
    };

    let buy_prices = nh.buy_prices.unwrap_or_default();
    if buy_prices.len() > 1 {
        warn!(item = %document.id, count = buy_prices.len(), "item with multiple buy prices");
    }
    let buy_price = buy_prices.first().and_then(|price| price.value.as_f64());
    let sell_price = nh.sell_price.and_then(|price| price.value.as_f64());

    let recipe = match nh.recipe {
        Some(Value::Object(entries)) => Some(
            entries
                .into_iter()
                .filter_map(|(item_id, quantity)| {
                    match quantity.as_u64().and_then(|q| u32::try_from(q).ok()) {
                        Some(quantity) => Some(RecipeComponent { item_id, quantity }),
                        None => {
                            warn!(item = %document.id, component = %item_id, "skipping recipe component with invalid quantity");
                            None
                        }
                    }
                })
                .collect(),
        ),
        _ => None,
    };

    Ok(Some(CatalogItem {
        id: document.id,
        name: document.name,
        buy_price,
        sell_price,
        recipe,
    }))
}

/// Keep only crafting items and the items their recipes reference
///
/// Referenced ids missing from `all_items` are replaced by a placeholder
/// ingredient named after its id. Output is ordered by id.
fn collect_crafting_items(all_items: &HashMap<String, CatalogItem>, stats: &mut ExtractStats) -> Vec<CatalogItem> {
    let mut crafting: BTreeMap<String, CatalogItem> = BTreeMap::new();

    for item in all_items.values().filter(|item| item.recipe.is_some()) {
        crafting.insert(item.id.clone(), item.clone());
        stats.recipes += 1;

        for component in item.recipe.iter().flatten() {
            if crafting.contains_key(&component.item_id) {
                continue;
            }
            let ingredient = match all_items.get(&component.item_id) {
                Some(found) => found.clone(),
                None => {
                    warn!(id = %component.item_id, "missing recipe ingredient");
                    stats.placeholders += 1;
                    CatalogItem::ingredient(&component.item_id, &component.item_id, None, None)
                }
            };
            crafting.insert(component.item_id.clone(), ingredient);
        }
    }

    crafting.into_values().collect()
}

/// Read a catalog from a directory of item documents
pub fn extract_item_directory(items_dir: &Path, stats: &mut ExtractStats) -> Result<Vec<CatalogItem>> {
    info!(dir = %items_dir.display(), "scanning for item documents");
    let files = find_item_files(items_dir)?;
    info!(count = files.len(), "found item documents");

    let mut all_items = HashMap::new();
    for path in &files {
        match parse_item_document(path) {
            Ok(Some(item)) => {
                debug!(id = %item.id, "parsed item");
                all_items.insert(item.id.clone(), item);
            }
            Ok(None) => stats.skipped += 1,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to parse item document");
                stats.errors += 1;
            }
        }
    }

    Ok(collect_crafting_items(&all_items, stats))
}

/// Import a catalog into the database from a directory or a flat JSON file
pub fn extract_to_database(conn: &Connection, source: &Path) -> Result<ExtractStats> {
    let mut stats = ExtractStats::default();

    let catalog = if source.is_dir() {
        extract_item_directory(source, &mut stats)?
    } else {
        let catalog = read_catalog_file(source)
            .with_context(|| format!("Failed to read catalog {}", source.display()))?;
        stats.recipes = catalog.iter().filter(|item| item.recipe.is_some()).count();
        catalog
    };

    for (position, item) in catalog.iter().enumerate() {
        db::upsert_item(conn, item, position)
            .with_context(|| format!("Failed to store item {}", item.id))?;
    }
    stats.items = catalog.len();

    Ok(stats)
}

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub items: usize,
    pub recipes: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl std::fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} items ({} recipes, {} placeholders). Skipped: {}, Errors: {}",
            self.items, self.recipes, self.placeholders, self.skipped, self.errors
        )
    }
}
