//! What2Craft
//!
//! A crafting cost and profit calculator for Animal Crossing: New Horizons.

mod calculator;
mod db;
mod engine;
mod error;
mod extract;
mod models;
mod storage;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::db::{SqliteCatalog, SqliteStore};
use crate::engine::{LoadState, QuantityUpdate, RecipeEngine};
use crate::extract::{CatalogSource, JsonCatalogFile};
use crate::models::{CatalogItem, Item};

#[derive(Parser)]
#[command(name = "what2craft")]
#[command(about = "Crafting cost and profit calculator for Animal Crossing: New Horizons")]
struct Cli {
    /// Path to the SQLite database holding the catalog and your saved state
    #[arg(short, long, default_value = "what2craft.db")]
    database: PathBuf,

    /// Read the catalog from a flat JSON file instead of the database
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty database with schema
    Init,

    /// Import the item catalog from a directory of item documents or a JSON file
    Import {
        /// Item directory or flat catalog file
        source: PathBuf,

        /// Clear the existing catalog before importing
        #[arg(long)]
        clear: bool,
    },

    /// Load sample data for testing (without item data)
    LoadSample,

    /// List ingredients and how many of each you own
    Ingredients,

    /// Record how many of an ingredient you own (omit the value to clear it)
    SetQuantity {
        /// Ingredient ID
        id: String,

        /// Owned quantity
        #[arg(default_value = "", allow_hyphen_values = true)]
        value: String,
    },

    /// Show the current hot items and the recipes that can be selected
    Hot,

    /// Set a hot item slot (omit the recipe to clear it)
    SetHot {
        /// Slot number (1 or 2)
        slot: u8,

        /// Recipe ID
        recipe: Option<String>,
    },

    /// List recipes you can craft with the ingredients you own
    Craftable {
        /// Show the nested recipe of each item
        #[arg(short, long)]
        verbose: bool,
    },

    /// List all recipes except hidden ones
    All {
        /// Show the nested recipe of each item
        #[arg(short, long)]
        verbose: bool,
    },

    /// List hidden recipes
    Hidden {
        /// Show the nested recipe of each item
        #[arg(short, long)]
        verbose: bool,
    },

    /// Hide a recipe from the craftable and all lists
    Hide {
        /// Recipe ID
        id: String,
    },

    /// Show a previously hidden recipe again
    Unhide {
        /// Recipe ID
        id: String,
    },
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open database {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Database initialized at: {}", cli.database.display());
        }

        Commands::Import { source, clear } => {
            if clear {
                info!("clearing existing catalog");
                db::clear_catalog(&conn)?;
            }

            let stats = extract::extract_to_database(&conn, &source)?;
            println!("{}", stats);
            println!("Catalog now holds {} items", db::count_items(&conn)?);
        }

        Commands::LoadSample => {
            load_sample_data(&conn)?;
            println!("Sample data loaded successfully!");
        }

        Commands::Ingredients => {
            let engine = open_engine(&conn, cli.catalog)?;
            println!("{:<30} {:>8}", "Ingredient", "Owned");
            println!("{}", "-".repeat(39));
            for ingredient in engine.ingredients() {
                let owned = engine
                    .ingredient_quantity(&ingredient.id)
                    .map_or_else(String::new, |q| q.to_string());
                println!("{:<30} {:>8}", ingredient.name, owned);
            }
        }

        Commands::SetQuantity { id, value } => {
            let mut engine = open_engine(&conn, cli.catalog)?;
            if engine.item(&id).is_none() {
                warn!(ingredient = %id, "not a known item");
            }
            match engine.set_ingredient_quantity(&id, &value)? {
                QuantityUpdate::Set(quantity) => println!("{}: {}", id, quantity),
                QuantityUpdate::Cleared => println!("{}: cleared", id),
                QuantityUpdate::Invalid => {
                    println!("{}: '{}' is not a number, quantity cleared", id, value)
                }
            }
        }

        Commands::Hot => {
            let engine = open_engine(&conn, cli.catalog)?;
            for (slot, item) in engine.hot_items().iter().enumerate() {
                let name = item.map_or("(None)", |item| item.name.as_str());
                println!("Hot Item {}: {}", slot + 1, name);
            }
            println!();
            println!("Selectable recipes:");
            for recipe in engine.list_hot_item_candidates() {
                println!("  {:<30} {}", recipe.name, recipe.id);
            }
        }

        Commands::SetHot { slot, recipe } => {
            let mut engine = open_engine(&conn, cli.catalog)?;
            engine.set_hot_item(slot, recipe.as_deref())?;
            match engine.hot_items()[usize::from(slot) - 1] {
                Some(item) => println!(
                    "Hot Item {}: {} (sells for {})",
                    slot, item.name, item.sell_price
                ),
                None => println!("Hot Item {}: (None)", slot),
            }
        }

        Commands::Craftable { verbose } => {
            let engine = open_engine(&conn, cli.catalog)?;
            print_recipes(&engine, &engine.list_craftable(), verbose);
        }

        Commands::All { verbose } => {
            let engine = open_engine(&conn, cli.catalog)?;
            print_recipes(&engine, &engine.list_visible(), verbose);
        }

        Commands::Hidden { verbose } => {
            let engine = open_engine(&conn, cli.catalog)?;
            print_recipes(&engine, &engine.list_hidden(), verbose);
        }

        Commands::Hide { id } => {
            let mut engine = open_engine(&conn, cli.catalog)?;
            if engine.hide(&id)? {
                println!("Hidden: {}", id);
            } else {
                println!("'{}' was already hidden", id);
            }
        }

        Commands::Unhide { id } => {
            let mut engine = open_engine(&conn, cli.catalog)?;
            if engine.unhide(&id)? {
                println!("Unhidden: {}", id);
            } else {
                println!("'{}' was not hidden", id);
            }
        }
    }

    Ok(())
}

/// Build the engine from the configured catalog, with user state in `conn`
fn open_engine(conn: &Connection, catalog: Option<PathBuf>) -> Result<RecipeEngine<SqliteStore<'_>>> {
    let source: Box<dyn CatalogSource + '_> = match catalog {
        Some(path) => Box::new(JsonCatalogFile::new(path)),
        None => Box::new(SqliteCatalog::new(conn)),
    };

    let mut engine = RecipeEngine::new(SqliteStore::new(conn));
    if let Err(e) = engine.load(source.as_ref()) {
        if let LoadState::Failed(reason) = engine.state() {
            bail!("Item catalog unavailable: {}", reason);
        }
        return Err(e).context("Failed to restore saved state");
    }
    if engine.items_by_id().is_empty() {
        println!("No items in catalog. Run 'import' or 'load-sample' first.");
    }
    Ok(engine)
}

fn print_recipes(engine: &RecipeEngine<SqliteStore<'_>>, recipes: &[&Item], verbose: bool) {
    if recipes.is_empty() {
        println!("No recipes.");
        return;
    }

    println!(
        "{:<30} {:>10} {:>8} {:>10}",
        "Recipe", "Profit", "Markup", "Sell Price"
    );
    println!("{}", "-".repeat(61));
    for recipe in recipes {
        println!(
            "{:<30} {:>10} {:>8.2} {:>10}",
            recipe.name, recipe.profit, recipe.markup, recipe.sell_price
        );
        if verbose {
            print!(
                "{}",
                calculator::format_nested_recipe(engine.items_by_id(), &recipe.nested_recipe, 1)
            );
        }
    }
}

/// Load a small sample catalog for trying the tool without item data
fn load_sample_data(conn: &Connection) -> Result<()> {
    db::clear_catalog(conn)?;

    let catalog = vec![
        CatalogItem::ingredient("tree-branch", "Tree Branch", None, Some(5.0)),
        CatalogItem::ingredient("wood", "Wood", None, Some(60.0)),
        CatalogItem::ingredient("softwood", "Softwood", None, Some(60.0)),
        CatalogItem::ingredient("hardwood", "Hardwood", None, Some(60.0)),
        CatalogItem::ingredient("stone", "Stone", None, Some(75.0)),
        CatalogItem::ingredient("clay", "Clay", None, Some(100.0)),
        CatalogItem::ingredient("iron-nugget", "Iron Nugget", None, Some(375.0)),
        CatalogItem::ingredient("gold-nugget", "Gold Nugget", None, Some(10000.0)),
        CatalogItem::ingredient("cotton-boll", "Cotton Boll", Some(800.0), Some(200.0)),
        CatalogItem::recipe("flimsy-axe", "Flimsy Axe", Some(80.0), &[("tree-branch", 5), ("stone", 1)]),
        CatalogItem::recipe("axe", "Axe", Some(625.0), &[("flimsy-axe", 1), ("wood", 3), ("iron-nugget", 1)]),
        CatalogItem::recipe("golden-axe", "Golden Axe", Some(10375.0), &[("axe", 1), ("gold-nugget", 1)]),
        CatalogItem::recipe("wooden-stool", "Wooden Stool", Some(540.0), &[("wood", 3), ("softwood", 3)]),
        CatalogItem::recipe("log-bench", "Log Bench", Some(720.0), &[("wood", 4), ("hardwood", 4)]),
        CatalogItem::recipe("clay-furnace", "Clay Furnace", Some(3200.0), &[("clay", 5), ("iron-nugget", 3), ("stone", 5)]),
        CatalogItem::recipe("simple-bed", "Simple Bed", Some(1320.0), &[("log-bench", 1), ("cotton-boll", 1)]),
        CatalogItem::recipe("stone-stool", "Stone Stool", Some(1500.0), &[("stone", 5)]),
    ];

    for (position, item) in catalog.iter().enumerate() {
        db::upsert_item(conn, item, position)?;
    }

    info!(items = catalog.len(), "loaded sample catalog");
    println!("Loaded {} sample items", catalog.len());
    Ok(())
}
