//! Database schema and operations

use std::collections::HashMap;

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use crate::error::{CatalogError, StorageError};
use crate::extract::CatalogSource;
use crate::models::{CatalogItem, RecipeComponent};
use crate::storage::KeyValueStore;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Catalog items, in catalog order
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            buy_price REAL,
            sell_price REAL,
            has_recipe INTEGER NOT NULL DEFAULT 0,
            position INTEGER NOT NULL
        );

        -- Recipe components, in recipe order
        CREATE TABLE IF NOT EXISTS recipe_components (
            item_id TEXT NOT NULL,
            component_id TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (item_id, component_id)
        );

        -- Per-key user state (owned quantities, hidden markers, hot items)
        CREATE TABLE IF NOT EXISTS local_storage (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_items_position ON items(position);
        CREATE INDEX IF NOT EXISTS idx_recipe_components_item ON recipe_components(item_id);
        "#,
    )?;
    Ok(())
}

/// Insert or replace a catalog item and its recipe
pub fn upsert_item(conn: &Connection, item: &CatalogItem, position: usize) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO items (id, name, buy_price, sell_price, has_recipe, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (
            &item.id,
            &item.name,
            item.buy_price,
            item.sell_price,
            item.recipe.is_some(),
            position as i64,
        ),
    )?;

    conn.execute(
        "DELETE FROM recipe_components WHERE item_id = ?1",
        [&item.id],
    )?;
    for (index, component) in item.recipe.iter().flatten().enumerate() {
        conn.execute(
            "INSERT OR REPLACE INTO recipe_components (item_id, component_id, quantity, position)
             VALUES (?1, ?2, ?3, ?4)",
            (&item.id, &component.item_id, component.quantity, index as i64),
        )?;
    }
    Ok(())
}

/// Clear the catalog (for re-import). User state is kept.
pub fn clear_catalog(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DELETE FROM recipe_components;
        DELETE FROM items;
        "#,
    )?;
    Ok(())
}

/// Number of items in the catalog
pub fn count_items(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// Read the whole catalog in catalog order
pub fn load_catalog(conn: &Connection) -> rusqlite::Result<Vec<CatalogItem>> {
    let mut stmt = conn.prepare(
        "SELECT item_id, component_id, quantity
         FROM recipe_components
         ORDER BY item_id, position",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            RecipeComponent {
                item_id: row.get(1)?,
                quantity: row.get(2)?,
            },
        ))
    })?;

    let mut components: HashMap<String, Vec<RecipeComponent>> = HashMap::new();
    for row in rows {
        let (item_id, component) = row?;
        components.entry(item_id).or_default().push(component);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, buy_price, sell_price, has_recipe
         FROM items
         ORDER BY position, id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            CatalogItem {
                id: row.get(0)?,
                name: row.get(1)?,
                buy_price: row.get(2)?,
                sell_price: row.get(3)?,
                recipe: None,
            },
            row.get::<_, bool>(4)?,
        ))
    })?;

    let mut results = Vec::new();
    for row in rows {
        let (mut item, has_recipe) = row?;
        if has_recipe {
            item.recipe = Some(components.remove(&item.id).unwrap_or_default());
        }
        results.push(item);
    }
    Ok(results)
}

/// Catalog source backed by the `items` tables
pub struct SqliteCatalog<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCatalog<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl CatalogSource for SqliteCatalog<'_> {
    fn fetch(&self) -> Result<Vec<CatalogItem>, CatalogError> {
        Ok(load_catalog(self.conn)?)
    }
}

/// Key-value store backed by the `local_storage` table
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM local_storage WHERE key = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO local_storage (key, value) VALUES (?1, ?2)",
            (key, value),
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM local_storage WHERE key = ?1", [key])?;
        Ok(())
    }
}
