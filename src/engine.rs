//! Recipe engine: the catalog plus per-user state
//!
//! The engine is built in two passes. The first indexes every item by id,
//! classifies it as ingredient or recipe, and hydrates persisted user state.
//! The second computes unit costs and nested recipes, which may reference any
//! item regardless of catalog order. Costs are computed once; only sell-price
//! driven fields (profit, markup, sort order) change afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::calculator;
use crate::error::EngineError;
use crate::extract::CatalogSource;
use crate::models::{CatalogItem, Item};
use crate::storage::{hidden_key, hot_item_key, quantity_key, KeyValueStore};

pub const HOT_ITEM_SLOTS: usize = 2;

/// Sell price multiplier while a recipe occupies a hot item slot
const HOT_ITEM_MULTIPLIER: f64 = 2.0;

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([+-]?\d+)").expect("valid regex"));

/// Parse the leading integer of user input, e.g. `"12abc"` is 12
///
/// Returns `None` for input that is not a non-negative integer.
pub fn parse_quantity(raw: &str) -> Option<u32> {
    let captures = LEADING_INTEGER.captures(raw)?;
    captures[1].parse::<i64>().ok().and_then(|n| u32::try_from(n).ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
    Failed(String),
}

/// Outcome of [`RecipeEngine::set_ingredient_quantity`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityUpdate {
    Set(u32),
    Cleared,
    /// Input was not a number; the quantity is now absent
    Invalid,
}

pub struct RecipeEngine<S: KeyValueStore> {
    store: S,
    state: LoadState,
    items_by_id: HashMap<String, Item>,
    /// Ingredient ids, by name
    ingredients: Vec<String>,
    /// Recipe ids, by markup, profit, then name
    recipes: Vec<String>,
    ingredient_quantities: HashMap<String, u32>,
    hot_item_ids: [Option<String>; HOT_ITEM_SLOTS],
    hidden_recipe_ids: HashSet<String>,
}

impl<S: KeyValueStore> RecipeEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            state: LoadState::Loading,
            items_by_id: HashMap::new(),
            ingredients: Vec::new(),
            recipes: Vec::new(),
            ingredient_quantities: HashMap::new(),
            hot_item_ids: Default::default(),
            hidden_recipe_ids: HashSet::new(),
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Fetch the catalog and build the model
    ///
    /// A failed fetch leaves the model empty and the state `Failed`.
    pub fn load(&mut self, source: &dyn CatalogSource) -> Result<(), EngineError> {
        match source.fetch() {
            Ok(catalog) => self.build(catalog),
            Err(e) => {
                error!(error = %e, "failed to fetch item catalog");
                self.state = LoadState::Failed(e.to_string());
                Err(EngineError::CatalogUnavailable(e))
            }
        }
    }

    fn build(&mut self, catalog: Vec<CatalogItem>) -> Result<(), EngineError> {
        self.items_by_id.clear();
        self.ingredients.clear();
        self.recipes.clear();
        self.ingredient_quantities.clear();
        self.hidden_recipe_ids.clear();
        self.hot_item_ids = Default::default();

        // Pass 1: index, classify, hydrate
        for record in catalog {
            let item = Item::from_catalog(record);
            if item.is_recipe {
                self.recipes.push(item.id.clone());
            } else {
                self.ingredients.push(item.id.clone());
            }
            self.hydrate(&item.id)?;
            self.items_by_id.insert(item.id.clone(), item);
        }

        // Pass 2: costs and nested recipes
        let mut derived = Vec::with_capacity(self.items_by_id.len());
        for id in self.items_by_id.keys() {
            let cost = calculator::unit_cost(&self.items_by_id, id, &mut Vec::new());
            let nested = calculator::expand_recipe(&self.items_by_id, id, &mut Vec::new());
            derived.push((id.clone(), cost, nested));
        }
        for (id, cost, nested) in derived {
            if let Some(item) = self.items_by_id.get_mut(&id) {
                item.cost = cost;
                item.nested_recipe = nested;
                calculator::update_economics(item);
            }
        }

        for slot in 1..=HOT_ITEM_SLOTS as u8 {
            self.hydrate_hot_item(slot)?;
        }

        calculator::sort_recipes(&self.items_by_id, &mut self.recipes);
        let items = &self.items_by_id;
        self.ingredients
            .sort_by(|a, b| items[a].name.cmp(&items[b].name));

        self.state = LoadState::Ready;
        info!(
            ingredients = self.ingredients.len(),
            recipes = self.recipes.len(),
            "catalog loaded"
        );
        Ok(())
    }

    fn hydrate(&mut self, item_id: &str) -> Result<(), EngineError> {
        if let Some(raw) = self.store.get(&quantity_key(item_id))? {
            match parse_quantity(&raw) {
                Some(quantity) => {
                    self.ingredient_quantities.insert(item_id.to_string(), quantity);
                }
                None => warn!(item = %item_id, value = %raw, "ignoring malformed stored quantity"),
            }
        }
        if self.store.get(&hidden_key(item_id))?.is_some() {
            self.hidden_recipe_ids.insert(item_id.to_string());
        }
        Ok(())
    }

    fn hydrate_hot_item(&mut self, slot: u8) -> Result<(), EngineError> {
        let key = hot_item_key(slot);
        let Some(recipe_id) = self.store.get(&key)? else {
            return Ok(());
        };

        if self.recipe(&recipe_id).is_some() {
            self.hot_item_ids[usize::from(slot) - 1] = Some(recipe_id.clone());
            self.refresh_sell_price(&recipe_id);
        } else {
            warn!(slot, recipe = %recipe_id, "dropping stored hot item that is not a recipe");
            self.store.remove(&key)?;
        }
        Ok(())
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items_by_id.get(id)
    }

    fn recipe(&self, id: &str) -> Option<&Item> {
        self.items_by_id.get(id).filter(|item| item.is_recipe)
    }

    pub fn items_by_id(&self) -> &HashMap<String, Item> {
        &self.items_by_id
    }

    /// Ingredients sorted by name
    pub fn ingredients(&self) -> Vec<&Item> {
        self.ingredients
            .iter()
            .filter_map(|id| self.items_by_id.get(id))
            .collect()
    }

    pub fn ingredient_quantity(&self, ingredient_id: &str) -> Option<u32> {
        self.ingredient_quantities.get(ingredient_id).copied()
    }

    /// Record how many of an ingredient the user owns
    ///
    /// An empty value clears the quantity. Anything that does not parse as a
    /// non-negative integer leaves the quantity absent.
    pub fn set_ingredient_quantity(
        &mut self,
        ingredient_id: &str,
        raw_value: &str,
    ) -> Result<QuantityUpdate, EngineError> {
        let key = quantity_key(ingredient_id);
        if raw_value.is_empty() {
            self.ingredient_quantities.remove(ingredient_id);
            self.store.remove(&key)?;
            return Ok(QuantityUpdate::Cleared);
        }

        match parse_quantity(raw_value) {
            Some(quantity) => {
                self.ingredient_quantities
                    .insert(ingredient_id.to_string(), quantity);
                self.store.set(&key, &quantity.to_string())?;
                debug!(ingredient = %ingredient_id, quantity, "quantity set");
                Ok(QuantityUpdate::Set(quantity))
            }
            None => {
                self.ingredient_quantities.remove(ingredient_id);
                self.store.remove(&key)?;
                warn!(ingredient = %ingredient_id, value = %raw_value, "quantity is not a number");
                Ok(QuantityUpdate::Invalid)
            }
        }
    }

    /// Recipes offered for the hot item slots: every recipe except the last
    /// in sort order, alphabetically
    pub fn list_hot_item_candidates(&self) -> Vec<&Item> {
        let keep = self.recipes.len().saturating_sub(1);
        let mut candidates: Vec<&Item> = self.recipes[..keep]
            .iter()
            .filter_map(|id| self.items_by_id.get(id))
            .collect();
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
        candidates
    }

    pub fn hot_items(&self) -> [Option<&Item>; HOT_ITEM_SLOTS] {
        let mut hot = [None; HOT_ITEM_SLOTS];
        for (slot, id) in self.hot_item_ids.iter().enumerate() {
            hot[slot] = id.as_deref().and_then(|id| self.items_by_id.get(id));
        }
        hot
    }

    fn is_hot(&self, recipe_id: &str) -> bool {
        self.hot_item_ids
            .iter()
            .any(|id| id.as_deref() == Some(recipe_id))
    }

    fn refresh_sell_price(&mut self, recipe_id: &str) {
        let multiplier = if self.is_hot(recipe_id) {
            HOT_ITEM_MULTIPLIER
        } else {
            1.0
        };
        if let Some(item) = self.items_by_id.get_mut(recipe_id) {
            item.sell_price = item.base_sell_price * multiplier;
            calculator::update_economics(item);
        }
    }

    /// Put a recipe into a hot item slot (1 or 2), or clear the slot
    ///
    /// A hot recipe sells for double its catalog price, however many slots it
    /// occupies.
    pub fn set_hot_item(&mut self, slot: u8, recipe_id: Option<&str>) -> Result<(), EngineError> {
        if !(1..=HOT_ITEM_SLOTS as u8).contains(&slot) {
            return Err(EngineError::InvalidHotSlot(slot));
        }
        let recipe_id = recipe_id.filter(|id| !id.is_empty());
        if let Some(id) = recipe_id {
            if self.recipe(id).is_none() {
                return Err(EngineError::UnknownRecipe(id.to_string()));
            }
        }

        let index = usize::from(slot) - 1;
        if self.hot_item_ids[index].as_deref() == recipe_id {
            return Ok(());
        }

        let key = hot_item_key(slot);
        match recipe_id {
            Some(id) => self.store.set(&key, id)?,
            None => self.store.remove(&key)?,
        }

        let previous = std::mem::replace(&mut self.hot_item_ids[index], recipe_id.map(str::to_string));
        if let Some(previous) = previous {
            self.refresh_sell_price(&previous);
        }
        if let Some(id) = recipe_id {
            self.refresh_sell_price(id);
        }

        calculator::sort_recipes(&self.items_by_id, &mut self.recipes);
        info!(slot, recipe = ?recipe_id, "hot item updated");
        Ok(())
    }

    fn is_hidden(&self, recipe_id: &str) -> bool {
        self.hidden_recipe_ids.contains(recipe_id)
    }

    fn recipes_where(&self, keep: impl Fn(&Item) -> bool) -> Vec<&Item> {
        self.recipes
            .iter()
            .filter_map(|id| self.items_by_id.get(id))
            .filter(|&item| keep(item))
            .collect()
    }

    /// Visible recipes whose aggregated needs are covered by owned quantities
    pub fn list_craftable(&self) -> Vec<&Item> {
        self.recipes_where(|recipe| {
            !self.is_hidden(&recipe.id)
                && calculator::is_craftable(recipe, &self.ingredient_quantities)
        })
    }

    pub fn list_visible(&self) -> Vec<&Item> {
        self.recipes_where(|recipe| !self.is_hidden(&recipe.id))
    }

    pub fn list_hidden(&self) -> Vec<&Item> {
        self.recipes_where(|recipe| self.is_hidden(&recipe.id))
    }

    /// Hide a recipe; returns false if it was already hidden
    pub fn hide(&mut self, recipe_id: &str) -> Result<bool, EngineError> {
        if self.is_hidden(recipe_id) {
            return Ok(false);
        }
        if self.recipe(recipe_id).is_none() {
            warn!(recipe = %recipe_id, "hiding an id that is not a known recipe");
        }
        self.hidden_recipe_ids.insert(recipe_id.to_string());
        self.store.set(&hidden_key(recipe_id), "true")?;
        Ok(true)
    }

    /// Unhide a recipe; returns false if it was not hidden
    pub fn unhide(&mut self, recipe_id: &str) -> Result<bool, EngineError> {
        if self.recipe(recipe_id).is_none() {
            warn!(recipe = %recipe_id, "unhiding an id that is not a known recipe");
        }
        if !self.hidden_recipe_ids.remove(recipe_id) {
            return Ok(false);
        }
        self.store.remove(&hidden_key(recipe_id))?;
        Ok(true)
    }
}
