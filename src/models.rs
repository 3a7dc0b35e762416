//! Data models for catalog items and recipes

use std::fmt;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;

/// One quantified reference from a recipe to another item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeComponent {
    pub item_id: String,
    pub quantity: u32,
}

impl RecipeComponent {
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// An item record as delivered by a catalog source, before any derived fields
/// are computed.
///
/// A present `recipe` (even an empty one) marks the item as a recipe; an
/// absent one marks it as a raw ingredient.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub buy_price: Option<f64>,
    #[serde(default)]
    pub sell_price: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_recipe")]
    pub recipe: Option<Vec<RecipeComponent>>,
}

impl CatalogItem {
    pub fn ingredient(id: &str, name: &str, buy_price: Option<f64>, sell_price: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            buy_price,
            sell_price,
            recipe: None,
        }
    }

    pub fn recipe(id: &str, name: &str, sell_price: Option<f64>, components: &[(&str, u32)]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            buy_price: None,
            sell_price,
            recipe: Some(
                components
                    .iter()
                    .map(|(item_id, quantity)| RecipeComponent::new(*item_id, *quantity))
                    .collect(),
            ),
        }
    }
}

/// A catalog item together with its derived economics
#[derive(Debug, Clone)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub buy_price: Option<f64>,
    /// Sell price as delivered by the catalog (0 when absent)
    pub base_sell_price: f64,
    /// Effective sell price, doubled while the item is a hot item
    pub sell_price: f64,
    pub is_recipe: bool,
    pub recipe: Vec<RecipeComponent>,
    /// Fully expanded recipe tree, built once at load time
    pub nested_recipe: Vec<NestedRecipeNode>,
    pub cost: f64,
    pub profit: f64,
    pub markup: f64,
}

impl Item {
    pub fn from_catalog(record: CatalogItem) -> Self {
        let base_sell_price = record.sell_price.unwrap_or(0.0);
        Self {
            id: record.id,
            name: record.name,
            buy_price: record.buy_price,
            base_sell_price,
            sell_price: base_sell_price,
            is_recipe: record.recipe.is_some(),
            recipe: record.recipe.unwrap_or_default(),
            nested_recipe: Vec::new(),
            cost: 0.0,
            profit: 0.0,
            markup: 0.0,
        }
    }
}

/// Materialized expansion of one recipe component
#[derive(Debug, Clone, PartialEq)]
pub struct NestedRecipeNode {
    pub item_id: String,
    pub quantity: u32,
    pub children: Vec<NestedRecipeNode>,
}

/// Deserialize a `{ "componentId": quantity, ... }` object into an ordered
/// component list, keeping document order.
fn deserialize_recipe<'de, D>(deserializer: D) -> Result<Option<Vec<RecipeComponent>>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RecipeVisitor;

    impl<'de> Visitor<'de> for RecipeVisitor {
        type Value = Option<Vec<RecipeComponent>>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of item ids to quantities")
        }

        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D2: Deserializer<'de>>(self, deserializer: D2) -> Result<Self::Value, D2::Error> {
            deserializer.deserialize_map(self)
        }

        fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
            let mut components = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((item_id, quantity)) = map.next_entry::<String, u32>()? {
                components.push(RecipeComponent { item_id, quantity });
            }
            Ok(Some(components))
        }
    }

    deserializer.deserialize_option(RecipeVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_keeps_document_order() {
        let item: CatalogItem = serde_json::from_str(
            r#"{"id":"axe","name":"Axe","sellPrice":625,"recipe":{"wood":3,"iron-nugget":1,"clay":2}}"#,
        )
        .unwrap();

        let ids: Vec<_> = item
            .recipe
            .unwrap()
            .into_iter()
            .map(|c| c.item_id)
            .collect();
        assert_eq!(ids, vec!["wood", "iron-nugget", "clay"]);
    }

    #[test]
    fn test_missing_recipe_is_ingredient() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"id":"wood","name":"Wood","sellPrice":60}"#).unwrap();
        assert!(item.recipe.is_none());
        assert_eq!(item.buy_price, None);
        assert_eq!(item.sell_price, Some(60.0));
    }

    #[test]
    fn test_empty_recipe_is_still_a_recipe() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"id":"odd","name":"Odd","recipe":{}}"#).unwrap();
        assert_eq!(item.recipe, Some(Vec::new()));
        assert!(Item::from_catalog(item).is_recipe);
    }

    #[test]
    fn test_from_catalog_defaults_sell_price() {
        let item = Item::from_catalog(CatalogItem::ingredient("stone", "Stone", None, None));
        assert_eq!(item.base_sell_price, 0.0);
        assert_eq!(item.sell_price, 0.0);
        assert!(!item.is_recipe);
    }
}
