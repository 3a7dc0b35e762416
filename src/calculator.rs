//! Recipe cost and requirement calculations
//!
//! Everything here is a pure function over the indexed catalog. Recursion is
//! guarded by the ids on the current path only, so the same item may appear
//! in unrelated branches while a cyclic reference still terminates.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Item, NestedRecipeNode};

/// Cost used for references that do not resolve to a catalog item, and the
/// floor for items with no usable price.
const FALLBACK_COST: f64 = 1.0;

/// Compute the unit cost of an item
///
/// `visiting` holds the ids on the current recursion path. A recipe already on
/// the path is priced as if it had no recipe.
pub fn unit_cost<'a>(
    items: &'a HashMap<String, Item>,
    item_id: &'a str,
    visiting: &mut Vec<&'a str>,
) -> f64 {
    let Some(item) = items.get(item_id) else {
        return FALLBACK_COST;
    };

    if !item.recipe.is_empty() && !visiting.contains(&item_id) {
        visiting.push(item_id);
        let cost: f64 = item
            .recipe
            .iter()
            .map(|component| {
                f64::from(component.quantity) * unit_cost(items, &component.item_id, visiting)
            })
            .sum();
        visiting.pop();
        return cost;
    }

    match item.buy_price {
        Some(price) if price != 0.0 => price,
        _ if item.base_sell_price > 0.0 => item.base_sell_price,
        _ => FALLBACK_COST,
    }
}

/// Expand an item's direct recipe into a nested tree
///
/// Unknown ids and ids already on the current path expand to nothing.
pub fn expand_recipe<'a>(
    items: &'a HashMap<String, Item>,
    item_id: &'a str,
    visiting: &mut Vec<&'a str>,
) -> Vec<NestedRecipeNode> {
    let Some(item) = items.get(item_id) else {
        return Vec::new();
    };
    if visiting.contains(&item_id) {
        return Vec::new();
    }

    visiting.push(item_id);
    let nodes = item
        .recipe
        .iter()
        .map(|component| NestedRecipeNode {
            item_id: component.item_id.clone(),
            quantity: component.quantity,
            children: expand_recipe(items, &component.item_id, visiting),
        })
        .collect();
    visiting.pop();
    nodes
}

/// Sum the quantities of every node in a nested recipe, per item id
///
/// Intermediate items count as well as leaves, and quantities are not scaled
/// by their parent's quantity.
pub fn aggregate_ingredient_needs(nested: &[NestedRecipeNode]) -> HashMap<String, u64> {
    let mut needs = HashMap::new();
    collect_needs(nested, &mut needs);
    needs
}

fn collect_needs(nodes: &[NestedRecipeNode], needs: &mut HashMap<String, u64>) {
    for node in nodes {
        *needs.entry(node.item_id.clone()).or_default() += u64::from(node.quantity);
        collect_needs(&node.children, needs);
    }
}

/// Check whether owned quantities cover every aggregated need of a recipe
pub fn is_craftable(recipe: &Item, owned: &HashMap<String, u32>) -> bool {
    aggregate_ingredient_needs(&recipe.nested_recipe)
        .iter()
        .all(|(item_id, needed)| {
            owned
                .get(item_id)
                .is_some_and(|have| *have > 0 && u64::from(*have) >= *needed)
        })
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Recompute profit and markup from the current sell price and cost
pub fn update_economics(item: &mut Item) {
    item.profit = item.sell_price - item.cost;
    item.markup = round2(item.sell_price / item.cost);
}

/// Markup descending, then profit descending, then name ascending
pub fn compare_recipes(a: &Item, b: &Item) -> Ordering {
    b.markup
        .total_cmp(&a.markup)
        .then_with(|| b.profit.total_cmp(&a.profit))
        .then_with(|| a.name.cmp(&b.name))
}

/// Sort recipe ids in place by [`compare_recipes`]
///
/// Ids missing from `items` sort last.
pub fn sort_recipes(items: &HashMap<String, Item>, recipe_ids: &mut [String]) {
    recipe_ids.sort_by(|a, b| match (items.get(a), items.get(b)) {
        (Some(a), Some(b)) => compare_recipes(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}

/// Format a nested recipe as an indented tree
pub fn format_nested_recipe(
    items: &HashMap<String, Item>,
    nodes: &[NestedRecipeNode],
    indent: usize,
) -> String {
    let mut output = String::new();
    let prefix = "  ".repeat(indent);

    for node in nodes {
        let name = items
            .get(&node.item_id)
            .map_or(node.item_id.as_str(), |item| item.name.as_str());
        output.push_str(&format!("{}- {} x{}\n", prefix, name, node.quantity));
        output.push_str(&format_nested_recipe(items, &node.children, indent + 1));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CatalogItem;
    use proptest::prelude::*;

    fn index(records: Vec<CatalogItem>) -> HashMap<String, Item> {
        records
            .into_iter()
            .map(|record| (record.id.clone(), Item::from_catalog(record)))
            .collect()
    }

    fn cost_of(items: &HashMap<String, Item>, id: &str) -> f64 {
        unit_cost(items, id, &mut Vec::new())
    }

    fn priced(name: &str, markup: f64, profit: f64) -> Item {
        let mut item = Item::from_catalog(CatalogItem::recipe(name, name, None, &[]));
        item.markup = markup;
        item.profit = profit;
        item
    }

    #[test]
    fn test_leaf_costs() {
        let items = index(vec![
            CatalogItem::ingredient("bought", "Bought", Some(20.0), Some(5.0)),
            CatalogItem::ingredient("sold", "Sold", None, Some(75.0)),
            CatalogItem::ingredient("free", "Free", None, None),
            CatalogItem::ingredient("zero-buy", "Zero Buy", Some(0.0), Some(8.0)),
        ]);

        assert_eq!(cost_of(&items, "bought"), 20.0);
        assert_eq!(cost_of(&items, "sold"), 75.0);
        assert_eq!(cost_of(&items, "free"), 1.0);
        assert_eq!(cost_of(&items, "zero-buy"), 8.0);
        assert_eq!(cost_of(&items, "nowhere"), 1.0);
    }

    #[test]
    fn test_recipe_cost_is_weighted_sum() {
        let items = index(vec![
            CatalogItem::ingredient("a", "A", Some(5.0), None),
            CatalogItem::ingredient("b", "B", Some(2.0), None),
            CatalogItem::recipe("r", "R", Some(100.0), &[("a", 2), ("b", 3)]),
        ]);
        assert_eq!(cost_of(&items, "r"), 16.0);
    }

    #[test]
    fn test_nested_recipe_cost() {
        let items = index(vec![
            CatalogItem::ingredient("wood", "Wood", None, Some(60.0)),
            CatalogItem::recipe("plank", "Plank", Some(200.0), &[("wood", 2)]),
            CatalogItem::recipe("table", "Table", Some(900.0), &[("plank", 3), ("wood", 1)]),
        ]);
        assert_eq!(cost_of(&items, "table"), 3.0 * 120.0 + 60.0);
    }

    #[test]
    fn test_empty_recipe_costs_like_a_leaf() {
        let items = index(vec![CatalogItem::recipe("odd", "Odd", Some(40.0), &[])]);
        assert_eq!(cost_of(&items, "odd"), 40.0);
    }

    #[test]
    fn test_cyclic_cost_terminates() {
        let items = index(vec![
            CatalogItem::recipe("a", "A", None, &[("b", 1)]),
            CatalogItem::recipe("b", "B", None, &[("a", 1)]),
        ]);
        // a -> b -> a(fallback 1)
        assert_eq!(cost_of(&items, "a"), 1.0);

        let items = index(vec![
            CatalogItem::recipe("a", "A", Some(30.0), &[("b", 2)]),
            CatalogItem::recipe("b", "B", None, &[("a", 3)]),
        ]);
        assert_eq!(cost_of(&items, "a"), 2.0 * 3.0 * 30.0);
    }

    #[test]
    fn test_unknown_component_costs_one() {
        let items = index(vec![CatalogItem::recipe("r", "R", None, &[("ghost", 4)])]);
        assert_eq!(cost_of(&items, "r"), 4.0);
    }

    #[test]
    fn test_expand_recipe() {
        let items = index(vec![
            CatalogItem::ingredient("wood", "Wood", None, Some(60.0)),
            CatalogItem::recipe("plank", "Plank", None, &[("wood", 2)]),
            CatalogItem::recipe("table", "Table", None, &[("plank", 3), ("ghost", 1)]),
        ]);

        let nested = expand_recipe(&items, "table", &mut Vec::new());
        assert_eq!(
            nested,
            vec![
                NestedRecipeNode {
                    item_id: "plank".to_string(),
                    quantity: 3,
                    children: vec![NestedRecipeNode {
                        item_id: "wood".to_string(),
                        quantity: 2,
                        children: vec![],
                    }],
                },
                NestedRecipeNode {
                    item_id: "ghost".to_string(),
                    quantity: 1,
                    children: vec![],
                },
            ]
        );
        assert!(expand_recipe(&items, "ghost", &mut Vec::new()).is_empty());
    }

    #[test]
    fn test_expand_cycle_stops_at_repeat() {
        let items = index(vec![
            CatalogItem::recipe("a", "A", None, &[("b", 1)]),
            CatalogItem::recipe("b", "B", None, &[("a", 2)]),
        ]);

        let nested = expand_recipe(&items, "a", &mut Vec::new());
        assert_eq!(nested.len(), 1);
        assert_eq!(nested[0].item_id, "b");
        assert_eq!(nested[0].children.len(), 1);
        assert_eq!(nested[0].children[0].item_id, "a");
        assert!(nested[0].children[0].children.is_empty());
    }

    #[test]
    fn test_same_item_in_unrelated_branches() {
        let items = index(vec![
            CatalogItem::ingredient("wood", "Wood", None, Some(60.0)),
            CatalogItem::recipe("plank", "Plank", None, &[("wood", 2)]),
            CatalogItem::recipe("stick", "Stick", None, &[("wood", 1)]),
            CatalogItem::recipe("chair", "Chair", None, &[("plank", 1), ("stick", 2)]),
        ]);

        let nested = expand_recipe(&items, "chair", &mut Vec::new());
        assert_eq!(nested[0].children[0].item_id, "wood");
        assert_eq!(nested[1].children[0].item_id, "wood");

        let needs = aggregate_ingredient_needs(&nested);
        assert_eq!(needs["plank"], 1);
        assert_eq!(needs["stick"], 2);
        assert_eq!(needs["wood"], 3);
    }

    #[test]
    fn test_is_craftable() {
        let mut items = index(vec![
            CatalogItem::ingredient("iron-ore", "Iron Ore", None, Some(50.0)),
            CatalogItem::recipe("ingot", "Ingot", None, &[("iron-ore", 5)]),
        ]);
        let nested = expand_recipe(&items, "ingot", &mut Vec::new());
        let ingot = items.get_mut("ingot").unwrap();
        ingot.nested_recipe = nested;
        let ingot = &items["ingot"];

        let mut owned = HashMap::new();
        assert!(!is_craftable(ingot, &owned));
        owned.insert("iron-ore".to_string(), 3);
        assert!(!is_craftable(ingot, &owned));
        owned.insert("iron-ore".to_string(), 5);
        assert!(is_craftable(ingot, &owned));
        owned.insert("iron-ore".to_string(), 8);
        assert!(is_craftable(ingot, &owned));
    }

    #[test]
    fn test_empty_recipe_is_craftable() {
        let items = index(vec![CatalogItem::recipe("odd", "Odd", None, &[])]);
        assert!(is_craftable(&items["odd"], &HashMap::new()));
    }

    #[test]
    fn test_update_economics_rounds_markup() {
        let mut item = Item::from_catalog(CatalogItem::recipe("r", "R", Some(100.0), &[]));
        item.cost = 30.0;
        update_economics(&mut item);
        assert_eq!(item.profit, 70.0);
        assert_eq!(item.markup, 3.33);
    }

    #[test]
    fn test_compare_recipes() {
        let mut recipes = vec![
            priced("B", 1.5, 10.0),
            priced("A", 1.5, 10.0),
            priced("C", 2.0, 5.0),
            priced("D", 1.5, 12.0),
        ];
        recipes.sort_by(compare_recipes);
        let names: Vec<_> = recipes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["C", "D", "A", "B"]);
    }

    #[test]
    fn test_sort_recipes_by_id() {
        let items: HashMap<_, _> = [priced("B", 1.5, 10.0), priced("A", 1.5, 10.0), priced("C", 2.0, 5.0)]
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();
        let mut ids = vec!["B".to_string(), "A".to_string(), "C".to_string()];
        sort_recipes(&items, &mut ids);
        assert_eq!(ids, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_format_nested_recipe() {
        let items = index(vec![
            CatalogItem::ingredient("wood", "Wood", None, None),
            CatalogItem::recipe("plank", "Plank", None, &[("wood", 2)]),
        ]);
        let nodes = vec![NestedRecipeNode {
            item_id: "plank".to_string(),
            quantity: 3,
            children: expand_recipe(&items, "plank", &mut Vec::new()),
        }];

        assert_eq!(
            format_nested_recipe(&items, &nodes, 0),
            "- Plank x3\n  - Wood x2\n"
        );
    }

    proptest! {
        #[test]
        fn prop_leaf_cost_is_buy_price(buy in 1u32..100_000, sell in 0u32..100_000) {
            let items = index(vec![CatalogItem::ingredient(
                "leaf", "Leaf", Some(f64::from(buy)), Some(f64::from(sell)),
            )]);
            prop_assert_eq!(cost_of(&items, "leaf"), f64::from(buy));
        }

        #[test]
        fn prop_sorted_recipes_are_ordered(
            entries in proptest::collection::vec((0u32..5, 0i32..5, "[a-c]{1,2}"), 1..20)
        ) {
            let mut recipes: Vec<Item> = entries
                .iter()
                .map(|(markup, profit, name)| priced(name, f64::from(*markup) / 2.0, f64::from(*profit)))
                .collect();
            recipes.sort_by(compare_recipes);
            for pair in recipes.windows(2) {
                prop_assert_ne!(compare_recipes(&pair[0], &pair[1]), Ordering::Greater);
                prop_assert!(pair[0].markup >= pair[1].markup);
            }
        }
    }
}
