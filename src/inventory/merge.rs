use crate::models::{GlobalItem, Inventory, PlacedItem};

use super::TileItems;

/// Folds one tile's items into the running inventory.
///
/// Tiles must be merged in scan order; strategies that keep first-seen
/// fields depend on it.
pub trait MergeStrategy: Send + Sync {
    fn merge_item(&self, inventory: &mut Inventory, name: String, item: PlacedItem);

    fn merge_tile(&self, inventory: &mut Inventory, tile_items: TileItems) {
        for (name, item) in tile_items {
            self.merge_item(inventory, name, item);
        }
    }

    fn name(&self) -> &str;
}

fn new_entry(name: String, item: PlacedItem) -> GlobalItem {
    GlobalItem {
        name,
        quantity: item.quantity,
        cost_per_item: item.cost_per_item,
        bounding_boxes: item.bounding_boxes,
    }
}

/// Quantity and cost come from the first tile that names the item; later tiles only add boxes.
/// Boxes are never deduplicated.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSeenWins;

impl MergeStrategy for FirstSeenWins {
    fn merge_item(&self, inventory: &mut Inventory, name: String, item: PlacedItem) {
        match inventory.get_mut(&name) {
            Some(existing) => existing.bounding_boxes.extend(item.bounding_boxes),
            None => {
                inventory.insert(new_entry(name, item));
            }
        }
    }

    fn name(&self) -> &str {
        "first-seen-wins"
    }
}

/// Like [`FirstSeenWins`], but adds quantities when both sides are integers
#[derive(Debug, Clone, Copy, Default)]
pub struct SumQuantities;

impl MergeStrategy for SumQuantities {
    fn merge_item(&self, inventory: &mut Inventory, name: String, item: PlacedItem) {
        let Some(existing) = inventory.get_mut(&name) else {
            inventory.insert(new_entry(name, item));
            return;
        };

        let parse = |q: &Option<String>| q.as_deref().and_then(|s| s.trim().parse::<u64>().ok());
        if let (Some(a), Some(b)) = (parse(&existing.quantity), parse(&item.quantity)) {
            existing.quantity = Some(a.saturating_add(b).to_string());
        }
        existing.bounding_boxes.extend(item.bounding_boxes);
    }

    fn name(&self) -> &str {
        "sum-quantities"
    }
}

/// Merge one tile result with the default strategy
pub fn merge(inventory: &mut Inventory, tile_items: TileItems) {
    FirstSeenWins.merge_tile(inventory, tile_items);
}
