//! Integration tests for annotation text handling.
//!
//! Tests cover:
//! - Fence stripping and malformed-text rejection
//! - Lenient field decoding
//! - Reprojection into panorama pixels
//! - Merge semantics (first seen wins, no box deduplication)

mod common;

use invscan::inventory::merge::{FirstSeenWins, MergeStrategy, SumQuantities, merge};
use invscan::inventory::parser::{clean_model_text, parse_annotation};
use invscan::inventory::reproject::reproject_coordinate;
use invscan::inventory::{Reprojection, TileRect, reproject};
use invscan::models::PlacedItem;

use common::*;

fn pixel_box(x1: f64, y1: f64, x2: f64, y2: f64) -> PixelBox {
    PixelBox { x1, x2, y1, y2 }
}

fn tile_with(name: &str, quantity: &str, boxes: Vec<PixelBox>) -> Vec<(String, PlacedItem)> {
    vec![(
        name.to_string(),
        PlacedItem {
            quantity: Some(quantity.to_string()),
            cost_per_item: Some("25".to_string()),
            bounding_boxes: boxes,
        },
    )]
}

fn named<'a, T>(items: &'a [(String, T)], name: &str) -> &'a T {
    items
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, item)| item)
        .unwrap_or_else(|| panic!("{name} missing"))
}

#[test]
fn test_fenced_response_is_parsed() -> anyhow::Result<()> {
    let raw = "```json\n{\"lamp\": {\"quantity\": \"2\", \"cost_per_item\": \"40\", \"bounding_boxes\": [{\"x1\": 10, \"x2\": 20, \"y1\": 30, \"y2\": 40}]}}\n```";
    let items = parse_annotation(raw)?;

    let lamp = named(&items, "lamp");
    assert_eq!(lamp.quantity.as_deref(), Some("2"));
    assert_eq!(lamp.cost_per_item.as_deref(), Some("40"));
    assert_eq!(
        lamp.bounding_boxes,
        vec![NormalizedBox {
            x1: 10.0,
            y1: 30.0,
            x2: 20.0,
            y2: 40.0
        }]
    );
    Ok(())
}

#[test]
fn test_clean_model_text() {
    assert_eq!(clean_model_text("```json{\"a\": 1}```"), "{\"a\": 1}");
    assert_eq!(clean_model_text("  ```JSON\n{}\n```  "), "{}");
    assert_eq!(clean_model_text("{\"json\": 1}"), "{\"json\": 1}");
}

#[test]
fn test_loose_language_tags_are_stripped() -> anyhow::Result<()> {
    assert_eq!(clean_model_text("``` json\n{}\n```"), "{}");
    assert_eq!(clean_model_text("```\tJSON\n{}```"), "{}");
    assert_eq!(clean_model_text("json\n{\"a\": 1}"), "{\"a\": 1}");
    assert_eq!(clean_model_text("jsonify {}"), "jsonify {}");

    let items = parse_annotation("``` json\n{\"vase\": {\"quantity\": \"1\"}}\n```")?;
    assert_eq!(named(&items, "vase").quantity.as_deref(), Some("1"));
    let items = parse_annotation("json\n{\"vase\": {}}")?;
    assert_eq!(items.len(), 1);
    Ok(())
}

#[test]
fn test_items_keep_model_order() -> anyhow::Result<()> {
    let items = parse_annotation(r#"{"sofa": {}, "lamp": {}, "armchair": {}}"#)?;
    let names: Vec<&str> = items.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["sofa", "lamp", "armchair"]);
    Ok(())
}

#[test]
fn test_malformed_responses_are_rejected() {
    for raw in ["", "```json\n```", "[1, 2, 3]", "Here is the inventory: {}", "{\"lamp\": {}} trailing", "\"lamp\""] {
        let err = parse_annotation(raw).expect_err(raw);
        assert!(err.excerpt.chars().count() <= 120);
    }

    let err = parse_annotation("[1, 2]").expect_err("array");
    assert_eq!(err.reason, "not a JSON object");
}

#[test]
fn test_lenient_field_decoding() -> anyhow::Result<()> {
    let raw = r#"{
        "chair": {"quantity": 4, "bounding_boxes": [
            {"x1": "100", "x2": "200.5", "y1": "0", "y2": 300},
            {"x1": 1, "x2": 2, "y1": 3},
            {"x1": "left", "x2": 2, "y1": 3, "y2": 4}
        ]},
        "note": "not an item",
        "rug": {"quantity": "1", "cost_per_item": null}
    }"#;
    let items = parse_annotation(raw)?;

    assert_eq!(items.len(), 2, "non-object values are skipped");

    let chair = named(&items, "chair");
    assert_eq!(chair.quantity.as_deref(), Some("4"));
    assert_eq!(chair.cost_per_item, None);
    assert_eq!(chair.bounding_boxes.len(), 1, "incomplete and non-numeric boxes are dropped");
    assert_eq!(chair.bounding_boxes[0].x2, 200.5);

    let rug = named(&items, "rug");
    assert_eq!(rug.cost_per_item, None);
    assert!(rug.bounding_boxes.is_empty());
    Ok(())
}

#[test]
fn test_reprojection_example() {
    let normalized = NormalizedBox {
        x1: 100.0,
        x2: 500.0,
        y1: 200.0,
        y2: 600.0,
    };
    let placed = reproject(&normalized, (0, 0), 200, 1000, 600);
    assert_eq!(placed, pixel_box(20.0, 40.0, 100.0, 120.0));

    let shifted = reproject(&normalized, (400, 200), 200, 1000, 600);
    assert_eq!(shifted, pixel_box(420.0, 240.0, 500.0, 320.0));
}

#[test]
fn test_reprojection_is_always_within_bounds() {
    let inputs = [-5000.0, -1.0, 0.0, 500.0, 1000.0, 1001.0, 1e9];
    for c in inputs {
        for offset in [0, 150, 900] {
            let x = reproject_coordinate(c, 100, offset, 1000);
            assert!((0.0..=1000.0).contains(&x), "{c} at {offset} gave {x}");
        }
    }

    let wild = NormalizedBox {
        x1: -300.0,
        y1: 5000.0,
        x2: 5000.0,
        y2: -300.0,
    };
    let placed = reproject(&wild, (900, 500), 100, 1000, 600);
    assert_eq!(placed, pixel_box(870.0, 600.0, 1000.0, 470.0));
    assert!(placed.is_degenerate());
}

#[test]
fn test_edge_tiles_use_nominal_tile_size() {
    let reprojection = Reprojection {
        tile_size: 100,
        image_width: 250,
        image_height: 100,
    };
    let edge = TileRect {
        index: 2,
        row: 0,
        col: 2,
        x: 200,
        y: 0,
        width: 50,
        height: 100,
    };
    let items = vec![(
        "box".to_string(),
        invscan::models::RawItem {
            quantity: None,
            cost_per_item: None,
            bounding_boxes: vec![NormalizedBox {
                x1: 0.0,
                y1: 0.0,
                x2: 400.0,
                y2: 1000.0,
            }],
        },
    )];

    let placed = reprojection.place_tile(&edge, items);
    assert_eq!(named(&placed, "box").bounding_boxes, vec![pixel_box(200.0, 0.0, 240.0, 100.0)]);
}

#[test]
fn test_merging_same_tile_twice_doubles_boxes() {
    let tile = tile_with("lamp", "1", vec![pixel_box(0.0, 0.0, 10.0, 10.0), pixel_box(5.0, 5.0, 15.0, 15.0)]);
    let mut inventory = Inventory::new();

    merge(&mut inventory, tile.clone());
    merge(&mut inventory, tile);

    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory.get("lamp").map(|l| l.bounding_boxes.len()), Some(4));
}

#[test]
fn test_first_seen_quantity_wins() {
    let t0 = tile_with("lamp", "1", vec![pixel_box(0.0, 0.0, 10.0, 10.0)]);
    let t1 = tile_with("lamp", "3", vec![pixel_box(100.0, 0.0, 110.0, 10.0)]);
    let mut inventory = Inventory::new();

    merge(&mut inventory, t0);
    merge(&mut inventory, t1);

    let lamp = inventory.get("lamp").expect("lamp merged");
    assert_eq!(lamp.quantity.as_deref(), Some("1"));
    assert_eq!(
        lamp.bounding_boxes,
        vec![pixel_box(0.0, 0.0, 10.0, 10.0), pixel_box(100.0, 0.0, 110.0, 10.0)]
    );
}

#[test]
fn test_names_are_case_sensitive() {
    let mut inventory = Inventory::new();
    FirstSeenWins.merge_tile(&mut inventory, tile_with("Lamp", "1", vec![]));
    FirstSeenWins.merge_tile(&mut inventory, tile_with("lamp", "1", vec![]));
    assert_eq!(inventory.len(), 2);
}

#[test]
fn test_sum_quantities_strategy() {
    let mut inventory = Inventory::new();
    SumQuantities.merge_tile(&mut inventory, tile_with("lamp", "1", vec![pixel_box(0.0, 0.0, 1.0, 1.0)]));
    SumQuantities.merge_tile(&mut inventory, tile_with("lamp", "3", vec![pixel_box(2.0, 2.0, 3.0, 3.0)]));
    SumQuantities.merge_tile(&mut inventory, tile_with("lamp", "a few", vec![]));

    let lamp = inventory.get("lamp").expect("lamp merged");
    assert_eq!(lamp.quantity.as_deref(), Some("4"));
    assert_eq!(lamp.cost_per_item.as_deref(), Some("25"));
    assert_eq!(lamp.bounding_boxes.len(), 2);
}
