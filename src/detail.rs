//! Single-object detail flow: ask the recognition capability to describe the
//! outlined object, retrying malformed or failed calls a bounded number of times.

use std::sync::Arc;

use image::DynamicImage;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RetryPolicy;
use crate::error::{AnnotationError, CapabilityError, MalformedAnnotationError};
use crate::inventory::parser::{coordinate, parse_object, scalar_text};
use crate::models::Segment;
use crate::segmentation::outline_segment;

/// Any of these in the response (case-insensitive substring) means "not an object"
pub const NEGATIVE_MARKERS: [&str; 5] = ["unrecognizable", "person", "man", "woman", "human"];

pub const DETAIL_INSTRUCTIONS: &str = r#"List the following details for the item outlined by a thin red line in this image:
{"name": <string>, "description": <string>, "category": <string>, "price": <float>, "is_object": <int>}.
category can be one of the following: Electronics, Appliances, Furniture, Kitchenware, Containers, Clothing and Accessories, Toiletry, Tools and Equipment, Toys and Games, Home Decor, Bedding and Linens, Hobby and Craft Supplies, Medical Equipment, Pet Supplies, Pets, Food, Firearms
is_object should be 1 for recognizable non-human objects/furniture. is_object should be 0 for walls, people, persons, humans, men, women and unrecognizable things. If you are at all unsure about what is outlined in red, say it is unrecognizable and set is_object to 0. You are checking if the thing highlighted by the outline is_object, NOT other objects in the image.
price is the estimated dollar value of the object.
json output should be one dict like the following example {"name": <string>, "description": <string>, "category": <string>, "price": <float>, "is_object": <int>}
Start JSON output here:"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    Electronics,
    Appliances,
    Furniture,
    Kitchenware,
    Containers,
    ClothingAndAccessories,
    Toiletry,
    ToolsAndEquipment,
    ToysAndGames,
    HomeDecor,
    BeddingAndLinens,
    HobbyAndCraftSupplies,
    MedicalEquipment,
    PetSupplies,
    Pets,
    Food,
    Firearms,
    /// Anything outside the fixed set, kept verbatim
    Other(String),
}

impl Category {
    const KNOWN: [(Category, &'static str); 17] = [
        (Category::Electronics, "Electronics"),
        (Category::Appliances, "Appliances"),
        (Category::Furniture, "Furniture"),
        (Category::Kitchenware, "Kitchenware"),
        (Category::Containers, "Containers"),
        (Category::ClothingAndAccessories, "Clothing and Accessories"),
        (Category::Toiletry, "Toiletry"),
        (Category::ToolsAndEquipment, "Tools and Equipment"),
        (Category::ToysAndGames, "Toys and Games"),
        (Category::HomeDecor, "Home Decor"),
        (Category::BeddingAndLinens, "Bedding and Linens"),
        (Category::HobbyAndCraftSupplies, "Hobby and Craft Supplies"),
        (Category::MedicalEquipment, "Medical Equipment"),
        (Category::PetSupplies, "Pet Supplies"),
        (Category::Pets, "Pets"),
        (Category::Food, "Food"),
        (Category::Firearms, "Firearms"),
    ];

    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::KNOWN
            .iter()
            .find(|(_, known)| known.eq_ignore_ascii_case(label))
            .map(|(category, _)| category.clone())
            .unwrap_or_else(|| Category::Other(label.to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            Category::Other(label) => label,
            known => Self::KNOWN
                .iter()
                .find(|(category, _)| category == known)
                .map(|(_, label)| *label)
                .unwrap_or_default(),
        }
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemDetails {
    pub name: String,
    pub description: String,
    pub category: Category,
    pub price: Option<f64>,
    pub is_object: bool,
}

/// JSON-ish truthiness: true, non-zero numbers, "1"/"true"/"yes"
fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

fn price(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.trim().trim_start_matches('$').replace(',', "").parse::<f64>().ok(),
        other => coordinate(other),
    }
}

pub fn parse_item_details(raw: &str) -> Result<ItemDetails, MalformedAnnotationError> {
    let fields = parse_object(raw)?;
    let text = |key: &str| fields.get(key).and_then(scalar_text).unwrap_or_default();

    Ok(ItemDetails {
        name: text("name"),
        description: text("description"),
        category: Category::from_label(&text("category")),
        price: price(fields.get("price")),
        is_object: truthy(fields.get("is_object")),
    })
}

pub fn find_negative_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    NEGATIVE_MARKERS.into_iter().find(|marker| lowered.contains(marker))
}

/// Describes one image with a highlighted object; returns raw model text
pub trait DetailClient: Send + Sync {
    fn describe(&self, image: &DynamicImage, instructions: &str) -> Result<String, CapabilityError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NegativeMarker(&'static str),
    NotAnObject,
}

#[derive(Debug)]
pub enum DetailOutcome {
    Accepted { details: ItemDetails, attempts: u32 },
    Rejected { reason: Rejection, attempts: u32 },
    /// Every attempt failed
    Dropped { attempts: u32, last_error: AnnotationError },
}

impl DetailOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            DetailOutcome::Accepted { attempts, .. }
            | DetailOutcome::Rejected { attempts, .. }
            | DetailOutcome::Dropped { attempts, .. } => *attempts,
        }
    }

    pub fn into_details(self) -> Option<ItemDetails> {
        match self {
            DetailOutcome::Accepted { details, .. } => Some(details),
            _ => None,
        }
    }
}

enum Verdict {
    Marker(&'static str),
    Parsed(ItemDetails),
}

pub struct DetailClassifier {
    client: Arc<dyn DetailClient>,
    policy: RetryPolicy,
}

impl DetailClassifier {
    pub fn new(client: Arc<dyn DetailClient>) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn attempt(&self, image: &DynamicImage) -> Result<Verdict, AnnotationError> {
        let text = self.client.describe(image, DETAIL_INSTRUCTIONS)?;
        if let Some(marker) = find_negative_marker(&text) {
            return Ok(Verdict::Marker(marker));
        }
        Ok(Verdict::Parsed(parse_item_details(&text)?))
    }

    pub fn classify(&self, image: &DynamicImage) -> DetailOutcome {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.attempt(image) {
                Ok(Verdict::Marker(marker)) => {
                    debug!(marker, attempts, "response flagged as not an object");
                    return DetailOutcome::Rejected {
                        reason: Rejection::NegativeMarker(marker),
                        attempts,
                    };
                }
                Ok(Verdict::Parsed(details)) if details.is_object => {
                    return DetailOutcome::Accepted { details, attempts };
                }
                Ok(Verdict::Parsed(_)) => {
                    return DetailOutcome::Rejected {
                        reason: Rejection::NotAnObject,
                        attempts,
                    };
                }
                Err(error) => {
                    warn!(attempt = attempts, max_attempts, %error, "detail attempt failed");
                    if attempts >= max_attempts {
                        return DetailOutcome::Dropped {
                            attempts,
                            last_error: error,
                        };
                    }
                    let delay = self.policy.delay();
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }

    /// Accepted details only; rejected and dropped images are left out
    pub fn classify_all(&self, images: &[DynamicImage]) -> Vec<ItemDetails> {
        let details: Vec<ItemDetails> = images
            .iter()
            .filter_map(|image| self.classify(image).into_details())
            .collect();
        info!(images = images.len(), accepted = details.len(), "detail classification finished");
        details
    }

    /// Outline each segment in red and classify it, keyed by segment id
    pub fn classify_segments(&self, segments: &[Segment]) -> Vec<(Uuid, ItemDetails)> {
        segments
            .iter()
            .filter_map(|segment| {
                let outlined = DynamicImage::ImageRgb8(outline_segment(segment));
                self.classify(&outlined)
                    .into_details()
                    .map(|details| (segment.id, details))
            })
            .collect()
    }
}
