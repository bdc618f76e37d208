//! Outfits: validated combinations of items.

use serde::{Deserialize, Serialize};

use super::error::OutfitError;
use super::item::{Category, Item, ItemId};

/// Identifier of a shortlisted outfit.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutfitId(pub String);

impl OutfitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OutfitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two shapes an outfit may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutfitShape {
    TopAndBottom,
    Dress,
}

/// A valid combination of items.
///
/// The category set is always exactly `{top, bottom}` or exactly `{dress}`;
/// [`Outfit::new`] is the only constructor and rejects anything else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outfit {
    id: OutfitId,
    shape: OutfitShape,
    items: Vec<ItemId>,
}

impl Outfit {
    /// Build an outfit from resolved items, preserving their order.
    pub fn new(id: OutfitId, items: &[&Item]) -> Result<Self, OutfitError> {
        let categories: Vec<Category> = items.iter().map(|item| item.category).collect();
        let shape = match categories.as_slice() {
            [Category::Dress] => OutfitShape::Dress,
            [Category::Top, Category::Bottom] | [Category::Bottom, Category::Top] => {
                OutfitShape::TopAndBottom
            }
            [] => return Err(OutfitError::Empty { outfit_id: id.0 }),
            _ => {
                return Err(OutfitError::InvalidCategories {
                    outfit_id: id.0,
                    categories,
                })
            }
        };

        Ok(Self {
            id,
            shape,
            items: items.iter().map(|item| item.id.clone()).collect(),
        })
    }

    pub fn id(&self) -> &OutfitId {
        &self.id
    }

    pub fn shape(&self) -> OutfitShape {
        self.shape
    }

    pub fn item_ids(&self) -> &[ItemId] {
        &self.items
    }
}
