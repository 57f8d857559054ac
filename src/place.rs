//! Place records shown in the list and on the map.

use serde::{Deserialize, Serialize};

/// Names of the places stored on first launch.
const DEFAULT_PLACE_NAMES: [&str; 15] = [
    "Burger Heroes",
    "Kitchen",
    "Bonsai",
    "Дастархан",
    "Индокитай",
    "X.O",
    "Балкан Гриль",
    "Sherlock Holmes",
    "Speak Easy",
    "Morris Pub",
    "Вкусные истории",
    "Классик",
    "Love&Life",
    "Шок",
    "Бочка",
];

const DEFAULT_ADDRESS: &str = "Moscow";
const DEFAULT_CATEGORY: &str = "Restaurant";

/// A saved place.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Place {
    pub name: String,
    /// Free-text address handed to the geocoder
    pub address: Option<String>,
    /// Category shown as the annotation subtitle (e.g. "Restaurant")
    pub category: Option<String>,
    /// Encoded thumbnail image (PNG/JPEG), rendered by the host
    pub thumbnail: Option<Vec<u8>>,
}

impl Place {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Vec<u8>) -> Self {
        self.thumbnail = Some(thumbnail);
        self
    }

    /// The address to geocode, if it has any non-blank text.
    pub fn geocodable_address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// The seed list stored on first launch.
    ///
    /// Thumbnails are bundled platform assets, so the host attaches them.
    pub fn default_places() -> Vec<Place> {
        DEFAULT_PLACE_NAMES
            .iter()
            .map(|name| {
                Place::new(*name)
                    .with_address(DEFAULT_ADDRESS)
                    .with_category(DEFAULT_CATEGORY)
            })
            .collect()
    }
}
