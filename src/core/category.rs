use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Category assigned when no tag matches any rule.
pub const FALLBACK_CATEGORY: &str = "Miscellaneous";

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid category rules: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: BTreeSet<String>,
}

/// Fixed keyword membership rules, checked in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
}

impl CategoryRules {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        Self { rules }
    }

    /// Read replacement rules from a JSON array of `{category, keywords}` objects.
    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Map tags to the set of categories whose keyword lists contain them verbatim.
    ///
    /// The fallback category is reported only when nothing else matched, even if
    /// a rule itself is named after it.
    pub fn categorize<S: AsRef<str>>(&self, tags: &[S]) -> BTreeSet<String> {
        let mut categories = BTreeSet::new();
        for tag in tags {
            for rule in &self.rules {
                if rule.keywords.contains(tag.as_ref()) {
                    categories.insert(rule.category.clone());
                }
            }
        }

        categories.remove(FALLBACK_CATEGORY);
        if categories.is_empty() {
            categories.insert(FALLBACK_CATEGORY.to_string());
        }
        categories
    }
}

impl Default for CategoryRules {
    fn default() -> Self {
        #[rustfmt::skip]
        let table: [(&str, &[&str]); 15] = [
            ("Art", &["Comic book", "Dust jacket", "T-shirt", "Painting", "Quilt", "Velvet", "Tray"]),
            ("Technology", &["Computer mouse", "Keyboard", "Laptop", "Digital clock", "Spotlight", "Modem", "Projector"]),
            ("Vehicles", &["Airship", "Sports car", "Taxicab", "Scooter", "Aircraft carrier", "Race car", "Ocean liner"]),
            ("Nature", &["Coral reef", "Jellyfish", "Lakeshore", "Alp", "Volcano", "Seashore", "Sunflower"]),
            ("Outdoor Structures", &["Stupa", "Dome", "Patio", "Lighthouse", "Thatched roof"]),
            ("Fashion", &["Sunglasses", "Sandal", "Swimsuit", "Buckle", "Sarong", "Scarf"]),
            ("Home Decor", &["Lampshade", "Vase", "Curtain", "Pillow", "Furniture", "Clock"]),
            ("Sports & Recreation", &["Ski", "Race car", "Soccer ball", "Bobsleigh", "Paddle", "Tent"]),
            ("Marine", &["Scuba diver", "Snorkel", "Submarine", "Shipwreck", "Motorboat"]),
            ("Fantasy/Imagination", &["Airship", "Pirate ship", "Maze", "Comic book", "Spotlight"]),
            ("Wildlife", &["Tiger shark", "Ant", "Toucan", "Spider", "Beaver", "Langur"]),
            ("Infrastructure", &["Traffic light", "Crane (machine)", "Parking meter", "Bridge", "Traffic sign"]),
            ("Household Items", &["Envelopes", "Ring binder", "Hook", "Scissors", "Screwdriver"]),
            ("Space/Science", &["Telescope", "Rocket", "Solar system", "Barometer", "Weighing scale"]),
            ("Anime", &["Anime character", "Manga", "Anime scene", "Cosplay"]),
        ];

        Self::new(
            table
                .iter()
                .map(|(category, keywords)| CategoryRule {
                    category: category.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
        )
    }
}
