use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Catalog JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize as JSON indented with four spaces.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Pixel dimensions, persisted as `"WxH"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn platform(&self) -> Platform {
        if self.height > self.width {
            Platform::Mobile
        } else {
            Platform::Desktop
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("invalid resolution {:?}", s))?;
        let width = w.parse().map_err(|_| format!("invalid width in {:?}", s))?;
        let height = h.parse().map_err(|_| format!("invalid height in {:?}", s))?;
        Ok(Self { width, height })
    }
}

impl From<Resolution> for String {
    fn from(resolution: Resolution) -> Self {
        resolution.to_string()
    }
}

impl TryFrom<String> for Resolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Orientation class: portrait images are `Mobile`, everything else `Desktop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Platform {
    Mobile,
    Desktop,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Mobile => write!(f, "Mobile"),
            Platform::Desktop => write!(f, "Desktop"),
        }
    }
}

/// Analysis result for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<BTreeSet<String>>,
    pub colors: BTreeSet<String>,
    pub resolution: Resolution,
    pub platform: Platform,
}

/// Identity key to record mapping, persisted as a single JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalog {
    records: BTreeMap<String, ImageRecord>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the catalog at `path`, or an empty one if the file does not exist yet.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Overwrite `path` with the full catalog.
    ///
    /// The document goes to a sibling temporary file first and is renamed into
    /// place, so an interrupted write leaves the previous catalog intact.
    pub fn save(&self, path: &Path) -> Result<(), CatalogError> {
        let buffer = to_pretty_json(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut temp_name = path.as_os_str().to_owned();
        temp_name.push(".tmp");
        fs::write(&temp_name, &buffer)?;
        fs::rename(&temp_name, path)?;
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ImageRecord> {
        self.records.get(key)
    }

    /// Insert a record unless the key is already present. Returns whether it was inserted.
    pub fn insert(&mut self, key: String, record: ImageRecord) -> bool {
        if self.records.contains_key(&key) {
            return false;
        }
        self.records.insert(key, record);
        true
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_record() -> ImageRecord {
        ImageRecord {
            tags: vec!["lakeshore".into(), "seashore".into(), "alp".into()],
            categories: Some(["Miscellaneous".to_string()].into_iter().collect()),
            colors: ["blue".to_string(), "white".to_string()].into_iter().collect(),
            resolution: Resolution::new(1920, 1080),
            platform: Platform::Desktop,
        }
    }

    #[test]
    fn test_platform_from_resolution() {
        assert_eq!(Resolution::new(300, 600).platform(), Platform::Mobile);
        assert_eq!(Resolution::new(600, 300).platform(), Platform::Desktop);
        assert_eq!(Resolution::new(500, 500).platform(), Platform::Desktop);
    }

    #[test]
    fn test_record_json_shape() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["resolution"], "1920x1080");
        assert_eq!(value["platform"], "Desktop");
        assert_eq!(value["colors"], serde_json::json!(["blue", "white"]));

        let mut without_categories = sample_record();
        without_categories.categories = None;
        let value = serde_json::to_value(without_categories).unwrap();
        assert!(value.get("categories").is_none());
    }

    #[test]
    fn test_missing_catalog_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let catalog = Catalog::load(&temp_dir.path().join("tags.json")).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");

        let mut catalog = Catalog::new();
        assert!(catalog.insert("abc".into(), sample_record()));
        assert!(!catalog.insert("abc".into(), sample_record()));
        catalog.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("{\n    \"abc\": {"));
        assert!(!temp_dir.path().join("tags.json.tmp").exists());

        let reloaded = Catalog::load(&path).unwrap();
        assert_eq!(reloaded, catalog);
        assert_eq!(reloaded.get("abc").unwrap().resolution, Resolution::new(1920, 1080));
    }

    #[test]
    fn test_loads_records_without_categories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        fs::write(
            &path,
            r#"{"wall.png": {"tags": ["alp"], "colors": ["white"], "resolution": "300x600", "platform": "Mobile"}}"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        let record = catalog.get("wall.png").unwrap();
        assert!(record.categories.is_none());
        assert_eq!(record.platform, Platform::Mobile);
    }

    #[test]
    fn test_rejects_bad_resolution() {
        assert!("1920-1080".parse::<Resolution>().is_err());
        assert!("axb".parse::<Resolution>().is_err());
    }
}
