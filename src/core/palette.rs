// Nearest named color lookup
// - Euclidean distance over a small fixed palette, scanned in declaration order
// - Optional folding of the fine-grained name into a coarse color family

use clap::ValueEnum;

/// Name returned by the folding stage when a palette name belongs to no family.
pub const UNMATCHED_COLOR: &str = "other";

#[rustfmt::skip]
const CSS3_COLORS: [(&str, [u8; 3]); 48] = [
    ("red", [255, 0, 0]), ("darkred", [139, 0, 0]), ("indianred", [205, 92, 92]),
    ("crimson", [220, 20, 60]), ("firebrick", [178, 34, 34]),
    ("blue", [0, 0, 255]), ("darkblue", [0, 0, 139]), ("deepskyblue", [0, 191, 255]),
    ("dodgerblue", [30, 144, 255]), ("mediumblue", [0, 0, 205]),
    ("green", [0, 128, 0]), ("darkgreen", [0, 100, 0]), ("limegreen", [50, 205, 50]),
    ("forestgreen", [34, 139, 34]),
    ("yellow", [255, 255, 0]), ("gold", [255, 215, 0]), ("khaki", [240, 230, 140]),
    ("lightgoldenrodyellow", [250, 250, 210]),
    ("orange", [255, 165, 0]), ("darkorange", [255, 140, 0]), ("coral", [255, 127, 80]),
    ("chocolate", [210, 105, 30]),
    ("purple", [128, 0, 128]), ("indigo", [75, 0, 130]), ("darkmagenta", [139, 0, 139]),
    ("orchid", [218, 112, 214]), ("mediumpurple", [147, 112, 219]),
    ("pink", [255, 192, 203]), ("deeppink", [255, 20, 147]), ("hotpink", [255, 105, 180]),
    ("lightpink", [255, 182, 193]),
    ("gray", [128, 128, 128]), ("darkgray", [169, 169, 169]), ("dimgray", [105, 105, 105]),
    ("lightgray", [211, 211, 211]),
    ("white", [255, 255, 255]), ("ivory", [255, 255, 240]), ("snow", [255, 250, 250]),
    ("floralwhite", [255, 250, 240]),
    ("black", [0, 0, 0]),
    ("brown", [165, 42, 42]), ("saddlebrown", [139, 69, 19]), ("peru", [205, 133, 63]),
    ("cyan", [0, 255, 255]), ("aqua", [0, 255, 255]), ("darkcyan", [0, 139, 139]),
    ("magenta", [255, 0, 255]), ("fuchsia", [255, 0, 255]),
];

#[rustfmt::skip]
const COLOR_FAMILIES: [(&str, &[&str]); 13] = [
    ("red", &["red", "darkred", "indianred", "crimson", "firebrick"]),
    ("blue", &["blue", "darkblue", "deepskyblue", "dodgerblue", "mediumblue"]),
    ("green", &["green", "darkgreen", "limegreen", "forestgreen"]),
    ("yellow", &["yellow", "gold", "khaki", "lightgoldenrodyellow"]),
    ("orange", &["orange", "darkorange", "coral", "chocolate"]),
    ("purple", &["purple", "indigo", "darkmagenta", "orchid", "mediumpurple"]),
    ("pink", &["pink", "deeppink", "hotpink", "lightpink"]),
    ("gray", &["gray", "darkgray", "dimgray", "lightgray"]),
    ("white", &["white", "ivory", "snow", "floralwhite"]),
    ("black", &["black"]),
    ("brown", &["brown", "saddlebrown", "peru", "chocolate"]),
    ("cyan", &["cyan", "aqua", "darkcyan"]),
    ("magenta", &["magenta", "fuchsia"]),
];

/// Whether sampled colors are reported by palette name or by color family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    /// Fine-grained CSS3 palette names
    Named,
    /// Palette names folded into coarse families
    #[default]
    Folded,
}

/// A named reference color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    pub name: String,
    pub rgb: [u8; 3],
}

/// Fixed table of reference colors. Iteration order is declaration order.
#[derive(Debug, Clone)]
pub struct ColorPalette {
    entries: Vec<PaletteEntry>,
}

impl ColorPalette {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    /// The CSS3 subset used for wallpaper color tagging.
    pub fn css3() -> Self {
        Self::new(
            CSS3_COLORS
                .iter()
                .map(|(name, rgb)| PaletteEntry {
                    name: name.to_string(),
                    rgb: *rgb,
                })
                .collect(),
        )
    }

    pub fn entries(&self) -> &[PaletteEntry] {
        &self.entries
    }

    /// Nearest entry by Euclidean distance. On ties the earliest entry wins.
    pub fn nearest(&self, rgb: [u8; 3]) -> Option<&PaletteEntry> {
        let mut best: Option<(&PaletteEntry, u32)> = None;
        for entry in &self.entries {
            let distance = squared_distance(entry.rgb, rgb);
            match best {
                Some((_, best_distance)) if distance >= best_distance => {}
                _ => best = Some((entry, distance)),
            }
        }
        best.map(|(entry, _)| entry)
    }
}

// Squared distance preserves the ordering of the Euclidean one.
fn squared_distance(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as i32 - y as i32;
            (d * d) as u32
        })
        .sum()
}

/// Maps palette names onto coarse color families. First family listing a name wins.
#[derive(Debug, Clone)]
pub struct ColorFolding {
    families: Vec<(String, Vec<String>)>,
}

impl ColorFolding {
    pub fn new(families: Vec<(String, Vec<String>)>) -> Self {
        Self { families }
    }

    pub fn standard() -> Self {
        Self::new(
            COLOR_FAMILIES
                .iter()
                .map(|(family, members)| {
                    (
                        family.to_string(),
                        members.iter().map(|m| m.to_string()).collect(),
                    )
                })
                .collect(),
        )
    }

    pub fn fold<'a>(&'a self, name: &str) -> &'a str {
        self.families
            .iter()
            .find(|(_, members)| members.iter().any(|m| m == name))
            .map(|(family, _)| family.as_str())
            .unwrap_or(UNMATCHED_COLOR)
    }
}

/// Palette lookup plus the optional folding stage.
#[derive(Debug, Clone)]
pub struct ColorClassifier {
    palette: ColorPalette,
    folding: Option<ColorFolding>,
}

impl ColorClassifier {
    pub fn new(palette: ColorPalette, folding: Option<ColorFolding>) -> Self {
        Self { palette, folding }
    }

    pub fn for_mode(mode: ColorMode) -> Self {
        let folding = match mode {
            ColorMode::Named => None,
            ColorMode::Folded => Some(ColorFolding::standard()),
        };
        Self::new(ColorPalette::css3(), folding)
    }

    pub fn classify(&self, rgb: [u8; 3]) -> String {
        let name = match self.palette.nearest(rgb) {
            Some(entry) => entry.name.as_str(),
            None => return UNMATCHED_COLOR.to_string(),
        };
        match &self.folding {
            Some(folding) => folding.fold(name).to_string(),
            None => name.to_string(),
        }
    }
}

impl Default for ColorClassifier {
    fn default() -> Self {
        Self::for_mode(ColorMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_exact_palette_colors_classify_to_themselves() {
        let classifier = ColorClassifier::for_mode(ColorMode::Named);
        let palette = ColorPalette::css3();

        let mut seen = HashSet::new();
        for entry in palette.entries() {
            // Later entries sharing coordinates lose the tie.
            if !seen.insert(entry.rgb) {
                continue;
            }
            assert_eq!(classifier.classify(entry.rgb), entry.name);
        }
    }

    #[test]
    fn test_ties_resolve_to_first_declared_entry() {
        let classifier = ColorClassifier::for_mode(ColorMode::Named);
        assert_eq!(classifier.classify([0, 255, 255]), "cyan");
        assert_eq!(classifier.classify([255, 0, 255]), "magenta");

        let palette = ColorPalette::new(vec![
            PaletteEntry { name: "low".into(), rgb: [0, 0, 0] },
            PaletteEntry { name: "high".into(), rgb: [20, 20, 20] },
        ]);
        assert_eq!(palette.nearest([10, 10, 10]).unwrap().name, "low");
    }

    #[test]
    fn test_near_colors_snap_to_nearest_entry() {
        let classifier = ColorClassifier::for_mode(ColorMode::Named);
        assert_eq!(classifier.classify([250, 5, 5]), "red");
        assert_eq!(classifier.classify([3, 2, 1]), "black");
        assert_eq!(classifier.classify([130, 126, 129]), "gray");
    }

    #[test]
    fn test_folding_maps_to_families() {
        let classifier = ColorClassifier::for_mode(ColorMode::Folded);
        assert_eq!(classifier.classify([139, 0, 0]), "red");
        assert_eq!(classifier.classify([255, 250, 250]), "white");
        assert_eq!(classifier.classify([0, 255, 255]), "cyan");
        // chocolate is listed under orange before brown
        assert_eq!(classifier.classify([210, 105, 30]), "orange");
    }

    #[test]
    fn test_unknown_names_fold_to_sentinel() {
        let folding = ColorFolding::standard();
        assert_eq!(folding.fold("teal"), UNMATCHED_COLOR);

        let empty = ColorClassifier::new(ColorPalette::new(Vec::new()), None);
        assert_eq!(empty.classify([1, 2, 3]), UNMATCHED_COLOR);
    }
}
