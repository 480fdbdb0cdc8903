use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Visual theme for a constellation, keyed by the seed's top tag.
///
/// The table is built once at process start and is read-only thereafter;
/// callers receive `'static` references into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeDescriptor {
    pub name: &'static str,
    /// Dominant star/background tint, hex RGB
    pub primary: &'static str,
    /// Edge/glow accent, hex RGB
    pub accent: &'static str,
}

const DEFAULT_THEME: ThemeDescriptor = ThemeDescriptor {
    name: "nebula",
    primary: "#7f8cff",
    accent: "#c0c8ff",
};

static THEMES: LazyLock<HashMap<&'static str, ThemeDescriptor>> = LazyLock::new(|| {
    let entries: [(&str, ThemeDescriptor); 14] = [
        ("rock", ThemeDescriptor { name: "ember", primary: "#ff5a3c", accent: "#ffb199" }),
        ("metal", ThemeDescriptor { name: "forge", primary: "#b0b4c0", accent: "#ff3b30" }),
        ("pop", ThemeDescriptor { name: "prism", primary: "#ff7ac8", accent: "#ffd166" }),
        ("electronic", ThemeDescriptor { name: "circuit", primary: "#00d4ff", accent: "#9b5cff" }),
        ("dance", ThemeDescriptor { name: "strobe", primary: "#ff2ea6", accent: "#2effd5" }),
        ("house", ThemeDescriptor { name: "strobe", primary: "#ff2ea6", accent: "#2effd5" }),
        ("hip-hop", ThemeDescriptor { name: "asphalt", primary: "#ffd23f", accent: "#5e60ce" }),
        ("rap", ThemeDescriptor { name: "asphalt", primary: "#ffd23f", accent: "#5e60ce" }),
        ("jazz", ThemeDescriptor { name: "smoke", primary: "#d4a373", accent: "#588157" }),
        ("classical", ThemeDescriptor { name: "aurora", primary: "#e8e4d8", accent: "#8f9bff" }),
        ("ambient", ThemeDescriptor { name: "drift", primary: "#76c7c0", accent: "#3a506b" }),
        ("folk", ThemeDescriptor { name: "grove", primary: "#90be6d", accent: "#f9c74f" }),
        ("indie", ThemeDescriptor { name: "haze", primary: "#b298dc", accent: "#ffd6a5" }),
        ("soul", ThemeDescriptor { name: "velvet", primary: "#c77dff", accent: "#ffc8dd" }),
    ];
    entries.into_iter().collect()
});

/// Picks the theme for a tag list: first tag with a table entry wins,
/// matched case-insensitively; falls back to the default theme.
pub fn theme_for_tags<S: AsRef<str>>(tags: &[S]) -> &'static ThemeDescriptor {
    for tag in tags {
        if let Some(theme) = THEMES.get(tag.as_ref().to_lowercase().as_str()) {
            return theme;
        }
    }
    &DEFAULT_THEME
}
