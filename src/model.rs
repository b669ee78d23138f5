use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;

/// The category name and color joined onto a product when it is read from the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub name: String,
    /// Falls back to the first palette color when the category has none.
    #[serde(default = "default_color", deserialize_with = "null_as_default_color")]
    pub color: String,
}

/// Columns the record store may return as `null` are read as their default value instead of
/// failing the whole list.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_color() -> String {
    COLOR_PALETTE[0].value.to_string()
}

fn null_as_default_color<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_color))
}

/// A product row as it is read back from the record store, with its category already joined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    /// The human-entered code, stored uppercased.
    #[serde(default, deserialize_with = "null_as_default")]
    pub product_code: String,
    pub category_id: String,
    #[serde(default)]
    pub category: Option<CategoryRef>,
    pub price: f64,
    pub qty_per_box: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub image_size: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_hidden: bool,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl Product {
    /// The name of the joined category, if the join resolved.
    pub fn category_name(&self) -> Option<&str> {
        self.category.as_ref().map(|category| category.name.as_str())
    }

    /// The code printed on the PDF cards: the first 8 characters of the record identifier, uppercased.
    ///
    /// This is deliberately not `product_code`, which is what the admin and the on-screen catalogue show.
    pub fn printed_code(&self) -> String {
        self.id.chars().take(8).collect::<String>().to_uppercase()
    }
}

/// The payload written to the record store when a product is inserted or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub name: String,
    pub product_code: String,
    pub category_id: String,
    pub price: f64,
    pub qty_per_box: String,
    pub image_url: String,
    pub image_size: u64,
    pub is_hidden: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i64,
}

impl Category {
    /// The color of the category, falling back to the first color of the palette.
    pub fn color_or_default(&self) -> &str {
        self.color.as_deref().unwrap_or(COLOR_PALETTE[0].value)
    }
}

/// The payload written to the record store when a category is inserted or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub name: String,
    pub color: String,
    pub display_order: i64,
}

/// One entry of the palette offered for the category colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaletteColor {
    pub name: &'static str,
    pub value: &'static str,
}

/// The only colors which can be picked for a new category, in the order they are offered.
pub const COLOR_PALETTE: [PaletteColor; 22] = [
    PaletteColor { name: "Red", value: "#EF4444" },
    PaletteColor { name: "Orange", value: "#F97316" },
    PaletteColor { name: "Amber", value: "#F59E0B" },
    PaletteColor { name: "Yellow", value: "#EAB308" },
    PaletteColor { name: "Lime", value: "#84CC16" },
    PaletteColor { name: "Green", value: "#22C55E" },
    PaletteColor { name: "Emerald", value: "#10B981" },
    PaletteColor { name: "Teal", value: "#14B8A6" },
    PaletteColor { name: "Cyan", value: "#06B6D4" },
    PaletteColor { name: "Sky", value: "#0EA5E9" },
    PaletteColor { name: "Blue", value: "#3B82F6" },
    PaletteColor { name: "Indigo", value: "#6366F1" },
    PaletteColor { name: "Violet", value: "#8B5CF6" },
    PaletteColor { name: "Purple", value: "#A855F7" },
    PaletteColor { name: "Fuchsia", value: "#D946EF" },
    PaletteColor { name: "Pink", value: "#EC4899" },
    PaletteColor { name: "Rose", value: "#F43F5E" },
    PaletteColor { name: "Slate", value: "#64748B" },
    PaletteColor { name: "Gray", value: "#6B7280" },
    PaletteColor { name: "Zinc", value: "#71717A" },
    PaletteColor { name: "Stone", value: "#78716C" },
    PaletteColor { name: "Brown", value: "#92400E" },
];

/// Whether the given hex value is one of the palette colors (case-insensitive).
pub fn is_palette_color(value: &str) -> bool {
    COLOR_PALETTE
        .iter()
        .any(|color| color.value.eq_ignore_ascii_case(value))
}

/// A signed in user of the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printed_code_is_derived_from_the_identifier() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "id": "3f2a9c1e-77aa-4c1b-9d55-0e4a6b8f1234",
            "name": "ASHOKA MINI MUG",
            "product_code": "800A1ACE",
            "category_id": "0c5f1f7e-1d2c-4f0e-9b8a-9a1d2c3b4e5f",
            "price": 620.0,
            "qty_per_box": "24 PCS",
        }))
        .unwrap();

        assert_eq!(product.printed_code(), "3F2A9C1E");
        assert_ne!(product.printed_code(), product.product_code);
        assert!(!product.is_hidden);
        assert_eq!(product.category_name(), None);
    }

    #[test]
    fn null_columns_fall_back_to_their_defaults() {
        let products: Vec<Product> = serde_json::from_value(serde_json::json!([{
            "id": "3f2a9c1e-77aa-4c1b-9d55-0e4a6b8f1234",
            "name": "ASHOKA MINI MUG",
            "product_code": null,
            "category_id": "0c5f1f7e-1d2c-4f0e-9b8a-9a1d2c3b4e5f",
            "category": { "name": "MUGS", "color": null },
            "price": 620.0,
            "qty_per_box": "24 PCS",
            "image_url": null,
            "is_hidden": null,
        }]))
        .unwrap();

        assert_eq!(products[0].product_code, "");
        assert!(!products[0].is_hidden);
        let category = products[0].category.as_ref().unwrap();
        assert_eq!(category.name, "MUGS");
        assert_eq!(category.color, "#EF4444");

        let categories: Vec<Category> = serde_json::from_value(serde_json::json!([
            { "id": "mugs", "name": "MUGS", "color": null, "display_order": null },
            { "id": "plates", "name": "PLATES" },
        ]))
        .unwrap();

        assert_eq!(categories[0].display_order, 0);
        assert_eq!(categories[0].color_or_default(), "#EF4444");
        assert_eq!(categories[1].display_order, 0);
    }

    #[test]
    fn palette_has_twenty_two_distinct_colors() {
        let mut values: Vec<_> = COLOR_PALETTE.iter().map(|color| color.value).collect();
        values.sort_unstable();
        values.dedup();

        assert_eq!(values.len(), 22);
        assert!(is_palette_color("#ef4444"));
        assert!(!is_palette_color("#123456"));
    }
}
