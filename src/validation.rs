use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{is_palette_color, Category};

/// Uploads bigger than this are rejected before any processing.
pub const MAX_IMAGE_FILE_SIZE: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];
pub const MAX_PRICE: f64 = 999_999.0;

static QUANTITY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\d+\s*(PCS|PIECES)$").expect("Invalid regex"));

/// Field name to message, in a stable order so that it can be shown next to each field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message for a field, keeping the first message if the field already failed.
    pub fn add<S: Into<String>>(&mut self, field: &str, message: S) {
        self.0
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(field, message)| (field.as_str(), message.as_str()))
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages = self
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>();
        write!(formatter, "{}", messages.join(", "))
    }
}

/// The product editor fields exactly as typed by the operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductForm {
    pub name: String,
    pub product_code: String,
    pub category_id: String,
    pub price: String,
    pub qty_per_box: String,
}

/// The fields of a product form once they passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProduct {
    pub name: String,
    pub product_code: String,
    pub category_id: String,
    pub price: f64,
    pub qty_per_box: String,
}

pub fn validate_product(form: &ProductForm) -> Result<ValidProduct, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name_length = form.name.chars().count();
    if name_length < 3 {
        errors.add("name", "Product name must be at least 3 characters");
    } else if name_length > 100 {
        errors.add("name", "Product name must be less than 100 characters");
    }

    if uuid::Uuid::parse_str(&form.category_id).is_err() {
        errors.add("category_id", "Invalid category");
    }

    let price = match form.price.trim().parse::<f64>() {
        Ok(price) => {
            if let Err(message) = check_price(price) {
                errors.add("price", message);
            }
            price
        }
        Err(_) => {
            errors.add("price", "Price must be a number");
            0.0
        }
    };

    if let Err(message) = check_quantity(&form.qty_per_box) {
        errors.add("qty_per_box", message);
    }

    errors.into_result()?;

    Ok(ValidProduct {
        name: form.name.clone(),
        product_code: form.product_code.trim().to_uppercase(),
        category_id: form.category_id.clone(),
        price,
        qty_per_box: form.qty_per_box.clone(),
    })
}

pub fn check_price(price: f64) -> Result<(), &'static str> {
    if !price.is_finite() || price <= 0.0 {
        return Err("Price must be greater than 0");
    }
    if price > MAX_PRICE {
        return Err("Price too high");
    }
    Ok(())
}

/// Accepts `<integer> PCS` or `<integer> PIECES` in any letter case, e.g. `48 PCS` or `60 pieces`.
pub fn check_quantity(quantity: &str) -> Result<(), &'static str> {
    if quantity.is_empty() {
        return Err("Quantity is required");
    }
    if !QUANTITY_PATTERN.is_match(quantity) {
        return Err("Format: \"48 PCS\" or \"60 PIECES\"");
    }
    Ok(())
}

/// An image file as picked by the operator, before compression.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub fn validate_image_file(upload: &ImageUpload) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if upload.bytes.len() > MAX_IMAGE_FILE_SIZE {
        errors.add("image", "File size must be less than 5MB");
    }
    if !ALLOWED_IMAGE_TYPES.contains(&upload.content_type.as_str()) {
        errors.add("image", "Only JPG, PNG, and WebP images are allowed");
    }
    errors.into_result()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub color: String,
}

/// Checks a category form. The color must come from the palette, unless the category being
/// edited already carried that color.
pub fn validate_category(
    form: &CategoryForm,
    editing: Option<&Category>,
) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let name = form.name.trim();
    if name.is_empty() {
        errors.add("name", "Category name is required");
    }

    let carried_over = editing
        .and_then(|category| category.color.as_deref())
        .is_some_and(|previous| previous.eq_ignore_ascii_case(&form.color));
    if !is_palette_color(&form.color) && !carried_over {
        errors.add("color", "Pick one of the palette colors");
    }

    errors.into_result()?;

    Ok((name.to_string(), form.color.clone()))
}
