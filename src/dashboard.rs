use serde::{Deserialize, Serialize};

use crate::{
    error::ContextError,
    listing::{product_counts, AdminFilter, ProductCounts},
    model::{Category, CategoryRecord, Product, ProductRecord},
    preprocess::{compress_image, format_file_size, CompressOptions, PreparedImage},
    store::{new_object_key, ObjectStore, ProductQuery, RecordStore, SessionProvider, StoredObject},
    validation::{
        validate_category, validate_image_file, validate_product, CategoryForm, ImageUpload,
        ProductForm, ValidationErrors,
    },
};

const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// The storage quota of the object store in megabytes.
pub const STORAGE_QUOTA_MEGABYTES: f64 = 1024.0;
/// Above this many megabytes, saving a product warns that the storage is almost full.
pub const STORAGE_WARNING_MEGABYTES: f64 = 900.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Success,
    Error,
}

/// A message shown to the operator until it is dismissed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Notification {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error<S: Into<String>>(message: S) -> Self {
        Notification {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }
}

/// The storage used by the product images, summed from the sizes recorded on the products.
/// It is an estimate recomputed after every change, not an exact accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    pub used_bytes: u64,
}

impl StorageUsage {
    pub fn from_products(products: &[Product]) -> Self {
        StorageUsage {
            used_bytes: products
                .iter()
                .map(|product| product.image_size.unwrap_or_default())
                .sum(),
        }
    }

    pub fn used_megabytes(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_MEGABYTE
    }

    pub fn percentage(&self) -> f64 {
        self.used_megabytes() / STORAGE_QUOTA_MEGABYTES * 100.0
    }

    pub fn is_almost_full(&self) -> bool {
        self.used_megabytes() > STORAGE_WARNING_MEGABYTES
    }
}

impl std::fmt::Display for StorageUsage {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{:.1}MB of 1GB used ({:.1}%, {})",
            self.used_megabytes(),
            self.percentage(),
            format_file_size(self.used_bytes)
        )
    }
}

/// Why a product or a category was not saved.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveError {
    /// Some fields are wrong, nothing was sent to the backend.
    Invalid(ValidationErrors),
    /// A remote call failed and the save was abandoned.
    Failed(ContextError),
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Invalid(errors) => write!(formatter, "invalid fields: {}", errors),
            SaveError::Failed(error) => write!(formatter, "{}", error),
        }
    }
}

impl std::error::Error for SaveError {}

impl From<ValidationErrors> for SaveError {
    fn from(errors: ValidationErrors) -> Self {
        SaveError::Invalid(errors)
    }
}

impl From<ContextError> for SaveError {
    fn from(error: ContextError) -> Self {
        SaveError::Failed(error)
    }
}

/// Everything the admin screen shows, kept in one serializable value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewState {
    /// All products, hidden ones included, newest first.
    pub products: Vec<Product>,
    pub categories: Vec<Category>,
    pub filter: AdminFilter,
    pub storage: StorageUsage,
    pub notification: Option<Notification>,
    /// The field errors of the last rejected form.
    pub form_errors: ValidationErrors,
}

impl ViewState {
    pub fn filtered_products(&self) -> Vec<&Product> {
        self.filter.apply(&self.products)
    }

    pub fn counts(&self) -> ProductCounts {
        product_counts(&self.products)
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id == id)
    }
}

/// The handlers behind the admin screen. Every mutation goes to the backend first and then
/// reloads the lists, except the visibility toggle which patches the loaded list in place.
pub struct AdminDashboard<'a, B> {
    backend: &'a B,
    compress_options: CompressOptions,
    state: ViewState,
}

impl<'a, B> AdminDashboard<'a, B>
where
    B: RecordStore + ObjectStore + SessionProvider,
{
    pub fn new(backend: &'a B) -> Self {
        AdminDashboard {
            backend,
            compress_options: CompressOptions::default(),
            state: ViewState::default(),
        }
    }

    pub fn with_compress_options(mut self, compress_options: CompressOptions) -> Self {
        self.compress_options = compress_options;
        self
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn set_filter(&mut self, filter: AdminFilter) {
        self.state.filter = filter;
    }

    pub fn dismiss_notification(&mut self) {
        self.state.notification = None;
    }

    fn notify(&mut self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => log::info!("{}", notification.message),
            NotificationKind::Error => log::error!("{}", notification.message),
        }
        self.state.notification = Some(notification);
    }

    /// Reloads the products, the categories and the storage usage.
    pub fn refresh(&mut self) -> Result<(), ContextError> {
        let products = match self.backend.products(ProductQuery::All) {
            Ok(products) => products,
            Err(error) => {
                log::error!("Error fetching products: {}", error);
                self.notify(Notification::error("Failed to load products"));
                return Err(error);
            }
        };
        let categories = self.backend.categories()?;
        self.state.storage = StorageUsage::from_products(&products);
        self.state.products = products;
        self.state.categories = categories;

        Ok(())
    }

    /// Reloads after a mutation which already succeeded, a failing reload is only logged.
    fn refresh_after_change(&mut self) {
        if let Err(error) = self.refresh() {
            log::warn!("Unable to reload after the change: {}", error);
        }
    }

    /// Creates a product, or updates the product `editing_id` when given.
    ///
    /// A new product needs an image. When an image is supplied it is compressed and uploaded
    /// before the record is written, and the image it replaces is deleted only once the record
    /// points to the new one. If the record cannot be written, the freshly uploaded image is
    /// deleted again so that nothing is left unreferenced.
    pub fn save_product(
        &mut self,
        form: &ProductForm,
        image: Option<&ImageUpload>,
        editing_id: Option<&str>,
    ) -> Result<Product, SaveError> {
        self.state.form_errors = ValidationErrors::new();
        match self.try_save_product(form, image, editing_id) {
            Ok(product) => Ok(product),
            Err(SaveError::Invalid(errors)) => {
                self.state.form_errors = errors.clone();
                Err(SaveError::Invalid(errors))
            }
            Err(SaveError::Failed(error)) => {
                self.notify(Notification::error(error.to_string()));
                Err(SaveError::Failed(error))
            }
        }
    }

    fn try_save_product(
        &mut self,
        form: &ProductForm,
        image: Option<&ImageUpload>,
        editing_id: Option<&str>,
    ) -> Result<Product, SaveError> {
        let valid = validate_product(form)?;
        let editing = match editing_id {
            Some(id) => Some(self.state.product(id).cloned().ok_or_else(|| {
                ContextError::with_context(format!("No product with the id {id:?} is loaded"))
            })?),
            None => None,
        };
        match image {
            Some(image) => validate_image_file(image)?,
            None if editing.is_none() => {
                let mut errors = ValidationErrors::new();
                errors.add("image", "Product image is required");
                return Err(SaveError::Invalid(errors));
            }
            None => {}
        }

        if self.state.storage.is_almost_full() {
            self.notify(Notification::error(format!(
                "Storage almost full! {:.0}MB of 1GB used.",
                self.state.storage.used_megabytes()
            )));
        }

        let uploaded = match image {
            Some(image) => Some(self.upload_image(image)?),
            None => None,
        };
        let (image_url, image_size) = match (&uploaded, &editing) {
            (Some(stored), _) => (stored.public_url.clone(), stored.size),
            (None, Some(editing)) => (
                editing.image_url.clone().unwrap_or_default(),
                editing.image_size.unwrap_or_default(),
            ),
            (None, None) => (String::new(), 0),
        };
        let record = ProductRecord {
            name: valid.name,
            product_code: valid.product_code,
            category_id: valid.category_id,
            price: valid.price,
            qty_per_box: valid.qty_per_box,
            image_url,
            image_size,
            is_hidden: editing.as_ref().is_some_and(|editing| editing.is_hidden),
        };

        let written = match &editing {
            Some(editing) => self.backend.update_product(&editing.id, &record),
            None => self.backend.insert_product(&record),
        };
        let product = match written {
            Ok(product) => product,
            Err(error) => {
                if let Some(stored) = &uploaded {
                    if let Err(cleanup_error) = self.backend.delete(&stored.public_url) {
                        log::error!(
                            "Unable to delete the unreferenced image {:?}: {}",
                            stored.key,
                            cleanup_error
                        );
                    }
                }
                return Err(SaveError::Failed(error));
            }
        };

        if uploaded.is_some() {
            if let Some(previous_url) = editing
                .as_ref()
                .and_then(|editing| editing.image_url.as_deref())
                .filter(|url| !url.is_empty())
            {
                if let Err(error) = self.backend.delete(previous_url) {
                    log::warn!("Unable to delete the replaced image {:?}: {}", previous_url, error);
                }
            }
        }

        log::info!("Saved the product {:?} ({})", product.name, product.id);
        self.notify(Notification::success(if editing.is_some() {
            "Product updated successfully!"
        } else {
            "Product added successfully!"
        }));
        self.refresh_after_change();

        Ok(product)
    }

    fn upload_image(&self, image: &ImageUpload) -> Result<StoredObject, ContextError> {
        let upload_failed =
            |error: ContextError| ContextError::with_context(format!("Image upload failed: {error}"));
        let prepared = compress_image(image, &self.compress_options).map_err(upload_failed)?;
        let key = new_object_key(PreparedImage::EXTENSION);

        self.backend
            .store(&key, &prepared.bytes, PreparedImage::CONTENT_TYPE)
            .map_err(upload_failed)
    }

    /// Flips the hidden flag of a product for a signed in operator and returns the new value.
    pub fn toggle_visibility(&mut self, id: &str) -> Result<bool, ContextError> {
        match self.backend.current_user() {
            Ok(Some(_)) => {}
            Ok(None) => {
                let error = ContextError::with_context("You must be logged in to update products");
                self.notify(Notification::error(&error.context));
                return Err(error);
            }
            Err(error) => {
                self.notify(Notification::error(format!("Failed to update: {error}")));
                return Err(error);
            }
        }

        let currently_hidden = match self.state.product(id) {
            Some(product) => product.is_hidden,
            None => {
                let error =
                    ContextError::with_context(format!("No product with the id {id:?} is loaded"));
                self.notify(Notification::error(format!("Failed to update: {error}")));
                return Err(error);
            }
        };
        let hidden = !currently_hidden;
        if let Err(error) = self.backend.set_product_hidden(id, hidden) {
            self.notify(Notification::error(format!("Failed to update: {error}")));
            return Err(error);
        }

        for product in self.state.products.iter_mut().filter(|product| product.id == id) {
            product.is_hidden = hidden;
        }
        self.notify(Notification::success(if hidden {
            "Product hidden from catalog & PDF"
        } else {
            "Product visible in catalog & PDF"
        }));

        Ok(hidden)
    }

    /// Deletes the record of a product, then its image. A failure to delete the image leaves an
    /// unreferenced object behind and is only logged.
    pub fn delete_product(&mut self, id: &str) -> Result<(), ContextError> {
        let image_url = self
            .state
            .product(id)
            .and_then(|product| product.image_url.clone());
        if let Err(error) = self.backend.delete_product(id) {
            log::error!("Delete error: {}", error);
            self.notify(Notification::error("Failed to delete product"));
            return Err(error);
        }
        if let Some(image_url) = image_url.filter(|url| !url.is_empty()) {
            if let Err(error) = self.backend.delete(&image_url) {
                log::warn!("Unable to delete the image {:?}: {}", image_url, error);
            }
        }

        self.notify(Notification::success("Product deleted successfully"));
        self.refresh_after_change();

        Ok(())
    }

    /// Creates a category, or updates the category `editing_id` when given. New categories are
    /// placed after the existing ones.
    pub fn save_category(
        &mut self,
        form: &CategoryForm,
        editing_id: Option<&str>,
    ) -> Result<Category, SaveError> {
        self.state.form_errors = ValidationErrors::new();
        let editing = editing_id.and_then(|id| {
            self.state
                .categories
                .iter()
                .find(|category| category.id == id)
                .cloned()
        });
        if let (Some(id), None) = (editing_id, &editing) {
            let error = ContextError::with_context(format!("No category with the id {id:?} is loaded"));
            self.notify(Notification::error(error.to_string()));
            return Err(SaveError::Failed(error));
        }

        let (name, color) = match validate_category(form, editing.as_ref()) {
            Ok(valid) => valid,
            Err(errors) => {
                self.state.form_errors = errors.clone();
                return Err(SaveError::Invalid(errors));
            }
        };
        let record = CategoryRecord {
            name,
            color,
            display_order: editing
                .as_ref()
                .map_or(self.state.categories.len() as i64 + 1, |editing| {
                    editing.display_order
                }),
        };

        let written = match &editing {
            Some(editing) => self.backend.update_category(&editing.id, &record),
            None => self.backend.insert_category(&record),
        };
        let category = match written {
            Ok(category) => category,
            Err(error) => {
                self.notify(Notification::error(format!("Failed to save category: {error}")));
                return Err(SaveError::Failed(error));
            }
        };

        self.notify(Notification::success(if editing.is_some() {
            "Category updated successfully!"
        } else {
            "Category created successfully!"
        }));
        self.refresh_after_change();

        Ok(category)
    }

    /// Deletes a category which no product references. The products are read again from the
    /// backend first, so that a product added elsewhere since the last load also blocks it.
    pub fn delete_category(&mut self, id: &str) -> Result<(), ContextError> {
        let products = match self.backend.products(ProductQuery::All) {
            Ok(products) => products,
            Err(error) => {
                self.notify(Notification::error("Failed to delete category"));
                return Err(error);
            }
        };
        let referencing = products
            .iter()
            .filter(|product| product.category_id == id)
            .count();
        if referencing > 0 {
            let message = format!(
                "Cannot delete category with {referencing} product(s). Remove products first."
            );
            self.notify(Notification::error(&message));
            return Err(ContextError::with_context(message));
        }

        if let Err(error) = self.backend.delete_category(id) {
            log::error!("Delete category error: {}", error);
            self.notify(Notification::error("Failed to delete category"));
            return Err(error);
        }
        self.notify(Notification::success("Category deleted successfully"));
        self.refresh_after_change();

        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<(), ContextError> {
        if let Err(error) = self.backend.sign_out() {
            log::error!("Logout error: {}", error);
            self.notify(Notification::error("Failed to logout"));
            return Err(error);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_gauge() {
        let usage = StorageUsage {
            used_bytes: 512 * 1024 * 1024,
        };
        assert_eq!(usage.used_megabytes(), 512.0);
        assert_eq!(usage.percentage(), 50.0);
        assert!(!usage.is_almost_full());

        let usage = StorageUsage {
            used_bytes: 901 * 1024 * 1024,
        };
        assert!(usage.is_almost_full());
        assert!(usage.to_string().starts_with("901.0MB of 1GB used"));
    }

    #[test]
    fn save_errors_convert() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "Category name is required");
        assert!(matches!(SaveError::from(errors), SaveError::Invalid(_)));
        assert!(matches!(
            SaveError::from(ContextError::with_context("Upload failed")),
            SaveError::Failed(_)
        ));
    }
}
