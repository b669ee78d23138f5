use std::{cell::Cell, io::Cursor};

use cataloguer::{
    dashboard::{AdminDashboard, NotificationKind, SaveError},
    error::ContextError,
    listing::{AdminFilter, CatalogueView},
    model::{Category, CategoryRecord, CategoryRef, Product, ProductRecord, User},
    preprocess::CompressOptions,
    store::{
        landing_route, MemoryBackend, ObjectStore, ProductQuery, RecordStore, Route,
        SessionProvider, StoredObject,
    },
    validation::{CategoryForm, ImageUpload, ProductForm},
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// A backend whose product writes can be made to fail, everything else goes to memory.
struct FlakyProductWrites {
    inner: MemoryBackend,
    failing: Cell<bool>,
}

impl FlakyProductWrites {
    fn refuse_product_writes(&self) -> Result<(), ContextError> {
        if self.failing.get() {
            return Err(ContextError::with_context("The record store is unavailable"));
        }
        Ok(())
    }
}

impl RecordStore for FlakyProductWrites {
    fn products(&self, query: ProductQuery) -> Result<Vec<Product>, ContextError> {
        self.inner.products(query)
    }

    fn categories(&self) -> Result<Vec<Category>, ContextError> {
        self.inner.categories()
    }

    fn insert_product(&self, record: &ProductRecord) -> Result<Product, ContextError> {
        self.refuse_product_writes()?;
        self.inner.insert_product(record)
    }

    fn update_product(&self, id: &str, record: &ProductRecord) -> Result<Product, ContextError> {
        self.refuse_product_writes()?;
        self.inner.update_product(id, record)
    }

    fn set_product_hidden(&self, id: &str, is_hidden: bool) -> Result<(), ContextError> {
        self.inner.set_product_hidden(id, is_hidden)
    }

    fn delete_product(&self, id: &str) -> Result<(), ContextError> {
        self.inner.delete_product(id)
    }

    fn insert_category(&self, record: &CategoryRecord) -> Result<Category, ContextError> {
        self.inner.insert_category(record)
    }

    fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Category, ContextError> {
        self.inner.update_category(id, record)
    }

    fn delete_category(&self, id: &str) -> Result<(), ContextError> {
        self.inner.delete_category(id)
    }
}

impl ObjectStore for FlakyProductWrites {
    fn store(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, ContextError> {
        self.inner.store(key, bytes, content_type)
    }

    fn delete(&self, public_url: &str) -> Result<(), ContextError> {
        self.inner.delete(public_url)
    }
}

impl SessionProvider for FlakyProductWrites {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, ContextError> {
        self.inner.sign_in(email, password)
    }

    fn sign_out(&self) -> Result<(), ContextError> {
        self.inner.sign_out()
    }

    fn current_user(&self) -> Result<Option<User>, ContextError> {
        self.inner.current_user()
    }
}

fn png_upload(side: u32) -> ImageUpload {
    let image = RgbImage::from_fn(side, side, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();

    ImageUpload {
        file_name: "mug.png".to_string(),
        content_type: "image/png".to_string(),
        bytes,
    }
}

fn signed_in_backend() -> MemoryBackend {
    let backend = MemoryBackend::new().with_account("admin@example.test", "secret");
    backend.sign_in("admin@example.test", "secret").unwrap();
    backend
}

fn small_images() -> CompressOptions {
    CompressOptions {
        max_size_bytes: 64 * 1024,
        max_width_or_height: 300,
    }
}

fn mug_form(category_id: &str) -> ProductForm {
    ProductForm {
        name: "ASHOKA MINI MUG".to_string(),
        product_code: "800a1ace".to_string(),
        category_id: category_id.to_string(),
        price: "620".to_string(),
        qty_per_box: "24 PCS".to_string(),
    }
}

fn add_mugs_category(dashboard: &mut AdminDashboard<'_, MemoryBackend>) -> Category {
    dashboard
        .save_category(
            &CategoryForm {
                name: "MUGS".to_string(),
                color: "#EF4444".to_string(),
            },
            None,
        )
        .unwrap()
}

#[test]
fn adding_a_product_uploads_its_image() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);

    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();

    assert_eq!(product.product_code, "800A1ACE");
    assert!(!product.is_hidden);
    assert_eq!(product.category_name(), Some("MUGS"));
    let image_url = product.image_url.clone().unwrap();
    assert!(backend.contains_object(&image_url));
    assert!(image_url.ends_with(".jpg"));
    assert_eq!(backend.object_count(), 1);

    let state = dashboard.state();
    assert_eq!(state.products.len(), 1);
    assert!(state.storage.used_bytes > 0);
    let notification = state.notification.as_ref().unwrap();
    assert_eq!(notification.kind, NotificationKind::Success);
    assert_eq!(notification.message, "Product added successfully!");
}

#[test]
fn invalid_forms_never_reach_the_backend() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);

    let missing_image = dashboard.save_product(&mug_form(&mugs.id), None, None);
    match missing_image {
        Err(SaveError::Invalid(errors)) => {
            assert_eq!(errors.get("image"), Some("Product image is required"))
        }
        other => panic!("unexpected result {other:?}"),
    }

    let mut form = mug_form(&mugs.id);
    form.name = "MU".to_string();
    form.qty_per_box = "two dozen".to_string();
    let rejected = dashboard.save_product(&form, Some(&png_upload(400)), None);
    assert!(matches!(rejected, Err(SaveError::Invalid(_))));
    assert_eq!(dashboard.state().form_errors.len(), 2);

    let too_small = dashboard.save_product(&mug_form(&mugs.id), Some(&png_upload(120)), None);
    assert!(matches!(too_small, Err(SaveError::Failed(_))));

    assert_eq!(backend.object_count(), 0);
    assert!(backend.products(ProductQuery::All).unwrap().is_empty());
}

#[test]
fn replacing_the_image_deletes_the_previous_one() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);
    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();
    let first_url = product.image_url.clone().unwrap();

    let mut form = mug_form(&mugs.id);
    form.price = "640.50".to_string();
    let updated = dashboard
        .save_product(&form, Some(&png_upload(500)), Some(&product.id))
        .unwrap();
    let second_url = updated.image_url.clone().unwrap();

    assert_ne!(first_url, second_url);
    assert!(!backend.contains_object(&first_url));
    assert!(backend.contains_object(&second_url));
    assert_eq!(backend.object_count(), 1);
    assert_eq!(updated.price, 640.5);

    // Without a new image the current one is kept
    let kept = dashboard
        .save_product(&mug_form(&mugs.id), None, Some(&product.id))
        .unwrap();
    assert_eq!(kept.image_url.as_deref(), Some(second_url.as_str()));
    assert_eq!(
        dashboard.state().notification.as_ref().unwrap().message,
        "Product updated successfully!"
    );
}

#[test]
fn a_failed_record_write_removes_the_new_upload_and_keeps_the_old_image() {
    let backend = FlakyProductWrites {
        inner: signed_in_backend(),
        failing: Cell::new(false),
    };
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = dashboard
        .save_category(
            &CategoryForm {
                name: "MUGS".to_string(),
                color: "#EF4444".to_string(),
            },
            None,
        )
        .unwrap();
    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();
    let first_url = product.image_url.clone().unwrap();

    backend.failing.set(true);
    let replaced = dashboard.save_product(
        &mug_form(&mugs.id),
        Some(&png_upload(500)),
        Some(&product.id),
    );
    assert!(matches!(replaced, Err(SaveError::Failed(_))));
    assert_eq!(backend.inner.object_count(), 1);
    assert!(backend.inner.contains_object(&first_url));
    let stored = backend.inner.products(ProductQuery::All).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].image_url.as_deref(), Some(first_url.as_str()));
    assert_eq!(
        dashboard.state().notification.as_ref().unwrap().kind,
        NotificationKind::Error
    );

    let added = dashboard.save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None);
    assert!(matches!(added, Err(SaveError::Failed(_))));
    assert_eq!(backend.inner.object_count(), 1);
    assert_eq!(backend.inner.products(ProductQuery::All).unwrap().len(), 1);
}

#[test]
fn toggling_hides_the_product_from_the_catalogue() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);
    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();

    assert!(dashboard.toggle_visibility(&product.id).unwrap());
    assert!(backend.products(ProductQuery::VisibleOnly).unwrap().is_empty());
    assert_eq!(dashboard.state().counts().hidden, 1);
    assert_eq!(
        dashboard.state().notification.as_ref().unwrap().message,
        "Product hidden from catalog & PDF"
    );

    assert!(!dashboard.toggle_visibility(&product.id).unwrap());
    assert_eq!(backend.products(ProductQuery::VisibleOnly).unwrap().len(), 1);
}

#[test]
fn toggling_requires_a_session() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);
    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();

    dashboard.sign_out().unwrap();
    assert_eq!(landing_route(&backend), Route::Catalogue);
    assert!(dashboard.toggle_visibility(&product.id).is_err());

    let notification = dashboard.state().notification.as_ref().unwrap();
    assert_eq!(notification.kind, NotificationKind::Error);
    assert_eq!(notification.message, "You must be logged in to update products");
    assert_eq!(backend.products(ProductQuery::VisibleOnly).unwrap().len(), 1);
}

#[test]
fn categories_in_use_cannot_be_deleted() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);
    let product = dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();

    assert!(dashboard.delete_category(&mugs.id).is_err());
    assert_eq!(
        dashboard.state().notification.as_ref().unwrap().message,
        "Cannot delete category with 1 product(s). Remove products first."
    );
    assert_eq!(backend.categories().unwrap().len(), 1);

    dashboard.delete_product(&product.id).unwrap();
    assert_eq!(backend.object_count(), 0);
    dashboard.delete_category(&mugs.id).unwrap();
    assert!(backend.categories().unwrap().is_empty());
    assert!(dashboard.state().categories.is_empty());
}

#[test]
fn admin_filter_narrows_the_table() {
    let backend = signed_in_backend();
    let mut dashboard = AdminDashboard::new(&backend).with_compress_options(small_images());
    let mugs = add_mugs_category(&mut dashboard);
    dashboard
        .save_product(&mug_form(&mugs.id), Some(&png_upload(400)), None)
        .unwrap();

    dashboard.set_filter(AdminFilter {
        search: "800a".to_string(),
        category_id: None,
    });
    assert_eq!(dashboard.state().filtered_products().len(), 1);

    dashboard.set_filter(AdminFilter {
        search: "plate".to_string(),
        category_id: None,
    });
    assert!(dashboard.state().filtered_products().is_empty());
}

#[test]
fn public_pagination_slices_fifty_items_per_page() {
    let mugs = Category {
        id: "mugs".to_string(),
        name: "MUGS".to_string(),
        color: None,
        display_order: 1,
    };
    let products: Vec<Product> = (0..120)
        .map(|index| Product {
            id: format!("product-{index}"),
            name: format!("MUG {index}"),
            product_code: String::new(),
            category_id: "mugs".to_string(),
            category: Some(CategoryRef {
                name: "MUGS".to_string(),
                color: "#EF4444".to_string(),
            }),
            price: 10.0,
            qty_per_box: "12 PCS".to_string(),
            image_url: None,
            image_size: None,
            is_hidden: false,
            created_at: None,
            updated_at: None,
        })
        .collect();

    let mut view = CatalogueView::new();
    view.set_page(2);
    let page = view.current_page(std::slice::from_ref(&mugs), &products);

    assert_eq!(page.total_pages, 3);
    assert_eq!(page.total_items, 120);
    assert_eq!(page.item_range(), Some((51, 100)));
    assert_eq!(page.items[0].name, "MUG 50");
    assert_eq!(page.groups.len(), 1);
    assert_eq!(page.groups[0].products.len(), 50);

    view.set_page(3);
    assert_eq!(
        view.current_page(std::slice::from_ref(&mugs), &products).item_range(),
        Some((101, 120))
    );
}
