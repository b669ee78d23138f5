use std::{collections::BTreeMap, path::Path, sync::Mutex};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    error::ContextError,
    model::{Category, CategoryRecord, CategoryRef, Product, ProductRecord, User},
};

/// Which products a read should return. Reads are always ordered newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductQuery {
    /// Every product, hidden or not, as the admin surface sees them.
    All,
    /// Only the products whose hidden flag is false.
    VisibleOnly,
}

/// The structured data of the catalogue: products (with their category joined) and categories.
pub trait RecordStore {
    fn products(&self, query: ProductQuery) -> Result<Vec<Product>, ContextError>;
    /// All categories ordered by their display order.
    fn categories(&self) -> Result<Vec<Category>, ContextError>;
    fn insert_product(&self, record: &ProductRecord) -> Result<Product, ContextError>;
    fn update_product(&self, id: &str, record: &ProductRecord) -> Result<Product, ContextError>;
    /// Flips only the hidden flag, leaving every other field untouched.
    fn set_product_hidden(&self, id: &str, is_hidden: bool) -> Result<(), ContextError>;
    fn delete_product(&self, id: &str) -> Result<(), ContextError>;
    fn insert_category(&self, record: &CategoryRecord) -> Result<Category, ContextError>;
    fn update_category(&self, id: &str, record: &CategoryRecord)
        -> Result<Category, ContextError>;
    fn delete_category(&self, id: &str) -> Result<(), ContextError>;
}

/// What the object store reports back once a blob is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub public_url: String,
    pub key: String,
    pub size: u64,
}

/// Binary storage for the product images.
pub trait ObjectStore {
    fn store(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, ContextError>;
    /// Deletes the object behind a public URL previously returned by `store`.
    fn delete(&self, public_url: &str) -> Result<(), ContextError>;
}

pub trait SessionProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, ContextError>;
    fn sign_out(&self) -> Result<(), ContextError>;
    fn current_user(&self) -> Result<Option<User>, ContextError>;
}

/// Anything that can hand out the raw bytes behind an image location (a URL or a path).
pub trait AssetSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, ContextError>;
}

/// Builds the key of a newly uploaded product image: `products/<unix millis>_<random>.<extension>`.
pub fn new_object_key(extension: &str) -> String {
    let timestamp = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let random = uuid::Uuid::new_v4().simple().to_string();

    format!("products/{}_{}.{}", timestamp, &random[..7], extension)
}

/// Recovers the object key from a public URL, which is the part after the public path prefix.
pub fn object_key_from_url(public_url: &str, public_path_prefix: &str) -> Option<String> {
    public_url
        .split_once(public_path_prefix)
        .map(|(_, key)| key.to_string())
        .filter(|key| !key.is_empty())
}

/// The landing decision: signed in operators go to the admin surface, everyone else to the catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Admin,
    Catalogue,
}

pub fn landing_route(session: &dyn SessionProvider) -> Route {
    match session.current_user() {
        Ok(Some(_)) => Route::Admin,
        Ok(None) => Route::Catalogue,
        Err(error) => {
            log::warn!("Unable to check the session, showing the catalogue: {}", error);
            Route::Catalogue
        }
    }
}

/// The catalogue data as it is kept on disk for the in-memory backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Snapshot {
    pub fn from_path(snapshot_path: &Path) -> Result<Self, ContextError> {
        let snapshot_content = std::fs::read_to_string(snapshot_path).map_err(|error| {
            ContextError::with_error(
                format!("Unable to read the snapshot {:?}", snapshot_path),
                &error,
            )
        })?;
        let snapshot: Snapshot = serde_json::from_str(&snapshot_content).map_err(|error| {
            ContextError::with_error(
                format!("Unable to parse the snapshot {:?}", snapshot_path),
                &error,
            )
        })?;

        Ok(snapshot)
    }
}

const MEMORY_URL_PREFIX: &str = "memory://objects/";

#[derive(Debug, Default)]
struct MemoryState {
    categories: Vec<Category>,
    /// Newest first, the same order the hosted backend returns them in.
    products: Vec<Product>,
    objects: BTreeMap<String, Vec<u8>>,
    credentials: Vec<(String, String)>,
    user: Option<User>,
}

/// A backend holding everything in process memory. It serves snapshots on the command line and
/// stands in for the hosted services in the tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut products = snapshot.products;
        // Newest first, rows without a timestamp keep their relative order at the end
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let mut categories = snapshot.categories;
        categories.sort_by_key(|category| category.display_order);

        MemoryBackend {
            state: Mutex::new(MemoryState {
                categories,
                products,
                ..MemoryState::default()
            }),
        }
    }

    /// Registers credentials accepted by `sign_in`.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state
                .credentials
                .push((email.to_string(), password.to_string()));
        }
        self
    }

    /// The number of blobs currently held, for checking that nothing leaks.
    pub fn object_count(&self) -> usize {
        self.state
            .lock()
            .map(|state| state.objects.len())
            .unwrap_or_default()
    }

    pub fn contains_object(&self, public_url: &str) -> bool {
        self.state
            .lock()
            .map(|state| {
                object_key_from_url(public_url, MEMORY_URL_PREFIX)
                    .is_some_and(|key| state.objects.contains_key(&key))
            })
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, ContextError> {
        self.state
            .lock()
            .map_err(|_| ContextError::with_context("The in-memory backend is poisoned"))
    }
}

impl MemoryState {
    fn join_category(&self, mut product: Product) -> Product {
        product.category = self
            .categories
            .iter()
            .find(|category| category.id == product.category_id)
            .map(|category| CategoryRef {
                name: category.name.clone(),
                color: category.color_or_default().to_string(),
            });
        product
    }

    fn product_position(&self, id: &str) -> Result<usize, ContextError> {
        self.products
            .iter()
            .position(|product| product.id == id)
            .ok_or_else(|| ContextError::with_context(format!("No product with the id {id:?}")))
    }

    fn category_position(&self, id: &str) -> Result<usize, ContextError> {
        self.categories
            .iter()
            .position(|category| category.id == id)
            .ok_or_else(|| ContextError::with_context(format!("No category with the id {id:?}")))
    }
}

fn apply_record(product: &mut Product, record: &ProductRecord) {
    product.name = record.name.clone();
    product.product_code = record.product_code.clone();
    product.category_id = record.category_id.clone();
    product.price = record.price;
    product.qty_per_box = record.qty_per_box.clone();
    product.image_url = Some(record.image_url.clone());
    product.image_size = Some(record.image_size);
    product.is_hidden = record.is_hidden;
    product.updated_at = Some(OffsetDateTime::now_utc());
}

impl RecordStore for MemoryBackend {
    fn products(&self, query: ProductQuery) -> Result<Vec<Product>, ContextError> {
        let state = self.lock()?;
        Ok(state
            .products
            .iter()
            .filter(|product| query == ProductQuery::All || !product.is_hidden)
            .map(|product| state.join_category(product.clone()))
            .collect())
    }

    fn categories(&self) -> Result<Vec<Category>, ContextError> {
        Ok(self.lock()?.categories.clone())
    }

    fn insert_product(&self, record: &ProductRecord) -> Result<Product, ContextError> {
        let mut state = self.lock()?;
        let now = OffsetDateTime::now_utc();
        let mut product = Product {
            id: uuid::Uuid::new_v4().to_string(),
            name: String::new(),
            product_code: String::new(),
            category_id: String::new(),
            category: None,
            price: 0.0,
            qty_per_box: String::new(),
            image_url: None,
            image_size: None,
            is_hidden: false,
            created_at: Some(now),
            updated_at: None,
        };
        apply_record(&mut product, record);
        state.products.insert(0, product.clone());

        Ok(state.join_category(product))
    }

    fn update_product(&self, id: &str, record: &ProductRecord) -> Result<Product, ContextError> {
        let mut state = self.lock()?;
        let position = state.product_position(id)?;
        apply_record(&mut state.products[position], record);
        let product = state.products[position].clone();

        Ok(state.join_category(product))
    }

    fn set_product_hidden(&self, id: &str, is_hidden: bool) -> Result<(), ContextError> {
        let mut state = self.lock()?;
        let position = state.product_position(id)?;
        state.products[position].is_hidden = is_hidden;
        Ok(())
    }

    fn delete_product(&self, id: &str) -> Result<(), ContextError> {
        let mut state = self.lock()?;
        let position = state.product_position(id)?;
        state.products.remove(position);
        Ok(())
    }

    fn insert_category(&self, record: &CategoryRecord) -> Result<Category, ContextError> {
        let mut state = self.lock()?;
        let category = Category {
            id: uuid::Uuid::new_v4().to_string(),
            name: record.name.clone(),
            color: Some(record.color.clone()),
            display_order: record.display_order,
        };
        state.categories.push(category.clone());
        state
            .categories
            .sort_by_key(|category| category.display_order);

        Ok(category)
    }

    fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Category, ContextError> {
        let mut state = self.lock()?;
        let position = state.category_position(id)?;
        let category = &mut state.categories[position];
        category.name = record.name.clone();
        category.color = Some(record.color.clone());
        category.display_order = record.display_order;
        let category = category.clone();
        state
            .categories
            .sort_by_key(|category| category.display_order);

        Ok(category)
    }

    fn delete_category(&self, id: &str) -> Result<(), ContextError> {
        let mut state = self.lock()?;
        let position = state.category_position(id)?;
        // Mirrors the foreign key of the hosted schema
        if state
            .products
            .iter()
            .any(|product| product.category_id == id)
        {
            return Err(ContextError::with_context(format!(
                "The category {id:?} is still referenced by products"
            )));
        }
        state.categories.remove(position);
        Ok(())
    }
}

impl ObjectStore for MemoryBackend {
    fn store(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredObject, ContextError> {
        let mut state = self.lock()?;
        if state.objects.contains_key(key) {
            return Err(ContextError::with_context(format!(
                "Upload failed: the object {key:?} already exists"
            )));
        }
        state.objects.insert(key.to_string(), bytes.to_vec());

        Ok(StoredObject {
            public_url: format!("{MEMORY_URL_PREFIX}{key}"),
            key: key.to_string(),
            size: bytes.len() as u64,
        })
    }

    fn delete(&self, public_url: &str) -> Result<(), ContextError> {
        let key = object_key_from_url(public_url, MEMORY_URL_PREFIX).ok_or_else(|| {
            ContextError::with_context(format!("Invalid image URL format {public_url:?}"))
        })?;
        let mut state = self.lock()?;
        state
            .objects
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| ContextError::with_context(format!("No object with the key {key:?}")))
    }
}

impl SessionProvider for MemoryBackend {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, ContextError> {
        let mut state = self.lock()?;
        let accepted = state
            .credentials
            .iter()
            .any(|(known_email, known_password)| known_email == email && known_password == password);
        if !accepted {
            return Err(ContextError::with_context("Invalid email or password"));
        }
        let user = User {
            id: format!("user-{}", email),
            email: Some(email.to_string()),
        };
        state.user = Some(user.clone());

        Ok(user)
    }

    fn sign_out(&self) -> Result<(), ContextError> {
        self.lock()?.user = None;
        Ok(())
    }

    fn current_user(&self) -> Result<Option<User>, ContextError> {
        Ok(self.lock()?.user.clone())
    }
}

impl AssetSource for MemoryBackend {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, ContextError> {
        let key = object_key_from_url(location, MEMORY_URL_PREFIX).ok_or_else(|| {
            ContextError::with_context(format!("Unknown image location {location:?}"))
        })?;
        self.lock()?
            .objects
            .get(&key)
            .cloned()
            .ok_or_else(|| ContextError::with_context(format!("No object with the key {key:?}")))
    }
}
