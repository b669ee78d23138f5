use std::{path::Path, sync::Mutex};

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    configuration::BackendConfiguration,
    error::ContextError,
    model::{Category, CategoryRecord, Product, ProductRecord, User},
    store::{
        object_key_from_url, AssetSource, ObjectStore, ProductQuery, RecordStore,
        SessionProvider, StoredObject,
    },
};

/// The columns read for a product, with the category name and color joined in.
const PRODUCT_SELECTION: &str = "*,category:categories(name,color)";

#[derive(Debug, Clone, Deserialize)]
struct AuthSession {
    access_token: String,
    user: User,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct HiddenFlag {
    is_hidden: bool,
}

#[derive(Serialize)]
struct RemovedObjects {
    prefixes: Vec<String>,
}

/// A client for the hosted backend: a REST interface over the record tables, an object storage
/// bucket with public URLs and a password based session service. Every call blocks until the
/// response arrives.
pub struct HostedBackend {
    client: Client,
    configuration: BackendConfiguration,
    session: Mutex<Option<AuthSession>>,
}

impl HostedBackend {
    pub fn new(configuration: BackendConfiguration) -> Result<Self, ContextError> {
        let client = Client::builder().build().map_err(|error| {
            ContextError::with_error("Unable to create the HTTP client", &error)
        })?;

        Ok(HostedBackend {
            client,
            configuration,
            session: Mutex::new(None),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.configuration.base_url(), table)
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}{}{}",
            self.configuration.base_url(),
            self.configuration.public_path_prefix(),
            key
        )
    }

    fn access_token(&self) -> Option<String> {
        self.session
            .lock()
            .ok()
            .and_then(|session| session.as_ref().map(|session| session.access_token.clone()))
    }

    /// Adds the key of the project and the bearer of the signed in user, if any.
    fn authorize(&self, request: RequestBuilder, access_token: Option<String>) -> RequestBuilder {
        let bearer = access_token.unwrap_or_else(|| self.configuration.api_key.clone());
        request
            .header("apikey", &self.configuration.api_key)
            .bearer_auth(bearer)
    }

    fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, ContextError> {
        self.send_with_token(request, self.access_token(), context)
    }

    fn send_with_token(
        &self,
        request: RequestBuilder,
        access_token: Option<String>,
        context: &str,
    ) -> Result<Response, ContextError> {
        let response = self
            .authorize(request, access_token)
            .send()
            .map_err(|error| ContextError::with_error(context, &error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            log::error!("{} ({}): {}", context, status, body);
            return Err(ContextError::with_context(format!(
                "{}: the backend answered {}",
                context, status
            )));
        }

        Ok(response)
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ContextError> {
        self.send(request, context)?
            .json::<T>()
            .map_err(|error| ContextError::with_error(context, &error))
    }

    /// Sends a write which returns the written rows and keeps the first one.
    fn send_returning<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        context: &str,
    ) -> Result<T, ContextError> {
        let rows: Vec<T> =
            self.send_json(request.header("Prefer", "return=representation"), context)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ContextError::with_context(format!("{context}: no row was returned")))
    }
}

impl RecordStore for HostedBackend {
    fn products(&self, query: ProductQuery) -> Result<Vec<Product>, ContextError> {
        let mut parameters = vec![
            ("select", PRODUCT_SELECTION.to_string()),
            ("order", "created_at.desc".to_string()),
        ];
        if query == ProductQuery::VisibleOnly {
            parameters.push(("is_hidden", "eq.false".to_string()));
        }
        let request = self
            .client
            .get(self.table_url("products"))
            .query(&parameters);

        self.send_json(request, "Failed to load products")
    }

    fn categories(&self) -> Result<Vec<Category>, ContextError> {
        let request = self.client.get(self.table_url("categories")).query(&[
            ("select", "id,name,color,display_order"),
            ("order", "display_order"),
        ]);

        self.send_json(request, "Failed to load categories")
    }

    fn insert_product(&self, record: &ProductRecord) -> Result<Product, ContextError> {
        let request = self
            .client
            .post(self.table_url("products"))
            .query(&[("select", PRODUCT_SELECTION)])
            .json(&[record]);

        self.send_returning(request, "Failed to save product")
    }

    fn update_product(&self, id: &str, record: &ProductRecord) -> Result<Product, ContextError> {
        let request = self
            .client
            .patch(self.table_url("products"))
            .query(&[
                ("select", PRODUCT_SELECTION.to_string()),
                ("id", format!("eq.{id}")),
            ])
            .json(record);

        self.send_returning(request, "Failed to save product")
    }

    fn set_product_hidden(&self, id: &str, is_hidden: bool) -> Result<(), ContextError> {
        let request = self
            .client
            .patch(self.table_url("products"))
            .query(&[("select", "id,name,is_hidden".to_string()), ("id", format!("eq.{id}"))])
            .json(&HiddenFlag { is_hidden });
        // An update filtered out by the row level policies returns no row rather than an error
        let updated: Vec<serde_json::Value> = self.send_json(
            request.header("Prefer", "return=representation"),
            "Failed to update",
        )?;
        if updated.is_empty() {
            return Err(ContextError::with_context(
                "Failed to update: no product was changed, check the access policies",
            ));
        }

        Ok(())
    }

    fn delete_product(&self, id: &str) -> Result<(), ContextError> {
        let request = self
            .client
            .delete(self.table_url("products"))
            .query(&[("id", format!("eq.{id}"))]);
        self.send(request, "Failed to delete product")?;

        Ok(())
    }

    fn insert_category(&self, record: &CategoryRecord) -> Result<Category, ContextError> {
        let request = self
            .client
            .post(self.table_url("categories"))
            .json(&[record]);

        self.send_returning(request, "Failed to save category")
    }

    fn update_category(
        &self,
        id: &str,
        record: &CategoryRecord,
    ) -> Result<Category, ContextError> {
        let request = self
            .client
            .patch(self.table_url("categories"))
            .query(&[("id", format!("eq.{id}"))])
            .json(record);

        self.send_returning(request, "Failed to save category")
    }

    fn delete_category(&self, id: &str) -> Result<(), ContextError> {
        let request = self
            .client
            .delete(self.table_url("categories"))
            .query(&[("id", format!("eq.{id}"))]);
        self.send(request, "Failed to delete category")?;

        Ok(())
    }
}

impl ObjectStore for HostedBackend {
    fn store(
        &self,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, ContextError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.configuration.base_url(),
            self.configuration.bucket,
            key
        );
        let request = self
            .client
            .post(url)
            .header("Content-Type", content_type)
            .header("Cache-Control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes.to_vec());
        self.send(request, "Upload failed")?;
        log::info!("Stored the object {:?} ({} bytes)", key, bytes.len());

        Ok(StoredObject {
            public_url: self.public_url(key),
            key: key.to_string(),
            size: bytes.len() as u64,
        })
    }

    fn delete(&self, public_url: &str) -> Result<(), ContextError> {
        let key = object_key_from_url(public_url, &self.configuration.public_path_prefix())
            .ok_or_else(|| {
                ContextError::with_context(format!("Invalid image URL format {public_url:?}"))
            })?;
        let url = format!(
            "{}/storage/v1/object/{}",
            self.configuration.base_url(),
            self.configuration.bucket
        );
        let request = self.client.delete(url).json(&RemovedObjects {
            prefixes: vec![key.clone()],
        });
        self.send(request, "Failed to delete image")?;
        log::info!("Deleted the object {:?}", key);

        Ok(())
    }
}

impl SessionProvider for HostedBackend {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, ContextError> {
        let url = format!("{}/auth/v1/token", self.configuration.base_url());
        let request = self
            .client
            .post(url)
            .query(&[("grant_type", "password")])
            .json(&PasswordGrant { email, password });
        let session: AuthSession = self
            .send_json(request, "Invalid email or password")
            .map_err(|error| {
                log::error!("Login error: {}", error);
                ContextError::with_context("Invalid email or password")
            })?;
        let user = session.user.clone();
        let mut current = self
            .session
            .lock()
            .map_err(|_| ContextError::with_context("The session state is poisoned"))?;
        *current = Some(session);

        Ok(user)
    }

    /// Forgets the local session first, so that a failing logout call still signs out here.
    fn sign_out(&self) -> Result<(), ContextError> {
        let session = self
            .session
            .lock()
            .map_err(|_| ContextError::with_context("The session state is poisoned"))?
            .take();
        let Some(session) = session else {
            return Ok(());
        };
        let url = format!("{}/auth/v1/logout", self.configuration.base_url());
        self.send_with_token(
            self.client.post(url),
            Some(session.access_token),
            "Failed to logout",
        )?;

        Ok(())
    }

    fn current_user(&self) -> Result<Option<User>, ContextError> {
        if self.access_token().is_none() {
            return Ok(None);
        }
        let url = format!("{}/auth/v1/user", self.configuration.base_url());
        let user: User = self.send_json(self.client.get(url), "Failed to check the session")?;

        Ok(Some(user))
    }
}

/// Loads images from `http(s)` URLs, `file://` URLs or plain filesystem paths.
pub struct HttpAssetSource {
    client: Client,
}

impl HttpAssetSource {
    pub fn new() -> Result<Self, ContextError> {
        let client = Client::builder().build().map_err(|error| {
            ContextError::with_error("Unable to create the HTTP client", &error)
        })?;

        Ok(HttpAssetSource { client })
    }
}

impl AssetSource for HttpAssetSource {
    fn fetch(&self, location: &str) -> Result<Vec<u8>, ContextError> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let response = self
                .client
                .get(location)
                .send()
                .and_then(Response::error_for_status)
                .map_err(|error| {
                    ContextError::with_error(format!("Unable to download {location:?}"), &error)
                })?;
            let bytes = response.bytes().map_err(|error| {
                ContextError::with_error(format!("Unable to download {location:?}"), &error)
            })?;
            return Ok(bytes.to_vec());
        }

        let path = location.strip_prefix("file://").unwrap_or(location);
        std::fs::read(Path::new(path)).map_err(|error| {
            ContextError::with_error(format!("Unable to read the image {location:?}"), &error)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> HostedBackend {
        HostedBackend::new(BackendConfiguration {
            url: "https://project.example.test/".into(),
            api_key: "anon".into(),
            bucket: "product-images".into(),
        })
        .unwrap()
    }

    #[test]
    fn public_urls_encode_the_object_key() {
        let backend = backend();
        let url = backend.public_url("products/1_abc.jpg");

        assert_eq!(
            url,
            "https://project.example.test/storage/v1/object/public/product-images/products/1_abc.jpg"
        );
        assert_eq!(
            object_key_from_url(&url, &backend.configuration.public_path_prefix()).as_deref(),
            Some("products/1_abc.jpg")
        );
        assert_eq!(
            backend.table_url("products"),
            "https://project.example.test/rest/v1/products"
        );
    }

    #[test]
    fn no_session_means_no_user() {
        assert_eq!(backend().current_user().unwrap(), None);
        assert!(backend().sign_out().is_ok());
    }

    #[test]
    fn a_failing_logout_still_forgets_the_session() {
        let backend = HostedBackend::new(BackendConfiguration {
            url: "http://127.0.0.1:9".into(),
            api_key: "anon".into(),
            bucket: "product-images".into(),
        })
        .unwrap();
        *backend.session.lock().unwrap() = Some(AuthSession {
            access_token: "token".into(),
            user: User {
                id: "user".into(),
                email: None,
            },
        });
        assert_eq!(backend.access_token().as_deref(), Some("token"));

        assert!(backend.sign_out().is_err());
        assert_eq!(backend.access_token(), None);
        assert_eq!(backend.current_user().unwrap(), None);
    }

    #[test]
    fn local_files_are_read_from_disk() {
        let path = std::env::temp_dir().join("cataloguer-asset-source-test.bin");
        std::fs::write(&path, b"logo").unwrap();
        let source = HttpAssetSource::new().unwrap();

        assert_eq!(source.fetch(path.to_str().unwrap()).unwrap(), b"logo");
        assert!(source.fetch("/definitely/not/here.jpg").is_err());
    }
}
