use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// The configuration file of the application: where the hosted backend lives, which brand text
/// goes into the catalogue and where the logo is loaded from.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueConfiguration {
    #[serde(default)]
    pub backend: Option<BackendConfiguration>,
    #[serde(default)]
    pub brand: Brand,
    #[serde(default)]
    pub logo_location: Option<String>,
}

impl CatalogueConfiguration {
    pub fn from_path(configuration_file_path: &Path) -> Result<Self, ContextError> {
        let configuration_file_contents = std::fs::read_to_string(configuration_file_path)
            .map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to read the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;
        let configuration: CatalogueConfiguration =
            serde_json::from_str(&configuration_file_contents).map_err(|error| {
                ContextError::with_error(
                    format!(
                        "Failed to parse the configuration file {:?}",
                        configuration_file_path
                    ),
                    &error,
                )
            })?;

        Ok(configuration)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfiguration {
    /// The base URL of the hosted backend, without a trailing slash.
    pub url: String,
    /// The public (anonymous) key sent with every request.
    pub api_key: String,
    /// The bucket holding the product images.
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

impl BackendConfiguration {
    /// The path segment that sits between the backend URL and the object key in a public URL.
    pub fn public_path_prefix(&self) -> String {
        format!("/storage/v1/object/public/{}/", self.bucket)
    }

    pub(crate) fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

fn default_bucket() -> String {
    "product-images".to_string()
}

/// The static text printed on the catalogue, together with the document metadata.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Brand {
    pub company_name: String,
    pub tagline: String,
    pub supplier_line: String,
    pub edition: Option<String>,
    pub phone_numbers: Vec<String>,
    pub email: String,
    pub address_lines: Vec<String>,
    pub document_title: Option<String>,
    pub document_subject: String,
    pub document_author: String,
    pub document_keywords: String,
    pub document_creator: String,
    pub file_prefix: String,
}

impl Default for Brand {
    fn default() -> Self {
        Brand {
            company_name: "R&T Marketing".to_string(),
            tagline: "PREMIUM WHOLESALE CROCKERY".to_string(),
            supplier_line: "Premium Wholesale Crockery Supplier".to_string(),
            edition: None,
            phone_numbers: vec!["9074089284".to_string(), "8590266100".to_string()],
            email: "mail.randtmarketing@gmail.com".to_string(),
            address_lines: vec![
                "Pothiladu, Kallidumbu".to_string(),
                "Edavanna".to_string(),
                "Malappuram District".to_string(),
                "Kerala, India".to_string(),
            ],
            document_title: None,
            document_subject: "Wholesale Crockery Products".to_string(),
            document_author: "R&T Marketing".to_string(),
            document_keywords: "crockery, wholesale, products, catalogue".to_string(),
            document_creator: "R&T Marketing Catalogue System".to_string(),
            file_prefix: "RT-Marketing-Catalogue".to_string(),
        }
    }
}

impl Brand {
    /// The edition line of the cover, defaulting to the year of generation.
    pub fn edition_for(&self, year: i32) -> String {
        self.edition
            .clone()
            .unwrap_or_else(|| format!("{year} EDITION"))
    }

    pub fn title_for(&self, year: i32) -> String {
        self.document_title
            .clone()
            .unwrap_or_else(|| format!("{} Product Catalogue {year}", self.company_name))
    }

    /// The phone numbers joined the way the cover prints them.
    pub fn phone_line(&self, separator: &str) -> String {
        self.phone_numbers.join(separator)
    }

    /// The address on a single line, used on the cover.
    pub fn address_line(&self) -> String {
        self.address_lines.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let configuration: CatalogueConfiguration = serde_json::from_str(
            r#"{
                "backend": { "url": "https://example.test/", "apiKey": "anon" },
                "brand": { "companyName": "Acme" }
            }"#,
        )
        .unwrap();

        let backend = configuration.backend.unwrap();
        assert_eq!(backend.bucket, "product-images");
        assert_eq!(backend.base_url(), "https://example.test");
        assert_eq!(
            backend.public_path_prefix(),
            "/storage/v1/object/public/product-images/"
        );
        assert_eq!(configuration.brand.company_name, "Acme");
        assert_eq!(configuration.brand.email, Brand::default().email);
        assert_eq!(configuration.brand.edition_for(2026), "2026 EDITION");
        assert_eq!(configuration.logo_location, None);
    }
}
