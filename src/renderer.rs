use std::collections::HashMap;

use time::OffsetDateTime;

use crate::{
    configuration::Brand,
    error::ContextError,
    grouping::group_by_category,
    layout::{catalogue_pages, DrawPrimitive, ImageSource, PageGeometry, PageLayout},
    model::{Category, Product},
    pdf::{DocumentMetadata, ImageXObject, PaintStyle, PdfDocument, XObjectReference},
    preprocess::{decode_image, encode_jpeg, fit_within},
    store::{AssetSource, ProductQuery, RecordStore},
};

/// Images are downscaled to this many pixels on their longest side before being embedded.
const EMBEDDED_IMAGE_MAX_SIDE: u32 = 600;
const EMBEDDED_IMAGE_QUALITY: u8 = 85;

/// The finished catalogue, ready to be written or downloaded.
#[derive(Debug, Clone)]
pub struct RenderedCatalogue {
    /// `<prefix>-YYYY-MM-DD.pdf`
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

/// Turns the visible products into the printable catalogue.
///
/// Images are fetched and decoded one after the other while the pages are drawn. An image which
/// cannot be fetched or decoded never stops the rendering: a product image is replaced by a flat
/// placeholder and a missing logo is simply left out.
pub struct CatalogueRenderer<'a> {
    assets: &'a dyn AssetSource,
    brand: Brand,
    logo_location: Option<String>,
    geometry: PageGeometry,
}

impl<'a> CatalogueRenderer<'a> {
    pub fn new(assets: &'a dyn AssetSource, brand: Brand) -> Self {
        CatalogueRenderer {
            assets,
            brand,
            logo_location: None,
            geometry: PageGeometry::default(),
        }
    }

    pub fn with_logo(mut self, logo_location: Option<String>) -> Self {
        self.logo_location = logo_location;
        self
    }

    pub fn with_geometry(mut self, geometry: PageGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn file_name(&self, generated_at: OffsetDateTime) -> String {
        let date = generated_at.date();
        format!(
            "{}-{:04}-{:02}-{:02}.pdf",
            self.brand.file_prefix,
            date.year(),
            u8::from(date.month()),
            date.day()
        )
    }

    /// Reads the visible products and the categories from the store and renders them.
    pub fn render_from_store(
        &self,
        store: &dyn RecordStore,
        generated_at: OffsetDateTime,
    ) -> Result<RenderedCatalogue, ContextError> {
        let categories = store.categories()?;
        let products = store.products(ProductQuery::VisibleOnly)?;

        self.render(&categories, &products, generated_at)
    }

    pub fn render(
        &self,
        categories: &[Category],
        products: &[Product],
        generated_at: OffsetDateTime,
    ) -> Result<RenderedCatalogue, ContextError> {
        let visible_products: Vec<Product> = products
            .iter()
            .filter(|product| !product.is_hidden)
            .cloned()
            .collect();
        let groups = group_by_category(categories, &visible_products);
        let pages = catalogue_pages(&self.geometry, &self.brand, &groups, generated_at.date());
        log::info!(
            "Rendering {} products in {} categories on {} pages",
            visible_products.len(),
            groups.len(),
            pages.len()
        );

        let identifier = document_identifier(&visible_products);
        let instance_id = uuid::Uuid::new_v5(
            &uuid::Uuid::NAMESPACE_OID,
            format!("{identifier}@{}", generated_at.unix_timestamp()).as_bytes(),
        )
        .simple()
        .to_string();

        let mut document = PdfDocument::new(identifier);
        let mut images = ImageCache::default();
        if let Some(logo_location) = &self.logo_location {
            images.logo = match load_image(self.assets, logo_location) {
                Ok(image) => Some(document.add_image(image)),
                Err(error) => {
                    log::warn!("Logo error, rendering without it: {}", error);
                    None
                }
            };
        }

        for page in &pages {
            self.draw_page(&mut document, &mut images, page)?;
        }

        let year = generated_at.year();
        let metadata = DocumentMetadata {
            title: self.brand.title_for(year),
            subject: self.brand.document_subject.clone(),
            author: self.brand.document_author.clone(),
            keywords: self.brand.document_keywords.clone(),
            creator: self.brand.document_creator.clone(),
            created_at: generated_at,
        };
        let page_count = document.page_count();
        document.write_all(instance_id, &metadata)?;
        document.optimize();
        let bytes = document.save_to_bytes()?;

        Ok(RenderedCatalogue {
            file_name: self.file_name(generated_at),
            bytes,
            page_count,
        })
    }

    fn draw_page(
        &self,
        document: &mut PdfDocument,
        images: &mut ImageCache,
        page: &PageLayout,
    ) -> Result<(), ContextError> {
        let page_index = document.add_page(self.geometry.page_width, self.geometry.page_height);

        for primitive in &page.primitives {
            match primitive {
                DrawPrimitive::Rectangle {
                    origin,
                    size,
                    corner_radius,
                    style,
                } => document.draw_rectangle(
                    page_index,
                    *origin,
                    *size,
                    *corner_radius,
                    style.to_paint_style(),
                )?,
                DrawPrimitive::Line { from, to, stroke } => document.draw_line(
                    page_index,
                    *from,
                    *to,
                    stroke.color.to_unit(),
                    stroke.width,
                )?,
                DrawPrimitive::Circle {
                    center,
                    radius,
                    style,
                } => document.draw_circle(page_index, *center, *radius, style.to_paint_style())?,
                DrawPrimitive::Polygon { points, style } => {
                    document.draw_polygon(page_index, points, style.to_paint_style())?
                }
                DrawPrimitive::Text {
                    text,
                    position,
                    font_weight,
                    font_size,
                    color,
                    alignment,
                } => document.write_text(
                    page_index,
                    text,
                    *font_weight,
                    *font_size,
                    color.to_unit(),
                    *position,
                    *alignment,
                )?,
                DrawPrimitive::Image {
                    source,
                    origin,
                    size,
                    frame,
                    placeholder,
                } => match images.resolve(self.assets, document, source) {
                    Some(reference) => {
                        document.place_image(page_index, &reference, *origin, *size)?;
                        if let Some(frame) = frame {
                            let style = PaintStyle {
                                fill: None,
                                stroke: Some(frame.color.to_unit()),
                                line_width: frame.width,
                            };
                            document.draw_rectangle(page_index, *origin, *size, 0.0, style)?;
                        }
                    }
                    None => {
                        if let Some(placeholder) = placeholder {
                            let style = PaintStyle::filled(placeholder.to_unit());
                            document.draw_rectangle(page_index, *origin, *size, 0.0, style)?;
                        }
                    }
                },
            }
        }

        Ok(())
    }
}

/// The images embedded so far, so that each location is fetched and embedded at most once.
#[derive(Default)]
struct ImageCache {
    logo: Option<XObjectReference>,
    products: HashMap<String, Option<XObjectReference>>,
}

impl ImageCache {
    fn resolve(
        &mut self,
        assets: &dyn AssetSource,
        document: &mut PdfDocument,
        source: &ImageSource,
    ) -> Option<XObjectReference> {
        match source {
            ImageSource::Logo => self.logo.clone(),
            ImageSource::Product(None) => None,
            ImageSource::Product(Some(location)) => self
                .products
                .entry(location.clone())
                .or_insert_with(|| match load_image(assets, location) {
                    Ok(image) => Some(document.add_image(image)),
                    Err(error) => {
                        log::warn!("Image {:?} replaced by a placeholder: {}", location, error);
                        None
                    }
                })
                .clone(),
        }
    }
}

/// Fetches, decodes and downsizes an image, then re-encodes it as a JPEG to embed.
fn load_image(assets: &dyn AssetSource, location: &str) -> Result<ImageXObject, ContextError> {
    let bytes = assets.fetch(location)?;
    let image = fit_within(decode_image(&bytes)?, EMBEDDED_IMAGE_MAX_SIDE);
    let encoded = encode_jpeg(&image, EMBEDDED_IMAGE_QUALITY)?;
    log::debug!(
        "Loaded the image {:?} ({}x{})",
        location,
        encoded.width,
        encoded.height
    );

    Ok(ImageXObject {
        width: encoded.width,
        height: encoded.height,
        bits_per_component: 8,
        interpolate: true,
        image_data: encoded.bytes,
    })
}

/// A name-based UUID over the rendered products, so the same products always give the same
/// document identifier.
fn document_identifier(products: &[Product]) -> String {
    let product_ids = products
        .iter()
        .map(|product| product.id.as_str())
        .collect::<Vec<_>>()
        .join(",");

    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, product_ids.as_bytes())
        .simple()
        .to_string()
}
