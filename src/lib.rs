//! Cataloguer keeps the product catalogue of a wholesale business and prints it.
//!
//! Products and categories live in a hosted record store, their images in a hosted object store.
//! The crate offers the operations of the administration surface on top of them (creating,
//! editing, hiding and deleting products and categories, with the image uploads this involves),
//! the filtering and pagination of the public listing, and most importantly the rendering of the
//! whole catalogue as a branded A4 PDF document: a cover, an index of the categories, the product
//! pages of every category and a back cover with the contact details.
//!
//! Every external service is reached through the traits of the `store` module, so that the same
//! operations run against the hosted services or against the in-memory backend used by the tests
//! and by the command line when it works from a JSON snapshot.

/// This module contains the `ContextError` type which is the error type used throughout this library.
///
/// Every fallible operation returns a `ContextError` which explains what was being done when the
/// failure happened and, if the failure was propagated from a dependency, the message of the
/// underlying error.
pub mod error;

/// The records of the catalogue: products, categories, their write payloads and the signed in user.
pub mod model;

/// The configuration file: where the hosted services are and how the business presents itself.
pub mod configuration;

/// Field-level validation of the product and category forms, and of the uploaded image files.
pub mod validation;

/// Decoding, downsizing and re-encoding of the images before they are uploaded or embedded.
pub mod preprocess;

/// The seams towards the external services.
///
/// # Introduction
///
/// The record store (`RecordStore`), the object store (`ObjectStore`), the session provider
/// (`SessionProvider`) and the fetching of image bytes (`AssetSource`) are all traits. The module
/// also offers `MemoryBackend`, an in-memory implementation of all four which enforces the same
/// rules as the hosted services, such as refusing to delete a category still referenced by products.
pub mod store;

/// The implementation of the `store` traits over the REST interface of the hosted services.
pub mod hosted;

/// Widths of the standard Helvetica fonts, text wrapping and the encoding of text for the PDF.
pub mod text_metrics;

/// Grouping of the products by category, and the splitting of each group into pages.
pub mod grouping;

/// The public catalogue view and the admin product table: searching, filtering, pagination and counters.
pub mod listing;

/// The admin surface: the mutation handlers and the state they keep in sync with the record store.
pub mod dashboard;

/// The `PdfDocument` interface for working with PDF documents.
///
/// # Introduction
///
/// A `PdfDocument` is created with a document identifier and is filled page by page with vector
/// shapes, single lines of text in the two standard Helvetica fonts and JPEG images, all of them
/// positioned in millimeters from the top-left corner of the page. Images are registered once with
/// `add_image` and may then be placed on any page. Once every page has been drawn, `write_all`
/// writes the metadata, the fonts and the pages to the underlying `lopdf` document, which can then
/// be saved to bytes.
///
/// Nothing in the produced document is random: the identifiers and the timestamps are all given
/// by the caller, so the same inputs always give the same bytes.
pub mod pdf;

/// The page layouts of the catalogue, expressed as lists of drawing primitives.
///
/// Laying out the pages is kept apart from drawing them, so that the content of every page can
/// be checked without parsing a PDF document.
pub mod layout;

/// Renders the catalogue: lays out the pages, loads the images and draws everything on a `PdfDocument`.
pub mod renderer;
