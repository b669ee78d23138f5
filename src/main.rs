#![warn(clippy::unwrap_used)]

use std::path::PathBuf;

use cataloguer::{
    configuration::CatalogueConfiguration,
    dashboard::StorageUsage,
    error::ContextError,
    hosted::{HostedBackend, HttpAssetSource},
    listing::{products_per_category, CatalogueView, ALL_CATEGORIES},
    model::{Category, Product},
    renderer::CatalogueRenderer,
    store::{MemoryBackend, ProductQuery, RecordStore, Snapshot},
};
use clap::{Parser, Subcommand};
use time::OffsetDateTime;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct CliArguments {
    /// Reads the catalogue from a JSON snapshot instead of the hosted backend.
    #[arg(short = 's', long = "snapshot", value_name = "json_file", global = true)]
    snapshot_path: Option<PathBuf>,
    /// The configuration of the backend, of the brand and of the logo.
    #[arg(
        short = 'c',
        long = "configuration",
        value_name = "json_file",
        global = true
    )]
    configuration_path: Option<PathBuf>,
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Renders the catalogue of the visible products to a PDF file.
    Export {
        #[arg(short = 'o', long = "output", value_name = "directory", default_value = ".")]
        output_directory: PathBuf,
    },
    /// Prints one page of the public catalogue.
    List {
        #[arg(long = "search", default_value = "")]
        search: String,
        #[arg(long = "category", default_value = ALL_CATEGORIES)]
        category: String,
        #[arg(long = "page", default_value_t = 1)]
        page: usize,
    },
    /// Prints the storage used by the product images.
    Storage,
}

fn main() {
    if let Err(error) = fallible_main() {
        log::error!("{}", error);
        std::process::exit(1);
    }
}

fn fallible_main() -> Result<(), ContextError> {
    let arguments = CliArguments::parse();
    env_logger::builder()
        .filter_level(if arguments.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .init();
    log::debug!("{:?}", arguments);

    let configuration = match &arguments.configuration_path {
        Some(configuration_path) => CatalogueConfiguration::from_path(configuration_path)?,
        None => CatalogueConfiguration::default(),
    };
    let records = open_records(&arguments, &configuration)?;

    match arguments.command {
        Command::Export { output_directory } => {
            let assets = HttpAssetSource::new()?;
            let renderer = CatalogueRenderer::new(&assets, configuration.brand.clone())
                .with_logo(configuration.logo_location.clone());
            let rendered = renderer
                .render_from_store(records.as_ref(), OffsetDateTime::now_utc())
                .map_err(|error| {
                    ContextError::with_error("Failed to generate the catalogue", &error)
                })?;

            let output_file_path = output_directory.join(&rendered.file_name);
            std::fs::write(&output_file_path, &rendered.bytes).map_err(|error| {
                ContextError::with_error("Failed to save the catalogue", &error)
            })?;
            log::info!(
                "Saved the catalogue of {} pages to the path: {:?}",
                rendered.page_count,
                output_file_path
            );
        }
        Command::List {
            search,
            category,
            page,
        } => {
            let categories = records.categories()?;
            let products = records.products(ProductQuery::VisibleOnly)?;
            print_listing(&categories, &products, search, category, page);
        }
        Command::Storage => {
            let products = records.products(ProductQuery::All)?;
            let usage = StorageUsage::from_products(&products);
            println!("{}", usage);
            if usage.is_almost_full() {
                log::warn!("The storage is almost full");
            }
        }
    }

    Ok(())
}

/// The snapshot wins over the hosted backend when both are given.
fn open_records(
    arguments: &CliArguments,
    configuration: &CatalogueConfiguration,
) -> Result<Box<dyn RecordStore>, ContextError> {
    if let Some(snapshot_path) = &arguments.snapshot_path {
        let snapshot = Snapshot::from_path(snapshot_path)?;
        log::debug!(
            "Loaded {} categories and {} products from {:?}",
            snapshot.categories.len(),
            snapshot.products.len(),
            snapshot_path
        );
        return Ok(Box::new(MemoryBackend::from_snapshot(snapshot)));
    }

    match &configuration.backend {
        Some(backend) => Ok(Box::new(HostedBackend::new(backend.clone())?)),
        None => Err(ContextError::with_context(
            "Either a snapshot or a configuration with a backend is required",
        )),
    }
}

fn print_listing(
    categories: &[Category],
    products: &[Product],
    search: String,
    category: String,
    page: usize,
) {
    let category_options = CatalogueView::category_options(categories);
    if !category_options.contains(&category) {
        log::warn!(
            "There is no category {:?}, the options are: {}",
            category,
            category_options.join(", ")
        );
    }

    let mut view = CatalogueView::new();
    view.set_search(search);
    view.set_category(category);
    view.set_page(page);
    let catalogue_page = view.current_page(categories, products);

    println!("Categories:");
    for (category, count) in products_per_category(categories, products) {
        println!("  {} ({})", category.name, count);
    }
    println!();

    match catalogue_page.item_range() {
        Some((first, last)) => println!(
            "Showing {}-{} of {} products (page {} of {})",
            first,
            last,
            catalogue_page.total_items,
            catalogue_page.page,
            catalogue_page.total_pages
        ),
        None => println!("No products found"),
    }
    for group in &catalogue_page.groups {
        println!();
        println!("{} ({})", group.category.name, group.products.len());
        for product in &group.products {
            println!(
                "  {:<10} {:<40} Rs {:>10.2}  {}",
                product.printed_code(),
                product.name,
                product.price,
                product.qty_per_box
            );
        }
    }
}
