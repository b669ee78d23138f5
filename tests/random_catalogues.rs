use std::collections::HashSet;

use cataloguer::{
    configuration::Brand,
    grouping::{group_by_category, PRODUCTS_PER_PAGE},
    layout::{index_entries_per_page, PageGeometry},
    model::{Category, CategoryRef, Product},
    renderer::CatalogueRenderer,
    store::MemoryBackend,
};
use rand::{rngs::ThreadRng, Rng};
use time::OffsetDateTime;

const CATEGORY_NAMES: [&str; 6] = ["MUGS", "PLATES", "BOWLS", "CUPS", "GLASSES", "TRAYS"];

struct RandomCatalogue {
    categories: Vec<Category>,
    products: Vec<Product>,
}

fn random_name(rng: &mut ThreadRng) -> String {
    let length = rng.gen_range(1..=60);
    rand_utf8::rand_utf8(rng, length).to_string()
}

fn random_catalogue(rng: &mut ThreadRng) -> RandomCatalogue {
    // Names may repeat, and some products point at a category which does not exist
    let categories: Vec<Category> = (0..rng.gen_range(1..8))
        .map(|index| Category {
            id: format!("category-{index}"),
            name: CATEGORY_NAMES[rng.gen_range(0..CATEGORY_NAMES.len())].to_string(),
            color: None,
            display_order: index,
        })
        .collect();

    let products = (0..rng.gen_range(0..90))
        .map(|index| {
            let category_name = if rng.gen_bool(0.1) {
                "UNKNOWN".to_string()
            } else {
                categories[rng.gen_range(0..categories.len())].name.clone()
            };
            Product {
                id: format!("{index:08}-0000-4000-8000-000000000000"),
                name: random_name(rng),
                product_code: String::new(),
                category_id: String::new(),
                category: Some(CategoryRef {
                    name: category_name,
                    color: "#EF4444".to_string(),
                }),
                price: rng.gen_range(1.0..5000.0),
                qty_per_box: format!("{} PCS", rng.gen_range(1..200)),
                image_url: None,
                image_size: None,
                is_hidden: false,
                created_at: None,
                updated_at: None,
            }
        })
        .collect();

    RandomCatalogue {
        categories,
        products,
    }
}

#[test]
fn groups_partition_the_products_of_known_categories() {
    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let catalogue = random_catalogue(&mut rng);
        let groups = group_by_category(&catalogue.categories, &catalogue.products);

        let known_names: HashSet<&str> = catalogue
            .categories
            .iter()
            .map(|category| category.name.as_str())
            .collect();
        let grouped: Vec<&Product> = catalogue
            .products
            .iter()
            .filter(|product| {
                product
                    .category_name()
                    .is_some_and(|name| known_names.contains(name))
            })
            .collect();
        let total: usize = groups.iter().map(|group| group.products.len()).sum();
        assert_eq!(total, grouped.len());

        let mut seen_names = HashSet::new();
        let mut previous_position = None;
        for group in &groups {
            assert!(!group.products.is_empty());
            assert!(seen_names.insert(group.category.name.clone()));

            // Groups follow the order of the first category carrying each name
            let position = catalogue
                .categories
                .iter()
                .position(|category| category.name == group.category.name);
            assert!(position > previous_position);
            previous_position = position;

            // Products keep their relative order inside a group
            let expected: Vec<&Product> = grouped
                .iter()
                .copied()
                .filter(|product| product.category_name() == Some(group.category.name.as_str()))
                .collect();
            assert_eq!(group.products.iter().collect::<Vec<_>>(), expected);
        }
    }
}

#[test]
fn rendered_page_count_matches_the_groups() {
    let mut rng = rand::thread_rng();
    let backend = MemoryBackend::new();
    let renderer = CatalogueRenderer::new(&backend, Brand::default());
    let entries_per_page = index_entries_per_page(&PageGeometry::default());

    for _ in 0..5 {
        let catalogue = random_catalogue(&mut rng);
        let groups = group_by_category(&catalogue.categories, &catalogue.products);
        let index_pages = groups.len().div_ceil(entries_per_page).max(1);
        let product_pages: usize = groups
            .iter()
            .map(|group| group.page_count(PRODUCTS_PER_PAGE))
            .sum();

        let rendered = renderer
            .render(
                &catalogue.categories,
                &catalogue.products,
                OffsetDateTime::UNIX_EPOCH,
            )
            .unwrap();
        assert_eq!(rendered.page_count, 1 + index_pages + product_pages + 1);

        let document = lopdf::Document::load_mem(&rendered.bytes).unwrap();
        assert_eq!(document.get_pages().len(), rendered.page_count);
    }
}
