use serde::{Deserialize, Serialize};

use crate::{
    grouping::{group_by_category, CategoryGroup},
    model::{Category, Product},
};

/// How many products the public catalogue shows per screen.
pub const ITEMS_PER_PAGE: usize = 50;
/// The category filter value which lets every category through.
pub const ALL_CATEGORIES: &str = "ALL";

/// The state of the public catalogue screen: search text, category filter and current page.
///
/// Changing the search text or the category always brings the view back to the first page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogueView {
    search: String,
    category: String,
    page: usize,
}

impl Default for CatalogueView {
    fn default() -> Self {
        CatalogueView {
            search: String::new(),
            category: ALL_CATEGORIES.to_string(),
            page: 1,
        }
    }
}

/// One screen of the public catalogue.
#[derive(Debug, Clone, PartialEq)]
pub struct CataloguePage {
    /// 1-based.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
    pub items: Vec<Product>,
    /// The items of this screen only, grouped by category for display.
    pub groups: Vec<CategoryGroup>,
}

impl CataloguePage {
    /// The 1-based positions of the first and last item shown, within the filtered list.
    pub fn item_range(&self) -> Option<(usize, usize)> {
        if self.items.is_empty() {
            return None;
        }
        let first = self.page.saturating_sub(1) * ITEMS_PER_PAGE + 1;
        Some((first, first + self.items.len() - 1))
    }
}

impl CatalogueView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn set_search<S: Into<String>>(&mut self, search: S) {
        self.search = search.into();
        self.page = 1;
    }

    /// Selects a category by name, or every category with [`ALL_CATEGORIES`].
    pub fn set_category<S: Into<String>>(&mut self, category: S) {
        self.category = category.into();
        self.page = 1;
    }

    /// Moves to the given page, which is clamped to at least the first one.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn matches(&self, product: &Product) -> bool {
        let matches_search = product
            .name
            .to_lowercase()
            .contains(&self.search.to_lowercase());
        let matches_category =
            self.category == ALL_CATEGORIES || product.category_name() == Some(self.category.as_str());

        matches_search && matches_category
    }

    pub fn filter<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products
            .iter()
            .filter(|product| self.matches(product))
            .collect()
    }

    /// Filters the products and slices out the current page. A page past the end is empty.
    pub fn current_page(&self, categories: &[Category], products: &[Product]) -> CataloguePage {
        // A deserialized view may carry page 0, which is shown as the first page
        let page = self.page.max(1);
        let filtered = self.filter(products);
        let total_items = filtered.len();
        let start = (page - 1).saturating_mul(ITEMS_PER_PAGE).min(total_items);
        let end = (start + ITEMS_PER_PAGE).min(total_items);
        let items: Vec<Product> = filtered[start..end].iter().map(|&product| product.clone()).collect();
        let groups = group_by_category(categories, &items);

        CataloguePage {
            page,
            total_pages: total_items.div_ceil(ITEMS_PER_PAGE),
            total_items,
            items,
            groups,
        }
    }

    /// The options of the category filter: [`ALL_CATEGORIES`] followed by each category name.
    pub fn category_options(categories: &[Category]) -> Vec<String> {
        std::iter::once(ALL_CATEGORIES.to_string())
            .chain(categories.iter().map(|category| category.name.clone()))
            .collect()
    }
}

/// The search box and category selector of the admin product table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminFilter {
    pub search: String,
    /// A category identifier, or every category when empty.
    pub category_id: Option<String>,
}

impl AdminFilter {
    /// Matches the search text against the name, the product code and the category name.
    pub fn matches(&self, product: &Product) -> bool {
        let search = self.search.to_lowercase();
        let matches_search = product.name.to_lowercase().contains(&search)
            || product.product_code.to_lowercase().contains(&search)
            || product
                .category_name()
                .is_some_and(|name| name.to_lowercase().contains(&search));
        let matches_category = self
            .category_id
            .as_deref()
            .map_or(true, |category_id| product.category_id == category_id);

        matches_search && matches_category
    }

    pub fn apply<'a>(&self, products: &'a [Product]) -> Vec<&'a Product> {
        products
            .iter()
            .filter(|product| self.matches(product))
            .collect()
    }
}

/// The visible and hidden counters shown above the admin table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProductCounts {
    pub total: usize,
    pub visible: usize,
    pub hidden: usize,
}

pub fn product_counts(products: &[Product]) -> ProductCounts {
    let hidden = products.iter().filter(|product| product.is_hidden).count();
    ProductCounts {
        total: products.len(),
        visible: products.len() - hidden,
        hidden,
    }
}

/// How many products reference each category, in the order of `categories`.
pub fn products_per_category<'a>(
    categories: &'a [Category],
    products: &[Product],
) -> Vec<(&'a Category, usize)> {
    categories
        .iter()
        .map(|category| {
            let count = products
                .iter()
                .filter(|product| product.category_id == category.id)
                .count();
            (category, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryRef;

    fn category(name: &str) -> Category {
        Category {
            id: format!("id-{name}"),
            name: name.to_string(),
            color: None,
            display_order: 0,
        }
    }

    fn product(index: usize, name: &str, category_name: &str) -> Product {
        Product {
            id: format!("product-{index}"),
            name: name.to_string(),
            product_code: format!("RT{index:03}"),
            category_id: format!("id-{category_name}"),
            category: Some(CategoryRef {
                name: category_name.to_string(),
                color: "#EF4444".to_string(),
            }),
            price: 10.0,
            qty_per_box: "12 PCS".to_string(),
            image_url: None,
            image_size: None,
            is_hidden: index % 5 == 0,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn search_and_category_reset_the_page() {
        let mut view = CatalogueView::new();
        view.set_page(3);
        view.set_search("mug");
        assert_eq!(view.page(), 1);

        view.set_page(2);
        view.set_category("PLATES");
        assert_eq!(view.page(), 1);

        view.set_page(0);
        assert_eq!(view.page(), 1);
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let products = [
            product(1, "Ashoka Mini Mug", "MUGS"),
            product(2, "Dinner Plate", "PLATES"),
            product(3, "BIG MUG", "MUGS"),
        ];
        let mut view = CatalogueView::new();
        view.set_search("MUG");
        assert_eq!(view.filter(&products).len(), 2);

        view.set_category("PLATES");
        assert!(view.filter(&products).is_empty());

        view.set_search("");
        assert_eq!(view.filter(&products)[0].name, "Dinner Plate");
    }

    #[test]
    fn pages_past_the_end_are_empty() {
        let products: Vec<_> = (0..10).map(|index| product(index, "Mug", "MUGS")).collect();
        let mut view = CatalogueView::new();
        view.set_page(4);
        let page = view.current_page(&[category("MUGS")], &products);

        assert!(page.items.is_empty());
        assert!(page.groups.is_empty());
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.item_range(), None);
    }

    #[test]
    fn a_restored_view_on_page_zero_shows_the_first_page() {
        let view: CatalogueView = serde_json::from_value(serde_json::json!({
            "search": "",
            "category": ALL_CATEGORIES,
            "page": 0,
        }))
        .unwrap();
        let products: Vec<_> = (0..10).map(|index| product(index, "Mug", "MUGS")).collect();
        let page = view.current_page(&[category("MUGS")], &products);

        assert_eq!(page.page, 1);
        assert_eq!(page.item_range(), Some((1, 10)));
        assert!(view.current_page(&[], &[]).items.is_empty());

        let first_page = CataloguePage {
            page: 0,
            total_pages: 1,
            total_items: 1,
            items: products[..1].to_vec(),
            groups: Vec::new(),
        };
        assert_eq!(first_page.item_range(), Some((1, 1)));
    }

    #[test]
    fn admin_search_covers_code_and_category() {
        let products = [
            product(1, "Ashoka Mini Mug", "MUGS"),
            product(2, "Dinner Plate", "PLATES"),
        ];
        let by_code = AdminFilter {
            search: "rt002".into(),
            category_id: None,
        };
        assert_eq!(by_code.apply(&products)[0].name, "Dinner Plate");

        let by_category_name = AdminFilter {
            search: "mugs".into(),
            category_id: None,
        };
        assert_eq!(by_category_name.apply(&products).len(), 1);

        let by_category_id = AdminFilter {
            search: String::new(),
            category_id: Some("id-PLATES".into()),
        };
        assert_eq!(by_category_id.apply(&products)[0].name, "Dinner Plate");
    }

    #[test]
    fn counters() {
        let products: Vec<_> = (0..10).map(|index| product(index, "Mug", "MUGS")).collect();
        let categories = [category("MUGS"), category("PLATES")];

        assert_eq!(
            product_counts(&products),
            ProductCounts {
                total: 10,
                visible: 8,
                hidden: 2
            }
        );
        let per_category = products_per_category(&categories, &products);
        assert_eq!(per_category[0].1, 10);
        assert_eq!(per_category[1].1, 0);
        assert_eq!(
            CatalogueView::category_options(&categories),
            ["ALL", "MUGS", "PLATES"]
        );
    }
}
