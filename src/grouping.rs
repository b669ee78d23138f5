use std::collections::HashMap;

use crate::model::{Category, Product};

/// How many product cards fit on one catalogue page.
pub const PRODUCTS_PER_PAGE: usize = 6;

/// A category paired with its products, in the order the products were given.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryGroup {
    pub category: Category,
    pub products: Vec<Product>,
}

/// One catalogue page worth of products of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProductPage<'a> {
    pub category: &'a Category,
    pub products: &'a [Product],
    /// Every page of a group after its first one.
    pub continuation: bool,
}

impl CategoryGroup {
    /// Splits the products of the group into pages of at most `per_page` products, the last page
    /// holding whatever is left over.
    pub fn pages(&self, per_page: usize) -> impl Iterator<Item = ProductPage<'_>> {
        self.products
            .chunks(per_page.max(1))
            .enumerate()
            .map(|(page_index, products)| ProductPage {
                category: &self.category,
                products,
                continuation: page_index > 0,
            })
    }

    pub fn page_count(&self, per_page: usize) -> usize {
        self.products.len().div_ceil(per_page.max(1))
    }
}

/// Partitions the products by the name of their category, following the order of `categories`.
/// Categories without any product are left out and a name shared by several categories only
/// yields one group, the first one. Products whose category is unknown are not grouped.
pub fn group_by_category(categories: &[Category], products: &[Product]) -> Vec<CategoryGroup> {
    let mut groups: Vec<CategoryGroup> = Vec::new();
    let mut group_index_by_name: HashMap<&str, usize> = HashMap::new();
    for category in categories {
        if group_index_by_name.contains_key(category.name.as_str()) {
            log::debug!("Category name {:?} is used twice, grouping once", category.name);
            continue;
        }
        group_index_by_name.insert(category.name.as_str(), groups.len());
        groups.push(CategoryGroup {
            category: category.clone(),
            products: Vec::new(),
        });
    }

    for product in products {
        match product
            .category_name()
            .and_then(|name| group_index_by_name.get(name))
        {
            Some(&group_index) => groups[group_index].products.push(product.clone()),
            None => log::warn!(
                "Product {:?} has no known category and is left out of the catalogue",
                product.name
            ),
        }
    }

    groups.retain(|group| !group.products.is_empty());
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryRef;

    fn category(name: &str, display_order: i64) -> Category {
        Category {
            id: format!("id-{name}"),
            name: name.to_string(),
            color: None,
            display_order,
        }
    }

    fn product(index: usize, category_name: &str) -> Product {
        Product {
            id: format!("{index:08}-0000-4000-8000-000000000000"),
            name: format!("PRODUCT {index}"),
            product_code: format!("CODE{index}"),
            category_id: format!("id-{category_name}"),
            category: Some(CategoryRef {
                name: category_name.to_string(),
                color: "#EF4444".to_string(),
            }),
            price: 100.0 + index as f64,
            qty_per_box: "12 PCS".to_string(),
            image_url: None,
            image_size: None,
            is_hidden: false,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn groups_follow_category_order_and_drop_empty_ones() {
        let categories = [category("PLATES", 1), category("MUGS", 2), category("BOWLS", 3)];
        let products = [product(1, "MUGS"), product(2, "PLATES"), product(3, "MUGS")];
        let groups = group_by_category(&categories, &products);

        let names: Vec<_> = groups.iter().map(|group| group.category.name.as_str()).collect();
        assert_eq!(names, ["PLATES", "MUGS"]);
        let mugs: Vec<_> = groups[1].products.iter().map(|product| product.name.as_str()).collect();
        assert_eq!(mugs, ["PRODUCT 1", "PRODUCT 3"]);
    }

    #[test]
    fn duplicate_category_names_are_grouped_once() {
        let categories = [category("MUGS", 1), category("MUGS", 2)];
        let groups = group_by_category(&categories, &[product(1, "MUGS"), product(2, "MUGS")]);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].products.len(), 2);
        assert_eq!(groups[0].category.display_order, 1);
    }

    #[test]
    fn pages_of_six_with_an_underfilled_last_page() {
        let products: Vec<_> = (0..14).map(|index| product(index, "MUGS")).collect();
        let groups = group_by_category(&[category("MUGS", 1)], &products);
        let pages: Vec<_> = groups[0].pages(PRODUCTS_PER_PAGE).collect();

        assert_eq!(groups[0].page_count(PRODUCTS_PER_PAGE), 3);
        assert_eq!(
            pages.iter().map(|page| page.products.len()).collect::<Vec<_>>(),
            [6, 6, 2]
        );
        assert_eq!(
            pages.iter().map(|page| page.continuation).collect::<Vec<_>>(),
            [false, true, true]
        );
    }

    #[test]
    fn exactly_six_products_fill_one_page() {
        let products: Vec<_> = (0..6).map(|index| product(index, "MUGS")).collect();
        let groups = group_by_category(&[category("MUGS", 1)], &products);

        assert_eq!(groups[0].pages(PRODUCTS_PER_PAGE).count(), 1);
    }
}
