//! The catalogue as a sequence of pages, each a list of draw primitives in millimeters measured from
//! the top-left corner of an A4 page. Nothing here touches the PDF document or loads an image, so
//! every section can be checked on its own.

use time::Date;

use crate::{
    configuration::Brand,
    grouping::{CategoryGroup, ProductPage, PRODUCTS_PER_PAGE},
    model::Product,
    pdf::{PaintStyle, TextAlignment},
    text_metrics::{split_text_to_size, truncate_with_ellipsis, FontWeight},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BRAND_RED: Rgb = Rgb(200, 31, 45);
    pub const ACCENT_RED: Rgb = Rgb(233, 74, 74);
    pub const PAPER: Rgb = Rgb(250, 249, 246);

    /// The components scaled between 0 and 1.
    pub fn to_unit(self) -> [f32; 3] {
        [
            self.0 as f32 / 255.0,
            self.1 as f32 / 255.0,
            self.2 as f32 / 255.0,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ShapeStyle {
    pub fill: Option<Rgb>,
    pub stroke: Option<Stroke>,
}

impl ShapeStyle {
    pub fn fill(color: Rgb) -> Self {
        ShapeStyle {
            fill: Some(color),
            stroke: None,
        }
    }

    pub fn fill_and_stroke(color: Rgb, stroke: Rgb, width: f32) -> Self {
        ShapeStyle {
            fill: Some(color),
            stroke: Some(Stroke {
                color: stroke,
                width,
            }),
        }
    }

    pub fn to_paint_style(self) -> PaintStyle {
        PaintStyle {
            fill: self.fill.map(Rgb::to_unit),
            stroke: self.stroke.map(|stroke| stroke.color.to_unit()),
            line_width: self.stroke.map_or(0.0, |stroke| stroke.width),
        }
    }
}

/// Where the bytes of an image come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// The brand logo, loaded once per catalogue.
    Logo,
    /// The image of a product, by its URL. `None` when the product has no image.
    Product(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawPrimitive {
    Rectangle {
        origin: [f32; 2],
        size: [f32; 2],
        corner_radius: f32,
        style: ShapeStyle,
    },
    Line {
        from: [f32; 2],
        to: [f32; 2],
        stroke: Stroke,
    },
    Circle {
        center: [f32; 2],
        radius: f32,
        style: ShapeStyle,
    },
    Polygon {
        points: Vec<[f32; 2]>,
        style: ShapeStyle,
    },
    /// A single line of text, `position` being on its baseline.
    Text {
        text: String,
        position: [f32; 2],
        font_weight: FontWeight,
        font_size: f32,
        color: Rgb,
        alignment: TextAlignment,
    },
    /// An image stretched to a box. When it loads, `frame` is stroked around it; when it does not,
    /// the box is filled with `placeholder` if there is one and left empty otherwise.
    Image {
        source: ImageSource,
        origin: [f32; 2],
        size: [f32; 2],
        frame: Option<Stroke>,
        placeholder: Option<Rgb>,
    },
}

impl DrawPrimitive {
    fn rectangle(origin: [f32; 2], size: [f32; 2], style: ShapeStyle) -> Self {
        DrawPrimitive::Rectangle {
            origin,
            size,
            corner_radius: 0.0,
            style,
        }
    }

    fn rounded_rectangle(
        origin: [f32; 2],
        size: [f32; 2],
        corner_radius: f32,
        style: ShapeStyle,
    ) -> Self {
        DrawPrimitive::Rectangle {
            origin,
            size,
            corner_radius,
            style,
        }
    }

    fn line(from: [f32; 2], to: [f32; 2], color: Rgb, width: f32) -> Self {
        DrawPrimitive::Line {
            from,
            to,
            stroke: Stroke { color, width },
        }
    }

    /// The text content, if this primitive is a text.
    pub fn text(&self) -> Option<&str> {
        match self {
            DrawPrimitive::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// A builder for text primitives that keeps the current font and color, the way the pages are
/// written one line after the other.
struct TextPen {
    font_weight: FontWeight,
    font_size: f32,
    color: Rgb,
}

impl TextPen {
    fn new(font_weight: FontWeight, font_size: f32, color: Rgb) -> Self {
        TextPen {
            font_weight,
            font_size,
            color,
        }
    }

    fn write<S: Into<String>>(&self, text: S, x: f32, y: f32, alignment: TextAlignment) -> DrawPrimitive {
        DrawPrimitive::Text {
            text: text.into(),
            position: [x, y],
            font_weight: self.font_weight,
            font_size: self.font_size,
            color: self.color,
            alignment,
        }
    }

    fn left<S: Into<String>>(&self, text: S, x: f32, y: f32) -> DrawPrimitive {
        self.write(text, x, y, TextAlignment::Left)
    }

    fn centered<S: Into<String>>(&self, text: S, x: f32, y: f32) -> DrawPrimitive {
        self.write(text, x, y, TextAlignment::Center)
    }
}

/// The fixed measures of the catalogue pages, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
    pub header_height: f32,
    pub footer_height: f32,
    pub products_per_page: usize,
    pub card_gap: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        PageGeometry {
            page_width: 210.0,
            page_height: 297.0,
            margin: 10.0,
            header_height: 35.0,
            footer_height: 15.0,
            products_per_page: PRODUCTS_PER_PAGE,
            card_gap: 3.0,
        }
    }
}

impl PageGeometry {
    /// The height of one product card: an equal share of the space between header and footer,
    /// rounded down, less 2 millimeters.
    pub fn card_height(&self) -> f32 {
        let available_height = self.page_height
            - self.header_height
            - self.footer_height
            - 2.0 * self.margin;
        (available_height / self.products_per_page.max(1) as f32).floor() - 2.0
    }

    pub fn card_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    fn center_x(&self) -> f32 {
        self.page_width / 2.0
    }

    fn full_page(&self, color: Rgb) -> DrawPrimitive {
        DrawPrimitive::rectangle(
            [0.0, 0.0],
            [self.page_width, self.page_height],
            ShapeStyle::fill(color),
        )
    }
}

/// What a page of the catalogue shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageKind {
    Cover,
    Index,
    Products { category: String, continuation: bool },
    BackCover,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub kind: PageKind,
    pub primitives: Vec<DrawPrimitive>,
}

impl PageLayout {
    /// Every line of text on the page, in drawing order.
    pub fn texts(&self) -> Vec<&str> {
        self.primitives
            .iter()
            .filter_map(DrawPrimitive::text)
            .collect()
    }
}

pub fn cover_page(geometry: &PageGeometry, brand: &Brand, year: i32) -> PageLayout {
    let center = geometry.center_x();
    let height = geometry.page_height;
    let logo_size = 50.0;
    let mut primitives = vec![
        geometry.full_page(Rgb::BRAND_RED),
        DrawPrimitive::Image {
            source: ImageSource::Logo,
            origin: [(geometry.page_width - logo_size) / 2.0, 45.0],
            size: [logo_size, logo_size],
            frame: None,
            placeholder: None,
        },
        TextPen::new(FontWeight::Bold, 42.0, Rgb::WHITE).centered(
            brand.company_name.to_uppercase(),
            center,
            110.0,
        ),
        DrawPrimitive::line([50.0, 120.0], [geometry.page_width - 50.0, 120.0], Rgb::WHITE, 0.8),
        TextPen::new(FontWeight::Regular, 16.0, Rgb::WHITE).centered(&brand.tagline, center, 135.0),
        TextPen::new(FontWeight::Bold, 22.0, Rgb::WHITE).centered("PRODUCT CATALOGUE", center, 153.0),
    ];

    let regular = |font_size| TextPen::new(FontWeight::Regular, font_size, Rgb::WHITE);
    primitives.push(regular(14.0).centered(brand.edition_for(year), center, 167.0));
    primitives.push(regular(11.0).centered(brand.phone_line(" | "), center, height - 35.0));
    primitives.push(regular(11.0).centered(&brand.email, center, height - 25.0));
    primitives.push(regular(9.0).centered(brand.address_line(), center, height - 18.0));

    PageLayout {
        kind: PageKind::Cover,
        primitives,
    }
}

const INDEX_FIRST_ENTRY_Y: f32 = 50.0;
const INDEX_ENTRY_STEP: f32 = 18.0;
const INDEX_COUNT_OFFSET: f32 = 5.5;

/// How many index entries fit on one index page.
pub fn index_entries_per_page(geometry: &PageGeometry) -> usize {
    let last_baseline = geometry.page_height - geometry.margin - INDEX_COUNT_OFFSET;
    ((last_baseline - INDEX_FIRST_ENTRY_Y) / INDEX_ENTRY_STEP).floor() as usize + 1
}

/// The index: one numbered entry per group with its product count. When the entries do not fit
/// on one page they continue on the following ones, the numbering carrying on.
pub fn index_pages(geometry: &PageGeometry, groups: &[CategoryGroup]) -> Vec<PageLayout> {
    let entries_per_page = index_entries_per_page(geometry);
    let mut pages = Vec::new();
    let mut entry_number = 1;

    let chunks: Vec<&[CategoryGroup]> = if groups.is_empty() {
        vec![groups]
    } else {
        groups.chunks(entries_per_page).collect()
    };
    for (page_index, chunk) in chunks.into_iter().enumerate() {
        let title = if page_index == 0 {
            "CATALOGUE INDEX".to_string()
        } else {
            "CATALOGUE INDEX (CONT.)".to_string()
        };
        let mut primitives = vec![
            geometry.full_page(Rgb::PAPER),
            TextPen::new(FontWeight::Bold, 26.0, Rgb::ACCENT_RED).left(title, geometry.margin, 28.0),
            DrawPrimitive::line(
                [geometry.margin, 33.0],
                [geometry.page_width - geometry.margin, 33.0],
                Rgb::ACCENT_RED,
                1.2,
            ),
        ];

        let name_pen = TextPen::new(FontWeight::Bold, 13.0, Rgb(50, 50, 50));
        let count_pen = TextPen::new(FontWeight::Regular, 10.0, Rgb(130, 130, 130));
        let mut y = INDEX_FIRST_ENTRY_Y;
        for group in chunk {
            let x = geometry.margin + 5.0;
            primitives.push(name_pen.left(format!("{}. {}", entry_number, group.category.name), x, y));
            primitives.push(count_pen.left(
                format!("{} items", group.products.len()),
                x,
                y + INDEX_COUNT_OFFSET,
            ));
            entry_number += 1;
            y += INDEX_ENTRY_STEP;
        }

        pages.push(PageLayout {
            kind: PageKind::Index,
            primitives,
        });
    }

    pages
}

/// One page of product cards with the category header and the footer. `page_number` is printed in
/// the footer.
pub fn product_page(
    geometry: &PageGeometry,
    brand: &Brand,
    page: &ProductPage<'_>,
    page_number: usize,
) -> PageLayout {
    let header_logo_size = 20.0;
    let header_text = if page.continuation {
        format!("{} (CONT.)", page.category.name)
    } else {
        page.category.name.clone()
    };
    let mut primitives = vec![
        geometry.full_page(Rgb::PAPER),
        DrawPrimitive::rectangle(
            [0.0, 0.0],
            [geometry.page_width, geometry.header_height],
            ShapeStyle::fill(Rgb::BRAND_RED),
        ),
        DrawPrimitive::Image {
            source: ImageSource::Logo,
            origin: [
                geometry.margin,
                (geometry.header_height - header_logo_size) / 2.0,
            ],
            size: [header_logo_size, header_logo_size],
            frame: None,
            placeholder: None,
        },
        TextPen::new(FontWeight::Bold, 20.0, Rgb::WHITE).centered(
            header_text,
            geometry.center_x(),
            geometry.header_height / 2.0 + 3.0,
        ),
    ];

    let mut y = geometry.header_height + geometry.margin;
    for product in page.products {
        primitives.extend(product_card(geometry, product, y));
        y += geometry.card_height() + geometry.card_gap;
    }

    let footer_y = geometry.page_height - geometry.footer_height + 3.0;
    let footer_pen = TextPen::new(FontWeight::Regular, 7.0, Rgb(140, 140, 140));
    primitives.push(footer_pen.left(
        format!("{} | {}", brand.company_name, brand.phone_line(", ")),
        geometry.margin,
        footer_y,
    ));
    primitives.push(footer_pen.left(&brand.email, geometry.margin, footer_y + 4.0));
    primitives.push(
        TextPen::new(FontWeight::Bold, 7.0, Rgb(140, 140, 140)).write(
            format!("Page {page_number}"),
            geometry.page_width - geometry.margin,
            footer_y,
            TextAlignment::Right,
        ),
    );

    PageLayout {
        kind: PageKind::Products {
            category: page.category.name.clone(),
            continuation: page.continuation,
        },
        primitives,
    }
}

const NAME_WRAP_WIDTH: f32 = 90.0;
const QUANTITY_MAX_CHARACTERS: usize = 20;
const PRICE_BOX_WIDTH: f32 = 50.0;

/// One product card whose top edge is at `y`: the image on the left, the name, code and quantity
/// in the middle, and the price box on the right.
pub fn product_card(geometry: &PageGeometry, product: &Product, y: f32) -> Vec<DrawPrimitive> {
    let card_height = geometry.card_height();
    let card_width = geometry.card_width();
    let image_size = card_height - 10.0;
    let image_x = geometry.margin + 5.0;
    let image_y = y + 5.0;

    let mut primitives = vec![
        DrawPrimitive::rounded_rectangle(
            [geometry.margin, y],
            [card_width, card_height],
            1.5,
            ShapeStyle::fill_and_stroke(Rgb::WHITE, Rgb(220, 220, 220), 0.4),
        ),
        DrawPrimitive::Image {
            source: ImageSource::Product(product.image_url.clone().filter(|url| !url.is_empty())),
            origin: [image_x, image_y],
            size: [image_size, image_size],
            frame: Some(Stroke {
                color: Rgb(230, 230, 230),
                width: 0.3,
            }),
            placeholder: Some(Rgb(245, 245, 245)),
        },
    ];

    let details_x = image_x + image_size + 8.0;
    let details_y = y + 8.0;
    let name_lines = split_text_to_size(&product.name, FontWeight::Bold, 11.0, NAME_WRAP_WIDTH);
    let name_color = Rgb(30, 30, 30);
    if let Some(first_line) = name_lines.first() {
        primitives.push(TextPen::new(FontWeight::Bold, 11.0, name_color).left(
            first_line.as_str(),
            details_x,
            details_y,
        ));
    }
    if let Some(second_line) = name_lines.get(1) {
        primitives.push(TextPen::new(FontWeight::Bold, 10.0, name_color).left(
            second_line.as_str(),
            details_x,
            details_y + 5.0,
        ));
    }

    let label_pen = TextPen::new(FontWeight::Regular, 7.5, Rgb(100, 100, 100));
    let value_pen = TextPen::new(FontWeight::Bold, 9.0, Rgb(50, 50, 50));
    primitives.push(label_pen.left("Product Code:", details_x, details_y + 12.0));
    primitives.push(value_pen.left(product.printed_code(), details_x + 22.0, details_y + 12.0));
    primitives.push(label_pen.left("Quantity:", details_x, details_y + 19.0));
    primitives.push(value_pen.left(
        truncate_with_ellipsis(&product.qty_per_box, QUANTITY_MAX_CHARACTERS),
        details_x + 18.0,
        details_y + 19.0,
    ));

    let price_box_x = geometry.margin + card_width - PRICE_BOX_WIDTH - 5.0;
    let price_box_y = y + 5.0;
    let price_center = price_box_x + PRICE_BOX_WIDTH / 2.0;
    primitives.push(DrawPrimitive::rounded_rectangle(
        [price_box_x, price_box_y],
        [PRICE_BOX_WIDTH, card_height - 10.0],
        1.0,
        ShapeStyle::fill_and_stroke(Rgb(250, 250, 250), Rgb(240, 240, 240), 0.3),
    ));
    primitives.push(
        TextPen::new(FontWeight::Regular, 6.5, Rgb(110, 110, 110)).centered(
            "Wholesale Price",
            price_center,
            price_box_y + 5.0,
        ),
    );
    primitives.push(TextPen::new(FontWeight::Bold, 16.0, Rgb::ACCENT_RED).centered(
        format_price(product.price),
        price_center,
        price_box_y + 16.0,
    ));
    primitives.push(TextPen::new(FontWeight::Regular, 6.5, Rgb(120, 120, 120)).centered(
        "per box",
        price_center,
        price_box_y + 22.0,
    ));

    primitives
}

/// The price as printed on the cards, e.g. `Rs 620.00`.
pub fn format_price(price: f64) -> String {
    format!("Rs {price:.2}")
}

/// The date in its long form, e.g. `5 March 2026`.
pub fn long_date(date: Date) -> String {
    format!("{} {} {}", date.day(), date.month(), date.year())
}

pub fn back_cover(geometry: &PageGeometry, brand: &Brand, generated_on: Date) -> PageLayout {
    let width = geometry.page_width;
    let height = geometry.page_height;
    let center = geometry.center_x();
    let mut primitives = vec![
        geometry.full_page(Rgb::BRAND_RED),
        TextPen::new(FontWeight::Bold, 42.0, Rgb::WHITE).centered("CONTACT US", center, 45.0),
        DrawPrimitive::line([40.0, 55.0], [width - 40.0, 55.0], Rgb::WHITE, 2.0),
        TextPen::new(FontWeight::Bold, 28.0, Rgb::WHITE).centered(
            brand.company_name.to_uppercase(),
            center,
            75.0,
        ),
        TextPen::new(FontWeight::Regular, 13.0, Rgb::WHITE).centered(&brand.supplier_line, center, 87.0),
    ];

    let box_y = 105.0;
    let box_height = 120.0;
    let box_margin = 25.0;
    primitives.push(DrawPrimitive::rounded_rectangle(
        [box_margin, box_y],
        [width - 2.0 * box_margin, box_height],
        5.0,
        ShapeStyle::fill(Rgb::WHITE),
    ));

    let heading_pen = TextPen::new(FontWeight::Bold, 11.0, Rgb::BRAND_RED);
    let contact_color = Rgb(40, 40, 40);

    let left_x = box_margin + 18.0;
    let mut y = box_y + 25.0;
    primitives.extend(phone_glyph(left_x, y));
    primitives.push(heading_pen.left("PHONE", left_x + 10.0, y - 1.0));
    let phone_pen = TextPen::new(FontWeight::Regular, 13.0, contact_color);
    for (index, phone_number) in brand.phone_numbers.iter().enumerate() {
        primitives.push(phone_pen.left(
            phone_number.as_str(),
            left_x + 3.0,
            y + 12.0 * (index + 1) as f32,
        ));
    }

    y += 48.0;
    primitives.extend(envelope_glyph(left_x, y));
    primitives.push(heading_pen.left("EMAIL", left_x + 10.0, y - 1.0));
    primitives.push(TextPen::new(FontWeight::Regular, 11.0, contact_color).left(
        &brand.email,
        left_x + 3.0,
        y + 12.0,
    ));

    let right_x = center + 15.0;
    let address_y = box_y + 25.0;
    primitives.extend(pin_glyph(right_x, address_y));
    primitives.push(heading_pen.left("ADDRESS", right_x + 10.0, address_y - 1.0));
    let address_pen = TextPen::new(FontWeight::Regular, 11.0, contact_color);
    for (index, address_line) in brand.address_lines.iter().enumerate() {
        primitives.push(address_pen.left(
            address_line.as_str(),
            right_x + 3.0,
            address_y + 12.0 + 11.0 * index as f32,
        ));
    }

    let rule_y = box_y + box_height + 15.0;
    primitives.push(DrawPrimitive::line(
        [box_margin + 15.0, rule_y],
        [width - box_margin - 15.0, rule_y],
        Rgb::BRAND_RED,
        1.5,
    ));

    primitives.push(TextPen::new(FontWeight::Regular, 11.0, Rgb::WHITE).centered(
        format!("Catalogue generated on {}", long_date(generated_on)),
        center,
        height - 24.0,
    ));
    primitives.push(TextPen::new(FontWeight::Regular, 9.0, Rgb::WHITE).centered(
        format!(
            "© {} {}. All rights reserved.",
            generated_on.year(),
            brand.company_name
        ),
        center,
        height - 14.0,
    ));

    PageLayout {
        kind: PageKind::BackCover,
        primitives,
    }
}

/// A handset: a red rounded square crossed by a white diagonal.
fn phone_glyph(x: f32, y: f32) -> Vec<DrawPrimitive> {
    vec![
        DrawPrimitive::rounded_rectangle(
            [x - 8.0, y - 8.0],
            [12.0, 12.0],
            2.0,
            ShapeStyle::fill(Rgb::BRAND_RED),
        ),
        DrawPrimitive::line([x - 4.0, y - 4.0], [x - 1.0, y - 1.0], Rgb::WHITE, 1.5),
        DrawPrimitive::line([x - 1.0, y - 1.0], [x + 1.0, y + 1.0], Rgb::WHITE, 1.5),
        DrawPrimitive::line([x + 1.0, y + 1.0], [x + 4.0, y + 4.0], Rgb::WHITE, 1.5),
    ]
}

/// An envelope: a red rounded rectangle with the white flap.
fn envelope_glyph(x: f32, y: f32) -> Vec<DrawPrimitive> {
    vec![
        DrawPrimitive::rounded_rectangle(
            [x - 8.0, y - 8.0],
            [12.0, 9.0],
            1.0,
            ShapeStyle::fill(Rgb::BRAND_RED),
        ),
        DrawPrimitive::line([x - 7.0, y - 7.0], [x - 2.0, y - 3.0], Rgb::WHITE, 1.0),
        DrawPrimitive::line([x - 2.0, y - 3.0], [x + 3.0, y - 7.0], Rgb::WHITE, 1.0),
    ]
}

/// A map pin: a red disc over a downward triangle, with a white hole.
fn pin_glyph(x: f32, y: f32) -> Vec<DrawPrimitive> {
    vec![
        DrawPrimitive::Circle {
            center: [x - 2.0, y - 3.0],
            radius: 4.0,
            style: ShapeStyle::fill(Rgb::BRAND_RED),
        },
        DrawPrimitive::Polygon {
            points: vec![[x - 2.0, y + 3.0], [x - 5.0, y - 1.0], [x + 1.0, y - 1.0]],
            style: ShapeStyle::fill(Rgb::BRAND_RED),
        },
        DrawPrimitive::Circle {
            center: [x - 2.0, y - 3.0],
            radius: 2.0,
            style: ShapeStyle::fill(Rgb::WHITE),
        },
    ]
}

/// Lays out the whole catalogue: cover, index, the product pages of every group and the back cover.
/// The footer numbers count the pages from the cover, which is page 0.
pub fn catalogue_pages(
    geometry: &PageGeometry,
    brand: &Brand,
    groups: &[CategoryGroup],
    generated_on: Date,
) -> Vec<PageLayout> {
    let mut pages = vec![cover_page(geometry, brand, generated_on.year())];
    pages.extend(index_pages(geometry, groups));

    for group in groups {
        for page in group.pages(geometry.products_per_page) {
            let page_number = pages.len();
            pages.push(product_page(geometry, brand, &page, page_number));
        }
    }

    pages.push(back_cover(geometry, brand, generated_on));
    pages
}
