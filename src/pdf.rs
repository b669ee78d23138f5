use lopdf::{
    content::{Content, Operation},
    Object, StringFormat,
};
use nalgebra_glm as glm;
use std::{collections::BTreeMap, io::BufWriter, mem};
use time::OffsetDateTime;

use crate::{
    error::ContextError,
    text_metrics::{encode_win_ansi, text_width, FontWeight},
};

/// Converts millimeters to points. This function is used in order to present the data
/// in the format required by the PDF specification, while the layout works in millimeters
/// which are easier to reason about.
pub fn millimeters_to_points(millimeters: f32) -> f32 {
    millimeters * 2.834646
}

/// Control point distance of the cubic Bézier curves approximating a quarter circle.
const BEZIER_CIRCLE_FACTOR: f32 = 0.552_284_8;

/// How a closed shape is painted. Colors are RGB components between 0 and 1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PaintStyle {
    pub fill: Option<[f32; 3]>,
    pub stroke: Option<[f32; 3]>,
    /// The stroke width in millimeters.
    pub line_width: f32,
}

impl PaintStyle {
    pub fn filled(color: [f32; 3]) -> Self {
        PaintStyle {
            fill: Some(color),
            ..PaintStyle::default()
        }
    }

    /// The operations selecting the colors and the line width, followed by the painting operator.
    fn operations(&self) -> Option<(Vec<Operation>, &'static str)> {
        let mut operations = Vec::new();
        if let Some(fill) = self.fill {
            operations.push(color_operation("rg", fill));
        }
        if let Some(stroke) = self.stroke {
            operations.push(color_operation("RG", stroke));
            operations.push(Operation::new(
                "w",
                vec![millimeters_to_points(self.line_width).into()],
            ));
        }
        let painting_operator = match (self.fill.is_some(), self.stroke.is_some()) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => return None,
        };

        Some((operations, painting_operator))
    }
}

/// The horizontal anchor of a line of text relative to its position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextAlignment {
    #[default]
    Left,
    Center,
    Right,
}

fn color_operation(operator: &str, [r, g, b]: [f32; 3]) -> Operation {
    Operation::new(operator, vec![Object::Real(r), Object::Real(g), Object::Real(b)])
}

/// The low-level image representation for a PDF document: a baseline JPEG embedded as is.
#[derive(Debug, Clone)]
pub struct ImageXObject {
    /// Width of the image in pixels (original width, not scaled width).
    pub width: u32,
    /// Height of the image in pixels (original height, not scaled height).
    pub height: u32,
    /// Bits per color component, always 8 for an RGB JPEG.
    pub bits_per_component: u16,
    /// Should the image be interpolated when scaled?
    pub interpolate: bool,
    /// The JPEG encoded data, decoded by the viewer through the `DCTDecode` filter.
    pub image_data: Vec<u8>,
}

/// `XObject`s are parts of the PDF specification. They allow for complex behavior to be
/// inserted into the PDF document: this comprises forms, postscript and even images.
/// Only images are supported here.
#[derive(Debug, Clone)]
pub enum XObject {
    /// The `XObject` interface for an image. It can be converted into a `lopdf::Object`.
    Image(ImageXObject),
}

impl From<XObject> for lopdf::Object {
    fn from(value: XObject) -> Self {
        match value {
            XObject::Image(image) => {
                let dictionary = lopdf::Dictionary::from_iter(vec![
                    ("Type", Object::Name("XObject".into())),
                    ("Subtype", Object::Name("Image".into())),
                    ("Width", Object::Integer(image.width as i64)),
                    ("Height", Object::Integer(image.height as i64)),
                    ("ColorSpace", Object::Name("DeviceRGB".into())),
                    (
                        "BitsPerComponent",
                        Object::Integer(image.bits_per_component as i64),
                    ),
                    ("Interpolate", Object::Boolean(image.interpolate)),
                    ("Filter", Object::Name("DCTDecode".into())),
                ]);
                // The data is already compressed by the JPEG encoding
                Object::Stream(
                    lopdf::Stream::new(dictionary, image.image_data).with_compression(false),
                )
            }
        }
    }
}

/// Named reference to an `XObject`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct XObjectReference(String);

impl XObjectReference {
    /// Creates a new reference for an `XObject` from a number.
    pub fn new(index: usize) -> Self {
        Self(format!("X{index}"))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

/// The association between the `XObject`s names and the actual `XObject`s themselves. It is shared
/// by all the pages, so an image used on several pages is embedded only once.
#[derive(Default, Debug, Clone)]
pub struct XObjectMap(BTreeMap<String, XObject>);

impl XObjectMap {
    /// Inserts the `XObject`s into the document, simultaneously constructing a PDF dictionary of them.
    pub fn into_with_document(self, document: &mut lopdf::Document) -> lopdf::Dictionary {
        self.0
            .into_iter()
            .map(|(name, object)| {
                let object_reference = document.add_object(Object::from(object));
                (name, Object::Reference(object_reference))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The information dictionary of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub subject: String,
    pub author: String,
    pub keywords: String,
    pub creator: String,
    pub created_at: OffsetDateTime,
}

/// The representation of a PDF page: its size in points and the content operations drawn on it.
#[derive(Debug, Clone)]
pub struct PdfPage {
    /// Page width in points.
    pub width: f32,
    /// Page height in points.
    pub height: f32,
    operations: Vec<Operation>,
}

impl PdfPage {
    fn into_stream(self) -> Result<lopdf::Stream, ContextError> {
        let content = Content {
            operations: self.operations,
        };
        let encoded_content = content.encode().map_err(|error| {
            ContextError::with_error("Failed to encode the PDF page content", &error)
        })?;

        Ok(lopdf::Stream::new(lopdf::Dictionary::new(), encoded_content))
    }
}

/// This struct represents the actual PDF document on a high-level. It is an interface to the actual underlying
/// `lopdf::Document` with the addition of the PDF pages, the document ID and the images used in the document.
///
/// Every drawing function takes its coordinates in millimeters from the top-left corner of the page, the
/// conversion to the bottom-left origin and to points of the PDF specification happens here. Text is set
/// in the standard Helvetica fonts, which need not be embedded.
pub struct PdfDocument {
    /// The underlying PDF document: this is a low-level interface and shouldn't be directly interacted with
    /// unless strictly necessary.
    pub inner_document: lopdf::Document,
    /// The identifier of the document, it is used to in order to set the PDF `ID` tag.
    pub identifier: String,
    pages: Vec<PdfPage>,
    xobjects: XObjectMap,
}

impl PdfDocument {
    /// Create a new `PdfDocument` by defaulting the underlying PDF document to version 1.5
    /// of the PDF specification and customly specifying the PDF identifier.
    pub fn new(pdf_document_identifier: String) -> Self {
        PdfDocument {
            inner_document: lopdf::Document::with_version("1.5"),
            identifier: pdf_document_identifier,
            pages: Vec::new(),
            xobjects: XObjectMap::default(),
        }
    }

    /// Adds a page of given width and height in millimeters and returns its index, to be passed
    /// to the drawing functions.
    pub fn add_page(&mut self, page_width: f32, page_height: f32) -> usize {
        self.pages.push(PdfPage {
            width: millimeters_to_points(page_width),
            height: millimeters_to_points(page_height),
            operations: Vec::new(),
        });

        self.pages.len() - 1
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Embeds an image in the document and returns the reference used to place it on pages.
    pub fn add_image(&mut self, image: ImageXObject) -> XObjectReference {
        let reference = XObjectReference::new(self.xobjects.len());
        self.xobjects
            .0
            .insert(reference.0.clone(), XObject::Image(image));

        reference
    }

    /// Draws a rectangle, with rounded corners when `corner_radius` is positive.
    pub fn draw_rectangle(
        &mut self,
        page_index: usize,
        [x, y]: [f32; 2],
        [width, height]: [f32; 2],
        corner_radius: f32,
        style: PaintStyle,
    ) -> Result<(), ContextError> {
        let Some((mut operations, painting_operator)) = style.operations() else {
            return Ok(());
        };
        let page_height = self.get_page(page_index)?.height;
        let left = millimeters_to_points(x);
        let top = page_height - millimeters_to_points(y);
        let width = millimeters_to_points(width);
        let height = millimeters_to_points(height);

        if corner_radius <= 0.0 {
            operations.push(Operation::new(
                "re",
                vec![
                    left.into(),
                    (top - height).into(),
                    width.into(),
                    height.into(),
                ],
            ));
        } else {
            let radius = millimeters_to_points(corner_radius)
                .min(width / 2.0)
                .min(height / 2.0);
            operations.extend(rounded_rectangle_path(left, top - height, width, height, radius));
        }
        operations.push(Operation::new(painting_operator, vec![]));

        self.add_operations_to_page(page_index, operations)
    }

    pub fn draw_line(
        &mut self,
        page_index: usize,
        [x1, y1]: [f32; 2],
        [x2, y2]: [f32; 2],
        color: [f32; 3],
        line_width: f32,
    ) -> Result<(), ContextError> {
        let page_height = self.get_page(page_index)?.height;
        let operations = vec![
            color_operation("RG", color),
            Operation::new("w", vec![millimeters_to_points(line_width).into()]),
            Operation::new(
                "m",
                vec![
                    millimeters_to_points(x1).into(),
                    (page_height - millimeters_to_points(y1)).into(),
                ],
            ),
            Operation::new(
                "l",
                vec![
                    millimeters_to_points(x2).into(),
                    (page_height - millimeters_to_points(y2)).into(),
                ],
            ),
            Operation::new("S", vec![]),
        ];

        self.add_operations_to_page(page_index, operations)
    }

    pub fn draw_circle(
        &mut self,
        page_index: usize,
        [x, y]: [f32; 2],
        radius: f32,
        style: PaintStyle,
    ) -> Result<(), ContextError> {
        let Some((mut operations, painting_operator)) = style.operations() else {
            return Ok(());
        };
        let page_height = self.get_page(page_index)?.height;
        let center_x = millimeters_to_points(x);
        let center_y = page_height - millimeters_to_points(y);
        let radius = millimeters_to_points(radius);
        let control = radius * BEZIER_CIRCLE_FACTOR;

        operations.push(Operation::new(
            "m",
            vec![(center_x + radius).into(), center_y.into()],
        ));
        let quarters = [
            (radius, control, control, radius, 0.0, radius),
            (-control, radius, -radius, control, -radius, 0.0),
            (-radius, -control, -control, -radius, 0.0, -radius),
            (control, -radius, radius, -control, radius, 0.0),
        ];
        for (x1, y1, x2, y2, x3, y3) in quarters {
            operations.push(Operation::new(
                "c",
                vec![
                    (center_x + x1).into(),
                    (center_y + y1).into(),
                    (center_x + x2).into(),
                    (center_y + y2).into(),
                    (center_x + x3).into(),
                    (center_y + y3).into(),
                ],
            ));
        }
        operations.push(Operation::new("h", vec![]));
        operations.push(Operation::new(painting_operator, vec![]));

        self.add_operations_to_page(page_index, operations)
    }

    /// Draws a closed polygon through the given points.
    pub fn draw_polygon(
        &mut self,
        page_index: usize,
        points: &[[f32; 2]],
        style: PaintStyle,
    ) -> Result<(), ContextError> {
        let Some((mut operations, painting_operator)) = style.operations() else {
            return Ok(());
        };
        let page_height = self.get_page(page_index)?.height;
        for (index, [x, y]) in points.iter().enumerate() {
            operations.push(Operation::new(
                if index == 0 { "m" } else { "l" },
                vec![
                    millimeters_to_points(*x).into(),
                    (page_height - millimeters_to_points(*y)).into(),
                ],
            ));
        }
        operations.push(Operation::new("h", vec![]));
        operations.push(Operation::new(painting_operator, vec![]));

        self.add_operations_to_page(page_index, operations)
    }

    /// Writes a single line of text whose baseline passes through `position`, anchored on its left,
    /// center or right depending on `alignment`.
    #[allow(clippy::too_many_arguments)]
    pub fn write_text(
        &mut self,
        page_index: usize,
        text: &str,
        font_weight: FontWeight,
        font_size: f32,
        color: [f32; 3],
        [x, y]: [f32; 2],
        alignment: TextAlignment,
    ) -> Result<(), ContextError> {
        let page_height = self.get_page(page_index)?.height;
        let width = text_width(text, font_weight, font_size);
        let left = match alignment {
            TextAlignment::Left => x,
            TextAlignment::Center => x - width / 2.0,
            TextAlignment::Right => x - width,
        };

        let operations = vec![
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![
                    Object::Name(font_weight.resource_name().into()),
                    font_size.into(),
                ],
            ),
            color_operation("rg", color),
            Operation::new(
                "Td",
                vec![
                    millimeters_to_points(left).into(),
                    (page_height - millimeters_to_points(y)).into(),
                ],
            ),
            Operation::new(
                "Tj",
                vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
            ),
            Operation::new("ET", vec![]),
        ];

        self.add_operations_to_page(page_index, operations)
    }

    /// Places a previously added image, stretched to the given box.
    pub fn place_image(
        &mut self,
        page_index: usize,
        reference: &XObjectReference,
        [x, y]: [f32; 2],
        [width, height]: [f32; 2],
    ) -> Result<(), ContextError> {
        let page_height = self.get_page(page_index)?.height;
        let bottom = page_height - millimeters_to_points(y + height);
        // The image space is the unit square, which is scaled to the box and then moved into place
        let transform = glm::translation2d(&glm::vec2(millimeters_to_points(x), bottom))
            * glm::scaling2d(&glm::vec2(
                millimeters_to_points(width),
                millimeters_to_points(height),
            ));

        let operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    transform[(0, 0)].into(),
                    transform[(1, 0)].into(),
                    transform[(0, 1)].into(),
                    transform[(1, 1)].into(),
                    transform[(0, 2)].into(),
                    transform[(1, 2)].into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(reference.0.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ];

        self.add_operations_to_page(page_index, operations)
    }

    /// Write the operations so far specified to the PDF document and finalize it.
    ///
    /// The trailer `ID` is made of the identifier of the document and of the given instance ID.
    pub fn write_all(
        &mut self,
        instance_id: String,
        metadata: &DocumentMetadata,
    ) -> Result<(), ContextError> {
        use lopdf::Object::*;
        use lopdf::StringFormat::*;

        let timestamp = to_pdf_timestamp_format(&metadata.created_at);
        let text = |value: &str| String(encode_win_ansi(value), Literal);
        let document_info = lopdf::Dictionary::from_iter(vec![
            ("Trapped", "False".into()),
            ("CreationDate", String(timestamp.clone().into_bytes(), Literal)),
            ("ModDate", String(timestamp.into_bytes(), Literal)),
            ("Title", text(&metadata.title)),
            ("Author", text(&metadata.author)),
            ("Creator", text(&metadata.creator)),
            ("Producer", text(&metadata.creator)),
            ("Subject", text(&metadata.subject)),
            ("Keywords", text(&metadata.keywords)),
            ("Identifier", String(self.identifier.clone().into_bytes(), Literal)),
        ]);
        let document_info_id = self.inner_document.add_object(Dictionary(document_info));

        // Construct the catalog, required by the PDF specification
        let pages_id = self.inner_document.new_object_id();
        let catalog = lopdf::Dictionary::from_iter(vec![
            ("Type", "Catalog".into()),
            ("PageLayout", "OneColumn".into()),
            ("PageMode", "UseNone".into()),
            ("Pages", Reference(pages_id)),
        ]);
        let catalog_id = self.inner_document.add_object(catalog);

        self.inner_document
            .trailer
            .set("Root", Reference(catalog_id));
        self.inner_document
            .trailer
            .set("Info", Reference(document_info_id));
        self.inner_document.trailer.set(
            "ID",
            Array(vec![
                String(self.identifier.clone().into_bytes(), Literal),
                String(instance_id.into_bytes(), Literal),
            ]),
        );

        // The fonts and the images are shared by every page
        let fonts_dictionary = self.insert_fonts_into_document();
        let fonts_dictionary_id = self.inner_document.add_object(fonts_dictionary);
        let xobjects_dictionary =
            mem::take(&mut self.xobjects).into_with_document(&mut self.inner_document);
        let xobjects_dictionary_id = self.inner_document.add_object(xobjects_dictionary);
        let resources = lopdf::Dictionary::from_iter(vec![
            ("Font", Reference(fonts_dictionary_id)),
            ("XObject", Reference(xobjects_dictionary_id)),
        ]);
        let resources_id = self.inner_document.add_object(resources);

        let mut page_ids = Vec::<lopdf::Object>::new();
        for page in mem::take(&mut self.pages) {
            let media_box: lopdf::Object =
                vec![0.into(), 0.into(), page.width.into(), page.height.into()].into();
            let mut page_dictionary = lopdf::Dictionary::from_iter(vec![
                ("Type", "Page".into()),
                ("Rotate", Integer(0)),
                ("MediaBox", media_box.clone()),
                ("TrimBox", media_box.clone()),
                ("CropBox", media_box),
                ("Parent", Reference(pages_id)),
                ("Resources", Reference(resources_id)),
            ]);

            let page_content_id = self.inner_document.add_object(page.into_stream()?);
            page_dictionary.set("Contents", Reference(page_content_id));

            let page_id = self.inner_document.add_object(page_dictionary);
            page_ids.push(Reference(page_id))
        }

        let pages = lopdf::Dictionary::from_iter(vec![
            ("Type", "Pages".into()),
            ("Count", Integer(page_ids.len() as i64)),
            ("Kids", page_ids.into()),
        ]);
        self.inner_document
            .objects
            .insert(pages_id, Dictionary(pages));

        Ok(())
    }

    /// Optimize the PDF document (only superficially).
    pub fn optimize(&mut self) {
        self.inner_document.prune_objects();
        self.inner_document.delete_zero_length_streams();
        self.inner_document.renumber_objects();
        self.inner_document.compress();
    }

    /// Save the `PdfDocument` to bytes in order for it to be written to a file or further processed.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, ContextError> {
        let mut pdf_document_bytes = Vec::new();
        let mut writer = BufWriter::new(&mut pdf_document_bytes);
        self.inner_document.save_to(&mut writer).map_err(|error| {
            ContextError::with_error("Error while saving the PDF document to bytes", &error)
        })?;
        mem::drop(writer);

        Ok(pdf_document_bytes)
    }

    /// Inserts the two standard fonts and returns the dictionary naming them.
    fn insert_fonts_into_document(&mut self) -> lopdf::Dictionary {
        let mut font_dictionary = lopdf::Dictionary::new();

        for font_weight in [FontWeight::Regular, FontWeight::Bold] {
            let font = lopdf::Dictionary::from_iter(vec![
                ("Type", Object::Name("Font".into())),
                ("Subtype", Object::Name("Type1".into())),
                ("BaseFont", Object::Name(font_weight.base_font().into())),
                ("Encoding", Object::Name("WinAnsiEncoding".into())),
            ]);
            let font_id = self.inner_document.add_object(font);
            font_dictionary.set(font_weight.resource_name(), Object::Reference(font_id));
        }

        font_dictionary
    }

    fn add_operations_to_page(
        &mut self,
        page_index: usize,
        operations: Vec<Operation>,
    ) -> Result<(), ContextError> {
        self.get_mut_page(page_index)?.operations.extend(operations);

        Ok(())
    }

    fn get_page(&self, page_index: usize) -> Result<&PdfPage, ContextError> {
        self.pages.get(page_index).ok_or(ContextError::with_context(format!(
            "Failed to find the page with index {}",
            page_index
        )))
    }

    fn get_mut_page(&mut self, page_index: usize) -> Result<&mut PdfPage, ContextError> {
        self.pages
            .get_mut(page_index)
            .ok_or(ContextError::with_context(format!(
                "Failed to find the page with index {}",
                page_index
            )))
    }
}

/// The path of a rectangle with rounded corners, in points from the bottom-left corner.
fn rounded_rectangle_path(
    left: f32,
    bottom: f32,
    width: f32,
    height: f32,
    radius: f32,
) -> Vec<Operation> {
    let right = left + width;
    let top = bottom + height;
    let control = radius * (1.0 - BEZIER_CIRCLE_FACTOR);
    let point = |x: f32, y: f32| -> Vec<Object> { vec![x.into(), y.into()] };
    let curve = |points: [f32; 6]| -> Operation {
        Operation::new("c", points.iter().map(|&value| value.into()).collect())
    };

    vec![
        Operation::new("m", point(left + radius, bottom)),
        Operation::new("l", point(right - radius, bottom)),
        curve([right - control, bottom, right, bottom + control, right, bottom + radius]),
        Operation::new("l", point(right, top - radius)),
        curve([right, top - control, right - control, top, right - radius, top]),
        Operation::new("l", point(left + radius, top)),
        curve([left + control, top, left, top - control, left, top - radius]),
        Operation::new("l", point(left, bottom + radius)),
        curve([left, bottom + control, left + control, bottom, left + radius, bottom]),
        Operation::new("h", vec![]),
    ]
}

/// Formats the given time so that it matches what the PDF specification expects.
/// An example of it is the following: D:20170505150224+02'00'.
fn to_pdf_timestamp_format(date: &OffsetDateTime) -> String {
    let offset = date.offset();
    let offset_sign = if offset.is_negative() { '-' } else { '+' };
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}{offset_sign}{:02}'{:02}'",
        date.year(),
        u8::from(date.month()),
        date.day(),
        date.hour(),
        date.minute(),
        date.second(),
        offset.whole_hours().abs(),
        offset.minutes_past_hour().abs(),
    )
}
