//! Certificate PDF rendering.
//!
//! Draws a single A4 landscape page with `printpdf`: background and
//! template decoration, heading, recipient, course and date, followed by
//! the shared footer (note, logo, signature blocks, issuer line and the
//! certificate ID with its verification link).
//!
//! The three built-in templates go through the same code path; only the
//! [`TemplateStyle`] changes.

pub mod layout;
pub mod style;

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfLayerReference, Point, Polygon, Rect,
};
use uuid::Uuid;

use crate::models::certificate::{CertificateRequest, ValidationError};
use layout::{PAGE_HEIGHT, PAGE_WIDTH, SIGNATURE_HEIGHT, SIGNATURE_WIDTH};
pub use style::TemplateStyle;
use style::{Decoration, Rgb8, em_factor};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("pdf document error: {0}")]
    Document(String),
}

fn document_error(err: impl std::fmt::Debug) -> RenderError {
    RenderError::Document(format!("{err:?}"))
}

/// Points (top-left origin) to printpdf millimetres.
fn mm(pt: f32) -> Mm {
    Mm(pt * 25.4 / 72.0)
}

fn point(x: f32, y: f32) -> Point {
    Point::new(mm(x), mm(PAGE_HEIGHT - y))
}

/// Render `request` into PDF bytes.
///
/// `id` and `verify_url` are printed in the footer so the certificate can
/// be checked later.
pub fn render(
    request: &CertificateRequest,
    id: Uuid,
    verify_url: &str,
) -> Result<Vec<u8>, RenderError> {
    request.check()?;
    let style = TemplateStyle::for_template(request.template);

    let (doc, page, layer) = PdfDocument::new(
        format!("{} - {}", request.certificate_type.heading(), request.name),
        mm(PAGE_WIDTH),
        mm(PAGE_HEIGHT),
        "certificate",
    );
    let fonts = Fonts {
        heading: doc.add_builtin_font(style.heading_font).map_err(document_error)?,
        name: doc.add_builtin_font(style.name_font).map_err(document_error)?,
        body: doc.add_builtin_font(style.body_font).map_err(document_error)?,
        body_bold: doc.add_builtin_font(style.body_bold_font).map_err(document_error)?,
    };
    let canvas = Canvas {
        layer: doc.get_page(page).get_layer(layer),
    };

    canvas.fill_rect(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT, style.background);
    draw_decoration(&canvas, style);
    draw_body(&canvas, &fonts, style, request);
    draw_footer(&canvas, &fonts, style, request, id, verify_url);

    doc.save_to_bytes().map_err(document_error)
}

struct Fonts {
    heading: IndirectFontRef,
    name: IndirectFontRef,
    body: IndirectFontRef,
    body_bold: IndirectFontRef,
}

struct Canvas {
    layer: PdfLayerReference,
}

impl Canvas {
    fn fill_rect(&self, x: f32, y: f32, width: f32, height: f32, color: Rgb8) {
        self.layer.set_fill_color(color.to_color());
        let rect = Rect::new(
            mm(x),
            mm(PAGE_HEIGHT - y - height),
            mm(x + width),
            mm(PAGE_HEIGHT - y),
        )
        .with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
    }

    fn stroke_rect(&self, x: f32, y: f32, width: f32, height: f32, color: Rgb8, thickness: f32) {
        self.layer.set_outline_color(color.to_color());
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![
                (point(x, y), false),
                (point(x + width, y), false),
                (point(x + width, y + height), false),
                (point(x, y + height), false),
            ],
            is_closed: true,
        });
    }

    fn line(&self, from: (f32, f32), to: (f32, f32), color: Rgb8, thickness: f32) {
        self.layer.set_outline_color(color.to_color());
        self.layer.set_outline_thickness(thickness);
        self.layer.add_line(Line {
            points: vec![(point(from.0, from.1), false), (point(to.0, to.1), false)],
            is_closed: false,
        });
    }

    fn triangle(&self, corners: [(f32, f32); 3], color: Rgb8) {
        self.layer.set_fill_color(color.to_color());
        self.layer.add_polygon(Polygon {
            rings: vec![corners.iter().map(|&(x, y)| (point(x, y), false)).collect()],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    /// `y` is the text baseline.
    fn text(&self, text: &str, font: &IndirectFontRef, size: f32, x: f32, y: f32, color: Rgb8) {
        self.layer.set_fill_color(color.to_color());
        self.layer
            .use_text(text, size, mm(x), mm(PAGE_HEIGHT - y), font);
    }

    fn centered(
        &self,
        text: &str,
        font: (&IndirectFontRef, BuiltinFont),
        size: f32,
        left: f32,
        width: f32,
        y: f32,
        color: Rgb8,
    ) {
        let factor = em_factor(font.1);
        let size = layout::fit_font_size(text, size, factor, width);
        let x = layout::centered_x(text, size, factor, left, width);
        self.text(text, font.0, size, x, y, color);
    }

    /// Draw an image scaled to fit the box, centered in it. Returns false
    /// when the bytes are not a decodable image.
    fn image(&self, bytes: &[u8], x: f32, y: f32, box_width: f32, box_height: f32) -> bool {
        let decoded = match printpdf::image_crate::load_from_memory(bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable image");
                return false;
            }
        };
        // flatten alpha so every input embeds as plain RGB
        let buffer = decoded.to_rgb8();
        let (px_width, px_height) = (buffer.width() as f32, buffer.height() as f32);
        let rgb = printpdf::image_crate::DynamicImage::ImageRgb8(buffer);
        let scale = layout::fit_scale(px_width, px_height, box_width, box_height);
        if scale == 0.0 {
            return false;
        }
        let (drawn_width, drawn_height) = (px_width * scale, px_height * scale);
        let left = x + (box_width - drawn_width) / 2.0;
        let bottom = y + (box_height + drawn_height) / 2.0;

        Image::from_dynamic_image(&rgb).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(left)),
                translate_y: Some(mm(PAGE_HEIGHT - bottom)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                // one pixel per point before scaling
                dpi: Some(72.0),
                ..Default::default()
            },
        );
        true
    }
}

fn draw_decoration(canvas: &Canvas, style: &TemplateStyle) {
    match style.decoration {
        Decoration::DoubleBorder => {
            canvas.stroke_rect(20.0, 20.0, PAGE_WIDTH - 40.0, PAGE_HEIGHT - 40.0, style.primary, 3.0);
            canvas.stroke_rect(30.0, 30.0, PAGE_WIDTH - 60.0, PAGE_HEIGHT - 60.0, style.accent, 1.0);
            for (x, y) in [
                (24.0, 24.0),
                (PAGE_WIDTH - 36.0, 24.0),
                (24.0, PAGE_HEIGHT - 36.0),
                (PAGE_WIDTH - 36.0, PAGE_HEIGHT - 36.0),
            ] {
                canvas.fill_rect(x, y, 12.0, 12.0, style.accent);
            }
        }
        Decoration::SideBar => {
            canvas.fill_rect(0.0, 0.0, 18.0, PAGE_HEIGHT, style.primary);
            canvas.fill_rect(18.0, 0.0, 4.0, PAGE_HEIGHT, style.accent);
            canvas.line(
                (PAGE_WIDTH / 2.0 - 120.0, 128.0),
                (PAGE_WIDTH / 2.0 + 120.0, 128.0),
                style.accent,
                1.0,
            );
        }
        Decoration::CornerBands => {
            canvas.fill_rect(0.0, 0.0, PAGE_WIDTH, 28.0, style.primary);
            canvas.fill_rect(0.0, PAGE_HEIGHT - 28.0, PAGE_WIDTH, 28.0, style.primary);
            canvas.triangle([(0.0, 28.0), (120.0, 28.0), (0.0, 148.0)], style.accent);
            canvas.triangle(
                [
                    (PAGE_WIDTH, PAGE_HEIGHT - 28.0),
                    (PAGE_WIDTH - 120.0, PAGE_HEIGHT - 28.0),
                    (PAGE_WIDTH, PAGE_HEIGHT - 148.0),
                ],
                style.accent,
            );
        }
    }
}

const CONTENT_LEFT: f32 = 60.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 120.0;

fn draw_body(canvas: &Canvas, fonts: &Fonts, style: &TemplateStyle, request: &CertificateRequest) {
    canvas.centered(
        &request.certificate_type.heading(),
        (&fonts.heading, style.heading_font),
        style.heading_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        110.0,
        style.primary,
    );
    canvas.centered(
        "This is to certify that",
        (&fonts.body, style.body_font),
        style.body_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        160.0,
        style.muted,
    );
    canvas.centered(
        &request.name,
        (&fonts.name, style.name_font),
        style.name_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        212.0,
        style.text,
    );
    canvas.line(
        (PAGE_WIDTH / 2.0 - 180.0, 226.0),
        (PAGE_WIDTH / 2.0 + 180.0, 226.0),
        style.accent,
        1.2,
    );
    canvas.centered(
        request.certificate_type.citation(),
        (&fonts.body, style.body_font),
        style.body_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        256.0,
        style.muted,
    );
    canvas.centered(
        &request.course,
        (&fonts.body_bold, style.body_bold_font),
        style.course_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        290.0,
        style.primary,
    );
    canvas.centered(
        &format!("on {}", request.date),
        (&fonts.body, style.body_font),
        style.body_size,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        318.0,
        style.text,
    );
}

/// Shared by all templates.
fn draw_footer(
    canvas: &Canvas,
    fonts: &Fonts,
    style: &TemplateStyle,
    request: &CertificateRequest,
    id: Uuid,
    verify_url: &str,
) {
    if let Some(note) = &request.additional_info {
        for (i, line) in layout::wrap(note, 90).iter().take(2).enumerate() {
            canvas.centered(
                line,
                (&fonts.body, style.body_font),
                style.body_size - 3.0,
                CONTENT_LEFT,
                CONTENT_WIDTH,
                346.0 + i as f32 * 14.0,
                style.muted,
            );
        }
    }

    if let Some(logo) = &request.logo {
        canvas.image(logo, 50.0, 45.0, 80.0, 80.0);
    }

    let slots = layout::signature_slots(request.signatures.len(), PAGE_WIDTH, PAGE_HEIGHT);
    for (signature, slot) in request.signatures.iter().zip(slots) {
        if let Some(image) = &signature.image {
            canvas.image(image, slot.x, slot.y, SIGNATURE_WIDTH, SIGNATURE_HEIGHT);
        }
        let rule_y = slot.y + SIGNATURE_HEIGHT + 2.0;
        canvas.line(
            (slot.x, rule_y),
            (slot.x + SIGNATURE_WIDTH, rule_y),
            style.text,
            0.8,
        );
        if !signature.name.is_empty() {
            canvas.centered(
                &signature.name,
                (&fonts.body, style.body_font),
                11.0,
                slot.x,
                SIGNATURE_WIDTH,
                rule_y + 14.0,
                style.text,
            );
        }
    }

    canvas.centered(
        &format!("Issued by {}", request.issuer),
        (&fonts.body_bold, style.body_bold_font),
        style.body_size - 1.0,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        PAGE_HEIGHT - 52.0,
        style.primary,
    );
    canvas.centered(
        &format!("Certificate ID: {id} | Verify at {verify_url}"),
        (&fonts.body, style.body_font),
        8.0,
        CONTENT_LEFT,
        CONTENT_WIDTH,
        PAGE_HEIGHT - 36.0,
        style.muted,
    );
}
