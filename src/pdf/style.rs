//! Visual descriptors for the built-in templates.
//!
//! The three templates share one layout; they differ only in palette,
//! fonts, font sizes and the decoration drawn behind the text.

use printpdf::{BuiltinFont, Color, Rgb};

use crate::models::certificate::TemplateId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb8(pub u8, pub u8, pub u8);

impl Rgb8 {
    pub fn to_color(self) -> Color {
        Color::Rgb(Rgb::new(
            f32::from(self.0) / 255.0,
            f32::from(self.1) / 255.0,
            f32::from(self.2) / 255.0,
            None,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoration {
    /// Double frame with square corner ornaments.
    DoubleBorder,
    /// Solid bar down the left edge and a hairline under the heading.
    SideBar,
    /// Colored bands across the top and bottom with triangular corners.
    CornerBands,
}

#[derive(Debug, Clone, Copy)]
pub struct TemplateStyle {
    pub background: Rgb8,
    pub primary: Rgb8,
    pub accent: Rgb8,
    pub text: Rgb8,
    pub muted: Rgb8,

    pub heading_font: BuiltinFont,
    pub name_font: BuiltinFont,
    pub body_font: BuiltinFont,
    pub body_bold_font: BuiltinFont,

    pub heading_size: f32,
    pub name_size: f32,
    pub course_size: f32,
    pub body_size: f32,

    pub decoration: Decoration,
}

static CLASSIC_ELEGANCE: TemplateStyle = TemplateStyle {
    background: Rgb8(253, 250, 240),
    primary: Rgb8(26, 54, 93),
    accent: Rgb8(184, 151, 74),
    text: Rgb8(33, 33, 33),
    muted: Rgb8(110, 110, 110),
    heading_font: BuiltinFont::TimesBold,
    name_font: BuiltinFont::TimesBoldItalic,
    body_font: BuiltinFont::TimesRoman,
    body_bold_font: BuiltinFont::TimesBold,
    heading_size: 34.0,
    name_size: 40.0,
    course_size: 22.0,
    body_size: 14.0,
    decoration: Decoration::DoubleBorder,
};

static MODERN_MINIMALIST: TemplateStyle = TemplateStyle {
    background: Rgb8(255, 255, 255),
    primary: Rgb8(17, 24, 39),
    accent: Rgb8(59, 130, 246),
    text: Rgb8(31, 41, 55),
    muted: Rgb8(107, 114, 128),
    heading_font: BuiltinFont::HelveticaBold,
    name_font: BuiltinFont::HelveticaBold,
    body_font: BuiltinFont::Helvetica,
    body_bold_font: BuiltinFont::HelveticaBold,
    heading_size: 28.0,
    name_size: 36.0,
    course_size: 20.0,
    body_size: 13.0,
    decoration: Decoration::SideBar,
};

static VIBRANT_ACHIEVEMENT: TemplateStyle = TemplateStyle {
    background: Rgb8(255, 251, 235),
    primary: Rgb8(124, 58, 237),
    accent: Rgb8(245, 158, 11),
    text: Rgb8(30, 27, 75),
    muted: Rgb8(99, 102, 141),
    heading_font: BuiltinFont::HelveticaBold,
    name_font: BuiltinFont::HelveticaBoldOblique,
    body_font: BuiltinFont::Helvetica,
    body_bold_font: BuiltinFont::HelveticaBold,
    heading_size: 32.0,
    name_size: 42.0,
    course_size: 22.0,
    body_size: 14.0,
    decoration: Decoration::CornerBands,
};

impl TemplateStyle {
    pub fn for_template(template: TemplateId) -> &'static TemplateStyle {
        match template {
            TemplateId::ClassicElegance => &CLASSIC_ELEGANCE,
            TemplateId::ModernMinimalist => &MODERN_MINIMALIST,
            TemplateId::VibrantAchievement => &VIBRANT_ACHIEVEMENT,
        }
    }
}

/// Average glyph width of a built-in font as a fraction of its size.
pub fn em_factor(font: BuiltinFont) -> f32 {
    match font {
        BuiltinFont::Courier
        | BuiltinFont::CourierBold
        | BuiltinFont::CourierOblique
        | BuiltinFont::CourierBoldOblique => 0.6,
        BuiltinFont::TimesRoman | BuiltinFont::TimesItalic => 0.45,
        BuiltinFont::TimesBold | BuiltinFont::TimesBoldItalic => 0.5,
        BuiltinFont::HelveticaBold | BuiltinFont::HelveticaBoldOblique => 0.58,
        _ => 0.52,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_has_a_distinct_style() {
        let decorations: Vec<_> = TemplateId::ALL
            .iter()
            .map(|t| TemplateStyle::for_template(*t).decoration)
            .collect();
        assert_eq!(
            decorations,
            vec![
                Decoration::DoubleBorder,
                Decoration::SideBar,
                Decoration::CornerBands
            ]
        );
    }
}
