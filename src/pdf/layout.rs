//! Page geometry for the certificate layout.
//!
//! All coordinates are in PDF points measured from the top-left corner of
//! the page; the renderer flips the y axis when drawing.

/// A4 landscape.
pub const PAGE_WIDTH: f32 = 841.89;
pub const PAGE_HEIGHT: f32 = 595.28;

pub const SIGNATURE_WIDTH: f32 = 130.0;
pub const SIGNATURE_HEIGHT: f32 = 50.0;
pub const SIGNATURE_MARGIN_X: f32 = 50.0;
pub const SIGNATURE_MARGIN_BOTTOM: f32 = 100.0;

/// Top-left corner of a signature block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Slot {
    pub x: f32,
    pub y: f32,
}

/// Position every signature block on the page.
///
/// One signature is centered, two sit at the quarter marks, three or more
/// are spread evenly between the side margins. All blocks share one row.
pub fn signature_slots(count: usize, page_width: f32, page_height: f32) -> Vec<Slot> {
    let y = page_height - SIGNATURE_MARGIN_BOTTOM - SIGNATURE_HEIGHT;
    let half = SIGNATURE_WIDTH / 2.0;
    match count {
        0 => Vec::new(),
        1 => vec![Slot {
            x: (page_width - SIGNATURE_WIDTH) / 2.0,
            y,
        }],
        2 => vec![
            Slot {
                x: page_width / 4.0 - half,
                y,
            },
            Slot {
                x: page_width * 3.0 / 4.0 - half,
                y,
            },
        ],
        n => {
            let step = (page_width - 2.0 * SIGNATURE_MARGIN_X - SIGNATURE_WIDTH) / (n - 1) as f32;
            (0..n)
                .map(|i| Slot {
                    x: SIGNATURE_MARGIN_X + i as f32 * step,
                    y,
                })
                .collect()
        }
    }
}

/// Approximate rendered width of `text`. Built-in PDF fonts carry no
/// metrics here, so an average glyph width (`em_factor` of the font size)
/// stands in for real measurement.
pub fn text_width(text: &str, font_size: f32, em_factor: f32) -> f32 {
    text.chars().count() as f32 * font_size * em_factor
}

/// Left edge that centers `text` within `[left, left + width]`.
pub fn centered_x(text: &str, font_size: f32, em_factor: f32, left: f32, width: f32) -> f32 {
    left + (width - text_width(text, font_size, em_factor)) / 2.0
}

/// Largest font size not above `preferred` at which `text` fits `max_width`.
pub fn fit_font_size(text: &str, preferred: f32, em_factor: f32, max_width: f32) -> f32 {
    let width = text_width(text, preferred, em_factor);
    if width <= max_width || width == 0.0 {
        preferred
    } else {
        preferred * max_width / width
    }
}

/// Uniform scale that fits a `width` x `height` image inside a box.
pub fn fit_scale(width: f32, height: f32, box_width: f32, box_height: f32) -> f32 {
    if width <= 0.0 || height <= 0.0 {
        return 0.0;
    }
    (box_width / width).min(box_height / height)
}

/// Greedy word wrap at `max_chars` per line.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > max_chars {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 0.001;

    #[test]
    fn single_signature_is_centered() {
        let slots = signature_slots(1, PAGE_WIDTH, PAGE_HEIGHT);
        assert_eq!(slots.len(), 1);
        assert!((slots[0].x - (PAGE_WIDTH - 130.0) / 2.0).abs() < EPS);
    }

    #[test]
    fn two_signatures_sit_on_quarter_marks() {
        let slots = signature_slots(2, PAGE_WIDTH, PAGE_HEIGHT);
        assert!((slots[0].x - (PAGE_WIDTH / 4.0 - 65.0)).abs() < EPS);
        assert!((slots[1].x - (3.0 * PAGE_WIDTH / 4.0 - 65.0)).abs() < EPS);
    }

    #[test]
    fn three_signatures_are_evenly_spread() {
        let slots = signature_slots(3, PAGE_WIDTH, PAGE_HEIGHT);
        let step = (PAGE_WIDTH - 100.0 - 130.0) / 2.0;
        for (i, slot) in slots.iter().enumerate() {
            assert!((slot.x - (50.0 + i as f32 * step)).abs() < EPS);
        }
        assert!(slots[0].x < slots[1].x && slots[1].x < slots[2].x);
    }

    #[test]
    fn all_signatures_share_one_row() {
        for n in 1..=3 {
            for slot in signature_slots(n, PAGE_WIDTH, PAGE_HEIGHT) {
                assert!((slot.y - (PAGE_HEIGHT - 150.0)).abs() < EPS);
            }
        }
        assert!(signature_slots(0, PAGE_WIDTH, PAGE_HEIGHT).is_empty());
    }

    #[test]
    fn long_text_shrinks_to_fit() {
        let size = fit_font_size(&"W".repeat(100), 40.0, 0.5, 500.0);
        assert!(size < 40.0);
        assert!((text_width(&"W".repeat(100), size, 0.5) - 500.0).abs() < 0.01);
        assert_eq!(fit_font_size("Ada", 40.0, 0.5, 500.0), 40.0);
    }

    #[test]
    fn wrap_breaks_on_words() {
        let lines = wrap("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
        assert!(wrap("   ", 10).is_empty());
    }

    #[test]
    fn image_scale_preserves_aspect() {
        assert_eq!(fit_scale(260.0, 50.0, 130.0, 50.0), 0.5);
        assert_eq!(fit_scale(100.0, 100.0, 130.0, 50.0), 0.5);
        assert_eq!(fit_scale(0.0, 10.0, 130.0, 50.0), 0.0);
    }
}
