//! Mask-region calculation: which sub-rectangles of a located number get covered.

use serde::{Deserialize, Serialize};

use super::locate::Located;
use crate::geometry::Rect;
use crate::identifier::MaskPolicy;

/// How masked regions are painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum FillStyle {
    /// Opaque black box
    #[default]
    Black,
    /// White box with the masked digits written over it
    Overlay {
        /// Character drawn in place of each hidden digit
        mask_char: char,
    },
}

impl FillStyle {
    /// Overlay style with the usual `*` mask character.
    pub fn overlay() -> Self {
        FillStyle::Overlay { mask_char: '*' }
    }

    /// Parse "black" or "overlay" from the command line.
    pub fn parse(s: &str, mask_char: char) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "black" => Ok(FillStyle::Black),
            "overlay" | "white" => Ok(FillStyle::Overlay { mask_char }),
            other => Err(format!("unknown fill style: {}", other)),
        }
    }
}

/// The paint of one region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum Fill {
    /// Solid black
    Black,
    /// Solid white with replacement text
    Overlay {
        /// Text drawn inside the box
        text: String,
    },
}

/// A rectangle to obscure and how to paint it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskRegion {
    /// Area in page space
    pub rect: Rect,
    /// Paint
    pub fill: Fill,
}

impl MaskRegion {
    fn new(rect: Rect, covered: &str, style: FillStyle) -> Self {
        let fill = match style {
            FillStyle::Black => Fill::Black,
            FillStyle::Overlay { .. } => Fill::Overlay {
                text: covered.to_string(),
            },
        };
        Self { rect, fill }
    }
}

/// The number as it should read after masking.
///
/// Non-digit characters are copied unchanged. Under a partial policy the
/// first `head` and last `tail` digits are replaced; under a total policy
/// every digit and check letter is.
///
/// ```
/// use tarja::identifier::MaskPolicy;
/// use tarja::redact::masked_display;
///
/// let policy = MaskPolicy::Partial { head: 3, tail: 2 };
/// assert_eq!(masked_display("529.982.247-25", policy, '*'), "***.982.247-**");
/// assert_eq!(masked_display("12.345.678-X", MaskPolicy::Total, '#'), "##.###.###-#");
/// ```
pub fn masked_display(text: &str, policy: MaskPolicy, mask_char: char) -> String {
    match policy {
        MaskPolicy::Total => text
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { mask_char } else { c })
            .collect(),
        MaskPolicy::Partial { head, tail } => {
            let total = text.chars().filter(|c| c.is_ascii_digit()).count();
            if head + tail >= total {
                return masked_display(text, MaskPolicy::Total, mask_char);
            }
            let mut index = 0;
            text.chars()
                .map(|c| {
                    if !c.is_ascii_digit() {
                        return c;
                    }
                    let hidden = index < head || index >= total - tail;
                    index += 1;
                    if hidden {
                        mask_char
                    } else {
                        c
                    }
                })
                .collect()
        }
    }
}

/// Regions to paint for one located occurrence of `text`.
///
/// `groups` are the captured digit groups used by [`Located::Groups`].
pub fn regions_for(
    located: &Located,
    text: &str,
    groups: &[String],
    policy: MaskPolicy,
    style: FillStyle,
) -> Vec<MaskRegion> {
    let mask_char = match style {
        FillStyle::Overlay { mask_char } => mask_char,
        FillStyle::Black => '*',
    };

    match located {
        Located::Whole(rect) => match policy {
            MaskPolicy::Total => vec![MaskRegion::new(
                *rect,
                &masked_display(text, policy, mask_char),
                style,
            )],
            MaskPolicy::Partial { head, tail } => {
                let display: Vec<char> = masked_display(text, policy, mask_char).chars().collect();
                partial_rects(rect, display.len(), head, tail)
                    .into_iter()
                    .map(|(r, chars)| {
                        let covered: String = display[chars].iter().collect();
                        MaskRegion::new(r, &covered, style)
                    })
                    .collect()
            }
        },
        Located::Groups(hits) => hits
            .iter()
            .filter_map(|hit| {
                let group = groups.get(hit.group)?;
                let covered = masked_display(group, MaskPolicy::Total, mask_char);
                Some(MaskRegion::new(hit.rect, &covered, style))
            })
            .collect(),
        Located::Missed => Vec::new(),
    }
}

/// Split `rect` into the leading `head` and trailing `tail` character cells.
///
/// Assumes uniform character width. Returns nothing for numbers shorter
/// than five characters.
fn partial_rects(
    rect: &Rect,
    total_chars: usize,
    head: usize,
    tail: usize,
) -> Vec<(Rect, std::ops::Range<usize>)> {
    if total_chars < 5 || head + tail > total_chars {
        return Vec::new();
    }
    let char_width = rect.width() / total_chars as f32;

    let left = Rect {
        x1: (rect.x0 + head as f32 * char_width).min(rect.x1),
        ..*rect
    };
    let right = Rect {
        x0: (rect.x0 + (total_chars - tail) as f32 * char_width).max(rect.x0),
        ..*rect
    };
    vec![(left, 0..head), (right, total_chars - tail..total_chars)]
}
