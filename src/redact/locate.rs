//! Span locator: from a validated match to page rectangles.

use serde::Serialize;

use crate::document::RedactionPage;
use crate::geometry::Rect;
use crate::identifier::{IdentifierType, MaskPolicy, ValidatedMatch};

/// A single CPF hit taller than this is taken to span a line break.
pub const LINE_BREAK_HEIGHT: f32 = 15.0;

/// A captured group found on its own.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupHit {
    /// Index into the match's captured groups
    pub group: usize,
    /// Where the group was found
    pub rect: Rect,
}

/// Where an occurrence ended up on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Located {
    /// The whole number in one rectangle
    Whole(Rect),
    /// The number broken apart; only these groups were located
    Groups(Vec<GroupHit>),
    /// Nothing on the page matched
    Missed,
}

impl Located {
    /// Check whether any geometry was found.
    pub fn is_found(&self) -> bool {
        !matches!(self, Located::Missed)
    }
}

/// Locate the `occurrence`-th (0-based) appearance of a match on the page.
///
/// Exact search first; the k-th text occurrence takes the k-th search hit.
/// When that fails, or when a CPF hit is tall enough to span two lines, the
/// captured groups are searched separately. A tall hit whose groups cannot be
/// found is missed rather than masked across both lines.
pub fn locate(page: &dyn RedactionPage, m: &ValidatedMatch, occurrence: usize) -> Located {
    let hits = page.search_for(&m.text);
    let exact = hits.get(occurrence).copied();

    match exact {
        Some(rect) if m.kind != IdentifierType::Cpf || rect.height() <= LINE_BREAK_HEIGHT => {
            Located::Whole(rect)
        }
        Some(rect) => {
            log::debug!(
                "{} hit {:.1}pt tall on page {}, trying groups",
                m.kind,
                rect.height(),
                page.number()
            );
            locate_groups(page, m, occurrence)
        }
        None => locate_groups(page, m, occurrence),
    }
}

fn locate_groups(page: &dyn RedactionPage, m: &ValidatedMatch, occurrence: usize) -> Located {
    if m.groups.len() < 2 {
        return Located::Missed;
    }

    let wanted: Vec<usize> = match m.kind.mask_policy() {
        MaskPolicy::Partial { .. } => vec![0, m.groups.len() - 1],
        MaskPolicy::Total => (0..m.groups.len()).collect(),
    };

    let first = page.search_for(&m.groups[wanted[0]]);
    let Some(start) = first.get(occurrence).or_else(|| first.first()).copied() else {
        return Located::Missed;
    };

    let mut found = vec![GroupHit {
        group: wanted[0],
        rect: start,
    }];
    let mut previous = start;
    for &group in &wanted[1..] {
        let candidates = page.search_for(&m.groups[group]);
        let Some(next) = closest_after(&previous, &candidates) else {
            return Located::Missed;
        };
        found.push(GroupHit { group, rect: next });
        previous = next;
    }

    Located::Groups(found)
}

/// The candidate that follows `anchor` most closely in reading order.
///
/// "Follows" means on the same line and to the right, or on a lower line.
fn closest_after(anchor: &Rect, candidates: &[Rect]) -> Option<Rect> {
    let (_, anchor_y) = anchor.center();
    let tolerance = anchor.height() / 2.0;

    candidates
        .iter()
        .filter(|r| {
            let (_, y) = r.center();
            let same_line = (y - anchor_y).abs() <= tolerance;
            (same_line && r.x0 >= anchor.x1 - 0.5) || y < anchor_y - tolerance
        })
        .min_by(|a, b| {
            reading_distance(anchor, a)
                .partial_cmp(&reading_distance(anchor, b))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .copied()
}

/// Vertical distance dominates; horizontal distance breaks ties within a line.
fn reading_distance(anchor: &Rect, r: &Rect) -> f32 {
    let dy = anchor.center().1 - r.center().1;
    let dx = if dy.abs() <= anchor.height() / 2.0 {
        r.x0 - anchor.x1
    } else {
        r.x0
    };
    dy.abs() * 1000.0 + dx.abs()
}
