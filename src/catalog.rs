// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Static tracking-item catalog.
//!
//! Every dynamic scored field on an [`Entry`](crate::entry::Entry) is keyed
//! by one of these item identifiers. Validation, scale normalization and
//! migration all consult the catalog rather than inferring anything from
//! values: 3-point items are only known to be 3-point because they are
//! declared so here.
//!
//! Unknown identifiers are tolerated everywhere (forward compatibility) but
//! are inert: no validation rules apply and no migration touches them.

use crate::entry::EntryType;

/// Shape of a tracking item's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemKind {
    /// Integer on a fixed display scale (3- or 5-point).
    Scale { points: u8 },
    /// Fixed-option multi-select; duplicates are rejected.
    MultiSelect { options: &'static [&'static str] },
    /// Wearable/numeric reading in `0..=100`.
    Numeric,
    /// Calendar date string, `YYYY-MM-DD`.
    Date,
}

/// One declared tracking item.
#[derive(Debug, Clone, Copy)]
pub struct TrackingItem {
    pub id: &'static str,
    pub label: &'static str,
    pub kind: ItemKind,
    /// Views this item appears in.
    pub views: &'static [EntryType],
}

const MORNING: &[EntryType] = &[EntryType::Morning];
const EVENING: &[EntryType] = &[EntryType::Evening];
const QUICK: &[EntryType] = &[EntryType::Quick];
const ANY: &[EntryType] = &[EntryType::Morning, EntryType::Evening, EntryType::Quick];

const PHYSICAL_SYMPTOM_OPTIONS: &[&str] = &[
    "cramps",
    "bloating",
    "breast_tenderness",
    "dizziness",
    "heart_palpitations",
    "dry_skin",
];

/// The static catalog. Order is the default display order.
pub const CATALOG: &[TrackingItem] = &[
    TrackingItem {
        id: "sleep_quality",
        label: "Sleep quality",
        kind: ItemKind::Scale { points: 5 },
        views: MORNING,
    },
    TrackingItem {
        id: "energy_level",
        label: "Energy level",
        kind: ItemKind::Scale { points: 5 },
        views: ANY,
    },
    TrackingItem {
        id: "mood",
        label: "Mood",
        kind: ItemKind::Scale { points: 5 },
        views: ANY,
    },
    TrackingItem {
        id: "night_sweats",
        label: "Night sweats",
        kind: ItemKind::Scale { points: 3 },
        views: MORNING,
    },
    TrackingItem {
        id: "brain_fog",
        label: "Brain fog",
        kind: ItemKind::Scale { points: 3 },
        views: ANY,
    },
    TrackingItem {
        id: "anxiety",
        label: "Anxiety",
        kind: ItemKind::Scale { points: 3 },
        views: EVENING,
    },
    TrackingItem {
        id: "irritability",
        label: "Irritability",
        kind: ItemKind::Scale { points: 5 },
        views: EVENING,
    },
    TrackingItem {
        id: "stress_level",
        label: "Stress level",
        kind: ItemKind::Scale { points: 5 },
        views: EVENING,
    },
    TrackingItem {
        id: "joint_pain",
        label: "Joint pain",
        kind: ItemKind::Scale { points: 3 },
        views: EVENING,
    },
    TrackingItem {
        id: "headache",
        label: "Headache",
        kind: ItemKind::Scale { points: 3 },
        views: QUICK,
    },
    TrackingItem {
        id: "hot_flash_intensity",
        label: "Hot flash intensity",
        kind: ItemKind::Scale { points: 5 },
        views: QUICK,
    },
    TrackingItem {
        id: "physical_symptoms",
        label: "Physical symptoms",
        kind: ItemKind::MultiSelect {
            options: PHYSICAL_SYMPTOM_OPTIONS,
        },
        views: EVENING,
    },
    TrackingItem {
        id: "sleep_score",
        label: "Sleep score (wearable)",
        kind: ItemKind::Numeric,
        views: MORNING,
    },
    TrackingItem {
        id: "readiness_score",
        label: "Readiness score (wearable)",
        kind: ItemKind::Numeric,
        views: MORNING,
    },
    TrackingItem {
        id: "period_start_date",
        label: "Period start date",
        kind: ItemKind::Date,
        views: EVENING,
    },
];

/// Look up an item by identifier.
#[must_use]
pub fn item(id: &str) -> Option<&'static TrackingItem> {
    CATALOG.iter().find(|item| item.id == id)
}

/// True when the item exists and is declared 3-point. Migration uses this to
/// scope legacy renormalization; the value range alone is ambiguous.
#[must_use]
pub fn is_three_point(id: &str) -> bool {
    matches!(
        item(id).map(|i| i.kind),
        Some(ItemKind::Scale { points: 3 })
    )
}

/// The analytics-facing scale of a scale item: 5 when the item is 3-point
/// (historic 3-point data and 5-point items share one statistical
/// treatment), otherwise the native scale. `None` for non-scale items.
#[must_use]
pub fn effective_scale(id: &str) -> Option<u8> {
    match item(id)?.kind {
        ItemKind::Scale { points: 3 } => Some(crate::scale::CANONICAL_SCALE),
        ItemKind::Scale { points } => Some(points),
        _ => None,
    }
}

/// Items applicable to a view.
pub fn items_for_view(view: EntryType) -> impl Iterator<Item = &'static TrackingItem> {
    CATALOG.iter().filter(move |item| item.views.contains(&view))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        assert_eq!(item("energy_level").unwrap().id, "energy_level");
        assert!(item("not_an_item").is_none());
    }

    #[test]
    fn three_point_detection_is_declaration_driven() {
        assert!(is_three_point("brain_fog"));
        assert!(is_three_point("night_sweats"));
        assert!(!is_three_point("energy_level"));
        assert!(!is_three_point("physical_symptoms"));
        assert!(!is_three_point("unknown_item"));
    }

    #[test]
    fn effective_scale_promotes_three_point_items() {
        assert_eq!(effective_scale("brain_fog"), Some(5));
        assert_eq!(effective_scale("energy_level"), Some(5));
        assert_eq!(effective_scale("sleep_score"), None);
        assert_eq!(effective_scale("period_start_date"), None);
    }

    #[test]
    fn view_filtering() {
        let morning: Vec<_> = items_for_view(EntryType::Morning).map(|i| i.id).collect();
        assert!(morning.contains(&"sleep_quality"));
        assert!(morning.contains(&"sleep_score"));
        assert!(!morning.contains(&"stress_level"));

        let quick: Vec<_> = items_for_view(EntryType::Quick).map(|i| i.id).collect();
        assert!(quick.contains(&"hot_flash_intensity"));
        assert!(quick.contains(&"headache"));
    }

    #[test]
    fn ids_are_unique() {
        for (i, a) in CATALOG.iter().enumerate() {
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.id, b.id, "duplicate catalog id");
            }
        }
    }
}
