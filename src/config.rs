//! User configuration: one object per user, persisted as a singleton remote
//! file alongside the monthly tracking files.
//!
//! Every block defaults sensibly so partially-populated configurations from
//! older exports still parse; the migration chain fills structural gaps
//! before data reaches this type.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog;
use crate::entry::{EntryType, SCHEMA_VERSION};

/// Per-user configuration blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: String,
    pub user_id: String,
    #[serde(default)]
    pub onboarding: Onboarding,
    #[serde(default)]
    pub display_options: DisplayOptions,
    /// Per-view ordered item lists, keyed by view type name. Item ids not in
    /// the static catalog are tolerated but inert.
    #[serde(default)]
    pub view_configurations: BTreeMap<String, ViewConfiguration>,
    #[serde(default)]
    pub insights: InsightsSettings,
    #[serde(default)]
    pub privacy: PrivacySettings,
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub section: SectionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Onboarding {
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps_seen: Vec<String>,
}

/// How scale controls render, plus the local-time cutoffs that decide which
/// view a session defaults to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayOptions {
    #[serde(default)]
    pub display_type: DisplayType,
    /// Hour (0-23, local) after which the morning view stops being offered.
    pub morning_end_hour: u8,
    /// Hour (0-23, local) from which the evening view is offered.
    pub evening_start_hour: u8,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            display_type: DisplayType::default(),
            morning_end_hour: 11,
            evening_start_hour: 18,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayType {
    #[default]
    Emoji,
    Numeric,
    Text,
}

/// Ordered item list for one view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ViewConfiguration {
    #[serde(default)]
    pub categories: Vec<ViewCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewCategory {
    pub id: String,
    pub label: String,
    /// Tracking-item ids, in display order.
    pub items: Vec<String>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub collapsed: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightsSettings {
    pub enabled: bool,
    /// Minimum entries before heuristic pattern insights are shown.
    pub min_entries: u32,
}

impl Default for InsightsSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_entries: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacySettings {
    pub analytics_enabled: bool,
    /// When set, the engine never attempts remote writes.
    pub local_only: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            analytics_enabled: false,
            local_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub auto_lock_minutes: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SectionSettings {
    #[serde(default)]
    pub collapsed: Vec<String>,
}

impl Configuration {
    /// Fresh configuration for a new user: onboarding incomplete, default
    /// view layouts built from the static catalog.
    #[must_use]
    pub fn default_for_user(user_id: &str) -> Self {
        let mut views = BTreeMap::new();
        for view in [EntryType::Morning, EntryType::Evening, EntryType::Quick] {
            let items: Vec<String> = catalog::items_for_view(view)
                .map(|item| item.id.to_string())
                .collect();
            views.insert(
                view.to_string(),
                ViewConfiguration {
                    categories: vec![ViewCategory {
                        id: "symptoms".to_string(),
                        label: "Symptoms".to_string(),
                        items,
                        visible: true,
                        collapsed: false,
                    }],
                },
            );
        }

        Self {
            version: SCHEMA_VERSION.to_string(),
            user_id: user_id.to_string(),
            onboarding: Onboarding::default(),
            display_options: DisplayOptions::default(),
            view_configurations: views,
            insights: InsightsSettings::default(),
            privacy: PrivacySettings::default(),
            session: SessionSettings::default(),
            section: SectionSettings::default(),
        }
    }

    /// All item ids referenced across view configurations, in order.
    pub fn referenced_item_ids(&self) -> impl Iterator<Item = &str> {
        self.view_configurations
            .values()
            .flat_map(|view| view.categories.iter())
            .flat_map(|category| category.items.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_starts_unonboarded() {
        let config = Configuration::default_for_user("user-1");
        assert!(!config.onboarding.completed);
        assert_eq!(config.version, SCHEMA_VERSION);
        assert_eq!(config.user_id, "user-1");
    }

    #[test]
    fn default_views_cover_all_three_types() {
        let config = Configuration::default_for_user("user-1");
        for view in ["morning", "evening", "quick"] {
            let vc = config.view_configurations.get(view).expect(view);
            assert!(!vc.categories[0].items.is_empty());
        }
    }

    #[test]
    fn default_view_items_exist_in_catalog() {
        let config = Configuration::default_for_user("user-1");
        for id in config.referenced_item_ids() {
            assert!(catalog::item(id).is_some(), "unknown item {id}");
        }
    }

    #[test]
    fn partial_config_parses_with_defaults() {
        let raw = serde_json::json!({
            "version": "1.3.0",
            "user_id": "user-2"
        });
        let config: Configuration = serde_json::from_value(raw).unwrap();
        assert_eq!(config.display_options.morning_end_hour, 11);
        assert!(config.insights.enabled);
        assert!(config.view_configurations.is_empty());
    }
}
