use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

mod rules;

pub use rules::{default_rules, Condition, QuantityPolicy, Rule, RULESET_VERSION};

/// Bucket label for gear records that carry no category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Catalog-backed recommendations never suggest more than this many items.
pub const CATALOG_SUGGESTION_LIMIT: usize = 2;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum PlanError {
    #[error("validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank; lower ranks are listed first.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 0,
            Self::Medium => 1,
            Self::Low => 2,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Display label used by checklist screens.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::High => "Essential",
            Self::Medium => "Recommended",
            Self::Low => "Optional",
        }
    }

    /// Hex accent color used by checklist screens.
    #[must_use]
    pub fn color(self) -> &'static str {
        match self {
            Self::High => "#dc2626",
            Self::Medium => "#f59e0b",
            Self::Low => "#10b981",
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a recommendation's suggestions came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Catalog,
    User,
    Suggestion,
}

impl RecommendationSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::User => "user",
            Self::Suggestion => "suggestion",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "catalog" => Some(Self::Catalog),
            "user" => Some(Self::User),
            "suggestion" => Some(Self::Suggestion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ItemSource {
    Catalog,
    User,
}

/// Trip attributes the rule table reads.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Trip {
    pub duration_days: u32,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub expected_temp_min: Option<i32>,
    #[serde(default)]
    pub expected_temp_max: Option<i32>,
    #[serde(default)]
    pub expected_weather: Option<String>,
}

impl Trip {
    /// Exact, case-sensitive activity membership.
    #[must_use]
    pub fn has_activity(&self, activity: &str) -> bool {
        self.activities.iter().any(|candidate| candidate == activity)
    }

    /// Check a trip snapshot before it is handed to the evaluator.
    ///
    /// The evaluator never calls this and tolerates invalid trips; this is for
    /// callers that want to reject bad input at their boundary.
    ///
    /// # Errors
    /// Returns [`PlanError::Validation`] when the duration is zero, the
    /// temperature range is inverted, or an activity name is blank.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.duration_days == 0 {
            return Err(PlanError::Validation("duration_days MUST be >= 1".to_string()));
        }

        if let (Some(min), Some(max)) = (self.expected_temp_min, self.expected_temp_max) {
            if min > max {
                return Err(PlanError::Validation(format!(
                    "expected_temp_min ({min}) MUST NOT exceed expected_temp_max ({max})"
                )));
            }
        }

        if self.activities.iter().any(|activity| activity.trim().is_empty()) {
            return Err(PlanError::Validation("activity names MUST be non-empty".to_string()));
        }

        Ok(())
    }
}

/// One owned or catalog gear record.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct GearItem {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "category_name")]
    pub category: Option<String>,
    #[serde(default, alias = "typical_weight_grams")]
    pub weight_grams: Option<u32>,
}

impl GearItem {
    #[must_use]
    pub fn category_name(&self) -> &str {
        self.category.as_deref().filter(|name| !name.is_empty()).unwrap_or(UNCATEGORIZED)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct SuggestedItem {
    pub id: u64,
    pub name: String,
    pub description: String,
    pub weight: Option<u32>,
    pub source: ItemSource,
}

impl SuggestedItem {
    #[must_use]
    pub fn from_gear(item: &GearItem, source: ItemSource) -> Self {
        Self {
            id: item.id,
            name: item.name.clone(),
            description: item.description.clone(),
            weight: item.weight_grams,
            source,
        }
    }

    /// Payload for the create-gear collaborator when a user adopts this suggestion.
    #[must_use]
    pub fn to_gear_draft(&self, category: &str) -> GearDraft {
        GearDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            category: category.to_string(),
            weight_grams: self.weight,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct GearDraft {
    pub name: String,
    pub description: String,
    pub category: String,
    pub weight_grams: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Recommendation {
    pub category: String,
    pub suggested_items: Vec<SuggestedItem>,
    pub reason: String,
    pub quantity: u32,
    pub priority: Priority,
    pub source: RecommendationSource,
}

/// Owned gear grouped by category name, items kept in input order.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex<'a> {
    buckets: BTreeMap<&'a str, Vec<&'a GearItem>>,
}

impl<'a> CategoryIndex<'a> {
    #[must_use]
    pub fn build(items: &'a [GearItem]) -> Self {
        let mut buckets: BTreeMap<&'a str, Vec<&'a GearItem>> = BTreeMap::new();
        for item in items {
            buckets.entry(item.category_name()).or_default().push(item);
        }
        Self { buckets }
    }

    /// Owned items in `category`, matched by exact string equality.
    #[must_use]
    pub fn owned(&self, category: &str) -> &[&'a GearItem] {
        self.buckets.get(category).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.buckets.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct PriorityGroups {
    pub high: Vec<Recommendation>,
    pub medium: Vec<Recommendation>,
    pub low: Vec<Recommendation>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct SourceCounts {
    pub catalog: usize,
    pub user: usize,
    pub suggestion: usize,
}

/// Evaluate the built-in rule table for one trip.
#[must_use]
pub fn recommend(trip: &Trip, owned: &[GearItem], catalog: &[GearItem]) -> Vec<Recommendation> {
    recommend_with_rules(default_rules(), trip, owned, catalog)
}

/// Evaluate `rules` in order and return recommendations sorted by priority.
///
/// Pure: the inputs are only read, and identical inputs give identical output.
#[must_use]
pub fn recommend_with_rules(
    rules: &[Rule],
    trip: &Trip,
    owned: &[GearItem],
    catalog: &[GearItem],
) -> Vec<Recommendation> {
    let index = CategoryIndex::build(owned);
    let mut recommendations = rules
        .iter()
        .filter_map(|rule| evaluate_rule(rule, trip, &index, catalog))
        .collect::<Vec<_>>();
    sort_by_priority(&mut recommendations);

    tracing::debug!(
        rules = rules.len(),
        owned_categories = index.len(),
        catalog_items = catalog.len(),
        emitted = recommendations.len(),
        "evaluated packing rules"
    );

    recommendations
}

fn evaluate_rule(
    rule: &Rule,
    trip: &Trip,
    index: &CategoryIndex<'_>,
    catalog: &[GearItem],
) -> Option<Recommendation> {
    if !rule.condition.holds(trip) {
        return None;
    }

    let quantity = rule.quantity.quantity_for(trip).max(1);
    let owned = index.owned(rule.category);

    if owned.is_empty() {
        let suggested_items = catalog
            .iter()
            .filter(|item| item.category.as_deref() == Some(rule.category))
            .take(CATALOG_SUGGESTION_LIMIT)
            .map(|item| SuggestedItem::from_gear(item, ItemSource::Catalog))
            .collect::<Vec<_>>();
        let source = if suggested_items.is_empty() {
            RecommendationSource::Suggestion
        } else {
            RecommendationSource::Catalog
        };

        return Some(Recommendation {
            category: rule.category.to_string(),
            suggested_items,
            reason: derive_reason(rule.category, trip, quantity),
            quantity,
            priority: derive_priority(rule.category, trip),
            source,
        });
    }

    let owned_count = u32::try_from(owned.len()).unwrap_or(u32::MAX);
    if quantity <= owned_count {
        return None;
    }

    Some(Recommendation {
        category: rule.category.to_string(),
        suggested_items: owned
            .iter()
            .map(|item| SuggestedItem::from_gear(item, ItemSource::User))
            .collect(),
        reason: format!("Consider adding {} more items", quantity - owned_count),
        quantity,
        priority: Priority::Low,
        source: RecommendationSource::User,
    })
}

/// Human-readable reason for a category, first match wins.
#[must_use]
pub fn derive_reason(category: &str, trip: &Trip, quantity: u32) -> String {
    let reason = match category {
        "Climbing Gear" => "Essential for climbing activities",
        "Water Sports" => "Required for water activities",
        "Winter Sports" => "Needed for cold weather or winter activities",
        "Fishing" => "Required for fishing",
        "Biking" => "Essential for biking safety",
        "Sun Protection" => "Recommended for sunny weather",
        "Clothing - Outer Layer" if trip.expected_weather.as_deref() == Some("Rainy") => {
            "Rain protection needed"
        }
        "Clothing - Insulation" => "Warmth needed for cold temperatures",
        "Shelter" | "Cooking" => "Required for overnight trips",
        "Hygiene" => "Essential for multi-day trips",
        "Accessories" | "Clothing - Lower Body" => {
            return format!("Recommended: {quantity} for {}-day trip", trip.duration_days);
        }
        _ => "Recommended for your trip",
    };
    reason.to_string()
}

/// Priority classification for a category, independent of the reason table.
#[must_use]
pub fn derive_priority(category: &str, trip: &Trip) -> Priority {
    match category {
        "First Aid" | "Emergency" | "Navigation" | "Lighting" | "Climbing Gear"
        | "Water Sports" | "Winter Sports" | "Shelter" => Priority::High,
        "Clothing - Insulation" if trip.expected_temp_min.is_some_and(|min| min < 5) => {
            Priority::High
        }
        "Hygiene" | "Cooking" | "Hydration" | "Water Treatment" => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Stable sort by priority rank; equal priorities keep rule-table order.
pub fn sort_by_priority(recommendations: &mut [Recommendation]) {
    recommendations.sort_by_key(|recommendation| recommendation.priority.rank());
}

#[must_use]
pub fn group_by_priority(recommendations: &[Recommendation]) -> PriorityGroups {
    let mut groups = PriorityGroups::default();
    for recommendation in recommendations {
        let bucket = match recommendation.priority {
            Priority::High => &mut groups.high,
            Priority::Medium => &mut groups.medium,
            Priority::Low => &mut groups.low,
        };
        bucket.push(recommendation.clone());
    }
    groups
}

#[must_use]
pub fn source_counts(recommendations: &[Recommendation]) -> SourceCounts {
    let mut counts = SourceCounts::default();
    for recommendation in recommendations {
        match recommendation.source {
            RecommendationSource::Catalog => counts.catalog += 1,
            RecommendationSource::User => counts.user += 1,
            RecommendationSource::Suggestion => counts.suggestion += 1,
        }
    }
    counts
}
