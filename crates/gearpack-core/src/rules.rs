//! Static packing rules.
//!
//! Each rule is plain data: a category, representative item names, a quantity
//! policy and a condition tree. Evaluation lives on the policy types so the
//! table itself carries no closures.

use serde::Serialize;

use crate::Trip;

pub const RULESET_VERSION: &str = "gear-rules.v1";

/// How many items of a category a trip calls for.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(tag = "policy", content = "value", rename_all = "snake_case")]
pub enum QuantityPolicy {
    Fixed(u32),
    PerDay,
    PerDayPlusOne,
    HalfDaysRoundedUp,
}

impl QuantityPolicy {
    /// Raw quantity for `trip`. May be zero; the evaluator clamps it.
    #[must_use]
    pub fn quantity_for(self, trip: &Trip) -> u32 {
        match self {
            Self::Fixed(count) => count,
            Self::PerDay => trip.duration_days,
            Self::PerDayPlusOne => trip.duration_days.saturating_add(1),
            Self::HalfDaysRoundedUp => trip.duration_days.div_ceil(2),
        }
    }
}

/// Applicability predicate over trip attributes.
///
/// Temperature and weather tests are false when the trip leaves the field unset.
#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum Condition {
    Always,
    HasAnyActivity(&'static [&'static str]),
    DurationAbove(u32),
    TempMaxBelow(i32),
    TempMaxAbove(i32),
    TempMinBelow(i32),
    WeatherEquals(&'static str),
    Not(&'static Condition),
    All(&'static [Condition]),
    Any(&'static [Condition]),
}

impl Condition {
    #[must_use]
    pub fn holds(&self, trip: &Trip) -> bool {
        match self {
            Self::Always => true,
            Self::HasAnyActivity(activities) => {
                activities.iter().any(|activity| trip.has_activity(activity))
            }
            Self::DurationAbove(days) => trip.duration_days > *days,
            Self::TempMaxBelow(limit) => trip.expected_temp_max.is_some_and(|max| max < *limit),
            Self::TempMaxAbove(limit) => trip.expected_temp_max.is_some_and(|max| max > *limit),
            Self::TempMinBelow(limit) => trip.expected_temp_min.is_some_and(|min| min < *limit),
            Self::WeatherEquals(weather) => trip.expected_weather.as_deref() == Some(*weather),
            Self::Not(inner) => !inner.holds(trip),
            Self::All(conditions) => conditions.iter().all(|condition| condition.holds(trip)),
            Self::Any(conditions) => conditions.iter().any(|condition| condition.holds(trip)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Eq, PartialEq)]
pub struct Rule {
    pub category: &'static str,
    /// Representative item names. Documentation only; never emitted.
    pub items: &'static [&'static str],
    pub quantity: QuantityPolicy,
    pub condition: Condition,
}

impl Rule {
    #[must_use]
    pub const fn new(category: &'static str, items: &'static [&'static str]) -> Self {
        Self { category, items, quantity: QuantityPolicy::Fixed(1), condition: Condition::Always }
    }

    #[must_use]
    pub const fn with_quantity(self, quantity: QuantityPolicy) -> Self {
        Self { quantity, ..self }
    }

    #[must_use]
    pub const fn when(self, condition: Condition) -> Self {
        Self { condition, ..self }
    }
}

const OVERNIGHT: Condition = Condition::DurationAbove(1);
const SNOWY: Condition = Condition::WeatherEquals("Snowy");

static DEFAULT_RULES: [Rule; 28] = [
    // clothing scaled by duration
    Rule::new("Clothing - Base Layer", &["Base layer top", "Base layer bottom"])
        .with_quantity(QuantityPolicy::HalfDaysRoundedUp),
    Rule::new("Clothing - Lower Body", &["Hiking pants", "Underwear"])
        .with_quantity(QuantityPolicy::PerDay),
    Rule::new("Accessories", &["Socks"]).with_quantity(QuantityPolicy::PerDayPlusOne),
    // activity gated
    Rule::new("Footwear", &["Hiking boots", "Trail running shoes"]).when(
        Condition::HasAnyActivity(&["Hiking", "Backpacking", "Trail Running"]),
    ),
    Rule::new("Trekking", &["Trekking poles"])
        .when(Condition::HasAnyActivity(&["Hiking", "Backpacking", "Mountaineering"])),
    Rule::new("Climbing Gear", &["Climbing harness", "Climbing helmet", "Carabiners"])
        .when(Condition::HasAnyActivity(&["Rock Climbing", "Mountaineering"])),
    Rule::new("Water Sports", &["Life jacket", "Paddle", "Dry bag"])
        .when(Condition::HasAnyActivity(&["Kayaking", "Canoeing", "Rafting"])),
    Rule::new("Winter Sports", &["Crampons", "Ice axe", "Insulated jacket"]).when(Condition::Any(
        &[
            Condition::HasAnyActivity(&["Snowshoeing", "Winter Camping", "Mountaineering"]),
            Condition::TempMaxBelow(5),
        ],
    )),
    Rule::new("Fishing", &["Fishing rod", "Fishing tackle", "Fishing license"])
        .when(Condition::HasAnyActivity(&["Fishing"])),
    Rule::new("Biking", &["Bike helmet", "Bike repair kit"])
        .when(Condition::HasAnyActivity(&["Mountain Biking", "Bikepacking"])),
    // overnight
    Rule::new("Shelter", &["Tent", "Sleeping bag", "Sleeping pad"]).when(Condition::Any(&[
        OVERNIGHT,
        Condition::HasAnyActivity(&["Camping", "Backpacking", "Wild Camping"]),
    ])),
    Rule::new("Cooking", &["Camping stove", "Fuel", "Pot", "Utensils"]).when(Condition::Any(&[
        OVERNIGHT,
        Condition::HasAnyActivity(&["Camping", "Backpacking"]),
    ])),
    Rule::new("Food Storage", &["Food storage bag", "Bear canister"]).when(OVERNIGHT),
    // weather
    Rule::new("Sun Protection", &["Sunscreen", "Sunglasses", "Sun hat"]).when(Condition::Any(&[
        Condition::WeatherEquals("Sunny"),
        Condition::TempMaxAbove(25),
    ])),
    Rule::new("Clothing - Outer Layer", &["Rain jacket", "Rain pants"])
        .when(Condition::Any(&[Condition::WeatherEquals("Rainy"), SNOWY])),
    Rule::new("Clothing - Insulation", &["Down jacket", "Fleece jacket"])
        .when(Condition::Any(&[SNOWY, Condition::TempMinBelow(10)])),
    Rule::new("Handwear", &["Gloves", "Mittens"])
        .when(Condition::Any(&[SNOWY, Condition::TempMinBelow(5)])),
    Rule::new("Headwear", &["Warm beanie"]).when(Condition::TempMinBelow(10)),
    // essentials
    Rule::new("Hydration", &["Water bottle", "Hydration bladder"]),
    Rule::new("Water Treatment", &["Water filter", "Water purification tablets"]).when(OVERNIGHT),
    Rule::new("Navigation", &["Map", "Compass", "GPS device"]),
    Rule::new("Lighting", &["Headlamp", "Extra batteries"]),
    Rule::new("First Aid", &["First aid kit"]),
    Rule::new("Emergency", &["Emergency whistle", "Emergency blanket"]),
    Rule::new("Fire", &["Lighter", "Matches", "Fire starter"])
        .when(Condition::HasAnyActivity(&["Camping", "Backpacking", "Wild Camping"])),
    Rule::new(
        "Hygiene",
        &["Toilet paper", "Hand sanitizer", "Toothbrush", "Biodegradable soap"],
    )
    .when(OVERNIGHT),
    Rule::new("Insect Protection", &["Insect repellent"])
        .when(Condition::All(&[Condition::TempMaxAbove(15), Condition::Not(&SNOWY)])),
    Rule::new("Tools", &["Multi-tool", "Knife"]),
];

/// The built-in rule table, in evaluation order.
#[must_use]
pub fn default_rules() -> &'static [Rule] {
    &DEFAULT_RULES
}
