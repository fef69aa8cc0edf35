use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use gearpack_core::{
    default_rules, recommend, source_counts, GearItem, Recommendation, Rule, SourceCounts, Trip,
    RULESET_VERSION,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::Date;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

pub const API_CONTRACT_VERSION: &str = "api.v1";
pub const TRIPS_FILE: &str = "trips.json";
pub const GEAR_FILE: &str = "gear.json";
pub const CATALOG_FILE: &str = "catalog.json";
pub const DEFAULT_LOG_FILTER: &str = "gearpack=info";

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
}

impl TripStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(Self::Planned),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Trip as returned by the trip-retrieval collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TripRecord {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(with = "iso_date")]
    pub start_date: Date,
    #[serde(with = "iso_date")]
    pub end_date: Date,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub expected_temp_min: Option<i32>,
    #[serde(default)]
    pub expected_temp_max: Option<i32>,
    #[serde(default)]
    pub expected_weather: Option<String>,
    #[serde(default)]
    pub status: TripStatus,
}

impl TripRecord {
    /// Inclusive day count between start and end dates.
    ///
    /// # Errors
    /// Returns an error when `end_date` precedes `start_date`.
    pub fn duration_days(&self) -> Result<u32> {
        let span = (self.end_date - self.start_date).whole_days();
        if span < 0 {
            return Err(anyhow!(
                "trip {}: end_date {} MUST NOT precede start_date {}",
                self.id,
                self.end_date,
                self.start_date
            ));
        }
        u32::try_from(span + 1).with_context(|| format!("trip {}: duration overflows", self.id))
    }

    /// The attributes the rule engine evaluates, validated.
    ///
    /// # Errors
    /// Returns an error when the dates are inverted or the derived trip fails validation.
    pub fn profile(&self) -> Result<Trip> {
        let trip = Trip {
            duration_days: self.duration_days()?,
            activities: self.activities.clone(),
            expected_temp_min: self.expected_temp_min,
            expected_temp_max: self.expected_temp_max,
            expected_weather: self.expected_weather.clone(),
        };
        trip.validate().with_context(|| format!("trip {} is not plannable", self.id))?;
        Ok(trip)
    }
}

/// Entry as returned by the gear-catalog collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "category")]
    pub category_name: Option<String>,
    #[serde(default, alias = "weight_grams")]
    pub typical_weight_grams: Option<u32>,
    #[serde(default)]
    pub popularity_score: i64,
}

impl From<CatalogEntry> for GearItem {
    fn from(entry: CatalogEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            description: entry.description,
            category: entry.category_name,
            weight_grams: entry.typical_weight_grams,
        }
    }
}

/// Catalog order as served by the collaborator: most popular first, then by name.
#[must_use]
pub fn order_catalog(mut entries: Vec<CatalogEntry>) -> Vec<GearItem> {
    entries.sort_by(|lhs, rhs| {
        rhs.popularity_score.cmp(&lhs.popularity_score).then_with(|| lhs.name.cmp(&rhs.name))
    });
    entries.into_iter().map(GearItem::from).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendRequest {
    #[serde(default)]
    pub trip_id: Option<u64>,
    #[serde(default)]
    pub trip_title: Option<String>,
    pub trip: Trip,
    #[serde(default)]
    pub owned_gear: Vec<GearItem>,
    #[serde(default)]
    pub catalog: Vec<GearItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeterminismMetadata {
    pub ruleset_version: String,
    pub snapshot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecommendationReport {
    pub trip_id: Option<u64>,
    pub trip_title: Option<String>,
    pub determinism: DeterminismMetadata,
    pub recommendations: Vec<Recommendation>,
    pub total_recommendations: usize,
    pub source_counts: SourceCounts,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    trips: Vec<TripRecord>,
    owned_gear: Vec<GearItem>,
    catalog: Vec<GearItem>,
}

#[derive(Debug, Clone)]
pub struct GearpackApi {
    snapshot_dir: PathBuf,
}

impl GearpackApi {
    #[must_use]
    pub fn new(snapshot_dir: PathBuf) -> Self {
        Self { snapshot_dir }
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> &Path {
        &self.snapshot_dir
    }

    fn load_snapshot(&self) -> Result<Snapshot> {
        let trips: Vec<TripRecord> = read_json_list(&self.snapshot_dir.join(TRIPS_FILE), true)?;
        let owned_gear: Vec<GearItem> = read_json_list(&self.snapshot_dir.join(GEAR_FILE), false)?;
        let catalog_entries: Vec<CatalogEntry> =
            read_json_list(&self.snapshot_dir.join(CATALOG_FILE), false)?;

        tracing::info!(
            snapshot_dir = %self.snapshot_dir.display(),
            trips = trips.len(),
            owned_gear = owned_gear.len(),
            catalog = catalog_entries.len(),
            "loaded gear snapshot"
        );

        Ok(Snapshot { trips, owned_gear, catalog: order_catalog(catalog_entries) })
    }

    /// List trips in the snapshot, optionally filtered by status.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be read.
    pub fn list_trips(&self, status: Option<TripStatus>) -> Result<Vec<TripRecord>> {
        let snapshot = self.load_snapshot()?;
        Ok(snapshot
            .trips
            .into_iter()
            .filter(|trip| match status {
                Some(status) => trip.status == status,
                None => true,
            })
            .collect())
    }

    /// Fetch one trip record.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be read or the trip does not exist.
    pub fn show_trip(&self, trip_id: u64) -> Result<TripRecord> {
        let snapshot = self.load_snapshot()?;
        find_trip(snapshot.trips, trip_id)
    }

    /// Build the packing checklist for a trip stored in the snapshot.
    ///
    /// # Errors
    /// Returns an error when the snapshot cannot be read, the trip does not exist,
    /// or its attributes are not plannable.
    pub fn recommend_for_trip(&self, trip_id: u64) -> Result<RecommendationReport> {
        let snapshot = self.load_snapshot()?;
        let record = find_trip(snapshot.trips, trip_id)?;
        let trip = record.profile()?;
        build_report(Some(record.id), Some(record.title), &trip, &snapshot.owned_gear, &snapshot.catalog)
    }

    /// Build the packing checklist for caller-supplied trip, gear and catalog.
    ///
    /// # Errors
    /// Returns an error when the trip fails validation.
    pub fn recommend(&self, request: RecommendRequest) -> Result<RecommendationReport> {
        request.trip.validate().context("inline trip is not plannable")?;
        build_report(
            request.trip_id,
            request.trip_title,
            &request.trip,
            &request.owned_gear,
            &request.catalog,
        )
    }

    /// The rule table every recommendation is evaluated against.
    #[must_use]
    pub fn rules() -> &'static [Rule] {
        default_rules()
    }
}

fn find_trip(trips: Vec<TripRecord>, trip_id: u64) -> Result<TripRecord> {
    trips
        .into_iter()
        .find(|trip| trip.id == trip_id)
        .ok_or_else(|| anyhow!("trip not found: {trip_id}"))
}

fn read_json_list<T>(path: &Path, required: bool) -> Result<Vec<T>>
where
    T: DeserializeOwned,
{
    if !path.exists() {
        if required {
            return Err(anyhow!("snapshot file not found: {}", path.display()));
        }
        tracing::debug!(path = %path.display(), "optional snapshot file missing, using empty list");
        return Ok(Vec::new());
    }

    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot file {}", path.display()))?;
    serde_json::from_str(&body)
        .with_context(|| format!("failed to parse snapshot file {}", path.display()))
}

fn build_report(
    trip_id: Option<u64>,
    trip_title: Option<String>,
    trip: &Trip,
    owned_gear: &[GearItem],
    catalog: &[GearItem],
) -> Result<RecommendationReport> {
    let snapshot_id = compute_snapshot_id(trip, owned_gear, catalog)?;
    let recommendations = recommend(trip, owned_gear, catalog);
    let counts = source_counts(&recommendations);

    tracing::info!(
        trip_id = ?trip_id,
        snapshot_id = %snapshot_id,
        total = recommendations.len(),
        catalog = counts.catalog,
        user = counts.user,
        suggestion = counts.suggestion,
        "built packing recommendations"
    );

    Ok(RecommendationReport {
        trip_id,
        trip_title,
        determinism: DeterminismMetadata {
            ruleset_version: RULESET_VERSION.to_string(),
            snapshot_id,
        },
        total_recommendations: recommendations.len(),
        source_counts: counts,
        recommendations,
    })
}

fn compute_snapshot_id(trip: &Trip, owned_gear: &[GearItem], catalog: &[GearItem]) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(RULESET_VERSION.as_bytes());
    for part in [
        serde_json::to_vec(trip)?,
        serde_json::to_vec(owned_gear)?,
        serde_json::to_vec(catalog)?,
    ] {
        hasher.update(&part);
        hasher.update(b"\n");
    }

    let digest = hasher.finalize();
    let digest_hex = format!("{digest:x}");
    Ok(format!("snap_{}", &digest_hex[..16]))
}

/// Install the process-wide tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `default_filter` when set. Later calls keep the first subscriber.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(true))
        .try_init()
    {
        tracing::debug!(error = %err, "tracing subscriber already installed");
    }
}
