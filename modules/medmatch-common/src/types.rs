//! Domain model shared across the matching core.
//!
//! These types mirror the relational store one-to-one. Everything here is
//! plain data: scoring and persistence live in the `medmatch-graph` and
//! `medmatch-retrieval` crates.

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Case urgency, ordered CRITICAL > HIGH > MEDIUM > LOW.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl UrgencyLevel {
    /// Parse the store's text representation. Unknown values map to None.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Self::Critical),
            "HIGH" => Some(Self::High),
            "MEDIUM" => Some(Self::Medium),
            "LOW" => Some(Self::Low),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseType {
    Inpatient,
    SecondOpinion,
    ConsultRequest,
}

impl CaseType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "INPATIENT" => Some(Self::Inpatient),
            "SECOND_OPINION" => Some(Self::SecondOpinion),
            "CONSULT_REQUEST" => Some(Self::ConsultRequest),
            _ => None,
        }
    }
}

/// A medical case awaiting expert matching.
///
/// `id` is a 24-char hex string compared case-insensitively; lookups
/// normalize to lowercase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalCase {
    pub id: String,
    pub patient_age: Option<i32>,
    pub chief_complaint: Option<String>,
    pub symptoms: Option<String>,
    pub current_diagnosis: Option<String>,
    pub icd10_codes: Vec<String>,
    pub snomed_codes: Vec<String>,
    pub urgency_level: Option<UrgencyLevel>,
    pub required_specialty: Option<String>,
    pub case_type: Option<CaseType>,
    pub additional_notes: Option<String>,
    /// LLM-generated case abstract; the stored embedding is computed from it.
    pub abstract_text: Option<String>,
}

/// A doctor as read from the store. Read-only in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialties: Vec<String>,
    pub certifications: Vec<String>,
    pub facility_ids: Vec<String>,
    pub telehealth_enabled: bool,
    pub availability_status: Option<String>,
}

/// A care facility as read from the store. Read-only in this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: String,
    pub name: Option<String>,
    pub facility_type: Option<String>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub location_country: Option<String>,
    pub location_latitude: Option<f64>,
    pub location_longitude: Option<f64>,
    pub capabilities: Vec<String>,
    pub capacity: Option<i32>,
    pub current_occupancy: Option<i32>,
}

/// Evidence linking a doctor to a case they treated or consulted on.
/// Aggregate input to historical scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalExperience {
    pub id: String,
    pub doctor_id: String,
    pub case_id: String,
    pub procedures_performed: Vec<String>,
    pub complexity_level: Option<String>,
    /// SUCCESS, IMPROVED, STABLE, COMPLICATED, ... (free text in the store).
    pub outcome: Option<String>,
    pub complications: Vec<String>,
    pub time_to_resolution: Option<i32>,
    /// 1-5 when rated.
    pub rating: Option<i32>,
}

/// Doctor/case match score. Sub-scores are unscaled [0,1]; overall is 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub overall_score: f64,
    pub vector_score: f64,
    pub graph_score: f64,
    pub historical_score: f64,
    pub rationale: String,
}

/// Facility/case routing score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteScoreResult {
    pub overall_score: f64,
    pub complexity_match_score: f64,
    pub historical_outcomes_score: f64,
    pub capacity_score: f64,
    pub geographic_score: f64,
    pub rationale: String,
}

/// Case-only priority score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    pub overall_score: f64,
    pub urgency_score: f64,
    pub complexity_score: f64,
    pub availability_score: f64,
    pub rationale: String,
}

/// Persisted, rank-ordered record of one scored doctor against one case.
/// The whole set for a case is replaced on every matching run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationMatch {
    pub id: String,
    pub case_id: String,
    pub doctor_id: String,
    pub match_score: f64,
    pub match_rationale: String,
    pub rank: i32,
    pub status: String,
}

/// One ranked doctor in a matching response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorMatch {
    pub doctor: Doctor,
    pub match_score: f64,
    pub rank: i32,
    pub rationale: String,
}

/// One ranked facility in a routing response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityMatch {
    pub facility: Facility,
    pub route_score: f64,
    pub rank: i32,
    pub rationale: String,
}

const DEFAULT_MATCH_RESULTS: usize = 10;
const DEFAULT_ROUTE_RESULTS: usize = 5;

/// Options for doctor-case matching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct MatchOptions {
    /// Maximum number of matches to return; 0 means the default of 10.
    #[builder(default = DEFAULT_MATCH_RESULTS)]
    pub max_results: usize,

    /// Minimum overall score threshold (0-100).
    #[builder(default)]
    pub min_score: Option<f64>,

    #[builder(default)]
    pub preferred_specialties: Vec<String>,

    #[builder(default)]
    pub require_telehealth: bool,

    #[builder(default)]
    pub preferred_facility_ids: Vec<String>,
}

impl MatchOptions {
    pub fn max_results(&self) -> usize {
        if self.max_results == 0 {
            DEFAULT_MATCH_RESULTS
        } else {
            self.max_results
        }
    }
}

/// Options for facility-case routing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TypedBuilder)]
pub struct RoutingOptions {
    /// Maximum number of facility matches to return; 0 means the default of 5.
    #[builder(default = DEFAULT_ROUTE_RESULTS)]
    pub max_results: usize,

    /// Minimum route score threshold (0-100).
    #[builder(default)]
    pub min_score: Option<f64>,

    /// Preferred facility types (e.g. "ACADEMIC", "SPECIALTY_CENTER").
    #[builder(default)]
    pub preferred_facility_types: Vec<String>,

    /// Required capabilities (e.g. "ICU", "SURGERY").
    #[builder(default)]
    pub required_capabilities: Vec<String>,

    /// Accepted but not applied: geographic filtering needs case coordinates.
    #[builder(default)]
    pub max_distance_km: Option<f64>,
}

impl RoutingOptions {
    pub fn max_results(&self) -> usize {
        if self.max_results == 0 {
            DEFAULT_ROUTE_RESULTS
        } else {
            self.max_results
        }
    }
}
