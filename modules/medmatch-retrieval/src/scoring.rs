//! Multi-signal scoring: vector similarity, graph relationships, and
//! historical performance combined into 0-100 match scores.
//!
//! The three signal families fail independently. A sub-score that cannot be
//! computed falls back to a constant (0.1 for "no signal", 0.0 for "failed"
//! or "graph absent") and the combination always proceeds with whatever was
//! obtainable. The numeric value alone does not distinguish "confirmed
//! negative" from "data unavailable"; only the rationale text does.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, warn};

use medmatch_common::types::{
    ClinicalExperience, Doctor, Facility, MedicalCase, PriorityScore, RouteScoreResult,
    ScoreResult, UrgencyLevel,
};
use medmatch_graph::GraphSignal;

use crate::repo::{CaseRepo, DoctorRepo, ExperienceRepo};

const VECTOR_WEIGHT: f64 = 0.4;
const GRAPH_WEIGHT: f64 = 0.3;
const HISTORICAL_WEIGHT: f64 = 0.3;

/// Sub-score returned when a signal has no data to work with (no embedding,
/// no experiences). Distinct from the 0.0 returned on hard failure.
const NO_SIGNAL_SCORE: f64 = 0.1;

/// Bounded lookup of affiliated doctors per facility.
const FACILITY_DOCTOR_LIMIT: i64 = 500;

/// Combines vector, graph, and historical signals into match scores.
pub struct ScoreEngine {
    cases: Arc<dyn CaseRepo>,
    doctors: Arc<dyn DoctorRepo>,
    experiences: Arc<dyn ExperienceRepo>,
    graph: Arc<dyn GraphSignal>,
}

impl ScoreEngine {
    pub fn new(
        cases: Arc<dyn CaseRepo>,
        doctors: Arc<dyn DoctorRepo>,
        experiences: Arc<dyn ExperienceRepo>,
        graph: Arc<dyn GraphSignal>,
    ) -> Self {
        Self {
            cases,
            doctors,
            experiences,
            graph,
        }
    }

    /// Score one doctor against one case.
    pub async fn score(&self, case: &MedicalCase, doctor: &Doctor) -> ScoreResult {
        let vector_score = self.vector_similarity_score(case, doctor).await;
        let graph_score = self.graph_relationship_score(case, doctor).await;
        let historical_score = self.historical_performance_score(doctor).await;

        let overall_score = 100.0
            * (vector_score * VECTOR_WEIGHT
                + graph_score * GRAPH_WEIGHT
                + historical_score * HISTORICAL_WEIGHT);

        let rationale = format!(
            "Vector similarity: {vector_score:.2}, Graph relationships: {graph_score:.2}, Historical performance: {historical_score:.2}"
        );

        debug!(
            case_id = %case.id,
            doctor_id = %doctor.id,
            overall_score,
            "semantic graph retrieval scoring complete"
        );

        ScoreResult {
            overall_score,
            vector_score,
            graph_score,
            historical_score,
            rationale,
        }
    }

    /// Score one facility as a routing target for a case.
    pub async fn route_score(&self, case: &MedicalCase, facility: &Facility) -> RouteScoreResult {
        let complexity_match_score = complexity_match(case, facility);
        let historical_outcomes_score = self.facility_outcomes_score(facility).await;
        let capacity_score = capacity_score(facility);
        // Placeholder until case/facility coordinates are wired through.
        let geographic_score = 0.5;

        let overall_score = 100.0
            * (complexity_match_score * 0.3
                + historical_outcomes_score * 0.3
                + capacity_score * 0.2
                + geographic_score * 0.2);

        let rationale = format!(
            "Complexity match: {complexity_match_score:.2}, Historical outcomes: {historical_outcomes_score:.2}, Capacity: {capacity_score:.2}, Geographic: {geographic_score:.2}"
        );

        RouteScoreResult {
            overall_score,
            complexity_match_score,
            historical_outcomes_score,
            capacity_score,
            geographic_score,
            rationale,
        }
    }

    /// Case-only priority score, independent of any candidate.
    pub fn priority_score(&self, case: &MedicalCase) -> PriorityScore {
        let urgency_score = urgency_score(case.urgency_level);
        // Urgency doubles as the complexity proxy until a dedicated
        // complexity signal exists.
        let complexity_score = urgency_score;
        let availability_score = 0.5;

        let overall_score =
            100.0 * (urgency_score * 0.5 + complexity_score * 0.3 + availability_score * 0.2);

        let rationale = format!(
            "Urgency: {urgency_score:.2}, Complexity: {complexity_score:.2}, Availability: {availability_score:.2}"
        );

        PriorityScore {
            overall_score,
            urgency_score,
            complexity_score,
            availability_score,
            rationale,
        }
    }

    /// Cosine similarity between the case embedding and the embeddings of
    /// cases the doctor has experience with. 0.1 when either side has no
    /// data; 0.0 on hard error.
    async fn vector_similarity_score(&self, case: &MedicalCase, doctor: &Doctor) -> f64 {
        let result = async {
            if !self.cases.has_embedding(&case.id).await? {
                debug!(case_id = %case.id, "case has no embedding, returning low vector score");
                return Ok(NO_SIGNAL_SCORE);
            }

            let experiences = self.experiences.find_by_doctor_id(&doctor.id).await?;
            if experiences.is_empty() {
                debug!(doctor_id = %doctor.id, "doctor has no clinical experiences, returning low vector score");
                return Ok(NO_SIGNAL_SCORE);
            }

            let mut case_ids: Vec<String> =
                experiences.into_iter().map(|e| e.case_id).collect();
            case_ids.sort();
            case_ids.dedup();

            let similarity = self.cases.vector_similarity(&case.id, &case_ids).await?;
            let Some(similarity) = similarity.filter(|s| !s.is_nan()) else {
                warn!(
                    case_id = %case.id,
                    doctor_id = %doctor.id,
                    "could not calculate vector similarity: invalid result"
                );
                return Ok(NO_SIGNAL_SCORE);
            };

            Ok::<f64, medmatch_common::MatchError>(similarity.clamp(0.0, 1.0))
        }
        .await;

        match result {
            Ok(score) => score,
            Err(e) => {
                error!(case_id = %case.id, doctor_id = %doctor.id, error = %e, "vector similarity score failed");
                0.0
            }
        }
    }

    /// Weighted combination of the four graph sub-scores; 0.0 when the graph
    /// does not exist.
    async fn graph_relationship_score(&self, case: &MedicalCase, doctor: &Doctor) -> f64 {
        if !self.graph.graph_exists().await {
            warn!("graph does not exist, returning zero graph score");
            return 0.0;
        }

        let direct = self
            .graph
            .direct_relationship_score(&doctor.id, &case.id)
            .await;
        let expertise = self
            .graph
            .condition_expertise_score(&doctor.id, &case.icd10_codes)
            .await;
        let specialization = self
            .graph
            .specialization_match_score(&doctor.id, case.required_specialty.as_deref())
            .await;
        let similar = self
            .graph
            .similar_cases_score(&doctor.id, &case.icd10_codes)
            .await;

        let combined = combine_graph_scores(direct, expertise, specialization, similar);
        debug!(
            direct,
            expertise, specialization, similar, combined, "graph relationship scores calculated"
        );
        combined
    }

    /// Rating/outcome aggregate over the doctor's clinical experiences.
    async fn historical_performance_score(&self, doctor: &Doctor) -> f64 {
        match self.experiences.find_by_doctor_id(&doctor.id).await {
            Ok(experiences) if experiences.is_empty() => {
                debug!(doctor_id = %doctor.id, "doctor has no clinical experiences, returning low historical score");
                NO_SIGNAL_SCORE
            }
            Ok(experiences) => historical_performance(&experiences),
            Err(e) => {
                error!(doctor_id = %doctor.id, error = %e, "historical performance score failed");
                0.0
            }
        }
    }

    /// Same aggregate over all experiences of the facility's affiliated
    /// doctors; neutral 0.5 when nothing is known.
    async fn facility_outcomes_score(&self, facility: &Facility) -> f64 {
        let result = async {
            let doctor_ids = self
                .doctors
                .find_ids_by_facility_id(&facility.id, FACILITY_DOCTOR_LIMIT)
                .await?;
            if doctor_ids.is_empty() {
                return Ok(0.5);
            }

            let by_doctor: HashMap<String, Vec<ClinicalExperience>> =
                self.experiences.find_by_doctor_ids(&doctor_ids).await?;
            let all: Vec<ClinicalExperience> =
                by_doctor.into_values().flatten().collect();
            if all.is_empty() {
                return Ok(0.5);
            }

            Ok::<f64, medmatch_common::MatchError>(historical_performance(&all))
        }
        .await;

        match result {
            Ok(score) => score,
            Err(e) => {
                error!(facility_id = %facility.id, error = %e, "facility outcomes score failed");
                0.5
            }
        }
    }
}

/// Weighted graph sub-score combination: direct relationships dominate,
/// expertise and specialization split the middle, similar cases add a tail
/// signal. Clamped to [0,1].
pub(crate) fn combine_graph_scores(
    direct: f64,
    expertise: f64,
    specialization: f64,
    similar: f64,
) -> f64 {
    (direct * 0.4 + expertise * 0.25 + specialization * 0.25 + similar * 0.1).clamp(0.0, 1.0)
}

/// Rating/outcome aggregate: normalized average rating (1-5 scale mapped to
/// [0,1], defaulting to the 2.5 midpoint when nothing is rated) weighted 60%,
/// SUCCESS/IMPROVED outcome rate weighted 40%.
pub(crate) fn historical_performance(experiences: &[ClinicalExperience]) -> f64 {
    if experiences.is_empty() {
        return 0.0;
    }

    let mut total_rating = 0.0;
    let mut rating_count = 0usize;
    let mut success_count = 0usize;

    for experience in experiences {
        if let Some(rating) = experience.rating {
            total_rating += rating as f64;
            rating_count += 1;
        }
        if experience
            .outcome
            .as_deref()
            .map(is_successful_outcome)
            .unwrap_or(false)
        {
            success_count += 1;
        }
    }

    let avg_rating = if rating_count > 0 {
        total_rating / rating_count as f64
    } else {
        2.5
    };
    let success_rate = success_count as f64 / experiences.len() as f64;
    let normalized_rating = (avg_rating - 1.0) / 4.0;

    (normalized_rating * 0.6 + success_rate * 0.4).clamp(0.0, 1.0)
}

fn is_successful_outcome(outcome: &str) -> bool {
    outcome.eq_ignore_ascii_case("SUCCESS") || outcome.eq_ignore_ascii_case("IMPROVED")
}

/// 1.0 if any facility capability appears in the case's required specialty
/// (case-insensitive substring); neutral 0.5 otherwise, including when
/// either side is absent.
pub(crate) fn complexity_match(case: &MedicalCase, facility: &Facility) -> f64 {
    let Some(specialty) = case.required_specialty.as_deref() else {
        return 0.5;
    };
    if facility.capabilities.is_empty() {
        return 0.5;
    }

    let specialty = specialty.to_lowercase();
    let matched = facility
        .capabilities
        .iter()
        .any(|capability| specialty.contains(&capability.to_lowercase()));

    if matched {
        1.0
    } else {
        0.5
    }
}

/// Free-capacity fraction: 1 - occupancy/capacity. Unknown occupancy reads
/// as fully available; unknown or zero capacity is neutral.
pub(crate) fn capacity_score(facility: &Facility) -> f64 {
    let Some(capacity) = facility.capacity.filter(|c| *c > 0) else {
        return 0.5;
    };
    let Some(occupancy) = facility.current_occupancy else {
        return 1.0;
    };
    1.0 - occupancy as f64 / capacity as f64
}

/// Urgency to [0,1]: CRITICAL 1.0, HIGH 0.75, MEDIUM 0.5, LOW 0.25, and a
/// neutral 0.5 when the case carries no urgency.
pub(crate) fn urgency_score(urgency: Option<UrgencyLevel>) -> f64 {
    match urgency {
        Some(UrgencyLevel::Critical) => 1.0,
        Some(UrgencyLevel::High) => 0.75,
        Some(UrgencyLevel::Medium) => 0.5,
        Some(UrgencyLevel::Low) => 0.25,
        None => 0.5,
    }
}
