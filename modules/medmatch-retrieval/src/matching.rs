//! Matching orchestration: candidate selection, scoring, ranking, and
//! persistence of the ranked match set.
//!
//! Doctor matching replaces the persisted ConsultationMatch set for the case
//! (delete-by-case then batch insert), so repeated runs converge on the
//! latest scoring instead of accumulating rows. The replace is not guarded
//! against concurrent runs for the same case; callers serialize per case.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use medmatch_common::types::{
    ConsultationMatch, Doctor, DoctorMatch, Facility, FacilityMatch, MatchOptions, MedicalCase,
    RoutingOptions,
};
use medmatch_common::{id, MatchError, Result};

use crate::repo::{CaseRepo, DoctorRepo, FacilityRepo, MatchRepo};
use crate::scoring::ScoreEngine;

/// Initial status of freshly persisted matches.
const MATCH_STATUS_PENDING: &str = "PENDING";

/// Orchestrates doctor and facility matching for a case.
pub struct Matcher {
    cases: Arc<dyn CaseRepo>,
    doctors: Arc<dyn DoctorRepo>,
    facilities: Arc<dyn FacilityRepo>,
    matches: Arc<dyn MatchRepo>,
    engine: ScoreEngine,
}

impl Matcher {
    pub fn new(
        cases: Arc<dyn CaseRepo>,
        doctors: Arc<dyn DoctorRepo>,
        facilities: Arc<dyn FacilityRepo>,
        matches: Arc<dyn MatchRepo>,
        engine: ScoreEngine,
    ) -> Self {
        Self {
            cases,
            doctors,
            facilities,
            matches,
            engine,
        }
    }

    /// Match doctors to a case and replace the persisted match set.
    pub async fn match_doctors_to_case(
        &self,
        case_id: &str,
        options: &MatchOptions,
    ) -> Result<Vec<DoctorMatch>> {
        let case_id = normalize_case_id(case_id)?;
        let case = self
            .cases
            .find_by_id(&case_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("medical case not found: {case_id}")))?;

        let candidates = self.find_candidate_doctors(&case, options).await?;
        debug!(case_id = %case_id, candidates = candidates.len(), "scoring candidate doctors");

        let mut scored: Vec<(Doctor, f64, String)> = Vec::new();
        for doctor in candidates {
            let result = self.engine.score(&case, &doctor).await;
            if let Some(min_score) = options.min_score {
                if result.overall_score < min_score {
                    continue;
                }
            }
            scored.push((doctor, result.overall_score, result.rationale));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(options.max_results());

        let result: Vec<DoctorMatch> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (doctor, score, rationale))| DoctorMatch {
                doctor,
                match_score: score,
                rank: i as i32 + 1,
                rationale,
            })
            .collect();

        // Replace semantics: the stored set always reflects the latest run.
        self.matches.delete_by_case_id(&case_id).await?;
        if !result.is_empty() {
            let to_save: Vec<ConsultationMatch> = result
                .iter()
                .map(|m| ConsultationMatch {
                    id: id::generate_id(),
                    case_id: case_id.clone(),
                    doctor_id: m.doctor.id.clone(),
                    match_score: m.match_score,
                    match_rationale: m.rationale.clone(),
                    rank: m.rank,
                    status: MATCH_STATUS_PENDING.to_string(),
                })
                .collect();
            self.matches.insert_batch(&to_save).await?;
        }

        info!(case_id = %case_id, matches = result.len(), "doctor matching complete");
        Ok(result)
    }

    /// Match facilities for a case. Read-only: nothing is persisted.
    pub async fn match_facilities_for_case(
        &self,
        case_id: &str,
        options: &RoutingOptions,
    ) -> Result<Vec<FacilityMatch>> {
        let case_id = normalize_case_id(case_id)?;
        let case = self
            .cases
            .find_by_id(&case_id)
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("medical case not found: {case_id}")))?;

        let candidates = self.find_candidate_facilities(options).await?;
        debug!(case_id = %case_id, candidates = candidates.len(), "scoring candidate facilities");

        let mut scored: Vec<(Facility, f64, String)> = Vec::new();
        for facility in candidates {
            let result = self.engine.route_score(&case, &facility).await;
            if let Some(min_score) = options.min_score {
                if result.overall_score < min_score {
                    continue;
                }
            }
            scored.push((facility, result.overall_score, result.rationale));
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(options.max_results());

        let result = scored
            .into_iter()
            .enumerate()
            .map(|(i, (facility, score, rationale))| FacilityMatch {
                facility,
                route_score: score,
                rank: i as i32 + 1,
                rationale,
            })
            .collect();

        Ok(result)
    }

    /// Candidate doctors: preferred specialties when given, else the case's
    /// required specialty, else a bounded slice of all doctors. Deduplicated,
    /// then post-filtered on telehealth, facility, and specialty preferences.
    async fn find_candidate_doctors(
        &self,
        case: &MedicalCase,
        options: &MatchOptions,
    ) -> Result<Vec<Doctor>> {
        let pool_limit = (options.max_results() * 2) as i64;
        let mut candidates: Vec<Doctor> = Vec::new();

        if !options.preferred_specialties.is_empty() {
            for specialty in &options.preferred_specialties {
                candidates.extend(self.doctors.find_by_specialty(specialty, pool_limit).await?);
            }
        } else if let Some(specialty) = case.required_specialty.as_deref() {
            candidates.extend(self.doctors.find_by_specialty(specialty, pool_limit).await?);
        } else {
            let ids = self.doctors.find_all_ids(pool_limit).await?;
            candidates.extend(self.doctors.find_by_ids(&ids).await?);
        }

        let mut seen: HashSet<String> = HashSet::new();
        let filtered = candidates
            .into_iter()
            .filter(|doctor| seen.insert(doctor.id.clone()))
            .filter(|doctor| !options.require_telehealth || doctor.telehealth_enabled)
            .filter(|doctor| {
                options.preferred_facility_ids.is_empty()
                    || doctor
                        .facility_ids
                        .iter()
                        .any(|fid| options.preferred_facility_ids.contains(fid))
            })
            .filter(|doctor| {
                options.preferred_specialties.is_empty()
                    || doctor.specialties.iter().any(|s| {
                        options
                            .preferred_specialties
                            .iter()
                            .any(|p| s.eq_ignore_ascii_case(p))
                    })
            })
            .collect();

        Ok(filtered)
    }

    /// Candidate facilities, filtered on preferred types and required
    /// capability supersets, bounded to twice the requested result count.
    async fn find_candidate_facilities(&self, options: &RoutingOptions) -> Result<Vec<Facility>> {
        let all = self.facilities.find_all().await?;
        let limit = (options.max_results() * 2).max(10);

        let filtered = all
            .into_iter()
            .filter(|facility| {
                options.preferred_facility_types.is_empty()
                    || facility.facility_type.as_deref().is_some_and(|ft| {
                        options
                            .preferred_facility_types
                            .iter()
                            .any(|t| t.eq_ignore_ascii_case(ft))
                    })
            })
            .filter(|facility| {
                options.required_capabilities.is_empty()
                    || options
                        .required_capabilities
                        .iter()
                        .all(|required| facility.capabilities.contains(required))
            })
            .take(limit)
            .collect();

        Ok(filtered)
    }
}

/// Case ids are compared case-insensitively; blank ids fail fast.
fn normalize_case_id(case_id: &str) -> Result<String> {
    let normalized = case_id.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(MatchError::Validation(
            "case id cannot be blank".to_string(),
        ));
    }
    Ok(normalized)
}
