//! Orchestrator and scoring-engine tests against in-memory mock
//! repositories. No database or graph backend required: the graph signal is
//! mocked at the trait seam, which is exactly how a down backend presents.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use medmatch_common::types::{
    ClinicalExperience, ConsultationMatch, Doctor, Facility, MatchOptions, MedicalCase,
    RoutingOptions, UrgencyLevel,
};
use medmatch_common::Result;
use medmatch_graph::GraphSignal;
use medmatch_retrieval::repo::{CaseRepo, DoctorRepo, ExperienceRepo, FacilityRepo, MatchRepo};
use medmatch_retrieval::{Matcher, ScoreEngine};

// --- mocks ---

#[derive(Default)]
struct MockCaseRepo {
    cases: Vec<MedicalCase>,
    with_embedding: HashSet<String>,
    similarity: Option<f64>,
}

#[async_trait]
impl CaseRepo for MockCaseRepo {
    async fn find_by_id(&self, case_id: &str) -> Result<Option<MedicalCase>> {
        Ok(self.cases.iter().find(|c| c.id == case_id).cloned())
    }

    async fn has_embedding(&self, case_id: &str) -> Result<bool> {
        Ok(self.with_embedding.contains(case_id))
    }

    async fn vector_similarity(
        &self,
        _query_case_id: &str,
        _doctor_case_ids: &[String],
    ) -> Result<Option<f64>> {
        Ok(self.similarity)
    }
}

#[derive(Default)]
struct MockDoctorRepo {
    doctors: Vec<Doctor>,
}

#[async_trait]
impl DoctorRepo for MockDoctorRepo {
    async fn find_by_specialty(&self, specialty: &str, limit: i64) -> Result<Vec<Doctor>> {
        Ok(self
            .doctors
            .iter()
            .filter(|d| d.specialties.iter().any(|s| s.eq_ignore_ascii_case(specialty)))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn find_all_ids(&self, limit: i64) -> Result<Vec<String>> {
        let ids = self.doctors.iter().map(|d| d.id.clone());
        Ok(if limit > 0 {
            ids.take(limit as usize).collect()
        } else {
            ids.collect()
        })
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Doctor>> {
        Ok(self
            .doctors
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn find_ids_by_facility_id(&self, facility_id: &str, limit: i64) -> Result<Vec<String>> {
        Ok(self
            .doctors
            .iter()
            .filter(|d| d.facility_ids.iter().any(|f| f == facility_id))
            .take(limit as usize)
            .map(|d| d.id.clone())
            .collect())
    }
}

#[derive(Default)]
struct MockFacilityRepo {
    facilities: Vec<Facility>,
}

#[async_trait]
impl FacilityRepo for MockFacilityRepo {
    async fn find_all(&self) -> Result<Vec<Facility>> {
        Ok(self.facilities.clone())
    }
}

#[derive(Default)]
struct MockExperienceRepo {
    by_doctor: HashMap<String, Vec<ClinicalExperience>>,
}

#[async_trait]
impl ExperienceRepo for MockExperienceRepo {
    async fn find_by_doctor_id(&self, doctor_id: &str) -> Result<Vec<ClinicalExperience>> {
        Ok(self.by_doctor.get(doctor_id).cloned().unwrap_or_default())
    }

    async fn find_by_doctor_ids(
        &self,
        doctor_ids: &[String],
    ) -> Result<HashMap<String, Vec<ClinicalExperience>>> {
        Ok(self
            .by_doctor
            .iter()
            .filter(|(id, _)| doctor_ids.contains(id))
            .map(|(id, exps)| (id.clone(), exps.clone()))
            .collect())
    }
}

#[derive(Default)]
struct MockMatchRepo {
    rows: Mutex<Vec<ConsultationMatch>>,
}

#[async_trait]
impl MatchRepo for MockMatchRepo {
    async fn delete_by_case_id(&self, case_id: &str) -> Result<u64> {
        let mut rows = self.rows.lock().expect("lock");
        let before = rows.len();
        rows.retain(|m| m.case_id != case_id);
        Ok((before - rows.len()) as u64)
    }

    async fn insert_batch(&self, matches: &[ConsultationMatch]) -> Result<Vec<String>> {
        let mut rows = self.rows.lock().expect("lock");
        rows.extend(matches.iter().cloned());
        Ok(matches.iter().map(|m| m.id.clone()).collect())
    }

    async fn count(&self) -> Result<i64> {
        Ok(self.rows.lock().expect("lock").len() as i64)
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut rows = self.rows.lock().expect("lock");
        let n = rows.len();
        rows.clear();
        Ok(n as u64)
    }
}

/// Fixed graph signal: either absent, or present with constant sub-scores.
struct MockGraph {
    exists: bool,
    direct: f64,
    expertise: f64,
    specialization: f64,
    similar: f64,
}

impl MockGraph {
    fn absent() -> Self {
        Self {
            exists: false,
            direct: 0.0,
            expertise: 0.0,
            specialization: 0.0,
            similar: 0.0,
        }
    }
}

#[async_trait]
impl GraphSignal for MockGraph {
    async fn graph_exists(&self) -> bool {
        self.exists
    }

    async fn direct_relationship_score(&self, _doctor_id: &str, _case_id: &str) -> f64 {
        self.direct
    }

    async fn condition_expertise_score(&self, _doctor_id: &str, _icd10_codes: &[String]) -> f64 {
        self.expertise
    }

    async fn specialization_match_score(
        &self,
        _doctor_id: &str,
        _required_specialty: Option<&str>,
    ) -> f64 {
        self.specialization
    }

    async fn similar_cases_score(&self, _doctor_id: &str, _icd10_codes: &[String]) -> f64 {
        self.similar
    }
}

// --- fixtures ---

fn cardiology_case(id: &str) -> MedicalCase {
    MedicalCase {
        id: id.to_string(),
        patient_age: Some(61),
        chief_complaint: Some("Chest pain".into()),
        symptoms: Some("Chest pain radiating to left arm".into()),
        current_diagnosis: Some("Suspected NSTEMI".into()),
        icd10_codes: vec!["I21.4".into()],
        snomed_codes: Vec::new(),
        urgency_level: Some(UrgencyLevel::High),
        required_specialty: Some("Cardiology".into()),
        case_type: None,
        additional_notes: None,
        abstract_text: None,
    }
}

fn doctor(id: &str, specialties: &[&str], telehealth: bool) -> Doctor {
    Doctor {
        id: id.to_string(),
        name: Some(format!("Dr. {id}")),
        email: None,
        specialties: specialties.iter().map(|s| s.to_string()).collect(),
        certifications: Vec::new(),
        facility_ids: vec!["facility-1".into()],
        telehealth_enabled: telehealth,
        availability_status: None,
    }
}

fn successful_experience(doctor_id: &str, case_id: &str, rating: i32) -> ClinicalExperience {
    ClinicalExperience {
        id: format!("exp-{doctor_id}-{case_id}"),
        doctor_id: doctor_id.to_string(),
        case_id: case_id.to_string(),
        procedures_performed: Vec::new(),
        complexity_level: None,
        outcome: Some("SUCCESS".into()),
        complications: Vec::new(),
        time_to_resolution: Some(5),
        rating: Some(rating),
    }
}

struct Fixture {
    matcher: Matcher,
    match_repo: Arc<MockMatchRepo>,
}

fn build(
    case_repo: MockCaseRepo,
    doctor_repo: MockDoctorRepo,
    facility_repo: MockFacilityRepo,
    experience_repo: MockExperienceRepo,
    graph: MockGraph,
) -> Fixture {
    let cases: Arc<dyn CaseRepo> = Arc::new(case_repo);
    let doctors: Arc<dyn DoctorRepo> = Arc::new(doctor_repo);
    let facilities: Arc<dyn FacilityRepo> = Arc::new(facility_repo);
    let experiences: Arc<dyn ExperienceRepo> = Arc::new(experience_repo);
    let match_repo = Arc::new(MockMatchRepo::default());
    let graph: Arc<dyn GraphSignal> = Arc::new(graph);

    let engine = ScoreEngine::new(
        cases.clone(),
        doctors.clone(),
        experiences.clone(),
        graph,
    );
    let matcher = Matcher::new(
        cases,
        doctors,
        facilities,
        match_repo.clone() as Arc<dyn MatchRepo>,
        engine,
    );

    Fixture {
        matcher,
        match_repo,
    }
}

// --- scoring fallbacks ---

#[tokio::test]
async fn no_data_anywhere_scores_exactly_seven() {
    // No embedding, no experiences, no graph: vector and historical fall
    // back to 0.1, graph to 0.0, overall to 100*(0.1*0.4 + 0 + 0.1*0.3) = 7.
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo {
            doctors: vec![doctor("doc-1", &["Cardiology"], true)],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let matches = fixture
        .matcher
        .match_doctors_to_case("case-1", &MatchOptions::default())
        .await
        .expect("matching succeeds");

    assert_eq!(matches.len(), 1);
    assert!((matches[0].match_score - 7.0).abs() < 1e-9);
    assert_eq!(
        matches[0].rationale,
        "Vector similarity: 0.10, Graph relationships: 0.00, Historical performance: 0.10"
    );
}

#[tokio::test]
async fn graph_down_leaves_vector_and_historical_independent() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            with_embedding: HashSet::from(["case-1".to_string()]),
            similarity: Some(0.8),
        },
        MockDoctorRepo {
            doctors: vec![doctor("doc-1", &["Cardiology"], true)],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo {
            by_doctor: HashMap::from([(
                "doc-1".to_string(),
                vec![successful_experience("doc-1", "case-9", 5)],
            )]),
        },
        MockGraph::absent(),
    );

    let matches = fixture
        .matcher
        .match_doctors_to_case("case-1", &MatchOptions::default())
        .await
        .expect("matching succeeds");

    // vector 0.8, graph 0.0, historical (5-rated all-success) 1.0:
    // overall = 100*(0.8*0.4 + 0 + 1.0*0.3) = 62.
    assert_eq!(matches.len(), 1);
    assert!((matches[0].match_score - 62.0).abs() < 1e-9);
    assert!(matches[0].rationale.contains("Graph relationships: 0.00"));
}

// --- ranking and filtering ---

#[tokio::test]
async fn matches_are_sorted_descending_with_dense_ranks() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            with_embedding: HashSet::from(["case-1".to_string()]),
            similarity: Some(0.5),
        },
        MockDoctorRepo {
            doctors: vec![
                doctor("doc-weak", &["Cardiology"], true),
                doctor("doc-strong", &["Cardiology"], true),
            ],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo {
            // doc-strong has strong history; doc-weak has none, so both its
            // vector and historical signals fall back to 0.1.
            by_doctor: HashMap::from([(
                "doc-strong".to_string(),
                vec![
                    successful_experience("doc-strong", "case-2", 5),
                    successful_experience("doc-strong", "case-3", 5),
                ],
            )]),
        },
        MockGraph::absent(),
    );

    let matches = fixture
        .matcher
        .match_doctors_to_case("case-1", &MatchOptions::default())
        .await
        .expect("matching succeeds");

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].doctor.id, "doc-strong");
    assert!(matches[0].match_score > matches[1].match_score);
    assert_eq!(matches[0].rank, 1);
    assert_eq!(matches[1].rank, 2);
}

#[tokio::test]
async fn min_score_filter_drops_weak_candidates() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo {
            doctors: vec![doctor("doc-1", &["Cardiology"], true)],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    // Fallback score is exactly 7.0; a threshold above that removes it.
    let options = MatchOptions::builder().min_score(Some(50.0)).build();
    let matches = fixture
        .matcher
        .match_doctors_to_case("case-1", &options)
        .await
        .expect("matching succeeds");

    assert!(matches.is_empty());
    assert_eq!(fixture.match_repo.count().await.expect("count"), 0);
}

#[tokio::test]
async fn telehealth_requirement_filters_candidates() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo {
            doctors: vec![
                doctor("doc-remote", &["Cardiology"], true),
                doctor("doc-onsite", &["Cardiology"], false),
            ],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let options = MatchOptions::builder().require_telehealth(true).build();
    let matches = fixture
        .matcher
        .match_doctors_to_case("case-1", &options)
        .await
        .expect("matching succeeds");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].doctor.id, "doc-remote");
}

// --- replace persistence ---

#[tokio::test]
async fn repeated_matching_replaces_the_persisted_set() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo {
            doctors: vec![
                doctor("doc-1", &["Cardiology"], true),
                doctor("doc-2", &["Cardiology"], true),
            ],
        },
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let options = MatchOptions::default();
    fixture
        .matcher
        .match_doctors_to_case("case-1", &options)
        .await
        .expect("first run");
    let count_after_first = fixture.match_repo.count().await.expect("count");

    fixture
        .matcher
        .match_doctors_to_case("case-1", &options)
        .await
        .expect("second run");
    let count_after_second = fixture.match_repo.count().await.expect("count");

    assert_eq!(count_after_first, 2);
    assert_eq!(count_after_first, count_after_second);

    let rows = fixture.match_repo.rows.lock().expect("lock").clone();
    let mut pairs: Vec<(String, String)> = rows
        .iter()
        .map(|m| (m.case_id.clone(), m.doctor_id.clone()))
        .collect();
    let total = pairs.len();
    pairs.sort();
    pairs.dedup();
    assert_eq!(pairs.len(), total, "no duplicate (case, doctor) rows");

    let mut ranks: Vec<i32> = rows.iter().map(|m| m.rank).collect();
    ranks.sort();
    assert_eq!(ranks, vec![1, 2], "ranks form a dense 1..N sequence");
    assert!(rows.iter().all(|m| m.status == "PENDING"));
}

// --- error paths ---

#[tokio::test]
async fn unknown_case_is_a_not_found_error() {
    let fixture = build(
        MockCaseRepo::default(),
        MockDoctorRepo::default(),
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let result = fixture
        .matcher
        .match_doctors_to_case("no-such-case", &MatchOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(medmatch_common::MatchError::NotFound(_))
    ));
}

#[tokio::test]
async fn blank_case_id_is_a_validation_error() {
    let fixture = build(
        MockCaseRepo::default(),
        MockDoctorRepo::default(),
        MockFacilityRepo::default(),
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let result = fixture
        .matcher
        .match_doctors_to_case("   ", &MatchOptions::default())
        .await;
    assert!(matches!(
        result,
        Err(medmatch_common::MatchError::Validation(_))
    ));
}

// --- facility routing ---

fn facility(id: &str, facility_type: &str, capabilities: &[&str], occupancy: Option<i32>) -> Facility {
    Facility {
        id: id.to_string(),
        name: Some(id.to_string()),
        facility_type: Some(facility_type.to_string()),
        location_city: None,
        location_state: None,
        location_country: None,
        location_latitude: None,
        location_longitude: None,
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        capacity: Some(100),
        current_occupancy: occupancy,
    }
}

#[tokio::test]
async fn facility_matching_ranks_by_free_capacity() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo::default(),
        MockFacilityRepo {
            facilities: vec![
                facility("facility-full", "ACADEMIC", &["cardiology"], Some(80)),
                facility("facility-open", "ACADEMIC", &["cardiology"], Some(10)),
            ],
        },
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let matches = fixture
        .matcher
        .match_facilities_for_case("case-1", &RoutingOptions::default())
        .await
        .expect("routing succeeds");

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].facility.id, "facility-open");
    assert_eq!(matches[0].rank, 1);
    assert_eq!(matches[1].rank, 2);
    // Nothing is persisted on the routing path.
    assert_eq!(fixture.match_repo.count().await.expect("count"), 0);
}

#[tokio::test]
async fn facility_filters_apply_type_and_capability_supersets() {
    let case = cardiology_case("case-1");
    let fixture = build(
        MockCaseRepo {
            cases: vec![case.clone()],
            ..Default::default()
        },
        MockDoctorRepo::default(),
        MockFacilityRepo {
            facilities: vec![
                facility("facility-academic", "ACADEMIC", &["ICU", "SURGERY"], None),
                facility("facility-community", "COMMUNITY", &["ICU", "SURGERY"], None),
                facility("facility-no-icu", "ACADEMIC", &["SURGERY"], None),
            ],
        },
        MockExperienceRepo::default(),
        MockGraph::absent(),
    );

    let options = RoutingOptions::builder()
        .preferred_facility_types(vec!["ACADEMIC".into()])
        .required_capabilities(vec!["ICU".into()])
        .build();
    let matches = fixture
        .matcher
        .match_facilities_for_case("case-1", &options)
        .await
        .expect("routing succeeds");

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].facility.id, "facility-academic");
}
