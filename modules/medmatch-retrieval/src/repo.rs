//! Repository traits consumed by scoring and matching, with sqlx Postgres
//! implementations.
//!
//! Case ids are CHAR(24) hex compared case-insensitively; every id crossing
//! this boundary is normalized to lowercase. Embeddings live in a pgvector
//! column on medical_cases and are only ever consumed through the cosine
//! aggregate here — embedding generation is someone else's job.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row as _;

use medmatch_common::types::{
    ClinicalExperience, ConsultationMatch, Doctor, Facility, MedicalCase, UrgencyLevel,
};
use medmatch_common::{CaseType, Result};

fn normalize_id(id: &str) -> String {
    id.trim().to_lowercase()
}

#[async_trait]
pub trait CaseRepo: Send + Sync {
    async fn find_by_id(&self, case_id: &str) -> Result<Option<MedicalCase>>;

    async fn has_embedding(&self, case_id: &str) -> Result<bool>;

    /// Average cosine similarity between the query case's embedding and the
    /// embeddings of the given cases. None when nothing comparable exists.
    async fn vector_similarity(
        &self,
        query_case_id: &str,
        doctor_case_ids: &[String],
    ) -> Result<Option<f64>>;
}

#[async_trait]
pub trait DoctorRepo: Send + Sync {
    async fn find_by_specialty(&self, specialty: &str, limit: i64) -> Result<Vec<Doctor>>;

    /// All doctor ids; `limit == 0` means unbounded.
    async fn find_all_ids(&self, limit: i64) -> Result<Vec<String>>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Doctor>>;

    async fn find_ids_by_facility_id(&self, facility_id: &str, limit: i64) -> Result<Vec<String>>;
}

#[async_trait]
pub trait FacilityRepo: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Facility>>;
}

#[async_trait]
pub trait ExperienceRepo: Send + Sync {
    async fn find_by_doctor_id(&self, doctor_id: &str) -> Result<Vec<ClinicalExperience>>;

    async fn find_by_doctor_ids(
        &self,
        doctor_ids: &[String],
    ) -> Result<HashMap<String, Vec<ClinicalExperience>>>;
}

#[async_trait]
pub trait MatchRepo: Send + Sync {
    async fn delete_by_case_id(&self, case_id: &str) -> Result<u64>;

    async fn insert_batch(&self, matches: &[ConsultationMatch]) -> Result<Vec<String>>;

    async fn count(&self) -> Result<i64>;

    async fn delete_all(&self) -> Result<u64>;
}

// --- Postgres implementations ---

#[derive(Clone)]
pub struct PgCaseRepo {
    pool: PgPool,
}

impl PgCaseRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn case_from_row(row: &PgRow) -> MedicalCase {
    let urgency: Option<String> = row.get("urgency_level");
    let case_type: Option<String> = row.get("case_type");
    MedicalCase {
        id: row.get("id"),
        patient_age: row.get("patient_age"),
        chief_complaint: row.get("chief_complaint"),
        symptoms: row.get("symptoms"),
        current_diagnosis: row.get("current_diagnosis"),
        icd10_codes: row.get::<Option<Vec<String>>, _>("icd10_codes").unwrap_or_default(),
        snomed_codes: row.get::<Option<Vec<String>>, _>("snomed_codes").unwrap_or_default(),
        urgency_level: urgency.as_deref().and_then(UrgencyLevel::parse),
        required_specialty: row.get("required_specialty"),
        case_type: case_type.as_deref().and_then(CaseType::parse),
        additional_notes: row.get("additional_notes"),
        abstract_text: row.get("abstract_text"),
    }
}

const CASE_COLUMNS: &str = "id, patient_age, chief_complaint, symptoms, current_diagnosis, \
     icd10_codes, snomed_codes, urgency_level, required_specialty, case_type, \
     additional_notes, abstract_text";

#[async_trait]
impl CaseRepo for PgCaseRepo {
    async fn find_by_id(&self, case_id: &str) -> Result<Option<MedicalCase>> {
        let sql = format!("SELECT {CASE_COLUMNS} FROM medical_cases WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(normalize_id(case_id))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(case_from_row))
    }

    async fn has_embedding(&self, case_id: &str) -> Result<bool> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT embedding IS NOT NULL FROM medical_cases WHERE id = $1")
                .bind(normalize_id(case_id))
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(b,)| b).unwrap_or(false))
    }

    async fn vector_similarity(
        &self,
        query_case_id: &str,
        doctor_case_ids: &[String],
    ) -> Result<Option<f64>> {
        if doctor_case_ids.is_empty() {
            return Ok(None);
        }
        let ids: Vec<String> = doctor_case_ids.iter().map(|id| normalize_id(id)).collect();

        let (similarity,): (Option<f64>,) = sqlx::query_as(
            "SELECT AVG(1 - (qc.embedding <=> dc.embedding))::float8 \
             FROM medical_cases qc \
             JOIN medical_cases dc ON dc.id = ANY($2) \
             WHERE qc.id = $1 \
               AND qc.embedding IS NOT NULL \
               AND dc.embedding IS NOT NULL",
        )
        .bind(normalize_id(query_case_id))
        .bind(&ids)
        .fetch_one(&self.pool)
        .await?;

        Ok(similarity)
    }
}

#[derive(Clone)]
pub struct PgDoctorRepo {
    pool: PgPool,
}

impl PgDoctorRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn doctor_from_row(row: &PgRow) -> Doctor {
    Doctor {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        specialties: row.get::<Option<Vec<String>>, _>("specialties").unwrap_or_default(),
        certifications: row
            .get::<Option<Vec<String>>, _>("certifications")
            .unwrap_or_default(),
        facility_ids: row
            .get::<Option<Vec<String>>, _>("facility_ids")
            .unwrap_or_default(),
        telehealth_enabled: row.get::<Option<bool>, _>("telehealth_enabled").unwrap_or(false),
        availability_status: row.get("availability_status"),
    }
}

const DOCTOR_COLUMNS: &str = "id, name, email, specialties, certifications, facility_ids, \
     telehealth_enabled, availability_status";

#[async_trait]
impl DoctorRepo for PgDoctorRepo {
    async fn find_by_specialty(&self, specialty: &str, limit: i64) -> Result<Vec<Doctor>> {
        let sql = format!(
            "SELECT {DOCTOR_COLUMNS} FROM doctors \
             WHERE EXISTS (SELECT 1 FROM unnest(specialties) s WHERE lower(s) = lower($1)) \
             ORDER BY id LIMIT $2"
        );
        let rows = sqlx::query(&sql)
            .bind(specialty)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(doctor_from_row).collect())
    }

    async fn find_all_ids(&self, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = if limit > 0 {
            sqlx::query_as("SELECT id FROM doctors ORDER BY id LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query_as("SELECT id FROM doctors ORDER BY id")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<Doctor>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {DOCTOR_COLUMNS} FROM doctors WHERE id = ANY($1)");
        let rows = sqlx::query(&sql).bind(ids).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(doctor_from_row).collect())
    }

    async fn find_ids_by_facility_id(&self, facility_id: &str, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM doctors WHERE $1 = ANY(facility_ids) ORDER BY id LIMIT $2",
        )
        .bind(facility_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(Clone)]
pub struct PgFacilityRepo {
    pool: PgPool,
}

impl PgFacilityRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn facility_from_row(row: &PgRow) -> Facility {
    Facility {
        id: row.get("id"),
        name: row.get("name"),
        facility_type: row.get("facility_type"),
        location_city: row.get("location_city"),
        location_state: row.get("location_state"),
        location_country: row.get("location_country"),
        location_latitude: row.get("location_latitude"),
        location_longitude: row.get("location_longitude"),
        capabilities: row
            .get::<Option<Vec<String>>, _>("capabilities")
            .unwrap_or_default(),
        capacity: row.get("capacity"),
        current_occupancy: row.get("current_occupancy"),
    }
}

#[async_trait]
impl FacilityRepo for PgFacilityRepo {
    async fn find_all(&self) -> Result<Vec<Facility>> {
        let rows = sqlx::query(
            "SELECT id, name, facility_type, location_city, location_state, location_country, \
             location_latitude, location_longitude, capabilities, capacity, current_occupancy \
             FROM facilities ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(facility_from_row).collect())
    }
}

#[derive(Clone)]
pub struct PgExperienceRepo {
    pool: PgPool,
}

impl PgExperienceRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn experience_from_row(row: &PgRow) -> ClinicalExperience {
    ClinicalExperience {
        id: row.get("id"),
        doctor_id: row.get("doctor_id"),
        case_id: row.get("case_id"),
        procedures_performed: row
            .get::<Option<Vec<String>>, _>("procedures_performed")
            .unwrap_or_default(),
        complexity_level: row.get("complexity_level"),
        outcome: row.get("outcome"),
        complications: row
            .get::<Option<Vec<String>>, _>("complications")
            .unwrap_or_default(),
        time_to_resolution: row.get("time_to_resolution"),
        rating: row.get("rating"),
    }
}

const EXPERIENCE_COLUMNS: &str = "id, doctor_id, case_id, procedures_performed, \
     complexity_level, outcome, complications, time_to_resolution, rating";

#[async_trait]
impl ExperienceRepo for PgExperienceRepo {
    async fn find_by_doctor_id(&self, doctor_id: &str) -> Result<Vec<ClinicalExperience>> {
        let sql =
            format!("SELECT {EXPERIENCE_COLUMNS} FROM clinical_experiences WHERE doctor_id = $1");
        let rows = sqlx::query(&sql)
            .bind(doctor_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(experience_from_row).collect())
    }

    async fn find_by_doctor_ids(
        &self,
        doctor_ids: &[String],
    ) -> Result<HashMap<String, Vec<ClinicalExperience>>> {
        if doctor_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT {EXPERIENCE_COLUMNS} FROM clinical_experiences WHERE doctor_id = ANY($1)"
        );
        let rows = sqlx::query(&sql)
            .bind(doctor_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut by_doctor: HashMap<String, Vec<ClinicalExperience>> = HashMap::new();
        for row in &rows {
            let experience = experience_from_row(row);
            by_doctor
                .entry(experience.doctor_id.clone())
                .or_default()
                .push(experience);
        }
        Ok(by_doctor)
    }
}

#[derive(Clone)]
pub struct PgMatchRepo {
    pool: PgPool,
}

impl PgMatchRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchRepo for PgMatchRepo {
    async fn delete_by_case_id(&self, case_id: &str) -> Result<u64> {
        if case_id.trim().is_empty() {
            return Ok(0);
        }
        let result = sqlx::query("DELETE FROM consultation_matches WHERE case_id = $1")
            .bind(normalize_id(case_id))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_batch(&self, matches: &[ConsultationMatch]) -> Result<Vec<String>> {
        if matches.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await?;
        for m in matches {
            sqlx::query(
                "INSERT INTO consultation_matches \
                 (id, case_id, doctor_id, match_score, match_rationale, rank, status) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(&m.id)
            .bind(&m.case_id)
            .bind(&m.doctor_id)
            .bind(m.match_score)
            .bind(&m.match_rationale)
            .bind(m.rank)
            .bind(&m.status)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(matches.iter().map(|m| m.id.clone()).collect())
    }

    async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM consultation_matches")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM consultation_matches")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
