//! Graph-derived sub-scores for doctor/case matching.
//!
//! Four narrow queries over the graph, each normalized to [0,1]. Every
//! score returns 0.0 immediately when the graph does not exist and degrades
//! to 0.0 on query failure, so a missing or broken graph backend lowers
//! confidence instead of failing the match request.

use async_trait::async_trait;
use tracing::debug;

use crate::cypher::{params, Params};
use crate::store::GraphStore;

/// Seam for the graph-relationship signal consumed by the scoring engine.
#[async_trait]
pub trait GraphSignal: Send + Sync {
    async fn graph_exists(&self) -> bool;

    /// 1.0 if the doctor treated or consulted on this exact case.
    async fn direct_relationship_score(&self, doctor_id: &str, case_id: &str) -> f64;

    /// Fraction of the case's ICD-10 codes the doctor treats; 0.5 when the
    /// case carries no codes.
    async fn condition_expertise_score(&self, doctor_id: &str, icd10_codes: &[String]) -> f64;

    /// 1.0 if the doctor specializes in the case's required specialty; 0.5
    /// when the case does not name one.
    async fn specialization_match_score(
        &self,
        doctor_id: &str,
        required_specialty: Option<&str>,
    ) -> f64;

    /// Density signal over cases sharing the case's ICD-10 codes that the
    /// doctor has treated; 0.5 when the case carries no codes.
    async fn similar_cases_score(&self, doctor_id: &str, icd10_codes: &[String]) -> f64;
}

/// Graph sub-score queries over a [`GraphStore`].
#[derive(Clone)]
pub struct GraphScores {
    store: GraphStore,
}

impl GraphScores {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Run a single-column count query, degrading to 0 on any failure.
    async fn count_query(&self, query: &str, params: &Params) -> i64 {
        match self.store.execute(query, params).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.get("c"))
                .and_then(|value| value.as_i64())
                .unwrap_or(0),
            Err(e) => {
                debug!(error = %e, "count query failed");
                0
            }
        }
    }
}

#[async_trait]
impl GraphSignal for GraphScores {
    async fn graph_exists(&self) -> bool {
        self.store.graph_exists().await
    }

    async fn direct_relationship_score(&self, doctor_id: &str, case_id: &str) -> f64 {
        if !self.store.graph_exists().await {
            return 0.0;
        }

        let p = params([("doctorId", doctor_id), ("caseId", case_id)]);

        let treated = self
            .count_query(
                "MATCH (d:Doctor {id: $doctorId})-[:TREATED]->(c:MedicalCase {id: $caseId}) RETURN count(*)",
                &p,
            )
            .await;
        let consulted = self
            .count_query(
                "MATCH (d:Doctor {id: $doctorId})-[:CONSULTED_ON]->(c:MedicalCase {id: $caseId}) RETURN count(*)",
                &p,
            )
            .await;

        ((treated + consulted) as f64).min(1.0)
    }

    async fn condition_expertise_score(&self, doctor_id: &str, icd10_codes: &[String]) -> f64 {
        if !self.store.graph_exists().await {
            return 0.0;
        }
        if icd10_codes.is_empty() {
            return 0.5;
        }

        let mut matching = 0usize;
        for code in icd10_codes {
            let p = params([("doctorId", doctor_id), ("icd10Code", code.as_str())]);
            let count = self
                .count_query(
                    "MATCH (d:Doctor {id: $doctorId})-[:TREATS_CONDITION]->(i:ICD10Code {code: $icd10Code}) RETURN count(*)",
                    &p,
                )
                .await;
            if count > 0 {
                matching += 1;
            }
        }

        matching as f64 / icd10_codes.len() as f64
    }

    async fn specialization_match_score(
        &self,
        doctor_id: &str,
        required_specialty: Option<&str>,
    ) -> f64 {
        if !self.store.graph_exists().await {
            return 0.0;
        }
        let Some(specialty) = required_specialty.filter(|s| !s.is_empty()) else {
            return 0.5;
        };

        let p = params([("doctorId", doctor_id), ("specialtyName", specialty)]);
        let count = self
            .count_query(
                "MATCH (d:Doctor {id: $doctorId})-[:SPECIALIZES_IN]->(s:MedicalSpecialty {name: $specialtyName}) RETURN count(*)",
                &p,
            )
            .await;

        (count as f64).min(1.0)
    }

    async fn similar_cases_score(&self, doctor_id: &str, icd10_codes: &[String]) -> f64 {
        if !self.store.graph_exists().await {
            return 0.0;
        }
        if icd10_codes.is_empty() {
            return 0.5;
        }

        // Max per-code count rather than the sum, so a single broad code does
        // not double-count cases shared across codes.
        let mut most_similar = 0i64;
        for code in icd10_codes {
            let p = params([("doctorId", doctor_id), ("icd10Code", code.as_str())]);
            let count = self
                .count_query(
                    "MATCH (d:Doctor {id: $doctorId})-[:TREATED]->(c:MedicalCase)-[:HAS_CONDITION]->(i:ICD10Code {code: $icd10Code}) RETURN count(*)",
                    &p,
                )
                .await;
            most_similar = most_similar.max(count);
        }

        similar_cases_step(most_similar)
    }
}

/// Stepped normalization of a similar-case count: 1 shared case is a weak
/// signal, 2-5 is solid, more saturates at 1.0.
pub(crate) fn similar_cases_step(count: i64) -> f64 {
    match count {
        i64::MIN..=0 => 0.0,
        1 => 0.5,
        2..=5 => 0.75,
        _ => 1.0,
    }
}
