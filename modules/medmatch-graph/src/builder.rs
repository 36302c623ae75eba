//! Projects relational rows into the graph.
//!
//! MERGE-based and idempotent: rebuilding over an existing graph updates in
//! place instead of duplicating. Per-item failures are logged and skipped so
//! one malformed row never aborts a full rebuild.

use tracing::{info, warn};

use medmatch_common::types::{ClinicalExperience, Doctor, Facility, MedicalCase};

use crate::cypher::{params, ParamValue};
use crate::store::GraphStore;

/// Counters for one build run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub vertices: u64,
    pub edges: u64,
    pub failed: u64,
}

/// Builds the medical graph (doctors, cases, conditions, specialties,
/// facilities and the edges between them) from relational data.
pub struct GraphBuilder {
    store: GraphStore,
}

impl GraphBuilder {
    pub fn new(store: GraphStore) -> Self {
        Self { store }
    }

    /// Build or refresh the whole graph from the given rows.
    pub async fn build(
        &self,
        doctors: &[Doctor],
        cases: &[MedicalCase],
        experiences: &[ClinicalExperience],
        facilities: &[Facility],
    ) -> BuildStats {
        info!(
            doctors = doctors.len(),
            cases = cases.len(),
            experiences = experiences.len(),
            facilities = facilities.len(),
            "building medical graph"
        );

        self.store.create_graph_if_not_exists().await;

        let mut stats = BuildStats::default();
        self.create_vertices(doctors, cases, facilities, &mut stats)
            .await;
        self.create_edges(doctors, cases, experiences, &mut stats)
            .await;

        info!(
            vertices = stats.vertices,
            edges = stats.edges,
            failed = stats.failed,
            "medical graph build complete"
        );
        stats
    }

    async fn create_vertices(
        &self,
        doctors: &[Doctor],
        cases: &[MedicalCase],
        facilities: &[Facility],
        stats: &mut BuildStats,
    ) {
        for doctor in doctors {
            let p = params([
                ("id", ParamValue::from(doctor.id.as_str())),
                ("name", doctor.name.clone().into()),
                ("email", doctor.email.clone().into()),
            ]);
            self.merge_vertex(
                "MERGE (d:Doctor {id: $id}) SET d.name = $name, d.email = $email",
                &p,
                stats,
            )
            .await;
        }

        for case in cases {
            let urgency = case.urgency_level.map(|u| u.as_str().to_string());
            let p = params([
                ("id", ParamValue::from(case.id.as_str())),
                ("urgencyLevel", urgency.into()),
            ]);
            self.merge_vertex(
                "MERGE (c:MedicalCase {id: $id}) SET c.urgencyLevel = $urgencyLevel",
                &p,
                stats,
            )
            .await;
        }

        // ICD-10 and specialty vertices are merged while creating their
        // edges below; facilities get explicit vertices here.
        for facility in facilities {
            let p = params([
                ("id", ParamValue::from(facility.id.as_str())),
                ("name", facility.name.clone().into()),
                ("facilityType", facility.facility_type.clone().into()),
            ]);
            self.merge_vertex(
                "MERGE (f:Facility {id: $id}) SET f.name = $name, f.facilityType = $facilityType",
                &p,
                stats,
            )
            .await;
        }
    }

    async fn create_edges(
        &self,
        doctors: &[Doctor],
        cases: &[MedicalCase],
        experiences: &[ClinicalExperience],
        stats: &mut BuildStats,
    ) {
        // Doctor -> case treatment evidence.
        for experience in experiences {
            let p = params([
                ("doctorId", experience.doctor_id.as_str()),
                ("caseId", experience.case_id.as_str()),
            ]);
            self.merge_edge(
                "MATCH (d:Doctor {id: $doctorId}) MATCH (c:MedicalCase {id: $caseId}) MERGE (d)-[:TREATED]->(c)",
                &p,
                stats,
            )
            .await;
        }

        // Doctor -> treated-condition expertise, derived from the codes of
        // the cases each doctor has treated.
        for experience in experiences {
            let Some(case) = cases.iter().find(|c| c.id == experience.case_id) else {
                continue;
            };
            for code in &case.icd10_codes {
                let p = params([
                    ("doctorId", experience.doctor_id.as_str()),
                    ("icd10Code", code.as_str()),
                ]);
                self.merge_edge(
                    "MATCH (d:Doctor {id: $doctorId}) MERGE (i:ICD10Code {code: $icd10Code}) MERGE (d)-[:TREATS_CONDITION]->(i)",
                    &p,
                    stats,
                )
                .await;
            }
        }

        // Doctor -> specialty.
        for doctor in doctors {
            for specialty in &doctor.specialties {
                let p = params([
                    ("doctorId", doctor.id.as_str()),
                    ("specialtyName", specialty.as_str()),
                ]);
                self.merge_edge(
                    "MATCH (d:Doctor {id: $doctorId}) MERGE (s:MedicalSpecialty {name: $specialtyName}) MERGE (d)-[:SPECIALIZES_IN]->(s)",
                    &p,
                    stats,
                )
                .await;
            }

            for facility_id in &doctor.facility_ids {
                let p = params([
                    ("doctorId", doctor.id.as_str()),
                    ("facilityId", facility_id.as_str()),
                ]);
                self.merge_edge(
                    "MATCH (d:Doctor {id: $doctorId}) MATCH (f:Facility {id: $facilityId}) MERGE (d)-[:AFFILIATED_WITH]->(f)",
                    &p,
                    stats,
                )
                .await;
            }
        }

        // Case -> condition and case -> required specialty.
        for case in cases {
            for code in &case.icd10_codes {
                let p = params([
                    ("caseId", case.id.as_str()),
                    ("icd10Code", code.as_str()),
                ]);
                self.merge_edge(
                    "MATCH (c:MedicalCase {id: $caseId}) MERGE (i:ICD10Code {code: $icd10Code}) MERGE (c)-[:HAS_CONDITION]->(i)",
                    &p,
                    stats,
                )
                .await;
            }

            if let Some(specialty) = case
                .required_specialty
                .as_deref()
                .filter(|s| !s.is_empty())
            {
                let p = params([
                    ("caseId", case.id.as_str()),
                    ("specialtyName", specialty),
                ]);
                self.merge_edge(
                    "MATCH (c:MedicalCase {id: $caseId}) MERGE (s:MedicalSpecialty {name: $specialtyName}) MERGE (c)-[:REQUIRES_SPECIALTY]->(s)",
                    &p,
                    stats,
                )
                .await;
            }
        }
    }

    async fn merge_vertex(&self, query: &str, p: &crate::cypher::Params, stats: &mut BuildStats) {
        match self.store.execute(query, p).await {
            Ok(_) => stats.vertices += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "vertex merge failed, continuing");
            }
        }
    }

    async fn merge_edge(&self, query: &str, p: &crate::cypher::Params, stats: &mut BuildStats) {
        match self.store.execute(query, p).await {
            Ok(_) => stats.edges += 1,
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, "edge merge failed, continuing");
            }
        }
    }
}
