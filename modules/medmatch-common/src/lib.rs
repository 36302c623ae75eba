pub mod config;
pub mod error;
pub mod id;
pub mod telemetry;
pub mod types;

pub use config::Config;
pub use error::{MatchError, Result};
pub use types::{
    CaseType, ClinicalExperience, ConsultationMatch, Doctor, DoctorMatch, Facility, FacilityMatch,
    MatchOptions, MedicalCase, PriorityScore, RouteScoreResult, RoutingOptions, ScoreResult,
    UrgencyLevel,
};
