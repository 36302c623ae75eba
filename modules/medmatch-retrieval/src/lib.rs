pub mod matching;
pub mod repo;
pub mod scoring;

pub use matching::Matcher;
pub use repo::{
    CaseRepo, DoctorRepo, ExperienceRepo, FacilityRepo, MatchRepo, PgCaseRepo, PgDoctorRepo,
    PgExperienceRepo, PgFacilityRepo, PgMatchRepo,
};
pub use scoring::ScoreEngine;
