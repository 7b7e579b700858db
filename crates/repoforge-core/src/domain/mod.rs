//! Domain models for repoforge.
//!
//! - `Job`: an add/remove request for one account
//! - `RepositoryDefinition`: the per-account document of repository contents
//! - `GeneratedArtifact` / `JobResult`: what a successful job produced

pub mod artifact;
pub mod definition;
pub mod error;
pub mod job;

pub use artifact::{GeneratedArtifact, JobResult};
pub use definition::{PackageEntry, RepositoryDefinition};
pub use error::{JobFailure, PipelineError, Result, ValidationError};
pub use job::{Account, CodenameGroup, Job, Listing, OriginGroup, PackageGroups, PackageRef};
