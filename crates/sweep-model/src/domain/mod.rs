mod image;
pub use image::{Image, ImageId};

mod host_info;
pub use host_info::HostInfo;

mod run_status;
pub use run_status::{AbortCause, RunStatus};

mod run_outcome;
pub use run_outcome::RunOutcome;

mod run_record;
pub use run_record::RunRecord;

mod run_query;
pub use run_query::{RunPage, RunQuery};

pub mod duration_ms;

/// Unique identifier of one cleanup run.
///
/// Generated per run and used as the primary key when the outcome is persisted.
pub type RunId = String;
