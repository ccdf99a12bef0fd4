pub mod error;
pub use error::{CleanupError, InventoryError, NotifyError, ScheduleError, StoreError};

pub mod admission;
pub use admission::{AdmissionGuard, AdmissionPermit};

pub mod context;
pub use context::RunContext;

pub mod inventory;
pub use inventory::ImageRepository;

pub mod notify;
pub use notify::Notifier;

pub mod metrics;
pub use metrics::{ErrorStage, MetricsBackend, MetricsExport, NoOpMetrics};

pub mod state;
pub use state::{MemoryResultStore, ResultStore};

pub mod engine;
pub use engine::{CleanupEngine, CleanupEngineBuilder, DEFAULT_WORKERS, HostProbe};

pub mod launcher;
pub use launcher::{RunLauncher, RunOrigin};

pub mod report;
pub use report::{TimestampFormatter, format_summary, humanize_duration};

pub mod schedule;
pub use schedule::{Schedule, Scheduler};

mod system;
pub use system::{host_info, hostname_or_unknown, ipv4_addresses};
