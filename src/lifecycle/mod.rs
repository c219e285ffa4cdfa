pub mod clock;
pub mod duration;
pub mod record;
pub mod service;

pub use clock::{Clock, ManualClock, SystemClock};
pub use duration::format_hhmmss;
pub use record::{JobRecord, JobState, RecordFilter, RecordPatch};
pub use service::{JobLifecycleService, JobStats, StartJobRequest, StopJobRequest, TemplateListing};
