pub mod label;
pub mod moment;
pub mod recording;
pub mod sample;
pub mod session;

pub use label::{Label, LabelCatalog, DEFAULT_LABEL_ID, DEFAULT_LABEL_NAME};
pub use moment::{format_elapsed, Moment};
pub use recording::Recording;
pub use sample::{RawMotionEvent, Sample};
pub use session::{SessionMetadata, SessionRecord, SessionSummary, TimingMode, UNNAMED_CAR};
