//! Page extractors
//!
//! Every extractor is a thin async function over the automation traits: page
//! scripts in [`js_scripts`] gather raw facts, Rust code here decides what
//! they mean.

pub mod categories;
pub mod documents;
pub mod fieldsets;
pub mod frames;
pub mod js_scripts;
pub mod vehicle_history;

pub use categories::{ChildDiscovery, discover_children, discover_root, top_level};
pub use documents::{DocumentRow, click_document, document_key, extract_document, list_documents};
pub use fieldsets::{capture_fieldsets, extract_fieldset, wait_for_job_details};
pub use frames::{FrameRoles, FrameSignals, classify_frames, classify_session, frame_signals};
pub use vehicle_history::extract_vehicle_history;
