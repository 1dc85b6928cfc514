//! Bulletin core: pure domain model and the run state machine.
//!
//! Nothing in this crate performs IO. The engine executes the [`Effect`]s
//! returned by [`update`] and feeds the outcomes back as [`Msg`]s.
mod candidate;
mod catalog;
mod categorize;
mod effect;
mod msg;
mod naming;
mod state;
mod text;
mod update;

pub use candidate::{CandidateSet, DiscoveryMethod, LinkCandidate, LinkCategory};
pub use catalog::{
    default_extraction_targets, default_fallback_urls, default_target_categories,
    infer_category, ExtractionTarget, TargetCategory, UNKNOWN_TABLE_SUFFIX,
};
pub use categorize::{categorize, select_targets, CategorizedLinks, Selection};
pub use effect::{Effect, PlannedDownload};
pub use msg::Msg;
pub use naming::{download_file_name, looks_like_spreadsheet, spreadsheet_extension};
pub use state::{DownloadResult, Phase, RunOutcome, RunReport, RunSettings, RunState, TableOutput};
pub use text::{matches_all_keywords, normalize_title};
pub use update::update;
