//! Output stage for tddeps.
//!
//! [`FragmentWriter`] serializes the analysis results into the CMake fragment
//! consumed by the build, and [`StateFile`] implements the compare-then-update
//! protocol around an incremental state file.

mod fragment;
mod update;

pub use fragment::{FragmentStats, FragmentWriter, managed_name, variable_name};
pub use update::{StateFile, UpdateOutcome, touch_stamps};
