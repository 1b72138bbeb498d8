//! Turning posteriors (or fallback rules) into keep/discard decisions.

mod backup;
mod cutoff;

pub use backup::{apply_backup, BackupRule};
pub use cutoff::{classify, keep_record, validate_cutoff};
