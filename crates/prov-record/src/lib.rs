//! Run records for prov: parameters, platform description, data identities,
//! the sealed [`Record`] itself and the [`RecordComparator`].

pub mod compare;
pub mod data;
pub mod format;
pub mod params;
pub mod platform;
pub mod record;

pub use compare::{
    ChangeKind, CompareOptions, ComparisonReport, Difference, Dimension, DimensionReport,
    DimensionStatus, RecordComparator,
};
pub use data::{hash_data_files, DataKey};
pub use format::DiffFormatter;
pub use params::{ParamFormat, ParamValue, ParameterSet, LABEL_PARAMETER};
pub use platform::PlatformInfo;
pub use record::{
    timestamp_label, validate_label, CaptureFailure, CaptureStage, CommandLine, ExitStatus, Record,
    RecordDraft,
};
