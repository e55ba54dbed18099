pub mod generation;
pub mod detector;
pub mod file_names;
pub mod commit;
pub mod deletion_policy;
pub mod deleter;
pub mod field_infos;
pub mod term;
pub mod term_enum;
pub mod term_index;
pub mod term_infos_reader;
pub mod term_infos_writer;
pub mod skip_writer;
pub mod skip_reader;
pub mod postings;
pub mod postings_writer;
pub mod stored_fields;
pub mod segment_reader;
pub mod segment_writer;
pub mod builder;
pub mod merger;
pub mod merge_policy;

pub use commit::{SegmentInfo, SegmentInfos};
pub use deleter::IndexFileDeleter;
pub use generation::Generation;
pub use merger::MergeAbort;
pub use segment_reader::SegmentReader;
pub use term::{Term, TermInfo};
