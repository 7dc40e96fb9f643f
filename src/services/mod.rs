pub mod output_classifier;
pub mod transcript_writer;

pub use output_classifier::{progress_from_objective, LineClass, LineClassifier};
pub use transcript_writer::TranscriptWriter;
