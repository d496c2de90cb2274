//! Values exchanged between the units of a pipeline.

/// Position of a line among the non-blank lines of the input, starting at zero.
pub type SequenceNumber = u64;

/// A message travelling through a pipeline channel.
///
/// The termination signal is a dedicated variant rather than a reserved payload value, so no
/// line content (the empty string included) can ever be mistaken for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item<T> {
    /// A unit of data.
    Data(T),
    /// No more data will arrive from this sender.
    End,
}

impl<T> Item<T> {
    /// Returns `true` if this item is the termination signal.
    pub fn is_end(&self) -> bool {
        matches!(self, Item::End)
    }
}

/// A trimmed, non-empty input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    seq: SequenceNumber,
    text: String,
}

impl Line {
    /// Creates a line from already trimmed, non-empty `text`.
    pub fn new(seq: SequenceNumber, text: String) -> Self {
        debug_assert!(!text.is_empty(), "lines must not be empty");

        Self { seq, text }
    }

    /// Returns the sequence number assigned by the source.
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Returns the line content.
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The result of transforming a single [`Line`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedLine {
    seq: SequenceNumber,
    original: String,
    transformed: String,
}

impl ProcessedLine {
    /// Creates a processed line from its source `line` and `transformed` text.
    pub fn new(line: Line, transformed: String) -> Self {
        Self {
            seq: line.seq,
            original: line.text,
            transformed,
        }
    }

    /// Returns the sequence number of the originating line.
    pub fn seq(&self) -> SequenceNumber {
        self.seq
    }

    /// Returns the line as it was read.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Returns the transformed line.
    pub fn transformed(&self) -> &str {
        &self.transformed
    }

    /// Consumes the record and returns the transformed line.
    pub fn into_transformed(self) -> String {
        self.transformed
    }
}

/// Counters collected over a complete pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Physical lines read from the input, blank ones included.
    pub lines_read: u64,
    /// Lines dropped because they were blank after trimming.
    pub lines_skipped: u64,
    /// Lines taken off the input channel by workers.
    pub lines_transformed: u64,
    /// Lines whose transformation failed and were passed through unchanged.
    pub transform_failures: u64,
    /// Lines written to the output.
    pub lines_written: u64,
}
