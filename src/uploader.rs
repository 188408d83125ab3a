//! Batch uploader
//!
//! Consumes rows one at a time, shapes them, and sends fixed-size batches to a
//! [`BatchSink`]. The endpoint commits or rolls back each batch as a unit, so
//! every failure is reported with the input row range it covered and the
//! offset a later run should resume from.
//!
//! A run moves through [`BatchState`]:
//!
//! ```text
//! Accumulating -> Sending -> Committed  -> Accumulating
//!                         -> RolledBack -> Accumulating   (continue on error)
//!                                       -> Terminated     (fail fast)
//! ```

use log::{debug, error, info, warn};
use std::thread;
use std::time::Duration;

use crate::client::{batch_payload, BatchSink};
use crate::extract::SourceRow;
use crate::mapping::MappingNode;
use crate::shape::{prepare_row, ShapedRecord};
use crate::{IngestError, Result};

/// Rows per request unless told otherwise
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// Pause between consecutive requests
pub const DEFAULT_PAUSE: Duration = Duration::from_millis(100);

const RULE_WIDTH: usize = 60;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Options controlling a single upload run
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    /// Rows per batch, at least 1
    pub batch_size: usize,
    /// Do everything except contacting the endpoint
    pub dry_run: bool,
    /// Keep going after a failed batch or row
    pub continue_on_error: bool,
    /// Input row index of the first row handed to the uploader
    pub global_offset: usize,
    /// Delay after each real request
    pub pause: Duration,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            continue_on_error: false,
            global_offset: 0,
            pause: DEFAULT_PAUSE,
        }
    }
}

impl UploadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values below 1 are raised to 1
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_global_offset(mut self, offset: usize) -> Self {
        self.global_offset = offset;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

/// Where the uploader is in its batch cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Accumulating,
    Sending,
    Committed,
    RolledBack,
    Terminated,
}

/// Description of the first thing that went wrong in a run
#[derive(Debug, Clone, PartialEq)]
pub enum FailurePoint {
    /// The endpoint rejected a batch or never answered
    Batch {
        batch_num: usize,
        batch_size: usize,
        /// Inclusive row range relative to this run
        local_row_range: (usize, usize),
        /// Inclusive row range in the input file
        global_row_range: (usize, usize),
        error: String,
        detail: String,
        rolled_back: bool,
    },
    /// A single row could not be read or prepared
    Row {
        batch_num: usize,
        local_row: usize,
        global_row: usize,
        error: String,
        detail: String,
        /// Input row of the first buffered row that was never sent
        first_unsent_row: Option<usize>,
    },
}

impl FailurePoint {
    /// Input row a follow-up run should start from
    pub fn resume_offset(&self) -> usize {
        match self {
            FailurePoint::Batch {
                global_row_range, ..
            } => global_row_range.0,
            FailurePoint::Row { global_row, .. } => *global_row,
        }
    }

    pub fn batch_num(&self) -> usize {
        match self {
            FailurePoint::Batch { batch_num, .. } | FailurePoint::Row { batch_num, .. } => {
                *batch_num
            }
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestStats {
    /// Rows selected for this run
    pub total: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Batches handed to the sink, including failed ones
    pub batches_sent: usize,
    /// Stopped early because of a failure
    pub aborted: bool,
    /// First failure of the run
    pub failed_at: Option<FailurePoint>,
}

impl IngestStats {
    /// Rows accounted for so far
    pub fn processed(&self) -> usize {
        self.inserted + self.skipped + self.errors
    }

    pub fn is_clean(&self) -> bool {
        self.errors == 0 && !self.aborted
    }

    /// Process exit status for a finished run: 0 only when clean
    pub fn exit_code(&self) -> i32 {
        if self.is_clean() {
            EXIT_OK
        } else {
            EXIT_FAILURE
        }
    }

    fn record_failure(&mut self, failure: FailurePoint) {
        if self.failed_at.is_none() {
            self.failed_at = Some(failure);
        }
    }
}

/// How a command-line ingestion run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Rows were uploaded (or dry-run mapped)
    Finished(IngestStats),
    /// The operator answered no at the confirmation prompt
    Declined,
    /// Only the mapping table was printed
    MappingDumped,
    /// The row window was empty
    NothingToDo,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Finished(stats) => stats.exit_code(),
            RunOutcome::Declined | RunOutcome::MappingDumped | RunOutcome::NothingToDo => EXIT_OK,
        }
    }
}

/// Receives progress events from an [`Uploader`]
pub trait ProgressReporter {
    fn batch_started(&mut self, batch_num: usize, size: usize, global_row_range: (usize, usize));
    fn batch_committed(
        &mut self,
        batch_num: usize,
        inserted: usize,
        skipped: usize,
        processed: usize,
        total: usize,
    );
    fn batch_failed(&mut self, failure: &FailurePoint);
    fn row_failed(&mut self, failure: &FailurePoint);
    fn finished(&mut self, stats: &IngestStats, dry_run: bool);
}

/// Reporter that writes everything through the `log` facade
#[derive(Debug, Default)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn batch_started(&mut self, batch_num: usize, size: usize, global_row_range: (usize, usize)) {
        info!(
            "Sending batch {} ({} galaxies, rows {}-{})",
            batch_num, size, global_row_range.0, global_row_range.1
        );
    }

    fn batch_committed(
        &mut self,
        batch_num: usize,
        inserted: usize,
        skipped: usize,
        processed: usize,
        total: usize,
    ) {
        if skipped > 0 {
            info!(
                "Batch {}: inserted {}, skipped {} existing",
                batch_num, inserted, skipped
            );
        } else {
            info!("Batch {}: inserted {}", batch_num, inserted);
        }
        info!("{}", progress_line(processed, total));
    }

    fn batch_failed(&mut self, failure: &FailurePoint) {
        for line in failure_lines(failure) {
            error!("{}", line);
        }
    }

    fn row_failed(&mut self, failure: &FailurePoint) {
        if let FailurePoint::Row {
            global_row,
            error,
            first_unsent_row,
            ..
        } = failure
        {
            error!("Row {} failed: {}", global_row, error);
            if first_unsent_row.is_some() {
                for line in failure_lines(failure) {
                    error!("{}", line);
                }
            }
        }
    }

    fn finished(&mut self, stats: &IngestStats, dry_run: bool) {
        for line in summary_lines(stats, dry_run) {
            info!("{}", line);
        }
        if let Some(failure) = &stats.failed_at {
            warn!("{}", resume_hint(failure));
        }
    }
}

/// `Progress: n/total (p%)`
pub fn progress_line(processed: usize, total: usize) -> String {
    let percent = if total == 0 {
        100.0
    } else {
        processed as f64 * 100.0 / total as f64
    };
    format!("Progress: {}/{} ({:.1}%)", processed, total, percent)
}

pub fn resume_hint(failure: &FailurePoint) -> String {
    format!(
        "To resume from the failed point, re-run with --offset {}",
        failure.resume_offset()
    )
}

/// Boxed block describing a failure
pub fn failure_lines(failure: &FailurePoint) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![rule.clone()];
    match failure {
        FailurePoint::Batch {
            batch_num,
            batch_size,
            local_row_range,
            global_row_range,
            error,
            detail,
            rolled_back,
        } => {
            lines.push(format!("BATCH {} FAILED ({} galaxies)", batch_num, batch_size));
            lines.push(format!(
                "  Rows in this run:   {}-{}",
                local_row_range.0, local_row_range.1
            ));
            lines.push(format!(
                "  Rows in input file: {}-{}",
                global_row_range.0, global_row_range.1
            ));
            lines.push(format!("  Error:  {}", error));
            lines.push(format!("  Detail: {}", detail));
            lines.push(format!(
                "  Rolled back: {}",
                if *rolled_back { "yes" } else { "no" }
            ));
        }
        FailurePoint::Row {
            batch_num,
            local_row,
            global_row,
            error,
            detail,
            first_unsent_row,
        } => {
            lines.push(format!("ROW {} FAILED (batch {})", global_row, batch_num));
            lines.push(format!("  Row in this run: {}", local_row));
            lines.push(format!("  Error:  {}", error));
            lines.push(format!("  Detail: {}", detail));
            if let Some(unsent) = first_unsent_row {
                lines.push(format!(
                    "  First unsent row: {} (rows {}-{} were buffered and not sent)",
                    unsent,
                    unsent,
                    global_row.saturating_sub(1)
                ));
            }
        }
    }
    lines.push(format!("  {}", resume_hint(failure)));
    lines.push(rule);
    lines
}

/// `INGESTION SUMMARY` block
pub fn summary_lines(stats: &IngestStats, dry_run: bool) -> Vec<String> {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        rule.clone(),
        if dry_run {
            "INGESTION SUMMARY (dry run)".to_string()
        } else {
            "INGESTION SUMMARY".to_string()
        },
        rule.clone(),
        format!("Total rows:    {}", stats.total),
        format!("Inserted:      {}", stats.inserted),
        format!("Skipped:       {}", stats.skipped),
        format!("Errors:        {}", stats.errors),
        format!("Batches sent:  {}", stats.batches_sent),
    ];
    if stats.aborted {
        lines.push("Run aborted after the first failure".to_string());
    }
    if dry_run {
        lines.push("Dry run: nothing was sent".to_string());
    }
    lines.push(rule);
    lines
}

/// Drives rows through extraction, shaping and batched upload
pub struct Uploader<S: BatchSink> {
    sink: S,
    options: UploadOptions,
    reporter: Box<dyn ProgressReporter>,
    state: BatchState,
}

impl<S: BatchSink> Uploader<S> {
    /// Uploader reporting through [`LogReporter`]
    pub fn new(sink: S, options: UploadOptions) -> Self {
        Self {
            sink,
            options,
            reporter: Box::new(LogReporter),
            state: BatchState::Accumulating,
        }
    }

    pub fn with_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    fn transition(&mut self, next: BatchState) {
        if self.state != next {
            debug!("Batch state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Upload every row from `rows`.
    ///
    /// `total` is only used for progress output. Batch and row failures are
    /// reported in the returned stats; `Err` is reserved for failures that
    /// make the run itself meaningless.
    pub fn run<I>(&mut self, rows: I, total: usize, mapping: &MappingNode) -> Result<IngestStats>
    where
        I: IntoIterator<Item = Result<SourceRow>>,
    {
        let batch_size = self.options.batch_size.max(1);
        let offset = self.options.global_offset;

        let mut stats = IngestStats {
            total,
            ..Default::default()
        };
        let mut buffer: Vec<ShapedRecord> = Vec::with_capacity(batch_size);
        let mut buffer_start = 0;
        let mut batch_num = 0;
        let mut last_local = 0;

        self.state = BatchState::Accumulating;
        let mut rows = rows.into_iter().enumerate().peekable();

        while let Some((local, row)) = rows.next() {
            let global = offset + local;
            last_local = local;
            match row.and_then(|r| prepare_row(&r, mapping, global)) {
                Ok(record) => {
                    if buffer.is_empty() {
                        buffer_start = local;
                    }
                    buffer.push(record);
                }
                Err(e) => {
                    stats.errors += 1;
                    let unsent = (!self.options.continue_on_error && !buffer.is_empty())
                        .then_some(offset + buffer_start);
                    let failure = row_failure(&e, batch_num + 1, (local, global), unsent);
                    self.reporter.row_failed(&failure);
                    stats.record_failure(failure);

                    if !self.options.continue_on_error {
                        stats.aborted = true;
                        self.transition(BatchState::Terminated);
                        self.reporter.finished(&stats, self.options.dry_run);
                        return Ok(stats);
                    }
                    continue;
                }
            }

            if buffer.len() == batch_size {
                batch_num += 1;
                let last = rows.peek().is_none();
                let committed =
                    self.send_batch(&buffer, batch_num, (buffer_start, local), &mut stats, last)?;
                buffer.clear();
                if !committed && !self.options.continue_on_error {
                    stats.aborted = true;
                    self.transition(BatchState::Terminated);
                    self.reporter.finished(&stats, self.options.dry_run);
                    return Ok(stats);
                }
                self.transition(BatchState::Accumulating);
            }
        }

        if !buffer.is_empty() {
            batch_num += 1;
            let committed =
                self.send_batch(&buffer, batch_num, (buffer_start, last_local), &mut stats, true)?;
            buffer.clear();
            if !committed && !self.options.continue_on_error {
                stats.aborted = true;
            }
        }

        self.transition(BatchState::Terminated);
        self.reporter.finished(&stats, self.options.dry_run);
        Ok(stats)
    }

    fn send_batch(
        &mut self,
        buffer: &[ShapedRecord],
        batch_num: usize,
        local_range: (usize, usize),
        stats: &mut IngestStats,
        last: bool,
    ) -> Result<bool> {
        let offset = self.options.global_offset;
        let global_range = (offset + local_range.0, offset + local_range.1);
        let size = buffer.len();
        let processed = local_range.1 + 1;

        self.transition(BatchState::Sending);
        self.reporter.batch_started(batch_num, size, global_range);

        if self.options.dry_run {
            let payload = batch_payload(buffer)?;
            debug!("Dry run: batch {} payload is {} bytes", batch_num, payload.len());
            stats.inserted += size;
            stats.batches_sent += 1;
            self.transition(BatchState::Committed);
            self.reporter
                .batch_committed(batch_num, size, 0, processed, stats.total);
            return Ok(true);
        }

        let outcome = self.sink.send(buffer);
        stats.batches_sent += 1;

        let failure = match outcome {
            Ok(response) if response.is_success() => {
                let parsed = response.parsed();
                let inserted = parsed.inserted.map_or(size, |n| n as usize);
                let skipped = parsed.skipped.map_or(0, |n| n as usize);
                stats.inserted += inserted;
                stats.skipped += skipped;
                self.transition(BatchState::Committed);
                self.reporter
                    .batch_committed(batch_num, inserted, skipped, processed, stats.total);
                None
            }
            Ok(response) => Some(FailurePoint::Batch {
                batch_num,
                batch_size: size,
                local_row_range: local_range,
                global_row_range: global_range,
                error: response.error_message(),
                detail: response.error_detail(),
                rolled_back: response.parsed().rollback.unwrap_or(false),
            }),
            Err(e) => Some(FailurePoint::Batch {
                batch_num,
                batch_size: size,
                local_row_range: local_range,
                global_row_range: global_range,
                error: e.to_string(),
                detail: "No response received".to_string(),
                rolled_back: false,
            }),
        };

        let committed = failure.is_none();
        if let Some(failure) = failure {
            stats.errors += size;
            self.transition(BatchState::RolledBack);
            self.reporter.batch_failed(&failure);
            stats.record_failure(failure);
        }

        let terminating = last || (!committed && !self.options.continue_on_error);
        if !terminating && !self.options.pause.is_zero() {
            thread::sleep(self.options.pause);
        }

        Ok(committed)
    }
}

fn row_failure(
    error: &IngestError,
    batch_num: usize,
    (local_row, global_row): (usize, usize),
    first_unsent_row: Option<usize>,
) -> FailurePoint {
    let detail = match error {
        IngestError::Row { .. } => "Record could not be prepared for upload",
        _ => "Row could not be read from the input",
    };
    FailurePoint::Row {
        batch_num,
        local_row,
        global_row,
        error: error.to_string(),
        detail: detail.to_string(),
        first_unsent_row,
    }
}
