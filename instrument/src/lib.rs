//! Event tables for barter runs.
//!
//! A `tracing` subscriber that files every info-level event into a table named
//! after the event's target, one column per field. Columns appear the first
//! time a field is seen; rows that lack a field hold that column's default.
//!
//! # Usage
//!
//! ```ignore
//! // In simulation code:
//! tracing::info!(target: "trade", tick, initiator, partner, committed);
//!
//! // In a test:
//! tracing::subscriber::with_default(instrument::TableSubscriber::default(), || {
//!     // ... run ticks ...
//! });
//! let log = instrument::drain();
//! let trades = log.to_dataframes()?.remove("trade");
//! ```

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Record};
use tracing::{Event, Id, Metadata, Subscriber};

// ============================================================================
// Columns
// ============================================================================

/// One field value as it came off an event.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    U64(u64),
    I64(i64),
    F64(f64),
    Bool(bool),
    Str(String),
}

/// A typed column. The type is fixed by the first value recorded into it.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    U64(Vec<u64>),
    I64(Vec<i64>),
    F64(Vec<f64>),
    Bool(Vec<bool>),
    Str(Vec<String>),
}

impl Column {
    fn for_cell(cell: &Cell, rows: usize) -> Self {
        match cell {
            Cell::U64(_) => Column::U64(vec![0; rows]),
            Cell::I64(_) => Column::I64(vec![0; rows]),
            Cell::F64(_) => Column::F64(vec![0.0; rows]),
            Cell::Bool(_) => Column::Bool(vec![false; rows]),
            Cell::Str(_) => Column::Str(vec![String::new(); rows]),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::U64(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Str(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn pad_to(&mut self, rows: usize) {
        let missing = rows.saturating_sub(self.len());
        match self {
            Column::U64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Column::I64(v) => v.extend(std::iter::repeat_n(0, missing)),
            Column::F64(v) => v.extend(std::iter::repeat_n(0.0, missing)),
            Column::Bool(v) => v.extend(std::iter::repeat_n(false, missing)),
            Column::Str(v) => v.extend(std::iter::repeat_n(String::new(), missing)),
        }
    }

    /// Append `cell`, converting numbers between numeric columns. A cell the
    /// column cannot hold leaves the slot to padding.
    fn push(&mut self, cell: Cell) {
        match (self, cell) {
            (Column::U64(v), Cell::U64(x)) => v.push(x),
            (Column::U64(v), Cell::I64(x)) if x >= 0 => v.push(x as u64),
            (Column::I64(v), Cell::I64(x)) => v.push(x),
            (Column::I64(v), Cell::U64(x)) => v.push(x as i64),
            (Column::F64(v), Cell::F64(x)) => v.push(x),
            (Column::F64(v), Cell::U64(x)) => v.push(x as f64),
            (Column::F64(v), Cell::I64(x)) => v.push(x as f64),
            (Column::Bool(v), Cell::Bool(x)) => v.push(x),
            (Column::Str(v), Cell::Str(x)) => v.push(x),
            (Column::Str(v), other) => v.push(format!("{other:?}")),
            _ => {}
        }
    }

    fn to_polars(&self, name: &str) -> polars::prelude::Column {
        use polars::prelude::Column as PlColumn;
        match self {
            Column::U64(v) => PlColumn::new(name.into(), v),
            Column::I64(v) => PlColumn::new(name.into(), v),
            Column::F64(v) => PlColumn::new(name.into(), v),
            Column::Bool(v) => PlColumn::new(name.into(), v),
            Column::Str(v) => PlColumn::new(name.into(), v),
        }
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Rows recorded under one target. Columns are kept in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventTable {
    columns: BTreeMap<String, Column>,
    rows: usize,
}

impl EventTable {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    fn record(&mut self, name: &str, cell: Cell) {
        let rows = self.rows;
        let column = self
            .columns
            .entry(name.to_string())
            .or_insert_with(|| Column::for_cell(&cell, rows));
        // A field repeated within one event keeps its first value.
        if column.len() == rows {
            column.push(cell);
        }
    }

    fn finish_row(&mut self) {
        self.rows += 1;
        for column in self.columns.values_mut() {
            column.pad_to(self.rows);
        }
    }

    pub fn to_dataframe(&self) -> PolarsResult<DataFrame> {
        DataFrame::new(
            self.columns
                .iter()
                .map(|(name, column)| column.to_polars(name))
                .collect(),
        )
    }
}

/// Every table recorded on this thread, keyed by target.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventLog {
    pub tables: BTreeMap<String, EventTable>,
}

impl EventLog {
    pub fn table(&self, target: &str) -> Option<&EventTable> {
        self.tables.get(target)
    }

    /// Row count of `target`, zero when nothing was recorded under it
    pub fn rows(&self, target: &str) -> usize {
        self.table(target).map_or(0, EventTable::rows)
    }

    pub fn to_dataframes(&self) -> PolarsResult<BTreeMap<String, DataFrame>> {
        self.tables
            .iter()
            .map(|(name, table)| Ok((name.clone(), table.to_dataframe()?)))
            .collect()
    }
}

thread_local! {
    static LOG: RefCell<EventLog> = RefCell::default();
}

/// Take everything recorded on this thread so far.
pub fn drain() -> EventLog {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

pub fn clear() {
    LOG.with(|log| *log.borrow_mut() = EventLog::default());
}

// ============================================================================
// Subscriber
// ============================================================================

struct RowVisitor<'a> {
    table: &'a mut EventTable,
}

impl Visit for RowVisitor<'_> {
    fn record_u64(&mut self, field: &Field, value: u64) {
        self.table.record(field.name(), Cell::U64(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.table.record(field.name(), Cell::I64(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.table.record(field.name(), Cell::F64(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.table.record(field.name(), Cell::Bool(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.table.record(field.name(), Cell::Str(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.table.record(field.name(), Cell::Str(format!("{value:?}")));
    }
}

/// Files info-level events into the thread-local `EventLog`.
///
/// With no targets configured every target is recorded.
#[derive(Debug, Clone, Default)]
pub struct TableSubscriber {
    targets: Vec<String>,
}

impl TableSubscriber {
    /// Record only events whose target is one of `targets`.
    pub fn only<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
        }
    }

    fn wants(&self, target: &str) -> bool {
        self.targets.is_empty() || self.targets.iter().any(|t| t == target)
    }
}

impl Subscriber for TableSubscriber {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.is_event()
            && *metadata.level() <= tracing::Level::INFO
            && self.wants(metadata.target())
    }

    fn new_span(&self, _span: &Attributes<'_>) -> Id {
        // Spans are not recorded
        Id::from_u64(1)
    }

    fn record(&self, _span: &Id, _values: &Record<'_>) {}

    fn record_follows_from(&self, _span: &Id, _follows: &Id) {}

    fn event(&self, event: &Event<'_>) {
        let target = event.metadata().target();
        LOG.with(|log| {
            let mut log = log.borrow_mut();
            let table = log.tables.entry(target.to_string()).or_default();
            event.record(&mut RowVisitor { table: &mut *table });
            table.finish_row();
        });
    }

    fn enter(&self, _span: &Id) {}

    fn exit(&self, _span: &Id) {}
}

/// Install a record-everything subscriber as the process default.
/// Later calls are no-ops.
pub fn install_subscriber() {
    let _ = tracing::subscriber::set_global_default(TableSubscriber::default());
}

// ============================================================================
// Parquet export
// ============================================================================

fn io_error(error: std::io::Error) -> PolarsError {
    PolarsError::IO {
        error: error.into(),
        msg: None,
    }
}

/// Write each frame to `{dir}/{name}.parquet`, creating `dir` if needed.
pub fn save_parquet(frames: &mut BTreeMap<String, DataFrame>, dir: &Path) -> PolarsResult<()> {
    std::fs::create_dir_all(dir).map_err(io_error)?;
    for (name, frame) in frames.iter_mut() {
        let file = std::fs::File::create(dir.join(format!("{name}.parquet"))).map_err(io_error)?;
        ParquetWriter::new(file).finish(frame)?;
    }
    Ok(())
}

/// Directory-safe form of a run name
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(60)
        .collect()
}

/// Records one run and writes it to parquet when dropped.
///
/// Creating the guard clears this thread's log and installs the global
/// subscriber. Output goes to `{parent}/{name}_seed{seed}/`, one file per
/// target plus an empty `_ready` marker written last.
pub struct ScopedRecorder {
    run_dir: PathBuf,
    frames: Option<BTreeMap<String, DataFrame>>,
}

impl ScopedRecorder {
    pub fn new(parent: impl Into<PathBuf>, name: &str, seed: u64) -> Self {
        clear();
        install_subscriber();
        Self {
            run_dir: parent.into().join(format!("{}_seed{seed}", sanitize(name))),
            frames: None,
        }
    }

    /// Frames recorded so far. The first call drains the log; later calls
    /// return the same frames.
    pub fn frames(&mut self) -> PolarsResult<&BTreeMap<String, DataFrame>> {
        if self.frames.is_none() {
            self.frames = Some(drain().to_dataframes()?);
        }
        Ok(self.frames.get_or_insert_with(BTreeMap::new))
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    fn flush(&mut self) -> PolarsResult<usize> {
        let mut frames = match self.frames.take() {
            Some(frames) => frames,
            None => drain().to_dataframes()?,
        };
        if frames.is_empty() {
            return Ok(0);
        }
        save_parquet(&mut frames, &self.run_dir)?;
        std::fs::File::create(self.run_dir.join("_ready")).map_err(io_error)?;
        Ok(frames.len())
    }
}

impl Drop for ScopedRecorder {
    fn drop(&mut self) {
        match self.flush() {
            Ok(0) => {}
            Ok(tables) => eprintln!(
                "ScopedRecorder: wrote {tables} tables to {}",
                self.run_dir.display()
            ),
            Err(e) => eprintln!(
                "ScopedRecorder({}): failed to write parquet: {e}",
                self.run_dir.display()
            ),
        }
    }
}
