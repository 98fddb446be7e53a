//! Streaming reader for ESRI ASCII grids.
//!
//! The header is parsed on the calling thread. The body is then read by a
//! producer thread that forwards lines through a bounded channel to the
//! consumer, which tokenizes and parses the values while the producer keeps
//! reading. Either side stops as soon as the other fails.

use crate::grid::{Grid, MIN_GRID_SIZE};
use crate::progress::{NoProgress, ProgressMonitor};
use crate::types::{Elevation, ReliefError, ReliefResult};
use crossbeam_channel::{bounded, Receiver, Sender};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

/// Upper bound on the number of values allocated before the body is read.
const MAX_INITIAL_CAPACITY: usize = 1 << 20;

/// Reader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridReaderParams {
    /// Maximum number of lines buffered between reading and parsing
    pub queue_capacity: usize,
}

impl Default for GridReaderParams {
    fn default() -> Self {
        Self { queue_capacity: 64 }
    }
}

/// Header of an ESRI ASCII grid
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiGridHeader {
    pub cols: usize,
    pub rows: usize,
    pub west: f64,
    pub south: f64,
    pub cell_size: f64,
    /// Values equal to this are void
    pub no_data: Option<f32>,
}

/// True if the first token of a line starts a number, which ends the header.
fn starts_body(token: &str) -> bool {
    token
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
}

fn header_value<T: std::str::FromStr>(key: &str, value: Option<&str>) -> ReliefResult<T> {
    let value =
        value.ok_or_else(|| ReliefError::InvalidHeader(format!("missing value for {}", key)))?;
    value
        .parse()
        .map_err(|_| ReliefError::InvalidHeader(format!("invalid value '{}' for {}", value, key)))
}

impl AsciiGridHeader {
    /// Parse the header. Returns the header and the first line of the body,
    /// if any.
    pub fn parse<R: BufRead>(reader: &mut R) -> ReliefResult<(Self, Option<String>)> {
        let mut cols = None;
        let mut rows = None;
        let mut west = None;
        let mut south = None;
        let mut cell_size = None;
        let mut no_data = None;
        let mut first_body_line = None;

        let mut line = String::new();
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                continue;
            };
            if starts_body(key) {
                first_body_line = Some(line.clone());
                break;
            }
            let key = key.to_ascii_lowercase();
            let value = tokens.next();
            match key.as_str() {
                "ncols" => cols = Some(header_value::<usize>(&key, value)?),
                "nrows" => rows = Some(header_value::<usize>(&key, value)?),
                "xllcorner" | "xllcenter" => west = Some(header_value::<f64>(&key, value)?),
                "yllcorner" | "yllcenter" => south = Some(header_value::<f64>(&key, value)?),
                "cellsize" => cell_size = Some(header_value::<f64>(&key, value)?),
                "nodata_value" => no_data = Some(header_value::<f32>(&key, value)?),
                _ => {
                    return Err(ReliefError::InvalidHeader(format!(
                        "unknown header key '{}'",
                        key
                    )))
                }
            }
        }

        let missing = |name: &str| ReliefError::InvalidHeader(format!("missing {}", name));
        let header = Self {
            cols: cols.ok_or_else(|| missing("ncols"))?,
            rows: rows.ok_or_else(|| missing("nrows"))?,
            west: west.ok_or_else(|| missing("xllcorner"))?,
            south: south.ok_or_else(|| missing("yllcorner"))?,
            cell_size: cell_size.ok_or_else(|| missing("cellsize"))?,
            no_data,
        };
        if header.cols < MIN_GRID_SIZE
            || header.rows < MIN_GRID_SIZE
            || header.cols.checked_mul(header.rows).is_none()
            || !(header.cell_size > 0.0)
        {
            return Err(ReliefError::InvalidHeader(format!(
                "invalid grid dimensions {}x{} with cell size {}",
                header.cols, header.rows, header.cell_size
            )));
        }
        if header.no_data.is_none() {
            log::warn!("Grid header has no NODATA_value");
        }
        Ok((header, first_body_line))
    }

    pub fn cell_count(&self) -> usize {
        self.cols.saturating_mul(self.rows)
    }
}

/// Message from the line producer to the value consumer.
enum Message {
    Line(String),
    /// Terminal message; carries the producer's read error, if any.
    End(std::io::Result<()>),
}

/// Send body lines until end of input, a read error, or until the consumer
/// hangs up.
fn produce_lines<R: BufRead>(mut reader: R, first_line: Option<String>, tx: Sender<Message>) {
    if let Some(line) = first_line {
        if tx.send(Message::Line(line)).is_err() {
            return;
        }
    }
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) => {
                let _ = tx.send(Message::End(Ok(())));
                return;
            }
            Ok(_) => {
                if tx.send(Message::Line(line)).is_err() {
                    return;
                }
            }
            Err(e) => {
                let _ = tx.send(Message::End(Err(e)));
                return;
            }
        }
    }
}

/// Parse values in arrival order. Returns `None` if cancelled.
fn consume_values(
    rx: Receiver<Message>,
    header: &AsciiGridHeader,
    monitor: &dyn ProgressMonitor,
) -> ReliefResult<Option<Vec<Elevation>>> {
    let total = header.cell_count();
    let mut values: Vec<Elevation> = Vec::with_capacity(total.min(MAX_INITIAL_CAPACITY));
    let mut last_percent = 0u8;

    for message in rx.iter() {
        let line = match message {
            Message::Line(line) => line,
            Message::End(Ok(())) => break,
            Message::End(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                return Err(ReliefError::CorruptGrid(format!("unreadable grid body: {}", e)));
            }
            Message::End(Err(e)) => return Err(e.into()),
        };
        if monitor.is_cancelled() {
            return Ok(None);
        }
        for token in line.split_whitespace() {
            if values.len() == total {
                return Err(ReliefError::CorruptGrid(format!(
                    "more than {} values in grid body",
                    total
                )));
            }
            let v: Elevation = token
                .parse()
                .map_err(|_| ReliefError::CorruptGrid(format!("invalid value '{}'", token)))?;
            values.push(match header.no_data {
                Some(no_data) if v == no_data => Elevation::NAN,
                _ => v,
            });
        }

        let percent = (100 * (values.len() / header.cols) / header.rows) as u8;
        if percent != last_percent {
            last_percent = percent;
            if !monitor.progress(percent) {
                return Ok(None);
            }
        }
    }

    if values.len() != total {
        return Err(ReliefError::CorruptGrid(format!(
            "expected {} values, found {}",
            total,
            values.len()
        )));
    }
    Ok(Some(values))
}

/// ESRI ASCII grid reader
pub struct AsciiGridReader;

impl AsciiGridReader {
    /// Read a grid. Returns `Ok(None)` if the monitor cancels the read.
    pub fn read<R: BufRead + Send>(
        mut reader: R,
        params: &GridReaderParams,
        monitor: &dyn ProgressMonitor,
    ) -> ReliefResult<Option<Grid>> {
        let (header, first_line) = AsciiGridHeader::parse(&mut reader)?;
        log::debug!("ASCII grid header: {:?}", header);

        let (tx, rx) = bounded::<Message>(params.queue_capacity.max(1));
        let values = std::thread::scope(|s| {
            s.spawn(move || produce_lines(reader, first_line, tx));
            // dropping the receiver on return stops the producer
            consume_values(rx, &header, monitor)
        })?;

        let Some(values) = values else {
            log::info!("Reading ASCII grid cancelled");
            return Ok(None);
        };
        let array = Array2::from_shape_vec((header.rows, header.cols), values)
            .map_err(|e| ReliefError::CorruptGrid(e.to_string()))?;
        let grid = Grid::from_array(array, header.cell_size, header.west, header.south)?;
        log::info!("Read ASCII grid: {}", grid.shape_description());
        Ok(Some(grid))
    }

    pub fn read_path<P: AsRef<Path>>(
        path: P,
        params: &GridReaderParams,
        monitor: &dyn ProgressMonitor,
    ) -> ReliefResult<Option<Grid>> {
        log::info!("Reading ASCII grid from: {}", path.as_ref().display());
        let file = File::open(path.as_ref())?;
        Self::read(BufReader::new(file), params, monitor)
    }

    /// True if `reader` starts with a valid grid header.
    pub fn can_read<R: BufRead>(mut reader: R) -> bool {
        AsciiGridHeader::parse(&mut reader).is_ok()
    }

    pub fn can_read_path<P: AsRef<Path>>(path: P) -> bool {
        File::open(path.as_ref())
            .map(|f| Self::can_read(BufReader::new(f)))
            .unwrap_or(false)
    }
}

/// Read a grid file with default parameters and no cancellation.
pub fn read_ascii_grid<P: AsRef<Path>>(path: P) -> ReliefResult<Grid> {
    AsciiGridReader::read_path(path, &GridReaderParams::default(), &NoProgress)?
        .ok_or_else(|| ReliefError::InvalidArgument("grid reading was cancelled".to_string()))
}
