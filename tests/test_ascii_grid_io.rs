use relief_pyramid::io::{
    export_ascii_grid, read_ascii_grid, void_value, world_file_path, write_world_file,
    AsciiGridReader, GridReaderParams,
};
use relief_pyramid::{CancelFlag, Grid, NoProgress, ProgressMonitor, ReliefError};
use std::io::{self, BufReader, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn grid_text(cols: usize, rows: usize, body_values: usize) -> String {
    let mut text = format!(
        "ncols {}\nnrows {}\nxllcorner 500000\nyllcorner 4000000\n\
         cellsize 25\nNODATA_value -9999\n",
        cols, rows
    );
    for i in 0..body_values {
        let v = if i == 7 { -9999.0 } else { i as f32 * 0.5 };
        text.push_str(&v.to_string());
        text.push(if (i + 1) % cols == 0 { '\n' } else { ' ' });
    }
    text
}

fn read(text: String) -> Result<Option<Grid>, ReliefError> {
    AsciiGridReader::read(
        Cursor::new(text.into_bytes()),
        &GridReaderParams::default(),
        &NoProgress,
    )
}

#[test]
fn test_short_body_is_corrupt() {
    init_logging();
    let err = read(grid_text(10, 12, 10 * 12 - 1)).unwrap_err();
    assert!(matches!(err, ReliefError::CorruptGrid(_)), "got {:?}", err);
}

#[test]
fn test_long_body_is_corrupt() {
    let err = read(grid_text(10, 12, 10 * 12 + 1)).unwrap_err();
    assert!(matches!(err, ReliefError::CorruptGrid(_)), "got {:?}", err);
}

#[test]
fn test_exact_body_is_read_in_order() {
    init_logging();
    let grid = read(grid_text(10, 12, 120))
        .expect("Failed to read grid")
        .expect("Read was cancelled");
    assert_eq!(grid.cols(), 10);
    assert_eq!(grid.rows(), 12);
    assert_eq!(grid.cell_size(), 25.0);
    assert_eq!(grid.west(), 500000.0);
    assert_eq!(grid.south(), 4000000.0);
    assert_eq!(grid.void_count(), 1);
    assert!(grid.value(7, 0).is_nan());
    assert_eq!(grid.value(0, 0), 0.0);
    assert_eq!(grid.value(9, 11), 119.0 * 0.5);
    assert_eq!(grid.value(3, 5), 53.0 * 0.5);
}

/// Cancels after a number of progress reports.
struct CancelAfter {
    reports: AtomicUsize,
    limit: usize,
}

impl ProgressMonitor for CancelAfter {
    fn progress(&self, _percent: u8) -> bool {
        self.reports.fetch_add(1, Ordering::SeqCst) + 1 < self.limit
    }

    fn is_cancelled(&self) -> bool {
        self.reports.load(Ordering::SeqCst) >= self.limit
    }
}

#[test]
fn test_cancel_during_read() {
    let monitor = CancelAfter {
        reports: AtomicUsize::new(0),
        limit: 3,
    };
    let params = GridReaderParams { queue_capacity: 2 };
    let result = AsciiGridReader::read(
        Cursor::new(grid_text(10, 200, 2000).into_bytes()),
        &params,
        &monitor,
    )
    .expect("Cancellation must not be an error");
    assert!(result.is_none());
}

#[test]
fn test_cancel_flag_before_read() {
    let flag = CancelFlag::new();
    flag.cancel();
    let result = AsciiGridReader::read(
        Cursor::new(grid_text(5, 5, 25).into_bytes()),
        &GridReaderParams::default(),
        &flag,
    )
    .expect("Cancellation must not be an error");
    assert!(result.is_none());
}

#[test]
fn test_export_and_read_back() {
    init_logging();
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("terrain.asc");

    let mut grid = Grid::new(6, 4, 10.0).expect("Failed to create grid");
    grid.set_west(100.0);
    grid.set_south(200.0);
    for row in 0..4 {
        for col in 0..6 {
            grid.set_value(col, row, -20000.0 + (row * 6 + col) as f32 * 1.25);
        }
    }
    grid.set_value(2, 1, f32::NAN);

    // the minimum is below -9999, so the sentinel needs more digits
    let sentinel: f64 = void_value(&grid).parse().expect("Sentinel is a number");
    assert!(sentinel <= -99999.0);

    export_ascii_grid(&grid, &path).expect("Failed to export grid");
    assert!(AsciiGridReader::can_read_path(&path));

    let read_back = read_ascii_grid(&path).expect("Failed to read grid");
    assert!(read_back.is_identical_in_size(&grid));
    assert_eq!(read_back.west(), 100.0);
    assert_eq!(read_back.south(), 200.0);
    assert!(read_back.value(2, 1).is_nan());
    for row in 0..4 {
        for col in 0..6 {
            let v = grid.value(col, row);
            if !v.is_nan() {
                assert_eq!(read_back.value(col, row), v);
            }
        }
    }
}

#[test]
fn test_void_value_for_shallow_grid() {
    let mut grid = Grid::new(3, 3, 1.0).expect("Failed to create grid");
    grid.set_value(1, 1, -9999.0);
    assert_eq!(void_value(&grid), "-99999");
}

#[test]
fn test_world_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let image = dir.path().join("relief.png");
    let world = world_file_path(&image);
    assert_eq!(world, dir.path().join("relief.pgw"));

    write_world_file(&world, 25.0, 500000.0, 4000300.0).expect("Failed to write world file");
    let text = std::fs::read_to_string(&world).expect("Failed to read world file");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["25", "0", "0", "-25", "500000", "4000300"]);
}

#[test]
fn test_missing_file() {
    let err = read_ascii_grid("/nonexistent/terrain.asc").unwrap_err();
    assert!(matches!(err, ReliefError::Io(_)));
}

#[test]
fn test_invalid_utf8_body_is_corrupt() {
    let mut bytes = b"ncols 3\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n".to_vec();
    bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
    bytes.extend_from_slice(b"7 8 9\n");
    let err = AsciiGridReader::read(Cursor::new(bytes), &GridReaderParams::default(), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, ReliefError::CorruptGrid(_)), "got {:?}", err);
}

/// Yields a header and some body lines, then fails. Records when it is
/// dropped, which happens when the reading thread finishes.
struct FailingSource {
    data: Cursor<Vec<u8>>,
    dropped: Arc<AtomicBool>,
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device lost"));
        }
        Ok(n)
    }
}

impl Drop for FailingSource {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_read_error_reaches_caller_after_threads_join() {
    init_logging();
    let text = grid_text(10, 40, 200);
    let dropped = Arc::new(AtomicBool::new(false));
    let source = FailingSource {
        data: Cursor::new(text.into_bytes()),
        dropped: Arc::clone(&dropped),
    };
    let params = GridReaderParams { queue_capacity: 1 };
    let err = AsciiGridReader::read(BufReader::new(source), &params, &NoProgress).unwrap_err();
    match err {
        ReliefError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::BrokenPipe),
        other => panic!("expected an I/O error, got {:?}", other),
    }
    assert!(dropped.load(Ordering::SeqCst));
}
