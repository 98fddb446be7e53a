//! Grid and world file writers.

use crate::grid::Grid;
use crate::types::ReliefResult;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// No-data sentinel for `grid`: the shortest value of the form `-9999...9`
/// that is smaller than every valid cell.
pub fn void_value(grid: &Grid) -> String {
    let (min, _) = grid.min_max();
    let mut value = String::from("-9999");
    loop {
        // compare as read back, in single precision
        let parsed: f32 = value.parse().unwrap_or(f32::NEG_INFINITY);
        if !(parsed.is_finite() && parsed >= min) {
            break;
        }
        value.push('9');
    }
    value
}

/// Write `grid` in ESRI ASCII grid format. Void cells are written as
/// [`void_value`].
pub fn write_ascii_grid<W: Write>(grid: &Grid, mut writer: W) -> ReliefResult<()> {
    let no_data = void_value(grid);
    writeln!(writer, "ncols {}", grid.cols())?;
    writeln!(writer, "nrows {}", grid.rows())?;
    writeln!(writer, "xllcorner {}", grid.west())?;
    writeln!(writer, "yllcorner {}", grid.south())?;
    writeln!(writer, "cellsize {}", grid.cell_size())?;
    writeln!(writer, "nodata_value {}", no_data)?;

    for row in grid.values().rows() {
        let mut first = true;
        for &v in row.iter() {
            if !first {
                writer.write_all(b" ")?;
            }
            first = false;
            if v.is_nan() {
                writer.write_all(no_data.as_bytes())?;
            } else {
                write!(writer, "{}", v)?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_ascii_grid<P: AsRef<Path>>(grid: &Grid, path: P) -> ReliefResult<()> {
    log::info!("Writing ASCII grid to: {}", path.as_ref().display());
    let file = File::create(path.as_ref())?;
    write_ascii_grid(grid, BufWriter::new(file))
}

/// Path of the world file that accompanies an image: `tif` becomes `tfw`,
/// `png` becomes `pgw`, short extensions get a `w` appended.
pub fn world_file_path<P: AsRef<Path>>(image_path: P) -> PathBuf {
    let path = image_path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let chars: Vec<char> = ext.chars().collect();
    let world_ext = match chars.len() {
        0 => "w".to_string(),
        1 | 2 => format!("{}w", ext),
        n => format!("{}{}w", chars[0], chars[n - 1]),
    };
    path.with_extension(world_ext)
}

/// Write a world file for a north-up image with square pixels.
pub fn write_world_file<P: AsRef<Path>>(
    path: P,
    cell_size: f64,
    west: f64,
    north: f64,
) -> ReliefResult<()> {
    log::debug!("Writing world file to: {}", path.as_ref().display());
    let mut writer = BufWriter::new(File::create(path.as_ref())?);
    writeln!(writer, "{}", cell_size)?;
    writeln!(writer, "0")?;
    writeln!(writer, "0")?;
    writeln!(writer, "{}", -cell_size)?;
    writeln!(writer, "{}", west)?;
    writeln!(writer, "{}", north)?;
    writer.flush()?;
    Ok(())
}
