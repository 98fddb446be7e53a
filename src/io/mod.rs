//! Grid input and output

pub mod ascii_grid;
pub mod export;

pub use ascii_grid::{read_ascii_grid, AsciiGridHeader, AsciiGridReader, GridReaderParams};
pub use export::{
    export_ascii_grid, void_value, world_file_path, write_ascii_grid, write_world_file,
};
