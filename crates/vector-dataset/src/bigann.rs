//! Binary data sets in the big-ann benchmark layout.
//!
//! Layout: a `u32` little-endian record count, a `u32` little-endian
//! dimension, then `count * dimension` elements row-major.

use crate::error::DataSetError;
use crate::DataSet;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER_BYTES: u64 = 8;

/// A fixed-width element of a big-ann record.
pub trait Element: Sized {
    /// Encoded width in bytes.
    const BYTES: usize;

    /// Read one element.
    fn read_from(reader: &mut impl Read) -> std::io::Result<Self>;

    /// Write one element.
    fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()>;
}

impl Element for f32 {
    const BYTES: usize = 4;

    fn read_from(reader: &mut impl Read) -> std::io::Result<Self> {
        reader.read_f32::<LittleEndian>()
    }

    fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_f32::<LittleEndian>(*self)
    }
}

impl Element for i32 {
    const BYTES: usize = 4;

    fn read_from(reader: &mut impl Read) -> std::io::Result<Self> {
        reader.read_i32::<LittleEndian>()
    }

    fn write_to(&self, writer: &mut impl Write) -> std::io::Result<()> {
        writer.write_i32::<LittleEndian>(*self)
    }
}

/// Reader over a big-ann file.
#[derive(Debug)]
pub struct BigAnnDataSet<T> {
    path: PathBuf,
    reader: BufReader<File>,
    num_records: u64,
    dimension: usize,
    cursor: u64,
    _element: PhantomData<T>,
}

impl<T: Element> BigAnnDataSet<T> {
    /// Open a big-ann file and read its header.
    pub fn open(path: &Path) -> Result<Self, DataSetError> {
        if !path.exists() {
            return Err(DataSetError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let num_records = reader.read_u32::<LittleEndian>()? as u64;
        let dimension = reader.read_u32::<LittleEndian>()? as usize;
        if dimension == 0 {
            return Err(DataSetError::Malformed {
                path: path.to_path_buf(),
                reason: "record dimension is zero".to_string(),
            });
        }
        debug!(
            path = %path.display(),
            num_records,
            dimension,
            "opened bigann data set"
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader,
            num_records,
            dimension,
            cursor: 0,
            _element: PhantomData,
        })
    }
}

impl<T: Element> DataSet<T> for BigAnnDataSet<T> {
    fn num_records(&self) -> u64 {
        self.num_records
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn seek(&mut self, offset: u64) -> Result<(), DataSetError> {
        let record_bytes = (self.dimension * T::BYTES) as u64;
        self.reader
            .seek(SeekFrom::Start(HEADER_BYTES + offset * record_bytes))?;
        self.cursor = offset;
        Ok(())
    }

    fn read(&mut self, max_records: usize) -> Result<Vec<Vec<T>>, DataSetError> {
        let remaining = self.num_records.saturating_sub(self.cursor);
        let to_read = (max_records as u64).min(remaining) as usize;
        let mut records = Vec::with_capacity(to_read);
        for _ in 0..to_read {
            let mut record = Vec::with_capacity(self.dimension);
            for _ in 0..self.dimension {
                record.push(T::read_from(&mut self.reader).map_err(|e| {
                    DataSetError::Malformed {
                        path: self.path.clone(),
                        reason: format!("truncated record at offset {}: {e}", self.cursor),
                    }
                })?);
            }
            records.push(record);
            self.cursor += 1;
        }
        Ok(records)
    }
}

/// Write records to a big-ann file. All records must share one dimension.
pub fn write_data_set<T: Element>(path: &Path, records: &[Vec<T>]) -> Result<(), DataSetError> {
    let dimension = records.first().map(|r| r.len()).unwrap_or(0);
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_u32::<LittleEndian>(records.len() as u32)?;
    writer.write_u32::<LittleEndian>(dimension as u32)?;
    for record in records {
        for element in record {
            element.write_to(&mut writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}
