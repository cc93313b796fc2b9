use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::{ArtifactSink, ImageRecord};
use crate::error::{EditorError, Result};
use crate::raster::{AspectRatio, RasterImage};
use crate::log_info;

// ============================================================================
// PMR RECORD FILE FORMAT
// ============================================================================

/// Magic header for record files (v1)
const PMR_MAGIC_V1: &str = "PMR1";

/// Largest record file we are willing to read into memory.
const MAX_RECORD_BYTES: u64 = 512 * 1024 * 1024;

/// V1 serializable record file
#[derive(Serialize, Deserialize)]
struct RecordFileV1 {
    magic: String,
    id: String,
    label: String,
    aspect_w: u32,
    aspect_h: u32,
    created_at_ms: u64,
    png: Vec<u8>,
}

/// Error type for record file operations
#[derive(Debug)]
pub enum RecordError {
    Io(std::io::Error),
    Serialize(String),
    InvalidFormat(String),
}

impl std::fmt::Display for RecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordError::Io(e) => write!(f, "I/O error: {}", e),
            RecordError::Serialize(e) => write!(f, "Serialization error: {}", e),
            RecordError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for RecordError {}

impl From<std::io::Error> for RecordError {
    fn from(e: std::io::Error) -> Self {
        RecordError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for RecordError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        RecordError::Serialize(e.to_string())
    }
}

impl From<RecordError> for EditorError {
    fn from(e: RecordError) -> Self {
        match e {
            RecordError::Io(e) => EditorError::Io(e),
            other => EditorError::Encode(other.to_string()),
        }
    }
}

/// Write an [`ImageRecord`] as a `.pmr` file.
pub fn save_record(record: &ImageRecord, path: &Path) -> std::result::Result<(), RecordError> {
    let file = RecordFileV1 {
        magic: PMR_MAGIC_V1.to_string(),
        id: record.id.to_string(),
        label: record.label.clone(),
        aspect_w: record.aspect_ratio.width,
        aspect_h: record.aspect_ratio.height,
        created_at_ms: record.created_at_ms,
        png: record.png.clone(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    Ok(())
}

/// Read a `.pmr` file back into an [`ImageRecord`].
pub fn load_record(path: &Path) -> std::result::Result<ImageRecord, RecordError> {
    let len = std::fs::metadata(path)?.len();
    if len > MAX_RECORD_BYTES {
        return Err(RecordError::InvalidFormat(format!("file too large ({} bytes)", len)));
    }
    let raw = std::fs::read(path)?;
    if raw.len() < 12 {
        return Err(RecordError::InvalidFormat("File too small".into()));
    }

    // bincode encodes a String as: 8-byte length prefix + UTF-8 data.
    // The magic is 4 chars, so bytes 8..12 hold it.
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != PMR_MAGIC_V1 {
        return Err(RecordError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }

    let file: RecordFileV1 = bincode::deserialize(&raw)?;
    let id = Uuid::parse_str(&file.id)
        .map_err(|e| RecordError::InvalidFormat(format!("bad id: {}", e)))?;
    if file.aspect_w == 0 || file.aspect_h == 0 {
        return Err(RecordError::InvalidFormat("zero aspect ratio".into()));
    }
    Ok(ImageRecord {
        id,
        label: file.label,
        aspect_ratio: AspectRatio::new(file.aspect_w, file.aspect_h),
        created_at_ms: file.created_at_ms,
        png: file.png,
    })
}

/// Write a raster as PNG.
pub fn write_png(image: &RasterImage, path: &Path) -> Result<()> {
    let bytes = image.encode_png()?;
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

// ============================================================================
// DIRECTORY SINK
// ============================================================================

/// Stores each record as `<id>.png` plus `<id>.pmr` in one directory.
pub struct DirectorySink {
    dir: PathBuf,
    pub written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSink for DirectorySink {
    fn store(&mut self, record: ImageRecord) -> Result<()> {
        let stem = record.id.to_string();
        let png_path = self.dir.join(format!("{}.png", stem));
        let pmr_path = self.dir.join(format!("{}.pmr", stem));
        std::fs::write(&png_path, &record.png)?;
        save_record(&record, &pmr_path)?;
        log_info!("stored record '{}' at {}", record.label, pmr_path.display());
        self.written.push(pmr_path);
        Ok(())
    }
}
