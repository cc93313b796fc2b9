use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::error::Result;
use crate::raster::{AspectRatio, RasterImage};

/// Finished, encoded image ready for a persistence collaborator.
///
/// Also usable as a reference image for the next generation call.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageRecord {
    pub id: Uuid,
    pub label: String,
    pub aspect_ratio: AspectRatio,
    /// Milliseconds since the Unix epoch.
    pub created_at_ms: u64,
    /// PNG-encoded pixels.
    pub png: Vec<u8>,
}

impl ImageRecord {
    /// New record with a fresh id and the current time.
    pub fn new(label: String, aspect_ratio: AspectRatio, png: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label,
            aspect_ratio,
            created_at_ms: now_millis(),
            png,
        }
    }

    pub fn to_raster(&self) -> Result<RasterImage> {
        RasterImage::decode(&self.png)
    }
}

/// Label for an edited derivative of `source`: `"<source> <suffix>"`.
/// Re-editing an already derived image does not stack the suffix.
pub fn derive_label(source: &str, suffix: &str) -> String {
    let source = source.trim();
    if suffix.is_empty() || source.ends_with(suffix) {
        return source.to_string();
    }
    if source.is_empty() {
        return suffix.to_string();
    }
    format!("{} {}", source, suffix)
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Where finished records go. Storage format and location belong to the sink.
pub trait ArtifactSink {
    fn store(&mut self, record: ImageRecord) -> Result<()>;
}

/// Keeps records in memory, in arrival order.
#[derive(Default, Debug)]
pub struct MemorySink {
    pub records: Vec<ImageRecord>,
}

impl ArtifactSink for MemorySink {
    fn store(&mut self, record: ImageRecord) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_derive_once() {
        assert_eq!(derive_label("Panel 2", "(masked)"), "Panel 2 (masked)");
        assert_eq!(derive_label("Panel 2 (masked)", "(masked)"), "Panel 2 (masked)");
        assert_eq!(derive_label("  ", "(masked)"), "(masked)");
    }

    #[test]
    fn new_records_get_fresh_ids() {
        let a = ImageRecord::new("a".into(), AspectRatio::new(1, 1), vec![]);
        let b = ImageRecord::new("a".into(), AspectRatio::new(1, 1), vec![]);
        assert_ne!(a.id, b.id);
        assert!(a.created_at_ms > 0);
    }

    #[test]
    fn memory_sink_keeps_order() {
        let mut sink = MemorySink::default();
        for label in ["one", "two"] {
            sink.store(ImageRecord::new(label.into(), AspectRatio::new(4, 3), vec![]))
                .unwrap();
        }
        let labels: Vec<&str> = sink.records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["one", "two"]);
    }
}
