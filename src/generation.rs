// ============================================================================
// GENERATION: request shape for the external image service + slicing
// ============================================================================

use std::fmt;

use crate::artifact::ImageRecord;
use crate::error::{EditorError, Result};
use crate::grid::{GridSpec, Tile, slice_panels};
use crate::raster::{AspectRatio, RasterImage};
use crate::{log_err, log_info};

/// Output size class requested from the service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ResolutionTier {
    #[default]
    OneK,
    TwoK,
    FourK,
}

impl ResolutionTier {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionTier::OneK => "1K",
            ResolutionTier::TwoK => "2K",
            ResolutionTier::FourK => "4K",
        }
    }

    /// Nominal long-edge pixel count.
    pub fn long_edge(&self) -> u32 {
        match self {
            ResolutionTier::OneK => 1024,
            ResolutionTier::TwoK => 2048,
            ResolutionTier::FourK => 4096,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "1K" => Some(ResolutionTier::OneK),
            "2K" => Some(ResolutionTier::TwoK),
            "4K" => Some(ResolutionTier::FourK),
            _ => None,
        }
    }
}

/// A labelled image the service should draw on (character sheet, location, ...).
#[derive(Clone, Debug)]
pub struct ReferenceImage {
    pub label: String,
    pub image: RasterImage,
}

impl ReferenceImage {
    /// Reuse a finished record (e.g. an exported edit) as a reference.
    pub fn from_record(record: &ImageRecord) -> Result<Self> {
        Ok(Self {
            label: record.label.clone(),
            image: record.to_raster()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct GenerationRequest {
    pub prompt: String,
    pub grid: GridSpec,
    pub aspect_ratio: AspectRatio,
    pub resolution: ResolutionTier,
    pub references: Vec<ReferenceImage>,
}

/// Raw service output: one encoded composite plus an optional caption.
#[derive(Clone, Debug)]
pub struct GeneratedComposite {
    pub encoded: Vec<u8>,
    pub label: Option<String>,
}

/// Whatever went wrong on the service side, as the service reported it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationError(pub String);

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for GenerationError {}

impl From<GenerationError> for EditorError {
    fn from(e: GenerationError) -> Self {
        EditorError::GenerationUpstream(e.0)
    }
}

/// The external synthesiser. Called once per request; retries, if any, are
/// the implementation's business.
pub trait GenerationService {
    fn generate(&self, request: &GenerationRequest) -> std::result::Result<GeneratedComposite, GenerationError>;
}

/// Sliced result of one generation call.
#[derive(Clone, Debug)]
pub struct GeneratedPanels {
    pub label: Option<String>,
    pub composite: RasterImage,
    pub tiles: Vec<Tile>,
}

/// Generate one composite and slice it into `request.grid.panel_count()` panels.
pub fn generate_panels(service: &dyn GenerationService, request: &GenerationRequest) -> Result<GeneratedPanels> {
    log_info!(
        "generate: {}x{} grid, {} panels, {} @ {}, {} references",
        request.grid.rows(),
        request.grid.cols(),
        request.grid.panel_count(),
        request.aspect_ratio,
        request.resolution.label(),
        request.references.len()
    );
    let generated = service.generate(request).map_err(|e| {
        log_err!("generation failed: {}", e);
        EditorError::from(e)
    })?;
    let composite = RasterImage::decode(&generated.encoded).inspect_err(|e| {
        log_err!("generated composite unreadable: {}", e);
    })?;
    let tiles = slice_panels(&composite, &request.grid);
    Ok(GeneratedPanels {
        label: generated.label,
        composite,
        tiles,
    })
}
