// ============================================================================
// EDITOR: one open image, its paint session, and the async decode/encode hops
// ============================================================================

use std::sync::mpsc;
use std::time::Duration;

use crate::artifact::{ArtifactSink, ImageRecord};
use crate::compositor;
use crate::config::EditorConfig;
use crate::coords::{DisplaySize, PointerPos, map_to_raster};
use crate::error::{EditorError, Result};
use crate::paint::{PaintSession, Rendered, Tool};
use crate::raster::RasterImage;
use crate::{log_err, log_info, log_warn};

/// Results sent back from background workers.
enum IoResult {
    Decoded {
        ticket: u64,
        label: String,
        result: Result<RasterImage>,
    },
    Encoded(Result<ImageRecord>),
}

/// What `poll` hands back to the caller.
#[derive(Debug)]
pub enum EditorEvent {
    /// A background decode finished and the image is ready for editing.
    Opened { label: String },
    OpenFailed(EditorError),
    Exported(ImageRecord),
    ExportFailed(EditorError),
}

/// Owns at most one [`PaintSession`].
///
/// Opening a different image or closing the editor drops the session and
/// every unsaved stroke with it; nothing is kept or confirmed.
pub struct Editor {
    config: EditorConfig,
    session: Option<PaintSession>,
    label: String,
    edit_mode: bool,
    tool: Tool,
    brush_size: f32,
    /// Ticket of the decode currently awaited, if any.
    pending_decode: Option<u64>,
    next_ticket: u64,
    pending_exports: usize,
    io_sender: mpsc::Sender<IoResult>,
    io_receiver: mpsc::Receiver<IoResult>,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    pub fn new(config: EditorConfig) -> Self {
        let (io_sender, io_receiver) = mpsc::channel();
        let brush_size = config.clamp_brush_size(config.default_brush_size);
        Self {
            config,
            session: None,
            label: String::new(),
            edit_mode: false,
            tool: Tool::default(),
            brush_size,
            pending_decode: None,
            next_ticket: 0,
            pending_exports: 0,
            io_sender,
            io_receiver,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&PaintSession> {
        self.session.as_ref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// True once a decoded image is open and no decode is outstanding.
    pub fn is_ready(&self) -> bool {
        self.session.is_some() && self.pending_decode.is_none()
    }

    pub fn is_decoding(&self) -> bool {
        self.pending_decode.is_some()
    }

    pub fn pending_exports(&self) -> usize {
        self.pending_exports
    }

    // ---- lifecycle ----------------------------------------------------------

    /// Open an already-decoded image, replacing whatever was open.
    pub fn open_image(&mut self, image: RasterImage, label: impl Into<String>) -> Result<()> {
        self.discard_session("opening another image");
        self.pending_decode = None;
        self.label = label.into();
        self.start_session(image)
    }

    /// Decode `bytes` on a worker thread; the image opens when [`poll`](Self::poll)
    /// picks up the result. Editing is refused until then.
    pub fn open_encoded(&mut self, bytes: Vec<u8>, label: impl Into<String>) {
        self.discard_session("opening another image");
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending_decode = Some(ticket);
        let label = label.into();
        self.label = label.clone();

        let sender = self.io_sender.clone();
        rayon::spawn(move || {
            let result = RasterImage::decode(&bytes);
            let _ = sender.send(IoResult::Decoded {
                ticket,
                label,
                result,
            });
        });
    }

    /// Drop the open image and its overlay.
    pub fn close(&mut self) {
        self.discard_session("editor closed");
        self.pending_decode = None;
        self.label.clear();
    }

    fn start_session(&mut self, image: RasterImage) -> Result<()> {
        let mut session = PaintSession::new(image, &self.config)?;
        session.set_tool(self.tool);
        session.set_brush_size(self.brush_size);
        log_info!(
            "opened '{}' ({}x{}) for editing",
            self.label,
            session.base().width(),
            session.base().height()
        );
        self.session = Some(session);
        Ok(())
    }

    fn discard_session(&mut self, reason: &str) {
        if let Some(session) = self.session.take()
            && !session.overlay().is_blank()
        {
            log_warn!("discarding unsaved overlay on '{}' ({})", self.label, reason);
        }
    }

    // ---- tool state ---------------------------------------------------------

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Turning edit mode off ends any stroke in progress.
    pub fn set_edit_mode(&mut self, on: bool) {
        self.edit_mode = on;
        if !on && let Some(session) = self.session.as_mut() {
            session.pointer_up();
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        if let Some(session) = self.session.as_mut() {
            session.set_tool(tool);
        }
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    /// Clamped to the configured brush range.
    pub fn set_brush_size(&mut self, size: f32) {
        self.brush_size = self.config.clamp_brush_size(size);
        if let Some(session) = self.session.as_mut() {
            session.set_brush_size(self.brush_size);
        }
    }

    // ---- pointer input ------------------------------------------------------

    fn editable_session(&mut self, surface: DisplaySize) -> Result<&mut PaintSession> {
        if self.pending_decode.is_some() {
            return Err(EditorError::Precondition(format!(
                "'{}' is still decoding",
                self.label
            )));
        }
        if surface.is_degenerate() {
            return Err(EditorError::ContextUnavailable(format!(
                "surface rendered at {}x{}",
                surface.width, surface.height
            )));
        }
        self.session
            .as_mut()
            .ok_or_else(|| EditorError::ContextUnavailable("no image open".into()))
    }

    /// Start a stroke. Returns `Ok(false)` when edit mode is off or a stroke
    /// is already running.
    pub fn pointer_down(&mut self, surface: DisplaySize, pos: PointerPos) -> Result<bool> {
        if !self.edit_mode {
            return Ok(false);
        }
        let session = self.editable_session(surface)?;
        let at = map_to_raster(session.base().dimensions(), surface, pos);
        Ok(session.pointer_down(at))
    }

    /// Extend the active stroke. `surface` is re-read on every call since
    /// layout may have changed since the last event.
    pub fn pointer_move(&mut self, surface: DisplaySize, pos: PointerPos) -> Result<Option<Rendered>> {
        if !self.edit_mode {
            return Ok(None);
        }
        let session = self.editable_session(surface)?;
        if !session.is_drawing() {
            return Ok(None);
        }
        let to = map_to_raster(session.base().dimensions(), surface, pos);
        Ok(session.pointer_move(to))
    }

    pub fn pointer_up(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pointer_up();
        }
    }

    pub fn pointer_leave(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.pointer_leave();
        }
    }

    /// Remove every stroke from the current overlay.
    pub fn clear_overlay(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.clear_overlay();
        }
    }

    // ---- export ---------------------------------------------------------------

    fn export_session(&self) -> Result<&PaintSession> {
        if self.pending_decode.is_some() {
            return Err(EditorError::Precondition(format!(
                "cannot export '{}' before it has decoded",
                self.label
            )));
        }
        self.session
            .as_ref()
            .ok_or_else(|| EditorError::Precondition("nothing to export: no image open".into()))
    }

    /// Composite and encode synchronously.
    pub fn export(&self) -> Result<ImageRecord> {
        let session = self.export_session()?;
        compositor::export(session, &self.label, &self.config)
    }

    /// Export straight into a persistence collaborator.
    pub fn export_to(&self, sink: &mut dyn ArtifactSink) -> Result<()> {
        let record = self.export()?;
        sink.store(record)
    }

    /// Composite now, encode on a worker; the record arrives through `poll`.
    pub fn export_async(&mut self) -> Result<()> {
        let session = self.export_session()?;
        let composited = compositor::composite_session(session)?;
        let source = session.base().clone();
        let label = self.label.clone();
        let config = self.config.clone();
        let sender = self.io_sender.clone();
        self.pending_exports += 1;

        rayon::spawn(move || {
            let result = compositor::build_record(&composited, &source, &label, &config);
            let _ = sender.send(IoResult::Encoded(result));
        });
        Ok(())
    }

    // ---- background results -------------------------------------------------

    /// Drain finished background work without blocking.
    pub fn poll(&mut self) -> Vec<EditorEvent> {
        let mut events = Vec::new();
        while let Ok(result) = self.io_receiver.try_recv() {
            if let Some(event) = self.handle(result) {
                events.push(event);
            }
        }
        events
    }

    /// Block up to `timeout` for the next relevant event.
    pub fn wait_event(&mut self, timeout: Duration) -> Option<EditorEvent> {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            let left = deadline.saturating_duration_since(std::time::Instant::now());
            let result = self.io_receiver.recv_timeout(left).ok()?;
            if let Some(event) = self.handle(result) {
                return Some(event);
            }
        }
    }

    fn handle(&mut self, result: IoResult) -> Option<EditorEvent> {
        match result {
            IoResult::Decoded {
                ticket,
                label,
                result,
            } => {
                if self.pending_decode != Some(ticket) {
                    log_info!("ignoring stale decode of '{}'", label);
                    return None;
                }
                self.pending_decode = None;
                match result.and_then(|image| self.start_session(image)) {
                    Ok(()) => Some(EditorEvent::Opened { label }),
                    Err(e) => {
                        log_err!("failed to open '{}': {}", label, e);
                        Some(EditorEvent::OpenFailed(e))
                    }
                }
            }
            IoResult::Encoded(result) => {
                self.pending_exports = self.pending_exports.saturating_sub(1);
                match result {
                    Ok(record) => Some(EditorEvent::Exported(record)),
                    Err(e) => {
                        log_err!("export failed: {}", e);
                        Some(EditorEvent::ExportFailed(e))
                    }
                }
            }
        }
    }
}
