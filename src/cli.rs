// ============================================================================
// PanelMask CLI: headless slicing and mask compositing
// ============================================================================
//
// Usage examples:
//   panelmask slice -i board.png --rows 2 --cols 3 --panels 5 --output-dir shots/
//   panelmask slice -i "boards/*.png" --rows 2 --cols 2
//   panelmask mask -i shot.png --stroke "40,40 120,80 200,90" -o shot_masked.png
//   panelmask mask -i shot.png --display 500x281 --stroke "rect:10,10 200,150" \
//                  --record-dir records/ -o out.png
//
// Strokes are given in display-surface coordinates; `--display` sets the
// rendered surface size they are relative to (native size when omitted).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};

use crate::artifact::ArtifactSink;
use crate::config::EditorConfig;
use crate::coords::{DisplaySize, PointerPos};
use crate::editor::Editor;
use crate::grid::{GridSpec, slice_panels};
use crate::io::{DirectorySink, write_png};
use crate::paint::Tool;
use crate::raster::RasterImage;
use crate::{log_err, log_info};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// PanelMask headless panel slicer and mask compositor.
#[derive(Parser, Debug)]
#[command(
    name = "panelmask",
    about = "Slice multi-panel composites and composite mask strokes onto images"
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Mirror log output to stderr and print per-file timing.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write the session log here instead of the platform data directory.
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Cut composite image(s) into row-major panel PNGs.
    Slice(SliceArgs),
    /// Paint strokes over an image and write the flattened result.
    Mask(MaskArgs),
}

#[derive(Args, Debug)]
pub struct SliceArgs {
    /// Composite file(s). Glob patterns accepted (e.g. "boards/*.png").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    #[arg(long)]
    pub rows: u32,

    #[arg(long)]
    pub cols: u32,

    /// Keep only the first N panels (row-major). Defaults to rows × cols.
    #[arg(long, value_name = "N")]
    pub panels: Option<u32>,

    /// Destination directory. Defaults to each input's own directory.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Image to paint on.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output PNG path. Defaults to `<stem>_masked.png` next to the input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// One stroke as space- or ';'-separated `x,y` points, optionally
    /// prefixed with `freehand:` or `rect:`. Repeat for several strokes.
    #[arg(short, long, value_name = "POINTS")]
    pub stroke: Vec<String>,

    /// Tool for strokes without a prefix: freehand, rect.
    #[arg(short, long, default_value = "freehand")]
    pub tool: String,

    /// Brush size in reference units (clamped to 5–100).
    #[arg(short, long, default_value_t = crate::config::DEFAULT_BRUSH_SIZE)]
    pub brush: f32,

    /// Rendered surface size the stroke points refer to, as WxH.
    #[arg(long, value_name = "WxH")]
    pub display: Option<String>,

    /// Label of the source image. Defaults to the input file stem.
    #[arg(long)]
    pub label: Option<String>,

    /// Also store the result as `<id>.png` + `<id>.pmr` in this directory.
    #[arg(long, value_name = "DIR")]
    pub record_dir: Option<PathBuf>,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the chosen subcommand and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let result = match &args.command {
        Command::Slice(slice) => run_slice(slice, args.verbose),
        Command::Mask(mask) => run_mask(mask, args.verbose),
    };
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log_err!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// slice
// ============================================================================

/// Returns `Ok(false)` when some inputs failed but others were processed.
fn run_slice(args: &SliceArgs, verbose: bool) -> Result<bool, String> {
    let rows_cols = args.rows.checked_mul(args.cols).unwrap_or(0);
    let spec = GridSpec::new(args.rows, args.cols, args.panels.unwrap_or(rows_cols))
        .map_err(|e| e.to_string())?;

    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        return Err("no input files matched the given pattern(s).".into());
    }

    if let Some(dir) = &args.output_dir {
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("could not create output directory '{}': {}", dir.display(), e))?;
    }

    let total = inputs.len();
    let mut any_failure = false;
    for (idx, input) in inputs.iter().enumerate() {
        if total > 1 || verbose {
            println!("[{}/{}] {}", idx + 1, total, input.display());
        }
        let start = Instant::now();
        match slice_one(input, &spec, args.output_dir.as_deref()) {
            Ok(written) => {
                if verbose {
                    for path in &written {
                        println!("  → {}", path.display());
                    }
                    println!(
                        "  {} panels ({:.0}ms)",
                        written.len(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                log_err!("slice {}: {}", input.display(), e);
                any_failure = true;
            }
        }
    }
    Ok(!any_failure)
}

fn slice_one(input: &Path, spec: &GridSpec, output_dir: Option<&Path>) -> Result<Vec<PathBuf>, String> {
    let composite = RasterImage::open(input).map_err(|e| e.to_string())?;
    let tiles = slice_panels(&composite, spec);
    let mut written = Vec::with_capacity(tiles.len());
    for tile in &tiles {
        let path = panel_path(input, output_dir, tile.index)
            .ok_or_else(|| format!("cannot derive output name for '{}'", input.display()))?;
        write_png(&tile.image, &path).map_err(|e| format!("{}: {}", path.display(), e))?;
        written.push(path);
    }
    log_info!("sliced {} into {} panels", input.display(), written.len());
    Ok(written)
}

/// `<dir>/<stem>_panel_<n>.png`, numbering from 1.
fn panel_path(input: &Path, output_dir: Option<&Path>, index: u32) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.parent().unwrap_or(Path::new(".")).to_path_buf());
    Some(dir.join(format!("{}_panel_{:02}.png", stem, index + 1)))
}

// ============================================================================
// mask
// ============================================================================

fn run_mask(args: &MaskArgs, verbose: bool) -> Result<bool, String> {
    let default_tool =
        Tool::parse(&args.tool).ok_or_else(|| format!("unknown tool '{}'", args.tool))?;
    let strokes = args
        .stroke
        .iter()
        .map(|s| parse_stroke(s))
        .collect::<Result<Vec<_>, _>>()?;

    let image = RasterImage::open(&args.input).map_err(|e| e.to_string())?;
    let surface = match &args.display {
        Some(s) => parse_display(s).ok_or_else(|| format!("bad --display '{}', expected WxH", s))?,
        None => DisplaySize::native(image.width(), image.height()),
    };
    let label = match &args.label {
        Some(l) => l.clone(),
        None => args
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string()),
    };

    let mut editor = Editor::new(EditorConfig::default());
    editor.set_brush_size(args.brush);
    editor.open_image(image, label).map_err(|e| e.to_string())?;
    editor.set_edit_mode(true);

    for (tool, points) in &strokes {
        editor.set_tool(tool.unwrap_or(default_tool));
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        editor.pointer_down(surface, *first).map_err(|e| e.to_string())?;
        for p in rest {
            editor.pointer_move(surface, *p).map_err(|e| e.to_string())?;
        }
        editor.pointer_up();
    }

    let record = editor.export().map_err(|e| e.to_string())?;

    let output = match &args.output {
        Some(p) => p.clone(),
        None => masked_path(&args.input)
            .ok_or_else(|| format!("cannot derive output name for '{}'", args.input.display()))?,
    };
    std::fs::write(&output, &record.png).map_err(|e| format!("{}: {}", output.display(), e))?;
    if verbose {
        println!("  → {} ('{}', {} strokes)", output.display(), record.label, strokes.len());
    }

    if let Some(dir) = &args.record_dir {
        let mut sink = DirectorySink::new(dir).map_err(|e| e.to_string())?;
        sink.store(record).map_err(|e| e.to_string())?;
        if verbose && let Some(path) = sink.written.last() {
            println!("  → {}", path.display());
        }
    }
    Ok(true)
}

fn masked_path(input: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_masked.png", stem)))
}

/// Parse `"[tool:]x,y x,y ..."`.
pub fn parse_stroke(s: &str) -> Result<(Option<Tool>, Vec<PointerPos>), String> {
    let (tool, body) = match s.split_once(':') {
        Some((prefix, rest)) => {
            let tool = Tool::parse(prefix.trim())
                .ok_or_else(|| format!("unknown tool prefix '{}'", prefix))?;
            (Some(tool), rest)
        }
        None => (None, s),
    };

    let mut points = Vec::new();
    for pair in body.split(|c: char| c.is_whitespace() || c == ';').filter(|p| !p.is_empty()) {
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| format!("point '{}' is not x,y", pair))?;
        let x: f32 = x.trim().parse().map_err(|_| format!("bad x in '{}'", pair))?;
        let y: f32 = y.trim().parse().map_err(|_| format!("bad y in '{}'", pair))?;
        points.push(PointerPos::new(x, y));
    }
    if points.is_empty() {
        return Err(format!("stroke '{}' has no points", s));
    }
    Ok((tool, points))
}

fn parse_display(s: &str) -> Option<DisplaySize> {
    let (w, h) = s.to_lowercase().split_once('x').map(|(a, b)| (a.to_string(), b.to_string()))?;
    let w: f32 = w.trim().parse().ok()?;
    let h: f32 = h.trim().parse().ok()?;
    let size = DisplaySize::new(w, h);
    (!size.is_degenerate()).then_some(size)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}
