use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use image::{Rgba, RgbaImage};

use panelmask::artifact::{ArtifactSink, MemorySink};
use panelmask::cli::{self, CliArgs};
use panelmask::coords::{DisplaySize, PointerPos};
use panelmask::editor::Editor;
use panelmask::generation::{
    GeneratedComposite, GenerationError, GenerationRequest, GenerationService, ReferenceImage,
    ResolutionTier, generate_panels,
};
use panelmask::grid::GridSpec;
use panelmask::io::load_record;
use panelmask::paint::Tool;
use panelmask::raster::{AspectRatio, RasterImage};

/// Paints each grid cell a distinct flat colour so panels are identifiable.
struct ColourBoard;

fn cell_colour(row: u32, col: u32) -> Rgba<u8> {
    Rgba([(40 + row * 80) as u8, (30 + col * 60) as u8, 90, 255])
}

impl GenerationService for ColourBoard {
    fn generate(&self, request: &GenerationRequest) -> Result<GeneratedComposite, GenerationError> {
        let (cw, ch) = (120, 90);
        let grid = request.grid;
        let img = RgbaImage::from_fn(cw * grid.cols() + 2, ch * grid.rows() + 1, |x, y| {
            cell_colour((y / ch).min(grid.rows() - 1), (x / cw).min(grid.cols() - 1))
        });
        let encoded = RasterImage::new(img)
            .encode_png()
            .map_err(|e| GenerationError(e.to_string()))?;
        Ok(GeneratedComposite {
            encoded,
            label: Some(format!("board for '{}'", request.prompt)),
        })
    }
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("panelmask-it-{}-{}", name, uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn generate_slice_paint_export_and_reuse() {
    let request = GenerationRequest {
        prompt: "two detectives in the rain".into(),
        grid: GridSpec::new(2, 3, 4).unwrap(),
        aspect_ratio: AspectRatio::new(4, 3),
        resolution: ResolutionTier::TwoK,
        references: Vec::new(),
    };
    let panels = generate_panels(&ColourBoard, &request).unwrap();
    assert_eq!(panels.tiles.len(), 4);
    for tile in &panels.tiles {
        assert_eq!(tile.image.dimensions(), (120, 90));
        assert_eq!(*tile.image.pixels().get_pixel(60, 45), cell_colour(tile.row, tile.col));
    }

    // Open panel 2 (row 0, col 2) shown at half size.
    let panel = &panels.tiles[2];
    let mut editor = Editor::default();
    editor.open_image(panel.image.clone(), "Panel 3").unwrap();
    editor.set_edit_mode(true);
    editor.set_brush_size(50.0);
    let surface = DisplaySize::new(60.0, 45.0);

    editor.set_tool(Tool::Rect);
    editor.pointer_down(surface, PointerPos::new(5.0, 5.0)).unwrap();
    editor.pointer_move(surface, PointerPos::new(50.0, 40.0)).unwrap();
    editor.pointer_move(surface, PointerPos::new(30.0, 20.0)).unwrap();
    editor.pointer_leave();

    editor.set_tool(Tool::Freehand);
    editor.pointer_down(surface, PointerPos::new(0.0, 40.0)).unwrap();
    editor.pointer_move(surface, PointerPos::new(55.0, 40.0)).unwrap();
    editor.pointer_up();

    let mut sink = MemorySink::default();
    editor.export_to(&mut sink).unwrap();
    let record = sink.records.pop().unwrap();
    assert_eq!(record.label, "Panel 3 (masked)");
    assert_eq!(record.aspect_ratio, AspectRatio::new(4, 3));

    let edited = record.to_raster().unwrap();
    assert_eq!(edited.dimensions(), (120, 90));
    let base = cell_colour(0, 2);
    // Rect corner at raster (10,10): tinted. Far interior of the small rect: untouched.
    assert_ne!(*edited.pixels().get_pixel(10, 10), base);
    assert_eq!(*edited.pixels().get_pixel(100, 20), base);
    // Freehand line along raster y = 80.
    assert_ne!(*edited.pixels().get_pixel(60, 80), base);
    assert!(edited.pixels().pixels().all(|p| p[3] == 255));
    // The source tile is untouched.
    assert_eq!(*panel.image.pixels().get_pixel(10, 10), base);

    // The edit feeds back into the next generation call.
    let reference = ReferenceImage::from_record(&record).unwrap();
    let follow_up = GenerationRequest {
        references: vec![reference],
        grid: GridSpec::full(1, 2).unwrap(),
        ..request
    };
    let again = generate_panels(&ColourBoard, &follow_up).unwrap();
    assert_eq!(again.tiles.len(), 2);
}

#[test]
fn cli_slice_writes_requested_panels() {
    let dir = scratch_dir("slice");
    let input = dir.join("board.png");
    let img = RgbaImage::from_fn(900, 600, |x, y| cell_colour(y / 300, x / 300));
    RasterImage::new(img).encode_png().map(|b| std::fs::write(&input, b)).unwrap().unwrap();
    let out = dir.join("out");

    let args = CliArgs::parse_from([
        "panelmask",
        "slice",
        "-i",
        input.to_str().unwrap(),
        "--rows",
        "2",
        "--cols",
        "3",
        "--panels",
        "5",
        "--output-dir",
        out.to_str().unwrap(),
    ]);
    assert_eq!(cli::run(args), ExitCode::SUCCESS);

    for (n, (row, col)) in [(0, 0), (0, 1), (0, 2), (1, 0), (1, 1)].iter().enumerate() {
        let tile = RasterImage::open(&out.join(format!("board_panel_{:02}.png", n + 1))).unwrap();
        assert_eq!(tile.dimensions(), (300, 300));
        assert_eq!(*tile.pixels().get_pixel(150, 150), cell_colour(*row, *col));
    }
    assert!(!out.join("board_panel_06.png").exists());
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn cli_mask_writes_png_and_record() {
    let dir = scratch_dir("mask");
    let input = dir.join("shot.png");
    let img = RgbaImage::from_pixel(200, 100, Rgba([0, 0, 0, 255]));
    std::fs::write(&input, RasterImage::new(img).encode_png().unwrap()).unwrap();
    let output = dir.join("shot_edit.png");
    let records = dir.join("records");

    let args = CliArgs::parse_from([
        "panelmask",
        "mask",
        "-i",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "--display",
        "100x50",
        "--stroke",
        "10,25 90,25",
        "--stroke",
        "rect:5,5 40,40",
        "--record-dir",
        records.to_str().unwrap(),
    ]);
    assert_eq!(cli::run(args), ExitCode::SUCCESS);

    let edited = RasterImage::open(&output).unwrap();
    assert_eq!(edited.dimensions(), (200, 100));
    assert!(edited.pixels().get_pixel(100, 50)[0] > 0);
    assert_eq!(edited.pixels().get_pixel(199, 0)[0], 0);

    let pmr = std::fs::read_dir(&records)
        .unwrap()
        .flatten()
        .map(|e| e.path())
        .find(|p| p.extension().is_some_and(|e| e == "pmr"))
        .unwrap();
    let record = load_record(&pmr).unwrap();
    assert_eq!(record.label, "shot (masked)");
    assert_eq!(record.aspect_ratio, AspectRatio::new(2, 1));
    std::fs::remove_dir_all(dir).ok();
}

#[test]
fn failing_service_surfaces_upstream_error() {
    struct Down;
    impl GenerationService for Down {
        fn generate(&self, _: &GenerationRequest) -> Result<GeneratedComposite, GenerationError> {
            Err(GenerationError("503 from upstream".into()))
        }
    }
    let request = GenerationRequest {
        prompt: String::new(),
        grid: GridSpec::full(1, 1).unwrap(),
        aspect_ratio: AspectRatio::new(1, 1),
        resolution: ResolutionTier::default(),
        references: Vec::new(),
    };
    let err = generate_panels(&Down, &request).unwrap_err();
    assert_eq!(err.to_string(), "generation failed: 503 from upstream");

    // Sinks are trait objects so any collaborator can plug in.
    let mut sink: Box<dyn ArtifactSink> = Box::new(MemorySink::default());
    let editor = Editor::default();
    assert!(editor.export_to(sink.as_mut()).is_err());
}
