// ============================================================================
// paintfe-engine CLI: replay a stroke headlessly and save the canvas
// ============================================================================
//
// Usage examples:
//   paintfe-engine -o out.png -p 10,10,1 -p 200,120,0.5 -p 300,40,1
//   paintfe-engine -o out.png --color "#c03020" --diameter 30 -p 0,0 -p 400,300
//   paintfe-engine -o out.png --backend wgpu --debug-blocks -p 20,20 -p 80,80
//
// Each point becomes one pointer sample, 16ms apart, rendered as its own
// frame: click on the first, drag through the rest, release after the last.
// The stroke is painted on a new top layer above a filled background.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::color::LinearRgb;
use crate::error::{EngineError, EngineResult};
use crate::logger::{self, Level};
use crate::project::Project;
use crate::settings::{Backend, EngineSettings};
use crate::stroke::{BrushBlend, PointerSample};

/// Frame interval used to timestamp replayed samples.
const FRAME_MS: f64 = 16.0;
/// Extra frames allowed for pointer smoothing to catch up before release.
const MAX_SETTLE_FRAMES: usize = 240;

/// Headless stroke renderer for the PaintFE layer engine.
#[derive(Parser, Debug)]
#[command(
    name = "paintfe-engine",
    about = "Render a brush stroke through the PaintFE layer engine and save it as PNG",
    long_about = "Builds a two-layer document (filled background + paint layer), replays\n\
                  the given pointer samples as a brush stroke and writes the composited\n\
                  canvas to a PNG file.\n\n\
                  Example:\n  \
                  paintfe-engine -o stroke.png -p 10,10,1 -p 200,120,0.4 -p 300,40,1"
)]
pub struct CliArgs {
    /// Output PNG path.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: PathBuf,

    /// Stroke samples as `x,y[,pressure]`, in canvas pixels. Pressure defaults to 1.
    /// Repeat `-p` once per sample; a value may start with `-` for negative x.
    #[arg(short, long = "point", required = true, value_name = "X,Y[,P]", allow_hyphen_values = true)]
    pub points: Vec<String>,

    /// Settings file (`key=value`). Defaults to the per-user engine.cfg.
    #[arg(short, long, value_name = "FILE.cfg")]
    pub config: Option<PathBuf>,

    /// Canvas width override.
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height override.
    #[arg(long)]
    pub height: Option<u32>,

    /// Brush colour as #rrggbb.
    #[arg(long, default_value = "#000000", value_name = "HEX")]
    pub color: String,

    /// Background fill as #rrggbb, or "none" for transparent.
    #[arg(long, default_value = "#ffffff", value_name = "HEX")]
    pub background: String,

    /// Brush diameter override, in pixels.
    #[arg(long)]
    pub diameter: Option<f32>,

    /// Brush blend: normal or erase.
    #[arg(long, default_value = "normal")]
    pub blend: String,

    /// Paint layer opacity, 0..1.
    #[arg(long, default_value_t = 1.0)]
    pub opacity: f32,

    /// Rendering backend override: software or wgpu.
    #[arg(long)]
    pub backend: Option<String>,

    /// Pointer smoothing override, in milliseconds (0 = off).
    #[arg(long)]
    pub smoothing: Option<f32>,

    /// Tint the 64px blocks redrawn by the last frame.
    #[arg(long)]
    pub debug_blocks: bool,

    /// Write the effective settings to this file.
    #[arg(long, value_name = "FILE.cfg")]
    pub write_config: Option<PathBuf>,

    /// Session log path (defaults to the per-user data directory).
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Echo log output to stderr and print frame statistics.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Run the CLI and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = match effective_settings(&args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logger::set_echo(args.verbose);
    let level = if args.verbose { Level::Debug } else { settings.log_level };
    logger::init(args.log_file.clone(), level);

    if let Some(path) = &args.write_config
        && let Err(e) = settings.save(path)
    {
        eprintln!("error: could not write {}: {}", path.display(), e);
        return ExitCode::FAILURE;
    }

    let start = Instant::now();
    match render(&args, &settings) {
        Ok(summary) => {
            if args.verbose {
                eprintln!(
                    "  {} frames, {} stamps, {} slot evictions in {:.1}ms",
                    summary.frames,
                    summary.stamps,
                    summary.evictions,
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            println!("{}", args.output.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            crate::log_err!("cli: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    frames: u64,
    stamps: usize,
    evictions: u64,
}

fn effective_settings(args: &CliArgs) -> EngineResult<EngineSettings> {
    let mut settings = match args.config.clone().or_else(EngineSettings::default_path) {
        Some(path) => EngineSettings::load(&path),
        None => EngineSettings::default(),
    };
    if let Some(w) = args.width {
        settings.canvas_width = w.max(1);
    }
    if let Some(h) = args.height {
        settings.canvas_height = h.max(1);
    }
    if let Some(d) = args.diameter {
        settings.brush_diameter = d.max(0.5);
    }
    if let Some(ms) = args.smoothing {
        settings.smoothing_ms = ms.max(0.0);
    }
    if let Some(name) = &args.backend {
        settings.backend = Backend::from_name(name)
            .ok_or_else(|| EngineError::Config(format!("unknown backend '{}'", name)))?;
    }
    settings.debug_blocks |= args.debug_blocks;
    Ok(settings)
}

fn render(args: &CliArgs, settings: &EngineSettings) -> EngineResult<Summary> {
    let samples = parse_points(&args.points)?;
    let color = parse_color(&args.color)?;
    let blend = BrushBlend::from_name(&args.blend)
        .ok_or_else(|| EngineError::Config(format!("unknown blend '{}'", args.blend)))?;

    let mut project = Project::new_untitled(1, settings);
    let mut summary = Summary::default();

    let background = project.document.current()?.id;
    if args.background.trim() != "none" {
        project.fill_layer(background, parse_color(&args.background)?, 1.0)?;
    }
    // after the root = first child = top of the stack
    let root = project.document.tree().root().id;
    let ink = project.document.new_layer(root)?;
    project.document.rename_layer(ink, "Ink")?;
    project.document.set_opacity(ink, args.opacity)?;
    if blend == BrushBlend::Erase {
        // erasing needs something to erase: paint on the background instead
        project.document.select_layer(background)?;
    }

    let mut brush = settings.brush();
    brush.color = color;
    brush.blend = blend;
    project.document.set_brush(brush);

    let frame = |project: &mut Project, summary: &mut Summary| -> EngineResult<()> {
        let stats = project.render_frame()?;
        summary.stamps += stats.stamps_drawn;
        Ok(())
    };

    frame(&mut project, &mut summary)?;
    let Some((first, rest)) = samples.split_first() else {
        return Err(EngineError::Config("no stroke points given".to_string()));
    };
    project.document.on_click(*first)?;
    frame(&mut project, &mut summary)?;

    let mut now = first.time;
    for sample in rest {
        now = sample.time;
        project.document.on_drag(std::slice::from_ref(sample));
        project.document.on_frame(now);
        frame(&mut project, &mut summary)?;
    }
    if settings.smoothing_ms > 0.0 {
        for _ in 0..MAX_SETTLE_FRAMES {
            now += FRAME_MS;
            if project.document.on_frame(now) == 0 {
                break;
            }
            frame(&mut project, &mut summary)?;
        }
    }
    project.document.on_release();
    frame(&mut project, &mut summary)?;

    project.export_png(&args.output)?;
    summary.frames = project.frames_rendered();
    summary.evictions = project.compositor().texture_cache().slots().evictions();
    Ok(summary)
}

/// `x,y[,pressure]` strings → samples one frame apart.
fn parse_points(points: &[String]) -> EngineResult<Vec<PointerSample>> {
    points
        .iter()
        .flat_map(|arg| arg.split_whitespace())
        .enumerate()
        .map(|(i, text)| {
            let fields: Vec<f32> = text
                .split(',')
                .map(|f| f.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .map_err(|_| EngineError::Config(format!("bad point '{}'", text)))?;
            let time = i as f64 * FRAME_MS;
            match fields.as_slice() {
                [x, y] => Ok(PointerSample::new(*x, *y, 1.0, time)),
                [x, y, p] => Ok(PointerSample::new(*x, *y, *p, time)),
                _ => Err(EngineError::Config(format!("bad point '{}', expected x,y[,pressure]", text))),
            }
        })
        .collect()
}

fn parse_color(text: &str) -> EngineResult<LinearRgb> {
    LinearRgb::parse_hex(text).ok_or_else(|| EngineError::Config(format!("bad colour '{}'", text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_parse_with_optional_pressure() {
        let pts = parse_points(&["1,2".to_string(), "3,4,0.5 5,6,2".to_string()]).unwrap();
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[0].pressure, 1.0);
        assert_eq!(pts[1].pressure, 0.5);
        assert_eq!(pts[2].pressure, 1.0); // clamped
        assert_eq!(pts[2].time, 2.0 * FRAME_MS);
    }

    #[test]
    fn malformed_points_are_rejected() {
        assert!(parse_points(&["1".to_string()]).is_err());
        assert!(parse_points(&["a,b".to_string()]).is_err());
    }

    #[test]
    fn cli_flags_parse() {
        let args = CliArgs::try_parse_from([
            "paintfe-engine",
            "-o",
            "out.png",
            "-p",
            "1,2",
            "-p",
            "3,4,0.5",
            "--backend",
            "software",
            "--width",
            "64",
        ])
        .unwrap();
        assert_eq!(args.points.len(), 2);
        let settings = effective_settings(&CliArgs {
            config: Some(PathBuf::from("/nonexistent/engine.cfg")),
            ..args
        })
        .unwrap();
        assert_eq!(settings.canvas_width, 64);
        assert_eq!(settings.backend, Backend::Software);
    }

    #[test]
    fn each_point_flag_takes_one_value() {
        let args = CliArgs::try_parse_from([
            "paintfe-engine",
            "-p",
            "-5,3",
            "-o",
            "out.png",
            "--point",
            "7,-2,0.5",
            "--debug-blocks",
        ])
        .unwrap();
        assert_eq!(args.points, vec!["-5,3".to_string(), "7,-2,0.5".to_string()]);
        assert_eq!(args.output, PathBuf::from("out.png"));
        assert!(args.debug_blocks);

        let pts = parse_points(&args.points).unwrap();
        assert_eq!(pts[0].position.x, -5.0);
        assert_eq!(pts[1].position.y, -2.0);
    }
}
