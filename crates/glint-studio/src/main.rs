//! glint-studio: drives the glint object model from the command line.
//!
//! `headless` renders the demo scene through the in-process interpreter,
//! `remote` dumps the same scene as GLIR JSON lines, and `check` runs the
//! shader checker over a file.

mod scene;

use std::cell::RefCell;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use glint_engine::glir::{HeadlessBackend, JsonLinesExecutor, LocalParser, RemoteParser};
use glint_engine::gloo::GlState;
use glint_engine::logging::{init_logging, LoggingConfig};
use glint_engine::{GlConfig, GlContext, HeadlessSurface, ShaderDialect};

use scene::DemoScene;

#[derive(Parser, Debug)]
#[command(name = "glint-studio", about = "Render, dump and check glint scenes", version)]
struct Args {
    /// Log filter in env_logger syntax, e.g. `glint_engine=debug`.
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand, Debug)]
enum Mode {
    /// Render the demo scene with the headless interpreter.
    Headless {
        #[arg(long, default_value_t = 64)]
        width: usize,
        #[arg(long, default_value_t = 64)]
        height: usize,
        /// GL state preset: opaque, translucent or additive.
        #[arg(long, default_value = "opaque")]
        preset: String,
        #[arg(long, default_value_t = 1)]
        frames: u32,
        /// Print the queued commands of every frame before flushing.
        #[arg(long)]
        show: bool,
    },
    /// Serialize the demo scene as GLIR JSON lines.
    Remote {
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Dialect::Es2)]
        dialect: Dialect,
        #[arg(long, default_value_t = 1)]
        frames: u32,
    },
    /// Check a shader source file.
    Check {
        file: PathBuf,
        /// Print the source converted to this dialect.
        #[arg(long, value_enum)]
        convert: Option<Dialect>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Dialect {
    Desktop,
    Es2,
}

impl From<Dialect> for ShaderDialect {
    fn from(d: Dialect) -> Self {
        match d {
            Dialect::Desktop => ShaderDialect::Desktop,
            Dialect::Es2 => ShaderDialect::Es2,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(match args.log {
        Some(filter) => LoggingConfig::with_filter(filter),
        None => LoggingConfig::default(),
    });

    match args.mode {
        Mode::Headless { width, height, preset, frames, show } => {
            run_headless((width, height), &preset, frames, show)
        }
        Mode::Remote { out, dialect, frames } => run_remote(out, dialect.into(), frames),
        Mode::Check { file, convert } => run_check(&file, convert.map(Into::into)),
    }
}

// ── headless ──────────────────────────────────────────────────────────────

fn run_headless(size: (usize, usize), preset: &str, frames: u32, show: bool) -> anyhow::Result<()> {
    let state = GlState::preset(preset)
        .with_context(|| format!("unknown GL state preset {preset:?}"))?;

    let (ctx, parser) =
        GlContext::with_parser(GlConfig::default(), LocalParser::new(HeadlessBackend::new(size.0, size.1)))?;
    ctx.create_shared("studio", Rc::new(HeadlessSurface::new(size.0 as u32, size.1 as u32)))?;
    let _current = ctx.make_current();

    let mut scene = DemoScene::build(&ctx)?;
    for frame in 0..frames {
        scene.draw(&ctx, &state, size)?;
        if show {
            println!("-- frame {frame}: {} commands", ctx.pending_len());
            for line in ctx.pending() {
                println!("   {line}");
            }
        }
        ctx.flush()?;
    }

    let pixels = ctx.read_pixels(None)?;
    let center = pixels.pixel(pixels.width / 2, pixels.height / 2);
    {
        let parser = parser.borrow();
        log::info!(
            "{} frame(s) at {}x{}: {} draw call(s), {} live object(s)",
            frames,
            pixels.width,
            pixels.height,
            parser.backend().draw_count(),
            parser.object_count(),
        );
    }
    log::info!("center pixel {center:?}");

    for var in scene.program().active_uniforms()? {
        log::info!("uniform {} : {}", var.name, var.ty.name());
    }
    for var in scene.program().active_attributes()? {
        log::info!("attribute {} : {}", var.name, var.ty.name());
    }

    drop(scene);
    ctx.flush()?;
    ctx.leave_shared()?;
    Ok(())
}

// ── remote ────────────────────────────────────────────────────────────────

fn run_remote(out: Option<PathBuf>, dialect: ShaderDialect, frames: u32) -> anyhow::Result<()> {
    let sink: Box<dyn Write> = match &out {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout())),
    };

    let parser = Rc::new(RefCell::new(RemoteParser::new(JsonLinesExecutor::with_dialect(sink, dialect))));
    let ctx = GlContext::new(GlConfig::default());
    ctx.set_parser(parser.clone())?;

    let mut scene = DemoScene::build(&ctx)?;
    for _ in 0..frames {
        scene.draw(&ctx, &GlState::translucent(), (64, 64))?;
        ctx.flush()?;
    }
    drop(scene);
    ctx.flush()?;

    log::info!("sent {} message(s) as {} GLSL", parser.borrow().messages_sent(), dialect.name());
    Ok(())
}

// ── check ─────────────────────────────────────────────────────────────────

fn run_check(file: &Path, convert: Option<ShaderDialect>) -> anyhow::Result<()> {
    let code = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    if let Err(log) = glint_glsl::validate::check(&code) {
        let diagnostics = glint_glsl::parse_compiler_log(&log);
        eprintln!("{}:", file.display());
        eprintln!("{}", glint_glsl::format_diagnostics(&code, &diagnostics, 2));
        bail!("{} error(s) in {}", diagnostics.len(), file.display());
    }

    for decl in glint_glsl::uniforms(&code)? {
        println!("uniform   {} {}", decl.ty.name(), decl.name);
    }
    for decl in glint_glsl::attributes(&code)? {
        println!("attribute {} {}", decl.ty.name(), decl.name);
    }

    if let Some(dialect) = convert {
        println!("-- {} --", dialect.name());
        print!("{}", glint_glsl::convert_shader(&code, dialect));
    }
    Ok(())
}
