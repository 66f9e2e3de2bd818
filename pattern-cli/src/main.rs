use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::process::ExitCode;

use pattern_core::{DirectoryMeshSource, PatternRequest, PatternResponse, PatternStore, respond};
use png::{BitDepth, ColorType, Compression, Encoder, FilterType};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage:
  pattern generate <request.json|-> [--models DIR] [--store DIR]
  pattern fetch <token> [--store DIR] [--out FILE]
  pattern render <input.svg> <output.png> [zoom]";

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Positional arguments plus `--flag value` pairs.
struct Args {
    positional: Vec<String>,
    models: String,
    store: String,
    out: Option<String>,
}

fn parse_args(raw: &[String]) -> CliResult<Args> {
    let mut args = Args {
        positional: Vec::new(),
        models: "models".to_string(),
        store: "patterns".to_string(),
        out: None,
    };
    let mut it = raw.iter();
    while let Some(a) = it.next() {
        let mut value = || {
            it.next()
                .cloned()
                .ok_or_else(|| format!("{a} needs a value"))
        };
        match a.as_str() {
            "--models" => args.models = value()?,
            "--store" => args.store = value()?,
            "--out" => args.out = Some(value()?),
            _ => args.positional.push(a.clone()),
        }
    }
    Ok(args)
}

fn read_input(path: &str) -> CliResult<String> {
    if path == "-" {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s)?;
        Ok(s)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Prints the JSON response; a `Failed` response still exits non-zero.
fn generate(args: &Args) -> CliResult<bool> {
    let input = args.positional.first().ok_or(USAGE)?;
    let request: PatternRequest = serde_json::from_str(&read_input(input)?)?;
    let source = DirectoryMeshSource::new(&args.models);
    let store = if request.inline == Some(false) {
        Some(PatternStore::open(&args.store)?)
    } else {
        None
    };
    let response = respond(&request, &source, store.as_ref());
    let ok = response.is_success();
    let mut out = io::stdout().lock();
    serde_json::to_writer(&mut out, &response)?;
    writeln!(out)?;
    Ok(ok)
}

fn fetch(args: &Args) -> CliResult<bool> {
    let token = args.positional.first().ok_or(USAGE)?;
    let store = PatternStore::open(&args.store)?;
    let svg = match store.fetch(token) {
        Ok(svg) => svg,
        Err(e) => {
            let resp = PatternResponse::from(e);
            println!("{}", serde_json::to_string(&resp)?);
            return Ok(false);
        }
    };
    match &args.out {
        Some(path) => {
            fs::write(path, &svg)?;
            info!(path = %path, "wrote pattern");
        }
        None => io::stdout().write_all(svg.as_bytes())?,
    }
    Ok(true)
}

fn render(args: &Args) -> CliResult<bool> {
    let [input, output, rest @ ..] = args.positional.as_slice() else {
        return Err(USAGE.into());
    };
    let zoom: f32 = rest.first().and_then(|s| s.parse().ok()).unwrap_or(4.0);
    let svg = fs::read_to_string(input)?;

    let mut opt = usvg::Options::default();
    let mut fontdb = usvg::fontdb::Database::new();
    fontdb.load_system_fonts();
    opt.fontdb = std::sync::Arc::new(fontdb);
    let tree = usvg::Tree::from_str(&svg, &opt).map_err(|e| format!("SVG parse error: {e:?}"))?;

    let size = tree.size();
    let w_px = (size.width() * zoom).ceil() as u32;
    let h_px = (size.height() * zoom).ceil() as u32;
    let mut pixmap = tiny_skia::Pixmap::new(w_px, h_px).ok_or("pixmap alloc failed")?;
    let mut pm = pixmap.as_mut();
    resvg::render(&tree, tiny_skia::Transform::from_scale(zoom, zoom), &mut pm);
    encode_png_deterministic(&pixmap, output)?;
    info!(output = %output, w_px, h_px, "rendered preview");
    Ok(true)
}

fn encode_png_deterministic(pixmap: &tiny_skia::Pixmap, path: &str) -> CliResult<()> {
    let file = fs::File::create(path)?;
    let mut enc = Encoder::new(file, pixmap.width(), pixmap.height());
    enc.set_color(ColorType::Rgba);
    enc.set_depth(BitDepth::Eight);
    enc.set_filter(FilterType::NoFilter);
    enc.set_compression(Compression::Default);
    let mut writer = enc.write_header()?;
    writer.write_image_data(pixmap.data())?;
    Ok(())
}

fn main() -> ExitCode {
    // stdout carries the response, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let raw: Vec<String> = env::args().skip(1).collect();
    let Some((cmd, rest)) = raw.split_first() else {
        eprintln!("{USAGE}");
        return ExitCode::from(2);
    };
    let result = parse_args(rest).and_then(|args| match cmd.as_str() {
        "generate" => generate(&args),
        "fetch" => fetch(&args),
        "render" => render(&args),
        _ => Err(USAGE.into()),
    });
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
