use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use atlas_gen_core::{
    AtlasConfig, AtlasGenError, InputImage, ManifestFormat, PackOutput, pack_images,
};
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use globset::{Glob, GlobSet, GlobSetBuilder};
use image::{DynamicImage, ImageReader};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

const DEFAULT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tga", "gif"];

#[derive(Parser, Debug)]
#[command(
    name = "atlas-gen",
    about = "Pack a directory tree of images into fixed-size texture atlases",
    version,
    author,
    after_help = "Example: atlas-gen atlas 2048 2048 images"
)]
struct Cli {
    // Input/Output
    /// Atlas base name (files will be <name>1.png, <name>1.txt, ...)
    #[arg(help_heading = "Input/Output")]
    name: String,
    /// Atlas width in pixels
    #[arg(value_parser = clap::value_parser!(u32).range(1..), help_heading = "Input/Output")]
    width: u32,
    /// Atlas height in pixels
    #[arg(value_parser = clap::value_parser!(u32).range(1..), help_heading = "Input/Output")]
    height: u32,
    /// Directory scanned recursively for images
    #[arg(help_heading = "Input/Output")]
    directory: PathBuf,
    /// Output directory [default: .]
    #[arg(short, long, help_heading = "Input/Output")]
    out_dir: Option<PathBuf>,
    /// YAML config file (manifest, background, extensions, include, exclude, out_dir)
    #[arg(long, help_heading = "Input/Output")]
    config: Option<PathBuf>,
    /// Include patterns (glob, relative to the directory). If set, only matching files are considered
    #[arg(long, help_heading = "Input/Output")]
    include: Vec<String>,
    /// Exclude patterns (glob, relative to the directory). Matching files are ignored
    #[arg(long, help_heading = "Input/Output")]
    exclude: Vec<String>,

    // Export
    /// Manifest format: txt | json [default: txt]
    #[arg(long, help_heading = "Export")]
    manifest: Option<String>,
    /// Export packing stats (JSON) to this file
    #[arg(long, help_heading = "Export")]
    export_stats: Option<PathBuf>,
    /// Dry run: compute placements and stats but do not write files
    #[arg(long, default_value_t = false, help_heading = "Export")]
    dry_run: bool,

    /// Show progress bars (disable with --progress false or --quiet)
    #[arg(long, default_value_t = true, action=ArgAction::Set, help_heading = "Logging/UX")]
    progress: bool,
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action=ArgAction::Count, help_heading = "Logging/UX")]
    verbose: u8,
    /// Quiet mode (overrides verbose)
    #[arg(short, long, default_value_t = false, help_heading = "Logging/UX")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if is_arity_error(&e) => {
            print_usage();
            return Ok(());
        }
        Err(e) => e.exit(),
    };
    init_tracing_with_level(cli.quiet, cli.verbose);
    run(&cli, cli.progress && !cli.quiet)
}

/// Wrong number of positionals prints usage and exits successfully.
fn is_arity_error(e: &clap::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::MissingRequiredArgument
            | ErrorKind::UnknownArgument
            | ErrorKind::TooManyValues
            | ErrorKind::WrongNumberOfValues
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

fn print_usage() {
    let mut cmd = Cli::command();
    println!("{}", cmd.render_usage());
    println!("\tExample: atlas-gen atlas 2048 2048 images");
}

/// Options after merging the command line with an optional YAML file.
#[derive(Debug, Clone)]
struct Settings {
    cfg: AtlasConfig,
    out_dir: PathBuf,
    extensions: Vec<String>,
    include: Vec<String>,
    exclude: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct YamlConfig {
    manifest: Option<String>,
    background: Option<[u8; 4]>,
    extensions: Option<Vec<String>>,
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    out_dir: Option<PathBuf>,
}

fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let y: YamlConfig = match &cli.config {
        Some(path) => {
            let file = fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_yaml::from_str(&file)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => YamlConfig::default(),
    };

    // command line wins over the config file
    let manifest = match cli.manifest.as_deref().or(y.manifest.as_deref()) {
        Some(s) => parse_manifest_format(s)?,
        None => ManifestFormat::default(),
    };
    let mut builder = AtlasConfig::builder()
        .with_dimensions(cli.width, cli.height)
        .manifest_format(manifest);
    if let Some(bg) = y.background {
        builder = builder.background(bg);
    }
    let cfg = builder.build();
    cfg.validate()?;

    let extensions = y
        .extensions
        .unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect())
        .into_iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();
    let include = if cli.include.is_empty() {
        y.include.unwrap_or_default()
    } else {
        cli.include.clone()
    };
    let exclude = if cli.exclude.is_empty() {
        y.exclude.unwrap_or_default()
    } else {
        cli.exclude.clone()
    };
    let out_dir = cli
        .out_dir
        .clone()
        .or(y.out_dir)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(Settings {
        cfg,
        out_dir,
        extensions,
        include,
        exclude,
    })
}

fn parse_manifest_format(s: &str) -> anyhow::Result<ManifestFormat> {
    s.parse()
        .map_err(|_| anyhow!("unknown manifest format: {}", s))
}

fn run(cli: &Cli, show_progress: bool) -> anyhow::Result<()> {
    if !cli.directory.is_dir() {
        anyhow::bail!("could not find directory '{}'", cli.directory.display());
    }
    let settings = resolve_settings(cli)?;

    // ingest
    let paths = gather_paths(&cli.directory, &settings)?;
    info!(count = paths.len(), "found images");
    let (inputs, sources) = load_images_with_progress(&cli.directory, &paths, show_progress);
    info!(count = inputs.len(), "loaded input images");
    if inputs.is_empty() {
        warn!(dir = %cli.directory.display(), "no images loaded, the atlas will be empty");
    }

    // sort + place
    let out = pack_images(inputs, settings.cfg.clone()).map_err(|e| explain(e, &sources))?;
    let stats = out.stats();
    info!(
        atlases = stats.num_pages,
        images = stats.num_frames,
        occupancy = %format!("{:.2}%", stats.occupancy * 100.0),
        "stats"
    );

    if cli.dry_run {
        println!("{}", stats.summary());
        return Ok(());
    }

    // emit
    fs::create_dir_all(&settings.out_dir)
        .with_context(|| format!("create out_dir {}", settings.out_dir.display()))?;
    let failed = write_atlases(&out, &settings, &cli.name);

    if let Some(stats_path) = &cli.export_stats {
        fs::write(stats_path, serde_json::to_string_pretty(&stats)?)
            .with_context(|| format!("write {}", stats_path.display()))?;
        info!(?stats_path, "stats exported");
    }

    if failed > 0 {
        anyhow::bail!("{} of {} atlases could not be written", failed, out.pages.len());
    }
    Ok(())
}

/// Writes every atlas in creation order. A failed atlas is logged and skipped;
/// returns the number of failures.
fn write_atlases(out: &PackOutput, settings: &Settings, name: &str) -> usize {
    let mut failed = 0;
    for page in &out.pages {
        info!(atlas = %format!("{}{}", name, page.page.id + 1), "writing atlas");
        match page.write(
            &settings.out_dir,
            name,
            &out.layout.meta,
            settings.cfg.manifest_format,
        ) {
            Ok(written) => {
                debug!(image = ?written.image, manifest = ?written.manifest, "atlas written");
            }
            Err(e) => {
                error!(atlas = page.page.id + 1, error = %e, "could not write atlas");
                failed += 1;
            }
        }
    }
    failed
}

/// Maps core errors back to the file that caused them.
fn explain(err: AtlasGenError, sources: &HashMap<String, PathBuf>) -> anyhow::Error {
    match err {
        AtlasGenError::OversizedImage {
            key,
            width,
            height,
            atlas_width,
            atlas_height,
        } => {
            let path = sources
                .get(&key)
                .map(|p| p.display().to_string())
                .unwrap_or(key);
            anyhow!(
                "'{}' ({}x{}) is larger than the atlas ({}x{})",
                path,
                width,
                height,
                atlas_width,
                atlas_height
            )
        }
        other => other.into(),
    }
}

fn gather_paths(root: &Path, settings: &Settings) -> anyhow::Result<Vec<PathBuf>> {
    let inc_set = build_globset(&settings.include)?;
    let exc_set = build_globset(&settings.exclude)?;
    let mut list: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skip unreadable entry");
                continue;
            }
        };
        let p = entry.path();
        if !entry.file_type().is_file() || !is_image(p, &settings.extensions) {
            continue;
        }
        let rel = normalized(p.strip_prefix(root).unwrap_or(p));
        if should_skip(&rel, inc_set.as_ref(), exc_set.as_ref()) {
            continue;
        }
        list.push(p.to_path_buf());
    }
    Ok(list)
}

fn build_globset(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut b = GlobSetBuilder::new();
    for pat in patterns {
        b.add(Glob::new(pat)?);
    }
    Ok(Some(b.build()?))
}

fn should_skip(rel: &str, include: Option<&GlobSet>, exclude: Option<&GlobSet>) -> bool {
    if let Some(ex) = exclude {
        if ex.is_match(rel) {
            return true;
        }
    }
    if let Some(inc) = include {
        if !inc.is_match(rel) {
            return true;
        }
    }
    false
}

fn is_image(p: &Path, extensions: &[String]) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_ascii_lowercase())
        .is_some_and(|ext| extensions.iter().any(|e| *e == ext))
}

fn normalized(p: &Path) -> String {
    p.to_string_lossy().replace('\\', "/")
}

/// Logical name of `path`: relative to `root`, forward slashes, no extension.
fn logical_name(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    normalized(&rel.with_extension(""))
}

/// Decodes every path. Unreadable files and duplicate names are logged and skipped.
/// Returns the inputs and a name → source path map.
fn load_images_with_progress(
    root: &Path,
    paths: &[PathBuf],
    progress: bool,
) -> (Vec<InputImage>, HashMap<String, PathBuf>) {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = if progress {
        let b = ProgressBar::new(paths.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} loading {pos}/{len} [{elapsed_precise}] {wide_msg}",
        ) {
            b.set_style(style);
        }
        Some(b)
    } else {
        None
    };
    let mut list = Vec::with_capacity(paths.len());
    let mut sources: HashMap<String, PathBuf> = HashMap::with_capacity(paths.len());
    for p in paths {
        let msg = p.file_name().and_then(|s| s.to_str()).unwrap_or("");
        if let Some(b) = &bar {
            b.set_message(msg.to_string());
        }
        let key = logical_name(root, p);
        if let Some(first) = sources.get(&key) {
            error!(?p, ?first, name = %key, "duplicate image name, skip image");
        } else {
            match load_image(p) {
                Ok(img) => {
                    debug!(name = %key, w = img.width(), h = img.height(), "loaded");
                    sources.insert(key.clone(), p.clone());
                    list.push(InputImage { key, image: img });
                }
                Err(e) => {
                    error!(?p, error = %e, "could not open file, skip image");
                }
            }
        }
        if let Some(b) = &bar {
            b.inc(1);
        }
    }
    if let Some(b) = &bar {
        b.finish_and_clear();
    }
    (list, sources)
}

fn load_image(p: &Path) -> anyhow::Result<DynamicImage> {
    let img = ImageReader::open(p)?.with_guessed_format()?.decode()?;
    Ok(img)
}

fn init_tracing_with_level(quiet: bool, verbose: u8) {
    let level = if quiet {
        "error".to_string()
    } else {
        match verbose {
            0 => "info".into(),
            1 => "debug".into(),
            _ => "trace".into(),
        }
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn cli(args: &[&str]) -> Cli {
        let mut full = vec!["atlas-gen"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).expect("valid arguments")
    }

    fn save_png(dir: &Path, rel: &str, w: u32, h: u32) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]))
            .save(&path)
            .expect("save");
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read_dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn wrong_arity_is_detected() {
        let few = Cli::try_parse_from(["atlas-gen", "atlas", "64"]).expect_err("too few");
        assert!(is_arity_error(&few));
        let many = Cli::try_parse_from(["atlas-gen", "atlas", "64", "64", "dir", "extra"])
            .expect_err("too many");
        assert!(is_arity_error(&many));
    }

    #[test]
    fn zero_width_is_a_value_error() {
        let err = Cli::try_parse_from(["atlas-gen", "atlas", "0", "64", "dir"]).expect_err("zero");
        assert!(!is_arity_error(&err));
    }

    #[test]
    fn logical_name_is_relative_without_extension() {
        let root = Path::new("assets");
        assert_eq!(logical_name(root, Path::new("assets/ui/button.png")), "ui/button");
        assert_eq!(logical_name(root, Path::new("assets/hero.v2.png")), "hero.v2");
    }

    #[test]
    fn yaml_config_is_merged_under_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = dir.path().join("atlas.yaml");
        fs::write(
            &cfg_path,
            "manifest: json\nbackground: [0, 0, 0, 255]\nextensions: [\".PNG\"]\nexclude: [\"raw/**\"]\n",
        )
        .expect("write config");
        let cfg_arg = cfg_path.to_string_lossy().into_owned();

        let s = resolve_settings(&cli(&["a", "32", "16", "in", "--config", &cfg_arg]))
            .expect("settings");
        assert_eq!(s.cfg.manifest_format, ManifestFormat::Json);
        assert_eq!(s.cfg.background, [0, 0, 0, 255]);
        assert_eq!((s.cfg.width, s.cfg.height), (32, 16));
        assert_eq!(s.extensions, vec!["png".to_string()]);
        assert_eq!(s.exclude, vec!["raw/**".to_string()]);
        assert_eq!(s.out_dir, PathBuf::from("."));

        let s = resolve_settings(&cli(&[
            "a", "32", "16", "in", "--config", &cfg_arg, "--manifest", "txt",
        ]))
        .expect("settings");
        assert_eq!(s.cfg.manifest_format, ManifestFormat::Txt);
    }

    #[test]
    fn packs_a_directory_tree_into_numbered_atlases() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        save_png(input.path(), "a.png", 60, 60);
        save_png(input.path(), "sub/b.png", 60, 60);
        save_png(input.path(), "sub/deeper/c.png", 60, 60);
        fs::write(input.path().join("notes.txt"), "not an image").expect("write");

        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        let args = cli(&["sheet", "120", "60", &in_arg, "-o", &out_arg]);
        run(&args, false).expect("run");

        assert_eq!(
            files_in(output.path()),
            vec!["sheet1.png", "sheet1.txt", "sheet2.png", "sheet2.txt"]
        );
        let first = fs::read_to_string(output.path().join("sheet1.txt")).expect("manifest");
        assert_eq!(first, "a 0 0 60 60\nsub/b 60 0 60 60\n");
        let second = fs::read_to_string(output.path().join("sheet2.txt")).expect("manifest");
        assert_eq!(second, "sub/deeper/c 0 0 60 60\n");
    }

    #[test]
    fn oversized_image_aborts_before_writing() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        save_png(input.path(), "small.png", 10, 10);
        save_png(input.path(), "wide.png", 200, 50);

        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        let err = run(&cli(&["atlas", "150", "150", &in_arg, "-o", &out_arg]), false)
            .expect_err("oversized");
        let msg = err.to_string();
        assert!(msg.contains("wide.png"), "{}", msg);
        assert!(msg.contains("200x50"), "{}", msg);
        assert!(msg.contains("150x150"), "{}", msg);
        assert!(files_in(output.path()).is_empty());
    }

    #[test]
    fn missing_directory_is_fatal() {
        let output = tempfile::tempdir().expect("output");
        let missing = output.path().join("nope");
        let in_arg = missing.to_string_lossy().into_owned();
        let err = run(&cli(&["atlas", "64", "64", &in_arg]), false).expect_err("missing");
        assert!(err.to_string().contains("could not find directory"));
    }

    #[test]
    fn corrupt_files_and_duplicate_names_are_skipped() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        save_png(input.path(), "good.png", 8, 8);
        fs::write(input.path().join("broken.png"), b"definitely not a png").expect("write");
        // same logical name as dup.png; walked first because of name order
        RgbaImage::new(4, 4)
            .save(input.path().join("dup.bmp"))
            .expect("bmp");
        save_png(input.path(), "dup.png", 16, 16);

        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        run(&cli(&["atlas", "64", "64", &in_arg, "-o", &out_arg]), false).expect("run");

        let manifest = fs::read_to_string(output.path().join("atlas1.txt")).expect("manifest");
        // good (8x8) goes first by area; dup is the 4x4 bmp
        assert_eq!(manifest, "dup 8 0 4 4\ngood 0 0 8 8\n");
    }

    #[test]
    fn directory_of_corrupt_files_still_emits_one_empty_atlas() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        fs::write(input.path().join("broken.png"), b"nope").expect("write");

        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        run(&cli(&["atlas", "64", "64", &in_arg, "-o", &out_arg]), false).expect("run");

        assert_eq!(files_in(output.path()), vec!["atlas1.png", "atlas1.txt"]);
        let manifest = fs::read_to_string(output.path().join("atlas1.txt")).expect("manifest");
        assert!(manifest.is_empty());
        let png = image::open(output.path().join("atlas1.png")).expect("png");
        assert_eq!((png.width(), png.height()), (64, 64));
    }

    #[test]
    fn failed_atlas_does_not_stop_later_atlases() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        save_png(input.path(), "a.png", 60, 60);
        save_png(input.path(), "b.png", 60, 60);
        save_png(input.path(), "c.png", 60, 60);
        // a directory where the first raster should go
        fs::create_dir(output.path().join("sheet1.png")).expect("mkdir");

        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        let err = run(&cli(&["sheet", "120", "60", &in_arg, "-o", &out_arg]), false)
            .expect_err("first atlas cannot be written");
        assert!(err.to_string().contains("1 of 2"), "{}", err);

        assert!(output.path().join("sheet2.png").is_file());
        let second = fs::read_to_string(output.path().join("sheet2.txt")).expect("manifest");
        assert_eq!(second, "c 0 0 60 60\n");
        assert!(!output.path().join("sheet1.txt").exists());
    }

    #[test]
    fn dry_run_writes_nothing() {
        let input = tempfile::tempdir().expect("input");
        let output = tempfile::tempdir().expect("output");
        save_png(input.path(), "a.png", 8, 8);
        let in_arg = input.path().to_string_lossy().into_owned();
        let out_arg = output.path().to_string_lossy().into_owned();
        run(
            &cli(&["atlas", "64", "64", &in_arg, "-o", &out_arg, "--dry-run"]),
            false,
        )
        .expect("run");
        assert!(files_in(output.path()).is_empty());
    }
}
