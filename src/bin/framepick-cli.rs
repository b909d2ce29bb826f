use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use framepick::{
    AnalysisRequest, AnalysisStatus, AnalysisOptions, ExportRequest, FfmpegLogLevel, Lut, LutParseMode, Pipeline,
    PipelineOptions, ProfileTable, ProgressCallback, ProgressInfo,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  framepick metadata episode.mp4 --json\n  framepick analyze episode.mp4 --frames 8 --profile interview --progress\n  framepick export episode.mp4 --frames 120,4810,9003 --format jpg --out stills.zip\n  framepick apply-lut still.png --lut film.cube --out graded.png\n  framepick completions zsh > _framepick";

#[derive(Debug, Parser)]
#[command(
    name = "framepick",
    version,
    about = "Rank, grade, and export the best still frames of a video",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long)]
    verbose: bool,

    /// Show a progress bar where supported.
    #[arg(long)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long)]
    overwrite: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, debug).
    #[arg(long)]
    log_level: Option<String>,

    /// Worker thread count for parallel rendering.
    #[arg(long)]
    threads: Option<usize>,

    /// JSON file with custom project profiles.
    #[arg(long)]
    profiles_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata.
    #[command(
        visible_alias = "info",
        after_help = "Examples:\n  framepick metadata input.mp4\n  framepick metadata input.mp4 --json"
    )]
    Metadata {
        /// Input video path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Rank the best frames of a video.
    #[command(after_help = "Examples:\n  framepick analyze input.mp4 --frames 5 --profile podcast\n  framepick analyze input.mp4 --profile b-roll --min-spacing 250 --json")]
    Analyze {
        /// Input video path.
        input: PathBuf,
        /// Number of frames to select.
        #[arg(long, default_value_t = 5)]
        frames: usize,
        /// Project profile (podcast, documentary, commercial, interview, b-roll).
        #[arg(long, default_value = "podcast")]
        profile: String,
        /// Minimum distance in frames between selected frames.
        #[arg(long)]
        min_spacing: Option<u64>,
        /// Output the ranking as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Export frames into a ZIP archive.
    #[command(after_help = "Examples:\n  framepick export input.mp4 --frames 5,12,40 --out stills.zip\n  framepick export input.mp4 --frames 5,12 --format jpg --quality 90 --lut film.cube --out graded.zip")]
    Export {
        /// Input video path.
        input: PathBuf,
        /// Comma-separated frame numbers.
        #[arg(long)]
        frames: String,
        /// Output format (png, jpg, tiff, webp, bmp).
        #[arg(long, default_value = "png")]
        format: String,
        /// Quality for lossy formats (1-100).
        #[arg(long, default_value_t = framepick::export::DEFAULT_EXPORT_QUALITY)]
        quality: u32,
        /// `.cube` LUT applied to every frame.
        #[arg(long)]
        lut: Option<PathBuf>,
        /// Output archive path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Score one hand-picked frame.
    #[command(after_help = "Examples:\n  framepick score input.mp4 240 --profile interview\n  framepick score input.mp4 240 --json")]
    Score {
        /// Input video path.
        input: PathBuf,
        /// Frame number.
        frame: u64,
        /// Project profile (podcast, documentary, commercial, interview, b-roll).
        #[arg(long, default_value = "podcast")]
        profile: String,
        /// Output the score as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Save a JPEG preview of one frame.
    Preview {
        /// Input video path.
        input: PathBuf,
        /// Frame number.
        frame: u64,
        /// Output JPEG path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Grade an image through a `.cube` LUT.
    #[command(name = "apply-lut")]
    ApplyLut {
        /// Input image path.
        input: PathBuf,
        /// `.cube` LUT file.
        #[arg(long)]
        lut: PathBuf,
        /// Clamp out-of-range LUT values instead of rejecting the file.
        #[arg(long)]
        clamp: bool,
        /// Output image path.
        #[arg(long)]
        out: PathBuf,
    },

    /// List project profiles.
    Profiles {
        /// Output profiles as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn parse_frame_list(value: &str) -> Result<Vec<u64>, Box<dyn std::error::Error>> {
    let frames = value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u64>().map_err(|_| format!("invalid frame number: {part}")))
        .collect::<Result<Vec<_>, _>>()?;
    if frames.is_empty() {
        return Err("--frames needs at least one frame number".into());
    }
    Ok(frames)
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!("output already exists: {} (use --overwrite to replace)", path.display()).into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed = FfmpegLogLevel::from_name(level).ok_or(format!("unsupported --log-level: {level}"))?;
        framepick::set_ffmpeg_log_level(parsed);
    }

    if let Some(threads) = global.threads {
        if threads > 0 {
            unsafe {
                std::env::set_var("RAYON_NUM_THREADS", threads.to_string());
            }
        }
    }

    Ok(())
}

fn load_profiles(global: &GlobalOptions) -> Result<ProfileTable, Box<dyn std::error::Error>> {
    match &global.profiles_file {
        Some(path) => Ok(ProfileTable::from_json(&fs::read_to_string(path)?)?),
        None => Ok(ProfileTable::builtin()),
    }
}

fn build_pipeline(global: &GlobalOptions, analysis: AnalysisOptions) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let upload_root = std::env::temp_dir().join("framepick");
    let options = PipelineOptions::new(upload_root).with_analysis(analysis);
    Ok(Pipeline::new(options).with_profiles(load_profiles(global)?))
}

fn progress_bar(enabled: bool) -> Result<Option<ProgressBar>, Box<dyn std::error::Error>> {
    if !enabled {
        return Ok(None);
    }
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(Some(bar))
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.bar.set_length(info.total);
        self.bar.set_position(info.current);
        if let Some(frame) = info.current_frame {
            self.bar.set_message(format!("frame {frame}"));
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Metadata { input, json } => {
            let pipeline = build_pipeline(&cli.global, AnalysisOptions::default())?;
            let job_id = pipeline.register_video(&input)?;
            let info = pipeline.video_info(&job_id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("File: {}", input.display());
                println!("Resolution: {}x{}", info.width, info.height);
                println!("Frame rate: {:.3} fps", info.fps);
                println!("Frames: {}", info.frame_count);
                println!("Duration: {}", info.duration_formatted);
                println!("Codec: {}", info.codec);
            }
        }
        Commands::Analyze {
            input,
            frames,
            profile,
            min_spacing,
            json,
        } => {
            let mut analysis = AnalysisOptions::new();
            if let Some(spacing) = min_spacing {
                analysis = analysis.with_min_spacing(spacing);
            }
            let pipeline = build_pipeline(&cli.global, analysis)?;
            let job_id = pipeline.register_video(&input)?;
            let request = AnalysisRequest::new(frames, profile);

            let bar = progress_bar(cli.global.progress)?;
            let handle = match &bar {
                Some(bar) => pipeline.start_analysis_with_progress(
                    &job_id,
                    &request,
                    Arc::new(TerminalProgress { bar: bar.clone() }),
                )?,
                None => pipeline.start_analysis(&job_id, &request)?,
            };
            handle.wait();
            if let Some(bar) = bar {
                bar.finish_with_message("done");
            }

            match pipeline.analysis_status(&job_id)? {
                AnalysisStatus::Analyzed { frames } => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&json!({ "frames": frames }))?);
                    } else {
                        for (rank, frame) in frames.iter().enumerate() {
                            println!(
                                "{:>2}. frame {:>8} at {}  score {:.3} (face {:.2}, sharpness {:.2}, stability {:.2})",
                                rank + 1,
                                frame.frame_number,
                                framepick::format_timestamp(frame.timestamp_seconds),
                                frame.score,
                                frame.face_score,
                                frame.sharpness_score,
                                frame.stability_score
                            );
                        }
                        println!(
                            "{} {}",
                            "success:".green().bold(),
                            format!("Selected {} frame(s)", frames.len()).green()
                        );
                    }
                }
                AnalysisStatus::Error { error } => return Err(error.into()),
                other => return Err(format!("analysis did not finish: {other:?}").into()),
            }
        }
        Commands::Export {
            input,
            frames,
            format,
            quality,
            lut,
            out,
        } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let pipeline = build_pipeline(&cli.global, AnalysisOptions::default())?;
            let job_id = pipeline.register_video(&input)?;

            let mut request = ExportRequest::new(parse_frame_list(&frames)?)
                .with_format(format)
                .with_quality(quality);
            if let Some(lut_path) = &lut {
                request = request.with_lut(fs::read_to_string(lut_path)?);
            }

            let bar = progress_bar(cli.global.progress)?;
            let archive = match &bar {
                Some(bar) => pipeline.export_with_progress(
                    &job_id,
                    &request,
                    Arc::new(TerminalProgress { bar: bar.clone() }),
                )?,
                None => pipeline.export(&job_id, &request)?,
            };
            if let Some(bar) = bar {
                bar.finish_with_message("done");
            }

            fs::write(&out, &archive)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Wrote {} ({} bytes)", out.display(), archive.len()).green()
            );
        }
        Commands::Score {
            input,
            frame,
            profile,
            json,
        } => {
            let pipeline = build_pipeline(&cli.global, AnalysisOptions::default())?;
            let job_id = pipeline.register_video(&input)?;
            let scored = pipeline.score_frame(&job_id, frame, &profile)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&scored)?);
            } else {
                println!(
                    "frame {} at {}  score {:.3} (face {:.2}, sharpness {:.2}, stability {:.2})",
                    scored.frame_number,
                    framepick::format_timestamp(scored.timestamp_seconds),
                    scored.score,
                    scored.face_score,
                    scored.sharpness_score,
                    scored.stability_score
                );
            }
        }
        Commands::Preview { input, frame, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let pipeline = build_pipeline(&cli.global, AnalysisOptions::default())?;
            let job_id = pipeline.register_video(&input)?;
            let jpeg = pipeline.preview(&job_id, frame)?;
            fs::write(&out, jpeg)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Saved preview of frame {frame} to {}", out.display()).green()
            );
        }
        Commands::ApplyLut { input, lut, clamp, out } => {
            ensure_writable_path(&out, cli.global.overwrite)?;
            let mode = if clamp { LutParseMode::Clamp } else { LutParseMode::Strict };
            let lut = Lut::parse_with_mode(&fs::read(&lut)?, mode)?;
            if cli.global.verbose {
                eprintln!(
                    "loaded {}³ LUT{}",
                    lut.size(),
                    lut.title().map(|title| format!(" \"{title}\"")).unwrap_or_default()
                );
            }
            let image = image::open(&input)?.to_rgb8();
            lut.apply(&image).save(&out)?;
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Graded {} -> {}", input.display(), out.display()).green()
            );
        }
        Commands::Profiles { json } => {
            let table = load_profiles(&cli.global)?;
            if json {
                println!("{}", serde_json::to_string_pretty(table.profiles())?);
            } else {
                for profile in table.profiles() {
                    let marker = if profile.id == table.default_profile().id { "*" } else { " " };
                    println!(
                        "{marker} {:<12} face {:.2}  sharpness {:.2}  stability {:.2}  {}",
                        profile.id, profile.face_weight, profile.sharpness_weight, profile.stability_weight, profile.description
                    );
                }
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framepick", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::{ensure_writable_path, parse_frame_list};

    #[test]
    fn parse_frame_list_accepts_spaces_and_duplicates() {
        assert_eq!(parse_frame_list("5, 5,12 ,40").unwrap(), vec![5, 5, 12, 40]);
    }

    #[test]
    fn parse_frame_list_rejects_garbage() {
        assert!(parse_frame_list("5,abc").is_err());
        assert!(parse_frame_list("-3").is_err());
        assert!(parse_frame_list(" , ").is_err());
    }

    #[test]
    fn existing_output_requires_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.zip");
        assert!(ensure_writable_path(&path, false).is_ok());
        std::fs::write(&path, b"x").unwrap();
        assert!(ensure_writable_path(&path, false).is_err());
        assert!(ensure_writable_path(&path, true).is_ok());
    }
}
