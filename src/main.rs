use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use guardian::error::{config_error, IntoGuardianError};
use guardian::strategy::list_strategies;
use guardian::video::collect_inputs;
use guardian::{dependencies, CensorOutcome, CensorSettings, Config, ConfigBuilder, ConfigFile};
use guardian::{FfmpegTool, GuardianProcessor, ProgressOperation, Result};

fn build_cli() -> Command {
    Command::new("guardian")
        .about("Mutes profane dialogue in video files using subtitle timing")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("input")
                .value_name("INPUT")
                .help("Video files or directories to process (directories are searched recursively)")
                .num_args(1..)
                .required(false) // Will be validated in parse_config
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Output video file (single input only; defaults to <input>_censored.mp4)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("suffix")
                .long("suffix")
                .value_name("SUFFIX")
                .help("Suffix for generated output names"),
        )
        .arg(
            Arg::new("words")
                .short('w')
                .long("words")
                .value_name("WORD,WORD,...")
                .help("Comma-separated list of words to censor, replacing the defaults")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("extra-words")
                .long("extra-words")
                .value_name("WORD,WORD,...")
                .help("Comma-separated words to censor in addition to the list in effect")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("quick")
                .long("quick")
                .help("Single basic pass without acoustic verification")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-attempts")
                .long("max-attempts")
                .value_name("N")
                .help("Maximum escalation attempts (1-3)")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("threshold")
                .long("threshold")
                .value_name("DB")
                .help("RMS level in dB a censored segment must not exceed")
                .allow_negative_numbers(true)
                .value_parser(clap::value_parser!(f64)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .help("Time limit for each FFmpeg invocation (0 disables)")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ffmpeg-path")
                .long("ffmpeg-path")
                .value_name("PATH")
                .help("FFmpeg executable")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("ffprobe-path")
                .long("ffprobe-path")
                .value_name("PATH")
                .help("ffprobe executable")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("diagnostics-dir")
                .long("diagnostics-dir")
                .value_name("DIR")
                .help("Directory for diagnostic reports (defaults to the output directory)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("no-diagnostics")
                .long("no-diagnostics")
                .help("Do not write diagnostic report files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (YAML/JSON)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("profile")
                .short('p')
                .long("profile")
                .value_name("NAME")
                .help("Configuration profile to use"),
        )
        .arg(
            Arg::new("save-config")
                .long("save-config")
                .value_name("FILE")
                .help("Write the effective settings to a YAML/JSON config file and exit")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("list-profiles")
                .long("list-profiles")
                .help("List available configuration profiles")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("list-strategies")
                .long("list-strategies")
                .help("List the escalation strategies")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-progress")
                .long("no-progress")
                .help("Disable progress indicators")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("FILE")
                .help("Write log output to a file instead of stderr")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

fn init_logging(matches: &ArgMatches) -> Result<()> {
    let level = if matches.get_flag("verbose") { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));

    if let Some(path) = matches.get_one::<PathBuf>("log-file") {
        let file = std::fs::File::create(path).with_path(path.clone())?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .write_style(env_logger::WriteStyle::Never);
    }

    builder.init();
    Ok(())
}

async fn load_config_file(matches: &ArgMatches) -> Result<Option<ConfigFile>> {
    match matches.get_one::<PathBuf>("config") {
        Some(config_path) => Ok(Some(ConfigFile::load(config_path).await?)),
        None => Ok(ConfigFile::load_from_default_locations().await),
    }
}

fn print_profiles(config_file: &ConfigFile) {
    println!("Available configuration profiles:");
    for name in config_file.list_profiles() {
        let description = config_file
            .profile(&name)
            .and_then(|p| p.description)
            .unwrap_or_else(|| "No description".to_string());
        println!("  {}: {}", name, description);
    }
}

fn print_strategies() {
    println!("Escalation strategies (tried in order):");
    for (level, name, description) in list_strategies() {
        println!("  {}. {}: {}", level, name, description);
    }
}

fn parse_config(matches: &ArgMatches, config_file: Option<&ConfigFile>) -> Result<Config> {
    let inputs: Vec<PathBuf> = matches
        .get_many::<PathBuf>("input")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    if inputs.is_empty() {
        return Err(config_error("input", "At least one input file or directory is required"));
    }

    settings_builder(matches, config_file)?.inputs(inputs).build()
}

/// Config file, profile and flags layered in that order; inputs not included
fn settings_builder(matches: &ArgMatches, config_file: Option<&ConfigFile>) -> Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();

    // Apply config file settings
    if let Some(cf) = config_file {
        builder = match matches.get_one::<String>("profile") {
            Some(profile_name) => cf.apply_profile_to_builder(profile_name, builder)?,
            None => cf.apply_to_builder(builder)?,
        };
    } else if let Some(profile_name) = matches.get_one::<String>("profile") {
        builder = ConfigFile::default().apply_profile_to_builder(profile_name, builder)?;
    }

    if let Some(output) = matches.get_one::<PathBuf>("output") {
        builder = builder.output_file(output.clone());
    }
    if let Some(suffix) = matches.get_one::<String>("suffix") {
        builder = builder.output_suffix(suffix.clone());
    }
    if let Some(words) = matches.get_many::<String>("words") {
        builder = builder.matching_words(words.cloned().collect())?;
    }
    if let Some(words) = matches.get_many::<String>("extra-words") {
        builder = builder.extra_words(words.cloned().collect());
    }
    if matches.get_flag("quick") {
        builder = builder.full(false);
    }
    if let Some(&attempts) = matches.get_one::<u32>("max-attempts") {
        builder = builder.max_attempts(attempts)?;
    }
    if let Some(&threshold) = matches.get_one::<f64>("threshold") {
        builder = builder.threshold_db(threshold)?;
    }
    if let Some(&seconds) = matches.get_one::<u64>("timeout") {
        builder = builder.timeout_secs((seconds > 0).then_some(seconds));
    }
    if let Some(path) = matches.get_one::<PathBuf>("ffmpeg-path") {
        builder = builder.ffmpeg_path(path.clone());
    }
    if let Some(path) = matches.get_one::<PathBuf>("ffprobe-path") {
        builder = builder.ffprobe_path(path.clone());
    }
    if let Some(dir) = matches.get_one::<PathBuf>("diagnostics-dir") {
        builder = builder.diagnostics_dir(dir.clone());
    }
    if matches.get_flag("no-diagnostics") {
        builder = builder.write_diagnostics(false);
    }

    Ok(builder)
}

async fn save_config(matches: &ArgMatches, config_file: Option<&ConfigFile>, path: &Path) -> Result<()> {
    let settings = settings_builder(matches, config_file)?.settings();
    let mut saved = ConfigFile::from(&settings);
    saved.profiles = config_file.and_then(|cf| cf.profiles.clone());
    saved.save(path).await?;
    info!("Saved configuration to {}", path.display());
    Ok(())
}

async fn run(matches: ArgMatches) -> Result<ExitCode> {
    if matches.get_flag("list-strategies") {
        print_strategies();
        return Ok(ExitCode::SUCCESS);
    }

    let config_file = load_config_file(&matches).await?;

    if matches.get_flag("list-profiles") {
        print_profiles(&config_file.unwrap_or_default());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(path) = matches.get_one::<PathBuf>("save-config") {
        save_config(&matches, config_file.as_ref(), path).await?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = parse_config(&matches, config_file.as_ref())?;
    let show_progress = !matches.get_flag("no-progress")
        && config_file.as_ref().and_then(|cf| cf.show_progress).unwrap_or(true);
    let progress = ProgressOperation::new(show_progress);

    info!("Starting guardian with config: {:?}", config);

    // Validate system dependencies before processing
    progress
        .with_spinner(
            "Validating system dependencies",
            dependencies::validate_dependencies(&config.ffmpeg_path, &config.ffprobe_path),
        )
        .await?;

    let inputs = collect_inputs(&config.inputs, &config.output_suffix);
    if inputs.is_empty() {
        return Err(config_error("input", "No video files found in the given paths"));
    }

    let tool = FfmpegTool::new(&config.ffmpeg_path, &config.ffprobe_path)
        .with_timeout(config.timeout_secs.map(Duration::from_secs));
    let processor = GuardianProcessor::new(tool, CensorSettings::from(&config));

    let batch = (inputs.len() > 1)
        .then(|| progress.batch(inputs.len(), "videos"))
        .flatten();
    let mut failures = 0usize;

    for input in &inputs {
        let output = config.output_path_for(input);
        let label = format!(
            "Censoring {}",
            input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );

        match progress
            .with_spinner(&label, processor.process_video(input, &output))
            .await
        {
            Ok(CensorOutcome::Censored { output, report, .. }) => {
                info!(
                    "✓ Censored video: {} ({} segments, {} strategy)",
                    output.display(),
                    report.total_segments,
                    report.final_strategy_used
                );
            }
            Ok(CensorOutcome::NothingToCensor { input }) => {
                info!("✓ Nothing to censor in {}", input.display());
            }
            Ok(CensorOutcome::Failed { report, report_path }) => {
                failures += 1;
                error!("✗ Could not silence every segment of {}", input.display());
                println!("{}", report);
                if let Some(path) = report_path {
                    warn!("Diagnostic report: {}", path.display());
                }
            }
            Err(e) => {
                failures += 1;
                error!("✗ {}: {}", input.display(), e);
            }
        }

        if let Some(ref bar) = batch {
            bar.inc(1);
        }
    }

    if let Some(bar) = batch {
        bar.finish_with_message("done");
    }

    info!(
        "Processed {} file(s): {} succeeded, {} failed",
        inputs.len(),
        inputs.len() - failures,
        failures
    );

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = build_cli().get_matches();

    if let Err(e) = init_logging(&matches) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(matches).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
