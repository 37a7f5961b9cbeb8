use audiobook_narrator::concat::concatenate;
use audiobook_narrator::config::{AppConfig, DEFAULT_CONFIG_FILE};
use audiobook_narrator::convert::{discover_models, F0Method};
use audiobook_narrator::extract::{extract_epub_images, extract_text};
use audiobook_narrator::library::{existing_audio_files, BookDir, Library};
use audiobook_narrator::pipeline::{JobReport, Progress};
use audiobook_narrator::sections::{parse_selection, section_label, SectionStore};
use audiobook_narrator::voices::{self, Gender, Grade, Region};
use audiobook_narrator::Error;
use clap::{Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;

fn synthesis_args() -> Vec<Arg> {
    vec![
        Arg::new("voice")
            .short('v')
            .long("voice")
            .value_name("VOICE")
            .help("Voice id, see the `voices` command"),
        Arg::new("speed")
            .short('s')
            .long("speed")
            .value_name("FLOAT")
            .help("Voice speed multiplier")
            .value_parser(clap::value_parser!(f32)),
        Arg::new("rvc-model")
            .long("rvc-model")
            .value_name("NAME")
            .help("Re-voice the speech with this conversion model"),
        Arg::new("pitch")
            .long("pitch")
            .value_name("SEMITONES")
            .help("Pitch shift applied by voice conversion")
            .allow_hyphen_values(true)
            .value_parser(clap::value_parser!(i32)),
        Arg::new("f0-method")
            .long("f0-method")
            .value_name("METHOD")
            .help("Pitch extraction method")
            .value_parser(["harvest", "pm", "crepe", "rmvpe"]),
        Arg::new("index-rate")
            .long("index-rate")
            .value_name("FLOAT")
            .help("Feature index influence (0.0-1.0)")
            .value_parser(clap::value_parser!(f32)),
    ]
}

fn input_arg() -> Arg {
    Arg::new("input")
        .short('i')
        .long("input")
        .value_name("FILE")
        .help("Input text, EPUB or PDF file")
        .required(true)
}

fn book_arg() -> Arg {
    Arg::new("book")
        .short('b')
        .long("book")
        .value_name("NAME")
        .help("Output folder name (defaults to the input file name)")
}

fn cli() -> Command {
    Command::new("Audiobook Narrator")
        .version("1.0")
        .about("Narrates text, EPUB and PDF books into per-section audio files")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file")
                .default_value(DEFAULT_CONFIG_FILE)
                .global(true),
        )
        .arg(
            Arg::new("output-root")
                .short('o')
                .long("output-root")
                .value_name("DIR")
                .help("Folder holding one subfolder per book")
                .global(true),
        )
        .subcommand(
            Command::new("voices")
                .about("List available voices")
                .arg(Arg::new("region").long("region").value_name("US|UK"))
                .arg(Arg::new("gender").long("gender").value_name("female|male"))
                .arg(Arg::new("min-grade").long("min-grade").value_name("GRADE")),
        )
        .subcommand(Command::new("models").about("List voice conversion models"))
        .subcommand(Command::new("sections").about("Show how a document splits into sections").arg(input_arg()))
        .subcommand(
            Command::new("generate")
                .about("Generate audio for the selected sections")
                .arg(input_arg())
                .arg(book_arg())
                .arg(
                    Arg::new("sections")
                        .long("sections")
                        .value_name("LIST")
                        .help("Sections to narrate, e.g. 1-5,8")
                        .default_value("all"),
                )
                .arg(
                    Arg::new("resume")
                        .long("resume")
                        .help("Skip sections already generated in the book folder")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help("Wipe the book folder before starting")
                        .action(ArgAction::SetTrue)
                        .conflicts_with("resume"),
                )
                .args(synthesis_args()),
        )
        .subcommand(
            Command::new("regenerate")
                .about("Regenerate one section, or every section from it onwards")
                .arg(input_arg())
                .arg(book_arg())
                .arg(
                    Arg::new("section")
                        .long("section")
                        .value_name("N")
                        .required(true)
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("from")
                        .long("from")
                        .help("Also regenerate all following sections")
                        .action(ArgAction::SetTrue),
                )
                .args(synthesis_args()),
        )
        .subcommand(
            Command::new("concat")
                .about("Join the generated sections into complete_audiobook.wav")
                .arg(book_arg().required(true)),
        )
        .subcommand(Command::new("init-config").about("Write the current settings to the settings file"))
}

fn load_config(matches: &ArgMatches) -> Result<AppConfig, Error> {
    let path = Path::new(matches.get_one::<String>("config").map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE));
    let mut config = AppConfig::load(path)?;
    if let Some(root) = matches.get_one::<String>("output-root") {
        config.output_root = PathBuf::from(root);
    }
    Ok(config)
}

/// Applies the synthesis flags on top of the settings file.
fn apply_synthesis_args(matches: &ArgMatches, config: &mut AppConfig) -> Result<(), Error> {
    if let Some(voice) = matches.get_one::<String>("voice") {
        config.voice = voice.clone();
    }
    if let Some(speed) = matches.get_one::<f32>("speed") {
        config.speed = *speed;
    }
    if let Some(model) = matches.get_one::<String>("rvc-model") {
        config.conversion.enabled = true;
        config.conversion.model = Some(model.clone());
    }
    if let Some(pitch) = matches.get_one::<i32>("pitch") {
        config.conversion.pitch_shift = *pitch;
    }
    if let Some(method) = matches.get_one::<String>("f0-method") {
        config.conversion.method = method.parse::<F0Method>().map_err(Error::InvalidSelection)?;
    }
    if let Some(rate) = matches.get_one::<f32>("index-rate") {
        config.conversion.index_rate = *rate;
    }
    Ok(())
}

fn load_book(matches: &ArgMatches, library: &Library, force: bool) -> Result<(BookDir, SectionStore), Box<dyn std::error::Error>> {
    let input = Path::new(matches.get_one::<String>("input").map(String::as_str).unwrap_or_default());
    let name = match matches.get_one::<String>("book") {
        Some(name) => name.clone(),
        None => input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or("Input file has no name")?,
    };

    println!("📖 Reading {}...", input.display());
    let text = extract_text(input);
    if text.is_empty() {
        return Err(format!("No text could be extracted from {}", input.display()).into());
    }

    let book = library.open_book(&name, force)?;
    let is_epub = input
        .extension()
        .map_or(false, |e| e.eq_ignore_ascii_case("epub"));
    if is_epub {
        extract_epub_images(input, &book.path)?;
    }

    let store = SectionStore::from_text(&text);
    println!("✅ Found {} sections", store.len());
    Ok((book, store))
}

fn progress_bar(total: usize) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>7}/{len:7} {msg}")?
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    Ok(bar)
}

fn finish(report: &JobReport, started: Instant) -> Result<(), Box<dyn std::error::Error>> {
    if report.is_success() {
        println!("✅ {} ({:.2?})", report.message(), started.elapsed());
        Ok(())
    } else {
        Err(report.message().into())
    }
}

fn run_voices(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let region = matches.get_one::<String>("region").map(|r| r.parse::<Region>()).transpose()?;
    let gender = matches.get_one::<String>("gender").map(|g| g.parse::<Gender>()).transpose()?;
    let min_grade = matches.get_one::<String>("min-grade").map(|g| g.parse::<Grade>()).transpose()?;

    for voice in voices::filter(region, gender, min_grade) {
        println!("{:<14} {:<10} {}", voice.id, voice.name, voice.display_name());
    }
    Ok(())
}

fn run_models(config: &AppConfig) {
    let models = discover_models(&config.models_dir);
    if models.is_empty() {
        println!("No voice conversion models in {}", config.models_dir.display());
    }
    for model in models {
        println!("{:<30} {}", model.name, model.path.display());
    }
}

fn run_sections(matches: &ArgMatches) -> Result<(), Box<dyn std::error::Error>> {
    let input = Path::new(matches.get_one::<String>("input").map(String::as_str).unwrap_or_default());
    let store = SectionStore::from_text(&extract_text(input));
    for section in store.sections() {
        println!("{}", section_label(section.index, &section.text));
    }
    println!("📊 {} sections", store.len());
    Ok(())
}

fn run_generate(matches: &ArgMatches, mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    apply_synthesis_args(matches, &mut config)?;
    let library = Library::new(&config.output_root)?;
    let (book, store) = load_book(matches, &library, matches.get_flag("force"))?;

    let selection = matches.get_one::<String>("sections").map(String::as_str).unwrap_or("all");
    let job = config.job(parse_selection(selection, store.len())?)?;

    let mut pipeline = config.pipeline().with_output_dir(&book.path);
    let started = Instant::now();

    let resume = matches.get_flag("resume");
    let remaining = if resume {
        let existing = pipeline.restore_from_disk();
        println!("⏭️  {} sections already generated", existing);
        let last = pipeline.state().last_completed;
        job.sections().iter().filter(|&&i| i > last).count()
    } else {
        job.sections().len()
    };

    println!("🎤 Narrating into {}...", book.path.display());
    let bar = progress_bar(remaining)?;
    let on_progress = |p: &Progress| {
        bar.set_position(p.processed as u64);
        bar.set_message(p.label.clone());
    };
    let report = if resume {
        pipeline.resume(&store, &job, on_progress)
    } else {
        pipeline.generate(&store, &job, on_progress)
    };
    bar.finish_and_clear();

    for artifact in report.artifacts.iter().filter(|a| a.used_fallback) {
        println!("⚠️  Section {} kept its unconverted audio", artifact.section_index);
    }
    finish(&report, started)
}

fn run_regenerate(matches: &ArgMatches, mut config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    apply_synthesis_args(matches, &mut config)?;
    let library = Library::new(&config.output_root)?;
    let (book, store) = load_book(matches, &library, false)?;

    let section = matches.get_one::<usize>("section").copied().unwrap_or(1);
    let job = config.job(vec![section])?;
    let mut pipeline = config.pipeline().with_output_dir(&book.path);
    pipeline.restore_from_disk();
    let started = Instant::now();

    if matches.get_flag("from") {
        let bar = progress_bar(store.len().saturating_sub(section) + 1)?;
        let report = pipeline.regenerate_from(&store, section, &job, |p| {
            bar.set_position(p.processed as u64);
            bar.set_message(p.label.clone());
        });
        bar.finish_and_clear();
        if report.is_success() {
            println!("✅ Successfully regenerated sections from {} onwards ({:.2?})", section, started.elapsed());
            return Ok(());
        }
        return finish(&report, started);
    }

    let artifact = pipeline.regenerate_section(&store, section, &job)?;
    println!("✅ Successfully regenerated section {} → {}", section, artifact.path.display());
    Ok(())
}

fn run_concat(matches: &ArgMatches, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let library = Library::new(&config.output_root)?;
    let name = matches.get_one::<String>("book").map(String::as_str).unwrap_or_default();
    let dir = library.book_path(name);

    let tracks: Vec<PathBuf> = existing_audio_files(&dir).into_iter().map(|(_, p)| p).collect();
    println!("📝 Joining {} sections...", tracks.len());
    let output = concatenate(&tracks, dir.is_dir().then_some(dir.as_path()))?;
    println!("✅ Audio files concatenated successfully: {}", output.display());
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("voices", sub)) => run_voices(sub),
        Some(("models", _)) => {
            run_models(&config);
            Ok(())
        }
        Some(("sections", sub)) => run_sections(sub),
        Some(("generate", sub)) => run_generate(sub, config),
        Some(("regenerate", sub)) => run_regenerate(sub, config),
        Some(("concat", sub)) => run_concat(sub, &config),
        Some(("init-config", _)) => {
            let path = matches.get_one::<String>("config").map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE);
            config.save(Path::new(path))?;
            println!("📁 Settings written to {}", path);
            Ok(())
        }
        _ => unreachable!("a subcommand is required"),
    }
}
