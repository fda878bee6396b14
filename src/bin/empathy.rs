use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use empathy_engine::{EmpathyEngine, EngineConfig, SynthesisRequest};
use tracing::error;

/// Speak text with a voice that matches its emotion.
///
/// The sentiment of the text is detected with the Hugging Face inference API, which needs an API
/// token in HF_TOKEN or HUGGINGFACEHUB_API_TOKEN.
#[derive(Parser, Debug)]
#[command(name = "empathy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Text to speak
    #[arg(short, long, required_unless_present = "file")]
    text: Option<String>,

    /// Read the text to speak from a file
    #[arg(short, long, conflicts_with = "text")]
    file: Option<PathBuf>,

    /// Directory to write the audio file to (overrides the configuration)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the audio file (defaults to empathy_<emotion>.wav)
    #[arg(short = 'n', long)]
    filename: Option<String>,

    /// Also write the SSML document to this path
    #[arg(long)]
    ssml_file: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    #[cfg(windows)]
    if let Err(err) = empathy_engine::render::sapi::initialize() {
        eprintln!("Error: {}", err);
        return ExitCode::FAILURE;
    }

    let result = run(cli);

    #[cfg(windows)]
    empathy_engine::render::sapi::finalize();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "synthesis failed");
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> empathy_engine::Result<()> {
    let mut config = match cli.config.as_ref() {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output_dir = output;
    }

    let text = read_text(cli.text, cli.file.as_deref())?;

    let engine = EmpathyEngine::from_config(&config)?;
    let response = engine.synthesize(&SynthesisRequest {
        text,
        filename: cli.filename,
        include_ssml: cli.ssml_file.is_some(),
    })?;

    println!("Emotion:   {}", response.emotion);
    println!("Intensity: {:.2}", response.intensity);
    println!("Rate:      {} wpm", response.rate);
    println!("Volume:    {:.2}", response.volume);
    match response.pitch {
        Some(pitch) => println!("Pitch:     {}", pitch),
        None => println!("Pitch:     driver default"),
    }
    println!("Audio:     {}", response.audio_path.display());

    if let (Some(path), Some(ssml)) = (cli.ssml_file, response.ssml) {
        write_ssml(&path, &ssml)?;
        println!("SSML:      {}", path.display());
    }
    Ok(())
}

// Blank text is rejected before the classifier and the speech driver are set up.
fn read_text(text: Option<String>, file: Option<&Path>) -> empathy_engine::Result<String> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(path)?,
        (None, None) => String::new(),
    };
    if text.trim().is_empty() {
        return Err(empathy_engine::Error::EmptyInput);
    }
    Ok(text)
}

fn write_ssml(path: &Path, ssml: &str) -> empathy_engine::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, ssml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("empathy-cli-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_blank_text_rejected() {
        let blank = read_text(Some("  \n\t".into()), None);
        assert!(matches!(blank, Err(empathy_engine::Error::EmptyInput)));
        assert!(matches!(read_text(None, None), Err(empathy_engine::Error::EmptyInput)));
        assert_eq!("Hello there", read_text(Some("Hello there".into()), None).unwrap());
    }

    #[test]
    fn test_blank_file_rejected() {
        let dir = scratch_dir("blank-file");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("input.txt");
        fs::write(&path, "   \n").unwrap();
        assert!(matches!(read_text(None, Some(&path)), Err(empathy_engine::Error::EmptyInput)));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_ssml_file_creates_parent_dirs() {
        let dir = scratch_dir("ssml-file");
        let path = dir.join("nested").join("reply.ssml");
        write_ssml(&path, "<speak>hi</speak>").unwrap();
        assert_eq!("<speak>hi</speak>", fs::read_to_string(&path).unwrap());
        fs::remove_dir_all(&dir).unwrap();
    }
}
