//! Speech synthesis through locally installed command line engines.

use crate::voices::{self, Gender, Voice};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command as ProcessCommand, Output, Stdio};

/// Words per minute at speed 1.0.
const BASE_RATE_WPM: f32 = 175.0;

/// Produces one audio file for one piece of text.
///
/// Implementations return `false` instead of failing loudly, and must tolerate
/// being called again for the same output path.
pub trait SpeechSynthesizer {
    fn generate(&mut self, text: &str, output: &Path, voice: &str, speed: f32) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TtsEngine {
    EspeakNg,
    Espeak,
    Festival,
}

impl TtsEngine {
    const SEARCH_ORDER: [TtsEngine; 3] = [TtsEngine::EspeakNg, TtsEngine::Espeak, TtsEngine::Festival];

    pub fn program(&self) -> &'static str {
        match self {
            TtsEngine::EspeakNg => "espeak-ng",
            TtsEngine::Espeak => "espeak",
            TtsEngine::Festival => "text2wave",
        }
    }

    /// First engine found on `PATH`.
    pub fn detect() -> Option<TtsEngine> {
        Self::SEARCH_ORDER.into_iter().find(|engine| is_installed(engine.program()))
    }
}

pub fn is_installed(program: &str) -> bool {
    ProcessCommand::new("which")
        .arg(program)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Engine voice name for a registry voice, e.g. `en-us+f3`.
pub fn espeak_voice(voice: &Voice) -> String {
    let variant = match voice.gender {
        Gender::Female => "f3",
        Gender::Male => "m3",
    };
    format!("{}+{}", voice.language_tag().to_ascii_lowercase(), variant)
}

pub fn words_per_minute(speed: f32) -> u32 {
    (BASE_RATE_WPM * speed.clamp(0.25, 4.0)) as u32
}

#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    engine: Option<TtsEngine>,
}

impl CommandSynthesizer {
    /// Uses `engine` if given, otherwise the first installed one.
    pub fn new(engine: Option<TtsEngine>) -> Self {
        let engine = engine.or_else(TtsEngine::detect);
        if engine.is_none() {
            warn!("No TTS engine found. Please install espeak-ng, espeak, or festival");
        }
        Self { engine }
    }

    pub fn engine(&self) -> Option<TtsEngine> {
        self.engine
    }

    fn run_espeak(&self, program: &str, text: &str, output: &Path, voice: &Voice, speed: f32) -> std::io::Result<Output> {
        let mut cmd = ProcessCommand::new(program);
        cmd.arg("-v")
            .arg(espeak_voice(voice))
            .arg("-s")
            .arg(words_per_minute(speed).to_string())
            .arg("-a")
            .arg("100")
            .arg("-w")
            .arg(output)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!("Running {:?}", cmd);
        cmd.output()
    }

    fn run_festival(&self, text: &str, output: &Path, speed: f32) -> std::io::Result<Output> {
        let stretch = 1.0 / speed.clamp(0.25, 4.0);
        let mut cmd = ProcessCommand::new("text2wave");
        cmd.arg("-o")
            .arg(output)
            .arg("-eval")
            .arg(format!("(Parameter.set 'Duration_Stretch {:.3})", stretch))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        debug!("Running {:?}", cmd);

        let mut child = cmd.spawn()?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin.write_all(text.as_bytes())?;
        }
        child.wait_with_output()
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn generate(&mut self, text: &str, output: &Path, voice: &str, speed: f32) -> bool {
        let Some(engine) = self.engine else {
            error!("Failed to initialize TTS engine");
            return false;
        };
        let Some(voice) = voices::lookup(voice) else {
            error!("Unknown speaker: {}", voice);
            return false;
        };

        if let Some(parent) = output.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                error!("Cannot create {}: {}", parent.display(), e);
                return false;
            }
        }

        let result = match engine {
            TtsEngine::EspeakNg | TtsEngine::Espeak => self.run_espeak(engine.program(), text, output, voice, speed),
            TtsEngine::Festival => self.run_festival(text, output, speed),
        };

        match result {
            Ok(out) if out.status.success() => output.exists(),
            Ok(out) => {
                error!(
                    "TTS generation failed with {}: {}",
                    engine.program(),
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                false
            }
            Err(e) => {
                error!("Error generating speech: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_espeak_voice_mapping() {
        assert_eq!(espeak_voice(voices::lookup("af_heart").unwrap()), "en-us+f3");
        assert_eq!(espeak_voice(voices::lookup("bm_lewis").unwrap()), "en-gb+m3");
    }

    #[test]
    fn test_words_per_minute_scales_and_clamps() {
        assert_eq!(words_per_minute(1.0), 175);
        assert_eq!(words_per_minute(2.0), 350);
        assert_eq!(words_per_minute(100.0), 700);
    }

    #[test]
    fn test_unknown_voice_fails_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("temp_section_1.wav");
        let mut synth = CommandSynthesizer {
            engine: Some(TtsEngine::EspeakNg),
        };

        assert!(!synth.generate("Hello", &output, "zz_nobody", 1.0));
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_engine_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut synth = CommandSynthesizer { engine: None };
        assert!(!synth.generate("Hello", &dir.path().join("a.wav"), "af_heart", 1.0));
    }
}
