//! Settings shared by the command line and desktop front-ends.

use crate::convert::{discover_models, find_model, ConversionParams, F0Method, RvcConverter};
use crate::error::{Error, Result};
use crate::pipeline::{GenerationJob, GenerationPipeline};
use crate::synth::{CommandSynthesizer, TtsEngine};
use crate::NarrationPipeline;
use crate::voices::DEFAULT_VOICE;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "audiobook_narrator.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub enabled: bool,
    /// Model name as listed by model discovery.
    pub model: Option<String>,
    pub pitch_shift: i32,
    pub method: F0Method,
    pub index_rate: f32,
    /// Inference device passed to the converter, e.g. `cpu` or `cuda:0`.
    pub device: String,
    /// Program and leading arguments used to invoke the converter.
    pub command: Vec<String>,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: None,
            pitch_shift: 0,
            method: F0Method::Harvest,
            index_rate: 0.5,
            device: "cpu".to_string(),
            command: vec!["python".into(), "-m".into(), "rvc_python".into(), "cli".into()],
        }
    }
}

impl ConversionSettings {
    pub fn params(&self, model_path: impl Into<PathBuf>) -> ConversionParams {
        ConversionParams {
            model: model_path.into(),
            pitch_shift: self.pitch_shift,
            method: self.method,
            index_rate: self.index_rate.clamp(0.0, 1.0),
        }
    }

    pub fn converter(&self) -> RvcConverter {
        match self.command.split_first() {
            Some((program, args)) => RvcConverter::new(program.as_str(), args.to_vec(), self.device.as_str()),
            None => RvcConverter::new("python", vec!["-m".into(), "rvc_python".into(), "cli".into()], self.device.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output_root: PathBuf,
    pub models_dir: PathBuf,
    pub voice: String,
    pub speed: f32,
    /// Forces a TTS engine instead of detecting one.
    pub engine: Option<TtsEngine>,
    pub conversion: ConversionSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("audiobooks"),
            models_dir: PathBuf::from("rvc_models"),
            voice: DEFAULT_VOICE.to_string(),
            speed: 1.0,
            engine: None,
            conversion: ConversionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn pipeline(&self) -> NarrationPipeline {
        GenerationPipeline::new(CommandSynthesizer::new(self.engine), self.conversion.converter())
    }

    /// Builds a job for `sections` with the configured voice, speed and, when
    /// enabled, the conversion model found under `models_dir`.
    pub fn job(&self, sections: Vec<usize>) -> Result<GenerationJob> {
        let job = GenerationJob::new(sections, &self.voice, self.speed)?;
        if !self.conversion.enabled {
            return Ok(job);
        }

        let name = self
            .conversion
            .model
            .clone()
            .ok_or_else(|| Error::UnknownModel("<none>".to_string()))?;
        let models = discover_models(&self.models_dir);
        let model = find_model(&models, &name).ok_or(Error::UnknownModel(name))?;
        Ok(job.with_conversion(self.conversion.params(&model.path)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}
