//! Voice conversion: re-voicing synthesized speech with an RVC model.

use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};
use std::str::FromStr;

/// Pitch (f0) extraction algorithm used by the conversion model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum F0Method {
    #[default]
    Harvest,
    Pm,
    Crepe,
    Rmvpe,
}

impl F0Method {
    pub const ALL: [F0Method; 4] = [F0Method::Harvest, F0Method::Pm, F0Method::Crepe, F0Method::Rmvpe];

    pub fn as_str(&self) -> &'static str {
        match self {
            F0Method::Harvest => "harvest",
            F0Method::Pm => "pm",
            F0Method::Crepe => "crepe",
            F0Method::Rmvpe => "rmvpe",
        }
    }
}

impl fmt::Display for F0Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for F0Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        F0Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown f0 method '{}'", s))
    }
}

/// Everything needed to re-voice one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionParams {
    /// Path of the `.pth` model file.
    pub model: PathBuf,
    /// Pitch shift in semitones.
    pub pitch_shift: i32,
    pub method: F0Method,
    /// Influence of the feature index, 0.0 to 1.0.
    pub index_rate: f32,
}

impl ConversionParams {
    pub fn new(model: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            pitch_shift: 0,
            method: F0Method::default(),
            index_rate: 0.5,
        }
    }
}

/// Converts one audio file into another voice.
///
/// Both operations report failure by returning `false`; the caller decides
/// how to degrade.
pub trait VoiceConverter {
    fn load(&mut self, model: &Path) -> bool;

    fn convert(&mut self, input: &Path, output: &Path, params: &ConversionParams) -> bool;
}

/// A conversion model discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionModel {
    /// Folder name, with `" (No Index)"` appended when the folder has no index file.
    pub name: String,
    pub path: PathBuf,
}

/// Lists the models under `models_dir`: one per subfolder holding a `.pth` file.
pub fn discover_models(models_dir: &Path) -> Vec<ConversionModel> {
    let entries = match fs::read_dir(models_dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut models = Vec::new();
    for entry in entries.flatten() {
        let dir = entry.path();
        if !dir.is_dir() {
            continue;
        }

        let Some(pth) = first_with_extension(&dir, "pth") else {
            continue;
        };

        let mut name = entry.file_name().to_string_lossy().to_string();
        if first_with_extension(&dir, "index").is_none() {
            name.push_str(" (No Index)");
        }
        models.push(ConversionModel { name, path: pth });
    }

    models.sort_by(|a, b| a.name.cmp(&b.name));
    models
}

pub fn find_model<'a>(models: &'a [ConversionModel], name: &str) -> Option<&'a ConversionModel> {
    models
        .iter()
        .find(|m| m.name == name || m.name.trim_end_matches(" (No Index)") == name)
}

fn first_with_extension(dir: &Path, extension: &str) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map_or(false, |e| e == extension))
        .collect();
    matches.sort();
    matches.into_iter().next()
}

/// Drives the rvc-python command line interface.
#[derive(Debug, Clone)]
pub struct RvcConverter {
    program: String,
    base_args: Vec<String>,
    device: String,
    model: Option<PathBuf>,
}

impl Default for RvcConverter {
    fn default() -> Self {
        Self::new("python", vec!["-m".into(), "rvc_python".into(), "cli".into()], "cpu")
    }
}

impl RvcConverter {
    pub fn new(program: impl Into<String>, base_args: Vec<String>, device: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args,
            device: device.into(),
            model: None,
        }
    }

    pub fn loaded_model(&self) -> Option<&Path> {
        self.model.as_deref()
    }

    fn build_command(&self, model: &Path, input: &Path, output: &Path, params: &ConversionParams) -> ProcessCommand {
        let mut cmd = ProcessCommand::new(&self.program);
        cmd.args(&self.base_args)
            .arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-mp")
            .arg(model)
            .arg("-pi")
            .arg(params.pitch_shift.to_string())
            .arg("-me")
            .arg(params.method.as_str())
            .arg("-ir")
            .arg(format!("{:.2}", params.index_rate))
            .arg("-fr")
            .arg("3")
            .arg("-rsr")
            .arg("0")
            .arg("-rmr")
            .arg("0.25")
            .arg("-pr")
            .arg("0.33")
            .arg("-de")
            .arg(&self.device)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        if let Some(index) = model.parent().and_then(|dir| first_with_extension(dir, "index")) {
            cmd.arg("-ip").arg(index);
        }

        cmd
    }
}

impl VoiceConverter for RvcConverter {
    fn load(&mut self, model: &Path) -> bool {
        if !model.is_file() {
            error!("Error loading RVC model: {} not found", model.display());
            return false;
        }
        self.model = Some(model.to_path_buf());
        true
    }

    fn convert(&mut self, input: &Path, output: &Path, params: &ConversionParams) -> bool {
        let Some(model) = self.model.clone() else {
            error!("No RVC model loaded");
            return false;
        };

        let mut cmd = self.build_command(&model, input, output, params);
        debug!("Running {:?}", cmd);

        match cmd.output() {
            Ok(out) if out.status.success() => output.exists(),
            Ok(out) => {
                warn!(
                    "RVC conversion failed for {}: {}",
                    input.display(),
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                false
            }
            Err(e) => {
                warn!("Could not start {}: {}", self.program, e);
                false
            }
        }
    }
}
