//! Section generation pipeline.
//!
//! Turns selected sections into `section_<n>.wav` files in the active output
//! directory. Every section goes through the same step: synthesize into
//! `temp_section_<n>.wav`, optionally convert it into the final file, and
//! otherwise promote the temp file by renaming it. Jobs run strictly in
//! ascending section order and can be stopped between sections, continued
//! from the last committed section, or partially regenerated.

use crate::convert::{ConversionParams, VoiceConverter};
use crate::error::{Error, Result};
use crate::library::{existing_audio_files, remove_busy_file, section_file_name, temp_section_file_name};
use crate::sections::SectionStore;
use crate::synth::SpeechSynthesizer;
use crate::voices;
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One invocation of the pipeline over a set of sections.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    sections: Vec<usize>,
    pub voice: String,
    pub speed: f32,
    /// Present when voice conversion is enabled.
    pub conversion: Option<ConversionParams>,
}

impl GenerationJob {
    /// Builds a job; `voice` may be a voice id or its display name.
    /// Section indices are sorted and de-duplicated.
    pub fn new(sections: impl IntoIterator<Item = usize>, voice: &str, speed: f32) -> Result<Self> {
        let voice = voices::from_display_name(voice).ok_or_else(|| Error::UnknownVoice(voice.to_string()))?;

        let mut sections: Vec<usize> = sections.into_iter().collect();
        sections.sort_unstable();
        sections.dedup();

        Ok(Self {
            sections,
            voice: voice.id.to_string(),
            speed,
            conversion: None,
        })
    }

    pub fn with_conversion(mut self, params: ConversionParams) -> Self {
        self.conversion = Some(params);
        self
    }

    pub fn sections(&self) -> &[usize] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// The committed audio file of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub section_index: usize,
    pub path: PathBuf,
    pub temp_path: PathBuf,
    /// Set when conversion failed and the unconverted audio was kept instead.
    pub used_fallback: bool,
}

impl Artifact {
    fn in_dir(dir: &Path, section_index: usize) -> Self {
        Self {
            section_index,
            path: dir.join(section_file_name(section_index)),
            temp_path: dir.join(temp_section_file_name(section_index)),
            used_fallback: false,
        }
    }
}

/// Combines two artifact lists by section index; entries from `fresh` win.
pub fn merge_artifacts(existing: &[Artifact], fresh: &[Artifact]) -> Vec<Artifact> {
    let mut by_index: BTreeMap<usize, Artifact> = BTreeMap::new();
    for artifact in existing.iter().chain(fresh) {
        by_index.insert(artifact.section_index, artifact.clone());
    }
    by_index.into_values().collect()
}

pub fn artifact_paths(artifacts: &[Artifact]) -> Vec<PathBuf> {
    artifacts.iter().map(|a| a.path.clone()).collect()
}

/// Reported after each committed section.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub section_index: usize,
    pub processed: usize,
    pub total: usize,
    pub label: String,
}

impl Progress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.processed as f32 / self.total as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Cooperative stop signal, checked before each section.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineState {
    pub status: PipelineStatus,
    /// Highest section index committed by the current job.
    pub last_completed: usize,
    pub total_in_job: usize,
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug)]
pub enum JobOutcome {
    Completed { processed: usize },
    Stopped { processed: usize, last_completed: usize },
    /// A continue request found no sections after the last committed one.
    NothingToDo,
    NothingSelected,
    AllFailed,
    /// The job never started.
    Rejected(Error),
    /// The job hit an unexpected error part way through.
    Aborted { processed: usize, error: Error },
}

/// Result of a job: the outcome plus the artifacts available afterwards.
#[derive(Debug)]
pub struct JobReport {
    pub outcome: JobOutcome,
    pub artifacts: Vec<Artifact>,
}

impl JobReport {
    fn new(outcome: JobOutcome, artifacts: Vec<Artifact>) -> Self {
        Self { outcome, artifacts }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, JobOutcome::Completed { .. })
    }

    pub fn processed(&self) -> usize {
        match self.outcome {
            JobOutcome::Completed { processed }
            | JobOutcome::Stopped { processed, .. }
            | JobOutcome::Aborted { processed, .. } => processed,
            _ => 0,
        }
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        artifact_paths(&self.artifacts)
    }

    pub fn message(&self) -> String {
        match &self.outcome {
            JobOutcome::Completed { processed } => {
                format!("Audio generation completed successfully! Generated {} sections.", processed)
            }
            JobOutcome::Stopped { last_completed, .. } => {
                format!("Generation stopped. Last processed: Section {}", last_completed)
            }
            JobOutcome::NothingToDo => "No remaining sections to process.".to_string(),
            JobOutcome::NothingSelected => "No sections selected.".to_string(),
            JobOutcome::AllFailed => "Failed to generate any audio sections.".to_string(),
            JobOutcome::Rejected(e) => e.to_string(),
            JobOutcome::Aborted { processed, error } => {
                format!("Error during audio generation: {} ({} sections kept)", error, processed)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    /// Commits into the pipeline state.
    Job,
    /// Only reports what it produced.
    Regenerate,
}

pub struct GenerationPipeline<S, C> {
    synthesizer: S,
    converter: C,
    output_dir: Option<PathBuf>,
    state: PipelineState,
    running: StopHandle,
    /// Set by [`GenerationPipeline::arm`]; the next job keeps the flag as armed.
    armed: bool,
}

impl<S: SpeechSynthesizer, C: VoiceConverter> GenerationPipeline<S, C> {
    pub fn new(synthesizer: S, converter: C) -> Self {
        Self {
            synthesizer,
            converter,
            output_dir: None,
            state: PipelineState::default(),
            running: StopHandle::default(),
            armed: false,
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.set_output_dir(Some(dir.into()));
        self
    }

    /// Points the pipeline at another book folder, forgetting the previous state.
    pub fn set_output_dir(&mut self, dir: Option<PathBuf>) {
        if self.output_dir != dir {
            self.state = PipelineState::default();
        }
        self.output_dir = dir;
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn status(&self) -> PipelineStatus {
        self.state.status
    }

    /// Copy of the artifacts committed so far.
    pub fn artifacts(&self) -> Vec<Artifact> {
        self.state.artifacts.clone()
    }

    pub fn synthesizer_mut(&mut self) -> &mut S {
        &mut self.synthesizer
    }

    pub fn converter_mut(&mut self) -> &mut C {
        &mut self.converter
    }

    /// Handle that can stop a running job from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.running.clone()
    }

    /// Marks the next job as running now and returns its stop handle. A stop
    /// requested through the handle before that job starts is honoured.
    pub fn arm(&mut self) -> StopHandle {
        self.running.start();
        self.armed = true;
        self.running.clone()
    }

    pub fn stop(&self) -> String {
        self.running.stop();
        if self.state.last_completed > 0 {
            format!("Generation stopped at section {}", self.state.last_completed)
        } else {
            "Generation stopped".to_string()
        }
    }

    /// Rebuilds the artifact list from the `section_<n>.wav` files already in
    /// the output directory, so that a later `resume` skips them.
    pub fn restore_from_disk(&mut self) -> usize {
        let Some(dir) = self.output_dir.clone() else {
            return 0;
        };

        self.state.artifacts = existing_audio_files(&dir)
            .into_iter()
            .map(|(index, path)| Artifact {
                path,
                ..Artifact::in_dir(&dir, index)
            })
            .collect();
        self.state.last_completed = self.state.artifacts.last().map_or(0, |a| a.section_index);
        self.state.status = if self.state.artifacts.is_empty() {
            PipelineStatus::Idle
        } else {
            PipelineStatus::Stopped
        };

        info!(
            "Found {} existing sections in {}",
            self.state.artifacts.len(),
            dir.display()
        );
        self.state.artifacts.len()
    }

    /// Starts a fresh job over the job's sections.
    pub fn generate(&mut self, store: &SectionStore, job: &GenerationJob, mut progress: impl FnMut(&Progress)) -> JobReport {
        let armed = mem::take(&mut self.armed);
        if job.is_empty() {
            return self.not_started(JobOutcome::NothingSelected);
        }
        if let Err(e) = check_sections(store, job.sections()).and_then(|_| self.check_ready(job)) {
            return self.not_started(JobOutcome::Rejected(e));
        }

        self.state.artifacts.clear();
        self.state.last_completed = 0;
        self.state.total_in_job = job.sections().len();

        self.run(store, job.sections(), job, RunMode::Job, armed, &mut progress)
    }

    /// Continues after a stop: only sections above the last committed one are
    /// processed and their artifacts are appended to the existing list.
    pub fn resume(&mut self, store: &SectionStore, job: &GenerationJob, mut progress: impl FnMut(&Progress)) -> JobReport {
        let armed = mem::take(&mut self.armed);
        if job.is_empty() {
            return self.not_started(JobOutcome::NothingSelected);
        }
        if let Err(e) = check_sections(store, job.sections()) {
            return self.not_started(JobOutcome::Rejected(e));
        }

        let last = self.state.last_completed;
        let remaining: Vec<usize> = job.sections().iter().copied().filter(|&i| i > last).collect();
        if remaining.is_empty() {
            return self.not_started(JobOutcome::NothingToDo);
        }
        if let Err(e) = self.check_ready(job) {
            return self.not_started(JobOutcome::Rejected(e));
        }

        info!("Continuing after section {} with {} sections left", last, remaining.len());
        self.state.total_in_job = remaining.len();
        self.run(store, &remaining, job, RunMode::Job, armed, &mut progress)
    }

    /// Regenerates a single section outside of any job. The artifact entry for
    /// the section is replaced, or appended if it was not there yet.
    pub fn regenerate_section(&mut self, store: &SectionStore, index: usize, job: &GenerationJob) -> Result<Artifact> {
        if mem::take(&mut self.armed) {
            self.running.stop();
        }
        let text = store.get(index).ok_or(Error::SectionOutOfRange {
            index,
            count: store.len(),
        })?;
        self.check_ready(job)?;

        let artifact = self
            .process_section(index, text, job)?
            .ok_or(Error::SectionFailed(index))?;

        match self.state.artifacts.iter_mut().find(|a| a.section_index == index) {
            Some(existing) => *existing = artifact.clone(),
            None => self.state.artifacts.push(artifact.clone()),
        }
        info!("Regenerated section {}", index);
        Ok(artifact)
    }

    /// Regenerates every section from `start` to the end of the book. The report
    /// only holds the artifacts produced by this call; see [`merge_artifacts`].
    pub fn regenerate_from(
        &mut self,
        store: &SectionStore,
        start: usize,
        job: &GenerationJob,
        mut progress: impl FnMut(&Progress),
    ) -> JobReport {
        let armed = mem::take(&mut self.armed);
        if start == 0 || start > store.len() {
            let error = Error::SectionOutOfRange {
                index: start,
                count: store.len(),
            };
            self.running.stop();
            return JobReport::new(JobOutcome::Rejected(error), Vec::new());
        }
        if let Err(e) = self.check_ready(job) {
            self.running.stop();
            return JobReport::new(JobOutcome::Rejected(e), Vec::new());
        }

        let indices: Vec<usize> = (start..=store.len()).collect();
        self.run(store, &indices, job, RunMode::Regenerate, armed, &mut progress)
    }

    /// Report for a job that never reached its first section. An armed stop
    /// flag is released so the handle reads as idle.
    fn not_started(&self, outcome: JobOutcome) -> JobReport {
        self.running.stop();
        JobReport::new(outcome, self.artifacts())
    }

    fn check_ready(&mut self, job: &GenerationJob) -> Result<()> {
        if self.output_dir.is_none() {
            return Err(Error::NoOutputDir);
        }
        if let Some(params) = &job.conversion {
            if !self.converter.load(&params.model) {
                return Err(Error::ModelLoad(params.model.clone()));
            }
        }
        Ok(())
    }

    fn run(
        &mut self,
        store: &SectionStore,
        indices: &[usize],
        job: &GenerationJob,
        mode: RunMode,
        armed: bool,
        progress: &mut dyn FnMut(&Progress),
    ) -> JobReport {
        if !armed {
            self.running.start();
        }
        self.set_status(mode, PipelineStatus::Running);

        let total = indices.len();
        let mut produced: Vec<Artifact> = Vec::new();
        let mut processed = 0;

        for &index in indices {
            if !self.running.is_running() {
                self.set_status(mode, PipelineStatus::Stopped);
                info!("Generation stopped before section {}", index);
                let last_completed = match mode {
                    RunMode::Job => self.state.last_completed,
                    RunMode::Regenerate => produced.last().map_or(0, |a| a.section_index),
                };
                let outcome = JobOutcome::Stopped {
                    processed,
                    last_completed,
                };
                return self.report(outcome, mode, produced);
            }

            let Some(text) = store.get(index) else {
                warn!("Section {} does not exist, skipping", index);
                continue;
            };

            match self.process_section(index, text, job) {
                Ok(Some(artifact)) => {
                    processed += 1;
                    if mode == RunMode::Job {
                        self.state.last_completed = index;
                        self.state.artifacts.push(artifact.clone());
                    }
                    produced.push(artifact);

                    info!("Committed section {} ({}/{})", index, processed, total);
                    progress(&Progress {
                        section_index: index,
                        processed,
                        total,
                        label: format!("Processing section {}", index),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Job aborted at section {}: {}", index, e);
                    self.running.stop();
                    self.set_status(mode, PipelineStatus::Idle);
                    return self.report(JobOutcome::Aborted { processed, error: e }, mode, produced);
                }
            }
        }

        self.running.stop();
        self.set_status(mode, PipelineStatus::Idle);

        let outcome = if processed > 0 {
            JobOutcome::Completed { processed }
        } else {
            JobOutcome::AllFailed
        };
        self.report(outcome, mode, produced)
    }

    /// Regeneration runs outside the job and leave its status alone.
    fn set_status(&mut self, mode: RunMode, status: PipelineStatus) {
        if mode == RunMode::Job {
            self.state.status = status;
        }
    }

    fn report(&self, outcome: JobOutcome, mode: RunMode, produced: Vec<Artifact>) -> JobReport {
        let artifacts = match mode {
            RunMode::Job => self.artifacts(),
            RunMode::Regenerate => produced,
        };
        JobReport::new(outcome, artifacts)
    }

    /// The per-section step. `Ok(None)` means the section was skipped; errors
    /// are reserved for problems that should end the whole job.
    fn process_section(&mut self, index: usize, text: &str, job: &GenerationJob) -> Result<Option<Artifact>> {
        let dir = self.output_dir.clone().ok_or(Error::NoOutputDir)?;
        fs::create_dir_all(&dir)?;

        let mut artifact = Artifact::in_dir(&dir, index);
        let temp = artifact.temp_path.clone();
        let target = artifact.path.clone();

        // Leftovers of an interrupted attempt.
        if let Err(e) = remove_busy_file(&temp).and_then(|_| remove_busy_file(&target)) {
            warn!("Cannot clear previous files of section {}: {}", index, e);
            return Ok(None);
        }

        if !self.synthesizer.generate(text, &temp, &job.voice, job.speed) || !temp.exists() {
            warn!("Failed to generate speech for section {}", index);
            let _ = remove_busy_file(&temp);
            return Ok(None);
        }

        match &job.conversion {
            Some(params) if self.converter.convert(&temp, &target, params) && target.exists() => {
                if let Err(e) = fs::remove_file(&temp) {
                    warn!("Could not remove {}: {}", temp.display(), e);
                }
            }
            Some(_) => {
                warn!("Voice conversion failed for section {}, keeping unconverted audio", index);
                artifact.used_fallback = true;
                if let Err(e) = promote(&temp, &target) {
                    warn!("Could not move audio into place for section {}: {}", index, e);
                    return Ok(None);
                }
            }
            None => {
                if let Err(e) = promote(&temp, &target) {
                    warn!("Could not move audio into place for section {}: {}", index, e);
                    return Ok(None);
                }
            }
        }

        if target.exists() {
            Ok(Some(artifact))
        } else {
            Ok(None)
        }
    }
}

/// Every index must name a section of `store`.
fn check_sections(store: &SectionStore, indices: &[usize]) -> Result<()> {
    match indices.iter().find(|&&i| store.get(i).is_none()) {
        Some(&index) => Err(Error::SectionOutOfRange {
            index,
            count: store.len(),
        }),
        None => Ok(()),
    }
}

/// Replaces `target` with `temp`; a busy `target` gets one retry.
fn promote(temp: &Path, target: &Path) -> io::Result<()> {
    remove_busy_file(target)?;
    fs::rename(temp, target)
}
