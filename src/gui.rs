use audiobook_narrator::concat::concatenate;
use audiobook_narrator::config::AppConfig;
use audiobook_narrator::convert::{discover_models, ConversionModel, F0Method};
use audiobook_narrator::extract::{extract_epub_images, extract_text};
use audiobook_narrator::library::Library;
use audiobook_narrator::pipeline::{
    artifact_paths, merge_artifacts, Artifact, GenerationJob, JobOutcome, JobReport, Progress, StopHandle,
};
use audiobook_narrator::sections::SectionStore;
use audiobook_narrator::voices;
use audiobook_narrator::{CommandSynthesizer, NarrationPipeline, PlaybackIndex};
use eframe::egui;
use egui::{CentralPanel, Grid, RichText, Slider, TopBottomPanel};
use egui_extras::{Column, TableBuilder};
use log::{error, info};
use rfd::FileDialog;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
enum NarrationStatus {
    Idle,
    Running(String),
    Completed(String),
    /// Halted on request; Continue picks up from here.
    Stopped(String),
    Error(String),
}

impl NarrationStatus {
    fn from_report(report: &JobReport) -> Self {
        match report.outcome {
            JobOutcome::Completed { .. } => NarrationStatus::Completed(report.message()),
            JobOutcome::Stopped { .. } => NarrationStatus::Stopped(report.message()),
            _ => NarrationStatus::Error(report.message()),
        }
    }
}

enum Task {
    Generate(GenerationJob),
    Resume(GenerationJob),
    Section(usize, GenerationJob),
    From(usize, GenerationJob),
    Concatenate(Vec<PathBuf>),
}

enum WorkerEvent {
    Progress(Progress),
    Finished(JobReport),
    /// Artifacts of `regenerate_from` merged with the pipeline's own list.
    FinishedFrom(JobReport, Vec<Artifact>),
    Regenerated(Artifact),
    Concatenated(PathBuf),
    Failed(String),
}

#[derive(serde::Deserialize, serde::Serialize)]
#[serde(default)]
struct NarratorApp {
    input_file: Option<PathBuf>,
    settings: AppConfig,

    #[serde(skip)]
    store: SectionStore,
    #[serde(skip)]
    raw_text: String,
    #[serde(skip)]
    selected: Vec<bool>,
    #[serde(skip)]
    book_name: String,
    #[serde(skip)]
    rename_to: String,
    #[serde(skip)]
    regenerate_index: usize,
    #[serde(skip)]
    models: Vec<ConversionModel>,

    #[serde(skip)]
    pipeline: Arc<Mutex<NarrationPipeline>>,
    #[serde(skip)]
    stop_handle: Option<StopHandle>,
    #[serde(skip)]
    event_receiver: Option<mpsc::Receiver<WorkerEvent>>,
    #[serde(skip)]
    status: NarrationStatus,
    #[serde(skip)]
    current_progress: Option<Progress>,
    #[serde(skip)]
    playback: PlaybackIndex,
}

impl Default for NarratorApp {
    fn default() -> Self {
        let settings = AppConfig::default();
        let pipeline = settings.pipeline();
        Self {
            input_file: None,
            settings,
            store: SectionStore::new(),
            raw_text: String::new(),
            selected: Vec::new(),
            book_name: String::new(),
            rename_to: String::new(),
            regenerate_index: 1,
            models: Vec::new(),
            pipeline: Arc::new(Mutex::new(pipeline)),
            stop_handle: None,
            event_receiver: None,
            status: NarrationStatus::Idle,
            current_progress: None,
            playback: PlaybackIndex::new(),
        }
    }
}

impl eframe::App for NarratorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_worker();

        TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("🎧 Audiobook Narrator");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button("💾 Save Settings").clicked() {
                        self.save_settings();
                    }
                    if ui.button("📁 Load Settings").clicked() {
                        self.load_settings();
                    }
                });
            });
            ui.separator();
        });

        CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.draw_document(ui);
                ui.separator();
                self.draw_sections(ui);
                ui.separator();
                self.draw_voice_settings(ui);
                ui.separator();
                self.draw_generation_controls(ui, ctx);
                ui.separator();
                self.draw_progress(ui);
                ui.separator();
                self.draw_tracks(ui, ctx);
            });
        });
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }
}

impl NarratorApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let mut app: Self = match cc.storage {
            Some(storage) => eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default(),
            None => Self::default(),
        };
        app.pipeline = Arc::new(Mutex::new(app.settings.pipeline()));
        app.refresh_models();
        if let Some(path) = app.input_file.clone().filter(|p| p.is_file()) {
            app.open_document(&path);
        }
        app
    }

    fn is_running(&self) -> bool {
        matches!(self.status, NarrationStatus::Running(_))
    }

    fn refresh_models(&mut self) {
        self.models = discover_models(&self.settings.models_dir);
    }

    fn draw_document(&mut self, ui: &mut egui::Ui) {
        ui.heading("📂 Document");

        Grid::new("document_grid").num_columns(3).show(ui, |ui| {
            ui.label("Input file:");
            if ui.add_enabled(!self.is_running(), egui::Button::new("📖 Open Document")).clicked() {
                if let Some(path) = FileDialog::new()
                    .add_filter("Documents", &["txt", "epub", "pdf"])
                    .pick_file()
                {
                    self.open_document(&path);
                }
            }
            ui.label(
                self.input_file
                    .as_ref()
                    .and_then(|p| p.file_name())
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "No file selected".to_string()),
            );
            ui.end_row();

            ui.label("Library:");
            if ui.button("📁 Select Library Folder").clicked() {
                if let Some(path) = FileDialog::new().pick_folder() {
                    self.settings.output_root = path;
                }
            }
            ui.label(self.settings.output_root.display().to_string());
            ui.end_row();

            ui.label("Book folder:");
            ui.text_edit_singleline(&mut self.rename_to);
            if ui
                .add_enabled(!self.is_running() && !self.rename_to.trim().is_empty(), egui::Button::new("✏️ Rename"))
                .clicked()
            {
                self.rename_book();
            }
            ui.end_row();
        });
    }

    fn draw_sections(&mut self, ui: &mut egui::Ui) {
        ui.heading(format!("📑 Sections ({})", self.store.len()));

        ui.collapsing("Raw text", |ui| {
            ui.add(
                egui::TextEdit::multiline(&mut self.raw_text)
                    .desired_rows(8)
                    .desired_width(f32::INFINITY),
            );
            if ui.add_enabled(!self.is_running(), egui::Button::new("🔄 Update Sections")).clicked() {
                self.update_sections();
            }
        });

        ui.horizontal(|ui| {
            if ui.button("Select all").clicked() {
                self.selected.iter_mut().for_each(|s| *s = true);
            }
            if ui.button("Select none").clicked() {
                self.selected.iter_mut().for_each(|s| *s = false);
            }
        });

        let labels = self.store.labels();
        let selected = &mut self.selected;
        TableBuilder::new(ui)
            .striped(true)
            .max_scroll_height(240.0)
            .column(Column::auto())
            .column(Column::remainder())
            .header(20.0, |mut header| {
                header.col(|ui| {
                    ui.strong("Use");
                });
                header.col(|ui| {
                    ui.strong("Section");
                });
            })
            .body(|body| {
                body.rows(20.0, labels.len(), |row_index, mut row| {
                    row.col(|ui| {
                        if let Some(flag) = selected.get_mut(row_index) {
                            ui.checkbox(flag, "");
                        }
                    });
                    row.col(|ui| {
                        ui.label(labels[row_index].as_str());
                    });
                });
            });
    }

    fn draw_voice_settings(&mut self, ui: &mut egui::Ui) {
        ui.heading("🎤 Voice");

        Grid::new("voice_grid").num_columns(2).show(ui, |ui| {
            ui.label("Voice:");
            let current = voices::from_display_name(&self.settings.voice)
                .map(|v| v.display_name())
                .unwrap_or_else(|| self.settings.voice.clone());
            egui::ComboBox::from_id_source("voice")
                .selected_text(current)
                .show_ui(ui, |ui| {
                    for voice in voices::all() {
                        ui.selectable_value(&mut self.settings.voice, voice.id.to_string(), voice.display_name());
                    }
                });
            ui.end_row();

            ui.label("Voice Speed:");
            ui.add(Slider::new(&mut self.settings.speed, 0.5..=2.0).text("Speed"));
            ui.end_row();

            ui.label("Voice Conversion:");
            ui.checkbox(&mut self.settings.conversion.enabled, "Re-voice with an RVC model");
            ui.end_row();
        });

        if !self.settings.conversion.enabled {
            return;
        }

        Grid::new("conversion_grid").num_columns(2).show(ui, |ui| {
            ui.label("Model:");
            ui.horizontal(|ui| {
                let conversion = &mut self.settings.conversion;
                egui::ComboBox::from_id_source("rvc_model")
                    .selected_text(conversion.model.clone().unwrap_or_else(|| "Select a model".to_string()))
                    .show_ui(ui, |ui| {
                        for model in &self.models {
                            ui.selectable_value(&mut conversion.model, Some(model.name.clone()), model.name.as_str());
                        }
                    });
                if ui.button("🔄").on_hover_text("Rescan models").clicked() {
                    self.refresh_models();
                }
            });
            ui.end_row();

            ui.label("Pitch Shift:");
            ui.add(Slider::new(&mut self.settings.conversion.pitch_shift, -12..=12).text("Semitones"));
            ui.end_row();

            ui.label("F0 Method:");
            egui::ComboBox::from_id_source("f0_method")
                .selected_text(self.settings.conversion.method.as_str())
                .show_ui(ui, |ui| {
                    for method in F0Method::ALL {
                        ui.selectable_value(&mut self.settings.conversion.method, method, method.as_str());
                    }
                });
            ui.end_row();

            ui.label("Index Rate:");
            ui.add(Slider::new(&mut self.settings.conversion.index_rate, 0.0..=1.0).text("Rate"));
            ui.end_row();
        });
    }

    fn draw_generation_controls(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("🚀 Generation");

        let idle = !self.is_running();
        let has_sections = !self.store.is_empty();
        let can_stop = !idle && self.stop_handle.is_some();
        ui.horizontal(|ui| {
            if ui.add_enabled(idle && has_sections, egui::Button::new("▶️ Generate")).clicked() {
                self.start_generation(ctx, false);
            }
            if ui.add_enabled(idle && has_sections, egui::Button::new("⏩ Continue")).clicked() {
                self.start_generation(ctx, true);
            }
            if ui.add_enabled(can_stop, egui::Button::new("⏹️ Stop")).clicked() {
                self.stop_generation();
            }
        });

        ui.horizontal(|ui| {
            ui.label("Section:");
            ui.add(egui::DragValue::new(&mut self.regenerate_index).clamp_range(1..=self.store.len().max(1)));
            if ui.add_enabled(idle && has_sections, egui::Button::new("🔁 Regenerate Section")).clicked() {
                self.start_regeneration(ctx, false);
            }
            if ui.add_enabled(idle && has_sections, egui::Button::new("🔁 Regenerate From Section")).clicked() {
                self.start_regeneration(ctx, true);
            }
        });

        match &self.status {
            NarrationStatus::Idle => {
                ui.label(RichText::new("Ready").color(egui::Color32::GRAY));
            }
            NarrationStatus::Running(stage) => {
                ui.label(RichText::new(stage).color(egui::Color32::BLUE));
            }
            NarrationStatus::Completed(message) => {
                ui.label(RichText::new(format!("✅ {}", message)).color(egui::Color32::GREEN));
            }
            NarrationStatus::Stopped(message) => {
                ui.label(RichText::new(format!("⏸️ {}", message)).color(egui::Color32::YELLOW));
            }
            NarrationStatus::Error(message) => {
                ui.label(RichText::new(format!("❌ {}", message)).color(egui::Color32::RED));
            }
        }
    }

    fn draw_progress(&mut self, ui: &mut egui::Ui) {
        if !self.is_running() {
            return;
        }
        ui.heading("📊 Progress");

        match &self.current_progress {
            Some(progress) => {
                let bar = egui::ProgressBar::new(progress.fraction())
                    .text(format!("{}/{} sections", progress.processed, progress.total));
                ui.add(bar);
                ui.label(format!("Last finished: {}", progress.label));
            }
            None => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Starting...");
                });
            }
        }
    }

    fn draw_tracks(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        ui.heading("🔊 Audio Files");

        ui.horizontal(|ui| {
            if ui.button("⏮️ Previous").clicked() {
                self.playback.previous();
            }
            if ui.button("▶️ Play").clicked() {
                self.play_current();
            }
            if ui.button("⏭️ Next").clicked() {
                self.playback.next();
            }
            if ui
                .add_enabled(!self.is_running() && !self.playback.is_empty(), egui::Button::new("📼 Concatenate"))
                .clicked()
            {
                let tracks = self.playback.tracks().to_vec();
                self.spawn(ctx, Task::Concatenate(tracks), "Concatenating audio files...");
            }
        });
        ui.label(self.playback.describe_current());

        let position = self.playback.position();
        let mut clicked = None;
        for (i, label) in self.playback.track_labels().iter().enumerate() {
            if ui.selectable_label(i == position, label.as_str()).clicked() {
                clicked = Some(i);
            }
        }
        if let Some(i) = clicked {
            self.playback.select(i);
        }
    }

    fn open_document(&mut self, path: &Path) {
        let text = extract_text(path);
        if text.is_empty() {
            self.status = NarrationStatus::Error(format!("No text found in {}", path.display()));
            return;
        }
        self.input_file = Some(path.to_path_buf());
        self.raw_text = text;
        self.update_sections();

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "book".to_string());
        let book = match Library::new(&self.settings.output_root).and_then(|library| library.open_book(&name, false)) {
            Ok(book) => book,
            Err(e) => {
                self.status = NarrationStatus::Error(e.to_string());
                return;
            }
        };

        let is_epub = path.extension().map_or(false, |e| e.eq_ignore_ascii_case("epub"));
        if is_epub {
            if let Err(e) = extract_epub_images(path, &book.path) {
                error!("Could not extract images: {}", e);
            }
        }

        self.book_name = book.safe_name.clone();
        self.rename_to = book.safe_name.clone();
        self.set_book_dir(book.path);
        self.status = NarrationStatus::Idle;
        info!("Opened {} ({} sections)", path.display(), self.store.len());
    }

    fn set_book_dir(&mut self, dir: PathBuf) {
        let Ok(mut pipeline) = self.pipeline.try_lock() else {
            return;
        };
        pipeline.set_output_dir(Some(dir));
        let restored = pipeline.restore_from_disk();
        let tracks = artifact_paths(pipeline.state().artifacts.as_slice());
        drop(pipeline);

        if restored > 0 {
            info!("Found {} generated sections", restored);
        }
        self.playback.set_artifacts(tracks);
    }

    fn update_sections(&mut self) {
        let count = self.store.load(&self.raw_text);
        self.selected = vec![true; count];
        self.regenerate_index = self.regenerate_index.clamp(1, count.max(1));
    }

    fn rename_book(&mut self) {
        let current = self.pipeline.try_lock().ok().and_then(|p| p.output_dir().map(Path::to_path_buf));
        let result = Library::new(&self.settings.output_root)
            .and_then(|library| library.rename_book(current.as_deref(), self.rename_to.trim()));

        match result {
            Ok(book) => {
                self.book_name = book.safe_name.clone();
                self.rename_to = book.safe_name.clone();
                self.set_book_dir(book.path);
                self.status = NarrationStatus::Completed(format!("Book folder is now {}", self.book_name));
            }
            Err(e) => self.status = NarrationStatus::Error(e.to_string()),
        }
    }

    fn selected_sections(&self) -> Vec<usize> {
        self.store
            .indices()
            .into_iter()
            .zip(&self.selected)
            .filter(|(_, &on)| on)
            .map(|(i, _)| i)
            .collect()
    }

    /// Applies the current settings to the pipeline's engines. Stoppable tasks
    /// arm the stop flag here, before the worker thread takes the pipeline.
    fn prepare_pipeline(&mut self, stoppable: bool) -> bool {
        let Ok(mut pipeline) = self.pipeline.try_lock() else {
            return false;
        };
        *pipeline.synthesizer_mut() = CommandSynthesizer::new(self.settings.engine);
        *pipeline.converter_mut() = self.settings.conversion.converter();
        self.stop_handle = stoppable.then(|| pipeline.arm());
        true
    }

    fn start_generation(&mut self, ctx: &egui::Context, resume: bool) {
        let job = match self.settings.job(self.selected_sections()) {
            Ok(job) => job,
            Err(e) => {
                self.status = NarrationStatus::Error(e.to_string());
                return;
            }
        };

        if resume {
            self.spawn(ctx, Task::Resume(job), "Continuing generation...");
        } else {
            self.spawn(ctx, Task::Generate(job), "Generating audio...");
        }
    }

    fn start_regeneration(&mut self, ctx: &egui::Context, onwards: bool) {
        let index = self.regenerate_index;
        let job = match self.settings.job(vec![index]) {
            Ok(job) => job,
            Err(e) => {
                self.status = NarrationStatus::Error(e.to_string());
                return;
            }
        };

        if onwards {
            self.spawn(ctx, Task::From(index, job), &format!("Regenerating from section {}...", index));
        } else {
            self.spawn(ctx, Task::Section(index, job), &format!("Regenerating section {}...", index));
        }
    }

    fn stop_generation(&mut self) {
        if let Some(handle) = &self.stop_handle {
            handle.stop();
            self.status = NarrationStatus::Running("Stopping after the current section...".to_string());
        }
    }

    /// Runs `task` on a worker thread. Only one task runs at a time.
    fn spawn(&mut self, ctx: &egui::Context, task: Task, stage: &str) {
        let stoppable = matches!(task, Task::Generate(_) | Task::Resume(_) | Task::From(..));
        if self.is_running() || !self.prepare_pipeline(stoppable) {
            return;
        }

        let (sender, receiver) = mpsc::channel();
        self.event_receiver = Some(receiver);
        self.current_progress = None;
        self.status = NarrationStatus::Running(stage.to_string());

        let pipeline = Arc::clone(&self.pipeline);
        let store = self.store.clone();
        let ctx = ctx.clone();
        thread::spawn(move || {
            let event = match pipeline.lock() {
                Ok(mut pipeline) => run_task(&mut pipeline, &store, task, &sender, &ctx),
                Err(_) => WorkerEvent::Failed("The pipeline is unavailable".to_string()),
            };
            let _ = sender.send(event);
            ctx.request_repaint();
        });
    }

    fn poll_worker(&mut self) {
        let Some(receiver) = &self.event_receiver else {
            return;
        };

        let mut finished = None;
        while let Ok(event) = receiver.try_recv() {
            match event {
                WorkerEvent::Progress(progress) => self.current_progress = Some(progress),
                other => finished = Some(other),
            }
        }

        let Some(event) = finished else {
            return;
        };
        self.event_receiver = None;
        self.stop_handle = None;

        match event {
            WorkerEvent::Finished(report) => self.finish_job(&report, report.paths()),
            WorkerEvent::FinishedFrom(report, merged) => self.finish_job(&report, artifact_paths(&merged)),
            WorkerEvent::Regenerated(artifact) => {
                self.refresh_tracks();
                self.status = NarrationStatus::Completed(format!("Successfully regenerated section {}", artifact.section_index));
            }
            WorkerEvent::Concatenated(path) => {
                self.status = NarrationStatus::Completed(format!("Audio files concatenated successfully: {}", path.display()));
            }
            WorkerEvent::Failed(message) => self.status = NarrationStatus::Error(message),
            WorkerEvent::Progress(_) => {}
        }
    }

    fn finish_job(&mut self, report: &JobReport, tracks: Vec<PathBuf>) {
        if !tracks.is_empty() {
            self.playback.set_artifacts(tracks);
        }
        self.status = NarrationStatus::from_report(report);
    }

    fn refresh_tracks(&mut self) {
        let Ok(pipeline) = self.pipeline.try_lock() else {
            return;
        };
        let tracks = artifact_paths(pipeline.state().artifacts.as_slice());
        drop(pipeline);
        let position = self.playback.position();
        self.playback.set_artifacts(tracks);
        self.playback.select(position);
    }

    fn play_current(&mut self) {
        let Some(track) = self.playback.current() else {
            return;
        };
        if let Err(e) = Command::new("xdg-open").arg(track).spawn() {
            error!("Could not play {}: {}", track.display(), e);
        }
    }

    fn save_settings(&self) {
        if let Some(path) = FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("audiobook_narrator.json")
            .save_file()
        {
            if let Err(e) = self.settings.save(&path) {
                error!("Could not save settings: {}", e);
            }
        }
    }

    fn load_settings(&mut self) {
        let Some(path) = FileDialog::new().add_filter("JSON", &["json"]).pick_file() else {
            return;
        };
        match AppConfig::load(&path) {
            Ok(settings) => {
                self.settings = settings;
                self.refresh_models();
            }
            Err(e) => self.status = NarrationStatus::Error(e.to_string()),
        }
    }
}

fn run_task(
    pipeline: &mut NarrationPipeline,
    store: &SectionStore,
    task: Task,
    sender: &mpsc::Sender<WorkerEvent>,
    ctx: &egui::Context,
) -> WorkerEvent {
    let on_progress = |progress: &Progress| {
        let _ = sender.send(WorkerEvent::Progress(progress.clone()));
        ctx.request_repaint();
    };

    match task {
        Task::Generate(job) => WorkerEvent::Finished(pipeline.generate(store, &job, on_progress)),
        Task::Resume(job) => {
            if pipeline.state().artifacts.is_empty() {
                pipeline.restore_from_disk();
            }
            WorkerEvent::Finished(pipeline.resume(store, &job, on_progress))
        }
        Task::Section(index, job) => match pipeline.regenerate_section(store, index, &job) {
            Ok(artifact) => WorkerEvent::Regenerated(artifact),
            Err(e) => WorkerEvent::Failed(format!("Failed to regenerate section {}: {}", index, e)),
        },
        Task::From(index, job) => {
            let report = pipeline.regenerate_from(store, index, &job, on_progress);
            let merged = merge_artifacts(&pipeline.artifacts(), &report.artifacts);
            WorkerEvent::FinishedFrom(report, merged)
        }
        Task::Concatenate(tracks) => match concatenate(&tracks, pipeline.output_dir()) {
            Ok(path) => WorkerEvent::Concatenated(path),
            Err(e) => WorkerEvent::Failed(format!("Error concatenating audio files: {}", e)),
        },
    }
}

fn main() -> Result<(), eframe::Error> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 720.0])
            .with_min_inner_size([640.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Audiobook Narrator",
        options,
        Box::new(|cc| Box::new(NarratorApp::new(cc))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: JobOutcome) -> JobReport {
        JobReport {
            outcome,
            artifacts: Vec::new(),
        }
    }

    #[test]
    fn test_stopped_job_is_not_an_error() {
        let stopped = report(JobOutcome::Stopped {
            processed: 2,
            last_completed: 2,
        });
        match NarrationStatus::from_report(&stopped) {
            NarrationStatus::Stopped(message) => assert!(message.contains("Section 2")),
            other => panic!("expected a stopped status, got {:?}", other),
        }

        let done = report(JobOutcome::Completed { processed: 1 });
        assert!(matches!(NarrationStatus::from_report(&done), NarrationStatus::Completed(_)));

        let failed = report(JobOutcome::AllFailed);
        assert!(matches!(NarrationStatus::from_report(&failed), NarrationStatus::Error(_)));
    }
}
