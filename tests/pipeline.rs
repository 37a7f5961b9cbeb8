use audiobook_narrator::convert::{ConversionParams, VoiceConverter};
use audiobook_narrator::pipeline::{GenerationJob, GenerationPipeline, JobOutcome, PipelineStatus};
use audiobook_narrator::sections::SectionStore;
use audiobook_narrator::synth::SpeechSynthesizer;
use audiobook_narrator::Error;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

/// Marker sample written by the fake converter in front of the audio it copies.
const CONVERTED_MARKER: i16 = -1000;

fn write_samples(path: &Path, samples: &[i16]) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: 24000,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for s in samples {
        writer.write_sample(*s).unwrap();
    }
    writer.finalize().unwrap();
}

fn read_samples(path: &Path) -> Vec<i16> {
    WavReader::open(path)
        .unwrap()
        .samples::<i16>()
        .map(|s| s.unwrap())
        .collect()
}

/// Writes one sample per character of the text followed by the speed in percent.
#[derive(Default)]
struct FakeSynth {
    fail_on: HashSet<String>,
    calls: Vec<String>,
}

impl FakeSynth {
    fn failing_on(texts: &[&str]) -> Self {
        Self {
            fail_on: texts.iter().map(|t| t.to_string()).collect(),
            calls: Vec::new(),
        }
    }

    fn expected(text: &str, speed: f32) -> Vec<i16> {
        let mut samples: Vec<i16> = text.bytes().map(i16::from).collect();
        samples.push((speed * 100.0) as i16);
        samples
    }
}

impl SpeechSynthesizer for FakeSynth {
    fn generate(&mut self, text: &str, output: &Path, _voice: &str, speed: f32) -> bool {
        self.calls.push(text.to_string());
        if self.fail_on.contains(text) {
            return false;
        }
        write_samples(output, &Self::expected(text, speed));
        true
    }
}

struct FakeConverter {
    loadable: bool,
    succeed: bool,
    converted: usize,
}

impl FakeConverter {
    fn working() -> Self {
        Self {
            loadable: true,
            succeed: true,
            converted: 0,
        }
    }

    fn broken() -> Self {
        Self {
            succeed: false,
            ..Self::working()
        }
    }
}

impl VoiceConverter for FakeConverter {
    fn load(&mut self, _model: &Path) -> bool {
        self.loadable
    }

    fn convert(&mut self, input: &Path, output: &Path, params: &ConversionParams) -> bool {
        if !self.succeed {
            return false;
        }
        let mut samples = vec![CONVERTED_MARKER, params.pitch_shift as i16];
        samples.extend(read_samples(input));
        write_samples(output, &samples);
        self.converted += 1;
        true
    }
}

type TestPipeline = GenerationPipeline<FakeSynth, FakeConverter>;

fn setup(text: &str, synth: FakeSynth, converter: FakeConverter) -> (TempDir, SectionStore, TestPipeline) {
    let dir = tempfile::tempdir().unwrap();
    let store = SectionStore::from_text(text);
    let pipeline = GenerationPipeline::new(synth, converter).with_output_dir(dir.path().join("book"));
    (dir, store, pipeline)
}

fn job(sections: &[usize]) -> GenerationJob {
    GenerationJob::new(sections.iter().copied(), "af_heart", 1.0).unwrap()
}

fn conversion_job(sections: &[usize], pitch: i32) -> GenerationJob {
    let mut params = ConversionParams::new("models/narrator/narrator.pth");
    params.pitch_shift = pitch;
    job(sections).with_conversion(params)
}

fn book_dir(pipeline: &TestPipeline) -> PathBuf {
    pipeline.output_dir().unwrap().to_path_buf()
}

fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect()
}

/// At most one of the temp and final file may exist for any section.
fn assert_no_temp_files(dir: &Path) {
    let temps: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|name| name.starts_with("temp_"))
        .collect();
    assert!(temps.is_empty(), "leftover temp files: {:?}", temps);
}

#[test]
fn generates_every_section_in_order() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC", FakeSynth::default(), FakeConverter::working());
    assert_eq!(store.all(), vec!["A", "B", "C"]);

    let mut fractions = Vec::new();
    let report = pipeline.generate(&store, &job(&[3, 1, 2]), |p| fractions.push(p.fraction()));

    assert!(report.is_success());
    assert_eq!(report.processed(), 3);
    assert_eq!(file_names(&report.paths()), vec!["section_1.wav", "section_2.wav", "section_3.wav"]);
    assert_eq!(fractions.len(), 3);
    assert_eq!(fractions[2], 1.0);
    assert_eq!(pipeline.status(), PipelineStatus::Idle);
    assert_eq!(pipeline.state().last_completed, 3);
    assert_no_temp_files(&book_dir(&pipeline));
}

#[test]
fn failed_section_is_skipped_without_failing_the_job() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC", FakeSynth::failing_on(&["B"]), FakeConverter::working());

    let report = pipeline.generate(&store, &job(&[1, 2, 3]), |_| {});

    assert!(report.is_success());
    assert_eq!(report.processed(), 2);
    assert_eq!(file_names(&report.paths()), vec!["section_1.wav", "section_3.wav"]);
    let dir = book_dir(&pipeline);
    assert!(!dir.join("section_2.wav").exists());
    assert_no_temp_files(&dir);
}

#[test]
fn all_failures_and_empty_selection_are_reported_differently() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::failing_on(&["A", "B"]), FakeConverter::working());

    let failed = pipeline.generate(&store, &job(&[1, 2]), |_| {});
    assert!(matches!(failed.outcome, JobOutcome::AllFailed));
    assert!(failed.artifacts.is_empty());

    let empty = pipeline.generate(&store, &job(&[]), |_| {});
    assert!(matches!(empty.outcome, JobOutcome::NothingSelected));
    assert_ne!(failed.message(), empty.message());
}

#[test]
fn out_of_range_selection_is_rejected_without_touching_state() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC", FakeSynth::default(), FakeConverter::working());
    pipeline.generate(&store, &job(&[1, 2, 3]), |_| {});
    let before = pipeline.state().clone();

    let report = pipeline.generate(&store, &job(&[2, 9]), |_| {});
    assert!(matches!(
        report.outcome,
        JobOutcome::Rejected(Error::SectionOutOfRange { index: 9, count: 3 })
    ));
    assert_eq!(report.artifacts.len(), 3);
    assert_eq!(pipeline.state(), &before);
    assert_eq!(pipeline.state().last_completed, 3);

    let resumed = pipeline.resume(&store, &job(&[4]), |_| {});
    assert!(matches!(resumed.outcome, JobOutcome::Rejected(Error::SectionOutOfRange { .. })));
    assert_eq!(pipeline.state(), &before);
    assert_eq!(pipeline.synthesizer_mut().calls, vec!["A", "B", "C"]);
}

#[test]
fn stop_then_resume_processes_only_remaining_sections() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC\n\nD", FakeSynth::default(), FakeConverter::working());
    let handle = pipeline.stop_handle();
    let selection = job(&[1, 2, 3, 4]);

    let stopped = pipeline.generate(&store, &selection, |p| {
        if p.processed == 2 {
            handle.stop();
        }
    });

    match stopped.outcome {
        JobOutcome::Stopped {
            processed,
            last_completed,
        } => {
            assert_eq!(processed, 2);
            assert_eq!(last_completed, 2);
        }
        other => panic!("expected a stopped job, got {:?}", other),
    }
    assert_eq!(stopped.artifacts.len(), 2);
    assert_eq!(pipeline.status(), PipelineStatus::Stopped);

    let resumed = pipeline.resume(&store, &selection, |_| {});
    assert!(resumed.is_success());
    assert_eq!(resumed.processed(), 2);
    assert_eq!(
        file_names(&resumed.paths()),
        vec!["section_1.wav", "section_2.wav", "section_3.wav", "section_4.wav"]
    );
    assert_eq!(pipeline.synthesizer_mut().calls, vec!["A", "B", "C", "D"]);

    let again = pipeline.resume(&store, &selection, |_| {});
    assert!(matches!(again.outcome, JobOutcome::NothingToDo));
    assert_eq!(again.artifacts.len(), 4);
}

#[test]
fn stop_requested_before_a_job_does_not_block_it() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::working());
    pipeline.stop();

    let report = pipeline.generate(&store, &job(&[1, 2]), |_| {});
    assert!(report.is_success());
    assert_eq!(report.processed(), 2);
}

#[test]
fn generate_starts_over_after_a_stop() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC", FakeSynth::default(), FakeConverter::working());
    let handle = pipeline.stop_handle();

    pipeline.generate(&store, &job(&[1, 2, 3]), |_| handle.stop());
    assert_eq!(pipeline.state().artifacts.len(), 1);

    let report = pipeline.generate(&store, &job(&[2, 3]), |_| {});
    assert_eq!(file_names(&report.paths()), vec!["section_2.wav", "section_3.wav"]);
    assert_eq!(pipeline.state().last_completed, 3);
}

#[test]
fn regenerating_twice_leaves_one_fresh_file() {
    let (_dir, store, mut pipeline) = setup("Hello\n\nWorld", FakeSynth::default(), FakeConverter::working());

    pipeline.regenerate_section(&store, 2, &job(&[])).unwrap();
    let artifact = pipeline.regenerate_section(&store, 2, &job(&[])).unwrap();

    assert_eq!(read_samples(&artifact.path), FakeSynth::expected("World", 1.0));
    assert!(!artifact.temp_path.exists());
    assert_eq!(pipeline.state().artifacts.len(), 1);
    assert_no_temp_files(&book_dir(&pipeline));
}

#[test]
fn stale_files_from_an_interrupted_run_are_replaced() {
    let (_dir, store, mut pipeline) = setup("A", FakeSynth::default(), FakeConverter::working());
    let dir = book_dir(&pipeline);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("temp_section_1.wav"), b"half written").unwrap();
    fs::write(dir.join("section_1.wav"), b"old").unwrap();

    let report = pipeline.generate(&store, &job(&[1]), |_| {});

    assert!(report.is_success());
    assert_eq!(read_samples(&dir.join("section_1.wav")), FakeSynth::expected("A", 1.0));
    assert_no_temp_files(&dir);
}

#[test]
fn conversion_replaces_temp_audio() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::working());

    let report = pipeline.generate(&store, &conversion_job(&[1, 2], 3), |_| {});

    assert!(report.is_success());
    for artifact in &report.artifacts {
        let samples = read_samples(&artifact.path);
        assert_eq!(samples[0], CONVERTED_MARKER);
        assert_eq!(samples[1], 3);
        assert!(!artifact.used_fallback);
    }
    assert_eq!(pipeline.converter_mut().converted, 2);
    assert_no_temp_files(&book_dir(&pipeline));
}

#[test]
fn failed_conversion_falls_back_to_unconverted_audio() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::broken());

    let report = pipeline.generate(&store, &conversion_job(&[1, 2], 0), |_| {});

    assert!(report.is_success());
    assert_eq!(report.processed(), 2);
    for artifact in &report.artifacts {
        assert!(artifact.used_fallback);
        assert!(artifact.path.exists());
        assert!(!artifact.temp_path.exists());
    }
    assert_eq!(read_samples(&report.artifacts[0].path), FakeSynth::expected("A", 1.0));
}

#[test]
fn unloadable_model_rejects_the_job_without_touching_state() {
    let converter = FakeConverter {
        loadable: false,
        ..FakeConverter::working()
    };
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), converter);
    pipeline.generate(&store, &job(&[1]), |_| {});

    let report = pipeline.generate(&store, &conversion_job(&[1, 2], 0), |_| {});

    assert!(matches!(report.outcome, JobOutcome::Rejected(Error::ModelLoad(_))));
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(pipeline.state().last_completed, 1);
    assert!(pipeline.synthesizer_mut().calls.len() == 1);
}

#[test]
fn regenerate_section_only_rewrites_that_section() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC\n\nD", FakeSynth::default(), FakeConverter::working());
    let first = pipeline.generate(&store, &conversion_job(&[1, 2, 3, 4], 5), |_| {});
    let before: Vec<Vec<u8>> = first.artifacts.iter().map(|a| fs::read(&a.path).unwrap()).collect();

    let new_job = GenerationJob::new([2], "bm_george", 1.5).unwrap();
    let artifact = pipeline.regenerate_section(&store, 2, &new_job).unwrap();

    assert_eq!(read_samples(&artifact.path), FakeSynth::expected("B", 1.5));
    for (i, a) in first.artifacts.iter().enumerate() {
        if a.section_index != 2 {
            assert_eq!(fs::read(&a.path).unwrap(), before[i]);
        }
    }
    let indices: Vec<usize> = pipeline.state().artifacts.iter().map(|a| a.section_index).collect();
    assert_eq!(indices, vec![1, 2, 3, 4]);
}

#[test]
fn regenerate_section_reports_bad_indices_and_failures() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::failing_on(&["B"]), FakeConverter::working());

    let out_of_range = pipeline.regenerate_section(&store, 9, &job(&[])).unwrap_err();
    assert!(matches!(out_of_range, Error::SectionOutOfRange { index: 9, count: 2 }));

    let failed = pipeline.regenerate_section(&store, 2, &job(&[])).unwrap_err();
    assert!(matches!(failed, Error::SectionFailed(2)));
    assert!(pipeline.state().artifacts.is_empty());
}

#[test]
fn regenerate_from_returns_only_new_artifacts() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC\n\nD", FakeSynth::default(), FakeConverter::working());
    pipeline.generate(&store, &job(&[1, 2, 3, 4]), |_| {});

    let report = pipeline.regenerate_from(&store, 3, &job(&[]), |_| {});

    assert!(report.is_success());
    assert_eq!(file_names(&report.paths()), vec!["section_3.wav", "section_4.wav"]);
    assert_eq!(pipeline.state().artifacts.len(), 4);

    let invalid = pipeline.regenerate_from(&store, 0, &job(&[]), |_| {});
    assert!(matches!(invalid.outcome, JobOutcome::Rejected(Error::SectionOutOfRange { .. })));
}

#[test]
fn regenerate_from_honours_stop() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC\n\nD", FakeSynth::default(), FakeConverter::working());
    let handle = pipeline.stop_handle();

    let report = pipeline.regenerate_from(&store, 2, &job(&[]), |_| handle.stop());

    assert!(matches!(report.outcome, JobOutcome::Stopped { processed: 1, .. }));
    assert_eq!(file_names(&report.paths()), vec!["section_2.wav"]);
}

#[test]
fn stopped_regeneration_reports_its_own_progress_and_keeps_the_job_state() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC\n\nD", FakeSynth::default(), FakeConverter::working());
    let handle = pipeline.stop_handle();
    let selection = job(&[1, 2, 3, 4]);

    pipeline.generate(&store, &selection, |_| handle.stop());
    let before = pipeline.state().clone();
    assert_eq!(before.last_completed, 1);
    assert_eq!(before.total_in_job, 4);

    let report = pipeline.regenerate_from(&store, 3, &job(&[]), |_| handle.stop());
    match report.outcome {
        JobOutcome::Stopped {
            processed,
            last_completed,
        } => {
            assert_eq!(processed, 1);
            assert_eq!(last_completed, 3);
        }
        ref other => panic!("expected a stopped regeneration, got {:?}", other),
    }
    assert!(report.message().contains("Section 3"));
    assert_eq!(file_names(&report.paths()), vec!["section_3.wav"]);
    assert_eq!(pipeline.state(), &before);
    assert_eq!(pipeline.status(), PipelineStatus::Stopped);

    let resumed = pipeline.resume(&store, &selection, |_| {});
    assert!(resumed.is_success());
    assert_eq!(resumed.processed(), 3);
}

#[test]
fn stop_through_an_armed_handle_is_kept_until_the_job_starts() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::working());

    let handle = pipeline.arm();
    assert!(handle.is_running());
    handle.stop();

    let report = pipeline.generate(&store, &job(&[1, 2]), |_| {});
    assert!(matches!(report.outcome, JobOutcome::Stopped { processed: 0, .. }));
    assert!(pipeline.synthesizer_mut().calls.is_empty());

    // The stop belonged to that job only.
    let next = pipeline.generate(&store, &job(&[1, 2]), |_| {});
    assert!(next.is_success());
    assert_eq!(next.processed(), 2);
}

#[test]
fn busy_final_file_is_retried_once() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::working());
    let dir = book_dir(&pipeline);
    let busy = dir.join("section_1.wav");
    fs::create_dir_all(busy.join("held")).unwrap();

    let releaser = {
        let busy = busy.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            fs::remove_dir_all(&busy).unwrap();
        })
    };

    let report = pipeline.generate(&store, &job(&[1, 2]), |_| {});
    releaser.join().unwrap();

    assert!(report.is_success());
    assert_eq!(report.processed(), 2);
    assert!(busy.is_file());
    assert_eq!(read_samples(&busy), FakeSynth::expected("A", 1.0));
    assert_no_temp_files(&dir);
}

#[test]
fn final_file_that_stays_busy_skips_the_section() {
    let (_dir, store, mut pipeline) = setup("A\n\nB", FakeSynth::default(), FakeConverter::working());
    let dir = book_dir(&pipeline);
    fs::create_dir_all(dir.join("section_1.wav").join("held")).unwrap();

    let report = pipeline.generate(&store, &job(&[1, 2]), |_| {});

    assert!(report.is_success());
    assert_eq!(file_names(&report.paths()), vec!["section_2.wav"]);
    assert_eq!(pipeline.synthesizer_mut().calls, vec!["B"]);
}

#[test]
fn missing_output_directory_rejects_jobs() {
    let store = SectionStore::from_text("A");
    let mut pipeline = GenerationPipeline::new(FakeSynth::default(), FakeConverter::working());

    let report = pipeline.generate(&store, &job(&[1]), |_| {});
    assert!(matches!(report.outcome, JobOutcome::Rejected(Error::NoOutputDir)));
    assert!(pipeline.synthesizer_mut().calls.is_empty());
}

#[test]
fn unusable_output_directory_aborts_the_job() {
    let dir = tempfile::tempdir().unwrap();
    let not_a_dir = dir.path().join("book");
    fs::write(&not_a_dir, b"file in the way").unwrap();
    let store = SectionStore::from_text("A\n\nB");
    let mut pipeline = GenerationPipeline::new(FakeSynth::default(), FakeConverter::working()).with_output_dir(&not_a_dir);

    let report = pipeline.generate(&store, &job(&[1, 2]), |_| {});

    assert!(matches!(report.outcome, JobOutcome::Aborted { processed: 0, .. }));
    assert_eq!(pipeline.status(), PipelineStatus::Idle);
    assert!(!pipeline.stop_handle().is_running());
}

#[test]
fn restore_from_disk_lets_resume_skip_existing_sections() {
    let (_dir, store, mut pipeline) = setup("A\n\nB\n\nC", FakeSynth::default(), FakeConverter::working());
    pipeline.generate(&store, &job(&[1, 2]), |_| {});

    let dir = book_dir(&pipeline);
    let mut reopened = GenerationPipeline::new(FakeSynth::default(), FakeConverter::working()).with_output_dir(&dir);
    assert_eq!(reopened.restore_from_disk(), 2);
    assert_eq!(reopened.status(), PipelineStatus::Stopped);

    let report = reopened.resume(&store, &job(&[1, 2, 3]), |_| {});
    assert_eq!(report.processed(), 1);
    assert_eq!(reopened.synthesizer_mut().calls, vec!["C"]);
    assert_eq!(
        file_names(&report.paths()),
        vec!["section_1.wav", "section_2.wav", "section_3.wav"]
    );
}
