//! Narrates books into per-section audio files.
//!
//! A document is split into paragraph [`sections`], each section is spoken by
//! a [`synth::SpeechSynthesizer`] and optionally re-voiced by a
//! [`convert::VoiceConverter`]. The [`pipeline`] keeps one `section_<n>.wav`
//! per section in the book's folder so that work can be stopped, continued
//! and selectively redone, and [`concat`] joins the tracks at the end.

pub mod concat;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod library;
pub mod pipeline;
pub mod playback;
pub mod sections;
pub mod synth;
pub mod voices;

pub use config::AppConfig;
pub use convert::{ConversionParams, F0Method, RvcConverter, VoiceConverter};
pub use error::{Error, Result};
pub use pipeline::{Artifact, GenerationJob, GenerationPipeline, JobOutcome, JobReport, Progress, StopHandle};
pub use playback::PlaybackIndex;
pub use sections::SectionStore;
pub use synth::{CommandSynthesizer, SpeechSynthesizer};

/// The pipeline wired to the command line engines.
pub type NarrationPipeline = GenerationPipeline<CommandSynthesizer, RvcConverter>;
