//! Joins the section tracks of a book into one audiobook file.

use crate::error::{Error, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tempfile::Builder;

pub const COMPLETE_AUDIOBOOK: &str = "complete_audiobook.wav";

/// Appends the samples of every track, in order, into `complete_audiobook.wav`
/// inside `output_dir`. The file is written under a temporary name and moved
/// into place once complete.
pub fn concatenate(tracks: &[PathBuf], output_dir: Option<&Path>) -> Result<PathBuf> {
    let output_dir = output_dir.ok_or(Error::NoOutputDir)?;
    let first = tracks.first().ok_or(Error::NoArtifacts)?;

    let spec = WavReader::open(first)?.spec();
    let temp = Builder::new()
        .prefix("temp_concatenated")
        .suffix(".wav")
        .tempfile_in(output_dir)?;
    let mut writer = WavWriter::new(BufWriter::new(temp.as_file()), spec)?;

    for track in tracks {
        let mut reader = WavReader::open(track)?;
        check_compatible(track, &spec, &reader.spec())?;

        match spec.sample_format {
            SampleFormat::Float => {
                for sample in reader.samples::<f32>() {
                    writer.write_sample(sample?)?;
                }
            }
            SampleFormat::Int => {
                for sample in reader.samples::<i32>() {
                    writer.write_sample(sample?)?;
                }
            }
        }
    }
    writer.finalize()?;

    let final_path = output_dir.join(COMPLETE_AUDIOBOOK);
    temp.persist(&final_path).map_err(|e| Error::Io(e.error))?;

    info!("Concatenated {} tracks into {}", tracks.len(), final_path.display());
    Ok(final_path)
}

fn check_compatible(track: &Path, expected: &WavSpec, actual: &WavSpec) -> Result<()> {
    if expected == actual {
        return Ok(());
    }
    Err(Error::AudioFormat {
        path: track.to_path_buf(),
        reason: format!(
            "{} Hz/{} ch/{} bit, expected {} Hz/{} ch/{} bit",
            actual.sample_rate,
            actual.channels,
            actual.bits_per_sample,
            expected.sample_rate,
            expected.channels,
            expected.bits_per_sample
        ),
    })
}
