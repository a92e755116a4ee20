use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::build_decoder;
use super::command::{Cli, FramesArgs};
use crate::input::{InputReader, source_name};
use mpa::structs::frame::Frame;
use mpa::structs::layer1::ChannelSamples;

/// One frame as written by `mpadec frames`.
#[derive(Debug, Serialize)]
pub struct FrameRecord {
    pub index: usize,
    pub offset: u64,
    pub version: String,
    pub layer: String,
    pub bitrate_kbps: u32,
    pub sampling_frequency_hz: u32,
    pub mode: String,
    pub mode_extension: u8,
    pub padded: bool,
    pub private: bool,
    pub copyrighted: bool,
    pub original: bool,
    pub emphasis: String,
    pub frame_length: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crc_valid: Option<bool>,
    /// `[channel][subband][sample]`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<Vec<Vec<Vec<i32>>>>,
}

impl FrameRecord {
    pub fn new(index: usize, frame: &Frame, with_samples: bool) -> Self {
        let header = &frame.header;

        Self {
            index,
            offset: frame.offset,
            version: header.version.to_string(),
            layer: header.layer.to_string(),
            bitrate_kbps: header.bitrate,
            sampling_frequency_hz: header.sampling_frequency,
            mode: header.mode.to_string(),
            mode_extension: header.mode_extension,
            padded: header.padded,
            private: header.private,
            copyrighted: header.copyrighted,
            original: header.original,
            emphasis: header.emphasis.to_string(),
            frame_length: header.frame_length_bytes(),
            crc: frame.crc,
            crc_valid: frame.crc_valid,
            samples: frame
                .samples
                .as_ref()
                .filter(|_| with_samples)
                .map(|channels| channels.iter().map(nested_samples).collect()),
        }
    }
}

fn nested_samples(channel: &ChannelSamples) -> Vec<Vec<i32>> {
    channel.iter().map(|subband| subband.to_vec()).collect()
}

pub fn cmd_frames(args: &FramesArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let source = source_name(&args.input);
    log::info!("Reading frames: {source}");

    let decoder = build_decoder(cli);
    let reader = InputReader::new(&args.input)?;

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new_spinner());
            pb.set_style(ProgressStyle::with_template(
                "{spinner:.green} {pos} frames\n{msg} | elapsed: {elapsed_precise}",
            )?);
            pb.enable_steady_tick(Duration::from_millis(100));
            pb.set_message(source.clone());
            Some(pb)
        }
        None => None,
    };

    let mut frames = decoder.frames(reader);
    let mut records = Vec::new();
    let mut failure = None;

    for result in frames.by_ref() {
        match result {
            Ok(frame) => {
                records.push(FrameRecord::new(records.len(), &frame, args.samples));
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
            }
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    if frames.is_truncated() {
        log::warn!("{source}: stream ends inside a frame");
    }
    log::info!(
        "{source}: {} frame(s), {} rejected sync candidate(s)",
        records.len(),
        frames.rejected()
    );

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_records(BufWriter::new(file), &records)?;
            log::info!("Frame records written to {}", path.display());
        }
        None => write_records(io::stdout().lock(), &records)?,
    }

    if let Some(e) = failure {
        bail!("{source}: {e}");
    }

    Ok(())
}

fn write_records<W: Write>(mut writer: W, records: &[FrameRecord]) -> Result<()> {
    serde_yaml_ng::to_writer(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use mpa::process::{EXAMPLE_DATA, decode::Decoder};

    fn records(with_samples: bool) -> Vec<FrameRecord> {
        let track = Decoder::default().decode("test", Cursor::new(EXAMPLE_DATA));
        track
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| FrameRecord::new(index, frame, with_samples))
            .collect()
    }

    #[test]
    fn record_fields() {
        let records = records(false);

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].index, 1);
        assert_eq!(records[1].offset, 41);
        assert_eq!(records[0].layer, "Layer I");
        assert_eq!(records[0].mode, "Single channel");
        assert_eq!(records[0].frame_length, 34);
        assert!(records[0].samples.is_none());
    }

    #[test]
    fn yaml_output() -> anyhow::Result<()> {
        let mut out = Vec::new();
        write_records(&mut out, &records(true))?;
        let yaml = String::from_utf8(out)?;

        assert!(yaml.contains("offset: 14"));
        assert!(yaml.contains("bitrate_kbps: 128"));
        assert!(yaml.contains("sampling_frequency_hz: 44100"));
        assert!(!yaml.contains("crc"));
        assert!(yaml.contains("samples:"));

        let parsed: Vec<serde_yaml_ng::Value> = serde_yaml_ng::from_str(&yaml)?;
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["samples"][0][0][0].as_i64(), Some(8));
        Ok(())
    }
}
