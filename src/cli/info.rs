use std::fmt::{self, Display, Formatter};
use std::time::Duration;

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::command::{Cli, InfoArgs};
use super::{build_decoder, suspend};
use crate::input::{InputReader, source_name};
use crate::timestamp::time_str;
use mpa::structs::frame::{StreamEnd, Track};
use mpa::structs::header::Header;
use mpa::structs::id3::ID3_HEADER_SIZE;

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let decoder = build_decoder(cli);

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(args.inputs.len() as u64));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} inputs\n{msg} | elapsed: {elapsed_precise}",
            )?);
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        }
        None => None,
    };

    let mut failed = 0;
    for path in &args.inputs {
        let source = source_name(path);
        log::info!("Analyzing MPEG audio stream: {source}");
        if let Some(ref pb) = pb {
            pb.set_message(source.clone());
        }

        let track = match InputReader::new(path) {
            Ok(reader) => decoder.decode(source, reader),
            Err(e) => {
                log::error!("{e:#}");
                failed += 1;
                if let Some(ref pb) = pb {
                    pb.inc(1);
                }
                continue;
            }
        };

        if let StreamEnd::Failed(e) = &track.end {
            log::error!("{}: {e}", track.source);
            failed += 1;
        }

        suspend(pb.as_ref(), || print!("{}", Report(&track)));

        if let Some(ref pb) = pb {
            pb.inc(1);
        }
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    if failed > 0 {
        bail!("{failed} of {} input(s) failed", args.inputs.len());
    }

    Ok(())
}

#[derive(Debug, PartialEq)]
enum Bitrate {
    Constant(u32),
    Variable { min: u32, max: u32, average: f64 },
    FreeFormat,
}

#[derive(Debug)]
struct StreamSummary {
    first: Header,
    frames: usize,
    bitrate: Bitrate,
    duration: Duration,
    protected: usize,
    crc_failures: usize,
    /// Frames whose version, layer, sampling frequency or channel mode
    /// differ from the first frame.
    inconsistent: usize,
}

impl StreamSummary {
    fn from_track(track: &Track) -> Option<Self> {
        let first = track.frames.first()?.header;

        let bitrates: Vec<u32> = track
            .frames
            .iter()
            .map(|frame| frame.header.bitrate)
            .filter(|&bitrate| bitrate != 0)
            .collect();

        let bitrate = match (bitrates.iter().min(), bitrates.iter().max()) {
            (Some(&min), Some(&max)) if min == max => Bitrate::Constant(min),
            (Some(&min), Some(&max)) => Bitrate::Variable {
                min,
                max,
                average: bitrates.iter().map(|&b| b as f64).sum::<f64>() / bitrates.len() as f64,
            },
            _ => Bitrate::FreeFormat,
        };

        let inconsistent = track
            .frames
            .iter()
            .filter(|frame| {
                let header = &frame.header;
                header.version != first.version
                    || header.layer != first.layer
                    || header.sampling_frequency != first.sampling_frequency
                    || header.mode != first.mode
            })
            .count();

        Some(Self {
            first,
            frames: track.frames.len(),
            bitrate,
            duration: track.duration(),
            protected: track.frames.iter().filter(|f| f.crc.is_some()).count(),
            crc_failures: track.crc_failures(),
            inconsistent,
        })
    }
}

fn end_str(end: &StreamEnd) -> String {
    match end {
        StreamEnd::EndOfStream => "End of stream".to_string(),
        StreamEnd::Truncated => "Truncated frame".to_string(),
        StreamEnd::Failed(e) => format!("Failed: {e}"),
    }
}

/// Plain-text stream report for one input.
struct Report<'a>(&'a Track);

impl Display for Report<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let track = self.0;

        writeln!(f)?;
        writeln!(f, "MPEG Audio Stream Information")?;
        writeln!(f, "=============================")?;
        writeln!(f)?;
        writeln!(f, "Source                      {}", track.source)?;

        if let Some(tag) = &track.id3 {
            writeln!(
                f,
                "ID3v2 tag                   v2.{}.{}, {} bytes",
                tag.major_version,
                tag.revision,
                tag.skip_length() as usize + ID3_HEADER_SIZE
            )?;
        }

        match StreamSummary::from_track(track) {
            Some(summary) => write_summary(f, &summary)?,
            None => writeln!(f, "No MPEG audio frames found.")?,
        }

        writeln!(f, "Rejected sync candidates    {}", track.rejected)?;
        writeln!(f, "End of decoding             {}", end_str(&track.end))?;
        writeln!(f)
    }
}

fn write_summary(f: &mut Formatter<'_>, summary: &StreamSummary) -> fmt::Result {
    let header = &summary.first;

    writeln!(f, "Format                      {} {}", header.version, header.layer)?;
    writeln!(
        f,
        "Sampling rate               {} kHz",
        header.sampling_frequency_khz()
    )?;
    writeln!(f, "Channel mode                {}", header.mode)?;

    match summary.bitrate {
        Bitrate::Constant(bitrate) => {
            writeln!(f, "Bitrate                     {bitrate} kbps (constant)")?
        }
        Bitrate::Variable { min, max, average } => writeln!(
            f,
            "Bitrate                     {min}-{max} kbps (variable, average {average:.1} kbps)"
        )?,
        Bitrate::FreeFormat => writeln!(f, "Bitrate                     Free format")?,
    }

    writeln!(f, "Emphasis                    {}", header.emphasis)?;
    writeln!(f, "Frames                      {}", summary.frames)?;
    if summary.inconsistent > 0 {
        writeln!(
            f,
            "Inconsistent frames         {} (format differs from the first frame)",
            summary.inconsistent
        )?;
    }
    writeln!(f, "Duration                    {}", time_str(summary.duration))?;
    writeln!(f, "Protected frames            {}", summary.protected)?;
    writeln!(f, "CRC failures                {}", summary.crc_failures)
}
