use indicatif::ProgressBar;
use log::Level;

use command::Cli;
use mpa::process::decode::Decoder;

pub mod command;
pub mod frames;
pub mod info;

/// Decoder configured from the global flags.
pub fn build_decoder(cli: &Cli) -> Decoder {
    let mut decoder = Decoder::default();

    // Configure fail level based on strict mode
    decoder.set_fail_level(if cli.strict { Level::Warn } else { Level::Error });
    decoder.set_decode_audio(!cli.headers_only);

    decoder
}

/// Runs `f` with the progress bar hidden, so its output isn't overdrawn.
pub fn suspend<F: FnOnce()>(pb: Option<&ProgressBar>, f: F) {
    match pb {
        Some(pb) => pb.suspend(f),
        None => f(),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser as ClapParser;

    use super::*;

    #[test]
    fn decoder_from_flags() -> anyhow::Result<()> {
        let cli = Cli::try_parse_from(["mpadec", "--strict", "--headers-only", "info", "a.mp3"])?;
        let state = build_decoder(&cli).state().clone();

        assert_eq!(state.fail_level, Level::Warn);
        assert!(!state.decode_audio);
        assert!(state.verify_crc);

        let cli = Cli::try_parse_from(["mpadec", "info", "a.mp3"])?;
        let state = build_decoder(&cli).state().clone();
        assert_eq!(state.fail_level, Level::Error);
        assert!(state.decode_audio);
        Ok(())
    }
}
