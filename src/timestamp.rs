use std::time::Duration;

/// Formats a duration as `HH:MM:SS.mmm`, truncating to whole milliseconds.
pub fn time_str(duration: Duration) -> String {
    let ms = duration.as_millis();
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let milliseconds = ms % 1000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

#[test]
fn formats_durations() {
    assert_eq!(time_str(Duration::ZERO), "00:00:00.000");
    assert_eq!(time_str(Duration::from_micros(17_414)), "00:00:00.017");
    assert_eq!(time_str(Duration::from_millis(3_723_004)), "01:02:03.004");
    assert_eq!(time_str(Duration::from_secs(360_000)), "100:00:00.000");
}
