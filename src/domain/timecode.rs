//! Parsing and formatting of `HH:MM:SS` time codes and SRT timestamps.
//!
//! The hour field is never wrapped: recordings longer than a day format as
//! `25:00:00` rather than rolling over.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimecodeError {
    #[error("invalid time code '{0}': expected HH:MM:SS")]
    Invalid(String),
}

/// Parse an `HH:MM:SS` time code into milliseconds.
pub fn parse_hms(timecode: &str) -> Result<u64, TimecodeError> {
    let parts: Vec<&str> = timecode.split(':').collect();
    if parts.len() != 3 {
        return Err(TimecodeError::Invalid(timecode.to_string()));
    }

    let mut fields = [0u64; 3];
    for (slot, part) in fields.iter_mut().zip(&parts) {
        *slot = part
            .trim()
            .parse()
            .map_err(|_| TimecodeError::Invalid(timecode.to_string()))?;
    }

    let [h, m, s] = fields;
    if m >= 60 || s >= 60 {
        return Err(TimecodeError::Invalid(timecode.to_string()));
    }

    Ok((h * 3600 + m * 60 + s) * 1000)
}

/// Format whole seconds as `HH:MM:SS`.
pub fn format_hms(total_seconds: u64) -> String {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Format milliseconds as an SRT timestamp: `HH:MM:SS,mmm`.
pub fn format_srt(ms: u64) -> String {
    let total_seconds = ms / 1000;
    let ms_rem = ms % 1000;
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms_rem)
}
