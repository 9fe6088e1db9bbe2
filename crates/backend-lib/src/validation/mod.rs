// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Message validation module.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

// Common validation constants
pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;
const MIN_MEETING_ID_LENGTH: usize = 3;
const MAX_MEETING_ID_LENGTH: usize = 64;
const MAX_CHAT_LENGTH: usize = 1000;
const MAX_EMOJI_LENGTH: usize = 16;
const MAX_STREAM_ID_LENGTH: usize = 128;
const MAX_QUESTION_LENGTH: usize = 200;
const MAX_OPTION_LENGTH: usize = 100;
const MIN_POLL_OPTIONS: usize = 2;
const MAX_POLL_OPTIONS: usize = 10;
const MAX_POLL_DURATION_SECS: u64 = 3600;
const MAX_FILE_NAME_LENGTH: usize = 255;

// Regex patterns for validation
static MEETING_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9-]+$").expect("static regex"));
static URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s]+$").expect("static regex"));

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid meeting ID: {0}")]
    InvalidMeetingId(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Invalid signal: {0}")]
    InvalidSignal(String),

    #[error("Invalid poll: {0}")]
    InvalidPoll(String),

    #[error("Invalid file: {0}")]
    InvalidFile(String),

    #[error("Invalid audio level: {0}")]
    InvalidAudioLevel(f64),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a display name, returning the trimmed form
pub fn validate_display_name(name: &str) -> ValidationResult<String> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();

    if len == 0 {
        return Err(ValidationError::InvalidName(
            "Name must not be empty".to_string(),
        ));
    }

    if len > MAX_DISPLAY_NAME_LENGTH {
        return Err(ValidationError::InvalidName(format!(
            "Name must be at most {MAX_DISPLAY_NAME_LENGTH} characters"
        )));
    }

    Ok(trimmed.to_string())
}

/// Validate a meeting ID
pub fn validate_meeting_id(meeting_id: &str) -> ValidationResult<&str> {
    let meeting_id = meeting_id.trim();

    if meeting_id.len() < MIN_MEETING_ID_LENGTH || meeting_id.len() > MAX_MEETING_ID_LENGTH {
        return Err(ValidationError::InvalidMeetingId(format!(
            "Meeting ID must be between {MIN_MEETING_ID_LENGTH} and {MAX_MEETING_ID_LENGTH} characters"
        )));
    }

    if !MEETING_ID_REGEX.is_match(meeting_id) {
        return Err(ValidationError::InvalidMeetingId(
            "Meeting ID must contain only alphanumeric characters and hyphens".to_string(),
        ));
    }

    Ok(meeting_id)
}

/// Validate a relay target connection ID
pub fn validate_signal_target(target: &str) -> ValidationResult<&str> {
    if target.trim().is_empty() {
        return Err(ValidationError::InvalidSignal(
            "Signal target is required".to_string(),
        ));
    }
    Ok(target)
}

/// Validate chat text, returning the trimmed form
pub fn validate_chat_text(text: &str) -> ValidationResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::InvalidMessage(
            "Message must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_CHAT_LENGTH {
        return Err(ValidationError::InvalidMessage(format!(
            "Message must be at most {MAX_CHAT_LENGTH} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub fn validate_emoji(emoji: &str) -> ValidationResult<&str> {
    let len = emoji.chars().count();
    if len == 0 || len > MAX_EMOJI_LENGTH {
        return Err(ValidationError::InvalidMessage(
            "Reaction must be a short emoji".to_string(),
        ));
    }
    Ok(emoji)
}

pub fn validate_stream_id(stream_id: &str) -> ValidationResult<&str> {
    if stream_id.is_empty() || stream_id.len() > MAX_STREAM_ID_LENGTH {
        return Err(ValidationError::InvalidSignal(
            "Screen share stream ID is invalid".to_string(),
        ));
    }
    Ok(stream_id)
}

/// Audio levels are normalised to `0.0..=1.0`
pub fn validate_audio_level(level: f64) -> ValidationResult<f64> {
    if !level.is_finite() || !(0.0..=1.0).contains(&level) {
        return Err(ValidationError::InvalidAudioLevel(level));
    }
    Ok(level)
}

/// Validate a poll definition, returning the trimmed question and options
pub fn validate_poll(
    question: &str,
    options: &[String],
    duration_secs: Option<u64>,
) -> ValidationResult<(String, Vec<String>)> {
    let question = question.trim();
    if question.is_empty() || question.chars().count() > MAX_QUESTION_LENGTH {
        return Err(ValidationError::InvalidPoll(format!(
            "Question must be between 1 and {MAX_QUESTION_LENGTH} characters"
        )));
    }

    if options.len() < MIN_POLL_OPTIONS || options.len() > MAX_POLL_OPTIONS {
        return Err(ValidationError::InvalidPoll(format!(
            "A poll needs between {MIN_POLL_OPTIONS} and {MAX_POLL_OPTIONS} options"
        )));
    }

    let mut trimmed = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim();
        if option.is_empty() || option.chars().count() > MAX_OPTION_LENGTH {
            return Err(ValidationError::InvalidPoll(format!(
                "Options must be between 1 and {MAX_OPTION_LENGTH} characters"
            )));
        }
        trimmed.push(option.to_string());
    }

    if let Some(secs) = duration_secs {
        if secs == 0 || secs > MAX_POLL_DURATION_SECS {
            return Err(ValidationError::InvalidPoll(format!(
                "Duration must be between 1 and {MAX_POLL_DURATION_SECS} seconds"
            )));
        }
    }

    Ok((question.to_string(), trimmed))
}

/// Validate shared-file metadata
pub fn validate_file_metadata(
    file_name: &str,
    size: u64,
    url: &str,
    max_size: u64,
) -> ValidationResult<()> {
    let file_name = file_name.trim();
    if file_name.is_empty() || file_name.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(ValidationError::InvalidFile(format!(
            "File name must be between 1 and {MAX_FILE_NAME_LENGTH} characters"
        )));
    }

    if file_name.contains(['/', '\\']) {
        return Err(ValidationError::InvalidFile(
            "File name must not contain path separators".to_string(),
        ));
    }

    if size == 0 || size > max_size {
        return Err(ValidationError::InvalidFile(format!(
            "File size must be between 1 and {max_size} bytes"
        )));
    }

    if !URL_REGEX.is_match(url) {
        return Err(ValidationError::InvalidFile(
            "File URL must be an http(s) URL".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_display_name() {
        assert_eq!(validate_display_name("  Ada  ").unwrap(), "Ada");
        assert!(validate_display_name("   ").is_err());
        assert!(validate_display_name(&"x".repeat(50)).is_ok());
        assert!(validate_display_name(&"x".repeat(51)).is_err());
        // counted in characters, not bytes
        assert!(validate_display_name(&"é".repeat(50)).is_ok());
    }

    #[test]
    fn test_validate_meeting_id() {
        assert!(validate_meeting_id("ABC1").is_ok());
        assert!(validate_meeting_id("team-standup").is_ok());
        assert!(validate_meeting_id("ab").is_err());
        assert!(validate_meeting_id("abc def").is_err());
        assert!(validate_meeting_id("abc<script>").is_err());
    }

    #[test]
    fn test_validate_signal_target() {
        assert!(validate_signal_target("").is_err());
        assert!(validate_signal_target("  ").is_err());
        assert!(validate_signal_target("conn-1").is_ok());
    }

    #[test]
    fn test_validate_audio_level() {
        assert!(validate_audio_level(0.0).is_ok());
        assert!(validate_audio_level(1.0).is_ok());
        assert!(validate_audio_level(1.5).is_err());
        assert!(validate_audio_level(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_poll() {
        let options = vec!["Yes".to_string(), " No ".to_string()];
        let (question, options) = validate_poll(" Lunch? ", &options, Some(60)).unwrap();
        assert_eq!(question, "Lunch?");
        assert_eq!(options, vec!["Yes", "No"]);

        assert!(validate_poll("Lunch?", &["Yes".to_string()], None).is_err());
        assert!(validate_poll("Lunch?", &["Yes".to_string(), " ".to_string()], None).is_err());
        assert!(validate_poll("", &["a".to_string(), "b".to_string()], None).is_err());
        assert!(validate_poll("Q", &["a".to_string(), "b".to_string()], Some(0)).is_err());
    }

    #[test]
    fn test_validate_file_metadata() {
        let url = "https://cdn.example.com/a.pdf";
        assert!(validate_file_metadata("notes.pdf", 10, url, 100).is_ok());
        assert!(validate_file_metadata("notes.pdf", 101, url, 100).is_err());
        assert!(validate_file_metadata("../etc/passwd", 10, "https://x.io/a", 100).is_err());
        assert!(validate_file_metadata("a.txt", 10, "ftp://x.io/a", 100).is_err());
    }
}
