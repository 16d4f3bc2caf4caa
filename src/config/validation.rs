use super::models::Config;
use crate::humanize::HumanDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Duration must be positive: {field}")]
    ZeroDuration { field: String },

    #[error("Extractor binary must not be empty")]
    EmptyExtractorBinary,

    #[error("Invalid audio format '{format}', expected a short alphanumeric extension")]
    InvalidAudioFormat { format: String },

    #[error("Allowed host entries must not be empty")]
    EmptyAllowedHost,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_extractor(config)?;
    validate_durations(config)?;
    Ok(())
}

fn validate_extractor(config: &Config) -> Result<(), ValidationError> {
    let extractor = &config.extractor;

    if extractor.binary.trim().is_empty() {
        return Err(ValidationError::EmptyExtractorBinary);
    }

    // The format doubles as the primary file extension
    let format = &extractor.audio_format;
    if format.is_empty() || format.len() > 8 || !format.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidAudioFormat {
            format: format.clone(),
        });
    }

    if extractor.allowed_hosts.iter().any(|host| host.trim().is_empty()) {
        return Err(ValidationError::EmptyAllowedHost);
    }

    Ok(())
}

fn validate_durations(config: &Config) -> Result<(), ValidationError> {
    let durations: [(&str, HumanDuration); 5] = [
        ("cover.timeout", config.cover.timeout),
        ("retention.max_age", config.retention.max_age),
        ("retention.sweep_interval", config.retention.sweep_interval),
        ("retention.job_ttl", config.retention.job_ttl),
        ("download.wait_budget", config.download.wait_budget),
    ];

    for (field, value) in durations {
        if value.is_zero() {
            return Err(ValidationError::ZeroDuration {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_rejects_zero_duration() {
        let mut config = Config::default();
        config.retention.sweep_interval = HumanDuration::from_secs(0);

        let err = validate(&config).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::ZeroDuration { ref field } if field == "retention.sweep_interval"
        ));
    }

    #[test]
    fn test_rejects_path_like_audio_format() {
        let mut config = Config::default();
        config.extractor.audio_format = "../mp3".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidAudioFormat { .. })
        ));
    }

    #[test]
    fn test_rejects_empty_binary() {
        let mut config = Config::default();
        config.extractor.binary = "  ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyExtractorBinary)
        ));
    }

    #[test]
    fn test_rejects_blank_allowed_host() {
        let mut config = Config::default();
        config.extractor.allowed_hosts.push(String::new());

        assert!(matches!(validate(&config), Err(ValidationError::EmptyAllowedHost)));
    }
}
