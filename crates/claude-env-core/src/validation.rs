//! Validation rules for profile names and environment maps.
//!
//! Every check here is pure: it classifies its input and never mutates it.
//! Failures carry the offending field, the rule that fired, and a
//! human-readable reason so the presentation layer can show them as-is.
//!
//! # Full vs. partial
//!
//! Environment maps are validated in one of two modes, chosen explicitly by
//! the caller:
//!
//! - [`ValidationMode::Full`] requires every key in [`REQUIRED_ENV_VARS`]
//!   (profile creation, re-validation of stored profiles).
//! - [`ValidationMode::Partial`] checks only the keys actually supplied and
//!   never asks for the rest (profile update, where the supplied map is
//!   merged into an existing one).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

/// Endpoint URL the client talks to.
pub const BASE_URL_VAR: &str = "ANTHROPIC_BASE_URL";
/// API key sent with every request.
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";
/// Primary model identifier.
pub const MODEL_VAR: &str = "ANTHROPIC_MODEL";
/// Secondary (fast) model identifier.
pub const FAST_MODEL_VAR: &str = "ANTHROPIC_SMALL_FAST_MODEL";

/// Keys every complete profile must define.
pub const REQUIRED_ENV_VARS: [&str; 4] = [BASE_URL_VAR, API_KEY_VAR, MODEL_VAR, FAST_MODEL_VAR];

pub const PROFILE_NAME_MIN_LEN: usize = 3;
pub const PROFILE_NAME_MAX_LEN: usize = 50;
pub const DESCRIPTION_MAX_LEN: usize = 500;

/// Literal every API key starts with.
pub const API_KEY_PREFIX: &str = "sk-";
/// Minimum API key length, prefix included.
pub const API_KEY_MIN_LEN: usize = 20;

static PROFILE_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

static API_KEY_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

static MODEL_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_/-]+$").unwrap());

static ENV_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Which validation pass to run over an environment map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// All required keys must be present.
    Full,
    /// Only the supplied keys are checked.
    Partial,
}

/// The rule a value failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// A required key is absent from the map.
    MissingKey,
    /// The value is empty.
    Empty,
    /// The value is too short or too long.
    Length,
    /// The value contains characters outside the allowed set.
    Charset,
    /// The value does not start with the mandatory prefix.
    Prefix,
    /// The value is not a parseable URL.
    UrlParse,
    /// The URL scheme is neither `http` nor `https`.
    UrlScheme,
    /// The URL has no host.
    UrlHost,
}

/// A failed validation check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub rule: ValidationRule,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &str, rule: ValidationRule, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            rule,
            reason: reason.into(),
        }
    }
}

/// Check a profile name.
///
/// Names double as lookup keys and display labels, so they are restricted
/// to ASCII letters, digits, `_` and `-`.
pub fn validate_profile_name(name: &str) -> Result<(), ValidationError> {
    const FIELD: &str = "profile name";

    if name.is_empty() {
        return Err(ValidationError::new(
            FIELD,
            ValidationRule::Empty,
            "profile name is required",
        ));
    }

    let len = name.chars().count();
    if !(PROFILE_NAME_MIN_LEN..=PROFILE_NAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::new(
            FIELD,
            ValidationRule::Length,
            format!(
                "must be between {PROFILE_NAME_MIN_LEN} and {PROFILE_NAME_MAX_LEN} characters, got {len}"
            ),
        ));
    }

    if !PROFILE_NAME_RE.is_match(name) {
        return Err(ValidationError::new(
            FIELD,
            ValidationRule::Charset,
            "can only contain letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Check an environment map in the given mode.
///
/// In [`ValidationMode::Full`] the required keys are checked for presence
/// first, in the order of [`REQUIRED_ENV_VARS`]. In both modes every
/// supplied entry is then checked against its per-key format rule.
pub fn validate_environment_vars(
    env: &BTreeMap<String, String>,
    mode: ValidationMode,
) -> Result<(), ValidationError> {
    if mode == ValidationMode::Full {
        if let Some(missing) = REQUIRED_ENV_VARS.iter().find(|k| !env.contains_key(**k)) {
            return Err(ValidationError::new(
                missing,
                ValidationRule::MissingKey,
                format!("required environment variable '{missing}' is missing"),
            ));
        }
    }

    for (key, value) in env {
        validate_env_entry(key, value)?;
    }

    Ok(())
}

/// Check a single environment entry: key shape, non-empty value, and the
/// format rule for well-known keys.
pub fn validate_env_entry(key: &str, value: &str) -> Result<(), ValidationError> {
    if !ENV_KEY_RE.is_match(key) {
        return Err(ValidationError::new(
            key,
            ValidationRule::Charset,
            "environment variable names must be letters, digits, and underscores",
        ));
    }

    if value.is_empty() {
        return Err(ValidationError::new(
            key,
            ValidationRule::Empty,
            format!("environment variable '{key}' cannot be empty"),
        ));
    }

    match key {
        BASE_URL_VAR => validate_base_url(value),
        API_KEY_VAR => validate_api_key(value),
        MODEL_VAR | FAST_MODEL_VAR => validate_model_name(key, value),
        _ => Ok(()),
    }
}

/// Check an endpoint URL: `http` or `https` with a non-empty host.
pub fn validate_base_url(url: &str) -> Result<(), ValidationError> {
    let parsed = Url::parse(url).map_err(|e| {
        ValidationError::new(
            BASE_URL_VAR,
            ValidationRule::UrlParse,
            format!("'{url}' is not a valid URL: {e}"),
        )
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ValidationError::new(
            BASE_URL_VAR,
            ValidationRule::UrlScheme,
            format!("must use http or https, got '{}'", parsed.scheme()),
        ));
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::new(
            BASE_URL_VAR,
            ValidationRule::UrlHost,
            "URL must include a host",
        ));
    }

    Ok(())
}

/// Check an API key's shape. Only the format is checked; the key is never
/// sent anywhere.
pub fn validate_api_key(key: &str) -> Result<(), ValidationError> {
    let Some(body) = key.strip_prefix(API_KEY_PREFIX) else {
        return Err(ValidationError::new(
            API_KEY_VAR,
            ValidationRule::Prefix,
            format!("API key must start with '{API_KEY_PREFIX}'"),
        ));
    };

    if key.len() < API_KEY_MIN_LEN {
        return Err(ValidationError::new(
            API_KEY_VAR,
            ValidationRule::Length,
            format!("API key is too short (minimum {API_KEY_MIN_LEN} characters)"),
        ));
    }

    if !API_KEY_BODY_RE.is_match(body) {
        return Err(ValidationError::new(
            API_KEY_VAR,
            ValidationRule::Charset,
            "API key may only contain letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Check a model identifier such as `claude-3-sonnet` or `org/model-name`.
pub fn validate_model_name(field: &str, model: &str) -> Result<(), ValidationError> {
    if model.is_empty() {
        return Err(ValidationError::new(
            field,
            ValidationRule::Empty,
            "model name is required",
        ));
    }

    if !MODEL_NAME_RE.is_match(model) {
        return Err(ValidationError::new(
            field,
            ValidationRule::Charset,
            format!("invalid model name '{model}'"),
        ));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), ValidationError> {
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(ValidationError::new(
            "description",
            ValidationRule::Length,
            format!("description must be {DESCRIPTION_MAX_LEN} characters or less"),
        ));
    }
    Ok(())
}

/// Mask a secret for display, keeping a short prefix and suffix.
///
/// Short values are masked entirely.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}
