//! Environment-variable readers shared by the Texos binaries.
//!
//! Each binary builds its own config struct from these; the error type and
//! the secret policy are the same everywhere.

use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Fragments that mark a value as copied from a sample `.env`.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

impl ConfigError {
    fn invalid(key: &str, reason: impl Display) -> Self {
        Self::InvalidEnvVar(key.to_owned(), reason.to_string())
    }
}

/// Read `key`, failing if it is unset.
///
/// # Errors
///
/// [`ConfigError::MissingEnvVar`] when unset.
pub fn required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Read `key`; empty values count as unset.
#[must_use]
pub fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse `key`, or fall back to `default` when it is unset.
///
/// # Errors
///
/// [`ConfigError::InvalidEnvVar`] when set but unparseable.
pub fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    optional(key).map_or(Ok(default), |raw| {
        raw.trim().parse().map_err(|e| ConfigError::invalid(key, e))
    })
}

/// An absolute URL with any trailing slash removed.
///
/// # Errors
///
/// Missing or not a valid URL.
pub fn url(key: &str) -> Result<String, ConfigError> {
    url_or(key, None)
}

/// Like [`url`], with a default used when `key` is unset.
///
/// # Errors
///
/// Missing without a default, or not a valid URL.
pub fn url_or(key: &str, default: Option<&str>) -> Result<String, ConfigError> {
    let value = match (optional(key), default) {
        (Some(value), _) => value,
        (None, Some(default)) => default.to_owned(),
        (None, None) => return Err(ConfigError::MissingEnvVar(key.to_owned())),
    };
    url::Url::parse(&value).map_err(|e| ConfigError::invalid(key, e))?;
    Ok(value.trim_end_matches('/').to_owned())
}

/// Database URL from `primary_key`, else the generic `DATABASE_URL` that a
/// Fly.io postgres attach sets.
///
/// # Errors
///
/// Neither variable is set.
pub fn database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    optional(primary_key)
        .or_else(|| optional("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_owned()))
}

/// A Sentry-style sample rate in `0.0..=1.0`.
///
/// # Errors
///
/// Unparseable or out of range.
pub fn sample_rate(key: &str, default: f32) -> Result<f32, ConfigError> {
    let rate = parse_or(key, default)?;
    if (0.0..=1.0).contains(&rate) {
        Ok(rate)
    } else {
        Err(ConfigError::invalid(key, "must be between 0.0 and 1.0"))
    }
}

/// A required secret that passes [`check_secret`].
///
/// # Errors
///
/// Missing or too weak.
pub fn secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = required(key)?;
    check_secret(&value, key)?;
    Ok(SecretString::from(value))
}

/// Reject short, placeholder-looking or low-entropy secrets.
///
/// # Errors
///
/// [`ConfigError::InsecureSecret`] naming the failed rule.
pub fn check_secret(value: &str, key: &str) -> Result<(), ConfigError> {
    let insecure = |reason: String| Err(ConfigError::InsecureSecret(key.to_owned(), reason));

    if value.len() < MIN_SECRET_LENGTH {
        return insecure(format!(
            "must be at least {MIN_SECRET_LENGTH} characters (got {})",
            value.len()
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return insecure(format!("appears to be a placeholder (contains '{pattern}')"));
    }

    let entropy = entropy_bits_per_char(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return insecure(format!(
            "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
        ));
    }

    Ok(())
}

/// Shannon entropy of the character distribution.
fn entropy_bits_per_char(s: &str) -> f64 {
    let mut counts: HashMap<char, u32> = HashMap::new();
    let mut total = 0_u32;
    for c in s.chars() {
        *counts.entry(c).or_default() += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    let total = f64::from(total);
    counts
        .values()
        .map(|&n| {
            let p = f64::from(n) / total;
            -p * p.log2()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entropy_of_degenerate_strings() {
        assert!(entropy_bits_per_char("").abs() < f64::EPSILON);
        assert!(entropy_bits_per_char("aaaaaaa").abs() < f64::EPSILON);
        assert!((entropy_bits_per_char("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_check_secret_rules() {
        let weak = [
            "sk_test_9fX2q",
            "your-paystack-key-goes-here-0123456789",
            "changeme-changeme-changeme-0123456789",
            "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
        ];
        for value in weak {
            assert!(
                matches!(check_secret(value, "KEY"), Err(ConfigError::InsecureSecret(..))),
                "{value} should be refused"
            );
        }
        assert!(check_secret("sk_test_4f9a1c7e2b8d0e6f3a5c9b1d7e2f4a8c", "KEY").is_ok());
    }

    #[test]
    fn test_unset_values_fall_back() {
        let key = "TEXOS_ENV_TEST_SURELY_UNSET";
        assert!(optional(key).is_none());
        assert_eq!(parse_or(key, 3001_u16).ok(), Some(3001));
        assert_eq!(
            url_or(key, Some("https://api.paystack.co/")).ok().as_deref(),
            Some("https://api.paystack.co")
        );
        assert!(matches!(url(key), Err(ConfigError::MissingEnvVar(_))));
        assert!(matches!(secret(key), Err(ConfigError::MissingEnvVar(_))));
    }
}
