//! Chilean RUT (Rol Único Tributario).

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Rut`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RutError {
    /// Nothing left after stripping separators.
    #[error("rut cannot be empty")]
    Empty,
    /// Body contains something other than digits, or is too long.
    #[error("rut has an invalid format")]
    InvalidFormat,
    /// The verifier digit does not match the body.
    #[error("rut check digit is incorrect")]
    CheckDigit,
}

/// A validated RUT, stored in canonical `12345678-5` form.
///
/// Accepts dotted (`12.345.678-5`), dashed (`12345678-5`) or bare
/// (`123456785`) input; the verifier may be `k` or `K`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rut(String);

impl Rut {
    /// Parse and validate a RUT.
    ///
    /// # Errors
    ///
    /// Returns [`RutError`] if the input is empty, malformed, or fails the
    /// modulo-11 check.
    pub fn parse(input: &str) -> Result<Self, RutError> {
        let cleaned: String = input
            .chars()
            .filter(|c| !matches!(c, '.' | '-' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let Some(verifier) = cleaned.chars().last() else {
            return Err(RutError::Empty);
        };
        let body = cleaned.strip_suffix(verifier).unwrap_or_default();
        if body.is_empty() || body.len() > 8 || !body.chars().all(|c| c.is_ascii_digit()) {
            return Err(RutError::InvalidFormat);
        }

        let body = body.trim_start_matches('0');
        if body.is_empty() {
            return Err(RutError::InvalidFormat);
        }

        if check_digit(body) != verifier {
            return Err(RutError::CheckDigit);
        }

        Ok(Self(format!("{body}-{verifier}")))
    }

    /// Canonical `12345678-5` representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Dotted representation, e.g. `12.345.678-5`.
    #[must_use]
    pub fn formatted(&self) -> String {
        let (body, verifier) = self.0.split_once('-').unwrap_or((&self.0, ""));
        let mut out = String::with_capacity(self.0.len() + 3);
        for (i, c) in body.chars().enumerate() {
            if i > 0 && (body.len() - i) % 3 == 0 {
                out.push('.');
            }
            out.push(c);
        }
        out.push('-');
        out.push_str(verifier);
        out
    }
}

/// Modulo-11 verifier for a digit-only body.
fn check_digit(body: &str) -> char {
    let sum: u32 = body
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip([2, 3, 4, 5, 6, 7].into_iter().cycle())
        .map(|(d, w)| d * w)
        .sum();

    match 11 - (sum % 11) {
        11 => '0',
        10 => 'K',
        n => char::from_digit(n, 10).unwrap_or('0'),
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Rut {
    type Error = RutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Rut> for String {
    fn from(rut: Rut) -> Self {
        rut.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_common_spellings() {
        for input in ["12.345.678-5", "12345678-5", "123456785", " 12345678 - 5 "] {
            assert_eq!(Rut::parse(input).unwrap().as_str(), "12345678-5", "{input}");
        }
    }

    #[test]
    fn test_parse_k_verifier() {
        let rut = Rut::parse("10.000.013-k").unwrap();
        assert_eq!(rut.as_str(), "10000013-K");
    }

    #[test]
    fn test_parse_zero_verifier() {
        assert_eq!(Rut::parse("31-0").unwrap().as_str(), "31-0");
        assert!(Rut::parse("31-1").is_err());
    }

    #[test]
    fn test_parse_strips_leading_zeros() {
        assert_eq!(Rut::parse("07.654.321-6").unwrap().as_str(), "7654321-6");
    }

    #[test]
    fn test_parse_rejects_bad_check_digit() {
        assert_eq!(Rut::parse("12.345.678-9"), Err(RutError::CheckDigit));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Rut::parse(""), Err(RutError::Empty));
        assert_eq!(Rut::parse("--"), Err(RutError::Empty));
        assert_eq!(Rut::parse("12a45678-5"), Err(RutError::InvalidFormat));
        assert_eq!(Rut::parse("5"), Err(RutError::InvalidFormat));
        assert_eq!(Rut::parse("123456789-0"), Err(RutError::InvalidFormat));
    }

    #[test]
    fn test_formatted() {
        let rut = Rut::parse("123456785").unwrap();
        assert_eq!(rut.formatted(), "12.345.678-5");
        let short = Rut::parse("7654321-6").unwrap();
        assert_eq!(short.formatted(), "7.654.321-6");
    }
}
