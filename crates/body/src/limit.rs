//! Byte limits given as integers or human readable size strings.
//!
//! Decoder builders accept anything convertible into a [`SizeLimit`], so both
//! `.limit(16 * 1024)` and `.limit("16kb")` work. Size strings use binary
//! units (`1kb` = 1024 bytes) and allow a decimal fraction, e.g. `"1.5mb"`.

use std::fmt;
use std::str::FromStr;

/// A resolved byte ceiling for one read operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeLimit(u64);

impl SizeLimit {
    pub const fn bytes(self) -> u64 {
        self.0
    }
}

impl From<u64> for SizeLimit {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<u32> for SizeLimit {
    fn from(bytes: u32) -> Self {
        Self(u64::from(bytes))
    }
}

impl From<usize> for SizeLimit {
    fn from(bytes: usize) -> Self {
        Self(bytes as u64)
    }
}

/// Converts a size string at decoder construction time.
///
/// # Panics
///
/// Panics when the string is not a valid size, since a bad limit is a
/// programmer error that must fail before any traffic is served.
impl From<&str> for SizeLimit {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(limit) => limit,
            Err(e) => panic!("invalid size limit {s:?}: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeLimitError {
    input: String,
}

impl fmt::Display for SizeLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expected a byte count like \"100kb\", got {:?}", self.input)
    }
}

impl std::error::Error for SizeLimitError {}

impl FromStr for SizeLimit {
    type Err = SizeLimitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || SizeLimitError { input: s.to_string() };

        let unit_start = trimmed.find(|c: char| c.is_ascii_alphabetic()).unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(unit_start);
        let number = number.trim();
        if number.is_empty() {
            return Err(err());
        }

        let value: f64 = number.parse().map_err(|_| err())?;
        if !value.is_finite() || value < 0.0 {
            return Err(err());
        }

        let factor: u64 = match unit.to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "kb" => 1 << 10,
            "mb" => 1 << 20,
            "gb" => 1 << 30,
            "tb" => 1 << 40,
            "pb" => 1 << 50,
            _ => return Err(err()),
        };

        Ok(Self((value * factor as f64).floor() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bytes() {
        assert_eq!("1024".parse::<SizeLimit>().unwrap().bytes(), 1024);
        assert_eq!("0".parse::<SizeLimit>().unwrap().bytes(), 0);
        assert_eq!("512b".parse::<SizeLimit>().unwrap().bytes(), 512);
    }

    #[test]
    fn binary_units() {
        assert_eq!("100kb".parse::<SizeLimit>().unwrap().bytes(), 102_400);
        assert_eq!("1mb".parse::<SizeLimit>().unwrap().bytes(), 1 << 20);
        assert_eq!("2GB".parse::<SizeLimit>().unwrap().bytes(), 2 << 30);
    }

    #[test]
    fn fractional_sizes() {
        assert_eq!("1.5kb".parse::<SizeLimit>().unwrap().bytes(), 1536);
        assert_eq!("0.5mb".parse::<SizeLimit>().unwrap().bytes(), 512 * 1024);
    }

    #[test]
    fn whitespace_and_case() {
        assert_eq!(" 10 KB ".parse::<SizeLimit>().unwrap().bytes(), 10_240);
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<SizeLimit>().is_err());
        assert!("kb".parse::<SizeLimit>().is_err());
        assert!("10xyz".parse::<SizeLimit>().is_err());
        assert!("-1kb".parse::<SizeLimit>().is_err());
    }

    #[test]
    #[should_panic(expected = "invalid size limit")]
    fn from_str_panics_on_garbage() {
        let _limit = SizeLimit::from("not-a-size");
    }

    #[test]
    fn from_integers() {
        assert_eq!(SizeLimit::from(4096u64).bytes(), 4096);
        assert_eq!(SizeLimit::from(4096usize).bytes(), 4096);
    }
}
