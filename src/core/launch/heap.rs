use std::fmt;
use std::str::FromStr;

use crate::core::error::{LauncherError, LauncherResult};

/// Validated `-Xmx` value: digits, then `m` or `g`, then an optional `b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSize(String);

impl HeapSize {
    pub fn parse(raw: &str) -> LauncherResult<Self> {
        let invalid = || LauncherError::InvalidHeapSize(raw.to_string());

        let digits = raw
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }

        let (number, unit) = raw.split_at(digits);
        let unit = match unit.to_ascii_lowercase().as_str() {
            "m" | "mb" => 'M',
            "g" | "gb" => 'G',
            _ => return Err(invalid()),
        };
        Ok(Self(format!("{}{}", number, unit)))
    }

    pub fn jvm_flag(&self) -> String {
        format!("-Xmx{}", self.0)
    }
}

impl FromStr for HeapSize {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for HeapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_forms() {
        assert_eq!(HeapSize::parse("512M").unwrap().jvm_flag(), "-Xmx512M");
        assert_eq!(HeapSize::parse("2G").unwrap().jvm_flag(), "-Xmx2G");
        assert_eq!(HeapSize::parse("4096mb").unwrap().jvm_flag(), "-Xmx4096M");
        assert_eq!(HeapSize::parse("8gB").unwrap().to_string(), "8G");
    }

    #[test]
    fn rejected_forms() {
        for raw in ["2", "G2", "2X", "", "2GBB", "-2G", "2 G", " 2G", "2G\n", "\t512m "] {
            assert!(
                matches!(HeapSize::parse(raw), Err(LauncherError::InvalidHeapSize(_))),
                "{raw:?} should be rejected"
            );
        }
    }
}
