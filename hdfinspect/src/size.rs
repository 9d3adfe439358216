// SPDX-License-Identifier: MIT

use serde::{Deserialize, Deserializer};

/// Byte count written as a plain integer or with a K, M or G suffix.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Bytes(pub u64);

impl<'de> Deserialize<'de> for Bytes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct BytesVisitor;

        impl serde::de::Visitor<'_> for BytesVisitor {
            type Value = Bytes;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("a byte count like 512, '4K', '64M' or '1G'")
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Bytes(value))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(value)
                    .map(Bytes)
                    .map_err(|_| E::custom(format!("Negative size {value}")))
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                parse_bytes(value).map(Bytes).map_err(|e| {
                    E::custom(format!("Invalid size format '{value}' ({e}). Use K, M or G suffix."))
                })
            }
        }

        deserializer.deserialize_any(BytesVisitor)
    }
}

impl std::fmt::Display for Bytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        const UNITS: [(u64, &str); 3] = [(1 << 30, "G"), (1 << 20, "M"), (1 << 10, "K")];
        for (unit, suffix) in UNITS {
            if self.0 >= unit && self.0 % unit == 0 {
                return write!(f, "{}{suffix}", self.0 / unit);
            }
        }
        write!(f, "{}", self.0)
    }
}

pub fn parse_bytes(size: &str) -> anyhow::Result<u64> {
    let lower = size.trim().to_lowercase();
    let (num, shift) = if let Some(num) = lower.strip_suffix('k') {
        (num, 10)
    } else if let Some(num) = lower.strip_suffix('m') {
        (num, 20)
    } else if let Some(num) = lower.strip_suffix('g') {
        (num, 30)
    } else {
        (lower.as_str(), 0)
    };
    let n = num.trim().parse::<u64>()?;
    n.checked_mul(1 << shift)
        .ok_or_else(|| anyhow::anyhow!("size '{size}' overflows"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_suffixes() {
        assert_eq!(parse_bytes("512").unwrap(), 512);
        assert_eq!(parse_bytes("4K").unwrap(), 4096);
        assert_eq!(parse_bytes(" 64m ").unwrap(), 64 << 20);
        assert_eq!(parse_bytes("1G").unwrap(), 1 << 30);
        assert!(parse_bytes("12T").is_err());
        assert!(parse_bytes("99999999999G").is_err());
    }

    #[test]
    fn test_display_picks_largest_unit() {
        assert_eq!(Bytes(2048).to_string(), "2K");
        assert_eq!(Bytes(3 << 20).to_string(), "3M");
        assert_eq!(Bytes(1000).to_string(), "1000");
    }
}
