use core::{fmt, str::FromStr};

use crate::{Error, Result, decode_base32, decode_radix62, encode_base32, encode_radix62};

/// String forms for generated IDs.
///
/// Both encodings are fixed width and use alphabets in ASCII order, so the
/// strings sort the same way as the numbers they encode.
///
/// ```
/// use segflake::IdConverter;
///
/// let converter = IdConverter::prefixed("ord_", IdConverter::Radix62);
/// let encoded = converter.encode(1_000);
/// assert_eq!(encoded, "ord_000000000G8");
/// assert_eq!(converter.decode(&encoded)?, 1_000);
/// # Ok::<_, segflake::Error>(())
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum IdConverter {
    /// `[0-9A-Za-z]`, 11 characters.
    Radix62,
    /// Crockford base32, 13 characters, case-insensitive on decode.
    Base32,
    /// `prefix` followed by `inner`'s encoding.
    Prefixed {
        prefix: String,
        inner: Box<IdConverter>,
    },
}

impl IdConverter {
    pub fn prefixed(prefix: impl Into<String>, inner: Self) -> Self {
        Self::Prefixed {
            prefix: prefix.into(),
            inner: Box::new(inner),
        }
    }

    pub fn encode(&self, id: u64) -> String {
        match self {
            Self::Radix62 => encode_radix62(id),
            Self::Base32 => encode_base32(id),
            Self::Prefixed { prefix, inner } => format!("{prefix}{}", inner.encode(id)),
        }
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidEncoding`] if `encoded` is not something
    /// [`encode`](Self::encode) could have produced.
    pub fn decode(&self, encoded: &str) -> Result<u64> {
        match self {
            Self::Radix62 => decode_radix62(encoded),
            Self::Base32 => decode_base32(encoded),
            Self::Prefixed { prefix, inner } => {
                let rest = encoded
                    .strip_prefix(prefix.as_str())
                    .ok_or_else(|| Error::InvalidEncoding {
                        reason: format!("`{encoded}` does not start with `{prefix}`"),
                    })?;
                inner.decode(rest)
            }
        }
    }
}

impl fmt::Display for IdConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radix62 => f.write_str("radix62"),
            Self::Base32 => f.write_str("base32"),
            Self::Prefixed { prefix, inner } => write!(f, "{prefix}:{inner}"),
        }
    }
}

/// Parses `radix62`, `base32`, or `<prefix>:<encoding>`.
impl FromStr for IdConverter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some((prefix, inner)) = s.rsplit_once(':') {
            return Ok(Self::prefixed(prefix, inner.parse()?));
        }
        match s.trim().to_ascii_lowercase().as_str() {
            "radix62" | "base62" => Ok(Self::Radix62),
            "base32" | "crockford" => Ok(Self::Base32),
            other => Err(Error::invalid_config(format!(
                "unknown id encoding `{other}` (expected radix62, base32 or <prefix>:<encoding>)"
            ))),
        }
    }
}
