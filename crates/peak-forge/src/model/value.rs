use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A real number that remembers how many decimal digits its source token carried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecimalValue {
    pub value: f64,
    pub decimals: u32,
}

impl DecimalValue {
    pub fn new(value: f64, decimals: u32) -> Self {
        Self { value, decimals }
    }

    /// Builds a value from a float, inferring the digits from its shortest representation.
    pub fn from_f64(value: f64) -> Self {
        Self {
            value,
            decimals: decimals_of(&value.to_string()),
        }
    }

    /// Rounds to the stored precision.
    pub fn rounded(&self) -> f64 {
        round_to(self.value, self.decimals)
    }
}

/// Counts effective decimal digits of a numeric token, ignoring any exponent part.
pub fn decimals_of(token: &str) -> u32 {
    let mantissa = token
        .trim()
        .split(|c| c == 'e' || c == 'E')
        .next()
        .unwrap_or("");
    match mantissa.split_once('.') {
        Some((_, frac)) => frac.chars().take_while(|c| c.is_ascii_digit()).count() as u32,
        None => 0,
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals.min(15) as i32);
    (value * factor).round() / factor
}

impl FromStr for DecimalValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: f64 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid decimal value: {}", s))?;
        Ok(Self {
            value,
            decimals: decimals_of(s),
        })
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:.*}", self.decimals as usize, self.value)
    }
}

impl Serialize for DecimalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.rounded())
    }
}

impl<'de> Deserialize<'de> for DecimalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(v) => Ok(DecimalValue::from_f64(v)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
