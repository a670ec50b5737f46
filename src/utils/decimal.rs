//! Serde helpers for `BigDecimal` amounts that travel as JSON numbers,
//! JSON strings or XML text.

use bigdecimal::BigDecimal;
use serde::de::{self, MapAccess, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use std::str::FromStr;

pub fn serialize<S>(value: &BigDecimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(value)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<BigDecimal, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DecimalVisitor)
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = BigDecimal;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal number or a string containing one")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        BigDecimal::from_str(v.trim()).map_err(|e| E::custom(format!("invalid decimal {v:?}: {e}")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(BigDecimal::from(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // Parse the shortest round-trip text, not the binary value.
        self.visit_str(&v.to_string())
    }

    // quick-xml hands element content to `deserialize_any` as a map with a `$text` key.
    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut text = None;
        while let Some((key, value)) = map.next_entry::<String, String>()? {
            if key == "$text" || key == "$value" {
                text = Some(value);
            }
        }

        match text {
            Some(text) => self.visit_str(&text),
            None => Err(de::Error::custom("missing decimal text content")),
        }
    }
}
