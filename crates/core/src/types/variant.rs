//! Chosen product variant attributes.

use serde::{Deserialize, Deserializer, Serialize};

/// The variant attributes a shopper picked for a cart line.
///
/// Two lines for the same product are distinct when their variants differ.
/// Blank attribute values are treated as "not chosen".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variant {
    /// Colour option, e.g. "black".
    #[serde(default, deserialize_with = "blank_as_none")]
    pub color: Option<String>,
    /// Size option, e.g. "M".
    #[serde(default, deserialize_with = "blank_as_none")]
    pub size: Option<String>,
}

impl Variant {
    /// Build a variant, normalising blank values to `None`.
    #[must_use]
    pub fn new(color: Option<&str>, size: Option<&str>) -> Self {
        Self {
            color: normalise(color),
            size: normalise(size),
        }
    }

    /// Human-readable label such as "black / M", or `None` for no options.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        match (&self.color, &self.size) {
            (Some(color), Some(size)) => Some(format!("{color} / {size}")),
            (Some(only), None) | (None, Some(only)) => Some(only.clone()),
            (None, None) => None,
        }
    }
}

fn normalise(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(normalise(value.as_deref()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_values_are_none() {
        assert_eq!(Variant::new(Some("  "), Some("")), Variant::default());
    }

    #[test]
    fn test_label() {
        assert_eq!(
            Variant::new(Some("black"), Some("M")).label().as_deref(),
            Some("black / M")
        );
        assert_eq!(Variant::new(None, Some("L")).label().as_deref(), Some("L"));
        assert_eq!(Variant::default().label(), None);
    }

    #[test]
    fn test_deserialize_normalises() {
        let v: Variant = serde_json::from_str(r#"{"color":" red ","size":""}"#).unwrap();
        assert_eq!(v, Variant::new(Some("red"), None));
        let v: Variant = serde_json::from_str("{}").unwrap();
        assert_eq!(v, Variant::default());
    }
}
