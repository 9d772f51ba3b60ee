// =============================================================================
// registry.rs — WHO WE ASK, AND HOW MUCH WE PRETEND TO BORROW
// =============================================================================
//
// The source registry is a JSON file keyed by bank short name:
//
//   {
//     "akbank": {
//       "url_credit": "https://www.hangikredi.com/kredi/ihtiyac-kredisi/akbank/ihtiyac-kredisi?",
//       "amount_range_credit": [10000, 50000, 100000]
//     }
//   }
//
// File order is sweep order. serde_json would happily keep the last of two
// identical keys, so the map is walked by hand to catch duplicates.
// =============================================================================

use std::fmt;
use std::path::Path;

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use tracing::info;

use crate::error::{RateError, RateResult};
use crate::models::SourceConfig;

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(alias = "loan_url_template")]
    url_credit: String,
    #[serde(alias = "amount_tiers")]
    amount_range_credit: Vec<u64>,
}

/// Ordered entries exactly as they appear in the file, duplicates included.
struct RawRegistry(Vec<(String, RawSource)>);

impl<'de> Deserialize<'de> for RawRegistry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawRegistry;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of bank short names to source definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, RawSource>()? {
                    entries.push((key, value));
                }
                Ok(RawRegistry(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// The validated, ordered set of banks for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    /// Read and validate the registry file.
    pub fn load(path: impl AsRef<Path>) -> RateResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            RateError::Config(format!("cannot read source registry {}: {e}", path.display()))
        })?;
        let registry = Self::from_json(&text)?;
        info!(
            path = %path.display(),
            banks = registry.len(),
            "Source registry loaded"
        );
        Ok(registry)
    }

    pub fn from_json(text: &str) -> RateResult<Self> {
        let raw: RawRegistry = serde_json::from_str(text)
            .map_err(|e| RateError::Config(format!("malformed source registry: {e}")))?;
        Self::from_entries(raw.0)
    }

    fn from_entries(entries: Vec<(String, RawSource)>) -> RateResult<Self> {
        let sources = entries
            .into_iter()
            .map(|(short_name, raw)| SourceConfig {
                short_name: short_name.trim().to_string(),
                loan_url_template: raw.url_credit,
                amount_tiers: raw.amount_range_credit,
            })
            .collect();
        Self::from_sources(sources)
    }

    /// Validate already-built sources. Same rules as the file loader.
    pub fn from_sources(sources: Vec<SourceConfig>) -> RateResult<Self> {
        for (idx, source) in sources.iter().enumerate() {
            let short_name = &source.short_name;
            if short_name.trim().is_empty() {
                return Err(RateError::Config("empty bank short name".into()));
            }
            if sources[..idx].iter().any(|s| &s.short_name == short_name) {
                return Err(RateError::Config(format!("duplicate bank short name {short_name:?}")));
            }
            if source.loan_url_template.trim().is_empty() {
                return Err(RateError::Config(format!("{short_name}: empty loan URL")));
            }
            if source.amount_tiers.is_empty() {
                return Err(RateError::Config(format!("{short_name}: no amount tiers")));
            }
            if source.amount_tiers.contains(&0) {
                return Err(RateError::Config(format!("{short_name}: amount tiers must be positive")));
            }
        }

        Ok(Self { sources })
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter()
    }

    pub fn get(&self, short_name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.short_name == short_name)
    }

    pub fn contains(&self, short_name: &str) -> bool {
        self.get(short_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl TryFrom<Vec<SourceConfig>> for SourceRegistry {
    type Error = RateError;

    fn try_from(sources: Vec<SourceConfig>) -> RateResult<Self> {
        Self::from_sources(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_BANKS: &str = r#"{
        "ziraat": { "url_credit": "https://example.test/ziraat?", "amount_range_credit": [10000, 50000] },
        "akbank": { "url_credit": "https://example.test/akbank?", "amount_range_credit": [100000] }
    }"#;

    #[test]
    fn test_keeps_file_order() {
        let registry = SourceRegistry::from_json(TWO_BANKS).unwrap();
        let names: Vec<_> = registry.iter().map(|s| s.short_name.as_str()).collect();
        assert_eq!(names, vec!["ziraat", "akbank"]);
        assert_eq!(registry.get("akbank").unwrap().amount_tiers, vec![100_000]);
    }

    #[test]
    fn test_duplicate_short_name_is_rejected() {
        let json = r#"{
            "akbank": { "url_credit": "https://a?", "amount_range_credit": [1] },
            "akbank": { "url_credit": "https://b?", "amount_range_credit": [2] }
        }"#;
        let err = SourceRegistry::from_json(json).unwrap_err();
        assert!(matches!(err, RateError::Config(msg) if msg.contains("duplicate")));
    }

    #[test]
    fn test_empty_short_name_is_rejected() {
        let json = r#"{ " ": { "url_credit": "https://a?", "amount_range_credit": [1] } }"#;
        assert!(matches!(SourceRegistry::from_json(json), Err(RateError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        assert!(matches!(SourceRegistry::from_json("[1, 2]"), Err(RateError::Config(_))));
        assert!(matches!(
            SourceRegistry::from_json(r#"{"akbank": {"url_credit": "x"}}"#),
            Err(RateError::Config(_))
        ));
    }

    #[test]
    fn test_zero_tier_is_rejected() {
        let json = r#"{ "akbank": { "url_credit": "https://a?", "amount_range_credit": [0] } }"#;
        assert!(matches!(SourceRegistry::from_json(json), Err(RateError::Config(_))));
    }

    #[test]
    fn test_built_sources_go_through_the_same_checks() {
        let bank = |name: &str, tiers: Vec<u64>| SourceConfig {
            short_name: name.into(),
            loan_url_template: "https://a?".into(),
            amount_tiers: tiers,
        };
        assert!(matches!(
            SourceRegistry::from_sources(vec![bank("akbank", vec![0])]),
            Err(RateError::Config(_))
        ));
        assert!(matches!(
            SourceRegistry::try_from(vec![bank("akbank", vec![1]), bank("akbank", vec![2])]),
            Err(RateError::Config(_))
        ));
        let ok = SourceRegistry::try_from(vec![bank("teb", vec![10_000])]).unwrap();
        assert_eq!(ok.len(), 1);
    }

    #[test]
    fn test_missing_file_is_a_config_error() {
        let err = SourceRegistry::load("/definitely/not/here/sources.json").unwrap_err();
        assert!(matches!(err, RateError::Config(_)));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TWO_BANKS.as_bytes()).unwrap();
        let registry = SourceRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("ziraat"));
        assert!(!registry.contains("garanti"));
    }
}
