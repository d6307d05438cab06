//! Storefront request context.

use serde::Serialize;
use sha2::{Digest, Sha256};

pub const DEFAULT_SALES_CHANNEL: &str = "storefront";
pub const DEFAULT_LANGUAGE: &str = "en-GB";
pub const DEFAULT_CURRENCY: &str = "EUR";
pub const DEFAULT_CUSTOMER_GROUP: &str = "default";

/// Everything that can change how a storefront page renders for a visitor:
/// channel, language, currency, customer group and active rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorefrontContext {
    pub sales_channel_id: String,
    pub language_id: String,
    pub currency_id: String,
    pub customer_group_id: String,
    pub rule_ids: Vec<String>,
}

impl Default for StorefrontContext {
    fn default() -> Self {
        Self {
            sales_channel_id: DEFAULT_SALES_CHANNEL.to_string(),
            language_id: DEFAULT_LANGUAGE.to_string(),
            currency_id: DEFAULT_CURRENCY.to_string(),
            customer_group_id: DEFAULT_CUSTOMER_GROUP.to_string(),
            rule_ids: Vec::new(),
        }
    }
}

impl StorefrontContext {
    /// Stable hex digest identifying this context. Rule order is irrelevant.
    pub fn context_hash(&self) -> String {
        let mut rule_ids = self.rule_ids.clone();
        rule_ids.sort();
        rule_ids.dedup();

        let mut hasher = Sha256::new();
        for part in [
            self.sales_channel_id.as_str(),
            self.language_id.as_str(),
            self.currency_id.as_str(),
            self.customer_group_id.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        for rule in &rule_ids {
            hasher.update(rule.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_ignores_rule_order() {
        let a = StorefrontContext {
            rule_ids: vec!["r1".to_string(), "r2".to_string()],
            ..StorefrontContext::default()
        };
        let b = StorefrontContext {
            rule_ids: vec!["r2".to_string(), "r1".to_string(), "r1".to_string()],
            ..StorefrontContext::default()
        };
        assert_eq!(a.context_hash(), b.context_hash());
        assert_eq!(a.context_hash(), a.clone().context_hash());
    }

    #[test]
    fn hash_changes_with_any_field() {
        let base = StorefrontContext::default();
        let variants = [
            StorefrontContext {
                sales_channel_id: "b2b".to_string(),
                ..base.clone()
            },
            StorefrontContext {
                language_id: "de-DE".to_string(),
                ..base.clone()
            },
            StorefrontContext {
                currency_id: "USD".to_string(),
                ..base.clone()
            },
            StorefrontContext {
                customer_group_id: "wholesale".to_string(),
                ..base.clone()
            },
            StorefrontContext {
                rule_ids: vec!["vip".to_string()],
                ..base.clone()
            },
        ];
        for variant in variants {
            assert_ne!(variant.context_hash(), base.context_hash());
        }
    }

    #[test]
    fn separators_prevent_field_shifting() {
        let a = StorefrontContext {
            sales_channel_id: "ab".to_string(),
            language_id: "c".to_string(),
            ..StorefrontContext::default()
        };
        let b = StorefrontContext {
            sales_channel_id: "a".to_string(),
            language_id: "bc".to_string(),
            ..StorefrontContext::default()
        };
        assert_ne!(a.context_hash(), b.context_hash());
    }
}
