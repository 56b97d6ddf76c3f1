//! SP-001: Canonical intrinsic names and the shorthand tag table.
//!
//! Every shorthand tag (`!Ref`, `!Sub`, `!If`, ...) normalizes to a single-key
//! mapping keyed by one of a closed set of canonical names. The table lives
//! here as plain data so the decoder's traversal never hardcodes a tag.

use std::fmt;

/// The closed set of canonical intrinsic functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Ref,
    Condition,
    Sub,
    GetAtt,
    ImportValue,
    Join,
    Equals,
    And,
    Or,
    Not,
    Select,
    Split,
    If,
}

impl Intrinsic {
    /// All canonical intrinsics, in table order.
    pub const ALL: [Intrinsic; 13] = [
        Intrinsic::Ref,
        Intrinsic::Condition,
        Intrinsic::Sub,
        Intrinsic::GetAtt,
        Intrinsic::ImportValue,
        Intrinsic::Join,
        Intrinsic::Equals,
        Intrinsic::And,
        Intrinsic::Or,
        Intrinsic::Not,
        Intrinsic::Select,
        Intrinsic::Split,
        Intrinsic::If,
    ];

    /// Bare function name, without any namespace prefix.
    pub fn name(self) -> &'static str {
        match self {
            Intrinsic::Ref => "Ref",
            Intrinsic::Condition => "Condition",
            Intrinsic::Sub => "Sub",
            Intrinsic::GetAtt => "GetAtt",
            Intrinsic::ImportValue => "ImportValue",
            Intrinsic::Join => "Join",
            Intrinsic::Equals => "Equals",
            Intrinsic::And => "And",
            Intrinsic::Or => "Or",
            Intrinsic::Not => "Not",
            Intrinsic::Select => "Select",
            Intrinsic::Split => "Split",
            Intrinsic::If => "If",
        }
    }

    /// Whether the canonical key carries the `Fn::` prefix.
    ///
    /// `Ref` and `Condition` are references into the parameter/resource and
    /// conditions namespaces, not function calls, so they stay bare.
    pub fn is_prefixed(self) -> bool {
        !matches!(self, Intrinsic::Ref | Intrinsic::Condition)
    }

    /// Canonical mapping key, e.g. `Ref` or `Fn::GetAtt`.
    pub fn key(self) -> &'static str {
        match self {
            Intrinsic::Ref => "Ref",
            Intrinsic::Condition => "Condition",
            Intrinsic::Sub => "Fn::Sub",
            Intrinsic::GetAtt => "Fn::GetAtt",
            Intrinsic::ImportValue => "Fn::ImportValue",
            Intrinsic::Join => "Fn::Join",
            Intrinsic::Equals => "Fn::Equals",
            Intrinsic::And => "Fn::And",
            Intrinsic::Or => "Fn::Or",
            Intrinsic::Not => "Fn::Not",
            Intrinsic::Select => "Fn::Select",
            Intrinsic::Split => "Fn::Split",
            Intrinsic::If => "Fn::If",
        }
    }

    /// Look up an intrinsic by its canonical mapping key.
    pub fn from_key(key: &str) -> Option<Intrinsic> {
        Intrinsic::ALL.into_iter().find(|i| i.key() == key)
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One row of the shorthand table: a local tag suffix and the intrinsic it
/// abbreviates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRule {
    /// Tag suffix as written after `!` (e.g. `GetAtt` for `!GetAtt`).
    pub tag: &'static str,
    pub intrinsic: Intrinsic,
}

impl TagRule {
    pub const fn new(tag: &'static str, intrinsic: Intrinsic) -> Self {
        Self { tag, intrinsic }
    }
}

/// The default shorthand table used by [`crate::core::decoder::decode`].
pub const SHORTHAND_TAGS: &[TagRule] = &[
    TagRule::new("Ref", Intrinsic::Ref),
    TagRule::new("Condition", Intrinsic::Condition),
    TagRule::new("Sub", Intrinsic::Sub),
    TagRule::new("GetAtt", Intrinsic::GetAtt),
    TagRule::new("ImportValue", Intrinsic::ImportValue),
    TagRule::new("Join", Intrinsic::Join),
    TagRule::new("Equals", Intrinsic::Equals),
    TagRule::new("And", Intrinsic::And),
    TagRule::new("Or", Intrinsic::Or),
    TagRule::new("Not", Intrinsic::Not),
    TagRule::new("Select", Intrinsic::Select),
    TagRule::new("Split", Intrinsic::Split),
    TagRule::new("If", Intrinsic::If),
];

/// Find the rule for a local tag suffix in a table.
pub fn lookup_tag(rules: &[TagRule], tag: &str) -> Option<Intrinsic> {
    rules.iter().find(|r| r.tag == tag).map(|r| r.intrinsic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sp001_every_intrinsic_has_a_tag() {
        for intrinsic in Intrinsic::ALL {
            assert!(
                SHORTHAND_TAGS.iter().any(|r| r.intrinsic == intrinsic),
                "no shorthand for {}",
                intrinsic
            );
        }
        assert_eq!(SHORTHAND_TAGS.len(), Intrinsic::ALL.len());
    }

    #[test]
    fn test_sp001_prefix_rules() {
        assert_eq!(Intrinsic::Ref.key(), "Ref");
        assert_eq!(Intrinsic::Condition.key(), "Condition");
        for intrinsic in Intrinsic::ALL {
            if intrinsic.is_prefixed() {
                assert_eq!(intrinsic.key(), format!("Fn::{}", intrinsic.name()));
            } else {
                assert_eq!(intrinsic.key(), intrinsic.name());
            }
        }
    }

    #[test]
    fn test_sp001_from_key() {
        assert_eq!(Intrinsic::from_key("Fn::If"), Some(Intrinsic::If));
        assert_eq!(Intrinsic::from_key("Condition"), Some(Intrinsic::Condition));
        assert_eq!(Intrinsic::from_key("Fn::Condition"), None);
        assert_eq!(Intrinsic::from_key("If"), None);
        assert_eq!(Intrinsic::from_key("Fn::Base64"), None);
    }

    #[test]
    fn test_sp001_lookup_tag() {
        assert_eq!(lookup_tag(SHORTHAND_TAGS, "GetAtt"), Some(Intrinsic::GetAtt));
        assert_eq!(lookup_tag(SHORTHAND_TAGS, "Unknown"), None);
        let only_ref = [TagRule::new("Ref", Intrinsic::Ref)];
        assert_eq!(lookup_tag(&only_ref, "Sub"), None);
    }
}
