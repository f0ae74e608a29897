//! Evidence Extractor - keyword and selector rules over bytecode and source
//!
//! Detection is heuristic: a capability is reported when one of its trigger
//! tokens appears in the contract. Renamed or obfuscated functions are missed
//! and benign code that happens to contain a token is flagged.
//!
//! Two views are matched:
//! - text view: lower-cased printable bytes (bytecode) or comment-stripped
//!   lower-cased source. Keywords are matched here.
//! - hex view: lower-case hex of the bytecode. Selectors are matched here.
//!   Keywords never are, since short words like "fee" are valid hex.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::models::types::{CapabilityKind, Evidence, SourceRecord};
use crate::utils::constants::SELECTOR_MINT;

/// Declared sell tax above this percentage is a honeypot signal
pub const SELL_TAX_HONEYPOT_THRESHOLD: u64 = 25;

pub const FINDING_NO_VERIFIED_SOURCE: &str =
    "Contract source is not verified; analysis is based on bytecode only";
pub const FINDING_RENOUNCE_CAPABLE: &str = "Contract implements ownership renouncing";

lazy_static! {
    /// `sellTax = 30`, `_sellFee = 99`, ... on lower-cased source
    static ref SELL_TAX_RE: Regex =
        Regex::new(r"sell\w*(?:tax|fee)\s*=\s*(\d+)").expect("sell tax regex is valid");
}

/// One way a rule can fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Keyword present in the text view
    Keyword(String),
    /// Every keyword present in the text view
    AllOf(Vec<String>),
    /// 4-byte selector (8 hex chars) present in the bytecode hex view
    Selector(String),
}

impl Trigger {
    pub fn keyword(word: &str) -> Self {
        Self::Keyword(word.to_lowercase())
    }

    pub fn all_of(words: &[&str]) -> Self {
        Self::AllOf(words.iter().map(|w| w.to_lowercase()).collect())
    }

    pub fn selector(selector: &str) -> Self {
        Self::Selector(selector.trim_start_matches("0x").to_lowercase())
    }

    fn matches(&self, text: &str, hex_view: Option<&str>) -> bool {
        match self {
            Self::Keyword(word) => text.contains(word.as_str()),
            Self::AllOf(words) => words.iter().all(|w| text.contains(w.as_str())),
            Self::Selector(sel) => hex_view.is_some_and(|h| h.contains(sel.as_str())),
        }
    }
}

/// Capability rule: fires when any trigger matches
#[derive(Debug, Clone)]
pub struct Rule {
    pub kind: CapabilityKind,
    pub triggers: Vec<Trigger>,
}

impl Rule {
    pub fn new(kind: CapabilityKind, triggers: Vec<Trigger>) -> Self {
        Self { kind, triggers }
    }

    pub fn keywords(kind: CapabilityKind, words: &[&str]) -> Self {
        Self::new(kind, words.iter().map(|w| Trigger::keyword(w)).collect())
    }

    fn matches(&self, text: &str, hex_view: Option<&str>) -> bool {
        self.triggers.iter().any(|t| t.matches(text, hex_view))
    }
}

/// Fixed finding for each capability
pub fn finding_for(kind: CapabilityKind) -> &'static str {
    match kind {
        CapabilityKind::Mint => "Contract contains function to mint additional tokens",
        CapabilityKind::Blacklist => "Contract contains blacklist/blocklist function",
        CapabilityKind::Pause => "Contract can pause trading/transfers",
        CapabilityKind::Freeze => "Contract can freeze accounts or balances",
        CapabilityKind::TaxFee => "Contract applies fees or taxes on transfers",
        CapabilityKind::HoneypotSignal => "Potential honeypot: selling may be restricted",
        CapabilityKind::SelfDestruct => "Contract contains selfdestruct function",
        CapabilityKind::BalanceControl => {
            "Contract contains functions that can modify user balances"
        }
    }
}

/// Rule tables, one per input kind. Evaluated in order.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub bytecode: Vec<Rule>,
    pub source: Vec<Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let honeypot = || {
            let mut triggers: Vec<Trigger> = ["onlybuy", "cannotsell", "disableselling", "preventsell"]
                .iter()
                .map(|w| Trigger::keyword(w))
                .collect();
            triggers.push(Trigger::all_of(&["onlyowner", "sell"]));
            Rule::new(CapabilityKind::HoneypotSignal, triggers)
        };

        let bytecode = vec![
            Rule::new(
                CapabilityKind::Mint,
                vec![Trigger::keyword("mint"), Trigger::selector(SELECTOR_MINT)],
            ),
            Rule::keywords(CapabilityKind::Blacklist, &["blacklist", "blocklist", "banned"]),
            Rule::keywords(CapabilityKind::Pause, &["pause", "paused"]),
            Rule::keywords(CapabilityKind::Freeze, &["freeze", "frozen"]),
            Rule::keywords(CapabilityKind::TaxFee, &["fee", "tax"]),
            honeypot(),
        ];

        let source = vec![
            Rule::keywords(CapabilityKind::Mint, &["mint"]),
            Rule::keywords(CapabilityKind::Blacklist, &["blacklist", "blocklist", "banned"]),
            Rule::keywords(CapabilityKind::Pause, &["pause", "paused"]),
            Rule::keywords(CapabilityKind::Freeze, &["freeze", "frozen"]),
            Rule::keywords(CapabilityKind::TaxFee, &["fee", "tax", "reflection"]),
            honeypot(),
            Rule::keywords(CapabilityKind::SelfDestruct, &["selfdestruct(", "suicide("]),
            Rule::keywords(
                CapabilityKind::BalanceControl,
                &[
                    "function forcetransfer",
                    "function seize",
                    "function confiscate",
                    "function reclaim",
                ],
            ),
        ];

        Self { bytecode, source }
    }
}

impl RuleSet {
    pub fn with_bytecode_rule(mut self, rule: Rule) -> Self {
        self.bytecode.push(rule);
        self
    }
}

/// Turns bytecode and verified source into `Evidence`
#[derive(Debug, Clone, Default)]
pub struct EvidenceExtractor {
    rules: RuleSet,
}

impl EvidenceExtractor {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Evidence from deployed bytecode. Empty code yields empty evidence.
    pub fn extract_from_bytecode(&self, bytecode: &[u8]) -> Evidence {
        let mut evidence = Evidence::new();
        if bytecode.is_empty() {
            return evidence;
        }

        let text = String::from_utf8_lossy(bytecode).to_lowercase();
        let hex_view = hex::encode(bytecode);
        apply_rules(&self.rules.bytecode, &text, Some(&hex_view), &mut evidence);
        debug!(
            bytes = bytecode.len(),
            capabilities = evidence.capabilities.len(),
            "Bytecode scanned"
        );
        evidence
    }

    /// Evidence from source text.
    ///
    /// Unverified input is not scanned; the result carries only the
    /// bytecode-only finding.
    pub fn extract_from_source(&self, source: &str, verified: bool) -> Evidence {
        let mut evidence = Evidence::new();
        if !verified {
            evidence.note(FINDING_NO_VERIFIED_SOURCE);
            return evidence;
        }
        evidence.source_verified = true;

        let text = strip_comments(source).to_lowercase();
        apply_rules(&self.rules.source, &text, None, &mut evidence);

        if !evidence.has(CapabilityKind::HoneypotSignal) {
            if let Some(tax) = max_sell_tax(&text) {
                if tax > SELL_TAX_HONEYPOT_THRESHOLD {
                    evidence.add_capability(
                        CapabilityKind::HoneypotSignal,
                        format!("Potential honeypot: High sell tax ({}%)", tax),
                    );
                }
            }
        }

        if text.contains("function renounceownership") {
            evidence.note(FINDING_RENOUNCE_CAPABLE);
        }
        evidence
    }

    /// Bytecode evidence first, then source evidence (or the bytecode-only
    /// finding when no verified source is available).
    pub fn extract(&self, bytecode: &[u8], source: Option<&SourceRecord>) -> Evidence {
        let from_bytecode = self.extract_from_bytecode(bytecode);
        let from_source = match source {
            Some(record) if record.is_verified => {
                self.extract_from_source(&record.source_text, true)
            }
            _ => {
                let mut bytecode_only = Evidence::new();
                bytecode_only.note(FINDING_NO_VERIFIED_SOURCE);
                bytecode_only
            }
        };
        from_bytecode.merge(from_source)
    }
}

fn apply_rules(rules: &[Rule], text: &str, hex_view: Option<&str>, evidence: &mut Evidence) {
    for rule in rules {
        if rule.matches(text, hex_view) {
            evidence.add_capability(rule.kind, finding_for(rule.kind));
        }
    }
}

/// Highest declared sell tax/fee in lower-cased source
fn max_sell_tax(text: &str) -> Option<u64> {
    SELL_TAX_RE
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse::<u64>().ok()))
        .max()
}

/// Remove `//` and `/* */` comments, leaving string literals intact
pub fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_string: Option<char> = None;

    while let Some(c) = chars.next() {
        if let Some(quote) = in_string {
            out.push(c);
            if c == '\\' {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            } else if c == quote {
                in_string = None;
            }
            continue;
        }

        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for skipped in chars.by_ref() {
                    if prev == '*' && skipped == '/' {
                        break;
                    }
                    prev = skipped;
                }
                out.push(' ');
            }
            ('"', _) | ('\'', _) => {
                in_string = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> EvidenceExtractor {
        EvidenceExtractor::default()
    }

    #[test]
    fn test_bytecode_keywords() {
        let ev = extractor().extract_from_bytecode(b"\x60\x80PAUSED\x00setTaxRate\xff");
        assert!(ev.has(CapabilityKind::Pause));
        assert!(ev.has(CapabilityKind::TaxFee));
        assert!(!ev.has(CapabilityKind::Mint));
        assert_eq!(ev.findings.len(), 2);
    }

    #[test]
    fn test_mint_selector_matches_hex_view() {
        let ev = extractor().extract_from_bytecode(&[0x63, 0x40, 0xc1, 0x0f, 0x19, 0x14]);
        assert!(ev.has(CapabilityKind::Mint));
    }

    #[test]
    fn test_keywords_not_matched_on_hex_view() {
        // hex is "0fee00"
        let ev = extractor().extract_from_bytecode(&[0x0f, 0xee, 0x00]);
        assert!(!ev.has(CapabilityKind::TaxFee));
    }

    #[test]
    fn test_empty_bytecode_yields_nothing() {
        let ev = extractor().extract_from_bytecode(&[]);
        assert!(ev.capabilities.is_empty());
        assert!(ev.findings.is_empty());
    }

    #[test]
    fn test_honeypot_conjunction() {
        let ev = extractor().extract_from_bytecode(b"onlyOwner modifier ... sell()");
        assert!(ev.has(CapabilityKind::HoneypotSignal));

        let ev = extractor().extract_from_bytecode(b"onlyOwner modifier");
        assert!(!ev.has(CapabilityKind::HoneypotSignal));
    }

    #[test]
    fn test_unverified_source_is_not_scanned() {
        let ev = extractor().extract_from_source("function mint() {}", false);
        assert!(ev.capabilities.is_empty());
        assert_eq!(ev.findings, vec![FINDING_NO_VERIFIED_SOURCE.to_string()]);
        assert!(!ev.source_verified);
    }

    #[test]
    fn test_source_ignores_comments() {
        let src = r#"
            // function mint(address to) external
            /* selfdestruct(owner); */
            string constant URL = "https://example.org";
            contract Token { }
        "#;
        let ev = extractor().extract_from_source(src, true);
        assert!(!ev.has(CapabilityKind::Mint));
        assert!(!ev.has(CapabilityKind::SelfDestruct));
        assert!(ev.source_verified);
    }

    #[test]
    fn test_source_only_rules() {
        let src = "function forceTransfer(address a) external onlyOwner { selfdestruct(payable(a)); }";
        let ev = extractor().extract_from_source(src, true);
        assert!(ev.has(CapabilityKind::BalanceControl));
        assert!(ev.has(CapabilityKind::SelfDestruct));
    }

    #[test]
    fn test_high_sell_tax_is_honeypot() {
        let ev = extractor().extract_from_source("uint256 public sellTax = 99;", true);
        assert!(ev.has(CapabilityKind::HoneypotSignal));
        assert!(ev
            .findings
            .contains(&"Potential honeypot: High sell tax (99%)".to_string()));

        let ev = extractor().extract_from_source("uint256 public sellTax = 5;", true);
        assert!(!ev.has(CapabilityKind::HoneypotSignal));
        assert!(ev.has(CapabilityKind::TaxFee));
    }

    #[test]
    fn test_renounce_is_informational() {
        let ev = extractor().extract_from_source("function renounceOwnership() public {}", true);
        assert!(ev.capabilities.is_empty());
        assert_eq!(ev.findings, vec![FINDING_RENOUNCE_CAPABLE.to_string()]);
    }

    #[test]
    fn test_extract_orders_bytecode_before_source() {
        let record = SourceRecord {
            source_text: "function freeze(address a) external {}".to_string(),
            is_verified: true,
            ..Default::default()
        };
        let ev = extractor().extract(b"paused", Some(&record));
        assert_eq!(
            ev.findings,
            vec![
                finding_for(CapabilityKind::Pause).to_string(),
                finding_for(CapabilityKind::Freeze).to_string(),
            ]
        );
        assert!(ev.source_verified);
    }

    #[test]
    fn test_extract_without_verified_source_is_bytecode_only() {
        let unverified = SourceRecord {
            source_text: "function seize(address a) external {}".to_string(),
            is_verified: false,
            ..Default::default()
        };
        for source in [Some(&unverified), None] {
            let ev = extractor().extract(b"paused", source);
            assert!(ev.has(CapabilityKind::Pause));
            assert!(!ev.has(CapabilityKind::BalanceControl));
            assert!(!ev.source_verified);
            assert_eq!(
                ev.findings,
                vec![
                    finding_for(CapabilityKind::Pause).to_string(),
                    FINDING_NO_VERIFIED_SOURCE.to_string(),
                ]
            );
        }
    }

    #[test]
    fn test_custom_rule() {
        let rules = RuleSet::default()
            .with_bytecode_rule(Rule::keywords(CapabilityKind::Blacklist, &["setbots"]));
        let ev = EvidenceExtractor::new(rules).extract_from_bytecode(b"setBots");
        assert!(ev.has(CapabilityKind::Blacklist));
    }

    #[test]
    fn test_monotonic_under_added_keyword() {
        let base = extractor().extract_from_bytecode(b"blacklist");
        let more = extractor().extract_from_bytecode(b"blacklist frozen");
        assert!(base.capabilities.is_subset(&more.capabilities));
    }
}
