//! Masking of volatile substrings in error messages.
//!
//! Two failures of the same kind rarely produce byte-identical messages: process
//! ids, thread ids, wall-clock times and pointer values change from run to run.
//! The [`Normalizer`] rewrites each of those into a stable placeholder token
//! (`<pid>`, `<memory-address>`, ...) so that the vectorizer sees the shared
//! shape of the message instead of its noise.
//!
//! Rules are tried in order during a single left-to-right scan. At each
//! position the leftmost match wins; when several rules match at the same
//! position the earliest rule wins. Substituted text is never scanned again.
//!
//! Every built-in rule that starts or ends on a word character is anchored
//! with `\b` there, so swapping a match for `<...>` never creates a word
//! boundary next to surviving text. That keeps the output a fixed point even
//! for glued tokens such as `1920x1080`.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// A named class of volatile text and the token that replaces it.
#[derive(Debug, Clone)]
pub struct PlaceholderRule {
    name: String,
    pattern: Regex,
    token: String,
}

impl PlaceholderRule {
    /// Compile a rule. The replacement token is `<name>`.
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|_| Error::InvalidParameter {
            name: "pattern",
            message: "not a valid regular expression",
        })?;
        if pattern.is_match("") {
            return Err(Error::InvalidParameter {
                name: "pattern",
                message: "must not match the empty string",
            });
        }
        Ok(Self {
            name: name.to_string(),
            pattern,
            token: format!("<{name}>"),
        })
    }

    /// Rule name, e.g. `pid`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replacement token, e.g. `<pid>`.
    pub fn token(&self) -> &str {
        &self.token
    }
}

const DEFAULT_PATTERNS: &[(&str, &str)] = &[
    ("pid", r"\bPID [0-9]+ \[0x[0-9a-fA-F]+\]"),
    ("thread-id", r"\bThread: [0-9]+ \[0x[0-9a-fA-F]+\]"),
    (
        "timestamp",
        r"\b\d{1,2}:\d{2}:\d{2}(?:\.\d+)?(?:\s?[APMapm]{2})?\b",
    ),
    ("memory-address", r"\b0[xX][0-9a-fA-F]+(?:`[0-9a-fA-F]+)?\b"),
    ("number", r"\b\d+(?:\.\d+)?\b"),
];

static DEFAULT_RULES: LazyLock<Vec<PlaceholderRule>> = LazyLock::new(|| {
    DEFAULT_PATTERNS
        .iter()
        .map(|(name, pattern)| {
            PlaceholderRule::new(name, pattern).expect("built-in placeholder pattern compiles")
        })
        .collect()
});

/// Ordered set of placeholder rules.
#[derive(Debug, Clone)]
pub struct Normalizer {
    rules: Vec<PlaceholderRule>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            rules: DEFAULT_RULES.clone(),
        }
    }
}

impl Normalizer {
    /// Normalizer with the built-in rules: `pid`, `thread-id`, `timestamp`,
    /// `memory-address`, `number`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer with a custom, ordered rule set.
    ///
    /// Fails if any rule's token would itself be matched by a rule, since the
    /// output would then not be a fixed point.
    pub fn with_rules(rules: Vec<PlaceholderRule>) -> Result<Self> {
        for rule in &rules {
            if rules.iter().any(|r| r.pattern.is_match(&rule.token)) {
                return Err(Error::InvalidParameter {
                    name: "rules",
                    message: "a placeholder token is matched by a rule pattern",
                });
            }
        }
        Ok(Self { rules })
    }

    /// The rules in application order.
    pub fn rules(&self) -> &[PlaceholderRule] {
        &self.rules
    }

    /// Replace every volatile substring of `message` with its placeholder token.
    pub fn normalize(&self, message: &str) -> String {
        let mut out = String::with_capacity(message.len());
        // Next match per rule at or after the cursor; refreshed lazily.
        let mut pending: Vec<Option<(usize, usize)>> = self
            .rules
            .iter()
            .map(|r| r.pattern.find(message).map(|m| (m.start(), m.end())))
            .collect();
        let mut pos = 0;

        loop {
            let mut best: Option<(usize, usize, usize)> = None;
            for (ri, rule) in self.rules.iter().enumerate() {
                if let Some((start, _)) = pending[ri] {
                    if start < pos {
                        pending[ri] = rule
                            .pattern
                            .find_at(message, pos)
                            .map(|m| (m.start(), m.end()));
                    }
                }
                if let Some((start, end)) = pending[ri] {
                    match best {
                        Some((best_start, _, _)) if best_start <= start => {}
                        _ => best = Some((start, end, ri)),
                    }
                }
            }

            let Some((start, end, ri)) = best else {
                break;
            };
            out.push_str(&message[pos..start]);
            out.push_str(&self.rules[ri].token);
            pos = end;
        }

        out.push_str(&message[pos..]);
        out
    }

    /// Normalize raw bytes, failing if they are not UTF-8 text.
    pub fn normalize_bytes(&self, raw: &[u8]) -> Result<String> {
        let text = std::str::from_utf8(raw).map_err(|e| {
            Error::InvalidInput(format!(
                "message is not valid UTF-8 (first bad byte at offset {})",
                e.valid_up_to()
            ))
        })?;
        Ok(self.normalize(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_pid_with_address() {
        let n = Normalizer::new();
        let out = n.normalize("crash in PID 1234 [0x1fa] during teardown");
        assert_eq!(out, "crash in <pid> during teardown");
        assert!(!out.contains("1234"));
    }

    #[test]
    fn masks_thread_and_timestamp() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize("Thread: 77 [0xdead] blocked at 10:15:30.250 PM"),
            "<thread-id> blocked at <timestamp>"
        );
    }

    #[test]
    fn masks_addresses_and_numbers() {
        let n = Normalizer::new();
        assert_eq!(
            n.normalize("NullReferenceException at 0x00ABCDEF"),
            "NullReferenceException at <memory-address>"
        );
        assert_eq!(
            n.normalize("frame 0x00007ff6`1a2b3c4d"),
            "frame <memory-address>"
        );
        assert_eq!(
            n.normalize("Timeout after 30 seconds"),
            "Timeout after <number> seconds"
        );
        assert_eq!(n.normalize("took 4.25 s"), "took <number> s");
    }

    #[test]
    fn earlier_rule_wins_at_same_position() {
        let n = Normalizer::new();
        // Both `timestamp` and `number` match at the first digit.
        assert_eq!(n.normalize("at 9:05:01"), "at <timestamp>");
    }

    #[test]
    fn idempotent() {
        let n = Normalizer::new();
        let inputs = [
            "PID 1 [0x0] Thread: 2 [0xff] 12:00:00 AM 0xABC 42",
            "nothing volatile here",
            "",
            "<pid> <number> already normalized",
        ];
        for input in inputs {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once);
        }
    }

    #[test]
    fn glued_digits_are_not_split() {
        let n = Normalizer::new();
        for input in ["render 1920x1080 failed", "grid 10x10", "5PID 3 [0x1]", "0x1fg"] {
            let once = n.normalize(input);
            assert_eq!(n.normalize(&once), once, "{input}");
        }
        assert_eq!(n.normalize("render 1920x1080 failed"), "render 1920x1080 failed");
        assert_eq!(
            n.normalize("5PID 3 [0x1]"),
            "5PID <number> [<memory-address>]"
        );
        assert_eq!(n.normalize("(0x1f)"), "(<memory-address>)");
    }

    #[test]
    fn non_utf8_bytes_rejected() {
        let n = Normalizer::new();
        let err = n.normalize_bytes(&[0x66, 0x6f, 0xff, 0x6f]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(n.normalize_bytes(b"PID 5 [0x1]").unwrap(), "<pid>");
    }

    #[test]
    fn custom_rules() {
        let rule = PlaceholderRule::new(
            "guid",
            r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        )
        .unwrap();
        let n = Normalizer::with_rules(vec![rule]).unwrap();
        assert_eq!(
            n.normalize("run 3f2504e0-4f89-11d3-9a0c-0305e82c3301 failed"),
            "run <guid> failed"
        );
    }

    #[test]
    fn rejects_self_matching_token() {
        let rule = PlaceholderRule::new("tok", r"<tok>").unwrap();
        assert!(Normalizer::with_rules(vec![rule]).is_err());
    }

    #[test]
    fn rejects_empty_matching_pattern() {
        assert!(PlaceholderRule::new("any", r"\d*").is_err());
        assert!(PlaceholderRule::new("bad", r"(").is_err());
    }
}
