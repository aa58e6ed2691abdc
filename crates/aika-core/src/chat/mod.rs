//! Chat text -> zero or one [`Intent`].
//!
//! Parsing is an ordered table of rules; the first rule that decides wins. Matching is
//! case-insensitive and word based, not NLP.

pub mod address;
pub mod intent;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub use address::parse_endpoint;
pub use intent::{Intent, KEYWORD_TABLE, Keyword};

use crate::lines;

/// Who said it, and who we are currently following.
#[derive(Debug, Clone, Copy)]
pub struct ChatContext<'a> {
    pub sender: &'a str,
    pub target: Option<&'a str>,
}

/// A chat line split two ways: whitespace tokens (addresses survive) and bare words.
#[derive(Debug)]
struct Message {
    tokens: Vec<String>,
    words: Vec<String>,
}

impl Message {
    fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let tokens = lower.split_whitespace().map(str::to_string).collect();
        let words = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        Self { tokens, words }
    }

    fn has_word(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }

    fn has_phrase(&self, phrase: &[String]) -> bool {
        !phrase.is_empty() && self.words.windows(phrase.len()).any(|w| w == phrase)
    }

    fn first_endpoint(&self) -> Option<crate::session::Endpoint> {
        self.tokens.iter().find_map(|t| parse_endpoint(t))
    }

    /// `join <address>` anywhere in the line.
    fn join_endpoint(&self) -> Option<crate::session::Endpoint> {
        self.tokens.windows(2).find_map(|pair| {
            if pair[0].trim_matches(|c: char| !c.is_alphanumeric()) == "join" {
                parse_endpoint(&pair[1])
            } else {
                None
            }
        })
    }
}

enum Decision {
    Intent(Intent),
    /// Stop evaluating: no intent for this line.
    Ignore,
    Next,
}

type Rule = fn(&CommandInterpreter, &ChatContext<'_>, &Message) -> Decision;

/// Evaluated in order; see each rule for its condition.
const RULES: &[(&str, Rule)] = &[
    ("own_message", rule_own_message),
    ("invite_with_address", rule_invite_with_address),
    ("invite", rule_invite),
    ("join_address", rule_join_address),
    ("non_target_sender", rule_non_target_sender),
    ("keyword", rule_keyword),
];

fn rule_own_message(it: &CommandInterpreter, ctx: &ChatContext<'_>, _: &Message) -> Decision {
    if ctx.sender.eq_ignore_ascii_case(&it.self_name) {
        Decision::Ignore
    } else {
        Decision::Next
    }
}

fn rule_invite_with_address(
    it: &CommandInterpreter,
    ctx: &ChatContext<'_>,
    msg: &Message,
) -> Decision {
    if !it.is_invitation(msg) {
        return Decision::Next;
    }
    match msg.first_endpoint() {
        Some(endpoint) => Decision::Intent(Intent::RelocateAndFollow {
            endpoint,
            new_target: ctx.sender.to_string(),
        }),
        None => Decision::Next,
    }
}

fn rule_invite(it: &CommandInterpreter, ctx: &ChatContext<'_>, msg: &Message) -> Decision {
    if it.is_invitation(msg) {
        Decision::Intent(Intent::Invite {
            new_target: ctx.sender.to_string(),
        })
    } else {
        Decision::Next
    }
}

fn rule_join_address(_: &CommandInterpreter, _: &ChatContext<'_>, msg: &Message) -> Decision {
    match msg.join_endpoint() {
        Some(endpoint) => Decision::Intent(Intent::Relocate { endpoint }),
        None => Decision::Next,
    }
}

fn rule_non_target_sender(_: &CommandInterpreter, ctx: &ChatContext<'_>, _: &Message) -> Decision {
    match ctx.target {
        Some(target) if !target.eq_ignore_ascii_case(ctx.sender) => Decision::Ignore,
        _ => Decision::Next,
    }
}

fn rule_keyword(_: &CommandInterpreter, _: &ChatContext<'_>, msg: &Message) -> Decision {
    KEYWORD_TABLE
        .iter()
        .find(|(words, _)| words.iter().any(|w| msg.has_word(w)))
        .map(|(_, kw)| Decision::Intent(Intent::Keyword(*kw)))
        .unwrap_or(Decision::Next)
}

pub struct CommandInterpreter {
    self_name: String,
    invite_phrases: Vec<Vec<String>>,
    ambient_chance: f64,
    rng: StdRng,
}

impl CommandInterpreter {
    pub fn new(self_name: impl Into<String>, ambient_chance: f64) -> Self {
        Self::with_rng(self_name, ambient_chance, StdRng::from_entropy())
    }

    pub fn with_rng(self_name: impl Into<String>, ambient_chance: f64, rng: StdRng) -> Self {
        let self_name = self_name.into();
        let name_words: Vec<String> = self_name
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();

        let phrase = |before: &[&str], after: &[&str]| -> Vec<String> {
            before
                .iter()
                .map(|s| s.to_string())
                .chain(name_words.iter().cloned())
                .chain(after.iter().map(|s| s.to_string()))
                .collect()
        };
        let invite_phrases = vec![
            phrase(&["invite"], &[]),
            phrase(&[], &["join"]),
            phrase(&[], &["come"]),
        ];

        Self {
            self_name,
            invite_phrases,
            // `gen_bool` panics outside [0, 1]; NaN survives `clamp`.
            ambient_chance: if ambient_chance.is_finite() {
                ambient_chance.clamp(0.0, 1.0)
            } else {
                0.0
            },
            rng,
        }
    }

    pub fn self_name(&self) -> &str {
        &self.self_name
    }

    fn is_invitation(&self, msg: &Message) -> bool {
        self.invite_phrases.iter().any(|p| msg.has_phrase(p))
    }

    pub fn parse(&mut self, ctx: ChatContext<'_>, text: &str) -> Option<Intent> {
        let msg = Message::new(text);
        for (name, rule) in RULES {
            match rule(self, &ctx, &msg) {
                Decision::Intent(intent) => {
                    tracing::debug!(rule = name, sender = ctx.sender, ?intent, "chat.intent");
                    return Some(intent);
                }
                Decision::Ignore => return None,
                Decision::Next => {}
            }
        }

        if self.rng.gen_bool(self.ambient_chance) {
            let line = lines::AMBIENT.choose(&mut self.rng).copied()?;
            return Some(Intent::Ambient { line });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DEFAULT_PORT, Endpoint};

    fn quiet() -> CommandInterpreter {
        CommandInterpreter::with_rng("Aika", 0.0, StdRng::seed_from_u64(7))
    }

    fn from<'a>(sender: &'a str, target: Option<&'a str>) -> ChatContext<'a> {
        ChatContext { sender, target }
    }

    #[test]
    fn own_messages_are_ignored() {
        let mut it = quiet();
        assert_eq!(it.parse(from("Aika", None), "invite aika"), None);
        assert_eq!(it.parse(from("aika", None), "follow"), None);
    }

    #[test]
    fn invite_with_address_relocates_and_follows() {
        let mut it = quiet();
        assert_eq!(
            it.parse(
                from("Bob", Some("Alice")),
                "invite aika to 10.0.0.5:19150"
            ),
            Some(Intent::RelocateAndFollow {
                endpoint: Endpoint::new("10.0.0.5", 19150),
                new_target: "Bob".to_string(),
            })
        );
    }

    #[test]
    fn invite_address_without_port_uses_default() {
        let mut it = quiet();
        assert_eq!(
            it.parse(from("Bob", None), "Aika join 192.168.0.9"),
            Some(Intent::RelocateAndFollow {
                endpoint: Endpoint::new("192.168.0.9", DEFAULT_PORT),
                new_target: "Bob".to_string(),
            })
        );
    }

    #[test]
    fn plain_invite_from_anyone() {
        let mut it = quiet();
        for text in ["INVITE AIKA", "hey aika, come!", "aika join us"] {
            assert_eq!(
                it.parse(from("Eve", Some("Bob")), text),
                Some(Intent::Invite {
                    new_target: "Eve".to_string()
                }),
                "{text}"
            );
        }
    }

    #[test]
    fn join_address_relocates_without_target_change() {
        let mut it = quiet();
        assert_eq!(
            it.parse(from("Eve", Some("Bob")), "everyone join 10.1.2.3:19133 now"),
            Some(Intent::Relocate {
                endpoint: Endpoint::new("10.1.2.3", 19133)
            })
        );
    }

    #[test]
    fn join_without_address_is_not_relocation() {
        let mut it = quiet();
        assert_eq!(it.parse(from("Bob", None), "join the fun"), None);
    }

    #[test]
    fn non_target_sender_is_ignored() {
        let mut it = CommandInterpreter::with_rng("Aika", 1.0, StdRng::seed_from_u64(1));
        assert_eq!(it.parse(from("Eve", Some("Bob")), "follow me please"), None);
        assert_eq!(it.parse(from("Eve", Some("Bob")), "random words"), None);
    }

    #[test]
    fn target_keywords() {
        let mut it = quiet();
        let cases = [
            ("aika stop", Keyword::Wait),
            ("wait here", Keyword::Wait),
            ("follow me", Keyword::Follow),
            ("come here", Keyword::Come),
            ("goodbye!", Keyword::Farewell),
            ("thanks a lot", Keyword::Thanks),
            ("help me", Keyword::Help),
            ("let's go mining", Keyword::Mine),
            ("build a house", Keyword::Build),
            ("explore the cave", Keyword::Explore),
            ("a mob is here", Keyword::Fight),
            ("craft a pickaxe", Keyword::Craft),
            ("hi", Keyword::Greeting),
        ];
        for (text, kw) in cases {
            assert_eq!(
                it.parse(from("Bob", Some("Bob")), text),
                Some(Intent::Keyword(kw)),
                "{text}"
            );
        }
    }

    #[test]
    fn first_keyword_in_table_order_wins() {
        let mut it = quiet();
        assert_eq!(
            it.parse(from("Bob", None), "hi, stop and help"),
            Some(Intent::Keyword(Keyword::Wait))
        );
    }

    #[test]
    fn keywords_match_whole_words() {
        let mut it = quiet();
        // "this", "welcome" and "determine" must not trigger hi/come/mine.
        assert_eq!(it.parse(from("Bob", None), "this is welcome, determine it"), None);
    }

    #[test]
    fn ambient_fires_only_without_a_match() {
        let mut it = CommandInterpreter::with_rng("Aika", 1.0, StdRng::seed_from_u64(3));
        match it.parse(from("Bob", None), "nice weather") {
            Some(Intent::Ambient { line }) => assert!(lines::AMBIENT.contains(&line)),
            other => panic!("expected ambient, got {other:?}"),
        }
        assert_eq!(
            it.parse(from("Bob", None), "follow"),
            Some(Intent::Keyword(Keyword::Follow))
        );
    }

    #[test]
    fn unusable_ambient_chance_stays_quiet() {
        for chance in [f64::NAN, f64::INFINITY, -1.0] {
            let mut it = CommandInterpreter::with_rng("Aika", chance, StdRng::seed_from_u64(5));
            for _ in 0..50 {
                assert_eq!(it.parse(from("Bob", None), "nice weather"), None);
            }
        }
    }

    #[test]
    fn ambient_rate_is_low() {
        let mut it = CommandInterpreter::with_rng("Aika", 0.2, StdRng::seed_from_u64(42));
        let hits = (0..1000)
            .filter(|_| it.parse(from("Bob", None), "nice weather").is_some())
            .count();
        assert!((120..=280).contains(&hits), "hits={hits}");
    }
}
