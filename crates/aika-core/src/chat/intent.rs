use crate::session::Endpoint;

/// Normalized outcome of parsing one chat line.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Invitation that names another server: move there and follow the sender.
    RelocateAndFollow {
        endpoint: Endpoint,
        new_target: String,
    },
    Invite {
        new_target: String,
    },
    /// Move to another server without changing who we follow.
    Relocate {
        endpoint: Endpoint,
    },
    Keyword(Keyword),
    Ambient {
        line: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Follow,
    Wait,
    Come,
    Farewell,
    Thanks,
    Help,
    Mine,
    Build,
    Explore,
    Fight,
    Craft,
    Greeting,
}

/// First-match-wins keyword table. Commands come before small talk.
pub const KEYWORD_TABLE: &[(&[&str], Keyword)] = &[
    (&["follow"], Keyword::Follow),
    (&["wait", "stop"], Keyword::Wait),
    (&["come"], Keyword::Come),
    (&["bye", "goodbye"], Keyword::Farewell),
    (&["thank", "thanks", "thx"], Keyword::Thanks),
    (&["help"], Keyword::Help),
    (&["mine", "mining"], Keyword::Mine),
    (&["build", "building"], Keyword::Build),
    (&["explore", "exploring"], Keyword::Explore),
    (&["fight", "mob", "mobs"], Keyword::Fight),
    (&["craft", "crafting"], Keyword::Craft),
    (&["hey", "hi", "hello"], Keyword::Greeting),
];
