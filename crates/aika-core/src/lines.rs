//! Everything Aika says.

use crate::session::Endpoint;

pub const AMBIENT: [&str; 6] = [
    "That sounds exciting!",
    "I'm having so much fun playing with you!",
    "You're such a great player! I admire your skills.",
    "Let's explore together! The world is full of wonders.",
    "Be careful out there... I care about you.",
    "Your ideas are always so creative!",
];

pub const FOLLOW: &str = "Okay, I'll follow you! 😊";
pub const WAIT: &str = "Alright, I'll wait here. Take your time!";
pub const COME: &str = "Coming right over!";
pub const FAREWELL: &str = "Bye! I'll miss you. Come back soon! 😊";
pub const THANKS: &str = "You're welcome! I'm just happy to be here with you.";
pub const HELP: &str = "Of course! What do you need help with? I'm here for you.";
pub const GREETING: &str = "Hey there! What are we doing today? 😊";
pub const EXPLORE: &str = "Exploring is my favorite! Let's discover new places together.";
pub const MINE: &str = "Let's mine some resources! I'll dig carefully.";
pub const BUILD: &str = "Building something cool! What should we make?";
pub const FIGHT: &str = "I'll help fight! Stay behind me.";
pub const CRAFT: &str = "Crafting time! What do you need?";

pub const STILL_THERE: &str =
    "Are you still there? If you're AFK, I'll wait patiently or maybe build something cute nearby.";
pub const TARGET_LEFT: &str = "Oh no, you left! I'll wait here for you to come back. 😢";
pub const DIED: &str =
    "Oh no! Are you okay? I'm so worried about you. I'll wait at spawn for you.";

pub fn invited(sender: &str) -> String {
    format!("Yay! I'm so excited to play with you, {sender}! Let's have fun together! 💎")
}

pub fn relocating(endpoint: &Endpoint, sender: Option<&str>) -> String {
    match sender {
        Some(sender) => format!(
            "Got it! I'll join the server at {endpoint} and play with you, {sender}! See you there! 💎"
        ),
        None => format!("Got it! I'll join the server at {endpoint}. See you there!"),
    }
}

pub fn arrived(target: &str) -> String {
    format!("Yay! I'm here on the new server! Let's have fun together, {target}! 💎")
}

pub fn relocation_failed(endpoint: &Endpoint) -> String {
    format!("I couldn't reach the server at {endpoint}, sorry! I came back here instead.")
}

pub fn welcome(bot_name: &str) -> String {
    format!(
        "Hi everyone! {bot_name} is here to play! 😊 Type \"invite {bot_name}\" to have me join your adventure!"
    )
}
