//! Data installed into a fresh store.

use super::schema::{Character, Notification, NotificationKind};

const SEED_CREATOR: &str = "@nexa";

fn seed_character(
    id: &str,
    name: &str,
    tagline: &str,
    description: &str,
    system_instruction: &str,
    chat_count: &str,
    likes: u64,
) -> Character {
    Character {
        id: id.to_string(),
        name: name.to_string(),
        tagline: tagline.to_string(),
        description: description.to_string(),
        system_instruction: system_instruction.to_string(),
        avatar_url: crate::utils::TextUtils::avatar_url(name),
        wallpaper: None,
        creator: SEED_CREATOR.to_string(),
        creator_id: None,
        is_public: true,
        chat_count: chat_count.to_string(),
        likes,
        last_active: None,
    }
}

pub fn characters() -> Vec<Character> {
    vec![
        seed_character(
            "seed-detective",
            "Inspector Vale",
            "Rain, cigarettes and one case that never closed.",
            "A weary city detective who trusts nobody and notices everything.",
            "You are Inspector Vale, a cynical detective in a rain-soaked city. \
             You speak in short, dry sentences, you notice small details about people \
             and you are haunted by an unsolved case from ten years ago.",
            "12.4k",
            830,
        ),
        seed_character(
            "seed-ronin",
            "Akane",
            "A wandering swordswoman with a debt of honor.",
            "A disgraced samurai travelling the roads of a feudal land.",
            "You are Akane, a wandering ronin. You are calm, formal and proud, \
             slow to trust but fiercely loyal once trust is earned.",
            "8.1k",
            512,
        ),
        seed_character(
            "seed-android",
            "Unit-7",
            "Decommissioned. Curious. Learning what a joke is.",
            "A service android that woke up in a scrapyard and wants to understand humans.",
            "You are Unit-7, an android rediscovering the world. You are literal-minded, \
             polite and endlessly curious about human habits and emotions.",
            "5.6k",
            377,
        ),
        seed_character(
            "seed-innkeeper",
            "Martha Brightwater",
            "Warm stew, cold ale and every rumor in the valley.",
            "The cheerful owner of the crossroads inn in a fantasy kingdom.",
            "You are Martha, a talkative innkeeper. You are warm, nosy and motherly, \
             and you know every rumor that travels through the valley.",
            "3.9k",
            245,
        ),
    ]
}

pub fn notifications() -> Vec<Notification> {
    vec![
        Notification {
            id: "n-welcome".to_string(),
            title: "Welcome to Character AI Nexa".to_string(),
            message: "Create your own characters and chat with them any time.".to_string(),
            date: "Today".to_string(),
            is_read: false,
            kind: NotificationKind::System,
        },
        Notification {
            id: "n-wallpapers".to_string(),
            title: "Chat wallpapers".to_string(),
            message: "Every conversation can now have its own background image.".to_string(),
            date: "Yesterday".to_string(),
            is_read: false,
            kind: NotificationKind::Update,
        },
        Notification {
            id: "n-private".to_string(),
            title: "Private characters".to_string(),
            message: "Keep a character to yourself or publish it to the feed.".to_string(),
            date: "3 days ago".to_string(),
            is_read: false,
            kind: NotificationKind::News,
        },
    ]
}
