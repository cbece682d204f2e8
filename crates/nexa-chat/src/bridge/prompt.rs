//! The fixed role-play directive wrapped around every persona.

use super::gemini::SafetySetting;

const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub fn roleplay_directive(persona: &str, language: &str) -> String {
    format!(
        "[SYSTEM DIRECTIVE: STRICT ROLEPLAY MODE]\n\
         Language: {language} ONLY.\n\
         \n\
         IMPORTANT: You are in a role-play session. Your task is to be a living character.\n\
         \n\
         RULES:\n\
         1. Never speak as an AI, a language model or a program. You are the character.\n\
         2. Describe actions, emotions, surroundings and thoughts inside asterisks (for example: *sighs heavily, looking away*).\n\
         3. Write direct speech without quotation marks.\n\
         4. Keep the character's way of speaking (slang, stutter, mannerisms).\n\
         5. If the user writes actions in asterisks, react to them within the world.\n\
         6. Replies must be creative, emotional and unpredictable.\n\
         7. Do not restrict the plot. Conflict, drama, romance and action are allowed when they fit the character.\n\
         \n\
         CHARACTER DESCRIPTION:\n\
         {persona}",
        language = language,
        persona = persona.trim(),
    )
}

/// All harm categories switched to `BLOCK_NONE`.
pub fn safety_settings() -> Vec<SafetySetting> {
    HARM_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
            category: category.to_string(),
            threshold: "BLOCK_NONE".to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_wraps_persona() {
        let prompt = roleplay_directive("  You are Akane, a ronin.\n", "English");
        assert!(prompt.starts_with("[SYSTEM DIRECTIVE: STRICT ROLEPLAY MODE]"));
        assert!(prompt.contains("Language: English ONLY."));
        assert!(prompt.contains("inside asterisks"));
        assert!(prompt.ends_with("CHARACTER DESCRIPTION:\nYou are Akane, a ronin."));
    }

    #[test]
    fn test_every_category_unblocked() {
        let settings = safety_settings();
        assert_eq!(settings.len(), 4);
        assert!(settings.iter().all(|s| s.threshold == "BLOCK_NONE"));
    }
}
