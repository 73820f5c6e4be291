//! Keyword mapping of free-form source strings onto fixed vocabularies.

use crate::models::{DeliveryMode, Level};

/// Map a free-form level string onto the fixed level vocabulary.
pub fn map_level(input: &str) -> Level {
    let s = input.to_lowercase();

    const BEGINNER: &[&str] = &[
        "beginner", "intro", "foundation", "basic", "starter", "entry", "no experience",
        "certificate",
    ];
    const INTERMEDIATE: &[&str] = &["intermediate", "diploma", "undergraduate", "bachelor"];
    const ADVANCED: &[&str] = &[
        "advanced", "expert", "master", "postgraduate", "graduate-level", "specialist",
    ];

    if BEGINNER.iter().any(|k| s.contains(k)) {
        Level::Beginner
    } else if ADVANCED.iter().any(|k| s.contains(k)) {
        Level::Advanced
    } else if INTERMEDIATE.iter().any(|k| s.contains(k)) {
        Level::Intermediate
    } else {
        Level::AllLevels
    }
}

/// Map a free-form delivery string onto the fixed delivery vocabulary.
pub fn map_delivery(input: &str) -> DeliveryMode {
    let s = input.to_lowercase();

    if ["hybrid", "blended", "mixed mode"].iter().any(|k| s.contains(k)) {
        DeliveryMode::Hybrid
    } else if ["campus", "in-person", "in person", "on-site", "classroom", "face-to-face"]
        .iter()
        .any(|k| s.contains(k))
    {
        DeliveryMode::InPerson
    } else {
        // "online", "remote", "distance", "self-paced" and anything else.
        DeliveryMode::Online
    }
}

/// Normalize a language name or code to a lowercase English name.
pub fn map_language(input: &str) -> String {
    let s = input.trim().to_lowercase();
    if s.is_empty() {
        return "english".to_string();
    }

    match s.as_str() {
        "en" | "eng" | "english" => "english",
        "es" | "spa" | "spanish" | "español" => "spanish",
        "fr" | "fra" | "french" | "français" => "french",
        "de" | "deu" | "ger" | "german" | "deutsch" => "german",
        "pt" | "por" | "portuguese" => "portuguese",
        "zh" | "zho" | "chinese" | "mandarin" => "chinese",
        "ja" | "jpn" | "japanese" => "japanese",
        "ar" | "ara" | "arabic" => "arabic",
        "hi" | "hin" | "hindi" => "hindi",
        "ru" | "rus" | "russian" => "russian",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_keywords() {
        assert_eq!(map_level("Intro to Programming"), Level::Beginner);
        assert_eq!(map_level("BEGINNER friendly"), Level::Beginner);
        assert_eq!(map_level("Intermediate"), Level::Intermediate);
        assert_eq!(map_level("Advanced machine learning"), Level::Advanced);
        assert_eq!(map_level("MSc (Master of Science)"), Level::Advanced);
        assert_eq!(map_level("Everyone welcome"), Level::AllLevels);
    }

    #[test]
    fn delivery_keywords() {
        assert_eq!(map_delivery("100% online"), DeliveryMode::Online);
        assert_eq!(map_delivery("remote learning"), DeliveryMode::Online);
        assert_eq!(map_delivery("On-campus, full time"), DeliveryMode::InPerson);
        assert_eq!(map_delivery("Blended delivery"), DeliveryMode::Hybrid);
    }

    #[test]
    fn language_codes_and_names() {
        assert_eq!(map_language("en"), "english");
        assert_eq!(map_language("English"), "english");
        assert_eq!(map_language("Español"), "spanish");
        assert_eq!(map_language(""), "english");
        assert_eq!(map_language("Welsh"), "welsh");
    }
}
