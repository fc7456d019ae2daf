/// One caption/subtitle stream option for a video
#[derive(Debug, Clone)]
pub struct CaptionTrack {
    /// Where the caption payload can be downloaded
    pub url: String,
    /// Human-readable track name, e.g. "English (auto-generated)"
    pub label: String,
    /// BCP-47-ish language code, e.g. "en" or "en-US"
    pub language_code: String,
    /// Explicit kind marker when the page provides one ("asr" = auto)
    pub kind: Option<String>,
}

impl CaptionTrack {
    /// Auto-generated tracks carry an explicit kind marker or an "auto"
    /// label; absence of both means manually authored.
    pub fn is_auto_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr") || self.label.to_lowercase().contains("auto")
    }

    pub fn is_english(&self) -> bool {
        self.language_code.to_lowercase().starts_with("en")
    }
}

/// Pick the track to download: manually authored English, then manually
/// authored in any language, then auto-generated English, then whatever
/// comes first.
pub fn select_best_track(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    tracks
        .iter()
        .find(|t| !t.is_auto_generated() && t.is_english())
        .or_else(|| tracks.iter().find(|t| !t.is_auto_generated()))
        .or_else(|| tracks.iter().find(|t| t.is_auto_generated() && t.is_english()))
        .or_else(|| tracks.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(label: &str, lang: &str, kind: Option<&str>) -> CaptionTrack {
        CaptionTrack {
            url: format!("https://captions.test/{lang}/{label}"),
            label: label.to_string(),
            language_code: lang.to_string(),
            kind: kind.map(str::to_string),
        }
    }

    #[test]
    fn manual_english_beats_everything() {
        let tracks = vec![
            track("English (auto-generated)", "en", Some("asr")),
            track("Deutsch", "de", None),
            track("English", "en", None),
        ];
        assert_eq!(select_best_track(&tracks).unwrap().label, "English");
    }

    #[test]
    fn manual_any_language_beats_auto_english() {
        let tracks = vec![
            track("English (auto-generated)", "en", Some("asr")),
            track("Deutsch", "de", None),
        ];
        assert_eq!(select_best_track(&tracks).unwrap().label, "Deutsch");
    }

    #[test]
    fn auto_english_beats_first_available() {
        let tracks = vec![
            track("Francais (auto-generated)", "fr", Some("asr")),
            track("English (auto-generated)", "en", Some("asr")),
        ];
        assert_eq!(
            select_best_track(&tracks).unwrap().label,
            "English (auto-generated)"
        );
    }

    #[test]
    fn falls_back_to_first_track() {
        let tracks = vec![track("Svenska (auto)", "sv", None)];
        assert_eq!(select_best_track(&tracks).unwrap().label, "Svenska (auto)");
        assert!(select_best_track(&[]).is_none());
    }

    #[test]
    fn auto_detection_uses_kind_or_label() {
        assert!(track("English (auto-generated)", "en", None).is_auto_generated());
        assert!(track("English", "en", Some("asr")).is_auto_generated());
        assert!(!track("English", "en", None).is_auto_generated());
    }
}
