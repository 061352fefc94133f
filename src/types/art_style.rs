use serde::{Deserialize, Serialize};
use std::fmt;

/// Visual style of a project, steering image prompts.
///
/// Projects store the [`label`](ArtStyle::label) as free text, so unknown
/// labels must keep working; see [`ArtStyle::guidance_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtStyle {
    #[default]
    JapaneseManga,
    AmericanComics,
    Webtoon,
    Chibi,
    Noir,
}

/// Used for labels outside the catalog.
pub const GENERIC_GUIDANCE: &str = "General-purpose illustration style.";

impl ArtStyle {
    pub const ALL: [ArtStyle; 5] = [
        ArtStyle::JapaneseManga,
        ArtStyle::AmericanComics,
        ArtStyle::Webtoon,
        ArtStyle::Chibi,
        ArtStyle::Noir,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ArtStyle::JapaneseManga => "Japanese manga",
            ArtStyle::AmericanComics => "American comics",
            ArtStyle::Webtoon => "Webtoon",
            ArtStyle::Chibi => "Chibi",
            ArtStyle::Noir => "Noir/Dark",
        }
    }

    pub fn guidance(self) -> &'static str {
        match self {
            ArtStyle::JapaneseManga => {
                "Anime/manga style. Large expressive eyes, fine line art, clear outlines. \
                 Hair drawn in distinct strands."
            }
            ArtStyle::AmericanComics => {
                "American comic style. Bold lines, emphasized musculature, high-contrast \
                 shadows, dynamic poses."
            }
            ArtStyle::Webtoon => {
                "Korean webtoon style. Soft lines, modern semi-realistic faces, natural \
                 flowing hair."
            }
            ArtStyle::Chibi => {
                "Super-deformed chibi style. Two to three heads tall, oversized head, \
                 rounded body, cute simplification."
            }
            ArtStyle::Noir => {
                "Noir/dark style. Muted tones, heavy shadows, sharp lines, mature atmosphere."
            }
        }
    }

    /// Case-insensitive match on the stored label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|style| style.label().eq_ignore_ascii_case(label))
    }

    /// Drawing guidance for a stored label, generic for unknown labels.
    pub fn guidance_for(label: &str) -> &'static str {
        Self::from_label(label).map_or(GENERIC_GUIDANCE, ArtStyle::guidance)
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_case_insensitively() {
        for style in ArtStyle::ALL {
            assert_eq!(ArtStyle::from_label(style.label()), Some(style));
            assert_eq!(
                ArtStyle::from_label(&style.label().to_uppercase()),
                Some(style)
            );
        }
    }

    #[test]
    fn unknown_label_gets_generic_guidance() {
        assert_eq!(ArtStyle::from_label("watercolor"), None);
        assert_eq!(ArtStyle::guidance_for("watercolor"), GENERIC_GUIDANCE);
        assert_eq!(
            ArtStyle::guidance_for("Noir/Dark"),
            ArtStyle::Noir.guidance()
        );
    }

    #[test]
    fn default_is_japanese_manga() {
        assert_eq!(ArtStyle::default().to_string(), "Japanese manga");
    }
}
