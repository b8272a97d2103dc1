//! Label catalog.
//!
//! Static mapping from label id to display name and the spoken phrases that
//! select it in voice mode. The catalog is read-only once built.

use serde::{Deserialize, Serialize};

pub const DEFAULT_LABEL_ID: &str = "non-aggressive";
pub const DEFAULT_LABEL_NAME: &str = "Conduite non agressive";

/// Represents a label an interval can carry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Label {
    pub fn new(id: &str, display_name: &str, keywords: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LabelCatalog {
    labels: Vec<Label>,
    default_label: Label,
}

impl Default for LabelCatalog {
    fn default() -> Self {
        Self::driving()
    }
}

impl LabelCatalog {
    pub fn new(labels: Vec<Label>, default_label: Label) -> Self {
        Self {
            labels,
            default_label,
        }
    }

    /// The aggressive-driving event set with French voice phrases.
    pub fn driving() -> Self {
        let labels = vec![
            Label::new(
                "braking",
                "Freinage",
                &[
                    "freinage",
                    "frein",
                    "freinage brusque",
                    "freinage agressif",
                    "freinage fort",
                ],
            ),
            Label::new(
                "acceleration",
                "Accélération",
                &[
                    "accélération",
                    "accélération brusque",
                    "accélération agressive",
                ],
            ),
            Label::new(
                "left-turn",
                "Virage serré à gauche",
                &[
                    "virage serré à gauche",
                    "virage serré gauche",
                    "virage gauche",
                    "virage brusque gauche",
                    "virage brusque à gauche",
                    "virage agressif à gauche",
                    "virage agressif gauche",
                ],
            ),
            Label::new(
                "right-turn",
                "Virage serré à droite",
                &[
                    "virage serré à droite",
                    "virage serré droite",
                    "virage droite",
                    "virage brusque droite",
                    "virage brusque à droite",
                    "virage agressif à droite",
                    "virage agressif droite",
                ],
            ),
            Label::new(
                "left-lane",
                "Changement de voie à gauche",
                &[
                    "changement de voie à gauche",
                    "changement de voie gauche",
                    "changement de voix gauche",
                    "changement de voix à gauche",
                    "changement gauche",
                    "changement à gauche",
                ],
            ),
            Label::new(
                "right-lane",
                "Changement de voie à droite",
                &[
                    "changement de voie à droite",
                    "changement de voie droite",
                    "changement de voix droite",
                    "changement de voix à droite",
                    "changement droite",
                    "changement à droite",
                ],
            ),
        ];

        Self::new(labels, Label::new(DEFAULT_LABEL_ID, DEFAULT_LABEL_NAME, &[]))
    }

    pub fn get(&self, id: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.id == id)
    }

    pub fn default_label(&self) -> &Label {
        &self.default_label
    }

    /// First label, in catalog order, with a keyword contained in the transcript.
    pub fn find_by_phrase(&self, transcript: &str) -> Option<&Label> {
        let transcript = transcript.trim().to_lowercase();
        if transcript.is_empty() {
            return None;
        }
        self.labels.iter().find(|label| {
            label
                .keywords
                .iter()
                .any(|keyword| transcript.contains(keyword.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_labels_by_id() {
        let catalog = LabelCatalog::driving();
        assert_eq!(catalog.get("braking").unwrap().display_name, "Freinage");
        assert!(catalog.get("drifting").is_none());
        assert_eq!(catalog.default_label().display_name, DEFAULT_LABEL_NAME);
        assert_eq!(catalog.labels.len(), 6);
    }

    #[test]
    fn phrases_match_case_insensitively_inside_longer_transcripts() {
        let catalog = LabelCatalog::driving();
        let label = catalog.find_by_phrase("  Attention FREINAGE brusque ").unwrap();
        assert_eq!(label.id, "braking");

        let label = catalog.find_by_phrase("changement de voix à droite").unwrap();
        assert_eq!(label.id, "right-lane");
    }

    #[test]
    fn unknown_or_empty_phrases_match_nothing() {
        let catalog = LabelCatalog::driving();
        assert!(catalog.find_by_phrase("bonjour").is_none());
        assert!(catalog.find_by_phrase("   ").is_none());
    }
}
