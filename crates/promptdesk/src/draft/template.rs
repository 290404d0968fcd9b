//! Fixed-template rendering of structured draft fields.
//!
//! The assisted mode does no inference: it concatenates the structured
//! fields into a fixed paragraph layout. Blocks are joined with a blank
//! line; the forbidden-patterns block is dropped when empty.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DeskError;

/// Heading of the forbidden patterns block.
pub const FORBIDDEN_HEADING: &str = "Padrões proibidos:";
/// Heading of the refinement block. Appears at most once.
pub const REFINEMENT_HEADING: &str = "Instruções adicionais:";
/// Last line of every generated prompt.
pub const CLOSING_LINE: &str = "Siga estas diretrizes em todas as suas interações.";

/// Structured fields the assistant template is rendered from.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftFields {
    /// Agent persona name, e.g. "Clara".
    pub name: String,
    /// Function or role, e.g. "assistente de vendas".
    pub role: String,
    pub audience: String,
    pub objective: String,
    pub tone: String,
    /// Free text listing what the agent must avoid.
    pub forbidden: String,
}

impl DraftFields {
    /// True when no field has any non-whitespace content.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Render the base template.
pub fn render(fields: &DraftFields) -> String {
    let mut blocks = vec![
        format!("Você é {}, {}.", fields.name, fields.role),
        format!("Público-alvo: {}", fields.audience),
        format!("Objetivo principal: {}", fields.objective),
        format!("Tom de voz: {}", fields.tone),
    ];
    if !fields.forbidden.is_empty() {
        blocks.push(format!("{FORBIDDEN_HEADING}\n{}", fields.forbidden));
    }
    blocks.push(CLOSING_LINE.to_string());
    blocks.join("\n\n")
}

/// Render the base template followed by one additional-instructions block.
pub fn render_refined(fields: &DraftFields, refinement: &str) -> String {
    format!("{}\n\n{REFINEMENT_HEADING}\n{refinement}", render(fields))
}

// ── Tone ───────────────────────────────────────────────────────────

/// Suggested tones of voice. The draft's tone field stays free text; this
/// catalog feeds pickers and help output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Amigavel,
    Formal,
    Tecnico,
    Educado,
    Institucional,
    Neutro,
    Engracado,
}

impl Tone {
    pub const ALL: [Tone; 7] = [
        Tone::Amigavel,
        Tone::Formal,
        Tone::Tecnico,
        Tone::Educado,
        Tone::Institucional,
        Tone::Neutro,
        Tone::Engracado,
    ];

    /// ASCII slug accepted on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Amigavel => "amigavel",
            Self::Formal => "formal",
            Self::Tecnico => "tecnico",
            Self::Educado => "educado",
            Self::Institucional => "institucional",
            Self::Neutro => "neutro",
            Self::Engracado => "engracado",
        }
    }

    /// Text written into the template.
    pub fn label(self) -> &'static str {
        match self {
            Self::Amigavel => "amigável",
            Self::Formal => "formal",
            Self::Tecnico => "técnico",
            Self::Educado => "educado",
            Self::Institucional => "institucional",
            Self::Neutro => "neutro",
            Self::Engracado => "engraçado",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tone {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|t| t.slug() == needle || t.label() == needle)
            .ok_or_else(|| DeskError::Invalid(format!("unknown tone '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clara() -> DraftFields {
        DraftFields {
            name: "Clara".into(),
            role: "assistente de vendas".into(),
            audience: "clientes de e-commerce".into(),
            objective: "fechar vendas".into(),
            tone: "amigável".into(),
            forbidden: "gírias".into(),
        }
    }

    #[test]
    fn renders_every_section_in_order() {
        let text = render(&clara());
        assert!(text.starts_with("Você é Clara, assistente de vendas."));
        let positions: Vec<usize> = [
            "Público-alvo: clientes de e-commerce",
            "Objetivo principal: fechar vendas",
            "Tom de voz: amigável",
            "Padrões proibidos:\ngírias",
            CLOSING_LINE,
        ]
        .iter()
        .map(|needle| text.find(needle).expect(needle))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn empty_forbidden_omits_the_block_entirely() {
        let fields = DraftFields {
            forbidden: String::new(),
            ..clara()
        };
        let text = render(&fields);
        assert!(!text.contains(FORBIDDEN_HEADING));
        assert!(text.contains("Tom de voz: amigável\n\nSiga estas diretrizes"));
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn refined_render_appends_one_block() {
        let text = render_refined(&clara(), "Ofereça frete grátis.");
        assert!(text.ends_with("Instruções adicionais:\nOfereça frete grátis."));
        assert_eq!(text.matches(REFINEMENT_HEADING).count(), 1);
    }

    #[test]
    fn tone_parses_slug_or_label() {
        assert_eq!("amigavel".parse::<Tone>().unwrap(), Tone::Amigavel);
        assert_eq!("Técnico".parse::<Tone>().unwrap(), Tone::Tecnico);
        assert!("sarcástico".parse::<Tone>().is_err());
    }
}
