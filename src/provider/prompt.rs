//! Prompt builder for the AI text provider.
//!
//! Every facet is asked for as a `(system_msg, user_msg)` pair for an
//! OpenAI-compatible `/v1/chat/completions` endpoint.  The model must answer
//! with one JSON object; the expected shape is spelled out per facet so the
//! reply can be deserialised straight into the facet's value type.
//!
//! A model that will not answer is asked to reply `{"refused": "<reason>"}`,
//! which the provider turns into a graceful decline.

use super::types::{Definition, Facet, Word};

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION: &str = "\
You are a Chinese lexicography assistant that prepares flashcards for learners.
Rules:
1. Reply with exactly one JSON object and nothing else: no prose, no code fences.
2. Use Simplified Chinese for Chinese text and English for glosses.
3. Pinyin uses tone marks (xuéxí), never tone numbers.
4. If the input is not a real Chinese word or you cannot answer, reply
   {\"refused\": \"<short reason>\"}.";

// ---------------------------------------------------------------------------
// Per-facet instructions
// ---------------------------------------------------------------------------

const PINYIN_SHAPE: &str = r#"{"pinyin": "xuéxí"}"#;

const DEFINITION_SHAPE: &str =
    r#"{"text": "to study; to learn", "part_of_speech": "verb"}"#;

const DECOMPOSITION_SHAPE: &str =
    r#"{"components": ["⺍", "冖", "子"], "description": "child under a roof, learning"}"#;

const EXAMPLES_SHAPE: &str = r#"{"usages": [{"sentence": "我在学习中文。", "pinyin": "wǒ zài xuéxí zhōngwén.", "translation": "I am studying Chinese.", "breakdown": null}]}"#;

const EXPLANATION_SHAPE: &str =
    r#"{"text": "Etymology and usage notes in two or three sentences."}"#;

/// Builds chat prompts for one facet at a time.
///
/// ```rust
/// use hanzi_cards::provider::{Facet, PromptBuilder, Word};
///
/// let word = Word::new("学习").unwrap();
/// let (system, user) = PromptBuilder::new().build_chat(Facet::Pinyin, &word, None);
/// assert!(system.contains("JSON"));
/// assert!(user.contains("学习"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn system_instruction(&self) -> &'static str {
        SYSTEM_INSTRUCTION
    }

    /// `None` for facets the AI provider does not answer (audio, images).
    fn task(&self, facet: Facet, word: &Word) -> Option<(String, &'static str)> {
        let task = match facet {
            Facet::Pinyin => format!("Give the standard Mandarin pinyin of {word}."),
            Facet::Definition => format!("Give a concise English definition of {word}."),
            Facet::Decomposition => format!(
                "Decompose the written form of {word} into its graphical components \
                 (radicals and phonetic parts), in writing order."
            ),
            Facet::Examples => {
                let mut t = format!(
                    "Give three short example sentences using {word}, with pinyin and English translation."
                );
                if word.is_single_char() {
                    t.push_str(
                        " For each sentence add a \"breakdown\" that glosses every character.",
                    );
                } else {
                    t.push_str(" Set \"breakdown\" to null.");
                }
                t
            }
            Facet::Explanation => format!(
                "Explain the etymology of {word} and how it is used, for an intermediate learner."
            ),
            Facet::Audio | Facet::Images => return None,
        };
        let shape = match facet {
            Facet::Pinyin => PINYIN_SHAPE,
            Facet::Definition => DEFINITION_SHAPE,
            Facet::Decomposition => DECOMPOSITION_SHAPE,
            Facet::Examples => EXAMPLES_SHAPE,
            _ => EXPLANATION_SHAPE,
        };
        Some((task, shape))
    }

    /// Build a **(system_msg, user_msg)** pair.
    ///
    /// `definition` is only used for the examples facet, to pin the sense.
    pub fn build_chat(
        &self,
        facet: Facet,
        word: &Word,
        definition: Option<&Definition>,
    ) -> (String, String) {
        let system_msg = SYSTEM_INSTRUCTION.to_string();

        let mut user_msg = String::with_capacity(512);
        match self.task(facet, word) {
            Some((task, shape)) => {
                user_msg.push_str(&task);
                if let (Facet::Examples, Some(def)) = (facet, definition) {
                    user_msg.push_str(&format!(
                        "\nUse the word in this sense: {}",
                        def.text
                    ));
                }
                user_msg.push_str("\n\nReply with JSON shaped like:\n");
                user_msg.push_str(shape);
            }
            None => {
                user_msg.push_str(&format!("Reply {{\"refused\": \"unsupported facet {facet}\"}}."));
            }
        }

        (system_msg, user_msg)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
