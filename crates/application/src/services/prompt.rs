//! Summary prompt construction

use std::fmt::Write as _;

use domain::{ContentFingerprint, SummaryLength};

use crate::ports::ModelPrompt;

/// System instructions shared by every summary request
pub const SUMMARY_SYSTEM_PROMPT: &str = "You summarize documents for a reader who has not seen them. \
Write plain Markdown. Lead with the single most important point, then cover the remaining key \
points in order of importance. Do not invent facts that are not in the source. Do not mention \
that you are summarizing or refer to these instructions.";

/// Hard cap on tokens requested from a backend when nothing else is configured
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 8_192;

/// Everything a summary prompt depends on
#[derive(Debug, Clone)]
pub struct SummaryPromptInput<'a> {
    pub url: &'a str,
    pub title: Option<&'a str>,
    pub text: &'a str,
    pub length: SummaryLength,
    pub language: Option<&'a str>,
    pub truncated: bool,
}

/// Builds prompts for the summarize flow
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    max_output_tokens: u32,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OUTPUT_TOKENS)
    }
}

impl PromptBuilder {
    pub const fn new(max_output_tokens: u32) -> Self {
        Self { max_output_tokens }
    }

    /// Digest of the template, part of every summary fingerprint
    pub fn template_hash() -> String {
        ContentFingerprint::builder(SUMMARY_SYSTEM_PROMPT)
            .param("template", "summary")
            .finish()
            .as_str()
            .to_string()
    }

    pub fn build(&self, input: &SummaryPromptInput<'_>) -> ModelPrompt {
        let target = input.length.target_chars();
        let mut user = String::with_capacity(input.text.len() + 512);

        let _ = writeln!(user, "Source: {}", input.url);
        if let Some(title) = input.title.filter(|t| !t.trim().is_empty()) {
            let _ = writeln!(user, "Title: {}", title.trim());
        }
        let _ = writeln!(user, "Target length: about {target} characters.");
        match input.language.filter(|l| !l.trim().is_empty()) {
            Some(language) => {
                let _ = writeln!(user, "Write the summary in {}.", language.trim());
            },
            None => {
                let _ = writeln!(user, "Write the summary in the language of the source.");
            },
        }
        if input.truncated {
            let _ = writeln!(
                user,
                "The content below was cut short; summarize only what is present."
            );
        }
        let _ = write!(user, "\n<content>\n{}\n</content>", input.text);

        ModelPrompt {
            system: SUMMARY_SYSTEM_PROMPT.to_string(),
            user,
            max_output_tokens: Some(self.output_tokens_for(target)),
        }
    }

    /// Roughly four characters per token, with headroom for formatting
    fn output_tokens_for(&self, target_chars: u32) -> u32 {
        (target_chars / 4 + 256).min(self.max_output_tokens)
    }
}
