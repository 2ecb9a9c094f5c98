use crate::content::plain_text;
use crate::model::{Article, SeoMetadata};
use crate::util::{take_words_within, truncate_words};

const TITLE_MAX_WORDS: usize = 10;
const TITLE_SOFT_CAP: usize = 60;
const DESCRIPTION_MAX_WORDS: usize = 20;
const DESCRIPTION_SOFT_CAP: usize = 160;
const KEYPHRASE_TOKENS: usize = 5;

/// Derives search metadata from an article. Pure: no I/O.
///
/// Truncation always happens on word boundaries; the character targets are
/// soft caps enforced by dropping trailing words.
#[derive(Debug, Clone)]
pub struct MetadataDeriver {
    brand: String,
}

impl MetadataDeriver {
    /// `brand` is appended to every short title as `" | {brand}"`.
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into().trim().to_string(),
        }
    }

    pub fn derive(&self, article: &Article) -> SeoMetadata {
        let body_text = plain_text(&article.body_html);

        SeoMetadata {
            short_title: self.short_title(&article.title),
            short_description: truncate_words(&body_text, DESCRIPTION_MAX_WORDS, DESCRIPTION_SOFT_CAP),
            keyphrase: keyphrase(&body_text),
        }
    }

    fn short_title(&self, title: &str) -> String {
        let suffix = if self.brand.is_empty() {
            String::new()
        } else {
            format!(" | {}", self.brand)
        };

        let (kept, _) = take_words_within(title, TITLE_MAX_WORDS, TITLE_SOFT_CAP, &suffix);
        if kept.is_empty() {
            return self.brand.clone();
        }
        kept + &suffix
    }
}

fn keyphrase(text: &str) -> String {
    text.split_whitespace()
        .take(KEYPHRASE_TOKENS)
        .collect::<Vec<_>>()
        .join(", ")
}
