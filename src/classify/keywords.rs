//! Local keyword backend: no network, never fails.

use async_trait::async_trait;

use super::{Classifier, ClassifyError};
use crate::category::Category;

/// Keyword lists per category. Single words match whole tokens; phrases match
/// as a run of tokens.
const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::AiMl,
        &[
            "ai", "llm", "llms", "gpt", "chatgpt", "openai", "anthropic", "claude", "gemini",
            "neural", "transformer", "diffusion", "embeddings", "fine-tuning",
            "machine learning", "deep learning", "artificial intelligence",
        ],
    ),
    (
        Category::Technology,
        &[
            "software", "programming", "developer", "developers", "code", "coding", "linux",
            "rust", "python", "javascript", "typescript", "kubernetes", "cloud", "api", "apple",
            "google", "microsoft", "iphone", "android", "open source",
        ],
    ),
    (
        Category::Science,
        &[
            "science", "research", "physics", "biology", "chemistry", "nasa", "astronomy",
            "telescope", "experiment", "scientists", "climate", "study",
        ],
    ),
    (
        Category::Startups,
        &[
            "startup", "startups", "founder", "founders", "fundraising", "yc", "vc", "pre-seed",
            "seed round", "series a", "bootstrapped", "mvp",
        ],
    ),
    (
        Category::Business,
        &[
            "business", "market", "markets", "stocks", "earnings", "revenue", "economy",
            "investors", "ceo", "profit", "finance", "inflation", "ipo",
        ],
    ),
    (
        Category::Crypto,
        &[
            "crypto", "bitcoin", "btc", "ethereum", "eth", "solana", "web3", "blockchain", "nft",
            "defi", "altcoin", "memecoin",
        ],
    ),
    (
        Category::Politics,
        &[
            "election", "senate", "congress", "president", "policy", "vote", "voters",
            "government", "democrats", "republicans", "parliament", "campaign", "politics",
        ],
    ),
    (
        Category::WorldNews,
        &[
            "breaking", "war", "ceasefire", "minister", "summit", "sanctions", "refugees",
            "earthquake", "world news",
        ],
    ),
    (
        Category::Health,
        &[
            "health", "fitness", "workout", "doctor", "medical", "vaccine", "nutrition",
            "hospital", "therapy", "wellness", "mental health",
        ],
    ),
    (
        Category::Education,
        &[
            "school", "university", "students", "teacher", "course", "tutorial", "lecture",
            "exam", "education", "homework", "curriculum",
        ],
    ),
    (
        Category::ArtDesign,
        &[
            "art", "design", "illustration", "painting", "typography", "figma", "drawing",
            "artist", "sketch", "portfolio",
        ],
    ),
    (
        Category::Gaming,
        &[
            "game", "games", "gaming", "gamer", "playstation", "xbox", "nintendo", "steam",
            "esports", "speedrun",
        ],
    ),
    (
        Category::Food,
        &[
            "recipe", "cooking", "restaurant", "pizza", "coffee", "dinner", "breakfast", "lunch",
            "chef", "delicious", "baking",
        ],
    ),
    (
        Category::Travel,
        &[
            "travel", "flight", "trip", "vacation", "hotel", "airport", "itinerary", "passport",
            "backpacking", "beach",
        ],
    ),
    (
        Category::Entertainment,
        &[
            "movie", "movies", "music", "netflix", "lol", "lmao", "meme", "album", "concert",
            "celebrity", "trailer", "episode",
        ],
    ),
];

/// Scores post text against fixed keyword lists and returns the label of the
/// best-scoring category. No hits, or a tie for the top score, yields
/// `Entertainment`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous core of [`Classifier::classify`].
    pub fn label_for(&self, text: &str) -> &'static str {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Category::Entertainment.label();
        }

        let mut best: Option<(Category, usize)> = None;
        let mut tied = false;
        for (category, keywords) in KEYWORDS {
            let score = keywords.iter().filter(|kw| matches_keyword(&tokens, kw)).count();
            if score == 0 {
                continue;
            }
            match best {
                Some((_, top)) if score < top => {}
                Some((_, top)) if score == top => tied = true,
                _ => {
                    best = Some((*category, score));
                    tied = false;
                }
            }
        }

        match best {
            Some((category, _)) if !tied => category.label(),
            _ => Category::Entertainment.label(),
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keywords"
    }

    async fn classify(&self, text: &str) -> Result<String, ClassifyError> {
        Ok(self.label_for(text).to_string())
    }
}

/// Lower-cased word tokens. `#` and `$` prefixes are dropped so hashtags and
/// cashtags count as words; hyphens stay inside tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '-'))
        .map(|t| t.trim_matches('-'))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn matches_keyword(tokens: &[String], keyword: &str) -> bool {
    let words: Vec<&str> = keyword.split(' ').collect();
    if words.len() == 1 {
        return tokens.iter().any(|t| t == keyword);
    }
    tokens
        .windows(words.len())
        .any(|window| window.iter().zip(&words).all(|(t, w)| t == w))
}
