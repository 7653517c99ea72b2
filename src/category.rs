//! Canonical categories, label normalization and the topic catalog.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indicator color for [`Category::Error`], the catch-all for failed classifications.
pub const DEFAULT_INDICATOR_COLOR: &str = "#95a5a6";

/// Topic preference keys, in display order.
pub const TOPIC_KEYS: &[&str] = &[
    "technology",
    "ai-ml",
    "science",
    "business",
    "startups",
    "crypto",
    "politics",
    "world-news",
    "health",
    "education",
    "art-design",
    "gaming",
    "food",
    "travel",
    "entertainment",
];

/// The closed set of labels a post can end up with after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Technology,
    #[serde(rename = "AI/ML")]
    AiMl,
    Science,
    Business,
    Startups,
    Crypto,
    Politics,
    #[serde(rename = "World News")]
    WorldNews,
    Health,
    Education,
    #[serde(rename = "Art/Design")]
    ArtDesign,
    Gaming,
    Food,
    Travel,
    Entertainment,
    /// Classification failed. Filtered like entertainment, rendered distinctly.
    Error,
}

/// Loose labels accepted from classifier backends.
const SYNONYMS: &[(&str, Category)] = &[
    ("technology", Category::Technology),
    ("tech", Category::Technology),
    ("ai", Category::AiMl),
    ("ai/ml", Category::AiMl),
    ("artificial intelligence", Category::AiMl),
    ("machine learning", Category::AiMl),
    ("science", Category::Science),
    ("business", Category::Business),
    ("finance", Category::Business),
    ("startups", Category::Startups),
    ("startup", Category::Startups),
    ("crypto", Category::Crypto),
    ("cryptocurrency", Category::Crypto),
    ("web3", Category::Crypto),
    ("blockchain", Category::Crypto),
    ("politics", Category::Politics),
    ("political", Category::Politics),
    ("news", Category::WorldNews),
    ("world news", Category::WorldNews),
    ("health", Category::Health),
    ("healthcare", Category::Health),
    ("wellness", Category::Health),
    ("education", Category::Education),
    ("learning", Category::Education),
    ("art", Category::ArtDesign),
    ("design", Category::ArtDesign),
    ("art/design", Category::ArtDesign),
    ("gaming", Category::Gaming),
    ("games", Category::Gaming),
    ("food", Category::Food),
    ("cooking", Category::Food),
    ("travel", Category::Travel),
    ("entertainment", Category::Entertainment),
    ("meme", Category::Entertainment),
    ("joke", Category::Entertainment),
    ("error", Category::Error),
];

impl Category {
    /// Every category, `Error` last.
    #[must_use]
    pub fn all() -> &'static [Category] {
        &[
            Category::Technology,
            Category::AiMl,
            Category::Science,
            Category::Business,
            Category::Startups,
            Category::Crypto,
            Category::Politics,
            Category::WorldNews,
            Category::Health,
            Category::Education,
            Category::ArtDesign,
            Category::Gaming,
            Category::Food,
            Category::Travel,
            Category::Entertainment,
            Category::Error,
        ]
    }

    /// Map a free-form label to a category.
    ///
    /// Case-insensitive and whitespace-trimmed. Anything outside the synonym
    /// table is treated as noise and lands in `Entertainment`.
    pub fn normalize(raw: &str) -> Category {
        let key = raw.trim().to_lowercase();
        SYNONYMS
            .iter()
            .find(|(label, _)| *label == key)
            .map(|(_, category)| *category)
            .unwrap_or(Category::Entertainment)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Category::Technology => "Technology",
            Category::AiMl => "AI/ML",
            Category::Science => "Science",
            Category::Business => "Business",
            Category::Startups => "Startups",
            Category::Crypto => "Crypto",
            Category::Politics => "Politics",
            Category::WorldNews => "World News",
            Category::Health => "Health",
            Category::Education => "Education",
            Category::ArtDesign => "Art/Design",
            Category::Gaming => "Gaming",
            Category::Food => "Food",
            Category::Travel => "Travel",
            Category::Entertainment => "Entertainment",
            Category::Error => "Error",
        }
    }

    /// Topic preference key this category is filtered under.
    #[must_use]
    pub fn topic_key(&self) -> &'static str {
        match self {
            Category::Technology => "technology",
            Category::AiMl => "ai-ml",
            Category::Science => "science",
            Category::Business => "business",
            Category::Startups => "startups",
            Category::Crypto => "crypto",
            Category::Politics => "politics",
            Category::WorldNews => "world-news",
            Category::Health => "health",
            Category::Education => "education",
            Category::ArtDesign => "art-design",
            Category::Gaming => "gaming",
            Category::Food => "food",
            Category::Travel => "travel",
            Category::Entertainment | Category::Error => "entertainment",
        }
    }

    /// Background color of the category indicator badge.
    #[must_use]
    pub fn indicator_color(&self) -> &'static str {
        match self {
            Category::Technology => "#00a8fc",
            Category::AiMl => "#7b61ff",
            Category::Science => "#00b894",
            Category::Business => "#f39c12",
            Category::Startups => "#e74c3c",
            Category::Crypto => "#2ecc71",
            Category::Politics => "#e67e22",
            Category::WorldNews => "#3498db",
            Category::Health => "#27ae60",
            Category::Education => "#9b59b6",
            Category::ArtDesign => "#fd79a8",
            Category::Gaming => "#6c5ce7",
            Category::Food => "#fdcb6e",
            Category::Travel => "#00cec9",
            Category::Entertainment => "#d63031",
            Category::Error => DEFAULT_INDICATOR_COLOR,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
