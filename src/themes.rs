//! Theme bank: the static pool of writing prompts and ranking themes.
//! Pure data provider; selection happens at setup time and the engine only
//! ever sees the chosen strings.

use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

pub const DEFAULT_PROMPTS: &[&str] = &[
    "Something to do before turning 30",
    "Something to try at least once, no matter how scary",
    "A place everyone at this table should visit together",
    "Something you'd regret never having dared",
    "The most ridiculous thing worth doing anyway",
    "Something to do with the person sitting next to you",
    "A skill worth learning even if you never get good at it",
    "Something your 80-year-old self would thank you for",
];

pub const DEFAULT_THEMES: &[&str] = &[
    "Most likely to actually happen",
    "Would make the best story afterwards",
    "Worth doing even if it goes wrong",
    "The group should do this together this year",
    "Which one belongs at the top of the list",
];

pub struct ThemeBank {
    prompts: Vec<String>,
    themes: Vec<String>,
}

impl Default for ThemeBank {
    fn default() -> Self {
        Self {
            prompts: DEFAULT_PROMPTS.iter().map(|s| s.to_string()).collect(),
            themes: DEFAULT_THEMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ThemeBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the built-in writing prompts (e.g. host-curated packs).
    pub fn with_prompts(mut self, prompts: Vec<String>) -> Self {
        if !prompts.is_empty() {
            self.prompts = prompts;
        }
        self
    }

    pub fn with_themes(mut self, themes: Vec<String>) -> Self {
        if !themes.is_empty() {
            self.themes = themes;
        }
        self
    }

    /// Pick one writing prompt per round, without repeats until the pool is
    /// exhausted.
    pub fn pick_prompts<R: Rng>(&self, rounds: usize, rng: &mut R) -> Vec<String> {
        let mut pool = self.prompts.clone();
        pool.shuffle(rng);
        pool.into_iter().cycle().take(rounds).collect()
    }

    pub fn pick_theme<R: Rng>(&self, rng: &mut R) -> String {
        self.themes
            .choose(rng)
            .cloned()
            .unwrap_or_default()
    }
}
