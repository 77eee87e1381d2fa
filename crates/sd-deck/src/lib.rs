//! Storylet deck engine for the Storydeck workspace.
//!
//! Authors declare *storylets*: content units gated by compiled
//! conditions, ranked by priority, and rate limited by redraw
//! policies. A [`Deck`] selects which ones fire against a mutable
//! key/value context. Decks load from JSON/JSONC description documents
//! and support both eager and chunked (cooperative async) reshuffles.

pub mod deck;
pub mod error;
pub mod loader;
pub mod storylet;

pub use deck::{Deck, ReshuffleCallback, StoryletFilter};
pub use error::{DeckError, DeckResult};
pub use loader::{deck_from_json, deck_from_json_str, strip_json_comments};
pub use storylet::{Priority, Redraw, Storylet};

use sd_expr::{SharedContext, Trace};

impl Deck {
    /// Build a deck from a parsed description document; see
    /// [`loader::deck_from_json`].
    pub fn from_description(
        doc: &serde_json::Value,
        context: Option<SharedContext>,
        reshuffle: bool,
        trace: Option<&Trace>,
    ) -> DeckResult<Deck> {
        loader::deck_from_json(doc, context, reshuffle, trace)
    }

    /// Build a deck from JSONC text; see [`loader::deck_from_json_str`].
    pub fn from_description_str(
        text: &str,
        context: Option<SharedContext>,
        reshuffle: bool,
        trace: Option<&Trace>,
    ) -> DeckResult<Deck> {
        loader::deck_from_json_str(text, context, reshuffle, trace)
    }
}
