//! Loading decks from JSON/JSONC description documents.
//!
//! A description is a tree of *packets*: objects carrying any of
//! `context`, `defaults`, and `storylets`. Context entries initialize
//! the deck's context, defaults merge later-wins and flow down the
//! subtree, and storylet lists hold either leaf storylets or nested
//! packets.

use serde::Deserialize;
use serde_json::{Map, Value as Json};

use sd_expr::{Assignment, SharedContext, Trace, Value};

use crate::deck::Deck;
use crate::error::{DeckError, DeckResult};
use crate::storylet::{Redraw, Storylet};

/// Remove `// …` and `/* … */` comments, leaving string literals
/// intact. Line breaks are preserved so serde_json error positions
/// stay meaningful.
pub fn strip_json_comments(text: &str) -> String {
    enum State {
        Normal,
        InString,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Normal;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '"' => {
                    state = State::InString;
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                _ => out.push(c),
            },
            State::InString => {
                out.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '"' => state = State::Normal,
                    _ => {}
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
        }
    }

    out
}

/// Leaf storylet description, deserialized after defaults merge.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryletDesc {
    id: String,
    #[serde(default)]
    redraw: Option<RedrawDesc>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    priority: Option<Json>,
    #[serde(default)]
    content: Option<Json>,
    #[serde(default)]
    update_on_played: Option<Map<String, Json>>,
    #[serde(default)]
    update_on_drawn: Option<Map<String, Json>>,
}

/// `"always"`, `"never"`, or a non-negative draw count (0 ≡ always).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RedrawDesc {
    Keyword(String),
    Count(i64),
}

impl RedrawDesc {
    fn into_redraw(self) -> DeckResult<Redraw> {
        match self {
            RedrawDesc::Keyword(word) => match word.as_str() {
                "always" => Ok(Redraw::Always),
                "never" => Ok(Redraw::Never),
                _ => Err(DeckError::InvalidRedraw(word)),
            },
            RedrawDesc::Count(0) => Ok(Redraw::Always),
            RedrawDesc::Count(n) => u32::try_from(n)
                .map(Redraw::After)
                .map_err(|_| DeckError::InvalidRedraw(n.to_string())),
        }
    }
}

/// Attach a `priority` field: a fixed integer rank or an expression
/// string; anything else is rejected with its own error kind.
fn set_priority_from_json(storylet: &mut Storylet, value: &Json) -> DeckResult<()> {
    match value {
        Json::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| DeckError::InvalidPriority(n.to_string()))?;
            storylet.set_priority(n.trunc() as i64);
            Ok(())
        }
        Json::String(source) => storylet.set_priority_expr(source),
        other => Err(DeckError::InvalidPriority(other.to_string())),
    }
}

/// Scalar JSON values pass through; strings compile as expressions.
fn assignment_from_json(value: &Json) -> DeckResult<Assignment> {
    match value {
        Json::Bool(b) => Ok(Assignment::Literal(Value::Bool(*b))),
        Json::Number(n) => {
            let n = n
                .as_f64()
                .ok_or_else(|| DeckError::Document(format!("unrepresentable number: {n}")))?;
            Ok(Assignment::Literal(Value::Number(n)))
        }
        Json::String(s) => Ok(Assignment::expr(s)?),
        other => Err(DeckError::Malformed(format!(
            "expected a scalar or expression string, got: {other}"
        ))),
    }
}

fn assignments_from_map(map: &Map<String, Json>) -> DeckResult<Vec<(String, Assignment)>> {
    let mut entries = Vec::with_capacity(map.len());
    for (key, value) in map {
        entries.push((key.clone(), assignment_from_json(value)?));
    }
    Ok(entries)
}

/// Build a storylet from a leaf description, filling missing fields
/// from the active defaults.
pub fn storylet_from_json(
    item: &Map<String, Json>,
    defaults: &Map<String, Json>,
) -> DeckResult<Storylet> {
    if !item.contains_key("id") {
        return Err(DeckError::MissingId);
    }

    let mut config = defaults.clone();
    for (key, value) in item {
        config.insert(key.clone(), value.clone());
    }

    let desc: StoryletDesc = serde_json::from_value(Json::Object(config))
        .map_err(|e| DeckError::Document(e.to_string()))?;

    let mut storylet = Storylet::new(desc.id);
    if let Some(redraw) = desc.redraw {
        storylet.set_redraw(redraw.into_redraw()?);
    }
    storylet.set_condition(desc.condition.as_deref())?;
    if let Some(priority) = &desc.priority {
        set_priority_from_json(&mut storylet, priority)?;
    }
    if let Some(content) = desc.content {
        storylet.set_content(content);
    }
    if let Some(map) = desc.update_on_played {
        storylet.set_update_on_played(assignments_from_map(&map)?);
    }
    if let Some(map) = desc.update_on_drawn {
        storylet.set_update_on_drawn(assignments_from_map(&map)?);
    }

    Ok(storylet)
}

/// Build a deck from a parsed description document.
pub fn deck_from_json(
    doc: &Json,
    context: Option<SharedContext>,
    reshuffle: bool,
    trace: Option<&Trace>,
) -> DeckResult<Deck> {
    let mut deck = match context {
        Some(ctx) => Deck::with_context(ctx),
        None => Deck::new(),
    };

    let root = doc
        .as_object()
        .ok_or_else(|| DeckError::Malformed("top-level document must be an object".into()))?;

    let mut defaults = Map::new();
    read_packet(&mut deck, root, &mut defaults, trace)?;

    if reshuffle {
        deck.reshuffle(None, trace)?;
    }
    Ok(deck)
}

/// Build a deck from JSONC text.
pub fn deck_from_json_str(
    text: &str,
    context: Option<SharedContext>,
    reshuffle: bool,
    trace: Option<&Trace>,
) -> DeckResult<Deck> {
    let stripped = strip_json_comments(text);
    let doc: Json =
        serde_json::from_str(&stripped).map_err(|e| DeckError::Document(e.to_string()))?;
    deck_from_json(&doc, context, reshuffle, trace)
}

fn read_packet(
    deck: &mut Deck,
    packet: &Map<String, Json>,
    defaults: &mut Map<String, Json>,
    trace: Option<&Trace>,
) -> DeckResult<()> {
    if let Some(context_obj) = packet.get("context") {
        let entries = context_obj
            .as_object()
            .ok_or_else(|| DeckError::Malformed("\"context\" must be an object".into()))?;
        let context = deck.context().clone();
        let mut context = context.borrow_mut();
        for (key, value) in entries {
            let rhs = assignment_from_json(value)?;
            context.init(key, &rhs, trace)?;
        }
    }

    if let Some(defaults_obj) = packet.get("defaults") {
        let entries = defaults_obj
            .as_object()
            .ok_or_else(|| DeckError::Malformed("\"defaults\" must be an object".into()))?;
        for (key, value) in entries {
            defaults.insert(key.clone(), value.clone());
        }
    }

    if let Some(storylets) = packet.get("storylets") {
        let items = storylets
            .as_array()
            .ok_or_else(|| DeckError::Malformed("\"storylets\" must be a list".into()))?;
        // Each subtree works on its own copy of the active defaults.
        let mut inherited = defaults.clone();
        read_storylets(deck, items, &mut inherited, trace)?;
    }

    Ok(())
}

fn read_storylets(
    deck: &mut Deck,
    items: &[Json],
    defaults: &mut Map<String, Json>,
    trace: Option<&Trace>,
) -> DeckResult<()> {
    for item in items {
        let obj = item
            .as_object()
            .ok_or_else(|| DeckError::Malformed(format!("unexpected list item: {item}")))?;

        // A nested packet, or a leaf storylet?
        if obj.contains_key("storylets")
            || obj.contains_key("defaults")
            || obj.contains_key("context")
        {
            read_packet(deck, obj, defaults, trace)?;
            continue;
        }

        let storylet = storylet_from_json(obj, defaults)?;
        let id = storylet.id().to_string();
        deck.add_storylet(storylet)?;
        if let Some(t) = trace {
            t.push(format!("Added storylet '{id}'"));
        }
    }
    Ok(())
}
