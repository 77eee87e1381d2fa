//! End-to-end run of a small city: a street deck picks a location, an
//! encounter deck reacts to it, and a bark deck comments on the
//! encounter, all three sharing one context.

use std::cell::Cell;
use std::rc::Rc;

use sd_deck::{Deck, DeckError, Storylet};
use sd_expr::{Context, SharedContext, Value};

const STREETS: &str = r#"{
    // One storylet per street; tags drive the encounter conditions.
    "defaults": { "priority": 1 },
    "storylets": [
        { "id": "docks",         "content": { "title": "The Docks",      "wealth": 1, "tags": ["start", "poor"] } },
        { "id": "market",        "content": { "title": "Market Square",  "wealth": 2, "tags": ["start", "trade"] } },
        { "id": "bridge",        "content": { "title": "The Old Bridge", "wealth": 1, "tags": ["start"] } },
        { "id": "slums",         "content": { "title": "The Slums",      "wealth": 0, "tags": ["poor"] } },
        { "id": "temple_way",    "content": { "title": "Temple Way",     "wealth": 2, "tags": [] } },
        { "id": "fish_row",      "content": { "title": "Fish Row",       "wealth": 1, "tags": ["poor", "trade"] } },
        { "id": "tanners_lane",  "content": { "title": "Tanners' Lane",  "wealth": 0, "tags": ["poor"] } },
        { "id": "high_street",   "content": { "title": "High Street",    "wealth": 2, "tags": ["trade"] } },
        { "id": "guild_quarter", "content": { "title": "Guild Quarter",  "wealth": 2, "tags": ["trade"] } },
        { "id": "broken_stair",  "content": { "title": "The Broken Stair", "wealth": 0, "tags": [] } },
        { "id": "lantern_court", "content": { "title": "Lantern Court",  "wealth": 1, "tags": [] } },
        /* Only reachable from a wealthy street. */
        { "id": "palace_row", "condition": "street_wealth >= 2", "priority": 2,
          "content": { "title": "Palace Row", "wealth": 3, "tags": ["rich"] } }
    ]
}"#;

const ENCOUNTERS: &str = r#"{
    "defaults": { "priority": 1 },
    "storylets": [
        { "id": "pickpocket", "condition": "street_tag('poor')", "priority": 2,
          "content": { "title": "A Pickpocket Strikes", "tags": ["crime"] } },
        { "id": "merchant_pitch", "condition": "street_tag('trade') and street_wealth >= 2", "priority": 2,
          "content": { "title": "A Merchant's Pitch", "tags": ["trade"] } },
        { "id": "street_performer", "condition": "street_wealth >= 1",
          "content": { "title": "A Street Performer", "tags": ["crowd"] } },
        // The fallback: always available, lowest interest.
        { "id": "quiet_walk", "content": { "title": "A Quiet Walk", "tags": [] } }
    ]
}"#;

const BARKS: &str = r#"{
    "context": { "greeted": false },
    "defaults": { "redraw": "always", "priority": 0 },
    "storylets": [
        { "id": "welcome", "priority": 10, "redraw": "never",
          "updateOnPlayed": { "greeted": "true" },
          "content": { "comment": "Welcome to the city!" } },
        { "id": "watch_your_step", "content": { "comment": "Watch your step." } },
        { "id": "crowd_murmur", "condition": "encounter_tag('crowd')", "priority": 1,
          "content": { "comment": "Quite a crowd today." } },
        { "id": "crime_warning", "condition": "encounter_tag('crime')", "priority": 1,
          "content": { "comment": "Keep a hand on your purse." } }
    ]
}"#;

fn city_context() -> SharedContext {
    let mut ctx = Context::new();
    ctx.set("street_id", Value::Str(String::new()));
    ctx.set("street_wealth", Value::Number(0.0));
    ctx.set_fn("street_tag", 1, |_| Ok(Value::Bool(false)));
    ctx.set_fn("encounter_tag", 1, |_| Ok(Value::Bool(false)));
    ctx.into_shared()
}

fn content_tags(storylet: &Storylet) -> Vec<String> {
    storylet
        .content()
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn has_tag(storylet: &Storylet, tag: &str) -> bool {
    content_tags(storylet).iter().any(|t| t == tag)
}

/// Point the shared context at the street the player just entered.
fn set_street(ctx: &SharedContext, storylet: &Storylet) {
    let id = storylet.id().to_string();
    let wealth = storylet.content()["wealth"].as_f64().unwrap();
    let tags = content_tags(storylet);

    let mut ctx = ctx.borrow_mut();
    ctx.set("street_id", Value::Str(id));
    ctx.set("street_wealth", Value::Number(wealth));
    ctx.set_fn("street_tag", 1, move |args| {
        let tag = args[0].to_text()?;
        Ok(Value::Bool(tags.contains(&tag)))
    });
}

/// Point the shared context at the encounter that just fired.
fn set_encounter(ctx: &SharedContext, storylet: &Storylet) {
    let tags = content_tags(storylet);
    ctx.borrow_mut().set_fn("encounter_tag", 1, move |args| {
        let tag = args[0].to_text()?;
        Ok(Value::Bool(tags.contains(&tag)))
    });
}

#[test]
fn walks_the_city() {
    let ctx = city_context();
    let mut streets =
        Deck::from_description_str(STREETS, Some(ctx.clone()), false, None).unwrap().with_seed(11);
    let mut encounters =
        Deck::from_description_str(ENCOUNTERS, Some(ctx.clone()), false, None).unwrap().with_seed(12);
    let mut barks =
        Deck::from_description_str(BARKS, Some(ctx.clone()), false, None).unwrap().with_seed(13);

    // The first location must be start-tagged.
    streets
        .reshuffle(Some(Box::new(|s| has_tag(s, "start"))), None)
        .unwrap();
    let street = streets.draw().unwrap().unwrap();
    assert!(["docks", "market", "bridge"].contains(&street.id()));
    set_street(&ctx, street);

    encounters.reshuffle(None, None).unwrap();
    let encounter = encounters.draw().unwrap().unwrap();
    set_encounter(&ctx, encounter);

    barks.reshuffle(None, None).unwrap();
    let bark = barks.draw().unwrap().unwrap();
    // The one-shot greeting outranks everything on the first visit.
    assert_eq!(bark.id(), "welcome");
    assert_eq!(ctx.borrow().get("greeted"), Some(&Value::Bool(true)));

    // Now every street is fair game; walk the rest of the deck.
    streets.reshuffle(None, None).unwrap();
    let mut path = Vec::new();
    for _ in 0..11 {
        let street = streets.draw().unwrap().unwrap();
        set_street(&ctx, street);
        path.push(street.id().to_string());

        encounters.reshuffle(None, None).unwrap();
        let encounter = encounters.draw().unwrap().unwrap();
        set_encounter(&ctx, encounter);

        barks.reshuffle(None, None).unwrap();
        let _bark = barks.draw().unwrap();
    }

    assert!(
        path.iter()
            .any(|id| ["market", "slums", "bridge"].contains(&id.as_str()))
    );
}

#[test]
fn encounters_react_to_the_street() {
    let ctx = city_context();
    let mut streets =
        Deck::from_description_str(STREETS, Some(ctx.clone()), false, None).unwrap().with_seed(3);
    let mut encounters =
        Deck::from_description_str(ENCOUNTERS, Some(ctx.clone()), false, None).unwrap().with_seed(4);

    let slums = streets.get_storylet("slums").unwrap();
    set_street(&ctx, slums);

    // In the slums (wealth 0, poor): the pickpocket outranks the
    // fallback, and the wealth-gated encounters are off the table.
    let dealt = encounters.deal(None, None, None).unwrap();
    assert_eq!(dealt.first().map(String::as_str), Some("pickpocket"));
    assert!(dealt.iter().all(|id| id != "merchant_pitch"));
    assert!(dealt.iter().all(|id| id != "street_performer"));
    assert!(dealt.iter().any(|id| id == "quiet_walk"));
}

#[test]
fn draw_hand_reshuffles_midway() {
    let ctx = city_context();
    // Every bark condition passes.
    ctx.borrow_mut()
        .set_fn("encounter_tag", 1, |_| Ok(Value::Bool(true)));

    let mut barks =
        Deck::from_description_str(BARKS, Some(ctx.clone()), true, None).unwrap().with_seed(5);

    let hand = barks.draw_hand(10, false).unwrap();
    assert_eq!(hand.len(), 4, "the pile holds one card per bark");

    barks.reset();
    let hand = barks.draw_hand(10, true).unwrap();
    assert_eq!(hand.len(), 10);
    assert_eq!(hand[0], "welcome");
    // The greeting is a one-shot: it never comes back mid-hand.
    assert_eq!(hand.iter().filter(|id| *id == "welcome").count(), 1);
}

#[test]
fn async_reshuffle_completes_in_chunks() {
    let ctx = city_context();
    let mut barks =
        Deck::from_description_str(BARKS, Some(ctx.clone()), false, None).unwrap().with_seed(6);
    barks.set_async_reshuffle_count(2);

    let completed = Rc::new(Cell::new(false));
    let flag = completed.clone();
    barks
        .reshuffle_async(move || flag.set(true), None, None)
        .unwrap();

    // Nothing is processed until update(); draws are forbidden.
    assert!(barks.async_reshuffle_in_progress());
    assert!(matches!(
        barks.draw(),
        Err(DeckError::ReshuffleInProgress("draw"))
    ));

    // Four barks at two per update: exactly two calls, callback on the
    // last one.
    let mut updates = 0;
    while barks.async_reshuffle_in_progress() {
        assert!(!completed.get());
        barks.update().unwrap();
        updates += 1;
    }
    assert_eq!(updates, 2);
    assert!(completed.get());

    let first = barks.draw().unwrap().unwrap();
    assert_eq!(first.id(), "welcome");
    assert!(barks.draw().unwrap().is_some());
}
