//! Storylets: gated, ranked, cooldown-tracked content units.

use sd_expr::{Assignment, Context, Expr, Trace, parse_expression};

use crate::error::DeckResult;

/// When a played storylet becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Redraw {
    /// Eligible on every draw.
    #[default]
    Always,
    /// One-shot: never eligible again after playing.
    Never,
    /// Eligible again after this many draws.
    After(u32),
}

/// How a storylet's priority is determined.
#[derive(Debug, Clone)]
pub enum Priority {
    /// A fixed rank.
    Fixed(i64),
    /// Evaluated against the context at reshuffle time and truncated
    /// to an integer.
    Expr(Expr),
}

/// A content unit gated by a condition, ranked by priority, and rate
/// limited by a redraw policy. The `content` payload is opaque to the
/// engine and returned verbatim to the caller.
#[derive(Debug, Clone)]
pub struct Storylet {
    id: String,
    content: serde_json::Value,
    redraw: Redraw,
    condition: Option<Expr>,
    condition_specificity: u32,
    priority: Priority,
    update_on_played: Vec<(String, Assignment)>,
    update_on_drawn: Vec<(String, Assignment)>,
    /// The earliest draw counter at which this becomes eligible again;
    /// -1 after a `Never` play.
    next_play: i64,
}

impl Storylet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: serde_json::Value::Null,
            redraw: Redraw::Always,
            condition: None,
            condition_specificity: 0,
            priority: Priority::Fixed(0),
            update_on_played: Vec::new(),
            update_on_drawn: Vec::new(),
            next_play: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }

    pub fn set_content(&mut self, content: serde_json::Value) {
        self.content = content;
    }

    pub fn redraw(&self) -> Redraw {
        self.redraw
    }

    pub fn set_redraw(&mut self, redraw: Redraw) {
        self.redraw = redraw;
    }

    pub fn condition(&self) -> Option<&Expr> {
        self.condition.as_ref()
    }

    /// Compile and attach a gating condition. `None` or an empty
    /// string clears it; an absent condition is always true.
    pub fn set_condition(&mut self, source: Option<&str>) -> DeckResult<()> {
        match source {
            Some(text) if !text.is_empty() => {
                let expr = parse_expression(text)?;
                self.condition_specificity = expr.specificity();
                self.condition = Some(expr);
            }
            _ => {
                self.condition = None;
                self.condition_specificity = 0;
            }
        }
        Ok(())
    }

    pub fn set_priority(&mut self, priority: i64) {
        self.priority = Priority::Fixed(priority);
    }

    /// Compile and attach a priority expression.
    pub fn set_priority_expr(&mut self, source: &str) -> DeckResult<()> {
        self.priority = Priority::Expr(parse_expression(source)?);
        Ok(())
    }

    pub fn set_update_on_played(&mut self, updates: Vec<(String, Assignment)>) {
        self.update_on_played = updates;
    }

    pub fn set_update_on_drawn(&mut self, updates: Vec<(String, Assignment)>) {
        self.update_on_drawn = updates;
    }

    /// Clear the cooldown so the storylet is fresh again.
    pub fn reset(&mut self) {
        self.next_play = 0;
    }

    /// Whether the redraw rules allow this storylet at the given draw
    /// counter.
    pub fn can_draw(&self, current_draw: i64) -> bool {
        if self.redraw == Redraw::Never && self.next_play < 0 {
            return false;
        }
        if self.redraw == Redraw::Always {
            return true;
        }
        current_draw >= self.next_play
    }

    /// Evaluate the gating condition; absent means true.
    pub fn check_condition(&self, ctx: &Context, trace: Option<&Trace>) -> DeckResult<bool> {
        let Some(condition) = &self.condition else {
            return Ok(true);
        };
        if let Some(t) = trace {
            t.push(format!("Evaluating condition for {}", self.id));
        }
        Ok(condition.evaluate(ctx, trace)?.to_bool()?)
    }

    /// Current priority: the fixed rank, or the expression evaluated
    /// and truncated. With specificity on, the base is scaled by 100
    /// and the condition's structural score breaks ties in favour of
    /// more specific gates.
    pub fn current_priority(
        &self,
        ctx: &Context,
        use_specificity: bool,
        trace: Option<&Trace>,
    ) -> DeckResult<i64> {
        let mut priority = match &self.priority {
            Priority::Fixed(value) => *value,
            Priority::Expr(expr) => {
                if let Some(t) = trace {
                    t.push(format!("Evaluating priority for {}", self.id));
                }
                expr.evaluate(ctx, trace)?.to_number()?.trunc() as i64
            }
        };

        if use_specificity {
            priority *= 100;
            priority += i64::from(self.condition_specificity);
        }

        Ok(priority)
    }

    /// Record a play: advance the cooldown, then apply the
    /// `update_on_played` assignments to the context.
    pub fn on_played(
        &mut self,
        current_draw: i64,
        ctx: &mut Context,
        trace: Option<&Trace>,
    ) -> DeckResult<()> {
        self.next_play = match self.redraw {
            Redraw::Never => -1,
            Redraw::Always => current_draw,
            Redraw::After(cooldown) => current_draw + i64::from(cooldown),
        };
        ctx.update_all(&self.update_on_played, trace)?;
        Ok(())
    }

    /// Apply the `update_on_drawn` assignments (pile draws only).
    pub(crate) fn apply_drawn(&self, ctx: &mut Context, trace: Option<&Trace>) -> DeckResult<()> {
        ctx.update_all(&self.update_on_drawn, trace)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sd_expr::Value;

    #[test]
    fn cooldown_counts_draws() {
        let mut storylet = Storylet::new("camp");
        storylet.set_redraw(Redraw::After(3));

        let mut ctx = Context::new();
        storylet.on_played(1, &mut ctx, None).unwrap();

        assert!(!storylet.can_draw(2));
        assert!(!storylet.can_draw(3));
        assert!(storylet.can_draw(4));
        assert!(storylet.can_draw(5));
    }

    #[test]
    fn never_is_one_shot() {
        let mut storylet = Storylet::new("finale");
        storylet.set_redraw(Redraw::Never);
        assert!(storylet.can_draw(0));

        let mut ctx = Context::new();
        storylet.on_played(1, &mut ctx, None).unwrap();
        assert!(!storylet.can_draw(100));

        storylet.reset();
        assert!(storylet.can_draw(0));
    }

    #[test]
    fn always_ignores_counter() {
        let mut storylet = Storylet::new("bark");
        let mut ctx = Context::new();
        storylet.on_played(5, &mut ctx, None).unwrap();
        assert!(storylet.can_draw(0));
        assert!(storylet.can_draw(5));
    }

    #[test]
    fn absent_condition_is_true() {
        let storylet = Storylet::new("open");
        assert!(storylet.check_condition(&Context::new(), None).unwrap());
    }

    #[test]
    fn empty_condition_clears() {
        let mut storylet = Storylet::new("open");
        storylet.set_condition(Some("wealth > 2")).unwrap();
        assert!(storylet.condition().is_some());
        storylet.set_condition(Some("")).unwrap();
        assert!(storylet.condition().is_none());
    }

    #[test]
    fn condition_evaluates_against_context() {
        let mut storylet = Storylet::new("rich_street");
        storylet.set_condition(Some("wealth > 2")).unwrap();

        let mut ctx = Context::new();
        ctx.set("wealth", Value::Number(1.0));
        assert!(!storylet.check_condition(&ctx, None).unwrap());
        ctx.set("wealth", Value::Number(3.0));
        assert!(storylet.check_condition(&ctx, None).unwrap());
    }

    #[test]
    fn condition_trace_names_the_storylet() {
        let mut storylet = Storylet::new("rich_street");
        storylet.set_condition(Some("true")).unwrap();
        let trace = Trace::new();
        storylet
            .check_condition(&Context::new(), Some(&trace))
            .unwrap();
        assert_eq!(trace.lines()[0], "Evaluating condition for rich_street");
    }

    #[test]
    fn priority_expression_truncates() {
        let mut storylet = Storylet::new("event");
        storylet.set_priority_expr("wealth / 2").unwrap();
        let mut ctx = Context::new();
        ctx.set("wealth", Value::Number(5.0));
        assert_eq!(storylet.current_priority(&ctx, false, None).unwrap(), 2);
    }

    #[test]
    fn specificity_scales_and_breaks_ties() {
        let ctx = Context::new();

        let mut vague = Storylet::new("vague");
        vague.set_priority(2);
        assert_eq!(vague.current_priority(&ctx, true, None).unwrap(), 200);

        let mut specific = Storylet::new("specific");
        specific.set_priority(2);
        specific
            .set_condition(Some("true and true and true"))
            .unwrap();
        assert_eq!(specific.current_priority(&ctx, true, None).unwrap(), 202);

        // Same base priority: the more constrained gate ranks higher.
        assert!(
            specific.current_priority(&ctx, true, None).unwrap()
                > vague.current_priority(&ctx, true, None).unwrap()
        );
    }

    #[test]
    fn on_played_applies_updates() {
        let mut storylet = Storylet::new("theft");
        storylet.set_update_on_played(vec![(
            "gold".to_string(),
            Assignment::expr("gold - 3").unwrap(),
        )]);

        let mut ctx = Context::new();
        ctx.set("gold", Value::Number(10.0));
        storylet.on_played(1, &mut ctx, None).unwrap();
        assert_eq!(ctx.get("gold"), Some(&Value::Number(7.0)));
    }

    #[test]
    fn on_played_fails_on_unknown_key() {
        let mut storylet = Storylet::new("theft");
        storylet.set_update_on_played(vec![(
            "missing".to_string(),
            Assignment::expr("1").unwrap(),
        )]);
        let mut ctx = Context::new();
        assert!(storylet.on_played(1, &mut ctx, None).is_err());
    }
}
