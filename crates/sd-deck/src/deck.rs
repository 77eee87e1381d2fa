//! The deck: filters, buckets, shuffles, and deals storylets.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use sd_expr::{Context, SharedContext, Trace};

use crate::error::{DeckError, DeckResult};
use crate::storylet::Storylet;

/// Predicate applied to storylets during selection.
pub type StoryletFilter = Box<dyn Fn(&Storylet) -> bool>;

/// Callback fired when an async reshuffle completes.
pub type ReshuffleCallback = Box<dyn FnOnce()>;

/// Pending-reshuffle bookkeeping shared by the eager and chunked paths.
struct ReshuffleState {
    to_process: VecDeque<usize>,
    filter: Option<StoryletFilter>,
    priority_map: BTreeMap<i64, Vec<usize>>,
    callback: Option<ReshuffleCallback>,
    trace: Option<Trace>,
}

/// A set of storylets plus a context, producing ordered draw piles by
/// priority.
///
/// Two compatible draw models share one deck:
///
/// - the **pile model**: [`Deck::reshuffle`] (or its chunked async
///   variant) materializes an ordered pile once, and [`Deck::draw`]
///   consumes it head-first, playing each storylet as it leaves;
/// - the **immediate model**: [`Deck::deal`] computes a fresh ordered
///   selection on demand without touching the pile, and [`Deck::play`]
///   commits a choice.
///
/// Only playing a storylet (directly, via `draw`, or via
/// `deal_and_play`) advances the draw counter or a cooldown.
pub struct Deck {
    use_specificity: bool,
    async_reshuffle_count: usize,
    storylets: Vec<Storylet>,
    index: HashMap<String, usize>,
    draw_pile: Vec<usize>,
    current_draw: i64,
    context: SharedContext,
    rng: StdRng,
    pending: Option<ReshuffleState>,
}

impl Deck {
    /// An empty deck owning a fresh context.
    pub fn new() -> Self {
        Self::with_context(Context::new().into_shared())
    }

    /// An empty deck sharing a caller-owned context.
    pub fn with_context(context: SharedContext) -> Self {
        Self {
            use_specificity: false,
            async_reshuffle_count: 10,
            storylets: Vec::new(),
            index: HashMap::new(),
            draw_pile: Vec::new(),
            current_draw: 0,
            context,
            rng: StdRng::from_os_rng(),
            pending: None,
        }
    }

    /// Seed the shuffle RNG for reproducible draw sequences.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Handle to the evaluation context.
    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    /// Whether condition complexity breaks priority ties.
    pub fn use_specificity(&self) -> bool {
        self.use_specificity
    }

    pub fn set_use_specificity(&mut self, on: bool) {
        self.use_specificity = on;
    }

    /// Storylets processed per [`Deck::update`] call.
    pub fn async_reshuffle_count(&self) -> usize {
        self.async_reshuffle_count
    }

    pub fn set_async_reshuffle_count(&mut self, count: usize) {
        self.async_reshuffle_count = count.max(1);
    }

    pub fn len(&self) -> usize {
        self.storylets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storylets.is_empty()
    }

    pub fn current_draw(&self) -> i64 {
        self.current_draw
    }

    /// Clear every cooldown and the draw counter; the context is
    /// untouched.
    pub fn reset(&mut self) {
        self.current_draw = 0;
        for storylet in &mut self.storylets {
            storylet.reset();
        }
    }

    pub fn add_storylet(&mut self, storylet: Storylet) -> DeckResult<()> {
        if self.index.contains_key(storylet.id()) {
            return Err(DeckError::DuplicateId(storylet.id().to_string()));
        }
        self.index
            .insert(storylet.id().to_string(), self.storylets.len());
        self.storylets.push(storylet);
        Ok(())
    }

    pub fn get_storylet(&self, id: &str) -> Option<&Storylet> {
        self.index.get(id).map(|&idx| &self.storylets[idx])
    }

    fn ensure_no_pending(&self, operation: &'static str) -> DeckResult<()> {
        if self.pending.is_some() {
            return Err(DeckError::ReshuffleInProgress(operation));
        }
        Ok(())
    }

    // -- Pile model --

    /// Rebuild the draw pile eagerly: every storylet is filtered,
    /// condition-checked, bucketed by priority, and shuffled within its
    /// bucket; buckets emit highest priority first.
    pub fn reshuffle(
        &mut self,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<()> {
        self.ensure_no_pending("reshuffle")?;

        let mut state = self.reshuffle_prep(filter, trace);
        let all = state.to_process.len();
        self.reshuffle_chunk(&mut state, all)?;
        self.reshuffle_finalize(state);
        Ok(())
    }

    /// Begin a chunked reshuffle. No storylets are processed until
    /// [`Deck::update`]; the callback fires from the `update` call that
    /// drains the pending list.
    pub fn reshuffle_async(
        &mut self,
        callback: impl FnOnce() + 'static,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<()> {
        self.ensure_no_pending("reshuffle_async")?;

        let mut state = self.reshuffle_prep(filter, trace);
        state.callback = Some(Box::new(callback));
        self.pending = Some(state);
        Ok(())
    }

    pub fn async_reshuffle_in_progress(&self) -> bool {
        self.pending.is_some()
    }

    /// Process up to `async_reshuffle_count` storylets of a pending
    /// reshuffle. A no-op when none is pending. An evaluation error
    /// abandons the reshuffle without firing the callback.
    pub fn update(&mut self) -> DeckResult<()> {
        let Some(mut state) = self.pending.take() else {
            return Ok(());
        };
        self.reshuffle_chunk(&mut state, self.async_reshuffle_count)?;
        if state.to_process.is_empty() {
            self.reshuffle_finalize(state);
        } else {
            self.pending = Some(state);
        }
        Ok(())
    }

    /// Abandon a pending reshuffle without firing its callback.
    pub fn abort_reshuffle(&mut self) {
        self.pending = None;
    }

    fn reshuffle_prep(&mut self, filter: Option<StoryletFilter>, trace: Option<&Trace>) -> ReshuffleState {
        self.draw_pile.clear();
        ReshuffleState {
            to_process: (0..self.storylets.len()).collect(),
            filter,
            priority_map: BTreeMap::new(),
            callback: None,
            trace: trace.cloned(),
        }
    }

    fn reshuffle_chunk(&self, state: &mut ReshuffleState, count: usize) -> DeckResult<()> {
        let ctx = self.context.borrow();
        let mut remaining = count.min(state.to_process.len());

        while remaining > 0 {
            remaining -= 1;
            let Some(idx) = state.to_process.pop_front() else {
                break;
            };
            let storylet = &self.storylets[idx];
            let trace = state.trace.as_ref();

            if !storylet.can_draw(self.current_draw) {
                continue;
            }
            if let Some(filter) = &state.filter
                && !filter(storylet)
            {
                continue;
            }
            if !storylet.check_condition(&ctx, trace)? {
                continue;
            }

            let priority = storylet.current_priority(&ctx, self.use_specificity, trace)?;
            state.priority_map.entry(priority).or_default().push(idx);
        }

        Ok(())
    }

    fn reshuffle_finalize(&mut self, state: ReshuffleState) {
        for (_, mut bucket) in state.priority_map.into_iter().rev() {
            bucket.shuffle(&mut self.rng);
            self.draw_pile.extend(bucket);
        }
        if let Some(callback) = state.callback {
            callback();
        }
    }

    /// Pop the head of the draw pile and play it. Returns `None` when
    /// the pile is empty.
    pub fn draw(&mut self) -> DeckResult<Option<&Storylet>> {
        self.ensure_no_pending("draw")?;

        self.current_draw += 1;
        if self.draw_pile.is_empty() {
            return Ok(None);
        }

        let idx = self.draw_pile.remove(0);
        {
            let storylet = &mut self.storylets[idx];
            let mut ctx = self.context.borrow_mut();
            storylet.apply_drawn(&mut ctx, None)?;
            storylet.on_played(self.current_draw, &mut ctx, None)?;
        }
        Ok(Some(&self.storylets[idx]))
    }

    /// Pop up to `count` storylets; if the pile empties mid-hand and
    /// `reshuffle_if_needed` is set, reshuffle (unfiltered) and keep
    /// going. Returns the drawn ids in order.
    pub fn draw_hand(&mut self, count: usize, reshuffle_if_needed: bool) -> DeckResult<Vec<String>> {
        let mut drawn = Vec::new();
        for _ in 0..count {
            if self.draw_pile.is_empty() {
                if reshuffle_if_needed {
                    self.reshuffle(None, None)?;
                } else {
                    break;
                }
            }
            match self.draw()? {
                Some(storylet) => drawn.push(storylet.id().to_string()),
                None => break,
            }
        }
        Ok(drawn)
    }

    /// Comma-joined ids of the current draw pile, for debugging.
    pub fn dump_draw_pile(&self) -> DeckResult<String> {
        self.ensure_no_pending("dump_draw_pile")?;
        let ids: Vec<&str> = self
            .draw_pile
            .iter()
            .map(|&idx| self.storylets[idx].id())
            .collect();
        Ok(ids.join(","))
    }

    // -- Immediate model --

    /// Compute a fresh ordered selection of up to `count` eligible
    /// storylets (`None` = unlimited) without consuming the pile or
    /// advancing the draw counter. Returns ids, highest priority first.
    pub fn deal(
        &mut self,
        count: Option<usize>,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<Vec<String>> {
        self.ensure_no_pending("deal")?;

        let mut priority_map: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        {
            let ctx = self.context.borrow();
            for (idx, storylet) in self.storylets.iter().enumerate() {
                if !storylet.can_draw(self.current_draw) {
                    continue;
                }
                if let Some(filter) = &filter
                    && !filter(storylet)
                {
                    continue;
                }
                if !storylet.check_condition(&ctx, trace)? {
                    continue;
                }
                let priority = storylet.current_priority(&ctx, self.use_specificity, trace)?;
                priority_map.entry(priority).or_default().push(idx);
            }
        }

        let mut dealt = Vec::new();
        'buckets: for (_, mut bucket) in priority_map.into_iter().rev() {
            bucket.shuffle(&mut self.rng);
            for idx in bucket {
                dealt.push(self.storylets[idx].id().to_string());
                if let Some(limit) = count
                    && dealt.len() >= limit
                {
                    break 'buckets;
                }
            }
        }
        Ok(dealt)
    }

    /// [`Deck::deal`] limited to one storylet.
    pub fn deal_single(
        &mut self,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<Option<String>> {
        Ok(self.deal(Some(1), filter, trace)?.pop())
    }

    /// [`Deck::deal_single`], playing the storylet when one comes up.
    pub fn deal_and_play_single(
        &mut self,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<Option<String>> {
        let Some(id) = self.deal_single(filter, trace)? else {
            return Ok(None);
        };
        self.play(&id, trace)?;
        Ok(Some(id))
    }

    /// [`Deck::deal`], then play each returned storylet in order.
    pub fn deal_and_play(
        &mut self,
        count: Option<usize>,
        filter: Option<StoryletFilter>,
        trace: Option<&Trace>,
    ) -> DeckResult<Vec<String>> {
        let dealt = self.deal(count, filter, trace)?;
        for id in &dealt {
            self.play(id, trace)?;
        }
        Ok(dealt)
    }

    /// Play a storylet by id: advance the draw counter, set its
    /// cooldown, and apply its `update_on_played` assignments.
    pub fn play(&mut self, id: &str, trace: Option<&Trace>) -> DeckResult<()> {
        self.ensure_no_pending("play")?;

        let Some(&idx) = self.index.get(id) else {
            return Err(DeckError::UnknownStorylet(id.to_string()));
        };
        self.current_draw += 1;
        let storylet = &mut self.storylets[idx];
        let mut ctx = self.context.borrow_mut();
        storylet.on_played(self.current_draw, &mut ctx, trace)
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}
