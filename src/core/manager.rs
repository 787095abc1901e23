//! Rotor state manager: the state machine that turns "N rotors of function F,
//! selected by strategy S" into a cached, cancellable, concurrently computed
//! set of coefficients.
//!
//! All transitions (start, supersede, cancel, settle, reset) happen under a
//! single mutex, so at most one load is logically in flight per manager. Older
//! loads are cancelled cooperatively and their late results are ignored by
//! generation number; whatever they already wrote to the cache stays there.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use super::batch_loader::{BatchLoader, BatchOutcome, CancelToken, PoolError, WorkerPool};
use super::cache::RotorStateCache;
use super::events::{
    Envelope, EventLoop, ListenerBus, LoadInterceptor, RotorEvent, RotorStateListener,
    Subscription,
};
use super::frequency::FrequencyStrategy;
use super::rotor_state::{FrequencyKey, RotorState, magnitude_scale_sum};
use crate::config::EngineConfig;
use crate::function::{FunctionMeta, PeriodicFunction};
use crate::settings::{NumericSettings, PrecisionObserver, SettingsSubscription};

/// Disposition of a mutation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadVerdict {
    /// Work was scheduled (or, for synchronous calls, has finished).
    Queued,
    /// Already satisfied by the settled or in-flight state; nothing scheduled.
    Redundant,
    /// Vetoed by an interceptor; state unchanged.
    Intercepted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManagerStatus {
    Uninitialized,
    Idle { count: usize },
    Loading { pending: usize },
}

/// Everything a manager needs from the application besides its function.
#[derive(Clone)]
pub struct EngineContext {
    pub loader: BatchLoader,
    pub events: Sender<Envelope>,
    pub settings: Option<NumericSettings>,
    pub initial_rotor_count: usize,
    /// Soft cap on cached states; 0 disables pruning.
    pub max_cached_states: usize,
}

impl EngineContext {
    /// Context backed by the process-wide worker pool.
    pub fn new(config: &EngineConfig, events: &EventLoop) -> Result<Self, PoolError> {
        let pool = WorkerPool::shared(config.worker_threads)?;
        Ok(Self::with_pool(config, pool, events))
    }

    pub fn with_pool(config: &EngineConfig, pool: WorkerPool, events: &EventLoop) -> Self {
        Self {
            loader: BatchLoader::new(pool, config.chunk_size),
            events: events.sender(),
            settings: None,
            initial_rotor_count: config.initial_rotor_count,
            max_cached_states: config.max_cached_states,
        }
    }

    pub fn with_settings(mut self, settings: NumericSettings) -> Self {
        self.settings = Some(settings);
        self
    }
}

struct InFlight {
    generation: u64,
    pending: usize,
    /// Count promoted to `current_count` when the load completes.
    settle_to: Option<usize>,
    cancel: CancelToken,
}

enum Phase {
    Uninitialized,
    Idle,
    Loading(InFlight),
}

struct ManagerState {
    phase: Phase,
    current_count: usize,
    generation: u64,
    magnitude_sum: Option<f64>,
    active_strategy: Option<FrequencyStrategy>,
    strategy_change_intercepted: bool,
}

struct LoadTicket {
    generation: u64,
    target: usize,
    strategy: FrequencyStrategy,
    cancel: CancelToken,
}

#[derive(Clone, Copy)]
enum Run<'a> {
    Background,
    Blocking(&'a CancelToken),
}

struct Shared {
    function: Arc<dyn PeriodicFunction>,
    name: String,
    cache: RotorStateCache,
    loader: BatchLoader,
    bus: ListenerBus,
    default_strategy: FrequencyStrategy,
    initial_rotor_count: usize,
    max_cached_states: usize,
    state: Mutex<ManagerState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn strategy<'a>(&'a self, state: &'a ManagerState) -> &'a FrequencyStrategy {
        state
            .active_strategy
            .as_ref()
            .unwrap_or(&self.default_strategy)
    }

    fn consider_initialize(self: &Arc<Self>) -> LoadVerdict {
        {
            let mut state = self.lock_state();
            if !matches!(state.phase, Phase::Uninitialized) {
                return LoadVerdict::Redundant;
            }
            state.phase = Phase::Idle;
        }
        debug!(function = %self.name, count = self.initial_rotor_count, "initializing rotors");
        self.set_rotor_count(self.initial_rotor_count, Run::Background)
    }

    fn set_rotor_count(self: &Arc<Self>, count: usize, run: Run<'_>) -> LoadVerdict {
        let mut state = self.lock_state();
        if count == state.current_count {
            // Scrubbed back to the settled count while a load toward another
            // count is running: let it finish as a plain prefetch.
            if let Phase::Loading(in_flight) = &mut state.phase {
                if in_flight.settle_to.is_some_and(|c| c != count) {
                    in_flight.settle_to = None;
                    debug!(function = %self.name, count, "in-flight load will not settle");
                }
            }
            return LoadVerdict::Redundant;
        }
        drop(state);
        self.request_load(count, true, run)
    }

    /// Folds the request into the in-flight load when that load already
    /// covers it.
    fn absorb(&self, state: &mut ManagerState, target: usize, settle: bool) -> bool {
        let depends_on_total = self.strategy(state).depends_on_total();
        let Phase::Loading(in_flight) = &mut state.phase else {
            return false;
        };
        let covered = if depends_on_total {
            in_flight.pending == target
        } else {
            in_flight.pending >= target
        };
        if covered && settle {
            in_flight.settle_to = Some(target);
        }
        covered
    }

    fn request_load(self: &Arc<Self>, target: usize, settle: bool, run: Run<'_>) -> LoadVerdict {
        if self.absorb(&mut self.lock_state(), target, settle) {
            debug!(function = %self.name, count = target, "load covered by in-flight load");
            return LoadVerdict::Redundant;
        }
        if self.bus.intercepts_rotors_load(target) {
            debug!(function = %self.name, count = target, "rotor load intercepted");
            self.bus.post(RotorEvent::LoadIntercepted { count: target });
            return LoadVerdict::Intercepted;
        }
        let ticket = {
            let mut state = self.lock_state();
            if self.absorb(&mut state, target, settle) {
                return LoadVerdict::Redundant;
            }
            self.begin_load(&mut state, target, settle.then_some(target))
        };
        self.execute(ticket, run);
        LoadVerdict::Queued
    }

    /// Target and settle count for recomputing what is currently shown or
    /// being loaded.
    fn reload_target(state: &ManagerState) -> (usize, Option<usize>) {
        match &state.phase {
            Phase::Loading(in_flight) => (
                in_flight.pending.max(state.current_count),
                in_flight.settle_to.or(Some(state.current_count)),
            ),
            _ => (state.current_count, Some(state.current_count)),
        }
    }

    fn reload(self: &Arc<Self>, run: Run<'_>) -> LoadVerdict {
        let (target, settle_to) = Self::reload_target(&self.lock_state());
        self.start_reload(target, settle_to, run)
    }

    fn start_reload(
        self: &Arc<Self>,
        target: usize,
        settle_to: Option<usize>,
        run: Run<'_>,
    ) -> LoadVerdict {
        if target == 0 {
            let mut state = self.lock_state();
            state.magnitude_sum = Some(0.0);
            return LoadVerdict::Redundant;
        }
        if self.bus.intercepts_rotors_load(target) {
            debug!(function = %self.name, count = target, "reload intercepted");
            self.bus.post(RotorEvent::LoadIntercepted { count: target });
            return LoadVerdict::Intercepted;
        }
        let ticket = self.begin_load(&mut self.lock_state(), target, settle_to);
        self.execute(ticket, run);
        LoadVerdict::Queued
    }

    fn begin_load(
        &self,
        state: &mut ManagerState,
        target: usize,
        settle_to: Option<usize>,
    ) -> LoadTicket {
        let was_loading = match &state.phase {
            Phase::Loading(old) => {
                old.cancel.cancel();
                debug!(
                    function = %self.name,
                    superseded = old.pending,
                    count = target,
                    "superseding in-flight load"
                );
                true
            }
            _ => false,
        };
        state.generation += 1;
        let cancel = CancelToken::new();
        state.phase = Phase::Loading(InFlight {
            generation: state.generation,
            pending: target,
            settle_to,
            cancel: cancel.clone(),
        });
        if !was_loading {
            self.bus.post(RotorEvent::LoadingChanged { loading: true });
        }
        debug!(function = %self.name, count = target, generation = state.generation, "load started");
        LoadTicket {
            generation: state.generation,
            target,
            strategy: self.strategy(state).clone(),
            cancel,
        }
    }

    fn execute(self: &Arc<Self>, ticket: LoadTicket, run: Run<'_>) {
        match run {
            Run::Blocking(token) => self.run_load(ticket, Some(token)),
            Run::Background => {
                let generation = ticket.generation;
                let target = ticket.target;
                let shared = Arc::clone(self);
                let spawned = thread::Builder::new()
                    .name(format!("rotor-load-{generation}"))
                    .spawn(move || shared.run_load(ticket, None));
                if let Err(err) = spawned {
                    warn!(function = %self.name, "failed to spawn load thread: {err}");
                    let outcome = BatchOutcome {
                        requested: target,
                        cancelled: true,
                        ..Default::default()
                    };
                    self.finish_load(generation, target, outcome);
                }
            }
        }
    }

    fn run_load(&self, ticket: LoadTicket, external: Option<&CancelToken>) {
        let started = Instant::now();
        let is_cancelled =
            || ticket.cancel.is_cancelled() || external.is_some_and(CancelToken::is_cancelled);
        let outcome = self.loader.load(
            &self.cache,
            self.function.as_ref(),
            &ticket.strategy,
            0..ticket.target,
            ticket.target,
            &is_cancelled,
        );
        debug!(
            function = %self.name,
            count = ticket.target,
            computed = outcome.computed,
            hits = outcome.hits,
            cancelled = outcome.cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "load finished"
        );
        self.finish_load(ticket.generation, ticket.target, outcome);
    }

    fn finish_load(&self, generation: u64, target: usize, outcome: BatchOutcome) {
        let mut state = self.lock_state();
        let settle_to = match &state.phase {
            Phase::Loading(in_flight) if in_flight.generation == generation => in_flight.settle_to,
            // Superseded or cancelled: already reported.
            _ => return,
        };
        state.phase = Phase::Idle;
        if !outcome.cancelled {
            if let Some(count) = settle_to {
                self.settle(&mut state, count);
            }
        }
        self.bus.post(RotorEvent::LoadFinished {
            count: target,
            cancelled: outcome.cancelled,
        });
        self.bus.post(RotorEvent::LoadingChanged { loading: false });
    }

    fn settle(&self, state: &mut ManagerState, count: usize) {
        let old = state.current_count;
        state.current_count = count;
        state.magnitude_sum = None;
        state.magnitude_sum = Some(self.compute_magnitude_sum(state));
        if old != count {
            self.bus.post(RotorEvent::CountChanged { old, new: count });
        }
        self.prune(state);
    }

    fn compute_magnitude_sum(&self, state: &ManagerState) -> f64 {
        let strategy = self.strategy(state);
        let count = state.current_count;
        magnitude_scale_sum((0..count).map(|i| {
            self.cache
                .get_or_known(self.function.as_ref(), strategy.frequency(i, count))
                .map_or(0.0, |s| s.magnitude())
        }))
    }

    fn prune(&self, state: &ManagerState) {
        if self.max_cached_states == 0 || self.cache.len() <= self.max_cached_states {
            return;
        }
        let strategy = self.strategy(state);
        let count = state.current_count;
        let keep: HashSet<FrequencyKey> = (0..count)
            .map(|i| FrequencyKey::new(strategy.frequency(i, count)))
            .collect();
        let removed = self.cache.retain(|key| keep.contains(&key));
        debug!(function = %self.name, removed, kept = self.cache.len(), "pruned rotor cache");
    }

    fn cancel_locked(&self, state: &mut ManagerState, interrupt: bool) -> bool {
        match std::mem::replace(&mut state.phase, Phase::Idle) {
            Phase::Loading(in_flight) => {
                if interrupt {
                    in_flight.cancel.cancel();
                }
                debug!(function = %self.name, pending = in_flight.pending, interrupt, "load cancelled");
                self.bus.post(RotorEvent::LoadFinished {
                    count: in_flight.pending,
                    cancelled: true,
                });
                self.bus.post(RotorEvent::LoadingChanged { loading: false });
                true
            }
            other => {
                state.phase = other;
                false
            }
        }
    }

    fn cancel_load(&self, interrupt: bool) -> bool {
        self.cancel_locked(&mut self.lock_state(), interrupt)
    }

    fn clear_and_reset(&self) {
        let mut state = self.lock_state();
        self.cancel_locked(&mut state, true);
        if matches!(state.phase, Phase::Uninitialized) {
            state.phase = Phase::Idle;
        }
        self.cache.clear();
        let old = state.current_count;
        state.current_count = 0;
        state.magnitude_sum = Some(0.0);
        debug!(function = %self.name, "cache cleared and count reset");
        if old != 0 {
            self.bus.post(RotorEvent::CountChanged { old, new: 0 });
        }
    }

    fn clear_and_reload(self: &Arc<Self>) -> LoadVerdict {
        let (target, settle_to) = {
            let mut state = self.lock_state();
            self.cache.clear();
            state.magnitude_sum = None;
            Self::reload_target(&state)
        };
        debug!(function = %self.name, count = target, "cache cleared, reloading");
        self.start_reload(target, settle_to, Run::Background)
    }

    fn set_frequency_strategy(self: &Arc<Self>, requested: Option<FrequencyStrategy>) -> LoadVerdict {
        let (current, next) = {
            let mut state = self.lock_state();
            let next = requested
                .clone()
                .unwrap_or_else(|| self.default_strategy.clone());
            let current = self.strategy(&state).clone();
            if current == next && !state.strategy_change_intercepted {
                state.active_strategy = requested;
                return LoadVerdict::Redundant;
            }
            (current, next)
        };

        if self.bus.intercepts_frequency_strategy(&current, &next) {
            debug!(function = %self.name, requested = %next, "frequency strategy change intercepted");
            self.lock_state().strategy_change_intercepted = true;
            self.bus
                .post(RotorEvent::FrequencyStrategyChangeIntercepted { requested: next });
            return LoadVerdict::Intercepted;
        }

        {
            let mut state = self.lock_state();
            state.strategy_change_intercepted = false;
            state.active_strategy = requested;
            state.magnitude_sum = None;
            debug!(function = %self.name, old = %current, new = %next, "frequency strategy changed");
            self.bus.post(RotorEvent::FrequencyStrategyChanged {
                old: current,
                new: next,
            });
        }
        self.reload(Run::Background)
    }

    fn rotor_state(&self, index: usize) -> Option<RotorState> {
        let frequency = {
            let state = self.lock_state();
            if index >= state.current_count {
                return None;
            }
            self.strategy(&state).frequency(index, state.current_count)
        };
        self.cache.get_or_known(self.function.as_ref(), frequency)
    }

    fn active_rotor_states(&self) -> Vec<RotorState> {
        let (strategy, count) = {
            let state = self.lock_state();
            (self.strategy(&state).clone(), state.current_count)
        };
        (0..count)
            .filter_map(|i| {
                self.cache
                    .get_or_known(self.function.as_ref(), strategy.frequency(i, count))
            })
            .collect()
    }

    fn magnitude_sum(&self) -> f64 {
        let mut state = self.lock_state();
        if let Some(sum) = state.magnitude_sum {
            return sum;
        }
        let sum = self.compute_magnitude_sum(&state);
        state.magnitude_sum = Some(sum);
        sum
    }

    fn status(&self) -> ManagerStatus {
        let state = self.lock_state();
        match &state.phase {
            Phase::Uninitialized => ManagerStatus::Uninitialized,
            Phase::Idle => ManagerStatus::Idle {
                count: state.current_count,
            },
            Phase::Loading(in_flight) => ManagerStatus::Loading {
                pending: in_flight.pending,
            },
        }
    }
}

/// Forwards precision changes to the manager.
struct PrecisionLink(Arc<Shared>);

impl PrecisionObserver for PrecisionLink {
    fn on_precision_changed(&self, intervals: usize) {
        debug!(function = %self.0.name, intervals, "precision changed");
        self.0.clear_and_reload();
    }
}

/// Manager bound to one function.
pub struct StandardRotorStateManager {
    shared: Arc<Shared>,
    _precision: Option<SettingsSubscription>,
}

impl StandardRotorStateManager {
    pub fn new(
        function: Arc<dyn PeriodicFunction>,
        meta: FunctionMeta,
        context: &EngineContext,
    ) -> Self {
        let name = if meta.name.is_empty() {
            function.name().to_string()
        } else {
            meta.name
        };
        let cache = RotorStateCache::new();
        let preloaded = cache.insert_all(meta.preloaded);
        let default_strategy = function.default_frequency_strategy();
        let shared = Arc::new(Shared {
            function,
            name,
            cache,
            loader: context.loader.clone(),
            bus: ListenerBus::new(context.events.clone()),
            default_strategy,
            initial_rotor_count: meta
                .initial_rotor_count
                .unwrap_or(context.initial_rotor_count),
            max_cached_states: context.max_cached_states,
            state: Mutex::new(ManagerState {
                phase: Phase::Uninitialized,
                current_count: 0,
                generation: 0,
                magnitude_sum: None,
                active_strategy: meta.frequency_strategy,
                strategy_change_intercepted: false,
            }),
        });
        let precision = context
            .settings
            .as_ref()
            .map(|s| s.subscribe(Arc::new(PrecisionLink(Arc::clone(&shared)))));
        debug!(function = %shared.name, preloaded, "rotor manager created");
        Self {
            shared,
            _precision: precision,
        }
    }

    pub fn function_name(&self) -> &str {
        &self.shared.name
    }

    pub fn function(&self) -> &Arc<dyn PeriodicFunction> {
        &self.shared.function
    }

    /// Starts loading the initial rotor count. Only the first call does anything.
    pub fn consider_initialize(&self) -> LoadVerdict {
        self.shared.consider_initialize()
    }

    pub fn set_rotor_count_async(&self, count: usize) -> LoadVerdict {
        self.shared.set_rotor_count(count, Run::Background)
    }

    /// Blocks until the load completes or `cancel` (or a superseding request)
    /// stops it.
    pub fn set_rotor_count_sync(&self, count: usize, cancel: &CancelToken) -> LoadVerdict {
        self.shared.set_rotor_count(count, Run::Blocking(cancel))
    }

    /// Ensures states for `[0, count)` are cached without changing the count.
    pub fn load_async(&self, count: usize) -> LoadVerdict {
        self.shared.request_load(count, false, Run::Background)
    }

    pub fn load_sync(&self, count: usize, cancel: &CancelToken) -> LoadVerdict {
        self.shared.request_load(count, false, Run::Blocking(cancel))
    }

    /// Recomputes `[0, current count)` with the active strategy.
    pub fn reload_async(&self) -> LoadVerdict {
        self.shared.reload(Run::Background)
    }

    /// Aborts the in-flight load, if any. With `interrupt == false` running
    /// chunks finish filling the cache but the result is never promoted.
    pub fn cancel_load(&self, interrupt: bool) -> bool {
        self.shared.cancel_load(interrupt)
    }

    pub fn clear_and_reset_sync(&self) {
        self.shared.clear_and_reset()
    }

    /// Purges the cache and recomputes the current count.
    pub fn clear_and_reload_async(&self) -> LoadVerdict {
        self.shared.clear_and_reload()
    }

    /// `None` reverts to the function's default strategy. Returns the verdict
    /// of the triggered reload; `Redundant` when nothing needed loading.
    pub fn set_frequency_strategy(&self, strategy: Option<FrequencyStrategy>) -> LoadVerdict {
        self.shared.set_frequency_strategy(strategy)
    }

    /// Inserts restored states straight into the cache. Returns how many were new.
    pub fn add_rotor_states<I>(&self, states: I) -> usize
    where
        I: IntoIterator<Item = RotorState>,
    {
        let added = self.shared.cache.insert_all(states);
        self.shared.lock_state().magnitude_sum = None;
        added
    }

    pub fn subscribe(&self, listener: Arc<dyn RotorStateListener>) -> Subscription {
        self.shared.bus.subscribe(listener)
    }

    pub fn add_interceptor(&self, interceptor: Arc<dyn LoadInterceptor>) -> Subscription {
        self.shared.bus.add_interceptor(interceptor)
    }

    pub fn rotor_count(&self) -> usize {
        self.shared.lock_state().current_count
    }

    pub fn pending_rotor_count(&self) -> Option<usize> {
        match &self.shared.lock_state().phase {
            Phase::Loading(in_flight) => Some(in_flight.pending),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.shared.lock_state().phase, Phase::Loading(_))
    }

    pub fn status(&self) -> ManagerStatus {
        self.shared.status()
    }

    /// State at `index` for the current count; `None` past the settled count.
    pub fn get_rotor_state(&self, index: usize) -> Option<RotorState> {
        self.shared.rotor_state(index)
    }

    pub fn contains_cached_rotor_state(&self, frequency: f64) -> bool {
        self.shared.cache.contains(frequency)
    }

    pub fn get_cached_rotor_state(&self, frequency: f64) -> Option<RotorState> {
        self.shared
            .cache
            .get_or_known(self.shared.function.as_ref(), frequency)
    }

    pub fn all_rotors_magnitude_scale_sum(&self) -> f64 {
        self.shared.magnitude_sum()
    }

    pub fn all_loaded_rotor_states_count(&self) -> usize {
        self.shared.cache.len()
    }

    /// States backing `[0, current count)`, in index order.
    pub fn active_rotor_states(&self) -> Vec<RotorState> {
        self.shared.active_rotor_states()
    }

    /// Every cached state, ordered by frequency.
    pub fn rotor_states_snapshot(&self) -> Vec<RotorState> {
        self.shared.cache.snapshot_ordered()
    }

    pub fn rotor_states_unordered(&self) -> Vec<RotorState> {
        self.shared.cache.snapshot()
    }

    pub fn frequency_strategy(&self) -> FrequencyStrategy {
        let state = self.shared.lock_state();
        self.shared.strategy(&state).clone()
    }

    pub fn default_frequency_strategy(&self) -> &FrequencyStrategy {
        &self.shared.default_strategy
    }
}

impl Drop for StandardRotorStateManager {
    fn drop(&mut self) {
        let state = self.shared.lock_state();
        if let Phase::Loading(in_flight) = &state.phase {
            in_flight.cancel.cancel();
        }
    }
}

/// A manager slot: either bound to a function or empty when none is selected.
pub enum RotorStateManager {
    Bound(StandardRotorStateManager),
    Empty,
}

impl RotorStateManager {
    pub fn bind(
        function: Arc<dyn PeriodicFunction>,
        meta: FunctionMeta,
        context: &EngineContext,
    ) -> Self {
        Self::Bound(StandardRotorStateManager::new(function, meta, context))
    }

    pub fn as_bound(&self) -> Option<&StandardRotorStateManager> {
        match self {
            Self::Bound(m) => Some(m),
            Self::Empty => None,
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        self.as_bound().map(StandardRotorStateManager::function_name)
    }

    pub fn consider_initialize(&self) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.consider_initialize())
    }

    pub fn set_rotor_count_async(&self, count: usize) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.set_rotor_count_async(count))
    }

    pub fn set_rotor_count_sync(&self, count: usize, cancel: &CancelToken) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.set_rotor_count_sync(count, cancel))
    }

    pub fn load_async(&self, count: usize) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.load_async(count))
    }

    pub fn load_sync(&self, count: usize, cancel: &CancelToken) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.load_sync(count, cancel))
    }

    pub fn reload_async(&self) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.reload_async())
    }

    pub fn cancel_load(&self, interrupt: bool) -> bool {
        self.as_bound().is_some_and(|m| m.cancel_load(interrupt))
    }

    pub fn clear_and_reset_sync(&self) {
        if let Some(m) = self.as_bound() {
            m.clear_and_reset_sync();
        }
    }

    pub fn clear_and_reload_async(&self) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.clear_and_reload_async())
    }

    pub fn set_frequency_strategy(&self, strategy: Option<FrequencyStrategy>) -> LoadVerdict {
        self.as_bound()
            .map_or(LoadVerdict::Redundant, |m| m.set_frequency_strategy(strategy))
    }

    pub fn add_rotor_states<I>(&self, states: I) -> usize
    where
        I: IntoIterator<Item = RotorState>,
    {
        self.as_bound().map_or(0, |m| m.add_rotor_states(states))
    }

    pub fn subscribe(&self, listener: Arc<dyn RotorStateListener>) -> Subscription {
        match self {
            Self::Bound(m) => m.subscribe(listener),
            Self::Empty => Subscription::detached(),
        }
    }

    pub fn add_interceptor(&self, interceptor: Arc<dyn LoadInterceptor>) -> Subscription {
        match self {
            Self::Bound(m) => m.add_interceptor(interceptor),
            Self::Empty => Subscription::detached(),
        }
    }

    pub fn rotor_count(&self) -> usize {
        self.as_bound().map_or(0, |m| m.rotor_count())
    }

    pub fn pending_rotor_count(&self) -> Option<usize> {
        self.as_bound().and_then(|m| m.pending_rotor_count())
    }

    pub fn is_loading(&self) -> bool {
        self.as_bound().is_some_and(|m| m.is_loading())
    }

    pub fn status(&self) -> ManagerStatus {
        self.as_bound()
            .map_or(ManagerStatus::Idle { count: 0 }, |m| m.status())
    }

    pub fn get_rotor_state(&self, index: usize) -> Option<RotorState> {
        self.as_bound().and_then(|m| m.get_rotor_state(index))
    }

    pub fn all_rotors_magnitude_scale_sum(&self) -> f64 {
        self.as_bound()
            .map_or(0.0, |m| m.all_rotors_magnitude_scale_sum())
    }

    pub fn all_loaded_rotor_states_count(&self) -> usize {
        self.as_bound()
            .map_or(0, |m| m.all_loaded_rotor_states_count())
    }

    pub fn active_rotor_states(&self) -> Vec<RotorState> {
        self.as_bound()
            .map(|m| m.active_rotor_states())
            .unwrap_or_default()
    }

    pub fn rotor_states_snapshot(&self) -> Vec<RotorState> {
        self.as_bound()
            .map(|m| m.rotor_states_snapshot())
            .unwrap_or_default()
    }

    pub fn frequency_strategy(&self) -> Option<FrequencyStrategy> {
        self.as_bound().map(|m| m.frequency_strategy())
    }
}

impl Default for RotorStateManager {
    fn default() -> Self {
        Self::Empty
    }
}
