//! Headless driver: binds a built-in shape to a rotor manager and pumps the
//! event loop on the calling thread until the engine settles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, info};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::core::batch_loader::{CancelToken, PoolError};
use crate::core::events::{EventLoop, RotorEvent, Subscription};
use crate::core::manager::{EngineContext, LoadVerdict, RotorStateManager};
use crate::core::rotor_state::RotorState;
use crate::function::FunctionMeta;
use crate::settings::NumericSettings;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub function: String,
    pub rotor_count: usize,
    pub magnitude_sum: f64,
    pub cached_states: usize,
    pub interrupted: bool,
    pub states: Vec<RotorState>,
}

pub struct App {
    manager: RotorStateManager,
    events: EventLoop,
    settings: NumericSettings,
    stop_flag: Arc<AtomicBool>,
    cancel: CancelToken,
    args: Args,
    _listener: Subscription,
}

impl App {
    pub fn new(
        args: Args,
        config: &AppConfig,
        stop_flag: Arc<AtomicBool>,
        cancel: CancelToken,
    ) -> Result<Self, PoolError> {
        let events = EventLoop::new();
        let settings = NumericSettings::new(args.intervals.unwrap_or(config.integration.intervals));
        let context = EngineContext::new(&config.engine, &events)?.with_settings(settings.clone());

        let shape = args.shape.unwrap_or(config.function.shape);
        let function = Arc::new(shape.function(settings.precision()));
        let meta = FunctionMeta {
            name: shape.name().to_string(),
            frequency_strategy: args.strategy.clone().or_else(|| config.function.strategy.clone()),
            initial_rotor_count: args.rotors,
            preloaded: Vec::new(),
        };
        let manager = RotorStateManager::bind(function, meta, &context);
        let listener = manager.subscribe(Arc::new(|event: &RotorEvent| match event {
            RotorEvent::LoadFinished { count, cancelled } => {
                info!(count, cancelled, "rotor load finished")
            }
            RotorEvent::CountChanged { old, new } => info!(old, new, "rotor count changed"),
            RotorEvent::LoadIntercepted { count } => info!(count, "rotor load intercepted"),
            other => debug!(?other, "rotor event"),
        }));

        Ok(Self {
            manager,
            events,
            settings,
            stop_flag,
            cancel,
            args,
            _listener: listener,
        })
    }

    pub fn manager(&self) -> &RotorStateManager {
        &self.manager
    }

    fn stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Runs one frame-paced delivery loop until the manager stops loading.
    fn pump_until_idle(&mut self) {
        while self.manager.is_loading() {
            if self.stopped() {
                info!("stop requested: cancelling load");
                self.manager.cancel_load(true);
                break;
            }
            self.events.dispatch_timeout(FRAME);
        }
        self.events.dispatch_pending();
    }

    pub fn run(&mut self) -> RunSummary {
        let verdict = match (self.args.sync, self.args.rotors) {
            (true, Some(count)) => self.manager.set_rotor_count_sync(count, &self.cancel),
            _ => self.manager.consider_initialize(),
        };
        debug!(?verdict, "initial request");
        self.pump_until_idle();

        if let Some(intervals) = self.args.then_intervals {
            if !self.stopped() && self.settings.set_integration_intervals(intervals) {
                info!(intervals, "precision changed, reloading");
                self.pump_until_idle();
            }
        }

        if verdict == LoadVerdict::Intercepted {
            info!("initial load was intercepted");
        }

        let states = self.manager.active_rotor_states();
        RunSummary {
            function: self.manager.function_name().unwrap_or_default().to_string(),
            rotor_count: self.manager.rotor_count(),
            magnitude_sum: self.manager.all_rotors_magnitude_scale_sum(),
            cached_states: self.manager.all_loaded_rotor_states_count(),
            interrupted: self.stopped() || self.cancel.is_cancelled(),
            states: states.into_iter().take(self.args.print).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn headless_run_settles_on_requested_count() {
        let args = Args::parse_from([
            "epicycles",
            "--shape",
            "circle",
            "--rotors",
            "9",
            "--intervals",
            "64",
            "--print",
            "3",
        ]);
        let config = AppConfig::default();
        let mut app = App::new(
            args,
            &config,
            Arc::new(AtomicBool::new(false)),
            CancelToken::new(),
        )
        .expect("app");
        let summary = app.run();
        assert_eq!(summary.function, "circle");
        assert_eq!(summary.rotor_count, 9);
        assert_eq!(summary.states.len(), 3);
        assert!(summary.cached_states >= 9);
        // Unit circle: only the +1 term is non-zero, counted once.
        assert!((summary.magnitude_sum - 1.0).abs() < 1e-9);
        assert!(!summary.interrupted);
    }

    #[test]
    fn precision_change_reloads_same_count() {
        let args = Args::parse_from([
            "epicycles",
            "--shape",
            "square",
            "--rotors",
            "5",
            "--intervals",
            "64",
            "--then-intervals",
            "128",
            "--sync",
        ]);
        let mut app = App::new(
            args,
            &AppConfig::default(),
            Arc::new(AtomicBool::new(false)),
            CancelToken::new(),
        )
        .expect("app");
        let summary = app.run();
        assert_eq!(summary.rotor_count, 5);
        assert_eq!(summary.cached_states, 5);
    }
}
