use std::sync::Arc;
use std::time::Duration;

use approx::assert_abs_diff_eq;
use epicycles::config::EngineConfig;
use epicycles::core::{
    CancelToken, EngineContext, EventLoop, ManagerStatus, RotorStateManager, WorkerPool,
};
use epicycles::function::{FunctionMeta, Shape};
use epicycles::settings::NumericSettings;

fn context(events: &EventLoop, settings: &NumericSettings) -> EngineContext {
    let config = EngineConfig {
        chunk_size: 8,
        worker_threads: 2,
        initial_rotor_count: 7,
        max_cached_states: 0,
    };
    EngineContext::with_pool(&config, WorkerPool::new(2).expect("pool"), events)
        .with_settings(settings.clone())
}

#[test]
fn precision_change_reloads_every_bound_manager() {
    let mut events = EventLoop::new();
    let settings = NumericSettings::new(64);
    let context = context(&events, &settings);

    let square = RotorStateManager::bind(
        Arc::new(Shape::Square.function(settings.precision())),
        FunctionMeta::named("square"),
        &context,
    );
    let star = RotorStateManager::bind(
        Arc::new(Shape::Star.function(settings.precision())),
        FunctionMeta::named("star"),
        &context,
    );
    let token = CancelToken::new();
    square.set_rotor_count_sync(9, &token);
    star.set_rotor_count_sync(5, &token);
    let coarse = square.get_rotor_state(1).expect("loaded");
    assert_eq!(settings.observer_count(), 2);

    assert!(settings.set_integration_intervals(1024));
    assert!(events.dispatch_until(Duration::from_secs(10), || {
        !square.is_loading() && !star.is_loading()
    }));

    assert_eq!(square.status(), ManagerStatus::Idle { count: 9 });
    assert_eq!(star.status(), ManagerStatus::Idle { count: 5 });
    assert_eq!(square.all_loaded_rotor_states_count(), 9);
    assert_eq!(star.all_loaded_rotor_states_count(), 5);

    // Same term, finer integration: close but recomputed.
    let fine = square.get_rotor_state(1).expect("reloaded");
    assert_eq!(fine.frequency, coarse.frequency);
    assert_abs_diff_eq!(fine.magnitude(), coarse.magnitude(), epsilon = 1e-2);

    // Unchanged value does not notify.
    assert!(!settings.set_integration_intervals(1024));
    assert!(!square.is_loading());
}

#[test]
fn dropped_manager_stops_observing() {
    let events = EventLoop::new();
    let settings = NumericSettings::new(64);
    let manager = RotorStateManager::bind(
        Arc::new(Shape::Circle.function(settings.precision())),
        FunctionMeta::default(),
        &context(&events, &settings),
    );
    assert_eq!(settings.observer_count(), 1);
    drop(manager);
    assert_eq!(settings.observer_count(), 0);
}

#[test]
fn empty_slot_ignores_everything() {
    let events = EventLoop::new();
    let settings = NumericSettings::new(64);
    let _context = context(&events, &settings);
    let manager = RotorStateManager::default();

    assert!(manager.function_name().is_none());
    assert!(!manager.cancel_load(true));
    manager.clear_and_reset_sync();
    assert_eq!(manager.status(), ManagerStatus::Idle { count: 0 });
    assert!(manager.active_rotor_states().is_empty());
    assert!(manager.rotor_states_snapshot().is_empty());
    assert_eq!(settings.observer_count(), 0);
}
