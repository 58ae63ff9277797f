//! Behavioural tests for `EzCache` driven through its public API.
//!
//! Delayed sources run on the virtual-time `Scheduler`; nothing sleeps.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use ez_core::source::{self, Resolver};
use ez_core::{Computed, Scheduler, Source, SourceExt};
use ez_state::{CacheAction, CacheConfig, EzCache};

type Cache = EzCache<String, String>;

fn s(v: &str) -> String {
    v.to_string()
}

/// Subscribe, record what is replayed, unsubscribe.
fn latest<V: Clone + PartialEq + 'static>(stream: &Computed<V>) -> Option<V> {
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let subscription = stream.subscribe(move |v| *sink.borrow_mut() = Some(v.clone()));
    subscription.unsubscribe();
    seen.take()
}

fn start<S>(cache: &Cache, action: CacheAction, source: S)
where
    S: Source<Item = String, Error = String>,
{
    match action {
        CacheAction::Load => cache.load(source),
        CacheAction::Save => cache.save(source),
        CacheAction::Update => cache.update(source),
        CacheAction::Delete => cache.delete(source),
    }
}

fn start_ignoring<S>(cache: &Cache, action: CacheAction, source: S)
where
    S: Source<Error = String>,
{
    match action {
        CacheAction::Load => cache.load_ignore_response(source),
        CacheAction::Save => cache.save_ignore_response(source),
        CacheAction::Update => cache.update_ignore_response(source),
        CacheAction::Delete => cache.delete_ignore_response(source),
    }
}

fn delayed(scheduler: &Scheduler, value: &str) -> impl Source<Item = String, Error = String> {
    source::of(s(value)).delay(scheduler, Duration::from_millis(5))
}

// -- construction and direct writes --------------------------------------------

#[test]
fn value_starts_empty() {
    let cache = Cache::new();
    assert_eq!(cache.value(), None);
    assert_eq!(Cache::default().value(), None);
}

#[test]
fn value_returns_initial_value() {
    let cache = Cache::with_initial(s("value"));
    assert_eq!(cache.value(), Some(s("value")));
}

#[test]
fn observe_value_replays_initial_value() {
    let cache = Cache::with_initial(s("value"));
    assert_eq!(latest(&cache.observe_value()), Some(Some(s("value"))));
}

#[test]
fn next_replaces_value() {
    let cache = Cache::with_initial(s(""));
    cache.next(s("value"));
    assert_eq!(cache.value(), Some(s("value")));
}

#[test]
fn next_clears_statuses_and_cancels() {
    let cache = Cache::new();
    let (pending, resolver) = source::deferred();
    cache.load(pending);
    cache.save(source::fail(s("boom")));

    cache.next(s("direct"));
    resolver.resolve(s("late"));

    assert!(resolver.is_cancelled());
    assert_eq!(cache.value(), Some(s("direct")));
    assert!(!cache.loading().get());
    assert_eq!(cache.error().get(), None);
}

#[test]
fn custom_error_handler_from_constructor() {
    let cache = Cache::with_error_handler(|_, _| s("custom error"));
    cache.load(source::fail(s("original")));
    assert_eq!(latest(&cache.load_error()), Some(Some(s("custom error"))));
}

#[test]
fn custom_error_handler_from_config_keeps_initial_value() {
    let cache = CacheConfig::new()
        .with_initial(s(""))
        .with_error_handler(|_, _| s("custom error"))
        .build();
    cache.load(source::fail(s("original")));
    assert_eq!(cache.load_error().get(), Some(s("custom error")));
    assert_eq!(cache.value(), Some(s("")));
}

#[test]
fn error_handler_receives_the_operation_kind() {
    let cache = Cache::with_error_handler(|error, action| format!("{action}: {error}"));
    for action in CacheAction::ALL {
        start(&cache, action, source::fail(s("nope")));
        assert_eq!(cache.action_error(action).get(), Some(format!("{action}: nope")));
    }
}

#[test]
fn reset_clears_value() {
    let cache = Cache::with_initial(s("value"));
    cache.reset();
    assert_eq!(cache.value(), None);
}

#[test]
fn reset_cancels_in_flight_operations() {
    let scheduler = Scheduler::new();
    let cache = Cache::with_initial(s("value"));
    cache.load(delayed(&scheduler, "late"));

    cache.reset();
    scheduler.advance(Duration::from_millis(6));

    assert_eq!(cache.value(), None);
    assert!(!cache.loaded().get());
    assert_eq!(scheduler.pending(), 0);
}

#[test]
fn complete_finalises() {
    let cache = Cache::with_initial(s(""));
    cache.load(source::of(s("")));
    cache.complete();

    let called = Rc::new(RefCell::new(false));
    let flag = Rc::clone(&called);
    let subscription = cache.observe_value().subscribe(move |_| *flag.borrow_mut() = true);

    assert!(subscription.is_detached());
    assert!(!*called.borrow());
    assert!(cache.is_completed());
}

#[test]
fn complete_stops_existing_streams() {
    let cache = Cache::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = cache.observe_value().subscribe(move |v| sink.borrow_mut().push(v.clone()));

    cache.next(s("before"));
    assert_eq!(*seen.borrow(), vec![None, Some(s("before"))]);

    cache.complete();
    cache.next(s("after"));
    cache.load(source::of(s("after")));

    assert_eq!(*seen.borrow(), vec![None, Some(s("before"))]);
    assert_eq!(cache.value(), Some(s("before")));
}

#[test]
fn streams_from_temporary_getters_keep_emitting() {
    let cache = Cache::new();
    let loaded = Rc::new(RefCell::new(Vec::new()));
    let loaded_sink = Rc::clone(&loaded);
    let _loaded_sub = cache.loaded().subscribe(move |v| loaded_sink.borrow_mut().push(*v));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let error_sink = Rc::clone(&errors);
    let _error_sub = cache.error().subscribe(move |e| error_sink.borrow_mut().push(e.clone()));

    cache.load(source::of(s("v")));
    cache.save(source::fail(s("boom")));

    assert_eq!(*loaded.borrow(), vec![false, true]);
    assert_eq!(*errors.borrow(), vec![None, Some(s("boom"))]);
}

#[test]
fn dropping_a_stream_subscription_stops_delivery() {
    let cache = Cache::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let subscription = cache.observe_value().subscribe(move |v| sink.borrow_mut().push(v.clone()));

    cache.next(s("one"));
    subscription.unsubscribe();
    cache.next(s("two"));

    assert_eq!(*seen.borrow(), vec![None, Some(s("one"))]);
}

#[test]
fn operations_after_complete_do_not_subscribe() {
    let cache = Cache::new();
    cache.complete();

    let (pending, resolver) = source::deferred();
    cache.update(pending);

    assert!(!resolver.is_subscribed());
    assert!(!cache.is_pending(CacheAction::Update));
}

#[test]
fn complete_cancels_pending_sources() {
    let cache = Cache::new();
    let (pending, resolver) = source::deferred();
    cache.delete(pending);

    cache.complete();

    assert!(resolver.is_cancelled());
    assert!(!cache.is_pending(CacheAction::Delete));
}

// -- shared per-operation behaviour --------------------------------------------

#[test]
fn every_operation_stores_its_response() {
    for action in CacheAction::ALL {
        let cache = Cache::with_initial(s(""));
        start(&cache, action, source::of(s("value")));
        assert_eq!(cache.value(), Some(s("value")), "{action}");
        assert!(cache.succeeded(action).get(), "{action}");
    }
}

#[test]
fn ignore_response_keeps_value_but_succeeds() {
    for action in CacheAction::ALL {
        let cache = Cache::with_initial(s("value"));
        start_ignoring(&cache, action, source::of(s("response")));
        assert_eq!(cache.value(), Some(s("value")), "{action}");
        assert!(cache.succeeded(action).get(), "{action}");
    }
}

#[test]
fn ignore_response_accepts_any_item_type() {
    let cache = Cache::with_initial(s("value"));
    cache.save_ignore_response(source::of::<u16, String>(201));
    cache.update_ignore_response(source::of::<(), String>(()));
    cache.delete_ignore_response(source::empty::<bool, String>());
    cache.load_ignore_response(source::of::<Vec<u8>, String>(vec![1, 2]));

    assert_eq!(cache.value(), Some(s("value")));
    assert!(cache.saved().get());
    assert!(cache.updated().get());
    assert!(cache.loaded().get());
}

#[test]
fn failure_sets_error_and_keeps_value() {
    for action in CacheAction::ALL {
        let cache = Cache::with_initial(s("kept"));
        start(&cache, action, source::fail(format!("{action} error")));

        let expected = Some(format!("{action} error"));
        assert_eq!(latest(&cache.action_error(action)), Some(expected.clone()));
        assert_eq!(latest(&cache.error()), Some(expected));
        assert_eq!(cache.value(), Some(s("kept")));
        assert!(!cache.in_progress(action).get());
        assert!(!cache.succeeded(action).get());
    }
}

#[test]
fn reset_state_clears_errors_and_success() {
    for action in CacheAction::ALL {
        let cache = Cache::new();
        start(&cache, action, source::fail(s("error")));
        cache.reset_state();
        assert_eq!(latest(&cache.action_error(action)), Some(None), "{action}");

        start(&cache, action, source::of(s("value")));
        cache.reset_state();
        assert_eq!(latest(&cache.succeeded(action)), Some(false), "{action}");
        assert_eq!(cache.value(), Some(s("value")), "{action}");
    }
}

#[test]
fn reset_state_prevents_late_results() {
    let cache = Cache::new();
    let (pending, resolver) = source::deferred();
    cache.save(pending);

    cache.reset_state();
    resolver.resolve(s("late"));

    assert_eq!(cache.value(), None);
    assert!(!cache.saved().get());
    assert!(!cache.saving().get());
}

#[test]
fn in_progress_while_delayed_source_is_pending() {
    for action in CacheAction::ALL {
        let scheduler = Scheduler::new();
        let cache = Cache::with_initial(s(""));
        start(&cache, action, delayed(&scheduler, "value"));

        assert_eq!(latest(&cache.in_progress(action)), Some(true), "{action}");
        assert_eq!(latest(&cache.succeeded(action)), Some(false), "{action}");
        assert!(cache.is_pending(action));
    }
}

#[test]
fn settles_after_delay() {
    for action in CacheAction::ALL {
        let scheduler = Scheduler::new();
        let cache = Cache::with_initial(s(""));
        start(&cache, action, delayed(&scheduler, "value"));

        let progress = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&progress);
        let subscription = cache.in_progress(action).subscribe(move |v| sink.borrow_mut().push(*v));
        scheduler.advance(Duration::from_millis(6));
        subscription.unsubscribe();

        assert_eq!(*progress.borrow(), vec![true, false], "{action}");
        assert_eq!(latest(&cache.succeeded(action)), Some(true), "{action}");
        assert_eq!(cache.value(), Some(s("value")), "{action}");
        assert!(!cache.is_pending(action));
    }
}

#[test]
fn still_pending_before_delay_elapses() {
    let scheduler = Scheduler::new();
    let cache = Cache::with_initial(s(""));
    cache.update(delayed(&scheduler, "value"));

    scheduler.advance(Duration::from_millis(4));

    assert!(cache.updating().get());
    assert!(!cache.updated().get());
    assert_eq!(cache.value(), Some(s("")));
}

// -- concurrency --------------------------------------------------------------

#[test]
fn second_operation_of_same_kind_cancels_first() {
    let cache = Cache::new();
    let (first, first_resolver) = source::deferred();
    let (second, second_resolver): (_, Resolver<String, String>) = source::deferred();
    cache.load(first);
    cache.load(second);

    assert!(first_resolver.is_cancelled());
    first_resolver.resolve(s("first"));
    assert_eq!(cache.value(), None);
    assert!(cache.loading().get());

    second_resolver.resolve(s("second"));
    assert_eq!(cache.value(), Some(s("second")));
    assert!(cache.loaded().get());
}

#[test]
fn different_kinds_run_independently() {
    let scheduler = Scheduler::new();
    let cache = Cache::new();
    cache.load(source::of(s("loaded")));
    cache.save(delayed(&scheduler, "saved"));
    cache.update(source::fail(s("rejected")));

    let state = cache.state();
    assert!(state.succeeded(CacheAction::Load));
    assert!(state.in_progress(CacheAction::Save));
    assert_eq!(state.error(CacheAction::Update).cloned(), Some(s("rejected")));
    assert!(cache.is_pending(CacheAction::Save));

    scheduler.advance(Duration::from_millis(5));

    let state = cache.state();
    assert!(state.succeeded(CacheAction::Load));
    assert!(state.succeeded(CacheAction::Save));
    assert_eq!(state.error(CacheAction::Update).cloned(), Some(s("rejected")));
    assert_eq!(cache.value(), Some(s("saved")));
}

#[test]
fn error_prefers_load_then_save_then_update_then_delete() {
    let cache = Cache::new();
    let errors = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&errors);
    let _sub = cache.error().subscribe(move |e| sink.borrow_mut().push(e.clone()));

    cache.delete(source::fail(s("delete")));
    cache.update(source::fail(s("update")));
    cache.save(source::fail(s("save")));
    cache.load(source::fail(s("load")));
    cache.load(source::of(s("ok")));

    assert_eq!(
        *errors.borrow(),
        vec![None, Some(s("delete")), Some(s("update")), Some(s("save")), Some(s("load")), Some(s("save"))]
    );
}

#[test]
fn cancel_drops_source_without_publishing() {
    let cache = Cache::new();
    let (pending, resolver) = source::deferred();
    cache.save(pending);

    cache.cancel(CacheAction::Save);
    resolver.resolve(s("late"));

    assert!(resolver.is_cancelled());
    assert!(!cache.is_pending(CacheAction::Save));
    assert!(cache.saving().get());
    assert_eq!(cache.value(), None);
}

#[test]
fn cancel_all_leaves_other_caches_alone() {
    let a = Cache::new();
    let b = Cache::new();
    let (first, first_resolver) = source::deferred();
    let (second, second_resolver) = source::deferred();
    a.load(first);
    b.load(second);

    a.cancel_all();
    first_resolver.resolve(s("a"));
    second_resolver.resolve(s("b"));

    assert_eq!(a.value(), None);
    assert_eq!(b.value(), Some(s("b")));
}

#[test]
fn multi_value_source_updates_each_time() {
    let cache = EzCache::<u32, String>::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = cache.observe_value().subscribe(move |v| sink.borrow_mut().push(*v));

    cache.load(source::from_iter(vec![1, 2, 2, 3]));

    assert_eq!(*seen.borrow(), vec![None, Some(1), Some(2), Some(3)]);
}

#[test]
fn streams_emit_only_distinct_values() {
    let cache = Cache::new();
    let loading = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&loading);
    let _sub = cache.loading().subscribe(move |v| sink.borrow_mut().push(*v));

    cache.load(source::of(s("a")));
    cache.save(source::of(s("b")));
    cache.load(source::of(s("c")));

    assert_eq!(*loading.borrow(), vec![false, true, false, true, false]);
}

#[test]
fn clones_share_state() {
    let cache = Cache::new();
    let handle = cache.clone();
    handle.next(s("shared"));
    assert_eq!(cache.value(), Some(s("shared")));
}

#[test]
fn observe_state_tracks_every_transition() {
    let scheduler = Scheduler::new();
    let cache = Cache::with_initial(s("v0"));
    let states = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&states);
    let _sub = cache.observe_state().subscribe(move |state| sink.borrow_mut().push(state.clone()));

    cache.load(delayed(&scheduler, "v1"));
    scheduler.run_until_idle();

    let states = states.borrow();
    assert_eq!(states.len(), 3);
    assert!(!states[0].is_busy());
    assert!(states[1].in_progress(CacheAction::Load));
    assert_eq!(states[2].value().map(String::as_str), Some("v1"));
}
