//! Property-based invariant tests for `EzCache`.
//!
//! 1. Synchronous operation sequences leave the cache in the same state as a
//!    straightforward model of the transition table.
//! 2. A failure never changes the held value.
//! 3. Only the latest of several pending sources of one kind can land.
//! 4. Push streams never repeat a value and always end on the pulled value.

use std::cell::RefCell;
use std::rc::Rc;

use ez_core::source::{self, Resolver};
use ez_state::{CacheAction, CacheState, EzCache, OperationStatus};
use proptest::prelude::*;

type Cache = EzCache<u8, u8>;

#[derive(Debug, Clone)]
enum Op {
    Run {
        action: CacheAction,
        outcome: Result<u8, u8>,
        ignore_response: bool,
    },
    Next(u8),
    Reset,
    ResetState,
}

fn action() -> impl Strategy<Value = CacheAction> {
    prop::sample::select(CacheAction::ALL.to_vec())
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (action(), prop::result::maybe_ok(0u8..8, 0u8..4), any::<bool>()).prop_map(
            |(action, outcome, ignore)| Op::Run {
                action,
                outcome,
                ignore_response: ignore,
            }
        ),
        1 => (0u8..8).prop_map(Op::Next),
        1 => Just(Op::Reset),
        1 => Just(Op::ResetState),
    ]
}

fn apply(cache: &Cache, op: &Op) {
    match op.clone() {
        Op::Run {
            action,
            outcome,
            ignore_response,
        } => {
            let source = source::from_result(outcome);
            match (action, ignore_response) {
                (CacheAction::Load, false) => cache.load(source),
                (CacheAction::Load, true) => cache.load_ignore_response(source),
                (CacheAction::Save, false) => cache.save(source),
                (CacheAction::Save, true) => cache.save_ignore_response(source),
                (CacheAction::Update, false) => cache.update(source),
                (CacheAction::Update, true) => cache.update_ignore_response(source),
                (CacheAction::Delete, false) => cache.delete(source),
                (CacheAction::Delete, true) => cache.delete_ignore_response(source),
            }
        }
        Op::Next(v) => cache.next(v),
        Op::Reset => cache.reset(),
        Op::ResetState => cache.reset_state(),
    }
}

fn model(state: CacheState<u8, u8>, op: &Op) -> CacheState<u8, u8> {
    match op.clone() {
        Op::Run {
            action,
            outcome: Ok(v),
            ignore_response,
        } => {
            let state = state.with_status(action, OperationStatus::succeeded());
            if ignore_response { state } else { state.with_value(Some(v)) }
        }
        Op::Run {
            action,
            outcome: Err(e),
            ..
        } => state.with_status(action, OperationStatus::failed(e + 100)),
        Op::Next(v) => CacheState::new(Some(v)),
        Op::Reset => CacheState::new(None),
        Op::ResetState => state.cleared(),
    }
}

proptest! {
    #[test]
    fn matches_transition_model(initial in proptest::option::of(0u8..8), ops in prop::collection::vec(op(), 0..48)) {
        let cache = EzCache::<u8, u8>::from_config(
            ez_state::CacheConfig::new().with_error_handler(|e: u8, _| e + 100),
        );
        if let Some(v) = initial {
            cache.next(v);
        }
        let mut expected = CacheState::new(initial);

        for op in &ops {
            apply(&cache, op);
            expected = model(expected, op);
            prop_assert_eq!(&cache.state(), &expected);
            prop_assert_eq!(cache.error().get(), expected.first_error().copied());
            prop_assert!(!cache.state().is_busy());
        }
    }

    #[test]
    fn failures_keep_value(initial in 0u8..8, errors in prop::collection::vec((action(), 0u8..4), 1..16)) {
        let cache = Cache::with_initial(initial);
        for (action, error) in errors {
            match action {
                CacheAction::Load => cache.load(source::fail(error)),
                CacheAction::Save => cache.save(source::fail(error)),
                CacheAction::Update => cache.update(source::fail(error)),
                CacheAction::Delete => cache.delete(source::fail(error)),
            }
            prop_assert_eq!(cache.value(), Some(initial));
            prop_assert_eq!(cache.action_error(action).get(), Some(error));
        }
    }

    #[test]
    fn only_latest_pending_load_lands(count in 1usize..8, order in prop::collection::vec(any::<prop::sample::Index>(), 0..8)) {
        let cache = Cache::new();
        let resolvers: Vec<Resolver<u8, u8>> = (0..count)
            .map(|_| {
                let (pending, resolver) = source::deferred();
                cache.load(pending);
                resolver
            })
            .collect();

        for index in order {
            let i = index.index(count);
            if i + 1 != count {
                resolvers[i].resolve(i as u8);
            }
        }
        prop_assert_eq!(cache.value(), None);
        prop_assert!(cache.loading().get());

        let last = count - 1;
        resolvers[last].resolve(last as u8);
        prop_assert_eq!(cache.value(), Some(last as u8));
        prop_assert!(cache.loaded().get());
    }

    #[test]
    fn pushed_values_are_distinct_and_current(values in prop::collection::vec(0u8..4, 0..32)) {
        let cache = Cache::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let stream = cache.observe_value();
        let _sub = stream.subscribe(move |v| sink.borrow_mut().push(*v));

        for v in values {
            cache.load(source::of(v));
        }

        let seen = seen.borrow();
        prop_assert!(seen.windows(2).all(|pair| pair[0] != pair[1]));
        prop_assert_eq!(seen.last().copied(), Some(cache.value()));
        prop_assert_eq!(stream.get(), cache.value());
    }
}
