//! catch/throw: matching, stack discipline, and uncaught tags per thread

mod common;

use std::thread;

use common::{raised, runtime};
use dynobj_kernel::catch::CaptureState;
use dynobj_kernel::error::ErrorDetail;
use dynobj_kernel::prelude::*;

#[test]
fn test_throw_returns_payload_from_catch() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let result = ctx.enter_catch(Value::str("x"), |ctx, _| {
        ctx.perform_throw(&Value::str("x"), Some(Value::Int(42)))
    });
    assert_eq!(result.unwrap(), Value::Int(42));
}

#[test]
fn test_innermost_tag_wins() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let mut inner_result = None;
    let outer = ctx.enter_catch(Value::str("x"), |ctx, _| {
        let inner = ctx.enter_catch(Value::str("x"), |ctx, _| {
            ctx.perform_throw(&Value::str("x"), Some(Value::Int(1)))
        });
        inner_result = Some(inner.clone());
        // The outer point was never matched
        assert_eq!(ctx.capture_points().len(), 1);
        assert_eq!(ctx.capture_points()[0].state(), CaptureState::Active);
        Ok(Value::str("outer finished"))
    });
    assert_eq!(inner_result.unwrap().unwrap(), Value::Int(1));
    assert_eq!(outer.unwrap(), Value::str("outer finished"));
}

#[test]
fn test_throw_to_outer_passes_through_inner() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let result = ctx.enter_catch(Value::sym("outer"), |ctx, _| {
        let inner = ctx.enter_catch(Value::sym("inner"), |ctx, _| {
            ctx.perform_throw(&Value::sym("outer"), Some(Value::str("out")))
        });
        assert!(matches!(inner, Err(Flow::Throw(_))));
        assert_eq!(ctx.capture_depth(), 1);
        inner
    });
    assert_eq!(result.unwrap(), Value::str("out"));
    assert_eq!(ctx.capture_depth(), 0);
}

#[test]
fn test_unrelated_error_releases_capture_point() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let err = raised(ctx.enter_catch(Value::str("y"), |ctx, _| ctx.raise(&[Value::str("boom")])));
    assert_eq!(err.message_text(), "boom");
    assert_eq!(ctx.capture_depth(), 0);
    assert!(ctx.capture_points().is_empty());
}

#[test]
fn test_uncaught_tag_on_primary_thread() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let err = raised(ctx.perform_throw(&Value::str("nope"), None));
    assert_eq!(err.class(), &ErrorClass::ArgumentError);
    assert_eq!(
        err.detail(),
        &ErrorDetail::UncaughtTag {
            tag: Value::str("nope")
        }
    );
    insta::assert_snapshot!(err.message_text(), @"uncaught throw `nope'");
}

#[test]
fn test_uncaught_tag_ignores_other_tags() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let err = raised(ctx.enter_catch(Value::sym("a"), |ctx, _| {
        ctx.perform_throw(&Value::sym("b"), Some(Value::Int(1)))
    }));
    assert!(err.message_text().contains("`b'"));
    assert_eq!(ctx.capture_depth(), 0);
}

#[test]
fn test_uncaught_tag_on_worker_thread_names_thread() {
    let runtime = runtime();
    let _main = runtime.main_context().unwrap();

    let worker_runtime = runtime.clone();
    let (thread_id, err) = thread::spawn(move || {
        let mut ctx = worker_runtime.thread_context();
        let err = raised(ctx.perform_throw(&Value::str("nope"), None));
        (ctx.thread_id(), err)
    })
    .join()
    .unwrap();

    assert_eq!(err.class(), &ErrorClass::ThreadError);
    assert_eq!(
        err.message_text(),
        format!("uncaught throw `nope' in thread {}", thread_id)
    );
    assert!(err.message_text().contains("in thread 0x"));
}

#[test]
fn test_worker_catch_is_independent_of_main_stack() {
    let runtime = runtime();
    let mut main = runtime.main_context().unwrap();
    let worker_runtime = runtime.clone();

    let result = main.enter_catch(Value::sym("shared"), move |_, _| {
        let worker = thread::spawn(move || {
            let mut ctx = worker_runtime.thread_context();
            // The main thread's point is invisible here
            raised(ctx.perform_throw(&Value::sym("shared"), None))
        });
        let err = worker.join().unwrap();
        assert_eq!(err.class(), &ErrorClass::ThreadError);
        Ok(Value::Nil)
    });
    assert_eq!(result.unwrap(), Value::Nil);
}

#[test]
fn test_cancellation_releases_capture_points() {
    let runtime = runtime();
    let mut ctx = runtime.main_context().unwrap();
    let token = runtime.cancel_token().clone();
    let result = ctx.enter_catch(Value::sym("a"), |ctx, _| {
        ctx.enter_catch(Value::sym("b"), |ctx, _| {
            token.request();
            ctx.check_interrupts()?;
            Ok(Value::Nil)
        })
    });
    assert!(matches!(result, Err(Flow::Cancelled)));
    assert_eq!(ctx.capture_depth(), 0);

    // No new point is pushed while cancellation is pending
    let result = ctx.enter_catch(Value::sym("c"), |_, _| Ok(Value::Nil));
    assert!(matches!(result, Err(Flow::Cancelled)));
    runtime.cancel_token().reset();
    assert!(ctx.enter_catch(Value::sym("c"), |_, _| Ok(Value::Nil)).is_ok());
}

#[test]
fn test_name_error_compat_mode() {
    let runtime = Runtime::new(RuntimeConfig::default().with_throw_compat(ThrowCompat::NameError));
    let mut ctx = runtime.main_context().unwrap();
    let err = raised(ctx.perform_throw(&Value::sym("gone"), None));
    assert_eq!(err.class(), &ErrorClass::NameError);
    assert_eq!(err.name(), Some(&Symbol::new("gone")));
}
