//! Host interop: globals, native functions, console capture, tracing.

use jay::{CollectStringConsole, Interpreter, Object, RecordingTracer, TraceEvent};
use pretty_assertions::assert_eq;

#[test]
fn globals_flow_both_ways() {
    let mut interp = Interpreter::new();
    interp.set_global("x", Object::Number(41.0));
    assert_eq!(interp.evaluate("x + 1").unwrap(), Object::Number(42.0));

    interp.evaluate("x = x * 2; fresh = 'made by script';").unwrap();
    assert_eq!(interp.get_global("x"), Object::Number(82.0));
    assert_eq!(interp.get_global("fresh"), Object::String("made by script".to_owned()));
    assert_eq!(interp.get_global("absent"), Object::Undefined);
}

#[test]
fn structured_globals_convert() {
    let mut interp = Interpreter::new();
    interp.set_global("config", Object::Array(vec![Object::Number(1.0), Object::String("two".to_owned())]));
    assert_eq!(interp.evaluate("config.length").unwrap(), Object::Number(2.0));
    assert_eq!(interp.evaluate("config[1]").unwrap(), Object::String("two".to_owned()));
}

#[test]
fn native_functions_are_callable() {
    let mut interp = Interpreter::new();
    interp.set_native("add", |args| {
        let sum = args
            .iter()
            .map(|arg| f64::try_from(arg).unwrap_or(f64::NAN))
            .sum();
        Ok(Object::Number(sum))
    });
    assert_eq!(interp.evaluate("add(1, 2, 3)").unwrap(), Object::Number(6.0));
}

#[test]
fn native_function_errors_are_thrown_into_the_script() {
    let mut interp = Interpreter::new();
    interp.set_native("explode", |_| Err(Object::String("bad input".to_owned())));
    assert_eq!(
        interp.evaluate("try { explode() } catch(e) { 'caught: ' + e }").unwrap(),
        Object::String("caught: bad input".to_owned())
    );
}

#[test]
fn console_output_is_captured() {
    let console = CollectStringConsole::new();
    let mut interp = Interpreter::new();
    interp.set_console(Box::new(console.clone()));
    interp.evaluate("console.log('hello', 1, true); console.error('oops')").unwrap();
    assert_eq!(console.lines(), vec!["hello 1 true".to_owned(), "oops".to_owned()]);
}

#[test]
fn recording_tracer_sees_balanced_calls() {
    let tracer = RecordingTracer::new();
    let mut interp = Interpreter::new();
    interp.set_tracer(Box::new(tracer.clone()));
    interp
        .evaluate("function f(n){ return n === 0 ? 0 : f(n - 1) } f(3)")
        .unwrap();

    let events = tracer.events();
    let calls = events.iter().filter(|e| matches!(e, TraceEvent::Call { .. })).count();
    let returns = events.iter().filter(|e| matches!(e, TraceEvent::Return { .. })).count();
    assert_eq!(calls, 4);
    assert_eq!(calls, returns);

    // Frame labels carry the function name and source offsets.
    let TraceEvent::Call { frame, depth } = &events[0] else {
        panic!("expected call event first");
    };
    assert!(frame.starts_with("f("), "{frame}");
    assert_eq!(*depth, 1);
}

#[test]
fn value_accessor_reports_last_result() {
    let mut interp = Interpreter::new();
    interp.evaluate("1; 2; 'three'").unwrap();
    assert_eq!(interp.value(), &Object::String("three".to_owned()));
}
