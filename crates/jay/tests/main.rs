use jay::{Exception, Interpreter, Object, Options};
use pretty_assertions::assert_eq;

fn eval(source: &str) -> Object {
    Interpreter::new().evaluate(source).unwrap()
}

fn eval_num(source: &str) -> f64 {
    let value = eval(source);
    (&value).try_into().unwrap_or_else(|_| panic!("expected number, got {value:?}"))
}

fn eval_str(source: &str) -> String {
    let value = eval(source);
    (&value).try_into().unwrap_or_else(|_| panic!("expected string, got {value:?}"))
}

/// Re-running the same interpreter keeps the global environment.
#[test]
fn repeat_eval_persists_globals() {
    let mut interp = Interpreter::new();
    interp.evaluate("var a = 1;").unwrap();
    let result = interp.evaluate("a + 1").unwrap();
    assert_eq!(result, Object::Number(2.0));
}

#[test]
fn last_value_is_last_top_level_statement() {
    assert_eq!(eval_num("1; 2; 3"), 3.0);
    assert_eq!(eval_num("1; 2; function f(){ return 99 } 3"), 3.0);
    assert_eq!(eval_num("1; 2; (function(){ return 99 })()"), 99.0);
}

#[test]
fn last_value_ignores_values_inside_calls() {
    // The 42 inside the call must not leak into the result slot.
    assert_eq!(eval_num("function f(){ 42; return 7 } f()"), 7.0);
}

#[test]
fn hoisting() {
    assert_eq!(eval_num("f(); function f(){ return 1 }"), 1.0);
    assert_eq!(eval("x; var x = 2;"), Object::Undefined);
    assert_eq!(eval_num("x; var x = 2; x"), 2.0);
}

#[test]
fn shadowing() {
    assert_eq!(eval_num("var x = 1; function f(){ var x = 2; return x } f()"), 2.0);
    assert_eq!(eval_num("var x = 1; function f(){ var x = 2; return x } f(); x"), 1.0);
    assert_eq!(eval_num("var x = 1; function g(){ x = 5 } g(); x"), 5.0);
}

#[test]
fn labeled_break() {
    let source = "outer: for(var i=0;i<3;i++){ for(var j=0;j<3;j++){ if(j===1) break outer; } } i";
    assert_eq!(eval_num(source), 0.0);
}

#[test]
fn labeled_continue() {
    let source = "var s=''; outer: for(var i=0;i<3;i++){ for(var j=0;j<3;j++){ if(j===1) continue outer; s+=''+i+j; } } s";
    assert_eq!(eval_str(source), "001020");
}

#[test]
fn labeled_block_break() {
    assert_eq!(eval_str("L: { if(true) break L; x=1 } typeof x"), "undefined");
}

#[test]
fn try_finally_precedence() {
    assert_eq!(eval_num("function t(){ try { return 1 } finally { return 2 } } t()"), 2.0);
    assert_eq!(eval_num("function t(){ try { return 1 } finally { } } t()"), 1.0);
    assert_eq!(
        eval_num("function t(){ try { throw 9 } catch(e){ return e } finally { } } t()"),
        9.0
    );
}

#[test]
fn catch_binding_is_transactional() {
    assert_eq!(eval_num("var e = 10; try { throw 1 } catch(e) { } e"), 10.0);
    assert_eq!(eval_str("try { throw 1 } catch(err) { } typeof err"), "undefined");
}

#[test]
fn switch_fall_through() {
    assert_eq!(eval_num("switch(1){ case 1: x=1; case 2: x=2; break; case 3: x=3 } x"), 2.0);
}

#[test]
fn switch_matches_strictly() {
    assert_eq!(eval_str("var r='none'; switch('1'){ case 1: r='num'; break; case '1': r='str'; break } r"), "str");
}

#[test]
fn switch_default_runs_when_nothing_matches() {
    assert_eq!(eval_num("switch(9){ case 1: x=1; break; default: x=42 } x"), 42.0);
}

#[test]
fn switch_default_falls_through_into_later_cases() {
    // Reaching `default` without a match behaves like a match at its
    // position: the cases after it run until a break.
    assert_eq!(eval_num("switch(5){ case 1: x=1; break; default: x=2; case 3: x=3; break; } x"), 3.0);
    assert_eq!(eval_str("var s=''; switch(9){ case 1: s+='a'; default: s+='b'; case 2: s+='c'; case 3: s+='d'; } s"), "bcd");
    // A matching case before `default` still skips it.
    assert_eq!(eval_num("switch(1){ case 1: x=1; break; default: x=2; case 3: x=3; break; } x"), 1.0);
}

#[test]
fn switch_swallows_continue_at_its_boundary() {
    // The switch consumes `continue`; the rest of the loop body still runs.
    assert_eq!(eval_str("var s=''; for(var i=0;i<3;i++){ switch(i){ case 1: continue; } s+=i; } s"), "012");
}

#[test]
fn object_literal_getter() {
    assert_eq!(eval_num("var o = { get a(){ return 42 } }; o.a"), 42.0);
}

#[test]
fn object_literal_setter() {
    let source = "var store; var o = { set a(v){ store = v * 2 } }; o.a = 21; store";
    assert_eq!(eval_num(source), 42.0);
}

#[test]
fn object_literal_duplicate_init_last_wins() {
    assert_eq!(eval_num("var o = { a: 1, a: 2 }; o.a"), 2.0);
}

#[test]
fn function_identity_keys() {
    assert_eq!(eval_num("function f(a,b){}; f.length"), 2.0);
    assert_eq!(eval_str("function f(a,b){}; f.name"), "f");
}

#[test]
fn anonymous_function_inherits_assignment_name() {
    assert_eq!(eval_str("var g = function(){}; g.name"), "g");
    assert_eq!(eval_str("h = function(){}; h.name"), "h");
}

#[test]
fn function_to_string_slices_source() {
    assert_eq!(
        eval_str("var f = function (a) { return a }; String(f)"),
        "function (a) { return a }"
    );
}

#[test]
fn delete_object_property() {
    assert_eq!(eval("var o={a:1}; delete o.a; 'a' in o"), Object::Bool(false));
    assert_eq!(eval("var o={a:1}; 'a' in o"), Object::Bool(true));
}

#[test]
fn delete_bare_identifier_removes_binding() {
    assert_eq!(eval_str("var o = 1; delete o; typeof o"), "undefined");
}

#[test]
fn with_overlays_object_properties() {
    assert_eq!(eval_num("var o={a:1}; with(o){ a }"), 1.0);
    // The overlay shadows outer bindings for the duration of the body.
    assert_eq!(eval_num("var a=9; var o={a:1}; with(o){ a }"), 1.0);
    assert_eq!(eval_num("var a=9; var o={}; with(o){ a }"), 9.0);
}

#[test]
fn scenario_sum_loop() {
    assert_eq!(eval_num("var s=0; for(var i=1;i<=10;i++) s+=i; s"), 55.0);
}

#[test]
fn scenario_fibonacci() {
    assert_eq!(eval_num("function fib(n){ return n<2 ? n : fib(n-1)+fib(n-2) } fib(10)"), 55.0);
}

#[test]
fn scenario_try_catch_finally_order() {
    let source = r#"var a=[]; try { throw {m:"x"} } catch(e){ a.push(e.m) } finally { a.push("f") } a.join(",")"#;
    assert_eq!(eval_str(source), "x,f");
}

#[test]
fn scenario_for_in_keys() {
    let source = "var o={}; o.k=0; var k; for(k in {a:1,b:2,c:3}) o[k]=k; o.a+o.b+o.c";
    assert_eq!(eval_str(source), "abc");
}

#[test]
fn scenario_named_function_expression() {
    assert_eq!(eval_num("var f=function g(n){ return n<=1 ? 1 : n*g(n-1) }; f(5)"), 120.0);
    // The name is only visible inside the function itself.
    assert_eq!(eval_str("var f=function g(n){ return 1 }; typeof g"), "undefined");
}

#[test]
fn for_in_enumerates_in_insertion_order() {
    assert_eq!(eval_str("var s=''; for(var k in {b:1,a:2,c:3}) s+=k; s"), "bac");
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(eval_num("var n=0; do { n++ } while(false); n"), 1.0);
    assert_eq!(eval_num("var n=0; do { n++ } while(n<3); n"), 3.0);
}

#[test]
fn continue_skips_iteration() {
    assert_eq!(eval_str("var s=''; for(var i=0;i<5;i++){ if(i%2===0) continue; s+=i; } s"), "13");
}

#[test]
fn closures_capture_their_activation_frame() {
    let source = "function counter(){ var n = 0; return function(){ n++; return n } } var c = counter(); c(); c()";
    assert_eq!(eval_num(source), 2.0);
    // Separate calls get separate frames.
    let source = "function counter(){ var n = 0; return function(){ n++; return n } } var a = counter(); var b = counter(); a(); a(); b()";
    assert_eq!(eval_num(source), 1.0);
}

#[test]
fn constructors_and_prototypes() {
    let mut interp = Interpreter::new();
    interp.evaluate("function Point(x, y){ this.x = x; this.y = y }").unwrap();
    assert_eq!(interp.evaluate("var p = new Point(3, 4); p.x + p.y").unwrap(), Object::Number(7.0));
    assert_eq!(interp.evaluate("p instanceof Point").unwrap(), Object::Bool(true));
    interp
        .evaluate("Point.prototype.norm = function(){ return this.x * this.x + this.y * this.y }")
        .unwrap();
    assert_eq!(interp.evaluate("p.norm()").unwrap(), Object::Number(25.0));
}

#[test]
fn constructor_returning_object_wins() {
    assert_eq!(eval_num("function C(){ return { x: 5 } } new C().x"), 5.0);
    assert_eq!(eval_num("function C(){ this.x = 1; return 42 } new C().x"), 1.0);
}

#[test]
fn method_call_binds_this() {
    assert_eq!(eval_num("var o = { x: 3, read: function(){ return this.x } }; o.read()"), 3.0);
    // A plain call runs with the root context instead.
    assert_eq!(eval_num("x = 8; function f(){ return this.x } f()"), 8.0);
}

#[test]
fn arguments_object() {
    assert_eq!(eval_num("function f(){ return arguments.length + arguments[0] } f(10, 20)"), 12.0);
    assert_eq!(eval("function f(a, b){ return b } f(1)"), Object::Undefined);
}

#[test]
fn operators() {
    assert_eq!(eval_str("1 + '2'"), "12");
    assert_eq!(eval_num("'3' * '4'"), 12.0);
    assert_eq!(eval_num("7 % 4"), 3.0);
    assert_eq!(eval("1 == '1'"), Object::Bool(true));
    assert_eq!(eval("1 === '1'"), Object::Bool(false));
    assert_eq!(eval("null == undefined"), Object::Bool(true));
    assert_eq!(eval("null === undefined"), Object::Bool(false));
    assert_eq!(eval_num("5 >> 1"), 2.0);
    assert_eq!(eval_num("-1 >>> 28"), 15.0);
    assert_eq!(eval_num("~5"), -6.0);
    assert_eq!(eval("'b' > 'a'"), Object::Bool(true));
    assert_eq!(eval_num("true + true"), 2.0);
}

#[test]
fn logical_operators_return_operands() {
    assert_eq!(eval_num("0 || 5"), 5.0);
    assert_eq!(eval_num("3 && 4"), 4.0);
    assert_eq!(eval_num("0 && x.boom"), 0.0);
    assert_eq!(eval("var called=false; function f(){ called=true } false && f(); called"), Object::Bool(false));
}

#[test]
fn update_expressions() {
    assert_eq!(eval_num("var i=5; i++ + i"), 11.0);
    assert_eq!(eval_num("var i=5; ++i + i"), 12.0);
    assert_eq!(eval_num("var a=[1]; a[0] += 2; a[0]"), 3.0);
    assert_eq!(eval_num("var o={n:1}; o.n--; o.n"), 0.0);
}

#[test]
fn sequence_and_conditional() {
    assert_eq!(eval_num("var x = (1, 2, 3); x"), 3.0);
    assert_eq!(eval_str("true ? 'yes' : 'no'"), "yes");
}

#[test]
fn typeof_operator() {
    assert_eq!(eval_str("typeof neverDeclared"), "undefined");
    assert_eq!(eval_str("typeof 1"), "number");
    assert_eq!(eval_str("typeof 'a'"), "string");
    assert_eq!(eval_str("typeof null"), "object");
    assert_eq!(eval_str("typeof {}"), "object");
    assert_eq!(eval_str("typeof function(){}"), "function");
}

#[test]
fn array_elisions_read_as_undefined() {
    assert_eq!(eval_num("var a = [1, , 3]; a.length"), 3.0);
    assert_eq!(eval_str("var a = [1, , 3]; typeof a[1]"), "undefined");
}

#[test]
fn array_methods() {
    assert_eq!(eval_num("var a=[1,2]; a.push(3, 4)"), 4.0);
    assert_eq!(eval_num("var a=[1,2,3]; a.pop(); a.length"), 2.0);
    assert_eq!(eval_num("[1,2,3].indexOf(3)"), 2.0);
    assert_eq!(eval_num("[1,2,3].indexOf(9)"), -1.0);
    assert_eq!(eval_str("[1,2,3].slice(1).join('')"), "23");
    assert_eq!(eval_str("[1].concat([2,3], 4).join('-')"), "1-2-3-4");
    assert_eq!(eval_num("var a=[1,2]; a.unshift(0); a[0]"), 0.0);
    assert_eq!(eval_num("var a=[1,2]; a.shift(); a[0]"), 2.0);
    assert_eq!(eval("Array.isArray([])"), Object::Bool(true));
    assert_eq!(eval("Array.isArray({})"), Object::Bool(false));
}

#[test]
fn array_length_assignment() {
    assert_eq!(eval_num("var a=[1,2,3]; a.length = 1; a.length"), 1.0);
    assert_eq!(eval_num("var a=[]; a[4] = 1; a.length"), 5.0);
}

#[test]
fn string_methods() {
    assert_eq!(eval_num("'a,b,c'.split(',').length"), 3.0);
    assert_eq!(eval_str("'Hello'.toUpperCase()"), "HELLO");
    assert_eq!(eval_str("'Hello'.charAt(1)"), "e");
    assert_eq!(eval_num("'Hello'.indexOf('llo')"), 2.0);
    assert_eq!(eval_str("'  x  '.trim()"), "x");
    assert_eq!(eval_str("'abcdef'.slice(1, 3)"), "bc");
    assert_eq!(eval_str("'abcdef'.substring(4, 2)"), "cd");
    assert_eq!(eval_num("'abc'.length"), 3.0);
}

#[test]
fn math_and_global_functions() {
    assert_eq!(eval_num("Math.max(1, 5, 3)"), 5.0);
    assert_eq!(eval_num("Math.floor(1.9)"), 1.0);
    assert_eq!(eval_num("Math.pow(2, 10)"), 1024.0);
    assert_eq!(eval_num("parseInt('0x10')"), 16.0);
    assert_eq!(eval_num("parseFloat('2.5rem')"), 2.5);
    assert_eq!(eval("isNaN('abc')"), Object::Bool(true));
    assert_eq!(eval_str("String(42)"), "42");
    assert_eq!(eval_num("Number('3.5')"), 3.5);
}

#[test]
fn json_round_trip() {
    assert_eq!(eval_num("JSON.parse(JSON.stringify({a:[1,2]})).a[1]"), 2.0);
    assert_eq!(eval_str("JSON.stringify({a:1,b:'x'})"), r#"{"a":1,"b":"x"}"#);
    assert_eq!(eval_num("JSON.parse('[1,2,3]')[2]"), 3.0);
}

#[test]
fn function_call_and_apply() {
    assert_eq!(eval_num("function f(a){ return this.x + a } f.call({x:1}, 2)"), 3.0);
    assert_eq!(eval_num("function f(a, b){ return this.x + a + b } f.apply({x:1}, [2, 3])"), 6.0);
}

#[test]
fn uncaught_throw_surfaces_to_the_host() {
    let err = Interpreter::new().evaluate("throw 5").unwrap_err();
    assert_eq!(err, Exception::Thrown(Object::Number(5.0)));

    let err = Interpreter::new().evaluate("null.x").unwrap_err();
    let Exception::Thrown(Object::Object(entries)) = err else {
        panic!("expected thrown error object, got {err:?}");
    };
    assert_eq!(entries.get("name"), Some(&Object::String("TypeError".to_owned())));
}

#[test]
fn thrown_host_errors_are_catchable() {
    assert_eq!(eval_str("try { missing() } catch(e) { e.name }"), "TypeError");
    assert_eq!(eval_str("try { null.x } catch(e) { e.name }"), "TypeError");
}

#[test]
fn step_limit_is_uncatchable() {
    let options = Options {
        timeout_ms: 0,
        max_steps: 10_000,
    };
    let err = Interpreter::with_options(options).evaluate("while(true){}").unwrap_err();
    assert!(matches!(err, Exception::Resource(_)), "got {err:?}");

    // try/catch must not swallow the limit violation.
    let err = Interpreter::with_options(options)
        .evaluate("try { while(true){} } catch(e) { 'caught' }")
        .unwrap_err();
    assert!(matches!(err, Exception::Resource(_)), "got {err:?}");
}

#[test]
fn timeout_cuts_infinite_loops() {
    let options = Options {
        timeout_ms: 50,
        max_steps: 0,
    };
    let err = Interpreter::with_options(options).evaluate("while(true){}").unwrap_err();
    assert!(matches!(err, Exception::Resource(_)), "got {err:?}");
}

#[test]
fn estree_json_program_evaluates() {
    let json = r#"{
        "type": "Program", "start": 0, "end": 6,
        "body": [{
            "type": "ExpressionStatement", "start": 0, "end": 6,
            "expression": {
                "type": "BinaryExpression", "start": 0, "end": 5,
                "operator": "+",
                "left": {"type": "Literal", "start": 0, "end": 1, "value": 1, "raw": "1"},
                "right": {"type": "Literal", "start": 4, "end": 5, "value": 2, "raw": "2"}
            }
        }]
    }"#;
    let program: jay::ast::Program = serde_json::from_str(json).unwrap();
    let result = Interpreter::new().evaluate_program(&program, "1 + 2;").unwrap();
    assert_eq!(result, Object::Number(3.0));
}

#[test]
fn estree_switch_with_two_defaults_is_rejected() {
    // The bundled parser already refuses a second `default`; an ESTree
    // program arrives unchecked and must fail at compile time instead of
    // silently dropping a clause.
    let json = r#"{
        "type": "Program", "start": 0, "end": 0,
        "body": [{
            "type": "SwitchStatement", "start": 0, "end": 0,
            "discriminant": {"type": "Literal", "start": 0, "end": 0, "value": 1},
            "cases": [
                {"test": null, "consequent": []},
                {"test": null, "consequent": []}
            ]
        }]
    }"#;
    let program: jay::ast::Program = serde_json::from_str(json).unwrap();
    let err = Interpreter::new().evaluate_program(&program, "").unwrap_err();
    let Exception::Syntax { message, .. } = err else {
        panic!("expected syntax error, got {err:?}");
    };
    assert!(message.contains("default"), "{message}");
}
