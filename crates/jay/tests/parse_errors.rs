use jay::{CodeLoc, Exception, Interpreter};

fn parse_err(source: &str) -> (String, Option<CodeLoc>) {
    match Interpreter::new().evaluate(source) {
        Err(Exception::Syntax { message, loc }) => (message, loc),
        other => panic!("expected syntax error, got {other:?}"),
    }
}

#[test]
fn unclosed_paren() {
    let (message, loc) = parse_err("(");
    assert!(message.contains("end of input"), "{message}");
    assert_eq!(loc, Some(CodeLoc { line: 1, column: 2 }));
}

#[test]
fn error_location_is_one_based_and_line_aware() {
    let (_, loc) = parse_err("var a = 1;\nvar b = ;");
    assert_eq!(loc.unwrap().line, 2);
}

#[test]
fn invalid_declarator() {
    let (message, _) = parse_err("var 1 = 2;");
    assert!(message.contains("expected identifier"), "{message}");
}

#[test]
fn unterminated_string() {
    let (message, _) = parse_err("var s = 'abc");
    assert!(message.contains("unterminated string"), "{message}");
}

#[test]
fn missing_semicolon_between_expressions() {
    let (message, _) = parse_err("a = 1 b = 2");
    assert!(message.contains("expected ';'"), "{message}");
}

#[test]
fn regex_literal_is_reported() {
    let (message, _) = parse_err("var re = /ab+c/;");
    assert!(message.contains("regular expression"), "{message}");
}

#[test]
fn top_level_break_and_continue_are_rejected() {
    let (message, _) = parse_err("break;");
    assert!(message.contains("illegal break"), "{message}");
    let (message, _) = parse_err("continue;");
    assert!(message.contains("illegal continue"), "{message}");
}

#[test]
fn top_level_return_is_rejected() {
    let (message, _) = parse_err("return 1;");
    assert!(message.contains("return outside of function"), "{message}");
}

#[test]
fn unknown_labels_are_rejected() {
    let (message, _) = parse_err("while(true){ break missing; }");
    assert!(message.contains("undefined label"), "{message}");
    let (message, _) = parse_err("other: while(true){ continue missing; }");
    assert!(message.contains("undefined label"), "{message}");
}

#[test]
fn continue_cannot_target_a_block_label() {
    // The label exists but does not name a loop.
    let (message, _) = parse_err("L: { while(true) { continue L; } }");
    assert!(message.contains("undefined label"), "{message}");
}

#[test]
fn newline_after_throw() {
    let (message, _) = parse_err("throw\n1;");
    assert!(message.contains("newline"), "{message}");
}

#[test]
fn duplicate_default_clause() {
    let (message, _) = parse_err("switch(1){ default: break; default: break; }");
    assert!(message.contains("duplicate default"), "{message}");
}

#[test]
fn duplicate_label() {
    let (message, _) = parse_err("L: { L: { } }");
    assert!(message.contains("already declared"), "{message}");
}
