//! End-to-end tests through the `ember` facade

use std::sync::Arc;

use ember::{
    ident, ActionDescriptor, ArgumentShape, Config, ConversionResultKind, Expr, Label, Stmt,
    TraceEvent, TraceEventKind, Value, ValueKind,
};
use parking_lot::Mutex;

fn ensure_config() {
    if !ember::config::is_initialized() {
        let _ = ember::config::try_init(Config::default());
    }
}

// ===== identifiers =====

#[test]
fn test_identifiers_intern_and_fold_case() {
    let a = ident::intern("Player");
    assert_eq!(a, ident::intern("Player"));
    assert_ne!(a, ident::intern("player"));

    let table = ident::global();
    assert_eq!(
        table.case_insensitive(a),
        table.case_insensitive(ident::intern("PLAYER"))
    );
    assert_eq!(ident::resolve(a).as_deref(), Some("Player"));
}

#[test]
fn test_descriptor_survives_json_handoff() {
    let interp = ember::interpreter();
    let original = ActionDescriptor::get_member(interp.binder(), ident::intern("hp"), true, false);
    let json = serde_json::to_string(original.action()).unwrap();
    let rebuilt = ActionDescriptor::from_action(serde_json::from_str(&json).unwrap(), interp.binder());
    assert_eq!(original, rebuilt);

    let other = ember::interpreter();
    let foreign = ActionDescriptor::from_action(original.action().clone(), other.binder());
    assert_ne!(original, foreign);
}

// ===== programs =====

#[test]
fn test_fibonacci_generator() {
    ensure_config();
    let interp = ember::interpreter();
    let top = Label::new("top");
    let mut f = interp.function_builder("fib", "fib.em");
    f.generator();
    let a = f.local("a");
    let b = f.local("b");
    let t = f.local("t");
    f.stmt(Stmt::assign(a, Expr::int(0)))
        .stmt(Stmt::assign(b, Expr::int(1)))
        .label(top)
        .stmt(Stmt::yield_value(Expr::local(a), None))
        .stmt(Stmt::assign(t, Expr::add(Expr::local(a), Expr::local(b))))
        .stmt(Stmt::assign(a, Expr::local(b)))
        .stmt(Stmt::assign(b, Expr::local(t)))
        .stmt(Stmt::goto(top));
    interp.define(f.build().unwrap());

    let first: Vec<_> = interp
        .start_generator("fib", &[])
        .unwrap()
        .take(8)
        .collect::<Result<_, _>>()
        .unwrap();
    let ints: Vec<i64> = first.iter().filter_map(Value::as_int).collect();
    assert_eq!(ints, vec![0, 1, 1, 2, 3, 5, 8, 13]);
}

#[test]
fn test_conversion_call_site_policies() {
    let interp = ember::interpreter();
    let mut f = interp.function_builder("to_int", "conv.em");
    let x = f.param("x");
    let site = f.call_site(ActionDescriptor::convert(
        interp.binder(),
        ValueKind::Int,
        ConversionResultKind::ImplicitThrow,
    ));
    f.stmt(Stmt::Return(Expr::dynamic(site, vec![Expr::local(x)])));
    interp.define(f.build().unwrap());

    let mut g = interp.function_builder("to_int_lenient", "conv.em");
    g.starting_line(10);
    let y = g.param("y");
    let site = g.call_site(ActionDescriptor::convert(
        interp.binder(),
        ValueKind::Int,
        ConversionResultKind::ExplicitTry,
    ));
    g.stmt(Stmt::Return(Expr::dynamic(site, vec![Expr::local(y)])));
    interp.define(g.build().unwrap());

    assert_eq!(interp.call("to_int", &[Value::Bool(true)]).unwrap(), Value::Int(1));
    assert!(matches!(
        interp.call("to_int", &[Value::Float(2.5)]),
        Err(ember::RuntimeError::Conversion(_))
    ));
    assert_eq!(interp.call("to_int_lenient", &[Value::Float(2.5)]).unwrap(), Value::Int(2));
    // Try policy: no conversion collapses to the target's default
    assert_eq!(interp.call("to_int_lenient", &[Value::str("abc")]).unwrap(), Value::Int(0));
}

#[test]
fn test_native_call_through_call_site() {
    let interp = ember::interpreter();
    let double = Value::Native(ember::runtime::Native::new(ident::intern("double"), Some(1), |args| {
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => Err(ember::RuntimeError::Native(format!("cannot double {}", other.kind()))),
        }
    }));
    let mut f = interp.function_builder("apply", "native.em");
    let func = f.param("func");
    let arg = f.param("arg");
    let site = f.call_site(ActionDescriptor::call(interp.binder(), ArgumentShape::simple(1)));
    f.stmt(Stmt::Return(Expr::dynamic(site, vec![Expr::local(func), Expr::local(arg)])));
    interp.define(f.build().unwrap());

    for i in 0..3 {
        assert_eq!(
            interp.call("apply", &[double.clone(), Value::Int(i)]).unwrap(),
            Value::Int(i * 2)
        );
    }
    let stats = interp.function("apply").unwrap().call_site(0).unwrap().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.cached_rules, 1);
}

// ===== tracing =====

#[test]
fn test_debugger_session_end_to_end() {
    ensure_config();
    let interp = ember::interpreter();
    let mut f = interp.function_builder("greet", "greet.em");
    let name = f.param("name");
    let msg = f.local("msg");
    f.stmt(Stmt::assign(msg, Expr::add(Expr::Const(Value::str("hi ")), Expr::local(name))))
        .stmt(Stmt::Return(Expr::local(msg)));
    interp.define(f.build().unwrap());

    let session = ember::attach(interp.clone()).unwrap();
    let snapshots = Arc::new(Mutex::new(Vec::new()));
    let sink = snapshots.clone();
    session
        .set_trace_callback(Some(Arc::new(move |event: &TraceEvent| {
            if event.kind != TraceEventKind::TracePoint {
                return;
            }
            let locals: Vec<(String, Value)> = event
                .locals()
                .unwrap()
                .iter()
                .unwrap()
                .map(|(name, value)| (name.to_string(), value))
                .collect();
            sink.lock().push((event.span.start.line, locals));
        })))
        .unwrap();

    assert_eq!(
        interp.call("greet", &[Value::str("ada")]).unwrap(),
        Value::str("hi ada")
    );
    session.close().unwrap();

    let snapshots = snapshots.lock();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[0].0, 1);
    assert_eq!(
        snapshots[1].1,
        vec![
            ("name".to_string(), Value::str("ada")),
            ("msg".to_string(), Value::str("hi ada")),
        ]
    );
}
