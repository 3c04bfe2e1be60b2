use std::{
    borrow::Cow,
    sync::atomic::{AtomicUsize, Ordering},
};

use indexmap::IndexMap;
use mapq_lang::{
    Batch, DocumentCache, EvalError, Exec, FunctionContext, Message, MessageBatch, Node, Parser,
    Registry, Value,
};

fn compile(query: &str) -> Node {
    let registry = Registry::with_builtins().unwrap();
    Parser::new(&registry).compile(query).unwrap()
}

fn eval_batch(query: &str, batch: &Batch, index: usize) -> Result<Value, String> {
    compile(query)
        .exec(&FunctionContext::new(index, batch))
        .map_err(|e| e.to_string())
}

fn eval(query: &str, content: &str) -> Result<Value, String> {
    eval_batch(query, &Batch::single(Message::new(content)), 0)
}

fn array(values: Vec<Value>) -> Value {
    Value::Array(values)
}

fn numbers_batch() -> Batch {
    Batch::new(vec![
        Message::new(r#"{"n":1}"#),
        Message::new(r#"{"n":2}"#),
        Message::new(r#"{"n":3}"#),
    ])
}

const USER: &str = r#"{
    "user": {"name": "ada", "surname": "lovelace", "tags": ["a", "b"]},
    "items": [10, 20, 30],
    "a key": true,
    "score": 15,
    "kind": "b"
}"#;

// ============================================================================
// Paths
// ============================================================================

#[test]
fn test_path_access() {
    assert_eq!(eval("this.user.name", USER).unwrap(), "ada".into());
    assert_eq!(eval("user.name", USER).unwrap(), "ada".into());
    assert_eq!(eval("this.items.1", USER).unwrap(), Value::Int(20));
    assert_eq!(eval(r#"this."a key""#, USER).unwrap(), Value::Bool(true));
}

#[test]
fn test_missing_fields_are_null() {
    assert_eq!(eval("this.user.missing", USER).unwrap(), Value::Null);
    assert_eq!(eval("missing.deeper.still", USER).unwrap(), Value::Null);
    assert_eq!(eval("this.items.7", USER).unwrap(), Value::Null);
}

#[test]
fn test_selecting_from_scalar_fails() {
    assert_eq!(
        eval("this.user.name.first", USER).unwrap_err(),
        "cannot select field 'first' from string value"
    );
}

#[test]
fn test_invalid_document() {
    let err = eval("this.foo", "not json").unwrap_err();
    assert!(err.starts_with("failed to parse message as JSON"), "{}", err);
    // Functions that do not read the document still work
    assert_eq!(
        eval("content().string()", "not json").unwrap(),
        "not json".into()
    );
}

/// A batch that counts how often its raw content is read
struct CountingBatch {
    content: Vec<u8>,
    reads: AtomicUsize,
    documents: DocumentCache,
}

impl CountingBatch {
    fn new(content: &str) -> Self {
        CountingBatch {
            content: content.as_bytes().to_vec(),
            reads: AtomicUsize::new(0),
            documents: DocumentCache::new(1),
        }
    }
}

impl MessageBatch for CountingBatch {
    fn len(&self) -> usize {
        1
    }

    fn content(&self, index: usize) -> Option<&[u8]> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        (index == 0).then_some(self.content.as_slice())
    }

    fn document(&self, index: usize) -> Result<Cow<'_, Value>, EvalError> {
        self.documents.document(self, index).map(Cow::Borrowed)
    }

    fn metadata(&self, _: usize, _: &str) -> Option<&str> {
        None
    }

    fn metadata_pairs(&self, _: usize) -> Vec<(&str, &str)> {
        Vec::new()
    }
}

#[test]
fn test_document_is_parsed_once_per_message() {
    let batch = CountingBatch::new(r#"{"a":1,"b":2,"c":3,"d":4}"#);
    let node = compile(r#"[this.a, this.b, c, this.d, json("a"), json()]"#);
    let ctx = FunctionContext::new(0, &batch);

    let result = node.exec(&ctx).unwrap();
    assert_eq!(batch.reads.load(Ordering::SeqCst), 1);
    assert_eq!(
        result,
        array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
            Value::Int(1),
            eval("this", r#"{"a":1,"b":2,"c":3,"d":4}"#).unwrap(),
        ])
    );

    node.exec(&ctx).unwrap();
    assert_eq!(batch.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_invalid_document_is_parsed_once() {
    let batch = CountingBatch::new("not json");
    let node = compile("this.a | this.b | 5");
    let ctx = FunctionContext::new(0, &batch);

    assert_eq!(node.exec(&ctx).unwrap(), Value::Int(5));
    assert_eq!(batch.reads.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_message_functions() {
    let batch = Batch::single(
        Message::new(r#"{"a":{"b":"c"}}"#)
            .with_metadata("topic", "orders")
            .with_metadata("partition", "3"),
    );

    assert_eq!(eval_batch(r#"json("a.b")"#, &batch, 0).unwrap(), "c".into());
    assert_eq!(eval_batch(r#"json().a.b"#, &batch, 0).unwrap(), "c".into());
    assert_eq!(
        eval_batch(r#"meta("topic")"#, &batch, 0).unwrap(),
        "orders".into()
    );
    assert_eq!(eval_batch(r#"meta("nope")"#, &batch, 0).unwrap(), Value::Null);

    let mut all = IndexMap::new();
    all.insert("topic".to_string(), Value::from("orders"));
    all.insert("partition".to_string(), Value::from("3"));
    assert_eq!(eval_batch("meta()", &batch, 0).unwrap(), Value::Object(all));

    assert_eq!(
        eval_batch("content()", &batch, 0).unwrap(),
        Value::Bytes(br#"{"a":{"b":"c"}}"#.to_vec())
    );
}

#[test]
fn test_batch_functions() {
    let batch = numbers_batch();
    assert_eq!(eval_batch("batch_index()", &batch, 2).unwrap(), Value::Int(2));
    assert_eq!(eval_batch("batch_size()", &batch, 0).unwrap(), Value::Int(3));
}

#[test]
fn test_env_unset_is_null() {
    assert_eq!(
        eval(r#"env("MAPQ_TEST_VARIABLE_THAT_IS_NEVER_SET")"#, "{}").unwrap(),
        Value::Null
    );
}

// ============================================================================
// Operators
// ============================================================================

#[test]
fn test_arithmetic() {
    let doc = r#"{"a": 1, "b": 2.5, "c": 4}"#;
    assert_eq!(eval("this.a + this.b", doc).unwrap(), Value::Float(3.5));
    assert_eq!(eval("this.c * 2 - 1", doc).unwrap(), Value::Float(7.0));
    assert_eq!(eval("this.c / 8", doc).unwrap(), Value::Float(0.5));
    assert_eq!(eval("5 + 5", doc).unwrap(), Value::Float(10.0));
    assert_eq!(eval(r#""foo" + "bar""#, doc).unwrap(), "foobar".into());
    assert_eq!(
        eval("this.a / 0", doc).unwrap_err(),
        "attempted to divide by zero"
    );
    assert_eq!(
        eval(r#"5 + "not a number""#, doc).unwrap_err(),
        "expected number value, found string: not a number"
    );
}

#[test]
fn test_comparison_and_logic() {
    let doc = r#"{"a": 5, "s": "abc"}"#;
    assert_eq!(
        eval("this.a > 1 && this.a < 10", doc).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval("this.a == 5.0", doc).unwrap(), Value::Bool(true));
    assert_eq!(eval(r#"this.s != "abc""#, doc).unwrap(), Value::Bool(false));
    assert_eq!(eval(r#"this.s >= "abb""#, doc).unwrap(), Value::Bool(true));
    assert_eq!(
        eval("this.a > 10 || this.s == \"abc\"", doc).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"this.a > "x""#, doc).unwrap_err(),
        "expected number value, found string: x"
    );
    assert_eq!(
        eval("this.a && true", doc).unwrap_err(),
        "expected boolean value, found int64: 5"
    );
}

#[test]
fn test_fallback_operator() {
    assert_eq!(
        eval(r#"this.name.uppercase() | "anonymous""#, "{}").unwrap(),
        "anonymous".into()
    );
    // A null value is not a failure
    assert_eq!(eval(r#"this.name | "anonymous""#, "{}").unwrap(), Value::Null);
    assert_eq!(
        eval(r#"this.a.number() | this.b.number() | 0"#, r#"{"a":"x","b":"2"}"#).unwrap(),
        Value::Float(2.0)
    );
    // The right hand error is the one surfaced
    assert_eq!(
        eval(r#"this.a.number() | this.a.uppercase().number()"#, r#"{"a":"x"}"#).unwrap_err(),
        "expected number value, found string: X"
    );
}

// ============================================================================
// Scoped Queries and Match
// ============================================================================

#[test]
fn test_scoped_query() {
    assert_eq!(
        eval(r#"this.user.(name + " " + surname)"#, USER).unwrap(),
        "ada lovelace".into()
    );
    assert_eq!(
        eval("this.user.(tags.0).uppercase()", USER).unwrap(),
        "A".into()
    );
}

#[test]
fn test_match_literal_patterns() {
    let query = r#"match this.kind {
        "a" => "first"
        "b" => "second",
        _ => "other"
    }"#;
    assert_eq!(eval(query, USER).unwrap(), "second".into());
    assert_eq!(eval(query, r#"{"kind":"z"}"#).unwrap(), "other".into());
}

#[test]
fn test_match_query_patterns() {
    let query = r#"match this.score {
        this > 10 => "high"
        this > 5 => "medium"
        _ => "low"
    }"#;
    assert_eq!(eval(query, USER).unwrap(), "high".into());
    assert_eq!(eval(query, r#"{"score": 7}"#).unwrap(), "medium".into());

    // Without a target the document is matched
    let query = r#"match { score == 15 => user.name, _ => "nobody" }"#;
    assert_eq!(eval(query, USER).unwrap(), "ada".into());
}

#[test]
fn test_match_result_sees_target() {
    let query = r#"match this.user { name == "ada" => surname.uppercase() }"#;
    assert_eq!(eval(query, USER).unwrap(), "LOVELACE".into());
}

#[test]
fn test_match_without_matching_case() {
    let query = r#"match this.kind { "a" => 1 }"#;
    assert_eq!(
        eval(query, USER).unwrap_err(),
        "no match case found for value: b"
    );
}

// ============================================================================
// Methods
// ============================================================================

#[test]
fn test_string_methods() {
    let doc = r#"{"s": "  Hello World  ", "csv": "a,b,c"}"#;
    assert_eq!(
        eval("this.s.trim().lowercase()", doc).unwrap(),
        "hello world".into()
    );
    assert_eq!(eval("this.s.trim().length()", doc).unwrap(), Value::Int(11));
    assert_eq!(
        eval(r#"this.csv.split(",")"#, doc).unwrap(),
        array(vec!["a".into(), "b".into(), "c".into()])
    );
    assert_eq!(
        eval(r#"this.csv.split(",").join("|")"#, doc).unwrap(),
        "a|b|c".into()
    );
    assert_eq!(
        eval(r#"this.s.re_replace("o", "0").trim()"#, doc).unwrap(),
        "Hell0 W0rld".into()
    );
    assert_eq!(
        eval(r#"this.csv.re_match("^[a-c,]+$")"#, doc).unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn test_regex_patterns() {
    let doc = r#"{"s":"a1b22","p":"[0-9]+","bad":"("}"#;
    assert_eq!(
        eval(r##"this.s.re_replace("[0-9]+", "#")"##, doc).unwrap(),
        "a#b#".into()
    );
    assert_eq!(
        eval(r#"this.s.re_replace(this.p, "<$0>")"#, doc).unwrap(),
        "a<1>b<22>".into()
    );
    assert_eq!(eval("this.s.re_match(this.p)", doc).unwrap(), Value::Bool(true));
    assert!(
        eval("this.s.re_match(this.bad)", doc)
            .unwrap_err()
            .starts_with("invalid regular expression")
    );
}

#[test]
fn test_dynamic_argument_type_is_checked_at_runtime() {
    assert_eq!(
        eval("this.s.split(this.n)", r#"{"s":"a b","n":1}"#).unwrap_err(),
        "expected string value, found int64: 1"
    );
}

#[test]
fn test_inspection_methods() {
    assert_eq!(eval("this.items.type()", USER).unwrap(), "array".into());
    assert_eq!(eval("this.score.type()", USER).unwrap(), "number".into());
    assert_eq!(
        eval("this.user.keys()", USER).unwrap(),
        array(vec!["name".into(), "surname".into(), "tags".into()])
    );
    assert_eq!(eval("this.items.sum()", USER).unwrap(), Value::Float(60.0));
    assert_eq!(
        eval("this.items.contains(20)", USER).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"this.exists("user.tags")"#, USER).unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(r#"this.exists("user.age")"#, USER).unwrap(),
        Value::Bool(false)
    );
    assert_eq!(eval(r#"this.get("user.tags.1")"#, USER).unwrap(), "b".into());
    assert_eq!(eval("this.score.string()", USER).unwrap(), "15".into());
}

#[test]
fn test_control_methods() {
    assert_eq!(
        eval("this.user.map(name.uppercase())", USER).unwrap(),
        "ADA".into()
    );
    assert_eq!(
        eval("this.user.name.number().catch(0)", USER).unwrap(),
        Value::Int(0)
    );
    assert_eq!(
        eval(r#"this.missing.or("default")"#, USER).unwrap(),
        "default".into()
    );
    assert_eq!(
        eval("this.missing.not_null()", USER).unwrap_err(),
        "value is null"
    );
}

#[test]
fn test_from_and_from_all() {
    let batch = numbers_batch();
    assert_eq!(
        eval_batch(r#"json("n").from(1)"#, &batch, 0).unwrap(),
        Value::Int(2)
    );
    assert_eq!(
        eval_batch("this.n.from_all()", &batch, 0).unwrap(),
        array(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_batch("this.n.from_all().sum()", &batch, 1).unwrap(),
        Value::Float(6.0)
    );
    assert_eq!(
        eval_batch("batch_index().from_all()", &batch, 0).unwrap(),
        array(vec![Value::Int(0), Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        eval_batch(r#"json("n").from(5)"#, &batch, 0).unwrap_err(),
        "message index 5 is out of bounds for a batch of 3"
    );
}

#[test]
fn test_from_computed_index() {
    let batch = Batch::new(vec![
        Message::new(r#"{"v":"first"}"#),
        Message::new(r#"{"v":"second"}"#),
    ]);
    assert_eq!(
        eval_batch("this.v.from(batch_index() - 1)", &batch, 1).unwrap(),
        "first".into()
    );
    assert_eq!(
        eval_batch("this.v.from(batch_size() / 2)", &batch, 0).unwrap(),
        "second".into()
    );
    assert_eq!(
        eval_batch("this.v.from(batch_index() / 2)", &batch, 1).unwrap_err(),
        "expected int value, found float64: 0.5"
    );
}

#[test]
fn test_deprecated_grammar_evaluates_the_same() {
    let registry = Registry::with_builtins().unwrap();
    let batch = Batch::single(Message::new(r#"{"foo":{"bar":5}}"#));
    let ctx = FunctionContext::new(0, &batch);

    let legacy = Parser::deprecated(&registry)
        .compile("json:foo.bar")
        .unwrap();
    let current = Parser::new(&registry)
        .compile(r#"json("foo.bar")"#)
        .unwrap();
    assert_eq!(legacy.exec(&ctx).unwrap(), current.exec(&ctx).unwrap());
}

// ============================================================================
// Nesting
// ============================================================================

#[test]
fn test_deeply_nested_query_evaluates() {
    let depth = 25;
    let query = format!("{}this.n{}", "[".repeat(depth), "]".repeat(depth));
    let mut expected = Value::Int(7);
    for _ in 0..depth {
        expected = array(vec![expected]);
    }
    assert_eq!(eval(&query, r#"{"n":7}"#).unwrap(), expected);

    let sum = format!("this.n{}", " + this.n".repeat(depth));
    assert_eq!(eval(&sum, r#"{"n":2}"#).unwrap(), Value::Float(52.0));
}

#[test]
fn test_overly_nested_query_is_rejected() {
    let registry = Registry::with_builtins().unwrap();
    let query = format!("{}this.n{}", "[".repeat(100_000), "]".repeat(100_000));
    let err = Parser::new(&registry).compile(&query).unwrap_err();
    assert!(err.to_string().contains("maximum nesting depth"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_evaluation_is_independent() {
    let node = compile(r#"{"doubled": json("n") * 2, "index": batch_index()}"#);

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let node = &node;
                s.spawn(move || {
                    let batch = Batch::new(vec![
                        Message::new("{}"),
                        Message::new(format!(r#"{{"n":{}}}"#, i)),
                    ]);
                    node.exec(&FunctionContext::new(1, &batch)).unwrap()
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            let mut expected = IndexMap::new();
            expected.insert("doubled".to_string(), Value::Float(i as f64 * 2.0));
            expected.insert("index".to_string(), Value::Int(1));
            assert_eq!(handle.join().unwrap(), Value::Object(expected));
        }
    });
}
