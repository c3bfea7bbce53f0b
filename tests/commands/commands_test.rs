#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};

use common::{start, Reply, StubWorker};
use lmat::commands::{
    find_command, CommandContext, CommandError, CommandResult, Edit, StaticPrompter,
};
use lmat::document::MarkdownDocument;
use lmat::environment::EnvironmentResolver;
use lmat::worker::WorkerBridge;
use serde_json::{json, Value};

/// Requests the stub saw, in order.
type Seen = Arc<Mutex<Vec<Value>>>;

fn recording<F>(handler: F) -> (StubWorker, Seen)
where
    F: Fn(&Value) -> Reply + Send + Sync + 'static,
{
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let worker = StubWorker::new(move |request| {
        sink.lock().unwrap().push(request.clone());
        handler(request)
    });
    (worker, seen)
}

struct Run<'a> {
    command: &'a str,
    text: &'a str,
    cursor: usize,
    selection: Option<(usize, usize)>,
    prompter: StaticPrompter,
}

impl<'a> Run<'a> {
    fn new(command: &'a str, text: &'a str, cursor: usize) -> Self {
        Self {
            command,
            text,
            cursor,
            selection: None,
            prompter: StaticPrompter::default(),
        }
    }

    async fn on(&self, bridge: &WorkerBridge) -> CommandResult<Edit> {
        let document = MarkdownDocument::new(self.text);
        let resolver = EnvironmentResolver::default();
        let ctx = CommandContext {
            bridge,
            document: &document,
            resolver: &resolver,
            prompter: &self.prompter,
            cursor: self.cursor,
            selection: self.selection,
        };
        find_command(self.command)?.run(&ctx).await
    }
}

#[tokio::test]
async fn test_evaluate_appends_result() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "2" })));
    let bridge = start(worker).await;
    let text = "We have $1 + 1$ here.";

    let edit = Run::new("evaluate-latex-expression", text, text.find('+').unwrap())
        .on(&bridge)
        .await
        .unwrap();

    assert_eq!(edit.apply(text), "We have $1 + 1 = 2$ here.");
    assert_eq!(edit.cursor, edit.at + " = 2".len());

    let request = &seen.lock().unwrap()[0];
    assert_eq!(request["type"], "evaluate");
    assert_eq!(request["payload"]["expression"], "1 + 1");
    assert!(request["payload"]["environment"].is_object());

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_evaluate_sends_resolved_environment() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "10" })));
    let bridge = start(worker).await;
    let text = "Let $x := 5$.\n\n$2x$";

    Run::new("evaluate-latex-expression", text, text.len() - 2)
        .on(&bridge)
        .await
        .unwrap();

    let request = &seen.lock().unwrap()[0];
    assert_eq!(request["payload"]["expression"], "2x");
    assert_eq!(request["payload"]["environment"]["variables"]["x"], "5");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_evaluate_uses_metadata_hints() {
    let worker = StubWorker::new(|_| {
        Reply::Success(json!({
            "result": "3.0",
            "metadata": { "end_line": 3, "separator": "\\approx" }
        }))
    });
    let bridge = start(worker).await;
    let text = "$$\na = 1 \\\\\nb = 2\n$$";

    let edit = Run::new("evalf-latex-expression", text, text.find('b').unwrap())
        .on(&bridge)
        .await
        .unwrap();

    // The expression starts with the line break after `$$`, so its third
    // line is `b = 2`.
    assert_eq!(edit.apply(text), "$$\na = 1 \\\\\nb = 2 \\approx 3.0\n$$");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_not_in_math() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "x" })));
    let bridge = start(worker).await;
    let text = "Plain prose, $x$ later.";

    let err = Run::new("expand-latex-expression", text, 2)
        .on(&bridge)
        .await
        .unwrap_err();

    assert!(matches!(err, CommandError::NotInMath));
    assert_eq!(err.to_string(), "You are not inside a math block");
    assert!(seen.lock().unwrap().is_empty());

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_selection_overrides_extraction() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "x^2 + 2x + 1" })));
    let bridge = start(worker).await;
    let text = "Expand (x+1)^2 now.";
    let from = text.find('(').unwrap();
    let to = text.find(" now").unwrap();

    let mut run = Run::new("expand-latex-expression", text, from);
    run.selection = Some((from, to));
    let edit = run.on(&bridge).await.unwrap();

    assert_eq!(seen.lock().unwrap()[0]["payload"]["expression"], "(x+1)^2");
    assert_eq!(edit.apply(text), "Expand (x+1)^2 = x^2 + 2x + 1 now.");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_worker_error_surfaces() {
    let bridge = start(StubWorker::new(|_| Reply::Error("cannot parse".to_string()))).await;
    let text = "$\\frac{1$";

    let err = Run::new("factor-latex-expression", text, 3)
        .on(&bridge)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::Worker(_)));
    assert!(err.to_string().contains("cannot parse"));

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_convert_units_sends_target_units() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "3000 m" })));
    let bridge = start(worker).await;
    let text = "$3 km$";

    let mut run = Run::new("convert-units", text, 2);
    run.prompter.units = Some(vec!["m".to_string()]);
    let edit = run.on(&bridge).await.unwrap();

    let request = &seen.lock().unwrap()[0];
    assert_eq!(request["type"], "convert-units");
    assert_eq!(request["payload"]["target_units"], json!(["m"]));
    assert_eq!(edit.apply(text), "$3 km = 3000 m$");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_convert_units_without_answer_is_cancelled() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "" })));
    let bridge = start(worker).await;

    let err = Run::new("convert-units", "$3 km$", 2)
        .on(&bridge)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::PromptCancelled));
    assert!(seen.lock().unwrap().is_empty());

    bridge.shutdown().await.unwrap();
}

fn multivariate_solver(request: &Value) -> Reply {
    match request["payload"]["symbols"].as_array() {
        None => Reply::Success(json!({
            "status": "multivariate_equation",
            "result": {
                "equation_count": 1,
                "symbols": [
                    { "sympy_symbol": "x", "latex_symbol": "x" },
                    { "sympy_symbol": "y", "latex_symbol": "y" }
                ]
            }
        })),
        Some(symbols) => Reply::Success(json!({
            "status": "success",
            "result": format!("{} = 2 - y", symbols[0].as_str().unwrap_or("?"))
        })),
    }
}

#[tokio::test]
async fn test_solve_simple() {
    let (worker, seen) = recording(|_| Reply::Success(json!({ "result": "x = 2" })));
    let bridge = start(worker).await;
    let text = "$x + 1 = 3$ done";

    let edit = Run::new("solve-latex-expression", text, 3)
        .on(&bridge)
        .await
        .unwrap();

    assert_eq!(edit.apply(text), "$x + 1 = 3$\n$$x = 2$$ done");
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0]["type"], "solve");
    assert!(seen[0]["payload"].get("symbols").is_none());

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_solve_multivariate_asks_and_resends() {
    let (worker, seen) = recording(multivariate_solver);
    let bridge = start(worker).await;
    let text = "$x + y = 2$";

    let mut run = Run::new("solve-latex-expression", text, 3);
    run.prompter.symbols = Some(vec!["x".to_string()]);
    run.prompter.domain = Some("Reals".to_string());
    let edit = run.on(&bridge).await.unwrap();

    assert_eq!(edit.apply(text), "$x + y = 2$\n$$x = 2 - y$$");

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1]["payload"]["symbols"], json!(["x"]));
    assert_eq!(seen[1]["payload"]["environment"]["domain"], "Reals");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_solve_rejects_wrong_symbol_count() {
    let (worker, seen) = recording(multivariate_solver);
    let bridge = start(worker).await;

    let mut run = Run::new("solve-latex-expression", "$x + y = 2$", 3);
    run.prompter.symbols = Some(vec!["x".to_string(), "y".to_string()]);
    let err = run.on(&bridge).await.unwrap_err();

    assert!(matches!(
        err,
        CommandError::InvalidSelection {
            expected: 1,
            selected: 2
        }
    ));
    assert_eq!(seen.lock().unwrap().len(), 1);

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_convert_to_sympy() {
    let worker = StubWorker::new(|_| Reply::Success(json!({ "result": "x**2" })));
    let bridge = start(worker).await;
    let text = "$$x^2$$\nnext";

    let edit = Run::new("convert-to-sympy", text, 3)
        .on(&bridge)
        .await
        .unwrap();
    assert_eq!(edit.apply(text), "$$x^2$$\n```python\nx**2\n```\n\nnext");

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_truth_tables() {
    let (worker, seen) = recording(|request| {
        let table = match request["payload"]["table_format"].as_str() {
            Some("md") => "| p | ~p |",
            _ => "\\begin{array}{c|c} p & \\neg p \\end{array}",
        };
        Reply::Success(json!({ "result": { "truth_table": table } }))
    });
    let bridge = start(worker).await;
    let text = "$\\neg p$";

    let md = Run::new("generate-md-truth-table", text, 2)
        .on(&bridge)
        .await
        .unwrap();
    assert_eq!(md.apply(text), "$\\neg p$\n| p | ~p |");

    let latex = Run::new("generate-latex-array-truth-table", text, 2)
        .on(&bridge)
        .await
        .unwrap();
    assert_eq!(
        latex.apply(text),
        "$\\neg p$$$\n\n\\begin{array}{c|c} p & \\neg p \\end{array}\n$$"
    );

    assert_eq!(seen.lock().unwrap()[0]["type"], "truth-table");
    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_symbol_sets_work_outside_math() {
    let (worker, seen) = recording(|_| {
        Reply::Success(json!({ "result": "\\begin{array}{ll} x & \\mathbb{R} \\end{array}" }))
    });
    let bridge = start(worker).await;
    let text = "```lmat\n[symbols]\nx = [\"real\"]\n```\nSets:";

    let edit = Run::new("show-symbol-sets", text, text.len())
        .on(&bridge)
        .await
        .unwrap();

    assert_eq!(
        edit.apply(text),
        format!("{text}\n$$\n\\begin{{array}}{{ll}} x & \\mathbb{{R}} \\end{{array}}\n$$\n")
    );
    let request = &seen.lock().unwrap()[0];
    assert_eq!(request["type"], "symbolsets");
    assert_eq!(request["payload"]["environment"]["symbols"]["x"], json!(["real"]));
    assert!(request["payload"].get("expression").is_none());

    bridge.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_command() {
    let bridge = start(StubWorker::echo()).await;

    let err = Run::new("integrate", "$x$", 1)
        .on(&bridge)
        .await
        .unwrap_err();
    assert!(matches!(err, CommandError::UnknownCommand(id) if id == "integrate"));

    bridge.shutdown().await.unwrap();
}
