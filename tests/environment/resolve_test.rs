use lmat::document::MarkdownDocument;
use lmat::environment::{EnvironmentError, EnvironmentResolver, FunctionDef};

fn resolve_at_end(text: &str) -> lmat::environment::Environment {
    let doc = MarkdownDocument::new(text);
    EnvironmentResolver::default()
        .resolve(&doc, text.len())
        .unwrap()
}

#[test]
fn test_undefine_keeps_symbol_assumptions() {
    let text = "```lmat\n[symbols]\nx = { assumptions = [\"positive\"] }\n```\n\
                Let $x := 5$ for now.\n\
                Then forget it: $x := $.\n\
                $x^2$";
    let env = resolve_at_end(text);

    assert!(!env.variables.contains_key("x"));
    assert_eq!(env.symbols["x"], vec!["positive".to_string()]);
}

#[test]
fn test_later_definition_wins() {
    let env = resolve_at_end("$y := 1$ and later $y := 2$.\n$y$");
    assert_eq!(env.variables["y"], "2");
}

#[test]
fn test_functions_and_variables_are_separate() {
    let env = resolve_at_end("$f(a, b) := a + b$ and $f := 3$.");

    assert_eq!(env.variables["f"], "3");
    assert_eq!(
        env.functions["f"],
        FunctionDef {
            args: vec!["a".to_string(), "b".to_string()],
            expr: "a + b".to_string(),
        }
    );
}

#[test]
fn test_definitions_after_position_are_ignored() {
    let text = "$v := 1$ here, $v := 2$ there";
    let doc = MarkdownDocument::new(text);
    let position = text.find("here").unwrap();

    let env = EnvironmentResolver::default()
        .resolve(&doc, position)
        .unwrap();
    assert_eq!(env.variables["v"], "1");
}

#[test]
fn test_closest_block_wins() {
    let text = "```lmat\ndomain = \"Reals\"\n[variables]\ng = \"9.8\"\n```\n\
                $a := 1$\n\
                ```lmat\n[units]\nsystem = \"SI\"\n```\n\
                $b := 2$\n";
    let env = resolve_at_end(text);

    // The second block replaces the first; definitions before it are dropped.
    assert_eq!(env.unit_system.as_deref(), Some("SI"));
    assert!(env.domain.is_none());
    assert!(env.variables.get("g").is_none());
    assert!(env.variables.get("a").is_none());
    assert_eq!(env.variables["b"], "2");
}

#[test]
fn test_block_after_position_is_not_used() {
    let text = "$x$\n```lmat\n[variables]\nx = \"1\"\n```\n";
    let doc = MarkdownDocument::new(text);

    let env = EnvironmentResolver::default().resolve(&doc, 1).unwrap();
    assert!(env.variables.is_empty());
}

#[test]
fn test_other_languages_are_ignored() {
    let text = "```toml\n[variables]\nx = \"1\"\n```\n$x$";
    assert!(resolve_at_end(text).variables.is_empty());
}

#[test]
fn test_custom_block_language() {
    let text = "```math-env\n[variables]\nx = \"1\"\n```\n$x$";
    let doc = MarkdownDocument::new(text);

    let env = EnvironmentResolver::new("math-env")
        .resolve(&doc, text.len())
        .unwrap();
    assert_eq!(env.variables["x"], "1");
}

#[test]
fn test_invalid_block_is_an_error() {
    let text = "intro\n```lmat\n[symbols\n```\n$x$";
    let doc = MarkdownDocument::new(text);

    let err = EnvironmentResolver::default()
        .resolve(&doc, text.len())
        .unwrap_err();
    let EnvironmentError::InvalidBlock { offset, .. } = err;
    assert_eq!(offset, text.find("```").unwrap());
}

#[test]
fn test_environment_serializes_for_the_worker() {
    let text = "```lmat\ndomain = \"Reals\"\n[symbols]\nx = [\"real\"]\n```\n$k := 2$";
    let env = resolve_at_end(text);

    insta::assert_snapshot!(serde_json::to_string(&env).unwrap(), @r#"{"symbols":{"x":["real"]},"variables":{"k":"2"},"functions":{},"domain":"Reals"}"#);
}

#[test]
fn test_definitions_in_code_are_not_applied() {
    let text = "$w := 3$\n\
                Write `$x := 1$` to define x.\n\n\
                ```python\ny = \"$z := 2$\"\n```\n\
                $x + z$";
    let env = resolve_at_end(text);

    assert_eq!(env.variables.get("w").map(String::as_str), Some("3"));
    assert!(!env.variables.contains_key("x"), "code span definition applied");
    assert!(!env.variables.contains_key("z"), "fenced definition applied");
}
