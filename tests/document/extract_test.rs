use lmat::document::{
    line_end, line_of, offset_to_position, position_to_offset, DocumentView, MarkdownDocument,
    NodeClass, Position, Side,
};
use lmat::equation::{extract_equation, is_within_equation, EquationSpan};

fn offset_of(text: &str, needle: &str) -> usize {
    text.find(needle).expect("needle present")
}

fn check_invariants(text: &str, span: &EquationSpan) {
    assert!(span.block_from <= span.from);
    assert!(span.from <= span.to);
    assert!(span.to <= span.block_to);
    assert!(span.block_to <= text.len());
    assert_eq!(span.contents, &text[span.from..span.to]);
}

#[test]
fn test_inline_math_in_prose() {
    let text = "The sum $x + 1$ grows.";
    let doc = MarkdownDocument::new(text);
    let inside = offset_of(text, "+");

    let span = extract_equation(inside, &doc).unwrap();
    check_invariants(text, &span);
    assert_eq!(span.contents, "x + 1");
    assert_eq!(&text[span.block_from..span.block_to], "$x + 1$");
    assert!(!span.is_multiline);
}

#[test]
fn test_outside_math_is_none() {
    let text = "The sum $x + 1$ grows.";
    let doc = MarkdownDocument::new(text);

    assert!(extract_equation(offset_of(text, "sum"), &doc).is_none());
    assert!(extract_equation(offset_of(text, "grows"), &doc).is_none());
}

#[test]
fn test_multiline_display_math() {
    let text = "Before\n$$\nx = 1 \\\\\ny = 2\n$$\nAfter";
    let doc = MarkdownDocument::new(text);

    let span = extract_equation(offset_of(text, "y = 2"), &doc).unwrap();
    check_invariants(text, &span);
    assert!(span.is_multiline);
    assert_eq!(span.contents, "\nx = 1 \\\\\ny = 2\n");
    assert_eq!(
        &text[span.block_from..span.block_to],
        "$$\nx = 1 \\\\\ny = 2\n$$"
    );
}

#[test]
fn test_every_position_inside_finds_the_same_span() {
    let text = "a $$b + c$$ d";
    let doc = MarkdownDocument::new(text);
    let from = offset_of(text, "b");
    let to = offset_of(text, "c") + 1;

    for position in from..=to {
        let span = extract_equation(position, &doc).unwrap();
        assert_eq!(span.contents, "b + c", "position {position}");
        assert_eq!((span.block_from, span.block_to), (2, 11));
    }
}

#[test]
fn test_second_equation_on_a_line() {
    let text = "$a$ and $b^2$";
    let doc = MarkdownDocument::new(text);

    let span = extract_equation(offset_of(text, "^"), &doc).unwrap();
    assert_eq!(span.contents, "b^2");
}

#[test]
fn test_math_in_code_is_ignored() {
    let text = "```\n$x + 1$\n```\n`$y$`";
    let doc = MarkdownDocument::new(text);

    assert!(extract_equation(offset_of(text, "+"), &doc).is_none());
    assert!(extract_equation(offset_of(text, "y"), &doc).is_none());
}

#[test]
fn test_currency_is_not_math() {
    let text = "It costs $5 or $ 6.";
    let doc = MarkdownDocument::new(text);
    assert!(!is_within_equation(&doc, offset_of(text, "5")));
}

#[test]
fn test_node_classes_at_delimiters() {
    let text = "$$x$$";
    let doc = MarkdownDocument::new(text);

    assert_eq!(doc.node_at(0, Side::After), NodeClass::MathBegin);
    assert_eq!(doc.node_at(2, Side::After), NodeClass::Math);
    assert_eq!(doc.node_at(3, Side::After), NodeClass::MathEnd);
    assert_eq!(doc.node_at(5, Side::Before), NodeClass::MathEnd);
    assert!(NodeClass::MathEnd.is_terminator());
    assert!(!NodeClass::Plain.is_math());
}

#[test]
fn test_unicode_content() {
    let text = "Let $α + β$ be";
    let doc = MarkdownDocument::new(text);

    let span = extract_equation(offset_of(text, "+"), &doc).unwrap();
    check_invariants(text, &span);
    assert_eq!(span.contents, "α + β");

    let position = offset_to_position(text, span.from);
    assert_eq!(position, Position::new(0, 5));
    assert_eq!(position_to_offset(text, position), span.from);
}

#[test]
fn test_line_helpers_for_insertion() {
    let text = "$$\na = 1\nb = 2\n$$";
    let span = extract_equation(offset_of(text, "a"), &MarkdownDocument::new(text)).unwrap();

    // Second line of the equation body.
    let line = line_of(text, span.from) + 2;
    assert_eq!(&text[..line_end(text, line)], "$$\na = 1\nb = 2");
}
