// tests/traversal_tests.rs

mod common;

use banded_report::{
    Element, ElementKind, EngineConfig, GenerateError, GenerationStatus, JsonDataProvider,
    OutputBackend, Page, ReportRun, ResolveError, Row, Scope, Template, TextBackend, TextLine,
    Value,
};
use common::{SALES_LINES, SALES_TEMPLATE, row, sales_rows, template, texts};
use pretty_assertions::assert_eq;
use serde_json::json;

fn run_sales(backend: impl OutputBackend<Fragment = TextLine>) -> Vec<Page<TextLine>> {
    let template = template(SALES_TEMPLATE);
    let rows = sales_rows();
    let mut run = ReportRun::new(&template, &rows, backend);
    run.run_to_end().unwrap()
}

fn run_text(json: &str, rows: &[Row], lines_per_page: usize) -> Vec<Page<TextLine>> {
    let template = template(json);
    let mut run = ReportRun::new(&template, rows, TextBackend::new(lines_per_page));
    run.run_to_end().unwrap()
}

fn page_texts(page: &Page<TextLine>) -> Vec<&str> {
    page.fragments.iter().map(|l| l.text.as_str()).collect()
}

/// Text output plus a page break after the n-th line of the run, for each
/// n in `after`.
struct BreakAfter {
    inner: TextBackend,
    after: Vec<usize>,
    emitted: usize,
}

impl BreakAfter {
    fn new(after: &[usize]) -> Self {
        BreakAfter {
            inner: TextBackend::new(1000),
            after: after.to_vec(),
            emitted: 0,
        }
    }
}

impl OutputBackend for BreakAfter {
    type Fragment = TextLine;

    fn start_page(&mut self, page: u32) {
        self.inner.start_page(page);
    }

    fn generate(
        &mut self,
        element: &Element,
        scope: &mut Scope<'_, '_>,
        out: &mut Vec<TextLine>,
    ) -> Result<(), GenerateError> {
        let before = out.len();
        self.inner.generate(element, scope, out)?;
        if out.len() > before {
            self.emitted += out.len() - before;
            if self.after.contains(&self.emitted) {
                scope.request_page_break();
            }
        }
        Ok(())
    }
}

/// Text output plus a page break whenever an instance of the named group
/// opens.
struct BreakOnGroup {
    inner: TextBackend,
    group: &'static str,
}

impl OutputBackend for BreakOnGroup {
    type Fragment = TextLine;

    fn generate(
        &mut self,
        element: &Element,
        scope: &mut Scope<'_, '_>,
        out: &mut Vec<TextLine>,
    ) -> Result<(), GenerateError> {
        if matches!(element.kind, ElementKind::Group(_)) && element.name == self.group {
            scope.request_page_break();
        }
        self.inner.generate(element, scope, out)
    }
}

// ============================================================================
// Baseline
// ============================================================================

#[test]
fn test_single_page_report() {
    let pages = run_sales(TextBackend::new(100));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].number, 1);
    assert_eq!(texts(&pages), SALES_LINES);
}

#[test]
fn test_lines_are_indented_by_nesting() {
    let pages = run_sales(TextBackend::new(100));
    let rendered: Vec<String> = pages[0].fragments.iter().take(4).map(|l| l.to_string()).collect();
    assert_eq!(rendered, ["Sales report", "  Customer A", "    Order 1", "      10"]);
}

#[test]
fn test_output_ids_increase_across_pages() {
    let pages = run_sales(TextBackend::new(4));
    let ids: Vec<u64> = pages
        .iter()
        .flat_map(|p| p.fragments.iter().map(|l| l.id))
        .collect();
    assert_eq!(ids, (1..=25).collect::<Vec<u64>>());
}

#[test]
fn test_run_status_after_completion() {
    let template = template(SALES_TEMPLATE);
    let rows = sales_rows();
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(10));
    assert_eq!(run.status(), GenerationStatus::Running);
    assert!(run.next_page().unwrap().is_some());
    assert_eq!(run.status(), GenerationStatus::GotoNextPage);
    assert!(!run.is_finished());
    run.run_to_end().unwrap();
    assert_eq!(run.status(), GenerationStatus::EndOfGeneration);
    assert!(run.is_finished());
    assert!(run.next_page().unwrap().is_none());
}

// ============================================================================
// Pagination
// ============================================================================

#[test]
fn test_page_height_splits_without_loss_or_duplication() {
    for k in 1..=26 {
        let pages = run_sales(TextBackend::new(k));
        assert_eq!(pages.len(), 25_usize.div_ceil(k), "page height {}", k);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.number as usize, i + 1);
            assert!(page.fragments.len() <= k, "page height {}", k);
        }
        assert_eq!(texts(&pages), SALES_LINES, "page height {}", k);
    }
}

#[test]
fn test_break_after_any_fragment_resumes_exactly() {
    for k in 1..=25 {
        let pages = run_sales(BreakAfter::new(&[k]));
        let expected_pages = if k == 25 { 1 } else { 2 };
        assert_eq!(pages.len(), expected_pages, "break after {}", k);
        assert_eq!(pages[0].fragments.len(), k, "break after {}", k);
        assert_eq!(texts(&pages), SALES_LINES, "break after {}", k);
    }
}

#[test]
fn test_multiple_breaks() {
    let pages = run_sales(BreakAfter::new(&[3, 7, 8, 20]));
    let sizes: Vec<usize> = pages.iter().map(|p| p.fragments.len()).collect();
    assert_eq!(sizes, [3, 4, 1, 12, 5]);
    assert_eq!(texts(&pages), SALES_LINES);
    assert_eq!(page_texts(&pages[2]), ["5"]);
}

#[test]
fn test_break_on_group_opening() {
    let pages = run_sales(BreakOnGroup {
        inner: TextBackend::new(1000),
        group: "order",
    });
    assert_eq!(pages.len(), 6);
    assert_eq!(page_texts(&pages[0]), ["Sales report", "Customer A"]);
    assert_eq!(page_texts(&pages[1])[0], "Order 1");
    assert_eq!(page_texts(&pages[5]), ["Order 5", "3", "Order total: 3", "Customer total: 6", "Grand total: 48"]);
    assert_eq!(texts(&pages), SALES_LINES);
}

#[test]
fn test_trailing_empty_page_is_kept_when_configured() {
    let template = template(SALES_TEMPLATE);
    let rows = sales_rows();
    let config = EngineConfig {
        drop_trailing_empty_page: false,
        ..EngineConfig::default()
    };
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(25)).with_config(config);
    let pages = run.run_to_end().unwrap();
    assert_eq!(pages.len(), 2);
    assert!(pages[1].fragments.is_empty());
    assert_eq!(pages[1].number, 2);

    let pages = run_sales(TextBackend::new(25));
    assert_eq!(pages.len(), 1);
}

#[test]
fn test_explicit_page_break_element() {
    let pages = run_text(
        r#"{"children": [
            {"type": "group", "name": "g", "keys": ["k"], "children": [
                {"type": "text", "text": "{#k} on page {pagenum()}"},
                {"type": "page_break", "visible": "not last()"}
            ]}
        ]}"#,
        &[row(&[("k", Value::Long(1))]), row(&[("k", Value::Long(2))])],
        100,
    );
    assert_eq!(pages.len(), 2);
    assert_eq!(page_texts(&pages[0]), ["1 on page 1"]);
    assert_eq!(page_texts(&pages[1]), ["2 on page 2"]);
}

#[test]
fn test_empty_report_has_one_page() {
    let pages = run_text(r#"{"children": []}"#, &[], 10);
    assert_eq!(pages.len(), 1);
    assert!(pages[0].fragments.is_empty());
}

// ============================================================================
// Order, Filter and Visibility
// ============================================================================

const CUSTOMERS: &str = r#"{
    "children": [
        {"type": "group", "name": "customer", "keys": ["cust"], "order": ["cust"], "descending": true,
         "children": [
            {"type": "text", "text": "Customer {#cust}"}
        ]}
    ]
}"#;

#[test]
fn test_group_order_applies_on_entry() {
    let pages = run_text(CUSTOMERS, &sales_rows(), 100);
    assert_eq!(texts(&pages), ["Customer C", "Customer B", "Customer A"]);
}

#[test]
fn test_group_order_survives_a_page_break() {
    let pages = run_text(CUSTOMERS, &sales_rows(), 1);
    assert_eq!(pages.len(), 3);
    assert_eq!(texts(&pages), ["Customer C", "Customer B", "Customer A"]);
}

#[test]
fn test_filter_skips_instances() {
    let pages = run_text(
        r##"{"children": [
            {"type": "group", "name": "customer", "keys": ["cust"], "filter": "#cust != \"B\"",
             "children": [
                {"type": "text", "text": "Customer {#cust}"}
            ]},
            {"type": "field", "label": "Customers", "value": "count(customer#*)"}
        ]}"##,
        &sales_rows(),
        100,
    );
    assert_eq!(texts(&pages), ["Customer A", "Customer C", "Customers: 3"]);
}

#[test]
fn test_visibility_of_instances_and_leaves() {
    let pages = run_text(
        r#"{"children": [
            {"type": "group", "name": "customer", "keys": ["cust"], "children": [
                {"type": "text", "text": "Customer {#cust}"},
                {"type": "text", "text": "--- end ---", "visible": "last()"}
            ]},
            {"type": "group", "name": "first_only", "keys": ["cust"], "visible": "first()", "children": [
                {"type": "text", "text": "First {#cust}"}
            ]}
        ]}"#,
        &sales_rows(),
        100,
    );
    assert_eq!(
        texts(&pages),
        ["Customer A", "Customer B", "Customer C", "--- end ---", "First A"]
    );
}

#[test]
fn test_band_groups_children() {
    let pages = run_text(
        r#"{"children": [
            {"type": "band", "text": "Totals", "visible": "count(customer#*) > 0", "children": [
                {"type": "field", "label": "Sum", "value": "sumAll(customer#amount)"}
            ]},
            {"type": "group", "name": "customer", "keys": ["cust"], "fields": ["amount"]}
        ]}"#,
        &sales_rows(),
        1,
    );
    assert_eq!(pages.len(), 2);
    assert_eq!(texts(&pages), ["Totals", "Sum: 18"]);
}

// ============================================================================
// Page Tracker
// ============================================================================

const TRACED: &str = r##"{
    "children": [
        {"type": "group", "name": "customer", "keys": ["cust"], "children": [
            {"type": "field", "value": "#cust", "trace": "cust"}
        ]},
        {"type": "text", "text": "{currentStart(#cust)} - {current(#cust)}"}
    ]
}"##;

#[test]
fn test_current_values_follow_the_page() {
    let pages = run_text(TRACED, &sales_rows(), 100);
    assert_eq!(texts(&pages), ["A", "B", "C", "A - C"]);

    let pages = run_text(TRACED, &sales_rows(), 2);
    assert_eq!(page_texts(&pages[0]), ["A", "B"]);
    assert_eq!(page_texts(&pages[1]), ["C", "C - C"]);
}

// ============================================================================
// Subreports
// ============================================================================

const NOTES: &str = r##"{
    "children": [
        {"type": "group", "name": "customer", "keys": ["cust"], "children": [
            {"type": "text", "text": "Customer {#cust}"},
            {"type": "subreport", "name": "notes", "source": "notes", "params": {"cust": "#cust"},
             "children": [
                {"type": "group", "name": "note", "keys": "*", "fields": ["text"], "children": [
                    {"type": "text", "text": "- {#text} for {customer#cust}"}
                ]}
            ]},
            {"type": "field", "label": "Notes", "value": "count(note#*)"}
        ]}
    ]
}"##;

fn notes_provider() -> JsonDataProvider {
    JsonDataProvider::from_json(&json!({
        "notes": [
            {"cust": "A", "text": "hello"},
            {"cust": "C", "text": "elsewhere"},
            {"cust": "A", "text": "world"}
        ]
    }))
    .unwrap()
}

fn customers(names: &[&str]) -> Vec<Row> {
    names.iter().map(|&n| row(&[("cust", n.into())])).collect()
}

#[test]
fn test_subreport_rows_follow_the_host() {
    let template = template(NOTES);
    let provider = notes_provider();
    let rows = customers(&["A", "B"]);
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(100)).with_data(&provider);
    let pages = run.run_to_end().unwrap();
    assert_eq!(
        texts(&pages),
        [
            "Customer A",
            "- hello for A",
            "- world for A",
            "Notes: 2",
            "Customer B",
            "Notes: 0"
        ]
    );
}

#[test]
fn test_subreport_resumes_across_pages() {
    let template = template(NOTES);
    let provider = notes_provider();
    let rows = customers(&["A", "B"]);
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(2)).with_data(&provider);
    let pages = run.run_to_end().unwrap();
    assert_eq!(pages.len(), 3);
    assert_eq!(page_texts(&pages[1]), ["- world for A", "Notes: 2"]);
    assert_eq!(texts(&pages).len(), 6);
}

#[test]
fn test_unknown_data_source_fails_the_run() {
    let template = template(NOTES);
    let provider = JsonDataProvider::new();
    let rows = customers(&["A"]);
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(100)).with_data(&provider);
    let err = run.next_page().unwrap_err();
    assert!(matches!(
        err,
        GenerateError::Data { ref subreport, ref source_name, .. }
            if subreport == "notes" && source_name == "notes"
    ));
    assert_eq!(page_texts(&Page { number: 1, fragments: run.take_partial() }), ["Customer A"]);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_resolve_error_ends_the_run_and_keeps_partial_output() {
    let template = template(
        r#"{"children": [
            {"type": "group", "name": "item", "keys": ["n"], "children": [
                {"type": "field", "name": "ratio", "value": "10 / (#n - 3)"}
            ]}
        ]}"#,
    );
    let rows: Vec<Row> = (1..=4).map(|n| row(&[("n", Value::Long(n))])).collect();
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(100));

    let err = run.next_page().unwrap_err();
    let GenerateError::Resolve(resolve) = &err else {
        panic!("expected a resolve error, got {:?}", err);
    };
    assert_eq!(resolve.node(), Some("ratio"));
    assert_eq!(resolve.root_cause(), &ResolveError::DivisionByZero);

    let partial = run.take_partial();
    let partial: Vec<&str> = partial.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(partial, ["-5", "-10"]);
    assert!(run.is_finished());
    assert!(run.next_page().unwrap().is_none());
}

#[test]
fn test_named_field_writes_back_into_its_group() {
    let template = template(
        r##"{"children": [
            {"type": "group", "name": "item", "keys": ["n"], "children": [
                {"type": "field", "name": "double", "value": "#n * 2"},
                {"type": "text", "text": "again {#double}"}
            ]}
        ]}"##,
    );
    let rows = vec![row(&[("n", Value::Long(4))])];
    let mut run = ReportRun::new(&template, &rows, TextBackend::new(100));
    let pages = run.run_to_end().unwrap();
    assert_eq!(texts(&pages), ["8", "again 8"]);
}

#[test]
fn test_template_is_reusable_across_runs() {
    let template: Template = template(SALES_TEMPLATE);
    let rows = sales_rows();
    for _ in 0..2 {
        let mut run = ReportRun::new(&template, &rows, TextBackend::new(7));
        assert_eq!(texts(&run.run_to_end().unwrap()), SALES_LINES);
    }
}
