#![allow(dead_code)]

use std::collections::HashMap;

use banded_report::{
    EngineConfig, Environment, Evaluator, GroupId, GroupTree, MethodResolver, NoMethods, Page,
    PageTrace, ResolveError, Row, Template, TextLine, Value, parse_expression,
};

/// Customers, their orders and order lines.
pub const SALES_TEMPLATE: &str = r##"{
    "name": "sales",
    "children": [
        {"type": "text", "text": "Sales report"},
        {"type": "group", "name": "customer", "keys": ["cust"], "children": [
            {"type": "text", "name": "cust_header", "text": "Customer {#cust}"},
            {"type": "group", "name": "order", "keys": ["order"], "children": [
                {"type": "text", "text": "Order {#order}"},
                {"type": "group", "name": "line", "keys": "*", "fields": ["amount"], "children": [
                    {"type": "field", "value": "#amount"}
                ]},
                {"type": "field", "label": "Order total", "value": "sum(line#amount)"}
            ]},
            {"type": "field", "label": "Customer total", "value": "sum(line#amount)"}
        ]},
        {"type": "field", "label": "Grand total", "value": "sumAll(line#amount)"}
    ]
}"##;

/// Every line of the sales report, in order.
pub const SALES_LINES: [&str; 25] = [
    "Sales report",
    "Customer A",
    "Order 1",
    "10",
    "20",
    "Order total: 30",
    "Order 2",
    "5",
    "Order total: 5",
    "Customer total: 35",
    "Customer B",
    "Order 3",
    "7",
    "Order total: 7",
    "Customer total: 7",
    "Customer C",
    "Order 4",
    "1",
    "2",
    "Order total: 3",
    "Order 5",
    "3",
    "Order total: 3",
    "Customer total: 6",
    "Grand total: 48",
];

pub fn row(pairs: &[(&str, Value)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn sales_rows() -> Vec<Row> {
    [
        ("A", 1, 10),
        ("A", 1, 20),
        ("A", 2, 5),
        ("B", 3, 7),
        ("C", 4, 1),
        ("C", 4, 2),
        ("C", 5, 3),
    ]
    .iter()
    .map(|&(cust, order, amount)| {
        row(&[
            ("cust", Value::from(cust)),
            ("order", Value::Long(order)),
            ("amount", Value::Long(amount)),
        ])
    })
    .collect()
}

pub fn template(json: &str) -> Template {
    Template::from_json_str(json).unwrap()
}

/// Sales group tree, loaded but not traversed.
pub fn sales_tree() -> GroupTree {
    let template = template(SALES_TEMPLATE);
    let mut tree = template.new_tree();
    let root = tree.root();
    tree.load_rows(root, &sales_rows());
    tree
}

/// Instances of `name` below `from`, depth first.
pub fn all(tree: &GroupTree, from: GroupId, name: &str) -> Vec<GroupId> {
    tree.descendants(from, name)
}

pub fn texts(pages: &[Page<TextLine>]) -> Vec<String> {
    pages
        .iter()
        .flat_map(|p| p.fragments.iter().map(|l| l.text.clone()))
        .collect()
}

pub fn params() -> HashMap<String, Value> {
    HashMap::from([("VAT".to_string(), Value::Long(22))])
}

pub fn eval(tree: &mut GroupTree, group: GroupId, expr: &str) -> Result<Value, ResolveError> {
    eval_with(tree, group, expr, &EngineConfig::default(), &NoMethods)
}

pub fn eval_with(
    tree: &mut GroupTree,
    group: GroupId,
    expr: &str,
    config: &EngineConfig,
    methods: &dyn MethodResolver,
) -> Result<Value, ResolveError> {
    let symbol = parse_expression(expr).unwrap();
    let params = params();
    let tracker = PageTrace::default();
    let env = Environment {
        params: &params,
        methods,
        tracker: &tracker,
        config,
        page: 1,
    };
    Evaluator::new(tree, env).evaluate(&symbol, group)
}
