//! Documentation content for the banded CLI

use super::CliError;

/// Available documentation topics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocTopic {
    Expressions,
    Functions,
    Templates,
    Pagination,
}

impl DocTopic {
    /// Parse topic name from string
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "expressions" | "expression" | "syntax" => Some(Self::Expressions),
            "functions" | "function" | "aggregates" => Some(Self::Functions),
            "templates" | "template" | "elements" => Some(Self::Templates),
            "pagination" | "pages" | "paging" => Some(Self::Pagination),
            _ => None,
        }
    }
}

/// Get the docs overview (topic listing)
pub fn get_docs_overview() -> &'static str {
    r#"BANDED DOCUMENTATION

banded generates paginated reports from a JSON template and a set of JSON
rows. Rows are grouped into nested levels by key fields; template elements
print fields and aggregates of the current group.

DOCUMENTATION TOPICS

  expressions       Field references, parameters, operators and literals
  functions         Aggregates, positional and page functions
  templates         Template elements and their attributes
  pagination        Page breaks and how generation resumes

QUICK REFERENCE

  #field            Field of the current group
  group#field       Field of the nearest ancestor (or first descendant) group
  group#field[2]    Field of the third instance of group
  $NAME             Report parameter
  sum(line#amount)  Aggregate over the line instances below this group

Run 'banded docs <topic>' for detailed documentation.
"#
}

/// Get documentation for a specific topic
pub fn get_doc_topic(name: &str) -> Result<&'static str, CliError> {
    match DocTopic::from_name(name) {
        Some(DocTopic::Expressions) => Ok(EXPRESSIONS_DOC),
        Some(DocTopic::Functions) => Ok(FUNCTIONS_DOC),
        Some(DocTopic::Templates) => Ok(TEMPLATES_DOC),
        Some(DocTopic::Pagination) => Ok(PAGINATION_DOC),
        None => Err(CliError::UnknownTopic(name.to_string())),
    }
}

const EXPRESSIONS_DOC: &str = r#"EXPRESSIONS

FIELD REFERENCES
  #name
    Field of the current group.

  group#name
    Field of the nearest enclosing group called 'group'. When no
    enclosing group has that name, the first instance of 'group' below
    the current group (or below one of its ancestors) is used.

  group#name[expr]
    Field of the instance at zero-based index expr in the group's list.
    For an ancestor the list is its sibling list; otherwise all instances
    below the current group. An index past the end is an error.

  group#*
    Wildcard reference, only valid as the argument of count().

PARAMETERS
  $NAME
    Report parameter supplied by the caller (banded run --param NAME=VALUE).
    An unknown parameter is an error.

METHODS
  Class.method()            value result
  bool:Class.method()       boolean result, checked
  text:Class.method()       result converted to text

OPERATORS
  or  and  not  !           boolean, short-circuit; null counts as false
  ==  !=                    equality; numbers compare across types
  <  >  <=  >=              ordering; any comparison with null is false
  +  -  *  /  %             arithmetic; null in, null out

LITERALS
  42  3.5  "text"  'text'  true  false  null
"#;

const FUNCTIONS_DOC: &str = r#"FUNCTIONS

AGGREGATES
  sum(group#field)            Sum of the field over the group's instances
  count(group#field)          Instances where the field is present
  count(group#*)              Instances
  count()                     Size of the current group's list
  countDistinct(group#field)  Distinct non-null values
  min(group#field)            Smallest value, skipping null and zero
  max(group#field)            Largest value, skipping null and zero

  The start group is the current group for descendant levels and the
  parent for the current level. The *All variants (sumAll, countAll,
  countDistinctAll, minAll, maxAll) start from the report root instead.
  A start group that cannot be reached yields 0 (null for min/max).

  Inside an aggregate the bracket is a filter evaluated per instance:
    sum(line#amount[#amount > 100])

POSITIONAL
  prev(#field)   Field of the previous instance, null on the first
  next(#field)   Field of the next instance, null on the last
  first(#field)  Field of the first instance
  last(#field)   Field of the last instance
  first()        True on the first instance
  last()         True on the last instance
  recnum()       1-based position of the current instance

PAGE
  pagenum()              Page being generated
  current(#field)        Last value printed on this page with that trace tag
  currentStart(#field)   First value printed on this page with that trace tag
  exist(group#field)     True when the group exists and the field is present
"#;

const TEMPLATES_DOC: &str = r#"TEMPLATES

A template is a JSON object with a root name, optional root fields and a
list of child elements. Every element takes an optional "name" and an
optional "visible" expression.

  group       keys ("*" or a list), control_break, fields, order,
              order_by_key, descending, case_sensitive, filter, children
  band        optional text, children
  text        text with {expr} placeholders
  field       value expression, auto, trace, label
  page_break  ends the page after this element
  subreport   source, params (column to host expression), searchable,
              fields, children

Example:
  {"name": "sales", "children": [
    {"type": "group", "name": "customer", "keys": ["cust"], "children": [
      {"type": "text", "text": "Customer {#cust}"},
      {"type": "group", "name": "line", "keys": "*", "fields": ["amount"]},
      {"type": "field", "label": "Total", "value": "sum(line#amount)"}
    ]}
  ]}

A named field element writes its value back into the current group, so
later expressions can read it as #name. With "auto": true the value is
computed on first use and cached per instance.

Rows with the same key share one group instance even when other keys
come in between. With "control_break": true a row only joins the
instance created last, so keys A, B, A give three instances.
"#;

const PAGINATION_DOC: &str = r#"PAGINATION

Pages are generated one at a time. The text backend ends a page when it
is full or when a page_break element is reached. Generation then stops,
and the next page resumes at the element after the break, inside the
same group instance. Nothing is printed twice and nothing is skipped.

A final page with no lines is dropped unless drop_trailing_empty_page is
false in the configuration.

CONFIGURATION (TOML, banded run --config FILE)
  lenient_fields = false          undeclared fields print a marker
  max_eval_depth = 64             expression nesting limit (at most 256)
  case_sensitive_order = true     default string ordering
  lines_per_page = 40
  drop_trailing_empty_page = true
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_accept_aliases() {
        assert_eq!(DocTopic::from_name("Aggregates"), Some(DocTopic::Functions));
        assert!(get_doc_topic("pages").unwrap().starts_with("PAGINATION"));
        assert!(matches!(get_doc_topic("nope"), Err(CliError::UnknownTopic(_))));
    }
}
