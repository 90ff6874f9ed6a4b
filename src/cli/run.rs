//! Generate a text report from a template and JSON rows

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::EngineConfig;
use crate::output::{TextBackend, TextLine};
use crate::resolve::JsonDataProvider;
use crate::template::Template;
use crate::traverse::{Page, ReportRun};
use crate::value::Value;

use super::{CliError, rows_from_json_text};

/// Options for the run command
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub template: PathBuf,
    /// JSON rows; `data` wins over `data_path`
    pub data: Option<String>,
    pub data_path: Option<PathBuf>,
    /// JSON object mapping subreport sources to row arrays
    pub subreports: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub params: HashMap<String, Value>,
    pub lines_per_page: Option<usize>,
    pub lenient: bool,
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load everything the options name and generate every page
pub fn execute_run(options: &RunOptions) -> Result<Vec<Page<TextLine>>, CliError> {
    let template = Template::from_json_str(&read(&options.template)?)?;

    let data = match (&options.data, &options.data_path) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read(path)?,
        (None, None) => return Err(CliError::NoInput),
    };
    let rows = rows_from_json_text(&data)?;

    let mut config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if let Some(lines) = options.lines_per_page {
        config.lines_per_page = lines;
    }
    if options.lenient {
        config.lenient_fields = true;
    }

    let provider = match &options.subreports {
        Some(path) => {
            let json: serde_json::Value = serde_json::from_str(&read(path)?)?;
            JsonDataProvider::from_json(&json)?
        }
        None => JsonDataProvider::new(),
    };

    info!(template = %options.template.display(), rows = rows.len(), "generating report");
    let backend = TextBackend::new(config.lines_per_page);
    let mut run = ReportRun::new(&template, &rows, backend)
        .with_params(&options.params)
        .with_data(&provider)
        .with_config(config);
    Ok(run.run_to_end()?)
}

/// Pages as plain text, separated by a form feed line
pub fn render_pages(pages: &[Page<TextLine>]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            out.push_str("\u{c}\n");
        }
        for line in &page.fragments {
            out.push_str(&line.to_string());
            out.push('\n');
        }
    }
    out
}
