use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use chatstats::core::{Orchestrator, RunResult};
use chatstats::error::AppError;
use chatstats::pricing::ModelRegistry;
use chatstats::tokens::{Encoding, TokenCounter};

use crate::cli::{Cli, Commands, parse_command};
use crate::output::{
    TableOptions, daily_json, hourly_json, models_json, render_daily, render_hourly,
    render_models, render_summary, summary_json,
};

/// Read the export and return its top-level conversation array
fn read_input(path: &Path) -> Result<Vec<Value>, AppError> {
    let content = fs::read_to_string(path).map_err(|source| AppError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| AppError::ParseInput {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(AppError::NotAnArray {
            path: path.to_path_buf(),
        }),
    }
}

fn render(cli: &Cli, result: &RunResult, registry: &ModelRegistry, tokenizer: &str) -> String {
    let command = parse_command(cli.command);
    if cli.json {
        let mut json = match command {
            Commands::Daily => daily_json(result, cli.order, cli.breakdown),
            Commands::Hourly => hourly_json(result, cli.order),
            Commands::Models => models_json(result, registry),
            Commands::Summary => summary_json(result),
        };
        json.push('\n');
        return json;
    }

    let opts = TableOptions {
        order: cli.order,
        use_color: cli.use_color(),
        breakdown: cli.breakdown,
    };
    match command {
        Commands::Daily => render_daily(result, opts),
        Commands::Hourly => render_hourly(result, opts),
        Commands::Models => render_models(result, registry, opts),
        Commands::Summary => render_summary(result, tokenizer, opts.use_color),
    }
}

/// Run one aggregation over `cli.file` and render the requested view
pub(crate) fn run(cli: &Cli, registry: ModelRegistry) -> Result<String, AppError> {
    let encoding = cli
        .encoding
        .as_deref()
        .map(str::parse::<Encoding>)
        .transpose()?
        .unwrap_or_default();

    let input = read_input(&cli.file)?;
    debug!(path = %cli.file.display(), entries = input.len(), "loaded export");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(AppError::Runtime)?;

    let counter = if cli.heuristic {
        TokenCounter::heuristic()
    } else {
        TokenCounter::tiktoken(encoding)
    };
    let mut orchestrator = Orchestrator::new(registry);
    let result = runtime.block_on(async {
        let result = orchestrator.run(&input, &counter).await;
        counter.shutdown();
        result
    });

    let tokenizer = if counter.is_heuristic() {
        "heuristic (utf-16 units / 4)".to_string()
    } else {
        format!("tiktoken {}", encoding.name())
    };
    debug!(
        processed = result.processed,
        skipped = result.skipped,
        tokenizer = %tokenizer,
        "run finished"
    );

    Ok(render(cli, &result, orchestrator.registry(), &tokenizer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn read_input_accepts_array() {
        let file = temp_file(r#"[{"id": "a"}, 1]"#);
        assert_eq!(read_input(file.path()).unwrap().len(), 2);
    }

    #[test]
    fn read_input_rejects_object() {
        let file = temp_file(r#"{"conversations": []}"#);
        assert!(matches!(read_input(file.path()), Err(AppError::NotAnArray { .. })));
    }

    #[test]
    fn read_input_rejects_bad_json() {
        let file = temp_file("[{");
        assert!(matches!(read_input(file.path()), Err(AppError::ParseInput { .. })));
    }

    #[test]
    fn read_input_missing_file() {
        let err = read_input(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, AppError::ReadInput { .. }));
    }
}
