//! CLI command implementations.
//!
//! The binary parses arguments and prints responses; everything it does
//! lives here so tests can drive it without a subprocess.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use docgraph_core::analyzer::ProgramData;
use docgraph_core::converter::{ConversionResult, Converter};
use docgraph_core::error::DocgraphError;
use docgraph_core::models::ProjectReflection;
use docgraph_core::options::ConverterOptions;
use docgraph_core::output::{ConvertResponse, Warning, SCHEMA_VERSION};
use docgraph_core::router::{PageKind, Router};
use docgraph_core::serialization::{from_json_str, to_json_string};

use crate::emit::{EmitReport, OutputQueue};

pub const PROJECT_FILE: &str = "project.json";
pub const PAGES_FILE: &str = "pages.json";
pub const WARNINGS_FILE: &str = "warnings.json";
pub const MANIFEST_FILE: &str = "manifest.json";

// ============================================================================
// Page Listing
// ============================================================================

/// One routed page as written to `pages.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEntry {
    pub url: String,
    pub kind: PageKind,
    /// Full name of the rendered reflection; empty for the project root.
    pub reflection: String,
}

/// Route `project` and list its pages in router order.
pub fn list_pages(project: &ProjectReflection, options: &ConverterOptions) -> Vec<PageEntry> {
    let mut router = Router::from_options(options);
    router
        .build_pages(project)
        .into_iter()
        .map(|page| PageEntry {
            reflection: project.full_name(page.model, "."),
            url: page.url,
            kind: page.kind,
        })
        .collect()
}

// ============================================================================
// Convert
// ============================================================================

/// Output manifest written next to the other outputs.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    /// RFC 3339 timestamp of the run.
    pub generated_at: String,
    pub project: String,
    pub outputs: Vec<String>,
}

/// Load options from a JSON file, or defaults when no file is given.
pub fn load_options(path: Option<&Path>) -> Result<ConverterOptions, DocgraphError> {
    let Some(path) = path else {
        return Ok(ConverterOptions::default());
    };
    let json = std::fs::read_to_string(path).map_err(|e| {
        DocgraphError::invalid_args(format!("cannot read options {}: {}", path.display(), e))
    })?;
    Ok(ConverterOptions::from_json(&json)?)
}

/// Load an analyzer program dump.
pub fn load_program(path: &Path) -> Result<ProgramData, DocgraphError> {
    let json = std::fs::read_to_string(path).map_err(|e| {
        DocgraphError::invalid_args(format!("cannot read program {}: {}", path.display(), e))
    })?;
    Ok(ProgramData::from_json(&json)?)
}

/// Convert a program with the default plugin set.
pub fn convert_program(
    program: &ProgramData,
    options: &ConverterOptions,
) -> Result<ConversionResult, DocgraphError> {
    let mut converter = Converter::new(options.clone());
    Ok(converter.convert(program)?)
}

/// Run `docgraph convert`: convert, route and write all outputs to `out`.
pub async fn run_convert(
    input: &Path,
    out: &Path,
    options: ConverterOptions,
) -> Result<ConvertResponse, DocgraphError> {
    let program = load_program(input)?;
    let ConversionResult { project, warnings } = convert_program(&program, &options)?;
    let pages = list_pages(&project, &options);
    info!(
        reflections = project.reflections().len(),
        pages = pages.len(),
        warnings = warnings.len(),
        "conversion finished"
    );

    let mut queue = OutputQueue::new();
    queue.push(out.join(PROJECT_FILE), to_json_string(&project)?);
    queue.push(out.join(PAGES_FILE), serde_json::to_string_pretty(&pages)?);
    queue.push(
        out.join(WARNINGS_FILE),
        serde_json::to_string_pretty(&sorted_warnings(warnings.clone()))?,
    );
    let manifest = Manifest {
        schema_version: SCHEMA_VERSION.to_string(),
        generated_at: chrono::Utc::now().to_rfc3339(),
        project: project.name.clone(),
        outputs: vec![
            PROJECT_FILE.to_string(),
            PAGES_FILE.to_string(),
            WARNINGS_FILE.to_string(),
        ],
    };
    queue.push(out.join(MANIFEST_FILE), serde_json::to_string_pretty(&manifest)?);

    let EmitReport { written, failed } = queue.drain().await;
    if let Some(err) = failed.into_iter().next() {
        return Err(err.into());
    }
    Ok(ConvertResponse::new(
        project.name.clone(),
        project.reflections().len(),
        pages.len(),
        written.iter().map(|p| p.display().to_string()).collect(),
        warnings,
    ))
}

// ============================================================================
// Route
// ============================================================================

/// Response for `docgraph route`.
#[derive(Debug, Clone, Serialize)]
pub struct RouteResponse {
    pub status: String,
    pub schema_version: String,
    pub project: String,
    pub pages: Vec<PageEntry>,
}

/// Run `docgraph route`: reload a serialized project and list its pages.
pub fn run_route(project_path: &Path, options: &ConverterOptions) -> Result<RouteResponse, DocgraphError> {
    let json = std::fs::read_to_string(project_path).map_err(|e| {
        DocgraphError::invalid_args(format!(
            "cannot read project {}: {}",
            project_path.display(),
            e
        ))
    })?;
    let project = from_json_str(&json)?;
    Ok(RouteResponse {
        status: "ok".to_string(),
        schema_version: SCHEMA_VERSION.to_string(),
        project: project.name.clone(),
        pages: list_pages(&project, options),
    })
}

/// Warnings in the order they are written to `warnings.json`.
pub fn sorted_warnings(mut warnings: Vec<Warning>) -> Vec<Warning> {
    warnings.sort_by(|a, b| (&a.reflection, &a.code, &a.text).cmp(&(&b.reflection, &b.code, &b.text)));
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use docgraph_core::analyzer::{NodeKind, ProgramBuilder};

    fn sample_program() -> ProgramData {
        let mut b = ProgramBuilder::new();
        let file = b.file("src/app.ts", true);
        let class = b.add(file, None, NodeKind::Class, "App");
        b.node_mut(class).comment = Some("/** Entry. See {@link Nowhere}. */".to_string());
        b.add(file, Some(class), NodeKind::Property, "title");
        b.build()
    }

    #[tokio::test]
    async fn convert_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("program.json");
        std::fs::write(&input, serde_json::to_string(&sample_program()).unwrap()).unwrap();
        let out = dir.path().join("out");

        let response = run_convert(&input, &out, ConverterOptions::default())
            .await
            .unwrap();
        assert_eq!(response.status, "ok");
        assert_eq!(response.outputs.len(), 4);
        assert_eq!(response.warnings.len(), 1);
        for file in [PROJECT_FILE, PAGES_FILE, WARNINGS_FILE, MANIFEST_FILE] {
            assert!(out.join(file).exists(), "{} missing", file);
        }

        let manifest: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(out.join(MANIFEST_FILE)).unwrap())
                .unwrap();
        assert_eq!(manifest["project"], "Documentation");
        assert!(manifest["generated_at"].as_str().unwrap().contains('T'));
    }

    #[tokio::test]
    async fn route_reloads_written_project() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("program.json");
        std::fs::write(&input, serde_json::to_string(&sample_program()).unwrap()).unwrap();
        let out = dir.path().join("out");
        run_convert(&input, &out, ConverterOptions::default())
            .await
            .unwrap();

        let options = ConverterOptions::default();
        let routed = run_route(&out.join(PROJECT_FILE), &options).unwrap();
        let written: Vec<PageEntry> = list_pages(
            &convert_program(&sample_program(), &options).unwrap().project,
            &options,
        );
        assert_eq!(routed.pages, written);
    }

    #[test]
    fn missing_program_is_invalid_arguments() {
        let err = load_program(Path::new("/nonexistent/program.json")).unwrap_err();
        assert!(matches!(err, DocgraphError::InvalidArguments { .. }));
    }
}
