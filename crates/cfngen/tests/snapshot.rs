//! Snapshot tests
//!
//! Loads each *.hcl file in /tests/ individually and compares the generated
//! template, or the diagnostics if the configuration is invalid.

use cfngen::cloudformation::{ArtifactLocation, Encoder};
use cfngen::diagnostic::Diagnostics;
use cfngen::documents::Documents;
use cfngen::graph::Graph;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;

#[test]
fn snapshots() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("CFNGEN_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let registry = cfngen::provider::aws::registry();

    insta::glob!("*.hcl", |path| {
        let mut documents = Documents::default();
        let text = std::fs::read_to_string(path).unwrap();
        let file_name = PathBuf::from(path.file_name().unwrap());
        documents.insert(text, Some(file_name)).unwrap();

        let (graph, mut diagnostics) = Graph::decode(&documents, &registry);
        let rendered = match graph {
            Some(graph) => {
                let artifacts: HashMap<String, ArtifactLocation> = graph
                    .with_source_code()
                    .map(|(resource, _)| {
                        let key = format!("{}.zip", resource.name());
                        (
                            resource.name().to_string(),
                            ArtifactLocation::new("artifacts".to_string(), key),
                        )
                    })
                    .collect();

                let (template, encode_diagnostics) = Encoder::new().encode(&graph, &artifacts);
                diagnostics.append(encode_diagnostics);
                match diagnostics.has_errors() {
                    true => rendered_diagnostics(&diagnostics),
                    false => serde_json::to_value(&template).unwrap(),
                }
            }
            None => rendered_diagnostics(&diagnostics),
        };

        insta::with_settings!({ sort_maps => true }, {
            insta::assert_json_snapshot!(rendered);
        });
    });
}

fn rendered_diagnostics(diagnostics: &Diagnostics) -> serde_json::Value {
    diagnostics
        .iter()
        .map(|diagnostic| {
            json!({
                "severity": diagnostic.severity.to_string(),
                "summary": diagnostic.summary,
                "detail": diagnostic.detail,
                "subject": diagnostic.subject.as_ref().map(ToString::to_string),
            })
        })
        .collect()
}
