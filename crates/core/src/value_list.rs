use crate::types::{AnnotationDocument, AnnotationTarget, ServiceMetadata, ValueListReference};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Fully qualified term marking a property whose values come from other services.
pub const VALUE_LIST_REFERENCES_TERM: &str = "com.sap.vocabularies.Common.v1.ValueListReferences";

const VALUE_LIST_REFERENCES_ALIAS: &str = "Common.ValueListReferences";

/// Raised when a value-list annotation does not have the expected shape.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("annotation target is empty")]
    EmptyTarget,
    #[error("`{term}` on `{target}` is not a collection")]
    NotACollection { target: String, term: String },
    #[error("`{term}` on `{target}` has an invalid entry at index {index}")]
    InvalidEntry {
        target: String,
        term: String,
        index: usize,
    },
}

/// Returns true when `term` names the value-list references annotation.
///
/// # Examples
///
/// ```
/// use odata_inquirer_core::value_list::is_value_list_references_term;
///
/// assert!(is_value_list_references_term("@Common.ValueListReferences"));
/// assert!(!is_value_list_references_term("Common.ValueList"));
/// ```
pub fn is_value_list_references_term(term: &str) -> bool {
    let term = term.trim_start_matches('@');
    term == VALUE_LIST_REFERENCES_TERM || term == VALUE_LIST_REFERENCES_ALIAS
}

/// Collects every value-list reference declared for a service.
///
/// Property annotations inside the metadata are scanned first, then the
/// inline metadata targets, then each annotation document in order. Each
/// reference is rooted at `service_path`. Duplicate `(target, value)` pairs
/// are reported once.
pub fn value_list_references(
    service_path: &str,
    metadata: &ServiceMetadata,
    annotations: &[AnnotationDocument],
) -> Result<Vec<ValueListReference>, ExtractionError> {
    let mut collector = Collector::new(service_path);

    for entity_type in &metadata.entity_types {
        for property in &entity_type.properties {
            let target = if metadata.namespace.is_empty() {
                format!("{}/{}", entity_type.name, property.name)
            } else {
                format!(
                    "{}.{}/{}",
                    metadata.namespace, entity_type.name, property.name
                )
            };
            collector.visit(&target, &property.annotations)?;
        }
    }

    let targets = metadata
        .annotations
        .iter()
        .chain(annotations.iter().flat_map(|doc| doc.targets.iter()));
    for AnnotationTarget { target, terms } in targets {
        collector.visit(target, terms)?;
    }

    Ok(collector.references)
}

struct Collector<'a> {
    root_path: &'a str,
    seen: BTreeSet<(String, String)>,
    references: Vec<ValueListReference>,
}

impl<'a> Collector<'a> {
    fn new(root_path: &'a str) -> Self {
        Self {
            root_path,
            seen: BTreeSet::new(),
            references: Vec::new(),
        }
    }

    fn visit(&mut self, target: &str, terms: &BTreeMap<String, Value>) -> Result<(), ExtractionError> {
        for (term, value) in terms {
            if !is_value_list_references_term(term) {
                continue;
            }
            if target.trim().is_empty() {
                return Err(ExtractionError::EmptyTarget);
            }
            let entries = value
                .as_array()
                .ok_or_else(|| ExtractionError::NotACollection {
                    target: target.to_string(),
                    term: term.clone(),
                })?;
            for (index, entry) in entries.iter().enumerate() {
                let reference = entry
                    .as_str()
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .ok_or_else(|| ExtractionError::InvalidEntry {
                        target: target.to_string(),
                        term: term.clone(),
                        index,
                    })?;
                if self
                    .seen
                    .insert((target.to_string(), reference.to_string()))
                {
                    self.references.push(ValueListReference {
                        target: target.to_string(),
                        root_path: self.root_path.to_string(),
                        value: reference.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
