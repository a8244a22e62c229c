//! Attribute dump use case
//!
//! Writes raw attribute values of one object to files, byte for byte, with
//! the length the module negotiated. Any failure aborts the dump.

use std::fmt;
use std::path::PathBuf;

use tracing::info;

use crate::error::{DomainError, ModuleError, ProbeError, ProbeResult};
use crate::model::{AttributeType, ObjectHandle, Session, SlotId};
use crate::ports::TokenModule;
use crate::use_cases::probe::fetch_value;

/// Where dumped values go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputSpec {
    /// One fixed file; only valid for a single attribute
    File(PathBuf),
    /// Filename template expanded per attribute
    Template(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpTarget {
    pub object: ObjectHandle,
    pub attributes: Vec<AttributeType>,
    pub output: OutputSpec,
}

/// One value written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    pub attribute: AttributeType,
    pub path: PathBuf,
    pub length: usize,
}

impl fmt::Display for DumpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Writing {} bytes to {:?} for attribute {:#x} ({})",
            self.length, self.path, self.attribute.0, self.attribute
        )
    }
}

/// Expand `%o`, `%a`, `%s` and `%%` in a filename template
///
/// Numbers are written in decimal.
pub fn expand_template(
    template: &str,
    object: ObjectHandle,
    attribute: AttributeType,
    slot: SlotId,
) -> Result<String, DomainError> {
    let invalid = |reason: String| DomainError::Template {
        template: template.to_string(),
        reason,
    };

    let mut expanded = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            expanded.push(c);
            continue;
        }
        match chars.next() {
            Some('o') => expanded.push_str(&object.0.to_string()),
            Some('a') => expanded.push_str(&attribute.0.to_string()),
            Some('s') => expanded.push_str(&slot.0.to_string()),
            Some('%') => expanded.push('%'),
            Some(other) => return Err(invalid(format!("unknown item %{}", other))),
            None => return Err(invalid("trailing %".to_string())),
        }
    }
    Ok(expanded)
}

impl DumpTarget {
    /// Output path of every attribute, checked before anything is fetched
    pub fn paths(&self, slot: SlotId) -> ProbeResult<Vec<(AttributeType, PathBuf)>> {
        match &self.output {
            OutputSpec::File(path) => match self.attributes.as_slice() {
                [attribute] => Ok(vec![(*attribute, path.clone())]),
                _ => Err(DomainError::Template {
                    template: path.display().to_string(),
                    reason: format!(
                        "a single output file holds one attribute, {} requested",
                        self.attributes.len()
                    ),
                }
                .into()),
            },
            OutputSpec::Template(template) => self
                .attributes
                .iter()
                .map(|&attribute| {
                    expand_template(template, self.object, attribute, slot)
                        .map(|path| (attribute, PathBuf::from(path)))
                        .map_err(ProbeError::from)
                })
                .collect(),
        }
    }
}

/// Fetch each attribute of the target and write it to its file
pub fn dump<M: TokenModule>(
    module: &mut M,
    session: &Session,
    target: &DumpTarget,
) -> ProbeResult<Vec<DumpRecord>> {
    let mut records = Vec::with_capacity(target.attributes.len());

    for (attribute, path) in target.paths(session.slot)? {
        let value = fetch_value(module, session.handle, target.object, attribute)?.ok_or_else(
            || ModuleError::ValueUnavailable {
                attribute,
                object: target.object.to_string(),
            },
        )?;

        std::fs::write(&path, &value).map_err(|source| ProbeError::Output {
            path: path.clone(),
            source,
        })?;

        let record = DumpRecord {
            attribute,
            path,
            length: value.len(),
        };
        info!("{}", record);
        records.push(record);
    }

    Ok(records)
}
