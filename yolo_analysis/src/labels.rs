use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelsError {
    #[error("Failed to read labels file: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid label on line {line}: {content}")]
    InvalidLine { line: usize, content: String },
    #[error("Labels file contains no labels")]
    Empty,
}

/// Class index to human-readable label, loaded once next to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    pub fn new(labels: Vec<String>) -> Result<Self, LabelsError> {
        if labels.is_empty() {
            return Err(LabelsError::Empty);
        }
        Ok(Self { labels })
    }

    pub fn from_file(filepath: &Path) -> Result<Self, LabelsError> {
        let file = File::open(filepath)?;
        Self::from_reader(io::BufReader::new(file))
    }

    /// Accepts either `label` or `label,red,green,blue` per line.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, LabelsError> {
        let mut labels = Vec::new();

        for (index, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }

            let label = line.split(',').next().unwrap_or_default().trim();
            if label.is_empty() {
                return Err(LabelsError::InvalidLine {
                    line: index + 1,
                    content: line,
                });
            }
            labels.push(label.to_string());
        }

        Self::new(labels)
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.labels.get(class_id) {
            Some(label) => label.clone(),
            None => format!("Unknown class {}", class_id),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
