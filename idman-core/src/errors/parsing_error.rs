/// Malformed input files.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ParsingError {
    #[error("unsupported file extension: {extension}")]
    UnsupportedExtension { extension: String },

    #[error("input file is empty: {path}")]
    EmptyFile { path: String },

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("malformed CSV at line {line}: {reason}")]
    MalformedCsv { line: usize, reason: String },

    #[error("malformed JSON: {reason}")]
    MalformedJson { reason: String },

    #[error("malformed YAML: {reason}")]
    MalformedYaml { reason: String },
}

impl ParsingError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ParsingError::UnsupportedExtension { .. } => "PARSE_EXTENSION",
            ParsingError::EmptyFile { .. } => "PARSE_EMPTY",
            ParsingError::Unreadable { .. } => "PARSE_UNREADABLE",
            ParsingError::MalformedCsv { .. } => "PARSE_CSV",
            ParsingError::MalformedJson { .. } => "PARSE_JSON",
            ParsingError::MalformedYaml { .. } => "PARSE_YAML",
        }
    }
}
