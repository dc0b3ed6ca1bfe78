use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP client error: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Spreadsheet read error: {0}")]
    SpreadsheetReadError(#[from] calamine::Error),

    #[error("Spreadsheet write error: {0}")]
    SpreadsheetWriteError(#[from] rust_xlsxwriter::XlsxError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Input '{source_name}' is missing required column '{column}'")]
    MissingColumn { source_name: String, column: String },

    #[error("No usable input found (checked: {})", checked.join(", "))]
    NoUsableInput { checked: Vec<String> },

    #[error("Unsupported file format: {path}")]
    UnsupportedFormat { path: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Input,
    Network,
    Output,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl GeocodeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) => ErrorCategory::Network,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Config,
            Self::CsvError(_)
            | Self::SpreadsheetReadError(_)
            | Self::MissingColumn { .. }
            | Self::NoUsableInput { .. }
            | Self::UnsupportedFormat { .. } => ErrorCategory::Input,
            Self::IoError(_) | Self::SpreadsheetWriteError(_) => ErrorCategory::Output,
            Self::SerializationError(_) | Self::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Config | ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Output => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ApiError(_) => {
                "Check network connectivity and that the geocoding endpoint is reachable".to_string()
            }
            Self::ConfigError { .. } | Self::ConfigValidationError { .. } => {
                "Fix the configuration file; it must be valid TOML with the documented sections"
                    .to_string()
            }
            Self::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}' in the configuration", field)
            }
            Self::MissingConfigError { field } => {
                format!("Add '{}' to the configuration", field)
            }
            Self::MissingColumn { column, .. } => format!(
                "Add a '{}' column to the input (required: Name, Address, Suburb, Postcode)",
                column
            ),
            Self::NoUsableInput { .. } => {
                "Set [source].input (or --input) to the file holding the complete dataset"
                    .to_string()
            }
            Self::UnsupportedFormat { .. } => {
                "Use a .csv, .json, .xlsx, .xls, .xlsm or .ods file".to_string()
            }
            Self::CsvError(_) | Self::SpreadsheetReadError(_) => {
                "Make sure the input file is not corrupted or open in another program".to_string()
            }
            Self::IoError(_) | Self::SpreadsheetWriteError(_) => {
                "Check that the output directory exists and is writable".to_string()
            }
            Self::SerializationError(_) | Self::ProcessingError { .. } => {
                "Re-run with --verbose and inspect the offending row".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Config => format!("Configuration problem: {}", self),
            ErrorCategory::Input => format!("Could not load input data: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Output => format!("Could not write output: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeocodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_usable_input_lists_checked_paths() {
        let err = GeocodeError::NoUsableInput {
            checked: vec!["Data_final.xlsx".to_string(), "out/services.csv".to_string()],
        };

        assert_eq!(
            err.to_string(),
            "No usable input found (checked: Data_final.xlsx, out/services.csv)"
        );
        assert_eq!(err.category(), ErrorCategory::Input);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_severity_by_category() {
        let io = GeocodeError::IoError(std::io::Error::other("disk full"));
        assert_eq!(io.severity(), ErrorSeverity::Critical);

        let missing = GeocodeError::MissingConfigError {
            field: "source.input".to_string(),
        };
        assert_eq!(missing.category(), ErrorCategory::Config);
        assert!(missing.recovery_suggestion().contains("source.input"));
    }
}
