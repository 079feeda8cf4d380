//! Error types shared by the compiler and the renderer

use std::fmt;
use thiserror::Error;

/// Where in a template something happened
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    /// Template identity (normalized path)
    pub template: String,
    /// 1-based line number of the tag
    pub line: usize,
}

impl Location {
    pub fn new(template: impl Into<String>, line: usize) -> Self {
        Self {
            template: template.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.template, self.line)
    }
}

/// Machine-readable error kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Validation,
    RequiredAttribute,
    FunctionNotFound,
    FunctionCall,
    MacroNotFound,
    ArrayToString,
    DictionaryNotFound,
    DictionaryEntryNotFound,
    EmptyTranslation,
    DictionaryDuplicateKey,
    DictionaryFormat,
    FeedClassNotFound,
    Feed,
    FilterNotFound,
    SourceNotFound,
    XmlParse,
    Io,
    Cache,
}

/// Errors raised while compiling or rendering templates
#[derive(Error, Debug)]
pub enum FigError {
    #[error("Syntax error in expression \"{expression}\" at offset {offset} ({location}): {message}")]
    Syntax {
        location: Location,
        expression: String,
        offset: usize,
        message: String,
    },

    #[error("Validation error at {location}: {message}")]
    Validation { location: Location, message: String },

    #[error("Missing required attribute \"{attribute}\" on tag <{tag}> at {location}")]
    RequiredAttribute {
        location: Location,
        tag: String,
        attribute: String,
    },

    #[error("Undeclared function: {name} ({location})")]
    FunctionNotFound { location: Location, name: String },

    #[error("Error calling function {name} at {location}: {message}")]
    FunctionCall {
        location: Location,
        name: String,
        message: String,
    },

    #[error("Macro not found: {name} ({location})")]
    MacroNotFound { location: Location, name: String },

    #[error("Array to string conversion at {location}")]
    ArrayToString { location: Location },

    #[error("Dictionary not found: {name} ({location})")]
    DictionaryNotFound { location: Location, name: String },

    #[error("Dictionary entry not found: {key} ({location})")]
    DictionaryEntryNotFound { location: Location, key: String },

    #[error("Empty translation for key: {key} ({location})")]
    EmptyTranslation { location: Location, key: String },

    #[error("Duplicate key \"{key}\" in dictionary {file}")]
    DictionaryDuplicateKey { file: String, key: String },

    #[error("Malformed dictionary {file}: {message}")]
    DictionaryFormat { file: String, message: String },

    #[error("Feed class not found: {class} ({location})")]
    FeedClassNotFound { location: Location, class: String },

    #[error("Feed {class} failed at {location}: {message}")]
    Feed {
        location: Location,
        class: String,
        message: String,
    },

    #[error("Filter not found: {name} ({location})")]
    FilterNotFound { location: Location, name: String },

    #[error("Source not found: {path}")]
    SourceNotFound {
        location: Option<Location>,
        path: String,
    },

    #[error("XML parse error at {location}: {message}")]
    XmlParse { location: Location, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache error: {0}")]
    Cache(String),
}

impl FigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FigError::Syntax { .. } => ErrorKind::Syntax,
            FigError::Validation { .. } => ErrorKind::Validation,
            FigError::RequiredAttribute { .. } => ErrorKind::RequiredAttribute,
            FigError::FunctionNotFound { .. } => ErrorKind::FunctionNotFound,
            FigError::FunctionCall { .. } => ErrorKind::FunctionCall,
            FigError::MacroNotFound { .. } => ErrorKind::MacroNotFound,
            FigError::ArrayToString { .. } => ErrorKind::ArrayToString,
            FigError::DictionaryNotFound { .. } => ErrorKind::DictionaryNotFound,
            FigError::DictionaryEntryNotFound { .. } => ErrorKind::DictionaryEntryNotFound,
            FigError::EmptyTranslation { .. } => ErrorKind::EmptyTranslation,
            FigError::DictionaryDuplicateKey { .. } => ErrorKind::DictionaryDuplicateKey,
            FigError::DictionaryFormat { .. } => ErrorKind::DictionaryFormat,
            FigError::FeedClassNotFound { .. } => ErrorKind::FeedClassNotFound,
            FigError::Feed { .. } => ErrorKind::Feed,
            FigError::FilterNotFound { .. } => ErrorKind::FilterNotFound,
            FigError::SourceNotFound { .. } => ErrorKind::SourceNotFound,
            FigError::XmlParse { .. } => ErrorKind::XmlParse,
            FigError::Io(_) => ErrorKind::Io,
            FigError::Cache(_) => ErrorKind::Cache,
        }
    }

    /// Source location, when the error can be tied to a template
    pub fn location(&self) -> Option<&Location> {
        match self {
            FigError::Syntax { location, .. }
            | FigError::Validation { location, .. }
            | FigError::RequiredAttribute { location, .. }
            | FigError::FunctionNotFound { location, .. }
            | FigError::FunctionCall { location, .. }
            | FigError::MacroNotFound { location, .. }
            | FigError::ArrayToString { location }
            | FigError::DictionaryNotFound { location, .. }
            | FigError::DictionaryEntryNotFound { location, .. }
            | FigError::EmptyTranslation { location, .. }
            | FigError::FeedClassNotFound { location, .. }
            | FigError::Feed { location, .. }
            | FigError::FilterNotFound { location, .. }
            | FigError::XmlParse { location, .. } => Some(location),
            FigError::SourceNotFound { location, .. } => location.as_ref(),
            FigError::DictionaryDuplicateKey { .. }
            | FigError::DictionaryFormat { .. }
            | FigError::Io(_)
            | FigError::Cache(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_location() {
        let err = FigError::FunctionNotFound {
            location: Location::new("index.xml", 12),
            name: "nope".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::FunctionNotFound);
        assert_eq!(err.location(), Some(&Location::new("index.xml", 12)));
        assert_eq!(err.to_string(), "Undeclared function: nope (index.xml(12))");
    }

    #[test]
    fn test_io_error_has_no_location() {
        let err: FigError = std::io::Error::new(std::io::ErrorKind::Other, "boom").into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.location().is_none());
    }
}
