//! Error types for MEI import
//!
//! Fatal conditions unwind to the caller as [`MeiError`]. Recoverable
//! conditions (timestamp addressing, unknown child elements) never become
//! errors; they are reported through `log` with the message templates below.

use thiserror::Error;

/// Result alias used throughout the importer
pub type MeiResult<T> = Result<T, MeiError>;

/// Fatal conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MeiError {
    /// Input could not be parsed as XML (parser detail kept for diagnostics)
    #[error("MEI document is not valid XML.")]
    InvalidXml(String),

    /// Well-formed XML whose root is not `<mei>` in the MEI namespace
    #[error("Root element should be <mei> in the MEI namespace, not <{0}>.")]
    WrongRootElement(String),

    /// A `<layer>` had neither `@n` nor a caller-supplied id
    #[error("Found a <layer> without @n attribute and no override.")]
    MissingVoiceId,

    /// A `<tuplet>` was missing `@num` or `@numbase`
    #[error("Both @num and @numbase attributes are required on <tuplet> tags.")]
    MissingTupletData,

    /// An attribute value isn't in its lookup table (or isn't a number)
    #[error("Unexpected value for \"{attribute}\" attribute: {value}")]
    InvalidAttributeValue { attribute: String, value: String },

    /// No `<staffDef>` anywhere under `<music>/<score>`
    #[error("There appear to be no <staffDef> tags in this score.")]
    NoStaffDefs,
}

impl MeiError {
    pub fn invalid_value(attribute: &str, value: &str) -> Self {
        MeiError::InvalidAttributeValue {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }
}

/// Warning text for spanning elements addressed in a way we can't import
pub fn unimplemented_import(element: &str, attributes: &str) -> String {
    format!("Importing {} without {} is not yet supported.", element, attributes)
}

/// Debug text for a child element no converter is registered for
pub fn unprocessed_subelement(tag: &str, parent: &str) -> String {
    format!("Found an unprocessed <{}> element in a <{}>.", tag, parent)
}
