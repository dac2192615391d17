//! MEI to score converter
//!
//! Converts Music Encoding Initiative (MEI) documents into an in-memory
//! [`Score`]: parts of measures, measures of voices, voices of notes,
//! chords, rests and clefs, plus the slurs connecting them.
//!
//! # Overview
//!
//! Conversion runs in three stages:
//! 1. **Parse**: read the document with roxmltree and check the `<mei>` root
//! 2. **Preprocess**: turn `<tie>`, `<slur>`, `<beamSpan>` and `<tupletSpan>`
//!    into annotations on the notes they refer to
//! 3. **Assemble**: walk `<score>` top-down, converting each element
//!
//! # Basic Usage
//!
//! ```ignore
//! use mei_import::mei_import::convert_str;
//!
//! let mei = r#"<mei xmlns="http://www.music-encoding.org/ns/mei">
//!   <music><body><mdiv><score>
//!     <scoreDef meter.count="4" meter.unit="4">
//!       <staffGrp><staffDef n="1" clef.shape="G" clef.line="2"/></staffGrp>
//!     </scoreDef>
//!     <section><measure n="1"><staff n="1"><layer n="1">
//!       <note pname="c" oct="4" dur="1"/>
//!     </layer></staff></measure></section>
//!   </score></mdiv></body></music>
//! </mei>"#;
//!
//! let score = convert_str(mei)?;
//! assert_eq!(score.parts.len(), 1);
//! ```

pub mod attributes;
pub mod converter;
pub mod elements;
pub mod errors;
pub mod instruments;
pub mod metadata;
pub mod parser;
pub mod preprocess;
pub mod spanners;
pub mod structure;
pub mod tuplets;
pub mod types;

// Re-export main API
pub use converter::{convert_str, ConversionContext, ConverterOptions, MeiConverter};
pub use errors::{MeiError, MeiResult};
pub use types::{Measure, Part, Score, Voice, VoiceElement};
