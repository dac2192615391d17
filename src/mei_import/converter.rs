//! MEI document conversion
//!
//! Drives one conversion: parse, preprocess the spanning elements, walk the
//! `<score>`, then collect the header.

use crate::mei_import::errors::{MeiError, MeiResult};
use crate::mei_import::metadata::metadata_from_head;
use crate::mei_import::parser::MeiDocument;
use crate::mei_import::preprocess::{preprocess, Annotations};
use crate::mei_import::spanners::SpannerBundle;
use crate::mei_import::structure::score_from_element;
use crate::mei_import::types::{Metadata, Score};
use serde::{Deserialize, Serialize};

/// Conversion settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterOptions {
    /// Read title, composer and date from `<meiHead>`
    pub parse_metadata: bool,

    /// Meter unit assumed for `@meter.count` without `@meter.unit`
    pub default_meter_unit: u32,

    /// Largest number of XML nodes accepted
    pub nodes_limit: u32,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            parse_metadata: true,
            default_meter_unit: 4,
            nodes_limit: u32::MAX,
        }
    }
}

/// State shared by every converter during one document's conversion
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    /// Spanning-element data, keyed by `xml:id`
    pub annotations: Annotations,
    pub slurs: SpannerBundle,
    pub options: ConverterOptions,
}

impl ConversionContext {
    pub fn new(options: ConverterOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }
}

/// Converts MEI documents to [`Score`]s
#[derive(Debug, Clone, Default)]
pub struct MeiConverter {
    options: ConverterOptions,
}

impl MeiConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConverterOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConverterOptions {
        &self.options
    }

    /// Convert a complete MEI document
    pub fn convert(&self, mei: &str) -> MeiResult<Score> {
        let doc = MeiDocument::parse_with_limit(mei, self.options.nodes_limit)?;

        let mut ctx = ConversionContext::new(self.options.clone());
        ctx.annotations = preprocess(doc.root(), &mut ctx.slurs);

        let score = doc.music_score().ok_or(MeiError::NoStaffDefs)?;
        let parts = score_from_element(score, &mut ctx)?;

        let metadata = if self.options.parse_metadata {
            doc.head().map(metadata_from_head).unwrap_or_default()
        } else {
            Metadata::default()
        };

        let score = Score {
            parts,
            spanners: ctx.slurs.into_vec(),
            metadata,
        };
        log::info!("{}", score);
        Ok(score)
    }
}

/// Convert with default options
pub fn convert_str(mei: &str) -> MeiResult<Score> {
    MeiConverter::new().convert(mei)
}
