//! Slur bundle and slur attachment
//!
//! Slurs are created in two places: one per `<slur>` element during
//! preprocessing, and one per `i` token of an inline `@slur`. Either way the
//! bundle owns them and notes are attached by [`ObjectId`] as they're built.

use crate::mei_import::preprocess::Annotation;
use crate::mei_import::types::{ObjectId, Slur};
use roxmltree::Node;

/// Every slur found so far in the current conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpannerBundle {
    slurs: Vec<Slur>,
}

impl SpannerBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slur: Slur) {
        self.slurs.push(slur);
    }

    /// Most recently registered slur with this local id
    pub fn find_by_local_id(&self, local_id: &str) -> Option<&Slur> {
        self.slurs.iter().rev().find(|s| s.local_id == local_id)
    }

    pub fn find_by_local_id_mut(&mut self, local_id: &str) -> Option<&mut Slur> {
        self.slurs.iter_mut().rev().find(|s| s.local_id == local_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slur> {
        self.slurs.iter()
    }

    pub fn len(&self) -> usize {
        self.slurs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slurs.is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Vec<Slur> {
        self.slurs.clone()
    }

    pub fn into_vec(self) -> Vec<Slur> {
        self.slurs
    }

    /// Attach `obj` to the slur with `local_id`; false if there's no such slur
    fn attach(&mut self, local_id: &str, obj: ObjectId) -> bool {
        match self.find_by_local_id_mut(local_id) {
            Some(slur) => {
                slur.add_spanned(obj);
                true
            }
            None => {
                log::trace!("No slur with local id {}", local_id);
                false
            }
        }
    }
}

/// Connect a converted note or chord to the slurs its element refers to.
///
/// Preprocessed `<slur>` endpoints are tried first, then the `@slur`
/// shorthand (`"1i 2t"`). Unknown slur ids are skipped. Returns whether the
/// object was attached to anything.
pub fn add_slurs(
    elem: Node,
    obj: ObjectId,
    annotation: Option<&Annotation>,
    bundle: &mut SpannerBundle,
) -> bool {
    let mut added = false;

    if let Some(annotation) = annotation {
        for local_id in annotation.slur_starts.iter().chain(&annotation.slur_ends) {
            added |= bundle.attach(local_id, obj);
        }
    }

    if let Some(shorthand) = elem.attribute("slur") {
        for token in shorthand.split_whitespace() {
            let mut chars = token.chars();
            let Some(position) = chars.next_back() else {
                continue;
            };
            let number = chars.as_str();
            match position {
                'i' => {
                    let mut slur = Slur::new(number);
                    slur.add_spanned(obj);
                    bundle.register(slur);
                    added = true;
                }
                't' => added |= bundle.attach(number, obj),
                'm' => {}
                _ => log::debug!("Ignoring malformed @slur token \"{}\"", token),
            }
        }
    }

    added
}
