//! Preprocessing of spanning elements
//!
//! `<tie>`, `<slur>`, `<beamSpan>` and `<tupletSpan>` refer to the notes they
//! affect by `xml:id`. Before the structural walk, each kind is scanned once
//! and turned into an [`Annotation`] on the referenced ids. The annotations
//! are then frozen into an [`Annotations`] map that converters consult by a
//! node's own `xml:id`; the document itself is never modified.
//!
//! ```text
//!   <tie startid=#n1 endid=#n2/>          n1 -> tie "i"
//!   <slur startid=#n1 endid=#n3/>   =>    n1 -> slur start <uuid>
//!   <beamSpan plist="#n1 #n2 #n3"/>       n2 -> tie "t", beam continue
//!   <tupletSpan startid endid/>           n3 -> slur end <uuid>, beam stop
//! ```

use crate::mei_import::errors::unimplemented_import;
use crate::mei_import::parser::{is_tag, remove_octothorpe, xml_id};
use crate::mei_import::spanners::SpannerBundle;
use crate::mei_import::tuplets::{parse_ratio_part, TupletSpec};
use crate::mei_import::types::{BeamType, Slur, TupletSearch};
use roxmltree::Node;
use std::collections::HashMap;
use uuid::Uuid;

/// Everything the spanning elements said about one element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Annotation {
    /// Tie positions in document order: "i", "t", or "ti" for a note that
    /// ends one tie and starts the next
    pub tie: Option<String>,
    /// Local ids of slurs starting here
    pub slur_starts: Vec<String>,
    /// Local ids of slurs ending here
    pub slur_ends: Vec<String>,
    pub beam: Option<BeamType>,
    pub tuplet: Option<TupletSpec>,
}

/// Frozen annotations, keyed by `xml:id`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotations {
    by_id: HashMap<String, Annotation>,
}

impl Annotations {
    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.by_id.get(id)
    }

    /// Annotation for a node, looked up by its `xml:id`
    pub fn for_node(&self, node: Node) -> Option<&Annotation> {
        xml_id(node).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn from_entries<'s>(entries: impl IntoIterator<Item = (&'s str, Annotation)>) -> Self {
        Annotations {
            by_id: entries
                .into_iter()
                .map(|(id, annotation)| (id.to_string(), annotation))
                .collect(),
        }
    }
}

type Staged = HashMap<String, Annotation>;

fn stage<'s>(staged: &'s mut Staged, id: &str) -> &'s mut Annotation {
    staged.entry(remove_octothorpe(id).to_string()).or_default()
}

/// `<tag>` elements inside a `<score>` inside `<music>`
fn spanning_elements<'a, 'input: 'a>(
    root: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    root.descendants().filter(move |n| {
        is_tag(*n, tag) && {
            let mut ancestors = n.ancestors().skip(1);
            ancestors.any(|a| is_tag(a, "score")) && ancestors.any(|a| is_tag(a, "music"))
        }
    })
}

fn start_and_end<'a>(elem: Node<'a, '_>) -> Option<(&'a str, &'a str)> {
    Some((elem.attribute("startid")?, elem.attribute("endid")?))
}

/// Member ids of `@plist`, without their `#`
fn plist<'a>(elem: Node<'a, '_>) -> Option<Vec<&'a str>> {
    let ids: Vec<&str> = elem
        .attribute("plist")?
        .split_whitespace()
        .map(remove_octothorpe)
        .collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids)
    }
}

// ============================================================================
// PASSES
// ============================================================================

fn pp_ties(root: Node, staged: &mut Staged) {
    log::trace!("*** preprocessing ties");
    for tie in spanning_elements(root, "tie") {
        match start_and_end(tie) {
            Some((start, end)) => {
                stage(staged, start).tie.get_or_insert_with(String::new).push('i');
                stage(staged, end).tie.get_or_insert_with(String::new).push('t');
            }
            None => log::warn!("{}", unimplemented_import("<tie>", "@startid and @endid")),
        }
    }
}

fn pp_slurs(root: Node, staged: &mut Staged, slurs: &mut SpannerBundle) {
    log::trace!("*** preprocessing slurs");
    for slur in spanning_elements(root, "slur") {
        match start_and_end(slur) {
            Some((start, end)) => {
                let local_id = Uuid::new_v4().to_string();
                stage(staged, start).slur_starts.push(local_id.clone());
                stage(staged, end).slur_ends.push(local_id.clone());
                slurs.register(Slur::new(local_id));
            }
            None => log::warn!("{}", unimplemented_import("<slur>", "@startid and @endid")),
        }
    }
}

fn pp_beams(root: Node, staged: &mut Staged) {
    log::trace!("*** preprocessing spanning beams");
    for beam in spanning_elements(root, "beamSpan") {
        if let Some(members) = plist(beam) {
            let last = members.len() - 1;
            for (i, id) in members.iter().enumerate() {
                let position = match i {
                    0 => BeamType::Start,
                    i if i == last => BeamType::Stop,
                    _ => BeamType::Continue,
                };
                stage(staged, id).beam = Some(position);
            }
        } else if let Some((start, end)) = start_and_end(beam) {
            stage(staged, start).beam = Some(BeamType::Start);
            stage(staged, end).beam = Some(BeamType::Stop);
        } else {
            log::warn!("{}", unimplemented_import("<beamSpan>", "@startid and @endid"));
        }
    }
}

fn tuplet_ratio(span: Node) -> Option<TupletSpec> {
    let (Some(num), Some(numbase)) = (span.attribute("num"), span.attribute("numbase")) else {
        log::warn!("{}", unimplemented_import("<tupletSpan>", "@num and @numbase"));
        return None;
    };
    match (parse_ratio_part(num, "num"), parse_ratio_part(numbase, "numbase")) {
        (Ok(num), Ok(numbase)) => Some(TupletSpec::new(num, numbase)),
        (Err(err), _) | (_, Err(err)) => {
            log::warn!("Skipping <tupletSpan>: {}", err);
            None
        }
    }
}

fn pp_tuplets(root: Node, staged: &mut Staged) {
    log::trace!("*** preprocessing spanning tuplets");
    for span in spanning_elements(root, "tupletSpan") {
        let members = plist(span);
        let endpoints = start_and_end(span);
        if members.is_none() && endpoints.is_none() {
            log::warn!(
                "{}",
                unimplemented_import("<tupletSpan>", "@startid and @endid or @plist")
            );
            continue;
        }
        let Some(spec) = tuplet_ratio(span) else {
            continue;
        };

        if let Some(members) = members {
            // membership is exhaustive, so no bracket search is needed
            for id in members {
                stage(staged, id).tuplet = Some(spec);
            }
        } else if let Some((start, end)) = endpoints {
            stage(staged, start).tuplet = Some(TupletSpec {
                search: Some(TupletSearch::Start),
                ..spec
            });
            stage(staged, end).tuplet = Some(TupletSpec {
                search: Some(TupletSearch::End),
                ..spec
            });
        }
    }
}

/// Move staged annotations to the elements that exist and freeze them
fn pp_conclude(root: Node, mut staged: Staged) -> Annotations {
    log::trace!("*** concluding preprocessing");
    let mut by_id = HashMap::with_capacity(staged.len());
    for node in root.descendants() {
        if let Some(id) = xml_id(node) {
            if let Some(annotation) = staged.remove(id) {
                by_id.insert(id.to_string(), annotation);
            }
        }
    }
    for id in staged.keys() {
        log::debug!("Spanning element refers to missing xml:id \"{}\"", id);
    }
    Annotations { by_id }
}

/// Run every pass over the document, registering one slur per `<slur>`
pub fn preprocess(root: Node, slurs: &mut SpannerBundle) -> Annotations {
    let mut staged = Staged::new();
    pp_ties(root, &mut staged);
    pp_slurs(root, &mut staged, slurs);
    pp_beams(root, &mut staged);
    pp_tuplets(root, &mut staged);
    pp_conclude(root, staged)
}
