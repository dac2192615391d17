//! Tuplet scaling and beam grouping
//!
//! Tuplet ratios reach a note three ways: from an enclosing `<tuplet>`, from
//! a `<tupletSpan @plist>` naming every member, or from a `<tupletSpan>` that
//! only names its endpoints. The last case is resolved per layer by
//! [`guess_tuplets`] once every member exists.

use crate::mei_import::converter::ConversionContext;
use crate::mei_import::elements::{convert_member, process_embedded};
use crate::mei_import::errors::{MeiError, MeiResult};
use crate::mei_import::types::{
    BeamType, Duration, PendingTuplet, Tuplet, TupletSearch, TupletType, VoiceElement,
};
use roxmltree::Node;

/// A tuplet ratio and, optionally, where the carrying element sits in it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupletSpec {
    pub num: u32,
    pub numbase: u32,
    /// Endpoint of a bracket still to be searched for
    pub search: Option<TupletSearch>,
    pub kind: Option<TupletType>,
}

impl TupletSpec {
    pub fn new(num: u32, numbase: u32) -> Self {
        Self {
            num,
            numbase,
            search: None,
            kind: None,
        }
    }
}

/// Largest `@num` or `@numbase` accepted
pub const MAX_RATIO_PART: u32 = 1024;

/// `@num` or `@numbase`
pub fn parse_ratio_part(value: &str, attribute: &str) -> MeiResult<u32> {
    value
        .trim()
        .parse::<u32>()
        .ok()
        .filter(|n| (1..=MAX_RATIO_PART).contains(n))
        .ok_or_else(|| MeiError::invalid_value(attribute, value))
}

/// Bracket position from the `@tuplet` shorthand ("i1", "m1", "t1")
fn position_from_shorthand(shorthand: Option<&str>) -> Option<TupletType> {
    match shorthand?.chars().next()? {
        'i' => Some(TupletType::Start),
        't' => Some(TupletType::Stop),
        _ => None,
    }
}

fn tuplet_slots(elem: &mut VoiceElement) -> Option<(&mut Duration, &mut Option<PendingTuplet>)> {
    match elem {
        VoiceElement::Note(n) => Some((&mut n.duration, &mut n.pending_tuplet)),
        VoiceElement::Chord(c) => Some((&mut c.duration, &mut c.pending_tuplet)),
        VoiceElement::Rest(r) | VoiceElement::Space(r) => Some((&mut r.duration, &mut r.pending_tuplet)),
        VoiceElement::Clef(_) => None,
    }
}

fn push_tuplet(duration: &mut Duration, num: u32, numbase: u32, kind: Option<TupletType>) {
    let notated = duration.kind;
    duration.tuplets.push(Tuplet {
        number_notes_actual: num,
        number_notes_normal: numbase,
        duration_actual: notated,
        duration_normal: notated,
        kind,
    });
}

/// Apply `spec` to one object's duration.
///
/// A spec with a search position isn't applied yet: it's parked on the object
/// for [`guess_tuplets`].
pub fn apply_tuplet(
    duration: &mut Duration,
    pending: &mut Option<PendingTuplet>,
    spec: &TupletSpec,
    shorthand: Option<&str>,
) {
    if let Some(search) = spec.search {
        *pending = Some(PendingTuplet {
            num: spec.num,
            numbase: spec.numbase,
            search,
        });
        return;
    }
    let kind = spec.kind.or_else(|| position_from_shorthand(shorthand));
    push_tuplet(duration, spec.num, spec.numbase, kind);
}

/// Apply `spec` to every note, chord, rest and space; clefs are passed over
pub fn scale_to_tuplet(objs: &mut [VoiceElement], spec: &TupletSpec, shorthand: Option<&str>) {
    for obj in objs.iter_mut() {
        if let Some((duration, pending)) = tuplet_slots(obj) {
            apply_tuplet(duration, pending, spec, shorthand);
        }
    }
}

fn set_last_tuplet_kind(elem: &mut VoiceElement, kind: TupletType) {
    if let Some(tuplet) = elem.duration_mut().and_then(|d| d.tuplets.last_mut()) {
        tuplet.kind = Some(kind);
    }
}

/// Convert a `<tuplet>` and its contents.
///
/// Members are scaled, beamed together, and the bracket is marked on the
/// first and last note-like member whatever the contents said.
pub fn tuplet_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Vec<VoiceElement>> {
    let (Some(num), Some(numbase)) = (elem.attribute("num"), elem.attribute("numbase")) else {
        return Err(MeiError::MissingTupletData);
    };
    let spec = TupletSpec::new(parse_ratio_part(num, "num")?, parse_ratio_part(numbase, "numbase")?);

    let mut members = process_embedded(elem, |child| convert_member(child, ctx, false))?;
    scale_to_tuplet(&mut members, &spec, None);
    beam_together(&mut members);

    let first = members.iter().position(VoiceElement::is_general_note);
    let last = members.iter().rposition(VoiceElement::is_general_note);
    match (first, last) {
        (Some(first), Some(last)) if first == last => {
            set_last_tuplet_kind(&mut members[first], TupletType::StartStop);
        }
        (Some(first), Some(last)) => {
            set_last_tuplet_kind(&mut members[first], TupletType::Start);
            set_last_tuplet_kind(&mut members[last], TupletType::Stop);
        }
        _ => log::debug!("<tuplet> with no notes, rests or chords"),
    }

    Ok(members)
}

/// Convert a `<beam>` and its contents, beaming the results together
pub fn beam_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Vec<VoiceElement>> {
    let mut members = process_embedded(elem, |child| convert_member(child, ctx, false))?;
    beam_together(&mut members);
    Ok(members)
}

/// Beam a run of objects.
///
/// Every beamable object without beams of its own is filled with "continue",
/// then the first and last of those are switched to "start" and "stop".
/// Objects that already carry beams are left alone.
pub fn beam_together(objs: &mut [VoiceElement]) {
    let mut first = None;
    let mut last = None;

    for (i, obj) in objs.iter_mut().enumerate() {
        if let Some((beams, kind)) = obj.beams_mut() {
            if beams.is_empty() && beams.fill(kind, BeamType::Continue) {
                first.get_or_insert(i);
                last = Some(i);
            }
        }
    }

    if let Some(i) = first {
        if let Some((beams, _)) = objs[i].beams_mut() {
            beams.set_all(BeamType::Start);
        }
    }
    if let Some(i) = last {
        if let Some((beams, _)) = objs[i].beams_mut() {
            beams.set_all(BeamType::Stop);
        }
    }
}

/// Resolve tuplets known only by their endpoints.
///
/// From an object parked with a "start" search, every note-like object is
/// scaled until one parked with an "end" search of the same ratio, both ends
/// included. Only one bracket is open at a time: a second start restarts it.
/// Parked data is cleared from every object.
pub fn guess_tuplets(objs: &mut [VoiceElement]) {
    let mut open: Option<(u32, u32)> = None;

    for obj in objs.iter_mut() {
        let Some((duration, pending)) = tuplet_slots(obj) else {
            continue;
        };

        match pending.take() {
            Some(p) if p.search == TupletSearch::Start => {
                if open.is_some() {
                    log::debug!("Tuplet bracket restarted before its end was found");
                }
                open = Some((p.num, p.numbase));
                push_tuplet(duration, p.num, p.numbase, Some(TupletType::Start));
            }
            Some(p) if open == Some((p.num, p.numbase)) => {
                push_tuplet(duration, p.num, p.numbase, Some(TupletType::Stop));
                open = None;
            }
            Some(p) => {
                log::debug!("Tuplet end {}:{} without a matching start", p.num, p.numbase);
                if let Some((num, numbase)) = open {
                    push_tuplet(duration, num, numbase, None);
                }
            }
            None => {
                if let Some((num, numbase)) = open {
                    push_tuplet(duration, num, numbase, None);
                }
            }
        }
    }

    if let Some((num, numbase)) = open {
        log::debug!("Tuplet bracket {}:{} ran to the end of the layer", num, numbase);
    }
}
