//! Structural assembly
//!
//! Builds the part/measure/voice hierarchy from `<score>` down to
//! `<layer>`. Definitions (`<scoreDef>`, `<staffDef>`) found between measures
//! are held per part until the next measure is built, then placed at its
//! start. Measures are padded so every part has one, and whole-measure rests
//! are stretched to the measure's real length.

use crate::mei_import::attributes::{
    barline_from_attr, key_sig_from_attrs, placeholder_duration, time_sig_from_attrs,
    transposition_from_attrs, BarlineSpec,
};
use crate::mei_import::converter::ConversionContext;
use crate::mei_import::elements::{
    clef_from_element, clef_from_parts, convert_member, instr_def_from_element, process_embedded,
};
use crate::mei_import::errors::{unimplemented_import, unprocessed_subelement, MeiError, MeiResult};
use crate::mei_import::instruments;
use crate::mei_import::parser::{child_elements, display_tag, find_descendants, get_child, is_tag, mei_tag};
use crate::mei_import::tuplets::guess_tuplets;
use crate::mei_import::types::{
    Barline, Clef, Duration, Instrument, KeySignature, Measure, MeasureElement, Part, Rational,
    Rest, TimeSignature, Voice, VoiceElement,
};
use roxmltree::Node;

/// Spanning elements are consumed by preprocessing wherever they appear
fn is_spanning(node: Node) -> bool {
    matches!(mei_tag(node), Some("tie" | "slur" | "beamSpan" | "tupletSpan"))
}

fn log_unprocessed(child: Node, parent: Node) {
    log::debug!("{}", unprocessed_subelement(&display_tag(child), &display_tag(parent)));
}

// ============================================================================
// DEFINITIONS
// ============================================================================

/// Everything a `<staffDef>` declares
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StaffDefinition {
    pub instrument: Option<Instrument>,
    pub clef: Option<Clef>,
    pub key: Option<KeySignature>,
    pub meter: Option<TimeSignature>,
}

impl StaffDefinition {
    pub fn is_empty(&self) -> bool {
        self.instrument.is_none() && self.clef.is_none() && self.key.is_none() && self.meter.is_none()
    }

    /// The declared objects, ready to go at the start of a measure
    pub fn into_elements(self) -> Vec<MeasureElement> {
        let mut elements = Vec::new();
        if let Some(instrument) = self.instrument {
            elements.push(MeasureElement::Instrument(instrument));
        }
        if let Some(clef) = self.clef {
            elements.push(MeasureElement::Clef(clef));
        }
        if let Some(key) = self.key {
            elements.push(MeasureElement::Key(key));
        }
        if let Some(meter) = self.meter {
            elements.push(MeasureElement::Meter(meter));
        }
        elements
    }
}

/// What a `<scoreDef>` declares
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreDefinition {
    /// Meter then key, for every part
    pub all_parts: Vec<MeasureElement>,
    /// Per-part definitions from `<staffGrp>`, keyed by `@n`
    pub parts: Vec<(String, StaffDefinition)>,
}

fn instrument_for_staff_def(elem: Node) -> Option<Instrument> {
    let label = elem.attribute("label");

    let mut instrument = if let Some(def) = get_child(elem, "instrDef") {
        instr_def_from_element(def)
    } else if let Some(label) = label {
        instruments::from_name(label).unwrap_or_else(|| instruments::generic(label))
    } else if elem.attribute("trans.semi").is_some() || elem.attribute("trans.diat").is_some() {
        Instrument::default()
    } else {
        return None;
    };

    if let Some(label) = label {
        instrument.part_name = Some(label.to_string());
    }
    if let Some(abbr) = elem.attribute("label.abbr") {
        instrument.part_abbreviation = Some(abbr.to_string());
    }
    instrument.part_id = elem.attribute("n").map(str::to_string);
    Some(instrument)
}

/// `<staffDef>`: instrument, clef, key and meter for one part
pub fn staff_def_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<StaffDefinition> {
    let mut instrument = instrument_for_staff_def(elem);
    if let Some(instrument) = instrument.as_mut() {
        if elem.attribute("trans.semi").is_some() || elem.attribute("trans.diat").is_some() {
            instrument.transposition = Some(transposition_from_attrs(elem)?);
        }
    }

    let clef = if elem.attribute("clef.shape").is_some() {
        Some(clef_from_parts(
            elem.attribute("clef.shape"),
            elem.attribute("clef.line"),
            elem.attribute("clef.dis"),
            elem.attribute("clef.dis.place"),
            "clef.",
        )?)
    } else {
        get_child(elem, "clef").map(clef_from_element).transpose()?
    };

    Ok(StaffDefinition {
        instrument,
        clef,
        key: key_sig_from_attrs(elem)?,
        meter: time_sig_from_attrs(elem, ctx.options.default_meter_unit)?,
    })
}

/// `<staffGrp>`, including nested groups, in document order
pub fn staff_grp_from_element(
    elem: Node,
    ctx: &ConversionContext,
) -> MeiResult<Vec<(String, StaffDefinition)>> {
    let mut defs = Vec::new();
    for child in child_elements(elem) {
        match mei_tag(child) {
            Some("staffDef") => match child.attribute("n") {
                Some(n) => defs.push((n.to_string(), staff_def_from_element(child, ctx)?)),
                None => log::warn!("{}", unimplemented_import("<staffDef>", "@n")),
            },
            Some("staffGrp") => defs.extend(staff_grp_from_element(child, ctx)?),
            _ => log_unprocessed(child, elem),
        }
    }
    Ok(defs)
}

/// `<scoreDef>`
pub fn score_def_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<ScoreDefinition> {
    let mut all_parts = Vec::new();
    if let Some(meter) = time_sig_from_attrs(elem, ctx.options.default_meter_unit)? {
        all_parts.push(MeasureElement::Meter(meter));
    }
    if let Some(key) = key_sig_from_attrs(elem)? {
        all_parts.push(MeasureElement::Key(key));
    }

    let mut parts = Vec::new();
    for grp in child_elements(elem).filter(|c| is_tag(*c, "staffGrp")) {
        parts.extend(staff_grp_from_element(grp, ctx)?);
    }

    Ok(ScoreDefinition { all_parts, parts })
}

// ============================================================================
// LAYERS AND STAVES
// ============================================================================

/// `<layer>`. The voice id is `@n`, else `override_n`.
pub fn layer_from_element(
    elem: Node,
    override_n: Option<&str>,
    ctx: &mut ConversionContext,
) -> MeiResult<Voice> {
    let id = elem
        .attribute("n")
        .or(override_n)
        .ok_or(MeiError::MissingVoiceId)?
        .to_string();

    let mut elements = process_embedded(elem, |child| convert_member(child, ctx, true))?;
    guess_tuplets(&mut elements);

    Ok(Voice::new(id, elements))
}

/// `<staff>`: one voice per `<layer>`, numbered from 1 when a layer has no `@n`
pub fn staff_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Vec<Voice>> {
    let mut voices = Vec::new();
    for child in child_elements(elem) {
        if is_tag(child, "layer") {
            let override_n = (voices.len() + 1).to_string();
            voices.push(layer_from_element(child, Some(&override_n), ctx)?);
        } else if !is_spanning(child) {
            log_unprocessed(child, elem);
        }
    }
    Ok(voices)
}

// ============================================================================
// MEASURES
// ============================================================================

/// A converted `<measure>`, one [`Measure`] per part
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureResult {
    /// Expected parts in order, then any `<staff>` with an unexpected `@n`
    pub staves: Vec<(String, Measure)>,
    /// Set by `@right="rptboth"`: the next measure starts with this repeat
    pub next_left: Option<Barline>,
    /// The last meter declared by a `<staffDef>` inside the measure
    pub meter: Option<TimeSignature>,
}

impl MeasureResult {
    pub fn get(&self, n: &str) -> Option<&Measure> {
        self.staves.iter().find(|(id, _)| id == n).map(|(_, m)| m)
    }

    fn get_mut(&mut self, n: &str) -> Option<&mut Measure> {
        self.staves.iter_mut().find(|(id, _)| id == n).map(|(_, m)| m)
    }

    /// Take the measure for part `n` out of the result
    pub fn take(&mut self, n: &str) -> Option<Measure> {
        let index = self.staves.iter().position(|(id, _)| id == n)?;
        Some(self.staves.remove(index).1)
    }
}

/// Leading digits of `@n` ("12a" is 12)
pub fn measure_number(elem: Node) -> Option<u32> {
    let n = elem.attribute("n")?.trim();
    let end = n.find(|c: char| !c.is_ascii_digit()).unwrap_or(n.len());
    n[..end].parse().ok()
}

/// Stretch every flagged whole-measure rest to `length`
fn correct_m_rest_durations(staves: &mut [(String, Measure)], length: Rational) {
    for (_, measure) in staves.iter_mut() {
        for voice in measure.voices_mut() {
            for element in voice.elements.iter_mut() {
                if let VoiceElement::Rest(rest) | VoiceElement::Space(rest) = element {
                    if rest.was_m_rest {
                        rest.duration = Duration::from_quarter_length(length);
                        rest.was_m_rest = false;
                    }
                }
            }
        }
    }
}

/// Barlines from `@left`/`@right` on every part; returns the next measure's left barline
fn make_barlines(elem: Node, staves: &mut [(String, Measure)]) -> MeiResult<Option<Barline>> {
    let mut next_left = None;

    let left = match elem.attribute("left").map(barline_from_attr).transpose()? {
        Some(BarlineSpec::Single(barline)) => Some(barline),
        Some(BarlineSpec::RepeatBoth { start, .. }) => Some(start),
        None => None,
    };
    let right = match elem.attribute("right").map(barline_from_attr).transpose()? {
        Some(BarlineSpec::Single(barline)) => Some(barline),
        Some(BarlineSpec::RepeatBoth { end, start }) => {
            next_left = Some(start);
            Some(end)
        }
        None => None,
    };

    for (_, measure) in staves.iter_mut() {
        if left.is_some() {
            measure.left_barline = left;
        }
        if right.is_some() {
            measure.right_barline = right;
        }
    }
    Ok(next_left)
}

/// `<measure>`
///
/// `backup_num` is the measure number when `@n` is missing or unreadable.
/// Every part in `expected_ns` gets a measure; parts without a `<staff>` get
/// a single rest the length of the longest voice.
pub fn measure_from_element(
    elem: Node,
    backup_num: u32,
    expected_ns: &[String],
    active_meter: Option<&TimeSignature>,
    ctx: &mut ConversionContext,
) -> MeiResult<MeasureResult> {
    let number = measure_number(elem).unwrap_or(backup_num);

    let mut staves: Vec<(String, Measure)> = Vec::new();
    let mut staff_defs = Vec::new();
    for child in child_elements(elem) {
        match mei_tag(child) {
            Some("staff") => match child.attribute("n") {
                Some(n) => {
                    let voices = staff_from_element(child, ctx)?;
                    staves.push((n.to_string(), Measure::new(number, voices)));
                }
                None => log::warn!("{}", unimplemented_import("<staff>", "@n")),
            },
            Some("staffDef") => staff_defs.push(child),
            _ if is_spanning(child) => {}
            _ => log_unprocessed(child, elem),
        }
    }

    let mut max_length = staves
        .iter()
        .map(|(_, m)| m.quarter_length())
        .max()
        .unwrap_or_else(|| Rational::from_integer(0));

    // parts missing a <staff>, in expected order ahead of the unexpected ones
    let mut ordered = Vec::with_capacity(expected_ns.len().max(staves.len()));
    for n in expected_ns {
        let measure = match staves.iter().position(|(id, _)| id == n) {
            Some(index) => staves.remove(index).1,
            None => {
                let mut rest = Rest::new(Duration::from_quarter_length(max_length));
                rest.was_m_rest = true;
                Measure::new(number, vec![Voice::new("1", vec![VoiceElement::Rest(rest)])])
            }
        };
        ordered.push((n.clone(), measure));
    }
    for (n, _) in &staves {
        log::debug!("<staff n=\"{}\"> has no matching <staffDef>", n);
    }
    ordered.extend(staves);
    let mut result = MeasureResult {
        staves: ordered,
        next_left: None,
        meter: None,
    };

    // <mRest> without @dur is only a placeholder; the meter knows better
    let placeholder = placeholder_duration().quarter_length();
    if let Some(meter) = active_meter {
        if max_length == placeholder || max_length == Rational::from_integer(0) {
            max_length = meter.bar_quarter_length();
        }
    }
    correct_m_rest_durations(&mut result.staves, max_length);

    for def in staff_defs {
        let Some(n) = def.attribute("n") else {
            log::warn!("{}", unimplemented_import("<staffDef>", "@n"));
            continue;
        };
        let definition = staff_def_from_element(def, ctx)?;
        if definition.meter.is_some() {
            result.meter = definition.meter.clone();
        }
        match result.get_mut(n) {
            Some(measure) => {
                for element in definition.into_elements() {
                    measure.insert_at_start(element);
                }
            }
            None => log::debug!("<staffDef n=\"{}\"> inside a <measure> without that part", n),
        }
    }

    result.next_left = make_barlines(elem, &mut result.staves)?;
    Ok(result)
}

// ============================================================================
// SECTIONS AND SCORES
// ============================================================================

/// State carried from one measure to the next, across nested sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionState {
    pub active_meter: Option<TimeSignature>,
    /// Left barline for the next measure, from a `rptboth`
    pub next_left: Option<Barline>,
    /// Number of the last measure built
    pub backup_measure_num: u32,
    /// Definitions waiting for the next measure of each part
    pub pending: Vec<(String, Vec<MeasureElement>)>,
}

impl SectionState {
    pub fn new(all_part_ns: &[String]) -> Self {
        Self {
            pending: all_part_ns.iter().map(|n| (n.clone(), Vec::new())).collect(),
            ..Self::default()
        }
    }

    fn pending_for(&mut self, n: &str) -> Option<&mut Vec<MeasureElement>> {
        self.pending.iter_mut().find(|(id, _)| id == n).map(|(_, p)| p)
    }

    fn hold(&mut self, n: &str, elements: Vec<MeasureElement>) {
        for element in &elements {
            if let MeasureElement::Meter(meter) = element {
                self.active_meter = Some(meter.clone());
            }
        }
        match self.pending_for(n) {
            Some(pending) => pending.extend(elements),
            None => log::debug!("Definition for unknown part \"{}\" dropped", n),
        }
    }

    /// Number of definitions still waiting for a measure
    pub fn pending_len(&self) -> usize {
        self.pending.iter().map(|(_, p)| p.len()).sum()
    }
}

/// Measures per part, in part order
pub type ParsedParts = Vec<(String, Vec<Measure>)>;

/// Shared walk of `<score>` and `<section>` children.
///
/// `<measure>` is only accepted directly inside a `<section>`; nested
/// sections share `state` and append to `parsed`.
pub fn section_score_core(
    elem: Node,
    all_part_ns: &[String],
    state: &mut SectionState,
    parsed: &mut ParsedParts,
    ctx: &mut ConversionContext,
) -> MeiResult<()> {
    let in_section = is_tag(elem, "section");

    for child in child_elements(elem) {
        match mei_tag(child) {
            Some("measure") if in_section => {
                state.backup_measure_num += 1;
                let mut result = measure_from_element(
                    child,
                    state.backup_measure_num,
                    all_part_ns,
                    state.active_meter.as_ref(),
                    ctx,
                )?;
                if let Some(meter) = result.meter.take() {
                    state.active_meter = Some(meter);
                }
                let next_left = state.next_left.take();

                for (n, measures) in parsed.iter_mut() {
                    let Some(mut measure) = result.take(n) else {
                        continue;
                    };
                    // held definitions precede any <staffDef> inside the measure
                    if let Some(pending) = state.pending_for(n) {
                        for element in pending.drain(..).rev() {
                            measure.insert_leading(element);
                        }
                    }
                    if next_left.is_some() {
                        measure.left_barline = next_left;
                    }
                    state.backup_measure_num = state.backup_measure_num.max(measure.number);
                    measures.push(measure);
                }
                state.next_left = result.next_left;
            }
            Some("scoreDef") => {
                let definition = score_def_from_element(child, ctx)?;
                for n in all_part_ns {
                    state.hold(n, definition.all_parts.clone());
                }
                for (n, staff_def) in definition.parts {
                    state.hold(&n, staff_def.into_elements());
                }
            }
            Some("staffDef") => match child.attribute("n") {
                Some(n) => {
                    let definition = staff_def_from_element(child, ctx)?;
                    state.hold(n, definition.into_elements());
                }
                None => log::warn!("{}", unimplemented_import("<staffDef>", "@n")),
            },
            Some("section") => section_score_core(child, all_part_ns, state, parsed, ctx)?,
            _ if is_spanning(child) => {}
            _ => log_unprocessed(child, elem),
        }
    }

    Ok(())
}

/// `@n` of every `<staffDef>` in the score, first appearance first
pub fn all_parts_present(score: Node) -> MeiResult<Vec<String>> {
    let mut ns: Vec<String> = Vec::new();
    for def in find_descendants(score, "staffDef") {
        if let Some(n) = def.attribute("n") {
            if !ns.iter().any(|existing| existing == n) {
                ns.push(n.to_string());
            }
        }
    }
    if ns.is_empty() {
        Err(MeiError::NoStaffDefs)
    } else {
        Ok(ns)
    }
}

/// `<score>`: one part per `<staffDef @n>`
pub fn score_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Vec<Part>> {
    let all_part_ns = all_parts_present(elem)?;
    let mut state = SectionState::new(&all_part_ns);
    let mut parsed: ParsedParts = all_part_ns.iter().map(|n| (n.clone(), Vec::new())).collect();

    section_score_core(elem, &all_part_ns, &mut state, &mut parsed, ctx)?;

    if state.pending_len() > 0 {
        log::debug!(
            "Dropping {} definition(s) that no measure followed",
            state.pending_len()
        );
    }

    Ok(parsed
        .into_iter()
        .map(|(n, measures)| Part::new(n, measures))
        .collect())
}
