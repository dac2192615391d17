//! Element converters
//!
//! One function per leaf element: `<note>`, `<chord>`, `<rest>`, `<space>`,
//! `<mRest>`, `<mSpace>`, `<clef>` and `<instrDef>`. Children of an element
//! are dispatched by tag through [`process_embedded`]; tags without a
//! converter are logged and dropped.

use crate::mei_import::attributes::{
    accid_ges_from_attr, accidental_from_attr, duration_from_attr, make_artic_list, octave_shift,
    safe_pitch, tie_from_attr,
};
use crate::mei_import::converter::ConversionContext;
use crate::mei_import::errors::{unprocessed_subelement, MeiError, MeiResult};
use crate::mei_import::instruments;
use crate::mei_import::parser::{child_elements, display_tag, mei_tag, xml_id};
use crate::mei_import::preprocess::Annotation;
use crate::mei_import::spanners::add_slurs;
use crate::mei_import::tuplets::{apply_tuplet, beam_from_element, tuplet_from_element};
use crate::mei_import::types::{
    Accidental, Articulation, Beams, Chord, ChordMember, Clef, ClefSign, Duration, Grace,
    Instrument, Note, PendingTuplet, Pitch, Rest, Tie, VoiceElement,
};
use roxmltree::Node;

// ============================================================================
// EMBEDDED ELEMENT DISPATCH
// ============================================================================

/// Convert the children of `elem` with `convert`, flattening the results.
///
/// `convert` returns `None` for tags it has no converter for; those children
/// are logged at debug level and skipped. The first error aborts.
pub fn process_embedded<'a, 'input: 'a, T>(
    elem: Node<'a, 'input>,
    mut convert: impl FnMut(Node<'a, 'input>) -> Option<MeiResult<Vec<T>>>,
) -> MeiResult<Vec<T>> {
    let mut post = Vec::new();
    for child in child_elements(elem) {
        match convert(child) {
            Some(converted) => post.extend(converted?),
            None => log::debug!(
                "{}",
                unprocessed_subelement(&display_tag(child), &display_tag(elem))
            ),
        }
    }
    Ok(post)
}

/// Converter for anything that can sit in a layer, tuplet or beam.
/// `<mRest>` and `<mSpace>` are only accepted directly in a layer.
pub(crate) fn convert_member(
    child: Node,
    ctx: &mut ConversionContext,
    measure_rests: bool,
) -> Option<MeiResult<Vec<VoiceElement>>> {
    let converted = match mei_tag(child)? {
        "note" => note_from_element(child, ctx).map(|n| vec![VoiceElement::Note(n)]),
        "chord" => chord_from_element(child, ctx).map(|c| vec![VoiceElement::Chord(c)]),
        "rest" => rest_from_element(child, ctx).map(|r| vec![VoiceElement::Rest(r)]),
        "space" => space_from_element(child, ctx).map(|r| vec![VoiceElement::Space(r)]),
        "mRest" if measure_rests => m_rest_from_element(child, ctx).map(|r| vec![VoiceElement::Rest(r)]),
        "mSpace" if measure_rests => {
            m_space_from_element(child, ctx).map(|r| vec![VoiceElement::Space(r)])
        }
        "clef" => clef_from_element(child).map(|c| vec![VoiceElement::Clef(c)]),
        "tuplet" => tuplet_from_element(child, ctx),
        "beam" => beam_from_element(child, ctx),
        // already handled by preprocessing
        "tie" | "slur" | "beamSpan" | "tupletSpan" => Ok(Vec::new()),
        _ => return None,
    };
    Some(converted)
}

/// What a `<note>` or `<chord>` child contributes
#[derive(Debug, Clone, PartialEq)]
enum Embedded {
    Dot,
    /// Accidental and whether it's printed
    Accid(Accidental, bool),
    Artics(Vec<Articulation>),
}

/// `<note>` members of a `<chord>` are converted separately
fn embedded_in_note(child: Node, in_chord: bool) -> Option<MeiResult<Vec<Embedded>>> {
    let converted = match mei_tag(child)? {
        "dot" => Ok(vec![Embedded::Dot]),
        "artic" => artic_from_element(child).map(|a| vec![Embedded::Artics(a)]),
        "accid" if !in_chord => accid_from_element(child).map(|a| a.into_iter().collect()),
        _ => return None,
    };
    Some(converted)
}

// ============================================================================
// SMALL CHILDREN
// ============================================================================

/// `<artic>`
pub fn artic_from_element(elem: Node) -> MeiResult<Vec<Articulation>> {
    match elem.attribute("artic") {
        Some(artic) => make_artic_list(artic),
        None => Ok(Vec::new()),
    }
}

/// `<accid>`; a written `@accid` wins over `@accid.ges`
fn accid_from_element(elem: Node) -> MeiResult<Option<Embedded>> {
    if let Some(accid) = elem.attribute("accid") {
        Ok(Some(Embedded::Accid(accidental_from_attr(accid)?, true)))
    } else if let Some(accid) = elem.attribute("accid.ges") {
        Ok(Some(Embedded::Accid(accid_ges_from_attr(accid)?, false)))
    } else {
        Ok(None)
    }
}

/// Most augmentation dots a duration may carry
pub const MAX_DOTS: u8 = 8;

fn parse_dots(elem: Node) -> MeiResult<u8> {
    match elem.attribute("dots") {
        None => Ok(0),
        Some(dots) => dots
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|d| *d <= MAX_DOTS)
            .ok_or_else(|| MeiError::invalid_value("dots", dots)),
    }
}

/// `@dur` and `@dots`
fn make_duration(elem: Node) -> MeiResult<Duration> {
    let kind = duration_from_attr(elem.attribute("dur"))?;
    Ok(Duration::new(kind, parse_dots(elem)?))
}

fn grace_from_attr(code: &str) -> Grace {
    match code {
        "acc" => Grace::Acciaccatura,
        "unacc" => Grace::Appoggiatura,
        _ => Grace::Unknown,
    }
}

// ============================================================================
// NOTES AND CHORDS
// ============================================================================

/// Pitch of a note from its attributes and embedded `<accid>`s
fn pitch_from_parts(elem: Node, embedded: &[Embedded]) -> MeiResult<Pitch> {
    let written = elem.attribute("accid").map(accidental_from_attr).transpose()?;
    let mut pitch = safe_pitch(
        elem.attribute("pname").unwrap_or(""),
        written,
        elem.attribute("oct"),
    );

    for part in embedded {
        if let Embedded::Accid(accidental, displayed) = part {
            pitch.accidental = Some(*accidental);
            pitch.accidental_displayed = *displayed;
        }
    }

    if let Some(ges) = elem.attribute("accid.ges") {
        pitch.accidental = Some(accid_ges_from_attr(ges)?);
        pitch.accidental_displayed = written.is_some();
    }

    Ok(pitch)
}

fn articulations_of(embedded: &[Embedded]) -> Vec<Articulation> {
    embedded
        .iter()
        .flat_map(|part| match part {
            Embedded::Artics(a) => a.clone(),
            _ => Vec::new(),
        })
        .collect()
}

/// Duration, overriding `@dots` with a count of `<dot>` children if there are any
fn duration_with_dots(elem: Node, embedded: &[Embedded]) -> MeiResult<Duration> {
    let mut duration = make_duration(elem)?;
    let dot_children = embedded.iter().filter(|e| matches!(e, Embedded::Dot)).count();
    if dot_children > usize::from(MAX_DOTS) {
        return Err(MeiError::invalid_value("dots", &dot_children.to_string()));
    }
    if dot_children > 0 {
        duration.dots = dot_children as u8;
    }
    if let Some(grace) = elem.attribute("grace") {
        duration.grace = Some(grace_from_attr(grace));
    }
    Ok(duration)
}

/// The per-element attributes notes and chords share
struct Decorations {
    xml_id: Option<String>,
    articulations: Vec<Articulation>,
    tie: Option<Tie>,
}

fn decorations(
    elem: Node,
    embedded: &[Embedded],
    annotation: Option<&Annotation>,
) -> MeiResult<Decorations> {
    let mut articulations = articulations_of(embedded);
    if let Some(artic) = elem.attribute("artic") {
        articulations.extend(make_artic_list(artic)?);
    }
    let tie = annotation
        .and_then(|a| a.tie.as_deref())
        .or_else(|| elem.attribute("tie"))
        .map(tie_from_attr);
    Ok(Decorations {
        xml_id: xml_id(elem).map(str::to_string),
        articulations,
        tie,
    })
}

/// Tuplet and beam data from preprocessing
fn apply_annotation(
    elem: Node,
    annotation: Option<&Annotation>,
    duration: &mut Duration,
    pending: &mut Option<PendingTuplet>,
    beams: &mut Beams,
) {
    let Some(annotation) = annotation else {
        return;
    };
    if let Some(spec) = &annotation.tuplet {
        apply_tuplet(duration, pending, spec, elem.attribute("tuplet"));
    }
    if let Some(beam) = annotation.beam {
        beams.fill(duration.kind, beam);
    }
}

/// `<note>`
pub fn note_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Note> {
    let embedded = process_embedded(elem, |child| embedded_in_note(child, false))?;

    let mut note = Note::new(pitch_from_parts(elem, &embedded)?, duration_with_dots(elem, &embedded)?);

    let annotation = ctx.annotations.for_node(elem);
    let decorations = decorations(elem, &embedded, annotation)?;
    note.xml_id = decorations.xml_id;
    note.articulations = decorations.articulations;
    note.tie = decorations.tie;

    add_slurs(elem, note.id, annotation, &mut ctx.slurs);
    apply_annotation(
        elem,
        annotation,
        &mut note.duration,
        &mut note.pending_tuplet,
        &mut note.beams,
    );

    Ok(note)
}

/// A `<note>` inside a `<chord>`: pitch, id, articulations, tie and slurs.
/// Its `@dur` is ignored.
fn chord_member_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<ChordMember> {
    let embedded = process_embedded(elem, |child| embedded_in_note(child, false))?;
    let mut member = ChordMember::new(pitch_from_parts(elem, &embedded)?);

    let annotation = ctx.annotations.for_node(elem);
    let decorations = decorations(elem, &embedded, annotation)?;
    member.xml_id = decorations.xml_id;
    member.articulations = decorations.articulations;
    member.tie = decorations.tie;

    add_slurs(elem, member.id, annotation, &mut ctx.slurs);
    Ok(member)
}

/// `<chord>`; its duration comes from the chord, never from its notes
pub fn chord_from_element(elem: Node, ctx: &mut ConversionContext) -> MeiResult<Chord> {
    let mut members = Vec::new();
    let embedded = process_embedded(elem, |child| match mei_tag(child)? {
        "note" => Some(chord_member_from_element(child, ctx).map(|member| {
            members.push(member);
            Vec::new()
        })),
        _ => embedded_in_note(child, true),
    })?;

    let mut chord = Chord::new(members, duration_with_dots(elem, &embedded)?);

    let annotation = ctx.annotations.for_node(elem);
    let decorations = decorations(elem, &embedded, annotation)?;
    chord.xml_id = decorations.xml_id;
    chord.articulations = decorations.articulations;
    chord.tie = decorations.tie;

    add_slurs(elem, chord.id, annotation, &mut ctx.slurs);
    apply_annotation(
        elem,
        annotation,
        &mut chord.duration,
        &mut chord.pending_tuplet,
        &mut chord.beams,
    );

    Ok(chord)
}

// ============================================================================
// RESTS AND SPACES
// ============================================================================

fn rest_like(elem: Node, ctx: &ConversionContext, hidden: bool) -> MeiResult<Rest> {
    let duration = make_duration(elem)?;
    let mut rest = if hidden {
        Rest::spacer(duration)
    } else {
        Rest::new(duration)
    };
    rest.xml_id = xml_id(elem).map(str::to_string);

    if let Some(spec) = ctx.annotations.for_node(elem).and_then(|a| a.tuplet.as_ref()) {
        apply_tuplet(&mut rest.duration, &mut rest.pending_tuplet, spec, elem.attribute("tuplet"));
    }
    Ok(rest)
}

/// `<rest>`
pub fn rest_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<Rest> {
    rest_like(elem, ctx, false)
}

/// `<space>`: a rest that isn't printed
pub fn space_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<Rest> {
    rest_like(elem, ctx, true)
}

/// `<mRest>`. Without `@dur` it's flagged so the measure can stretch it to
/// the bar's real length.
pub fn m_rest_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<Rest> {
    let mut rest = rest_from_element(elem, ctx)?;
    rest.was_m_rest = elem.attribute("dur").is_none();
    Ok(rest)
}

/// `<mSpace>`
pub fn m_space_from_element(elem: Node, ctx: &ConversionContext) -> MeiResult<Rest> {
    let mut space = space_from_element(elem, ctx)?;
    space.was_m_rest = elem.attribute("dur").is_none();
    Ok(space)
}

// ============================================================================
// CLEFS AND INSTRUMENTS
// ============================================================================

/// Build a clef from shape/line/displacement strings. `prefix` names the
/// attributes in errors ("" for `<clef>`, "clef." for `<staffDef>`).
pub fn clef_from_parts(
    shape: Option<&str>,
    line: Option<&str>,
    dis: Option<&str>,
    dis_place: Option<&str>,
    prefix: &str,
) -> MeiResult<Clef> {
    let attr = |name: &str| format!("{}{}", prefix, name);

    let (sign, default_line, extra_octaves) = match shape {
        Some("perc") => return Ok(Clef::new(ClefSign::Percussion, None, 0)),
        Some("TAB") => return Ok(Clef::new(ClefSign::Tab, None, 0)),
        Some("G") => (ClefSign::G, 2, 0),
        Some("GG") => (ClefSign::G, 2, -1),
        Some("F") => (ClefSign::F, 4, 0),
        Some("C") => (ClefSign::C, 3, 0),
        Some(other) => return Err(MeiError::invalid_value(&attr("shape"), other)),
        None => return Err(MeiError::invalid_value(&attr("shape"), "")),
    };

    let line = match line {
        Some(line) => line
            .trim()
            .parse::<u8>()
            .ok()
            .filter(|l| (1..=5).contains(l))
            .ok_or_else(|| MeiError::invalid_value(&attr("line"), line))?,
        None => default_line,
    };

    let octaves = octave_shift(dis, dis_place)? + extra_octaves;
    Ok(Clef::new(sign, Some(line), octaves))
}

/// `<clef>`
pub fn clef_from_element(elem: Node) -> MeiResult<Clef> {
    let mut clef = clef_from_parts(
        elem.attribute("shape"),
        elem.attribute("line"),
        elem.attribute("dis"),
        elem.attribute("dis.place"),
        "",
    )?;
    clef.xml_id = xml_id(elem).map(str::to_string);
    Ok(clef)
}

/// `<instrDef>`. Tries `@midi.instrnum`, then `@midi.instrname`; an
/// unrecognised name still gives an instrument carrying that name.
pub fn instr_def_from_element(elem: Node) -> Instrument {
    let by_program = elem
        .attribute("midi.instrnum")
        .and_then(|n| n.trim().parse::<u8>().ok())
        .and_then(instruments::from_midi_program);
    if let Some(instrument) = by_program {
        return instrument;
    }

    match elem.attribute("midi.instrname") {
        Some(name) => instruments::from_name(name).unwrap_or_else(|| {
            log::debug!("No catalog instrument for \"{}\"", name);
            instruments::generic(name)
        }),
        None => Instrument::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mei_import::preprocess::Annotations;
    use crate::mei_import::types::{BeamType, ClefKind, DurationType, Rational, Slur, TupletType};
    use crate::mei_import::tuplets::TupletSpec;
    use roxmltree::Document;

    const NS: &str = r#"xmlns="http://www.music-encoding.org/ns/mei""#;

    /// Parse `<tag attrs>body</tag>` in the MEI namespace and hand its root to `run`
    fn with_elem<T>(tag: &str, attrs: &str, body: &str, run: impl FnOnce(Node) -> T) -> T {
        let xml = format!("<{tag} {NS} {attrs}>{body}</{tag}>");
        let doc = Document::parse(&xml).unwrap();
        run(doc.root_element())
    }

    fn ql(n: i32, d: i32) -> Rational {
        Rational::new(n, d)
    }

    #[test]
    fn test_note_basic_attributes() {
        let mut ctx = ConversionContext::default();
        let note = with_elem("note", r#"pname="D" accid="s" oct="2" dur="4" dots="1""#, "", |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(note.name_with_octave(), "D#2");
        assert_eq!(note.quarter_length(), ql(3, 2));
        assert_eq!(note.duration.dots, 1);

        let note = with_elem("note", r#"pname="D" accid="n" oct="2" dur="4""#, "", |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(note.name_with_octave(), "D2");
        assert_eq!(note.quarter_length(), ql(1, 1));
        assert_eq!(note.duration.dots, 0);
    }

    #[test]
    fn test_note_embedded_elements() {
        let mut ctx = ConversionContext::default();
        let body = r#"<dot/><artic artic="stacc"/><accid accid="s"/><imaginary/>"#;
        let note = with_elem("note", r#"pname="D" oct="2" dur="2""#, body, |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(note.name_with_octave(), "D#2");
        assert_eq!(note.quarter_length(), ql(3, 1));
        assert_eq!(note.duration.dots, 1);
        assert_eq!(note.articulations, vec![Articulation::Staccato]);
    }

    #[test]
    fn test_note_id_artic_tie() {
        let mut ctx = ConversionContext::default();
        let attrs = r#"pname="D" accid="s" oct="2" dur="4" dots="1" xml:id="asdf1234" artic="stacc" tie="i1""#;
        let note = with_elem("note", attrs, "", |e| note_from_element(e, &mut ctx)).unwrap();
        assert_eq!(note.xml_id.as_deref(), Some("asdf1234"));
        assert_eq!(note.articulations, vec![Articulation::Staccato]);
        assert_eq!(note.tie, Some(Tie::Start));
        assert_eq!(note.quarter_length(), ql(3, 2));
    }

    #[test]
    fn test_note_gestural_accidental() {
        let mut ctx = ConversionContext::default();
        let note = with_elem("note", r#"pname="D" oct="2" dur="4" accid.ges="s""#, "", |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(note.name_with_octave(), "D#2");
        assert!(!note.pitch.accidental_displayed);
        assert_eq!(note.duration.kind, DurationType::Quarter);

        let note = with_elem("note", r#"pname="E" oct="4" dur="4""#, r#"<accid accid.ges="f"/>"#, |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(note.name_with_octave(), "E-4");
        assert!(!note.pitch.accidental_displayed);
    }

    #[test]
    fn test_note_with_parked_tuplet() {
        let xml = format!(
            r#"<note {NS} xml:id="n1" pname="D" oct="2" dur="4" accid.ges="s"/>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let mut ctx = ConversionContext::default();
        ctx.annotations = Annotations::from_entries([(
            "n1",
            Annotation {
                tuplet: Some(TupletSpec {
                    search: Some(crate::mei_import::types::TupletSearch::Start),
                    ..TupletSpec::new(5, 4)
                }),
                beam: Some(BeamType::Start),
                ..Annotation::default()
            },
        )]);

        let note = note_from_element(doc.root_element(), &mut ctx).unwrap();
        assert_eq!(note.quarter_length(), ql(1, 1));
        assert_eq!(note.pending_tuplet.map(|p| (p.num, p.numbase)), Some((5, 4)));
        // quarters carry no beams
        assert!(note.beams.is_empty());
    }

    #[test]
    fn test_grace_note_keeps_beams() {
        let xml = format!(r#"<note {NS} xml:id="g" pname="D" oct="2" dur="16" grace="acc"/>"#);
        let doc = Document::parse(&xml).unwrap();
        let mut ctx = ConversionContext::default();
        ctx.annotations = Annotations::from_entries([(
            "g",
            Annotation {
                beam: Some(BeamType::Start),
                ..Annotation::default()
            },
        )]);

        let note = note_from_element(doc.root_element(), &mut ctx).unwrap();
        assert_eq!(note.name_with_octave(), "D2");
        assert_eq!(note.quarter_length(), ql(0, 1));
        assert_eq!(note.duration.kind, DurationType::N16th);
        assert_eq!(note.duration.grace, Some(Grace::Acciaccatura));
        assert_eq!(note.beams.len(), 2);
        assert!(note.beams.beams.iter().all(|b| b.kind == BeamType::Start));
    }

    #[test]
    fn test_note_slur_shorthand() {
        let mut ctx = ConversionContext::default();
        ctx.slurs.register(Slur::new("2"));
        let note = with_elem("note", r#"pname="C" oct="4" dur="4" slur="1i 2t""#, "", |e| {
            note_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(ctx.slurs.len(), 2);
        for slur in ctx.slurs.iter() {
            assert_eq!(slur.spanned, vec![note.id]);
        }
    }

    #[test]
    fn test_note_bad_values() {
        let mut ctx = ConversionContext::default();
        let err = with_elem("note", r#"pname="C" dur="5""#, "", |e| note_from_element(e, &mut ctx));
        assert_eq!(err, Err(MeiError::invalid_value("dur", "5")));
        let err = with_elem("note", r#"pname="C" dur="4" dots="many""#, "", |e| {
            note_from_element(e, &mut ctx)
        });
        assert_eq!(err, Err(MeiError::invalid_value("dots", "many")));
    }

    #[test]
    fn test_too_many_dots() {
        let mut ctx = ConversionContext::default();
        let note = with_elem("note", r#"pname="C" dur="1" dots="8""#, "", |e| note_from_element(e, &mut ctx))
            .unwrap();
        assert_eq!(note.duration.dots, 8);

        let err = with_elem("note", r#"pname="C" dur="4" dots="12""#, "", |e| note_from_element(e, &mut ctx));
        assert_eq!(err, Err(MeiError::invalid_value("dots", "12")));

        let nine = "<dot/>".repeat(9);
        let err = with_elem("chord", r#"dur="4""#, &nine, |e| chord_from_element(e, &mut ctx));
        assert_eq!(err, Err(MeiError::invalid_value("dots", "9")));
    }

    fn chord_notes() -> &'static str {
        r#"<note pname="c" accid="n" oct="4" dur="8" dots="0"/>
           <note pname="e" accid="n" oct="4" dur="8" dots="0"/>
           <note pname="g" accid="n" oct="4" dur="8" dots="0"/>"#
    }

    #[test]
    fn test_chord_basic() {
        let mut ctx = ConversionContext::default();
        let chord = with_elem("chord", r#"dur="4" dots="1""#, chord_notes(), |e| {
            chord_from_element(e, &mut ctx)
        })
        .unwrap();
        assert_eq!(
            chord.full_name(),
            "Chord {C-natural in octave 4 | E-natural in octave 4 | G-natural in octave 4} Dotted Quarter"
        );
    }

    #[test]
    fn test_chord_embedded_artic() {
        let mut ctx = ConversionContext::default();
        let body = format!(r#"{}<artic artic="stacc"/>"#, chord_notes());
        let chord = with_elem("chord", r#"dur="4" dots="1""#, &body, |e| chord_from_element(e, &mut ctx))
            .unwrap();
        assert_eq!(chord.articulations, vec![Articulation::Staccato]);
        assert_eq!(chord.quarter_length(), ql(3, 2));
    }

    #[test]
    fn test_chord_attributes() {
        let mut ctx = ConversionContext::default();
        let attrs = r#"dur="4" dots="1" xml:id="chord1" artic="acc" tie="t1""#;
        let chord = with_elem("chord", attrs, chord_notes(), |e| chord_from_element(e, &mut ctx)).unwrap();
        assert_eq!(chord.xml_id.as_deref(), Some("chord1"));
        assert_eq!(chord.articulations, vec![Articulation::Accent]);
        assert_eq!(chord.tie, Some(Tie::Stop));
        assert_eq!(chord.notes.len(), 3);
        assert!(chord.notes.iter().all(|n| n.tie.is_none()));
    }

    #[test]
    fn test_chord_members_keep_their_own_attributes() {
        let mut ctx = ConversionContext::default();
        let body = r#"<note xml:id="low" pname="c" oct="4" tie="i1"/>
                      <note xml:id="high" pname="g" oct="4" artic="ten" slur="1i"/>"#;
        let chord = with_elem("chord", r#"dur="2" artic="acc""#, body, |e| chord_from_element(e, &mut ctx))
            .unwrap();

        assert_eq!(chord.notes.len(), 2);
        assert_eq!(chord.notes[0].xml_id.as_deref(), Some("low"));
        assert_eq!(chord.notes[0].tie, Some(Tie::Start));
        assert!(chord.tie.is_none());
        assert_eq!(chord.notes[1].articulations, vec![Articulation::Tenuto]);
        assert_eq!(chord.articulations, vec![Articulation::Accent]);
        assert_ne!(chord.notes[0].id, chord.notes[1].id);

        let slur = ctx.slurs.iter().next().unwrap();
        assert_eq!(slur.spanned, vec![chord.notes[1].id]);
    }

    #[test]
    fn test_chord_member_annotations() {
        let xml = format!(
            r#"<chord {NS} dur="4"><note xml:id="m1" pname="e" oct="4"/><note xml:id="m2" pname="g" oct="4"/></chord>"#
        );
        let doc = Document::parse(&xml).unwrap();
        let mut ctx = ConversionContext::default();
        ctx.slurs.register(Slur::new("s1"));
        ctx.annotations = Annotations::from_entries([
            (
                "m1",
                Annotation {
                    tie: Some("t".to_string()),
                    ..Annotation::default()
                },
            ),
            (
                "m2",
                Annotation {
                    slur_ends: vec!["s1".to_string()],
                    ..Annotation::default()
                },
            ),
        ]);

        let chord = chord_from_element(doc.root_element(), &mut ctx).unwrap();
        assert_eq!(chord.notes[0].tie, Some(Tie::Stop));
        assert!(chord.notes[1].tie.is_none());
        let slur = ctx.slurs.iter().next().unwrap();
        assert_eq!(slur.spanned, vec![chord.notes[1].id]);
    }

    #[test]
    fn test_grace_chord() {
        let xml = format!(r#"<chord {NS} xml:id="gc" dur="16" grace="acc">{}</chord>"#, chord_notes());
        let doc = Document::parse(&xml).unwrap();
        let mut ctx = ConversionContext::default();
        ctx.annotations = Annotations::from_entries([(
            "gc",
            Annotation {
                beam: Some(BeamType::Start),
                ..Annotation::default()
            },
        )]);
        let chord = chord_from_element(doc.root_element(), &mut ctx).unwrap();
        assert_eq!(
            chord.full_name(),
            "Chord {C-natural in octave 4 | E-natural in octave 4 | G-natural in octave 4} 16th"
        );
        assert_eq!(chord.quarter_length(), ql(0, 1));
        assert_eq!(chord.beams.len(), 2);
        assert_eq!(chord.beams.beams[1].number, 2);
        assert_eq!(chord.beams.beams[1].kind, BeamType::Start);
    }

    #[test]
    fn test_rest_and_space_with_tuplet() {
        for tag in ["rest", "space"] {
            let xml = format!(r#"<{tag} {NS} dur="4" dots="1" xml:id="the id"/>"#);
            let doc = Document::parse(&xml).unwrap();
            let mut ctx = ConversionContext::default();
            ctx.annotations = Annotations::from_entries([(
                "the id",
                Annotation {
                    tuplet: Some(TupletSpec {
                        kind: Some(TupletType::Start),
                        ..TupletSpec::new(5, 4)
                    }),
                    ..Annotation::default()
                },
            )]);
            let elem = doc.root_element();
            let rest = if tag == "rest" {
                rest_from_element(elem, &ctx)
            } else {
                space_from_element(elem, &ctx)
            }
            .unwrap();
            assert_eq!(rest.quarter_length(), ql(6, 5));
            assert_eq!(rest.duration.dots, 1);
            assert_eq!(rest.xml_id.as_deref(), Some("the id"));
            assert_eq!(rest.duration.tuplets[0].kind, Some(TupletType::Start));
            assert_eq!(rest.hidden, tag == "space");
        }
    }

    #[test]
    fn test_measure_rests() {
        let ctx = ConversionContext::default();
        let rest = with_elem("mRest", r#"dur="2""#, "", |e| m_rest_from_element(e, &ctx)).unwrap();
        assert!(!rest.was_m_rest);
        assert_eq!(rest.quarter_length(), ql(2, 1));

        let rest = with_elem("mRest", "", "", |e| m_rest_from_element(e, &ctx)).unwrap();
        assert!(rest.was_m_rest);
        assert_eq!(rest.quarter_length(), ql(1, 256));

        let space = with_elem("mSpace", "", "", |e| m_space_from_element(e, &ctx)).unwrap();
        assert!(space.was_m_rest);
        assert!(space.hidden);
    }

    #[test]
    fn test_clefs() {
        let clef = with_elem("clef", r#"shape="G" line="2" dis="8" dis.place="above""#, "", clef_from_element)
            .unwrap();
        assert_eq!(clef.kind(), ClefKind::Treble8va);

        let clef = with_elem("clef", r#"shape="perc""#, "", clef_from_element).unwrap();
        assert_eq!(clef.kind(), ClefKind::Percussion);

        let clef = with_elem("clef", r#"shape="TAB""#, "", clef_from_element).unwrap();
        assert_eq!(clef.kind(), ClefKind::Tab);

        let clef = with_elem("clef", r#"shape="F" line="4" xml:id="bass""#, "", clef_from_element).unwrap();
        assert_eq!(clef.kind(), ClefKind::Bass);
        assert_eq!(clef.xml_id.as_deref(), Some("bass"));

        let clef = with_elem("clef", r#"shape="C""#, "", clef_from_element).unwrap();
        assert_eq!(clef.kind(), ClefKind::Alto);

        let err = with_elem("clef", r#"shape="Q""#, "", clef_from_element);
        assert_eq!(err, Err(MeiError::invalid_value("shape", "Q")));
    }

    #[test]
    fn test_instr_def() {
        let inst = with_elem("instrDef", r#"midi.channel="1" midi.instrnum="71" midi.instrname="Clarinet""#, "", instr_def_from_element);
        assert_eq!(inst.instrument_name.as_deref(), Some("Clarinet"));

        let inst = with_elem("instrDef", r#"midi.instrname="Tuba""#, "", instr_def_from_element);
        assert_eq!(inst.instrument_name.as_deref(), Some("Tuba"));

        let inst = with_elem("instrDef", r#"midi.instrname="Gold-Plated Kazoo""#, "", instr_def_from_element);
        assert!(inst.instrument_name.is_none());
        assert_eq!(inst.part_name.as_deref(), Some("Gold-Plated Kazoo"));
    }

    #[test]
    fn test_process_embedded_skips_unknown() {
        let converted = with_elem("note", "", "<artic/><mystery/><dot/>", |e| {
            process_embedded(e, |child| embedded_in_note(child, false))
        })
        .unwrap();
        assert_eq!(converted, vec![Embedded::Artics(vec![]), Embedded::Dot]);
    }
}
