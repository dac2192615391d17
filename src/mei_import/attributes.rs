//! Attribute translators
//!
//! Pure functions mapping a single MEI attribute value (or a small group of
//! related attributes) to a score-model value. Lookup-table translators fail
//! with [`MeiError::InvalidAttributeValue`] naming the attribute and value.

use crate::mei_import::errors::{MeiError, MeiResult};
use crate::mei_import::types::{
    Accidental, Articulation, Barline, BarlineStyle, DurationType, Interval, IntervalQuality,
    KeySignature, Mode, Pitch, Step, Tie, TimeSignature,
};
use once_cell::sync::Lazy;
use roxmltree::Node;
use std::collections::HashMap;

// ============================================================================
// LOOKUP TABLES
// ============================================================================

static ACCID_ATTR: Lazy<HashMap<&'static str, Accidental>> = Lazy::new(|| {
    HashMap::from([
        ("s", Accidental::Sharp),
        ("f", Accidental::Flat),
        ("ss", Accidental::DoubleSharp),
        ("x", Accidental::DoubleSharp),
        ("ff", Accidental::DoubleFlat),
        ("xs", Accidental::TripleSharp),
        ("ts", Accidental::TripleSharp),
        ("tf", Accidental::TripleFlat),
        ("n", Accidental::Natural),
        ("nf", Accidental::Flat),
        ("ns", Accidental::Sharp),
        ("su", Accidental::OneAndAHalfSharp),
        ("sd", Accidental::HalfSharp),
        ("fu", Accidental::HalfFlat),
        ("fd", Accidental::OneAndAHalfFlat),
        ("nu", Accidental::HalfSharp),
        ("nd", Accidental::HalfFlat),
    ])
});

// gestural accidentals only ever describe the sounding result
static ACCID_GES_ATTR: Lazy<HashMap<&'static str, Accidental>> = Lazy::new(|| {
    HashMap::from([
        ("s", Accidental::Sharp),
        ("f", Accidental::Flat),
        ("ss", Accidental::DoubleSharp),
        ("ff", Accidental::DoubleFlat),
        ("n", Accidental::Natural),
        ("su", Accidental::OneAndAHalfSharp),
        ("sd", Accidental::HalfSharp),
        ("fu", Accidental::HalfFlat),
        ("fd", Accidental::OneAndAHalfFlat),
    ])
});

static DUR_ATTR: Lazy<HashMap<&'static str, DurationType>> = Lazy::new(|| {
    HashMap::from([
        ("long", DurationType::Longa),
        ("breve", DurationType::Breve),
        ("1", DurationType::Whole),
        ("2", DurationType::Half),
        ("4", DurationType::Quarter),
        ("8", DurationType::Eighth),
        ("16", DurationType::N16th),
        ("32", DurationType::N32nd),
        ("64", DurationType::N64th),
        ("128", DurationType::N128th),
        ("256", DurationType::N256th),
        ("512", DurationType::N512th),
        ("1024", DurationType::N1024th),
        ("2048", DurationType::N2048th),
    ])
});

/// `None` means a code MEI defines but the score model has no articulation for
static ARTIC_ATTR: Lazy<HashMap<&'static str, Option<Articulation>>> = Lazy::new(|| {
    HashMap::from([
        ("acc", Some(Articulation::Accent)),
        ("stacc", Some(Articulation::Staccato)),
        ("ten", Some(Articulation::Tenuto)),
        ("stacciss", Some(Articulation::Staccatissimo)),
        ("marc", Some(Articulation::StrongAccent)),
        ("spicc", Some(Articulation::Spiccato)),
        ("doit", Some(Articulation::Doit)),
        ("plop", Some(Articulation::Plop)),
        ("fall", Some(Articulation::Falloff)),
        ("dnbow", Some(Articulation::DownBow)),
        ("upbow", Some(Articulation::UpBow)),
        ("harm", Some(Articulation::Harmonic)),
        ("snap", Some(Articulation::SnapPizzicato)),
        ("stop", Some(Articulation::Stopped)),
        ("open", Some(Articulation::OpenString)),
        ("dbltongue", Some(Articulation::DoubleTongue)),
        ("trpltongue", Some(Articulation::TripleTongue)),
        ("toe", Some(Articulation::OrganToe)),
        ("heel", Some(Articulation::OrganHeel)),
        ("tap", None),
        ("lhpizz", None),
        ("dot", None),
        ("stroke", None),
        ("rip", None),
        ("bend", None),
        ("flip", None),
        ("smear", None),
        ("fingernail", None),
        ("damp", None),
        ("dampall", None),
    ])
});

static BARLINE_ATTR: Lazy<HashMap<&'static str, BarlineStyle>> = Lazy::new(|| {
    HashMap::from([
        ("dashed", BarlineStyle::Dashed),
        ("dotted", BarlineStyle::Dotted),
        ("dbl", BarlineStyle::Double),
        ("end", BarlineStyle::Final),
        ("invis", BarlineStyle::None),
        ("single", BarlineStyle::Regular),
    ])
});

/// Look `value` up in `mapping`, naming `attribute` on failure
pub fn attr_translator<T: Clone>(
    value: &str,
    attribute: &str,
    mapping: &HashMap<&'static str, T>,
) -> MeiResult<T> {
    mapping
        .get(value)
        .cloned()
        .ok_or_else(|| MeiError::invalid_value(attribute, value))
}

// ============================================================================
// SINGLE-ATTRIBUTE TRANSLATORS
// ============================================================================

/// `@accid`
pub fn accidental_from_attr(code: &str) -> MeiResult<Accidental> {
    attr_translator(code, "accid", &ACCID_ATTR)
}

/// `@accid.ges`
pub fn accid_ges_from_attr(code: &str) -> MeiResult<Accidental> {
    attr_translator(code, "accid.ges", &ACCID_GES_ATTR)
}

/// `@dur`; an absent value gives the placeholder used for whole-measure rests
pub fn duration_from_attr(code: Option<&str>) -> MeiResult<DurationType> {
    match code {
        Some(code) => attr_translator(code, "dur", &DUR_ATTR),
        None => Ok(placeholder_duration()),
    }
}

/// Stand-in type for elements without `@dur` (1/256 of a quarter)
pub fn placeholder_duration() -> DurationType {
    DurationType::N1024th
}

/// One `@artic` token. Compound codes expand to several articulations.
pub fn articulation_from_attr(code: &str) -> MeiResult<Vec<Articulation>> {
    match code {
        "marc-stacc" => Ok(vec![Articulation::StrongAccent, Articulation::Staccato]),
        "ten-stacc" => Ok(vec![Articulation::Tenuto, Articulation::Staccato]),
        _ => match attr_translator(code, "artic", &ARTIC_ATTR)? {
            Some(artic) => Ok(vec![artic]),
            None => {
                log::debug!("No articulation type for @artic=\"{}\"; dropping it", code);
                Ok(Vec::new())
            }
        },
    }
}

/// A whole space-separated `@artic` list, flattened in order
pub fn make_artic_list(attr: &str) -> MeiResult<Vec<Articulation>> {
    let mut post = Vec::new();
    for token in attr.split_whitespace() {
        post.extend(articulation_from_attr(token)?);
    }
    Ok(post)
}

/// `@dis` and `@dis.place` as a signed number of octaves
pub fn octave_shift(dis: Option<&str>, dis_place: Option<&str>) -> MeiResult<i32> {
    let octaves = match dis {
        None => return Ok(0),
        Some("8") => 1,
        Some("15") => 2,
        Some("22") => 3,
        Some(other) => return Err(MeiError::invalid_value("dis", other)),
    };
    if dis_place == Some("below") {
        Ok(-octaves)
    } else {
        Ok(octaves)
    }
}

/// What `@left`/`@right` describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarlineSpec {
    Single(Barline),
    /// `rptboth`: the end of one repeat and the start of the next
    RepeatBoth { end: Barline, start: Barline },
}

/// `@left` / `@right`
pub fn barline_from_attr(code: &str) -> MeiResult<BarlineSpec> {
    match code {
        "rptboth" => Ok(BarlineSpec::RepeatBoth {
            end: Barline::repeat_end(),
            start: Barline::repeat_start(),
        }),
        "rptend" => Ok(BarlineSpec::Single(Barline::repeat_end())),
        "rptstart" => Ok(BarlineSpec::Single(Barline::repeat_start())),
        _ => attr_translator(code, "right", &BARLINE_ATTR)
            .map(|style| BarlineSpec::Single(Barline::plain(style))),
    }
}

/// `@tie` (e.g. "i", "t", "m", or a concatenation)
pub fn tie_from_attr(code: &str) -> Tie {
    if code.contains('m') || (code.contains('t') && code.contains('i')) {
        Tie::Continue
    } else if code.contains('i') {
        Tie::Start
    } else {
        Tie::Stop
    }
}

// ============================================================================
// PITCH
// ============================================================================

/// Build a pitch without ever failing: an empty or unknown name gives
/// `Pitch::default()`, an unreadable octave is left unset
pub fn safe_pitch(name: &str, accidental: Option<Accidental>, octave: Option<&str>) -> Pitch {
    let Some(step) = Step::from_name(name) else {
        return Pitch::default();
    };
    let octave = octave.and_then(|o| {
        let parsed = o.trim().parse::<i32>().ok();
        if parsed.is_none() && !o.trim().is_empty() {
            log::debug!("Ignoring unreadable octave \"{}\"", o);
        }
        parsed
    });
    Pitch::new(step, accidental, octave)
}

// ============================================================================
// MULTI-ATTRIBUTE TRANSLATORS
// ============================================================================

fn parse_int(node: Node, attribute: &str) -> MeiResult<Option<i32>> {
    match node.attribute(attribute) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| MeiError::invalid_value(attribute, value)),
    }
}

/// `@trans.semi` and `@trans.diat` as the interval from written to sounding pitch
pub fn transposition_from_attrs(node: Node) -> MeiResult<Interval> {
    let semi = parse_int(node, "trans.semi")?.unwrap_or(0);
    let mut diat = parse_int(node, "trans.diat")?.unwrap_or(0);

    // A diatonic count far smaller than the chromatic one leaves out whole
    // octaves (e.g. semi=12, diat=0); restore them from the semitone count.
    let octaves = semi.abs() / 12;
    if (semi - diat).abs() > 5 * (octaves + 1) {
        diat += 7 * octaves * semi.signum();
    }

    // MEI counts steps from zero; generic intervals count from one
    let generic = if diat < 0 { diat - 1 } else { diat + 1 };
    interval_from_generic_and_chromatic(generic, semi)
        .ok_or_else(|| MeiError::invalid_value("trans.semi", &semi.to_string()))
}

/// Combine a signed generic size with a semitone count
pub fn interval_from_generic_and_chromatic(generic: i32, semitones: i32) -> Option<Interval> {
    const DIATONIC_SEMITONES: [i32; 7] = [0, 2, 4, 5, 7, 9, 11];

    let size = generic.abs();
    if size == 0 {
        return None;
    }
    let direction = if generic < 0 { -1 } else { 1 };
    let degree = ((size - 1) % 7) as usize;
    let octaves = (size - 1) / 7;
    let expected = DIATONIC_SEMITONES[degree] + 12 * octaves;
    let difference = semitones * direction - expected;

    let quality = if matches!(degree, 0 | 3 | 4) {
        match difference {
            -2 => IntervalQuality::DoublyDiminished,
            -1 => IntervalQuality::Diminished,
            0 => IntervalQuality::Perfect,
            1 => IntervalQuality::Augmented,
            2 => IntervalQuality::DoublyAugmented,
            _ => return None,
        }
    } else {
        match difference {
            -3 => IntervalQuality::DoublyDiminished,
            -2 => IntervalQuality::Diminished,
            -1 => IntervalQuality::Minor,
            0 => IntervalQuality::Major,
            1 => IntervalQuality::Augmented,
            2 => IntervalQuality::DoublyAugmented,
            _ => return None,
        }
    };

    Some(Interval {
        semitones,
        generic,
        quality,
    })
}

/// `@key.sig` ("3s", "2f", "0") as a sharps count
pub fn sharps_from_attr(signature: &str) -> MeiResult<i32> {
    let signature = signature.trim();
    if signature == "0" {
        return Ok(0);
    }
    let invalid = || MeiError::invalid_value("key.sig", signature);
    let parse = |count: &str| count.parse::<i32>().map_err(|_| invalid());
    if let Some(count) = signature.strip_suffix('s') {
        parse(count)
    } else if let Some(count) = signature.strip_suffix('f') {
        parse(count).map(|c| -c)
    } else {
        Err(invalid())
    }
}

fn mode_from_attr(node: Node) -> MeiResult<Option<Mode>> {
    match node.attribute("key.mode") {
        None => Ok(None),
        Some(value) => Mode::parse(value)
            .map(Some)
            .ok_or_else(|| MeiError::invalid_value("key.mode", value)),
    }
}

/// Key from `@key.pname`/`@key.accid`/`@key.mode`, or from `@key.sig`/`@key.mode`.
/// `None` when the element carries neither form.
pub fn key_sig_from_attrs(node: Node) -> MeiResult<Option<KeySignature>> {
    if let Some(pname) = node.attribute("key.pname") {
        let step = Step::from_name(pname).ok_or_else(|| MeiError::invalid_value("key.pname", pname))?;
        let accidental = node.attribute("key.accid").map(accidental_from_attr).transpose()?;
        let mode = mode_from_attr(node)?.unwrap_or(Mode::Major);

        let alter = accidental.map(Accidental::alter).unwrap_or(0.0) as i32;
        let sharps = step.fifths() + 7 * alter + mode.sharps_offset();
        return Ok(Some(KeySignature {
            sharps,
            mode: Some(mode),
            tonic: Some(Pitch::new(step, accidental, None)),
        }));
    }

    if let Some(signature) = node.attribute("key.sig") {
        let sharps = sharps_from_attr(signature)?;
        return Ok(Some(KeySignature::new(sharps, mode_from_attr(node)?)));
    }

    Ok(None)
}

/// Largest total `@meter.count` or `@meter.unit` accepted
pub const MAX_METER_TERM: u32 = 4096;

/// Beat groups of `@meter.count`: "6" or an additive "3+2+3"
fn meter_groups(count: &str) -> MeiResult<Vec<u32>> {
    let invalid = || MeiError::invalid_value("meter.count", count);
    let groups = count
        .split('+')
        .map(|group| group.trim().parse::<u32>().map_err(|_| invalid()))
        .collect::<MeiResult<Vec<u32>>>()?;
    let total = groups
        .iter()
        .try_fold(0u32, |sum, g| sum.checked_add(*g))
        .filter(|sum| *sum <= MAX_METER_TERM);
    match total {
        Some(_) => Ok(groups),
        None => Err(invalid()),
    }
}

/// `@meter.count` / `@meter.unit`. `None` without a `@meter.count`.
pub fn time_sig_from_attrs(node: Node, default_unit: u32) -> MeiResult<Option<TimeSignature>> {
    let Some(count) = node.attribute("meter.count") else {
        return Ok(None);
    };
    let groups = meter_groups(count)?;
    let denominator = match node.attribute("meter.unit") {
        Some(unit) => unit
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|u| (1..=MAX_METER_TERM).contains(u))
            .ok_or_else(|| MeiError::invalid_value("meter.unit", unit))?,
        None => {
            log::debug!("@meter.count without @meter.unit; assuming {}", default_unit);
            default_unit
        }
    };
    Ok(Some(TimeSignature::additive(groups, denominator)))
}
