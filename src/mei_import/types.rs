//! Type definitions for the imported score
//!
//! This module defines the object graph the importer produces:
//! - Identity (ObjectId) used by spanners to refer to notes without owning them
//! - Musical attribute types (Pitch, Duration, Tuplet, Beams, Articulation, Tie)
//! - Score-wide objects (Clef, KeySignature, TimeSignature, Instrument, Barline)
//! - Containers (Voice, Measure, Part, Score)
//!
//! Containers own their children exclusively. A [`Slur`] only lists the
//! [`ObjectId`]s of the notes it connects, so the graph stays acyclic.

use num_rational::Rational32;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Re-export Rational for duration calculations (quarter-note units)
pub type Rational = Rational32;

// ============================================================================
// IDENTITY
// ============================================================================

/// Conversion-unique handle for a note, chord, rest or space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate the next id
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ObjectId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// PITCH
// ============================================================================

/// Diatonic step name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Step {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl Step {
    /// Parse a single letter, either case
    pub fn from_name(name: &str) -> Option<Step> {
        match name.trim().to_ascii_uppercase().as_str() {
            "C" => Some(Step::C),
            "D" => Some(Step::D),
            "E" => Some(Step::E),
            "F" => Some(Step::F),
            "G" => Some(Step::G),
            "A" => Some(Step::A),
            "B" => Some(Step::B),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            Step::C => 'C',
            Step::D => 'D',
            Step::E => 'E',
            Step::F => 'F',
            Step::G => 'G',
            Step::A => 'A',
            Step::B => 'B',
        }
    }

    /// Position on the circle of fifths relative to C (F=-1 ... B=5)
    pub fn fifths(self) -> i32 {
        match self {
            Step::F => -1,
            Step::C => 0,
            Step::G => 1,
            Step::D => 2,
            Step::A => 3,
            Step::E => 4,
            Step::B => 5,
        }
    }
}

/// Accidental attached to a pitch
///
/// Modifier strings follow the common ASCII convention: `#` sharp, `-` flat,
/// `n` natural, `~` half-sharp and `` ` `` half-flat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accidental {
    Natural,
    Sharp,
    Flat,
    DoubleSharp,
    DoubleFlat,
    TripleSharp,
    TripleFlat,
    HalfSharp,
    OneAndAHalfSharp,
    HalfFlat,
    OneAndAHalfFlat,
}

impl Accidental {
    pub fn modifier(self) -> &'static str {
        match self {
            Accidental::Natural => "n",
            Accidental::Sharp => "#",
            Accidental::Flat => "-",
            Accidental::DoubleSharp => "##",
            Accidental::DoubleFlat => "--",
            Accidental::TripleSharp => "###",
            Accidental::TripleFlat => "---",
            Accidental::HalfSharp => "~",
            Accidental::OneAndAHalfSharp => "#~",
            Accidental::HalfFlat => "`",
            Accidental::OneAndAHalfFlat => "-`",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Accidental::Natural => "natural",
            Accidental::Sharp => "sharp",
            Accidental::Flat => "flat",
            Accidental::DoubleSharp => "double-sharp",
            Accidental::DoubleFlat => "double-flat",
            Accidental::TripleSharp => "triple-sharp",
            Accidental::TripleFlat => "triple-flat",
            Accidental::HalfSharp => "half-sharp",
            Accidental::OneAndAHalfSharp => "one-and-a-half-sharp",
            Accidental::HalfFlat => "half-flat",
            Accidental::OneAndAHalfFlat => "one-and-a-half-flat",
        }
    }

    /// Alteration in semitones
    pub fn alter(self) -> f32 {
        match self {
            Accidental::Natural => 0.0,
            Accidental::Sharp => 1.0,
            Accidental::Flat => -1.0,
            Accidental::DoubleSharp => 2.0,
            Accidental::DoubleFlat => -2.0,
            Accidental::TripleSharp => 3.0,
            Accidental::TripleFlat => -3.0,
            Accidental::HalfSharp => 0.5,
            Accidental::OneAndAHalfSharp => 1.5,
            Accidental::HalfFlat => -0.5,
            Accidental::OneAndAHalfFlat => -1.5,
        }
    }
}

/// Musical pitch
///
/// `Pitch::default()` is an unspecified C with no accidental and no octave,
/// which is what a note without `@pname` gets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pitch {
    pub step: Step,
    pub accidental: Option<Accidental>,

    /// False for gestural (sounding but not printed) accidentals
    pub accidental_displayed: bool,

    /// Octave number (4 = middle C octave); `None` when not encoded
    pub octave: Option<i32>,
}

impl Default for Pitch {
    fn default() -> Self {
        Self {
            step: Step::C,
            accidental: None,
            accidental_displayed: true,
            octave: None,
        }
    }
}

impl Pitch {
    pub fn new(step: Step, accidental: Option<Accidental>, octave: Option<i32>) -> Self {
        Self {
            step,
            accidental,
            accidental_displayed: true,
            octave,
        }
    }

    /// Step plus accidental modifier ("D#", "E-"); naturals are not spelled
    pub fn name(&self) -> String {
        let mut name = self.step.letter().to_string();
        match self.accidental {
            Some(Accidental::Natural) | None => {}
            Some(accid) => name.push_str(accid.modifier()),
        }
        name
    }

    /// Name plus encoded octave ("D#2"); no octave digit when none is encoded
    pub fn name_with_octave(&self) -> String {
        match self.octave {
            Some(octave) => format!("{}{}", self.name(), octave),
            None => self.name(),
        }
    }

    /// Verbose form, e.g. "C-natural in octave 4"
    pub fn full_name(&self) -> String {
        let mut out = self.step.letter().to_string();
        if let Some(accid) = self.accidental {
            out.push('-');
            out.push_str(accid.name());
        }
        if let Some(octave) = self.octave {
            out.push_str(&format!(" in octave {}", octave));
        }
        out
    }
}

// ============================================================================
// DURATION
// ============================================================================

/// Notated duration type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum DurationType {
    Longa,
    Breve,
    Whole,
    Half,
    Quarter,
    Eighth,
    #[serde(rename = "16th")]
    N16th,
    #[serde(rename = "32nd")]
    N32nd,
    #[serde(rename = "64th")]
    N64th,
    #[serde(rename = "128th")]
    N128th,
    #[serde(rename = "256th")]
    N256th,
    #[serde(rename = "512th")]
    N512th,
    #[serde(rename = "1024th")]
    N1024th,
    #[serde(rename = "2048th")]
    N2048th,
}

impl DurationType {
    pub fn quarter_length(self) -> Rational {
        match self {
            DurationType::Longa => Rational::from_integer(16),
            DurationType::Breve => Rational::from_integer(8),
            DurationType::Whole => Rational::from_integer(4),
            DurationType::Half => Rational::from_integer(2),
            DurationType::Quarter => Rational::from_integer(1),
            DurationType::Eighth => Rational::new(1, 2),
            DurationType::N16th => Rational::new(1, 4),
            DurationType::N32nd => Rational::new(1, 8),
            DurationType::N64th => Rational::new(1, 16),
            DurationType::N128th => Rational::new(1, 32),
            DurationType::N256th => Rational::new(1, 64),
            DurationType::N512th => Rational::new(1, 128),
            DurationType::N1024th => Rational::new(1, 256),
            DurationType::N2048th => Rational::new(1, 512),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DurationType::Longa => "longa",
            DurationType::Breve => "breve",
            DurationType::Whole => "whole",
            DurationType::Half => "half",
            DurationType::Quarter => "quarter",
            DurationType::Eighth => "eighth",
            DurationType::N16th => "16th",
            DurationType::N32nd => "32nd",
            DurationType::N64th => "64th",
            DurationType::N128th => "128th",
            DurationType::N256th => "256th",
            DurationType::N512th => "512th",
            DurationType::N1024th => "1024th",
            DurationType::N2048th => "2048th",
        }
    }

    /// Number of beams (flags) a note of this type carries; 0 for quarter and longer
    pub fn beam_count(self) -> u8 {
        match self {
            DurationType::Eighth => 1,
            DurationType::N16th => 2,
            DurationType::N32nd => 3,
            DurationType::N64th => 4,
            DurationType::N128th => 5,
            DurationType::N256th => 6,
            DurationType::N512th => 7,
            DurationType::N1024th => 8,
            DurationType::N2048th => 9,
            _ => 0,
        }
    }

    /// Shorter than a quarter note
    pub fn is_beamable(self) -> bool {
        self.beam_count() > 0
    }
}

/// Position of a note within a tuplet bracket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TupletType {
    Start,
    Stop,
    StartStop,
}

/// Tuplet ratio stamped on a duration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tuplet {
    pub number_notes_actual: u32,
    pub number_notes_normal: u32,
    pub duration_actual: DurationType,
    pub duration_normal: DurationType,

    /// `None` for members between the bracket's ends
    pub kind: Option<TupletType>,
}

impl Tuplet {
    /// Time-scaling multiplier (normal / actual)
    pub fn multiplier(&self) -> Rational {
        Rational::new(ratio_term(self.number_notes_normal), ratio_term(self.number_notes_actual))
    }
}

fn ratio_term(value: u32) -> i32 {
    i32::try_from(value.max(1)).unwrap_or(i32::MAX)
}

/// Ornamental duration classes for `@grace`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Grace {
    /// `acc`: slashed grace note
    Acciaccatura,
    /// `unacc`
    Appoggiatura,
    Unknown,
}

/// Duration of a note, chord, rest or space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Duration {
    pub kind: DurationType,
    pub dots: u8,
    pub tuplets: Vec<Tuplet>,

    /// Grace durations take no time but keep their notated type
    pub grace: Option<Grace>,

    /// Exact length for durations no single type and dot count can spell
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed_length: Option<Rational>,
}

impl Duration {
    pub fn new(kind: DurationType, dots: u8) -> Self {
        Self {
            kind,
            dots,
            tuplets: Vec::new(),
            grace: None,
            fixed_length: None,
        }
    }

    /// The simplest duration lasting `ql` quarter notes: a type with up to
    /// three dots when one fits, otherwise the longest type not exceeding
    /// `ql` with the exact length kept alongside
    pub fn from_quarter_length(ql: Rational) -> Self {
        const ALL_TYPES: [DurationType; 14] = [
            DurationType::Longa,
            DurationType::Breve,
            DurationType::Whole,
            DurationType::Half,
            DurationType::Quarter,
            DurationType::Eighth,
            DurationType::N16th,
            DurationType::N32nd,
            DurationType::N64th,
            DurationType::N128th,
            DurationType::N256th,
            DurationType::N512th,
            DurationType::N1024th,
            DurationType::N2048th,
        ];

        for kind in ALL_TYPES {
            for dots in 0..=3 {
                let candidate = Duration::new(kind, dots);
                if candidate.quarter_length() == ql {
                    return candidate;
                }
            }
        }

        let kind = ALL_TYPES
            .iter()
            .copied()
            .find(|k| k.quarter_length() <= ql)
            .unwrap_or(DurationType::N2048th);
        Self {
            fixed_length: Some(ql),
            ..Duration::new(kind, 0)
        }
    }

    /// Length in quarter notes, after dots and tuplets
    pub fn quarter_length(&self) -> Rational {
        if self.grace.is_some() {
            return Rational::from_integer(0);
        }
        if let Some(fixed) = self.fixed_length {
            return fixed;
        }
        let dots = self.dots.min(8) as i32;
        let dot_multiplier = Rational::new((1 << (dots + 1)) - 1, 1 << dots);
        self.tuplets
            .iter()
            .fold(self.kind.quarter_length() * dot_multiplier, |ql, t| ql * t.multiplier())
    }

    /// Human-readable form, e.g. "Dotted Quarter" or "16th"
    pub fn full_name(&self) -> String {
        let mut words = Vec::new();
        match self.dots {
            0 => {}
            1 => words.push("Dotted".to_string()),
            2 => words.push("Double Dotted".to_string()),
            3 => words.push("Triple Dotted".to_string()),
            n => words.push(format!("{}-Times Dotted", n)),
        }
        let kind = self.kind.name();
        let mut chars = kind.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        };
        words.push(capitalized);
        if let Some(tuplet) = self.tuplets.first() {
            let group = match tuplet.number_notes_actual {
                3 => "Triplet".to_string(),
                5 => "Quintuplet".to_string(),
                6 => "Sextuplet".to_string(),
                7 => "Septuplet".to_string(),
                n => format!("Tuplet of {}/{}", n, tuplet.number_notes_normal),
            };
            let ql = self.quarter_length();
            words.push(format!("{} ({}/{} QL)", group, ql.numer(), ql.denom()));
        }
        words.join(" ")
    }
}

// ============================================================================
// BEAMS, TIES, ARTICULATIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BeamType {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Beam {
    pub kind: BeamType,
    /// 1 = eighth-note beam, 2 = sixteenth, ...
    pub number: u8,
}

/// Beam stack of a single note or chord
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Beams {
    pub beams: Vec<Beam>,
}

impl Beams {
    pub fn len(&self) -> usize {
        self.beams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beams.is_empty()
    }

    /// Replace the stack with one beam per flag of `kind`, all of type `beam_type`.
    /// Returns false (leaving the stack alone) for types that can't be beamed.
    pub fn fill(&mut self, kind: DurationType, beam_type: BeamType) -> bool {
        if !kind.is_beamable() {
            return false;
        }
        self.beams = (1..=kind.beam_count())
            .map(|number| Beam { kind: beam_type, number })
            .collect();
        true
    }

    pub fn set_all(&mut self, beam_type: BeamType) {
        for beam in &mut self.beams {
            beam.kind = beam_type;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tie {
    Start,
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Articulation {
    Accent,
    Staccato,
    Tenuto,
    Staccatissimo,
    StrongAccent,
    Spiccato,
    Doit,
    Plop,
    Falloff,
    DownBow,
    UpBow,
    Harmonic,
    SnapPizzicato,
    Stopped,
    OpenString,
    DoubleTongue,
    TripleTongue,
    OrganToe,
    OrganHeel,
}

// ============================================================================
// NOTES, CHORDS, RESTS
// ============================================================================

/// Which end of a heuristic tuplet bracket an object sits at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TupletSearch {
    Start,
    End,
}

/// Tuplet data waiting to be resolved by the layer-level bracket search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTuplet {
    pub num: u32,
    pub numbase: u32,
    pub search: TupletSearch,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: ObjectId,
    pub xml_id: Option<String>,
    pub pitch: Pitch,
    pub duration: Duration,
    pub articulations: Vec<Articulation>,
    pub tie: Option<Tie>,
    pub beams: Beams,
    #[serde(skip)]
    pub pending_tuplet: Option<PendingTuplet>,
}

impl Note {
    pub fn new(pitch: Pitch, duration: Duration) -> Self {
        Self {
            id: ObjectId::fresh(),
            xml_id: None,
            pitch,
            duration,
            articulations: Vec::new(),
            tie: None,
            beams: Beams::default(),
            pending_tuplet: None,
        }
    }

    pub fn quarter_length(&self) -> Rational {
        self.duration.quarter_length()
    }

    pub fn name_with_octave(&self) -> String {
        self.pitch.name_with_octave()
    }
}

/// A `<note>` inside a chord. It has its own id, so ties and slurs can
/// reach a single chord tone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordMember {
    pub id: ObjectId,
    pub xml_id: Option<String>,
    pub pitch: Pitch,
    pub articulations: Vec<Articulation>,
    pub tie: Option<Tie>,
}

impl ChordMember {
    pub fn new(pitch: Pitch) -> Self {
        Self {
            id: ObjectId::fresh(),
            xml_id: None,
            pitch,
            articulations: Vec::new(),
            tie: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chord {
    pub id: ObjectId,
    pub xml_id: Option<String>,
    pub notes: Vec<ChordMember>,
    pub duration: Duration,
    pub articulations: Vec<Articulation>,
    pub tie: Option<Tie>,
    pub beams: Beams,
    #[serde(skip)]
    pub pending_tuplet: Option<PendingTuplet>,
}

impl Chord {
    pub fn new(notes: Vec<ChordMember>, duration: Duration) -> Self {
        Self {
            id: ObjectId::fresh(),
            xml_id: None,
            notes,
            duration,
            articulations: Vec::new(),
            tie: None,
            beams: Beams::default(),
            pending_tuplet: None,
        }
    }

    pub fn quarter_length(&self) -> Rational {
        self.duration.quarter_length()
    }

    pub fn pitches(&self) -> impl Iterator<Item = &Pitch> {
        self.notes.iter().map(|n| &n.pitch)
    }

    /// e.g. "Chord {C-natural in octave 4 | E-natural in octave 4} Dotted Quarter"
    pub fn full_name(&self) -> String {
        let pitches: Vec<String> = self.pitches().map(Pitch::full_name).collect();
        format!("Chord {{{}}} {}", pitches.join(" | "), self.duration.full_name())
    }
}

/// A rest, or (when built from `<space>`) an invisible spacer rest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rest {
    pub id: ObjectId,
    pub xml_id: Option<String>,
    pub duration: Duration,

    /// Spacer rests occupy time without being printed
    pub hidden: bool,

    /// Set on `<mRest>`/`<mSpace>` without `@dur`; cleared once the
    /// measure's real length is known
    #[serde(skip)]
    pub was_m_rest: bool,
    #[serde(skip)]
    pub pending_tuplet: Option<PendingTuplet>,
}

impl Rest {
    pub fn new(duration: Duration) -> Self {
        Self {
            id: ObjectId::fresh(),
            xml_id: None,
            duration,
            hidden: false,
            was_m_rest: false,
            pending_tuplet: None,
        }
    }

    pub fn spacer(duration: Duration) -> Self {
        Self {
            hidden: true,
            ..Self::new(duration)
        }
    }

    pub fn quarter_length(&self) -> Rational {
        self.duration.quarter_length()
    }
}

// ============================================================================
// CLEFS, KEYS, METERS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClefSign {
    G,
    F,
    C,
    Percussion,
    Tab,
}

/// Named clef subtypes, for sign/line/octave combinations that have one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ClefKind {
    Treble,
    Treble8va,
    Treble8vb,
    FrenchViolin,
    GSoprano,
    Bass,
    Bass8va,
    Bass8vb,
    FBaritone,
    Subbass,
    Soprano,
    MezzoSoprano,
    Alto,
    Tenor,
    CBaritone,
    Percussion,
    Tab,
    /// A sign/line/octave combination without a dedicated name
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Clef {
    pub xml_id: Option<String>,
    pub sign: ClefSign,
    pub line: Option<u8>,
    pub octave_change: i32,
}

impl Clef {
    pub fn new(sign: ClefSign, line: Option<u8>, octave_change: i32) -> Self {
        Self {
            xml_id: None,
            sign,
            line,
            octave_change,
        }
    }

    pub fn kind(&self) -> ClefKind {
        match (self.sign, self.line, self.octave_change) {
            (ClefSign::Percussion, _, _) => ClefKind::Percussion,
            (ClefSign::Tab, _, _) => ClefKind::Tab,
            (ClefSign::G, Some(2), 0) => ClefKind::Treble,
            (ClefSign::G, Some(2), 1) => ClefKind::Treble8va,
            (ClefSign::G, Some(2), -1) => ClefKind::Treble8vb,
            (ClefSign::G, Some(1), 0) => ClefKind::FrenchViolin,
            (ClefSign::G, Some(3), 0) => ClefKind::GSoprano,
            (ClefSign::F, Some(4), 0) => ClefKind::Bass,
            (ClefSign::F, Some(4), 1) => ClefKind::Bass8va,
            (ClefSign::F, Some(4), -1) => ClefKind::Bass8vb,
            (ClefSign::F, Some(3), 0) => ClefKind::FBaritone,
            (ClefSign::F, Some(5), 0) => ClefKind::Subbass,
            (ClefSign::C, Some(1), 0) => ClefKind::Soprano,
            (ClefSign::C, Some(2), 0) => ClefKind::MezzoSoprano,
            (ClefSign::C, Some(3), 0) => ClefKind::Alto,
            (ClefSign::C, Some(4), 0) => ClefKind::Tenor,
            (ClefSign::C, Some(5), 0) => ClefKind::CBaritone,
            _ => ClefKind::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    pub fn parse(name: &str) -> Option<Mode> {
        match name.trim().to_ascii_lowercase().as_str() {
            "major" => Some(Mode::Major),
            "minor" => Some(Mode::Minor),
            "ionian" => Some(Mode::Ionian),
            "dorian" => Some(Mode::Dorian),
            "phrygian" => Some(Mode::Phrygian),
            "lydian" => Some(Mode::Lydian),
            "mixolydian" => Some(Mode::Mixolydian),
            "aeolian" => Some(Mode::Aeolian),
            "locrian" => Some(Mode::Locrian),
            _ => None,
        }
    }

    /// Fifths offset of the mode's final from its relative major
    pub fn sharps_offset(self) -> i32 {
        match self {
            Mode::Major | Mode::Ionian => 0,
            Mode::Lydian => 1,
            Mode::Mixolydian => -1,
            Mode::Dorian => -2,
            Mode::Minor | Mode::Aeolian => -3,
            Mode::Phrygian => -4,
            Mode::Locrian => -5,
        }
    }

    fn is_minor_like(self) -> bool {
        matches!(
            self,
            Mode::Minor | Mode::Aeolian | Mode::Dorian | Mode::Phrygian | Mode::Locrian
        )
    }
}

/// Key signature, optionally with a known tonic
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeySignature {
    /// Positive for sharps, negative for flats
    pub sharps: i32,
    pub mode: Option<Mode>,
    pub tonic: Option<Pitch>,
}

impl KeySignature {
    pub fn new(sharps: i32, mode: Option<Mode>) -> Self {
        Self {
            sharps,
            mode,
            tonic: None,
        }
    }

    /// Tonic name, lower-cased for minor-type modes ("b-" for B-flat minor)
    pub fn tonic_name_with_case(&self) -> Option<String> {
        let tonic = self.tonic.as_ref()?;
        let name = tonic.name();
        match self.mode {
            Some(mode) if mode.is_minor_like() => Some(name.to_lowercase()),
            _ => Some(name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeSignature {
    /// Total beats; for an additive meter the sum of `beat_groups`
    pub numerator: u32,
    pub denominator: u32,

    /// Groups of an additive count such as "3+2"; empty for a plain count
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub beat_groups: Vec<u32>,
}

impl TimeSignature {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
            beat_groups: Vec::new(),
        }
    }

    /// An additive meter; a single group is a plain count
    pub fn additive(beat_groups: Vec<u32>, denominator: u32) -> Self {
        let numerator = beat_groups.iter().sum();
        if beat_groups.len() < 2 {
            return Self::new(numerator, denominator);
        }
        Self {
            numerator,
            denominator,
            beat_groups,
        }
    }

    /// e.g. "3/8", or "3+2/8" for an additive meter
    pub fn ratio_string(&self) -> String {
        if self.beat_groups.is_empty() {
            return format!("{}/{}", self.numerator, self.denominator);
        }
        let groups: Vec<String> = self.beat_groups.iter().map(u32::to_string).collect();
        format!("{}/{}", groups.join("+"), self.denominator)
    }

    /// Length of one full bar in quarter notes
    pub fn bar_quarter_length(&self) -> Rational {
        let quarters = i32::try_from(4 * u64::from(self.numerator)).unwrap_or(i32::MAX);
        Rational::new(quarters, ratio_term(self.denominator))
    }
}

// ============================================================================
// INSTRUMENTS AND TRANSPOSITION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntervalQuality {
    DoublyDiminished,
    Diminished,
    Minor,
    Perfect,
    Major,
    Augmented,
    DoublyAugmented,
}

impl IntervalQuality {
    pub fn abbreviation(self) -> &'static str {
        match self {
            IntervalQuality::DoublyDiminished => "dd",
            IntervalQuality::Diminished => "d",
            IntervalQuality::Minor => "m",
            IntervalQuality::Perfect => "P",
            IntervalQuality::Major => "M",
            IntervalQuality::Augmented => "A",
            IntervalQuality::DoublyAugmented => "AA",
        }
    }
}

/// Directed interval, e.g. a transposing instrument's written-to-sounding offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub semitones: i32,
    /// Signed generic size: 1 = unison, 3 = third up, -3 = third down
    pub generic: i32,
    pub quality: IntervalQuality,
}

impl Interval {
    /// e.g. "m-3", "P12"
    pub fn directed_name(&self) -> String {
        format!("{}{}", self.quality.abbreviation(), self.generic)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Instrument {
    /// Catalog name ("Clarinet"); `None` for generic instruments
    pub instrument_name: Option<String>,
    /// General MIDI program, 0-based
    pub midi_program: Option<u8>,
    pub part_name: Option<String>,
    pub part_abbreviation: Option<String>,
    pub part_id: Option<String>,
    pub transposition: Option<Interval>,
}

// ============================================================================
// BARLINES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BarlineStyle {
    Regular,
    Dotted,
    Dashed,
    Double,
    Final,
    HeavyLight,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatDirection {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Repeat {
    pub direction: RepeatDirection,
    pub times: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Barline {
    pub style: BarlineStyle,
    /// Present on repeat barlines
    pub repeat: Option<Repeat>,
}

impl Barline {
    pub fn plain(style: BarlineStyle) -> Self {
        Self { style, repeat: None }
    }

    /// End-repeat, played twice
    pub fn repeat_end() -> Self {
        Self {
            style: BarlineStyle::Final,
            repeat: Some(Repeat {
                direction: RepeatDirection::End,
                times: Some(2),
            }),
        }
    }

    pub fn repeat_start() -> Self {
        Self {
            style: BarlineStyle::HeavyLight,
            repeat: Some(Repeat {
                direction: RepeatDirection::Start,
                times: None,
            }),
        }
    }

    pub fn is_repeat(&self) -> bool {
        self.repeat.is_some()
    }
}

// ============================================================================
// CONTAINERS
// ============================================================================

/// Anything a layer can contain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum VoiceElement {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    Space(Rest),
    Clef(Clef),
}

impl VoiceElement {
    /// Notes, chords, rests and spaces; clefs are not
    pub fn is_general_note(&self) -> bool {
        !matches!(self, VoiceElement::Clef(_))
    }

    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            VoiceElement::Note(n) => Some(n.id),
            VoiceElement::Chord(c) => Some(c.id),
            VoiceElement::Rest(r) | VoiceElement::Space(r) => Some(r.id),
            VoiceElement::Clef(_) => None,
        }
    }

    pub fn duration(&self) -> Option<&Duration> {
        match self {
            VoiceElement::Note(n) => Some(&n.duration),
            VoiceElement::Chord(c) => Some(&c.duration),
            VoiceElement::Rest(r) | VoiceElement::Space(r) => Some(&r.duration),
            VoiceElement::Clef(_) => None,
        }
    }

    pub fn duration_mut(&mut self) -> Option<&mut Duration> {
        match self {
            VoiceElement::Note(n) => Some(&mut n.duration),
            VoiceElement::Chord(c) => Some(&mut c.duration),
            VoiceElement::Rest(r) | VoiceElement::Space(r) => Some(&mut r.duration),
            VoiceElement::Clef(_) => None,
        }
    }

    pub fn pending_tuplet_mut(&mut self) -> Option<&mut Option<PendingTuplet>> {
        match self {
            VoiceElement::Note(n) => Some(&mut n.pending_tuplet),
            VoiceElement::Chord(c) => Some(&mut c.pending_tuplet),
            VoiceElement::Rest(r) | VoiceElement::Space(r) => Some(&mut r.pending_tuplet),
            VoiceElement::Clef(_) => None,
        }
    }

    /// Notes and chords carry beams; rests, spaces and clefs don't
    pub fn beams_mut(&mut self) -> Option<(&mut Beams, DurationType)> {
        match self {
            VoiceElement::Note(n) => Some((&mut n.beams, n.duration.kind)),
            VoiceElement::Chord(c) => Some((&mut c.beams, c.duration.kind)),
            _ => None,
        }
    }

    pub fn quarter_length(&self) -> Rational {
        self.duration()
            .map(Duration::quarter_length)
            .unwrap_or_else(|| Rational::from_integer(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Voice {
    pub id: String,
    pub elements: Vec<VoiceElement>,
}

impl Voice {
    pub fn new(id: impl Into<String>, elements: Vec<VoiceElement>) -> Self {
        Self {
            id: id.into(),
            elements,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Total length of the voice's contents laid end to end
    pub fn quarter_length(&self) -> Rational {
        self.elements
            .iter()
            .fold(Rational::from_integer(0), |sum, e| sum + e.quarter_length())
    }
}

/// Objects held directly by a measure
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MeasureElement {
    Voice(Voice),
    Instrument(Instrument),
    Clef(Clef),
    Key(KeySignature),
    Meter(TimeSignature),
}

impl MeasureElement {
    /// Ordering of objects that share offset zero
    fn sort_priority(&self) -> u8 {
        match self {
            MeasureElement::Voice(_) => 0,
            MeasureElement::Instrument(_) => 1,
            MeasureElement::Clef(_) => 2,
            MeasureElement::Key(_) => 3,
            MeasureElement::Meter(_) => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Measure {
    pub number: u32,
    pub elements: Vec<MeasureElement>,
    pub left_barline: Option<Barline>,
    pub right_barline: Option<Barline>,
}

impl Measure {
    pub fn new(number: u32, voices: Vec<Voice>) -> Self {
        Self {
            number,
            elements: voices.into_iter().map(MeasureElement::Voice).collect(),
            left_barline: None,
            right_barline: None,
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Place an object at offset zero, after anything of the same or earlier class
    pub fn insert_at_start(&mut self, element: MeasureElement) {
        let priority = element.sort_priority();
        let index = self
            .elements
            .iter()
            .position(|e| e.sort_priority() > priority)
            .unwrap_or(self.elements.len());
        self.elements.insert(index, element);
    }

    /// Like [`Measure::insert_at_start`], but ahead of any objects of the
    /// same class already there
    pub fn insert_leading(&mut self, element: MeasureElement) {
        let priority = element.sort_priority();
        let index = self
            .elements
            .iter()
            .position(|e| e.sort_priority() >= priority)
            .unwrap_or(self.elements.len());
        self.elements.insert(index, element);
    }

    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.elements.iter().filter_map(|e| match e {
            MeasureElement::Voice(v) => Some(v),
            _ => None,
        })
    }

    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.elements.iter_mut().filter_map(|e| match e {
            MeasureElement::Voice(v) => Some(v),
            _ => None,
        })
    }

    /// Length of the longest voice
    pub fn quarter_length(&self) -> Rational {
        self.voices()
            .map(Voice::quarter_length)
            .max()
            .unwrap_or_else(|| Rational::from_integer(0))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Part {
    /// The `@n` of the `<staffDef>` this part came from
    pub id: String,
    pub measures: Vec<Measure>,
}

impl Part {
    pub fn new(id: impl Into<String>, measures: Vec<Measure>) -> Self {
        Self {
            id: id.into(),
            measures,
        }
    }

    /// Instruments declared at the start of any measure
    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.measures.iter().flat_map(|m| {
            m.elements.iter().filter_map(|e| match e {
                MeasureElement::Instrument(i) => Some(i),
                _ => None,
            })
        })
    }
}

/// A connection between two or more notes/chords
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slur {
    /// Conversion-scoped identifier: a UUID for `<slur>` elements, the
    /// shorthand number for `@slur`
    pub local_id: String,
    pub spanned: Vec<ObjectId>,
}

impl Slur {
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            spanned: Vec::new(),
        }
    }

    /// Add an object once; repeated additions are ignored
    pub fn add_spanned(&mut self, id: ObjectId) {
        if !self.spanned.contains(&id) {
            self.spanned.push(id);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub composer: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub parts: Vec<Part>,
    pub spanners: Vec<Slur>,
    pub metadata: Metadata,
}

impl Score {
    pub fn part(&self, id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == id)
    }

    /// Number of measures in the longest part
    pub fn measure_count(&self) -> usize {
        self.parts
            .iter()
            .map(|p| p.measures.len())
            .max()
            .unwrap_or(0)
    }

    /// Every voice element of a part, in measure then voice order
    pub fn flat_notes<'a>(&'a self, part_id: &str) -> Vec<&'a VoiceElement> {
        self.part(part_id)
            .map(|part| {
                part.measures
                    .iter()
                    .flat_map(Measure::voices)
                    .flat_map(|v| v.elements.iter())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Score: {} part(s), {} measure(s), {} slur(s)",
            self.parts.len(),
            self.measure_count(),
            self.spanners.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_quarter_length() {
        let dotted = Duration::from_quarter_length(Rational::new(3, 2));
        assert_eq!(dotted.kind, DurationType::Quarter);
        assert_eq!(dotted.dots, 1);
        assert!(dotted.fixed_length.is_none());

        let odd = Duration::from_quarter_length(Rational::new(5, 4));
        assert_eq!(odd.kind, DurationType::Quarter);
        assert_eq!(odd.fixed_length, Some(Rational::new(5, 4)));
        assert_eq!(odd.quarter_length(), Rational::new(5, 4));
    }

    #[test]
    fn test_duration_full_name() {
        assert_eq!(Duration::new(DurationType::Quarter, 1).full_name(), "Dotted Quarter");
        assert_eq!(Duration::new(DurationType::N16th, 0).full_name(), "16th");

        let mut triplet = Duration::new(DurationType::Eighth, 0);
        triplet.tuplets.push(Tuplet {
            number_notes_actual: 3,
            number_notes_normal: 2,
            duration_actual: DurationType::Eighth,
            duration_normal: DurationType::Eighth,
            kind: None,
        });
        assert_eq!(triplet.full_name(), "Eighth Triplet (1/3 QL)");
    }

    #[test]
    fn test_grace_takes_no_time() {
        let mut duration = Duration::new(DurationType::Eighth, 0);
        duration.grace = Some(Grace::Acciaccatura);
        assert_eq!(duration.quarter_length(), Rational::from_integer(0));
    }

    #[test]
    fn test_pitch_names() {
        let pitch = Pitch::new(Step::D, Some(Accidental::Sharp), Some(2));
        assert_eq!(pitch.name_with_octave(), "D#2");
        assert_eq!(pitch.full_name(), "D-sharp in octave 2");

        let natural = Pitch::new(Step::C, Some(Accidental::Natural), Some(4));
        assert_eq!(natural.name_with_octave(), "C4");
    }

    #[test]
    fn test_insert_at_start_ordering() {
        let mut measure = Measure::new(1, vec![Voice::new("1", Vec::new())]);
        measure.insert_at_start(MeasureElement::Meter(TimeSignature::new(3, 4)));
        measure.insert_at_start(MeasureElement::Key(KeySignature::new(-1, None)));
        measure.insert_at_start(MeasureElement::Clef(Clef::new(ClefSign::F, Some(4), 0)));
        measure.insert_at_start(MeasureElement::Instrument(Instrument::default()));

        let order: Vec<u8> = measure.elements.iter().map(MeasureElement::sort_priority).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_insert_leading_goes_before_same_class() {
        let mut measure = Measure::new(1, vec![Voice::new("1", Vec::new())]);
        measure.insert_at_start(MeasureElement::Meter(TimeSignature::new(2, 4)));
        measure.insert_leading(MeasureElement::Meter(TimeSignature::new(3, 4)));
        measure.insert_leading(MeasureElement::Clef(Clef::new(ClefSign::G, Some(2), 0)));

        let meters: Vec<String> = measure
            .elements
            .iter()
            .filter_map(|e| match e {
                MeasureElement::Meter(m) => Some(m.ratio_string()),
                _ => None,
            })
            .collect();
        assert_eq!(meters, vec!["3/4", "2/4"]);
        assert!(matches!(measure.elements[1], MeasureElement::Clef(_)));
    }

    #[test]
    fn test_additive_meter() {
        let meter = TimeSignature::additive(vec![2, 2, 3], 8);
        assert_eq!(meter.numerator, 7);
        assert_eq!(meter.ratio_string(), "2+2+3/8");
        assert_eq!(meter.bar_quarter_length(), Rational::new(7, 2));

        let plain = TimeSignature::additive(vec![6], 8);
        assert_eq!(plain, TimeSignature::new(6, 8));
        assert_eq!(plain.ratio_string(), "6/8");
    }

    #[test]
    fn test_oversized_ratio_terms_saturate() {
        let tuplet = Tuplet {
            number_notes_actual: u32::MAX,
            number_notes_normal: 2,
            duration_actual: DurationType::Eighth,
            duration_normal: DurationType::Eighth,
            kind: None,
        };
        assert_eq!(tuplet.multiplier(), Rational::new(2, i32::MAX));
        assert!(TimeSignature::new(u32::MAX, 4).bar_quarter_length() > Rational::from_integer(0));
    }

    #[test]
    fn test_score_display() {
        let mut slur = Slur::new("1");
        let note = Note::new(Pitch::default(), Duration::new(DurationType::Whole, 0));
        slur.add_spanned(note.id);
        slur.add_spanned(note.id);
        assert_eq!(slur.spanned.len(), 1);

        let voice = Voice::new("1", vec![VoiceElement::Note(note)]);
        let score = Score {
            parts: vec![Part::new("1", vec![Measure::new(1, vec![voice])])],
            spanners: vec![slur],
            metadata: Metadata::default(),
        };
        assert_eq!(score.to_string(), "Score: 1 part(s), 1 measure(s), 1 slur(s)");
        assert_eq!(score.flat_notes("1").len(), 1);
        assert!(score.flat_notes("2").is_empty());
    }
}
