//! Instrument catalog
//!
//! Resolves `<instrDef>` and `<staffDef @label>` data to an [`Instrument`]:
//! General MIDI programs by number, and common instrument names by keyword.

use crate::mei_import::types::Instrument;
use once_cell::sync::Lazy;

/// General MIDI level 1 program names, 0-based
const GM_PROGRAMS: [&str; 128] = [
    // Piano
    "Acoustic Grand Piano", "Bright Acoustic Piano", "Electric Grand Piano", "Honky-tonk Piano",
    "Electric Piano 1", "Electric Piano 2", "Harpsichord", "Clavinet",
    // Chromatic percussion
    "Celesta", "Glockenspiel", "Music Box", "Vibraphone",
    "Marimba", "Xylophone", "Tubular Bells", "Dulcimer",
    // Organ
    "Drawbar Organ", "Percussive Organ", "Rock Organ", "Church Organ",
    "Reed Organ", "Accordion", "Harmonica", "Tango Accordion",
    // Guitar
    "Acoustic Guitar (nylon)", "Acoustic Guitar (steel)", "Electric Guitar (jazz)", "Electric Guitar (clean)",
    "Electric Guitar (muted)", "Overdriven Guitar", "Distortion Guitar", "Guitar Harmonics",
    // Bass
    "Acoustic Bass", "Electric Bass (finger)", "Electric Bass (pick)", "Fretless Bass",
    "Slap Bass 1", "Slap Bass 2", "Synth Bass 1", "Synth Bass 2",
    // Strings
    "Violin", "Viola", "Cello", "Contrabass",
    "Tremolo Strings", "Pizzicato Strings", "Orchestral Harp", "Timpani",
    // Ensemble
    "String Ensemble 1", "String Ensemble 2", "Synth Strings 1", "Synth Strings 2",
    "Choir Aahs", "Voice Oohs", "Synth Voice", "Orchestra Hit",
    // Brass
    "Trumpet", "Trombone", "Tuba", "Muted Trumpet",
    "French Horn", "Brass Section", "Synth Brass 1", "Synth Brass 2",
    // Reed
    "Soprano Sax", "Alto Sax", "Tenor Sax", "Baritone Sax",
    "Oboe", "English Horn", "Bassoon", "Clarinet",
    // Pipe
    "Piccolo", "Flute", "Recorder", "Pan Flute",
    "Blown Bottle", "Shakuhachi", "Whistle", "Ocarina",
    // Synth lead
    "Lead 1 (square)", "Lead 2 (sawtooth)", "Lead 3 (calliope)", "Lead 4 (chiff)",
    "Lead 5 (charang)", "Lead 6 (voice)", "Lead 7 (fifths)", "Lead 8 (bass + lead)",
    // Synth pad
    "Pad 1 (new age)", "Pad 2 (warm)", "Pad 3 (polysynth)", "Pad 4 (choir)",
    "Pad 5 (bowed)", "Pad 6 (metallic)", "Pad 7 (halo)", "Pad 8 (sweep)",
    // Synth effects
    "FX 1 (rain)", "FX 2 (soundtrack)", "FX 3 (crystal)", "FX 4 (atmosphere)",
    "FX 5 (brightness)", "FX 6 (goblins)", "FX 7 (echoes)", "FX 8 (sci-fi)",
    // Ethnic
    "Sitar", "Banjo", "Shamisen", "Koto",
    "Kalimba", "Bagpipe", "Fiddle", "Shanai",
    // Percussive
    "Tinkle Bell", "Agogo", "Steel Drums", "Woodblock",
    "Taiko Drum", "Melodic Tom", "Synth Drum", "Reverse Cymbal",
    // Sound effects
    "Guitar Fret Noise", "Breath Noise", "Seashore", "Bird Tweet",
    "Telephone Ring", "Helicopter", "Applause", "Gunshot",
];

/// (keywords, catalog name, GM program)
///
/// Multi-word phrases come before the single words they contain so that
/// "bass clarinet" isn't matched as "clarinet" and "double bass" isn't a voice.
static NAME_CATALOG: Lazy<Vec<(Vec<&'static str>, &'static str, u8)>> = Lazy::new(|| {
    let entries: &[(&str, &str, u8)] = &[
        ("bass clarinet", "Bass Clarinet", 71),
        ("english horn", "English Horn", 69),
        ("cor anglais", "English Horn", 69),
        ("french horn", "Horn", 60),
        ("double bass", "Contrabass", 43),
        ("string bass", "Contrabass", 43),
        ("alto saxophone", "Alto Saxophone", 65),
        ("tenor saxophone", "Tenor Saxophone", 66),
        ("baritone saxophone", "Baritone Saxophone", 67),
        ("soprano saxophone", "Soprano Saxophone", 64),
        ("electric piano", "Electric Piano", 4),
        ("piccolo", "Piccolo", 72),
        ("flute", "Flute", 73),
        ("recorder", "Recorder", 74),
        ("oboe", "Oboe", 68),
        ("clarinet", "Clarinet", 71),
        ("bassoon", "Bassoon", 70),
        ("contrabassoon", "Contrabassoon", 70),
        ("saxophone", "Saxophone", 65),
        ("horn", "Horn", 60),
        ("trumpet", "Trumpet", 56),
        ("cornet", "Trumpet", 56),
        ("trombone", "Trombone", 57),
        ("tuba", "Tuba", 58),
        ("timpani", "Timpani", 47),
        ("harp", "Harp", 46),
        ("violin", "Violin", 40),
        ("viola", "Viola", 41),
        ("violoncello", "Violoncello", 42),
        ("cello", "Violoncello", 42),
        ("contrabass", "Contrabass", 43),
        ("harpsichord", "Harpsichord", 6),
        ("celesta", "Celesta", 8),
        ("organ", "Pipe Organ", 19),
        ("piano", "Piano", 0),
        ("guitar", "Acoustic Guitar", 24),
        ("soprano", "Soprano", 52),
        ("alto", "Alto", 52),
        ("tenor", "Tenor", 52),
        ("bass", "Bass", 52),
    ];
    entries
        .iter()
        .map(|(phrase, name, program)| (phrase.split(' ').collect(), *name, *program))
        .collect()
});

/// General MIDI program name (0-based)
pub fn gm_program_name(program: u8) -> Option<&'static str> {
    GM_PROGRAMS.get(program as usize).copied()
}

/// Instrument for a 0-based General MIDI program
pub fn from_midi_program(program: u8) -> Option<Instrument> {
    let name = gm_program_name(program)?;
    Some(Instrument {
        instrument_name: Some(name.to_string()),
        midi_program: Some(program),
        ..Instrument::default()
    })
}

fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Instrument whose name contains a known keyword ("Clarinet in B-flat", "2. Violin")
pub fn from_name(name: &str) -> Option<Instrument> {
    let tokens = tokenize(name);
    if tokens.is_empty() {
        return None;
    }

    let (_, catalog_name, program) = NAME_CATALOG.iter().find(|(phrase, _, _)| {
        tokens
            .windows(phrase.len())
            .any(|window| window.iter().zip(phrase.iter()).all(|(t, p)| t == p))
    })?;

    Some(Instrument {
        instrument_name: Some(catalog_name.to_string()),
        midi_program: Some(*program),
        ..Instrument::default()
    })
}

/// An instrument known only by its label
pub fn generic(label: &str) -> Instrument {
    Instrument {
        part_name: Some(label.to_string()),
        ..Instrument::default()
    }
}
