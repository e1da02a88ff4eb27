//! Melodies that ship with the engine

use anyhow::Result;

use super::Melody;

struct Builtin {
    id: &'static str,
    name: &'static str,
    tempo: f64,
    score: &'static str,
}

const BUILTINS: [Builtin; 5] = [
    Builtin {
        id: "mary-little-lamb",
        name: "Mary Had a Little Lamb",
        tempo: 300.0,
        score: "E4 D4 C4 D4 E4 E4 E4:2 D4 D4 D4:2 E4 G4 G4:2 \
                E4 D4 C4 D4 E4 E4 E4 E4 D4 D4 E4 D4 C4:2",
    },
    Builtin {
        id: "yellow-rose-texas",
        name: "Yellow Rose of Texas",
        tempo: 400.0,
        score: "C4 E4 E4 F4 G4 G4 A4 G4 E4:2 C4 E4 E4 F4 G4 G4 A4 G4:2 \
                C4 E4 E4 F4 G4 E4 D4 C4 D4 E4 D4 C4:2",
    },
    Builtin {
        id: "red-river-valley",
        name: "Red River Valley",
        tempo: 400.0,
        score: "G4 C4 C4 D4 E4 G4 G4 A4 G4 E4:2 C4 C4 D4 E4 D4 C4:2 \
                G4 C4 C4 D4 E4 G4 G4 A4 G4 E4:2 D4 D4 E4 D4 C4:2",
    },
    Builtin {
        id: "home-on-range",
        name: "Home on the Range",
        tempo: 400.0,
        score: "G4 C4 D4 E4 F4 E4 D4 C4:2 D4 E4 F4 G4 A4 G4:2 \
                G4 C4 D4 E4 F4 E4 D4 C4:2 D4 E4 D4 C4 D4 E4:2",
    },
    Builtin {
        id: "streets-of-laredo",
        name: "Streets of Laredo",
        tempo: 400.0,
        score: "G4 C4 C4 C4 D4 E4 D4 C4:2 G4 C4 C4 C4 D4 E4:2 \
                G4 C4 C4 C4 D4 E4 D4 C4:2 D4 E4 D4 C4:2",
    },
];

/// Ids of the built-in melodies, in listing order
pub const BUILTIN_IDS: [&str; 5] = [
    "mary-little-lamb",
    "yellow-rose-texas",
    "red-river-valley",
    "home-on-range",
    "streets-of-laredo",
];

/// All built-in melodies
pub fn builtins() -> Result<Vec<Melody>> {
    BUILTINS
        .iter()
        .map(|b| Melody::from_score(b.id, b.name, b.tempo, b.score))
        .collect()
}

/// Look up a built-in melody by id
pub fn builtin(id: &str) -> Result<Option<Melody>> {
    match BUILTINS.iter().find(|b| b.id == id) {
        Some(b) => Melody::from_score(b.id, b.name, b.tempo, b.score).map(Some),
        None => Ok(None),
    }
}
