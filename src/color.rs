//! Color-name lookup table.
//!
//! Grounded on `libcscript/lookup-color-name.c`: two fixed eight-entry
//! tables (normal, `0;3x`, and bright, `1;3x`), and a `bright-` prefix
//! that switches which table is searched.

pub struct ColorEntry {
    pub name: &'static str,
    pub start: &'static str,
    pub end: &'static str,
}

macro_rules! color_table {
    ($sgr_base:literal, $( $name:literal => $digit:literal ),* $(,)?) => {
        &[
            $(
                ColorEntry {
                    name: $name,
                    start: concat!("\x1b[", $sgr_base, ";3", $digit, "m"),
                    end: "\x1b[m",
                },
            )*
        ]
    };
}

pub static NORMAL_COLORS: &[ColorEntry] = color_table! {
    "0",
    "black" => "0", "red" => "1", "green" => "2", "yellow" => "3",
    "blue" => "4", "magenta" => "5", "cyan" => "6", "white" => "7",
};

pub static BRIGHT_COLORS: &[ColorEntry] = color_table! {
    "1",
    "black" => "0", "red" => "1", "green" => "2", "yellow" => "3",
    "blue" => "4", "magenta" => "5", "cyan" => "6", "white" => "7",
};

const BRIGHT_PREFIX: &str = "bright-";

/// Looks up a color by name, returning its (start, end) escape pair.
///
/// Names prefixed with `bright-` are looked up (after stripping the
/// prefix) in the bright table; anything else is looked up in the normal
/// table. Unrecognised prefixes are not special-cased, they simply fail
/// to match any entry in the normal table.
pub fn lookup(name: &str) -> Option<(&'static str, &'static str)> {
    let (table, name) = match name.strip_prefix(BRIGHT_PREFIX) {
        Some(rest) => (BRIGHT_COLORS, rest),
        None => (NORMAL_COLORS, name),
    };

    table
        .iter()
        .find(|entry| entry.name == name)
        .map(|entry| (entry.start, entry.end))
}

/// Known color names, normal table first then bright table, space
/// separated — used to print a "known colors are" message on a miss.
pub fn known_names() -> String {
    let normal = NORMAL_COLORS
        .iter()
        .map(|e| e.name)
        .collect::<Vec<_>>()
        .join(" ");
    let bright = BRIGHT_COLORS
        .iter()
        .map(|e| format!("bright-{}", e.name))
        .collect::<Vec<_>>()
        .join(" ");
    format!("{}\n{}", normal, bright)
}
