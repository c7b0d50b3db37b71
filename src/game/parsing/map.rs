use crate::game::difficulty::DifficultyKnobs;
use crate::game::element::{Break, Circle, Element, Slider};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub const AUDIO_FILE_NAME: &str = "audio.mp3";

/// A parsed map file. Elements are in file order; `Timeline::build` sorts.
#[derive(Clone, Debug, PartialEq)]
pub struct MapData {
    pub name: String,
    pub audio_path: PathBuf,
    pub audio_start_ms: f64,
    pub knobs: DifficultyKnobs,
    pub initial_break_end_ms: f64,
    pub elements: Vec<Element>,
}

/// Which part of the file a problem was found in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Record {
    Header,
    /// Zero-based element row.
    Element(usize),
}

impl core::fmt::Display for Record {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Element(i) => write!(f, "element #{i}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum MapParseError {
    Io {
        path: PathBuf,
        message: String,
    },
    /// The file ended before the field could be read.
    Truncated {
        line: usize,
        record: Record,
        field: &'static str,
    },
    InvalidNumber {
        line: usize,
        record: Record,
        field: &'static str,
        token: String,
    },
    UnknownElementType {
        line: usize,
        record: Record,
        token: String,
    },
    /// Parsed fine but makes no sense, e.g. a slider ending before it starts.
    InvalidValue {
        line: usize,
        record: Record,
        field: &'static str,
        reason: &'static str,
    },
}

impl core::fmt::Display for MapParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io { path, message } => {
                write!(f, "could not read map '{}': {message}", path.display())
            }
            Self::Truncated {
                line,
                record,
                field,
            } => write!(f, "line {line}: {record} is missing '{field}'"),
            Self::InvalidNumber {
                line,
                record,
                field,
                token,
            } => write!(f, "line {line}: {record} field '{field}' is not a number: '{token}'"),
            Self::UnknownElementType {
                line,
                record,
                token,
            } => write!(f, "line {line}: {record} has unknown element type '{token}'"),
            Self::InvalidValue {
                line,
                record,
                field,
                reason,
            } => write!(f, "line {line}: {record} field '{field}' {reason}"),
        }
    }
}

impl std::error::Error for MapParseError {}

/// Whitespace-separated tokens with their 1-based line numbers.
struct Tokens<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    current: Option<(usize, std::str::SplitWhitespace<'a>)>,
    last_line: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            current: None,
            last_line: 1,
        }
    }

    fn next_token(&mut self) -> Option<(usize, &'a str)> {
        loop {
            if let Some((line, words)) = self.current.as_mut()
                && let Some(word) = words.next()
            {
                return Some((*line, word));
            }
            let (idx, raw) = self.lines.next()?;
            let line = idx + 1;
            self.last_line = line;
            // '#' and ';' start comments.
            let content = raw.split(['#', ';']).next().unwrap_or_default();
            self.current = Some((line, content.split_whitespace()));
        }
    }

    fn number(&mut self, record: Record, field: &'static str) -> Result<(usize, f64), MapParseError> {
        let Some((line, token)) = self.next_token() else {
            return Err(MapParseError::Truncated {
                line: self.last_line,
                record,
                field,
            });
        };
        match token.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok((line, v)),
            _ => Err(MapParseError::InvalidNumber {
                line,
                record,
                field,
                token: token.to_string(),
            }),
        }
    }

    #[inline(always)]
    fn value(&mut self, record: Record, field: &'static str) -> Result<f64, MapParseError> {
        self.number(record, field).map(|(_, v)| v)
    }

    #[inline(always)]
    fn coord(&mut self, record: Record, field: &'static str) -> Result<f32, MapParseError> {
        self.value(record, field).map(|v| v as f32)
    }
}

/// Parses map text. Nothing is returned unless every row is valid.
pub fn parse_map(name: &str, audio_path: PathBuf, text: &str) -> Result<MapData, MapParseError> {
    let mut tok = Tokens::new(text);
    let h = Record::Header;

    let audio_start_ms = tok.value(h, "audio_start_ms")?;
    let od = tok.value(h, "od")?;
    let ar = tok.value(h, "ar")?;
    let cs = tok.value(h, "cs")?;
    let hp = tok.value(h, "hp")?;
    let initial_break_end_ms = tok.value(h, "initial_break_end_ms")?;

    let mut elements = Vec::new();
    while let Some((line, kind)) = tok.next_token() {
        let record = Record::Element(elements.len());
        let element = match kind {
            "1" => Element::Circle(Circle {
                time: tok.value(record, "time")?,
                x: tok.coord(record, "x")?,
                y: tok.coord(record, "y")?,
            }),
            "2" => {
                let start_time = tok.value(record, "start_time")?;
                let (end_line, end_time) = tok.number(record, "end_time")?;
                if end_time < start_time {
                    return Err(MapParseError::InvalidValue {
                        line: end_line,
                        record,
                        field: "end_time",
                        reason: "is before start_time",
                    });
                }
                let length = tok.coord(record, "length")?;
                let angle_degrees = tok.value(record, "angle")?;
                Element::Slider(Slider {
                    start_time,
                    end_time,
                    length,
                    angle_radians: angle_degrees.to_radians() as f32,
                    x: tok.coord(record, "x")?,
                    y: tok.coord(record, "y")?,
                })
            }
            "3" => {
                let start_time = tok.value(record, "start_time")?;
                let (end_line, end_time) = tok.number(record, "end_time")?;
                if end_time < start_time {
                    return Err(MapParseError::InvalidValue {
                        line: end_line,
                        record,
                        field: "end_time",
                        reason: "is before start_time",
                    });
                }
                Element::Break(Break {
                    start_time,
                    end_time,
                })
            }
            other => {
                return Err(MapParseError::UnknownElementType {
                    line,
                    record,
                    token: other.to_string(),
                });
            }
        };
        elements.push(element);
    }

    debug!("Parsed map '{name}': {} elements", elements.len());
    Ok(MapData {
        name: name.to_string(),
        audio_path,
        audio_start_ms,
        knobs: DifficultyKnobs { ar, od, cs, hp },
        initial_break_end_ms,
        elements,
    })
}

/// Loads `maps/<name>/<file>`. The map is named after its folder and its
/// audio is expected next to it.
pub fn load_map(path: &Path) -> Result<MapData, MapParseError> {
    let text = fs::read_to_string(path).map_err(|e| MapParseError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = dir
        .file_name()
        .or_else(|| path.file_stem())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    let map = parse_map(&name, dir.join(AUDIO_FILE_NAME), &text)?;
    info!(
        "Loaded map '{}' from {} ({} elements)",
        map.name,
        path.display(),
        map.elements.len()
    );
    Ok(map)
}
