use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde_with::{DeserializeFromStr, SerializeDisplay};
use smallvec::SmallVec;
use thiserror::Error;

/// The largest array index a path may address.
///
/// Writing through an index creates every slot before it, so parsing rejects larger indexes and
/// the resolver ignores writes through them.
pub const MAX_INDEX: usize = u16::MAX as usize;

/// A single step in a [`FieldPath`].
///
/// Integer segments address array slots, string segments address object keys.  When an integer
/// segment is applied to an object it is looked up using its decimal representation.
#[derive(Debug, Clone, PartialOrd, Ord, Eq, PartialEq, Hash)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn key(key: &str) -> Self {
        Segment::Key(key.to_string())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Segment::Index(_))
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Segment::Index(index) => Some(*index),
            Segment::Key(_) => None,
        }
    }

    /// The name used when the segment is applied to an object.
    pub fn to_key(&self) -> String {
        match self {
            Segment::Key(key) => key.clone(),
            Segment::Index(index) => index.to_string(),
        }
    }

    /// Only canonical decimal numbers become indexes, `01` stays a key so that parsing and
    /// displaying a path is lossless.
    fn from_token(token: &str) -> Self {
        let canonical = !token.is_empty()
            && token
                .bytes()
                .all(|byte| byte.is_ascii_digit())
            && (token == "0" || !token.starts_with('0'));

        match canonical {
            true => token
                .parse::<usize>()
                .map(Segment::Index)
                .unwrap_or_else(|_| Segment::Key(token.to_string())),
            false => Segment::Key(token.to_string()),
        }
    }

    fn needs_quoting(key: &str) -> bool {
        key.is_empty()
            || key
                .chars()
                .any(|c| matches!(c, '.' | '[' | ']' | '"' | '\''))
            || matches!(Segment::from_token(key), Segment::Index(_))
    }
}

impl From<usize> for Segment {
    fn from(value: usize) -> Self {
        Segment::Index(value)
    }
}

impl From<&str> for Segment {
    fn from(value: &str) -> Self {
        Segment::Key(value.to_string())
    }
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{}", key),
            Segment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A compiled field name.
///
/// `a.b.0.c`, `a.b[0].c` and `a["b"][0].c` all compile to the same path.  The canonical string
/// form uses dots, keys that would not survive a dot-separated round trip are written in
/// quoted brackets, e.g. `a["x.y"]`.
#[derive(Debug, Clone, DeserializeFromStr, SerializeDisplay, Eq, PartialEq, Default, Hash, PartialOrd, Ord)]
pub struct FieldPath {
    segments: SmallVec<[Segment; 4]>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.segments.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn parent(&self) -> Option<FieldPath> {
        match self.segments.is_empty() {
            true => None,
            false => Some(Self::from_segments(
                self.segments[..self.segments.len() - 1]
                    .iter()
                    .cloned(),
            )),
        }
    }

    pub fn push(&mut self, segment: impl Into<Segment>) {
        self.segments.push(segment.into());
    }

    pub fn join(&self, segment: impl Into<Segment>) -> FieldPath {
        let mut path = self.clone();
        path.push(segment);
        path
    }

    pub fn concat(&self, other: &FieldPath) -> FieldPath {
        let mut path = self.clone();
        path.segments
            .extend(other.segments.iter().cloned());
        path
    }

    /// True when `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self
                .segments
                .iter()
                .zip(prefix.segments.iter())
                .all(|(a, b)| segment_eq(a, b))
    }

    /// True when one of the two paths is a prefix of the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.starts_with(other) || other.starts_with(self)
    }

    pub fn strip_prefix(&self, prefix: &FieldPath) -> Option<FieldPath> {
        match self.starts_with(prefix) {
            true => Some(Self::from_segments(
                self.segments[prefix.segments.len()..]
                    .iter()
                    .cloned(),
            )),
            false => None,
        }
    }

    /// The row index of `self` within the array at `array`, e.g. `items.2.name` in `items` is `2`.
    pub fn index_below(&self, array: &FieldPath) -> Option<usize> {
        match self.starts_with(array) {
            true => self
                .segments
                .get(array.segments.len())
                .and_then(|segment| match segment {
                    Segment::Index(index) => Some(*index),
                    Segment::Key(key) => key.parse::<usize>().ok(),
                }),
            false => None,
        }
    }

    /// Replace the segment at `position` with an index.
    pub fn with_index_at(&self, position: usize, index: usize) -> FieldPath {
        let mut path = self.clone();
        if let Some(segment) = path.segments.get_mut(position) {
            *segment = Segment::Index(index);
        }
        path
    }
}

/// `0` and `"0"` address the same slot of an object, so they compare equal here.
fn segment_eq(a: &Segment, b: &Segment) -> bool {
    match (a, b) {
        (Segment::Key(a), Segment::Key(b)) => a == b,
        (Segment::Index(a), Segment::Index(b)) => a == b,
        (Segment::Key(key), Segment::Index(index)) | (Segment::Index(index), Segment::Key(key)) => {
            key == &index.to_string()
        }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (position, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if Segment::needs_quoting(key) => {
                    write!(f, "[\"{}\"]", key.replace('"', "\\\""))?;
                }
                _ => {
                    if position > 0 {
                        f.write_str(".")?;
                    }
                    write!(f, "{}", segment)?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments: SmallVec<[Segment; 4]> = SmallVec::new();
        let mut token = String::new();
        let mut chars = value.chars().peekable();
        // set after a closing bracket, the next char must be a separator or the end.
        let mut after_bracket = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if token.is_empty() && !after_bracket {
                        return Err(PathError::EmptySegment(value.to_string()));
                    }
                    if !token.is_empty() {
                        segments.push(Segment::from_token(&token));
                        token.clear();
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        return Err(PathError::EmptySegment(value.to_string()));
                    }
                }
                '[' => {
                    if !token.is_empty() {
                        segments.push(Segment::from_token(&token));
                        token.clear();
                    }

                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        return Err(PathError::UnclosedBracket(value.to_string()));
                    }

                    let quoted = inner.len() >= 2
                        && ((inner.starts_with('"') && inner.ends_with('"'))
                            || (inner.starts_with('\'') && inner.ends_with('\'')));
                    let segment = match quoted {
                        true => Segment::Key(inner[1..inner.len() - 1].replace("\\\"", "\"")),
                        false if inner.is_empty() => return Err(PathError::EmptySegment(value.to_string())),
                        false => Segment::from_token(&inner),
                    };
                    segments.push(segment);
                    after_bracket = true;
                }
                ']' => return Err(PathError::UnexpectedBracket(value.to_string())),
                _ => {
                    if after_bracket {
                        return Err(PathError::MissingSeparator(value.to_string()));
                    }
                    token.push(c);
                }
            }
        }

        if !token.is_empty() {
            segments.push(Segment::from_token(&token));
        }

        if segments
            .iter()
            .filter_map(Segment::as_index)
            .any(|index| index > MAX_INDEX)
        {
            return Err(PathError::IndexOutOfRange(value.to_string()));
        }

        Ok(FieldPath {
            segments,
        })
    }
}

impl From<Segment> for FieldPath {
    fn from(value: Segment) -> Self {
        FieldPath::from_segments([value])
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Empty field path")]
    Empty,
    #[error("Empty segment in path. path: '{0}'")]
    EmptySegment(String),
    #[error("Unclosed bracket in path. path: '{0}'")]
    UnclosedBracket(String),
    #[error("Unexpected closing bracket in path. path: '{0}'")]
    UnexpectedBracket(String),
    #[error("Missing separator after bracket in path. path: '{0}'")]
    MissingSeparator(String),
    #[error("Array index out of range in path. path: '{0}'")]
    IndexOutOfRange(String),
}
