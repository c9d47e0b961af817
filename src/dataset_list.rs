//! Decoding of the ads export dataset list.
//!
//! Terraform hands the list over as either JSON
//! (`[{"project":"p","dataset":"d"}]`) or HCL object-list syntax
//! (`[{project="p", dataset="d"}]`). Both decode to [`DatasetLocation`]s
//! with the same schema: exactly the keys `project` and `dataset`, both
//! non-empty strings.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use provcheck_core::{Error, ResourceId, Result};
use serde::{Deserialize, Serialize};

/// A BigQuery dataset and the project holding it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetLocation {
    pub project: String,
    pub dataset: String,
}

impl DatasetLocation {
    /// Create a location; both parts must be non-empty.
    ///
    /// # Errors
    ///
    /// `InvalidInput` when either part is blank.
    pub fn new(project: impl Into<String>, dataset: impl Into<String>) -> Result<Self> {
        let location = Self {
            project: project.into(),
            dataset: dataset.into(),
        };
        location.validate()?;
        Ok(location)
    }

    fn validate(&self) -> Result<()> {
        if self.project.trim().is_empty() {
            return Err(Error::invalid_input("dataset entry has an empty project"));
        }
        if self.dataset.trim().is_empty() {
            return Err(Error::invalid_input("dataset entry has an empty dataset"));
        }
        Ok(())
    }

    /// The `project.dataset` resource id.
    pub fn resource_id(&self) -> ResourceId {
        ResourceId::new(self.to_string())
    }
}

impl fmt::Display for DatasetLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.project, self.dataset)
    }
}

/// Decode a dataset list in JSON or HCL syntax. Blank input is an empty list.
///
/// # Errors
///
/// `InvalidInput` for syntax errors (with the byte offset), unknown or
/// missing keys, and empty values.
pub fn parse_dataset_list(input: &str) -> Result<Vec<DatasetLocation>> {
    if input.trim().is_empty() {
        return Ok(Vec::new());
    }

    let locations = if serde_json::from_str::<serde_json::Value>(input).is_ok() {
        serde_json::from_str::<Vec<DatasetLocation>>(input)
            .map_err(|e| Error::invalid_input(format!("dataset list: {e}")))?
    } else {
        HclParser::new(input).parse_list()?
    };

    for location in &locations {
        location.validate()?;
    }
    Ok(locations)
}

/// Recursive-descent parser for `[{key = "value", ...}, ...]`.
///
/// Keys are bare identifiers or quoted strings; `=` and `:` both separate
/// a key from its value; trailing commas are allowed.
struct HclParser<'a> {
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> HclParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.len, |(i, _)| *i)
    }

    fn error(&mut self, expected: &str) -> Error {
        let offset = self.offset();
        let found = self
            .chars
            .peek()
            .map_or_else(|| "end of input".to_string(), |(_, c)| format!("'{c}'"));
        Error::invalid_input(format!(
            "dataset list: expected {expected} at offset {offset}, found {found}"
        ))
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("'{expected}'")))
        }
    }

    fn parse_list(mut self) -> Result<Vec<DatasetLocation>> {
        self.expect('[')?;
        let mut items = Vec::new();
        loop {
            if self.eat(']') {
                break;
            }
            items.push(self.parse_object()?);
            if !self.eat(',') {
                self.expect(']')?;
                break;
            }
        }
        self.skip_ws();
        if self.chars.peek().is_some() {
            return Err(self.error("end of input"));
        }
        Ok(items)
    }

    fn parse_object(&mut self) -> Result<DatasetLocation> {
        let start = {
            self.skip_ws();
            self.offset()
        };
        self.expect('{')?;
        let mut project = None;
        let mut dataset = None;
        loop {
            if self.eat('}') {
                break;
            }
            let key_offset = {
                self.skip_ws();
                self.offset()
            };
            let key = self.parse_key()?;
            if !(self.eat('=') || self.eat(':')) {
                return Err(self.error("'=' or ':'"));
            }
            let value = self.parse_string()?;
            let slot = match key.as_str() {
                "project" => &mut project,
                "dataset" => &mut dataset,
                other => {
                    return Err(Error::invalid_input(format!(
                        "dataset list: unknown key '{other}' at offset {key_offset}"
                    )));
                }
            };
            if slot.replace(value).is_some() {
                return Err(Error::invalid_input(format!(
                    "dataset list: duplicate key '{key}' at offset {key_offset}"
                )));
            }
            // Commas between attributes are optional, as in HCL.
            self.eat(',');
        }

        match (project, dataset) {
            (Some(project), Some(dataset)) => Ok(DatasetLocation { project, dataset }),
            (None, _) => Err(Error::invalid_input(format!(
                "dataset list: object at offset {start} is missing 'project'"
            ))),
            (_, None) => Err(Error::invalid_input(format!(
                "dataset list: object at offset {start} is missing 'dataset'"
            ))),
        }
    }

    fn parse_key(&mut self) -> Result<String> {
        self.skip_ws();
        match self.chars.peek().map(|(_, c)| *c) {
            Some('"') => self.parse_string(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut key = String::new();
                while let Some((_, c)) = self
                    .chars
                    .next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
                {
                    key.push(c);
                }
                Ok(key)
            }
            _ => Err(self.error("a key")),
        }
    }

    fn parse_string(&mut self) -> Result<String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, '"')) => return Ok(value),
                Some((_, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, c @ ('"' | '\\' | '/'))) => value.push(c),
                    _ => return Err(self.error("a valid escape sequence")),
                },
                Some((_, c)) => value.push(c),
                None => return Err(self.error("closing '\"'")),
            }
        }
    }
}
