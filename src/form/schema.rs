//! Form schemas and validation
//!
//! A form is described by an explicit [`FormSchema`] value and validated
//! against the decoded request body, yielding either the validated fields or
//! the per-field error messages.

use std::collections::{BTreeMap, HashMap};

/// Name of the single field of the echo form
pub const USER_INPUT: &str = "user_input";

/// Validation rule attached to a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// The raw value must be present and non-empty. Whitespace counts as input.
    InputRequired,
}

impl Rule {
    fn check(self, value: Option<&str>) -> Option<&'static str> {
        match self {
            Self::InputRequired => match value {
                Some(v) if !v.is_empty() => None,
                _ => Some("This field is required."),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone)]
pub struct FormSchema {
    fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub const fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Check every field; all failures are collected, not just the first.
    pub fn validate(&self, data: &FormData) -> Result<ValidatedFields, FieldErrors> {
        let mut errors = FieldErrors::default();
        let mut values = HashMap::new();

        for field in &self.fields {
            let value = data.get(field.name);
            for rule in &field.rules {
                if let Some(message) = rule.check(value) {
                    errors.add(field.name, message);
                }
            }
            values.insert(field.name, value.unwrap_or_default().to_string());
        }

        if errors.is_empty() {
            Ok(ValidatedFields { values })
        } else {
            Err(errors)
        }
    }
}

/// Decoded field set of one request body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    values: HashMap<String, Vec<String>>,
}

impl FormData {
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// First submitted value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FormData
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = Self::default();
        for (name, value) in iter {
            data.push(name, value);
        }
        data
    }
}

/// Fields that passed every rule of their schema
#[derive(Debug, Clone)]
pub struct ValidatedFields {
    values: HashMap<&'static str, String>,
}

impl ValidatedFields {
    fn take(&mut self, name: &str) -> String {
        self.values.remove(name).unwrap_or_default()
    }
}

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn merge(&mut self, other: Self) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

/// A validated echo-form submission, owned by one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub user_input: String,
}

impl Submission {
    pub fn schema() -> FormSchema {
        FormSchema::new(vec![FieldSpec {
            name: USER_INPUT,
            label: "Name",
            rules: vec![Rule::InputRequired],
        }])
    }

    pub fn from_form(data: &FormData) -> Result<Self, FieldErrors> {
        let mut fields = Self::schema().validate(data)?;
        Ok(Self {
            user_input: fields.take(USER_INPUT),
        })
    }
}
