//! Template-facing view of a form

use serde::Serialize;

use super::csrf::CSRF_FIELD;
use super::schema::{FieldErrors, FormData, FormSchema};

#[derive(Debug, Clone, Serialize)]
pub struct FieldView {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormView {
    pub fields: Vec<FieldView>,
    pub csrf_field: &'static str,
    /// Fresh token for the next submission; absent when CSRF is disabled
    pub csrf_token: Option<String>,
    pub csrf_errors: Vec<String>,
}

impl FormView {
    /// Bind a schema to submitted values and the errors they produced.
    pub fn bind(
        schema: &FormSchema,
        data: Option<&FormData>,
        errors: Option<&FieldErrors>,
        csrf_token: Option<String>,
    ) -> Self {
        let messages = |name: &str| errors.map(|e| e.get(name).to_vec()).unwrap_or_default();

        let fields = schema
            .fields()
            .iter()
            .map(|spec| FieldView {
                name: spec.name,
                label: spec.label,
                value: data
                    .and_then(|d| d.get(spec.name))
                    .unwrap_or_default()
                    .to_string(),
                errors: messages(spec.name),
            })
            .collect();

        Self {
            fields,
            csrf_field: CSRF_FIELD,
            csrf_token,
            csrf_errors: messages(CSRF_FIELD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::schema::{Submission, USER_INPUT};

    #[test]
    fn test_blank_form() {
        let view = FormView::bind(&Submission::schema(), None, None, Some("tok".to_string()));
        assert_eq!(view.fields.len(), 1);
        assert_eq!(view.fields[0].name, USER_INPUT);
        assert_eq!(view.fields[0].label, "Name");
        assert!(view.fields[0].value.is_empty());
        assert!(view.fields[0].errors.is_empty());
        assert!(view.csrf_errors.is_empty());
        assert_eq!(view.csrf_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_bound_form_keeps_values_and_errors() {
        let data: FormData = [("user_input", "")].into_iter().collect();
        let mut errors = FieldErrors::default();
        errors.add(USER_INPUT, "This field is required.");
        errors.add(CSRF_FIELD, "The CSRF token is missing.");

        let view = FormView::bind(&Submission::schema(), Some(&data), Some(&errors), None);
        assert_eq!(view.fields[0].value, "");
        assert_eq!(view.fields[0].errors, vec!["This field is required."]);
        assert_eq!(view.csrf_errors, vec!["The CSRF token is missing."]);
    }
}
