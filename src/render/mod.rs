//! Page renderer
//!
//! Binds a named template to a serializable context and produces HTML.
//! The built-in templates are compiled into the binary; a configured template
//! directory may override any of them by name.

use serde::Serialize;
use tera::{Context, Tera};

use crate::logger;

pub const FETCH_API: &str = "fetch_api.html";
pub const POST_API: &str = "post_api.html";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../../templates/base.html")),
    (FETCH_API, include_str!("../../templates/fetch_api.html")),
    (POST_API, include_str!("../../templates/post_api.html")),
    ("errors/400.html", include_str!("../../templates/errors/400.html")),
    ("errors/401.html", include_str!("../../templates/errors/401.html")),
    ("errors/403.html", include_str!("../../templates/errors/403.html")),
    ("errors/404.html", include_str!("../../templates/errors/404.html")),
];

pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    /// Build the renderer, loading `*.html` overrides from `dir` when given.
    pub fn new(dir: Option<&str>) -> Result<Self, tera::Error> {
        let mut tera = match dir {
            Some(dir) => {
                let glob = format!("{}/**/*.html", dir.trim_end_matches('/'));
                let tera = Tera::parse(&glob)?;
                logger::log_info(&format!(
                    "Loaded {} template override(s) from {dir}",
                    tera.get_template_names().count()
                ));
                tera
            }
            None => Tera::default(),
        };

        let missing: Vec<(&str, &str)> = BUILTIN_TEMPLATES
            .iter()
            .filter(|(name, _)| !tera.get_template_names().any(|n| n == *name))
            .copied()
            .collect();
        tera.add_raw_templates(missing)?;

        Ok(Self { tera })
    }

    /// Render `template` with the fields of `context` as variables.
    pub fn render<C: Serialize>(&self, template: &str, context: &C) -> Result<String, tera::Error> {
        let context = Context::from_serialize(context)?;
        self.tera.render(template, &context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::fs;

    #[derive(Serialize)]
    struct Data<'a> {
        data: &'a str,
    }

    #[derive(Serialize)]
    struct Empty {}

    #[test]
    fn test_builtin_templates_render() {
        let renderer = PageRenderer::new(None).unwrap();
        let html = renderer.render(FETCH_API, &Data { data: "sunny" }).unwrap();
        assert!(html.contains("<pre id=\"data\">sunny</pre>"));
        assert!(html.contains("<!DOCTYPE html>"));
    }

    #[test]
    fn test_html_is_escaped() {
        let renderer = PageRenderer::new(None).unwrap();
        let html = renderer
            .render(FETCH_API, &Data { data: "<script>\"x\"</script>" })
            .unwrap();
        assert!(!html.contains("<script>"));
        assert!(html.contains(&tera::escape_html("<script>\"x\"</script>")));
    }

    #[test]
    fn test_missing_variable_is_render_error() {
        let renderer = PageRenderer::new(None).unwrap();
        assert!(renderer.render(FETCH_API, &Empty {}).is_err());
    }

    #[test]
    fn test_unknown_template_is_render_error() {
        let renderer = PageRenderer::new(None).unwrap();
        assert!(renderer.render("nope.html", &Empty {}).is_err());
    }

    #[test]
    fn test_error_templates_are_builtin() {
        let renderer = PageRenderer::new(None).unwrap();
        for code in [400, 401, 403, 404] {
            let html = renderer
                .render(&format!("errors/{code}.html"), &Empty {})
                .unwrap();
            assert!(html.contains(&format!("id=\"error-{code}\"")));
        }
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("errors")).unwrap();
        fs::write(
            dir.path().join("errors/404.html"),
            "<p>custom missing page</p>",
        )
        .unwrap();

        let renderer = PageRenderer::new(dir.path().to_str()).unwrap();
        let html = renderer.render("errors/404.html", &Empty {}).unwrap();
        assert_eq!(html, "<p>custom missing page</p>");

        // Templates not overridden still come from the binary
        let html = renderer.render("errors/403.html", &Empty {}).unwrap();
        assert!(html.contains("id=\"error-403\""));
    }
}
