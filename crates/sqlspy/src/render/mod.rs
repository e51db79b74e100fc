//! Literal SQL reconstruction.
//!
//! Given a statement's template and a [`BindingSnapshot`], produce the SQL
//! with every positional marker replaced by the literal form of its bound
//! value:
//!
//! ```rust,ignore
//! // template: {call test_proc(?,?,?)}   bindings: 1, "hi", OUT
//! // rendered: {call test_proc(1,'hi',?)}
//! ```
//!
//! Rendering is for logging only. It never fails: markers without a binding
//! get [`RenderOptions::unbound_marker`] and are listed in
//! [`Rendered::unbound`]; OUT-only slots keep their original marker. When
//! the template uses named tokens or named bindings exist, the template is
//! returned unchanged and the bound values are listed in
//! [`Rendered::parameters`] instead.

mod literal;
mod scan;

#[cfg(test)]
mod tests;

pub use literal::{BinaryFormat, BooleanFormat, RenderOptions, literal, push_literal, push_quoted};
pub use scan::{Marker, MarkerKind, parameter_count, scan};

use crate::bind::BindingSnapshot;

/// How far substitution got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Markers were replaced by literals.
    Literal,
    /// Named parameters in use; the template was left as-is.
    Template,
}

/// Result of rendering one template against one binding snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub resolution: Resolution,
    /// Indices of positional markers that had no binding.
    pub unbound: Vec<usize>,
    /// `(identifier, literal)` for every input binding, filled only for
    /// [`Resolution::Template`].
    pub parameters: Vec<(String, String)>,
}

/// Render `template` with `bindings`.
pub fn render(template: &str, bindings: &BindingSnapshot, options: &RenderOptions) -> Rendered {
    let markers = scan(template);

    let named_template = markers
        .iter()
        .any(|m| matches!(m.kind, MarkerKind::Named(_)));
    if named_template || bindings.has_named() {
        return Rendered {
            sql: template.to_string(),
            resolution: Resolution::Template,
            unbound: Vec::new(),
            parameters: bindings
                .entries()
                .filter_map(|(id, b)| {
                    b.value
                        .as_ref()
                        .map(|v| (id.to_string(), literal(v, options)))
                })
                .collect(),
        };
    }

    let mut sql = String::with_capacity(template.len() + markers.len() * 8);
    let mut unbound = Vec::new();
    let mut last = 0;

    for marker in &markers {
        sql.push_str(&template[last..marker.start]);
        last = marker.end;

        let Some(index) = marker.index() else {
            sql.push_str(&template[marker.start..marker.end]);
            continue;
        };

        match bindings.positional(index) {
            Some(binding) => match &binding.value {
                Some(value) => push_literal(&mut sql, value, options),
                None => sql.push_str(&template[marker.start..marker.end]),
            },
            None => {
                sql.push_str(&options.unbound_marker);
                if !unbound.contains(&index) {
                    unbound.push(index);
                }
            }
        }
    }
    sql.push_str(&template[last..]);

    Rendered {
        sql,
        resolution: Resolution::Literal,
        unbound,
        parameters: Vec::new(),
    }
}

/// Render one entry per batch snapshot, all against the same template.
pub fn render_batch(
    template: &str,
    entries: &[BindingSnapshot],
    options: &RenderOptions,
) -> Vec<Rendered> {
    entries
        .iter()
        .map(|bindings| render(template, bindings, options))
        .collect()
}

/// Join the parameter list of a [`Resolution::Template`] rendering as
/// `name:value, name:value`.
pub fn format_parameters(parameters: &[(String, String)]) -> String {
    let mut out = String::new();
    for (i, (id, value)) in parameters.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(id);
        out.push(':');
        out.push_str(value);
    }
    out
}
