//! MathML rendering of expression trees for documentation and export.
//!
//! Purely structural: rendering never evaluates anything.

use crate::tree::ExpressionNode;

/// Renders `node` as a MathML fragment.
#[must_use]
pub fn render_markup(node: &ExpressionNode) -> String {
    match node {
        ExpressionNode::Constant(c) => format!("<mn>{}</mn>\n", c.value),
        ExpressionNode::Variable(v) => format!("<mi>{}</mi>\n", v.name()),
        ExpressionNode::Operation(o) => o.op().render_markup(o.children()),
    }
}

/// Renders a child fragment, fencing it in parentheses when the child binds
/// more loosely than the parent.
#[must_use]
pub fn render_child(parent_precedence: u8, child: &ExpressionNode) -> String {
    let needs_fence = match child {
        ExpressionNode::Operation(o) => o.op().precedence() < parent_precedence,
        _ => false,
    };
    if needs_fence {
        format!(
            "<mrow>\n<mo>(</mo>\n{}<mo>)</mo>\n</mrow>\n",
            render_markup(child)
        )
    } else {
        render_markup(child)
    }
}
