//! Hierarchy pass: raw indentation widths to nesting depths.
//!
//! Depth is the height of an indent stack seeded with `[0]`, minus one. Wider
//! lines push their width, narrower lines pop every wider entry. A dedent that
//! lands between two pushed widths is accepted and reported in
//! [`HierarchyReport::misaligned_dedents`] so strict callers can surface it.

use crate::lexer::Token;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HierarchyReport {
    /// Line numbers whose dedent width was never pushed.
    pub misaligned_dedents: Vec<usize>,
}

pub fn assign_depths(tokens: &mut [Token]) -> HierarchyReport {
    let mut stack: Vec<usize> = vec![0];
    let mut report = HierarchyReport::default();

    for token in tokens.iter_mut() {
        let width = token.raw_indent_width;
        let top = *stack.last().unwrap_or(&0);

        if width > top {
            stack.push(width);
        } else if width < top {
            while stack.len() > 1 && stack[stack.len() - 1] > width {
                stack.pop();
            }
            if stack.last().copied() != Some(width) {
                report.misaligned_dedents.push(token.line_number);
            }
        }

        token.depth = stack.len() - 1;
    }

    report
}
