//! Human-readable view of a step DAG.

use std::collections::HashSet;
use std::fmt::Write as _;

use cubedag_core::filter::Filter;
use cubedag_core::id::StepId;
use cubedag_core::step::GroupBy;

use crate::dag::StepsDag;

/// What `walk` reports per vertex.
#[derive(Debug, Clone, Copy)]
pub struct VertexView<'a> {
    pub id: StepId,
    pub measure: &'a str,
    pub kind: &'a str,
    pub recombinator: &'a str,
    pub filter: &'a Filter,
    pub group_by: &'a GroupBy,
    pub underlyings: &'a [StepId],
    pub cached: bool,
}

pub trait DagVisitor {
    /// Called once per reached edge target. `first` is false when the vertex
    /// was already reported elsewhere; its underlyings are not walked again.
    fn visit(&mut self, depth: usize, vertex: VertexView<'_>, first: bool);
}

impl<F> DagVisitor for F
where
    F: FnMut(usize, VertexView<'_>, bool),
{
    fn visit(&mut self, depth: usize, vertex: VertexView<'_>, first: bool) {
        self(depth, vertex, first)
    }
}

/// Depth-first from each root, underlyings in declaration order.
pub fn walk<V: DagVisitor + ?Sized>(dag: &StepsDag, visitor: &mut V) {
    let mut seen = HashSet::new();
    for root in dag.roots() {
        walk_from(dag, *root, 0, &mut seen, visitor);
    }
}

fn walk_from<V: DagVisitor + ?Sized>(
    dag: &StepsDag,
    id: StepId,
    depth: usize,
    seen: &mut HashSet<StepId>,
    visitor: &mut V,
) {
    let vertex = dag.vertex(id);
    let first = seen.insert(id);
    let recombinator = match &vertex.evaluation {
        crate::dag::Evaluation::Cached(_) => "cached",
        crate::dag::Evaluation::Recombine(r) => r.kind(),
    };
    visitor.visit(
        depth,
        VertexView {
            id,
            measure: &vertex.step.measure,
            kind: vertex.kind,
            recombinator,
            filter: &vertex.step.filter,
            group_by: &vertex.step.group_by,
            underlyings: &vertex.underlyings,
            cached: vertex.is_cached(),
        },
        first,
    );
    if first {
        for u in &vertex.underlyings {
            walk_from(dag, *u, depth + 1, seen, visitor);
        }
    }
}

/// One line per reached vertex, indented by depth. A shared vertex is drawn
/// in full the first time and back-referenced afterwards.
pub fn render(dag: &StepsDag) -> String {
    let mut renderer = Renderer::default();
    walk(dag, &mut renderer);
    renderer.out
}

#[derive(Default)]
struct Renderer {
    out: String,
}

impl DagVisitor for Renderer {
    fn visit(&mut self, depth: usize, v: VertexView<'_>, first: bool) {
        let indent = "  ".repeat(depth);
        if !first {
            let _ = writeln!(self.out, "{indent}{} {} (see above)", v.id, v.measure);
            return;
        }
        let _ = write!(
            self.out,
            "{indent}{} {} [{}] filter={} groupBy={}",
            v.id, v.measure, v.kind, v.filter, v.group_by
        );
        if v.cached {
            self.out.push_str(" (cached)");
        }
        self.out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::DagBuilder;
    use cubedag_core::measure::{Measure, MeasureForest};
    use cubedag_core::step::QueryStep;
    use cubedag_operators::Registry;

    #[test]
    fn shared_vertex_is_drawn_once() {
        let forest = MeasureForest::new("t")
            .with(Measure::sum("a"))
            .with(Measure::combinator("double_a", ["a", "a"], "SUM"));
        let reg = Registry::new();
        let dag = DagBuilder::new(&forest, &reg)
            .build(&[QueryStep::new("double_a")])
            .unwrap();

        let text = render(&dag);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("#1 double_a [combinator]"));
        assert!(lines[1].starts_with("  #0 a [aggregator]"));
        assert_eq!(lines[2], "  #0 a (see above)");
    }
}
