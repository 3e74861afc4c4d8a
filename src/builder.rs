//! The build session: validates the input, runs the sweep and drives the finishing pipeline.

use std::time::{Duration, Instant};

use crate::beachline::{BeachLine, EdgeIdx, NodeIdx};
use crate::diagram::{Edge, Site, Vertex, VertexId, Voronoi};
use crate::error::{Error, Result};
use crate::event::{CircleIdx, Event, EventQueue};
use crate::geometry::{breakpoint_direction, circle_through, parabola_y, Rect};
use crate::{Point, SiteId};

mod finish;

/// Tunables of a build session.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Tolerance of the geometric comparisons, relative to the largest side of the bounds.
    /// Collinearity is tested on the sine of the angle, against this value as is.
    pub epsilon: f64,
    /// How many items a finishing phase processes between two checks of its time budget.
    pub budget_check_interval: usize,
    /// Span under which the session logs. When `None`, a `voronoi_build` span is created.
    pub span: Option<tracing::Span>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-9,
            budget_check_interval: 32,
            span: None,
        }
    }
}

impl BuilderConfig {
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_budget_check_interval(mut self, interval: usize) -> Self {
        self.budget_check_interval = interval.max(1);
        self
    }

    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }
}

/// The phase a build session is in. Phases are run in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildState {
    Sweeping,
    ExtendingEdges,
    JoiningHalfEdges,
    ClippingEdges,
    CombiningVertices,
    CreatingLinks,
    SortingLists,
    CreatingBoundary,
    Done,
}
impl BuildState {
    pub fn next(self) -> Self {
        use BuildState::*;
        match self {
            Sweeping => ExtendingEdges,
            ExtendingEdges => JoiningHalfEdges,
            JoiningHalfEdges => ClippingEdges,
            ClippingEdges => CombiningVertices,
            CombiningVertices => CreatingLinks,
            CreatingLinks => SortingLists,
            SortingLists => CreatingBoundary,
            CreatingBoundary => Done,
            Done => Done,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// There is more work to do.
    Continue,
    /// The diagram is complete, and can be taken with [`VoronoiBuilder::finish`].
    Done,
}

/// Counters of the work done by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub site_events: usize,
    /// Circle events that produced a vertex.
    pub circle_events: usize,
    pub circle_events_scheduled: usize,
    /// Invalidated circle events discarded from the queue.
    pub circle_events_skipped: usize,
    pub vertices_created: usize,
    pub edges_created: usize,
}

/// An edge as traced by the sweep. Edges created by a generic site event come in twin pairs that
/// grow from the same start vertex in opposite directions.
#[derive(Debug, Clone)]
struct EdgeRecord {
    start: VertexId,
    end: Option<VertexId>,
    left: SiteId,
    right: SiteId,
    twin: Option<EdgeIdx>,
    dropped: bool,
}

/// A single Voronoi diagram build.
///
/// The session owns every intermediate structure of the sweep. It makes progress only when one of
/// its driving methods is called, so it can be interleaved with other work by the caller. If any
/// call returns an error, the session is unusable from then on.
pub struct VoronoiBuilder {
    bounds: Rect,
    /// Length tolerance, `epsilon` scaled to the size of the bounds.
    eps: f64,
    /// Sine of the smallest angle between three sites that are not collinear.
    collinear_eps: f64,
    check_interval: usize,
    span: tracing::Span,

    positions: Vec<Point>,
    queue: EventQueue,
    beach: BeachLine,
    sweep_y: f64,

    vertices: Vec<Vertex>,
    edges: Vec<EdgeRecord>,

    state: BuildState,
    /// Position of the current finishing phase in the items it walks.
    cursor: usize,
    /// Breakpoints still open when the sweep ended.
    open_breakpoints: Vec<NodeIdx>,
    sites: Vec<Site>,
    diagram_edges: Vec<Edge>,
    result: Option<Voronoi>,

    stats: BuildStats,
    failed: bool,
}

impl VoronoiBuilder {
    pub fn new(bounds: Rect, sites: &[Point]) -> Result<Self> {
        Self::with_config(bounds, sites, BuilderConfig::default())
    }

    pub fn with_config(bounds: Rect, sites: &[Point], config: BuilderConfig) -> Result<Self> {
        if !bounds.is_valid() {
            return Err(Error::InvalidBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        if sites.is_empty() {
            return Err(Error::NoSites);
        }
        for (index, &position) in sites.iter().enumerate() {
            if !position.is_finite() {
                return Err(Error::NonFiniteSite { index, position });
            }
            if !bounds.contains(position) {
                return Err(Error::SiteOutOfBounds { index, position });
            }
        }

        let queue = EventQueue::new(sites)?;
        let eps = config.epsilon * bounds.width().max(bounds.height());

        let span = config
            .span
            .unwrap_or_else(|| tracing::info_span!("voronoi_build", sites = sites.len()));
        span.in_scope(|| tracing::debug!(?bounds, sites = sites.len(), "starting sweep"));

        Ok(Self {
            bounds,
            eps,
            collinear_eps: config.epsilon,
            check_interval: config.budget_check_interval.max(1),
            span,
            positions: sites.to_vec(),
            queue,
            beach: BeachLine::new(eps),
            sweep_y: f64::NEG_INFINITY,
            vertices: Vec::new(),
            edges: Vec::new(),
            state: BuildState::Sweeping,
            cursor: 0,
            open_breakpoints: Vec::new(),
            sites: sites
                .iter()
                .enumerate()
                .map(|(i, &p)| Site::new(SiteId::from_index(i), p))
                .collect(),
            diagram_edges: Vec::new(),
            result: None,
            stats: BuildStats::default(),
            failed: false,
        })
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// The position of the sweep line. Negative infinity before the first event.
    pub fn sweep_y(&self) -> f64 {
        self.sweep_y
    }

    /// The site of each arc of the beach line, from left to right.
    pub fn beach_line_sites(&self) -> Vec<SiteId> {
        self.beach.sites().collect()
    }

    pub fn stats(&self) -> BuildStats {
        BuildStats {
            circle_events_scheduled: self.queue.circles_scheduled(),
            circle_events_skipped: self.queue.skipped(),
            ..self.stats
        }
    }

    /// Process a single event of the sweep, or run a whole finishing phase.
    pub fn process_next_event(&mut self) -> Result<Progress> {
        self.guarded(|this| this.step(None))
    }

    /// Make progress until `budget` is spent or the diagram is done.
    ///
    /// At least one event, or one batch of a finishing phase, is processed per call, even with a
    /// zero budget.
    pub fn step_for(&mut self, budget: Duration) -> Result<Progress> {
        // a budget too large to represent has no deadline
        let deadline = Instant::now().checked_add(budget);
        self.guarded(|this| loop {
            let progress = this.step(deadline)?;
            if progress == Progress::Done || deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(progress);
            }
        })
    }

    /// Run the session to completion and take the diagram.
    pub fn build(mut self) -> Result<Voronoi> {
        self.guarded(|this| {
            while this.step(None)? == Progress::Continue {}
            Ok(())
        })?;
        self.finish()
    }

    /// Take the finished diagram.
    pub fn finish(mut self) -> Result<Voronoi> {
        if self.failed {
            return Err(Error::SessionFailed);
        }
        self.result.take().ok_or(Error::NotFinished)
    }

    /// Run `f` inside the session span, and poison the session if it fails.
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.failed {
            return Err(Error::SessionFailed);
        }
        let span = self.span.clone();
        let _enter = span.enter();

        let result = f(self);
        if let Err(err) = &result {
            self.failed = true;
            tracing::error!(
                error = %err,
                state = ?self.state,
                sweep_y = self.sweep_y,
                "build session failed"
            );
        }
        result
    }

    fn step(&mut self, deadline: Option<Instant>) -> Result<Progress> {
        match self.state {
            BuildState::Sweeping => {
                match self.queue.pop(&self.positions) {
                    Some(Event::Site(site)) => self.site_event(site)?,
                    Some(Event::Circle(circle)) => self.circle_event(circle)?,
                    None => self.advance_state(),
                }
                Ok(Progress::Continue)
            }
            BuildState::Done => Ok(Progress::Done),
            _ => {
                if self.finish_step(deadline)? == Progress::Done {
                    self.advance_state();
                }
                if self.state == BuildState::Done {
                    Ok(Progress::Done)
                } else {
                    Ok(Progress::Continue)
                }
            }
        }
    }

    fn advance_state(&mut self) {
        let next = self.state.next();
        tracing::debug!(from = ?self.state, to = ?next, "phase finished");
        self.state = next;
        self.cursor = 0;
        if next == BuildState::Done {
            self.freeze();
        }
    }

    fn freeze(&mut self) {
        let stats = self.stats();
        tracing::info!(
            sites = self.sites.len(),
            vertices = self.vertices.len(),
            edges = self.diagram_edges.len(),
            site_events = stats.site_events,
            circle_events = stats.circle_events,
            circle_events_skipped = stats.circle_events_skipped,
            "voronoi diagram done"
        );
        self.result = Some(Voronoi::new(
            self.bounds,
            std::mem::take(&mut self.sites),
            std::mem::take(&mut self.vertices),
            std::mem::take(&mut self.diagram_edges),
        ));
    }

    /// Move the sweep line to `y`. It never moves backwards by more than the tolerance.
    fn advance_sweep(&mut self, y: f64) -> Result<()> {
        if y < self.sweep_y - self.eps {
            return Err(Error::EventOutOfOrder {
                event_y: y,
                sweep_y: self.sweep_y,
            });
        }
        self.sweep_y = self.sweep_y.max(y);
        Ok(())
    }

    fn push_vertex(&mut self, position: Point, is_boundary: bool) -> VertexId {
        let id = VertexId::from_index(self.vertices.len());
        self.vertices.push(Vertex::new(position, is_boundary));
        self.stats.vertices_created += 1;
        id
    }

    /// Start the edge traced by `bp`, from `start`.
    fn start_edge(&mut self, bp: NodeIdx, start: VertexId) -> Result<EdgeIdx> {
        let idx = self.edges.len();
        self.beach.set_edge(bp, idx)?;
        let (left, right) = self.beach.breakpoint_sites(bp);
        self.edges.push(EdgeRecord {
            start,
            end: None,
            left,
            right,
            twin: None,
            dropped: false,
        });
        self.stats.edges_created += 1;
        Ok(idx)
    }

    fn site_event(&mut self, site: SiteId) -> Result<()> {
        let p = self.positions[site.index()];
        self.advance_sweep(p.y)?;
        self.stats.site_events += 1;
        tracing::trace!(site = site.0, position = ?p, "site event");

        let Some(arc) = self.beach.arc_under(p.x, &self.positions, self.sweep_y) else {
            self.beach.init(site);
            return Ok(());
        };

        if let Some(circle) = self.beach.arc_mut(arc).circle.take() {
            self.queue.invalidate(circle);
        }

        let old_site = self.beach.arc(arc).site;
        let old = self.positions[old_site.index()];

        if (p.y - old.y).abs() <= self.eps {
            let (bp, new_arc) = self.beach.split_degenerate(arc, site, &self.positions)?;

            let position = self.beach.position(bp, &self.positions, self.sweep_y);
            let start = if position.is_finite() && self.bounds.contains(position) {
                self.push_vertex(position, false)
            } else {
                let (left, right) = self.beach.breakpoint_sites(bp);
                let position = self.bisector_at_bottom(
                    self.positions[left.index()],
                    self.positions[right.index()],
                );
                self.push_vertex(position, true)
            };
            self.start_edge(bp, start)?;

            if let Some(left) = self.beach.left_neighbor(new_arc) {
                self.check_circle(left)?;
            }
            if let Some(right) = self.beach.right_neighbor(new_arc) {
                self.check_circle(right)?;
            }
        } else {
            let split = self.beach.split(arc, site, &self.positions)?;

            let start = Point::new(p.x, parabola_y(old, self.sweep_y, p.x));
            let start = self.push_vertex(start, false);
            let a = self.start_edge(split.left_breakpoint, start)?;
            let b = self.start_edge(split.right_breakpoint, start)?;
            self.edges[a].twin = Some(b);
            self.edges[b].twin = Some(a);

            self.check_circle(split.left)?;
            self.check_circle(split.right)?;
        }

        Ok(())
    }

    /// The point where the bisector of `left` and `right` crosses the bottom side of the bounds.
    fn bisector_at_bottom(&self, left: Point, right: Point) -> Point {
        let mid = left.midpoint(right);
        let dir = breakpoint_direction(left, right);
        if dir.y.abs() <= self.eps {
            return Point::new(mid.x, self.bounds.min.y);
        }
        let t = (self.bounds.min.y - mid.y) / dir.y;
        Point::new(mid.x + dir.x * t, self.bounds.min.y)
    }

    fn circle_event(&mut self, circle: CircleIdx) -> Result<()> {
        let event = *self.queue.circle(circle);
        self.advance_sweep(event.y)?;
        self.stats.circle_events += 1;

        let arc = event.arc;
        tracing::trace!(
            site = self.beach.arc(arc).site.0,
            center = ?event.center,
            y = event.y,
            "circle event"
        );
        self.beach.arc_mut(arc).circle = None;

        let missing = Error::MissingNeighbor { arc };
        let left_bp = self.beach.prev(arc).ok_or(missing.clone())?;
        let right_bp = self.beach.next(arc).ok_or(missing)?;

        let vertex = self.push_vertex(event.center, false);
        for bp in [left_bp, right_bp] {
            let edge = self
                .beach
                .take_edge(bp)
                .ok_or(Error::MissingEdge { breakpoint: bp })?;
            self.edges[edge].end = Some(vertex);
        }

        let removal = self.beach.remove_arc(arc)?;
        self.start_edge(removal.breakpoint, vertex)?;

        self.check_circle(removal.left_arc)?;
        self.check_circle(removal.right_arc)?;

        Ok(())
    }

    /// Schedule the circle event of `arc`, replacing the one it had, if its breakpoints
    /// converge.
    fn check_circle(&mut self, arc: NodeIdx) -> Result<()> {
        if let Some(old) = self.beach.arc_mut(arc).circle.take() {
            self.queue.invalidate(old);
        }

        let (Some(left_bp), Some(right_bp)) = (self.beach.prev(arc), self.beach.next(arc)) else {
            return Ok(());
        };
        let (left, mid) = self.beach.breakpoint_sites(left_bp);
        let (_, right) = self.beach.breakpoint_sites(right_bp);
        if left == right {
            return Ok(());
        }

        let a = self.positions[left.index()];
        let b = self.positions[mid.index()];
        let c = self.positions[right.index()];

        // The breakpoints approach each other only if the right one moves to the left of the
        // left one, along the line between the outer sites.
        let v = c - a;
        let dl = self.beach.direction(left_bp, &self.positions);
        let dr = self.beach.direction(right_bp, &self.positions);
        if dr.dot(v) >= dl.dot(v) {
            return Ok(());
        }

        let Some((center, radius)) = circle_through(a, b, c, self.collinear_eps) else {
            return Ok(());
        };

        let mut y = center.y + radius;
        if y < self.sweep_y - self.eps {
            return Err(Error::EventOutOfOrder {
                event_y: y,
                sweep_y: self.sweep_y,
            });
        }
        if y < self.sweep_y {
            y = self.sweep_y;
        }

        let idx = self.queue.push_circle(arc, center, y);
        self.beach.arc_mut(arc).circle = Some(idx);
        tracing::trace!(left = left.0, mid = mid.0, right = right.0, y, "circle scheduled");

        Ok(())
    }
}

impl std::fmt::Debug for VoronoiBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoronoiBuilder")
            .field("state", &self.state)
            .field("sweep_y", &self.sweep_y)
            .field("beach", &self.beach)
            .field("queue", &self.queue)
            .field("failed", &self.failed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Rect {
        Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0))
    }

    #[test]
    fn invalid_input() {
        let p = Point::new(1.0, 1.0);

        assert_eq!(VoronoiBuilder::new(bounds(), &[]).err(), Some(Error::NoSites));

        let flat = Rect::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        assert_eq!(
            VoronoiBuilder::new(flat, &[p]).err(),
            Some(Error::InvalidBounds {
                min: flat.min,
                max: flat.max
            })
        );

        let nan = Point::new(f64::NAN, 1.0);
        assert!(matches!(
            VoronoiBuilder::new(bounds(), &[p, nan]).err(),
            Some(Error::NonFiniteSite { index: 1, .. })
        ));

        let outside = Point::new(11.0, 1.0);
        assert_eq!(
            VoronoiBuilder::new(bounds(), &[outside, p]).err(),
            Some(Error::SiteOutOfBounds {
                index: 0,
                position: outside
            })
        );

        assert_eq!(
            VoronoiBuilder::new(bounds(), &[p, Point::new(2.0, 2.0), p]).err(),
            Some(Error::DuplicateSite { position: p })
        );
    }

    #[test]
    fn phases_run_in_order() {
        let mut state = BuildState::Sweeping;
        let mut states = vec![state];
        while state != BuildState::Done {
            state = state.next();
            states.push(state);
        }
        assert_eq!(states.len(), 9);
        assert!(states.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(BuildState::Done.next(), BuildState::Done);
    }

    #[test]
    fn not_finished() {
        let mut builder = VoronoiBuilder::new(bounds(), &[Point::new(1.0, 1.0)]).unwrap();
        builder.process_next_event().unwrap();
        assert_eq!(builder.finish().err(), Some(Error::NotFinished));
    }

    #[test]
    fn one_phase_per_call() {
        let sites = [Point::new(2.0, 2.0), Point::new(8.0, 3.0), Point::new(4.0, 7.0)];
        let mut builder = VoronoiBuilder::new(bounds(), &sites).unwrap();
        while builder.state() == BuildState::Sweeping {
            builder.process_next_event().unwrap();
        }

        let mut state = builder.state();
        while builder.process_next_event().unwrap() == Progress::Continue {
            assert_eq!(builder.state(), state.next());
            state = builder.state();
        }
        assert_eq!(builder.state(), BuildState::Done);
        assert_eq!(builder.process_next_event(), Ok(Progress::Done));
        assert_eq!(builder.finish().map(|v| v.sites().len()), Ok(3));
    }

    #[test]
    fn failed_session_stays_failed() {
        let sites = [Point::new(2.0, 2.0), Point::new(8.0, 3.0)];
        let mut builder = VoronoiBuilder::new(bounds(), &sites).unwrap();
        builder.process_next_event().unwrap();

        // pretend the sweep already went past the next site
        builder.sweep_y = 5.0;
        assert_eq!(
            builder.process_next_event(),
            Err(Error::EventOutOfOrder {
                event_y: 3.0,
                sweep_y: 5.0
            })
        );

        assert_eq!(builder.process_next_event(), Err(Error::SessionFailed));
        assert_eq!(
            builder.step_for(Duration::from_secs(1)),
            Err(Error::SessionFailed)
        );
        assert_eq!(builder.finish().err(), Some(Error::SessionFailed));
    }

    #[test]
    fn unbounded_budget() {
        let sites = [Point::new(2.0, 2.0), Point::new(8.0, 3.0), Point::new(4.0, 7.0)];
        let mut builder = VoronoiBuilder::new(bounds(), &sites).unwrap();

        assert_eq!(builder.step_for(Duration::MAX), Ok(Progress::Done));
        assert_eq!(builder.state(), BuildState::Done);
        assert_eq!(builder.finish().map(|v| v.internal_edges().count()), Ok(3));
    }

    #[test]
    fn circle_event_without_edge() {
        let sites = [Point::new(1.0, 0.0), Point::new(0.0, 1.0), Point::new(1.0, 1.0)];
        let bounds = Rect::new(Point::new(-1.0, -1.0), Point::new(3.0, 3.0));
        let mut builder = VoronoiBuilder::new(bounds, &sites).unwrap();
        for _ in 0..sites.len() {
            builder.process_next_event().unwrap();
        }

        // the arc between sites 1 and 2 is about to vanish
        let breakpoints: Vec<NodeIdx> = builder.beach.breakpoints().collect();
        assert_eq!(breakpoints.len(), 4);
        assert_eq!(
            builder.beach.breakpoint_sites(breakpoints[1]),
            (SiteId(1), SiteId(0))
        );
        builder.beach.take_edge(breakpoints[1]);

        assert_eq!(
            builder.process_next_event(),
            Err(Error::MissingEdge {
                breakpoint: breakpoints[1]
            })
        );
        assert_eq!(builder.process_next_event(), Err(Error::SessionFailed));
    }

    #[test]
    fn debug_shows_the_queue() {
        let sites = [Point::new(2.0, 2.0), Point::new(8.0, 3.0)];
        let mut builder = VoronoiBuilder::new(bounds(), &sites).unwrap();
        builder.process_next_event().unwrap();

        let debug = format!("{:?}", builder);
        assert!(debug.contains("queue: EventQueue"), "{}", debug);
        assert!(debug.contains("BeachLine(0)"), "{}", debug);
    }

    #[test]
    fn caller_span() {
        let span = tracing::info_span!("caller");
        let config = BuilderConfig::default()
            .with_span(span)
            .with_epsilon(1e-6)
            .with_budget_check_interval(0);
        assert_eq!(config.budget_check_interval, 1);

        let voronoi = VoronoiBuilder::with_config(bounds(), &[Point::new(5.0, 5.0)], config)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(voronoi.boundary_edges().count(), 4);
    }
}
