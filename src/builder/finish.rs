//! The phases that run after the sweep, turning the traced edges into a closed diagram.
//!
//! Every phase walks a list with `cursor`, and yields when its deadline has passed, checking it
//! once every `check_interval` items. A phase resumes where it stopped on the next call.

use std::cmp::Ordering;
use std::time::Instant;

use super::{BuildState, Progress, VoronoiBuilder};
use crate::diagram::{Edge, EdgeId, Vertex, VertexId};
use crate::error::Result;
use crate::{vec2_angle_cmp, Point, SiteId};

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

/// Polar angle order, with the zero vector first.
fn angle_cmp(a: Point, b: Point) -> Ordering {
    let is_zero = |p: Point| p.x == 0.0 && p.y == 0.0;
    is_zero(b)
        .cmp(&is_zero(a))
        .then_with(|| vec2_angle_cmp(a, b))
}

fn edge_midpoint(vertices: &[Vertex], edge: &Edge) -> Point {
    let [a, b] = edge.vertices;
    vertices[a.index()]
        .position
        .midpoint(vertices[b.index()].position)
}

impl VoronoiBuilder {
    pub(super) fn finish_step(&mut self, deadline: Option<Instant>) -> Result<Progress> {
        match self.state {
            BuildState::ExtendingEdges => Ok(self.extend_edges(deadline)),
            BuildState::JoiningHalfEdges => Ok(self.join_half_edges(deadline)),
            BuildState::ClippingEdges => Ok(self.clip_edges(deadline)),
            BuildState::CombiningVertices => {
                // TODO: merge vertices closer than a tolerance much smaller than the distance
                // between any two sites. A large tolerance chains merges.
                tracing::debug!("vertex merging is disabled");
                Ok(Progress::Done)
            }
            BuildState::CreatingLinks => Ok(self.create_links(deadline)),
            BuildState::SortingLists => Ok(self.sort_lists(deadline)),
            BuildState::CreatingBoundary => Ok(self.create_boundary(deadline)),
            BuildState::Sweeping | BuildState::Done => Ok(Progress::Done),
        }
    }

    /// Advance the cursor past one item, and tell if the phase must yield.
    fn tick(&mut self, processed: &mut usize, deadline: Option<Instant>) -> bool {
        self.cursor += 1;
        *processed += 1;
        *processed % self.check_interval == 0 && deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Finish the edges of the breakpoints left on the beach line, where they leave the bounds.
    fn extend_edges(&mut self, deadline: Option<Instant>) -> Progress {
        if self.cursor == 0 {
            self.open_breakpoints = self.beach.breakpoints().collect();
        }

        let mut processed = 0;
        while let Some(&bp) = self.open_breakpoints.get(self.cursor) {
            if let Some(edge) = self.beach.take_edge(bp) {
                let start = self.vertices[self.edges[edge].start.index()].position;
                let dir = self.beach.direction(bp, &self.positions);

                let end = match self.bounds.ray_exit(start, dir) {
                    Some(exit) => self.push_vertex(exit, true),
                    None => {
                        // never crosses the bounds, clipping will drop it
                        let last = self.beach.position(bp, &self.positions, self.sweep_y);
                        let end = if last.is_finite() { last } else { start };
                        self.push_vertex(end, false)
                    }
                };
                self.edges[edge].end = Some(end);
            }

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }

    /// Merge each twin pair `v -> a`, `v -> b` into the single edge `b -> a`.
    fn join_half_edges(&mut self, deadline: Option<Instant>) -> Progress {
        let mut processed = 0;
        while self.cursor < self.edges.len() {
            let idx = self.cursor;
            if let Some(twin) = self.edges[idx].twin {
                if idx < twin {
                    if let Some(far) = self.edges[twin].end {
                        self.edges[idx].start = far;
                        self.edges[twin].dropped = true;
                    }
                }
            }

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }

    fn clip_edges(&mut self, deadline: Option<Instant>) -> Progress {
        let mut processed = 0;
        while self.cursor < self.edges.len() {
            let idx = self.cursor;
            if !self.edges[idx].dropped {
                self.clip_edge(idx);
            }

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }

    fn clip_edge(&mut self, idx: usize) {
        let Some(end) = self.edges[idx].end else {
            self.edges[idx].dropped = true;
            return;
        };
        let a = self.vertices[self.edges[idx].start.index()].position;
        let b = self.vertices[end.index()].position;

        let Some((t0, t1)) = self.bounds.clip_segment(a, b) else {
            tracing::trace!(edge = idx, "edge outside of the bounds");
            self.edges[idx].dropped = true;
            return;
        };

        let d = b - a;
        let p0 = a + d * t0;
        let p1 = a + d * t1;
        if p0.distance(p1) <= self.eps {
            self.edges[idx].dropped = true;
            return;
        }

        if t0 > 0.0 {
            self.edges[idx].start = self.push_vertex(p0, true);
        }
        if t1 < 1.0 {
            self.edges[idx].end = Some(self.push_vertex(p1, true));
        }
    }

    /// Keep only the vertices used by some edge, and move the surviving edges to the diagram.
    fn compact(&mut self) {
        let old = std::mem::take(&mut self.vertices);
        let mut remap: Vec<Option<VertexId>> = vec![None; old.len()];
        let mut vertices = Vec::new();

        let mut keep = |id: VertexId| -> VertexId {
            *remap[id.index()].get_or_insert_with(|| {
                vertices.push(old[id.index()].clone());
                VertexId::from_index(vertices.len() - 1)
            })
        };

        let mut edges = Vec::new();
        for record in self.edges.iter().filter(|e| !e.dropped) {
            let Some(end) = record.end else { continue };
            edges.push(Edge {
                vertices: [keep(record.start), keep(end)],
                left: record.left,
                right: Some(record.right),
            });
        }

        tracing::debug!(
            vertices = vertices.len(),
            discarded = old.len() - vertices.len(),
            edges = edges.len(),
            "compacted diagram"
        );

        self.vertices = vertices;
        self.diagram_edges = edges;
        self.edges.clear();
    }

    fn create_links(&mut self, deadline: Option<Instant>) -> Progress {
        if self.cursor == 0 {
            self.compact();
        }

        let mut processed = 0;
        while let Some(&edge) = self.diagram_edges.get(self.cursor) {
            let id = EdgeId::from_index(self.cursor);
            for v in edge.vertices {
                let vertex = &mut self.vertices[v.index()];
                vertex.edges.push(id);
                for site in edge.sites() {
                    push_unique(&mut vertex.sites, site);
                }
            }
            for site in edge.sites() {
                let site = &mut self.sites[site.index()];
                site.edges.push(id);
                for v in edge.vertices {
                    push_unique(&mut site.vertices, v);
                }
            }

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }

    /// Sort the vertices and edges of a site counter-clockwise around it.
    fn sort_site(&mut self, idx: usize) {
        let site = &mut self.sites[idx];
        let center = site.position;
        let vertices = &self.vertices;
        let edges = &self.diagram_edges;

        site.vertices.sort_by(|a, b| {
            angle_cmp(
                vertices[a.index()].position - center,
                vertices[b.index()].position - center,
            )
        });
        site.edges.sort_by(|a, b| {
            angle_cmp(
                edge_midpoint(vertices, &edges[a.index()]) - center,
                edge_midpoint(vertices, &edges[b.index()]) - center,
            )
        });
    }

    fn sort_lists(&mut self, deadline: Option<Instant>) -> Progress {
        let mut processed = 0;
        while self.cursor < self.sites.len() {
            self.sort_site(self.cursor);

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }

    /// Give each corner of the bounds to the site closest to it.
    fn assign_corners(&mut self) {
        for corner in self.bounds.corners() {
            let mut nearest = 0;
            let mut best = f64::INFINITY;
            for (i, site) in self.sites.iter().enumerate() {
                let d = site.position.distance(corner);
                if d < best {
                    best = d;
                    nearest = i;
                }
            }

            let has_corner = self.sites[nearest]
                .vertices
                .iter()
                .any(|v| self.vertices[v.index()].position.distance(corner) <= self.eps);
            if has_corner {
                continue;
            }

            let v = self.push_vertex(corner, true);
            self.vertices[v.index()].sites.push(SiteId::from_index(nearest));
            self.sites[nearest].vertices.push(v);
        }
    }

    /// Join the consecutive vertices of a cell that lie on the bounds, and are not joined yet.
    fn close_cell(&mut self, idx: usize) {
        self.sort_site(idx);

        let site_id = SiteId::from_index(idx);
        let cell = self.sites[idx].vertices.clone();
        if cell.len() < 3 {
            return;
        }

        for (i, &a) in cell.iter().enumerate() {
            let b = cell[(i + 1) % cell.len()];
            let on_border = |v: VertexId| {
                self.bounds
                    .on_border(self.vertices[v.index()].position, self.eps)
            };
            if !on_border(a) || !on_border(b) {
                continue;
            }

            let joined = self.sites[idx].edges.iter().any(|e| {
                let e = &self.diagram_edges[e.index()];
                e.vertices.contains(&a) && e.vertices.contains(&b)
            });
            if joined {
                continue;
            }

            let id = EdgeId::from_index(self.diagram_edges.len());
            self.diagram_edges.push(Edge {
                vertices: [a, b],
                left: site_id,
                right: None,
            });
            self.stats.edges_created += 1;
            self.sites[idx].edges.push(id);
            for v in [a, b] {
                let vertex = &mut self.vertices[v.index()];
                vertex.edges.push(id);
                push_unique(&mut vertex.sites, site_id);
            }
        }

        self.sort_site(idx);
    }

    fn create_boundary(&mut self, deadline: Option<Instant>) -> Progress {
        if self.cursor == 0 {
            self.assign_corners();
        }

        let mut processed = 0;
        while self.cursor < self.sites.len() {
            self.close_cell(self.cursor);

            if self.tick(&mut processed, deadline) {
                return Progress::Continue;
            }
        }

        Progress::Done
    }
}
