//! The finished diagram: sites, vertices and edges, linked to each other by id.

use std::collections::HashMap;

use crate::geometry::Rect;
use crate::Point;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            #[inline]
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }
    };
}

id_type!(
    /// The id of a site. Sites are numbered in input order, starting at 0.
    SiteId
);
id_type!(VertexId);
id_type!(EdgeId);

/// One of the input points, and the owner of one cell of the diagram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Site {
    pub id: SiteId,
    pub position: Point,
    /// The vertices of the cell, counter-clockwise around the site.
    pub vertices: Vec<VertexId>,
    /// The edges of the cell, counter-clockwise around the site.
    pub edges: Vec<EdgeId>,
}
impl Site {
    pub(crate) fn new(id: SiteId, position: Point) -> Self {
        Self {
            id,
            position,
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }
}

/// A corner of one or more cells.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vertex {
    pub position: Point,
    /// True if the vertex was created by clipping or closing cells against the bounds, instead of
    /// by three arcs meeting during the sweep.
    pub is_boundary: bool,
    pub edges: Vec<EdgeId>,
    pub sites: Vec<SiteId>,
}
impl Vertex {
    pub(crate) fn new(position: Point, is_boundary: bool) -> Self {
        Self {
            position,
            is_boundary,
            edges: Vec::new(),
            sites: Vec::new(),
        }
    }
}

/// A straight edge between two vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub vertices: [VertexId; 2],
    pub left: SiteId,
    /// The site on the other side of the edge, or `None` if the edge lies on the bounds.
    pub right: Option<SiteId>,
}
impl Edge {
    pub fn is_boundary(&self) -> bool {
        self.right.is_none()
    }

    pub fn sites(&self) -> impl Iterator<Item = SiteId> {
        std::iter::once(self.left).chain(self.right)
    }

    /// The site on the other side of the edge, as seen from `site`.
    pub fn other_site(&self, site: SiteId) -> Option<SiteId> {
        if self.left == site {
            self.right
        } else if self.right == Some(site) {
            Some(self.left)
        } else {
            None
        }
    }
}

/// An immutable Voronoi diagram, produced by a finished
/// [`VoronoiBuilder`](crate::VoronoiBuilder).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Voronoi {
    bounds: Rect,
    sites: Vec<Site>,
    #[cfg_attr(feature = "serde", serde(skip))]
    site_index: HashMap<Point, SiteId>,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
}
impl Voronoi {
    pub(crate) fn new(
        bounds: Rect,
        sites: Vec<Site>,
        vertices: Vec<Vertex>,
        edges: Vec<Edge>,
    ) -> Self {
        let site_index = sites.iter().map(|s| (s.position, s.id)).collect();
        Self {
            bounds,
            sites,
            site_index,
            vertices,
            edges,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// All sites, indexed by [`SiteId`].
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn site(&self, id: SiteId) -> &Site {
        &self.sites[id.index()]
    }

    /// The site at exactly the given input position.
    pub fn site_at(&self, position: Point) -> Option<&Site> {
        self.site_index.get(&position).map(|id| self.site(*id))
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn vertex(&self, id: VertexId) -> &Vertex {
        &self.vertices[id.index()]
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    /// Edges shared by two cells.
    pub fn internal_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| !e.is_boundary())
    }

    /// Edges that lie on the bounds.
    pub fn boundary_edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(|e| e.is_boundary())
    }

    /// The vertex positions of the cell of `site`, counter-clockwise.
    pub fn cell_polygon(&self, site: SiteId) -> Vec<Point> {
        self.site(site)
            .vertices
            .iter()
            .map(|v| self.vertex(*v).position)
            .collect()
    }
}
