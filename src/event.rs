//! The event queue of the sweep: site events, known in advance, merged with circle events, found
//! while sweeping.

use std::cmp::Ordering;

use crate::beachline::NodeIdx;
use crate::error::{Error, Result};
use crate::heap::Heap;
use crate::{Point, SiteId};

pub type CircleIdx = usize;

/// A scheduled collapse of an arc.
#[derive(Debug, Clone, Copy)]
pub struct CircleEvent {
    /// The arc that vanishes.
    pub arc: NodeIdx,
    /// The center of the circle through the sites of the arc and its two neighbors. This is where
    /// the new vertex is placed.
    pub center: Point,
    /// The lowest point of the circle. The event happens when the sweep line reaches it.
    pub y: f64,
    /// Cleared when the neighborhood of the arc changes before the event happens.
    pub valid: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Site(SiteId),
    Circle(CircleIdx),
}

#[derive(Debug, Clone, Copy)]
struct CircleKey {
    y: f64,
    x: f64,
    idx: CircleIdx,
}

fn circle_key_cmp(a: &CircleKey, b: &CircleKey) -> Ordering {
    a.y.total_cmp(&b.y)
        .then_with(|| a.x.total_cmp(&b.x))
        .then_with(|| a.idx.cmp(&b.idx))
}

/// Both sub-queues are ordered by `y`, then by `x`. When a site event and a circle event happen at
/// the same point, the site event comes first.
#[derive(Debug)]
pub struct EventQueue {
    /// Site ids, sorted by position.
    sites: Vec<SiteId>,
    next_site: usize,
    circles: Vec<CircleEvent>,
    heap: Heap<CircleKey, fn(&CircleKey, &CircleKey) -> Ordering>,
    skipped: usize,
}
impl EventQueue {
    /// Sort the sites into sweep order. Fails if two sites share the same position.
    pub fn new(positions: &[Point]) -> Result<Self> {
        let mut sites: Vec<SiteId> = (0..positions.len()).map(SiteId::from_index).collect();
        sites.sort_by(|a, b| positions[a.index()].cmp(&positions[b.index()]));

        if let Some(w) = sites
            .windows(2)
            .find(|w| positions[w[0].index()] == positions[w[1].index()])
        {
            return Err(Error::DuplicateSite {
                position: positions[w[0].index()],
            });
        }

        Ok(Self {
            sites,
            next_site: 0,
            circles: Vec::new(),
            heap: Heap::new(circle_key_cmp as fn(&CircleKey, &CircleKey) -> Ordering),
            skipped: 0,
        })
    }

    pub fn push_circle(&mut self, arc: NodeIdx, center: Point, y: f64) -> CircleIdx {
        let idx = self.circles.len();
        self.circles.push(CircleEvent {
            arc,
            center,
            y,
            valid: true,
        });
        self.heap.push(CircleKey {
            y,
            x: center.x,
            idx,
        });
        idx
    }

    /// Mark a circle event as stale. It stays in the heap, and is skipped when popped.
    pub fn invalidate(&mut self, idx: CircleIdx) {
        self.circles[idx].valid = false;
    }

    pub fn circle(&self, idx: CircleIdx) -> &CircleEvent {
        &self.circles[idx]
    }

    /// The number of stale circle events discarded so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Number of circle events ever scheduled.
    pub fn circles_scheduled(&self) -> usize {
        self.circles.len()
    }

    fn discard_stale(&mut self) {
        while let Some(top) = self.heap.peek() {
            if self.circles[top.idx].valid {
                break;
            }
            self.heap.pop();
            self.skipped += 1;
        }
    }

    /// The position of the next event, without removing it.
    #[cfg(test)]
    pub fn peek_y(&mut self, positions: &[Point]) -> Option<f64> {
        self.discard_stale();
        let site = self.sites.get(self.next_site).map(|s| positions[s.index()].y);
        let circle = self.heap.peek().map(|k| k.y);
        match (site, circle) {
            (Some(s), Some(c)) => Some(s.min(c)),
            (s, c) => s.or(c),
        }
    }

    pub fn pop(&mut self, positions: &[Point]) -> Option<Event> {
        self.discard_stale();

        let site = self.sites.get(self.next_site).copied();
        let circle = self.heap.peek().copied();

        let take_site = match (site, circle) {
            (None, None) => return None,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (Some(s), Some(c)) => {
                let p = positions[s.index()];
                p.y.total_cmp(&c.y).then_with(|| p.x.total_cmp(&c.x)) != Ordering::Greater
            }
        };

        if take_site {
            self.next_site += 1;
            site.map(Event::Site)
        } else {
            self.heap.pop();
            circle.map(|c| Event::Circle(c.idx))
        }
    }

    #[cfg(test)]
    pub fn is_empty(&mut self) -> bool {
        self.discard_stale();
        self.next_site == self.sites.len() && self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sites_in_sweep_order() {
        let positions = [
            Point::new(5.0, 2.0),
            Point::new(1.0, 2.0),
            Point::new(9.0, 0.0),
        ];
        let mut queue = EventQueue::new(&positions).unwrap();

        assert_eq!(queue.pop(&positions), Some(Event::Site(SiteId(2))));
        assert_eq!(queue.pop(&positions), Some(Event::Site(SiteId(1))));
        assert_eq!(queue.pop(&positions), Some(Event::Site(SiteId(0))));
        assert_eq!(queue.pop(&positions), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn duplicated_sites_are_rejected() {
        let positions = [
            Point::new(1.0, 1.0),
            Point::new(3.0, 0.0),
            Point::new(1.0, 1.0),
        ];

        let err = EventQueue::new(&positions).err();
        assert_eq!(
            err,
            Some(Error::DuplicateSite {
                position: Point::new(1.0, 1.0)
            })
        );
    }

    #[test]
    fn circles_merge_with_sites() {
        let positions = [Point::new(0.0, 0.0), Point::new(0.0, 4.0)];
        let mut queue = EventQueue::new(&positions).unwrap();

        assert_eq!(queue.pop(&positions), Some(Event::Site(SiteId(0))));

        let late = queue.push_circle(7, Point::new(1.0, 3.0), 5.0);
        let early = queue.push_circle(8, Point::new(1.0, 1.0), 2.0);
        let tie = queue.push_circle(9, Point::new(0.0, 2.0), 4.0);

        assert_eq!(queue.peek_y(&positions), Some(2.0));
        assert_eq!(queue.pop(&positions), Some(Event::Circle(early)));
        // same point as the site: the site goes first
        assert_eq!(queue.pop(&positions), Some(Event::Site(SiteId(1))));
        assert_eq!(queue.pop(&positions), Some(Event::Circle(tie)));
        assert_eq!(queue.pop(&positions), Some(Event::Circle(late)));
        assert_eq!(queue.pop(&positions), None);
    }

    #[test]
    fn stale_circles_are_skipped() {
        let positions = [Point::new(0.0, 0.0)];
        let mut queue = EventQueue::new(&positions).unwrap();
        queue.pop(&positions);

        let a = queue.push_circle(1, Point::new(0.0, 1.0), 1.0);
        let b = queue.push_circle(2, Point::new(0.0, 2.0), 2.0);
        queue.invalidate(a);

        assert_eq!(queue.pop(&positions), Some(Event::Circle(b)));
        assert_eq!(queue.skipped(), 1);
        assert_eq!(queue.circles_scheduled(), 2);
        assert!(queue.is_empty());
    }
}
