//! Geometry kernel: parabolas with the sweep line as directrix, circles through three sites, and
//! clipping against the bounding rectangle.
//!
//! Everything here is a pure function of its arguments.

use crate::Point;

/// An axis aligned rectangle, `min` being the corner with the smallest coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}
impl Rect {
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// A rectangle is valid if it is finite and has a positive area.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite()
            && self.max.is_finite()
            && self.min.x < self.max.x
            && self.min.y < self.max.y
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// Check if the point is inside the rectangle, borders included.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Check if the point lies on one of the sides of the rectangle, within `eps`.
    pub fn on_border(&self, p: Point, eps: f64) -> bool {
        let inside = p.x >= self.min.x - eps
            && p.x <= self.max.x + eps
            && p.y >= self.min.y - eps
            && p.y <= self.max.y + eps;

        inside
            && ((p.x - self.min.x).abs() <= eps
                || (p.x - self.max.x).abs() <= eps
                || (p.y - self.min.y).abs() <= eps
                || (p.y - self.max.y).abs() <= eps)
    }

    /// The four corners, in increasing polar angle around the center.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.max.x, self.max.y),
            Point::new(self.min.x, self.max.y),
            Point::new(self.min.x, self.min.y),
            Point::new(self.max.x, self.min.y),
        ]
    }

    /// The point where the ray `origin + t * dir`, `t > 0`, leaves the rectangle.
    ///
    /// Returns `None` if the ray never crosses the rectangle. The origin may lie outside of it.
    pub fn ray_exit(&self, origin: Point, dir: Point) -> Option<Point> {
        if dir.x == 0.0 && dir.y == 0.0 {
            return None;
        }

        let mut t_enter = f64::NEG_INFINITY;
        let mut t_exit = f64::INFINITY;

        for (o, d, min, max) in [
            (origin.x, dir.x, self.min.x, self.max.x),
            (origin.y, dir.y, self.min.y, self.max.y),
        ] {
            if d == 0.0 {
                if o < min || o > max {
                    return None;
                }
                continue;
            }
            let t1 = (min - o) / d;
            let t2 = (max - o) / d;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }

        if t_exit <= 0.0 || t_exit < t_enter {
            return None;
        }

        Some(origin + dir * t_exit)
    }

    /// Clip the segment `a`-`b` against the rectangle (Liang–Barsky).
    ///
    /// Returns the parameter range `(t0, t1)` of the part inside the rectangle, where `t = 0` is
    /// `a` and `t = 1` is `b`, or `None` if the segment lies outside.
    pub fn clip_segment(&self, a: Point, b: Point) -> Option<(f64, f64)> {
        let d = b - a;
        let mut t0 = 0.0;
        let mut t1 = 1.0;

        for (p, q) in [
            (-d.x, a.x - self.min.x),
            (d.x, self.max.x - a.x),
            (-d.y, a.y - self.min.y),
            (d.y, self.max.y - a.y),
        ] {
            if p == 0.0 {
                if q < 0.0 {
                    return None;
                }
                continue;
            }

            let r = q / p;
            if p < 0.0 {
                if r > t1 {
                    return None;
                }
                if r > t0 {
                    t0 = r;
                }
            } else {
                if r < t0 {
                    return None;
                }
                if r < t1 {
                    t1 = r;
                }
            }
        }

        Some((t0, t1))
    }
}

/// The y value at `x` of the parabola with the given focus, and the horizontal line at
/// `directrix` as directrix.
///
/// The focus must not lie on the directrix.
pub fn parabola_y(focus: Point, directrix: f64, x: f64) -> f64 {
    let dx = x - focus.x;
    dx * dx / (2.0 * (focus.y - directrix)) + (focus.y + directrix) / 2.0
}

/// The intersection of the parabolas of `left` and `right` that has the arc of `left` to its left
/// and the arc of `right` to its right.
///
/// A focus on the directrix degenerates to a vertical line. If both foci lie on the directrix,
/// the intersection is infinitely far up, and its `y` is `-∞`. Foci at the same height (within
/// `eps`) intersect once, at their midpoint.
pub fn parabola_intersection(left: Point, right: Point, directrix: f64, eps: f64) -> Point {
    let left_flat = (directrix - left.y).abs() <= eps;
    let right_flat = (directrix - right.y).abs() <= eps;

    if (left.y - right.y).abs() <= eps {
        let x = (left.x + right.x) / 2.0;
        if left_flat {
            return Point::new(x, f64::NEG_INFINITY);
        }
        return Point::new(x, parabola_y(left, directrix, x));
    }

    if left_flat {
        return Point::new(left.x, parabola_y(right, directrix, left.x));
    }
    if right_flat {
        return Point::new(right.x, parabola_y(left, directrix, right.x));
    }

    // y_left(x) - y_right(x) = a x² + b x + c. It is positive to the left of the intersection we
    // want, so we pick the root where it is decreasing.
    let z0 = 2.0 * (left.y - directrix);
    let z1 = 2.0 * (right.y - directrix);

    let a = 1.0 / z0 - 1.0 / z1;
    let b = -2.0 * (left.x / z0 - right.x / z1);
    let c = left.x * left.x / z0 - right.x * right.x / z1 + (left.y - right.y) / 2.0;

    let sq = (b * b - 4.0 * a * c).max(0.0).sqrt();
    let x = if b < 0.0 {
        2.0 * c / (-b + sq)
    } else {
        (-b - sq) / (2.0 * a)
    };

    // the parabola with the focus farther from the directrix is the better conditioned one
    let y = if (directrix - left.y) >= (directrix - right.y) {
        parabola_y(left, directrix, x)
    } else {
        parabola_y(right, directrix, x)
    };

    Point::new(x, y)
}

/// The direction in which the intersection between the arcs of `left` and `right` moves while
/// the sweep line advances. It is perpendicular to the segment between the two foci.
pub fn breakpoint_direction(left: Point, right: Point) -> Point {
    Point::new(left.y - right.y, right.x - left.x)
}

/// Finds the circle that passes through the points `a`, `b`, and `c`, as a center and a radius.
///
/// Returns `None` if the points are collinear: the sine of the angle at `a` is at most `eps`.
/// The test does not depend on the scale of the points.
pub fn circle_through(a: Point, b: Point, c: Point, eps: f64) -> Option<(Point, f64)> {
    let b = b - a;
    let c = c - a;

    let d = 2.0 * b.perp_dot(c);
    let (lb, lc) = (b.dot(b).sqrt(), c.dot(c).sqrt());
    if d.abs() <= 2.0 * eps * lb * lc {
        return None;
    }

    let b2 = b.dot(b);
    let c2 = c.dot(c);

    let ux = (c.y * b2 - b.y * c2) / d;
    let uy = (b.x * c2 - c.x * b2) / d;

    let radius = (ux * ux + uy * uy).sqrt();

    Some((Point::new(a.x + ux, a.y + uy), radius))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPS: f64 = 1e-9;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= (a.abs() + b.abs()).max(1.0) * 1e-9
    }

    fn square() -> Rect {
        Rect::new(Point::new(0.0, 0.0), Point::new(100.0, 100.0))
    }

    #[test]
    fn parabola_is_equidistant() {
        let focus = Point::new(3.0, 1.0);
        let y = parabola_y(focus, 5.0, 7.0);
        let p = Point::new(7.0, y);

        assert!(close(p.distance(focus), 5.0 - y));
    }

    #[test]
    fn intersection_picks_the_left_breakpoint() {
        let l = Point::new(0.0, 0.0);
        let r = Point::new(4.0, 2.0);

        let left = parabola_intersection(l, r, 4.0, EPS);
        let right = parabola_intersection(r, l, 4.0, EPS);

        assert!(close(left.x, 8.0 - 40f64.sqrt()));
        assert!(close(right.x, 8.0 + 40f64.sqrt()));
    }

    #[test]
    fn intersection_with_focus_on_directrix() {
        let l = Point::new(0.0, 0.0);
        let r = Point::new(4.0, 2.0);

        let p = parabola_intersection(l, r, 2.0, EPS);

        assert_eq!(p, Point::new(4.0, -3.0));
    }

    #[test]
    fn intersection_of_cohorizontal_foci() {
        let l = Point::new(20.0, 50.0);
        let r = Point::new(80.0, 50.0);

        let p = parabola_intersection(l, r, 50.0, EPS);
        assert_eq!(p.x, 50.0);
        assert_eq!(p.y, f64::NEG_INFINITY);

        let p = parabola_intersection(l, r, 90.0, EPS);
        assert_eq!(p.x, 50.0);
        assert!(close(p.distance(l), 90.0 - p.y));
    }

    proptest! {
        #[test]
        fn intersection_is_equidistant(
            l in (0..20i32, 0..20i32),
            r in (0..20i32, 0..20i32),
            d in 1..10i32,
        ) {
            let l = Point::new(l.0 as f64, l.1 as f64);
            let r = Point::new(r.0 as f64, r.1 as f64);
            prop_assume!(l != r);
            prop_assume!(l.y != r.y || l.x < r.x);

            let directrix = l.y.max(r.y) + d as f64;
            let p = parabola_intersection(l, r, directrix, EPS);

            let tolerance = 1e-6 * (1.0 + (directrix - p.y).abs());
            prop_assert!((p.distance(l) - (directrix - p.y)).abs() <= tolerance);
            prop_assert!((p.distance(r) - (directrix - p.y)).abs() <= tolerance);
        }

        #[test]
        fn breakpoint_moves_along_direction(
            l in (0..20i32, 0..20i32),
            r in (0..20i32, 0..20i32),
            d in 1..10i32,
        ) {
            let l = Point::new(l.0 as f64, l.1 as f64);
            let r = Point::new(r.0 as f64, r.1 as f64);
            prop_assume!(l != r);
            prop_assume!(l.y != r.y || l.x < r.x);

            let directrix = l.y.max(r.y) + d as f64;
            let p0 = parabola_intersection(l, r, directrix, EPS);
            let p1 = parabola_intersection(l, r, directrix + 1.0, EPS);

            prop_assert!((p1 - p0).dot(breakpoint_direction(l, r)) > 0.0);
        }

        #[test]
        fn circle_is_equidistant(a: (u8, u8), b: (u8, u8), c: (u8, u8)) {
            let a = Point::new(a.0 as f64, a.1 as f64);
            let b = Point::new(b.0 as f64, b.1 as f64);
            let c = Point::new(c.0 as f64, c.1 as f64);

            let collinear = (b - a).perp_dot(c - a) == 0.0;

            match circle_through(a, b, c, EPS) {
                None => prop_assert!(collinear),
                Some((center, radius)) => {
                    prop_assert!(!collinear);
                    prop_assert!(close(center.distance(a), radius));
                    prop_assert!(close(center.distance(b), radius));
                    prop_assert!(close(center.distance(c), radius));
                }
            }
        }
    }

    #[test]
    fn collinearity_ignores_scale() {
        let (center, radius) = circle_through(
            Point::new(0.0, 0.0),
            Point::new(1e-6, 0.0),
            Point::new(0.0, 1e-6),
            EPS,
        )
        .unwrap();
        assert!(close(center.x * 1e6, 0.5) && close(center.y * 1e6, 0.5));
        assert!(close(radius * 1e6, 0.5f64.sqrt()));

        let flat = circle_through(
            Point::new(0.0, 0.0),
            Point::new(1e6, 0.0),
            Point::new(2e6, 1e-6),
            EPS,
        );
        assert_eq!(flat, None);
    }

    #[test]
    fn ray_exit_from_inside() {
        let rect = square();

        let exit = rect.ray_exit(Point::new(50.0, 50.0), Point::new(0.0, 2.0));
        assert_eq!(exit, Some(Point::new(50.0, 100.0)));

        let exit = rect.ray_exit(Point::new(50.0, 50.0), Point::new(-1.0, -1.0));
        assert_eq!(exit, Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn ray_exit_from_outside() {
        let rect = square();

        let exit = rect.ray_exit(Point::new(-50.0, 50.0), Point::new(1.0, 0.0));
        assert_eq!(exit, Some(Point::new(100.0, 50.0)));

        assert_eq!(rect.ray_exit(Point::new(-50.0, 50.0), Point::new(-1.0, 0.0)), None);
        assert_eq!(rect.ray_exit(Point::new(-50.0, 150.0), Point::new(1.0, 0.0)), None);
        assert_eq!(rect.ray_exit(Point::new(50.0, 50.0), Point::new(0.0, 0.0)), None);
    }

    #[test]
    fn clip_segments() {
        let rect = square();

        let inside = rect.clip_segment(Point::new(10.0, 10.0), Point::new(90.0, 90.0));
        assert_eq!(inside, Some((0.0, 1.0)));

        let crossing = rect.clip_segment(Point::new(-50.0, 50.0), Point::new(150.0, 50.0));
        assert_eq!(crossing, Some((0.25, 0.75)));

        let outside = rect.clip_segment(Point::new(-50.0, -10.0), Point::new(150.0, -10.0));
        assert_eq!(outside, None);

        let past_corner = rect.clip_segment(Point::new(-10.0, 5.0), Point::new(5.0, -10.0));
        assert_eq!(past_corner, None);
    }

    #[test]
    fn border_and_corners() {
        let rect = square();

        assert!(rect.on_border(Point::new(0.0, 37.0), EPS));
        assert!(rect.on_border(Point::new(100.0, 100.0), EPS));
        assert!(!rect.on_border(Point::new(50.0, 50.0), EPS));
        assert!(!rect.on_border(Point::new(-10.0, 0.0), EPS));

        let center = Point::new(50.0, 50.0);
        let corners = rect.corners();
        for w in corners.windows(2) {
            assert!(crate::vec2_angle_cmp(w[0] - center, w[1] - center).is_lt());
        }
    }
}
