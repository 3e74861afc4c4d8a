use std::time::Duration;

use rand::{Rng, SeedableRng};
use voronoi_builder::{Point, Progress, Rect, VoronoiBuilder};

fn sites() -> Vec<Point> {
    let mut rng = rand::rngs::SmallRng::from_seed([76; 32]); // chosen by fair dice roll
    (0..512)
        .map(|_| Point::new(rng.gen(), rng.gen()))
        .collect::<Vec<_>>()
}

fn bounds() -> Rect {
    Rect::new(Point::new(0.0, 0.0), Point::new(1.0, 1.0))
}

fn build(sites: &[Point]) {
    for _ in 0..100 {
        VoronoiBuilder::new(bounds(), sites)
            .and_then(VoronoiBuilder::build)
            .unwrap();
    }
}

/// The same work, split in slices of a fixed time budget.
fn stepped(sites: &[Point]) -> usize {
    let mut calls = 0;
    for _ in 0..100 {
        let mut builder = VoronoiBuilder::new(bounds(), sites).unwrap();
        while builder.step_for(Duration::from_micros(100)).unwrap() == Progress::Continue {
            calls += 1;
        }
        builder.finish().unwrap();
    }
    calls
}

fn main() {
    let sites = sites();

    let start = std::time::Instant::now();
    build(&sites);
    println!("Elapsed: {:?}", start.elapsed());

    let start = std::time::Instant::now();
    let calls = stepped(&sites);
    println!("Elapsed stepped: {:?} ({} calls)", start.elapsed(), calls);
}
