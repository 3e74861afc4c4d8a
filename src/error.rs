//! Error types for diagram construction.

use crate::Point;

/// Errors that can occur while creating or driving a build session.
///
/// Invalid input is reported before any sweep work starts. The consistency variants mean an
/// invariant of the sweep was broken. They are not expected to occur, and the session that
/// produced one refuses any further work.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("at least one site is required")]
    NoSites,
    #[error("invalid bounds: min {min:?}, max {max:?}")]
    InvalidBounds { min: Point, max: Point },
    #[error("site {index} has a non-finite position {position:?}")]
    NonFiniteSite { index: usize, position: Point },
    #[error("site {index} at {position:?} lies outside the bounds")]
    SiteOutOfBounds { index: usize, position: Point },
    #[error("duplicate site at {position:?}")]
    DuplicateSite { position: Point },

    #[error("event at y = {event_y} is behind the sweep line at y = {sweep_y}")]
    EventOutOfOrder { event_y: f64, sweep_y: f64 },
    #[error("arc node {arc} has a parent that is neither of its neighbor breakpoints")]
    ArcParentMismatch { arc: usize },
    #[error("breakpoint node {breakpoint} already holds an edge")]
    EdgeAlreadyStarted { breakpoint: usize },
    #[error("no breakpoint between foci {left:?} and {right:?} in this order")]
    InvalidBreakpoint { left: Point, right: Point },
    #[error("arc node {arc} is missing a neighbor breakpoint")]
    MissingNeighbor { arc: usize },
    #[error("breakpoint node {breakpoint} has no edge to finish")]
    MissingEdge { breakpoint: usize },

    #[error("the build session failed earlier and cannot make progress")]
    SessionFailed,
    #[error("the build session has not finished")]
    NotFinished,
}

/// Result type alias for diagram construction.
pub type Result<T> = std::result::Result<T, Error>;
