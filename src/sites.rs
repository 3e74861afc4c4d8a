//! Reading and writing lists of site positions.
//!
//! The format is a big-endian `i32` count, followed by that many pairs of big-endian `f64`
//! coordinates, `x` first.

use std::io::{Read, Write};

use crate::Point;

#[derive(Debug, thiserror::Error)]
pub enum SiteFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("negative site count {0}")]
    NegativeCount(i32),
    #[error("too many sites to write: {0}")]
    TooManySites(usize),
}

pub fn write_sites<W: Write>(mut writer: W, sites: &[Point]) -> Result<(), SiteFileError> {
    let count = i32::try_from(sites.len()).map_err(|_| SiteFileError::TooManySites(sites.len()))?;
    writer.write_all(&count.to_be_bytes())?;
    for site in sites {
        writer.write_all(&site.x.to_be_bytes())?;
        writer.write_all(&site.y.to_be_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_sites<R: Read>(mut reader: R) -> Result<Vec<Point>, SiteFileError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    let count = i32::from_be_bytes(buf);
    let count = usize::try_from(count).map_err(|_| SiteFileError::NegativeCount(count))?;

    // the count is untrusted, so don't preallocate all of it
    let mut sites = Vec::with_capacity(count.min(4096));
    let mut buf = [0u8; 8];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        let x = f64::from_be_bytes(buf);
        reader.read_exact(&mut buf)?;
        let y = f64::from_be_bytes(buf);
        sites.push(Point::new(x, y));
    }

    Ok(sites)
}
