use std::io::{self, Write};

use crate::model::Coordinate;

/// Geographic box a map viewport is fitted to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// The smallest box containing all coordinates, `None` for no coordinates.
    pub fn enclosing(coordinates: impl IntoIterator<Item = Coordinate>) -> Option<Bounds> {
        coordinates.into_iter().fold(None, |bounds, c| {
            Some(match bounds {
                None => Bounds {
                    min_lat: c.lat,
                    max_lat: c.lat,
                    min_lng: c.lng,
                    max_lng: c.lng,
                },
                Some(b) => Bounds {
                    min_lat: b.min_lat.min(c.lat),
                    max_lat: b.max_lat.max(c.lat),
                    min_lng: b.min_lng.min(c.lng),
                    max_lng: b.max_lng.max(c.lng),
                },
            })
        })
    }

    pub fn contains(&self, c: Coordinate) -> bool {
        c.lat >= self.min_lat && c.lat <= self.max_lat && c.lng >= self.min_lng && c.lng <= self.max_lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    Bus,
    Stop,
}

impl Glyph {
    pub fn symbol(self) -> &'static str {
        match self {
            Glyph::Bus => "🚌",
            Glyph::Stop => "🚏",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub position: Coordinate,
    pub label: String,
    pub glyph: Glyph,
    /// `None` renders in the surface's default color.
    pub color: Option<String>,
    pub popup: Vec<String>,
}

/// Anything that can plot markers and fit its viewport; the map provider itself
/// stays behind this trait.
pub trait MapSurface {
    fn clear(&mut self) -> io::Result<()>;
    fn plot(&mut self, marker: &Marker) -> io::Result<()>;
    fn fit_bounds(&mut self, bounds: &Bounds) -> io::Result<()>;
}

/// Prints markers as aligned text lines.
pub struct TextSurface<W: Write> {
    out: W,
}

impl<W: Write> TextSurface<W> {
    pub fn new(out: W) -> Self {
        TextSurface { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MapSurface for TextSurface<W> {
    fn clear(&mut self) -> io::Result<()> {
        writeln!(self.out)
    }

    fn plot(&mut self, marker: &Marker) -> io::Result<()> {
        writeln!(
            self.out,
            "{} {:<24} {:>9.4}, {:>9.4}  {}",
            marker.glyph.symbol(),
            marker.label,
            marker.position.lat,
            marker.position.lng,
            marker.color.as_deref().unwrap_or("-"),
        )?;
        for line in &marker.popup {
            writeln!(self.out, "     {}", line)?;
        }
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: &Bounds) -> io::Result<()> {
        writeln!(
            self.out,
            "Viewport: lat {:.4}..{:.4}, lng {:.4}..{:.4}",
            bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng
        )
    }
}

#[cfg(test)]
pub mod tests {
    use std::io;

    use crate::model::Coordinate;

    use super::{Bounds, Glyph, MapSurface, Marker, TextSurface};

    /// Keeps whatever was plotted since the last clear.
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub markers: Vec<Marker>,
        pub bounds: Option<Bounds>,
        pub clears: usize,
    }

    impl MapSurface for RecordingSurface {
        fn clear(&mut self) -> io::Result<()> {
            self.markers.clear();
            self.bounds = None;
            self.clears += 1;
            Ok(())
        }

        fn plot(&mut self, marker: &Marker) -> io::Result<()> {
            self.markers.push(marker.clone());
            Ok(())
        }

        fn fit_bounds(&mut self, bounds: &Bounds) -> io::Result<()> {
            self.bounds = Some(*bounds);
            Ok(())
        }
    }

    #[test]
    fn test_enclosing_bounds() {
        let bounds = Bounds::enclosing([
            Coordinate::new(40.7589, -73.9851),
            Coordinate::new(40.7061, -73.9969),
            Coordinate::new(40.7829, -73.9654),
        ])
        .unwrap();
        assert_eq!(bounds.min_lat, 40.7061);
        assert_eq!(bounds.max_lat, 40.7829);
        assert_eq!(bounds.min_lng, -73.9969);
        assert_eq!(bounds.max_lng, -73.9654);
        assert!(bounds.contains(Coordinate::new(40.7589, -73.9851)));
        assert!(!bounds.contains(Coordinate::new(41.0, -73.97)));
    }

    #[test]
    fn test_enclosing_nothing() {
        assert_eq!(Bounds::enclosing(Vec::<Coordinate>::new()), None);
    }

    #[test]
    fn test_text_surface() {
        let mut surface = TextSurface::new(Vec::new());
        surface
            .plot(&Marker {
                position: Coordinate::new(40.7589, -73.9851),
                label: "City Hall".into(),
                glyph: Glyph::Stop,
                color: Some("#3b82f6".into()),
                popup: vec!["Blue Line Express".into()],
            })
            .unwrap();
        let text = String::from_utf8(surface.into_inner()).unwrap();
        assert!(text.contains("City Hall"));
        assert!(text.contains("40.7589"));
        assert!(text.contains("-73.9851"));
        assert!(text.contains("     Blue Line Express"));
    }
}
