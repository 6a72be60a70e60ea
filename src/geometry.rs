//! Conversion between Well-Known Text and the multi-polygon areas stored on
//! rules and layer details.
//!
//! Parsing is delegated to the `wkt` crate; this module only narrows the result
//! to areal geometries. A single `POLYGON` is promoted to a one-member
//! `MULTIPOLYGON` so that every stored area has the same shape.

use geo_types::{Geometry, MultiPolygon};
use wkt::{ToWkt, Wkt};

/// Error returned when area text cannot be turned into a multi-polygon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeometryError {
    /// The text is not valid WKT.
    #[error("Error parsing WKT: {0}")]
    Parse(String),

    /// The text is valid WKT but does not describe an area.
    #[error("Expected POLYGON or MULTIPOLYGON, found {0}")]
    NotAreal(&'static str),
}

/// Parse WKT text into a multi-polygon area.
///
/// # Example
/// ```
/// use georule_admin::geometry::parse_area;
///
/// let area = parse_area("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))").unwrap();
/// assert_eq!(area.0.len(), 1);
///
/// assert!(parse_area("POINT(1 2)").is_err());
/// assert!(parse_area("POLYGON((0 0, 10 0").is_err());
/// ```
pub fn parse_area(text: &str) -> Result<MultiPolygon<f64>, GeometryError> {
    let wkt: Wkt<f64> = text
        .trim()
        .parse()
        .map_err(|e| GeometryError::Parse(format!("{}", e)))?;
    let geometry =
        Geometry::<f64>::try_from(wkt).map_err(|e| GeometryError::Parse(e.to_string()))?;

    match geometry {
        Geometry::MultiPolygon(area) => Ok(area),
        Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        other => Err(GeometryError::NotAreal(geometry_kind(&other))),
    }
}

/// Render an area back to WKT.
pub fn area_to_wkt(area: &MultiPolygon<f64>) -> String {
    area.wkt_string()
}

fn geometry_kind(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "POINT",
        Geometry::Line(_) | Geometry::LineString(_) => "LINESTRING",
        Geometry::MultiPoint(_) => "MULTIPOINT",
        Geometry::MultiLineString(_) => "MULTILINESTRING",
        Geometry::GeometryCollection(_) => "GEOMETRYCOLLECTION",
        Geometry::Rect(_) | Geometry::Triangle(_) => "POLYGON-LIKE",
        _ => "GEOMETRY",
    }
}
