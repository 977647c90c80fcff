use crate::core::Point2D;

/// Ray-casting containment test.
///
/// Points exactly on an edge may land on either side; callers that need
/// inclusive edges should use a tolerance. Fewer than three vertices never
/// contain anything.
pub fn point_in_polygon(point: &Point2D, polygon: &[Point2D]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let crossing_x = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < crossing_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shortest distance from `point` to the segment `a`-`b`
pub fn distance_to_segment(point: &Point2D, a: &Point2D, b: &Point2D) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return point.distance_to(a);
    }

    let t = (((point.x - a.x) * dx + (point.y - a.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(&Point2D::new(a.x + t * dx, a.y + t * dy))
}

/// Shortest distance from `point` to a polyline, `None` for an empty path
pub fn distance_to_path(point: &Point2D, path: &[Point2D]) -> Option<f64> {
    match path {
        [] => None,
        [only] => Some(point.distance_to(only)),
        _ => path
            .windows(2)
            .map(|w| distance_to_segment(point, &w[0], &w[1]))
            .reduce(f64::min),
    }
}
