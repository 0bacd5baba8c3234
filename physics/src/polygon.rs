//! Clipping of contact features projected into the contact plane.
use crate::options::EPSILON;
use glam::Vec2;

pub fn signed_area(poly: &[Vec2]) -> f32 {
    let n = poly.len();
    (0..n)
        .map(|i| poly[i].perp_dot(poly[(i + 1) % n]))
        .sum::<f32>()
        * 0.5
}

/// Reverse `poly` if it winds clockwise.
pub fn make_ccw(poly: &mut [Vec2]) {
    if signed_area(poly) < 0.0 {
        poly.reverse();
    }
}

// where the line through p0 and p1 crosses the line through a and b
fn line_intersection(p0: Vec2, p1: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let d = p1 - p0;
    let e = b - a;
    let denom = e.perp_dot(d);
    if denom.abs() < EPSILON {
        return p0;
    }
    p0 + d * (e.perp_dot(a - p0) / denom)
}

/// Sutherland-Hodgman clip of `subject` by the convex counter clockwise polygon `clip`.
pub fn clip_polygon(subject: &[Vec2], clip: &[Vec2]) -> Vec<Vec2> {
    let mut output = subject.to_vec();
    for (i, &a) in clip.iter().enumerate() {
        if output.is_empty() {
            break;
        }

        let b = clip[(i + 1) % clip.len()];
        let edge = b - a;
        let inside = |p: Vec2| edge.perp_dot(p - a) >= -EPSILON;

        let input = std::mem::take(&mut output);
        for (j, &cur) in input.iter().enumerate() {
            let prev = input[(j + input.len() - 1) % input.len()];
            match (inside(prev), inside(cur)) {
                (true, true) => output.push(cur),
                (false, true) => {
                    output.push(line_intersection(prev, cur, a, b));
                    output.push(cur);
                }
                (true, false) => output.push(line_intersection(prev, cur, a, b)),
                (false, false) => {}
            }
        }
    }
    output
}

/// The part of the segment `s0`, `s1` inside the convex counter clockwise polygon `clip`.
pub fn clip_segment(s0: Vec2, s1: Vec2, clip: &[Vec2]) -> Option<(Vec2, Vec2)> {
    let d = s1 - s0;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for (i, &a) in clip.iter().enumerate() {
        let edge = clip[(i + 1) % clip.len()] - a;
        let start = edge.perp_dot(s0 - a);
        let rate = edge.perp_dot(d);
        if rate.abs() < EPSILON {
            if start < -EPSILON {
                return None;
            }
            continue;
        }

        let t = -start / rate;
        if rate > 0.0 {
            t0 = t0.max(t);
        } else {
            t1 = t1.min(t);
        }
        if t0 > t1 + EPSILON {
            return None;
        }
    }
    Some((s0 + d * t0, s0 + d * t1.max(t0)))
}

/// Contact points between two segments: the overlap of parallel segments, otherwise the
/// crossing point of their lines. Empty when parallel segments do not overlap.
pub fn clip_segments(a0: Vec2, a1: Vec2, b0: Vec2, b1: Vec2) -> Vec<Vec2> {
    let da = a1 - a0;
    let db = b1 - b0;
    let len_sq = da.length_squared();
    if len_sq < EPSILON {
        return vec![a0];
    }

    if da.perp_dot(db).abs() > EPSILON * da.length() * db.length() {
        return vec![line_intersection(a0, a1, b0, b1)];
    }

    let tb0 = (b0 - a0).dot(da) / len_sq;
    let tb1 = (b1 - a0).dot(da) / len_sq;
    let lo = tb0.min(tb1).max(0.0);
    let hi = tb0.max(tb1).min(1.0);
    if lo > hi {
        Vec::new()
    } else if hi - lo < EPSILON {
        vec![a0 + da * lo]
    } else {
        vec![a0 + da * lo, a0 + da * hi]
    }
}
