//! Static 3-D kd-tree over points on the unit sphere.
//!
//! Sky positions are stored as unit vectors so that an angular radius query
//! becomes a Euclidean ball query with chord length `2 sin(r / 2)`, which
//! has no RA wrap-around or polar special cases.

/// An implicit kd-tree: `order` is arranged so that every sub-slice's middle
/// element splits it on the axis for its depth.
#[derive(Debug, Clone)]
pub struct KdTree {
    points: Vec<[f64; 3]>,
    order: Vec<usize>,
}

impl KdTree {
    /// Build in O(N log N) with median selection.
    pub fn build(points: Vec<[f64; 3]>) -> Self {
        let mut order: Vec<usize> = (0..points.len()).collect();
        build_recursive(&points, &mut order, 0);
        Self { points, order }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Indices of all points within Euclidean distance `radius` of `query`.
    pub fn within(&self, query: [f64; 3], radius: f64) -> Vec<usize> {
        let mut out = Vec::new();
        if radius >= 0.0 {
            self.search(&self.order, 0, &query, radius, &mut out);
        }
        out
    }

    fn search(&self, idx: &[usize], depth: usize, q: &[f64; 3], r: f64, out: &mut Vec<usize>) {
        if idx.is_empty() {
            return;
        }
        let mid = idx.len() / 2;
        let node = idx[mid];
        let p = &self.points[node];
        if distance_squared(p, q) <= r * r {
            out.push(node);
        }

        let axis = depth % 3;
        if q[axis] - r <= p[axis] {
            self.search(&idx[..mid], depth + 1, q, r, out);
        }
        if q[axis] + r >= p[axis] {
            self.search(&idx[mid + 1..], depth + 1, q, r, out);
        }
    }
}

fn build_recursive(points: &[[f64; 3]], idx: &mut [usize], depth: usize) {
    if idx.len() <= 1 {
        return;
    }
    let axis = depth % 3;
    let mid = idx.len() / 2;
    idx.select_nth_unstable_by(mid, |&a, &b| points[a][axis].total_cmp(&points[b][axis]));
    let (left, right) = idx.split_at_mut(mid);
    build_recursive(points, left, depth + 1);
    build_recursive(points, &mut right[1..], depth + 1);
}

#[inline]
fn distance_squared(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Chord length subtended by an angle in degrees.
pub fn chord_for_angle(degrees: f64) -> f64 {
    if degrees >= 180.0 {
        2.0
    } else {
        2.0 * (degrees.max(0.0).to_radians() / 2.0).sin()
    }
}
