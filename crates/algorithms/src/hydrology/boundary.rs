//! Raster mask to polygon tracing.
//!
//! Every cell side separating a masked cell from an unmasked (or off-grid)
//! one becomes a directed unit edge with the mask on its right in row-down
//! grid space. Edges are chained into closed rings; where two rings would
//! touch at a single vertex the walk turns left, which joins cells that
//! only share a corner into the same ring.

use cuenca_core::GeoTransform;
use geo_types::{Coord, LineString, Polygon};
use ndarray::Array2;
use std::collections::HashMap;

/// Grid-corner vertex as (col, row)
type Vertex = (usize, usize);

struct Edge {
    from: Vertex,
    to: Vertex,
}

impl Edge {
    fn direction(&self) -> (isize, isize) {
        (
            self.to.0 as isize - self.from.0 as isize,
            self.to.1 as isize - self.from.1 as isize,
        )
    }
}

fn is_set(mask: &Array2<bool>, row: isize, col: isize) -> bool {
    row >= 0 && col >= 0 && mask.get((row as usize, col as usize)).copied().unwrap_or(false)
}

fn boundary_edges(mask: &Array2<bool>) -> Vec<Edge> {
    let mut edges = Vec::new();
    for ((r, c), &inside) in mask.indexed_iter() {
        if !inside {
            continue;
        }
        let (ri, ci) = (r as isize, c as isize);
        if !is_set(mask, ri - 1, ci) {
            edges.push(Edge { from: (c, r), to: (c + 1, r) });
        }
        if !is_set(mask, ri, ci + 1) {
            edges.push(Edge { from: (c + 1, r), to: (c + 1, r + 1) });
        }
        if !is_set(mask, ri + 1, ci) {
            edges.push(Edge { from: (c + 1, r + 1), to: (c, r + 1) });
        }
        if !is_set(mask, ri, ci - 1) {
            edges.push(Edge { from: (c, r + 1), to: (c, r) });
        }
    }
    edges
}

/// Closed rings of grid-corner vertices, first vertex not repeated.
///
/// Rings around the mask have positive [`signed_area`]; rings around holes
/// are negative.
pub(crate) fn trace_rings(mask: &Array2<bool>) -> Vec<Vec<Vertex>> {
    let edges = boundary_edges(mask);
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut ring = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            ring.push(edges[current].from);

            let (dx, dy) = edges[current].direction();
            let left = (dy, -dx);
            let straight = (dx, dy);

            let candidates: Vec<usize> = outgoing
                .get(&edges[current].to)
                .map(|ids| ids.iter().copied().filter(|&i| !used[i]).collect())
                .unwrap_or_default();

            let next = candidates
                .iter()
                .copied()
                .find(|&i| edges[i].direction() == left)
                .or_else(|| candidates.iter().copied().find(|&i| edges[i].direction() == straight))
                .or_else(|| candidates.first().copied());

            match next {
                Some(i) => current = i,
                None => break,
            }
        }
        rings.push(simplify_ring(ring));
    }

    rings
}

/// Drop vertices lying on a straight run
fn simplify_ring(ring: Vec<Vertex>) -> Vec<Vertex> {
    let n = ring.len();
    if n < 4 {
        return ring;
    }
    (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];
            let d1 = (cur.0 as isize - prev.0 as isize, cur.1 as isize - prev.1 as isize);
            let d2 = (next.0 as isize - cur.0 as isize, next.1 as isize - cur.1 as isize);
            // Unit-step directions are equal iff the turn is zero
            d1.0 * d2.1 - d1.1 * d2.0 != 0
        })
        .map(|i| ring[i])
        .collect()
}

/// Shoelace area in cell units, positive for rings around the mask
pub(crate) fn signed_area(ring: &[Vertex]) -> f64 {
    let n = ring.len();
    let twice: isize = (0..n)
        .map(|i| {
            let (x0, y0) = ring[i];
            let (x1, y1) = ring[(i + 1) % n];
            x0 as isize * y1 as isize - x1 as isize * y0 as isize
        })
        .sum();
    twice as f64 / 2.0
}

/// Polygon outlining the mask in map coordinates.
///
/// The largest ring is the exterior and rings around holes become interiors.
/// An empty mask gives an empty polygon.
pub fn mask_polygon(mask: &Array2<bool>, transform: &GeoTransform) -> Polygon<f64> {
    let rings = trace_rings(mask);

    let to_line = |ring: &[Vertex]| -> LineString<f64> {
        ring.iter()
            .map(|&(c, r)| {
                let (x, y) = transform.pixel_to_geo_corner(c, r);
                Coord { x, y }
            })
            .collect::<Vec<_>>()
            .into()
    };

    let exterior_idx = rings
        .iter()
        .enumerate()
        .max_by(|a, b| signed_area(a.1).total_cmp(&signed_area(b.1)))
        .map(|(i, _)| i);

    let Some(exterior_idx) = exterior_idx else {
        return Polygon::new(LineString::new(vec![]), vec![]);
    };

    let interiors = rings
        .iter()
        .enumerate()
        .filter(|&(i, ring)| i != exterior_idx && signed_area(ring) < 0.0)
        .map(|(_, ring)| to_line(ring))
        .collect();

    Polygon::new(to_line(&rings[exterior_idx]), interiors)
}
