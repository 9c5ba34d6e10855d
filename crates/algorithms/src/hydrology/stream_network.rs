//! Stream network extraction
//!
//! Cells whose flow accumulation reaches a channel-initiation threshold are
//! classified as channel cells. Inside a watershed they are split into links
//! that run from a channel head or confluence down to the next confluence or
//! the outlet, and each link is given a Strahler order.

use super::flow_model::FlowModel;
use super::watershed::WatershedMask;
use cuenca_core::raster::d8;
use cuenca_core::{ElevationGrid, Error, Result};
use geo_types::{Coord, LineString, MultiLineString};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Minimum accumulation for a cell to be a channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelThreshold {
    /// Upstream cell count
    Cells(f64),
    /// Upstream contributing area in km²
    AreaKm2(f64),
}

impl Default for ChannelThreshold {
    fn default() -> Self {
        ChannelThreshold::AreaKm2(0.5)
    }
}

impl ChannelThreshold {
    /// Threshold in cells for the given cell area (m²), never below 2
    pub fn to_cells(&self, cell_area_m2: f64) -> f64 {
        let cells = match *self {
            ChannelThreshold::Cells(n) => n,
            ChannelThreshold::AreaKm2(km2) => km2 * 1e6 / cell_area_m2,
        };
        if cells.is_finite() {
            cells.max(2.0)
        } else {
            2.0
        }
    }

    fn validate(&self) -> Result<()> {
        let (name, value) = match *self {
            ChannelThreshold::Cells(n) => ("threshold_cells", n),
            ChannelThreshold::AreaKm2(a) => ("threshold_km2", a),
        };
        if value.is_finite() && value > 0.0 {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                name,
                value: value.to_string(),
                reason: "must be positive".into(),
            })
        }
    }
}

/// Parameters for stream network extraction
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    pub threshold: ChannelThreshold,
}

/// One link of the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSegment {
    pub id: usize,
    /// Cells from the downstream end to the link's head
    pub cells: Vec<(usize, usize)>,
    /// Strahler order
    pub order: u32,
    /// Segment this one flows into; `None` for the outlet link
    pub downstream: Option<usize>,
    pub upstream: Vec<usize>,
    /// Length in meters, including the step into the downstream confluence
    pub length_m: f64,
}

/// Channel links of one watershed, listed outlet-first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamNetwork {
    pub threshold_cells: f64,
    pub segments: Vec<StreamSegment>,
}

impl StreamNetwork {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn total_length_m(&self) -> f64 {
        self.segments.iter().map(|s| s.length_m).sum()
    }

    pub fn max_order(&self) -> u32 {
        self.segments.iter().map(|s| s.order).max().unwrap_or(0)
    }

    /// Number of segments per Strahler order
    pub fn order_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for s in &self.segments {
            *counts.entry(s.order).or_insert(0) += 1;
        }
        counts
    }

    pub fn channel_cell_count(&self) -> usize {
        self.segments.iter().map(|s| s.cells.len()).sum()
    }

    /// Segments as lines running downstream, in map coordinates.
    ///
    /// A line ends on its downstream confluence cell so the network draws
    /// without gaps.
    pub fn to_multi_line_string(&self, dem: &ElevationGrid) -> MultiLineString<f64> {
        let center = |&(r, c): &(usize, usize)| {
            let (x, y) = dem.cell_center(r, c);
            Coord { x, y }
        };

        let lines = self
            .segments
            .iter()
            .map(|seg| {
                let mut coords: Vec<Coord<f64>> = seg.cells.iter().rev().map(center).collect();
                if let Some(down) = seg.downstream.and_then(|id| self.segments.get(id)) {
                    if let Some(head) = down.cells.last() {
                        coords.push(center(head));
                    }
                }
                LineString::new(coords)
            })
            .collect();
        MultiLineString::new(lines)
    }
}

/// A link traced from its head, before ids are assigned
struct Link {
    /// Upstream-first cells
    cells: Vec<(usize, usize)>,
    length_m: f64,
    /// Head cell of the link this one flows into
    into: Option<(usize, usize)>,
}

/// Extract the channel network inside a watershed.
///
/// Channel cells are masked cells with accumulation at or above the
/// threshold. Links start at heads (no upstream channel neighbor) and at
/// confluences (two or more) and end where the next link starts or at the
/// outlet. Segments are numbered breadth-first from the outlet link and
/// Strahler orders are computed from the headwaters down.
///
/// An outlet below the threshold yields an empty network.
pub fn extract_streams(flow: &FlowModel, mask: &WatershedMask, params: &StreamParams) -> Result<StreamNetwork> {
    params.threshold.validate()?;
    let threshold_cells = params.threshold.to_cells(flow.cell_area());
    let (rows, cols) = flow.shape();
    let outlet = mask.outlet();

    let is_channel = |r: usize, c: usize| {
        mask.contains(r, c) && flow.accumulation(r, c).is_some_and(|a| a >= threshold_cells)
    };

    let mut channel = Array2::from_elem((rows, cols), false);
    for (r, c) in mask.cells() {
        channel[(r, c)] = is_channel(r, c);
    }

    let starts: Vec<(usize, usize)> = mask
        .cells()
        .filter(|&(r, c)| channel[(r, c)])
        .filter(|&(r, c)| {
            let inflows = flow.upstream(r, c).filter(|&(ur, uc)| channel[(ur, uc)]).count();
            inflows != 1
        })
        .collect();

    let mut is_start = Array2::from_elem((rows, cols), false);
    for &cell in &starts {
        is_start[cell] = true;
    }

    let step = |from: (usize, usize)| d8::step_length(flow.direction(from.0, from.1), flow.cell_width(), flow.cell_height());

    let mut links: HashMap<(usize, usize), Link> = HashMap::with_capacity(starts.len());
    for &head in &starts {
        let mut cells = vec![head];
        let mut length_m = 0.0;
        let mut into = None;
        let mut cur = head;

        while cur != outlet {
            let Some(next) = flow.downstream(cur.0, cur.1).filter(|&(r, c)| channel[(r, c)]) else {
                break;
            };
            length_m += step(cur);
            if is_start[next] {
                into = Some(next);
                break;
            }
            cells.push(next);
            cur = next;
            if cells.len() > mask.len() {
                return Err(Error::CyclicFlow { row: cur.0, col: cur.1 });
            }
        }

        links.insert(head, Link { cells, length_m, into });
    }

    // Children of each link head, in row-major order of their own heads
    let mut children: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    let mut roots = Vec::new();
    for &head in &starts {
        match links[&head].into {
            Some(down) => children.entry(down).or_default().push(head),
            None => roots.push(head),
        }
    }

    // Breadth-first from the outlet link
    let mut bfs: Vec<(usize, usize)> = Vec::with_capacity(starts.len());
    let mut queue: VecDeque<(usize, usize)> = roots.into_iter().collect();
    while let Some(head) = queue.pop_front() {
        bfs.push(head);
        if let Some(kids) = children.get(&head) {
            queue.extend(kids.iter().copied());
        }
    }
    let ids: HashMap<(usize, usize), usize> = bfs.iter().enumerate().map(|(i, &h)| (h, i)).collect();

    let mut segments: Vec<StreamSegment> = bfs
        .iter()
        .enumerate()
        .map(|(id, head)| {
            let link = &links[head];
            StreamSegment {
                id,
                cells: link.cells.iter().rev().copied().collect(),
                order: 1,
                downstream: link.into.and_then(|d| ids.get(&d).copied()),
                upstream: children
                    .get(head)
                    .map(|kids| kids.iter().filter_map(|k| ids.get(k).copied()).collect())
                    .unwrap_or_default(),
                length_m: link.length_m,
            }
        })
        .collect();

    // Upstream segments always have larger ids
    for id in (0..segments.len()).rev() {
        let orders: Vec<u32> = segments[id].upstream.iter().map(|&u| segments[u].order).collect();
        if let Some(&max) = orders.iter().max() {
            let at_max = orders.iter().filter(|&&o| o == max).count();
            segments[id].order = if at_max >= 2 { max + 1 } else { max };
        }
    }

    Ok(StreamNetwork {
        threshold_cells,
        segments,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_model::FlowModelParams;
    use crate::hydrology::watershed::trace_watershed;
    use approx::assert_relative_eq;
    use cuenca_core::GeoTransform;

    /// Y-shaped drainage: two tributaries meet in a trunk running south
    ///
    /// Column 2 and column 8 carry tributaries that converge toward column 5.
    fn y_valley() -> (ElevationGrid, FlowModel) {
        let rows: Vec<Vec<f64>> = (0..12)
            .map(|r| {
                (0..11)
                    .map(|c| {
                        let axis = if r < 6 {
                            // tributary axes at col 2 and col 8 drifting to the trunk
                            let left = 2.0 + r as f64 * 0.5;
                            let right = 8.0 - r as f64 * 0.5;
                            ((c as f64 - left).abs()).min((c as f64 - right).abs())
                        } else {
                            (c as f64 - 5.0).abs()
                        };
                        500.0 - r as f64 * 10.0 + axis * 6.0
                    })
                    .collect()
            })
            .collect();
        let dem = ElevationGrid::from_rows(rows, GeoTransform::new(0.0, 120.0, 10.0, -10.0), None).unwrap();
        let flow = FlowModel::build(&dem, &FlowModelParams::default()).unwrap();
        (dem, flow)
    }

    fn outlet_of(flow: &FlowModel) -> (usize, usize) {
        // Largest accumulation on the bottom row
        (0..11)
            .map(|c| (11, c))
            .max_by(|a, b| {
                flow.accumulation(a.0, a.1)
                    .unwrap()
                    .total_cmp(&flow.accumulation(b.0, b.1).unwrap())
            })
            .unwrap()
    }

    #[test]
    fn test_threshold_conversion() {
        assert_eq!(ChannelThreshold::Cells(50.0).to_cells(900.0), 50.0);
        assert_relative_eq!(ChannelThreshold::AreaKm2(0.5).to_cells(900.0), 555.555, epsilon = 1e-2);
        assert_eq!(ChannelThreshold::AreaKm2(1e-9).to_cells(900.0), 2.0);
    }

    #[test]
    fn test_segments_listed_outlet_first() {
        let (_, flow) = y_valley();
        let ws = trace_watershed(&flow, outlet_of(&flow)).unwrap();
        let net = extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(4.0) }).unwrap();

        assert!(!net.is_empty());
        assert_eq!(net.segments[0].downstream, None);
        assert_eq!(net.segments[0].cells[0], ws.outlet());
        for seg in &net.segments {
            if let Some(d) = seg.downstream {
                assert!(d < seg.id);
                assert!(net.segments[d].upstream.contains(&seg.id));
            }
        }
    }

    #[test]
    fn test_strahler_rules() {
        let (_, flow) = y_valley();
        let ws = trace_watershed(&flow, outlet_of(&flow)).unwrap();
        let net = extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(4.0) }).unwrap();

        for seg in &net.segments {
            let orders: Vec<u32> = seg.upstream.iter().map(|&u| net.segments[u].order).collect();
            match orders.iter().max() {
                None => assert_eq!(seg.order, 1),
                Some(&m) => {
                    let ties = orders.iter().filter(|&&o| o == m).count();
                    assert_eq!(seg.order, if ties >= 2 { m + 1 } else { m });
                }
            }
        }
        assert!(net.max_order() >= 2, "two tributaries meet");
        assert_eq!(net.order_counts().values().sum::<usize>(), net.len());
    }

    #[test]
    fn test_channel_cells_partitioned() {
        let (_, flow) = y_valley();
        let ws = trace_watershed(&flow, outlet_of(&flow)).unwrap();
        let net = extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(4.0) }).unwrap();

        let expected = ws
            .cells()
            .filter(|&(r, c)| flow.accumulation(r, c).unwrap() >= 4.0)
            .count();
        assert_eq!(net.channel_cell_count(), expected);
    }

    #[test]
    fn test_lines_include_confluence() {
        let (dem, flow) = y_valley();
        let ws = trace_watershed(&flow, outlet_of(&flow)).unwrap();
        let net = extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(4.0) }).unwrap();
        let mls = net.to_multi_line_string(&dem);

        assert_eq!(mls.0.len(), net.len());
        for (seg, line) in net.segments.iter().zip(&mls.0) {
            let extra = usize::from(seg.downstream.is_some());
            assert_eq!(line.0.len(), seg.cells.len() + extra);
        }
    }

    #[test]
    fn test_outlet_below_threshold_gives_empty_network() {
        let (_, flow) = y_valley();
        let ws = trace_watershed(&flow, (0, 0)).unwrap();
        let net = extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(1000.0) }).unwrap();
        assert!(net.is_empty());
        assert_eq!(net.total_length_m(), 0.0);
        assert_eq!(net.max_order(), 0);
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let (_, flow) = y_valley();
        let ws = trace_watershed(&flow, outlet_of(&flow)).unwrap();
        assert!(extract_streams(&flow, &ws, &StreamParams { threshold: ChannelThreshold::Cells(0.0) }).is_err());
    }
}
