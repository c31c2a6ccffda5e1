//! Geohash kit: base-32 encode/decode and the 8-neighbour ring.
//!
//! Pure functions, no I/O. Precision is passed explicitly by the caller —
//! the rest of the system uses 4 for zone-index cells and 6 for fine
//! enrichment (see `config::GeohashPrecision`).

const BASE32: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Top,
    Bottom,
    Left,
    Right,
}

/// Encodes `(lat, lon)` to a base-32 geohash string of the given precision.
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut out = String::with_capacity(precision);
    let mut even_bit = true; // longitude goes first
    let mut bit = 0u8;
    let mut ch = 0u8;

    while out.len() < precision {
        if even_bit {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                ch |= 1 << (4 - bit);
                lon_range.0 = mid;
            } else {
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                ch |= 1 << (4 - bit);
                lat_range.0 = mid;
            } else {
                lat_range.1 = mid;
            }
        }
        even_bit = !even_bit;

        if bit < 4 {
            bit += 1;
        } else {
            out.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    out
}

/// Standard base-32 even/odd-row neighbour maps (Niemeyer's scheme).
const NEIGHBOURS: [[&str; 4]; 2] = [
    // even-length prefix (parity 0)
    [
        "p0r21436x8zb9dcf5h7kjnmqesgutwvy", // top (north)
        "14365h7k9dcfesgujnmqp0r2twvyx8zb", // bottom (south)
        "238967debc01fg45kmstqrwxuvhjyznp", // left (west)
        "bc01fg45238967deuvhjyznpkmstqrwx", // right (east)
    ],
    // odd-length prefix (parity 1)
    [
        "bc01fg45238967deuvhjyznpkmstqrwx", // top (north)
        "238967debc01fg45kmstqrwxuvhjyznp", // bottom (south)
        "14365h7k9dcfesgujnmqp0r2twvyx8zb", // left (west)
        "p0r21436x8zb9dcf5h7kjnmqesgutwvy", // right (east)
    ],
];

const BORDERS: [[&str; 4]; 2] = [
    ["prxz", "028b", "0145hjnp", "bcfguvyz"],
    ["bcfguvyz", "0145hjnp", "028b", "prxz"],
];

fn dir_index(d: Direction) -> usize {
    match d {
        Direction::Top => 0,
        Direction::Bottom => 1,
        Direction::Left => 2,
        Direction::Right => 3,
    }
}

/// Computes the geohash cell adjacent to `cell` in `direction`, recursing
/// into the parent cell when the last character falls off the row/column
/// edge so that polar and meridian boundaries fall out naturally rather
/// than needing special-cased wraparound.
pub fn adjacent(cell: &str, direction: Direction) -> String {
    if cell.is_empty() {
        return String::new();
    }
    let cell_lower = cell.to_ascii_lowercase();
    let (parent, last_char) = cell_lower.split_at(cell_lower.len() - 1);
    let last_char = last_char.chars().next().unwrap();
    let parity = (cell_lower.len() - 1) % 2;
    let di = dir_index(direction);

    let parent = if BORDERS[parity][di].contains(last_char) && !parent.is_empty() {
        adjacent(parent, direction)
    } else {
        parent.to_string()
    };

    let idx = NEIGHBOURS[parity][di]
        .find(last_char)
        .expect("geohash cell must be built from the base-32 alphabet");
    let new_char = BASE32[idx] as char;

    format!("{parent}{new_char}")
}

/// Returns `cell` plus its 8 surrounding cells (4 cardinal + 4 diagonal),
/// 9 entries total, always distinct.
pub fn neighbours8(cell: &str) -> Vec<String> {
    let top = adjacent(cell, Direction::Top);
    let bottom = adjacent(cell, Direction::Bottom);
    let left = adjacent(cell, Direction::Left);
    let right = adjacent(cell, Direction::Right);
    let top_left = adjacent(&top, Direction::Left);
    let top_right = adjacent(&top, Direction::Right);
    let bottom_left = adjacent(&bottom, Direction::Left);
    let bottom_right = adjacent(&bottom, Direction::Right);

    vec![
        cell.to_string(),
        top,
        bottom,
        left,
        right,
        top_left,
        top_right,
        bottom_left,
        bottom_right,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn encode_known_point_matches_expected_prefix() {
        // Jack Tharpe's classic example, (lat, lon) ~ 42.6, -5.6 => "ezs42"
        let hash = encode(42.6, -5.6, 5);
        assert_eq!(hash, "ezs42");
    }

    #[test]
    fn encode_zero_zero_is_deterministic_and_fixed_length() {
        let a = encode(0.0, 0.0, 6);
        let b = encode(0.0, 0.0, 6);
        assert_eq!(a, b);
        assert_eq!(a.len(), 6);
    }

    #[test]
    fn neighbours8_has_nine_distinct_cells_for_many_points() {
        // property 1: for every cell of a fixed precision, neighbours8 has
        // exactly 9 distinct cells.
        let points = [
            (6.85, 80.93),
            (0.0, 0.0),
            (51.5, -0.1),
            (-33.9, 151.2),
            (35.0, 139.0),
            (89.9, 0.0),   // near north pole
            (-89.9, 179.9), // near south pole, near antimeridian
            (0.0, 179.9999),
            (0.0, -179.9999),
        ];

        for (lat, lon) in points {
            let cell = encode(lat, lon, 5);
            let ring = neighbours8(&cell);
            assert_eq!(ring.len(), 9, "cell {cell} should have 9 entries");
            let distinct: HashSet<_> = ring.iter().collect();
            assert_eq!(distinct.len(), 9, "cell {cell} ring must be all distinct: {ring:?}");
        }
    }

    #[test]
    fn neighbours8_each_non_centre_matches_one_adjacent_call() {
        let cell = encode(6.85, 80.93, 5);
        let ring = neighbours8(&cell);
        let directs = [
            adjacent(&cell, Direction::Top),
            adjacent(&cell, Direction::Bottom),
            adjacent(&cell, Direction::Left),
            adjacent(&cell, Direction::Right),
        ];
        let diagonals = [
            adjacent(&directs[0], Direction::Left),
            adjacent(&directs[0], Direction::Right),
            adjacent(&directs[1], Direction::Left),
            adjacent(&directs[1], Direction::Right),
        ];

        for non_centre in &ring[1..] {
            let is_cardinal = directs.contains(non_centre);
            let is_diagonal = diagonals.contains(non_centre);
            assert!(
                is_cardinal ^ is_diagonal,
                "{non_centre} should match exactly one of the 4 cardinal or 4 diagonal directions"
            );
        }
    }

    #[test]
    fn adjacent_recurses_across_parent_at_row_edges() {
        // A cell whose last char is a top border character in its parity
        // must recurse into its parent rather than silently producing a
        // cell in the wrong hemisphere.
        let cell = "u";
        let top = adjacent(cell, Direction::Top);
        assert_ne!(top, cell);
        assert_eq!(top.len(), cell.len());
    }
}
