//! Dash pattern encoding.
//!
//! A dash pattern is flattened into a one-byte-per-pixel lookup table
//! covering one period of the pattern. Solid pixels hold 0; gap pixels
//! hold their distance in pixels to the nearest solid pixel, searching
//! cyclically in both directions. The stroke shader samples the table by
//! distance along the line and discards fragments with a nonzero cell.

use std::collections::HashMap;

/// One encoded dash period, ready for upload as a 1D luminance texture.
#[derive(Clone, Debug, PartialEq)]
pub struct DashTable {
    pub cells: Vec<u8>,
    /// Pattern period in pixels, before rounding to whole cells.
    pub period: f32,
}

impl DashTable {
    /// A single solid cell: the encoding of the empty pattern.
    fn solid() -> Self {
        Self {
            cells: vec![0],
            period: 1.0,
        }
    }
}

/// Encode a dash pattern. The pattern must already be normalized to even
/// length with non-negative finite entries.
pub fn encode_dash_table(pattern: &[f32]) -> DashTable {
    let period: f32 = pattern.iter().sum();
    if pattern.is_empty() || period <= 0.0 {
        return DashTable::solid();
    }
    let cell_count = (period.round() as usize).max(1);

    // Alternating entries are dash then gap; mark each pixel cell solid
    // when its position falls inside a dash span.
    let mut solid = vec![false; cell_count];
    for (i, cell) in solid.iter_mut().enumerate() {
        let mut pos = i as f32;
        for (k, len) in pattern.iter().enumerate() {
            if pos < *len {
                *cell = k % 2 == 0;
                break;
            }
            pos -= len;
        }
    }

    if !solid.contains(&true) {
        return DashTable {
            cells: vec![u8::MAX; cell_count],
            period,
        };
    }

    let cells = solid
        .iter()
        .enumerate()
        .map(|(i, &is_solid)| {
            if is_solid {
                0
            } else {
                let dist = cyclic_distance_to_solid(&solid, i);
                dist.min(u8::MAX as usize) as u8
            }
        })
        .collect();
    DashTable { cells, period }
}

fn cyclic_distance_to_solid(solid: &[bool], from: usize) -> usize {
    let n = solid.len();
    for step in 1..n {
        let back = (from + n - step) % n;
        let fwd = (from + step) % n;
        if solid[back] || solid[fwd] {
            return step;
        }
    }
    n
}

/// Memoizes encoded tables by pattern so repeated strokes with the same
/// dash reuse one texture. Keys are the joined pattern entries.
#[derive(Debug, Default)]
pub struct DashTableCache {
    tables: HashMap<String, DashTable>,
}

impl DashTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_for(pattern: &[f32]) -> String {
        let mut key = String::new();
        for (i, v) in pattern.iter().enumerate() {
            if i > 0 {
                key.push(',');
            }
            key.push_str(&v.to_string());
        }
        key
    }

    pub fn get_or_encode(&mut self, pattern: &[f32]) -> &DashTable {
        let key = Self::key_for(pattern);
        self.tables
            .entry(key)
            .or_insert_with(|| encode_dash_table(pattern))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pattern_is_single_solid_cell() {
        let table = encode_dash_table(&[]);
        assert_eq!(table.cells, vec![0]);
        assert_eq!(table.period, 1.0);
    }

    #[test]
    fn test_four_on_two_off() {
        let table = encode_dash_table(&[4.0, 2.0]);
        assert_eq!(table.cells, vec![0, 0, 0, 0, 1, 1]);
        assert_eq!(table.period, 6.0);
    }

    #[test]
    fn test_gap_distance_is_min_of_both_directions() {
        let table = encode_dash_table(&[2.0, 6.0]);
        // Gap cells walk out from the dash and back in toward its wrap.
        assert_eq!(table.cells, vec![0, 0, 1, 2, 3, 3, 2, 1]);
    }

    #[test]
    fn test_all_gap_pattern_saturates() {
        let table = encode_dash_table(&[0.0, 4.0]);
        assert_eq!(table.cells, vec![u8::MAX; 4]);
    }

    #[test]
    fn test_huge_gap_clamps_to_byte() {
        let table = encode_dash_table(&[1.0, 600.0]);
        assert_eq!(table.cells[0], 0);
        assert_eq!(*table.cells.iter().max().unwrap(), u8::MAX);
        assert_eq!(table.cells.len(), 601);
    }

    #[test]
    fn test_cache_reuses_encoding() {
        let mut cache = DashTableCache::new();
        let first = cache.get_or_encode(&[4.0, 2.0]).clone();
        let second = cache.get_or_encode(&[4.0, 2.0]).clone();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        cache.get_or_encode(&[1.0, 1.0]);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_key_joins_entries() {
        assert_eq!(DashTableCache::key_for(&[4.0, 2.0]), "4,2");
        assert_eq!(DashTableCache::key_for(&[]), "");
    }
}
