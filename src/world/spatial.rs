//! Sparse hash grid of actor screen footprints for viewport queries

use ahash::AHashMap;

use crate::core::types::{ActorId, WPos, WORLD_UNITS_PER_CELL};

/// Sparse grid keyed by where an actor lands on screen.
///
/// Actors are bucketed by `(x, y - z)`, the ground position their projection
/// covers, so an elevated actor is found by the rectangle it is drawn in
/// rather than the one it stands over.
pub struct ScreenMap {
    cell_size: i32,
    /// Extra cells searched around a query box for sprites larger than a cell
    margin: i32,
    cells: AHashMap<(i32, i32), Vec<ActorId>>,
    placed: AHashMap<ActorId, (i32, i32)>,
}

impl ScreenMap {
    pub fn new(cell_size: i32, margin: i32) -> Self {
        Self {
            cell_size: cell_size.max(1),
            margin: margin.max(0),
            cells: AHashMap::new(),
            placed: AHashMap::new(),
        }
    }

    #[inline]
    fn cell_coord(&self, pos: WPos) -> (i32, i32) {
        (
            pos.x.div_euclid(self.cell_size),
            (pos.y - pos.z).div_euclid(self.cell_size),
        )
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.placed.clear();
    }

    pub fn len(&self) -> usize {
        self.placed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }

    /// Insert or move an actor.
    pub fn insert(&mut self, actor: ActorId, pos: WPos) {
        self.remove(actor);
        let coord = self.cell_coord(pos);
        self.cells.entry(coord).or_default().push(actor);
        self.placed.insert(actor, coord);
    }

    pub fn remove(&mut self, actor: ActorId) {
        if let Some(coord) = self.placed.remove(&actor) {
            if let Some(cell) = self.cells.get_mut(&coord) {
                cell.retain(|&a| a != actor);
                if cell.is_empty() {
                    self.cells.remove(&coord);
                }
            }
        }
    }

    /// Actors in cells overlapping the box, row by row; insertion order within a cell.
    pub fn query_box(&self, top_left: WPos, bottom_right: WPos) -> Vec<ActorId> {
        let (x0, y0) = self.cell_coord(top_left.with_z(0));
        let (x1, y1) = self.cell_coord(bottom_right.with_z(0));
        let (x0, x1) = (x0.min(x1) - self.margin, x0.max(x1) + self.margin);
        let (y0, y1) = (y0.min(y1) - self.margin, y0.max(y1) + self.margin);

        let area = (x1 - x0 + 1) as i64 * (y1 - y0 + 1) as i64;
        if area > self.cells.len() as i64 {
            // Fewer occupied cells than cells in the box: scan the occupied ones
            let mut hits: Vec<((i32, i32), &Vec<ActorId>)> = self
                .cells
                .iter()
                .filter(|((cx, cy), _)| (x0..=x1).contains(cx) && (y0..=y1).contains(cy))
                .map(|(coord, actors)| (*coord, actors))
                .collect();
            hits.sort_by_key(|((cx, cy), _)| (*cy, *cx));
            return hits.into_iter().flat_map(|(_, a)| a.iter().copied()).collect();
        }

        (y0..=y1)
            .flat_map(move |cy| (x0..=x1).map(move |cx| (cx, cy)))
            .filter_map(|coord| self.cells.get(&coord))
            .flat_map(|cell| cell.iter().copied())
            .collect()
    }
}

impl Default for ScreenMap {
    fn default() -> Self {
        Self::new(WORLD_UNITS_PER_CELL * 4, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_finds_inside_only() {
        let mut map = ScreenMap::new(1024, 0);
        map.insert(ActorId(1), WPos::new(500, 500, 0));
        map.insert(ActorId(2), WPos::new(10_000, 10_000, 0));

        let found = map.query_box(WPos::ZERO, WPos::new(2000, 2000, 0));
        assert_eq!(found, vec![ActorId(1)]);
    }

    #[test]
    fn test_preserves_insertion_order_in_cell() {
        let mut map = ScreenMap::new(1024, 0);
        for id in [3, 1, 2] {
            map.insert(ActorId(id), WPos::new(100, 100, 0));
        }
        assert_eq!(
            map.query_box(WPos::ZERO, WPos::new(1000, 1000, 0)),
            vec![ActorId(3), ActorId(1), ActorId(2)]
        );
    }

    #[test]
    fn test_elevated_actor_keyed_by_screen_footprint() {
        let mut map = ScreenMap::new(1024, 0);
        // Stands over y = 5000 but is drawn where y = 1000 would be
        map.insert(ActorId(9), WPos::new(100, 5000, 4000));

        assert_eq!(map.query_box(WPos::ZERO, WPos::new(2000, 2000, 0)), vec![ActorId(9)]);
        assert!(map
            .query_box(WPos::new(0, 4500, 0), WPos::new(2000, 5500, 0))
            .is_empty());
    }

    #[test]
    fn test_move_and_remove() {
        let mut map = ScreenMap::new(1024, 0);
        map.insert(ActorId(1), WPos::new(100, 100, 0));
        map.insert(ActorId(1), WPos::new(9000, 100, 0));
        assert_eq!(map.len(), 1);
        assert!(map.query_box(WPos::ZERO, WPos::new(1000, 1000, 0)).is_empty());

        map.remove(ActorId(1));
        assert!(map.is_empty());
    }

    #[test]
    fn test_sparse_scan_matches_dense_order() {
        let mut map = ScreenMap::new(10, 0);
        map.insert(ActorId(1), WPos::new(5, 25, 0));
        map.insert(ActorId(2), WPos::new(25, 5, 0));
        map.insert(ActorId(3), WPos::new(15, 5, 0));

        // Large box takes the sparse path
        let found = map.query_box(WPos::new(-100_000, -100_000, 0), WPos::new(100_000, 100_000, 0));
        assert_eq!(found, vec![ActorId(3), ActorId(2), ActorId(1)]);
    }
}
