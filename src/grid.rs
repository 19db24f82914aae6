//! Projection of the flat plant list onto a fixed-size render grid.

use crate::model::{GridPos, Plant};
use tracing::warn;

/// A fixed-extent grid of cells, each empty or holding one plant.
///
/// The projection is deterministic: the same plant list and extent always
/// produce the same grid. Plants outside the extent are dropped with a
/// warning instead of crashing the view; if two plants claim one cell the
/// first in list order wins.
#[derive(Clone, Debug)]
pub struct FarmGrid {
    width: u16,
    height: u16,
    cells: Vec<Option<Plant>>,
}

impl FarmGrid {
    pub fn project(plants: &[Plant], width: u16, height: u16) -> Self {
        let mut cells: Vec<Option<Plant>> = vec![None; width as usize * height as usize];
        for plant in plants {
            let GridPos { x, y } = plant.position;
            if x >= width || y >= height {
                warn!(id = %plant.id, x, y, "plant outside grid extent, skipping");
                continue;
            }
            let idx = y as usize * width as usize + x as usize;
            if cells[idx].is_some() {
                warn!(id = %plant.id, x, y, "duplicate plant position, keeping first");
                continue;
            }
            cells[idx] = Some(plant.clone());
        }
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// The plant occupying a cell, or None for empty/plantable cells and
    /// coordinates outside the extent.
    pub fn cell(&self, x: u16, y: u16) -> Option<&Plant> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y as usize * self.width as usize + x as usize].as_ref()
    }

    pub fn is_empty(&self, pos: GridPos) -> bool {
        pos.x < self.width && pos.y < self.height && self.cell(pos.x, pos.y).is_none()
    }

    pub fn plants(&self) -> impl Iterator<Item = &Plant> {
        self.cells.iter().filter_map(|c| c.as_ref())
    }

    /// Positions that a bulk watering pass should visit, in row-major order.
    pub fn due_for_water(&self) -> Vec<GridPos> {
        self.plants()
            .filter(|p| p.needs_water())
            .map(|p| p.position)
            .collect()
    }

    pub fn ready_count(&self) -> usize {
        self.plants().filter(|p| p.is_ready()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::plant_at;
    use crate::model::{PlantStatus, READY_STAGE};

    #[test]
    fn single_ready_plant_marks_exactly_one_cell() {
        let plants = vec![plant_at(2, 3, READY_STAGE)];
        let grid = FarmGrid::project(&plants, 5, 5);

        let mut ready = 0;
        let mut empty = 0;
        for y in 0..5 {
            for x in 0..5 {
                match grid.cell(x, y) {
                    Some(p) => {
                        assert_eq!((x, y), (2, 3));
                        assert_eq!(p.status(), PlantStatus::Ready);
                        ready += 1;
                    }
                    None => empty += 1,
                }
            }
        }
        assert_eq!(ready, 1);
        assert_eq!(empty, 24);
    }

    #[test]
    fn out_of_bounds_plant_is_ignored() {
        let plants = vec![plant_at(7, 1, 1), plant_at(1, 1, 1)];
        let grid = FarmGrid::project(&plants, 5, 5);
        assert_eq!(grid.plants().count(), 1);
        assert!(grid.cell(1, 1).is_some());
    }

    #[test]
    fn duplicate_position_keeps_first() {
        let mut second = plant_at(1, 1, 2);
        second.id = "second".to_string();
        let plants = vec![plant_at(1, 1, 0), second];
        let grid = FarmGrid::project(&plants, 5, 5);
        assert_eq!(grid.cell(1, 1).unwrap().id, "p-1-1");
    }

    #[test]
    fn projection_is_deterministic() {
        let plants = vec![plant_at(0, 0, 1), plant_at(4, 4, 2)];
        let a = FarmGrid::project(&plants, 5, 5);
        let b = FarmGrid::project(&plants, 5, 5);
        for y in 0..5 {
            for x in 0..5 {
                assert_eq!(
                    a.cell(x, y).map(|p| &p.id),
                    b.cell(x, y).map(|p| &p.id)
                );
            }
        }
    }

    #[test]
    fn due_for_water_lists_unwatered_and_withered() {
        let mut dry = plant_at(0, 0, 1);
        dry.watered = false;
        let mut withered = plant_at(1, 0, 2);
        withered.withered = true;
        let fine = plant_at(2, 0, 1); // watered=true fixture

        let grid = FarmGrid::project(&[dry, withered, fine], 5, 5);
        let due = grid.due_for_water();
        assert_eq!(due.len(), 2);
        assert!(due.contains(&GridPos::new(0, 0)));
        assert!(due.contains(&GridPos::new(1, 0)));
    }
}
