//! End-to-end scenarios against `BihCellTreeLocator` (spec §8).

mod common;

use approx::assert_relative_eq;
use cell_locator::locator::bih::BihCellTreeLocator;
use cell_locator::{CellLocator, Dataset};

use common::{closest_point_dataset, grid_with_hole_dataset, octahedron_dataset, two_adjacent_tets_dataset, unit_cube_dataset};

#[test]
fn unit_cube_contains_centre_not_outside_point() {
    let dataset = unit_cube_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    assert_eq!(locator.find_cell([0.5, 0.5, 0.5].into()), Some(0));
    assert_eq!(locator.find_cell([2.0, 0.0, 0.0].into()), None);
}

#[test]
fn unit_cube_ray_hits_at_one_third() {
    let dataset = unit_cube_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    let hit = locator.intersect_with_line([-1.0, 0.5, 0.5].into(), [2.0, 0.5, 0.5].into(), 1e-6).unwrap();
    assert_relative_eq!(hit.t, 1.0 / 3.0, epsilon = 1e-6);
    assert_eq!(hit.cell_id, 0);
}

#[test]
fn adjacent_tets_find_cell_on_either_side_and_each_cell_owns_exactly_one_leaf() {
    let dataset = two_adjacent_tets_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    assert_eq!(locator.find_cell([0.1, 0.1, 0.1].into()), Some(0));
    assert_eq!(locator.find_cell([0.9, 0.9, 0.9].into()), Some(1));

    let all_cells = locator.find_cells_within_bounds(dataset.bounds());
    let mut ids = all_cells.clone();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), all_cells.len(), "BIH partitions cells into disjoint leaves");
}

#[test]
fn adjacent_tets_all_hits_ordered_by_t() {
    let dataset = two_adjacent_tets_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    let hits = locator.intersect_with_line_all([-1.0, 0.25, 0.25].into(), [2.0, 0.25, 0.25].into(), 1e-6);
    assert_eq!(hits.len(), 2);
    assert!(hits[0].t < hits[1].t);
    assert_eq!(hits[0].cell_id, 0);
    assert_eq!(hits[1].cell_id, 1);
}

#[test]
fn octahedron_contains_centre_and_is_hit_along_x() {
    let dataset = octahedron_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    assert_eq!(locator.find_cell([0.0, 0.0, 0.0].into()), Some(0));
    let hit = locator.intersect_with_line([-2.0, 0.0, 0.0].into(), [2.0, 0.0, 0.0].into(), 1e-6).unwrap();
    assert_relative_eq!(hit.x.x, -1.0, epsilon = 1e-6);
}

#[test]
fn closest_point_within_radius_respects_the_bound() {
    let dataset = closest_point_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    let x = [5.0, 0.0, 0.0].into();
    assert!(locator.find_closest_point_within_radius(x, 1.0).is_none());
    let hit = locator.find_closest_point_within_radius(x, 2.0).unwrap();
    assert_eq!(hit.cell_id, 0);
}

#[test]
fn rebuild_is_idempotent_when_dataset_is_unchanged() {
    let dataset = unit_cube_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    let first = locator.build().unwrap();
    let second = locator.build().unwrap();
    assert_eq!(first, second);
}

#[test]
fn shallow_copy_answers_the_same_queries_without_rebuilding() {
    let dataset = unit_cube_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    let copy = locator.shallow_copy(&dataset);
    assert_eq!(copy.find_cell([0.5, 0.5, 0.5].into()), Some(0));
}

#[test]
fn grid_with_hole_ray_from_inside_one_partition_finds_every_non_hole_cell() {
    // 973 cells comfortably forces internal splits under the BIH default
    // of 8 cells per node, unlike the ≤2-cell datasets used above. The ray
    // starts *inside* the grid, deep within whichever partition the root
    // split puts it in, so a near/far mix-up in `intersect_all` would
    // search the wrong subtree instead of merely reordering hits.
    let (dataset, _) = grid_with_hole_dataset();
    let mut locator = BihCellTreeLocator::new(&dataset);
    locator.build().unwrap();

    let hits = locator.intersect_with_line_all([0.5, 4.5, 4.5].into(), [9.5, 4.5, 4.5].into(), 1e-6);
    assert_eq!(hits.len(), 7, "row at y=4.5,z=4.5 skips the 3 hole cells out of 10");
    for pair in hits.windows(2) {
        assert!(pair[0].t < pair[1].t);
    }
    let mut ids: Vec<_> = hits.iter().map(|h| h.cell_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 7);
}

#[test]
fn retain_cell_lists_off_drops_cell_returning_queries() {
    let dataset = unit_cube_dataset();
    let mut config = cell_locator::locator::base::LocatorConfig::bih_defaults();
    config.set_retain_cell_lists(false);
    let mut locator = BihCellTreeLocator::with_config(&dataset, config);
    locator.build().unwrap();

    assert_eq!(locator.find_cell([0.5, 0.5, 0.5].into()), None);
    assert!(locator.intersect_with_line([-1.0, 0.5, 0.5].into(), [2.0, 0.5, 0.5].into(), 1e-6).is_none());
    assert!(locator.find_cells_within_bounds(dataset.bounds()).is_empty());
}
