use boxnet_core::corner_world::{BoxLocation, EMPTY};
use boxnet_core::goals::Goals;
use boxnet_core::{CornerLabel, CornerPosition, CornerWorld, Direction, GridWorld, Position};
use proptest::prelude::*;

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![
        Just(Direction::Up),
        Just(Direction::Down),
        Just(Direction::Left),
        Just(Direction::Right),
    ]
}

fn arb_cell(rows: usize, cols: usize) -> impl Strategy<Value = Position> {
    (0..rows, 0..cols).prop_map(|(row, col)| Position::new(row, col))
}

/// Two colors on a 3x5 grid, the second with up to three stacked occurrences.
fn arb_grid() -> impl Strategy<Value = GridWorld> {
    (
        prop::collection::vec(arb_cell(3, 5), 1..3),
        prop::collection::vec(arb_cell(3, 5), 1..4),
    )
        .prop_map(|(red, blue)| {
            let mut world = GridWorld::new(3, 5);
            world.add_box("red", red).unwrap();
            world.add_box("blue", blue).unwrap();
            world
        })
}

fn multiset(positions: &[Position]) -> Vec<Position> {
    let mut sorted = positions.to_vec();
    sorted.sort();
    sorted
}

/// 2x2 corner world, one agent per cell, three boxes on distinct corners.
fn corner_world() -> CornerWorld {
    let mut world = CornerWorld::new(2, 2);
    world
        .setup_scenario(
            &[
                (
                    "red".to_string(),
                    Some(CornerPosition::new(0, 0, CornerLabel::SE)),
                ),
                (
                    "blue".to_string(),
                    Some(CornerPosition::new(1, 1, CornerLabel::NW)),
                ),
                (
                    "green".to_string(),
                    Some(CornerPosition::new(1, 1, CornerLabel::SE)),
                ),
            ],
            Goals::from([
                ("red".to_string(), vec![Position::new(1, 1)]),
                ("blue".to_string(), vec![Position::new(0, 0)]),
                ("green".to_string(), vec![Position::new(0, 1)]),
            ]),
            &[
                Position::new(0, 0),
                Position::new(0, 1),
                Position::new(1, 0),
                Position::new(1, 1),
            ],
        )
        .unwrap();
    world
}

/// Every placed box sits on exactly the corner that names it, and nothing else
/// is occupied.
fn assert_exclusive(world: &CornerWorld) -> Result<(), TestCaseError> {
    let occupancy = world.corner_occupancy();
    let held: Vec<_> = occupancy.iter().filter(|(_, c)| *c != EMPTY).collect();
    let placed: Vec<_> = world
        .boxes()
        .iter()
        .filter_map(|b| match b.location() {
            BoxLocation::Corner(at) => Some((at, b.color())),
            _ => None,
        })
        .collect();
    prop_assert_eq!(held.len(), placed.len());
    for (at, color) in placed {
        prop_assert!(held.contains(&&(at, color)));
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_moves_stay_in_range(
        mut world in arb_grid(),
        moves in prop::collection::vec((0..2usize, 0..4usize, arb_direction()), 1..30),
    ) {
        for (box_index, pick, direction) in moves {
            let before = world.boxes()[box_index].positions().to_vec();
            let source = before[pick % before.len()];
            match world.move_box(box_index, source, direction) {
                Ok(to) => {
                    prop_assert!(to.row < 3 && to.col < 5);
                    prop_assert!(world.boxes()[box_index].positions().contains(&to));
                }
                Err(_) => {
                    prop_assert_eq!(world.boxes()[box_index].positions(), before.as_slice());
                }
            }
        }
    }

    #[test]
    fn prop_moves_conserve_occurrences(
        mut world in arb_grid(),
        moves in prop::collection::vec((0..2usize, 0..4usize, arb_direction()), 1..30),
    ) {
        for (box_index, pick, direction) in moves {
            let before = world.boxes()[box_index].positions().to_vec();
            let source = before[pick % before.len()];
            if let Ok(to) = world.move_box(box_index, source, direction) {
                let after = world.boxes()[box_index].positions().to_vec();
                prop_assert_eq!(after.len(), before.len());

                let mut expected = before.clone();
                let slot = expected.iter().position(|p| *p == source).unwrap();
                expected[slot] = to;
                prop_assert_eq!(multiset(&after), multiset(&expected));
            }
        }
    }

    #[test]
    fn prop_corners_hold_one_box(
        moves in prop::collection::vec((0..4usize, 0..3usize, 0..16usize), 1..40),
    ) {
        let mut world = corner_world();
        let targets: Vec<CornerPosition> = world.corners().iter().map(|c| c.position()).collect();
        let colors = ["red", "blue", "green"];

        for (agent, color, target) in moves {
            let target = targets[target];
            let target_was = world.corner(target).and_then(|c| c.occupant());
            let before = world.corner_occupancy().iter().map(|(p, c)| (*p, c.to_string())).collect::<Vec<_>>();

            let result = world.move_box_corner_to_corner(agent, colors[color], target);
            if target_was.is_some() {
                prop_assert!(result.is_err());
            }
            if result.is_err() {
                let after = world.corner_occupancy().iter().map(|(p, c)| (*p, c.to_string())).collect::<Vec<_>>();
                prop_assert_eq!(after, before);
            }
            assert_exclusive(&world)?;
        }
    }
}
