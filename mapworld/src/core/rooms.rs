//! Fixed room-name vocabulary for named graphs.

pub const ROOM_NAMES: &[&str] = &[
    "Kitchen",
    "Bedroom",
    "Bathroom",
    "Living Room",
    "Dining Room",
    "Hallway",
    "Office",
    "Library",
    "Pantry",
    "Laundry Room",
    "Garage",
    "Attic",
    "Basement",
    "Nursery",
    "Closet",
    "Study",
    "Gym",
    "Music Room",
    "Game Room",
    "Guest Room",
    "Sunroom",
    "Storage Room",
    "Workshop",
    "Wine Cellar",
    "Home Theater",
    "Playroom",
    "Mudroom",
    "Foyer",
    "Conservatory",
    "Balcony",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_are_unique_case_insensitively() {
        let lowered: HashSet<String> = ROOM_NAMES.iter().map(|n| n.to_lowercase()).collect();
        assert_eq!(lowered.len(), ROOM_NAMES.len());
    }
}
