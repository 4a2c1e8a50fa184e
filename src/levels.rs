//! Level identifiers.
//!
//! The ordered name/ID table the editor surfaces in its level picker. The
//! order is significant: UI code addresses levels by position in this list,
//! so lookups go both ways (ID → position, position → ID).

use indexmap::IndexMap;

lazy_static! {
    pub static ref LEVEL_IDS: IndexMap<&'static str, u16> = {
        let mut m = IndexMap::new();
        m.insert("Big Boo's Haunt", 0x04);
        m.insert("Cool Cool Mountain", 0x05);
        m.insert("Inside Castle", 0x06);
        m.insert("Hazy Maze Cave", 0x07);
        m.insert("Shifting Sand Land", 0x08);
        m.insert("Bob-omb Battlefield", 0x09);
        m.insert("Snowman's Land", 0x0A);
        m.insert("Wet Dry World", 0x0B);
        m.insert("Jolly Roger Bay", 0x0C);
        m.insert("Tiny Huge Island", 0x0D);
        m.insert("Tick Tock Clock", 0x0E);
        m.insert("Rainbow Ride", 0x0F);
        m.insert("Castle Grounds", 0x10);
        m.insert("Bowser Course 1", 0x11);
        m.insert("Vanish Cap", 0x12);
        m.insert("Bowser Course 2", 0x13);
        m.insert("Secret Aquarium", 0x14);
        m.insert("Bowser Course 3", 0x15);
        m.insert("Lethal Lava Land", 0x16);
        m.insert("Dire Dire Docks", 0x17);
        m.insert("Whomp's Fortress", 0x18);
        m.insert("End Cake Picture", 0x19);
        m.insert("Castle Courtyard", 0x1A);
        m.insert("Peach's Secret Slide", 0x1B);
        m.insert("Metal Cap", 0x1C);
        m.insert("Wing Cap", 0x1D);
        m.insert("Bowser Battle 1", 0x1E);
        m.insert("Rainbow Clouds", 0x1F);
        m.insert("Bowser Battle 2", 0x21);
        m.insert("Bowser Battle 3", 0x22);
        m.insert("Tall Tall Mountain", 0x24);
        m
    };
}

/// Position of a level ID in the table, or 0 when unknown.
pub fn level_index_by_id(id: u16) -> usize {
    LEVEL_IDS
        .values()
        .position(|&v| v == id)
        .unwrap_or(0)
}

/// Level ID at a table position, if in range.
pub fn level_id_from_index(index: usize) -> Option<u16> {
    LEVEL_IDS.values().nth(index).copied()
}

/// Display name for a level ID, if the table knows it.
pub fn level_name_by_id(id: u16) -> Option<&'static str> {
    LEVEL_IDS
        .iter()
        .find_map(|(name, &v)| if v == id { Some(*name) } else { None })
}
