use log::debug;
use sm64rom::rom::{Rom, SEG_DYNAMIC, SEG_STATIC};
use std::env;
use std::process;

fn main() {
    // Initialize logging
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    // Display help information if no ROM file provided
    if args.len() < 2 {
        println!("sm64rom - inspect a Super Mario 64 ROM image");
        println!();
        println!("Usage: {} <rom file>", args[0]);
        println!();
        println!("Accepts .z64 (big-endian), .v64 (byte-swapped) and .n64");
        println!("(little-endian) images; the byte order is detected from the");
        println!("file itself, not the extension. Prints the internal name,");
        println!("region, build type and the mapped segment windows.");
        process::exit(0);
    }

    let rom_path = &args[1];
    debug!("loading ROM image: {}", rom_path);

    let rom = match Rom::load(rom_path) {
        Ok(rom) => rom,
        Err(e) => {
            eprintln!("Error: could not load '{}'", rom_path);
            eprintln!("  {}", e);
            process::exit(1);
        }
    };

    let constants = rom.constants();
    println!("ROM:            {}", rom.file_name());
    println!("Internal name:  {}", rom.internal_name());
    println!("Size:           {:#x} bytes", rom.len());
    println!("Endian:         {}", rom.endianness().as_text());
    println!("Region:         {}", rom.region().as_text());
    println!("Type:           {}", rom.build_type().as_text());
    println!();
    println!("Macro presets:   {:#010x}", constants.macro_preset_table);
    println!("Special presets: {:#010x}", constants.special_preset_table);
    for seg in [SEG_DYNAMIC, SEG_STATIC] {
        let table = rom.segments();
        if table.is_mapped(seg) {
            let kind = if table.is_compressed(seg) {
                "MIO0 decompressed"
            } else {
                "raw"
            };
            let len = table.segment_bytes(seg).map(|b| b.len()).unwrap_or(0);
            println!("Segment {:#04x}:    {} ({:#x} bytes)", seg, kind, len);
        } else {
            println!("Segment {:#04x}:    unmapped", seg);
        }
    }
}
