//! MIO0 block decompression.
//!
//! MIO0 is the block-compression scheme used for the game's compressed
//! segments. A block carries a 16-byte header (magic, decompressed length,
//! and the offsets of two payload streams), then a bitstream of layout
//! flags: a 1 bit copies one literal byte from the raw stream, a 0 bit
//! copies a 3..18 byte run from earlier output, addressed by a 12-bit
//! back-reference read from the compressed stream.
//!
//! The rest of the crate treats this as a pure function over one block:
//! exactly the byte range believed to hold a block goes in, the segment's
//! authoritative contents come out.

use crate::error::RomError;

/// "MIO0" in ASCII, the block magic.
pub const MAGIC: u32 = 0x4D49_4F30;

const HEADER_LEN: usize = 16;

fn read_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let b = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Decode one MIO0 block. Fails with [`RomError::CorruptBlock`] when the
/// magic is absent or any stream runs out before the stated output length
/// is reached.
pub fn decode(block: &[u8]) -> Result<Vec<u8>, RomError> {
    if block.len() < HEADER_LEN {
        return Err(RomError::CorruptBlock(format!(
            "block is {} bytes, shorter than the header",
            block.len()
        )));
    }
    if read_u32(block, 0) != Some(MAGIC) {
        return Err(RomError::CorruptBlock("missing MIO0 magic".into()));
    }

    let out_len = read_u32(block, 4).unwrap() as usize;
    let comp_start = read_u32(block, 8).unwrap() as usize;
    let raw_start = read_u32(block, 12).unwrap() as usize;
    if comp_start > block.len() || raw_start > block.len() {
        return Err(RomError::CorruptBlock(
            "stream offsets point past the end of the block".into(),
        ));
    }

    let mut out = Vec::with_capacity(out_len);
    let mut layout = HEADER_LEN; // bit cursor, MSB first
    let mut bit = 0u8;
    let mut comp = comp_start;
    let mut raw = raw_start;

    while out.len() < out_len {
        let flags = *block
            .get(layout)
            .ok_or_else(|| RomError::CorruptBlock("layout stream exhausted".into()))?;
        let is_literal = flags & (0x80 >> bit) != 0;
        bit += 1;
        if bit == 8 {
            bit = 0;
            layout += 1;
        }

        if is_literal {
            let byte = *block
                .get(raw)
                .ok_or_else(|| RomError::CorruptBlock("raw stream exhausted".into()))?;
            raw += 1;
            out.push(byte);
        } else {
            let pair = block
                .get(comp..comp + 2)
                .ok_or_else(|| RomError::CorruptBlock("compressed stream exhausted".into()))?;
            comp += 2;
            let length = (pair[0] >> 4) as usize + 3;
            let distance = ((pair[0] as usize & 0x0F) << 8 | pair[1] as usize) + 1;
            if distance > out.len() {
                return Err(RomError::CorruptBlock(format!(
                    "back-reference distance {} exceeds {} bytes of output",
                    distance,
                    out.len()
                )));
            }
            // Runs may overlap their own output, so copy byte by byte.
            for _ in 0..length {
                let byte = out[out.len() - distance];
                out.push(byte);
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-assembled block: header, one layout byte, back-reference
    /// stream, raw stream.
    fn literal_block(payload: &[u8]) -> Vec<u8> {
        assert!(payload.len() <= 8);
        let mut block = Vec::new();
        block.extend_from_slice(&MAGIC.to_be_bytes());
        block.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        block.extend_from_slice(&17u32.to_be_bytes()); // comp stream (empty)
        block.extend_from_slice(&17u32.to_be_bytes()); // raw stream
        block.push(0xFF); // all literals
        block.extend_from_slice(payload);
        block
    }

    #[test]
    fn decodes_all_literal_block() {
        let block = literal_block(&[1, 2, 3, 4, 5]);
        assert_eq!(decode(&block).unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn decodes_back_reference() {
        // "ABC" as literals, then a run of 3 repeating from distance 3,
        // giving "ABCABC".
        let mut block = Vec::new();
        block.extend_from_slice(&MAGIC.to_be_bytes());
        block.extend_from_slice(&6u32.to_be_bytes());
        block.extend_from_slice(&17u32.to_be_bytes()); // comp stream
        block.extend_from_slice(&19u32.to_be_bytes()); // raw stream
        block.push(0b1110_0000); // three literals then one reference
        block.push(0x00); // length 0+3, distance high nibble 0
        block.push(0x02); // distance 2+1 = 3
        block.extend_from_slice(b"ABC");
        assert_eq!(decode(&block).unwrap(), b"ABCABC");
    }

    #[test]
    fn overlapping_run_replicates_last_byte() {
        // One literal then a run of 4 at distance 1: "AAAAA".
        let mut block = Vec::new();
        block.extend_from_slice(&MAGIC.to_be_bytes());
        block.extend_from_slice(&5u32.to_be_bytes());
        block.extend_from_slice(&17u32.to_be_bytes());
        block.extend_from_slice(&19u32.to_be_bytes());
        block.push(0b1000_0000);
        block.push(0x10); // length 1+3 = 4
        block.push(0x00); // distance 1
        block.push(b'A');
        assert_eq!(decode(&block).unwrap(), b"AAAAA");
    }

    #[test]
    fn missing_magic_is_corrupt() {
        let mut block = literal_block(&[1]);
        block[0] = 0x00;
        assert!(matches!(decode(&block), Err(RomError::CorruptBlock(_))));
    }

    #[test]
    fn truncated_streams_are_corrupt() {
        let mut block = literal_block(&[1, 2, 3]);
        block.truncate(block.len() - 2); // drop raw bytes
        assert!(matches!(decode(&block), Err(RomError::CorruptBlock(_))));
    }

    #[test]
    fn short_block_is_corrupt() {
        assert!(matches!(decode(&[0x4D, 0x49]), Err(RomError::CorruptBlock(_))));
    }
}
