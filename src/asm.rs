//! Static call-site recovery from the game's boot code.
//!
//! The true file window of segment 0x02 is not fixed across regional
//! builds: the game computes it at boot by calling its segment allocation
//! routine with the segment index and the window endpoints in the argument
//! registers. This module recovers those literals without running anything,
//! by walking the MIPS instruction stream of the known init function and
//! tracking which general-purpose registers currently hold a known literal.
//!
//! The tracking is deliberately minimal: only the instruction forms the
//! compiler uses to materialize constants (LUI, ADDIU/ADDI, ORI, and
//! register moves through ADDU/OR with $zero) produce known values. Every
//! other register write makes its destination unknown, and every call
//! makes the whole caller-saved set unknown, so a recovered argument can
//! never be a stale value inherited from an unrelated earlier call.

use crate::error::RomError;
use log::debug;

/// MIPS argument registers a0-a2, the three arguments captured per call.
pub const REG_A0: usize = 4;
pub const REG_A1: usize = 5;
pub const REG_A2: usize = 6;
const REG_RA: usize = 31;

/// Upper bound on decoded instructions per scan. A misidentified start
/// address must never walk the whole image.
pub const MAX_SCAN_INSTRUCTIONS: usize = 1024;

// Primary opcodes.
const OP_SPECIAL: u32 = 0x00;
const OP_JAL: u32 = 0x03;
const OP_ADDI: u32 = 0x08;
const OP_ADDIU: u32 = 0x09;
const OP_ANDI: u32 = 0x0C;
const OP_ORI: u32 = 0x0D;
const OP_LUI: u32 = 0x0F;

// SPECIAL function codes.
const FN_JR: u32 = 0x08;
const FN_JALR: u32 = 0x09;
const FN_ADDU: u32 = 0x21;
const FN_OR: u32 = 0x25;

/// One recovered subroutine invocation: where the call instruction sits in
/// the file, the absolute RAM address it targets, and the literal values
/// known to be in a0/a1/a2 when the call transfers. `None` means the
/// register's value could not be confirmed; consumers treating these as 0
/// must treat 0 as "not confirmed".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallSite {
    pub file_offset: u32,
    pub target: u32,
    pub args: [Option<u32>; 3],
}

impl CallSite {
    pub fn a0(&self) -> u32 {
        self.args[0].unwrap_or(0)
    }
    pub fn a1(&self) -> u32 {
        self.args[1].unwrap_or(0)
    }
    pub fn a2(&self) -> u32 {
        self.args[2].unwrap_or(0)
    }
}

/// Per-register tracking state: either a literal known to be in the
/// register at this point in the straight-line scan, or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegValue {
    Known(u32),
    Unknown,
}

struct RegState {
    regs: [RegValue; 32],
}

impl RegState {
    fn new() -> Self {
        let mut regs = [RegValue::Unknown; 32];
        regs[0] = RegValue::Known(0); // $zero is hardwired
        RegState { regs }
    }

    fn get(&self, reg: usize) -> Option<u32> {
        match self.regs[reg] {
            RegValue::Known(v) => Some(v),
            RegValue::Unknown => None,
        }
    }

    fn set(&mut self, reg: usize, value: u32) {
        if reg != 0 {
            self.regs[reg] = RegValue::Known(value);
        }
    }

    fn clobber(&mut self, reg: usize) {
        if reg != 0 {
            self.regs[reg] = RegValue::Unknown;
        }
    }

    /// Forget everything a subroutine call may overwrite: v0-v1, a0-a3,
    /// t0-t9 and ra.
    fn clobber_caller_saved(&mut self) {
        for reg in 2..16 {
            self.clobber(reg);
        }
        self.clobber(24);
        self.clobber(25);
        self.clobber(REG_RA);
    }
}

/// Effect of one decoded instruction on the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    /// A register now holds a known literal.
    Set(usize, u32),
    /// A register was written with something we do not model.
    Clobber(usize),
    /// Direct call (JAL) to an absolute RAM address.
    Call(u32),
    /// Indirect call (JALR): clobbers the link register and, once it
    /// returns, the caller-saved set.
    IndirectCall(usize),
    /// JR — control leaves the straight-line body.
    Return,
    /// No register effect (branches, stores, nops, unmodeled opcodes that
    /// write no general-purpose register).
    None,
}

fn sign_extend16(imm: u32) -> u32 {
    imm as u16 as i16 as i32 as u32
}

/// Classify one instruction word. `ram_pc` is the RAM address of the word,
/// needed to resolve JAL's 26-bit region-relative target.
fn classify(word: u32, ram_pc: u32, regs: &RegState) -> Effect {
    let op = word >> 26;
    let rs = (word >> 21) as usize & 0x1F;
    let rt = (word >> 16) as usize & 0x1F;
    let rd = (word >> 11) as usize & 0x1F;
    let imm = word & 0xFFFF;

    match op {
        OP_SPECIAL => {
            let funct = word & 0x3F;
            match funct {
                FN_JR => Effect::Return,
                FN_JALR => Effect::IndirectCall(rd),
                FN_ADDU | FN_OR => {
                    // A move materializes as addu/or with $zero as one
                    // operand; anything else is unmodeled arithmetic.
                    let src = if rt == 0 {
                        Some(rs)
                    } else if rs == 0 {
                        Some(rt)
                    } else {
                        None
                    };
                    match src.and_then(|s| regs.get(s)) {
                        Some(v) => Effect::Set(rd, v),
                        None => Effect::Clobber(rd),
                    }
                }
                // SLL $zero,$zero,0 is the canonical nop.
                _ if rd == 0 => Effect::None,
                _ => Effect::Clobber(rd),
            }
        }
        OP_JAL => {
            let target = (ram_pc.wrapping_add(4) & 0xF000_0000) | ((word & 0x03FF_FFFF) << 2);
            Effect::Call(target)
        }
        OP_LUI => Effect::Set(rt, imm << 16),
        OP_ADDI | OP_ADDIU => match regs.get(rs) {
            Some(base) => Effect::Set(rt, base.wrapping_add(sign_extend16(imm))),
            None => Effect::Clobber(rt),
        },
        OP_ORI => match regs.get(rs) {
            Some(base) => Effect::Set(rt, base | imm),
            None => Effect::Clobber(rt),
        },
        OP_ANDI => match regs.get(rs) {
            Some(base) => Effect::Set(rt, base & imm),
            None => Effect::Clobber(rt),
        },
        // Remaining rt-writing immediate forms and every load: the value
        // is not a literal we can confirm.
        0x0A | 0x0B | 0x0E => Effect::Clobber(rt),
        0x20..=0x27 | 0x30..=0x37 => Effect::Clobber(rt),
        // Branches, stores, J, coprocessor traffic: no GPR effect.
        _ => Effect::None,
    }
}

fn read_word(image: &[u8], offset: usize) -> Option<u32> {
    let b = image.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Walk the function starting at RAM address `fn_ram_addr` and report every
/// direct call found before the function returns, with whatever argument
/// literals were confirmed at each call.
///
/// `ram_to_rom` is the region's code-segment base: the file offset of an
/// instruction at RAM address `a` is `a - ram_to_rom`. A start that falls
/// outside the image or off the word grid fails with
/// [`RomError::InvalidScanRegion`]; a body with no reachable return is cut
/// off after [`MAX_SCAN_INSTRUCTIONS`].
pub fn find_calls_in_function(
    image: &[u8],
    fn_ram_addr: u32,
    ram_to_rom: u32,
) -> Result<Vec<CallSite>, RomError> {
    let start = fn_ram_addr.wrapping_sub(ram_to_rom);
    if start % 4 != 0 || fn_ram_addr < ram_to_rom || start as usize >= image.len() {
        return Err(RomError::InvalidScanRegion {
            offset: start,
            len: image.len(),
        });
    }

    let mut calls = Vec::new();
    let mut regs = RegState::new();
    let mut offset = start as usize;

    for _ in 0..MAX_SCAN_INSTRUCTIONS {
        let word = match read_word(image, offset) {
            Some(w) => w,
            None => break, // ran off the end of the image
        };
        let ram_pc = offset as u32 + ram_to_rom;

        match classify(word, ram_pc, &regs) {
            Effect::Set(reg, value) => regs.set(reg, value),
            Effect::Clobber(reg) => regs.clobber(reg),
            Effect::None => {}
            Effect::Call(target) => {
                // The delay slot executes before the transfer, so its
                // register effect is visible to the callee.
                apply_delay_slot(image, offset + 4, ram_pc + 4, &mut regs);
                let site = CallSite {
                    file_offset: offset as u32,
                    target,
                    args: [regs.get(REG_A0), regs.get(REG_A1), regs.get(REG_A2)],
                };
                debug!(
                    "call site at {:#x}: jal {:#010x} a0={:x?} a1={:x?} a2={:x?}",
                    offset, target, site.args[0], site.args[1], site.args[2]
                );
                calls.push(site);
                regs.clobber_caller_saved();
                offset += 8;
                continue;
            }
            Effect::IndirectCall(link) => {
                apply_delay_slot(image, offset + 4, ram_pc + 4, &mut regs);
                regs.clobber(link);
                regs.clobber_caller_saved();
                offset += 8;
                continue;
            }
            Effect::Return => {
                apply_delay_slot(image, offset + 4, ram_pc + 4, &mut regs);
                break;
            }
        }
        offset += 4;
    }

    Ok(calls)
}

/// Apply the register effect of a jump's delay slot. Only plain effects
/// apply; a control-transfer in a delay slot is undefined on this
/// architecture and is ignored.
fn apply_delay_slot(image: &[u8], offset: usize, ram_pc: u32, regs: &mut RegState) {
    if let Some(word) = read_word(image, offset) {
        match classify(word, ram_pc, regs) {
            Effect::Set(reg, value) => regs.set(reg, value),
            Effect::Clobber(reg) => regs.clobber(reg),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Instruction encoders for building synthetic function bodies.
    fn lui(rt: usize, imm: u16) -> u32 {
        (OP_LUI << 26) | ((rt as u32) << 16) | imm as u32
    }
    fn addiu(rt: usize, rs: usize, imm: i16) -> u32 {
        (OP_ADDIU << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm as u16 as u32)
    }
    fn ori(rt: usize, rs: usize, imm: u16) -> u32 {
        (OP_ORI << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | imm as u32
    }
    fn jal(target: u32) -> u32 {
        (OP_JAL << 26) | ((target >> 2) & 0x03FF_FFFF)
    }
    fn jr_ra() -> u32 {
        (REG_RA as u32) << 21 | FN_JR
    }
    fn lw(rt: usize, rs: usize, imm: i16) -> u32 {
        (0x23 << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm as u16 as u32)
    }
    fn nop() -> u32 {
        0
    }

    const BASE: u32 = 0x8024_5000;

    fn image_of(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn captures_literal_arguments_at_a_call() {
        let image = image_of(&[
            addiu(REG_A0, 0, 0x02),
            lui(REG_A1, 0x0010),
            ori(REG_A1, REG_A1, 0x8A40),
            lui(REG_A2, 0x0011),
            ori(REG_A2, REG_A2, 0x4750),
            jal(0x8027_87D8),
            nop(),
            jr_ra(),
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, 0x8027_87D8);
        assert_eq!(calls[0].args, [Some(0x02), Some(0x0010_8A40), Some(0x0011_4750)]);
    }

    #[test]
    fn delay_slot_argument_is_visible_to_the_call() {
        let image = image_of(&[
            addiu(REG_A0, 0, 0x02),
            lui(REG_A1, 0x0010),
            jal(0x8027_87D8),
            addiu(REG_A2, 0, 0x60), // materialized in the delay slot
            jr_ra(),
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[2], Some(0x60));
    }

    #[test]
    fn unmodeled_write_makes_the_argument_unknown() {
        let image = image_of(&[
            addiu(REG_A0, 0, 0x02),
            addiu(REG_A1, 0, 0x40),
            lw(REG_A1, 29, 0x10), // sp-relative load overwrites a1
            jal(0x8027_87D8),
            nop(),
            jr_ra(),
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert_eq!(calls[0].args[0], Some(0x02));
        assert_eq!(calls[0].args[1], None);
        assert_eq!(calls[0].a1(), 0);
    }

    #[test]
    fn second_call_does_not_inherit_stale_arguments() {
        let image = image_of(&[
            addiu(REG_A0, 0, 0x19),
            jal(0x8027_0000),
            nop(),
            jal(0x8027_87D8), // a0 must not still read as 0x19
            nop(),
            jr_ra(),
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].args[0], Some(0x19));
        assert_eq!(calls[1].args[0], None);
    }

    #[test]
    fn scan_stops_at_the_return() {
        let image = image_of(&[
            jr_ra(),
            nop(),
            jal(0x8027_87D8), // unreachable
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn scan_is_bounded_without_a_return() {
        // A body of nops with no jr: must terminate via the budget.
        let image = image_of(&vec![nop(); MAX_SCAN_INSTRUCTIONS + 64]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert!(calls.is_empty());
    }

    #[test]
    fn start_outside_the_image_is_rejected() {
        let image = image_of(&[nop(); 4]);
        let err = find_calls_in_function(&image, BASE + 0x1000, BASE);
        assert!(matches!(err, Err(RomError::InvalidScanRegion { .. })));
    }

    #[test]
    fn unaligned_start_is_rejected() {
        let image = image_of(&[nop(); 4]);
        let err = find_calls_in_function(&image, BASE + 2, BASE);
        assert!(matches!(err, Err(RomError::InvalidScanRegion { .. })));
    }

    #[test]
    fn start_below_the_code_base_is_rejected() {
        let image = image_of(&[nop(); 4]);
        let err = find_calls_in_function(&image, BASE - 0x1000, BASE);
        assert!(matches!(err, Err(RomError::InvalidScanRegion { .. })));
    }

    #[test]
    fn move_through_zero_propagates_a_literal() {
        // addu a1, t0, $zero copies t0's literal into a1.
        let addu = |rd: usize, rs: usize, rt: usize| -> u32 {
            ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | FN_ADDU
        };
        let image = image_of(&[
            addiu(8, 0, 0x123), // t0 = 0x123
            addu(REG_A1, 8, 0),
            jal(0x8027_87D8),
            nop(),
            jr_ra(),
            nop(),
        ]);
        let calls = find_calls_in_function(&image, BASE, BASE).unwrap();
        assert_eq!(calls[0].args[1], Some(0x123));
    }
}
