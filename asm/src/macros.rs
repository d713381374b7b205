//! Stack macros. They only rely on the pending description contract of
//! [`Program`]: the description (and a pending label) lands on the first
//! instruction of the expansion.

use crate::{error::Error, instruction::Instruction, program::Program};
use arch::{Opcode, Reg};

pub fn push(p: &mut Program, r: Reg) -> Result<(), Error> {
    p.set_pending_macro_description(&format!("_PUSH {}", r))?;
    p.add(Instruction::reg_const(Opcode::SUBIs, Reg::SP, 1)?)?
        .add(Instruction::reg_reg(Opcode::ST, Reg::SP, r)?)?;
    Ok(())
}

pub fn pop(p: &mut Program, r: Reg) -> Result<(), Error> {
    p.set_pending_macro_description(&format!("_POP {}", r))?;
    p.add(Instruction::reg_reg(Opcode::LD, r, Reg::SP)?)?
        .add(Instruction::reg_const(Opcode::ADDIs, Reg::SP, 1)?)?;
    Ok(())
}
