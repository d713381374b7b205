use crate::{
    context::{Context, Ident},
    error::Error,
    expr::Expr,
    instruction::Instruction,
};
use arch::op::{fits_short_const, fits_short_jump};
use std::fmt;
use std::ops::ControlFlow;

/// The visitors the linker runs over a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Binds every label to the address of its instruction for the first time.
    LinkAdd,
    /// Rebinds every label after the layout changed.
    LinkSet,
    /// Moves constants that fit into the instruction word into it.
    OptimizeShort,
    /// Turns absolute jumps to nearby labels into relative ones.
    ///
    /// `saved` counts the words already saved in this pass, so that distances are
    /// measured on the layout the last link produced: every later shrink can only
    /// bring a jump closer to its target.
    OptimizeJmp { saved: i64 },
}

impl Pass {
    pub fn optimize_jmp() -> Self {
        Pass::OptimizeJmp { saved: 0 }
    }

    pub fn visit(
        &mut self,
        inst: &mut Instruction,
        context: &mut Context,
    ) -> Result<ControlFlow<()>, Error> {
        match self {
            Pass::LinkAdd => {
                if let Some(label) = inst.label() {
                    context.add_identifier(label, context.instr_addr())?;
                }
            }
            Pass::LinkSet => {
                if let Some(label) = inst.label() {
                    context.set_identifier(label, context.instr_addr())?;
                }
            }
            Pass::OptimizeShort => optimize_short(inst, context)?,
            Pass::OptimizeJmp { saved } => *saved += optimize_jmp(inst, context, *saved)?,
        }
        Ok(ControlFlow::Continue(()))
    }
}

fn optimize_short(inst: &mut Instruction, context: &Context) -> Result<(), Error> {
    // every operand is evaluated so that undefined references surface here
    let Some(value) = inst.value(context)? else {
        return Ok(());
    };
    let Some(short) = inst.opcode().short_form() else {
        return Ok(());
    };
    let stable = inst
        .constant_expr()
        .is_some_and(|expr| expr.shrinks_monotonically());
    if stable && fits_short_const(value) {
        log::debug!(
            "0x{:04X}: {} -> {} ({})",
            context.instr_addr(),
            inst.opcode(),
            short,
            value
        );
        inst.shorten(short);
    }
    Ok(())
}

// returns the number of words saved
fn optimize_jmp(inst: &mut Instruction, context: &Context, saved: i64) -> Result<i64, Error> {
    let Some(short) = inst.opcode().short_jump() else {
        return Ok(0);
    };
    let Some(target) = inst.constant_expr().and_then(Expr::as_ident) else {
        return Ok(0);
    };
    let target_addr = context.resolve(target)?;
    if context.kind(target) != Some(Ident::Label) {
        return Ok(0);
    }

    let addr = context.instr_addr() + saved;
    let offset = target_addr - (addr + 1);
    if !fits_short_jump(offset) {
        log::debug!(
            "0x{:04X}: {} {} out of short range ({})",
            addr,
            inst.opcode(),
            target,
            offset
        );
        return Ok(0);
    }

    let before = inst.size();
    log::debug!(
        "0x{:04X}: {} -> {} {} ({:+})",
        addr,
        inst.opcode(),
        short,
        target,
        offset
    );
    inst.shorten(short);
    Ok(before - inst.size())
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::LinkAdd => write!(f, "link (tentative)"),
            Pass::LinkSet => write!(f, "link (final)"),
            Pass::OptimizeShort => write!(f, "optimize constants"),
            Pass::OptimizeJmp { .. } => write!(f, "optimize jumps"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arch::{Opcode, Reg};

    fn visit(pass: &mut Pass, inst: &mut Instruction, context: &mut Context) {
        assert_eq!(pass.visit(inst, context), Ok(ControlFlow::Continue(())));
    }

    #[test]
    fn link_add_and_set() {
        let mut context = Context::new();
        let mut inst = Instruction::plain(Opcode::NOP).unwrap();
        inst.set_label("here".to_string()).unwrap();

        context.set_instr_addr(9);
        visit(&mut Pass::LinkAdd, &mut inst, &mut context);
        assert_eq!(context.get("here"), Some(9));
        assert_eq!(
            Pass::LinkAdd.visit(&mut inst, &mut context),
            Err(Error::RedefinedLabel("here".to_string()))
        );

        context.set_instr_addr(6);
        visit(&mut Pass::LinkSet, &mut inst, &mut context);
        assert_eq!(context.get("here"), Some(6));
    }

    #[test]
    fn link_set_unbound() {
        let mut context = Context::new();
        let mut inst = Instruction::plain(Opcode::NOP).unwrap();
        inst.set_label("here".to_string()).unwrap();
        assert_eq!(
            Pass::LinkSet.visit(&mut inst, &mut context),
            Err(Error::UnboundIdentifier("here".to_string()))
        );
    }

    #[test]
    fn short_constants() {
        let mut context = Context::new();
        context.add_identifier("near", 15).unwrap();
        context.add_identifier("far", 16).unwrap();

        let cases = [
            (Instruction::reg_const(Opcode::LDI, Reg::R1, 15), Opcode::LDIs),
            (Instruction::reg_const(Opcode::LDI, Reg::R1, 16), Opcode::LDI),
            (Instruction::reg_const(Opcode::ADDI, Reg::R1, -1), Opcode::ADDI),
            (Instruction::reg_const(Opcode::CPI, Reg::R1, Expr::ident("near")), Opcode::CPIs),
            (Instruction::reg_const(Opcode::CPI, Reg::R1, Expr::ident("far")), Opcode::CPI),
            (Instruction::const_reg(Opcode::STS, 0, Reg::R0), Opcode::STSs),
            (
                Instruction::reg_const(
                    Opcode::LDI,
                    Reg::R1,
                    Expr::sub(Expr::ident("far"), Expr::ident("near")),
                ),
                Opcode::LDI,
            ),
            (Instruction::constant(Opcode::JMP, 3), Opcode::JMP),
        ];
        for (inst, expected) in cases {
            let mut inst = inst.unwrap();
            visit(&mut Pass::OptimizeShort, &mut inst, &mut context);
            assert_eq!(inst.opcode(), expected, "{}", inst);
        }
    }

    #[test]
    fn short_constant_undefined() {
        let mut context = Context::new();
        let mut inst = Instruction::constant(Opcode::BRNE, Expr::ident("nowhere")).unwrap();
        assert_eq!(
            Pass::OptimizeShort.visit(&mut inst, &mut context),
            Err(Error::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn short_jumps() {
        let mut context = Context::new();
        context.add_identifier("back", 0).unwrap();
        context.add_identifier("fwd", 300).unwrap();
        context.add_ram_identifier("buf", 2).unwrap();

        let mut pass = Pass::optimize_jmp();
        context.set_instr_addr(10);
        let mut jmp = Instruction::constant(Opcode::JMP, Expr::ident("back")).unwrap();
        visit(&mut pass, &mut jmp, &mut context);
        assert_eq!(jmp.opcode(), Opcode::JMPs);
        assert_eq!(pass, Pass::OptimizeJmp { saved: 1 });

        // 300 - (11 + 1) = 288
        context.set_instr_addr(10);
        let mut jmp = Instruction::constant(Opcode::JMP, Expr::ident("fwd")).unwrap();
        visit(&mut pass, &mut jmp, &mut context);
        assert_eq!(jmp.opcode(), Opcode::JMP);

        let mut jmp = Instruction::constant(Opcode::JMP, Expr::ident("buf")).unwrap();
        visit(&mut pass, &mut jmp, &mut context);
        assert_eq!(jmp.opcode(), Opcode::JMP);

        let mut jmp = Instruction::constant(Opcode::JMP, 12).unwrap();
        visit(&mut pass, &mut jmp, &mut context);
        assert_eq!(jmp.opcode(), Opcode::JMP);
        assert_eq!(pass, Pass::OptimizeJmp { saved: 1 });
    }

    #[test]
    fn short_jump_measured_before_shrinks() {
        let mut context = Context::new();
        context.add_identifier("top", 0).unwrap();
        // the last link saw the jump at 256, two words have been saved since
        let mut pass = Pass::OptimizeJmp { saved: 2 };
        context.set_instr_addr(254);
        let mut jmp = Instruction::constant(Opcode::JMP, Expr::ident("top")).unwrap();
        visit(&mut pass, &mut jmp, &mut context);
        assert_eq!(jmp.opcode(), Opcode::JMP);
    }
}
