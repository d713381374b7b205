use crate::{context::Context, error::Error, expr::Expr};
use arch::{Form, Opcode, Reg};
use color_print::cformat;
use std::fmt;

/// One unit of the program: an opcode with its operands plus the bookkeeping the
/// linker needs. The address is never stored here, passes derive it while
/// traversing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    dest: Option<Reg>,
    source: Option<Reg>,
    constant: Option<Expr>,
    label: Option<String>,
    macro_description: Option<String>,
    line_number: Option<usize>,
}

impl Instruction {
    /// Builds an instruction, checking the operands against the opcode's [`Form`].
    pub fn make(
        opcode: Opcode,
        dest: Option<Reg>,
        source: Option<Reg>,
        constant: Option<Expr>,
    ) -> Result<Self, Error> {
        let (d, s, c) = (dest.is_some(), source.is_some(), constant.is_some());
        let valid = match opcode.form() {
            Form::None => !d && !s && !c,
            Form::Reg => d && !s && !c,
            Form::RegReg | Form::RegIndirect | Form::IndirectReg => d && s && !c,
            Form::RegConst => d && !s && c,
            Form::ConstReg => !d && s && c,
            Form::Const => !d && !s && c,
        };
        if !valid {
            return Err(Error::InvalidOperands(opcode));
        }
        Ok(Instruction {
            opcode,
            dest,
            source,
            constant,
            label: None,
            macro_description: None,
            line_number: None,
        })
    }

    pub fn plain(opcode: Opcode) -> Result<Self, Error> {
        Self::make(opcode, None, None, None)
    }

    pub fn reg(opcode: Opcode, rd: Reg) -> Result<Self, Error> {
        Self::make(opcode, Some(rd), None, None)
    }

    /// `Rd,Rs`, also used for the indirect forms `Rd,[Rs]` and `[Rd],Rs`.
    pub fn reg_reg(opcode: Opcode, rd: Reg, rs: Reg) -> Result<Self, Error> {
        Self::make(opcode, Some(rd), Some(rs), None)
    }

    pub fn reg_const(opcode: Opcode, rd: Reg, c: impl Into<Expr>) -> Result<Self, Error> {
        Self::make(opcode, Some(rd), None, Some(c.into()))
    }

    pub fn const_reg(opcode: Opcode, c: impl Into<Expr>, rs: Reg) -> Result<Self, Error> {
        Self::make(opcode, None, Some(rs), Some(c.into()))
    }

    pub fn constant(opcode: Opcode, c: impl Into<Expr>) -> Result<Self, Error> {
        Self::make(opcode, None, None, Some(c.into()))
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn dest(&self) -> Option<Reg> {
        self.dest
    }

    pub fn source(&self) -> Option<Reg> {
        self.source
    }

    pub fn constant_expr(&self) -> Option<&Expr> {
        self.constant.as_ref()
    }

    /// Address units this instruction occupies with its current encoding.
    pub fn size(&self) -> i64 {
        self.opcode.size()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: String) -> Result<(), Error> {
        if let Some(prev) = &self.label {
            return Err(Error::LabelAlreadySet(prev.clone()));
        }
        self.label = Some(label);
        Ok(())
    }

    pub fn macro_description(&self) -> Option<&str> {
        self.macro_description.as_deref()
    }

    pub fn set_macro_description(&mut self, text: String) -> Result<(), Error> {
        if let Some(prev) = &self.macro_description {
            return Err(Error::MacroDescriptionAlreadySet(prev.clone()));
        }
        self.macro_description = Some(text);
        Ok(())
    }

    pub fn line_number(&self) -> Option<usize> {
        self.line_number
    }

    pub(crate) fn set_line_number(&mut self, line: Option<usize>) {
        self.line_number = line;
    }

    /// Switches to the compact counterpart of the current opcode. Shrink only.
    pub(crate) fn shorten(&mut self, short: Opcode) {
        debug_assert_eq!(short.long_form(), Some(self.opcode));
        self.opcode = short;
    }

    /// Evaluates the constant operand; `None` for opcodes without one.
    pub fn value(&self, context: &Context) -> Result<Option<i64>, Error> {
        self.constant.as_ref().map(|c| c.eval(context)).transpose()
    }

    fn operands(&self) -> String {
        let rd = self.dest.map(|r| r.to_string()).unwrap_or_default();
        let rs = self.source.map(|r| r.to_string()).unwrap_or_default();
        let c = self.constant.as_ref().map(|c| c.to_string()).unwrap_or_default();
        match self.opcode.form() {
            Form::None => String::new(),
            Form::Reg => rd,
            Form::RegReg => format!("{},{}", rd, rs),
            Form::RegConst => format!("{},{}", rd, c),
            Form::ConstReg => format!("[{}],{}", c, rs),
            Form::Const => c,
            Form::RegIndirect => format!("{},[{}]", rd, rs),
            Form::IndirectReg => format!("[{}],{}", rd, rs),
        }
    }

    pub fn cformat(&self, context: &Context) -> String {
        let label = match &self.label {
            Some(l) => cformat!("<g>{}:</>", l),
            None => String::new(),
        };
        let rd = self.dest.map(|r| r.to_string()).unwrap_or_default();
        let rs = self.source.map(|r| r.to_string()).unwrap_or_default();
        let c = match &self.constant {
            Some(c) => c.cfmt(context),
            None => String::new(),
        };
        let operands = match self.opcode.form() {
            Form::None => String::new(),
            Form::Reg => cformat!("<b>{}</>", rd),
            Form::RegReg => cformat!("<b>{},{}</>", rd, rs),
            Form::RegConst => cformat!("<b>{}</>,{}", rd, c),
            Form::ConstReg => cformat!("[{}],<b>{}</>", c, rs),
            Form::Const => c,
            Form::RegIndirect => cformat!("<b>{},[{}]</>", rd, rs),
            Form::IndirectReg => cformat!("<b>[{}],{}</>", rd, rs),
        };
        let desc = match &self.macro_description {
            Some(d) => cformat!(" <dim>; {}</>", d),
            None => String::new(),
        };
        cformat!(
            "{:<12}<r>{:<6}</>{}{}",
            label,
            self.opcode.to_string(),
            operands,
            desc
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{}: ", label)?;
        }
        write!(f, "{}", self.opcode)?;
        let operands = self.operands();
        if !operands.is_empty() {
            write!(f, " {}", operands)?;
        }
        if let Some(desc) = &self.macro_description {
            write!(f, " ; {}", desc)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! test_display {
        ($($name:ident: $inst:expr => $text:expr,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!($inst.unwrap().to_string(), $text);
                }
            )*
        }
    }

    test_display! {
        display_nop: Instruction::plain(Opcode::NOP) => "NOP",
        display_lsl: Instruction::reg(Opcode::LSL, Reg::R3) => "LSL R3",
        display_mov: Instruction::reg_reg(Opcode::MOV, Reg::R1, Reg::R2) => "MOV R1,R2",
        display_ldi: Instruction::reg_const(Opcode::LDI, Reg::R0, 300) => "LDI R0,300",
        display_sts: Instruction::const_reg(Opcode::STS, 5, Reg::R0) => "STS [5],R0",
        display_jmp: Instruction::constant(Opcode::JMP, Expr::ident("end")) => "JMP end",
        display_ld: Instruction::reg_reg(Opcode::LD, Reg::R1, Reg::SP) => "LD R1,[SP]",
        display_st: Instruction::reg_reg(Opcode::ST, Reg::SP, Reg::R1) => "ST [SP],R1",
    }

    #[test]
    fn invalid_operands() {
        assert_eq!(
            Instruction::reg(Opcode::LDI, Reg::R0),
            Err(Error::InvalidOperands(Opcode::LDI))
        );
        assert_eq!(
            Instruction::constant(Opcode::MOV, 1),
            Err(Error::InvalidOperands(Opcode::MOV))
        );
        assert!(Instruction::plain(Opcode::RRET).is_ok());
    }

    #[test]
    fn label_once() {
        let mut i = Instruction::plain(Opcode::NOP).unwrap();
        i.set_label("a".to_string()).unwrap();
        assert_eq!(
            i.set_label("b".to_string()),
            Err(Error::LabelAlreadySet("a".to_string()))
        );
        i.set_macro_description("_PUSH R1".to_string()).unwrap();
        assert!(i.set_macro_description("_POP R1".to_string()).is_err());
        assert_eq!(i.to_string(), "a: NOP ; _PUSH R1");
    }

    #[test]
    fn size_and_shorten() {
        let mut i = Instruction::reg_const(Opcode::ADDI, Reg::R2, 3).unwrap();
        assert_eq!(i.size(), 2);
        i.shorten(Opcode::ADDIs);
        assert_eq!(i.size(), 1);
        assert_eq!(i.opcode(), Opcode::ADDIs);
        assert_eq!(i.value(&Context::new()), Ok(Some(3)));
    }
}
