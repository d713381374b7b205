use bimap::BiMap;
use num_enum::{FromPrimitive, IntoPrimitive};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Largest constant the short forms carry inside the instruction word.
pub const SHORT_CONST_MAX: i64 = 15;

/// Window of the relative offset of `JMPs`, measured from the next instruction.
pub const SHORT_JUMP_MIN: i64 = -256;
pub const SHORT_JUMP_MAX: i64 = 255;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    FromPrimitive,
    IntoPrimitive,
    EnumString,
    Display,
)]
#[strum(ascii_case_insensitive)]
#[repr(u8)]
pub enum Opcode {
    #[default]
    NOP,
    MOV,
    ADD,
    SUB,
    AND,
    OR,
    EOR,
    CMP,
    LSL,
    LSR,

    LDI,
    LDIs,
    ADDI,
    ADDIs,
    SUBI,
    SUBIs,
    ANDI,
    ANDIs,
    ORI,
    ORIs,
    EORI,
    EORIs,
    CPI,
    CPIs,

    LD,
    ST,
    LDS,
    LDSs,
    STS,
    STSs,

    BREQ,
    BRNE,
    BRCS,
    BRCC,

    JMP,
    JMPs,
    RCALL,
    RRET,
}

/// Operand shape of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    None,
    /// `Rd`
    Reg,
    /// `Rd,Rs`
    RegReg,
    /// `Rd,c`
    RegConst,
    /// `[c],Rs`
    ConstReg,
    /// `c`
    Const,
    /// `Rd,[Rs]`
    RegIndirect,
    /// `[Rd],Rs`
    IndirectReg,
}

// long form -> short form with the constant packed into the word
static SHORT_CONST: Lazy<BiMap<Opcode, Opcode>> = Lazy::new(|| {
    use Opcode::*;
    let mut map = BiMap::new();
    map.insert(LDI, LDIs);
    map.insert(ADDI, ADDIs);
    map.insert(SUBI, SUBIs);
    map.insert(ANDI, ANDIs);
    map.insert(ORI, ORIs);
    map.insert(EORI, EORIs);
    map.insert(CPI, CPIs);
    map.insert(LDS, LDSs);
    map.insert(STS, STSs);
    map
});

// absolute jump -> relative jump
static SHORT_JUMP: Lazy<BiMap<Opcode, Opcode>> = Lazy::new(|| {
    let mut map = BiMap::new();
    map.insert(Opcode::JMP, Opcode::JMPs);
    map
});

impl Opcode {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.parse::<Self>() {
            Ok(a) => Ok(a),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }

    pub fn form(&self) -> Form {
        use Opcode::*;
        match self {
            NOP | RRET => Form::None,
            LSL | LSR => Form::Reg,
            MOV | ADD | SUB | AND | OR | EOR | CMP => Form::RegReg,
            LDI | LDIs | ADDI | ADDIs | SUBI | SUBIs | ANDI | ANDIs | ORI | ORIs | EORI
            | EORIs | CPI | CPIs | LDS | LDSs => Form::RegConst,
            STS | STSs => Form::ConstReg,
            LD => Form::RegIndirect,
            ST => Form::IndirectReg,
            BREQ | BRNE | BRCS | BRCC | JMP | JMPs | RCALL => Form::Const,
        }
    }

    /// Number of address units the encoded instruction occupies.
    pub fn size(&self) -> i64 {
        if self.short_form().is_some() || self.short_jump().is_some() {
            return 2;
        }
        match self {
            Opcode::RCALL => 2,
            _ => 1,
        }
    }

    pub fn short_form(&self) -> Option<Opcode> {
        SHORT_CONST.get_by_left(self).copied()
    }

    pub fn short_jump(&self) -> Option<Opcode> {
        SHORT_JUMP.get_by_left(self).copied()
    }

    /// Inverse of [`Opcode::short_form`] and [`Opcode::short_jump`].
    pub fn long_form(&self) -> Option<Opcode> {
        SHORT_CONST
            .get_by_right(self)
            .or_else(|| SHORT_JUMP.get_by_right(self))
            .copied()
    }

    pub fn is_short(&self) -> bool {
        self.long_form().is_some()
    }
}

pub fn fits_short_const(value: i64) -> bool {
    (0..=SHORT_CONST_MAX).contains(&value)
}

pub fn fits_short_jump(offset: i64) -> bool {
    (SHORT_JUMP_MIN..=SHORT_JUMP_MAX).contains(&offset)
}
